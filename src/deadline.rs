//! Per-request deadline propagation (§5 Cancellation): a plain value passed
//! down through long-running read paths and checked at natural batch
//! boundaries, rather than polled continuously or threaded through a
//! cancellation signal.

use std::time::{Duration, Instant};

use crate::error::{Error, RequestError};

/// Number of candidates a scan processes between deadline checks (§5: "every
/// 1024 candidates").
pub const BATCH_CHECK_INTERVAL: usize = 1024;

/// A fixed point in time by which a request must complete.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// A deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
        }
    }

    /// Time remaining before expiry; zero if already past.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// Error if the deadline has already passed.
    pub fn check(&self) -> Result<(), Error> {
        if Instant::now() >= self.expires_at {
            Err(Error::Request(RequestError::Cancelled))
        } else {
            Ok(())
        }
    }

    /// Check the deadline only every [`BATCH_CHECK_INTERVAL`] items, given
    /// the running count of candidates processed so far (1-based). Meant to
    /// be called from inside a scan loop instead of checking every iteration.
    pub fn check_at_boundary(&self, processed: usize) -> Result<(), Error> {
        if processed % BATCH_CHECK_INTERVAL == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}
