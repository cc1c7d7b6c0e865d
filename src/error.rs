use std::path::PathBuf;

/// All errors that can occur in mdvdb, grouped the way they're grouped in the
/// design: one arm per failure domain rather than one flat list.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("request error: {0}")]
    Request(#[from] RequestError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("logging initialization error: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid UTF-8 in {}", path.display())]
    Decode { path: PathBuf },

    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is locked by a concurrent build")]
    Locked,

    #[error("store corrupted: {0}")]
    Corrupt(String),

    #[error("store migration failed: {0}")]
    Migration(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Not actually returned as an error — empty queries yield an empty
    /// result list. Kept as a variant for internal signalling only.
    #[error("empty query")]
    EmptyQuery,

    #[error("lexical index error: {0}")]
    Index(String),

    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("not enough data to cluster: {n} passages, need at least 1")]
    NotEnoughData { n: usize },

    #[error("k-means did not converge within {max_iterations} iterations")]
    Converge { max_iterations: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("cancelled: deadline exceeded")]
    Cancelled,

    #[error("overloaded: request queue is full")]
    Overloaded,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map to the process exit code for the offline build CLIs (§6).
    ///
    /// 0 success; 2 usage error; 3 I/O error; 4 store/consistency error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Request(RequestError::BadRequest(_)) => 2,
            Error::Config(_) => 2,
            Error::Logging(_) => 2,
            Error::Io(_) => 3,
            Error::Ingest(IngestError::Io { .. }) => 3,
            Error::Ingest(IngestError::Decode { .. }) | Error::Ingest(IngestError::Parse { .. }) => 3,
            Error::Store(_) => 4,
            Error::Cluster(_) => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn ingest_decode_formats() {
        let err = Error::Ingest(IngestError::Decode {
            path: PathBuf::from("bad.md"),
        });
        assert!(err.to_string().contains("bad.md"));
    }

    #[test]
    fn store_locked_formats() {
        let err = Error::Store(StoreError::Locked);
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn search_embedder_unavailable_formats() {
        let err = Error::Search(SearchError::EmbedderUnavailable("timeout".into()));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn cluster_not_enough_data_formats() {
        let err = Error::Cluster(ClusterError::NotEnoughData { n: 0 });
        assert!(err.to_string().contains('0'));
    }

    #[test]
    fn io_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: Error = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn exit_codes_match_spec() {
        assert_eq!(Error::Config("x".into()).exit_code(), 2);
        assert_eq!(
            Error::Io(io::Error::new(io::ErrorKind::Other, "x")).exit_code(),
            3
        );
        assert_eq!(Error::Store(StoreError::Corrupt("x".into())).exit_code(), 4);
        assert_eq!(
            Error::Request(RequestError::Cancelled).exit_code(),
            1
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
