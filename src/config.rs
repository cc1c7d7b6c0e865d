use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::Error;

/// Supported embedding adapter backends (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmbedderBackend {
    /// Deterministic, hash-derived vectors. No network, no model file.
    Mock,
    /// A local small model run in-process or via a local daemon.
    Local,
    /// A remote HTTP embedding API.
    Remote,
}

impl FromStr for EmbedderBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(Error::Config(format!(
                "unknown embedder backend '{other}': expected mock, local, or remote"
            ))),
        }
    }
}

/// Full configuration for mdvdb, loaded from environment / `.env` file / defaults.
///
/// Precedence: process environment > `.env` file > built-in defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Root directory of the Markdown corpus to ingest.
    pub corpus_root: PathBuf,
    /// File extensions to ingest, without the leading dot.
    pub extensions: Vec<String>,
    /// Path to the persisted store file.
    pub store_path: PathBuf,
    /// Directory backing the Tantivy inverted index.
    pub fts_index_dir: PathBuf,
    /// Built-in and user-configured ignore patterns for discovery.
    pub ignore_patterns: Vec<String>,

    pub embedder_backend: EmbedderBackend,
    pub embedder_model: String,
    pub embedder_dimensions: usize,
    pub embedder_endpoint: Option<String>,
    pub embedder_api_key: Option<String>,
    pub embedder_batch_size: usize,

    /// Default number of lexical candidates fed into the semantic reranker.
    pub fts_k: usize,
    /// Clamp bounds for the clusterer's `K` heuristic (§4.8).
    pub cluster_k_min: usize,
    pub cluster_k_max: usize,

    /// Default per-request deadline.
    pub request_deadline_ms: u64,
    /// Width of the embedder concurrency semaphore.
    pub worker_concurrency: usize,
    /// Bounded admission-queue capacity multiplier (§5 Backpressure).
    pub queue_capacity_multiplier: usize,
}

impl Config {
    /// Load configuration with priority: shell env > `.env` file > built-in defaults.
    pub fn load(project_root: &Path) -> Result<Self, Error> {
        let _ = dotenvy::from_path(project_root.join(".env"));

        let corpus_root = PathBuf::from(env_or_default(
            "MDVDB_CORPUS_ROOT",
            &project_root.to_string_lossy(),
        ));

        let extensions = parse_comma_list_string("MDVDB_EXTENSIONS", vec!["md".to_string()]);

        let store_path = PathBuf::from(env_or_default("MDVDB_STORE_PATH", ".mdvdb/store.bin"));

        let fts_index_dir = PathBuf::from(env_or_default("MDVDB_FTS_INDEX_DIR", ".mdvdb/fts"));

        let ignore_patterns = parse_comma_list_string("MDVDB_IGNORE_PATTERNS", vec![]);

        let embedder_backend =
            env_or_default("MDVDB_EMBEDDER_BACKEND", "mock").parse::<EmbedderBackend>()?;

        let embedder_model = env_or_default("MDVDB_EMBEDDER_MODEL", "mock-embed-v1");

        let embedder_dimensions = parse_env::<usize>("MDVDB_EMBEDDER_DIMENSIONS", 256)?;

        let embedder_endpoint = std::env::var("MDVDB_EMBEDDER_ENDPOINT").ok();

        let embedder_api_key = std::env::var("MDVDB_EMBEDDER_API_KEY").ok();

        let embedder_batch_size = parse_env::<usize>("MDVDB_EMBEDDER_BATCH_SIZE", 64)?;

        let fts_k = parse_env::<usize>("MDVDB_FTS_K", 200)?;

        let cluster_k_min = parse_env::<usize>("MDVDB_CLUSTER_K_MIN", 8)?;
        let cluster_k_max = parse_env::<usize>("MDVDB_CLUSTER_K_MAX", 128)?;

        let request_deadline_ms = parse_env::<u64>("MDVDB_REQUEST_DEADLINE_MS", 5_000)?;

        let worker_concurrency = parse_env::<usize>("MDVDB_WORKER_CONCURRENCY", 4)?;

        let queue_capacity_multiplier = parse_env::<usize>("MDVDB_QUEUE_CAPACITY_MULTIPLIER", 2)?;

        let config = Self {
            corpus_root,
            extensions,
            store_path,
            fts_index_dir,
            ignore_patterns,
            embedder_backend,
            embedder_model,
            embedder_dimensions,
            embedder_endpoint,
            embedder_api_key,
            embedder_batch_size,
            fts_k,
            cluster_k_min,
            cluster_k_max,
            request_deadline_ms,
            worker_concurrency,
            queue_capacity_multiplier,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate constraint invariants on the loaded config.
    fn validate(&self) -> Result<(), Error> {
        if self.extensions.is_empty() {
            return Err(Error::Config("extensions must not be empty".into()));
        }
        if self.embedder_dimensions == 0 {
            return Err(Error::Config("embedder_dimensions must be > 0".into()));
        }
        if self.embedder_batch_size == 0 {
            return Err(Error::Config("embedder_batch_size must be > 0".into()));
        }
        if self.embedder_backend == EmbedderBackend::Remote && self.embedder_api_key.is_none() {
            return Err(Error::Config(
                "MDVDB_EMBEDDER_API_KEY is required when MDVDB_EMBEDDER_BACKEND=remote".into(),
            ));
        }
        if self.cluster_k_min == 0 || self.cluster_k_min > self.cluster_k_max {
            return Err(Error::Config(format!(
                "cluster_k_min ({}) must be > 0 and <= cluster_k_max ({})",
                self.cluster_k_min, self.cluster_k_max
            )));
        }
        if self.fts_k == 0 {
            return Err(Error::Config("fts_k must be > 0".into()));
        }
        if self.worker_concurrency == 0 {
            return Err(Error::Config("worker_concurrency must be > 0".into()));
        }
        Ok(())
    }

    /// The default request deadline as a `Duration`.
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| Error::Config(format!("failed to parse {key}='{val}': {e}"))),
        Err(_) => Ok(default),
    }
}

fn parse_comma_list_string(key: &str, default: Vec<String>) -> Vec<String> {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.split(',').map(|s| s.trim().to_string()).collect(),
        _ => default,
    }
}
