//! Persisted data model (§3): files, passages, embeddings, clusters, modules.

use serde::Serialize;

/// A passage id, unique and auto-assigned within a store build (§4.2).
pub type PassageId = u64;
/// A cluster id, auto-assigned within a build.
pub type ClusterId = u64;
/// A module id, auto-assigned within a build.
pub type ModuleId = u64;

/// `files(path PK, mtime, size, hash)`.
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize)]
#[rkyv(derive(Debug))]
pub struct FileRow {
    pub path: String,
    pub mtime: u64,
    pub size: u64,
    pub hash: String,
}

/// `chunks(id PK, file_path FK, heading, ordinal, content, content_len)`.
///
/// Invariants: `(file_path, ordinal)` is unique and dense starting at 0;
/// `content` is non-empty; ordinal order follows source order.
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize)]
#[rkyv(derive(Debug))]
pub struct Passage {
    pub id: PassageId,
    pub file_path: String,
    pub heading: Option<String>,
    pub ordinal: u32,
    pub content: String,
    pub content_len: u32,
}

/// `embeddings(chunk_id PK FK, model, dims, vec_blob)`.
///
/// Invariant: `vec` is L2-normalized on write; `dims == vec.len()`.
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub struct Embedding {
    pub passage_id: PassageId,
    pub model: String,
    pub dims: u32,
    pub vec: Vec<f32>,
}

/// `clusters(id PK, method, k, name, summary, size, centroid_blob)`.
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize)]
#[rkyv(derive(Debug))]
pub struct Cluster {
    pub id: ClusterId,
    pub method: String,
    pub k: u32,
    pub name: String,
    pub summary: Option<String>,
    pub size: u32,
    pub centroid: Vec<f32>,
}

/// `modules(id PK, name, description)`.
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize)]
#[rkyv(derive(Debug))]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub description: Option<String>,
}

/// `file_modules(file_path PK, module_id, score)`. At most one module per file.
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Serialize)]
#[rkyv(derive(Debug))]
pub struct FileModule {
    pub file_path: String,
    pub module_id: ModuleId,
    pub score: f32,
}

/// Snapshot-wide metadata persisted alongside the relational rows.
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub struct StoreMetadata {
    pub files: Vec<FileRow>,
    pub passages: Vec<Passage>,
    pub embeddings: Vec<Embedding>,
    pub clusters: Vec<Cluster>,
    /// `(cluster_id, passage_id)` membership pairs.
    pub cluster_members: Vec<(ClusterId, PassageId)>,
    pub modules: Vec<Module>,
    pub file_modules: Vec<FileModule>,
    /// Embedding model id this snapshot's embeddings were built against.
    pub embedding_model: Option<String>,
    /// Next passage id to assign; ids are never reused across a build (§4.2).
    pub next_passage_id: PassageId,
    pub next_cluster_id: ClusterId,
    /// Unix timestamp (seconds) of the last successful build.
    pub last_updated: u64,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            passages: Vec::new(),
            embeddings: Vec::new(),
            clusters: Vec::new(),
            cluster_members: Vec::new(),
            modules: Vec::new(),
            file_modules: Vec::new(),
            embedding_model: None,
            next_passage_id: 0,
            next_cluster_id: 0,
            last_updated: 0,
        }
    }
}

/// Status snapshot returned by `Engine::status()`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub file_count: usize,
    pub passage_count: usize,
    pub embedding_count: usize,
    pub cluster_count: usize,
    pub last_updated: u64,
    pub store_file_size: u64,
}
