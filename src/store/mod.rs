pub mod state;
pub mod storage;
pub mod types;

pub use state::{BuildGuard, Store};
pub use types::{
    Cluster, ClusterId, Embedding, FileModule, FileRow, Module, ModuleId, Passage, PassageId,
    StoreMetadata, StoreStatus,
};
