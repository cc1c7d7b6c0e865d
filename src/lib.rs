pub mod cluster;
pub mod config;
pub mod deadline;
pub mod embedding;
pub mod error;
pub mod fts;
pub mod ingest;
pub mod logging;
pub mod recommend;
pub mod search;
pub mod store;
pub mod tree;

pub use error::Error;

// Re-export key public types for convenience.
pub use config::Config;
pub use deadline::Deadline;
pub use recommend::{RecommendMode, RelatedFile, RelatedPassage};
pub use search::{ClusterSuggestion, HybridResult, MatchClass};
pub use store::StoreStatus;
pub use tree::{FileTree, FileTreeNode};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::embedding::batch::{embed_items, EmbedItem};
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::RequestError;
use crate::fts::FtsIndex;
use crate::ingest::IngestReport;
use crate::store::{Cluster, Embedding, Passage, PassageId, Store};

/// Result of an embed build (§4.2): embeds every passage lacking an
/// up-to-date vector, leaving the rest untouched.
#[derive(Debug, Serialize)]
pub struct EmbedBuildReport {
    /// Passages embedded in this run (new, or re-embedded after a model change).
    pub passages_embedded: usize,
    /// Number of provider batch calls made.
    pub api_calls: usize,
}

/// Result of a cluster build (§4.8).
#[derive(Debug, Serialize)]
pub struct ClusterBuildReport {
    pub clusters_created: usize,
    pub passages_clustered: usize,
}

/// Primary library API handle: owns the Store, the lexical index, and the
/// embedding provider, and exposes every corpus operation as one async
/// surface (§4.10 Query frontend, § EXTERNAL INTERFACES).
pub struct Engine {
    config: Config,
    store: Store,
    fts: FtsIndex,
    provider: Box<dyn EmbeddingProvider>,
    /// Bounded admission queue for query-frontend requests (§5 Backpressure):
    /// sized `queue_capacity_multiplier * worker_concurrency`. Build methods
    /// do not go through this; the store's own build lock serializes those.
    admission: tokio::sync::Semaphore,
}

impl Engine {
    /// Open (or create) the store and lexical index at the paths named in
    /// `config`, and construct the embedder adapter for its backend.
    pub fn open(config: Config) -> Result<Self> {
        let store = Store::open_or_create(&config.store_path)?;
        let fts = FtsIndex::open_or_create(&config.fts_index_dir)?;
        let provider = create_provider(&config)?;
        let admission = tokio::sync::Semaphore::new(config.queue_capacity_multiplier * config.worker_concurrency);

        info!(
            backend = ?config.embedder_backend,
            dimensions = config.embedder_dimensions,
            "engine opened"
        );

        Ok(Self {
            config,
            store,
            fts,
            provider,
            admission,
        })
    }

    /// Resolve an effective deadline: caller-supplied if given, else the
    /// configured default (§5 Cancellation).
    fn effective_deadline(&self, deadline: Option<Deadline>) -> Deadline {
        deadline.unwrap_or_else(|| Deadline::after(self.config.request_deadline()))
    }

    /// Non-blocking admission check for the query frontend (§5 Backpressure):
    /// rejects immediately with `Error::Overloaded` rather than queuing.
    fn admit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.admission
            .try_acquire()
            .map_err(|_| Error::Request(RequestError::Overloaded))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest the corpus: discover → parse → split into passages → upsert
    /// changed files, drop passages for files removed from disk (§4.1).
    pub async fn ingest(&self) -> Result<IngestReport> {
        ingest::ingest_corpus(&self.config, &self.store, &self.fts).await
    }

    /// Embed every passage lacking a vector from the provider's current
    /// model. If the store's embedding model differs from the provider's
    /// (a backend or model switch), every passage is re-embedded.
    pub async fn embed_build(&self) -> Result<EmbedBuildReport> {
        let snapshot = self.store.snapshot();
        let model_matches = snapshot.embedding_model.as_deref() == Some(self.provider.name());

        let mut existing: std::collections::HashSet<PassageId> = std::collections::HashSet::new();
        if model_matches {
            existing.extend(snapshot.embeddings.iter().map(|e| e.passage_id));
        }

        let items: Vec<EmbedItem> = snapshot
            .passages
            .iter()
            .filter(|p| !existing.contains(&p.id))
            .map(|p| EmbedItem {
                passage_id: p.id,
                content: p.content.clone(),
            })
            .collect();

        let result = embed_items(
            self.provider.as_ref(),
            &items,
            self.config.embedder_batch_size,
            self.config.worker_concurrency,
        )
        .await?;

        let mut build = self.store.begin_build()?;
        if !model_matches {
            build.draft.embeddings.clear();
        }
        for (passage_id, vec) in result.embeddings {
            build.draft.embeddings.retain(|e| e.passage_id != passage_id);
            build.draft.embeddings.push(Embedding {
                passage_id,
                model: self.provider.name().to_string(),
                dims: self.provider.dimensions() as u32,
                vec,
            });
        }
        build.draft.embedding_model = Some(self.provider.name().to_string());
        let passages_embedded = items.len();
        build.commit()?;

        info!(passages_embedded, api_calls = result.api_calls, "embed build complete");
        Ok(EmbedBuildReport {
            passages_embedded,
            api_calls: result.api_calls,
        })
    }

    /// Rebuild clusters over the current embeddings. Deterministic: the seed
    /// is derived from the corpus's file hashes, so an unchanged corpus
    /// reproduces the same clusters (§5 Ordering guarantees).
    pub fn cluster_build(&self) -> Result<ClusterBuildReport> {
        let snapshot = self.store.snapshot();
        let mut hashes: Vec<&str> = snapshot.files.iter().map(|f| f.hash.as_str()).collect();
        hashes.sort_unstable();
        let corpus_seed = hashes.join(":");

        let passages: HashMap<PassageId, &Passage> = snapshot.passages.iter().map(|p| (p.id, p)).collect();
        let result = cluster::build_clusters(&self.config, &corpus_seed, &snapshot.embeddings, &passages)?;

        let clusters_created = result.clusters.len();
        let passages_clustered = result.members.len();
        let next_cluster_id = result.clusters.iter().map(|c: &Cluster| c.id).max().map(|m| m + 1).unwrap_or(0);

        let mut build = self.store.begin_build()?;
        build.draft.clusters = result.clusters;
        build.draft.cluster_members = result.members;
        build.draft.next_cluster_id = next_cluster_id;
        build.commit()?;

        info!(clusters_created, passages_clustered, "cluster build complete");
        Ok(ClusterBuildReport {
            clusters_created,
            passages_clustered,
        })
    }

    /// Hybrid search (§4.6).
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        fts_k: Option<usize>,
        deadline: Option<Deadline>,
    ) -> Result<Vec<HybridResult>> {
        let _permit = self.admit()?;
        let deadline = self.effective_deadline(deadline);
        let fts_k = fts_k.unwrap_or(self.config.fts_k);
        search::hybrid_search(query, limit, fts_k, &self.store, &self.fts, self.provider.as_ref(), &deadline).await
    }

    /// Cluster-suggest / topic routing (§4.7).
    pub async fn cluster_suggest(
        &self,
        query: &str,
        limit: usize,
        fts_k: Option<usize>,
        deadline: Option<Deadline>,
    ) -> Result<Vec<ClusterSuggestion>> {
        let _permit = self.admit()?;
        let deadline = self.effective_deadline(deadline);
        let fts_k = fts_k.unwrap_or(self.config.fts_k);
        search::cluster_suggest(query, limit, fts_k, &self.store, &self.fts, self.provider.as_ref(), &deadline).await
    }

    /// Passage-level relatedness (§4.9).
    pub fn related(
        &self,
        passage_id: PassageId,
        mode: RecommendMode,
        k: usize,
        deadline: Option<Deadline>,
    ) -> Result<Vec<RelatedPassage>> {
        let _permit = self.admit()?;
        let deadline = self.effective_deadline(deadline);
        recommend::related(&self.store, passage_id, mode, k, &deadline)
    }

    /// File-level relatedness (§4.9 File-level aggregation).
    pub fn related_notes(
        &self,
        passage_id: PassageId,
        mode: RecommendMode,
        k: usize,
        deadline: Option<Deadline>,
    ) -> Result<Vec<RelatedFile>> {
        let _permit = self.admit()?;
        let deadline = self.effective_deadline(deadline);
        recommend::related_notes(&self.store, passage_id, mode, k, &deadline)
    }

    /// A single passage's full record, by id.
    pub fn get_passage(&self, passage_id: PassageId) -> Result<Passage> {
        self.store
            .snapshot()
            .passages
            .iter()
            .find(|p| p.id == passage_id)
            .cloned()
            .ok_or_else(|| Error::Request(error::RequestError::NotFound(format!("passage {passage_id} does not exist"))))
    }

    /// Every passage belonging to `file_path`, in ordinal order.
    pub fn file_passages(&self, file_path: &str) -> Vec<Passage> {
        let mut passages: Vec<Passage> = self
            .store
            .snapshot()
            .passages
            .iter()
            .filter(|p| p.file_path == file_path)
            .cloned()
            .collect();
        passages.sort_by_key(|p| p.ordinal);
        passages
    }

    /// Every cluster, without members.
    pub fn clusters(&self, limit: usize) -> Vec<Cluster> {
        let mut clusters = self.store.snapshot().clusters.clone();
        clusters.truncate(limit);
        clusters
    }

    /// One cluster's metadata plus its member passages.
    pub fn cluster_members(&self, cluster_id: store::ClusterId, limit: usize) -> Result<(Cluster, Vec<Passage>)> {
        let snapshot = self.store.snapshot();
        let cluster = snapshot
            .clusters
            .iter()
            .find(|c| c.id == cluster_id)
            .cloned()
            .ok_or_else(|| Error::Request(error::RequestError::NotFound(format!("cluster {cluster_id} does not exist"))))?;

        let passages_by_id: HashMap<PassageId, &Passage> = snapshot.passages.iter().map(|p| (p.id, p)).collect();
        let mut members: Vec<Passage> = snapshot
            .cluster_members
            .iter()
            .filter(|(cid, _)| *cid == cluster_id)
            .filter_map(|(_, pid)| passages_by_id.get(pid).map(|p| (*p).clone()))
            .collect();
        members.sort_by_key(|p| p.id);
        members.truncate(limit);
        Ok((cluster, members))
    }

    /// Directory/file tree over the corpus's passages (§4.10).
    pub fn file_tree(&self) -> FileTree {
        tree::build_tree(&self.store.snapshot().passages)
    }

    /// Store status summary, for the `status` CLI subcommand and `/health`.
    pub fn status(&self) -> StoreStatus {
        let snapshot = self.store.snapshot();
        let store_file_size = std::fs::metadata(&self.config.store_path).map(|m| m.len()).unwrap_or(0);
        StoreStatus {
            file_count: snapshot.files.len(),
            passage_count: snapshot.passages.len(),
            embedding_count: snapshot.embeddings.len(),
            cluster_count: snapshot.clusters.len(),
            last_updated: snapshot.last_updated,
            store_file_size,
        }
    }
}
