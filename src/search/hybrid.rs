//! Hybrid orchestrator (§4.6): lexical retrieve, semantic rerank, fuse,
//! classify.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::deadline::Deadline;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::fts::FtsIndex;
use crate::store::{PassageId, Store};

use super::lexical;
use super::semantic;

/// Fusion width for the lexical-score normalization (§4.6 step 3).
const FUSION_WIDTH: f32 = 10.0;
/// Raw (unnormalized) lexical score above which a match counts as "strong" (§4.6 step 4).
const STRONG_LEXICAL_THRESHOLD: f32 = -8.0;
/// Normalized semantic score above which a match counts as "strong" (§4.6 step 4).
const STRONG_SEMANTIC_THRESHOLD: f32 = 0.25;
/// Passage preview length, in characters.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchClass {
    Hybrid,
    Keyword,
    Semantic,
}

#[derive(Debug, Clone, Serialize)]
pub struct HybridResult {
    pub passage_id: PassageId,
    pub file_path: String,
    pub heading: Option<String>,
    pub preview: String,
    pub score: f32,
    pub lexical_score: f32,
    pub semantic_score: f32,
    pub match_class: MatchClass,
}

/// Run a hybrid search: lexical retrieve (`fts_k` candidates) → semantic
/// rerank (of the candidates that have an embedding) → fuse → classify →
/// truncate to `limit`.
///
/// If the embedder is unavailable, falls back to lexical-only: every
/// result's `semantic_score` is 0 and `match_class` is `keyword` (§4.6
/// Failure semantics). A lexical index error is fatal and propagates.
pub async fn search(
    query: &str,
    limit: usize,
    fts_k: usize,
    store: &Store,
    fts: &FtsIndex,
    provider: &dyn EmbeddingProvider,
    deadline: &Deadline,
) -> Result<Vec<HybridResult>> {
    let lex_candidates = lexical::search(fts, query, fts_k)?;
    if lex_candidates.is_empty() {
        return Ok(Vec::new());
    }
    deadline.check()?;

    let snapshot = store.snapshot();
    let passages_by_id: HashMap<PassageId, &crate::store::Passage> =
        snapshot.passages.iter().map(|p| (p.id, p)).collect();
    let embeddings_by_id: HashMap<PassageId, &crate::store::Embedding> =
        snapshot.embeddings.iter().map(|e| (e.passage_id, e)).collect();

    let semantic_scores: HashMap<PassageId, f32> = match provider.embed_batch(std::slice::from_ref(&query.to_string())).await {
        Ok(mut vecs) => {
            let query_vector = vecs.remove(0);
            let pairs: Vec<(PassageId, Vec<f32>)> = lex_candidates
                .iter()
                .filter_map(|c| embeddings_by_id.get(&c.passage_id).map(|e| (c.passage_id, e.vec.clone())))
                .collect();
            semantic::rerank(&pairs, &query_vector)
                .into_iter()
                .map(|s| (s.passage_id, s.cosine_score.max(0.0)))
                .collect()
        }
        Err(e) => {
            warn!(error = %e, "embedder unavailable, falling back to lexical-only search");
            HashMap::new()
        }
    };

    let l_star = lex_candidates
        .iter()
        .map(|c| c.lexical_score)
        .fold(f32::NEG_INFINITY, f32::max);

    let mut results: Vec<HybridResult> = Vec::with_capacity(lex_candidates.len());
    for (i, c) in lex_candidates.into_iter().enumerate() {
        deadline.check_at_boundary(i + 1)?;
        let Some(passage) = passages_by_id.get(&c.passage_id) else {
            continue;
        };
        let semantic_score = semantic_scores.get(&c.passage_id).copied().unwrap_or(0.0);
        let lex_norm = (1.0 - (l_star - c.lexical_score) / FUSION_WIDTH).clamp(0.0, 1.0);
        let score = 0.5 * lex_norm + 0.5 * semantic_score;

        let strong_lex = c.lexical_score > STRONG_LEXICAL_THRESHOLD;
        let strong_sem = semantic_score > STRONG_SEMANTIC_THRESHOLD;
        let match_class = match (strong_lex, strong_sem) {
            (true, true) => MatchClass::Hybrid,
            (true, false) => MatchClass::Keyword,
            (false, true) => MatchClass::Semantic,
            (false, false) => MatchClass::Keyword,
        };

        results.push(HybridResult {
            passage_id: c.passage_id,
            file_path: passage.file_path.clone(),
            heading: passage.heading.clone(),
            preview: make_preview(&passage.content),
            score,
            lexical_score: c.lexical_score,
            semantic_score,
            match_class,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.semantic_score.partial_cmp(&a.semantic_score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.passage_id.cmp(&b.passage_id))
    });
    results.truncate(limit);
    Ok(results)
}

/// Collapse whitespace and truncate to at most [`PREVIEW_CHARS`] characters.
pub(crate) fn make_preview(content: &str) -> String {
    let collapsed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= PREVIEW_CHARS {
        collapsed
    } else {
        collapsed.chars().take(PREVIEW_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EmbedderBackend};
    use crate::embedding::mock::MockProvider;
    use crate::store::{Embedding, Passage, Store};
    use tempfile::TempDir;

    fn test_config(root: std::path::PathBuf, store_path: std::path::PathBuf, fts_dir: std::path::PathBuf) -> Config {
        Config {
            corpus_root: root,
            extensions: vec!["md".to_string()],
            store_path,
            fts_index_dir: fts_dir,
            ignore_patterns: vec![],
            embedder_backend: EmbedderBackend::Mock,
            embedder_model: "mock-embed-v1".to_string(),
            embedder_dimensions: 8,
            embedder_endpoint: None,
            embedder_api_key: None,
            embedder_batch_size: 8,
            fts_k: 50,
            cluster_k_min: 8,
            cluster_k_max: 128,
            request_deadline_ms: 5000,
            worker_concurrency: 2,
            queue_capacity_multiplier: 2,
        }
    }

    fn passage(id: PassageId, heading: Option<&str>, content: &str) -> Passage {
        Passage {
            id,
            file_path: "a.md".into(),
            heading: heading.map(String::from),
            ordinal: 0,
            content: content.to_string(),
            content_len: content.len() as u32,
        }
    }

    #[test]
    fn make_preview_collapses_whitespace_and_truncates() {
        let long = "word ".repeat(100);
        let preview = make_preview(&long);
        assert!(preview.chars().count() <= PREVIEW_CHARS);
        assert!(!preview.contains("  "));
    }

    #[tokio::test]
    async fn empty_query_returns_empty_results() {
        let work = TempDir::new().unwrap();
        let config = test_config(work.path().to_path_buf(), work.path().join("store.bin"), work.path().join("fts"));
        let store = Store::open_or_create(&config.store_path).unwrap();
        let fts = FtsIndex::open_or_create(&config.fts_index_dir).unwrap();
        let provider = MockProvider::new(8, "mock-embed-v1".into());

        let deadline = Deadline::after(std::time::Duration::from_secs(5));
        let results = search("", 10, 50, &store, &fts, &provider, &deadline).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn hybrid_match_gets_hybrid_class() {
        let work = TempDir::new().unwrap();
        let config = test_config(work.path().to_path_buf(), work.path().join("store.bin"), work.path().join("fts"));
        let store = Store::open_or_create(&config.store_path).unwrap();
        let fts = FtsIndex::open_or_create(&config.fts_index_dir).unwrap();
        let provider = MockProvider::new(8, "mock-embed-v1".into());

        let p = passage(0, Some("Rust Ownership"), "the borrow checker enforces ownership rules");
        fts.upsert_passage(&p).unwrap();
        fts.commit().unwrap();

        let mut build = store.begin_build().unwrap();
        let query_vec = provider.embed_batch(&["rust ownership".to_string()]).await.unwrap().remove(0);
        build.draft.passages.push(p);
        build.draft.embeddings.push(Embedding {
            passage_id: 0,
            model: "mock-embed-v1".to_string(),
            dims: 8,
            vec: query_vec,
        });
        build.commit().unwrap();

        let deadline = Deadline::after(std::time::Duration::from_secs(5));
        let results = search("rust ownership", 10, 50, &store, &fts, &provider, &deadline).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_class, MatchClass::Hybrid);
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn missing_passage_embedding_floors_semantic_score_to_zero() {
        let work = TempDir::new().unwrap();
        let config = test_config(work.path().to_path_buf(), work.path().join("store.bin"), work.path().join("fts"));
        let store = Store::open_or_create(&config.store_path).unwrap();
        let fts = FtsIndex::open_or_create(&config.fts_index_dir).unwrap();
        let provider = MockProvider::new(8, "mock-embed-v1".into());

        let p = passage(0, None, "no embedding exists for this one");
        fts.upsert_passage(&p).unwrap();
        fts.commit().unwrap();
        let mut build = store.begin_build().unwrap();
        build.draft.passages.push(p);
        build.commit().unwrap();

        let deadline = Deadline::after(std::time::Duration::from_secs(5));
        let results = search("embedding", 10, 50, &store, &fts, &provider, &deadline).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].semantic_score, 0.0);
        assert_eq!(results[0].match_class, MatchClass::Keyword);
    }
}
