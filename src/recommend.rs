//! Recommender (§4.9): passage-level and file-level relatedness on a fixed
//! store snapshot, with no lexical component — purely cluster membership
//! or embedding-space kNN.

use std::collections::HashMap;

use serde::Serialize;

use crate::cluster::cosine_similarity;
use crate::deadline::Deadline;
use crate::error::{Error, RequestError, Result};
use crate::search::hybrid::make_preview;
use crate::store::{ClusterId, PassageId, Store};

/// Minimum number of passage-level candidates to gather before grouping by
/// file, so a file's best passage isn't missed just because it ranked
/// outside the caller's requested `k` (§4.9 File-level aggregation).
const FILE_OVERSAMPLE_FLOOR: usize = 50;
const FILE_OVERSAMPLE_MULTIPLIER: usize = 5;
const TOP_PASSAGE_IDS_PER_FILE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendMode {
    Cluster,
    Embed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    SameTopic,
    SemanticSimilarity,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedPassage {
    pub passage_id: PassageId,
    pub file_path: String,
    pub heading: Option<String>,
    pub preview: String,
    pub score: f32,
    pub reason: Reason,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedFile {
    pub file_path: String,
    pub score: f32,
    pub reason: Reason,
    pub matched_chunks: usize,
    pub top_passage_ids: Vec<PassageId>,
}

/// Passage-level relatedness, excluding `passage_id` itself.
pub fn related(
    store: &Store,
    passage_id: PassageId,
    mode: RecommendMode,
    k: usize,
    deadline: &Deadline,
) -> Result<Vec<RelatedPassage>> {
    let snapshot = store.snapshot();
    let passages_by_id: HashMap<PassageId, &crate::store::Passage> =
        snapshot.passages.iter().map(|p| (p.id, p)).collect();
    let embeddings_by_id: HashMap<PassageId, &crate::store::Embedding> =
        snapshot.embeddings.iter().map(|e| (e.passage_id, e)).collect();

    if !passages_by_id.contains_key(&passage_id) {
        return Err(Error::Request(RequestError::NotFound(format!(
            "passage {passage_id} does not exist"
        ))));
    }
    let input_embedding = embeddings_by_id.get(&passage_id).map(|e| e.vec.as_slice());

    let mut scored: Vec<(PassageId, f32)> = match mode {
        RecommendMode::Cluster => {
            let cluster_of: HashMap<PassageId, ClusterId> =
                snapshot.cluster_members.iter().map(|(cid, pid)| (*pid, *cid)).collect();
            let Some(&cluster_id) = cluster_of.get(&passage_id) else {
                return Ok(Vec::new());
            };
            let members: Vec<PassageId> = snapshot
                .cluster_members
                .iter()
                .filter(|(cid, pid)| *cid == cluster_id && *pid != passage_id)
                .map(|(_, pid)| *pid)
                .collect();

            match input_embedding {
                Some(query_vec) => members
                    .into_iter()
                    .map(|pid| {
                        let score = embeddings_by_id
                            .get(&pid)
                            .map(|e| cosine_similarity(&e.vec, query_vec))
                            .unwrap_or(0.0);
                        (pid, score)
                    })
                    .collect(),
                // No embeddings built yet: fall back to document order, rank
                // by negative ordinal so the earlier-sorting comparator below
                // (descending score) still yields ascending ordinal.
                None => members
                    .into_iter()
                    .map(|pid| {
                        let ordinal = passages_by_id.get(&pid).map(|p| p.ordinal).unwrap_or(0);
                        (pid, -(ordinal as f32))
                    })
                    .collect(),
            }
        }
        RecommendMode::Embed => {
            let Some(query_vec) = input_embedding else {
                return Err(Error::Request(RequestError::BadRequest(format!(
                    "passage {passage_id} has no embedding; run an embed build first"
                ))));
            };
            let mut positives: Vec<(PassageId, f32)> = Vec::new();
            let mut non_positives: Vec<(PassageId, f32)> = Vec::new();
            for (i, e) in snapshot.embeddings.iter().enumerate() {
                deadline.check_at_boundary(i + 1)?;
                if e.passage_id == passage_id {
                    continue;
                }
                let raw = cosine_similarity(&e.vec, query_vec);
                let clamped = raw.max(0.0);
                if clamped > 0.0 {
                    positives.push((e.passage_id, clamped));
                } else {
                    non_positives.push((e.passage_id, raw));
                }
            }
            sort_scored(&mut positives);
            if positives.len() >= k {
                positives
            } else {
                sort_scored(&mut non_positives);
                let needed = k - positives.len();
                positives.extend(non_positives.into_iter().take(needed));
                positives
            }
        }
    };

    sort_scored(&mut scored);
    scored.truncate(k);

    let reason = match mode {
        RecommendMode::Cluster => Reason::SameTopic,
        RecommendMode::Embed => Reason::SemanticSimilarity,
    };

    Ok(scored
        .into_iter()
        .filter_map(|(pid, score)| {
            let passage = passages_by_id.get(&pid)?;
            Some(RelatedPassage {
                passage_id: pid,
                file_path: passage.file_path.clone(),
                heading: passage.heading.clone(),
                preview: make_preview(&passage.content),
                score,
                reason,
            })
        })
        .collect())
}

/// File-level relatedness: the passage-level result (oversampled
/// internally) grouped by `file_path`.
pub fn related_notes(
    store: &Store,
    passage_id: PassageId,
    mode: RecommendMode,
    k: usize,
    deadline: &Deadline,
) -> Result<Vec<RelatedFile>> {
    let oversample_k = (FILE_OVERSAMPLE_MULTIPLIER * k).max(FILE_OVERSAMPLE_FLOOR);
    let candidates = related(store, passage_id, mode, oversample_k, deadline)?;

    let mut by_file: HashMap<String, Vec<&RelatedPassage>> = HashMap::new();
    for c in &candidates {
        by_file.entry(c.file_path.clone()).or_default().push(c);
    }

    let mut grouped: Vec<(RelatedFile, PassageId)> = by_file
        .into_iter()
        .map(|(file_path, mut passages)| {
            passages.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.passage_id.cmp(&b.passage_id))
            });
            let best = passages[0];
            let min_passage_id = passages.iter().map(|p| p.passage_id).min().unwrap_or(PassageId::MAX);
            let top_passage_ids = passages
                .iter()
                .take(TOP_PASSAGE_IDS_PER_FILE)
                .map(|p| p.passage_id)
                .collect();
            (
                RelatedFile {
                    file_path,
                    score: best.score,
                    reason: best.reason,
                    matched_chunks: passages.len(),
                    top_passage_ids,
                },
                min_passage_id,
            )
        })
        .collect();

    grouped.sort_by(|(a, a_min), (b, b_min)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.matched_chunks.cmp(&a.matched_chunks))
            .then_with(|| a_min.cmp(b_min))
    });
    grouped.truncate(k);
    Ok(grouped.into_iter().map(|(f, _)| f).collect())
}

fn sort_scored(pairs: &mut [(PassageId, f32)]) {
    pairs.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}
