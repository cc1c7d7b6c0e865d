//! Cluster-suggest / topic routing (§4.7): which existing clusters a query
//! is "about", ranked by how strongly its top lexical+semantic matches
//! concentrate in each cluster.

use std::collections::HashMap;

use serde::Serialize;

use crate::deadline::Deadline;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::fts::FtsIndex;
use crate::store::{ClusterId, PassageId, Store};

use super::{lexical, semantic};

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSuggestion {
    pub cluster_id: ClusterId,
    pub name: String,
    pub score: f32,
}

/// Suggest the clusters most relevant to `query`: lexical retrieve →
/// semantic rerank → group matches by cluster membership → harmonic
/// rank-weighted mean per cluster → min-max normalize → top `limit`.
pub async fn suggest(
    query: &str,
    limit: usize,
    fts_k: usize,
    store: &Store,
    fts: &FtsIndex,
    provider: &dyn EmbeddingProvider,
    deadline: &Deadline,
) -> Result<Vec<ClusterSuggestion>> {
    let lex_candidates = lexical::search(fts, query, fts_k)?;
    if lex_candidates.is_empty() {
        return Ok(Vec::new());
    }
    deadline.check()?;

    let snapshot = store.snapshot();
    let embeddings_by_id: HashMap<PassageId, &crate::store::Embedding> =
        snapshot.embeddings.iter().map(|e| (e.passage_id, e)).collect();
    let cluster_of: HashMap<PassageId, ClusterId> =
        snapshot.cluster_members.iter().map(|(cid, pid)| (*pid, *cid)).collect();
    let names: HashMap<ClusterId, &str> = snapshot.clusters.iter().map(|c| (c.id, c.name.as_str())).collect();

    let query_vector = provider.embed_batch(std::slice::from_ref(&query.to_string())).await?.remove(0);
    let pairs: Vec<(PassageId, Vec<f32>)> = lex_candidates
        .iter()
        .filter_map(|c| embeddings_by_id.get(&c.passage_id).map(|e| (c.passage_id, e.vec.clone())))
        .collect();
    let ranked = semantic::rerank(&pairs, &query_vector);

    struct Accum {
        weighted_sum: f32,
        weight_total: f32,
        member_count: usize,
    }

    let mut by_cluster: HashMap<ClusterId, Accum> = HashMap::new();
    for (rank, candidate) in ranked.iter().enumerate() {
        deadline.check_at_boundary(rank + 1)?;
        let Some(&cluster_id) = cluster_of.get(&candidate.passage_id) else {
            continue;
        };
        let weight = 1.0 / (rank as f32 + 1.0);
        let entry = by_cluster.entry(cluster_id).or_insert(Accum {
            weighted_sum: 0.0,
            weight_total: 0.0,
            member_count: 0,
        });
        entry.weighted_sum += candidate.cosine_score * weight;
        entry.weight_total += weight;
        entry.member_count += 1;
    }

    if by_cluster.is_empty() {
        return Ok(Vec::new());
    }

    let raw: Vec<(ClusterId, f32, usize)> = by_cluster
        .into_iter()
        .map(|(cid, acc)| (cid, acc.weighted_sum / acc.weight_total, acc.member_count))
        .collect();

    let min = raw.iter().map(|(_, s, _)| *s).fold(f32::INFINITY, f32::min);
    let max = raw.iter().map(|(_, s, _)| *s).fold(f32::NEG_INFINITY, f32::max);
    let spread = max - min;

    let has_two_plus: HashMap<ClusterId, bool> = raw
        .iter()
        .map(|(cluster_id, _, member_count)| (*cluster_id, *member_count >= 2))
        .collect();

    let mut suggestions: Vec<ClusterSuggestion> = raw
        .into_iter()
        .map(|(cluster_id, raw_score, _)| {
            let normalized = if spread > 0.0 { (raw_score - min) / spread } else { 1.0 };
            ClusterSuggestion {
                cluster_id,
                name: names.get(&cluster_id).copied().unwrap_or("Unlabeled").to_string(),
                score: normalized,
            }
        })
        .collect();

    suggestions.sort_by(|a, b| {
        let a_ge2 = has_two_plus.get(&a.cluster_id).copied().unwrap_or(false);
        let b_ge2 = has_two_plus.get(&b.cluster_id).copied().unwrap_or(false);
        b_ge2
            .cmp(&a_ge2)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.cluster_id.cmp(&b.cluster_id))
    });
    suggestions.truncate(limit);
    Ok(suggestions)
}
