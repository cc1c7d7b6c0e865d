//! Lexical searcher (§4.4): a thin wrapper over the Tantivy-backed
//! [`FtsIndex`], returning candidates in the order the index already
//! produces them (best first).

use crate::error::Result;
use crate::fts::FtsIndex;
use crate::store::PassageId;

/// A lexical match: `lexical_score` is the raw BM25-class score from the
/// index (higher/less-negative is a better match — see
/// [`crate::search::hybrid`] for how it's combined with semantic scores).
#[derive(Debug, Clone)]
pub struct LexicalCandidate {
    pub passage_id: PassageId,
    pub lexical_score: f32,
}

/// Search the lexical index for up to `fts_k` candidates. Returns the empty
/// list for an empty query or an empty index (§4.4 Failure) — never an error.
pub fn search(fts: &FtsIndex, query: &str, fts_k: usize) -> Result<Vec<LexicalCandidate>> {
    let hits = fts.search(query, fts_k)?;
    Ok(hits
        .into_iter()
        .map(|h| LexicalCandidate {
            passage_id: h.passage_id,
            lexical_score: h.score,
        })
        .collect())
}
