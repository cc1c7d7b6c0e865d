//! Batched embed-build orchestration (§4.2 "offline embed build").

use serde::Serialize;

use crate::store::PassageId;

use super::provider::EmbeddingProvider;

/// One passage queued for embedding.
#[derive(Debug, Clone)]
pub struct EmbedItem {
    pub passage_id: PassageId,
    pub content: String,
}

/// Result of a batch embedding run.
#[derive(Debug, Serialize)]
pub struct BatchResult {
    /// `(passage_id, vector)` pairs, in the same order as the input items.
    pub embeddings: Vec<(PassageId, Vec<f32>)>,
    /// Number of provider calls made.
    pub api_calls: usize,
}

/// Embed `items` through `provider`, splitting into batches of `batch_size`
/// and running up to `concurrency` batches at once. Input order is preserved
/// in the result regardless of which batch finishes first.
pub async fn embed_items(
    provider: &dyn EmbeddingProvider,
    items: &[EmbedItem],
    batch_size: usize,
    concurrency: usize,
) -> crate::Result<BatchResult> {
    if items.is_empty() {
        return Ok(BatchResult {
            embeddings: Vec::new(),
            api_calls: 0,
        });
    }

    let batches: Vec<&[EmbedItem]> = items.chunks(batch_size.max(1)).collect();
    let total_batches = batches.len();
    tracing::info!(
        items = items.len(),
        batches = total_batches,
        batch_size,
        "embedding items"
    );

    use futures::stream::{self, StreamExt};

    type Indexed = crate::Result<(usize, Vec<(PassageId, Vec<f32>)>)>;
    let stream = stream::iter(batches.into_iter().enumerate().map(|(batch_idx, batch)| async move {
        let texts: Vec<String> = batch.iter().map(|i| i.content.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        let pairs: Vec<(PassageId, Vec<f32>)> = batch
            .iter()
            .map(|i| i.passage_id)
            .zip(vectors)
            .collect();
        let result: Indexed = Ok((batch_idx, pairs));
        result
    }))
    .buffer_unordered(concurrency.max(1));

    let mut ordered: Vec<Option<Vec<(PassageId, Vec<f32>)>>> = vec![None; total_batches];
    let mut api_calls = 0usize;

    let mut stream = Box::pin(stream);
    while let Some(result) = stream.next().await {
        let (batch_idx, pairs) = result?;
        api_calls += 1;
        ordered[batch_idx] = Some(pairs);
    }

    let embeddings = ordered.into_iter().flatten().flatten().collect();

    tracing::info!(api_calls, "embedding batch complete");

    Ok(BatchResult {
        embeddings,
        api_calls,
    })
}
