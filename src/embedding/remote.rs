use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, SearchError};

use super::provider::{normalize, EmbeddingProvider};

/// Retries on transient (5xx) failures before giving up.
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// An OpenAI-compatible remote embedding API (§4.3): batched, with retry on
/// transient 5xx responses, preserving input order.
pub struct RemoteProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl RemoteProvider {
    pub fn new(endpoint: String, api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            dimensions,
        }
    }

    async fn post_with_retry(&self, request: &EmbedRequest<'_>) -> crate::Result<EmbedResponse> {
        let mut attempt = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<EmbedResponse>()
                        .await
                        .map_err(|e| Error::Search(SearchError::EmbedderUnavailable(e.to_string())));
                }
                Ok(resp) if resp.status().is_server_error() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(
                        status = %resp.status(),
                        attempt,
                        "remote embedder returned a transient error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Ok(resp) => {
                    return Err(Error::Search(SearchError::EmbedderUnavailable(format!(
                        "remote embedder returned HTTP {}",
                        resp.status()
                    ))));
                }
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "remote embedder request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    return Err(Error::Search(SearchError::EmbedderUnavailable(e.to_string())));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let body = self.post_with_retry(&request).await?;

        if body.data.len() != texts.len() {
            return Err(Error::Search(SearchError::EmbedderUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            ))));
        }

        let mut vectors: Vec<Vec<f32>> = body.data.into_iter().map(|d| d.embedding).collect();
        for vec in &mut vectors {
            normalize(vec);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}
