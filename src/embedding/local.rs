use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, SearchError};

use super::provider::{normalize, EmbeddingProvider};

const DEFAULT_HOST: &str = "http://localhost:11434";

/// A local small-model embedding backend, reached over HTTP (e.g. an
/// Ollama-style daemon running on the same machine). Offline, CPU-acceptable,
/// and — unlike the remote backend — not rate-limited, so no retry policy.
pub struct LocalProvider {
    client: reqwest::Client,
    host: String,
    model: String,
    dimensions: usize,
}

impl LocalProvider {
    pub fn new(model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            host: DEFAULT_HOST.to_string(),
            model,
            dimensions,
        }
    }

    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| Error::Search(SearchError::EmbedderUnavailable(e.to_string())))?;

        if !response.status().is_success() {
            return Err(Error::Search(SearchError::EmbedderUnavailable(format!(
                "local embedder returned HTTP {}",
                response.status()
            ))));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Search(SearchError::EmbedderUnavailable(e.to_string())))?;

        if body.embeddings.len() != texts.len() {
            return Err(Error::Search(SearchError::EmbedderUnavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            ))));
        }

        let mut vectors = body.embeddings;
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
