use async_trait::async_trait;

use crate::config::{Config, EmbedderBackend};
use crate::error::{Error, SearchError};

use super::local::LocalProvider;
use super::mock::MockProvider;
use super::remote::RemoteProvider;

/// A capability that maps passage (or query) text to unit-norm vectors (§4.3).
///
/// All vectors returned by a single call share the adapter's `dimensions()`
/// and are L2-normalized; implementations must preserve input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one unit-norm vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>>;

    /// The dimensionality of the embedding vectors produced.
    fn dimensions(&self) -> usize;

    /// Human-readable name for this provider, used as the stored model id.
    fn name(&self) -> &str;
}

/// Create an embedding provider based on the current configuration.
pub fn create_provider(config: &Config) -> crate::Result<Box<dyn EmbeddingProvider>> {
    match config.embedder_backend {
        EmbedderBackend::Mock => Ok(Box::new(MockProvider::new(
            config.embedder_dimensions,
            config.embedder_model.clone(),
        ))),
        EmbedderBackend::Local => {
            let provider = LocalProvider::new(config.embedder_model.clone(), config.embedder_dimensions);
            let provider = match &config.embedder_endpoint {
                Some(host) => provider.with_host(host.clone()),
                None => provider,
            };
            Ok(Box::new(provider))
        }
        EmbedderBackend::Remote => {
            let api_key = config.embedder_api_key.clone().ok_or_else(|| {
                Error::Search(SearchError::EmbedderUnavailable(
                    "remote backend requires MDVDB_EMBEDDER_API_KEY".into(),
                ))
            })?;
            let endpoint = config.embedder_endpoint.clone().ok_or_else(|| {
                Error::Search(SearchError::EmbedderUnavailable(
                    "remote backend requires MDVDB_EMBEDDER_ENDPOINT".into(),
                ))
            })?;
            Ok(Box::new(RemoteProvider::new(
                endpoint,
                api_key,
                config.embedder_model.clone(),
                config.embedder_dimensions,
            )))
        }
    }
}

/// L2-normalize a vector in place. A zero vector is left as-is (the mock and
/// local backends never produce one; a defensive guard for pathological
/// remote responses).
pub fn normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}
