//! Embedding gateway — the stable interface over the external embedding
//! function.
//!
//! Provides the [`EmbeddingProvider`] trait, the [`EmbeddingGateway`] wrapper
//! that applies a bounded wait plus a single retry, and a deterministic
//! feature-hashing provider for offline play and tests. The gateway caches
//! nothing; repeated identical calls are the provider's business.

pub mod hashed;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Default number of dimensions for the offline provider.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// The external embedding function: text in, fixed-dimensionality vector out.
///
/// Implementations must be deterministic for identical input within a session
/// and should produce L2-normalized vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

/// Wraps a provider with the retry discipline the pipeline relies on: every
/// call gets a bounded wait and exactly one retry before surfacing
/// [`ProviderError::EmbeddingUnavailable`].
pub struct EmbeddingGateway {
    provider: Box<dyn EmbeddingProvider>,
    call_timeout: Duration,
}

impl EmbeddingGateway {
    pub fn new(provider: Box<dyn EmbeddingProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed with one retry. After the retry fails the caller either degrades
    /// to lexical scoring (retrieve) or fails the turn (commit).
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        match self.attempt(text).await {
            Ok(vector) => Ok(vector),
            Err(first) => {
                tracing::warn!(error = %first, "embedding call failed, retrying once");
                self.attempt(text)
                    .await
                    .map_err(ProviderError::EmbeddingUnavailable)
            }
        }
    }

    async fn attempt(&self, text: &str) -> Result<Vec<f32>, String> {
        match tokio::time::timeout(self.call_timeout, self.provider.embed(text)).await {
            Ok(Ok(vector)) => Ok(vector),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!(
                "timed out after {}ms",
                self.call_timeout.as_millis()
            )),
        }
    }
}

/// Create an embedding provider from config.
///
/// `"hashed"` is the built-in deterministic provider; external model-backed
/// providers plug in through the [`EmbeddingProvider`] trait directly.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashed" => Ok(Box::new(hashed::HashedEmbeddingProvider::new(
            config.dimensions,
        ))),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: hashed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                anyhow::bail!("transient failure");
            }
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn gateway_retries_once_and_recovers() {
        let gateway = EmbeddingGateway::new(
            Box::new(FlakyProvider {
                failures: 1,
                calls: AtomicU32::new(0),
            }),
            Duration::from_secs(1),
        );
        let vector = gateway.embed("hello").await.unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn gateway_gives_up_after_second_failure() {
        let gateway = EmbeddingGateway::new(
            Box::new(FlakyProvider {
                failures: 2,
                calls: AtomicU32::new(0),
            }),
            Duration::from_secs(1),
        );
        let err = gateway.embed("hello").await;
        assert!(matches!(err, Err(ProviderError::EmbeddingUnavailable(_))));
    }

    struct StalledProvider;

    #[async_trait]
    impl EmbeddingProvider for StalledProvider {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn gateway_bounds_the_wait() {
        let gateway =
            EmbeddingGateway::new(Box::new(StalledProvider), Duration::from_millis(20));
        let err = gateway.embed("hello").await;
        assert!(matches!(err, Err(ProviderError::EmbeddingUnavailable(_))));
    }
}
