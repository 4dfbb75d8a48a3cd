//! Narrative generation gateway.
//!
//! [`GenerateProvider`] is the opaque external text generator; the
//! [`GenerateGateway`] applies the same bounded-wait-plus-one-retry
//! discipline as the embedding gateway before surfacing
//! [`ProviderError::GenerationUnavailable`]. The built-in [`improv`] backend
//! is a deterministic offline narrator for the demo loop and tests.

pub mod improv;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;

/// The external generation function: prompt and sampling temperature in,
/// narrative text out.
#[async_trait]
pub trait GenerateProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: usize,
    ) -> anyhow::Result<String>;
}

/// Wraps a provider with a bounded wait and exactly one retry.
pub struct GenerateGateway {
    provider: Box<dyn GenerateProvider>,
    call_timeout: Duration,
}

impl GenerateGateway {
    pub fn new(provider: Box<dyn GenerateProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    /// Generate with one retry, then fail the call.
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: usize,
    ) -> Result<String, ProviderError> {
        match self.attempt(prompt, temperature, max_tokens).await {
            Ok(text) => Ok(text),
            Err(first) => {
                tracing::warn!(error = %first, "generation call failed, retrying once");
                self.attempt(prompt, temperature, max_tokens)
                    .await
                    .map_err(ProviderError::GenerationUnavailable)
            }
        }
    }

    async fn attempt(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: usize,
    ) -> Result<String, String> {
        let call = self.provider.generate(prompt, temperature, max_tokens);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!(
                "timed out after {}ms",
                self.call_timeout.as_millis()
            )),
        }
    }
}

/// Create a generation provider from config.
///
/// `"improv"` is the built-in deterministic narrator; model-backed providers
/// plug in through the [`GenerateProvider`] trait directly.
pub fn create_provider(
    config: &crate::config::GenerationConfig,
) -> anyhow::Result<Box<dyn GenerateProvider>> {
    match config.provider.as_str() {
        "improv" => Ok(Box::new(improv::ImprovNarrator::new())),
        other => anyhow::bail!("unknown generation provider: {other}. Supported: improv"),
    }
}
