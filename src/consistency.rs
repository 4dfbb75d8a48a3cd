//! Consistency checking — the lore keeper pass between retrieval and
//! generation.
//!
//! The contradiction rules themselves are a pluggable policy, not fixed
//! here: a [`LorePolicy`] receives the retrieved facts and the proposed beat
//! and returns a [`Verdict`]. What IS fixed is how the pipeline reacts:
//! `Flagged` annotates the generation prompt and never blocks the turn.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::generate::GenerateGateway;
use crate::memory::types::RetrievalResult;

/// Outcome of a consistency review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Consistent,
    Flagged { reason: String },
}

impl Verdict {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Flagged { .. })
    }
}

/// Contradiction-detection policy over retrieved facts and a draft beat.
#[async_trait]
pub trait LorePolicy: Send + Sync {
    async fn review(
        &self,
        retrieval: &RetrievalResult,
        proposed_beat: &str,
    ) -> Result<Verdict, ProviderError>;
}

/// Default policy: trusts the scorer and never flags. Useful when no lore
/// model is wired in and for tests that exercise the rest of the pipeline.
pub struct PermissivePolicy;

#[async_trait]
impl LorePolicy for PermissivePolicy {
    async fn review(
        &self,
        _retrieval: &RetrievalResult,
        _proposed_beat: &str,
    ) -> Result<Verdict, ProviderError> {
        Ok(Verdict::Consistent)
    }
}

/// Reference policy backed by the generation provider: lists the established
/// facts next to the proposed beat at low temperature and parses a
/// CONSISTENT / INCONSISTENT answer.
pub struct ModelBackedPolicy {
    generator: std::sync::Arc<GenerateGateway>,
}

const REVIEW_TEMPERATURE: f64 = 0.2;
const REVIEW_MAX_TOKENS: usize = 150;

impl ModelBackedPolicy {
    pub fn new(generator: std::sync::Arc<GenerateGateway>) -> Self {
        Self { generator }
    }

    fn build_prompt(retrieval: &RetrievalResult, proposed_beat: &str) -> String {
        let mut prompt = String::from("Established facts:\n");
        for scored in retrieval.ranked_facts() {
            prompt.push_str(&format!("- {}\n", scored.fact.text));
        }
        prompt.push_str(&format!(
            "\nProposed narrative beat:\n{proposed_beat}\n\n\
             Check if the proposed beat contradicts any established fact. Respond with:\n\
             - \"CONSISTENT\" if no contradictions\n\
             - \"INCONSISTENT: [explanation]\" if contradictions exist\n\nResponse:"
        ));
        prompt
    }
}

#[async_trait]
impl LorePolicy for ModelBackedPolicy {
    async fn review(
        &self,
        retrieval: &RetrievalResult,
        proposed_beat: &str,
    ) -> Result<Verdict, ProviderError> {
        if retrieval.fact_count() == 0 {
            return Ok(Verdict::Consistent);
        }
        let prompt = Self::build_prompt(retrieval, proposed_beat);
        let answer = self
            .generator
            .generate(&prompt, REVIEW_TEMPERATURE, REVIEW_MAX_TOKENS)
            .await?;
        Ok(parse_verdict(&answer))
    }
}

fn parse_verdict(answer: &str) -> Verdict {
    let trimmed = answer.trim();
    if trimmed.to_uppercase().contains("INCONSISTENT") {
        let reason = trimmed
            .splitn(2, ':')
            .nth(1)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("contradiction detected")
            .to_string();
        Verdict::Flagged { reason }
    } else {
        Verdict::Consistent
    }
}
