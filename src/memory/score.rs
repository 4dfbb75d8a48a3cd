//! Relevance scoring — weighted combination of semantic similarity,
//! recency decay, and importance.
//!
//! `score = α·similarity + β·recency + γ·importance` with weights summing
//! to 1. Similarity is cosine, clamped to `[0, 1]`; recency is an exponential
//! decay over turn age, so very old facts contribute negligibly regardless of
//! importance. When the embedding collaborator is down the semantic term is
//! replaced by a lexical token-overlap ratio with the same weights.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::{ConfigError, MemoryError};
use crate::memory::types::{Fact, ScoredFact};

/// Two scores closer than this are ties; the more recent fact wins.
const SCORE_EPSILON: f64 = 1e-9;

/// Scoring weights and decay constant. Loaded from config and validated
/// before any query runs.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Weight of the semantic (or lexical fallback) term.
    pub alpha: f64,
    /// Weight of the recency term.
    pub beta: f64,
    /// Weight of the importance term.
    pub gamma: f64,
    /// Exponential decay constant applied per turn of age. Must be positive.
    pub decay_lambda: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            beta: 0.3,
            gamma: 0.1,
            decay_lambda: 0.05,
        }
    }
}

impl ScoringWeights {
    /// Reject weights that do not sum to 1 and non-positive decay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.alpha + self.beta + self.gamma;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::WeightsNotNormalized { sum });
        }
        if self.decay_lambda <= 0.0 {
            return Err(ConfigError::NonPositiveDecay(self.decay_lambda));
        }
        Ok(())
    }

    /// `exp(-λ · age_in_turns)` — 1.0 for a fact created this turn.
    pub fn recency_factor(&self, current_turn: u64, created_turn: u64) -> f64 {
        let age = current_turn.saturating_sub(created_turn) as f64;
        (-self.decay_lambda * age).exp()
    }
}

/// The query side of a scoring pass.
///
/// `Semantic` is the normal path; `Lexical` is the degraded path used after
/// the embedding gateway has failed its single retry.
#[derive(Debug, Clone)]
pub enum ScoreQuery {
    Semantic { embedding: Vec<f32> },
    Lexical { text: String },
}

/// Cosine similarity clamped to `[0, 1]` — negative similarity maps to 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Normalized lexical overlap between two texts: Jaccard over lowercase
/// alphanumeric tokens. Used as the degraded-mode similarity term.
pub fn lexical_overlap(query: &str, text: &str) -> f64 {
    let query_tokens = tokenize(query);
    let fact_tokens = tokenize(text);
    if query_tokens.is_empty() || fact_tokens.is_empty() {
        return 0.0;
    }
    let intersection = query_tokens.intersection(&fact_tokens).count() as f64;
    let union = query_tokens.union(&fact_tokens).count() as f64;
    intersection / union
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Score a candidate pool against one query and return the top-k, sorted
/// descending. Ties within epsilon break toward the larger `created_turn`.
///
/// `k` must be at least 1; the candidates are assumed to be pre-filtered by
/// scope (that is the store's job, not the scorer's).
pub fn rank_facts(
    query: &ScoreQuery,
    candidates: Vec<Fact>,
    current_turn: u64,
    k: usize,
    weights: &ScoringWeights,
) -> Result<Vec<ScoredFact>, MemoryError> {
    if k == 0 {
        return Err(MemoryError::InvalidQuery(
            "top-k must be at least 1".into(),
        ));
    }

    let mut scored: Vec<ScoredFact> = candidates
        .into_iter()
        .map(|fact| {
            let similarity = match query {
                ScoreQuery::Semantic { embedding } => {
                    cosine_similarity(embedding, &fact.embedding)
                }
                ScoreQuery::Lexical { text } => lexical_overlap(text, &fact.text),
            };
            let recency = weights.recency_factor(current_turn, fact.created_turn);
            let score = weights.alpha * similarity
                + weights.beta * recency
                + weights.gamma * fact.importance;
            ScoredFact {
                fact,
                score,
                similarity,
                recency,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        if (a.score - b.score).abs() <= SCORE_EPSILON {
            b.fact.created_turn.cmp(&a.fact.created_turn)
        } else {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        }
    });
    scored.truncate(k);
    Ok(scored)
}
