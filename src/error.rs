//! Error taxonomy for the memory engine.
//!
//! Splits failures along the line that matters to the turn pipeline:
//! [`MemoryError`] values are local contract violations (bad top-k, importance
//! decrease, unknown id) that the caller of retrieve/commit must fix directly,
//! while [`ProviderError`] values are external dependency failures that roll
//! the turn back and surface as a structured turn failure.

use thiserror::Error;

use crate::memory::types::FactId;

/// Local errors from the fact store and scorer. Never reported as turn
/// failures — a caller hitting one of these has a bug.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Malformed retrieval query, e.g. a non-positive top-k.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Importance revisions are monotonic-increase only.
    #[error("invalid revision: importance {requested} is below current {current}")]
    InvalidRevision { current: f64, requested: f64 },

    /// Unknown fact id.
    #[error("fact not found: {0}")]
    NotFound(FactId),

    /// An embedding's dimensionality does not match the store-wide setting.
    #[error("embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Underlying database fault.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// External collaborator failures. The gateway retries each call once before
/// producing one of these; the pipeline then fails the turn atomically.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The embedding function errored or timed out, including the retry.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The generation function errored or timed out, including the retry.
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),
}

/// Configuration rejected at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Scoring weights must sum to 1.
    #[error("scoring weights sum to {sum}, expected 1.0")]
    WeightsNotNormalized { sum: f64 },

    /// Recency decay constant must be positive.
    #[error("decay constant must be > 0, got {0}")]
    NonPositiveDecay(f64),

    /// Retrieval top-k must be at least 1.
    #[error("top_k must be >= 1, got {0}")]
    InvalidTopK(usize),

    /// Working-memory capacity must be at least 1.
    #[error("window capacity must be >= 1, got {0}")]
    InvalidWindowCapacity(usize),

    /// Maintenance interval must be at least 1 turn.
    #[error("maintenance summary_interval must be >= 1")]
    InvalidSummaryInterval,
}
