//! Memory-driven narrative engine for interactive storytelling.
//!
//! Chronicler keeps a story coherent across dozens of turns by combining a
//! bounded working-memory window with scored retrieval over a durable,
//! append-only store of narrative facts. Each fact lives in a scope
//! partition (world, one NPC, or one location) and is ranked per query by
//!
//! ```text
//! score = α·semantic_similarity + β·recency_decay + γ·importance
//! ```
//!
//! with an exponential recency decay over turn age. A turn runs through a
//! fixed state machine — retrieve, consistency-check, generate, commit —
//! and either lands atomically or fails atomically, leaving the ledger and
//! the window untouched.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (append-only `facts` ledger + audit log), embeddings
//!   stored inline as BLOBs; scoring runs in-process over a bounded
//!   candidate pool per scope
//! - **Collaborators**: embedding, generation, fact extraction, and scope
//!   classification are trait objects; deterministic offline implementations
//!   ship for the demo loop and tests
//! - **Resilience**: every external call gets a bounded wait and one retry;
//!   retrieval degrades to lexical scoring when embedding is down, and a
//!   failed turn rolls back completely
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite database initialization and schema
//! - [`embedding`] — Embedding gateway and the offline hashed provider
//! - [`generate`] — Generation gateway and the offline improv narrator
//! - [`extract`] — Fact extraction and scope classification heuristics
//! - [`consistency`] — Pluggable lore-consistency policies
//! - [`memory`] — Fact ledger, relevance scorer, working memory, manager
//! - [`pipeline`] — The per-turn state machine

pub mod config;
pub mod consistency;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod memory;
pub mod pipeline;
