//! Memory manager — the single owner of the working-memory window and the
//! only writer to the fact ledger.
//!
//! `retrieve` is read-only: it classifies scope hints, queries a candidate
//! pool per scope, scores each pool, and snapshots the window. `commit` is
//! the one mutating entry point: it extracts facts from the finalized turn
//! and appends them, together with the turn-counter advance, inside a single
//! transaction; the window is touched only after that transaction lands.

use rusqlite::Connection;
use thiserror::Error;

use crate::embedding::EmbeddingGateway;
use crate::error::{MemoryError, ProviderError};
use crate::extract::{FactExtractor, ScopeClassifier};
use crate::memory::score::{rank_facts, ScoreQuery, ScoringWeights};
use crate::memory::store;
use crate::memory::types::{
    FactId, RetrievalResult, ScopedRecall, Scope, TurnEntry,
};
use crate::memory::window::WorkingMemory;

/// Failure of the commit path. Provider failures fail the turn; memory
/// errors are either caller bugs or database faults. Both roll back.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Knobs for the retrieval path.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    /// Results kept per scope after scoring.
    pub top_k: usize,
    /// Candidate pool fetched per scope before scoring. Bounds scoring cost
    /// independent of total ledger size.
    pub candidate_pool: usize,
}

/// Receipt from a successful commit.
#[derive(Debug)]
pub struct CommitReceipt {
    pub turn: u64,
    pub appended: Vec<FactId>,
}

pub struct MemoryManager {
    conn: Connection,
    window: WorkingMemory,
    embedding: EmbeddingGateway,
    extractor: Box<dyn FactExtractor>,
    classifier: Box<dyn ScopeClassifier>,
    weights: ScoringWeights,
    retrieval: RetrievalSettings,
}

impl MemoryManager {
    pub fn new(
        conn: Connection,
        window_capacity: usize,
        embedding: EmbeddingGateway,
        extractor: Box<dyn FactExtractor>,
        classifier: Box<dyn ScopeClassifier>,
        weights: ScoringWeights,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self {
            conn,
            window: WorkingMemory::new(window_capacity),
            embedding,
            extractor,
            classifier,
            weights,
            retrieval,
        }
    }

    /// Number of the last committed turn, restored from the ledger on open.
    pub fn committed_turn(&self) -> Result<u64, MemoryError> {
        store::turn_counter(&self.conn)
    }

    /// Scored retrieval for one turn. Never mutates state.
    ///
    /// Queries the world partition plus every scope the classifier hints at.
    /// If embedding is unavailable after its single retry, scoring degrades
    /// to lexical overlap rather than failing the turn.
    pub async fn retrieve(
        &self,
        player_input: &str,
        current_turn: u64,
    ) -> Result<RetrievalResult, MemoryError> {
        let mut scopes: Vec<Scope> = vec![Scope::World];
        for hint in self.classifier.classify(player_input) {
            if !scopes.contains(&hint) {
                scopes.push(hint);
            }
        }

        let (query, degraded) = match self.embedding.embed(player_input).await {
            Ok(embedding) => (ScoreQuery::Semantic { embedding }, false),
            Err(err) => {
                tracing::warn!(error = %err, "degrading to lexical-only scoring");
                (
                    ScoreQuery::Lexical {
                        text: player_input.to_string(),
                    },
                    true,
                )
            }
        };

        let mut sections = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let pool =
                store::query_pool(&self.conn, Some(&scope), self.retrieval.candidate_pool)?;
            let facts = rank_facts(
                &query,
                pool,
                current_turn,
                self.retrieval.top_k,
                &self.weights,
            )?;
            tracing::debug!(scope = %scope, retrieved = facts.len(), "scope retrieval");
            sections.push(ScopedRecall {
                scope: Some(scope),
                facts,
            });
        }

        Ok(RetrievalResult {
            sections,
            window: self.window.snapshot(),
            degraded,
        })
    }

    /// Commit a finalized turn: extract facts, append them, and advance the
    /// turn counter in one transaction, then update the window.
    ///
    /// A failure at any point leaves ledger, counter, and window exactly as
    /// they were — the turn never half-lands.
    pub async fn commit(&mut self, record: TurnEntry) -> Result<CommitReceipt, CommitError> {
        let committed = store::turn_counter(&self.conn)?;
        if record.turn != committed + 1 {
            return Err(MemoryError::InvalidQuery(format!(
                "commit for turn {} but last committed turn is {committed}",
                record.turn
            ))
            .into());
        }

        let drafts = self.extractor.extract(&record.player_input, &record.narrative);

        // Embeddings are fetched before the transaction opens; an embedding
        // failure here fails the turn with nothing written.
        let mut embedded = Vec::with_capacity(drafts.len());
        for draft in &drafts {
            embedded.push(self.embedding.embed(&draft.text).await?);
        }

        let tx = self.conn.transaction().map_err(MemoryError::from)?;
        let mut appended = Vec::with_capacity(drafts.len());
        for (draft, embedding) in drafts.iter().zip(embedded.iter()) {
            let fact = store::append_fact(&tx, draft, embedding, record.turn)?;
            appended.push(fact.id);
        }
        store::set_turn_counter(&tx, record.turn)?;
        tx.commit().map_err(MemoryError::from)?;

        tracing::info!(turn = record.turn, facts = appended.len(), "turn committed");
        self.window.push(record.clone());

        Ok(CommitReceipt {
            turn: record.turn,
            appended,
        })
    }

    /// Raise a fact's importance on an explicit salience signal. The manager
    /// is the only component allowed to do this.
    pub fn revise_importance(
        &mut self,
        fact_id: &FactId,
        new_importance: f64,
    ) -> Result<(), MemoryError> {
        store::revise_importance(&self.conn, fact_id, new_importance)
    }

    /// Consolidate repeated mentions — see [`crate::memory::maintenance`].
    pub fn consolidate_duplicates(
        &mut self,
    ) -> Result<crate::memory::maintenance::ConsolidateResult, MemoryError> {
        crate::memory::maintenance::consolidate_duplicates(&self.conn)
    }

    /// Summarize the oldest world facts — see [`crate::memory::maintenance`].
    pub async fn summarize_old_facts(
        &mut self,
        generator: &crate::generate::GenerateGateway,
        config: &crate::config::MaintenanceConfig,
        current_turn: u64,
    ) -> Result<Option<FactId>, CommitError> {
        crate::memory::maintenance::summarize_old_facts(
            &mut self.conn,
            &self.embedding,
            generator,
            config,
            current_turn,
        )
        .await
    }

    /// Read-only view of the ledger connection, for stats display.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Current working-memory occupancy (diagnostics).
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
