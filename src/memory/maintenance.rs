//! Ledger maintenance — summarization of old facts and consolidation of
//! repeated mentions.
//!
//! Both passes are optional and non-fatal: the pipeline runs them after a
//! committed turn when enabled, logging failures instead of surfacing them.
//! Summaries supersede their originals; consolidation only revises
//! importance, never removes a duplicate.

use rusqlite::Connection;
use serde::Serialize;

use crate::config::MaintenanceConfig;
use crate::embedding::EmbeddingGateway;
use crate::error::MemoryError;
use crate::generate::GenerateGateway;
use crate::memory::manager::CommitError;
use crate::memory::store;
use crate::memory::types::{FactDraft, FactId, Scope};

/// Importance assigned to summary facts.
const SUMMARY_IMPORTANCE: f64 = 0.9;

/// Importance bump per extra mention of the same statement.
const MENTION_BUMP: f64 = 0.1;

const SUMMARY_TEMPERATURE: f64 = 0.3;
const SUMMARY_MAX_TOKENS: usize = 200;

#[derive(Debug, Serialize)]
pub struct ConsolidateResult {
    pub groups: usize,
    pub revised: usize,
}

/// Bump the importance of the earliest fact in every group of repeated
/// mentions (same scope, same normalized text), +0.1 per extra mention,
/// capped at 1.0. Duplicates stay in the ledger — they remain independently
/// scorable.
pub fn consolidate_duplicates(conn: &Connection) -> Result<ConsolidateResult, MemoryError> {
    struct Group {
        earliest_id: String,
        earliest_importance: f64,
        mentions: u64,
    }

    let groups: Vec<Group> = {
        let mut stmt = conn.prepare(
            "SELECT id, importance, cnt FROM ( \
               SELECT id, importance, created_turn, \
                      COUNT(*) OVER (PARTITION BY scope_kind, scope_ref, LOWER(TRIM(text))) AS cnt, \
                      ROW_NUMBER() OVER (PARTITION BY scope_kind, scope_ref, LOWER(TRIM(text)) \
                                         ORDER BY created_turn ASC, id ASC) AS rn \
               FROM facts WHERE superseded_by IS NULL \
             ) WHERE cnt > 1 AND rn = 1",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Group {
                earliest_id: row.get(0)?,
                earliest_importance: row.get(1)?,
                mentions: row.get::<_, i64>(2)? as u64,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let mut revised = 0;
    for group in &groups {
        let extra_mentions = group.mentions.saturating_sub(1) as f64;
        let target =
            (group.earliest_importance + MENTION_BUMP * extra_mentions).min(1.0);
        if target > group.earliest_importance {
            store::revise_importance(conn, &FactId(group.earliest_id.clone()), target)?;
            revised += 1;
        }
    }

    if !groups.is_empty() {
        tracing::info!(groups = groups.len(), revised, "consolidated repeated mentions");
    }
    Ok(ConsolidateResult {
        groups: groups.len(),
        revised,
    })
}

/// When the active world partition has grown past the configured threshold,
/// fold its oldest facts into one high-importance summary fact and supersede
/// the originals.
///
/// The summary text comes from the generation provider; generation and
/// embedding happen before the transaction opens, so a provider failure
/// writes nothing.
pub async fn summarize_old_facts(
    conn: &mut Connection,
    embedding: &EmbeddingGateway,
    generator: &GenerateGateway,
    config: &MaintenanceConfig,
    current_turn: u64,
) -> Result<Option<FactId>, CommitError> {
    let oldest = store::query_pool(conn, Some(&Scope::World), usize::MAX >> 1)
        .map_err(CommitError::Memory)?;
    if oldest.len() <= config.old_threshold {
        return Ok(None);
    }

    let batch: Vec<_> = oldest.into_iter().take(config.old_threshold).collect();

    let mut prompt = String::from(
        "Summarize the following events into a concise paragraph that captures the key facts:\n\n",
    );
    for fact in &batch {
        prompt.push_str(&format!("- {}\n", fact.text));
    }
    prompt.push_str("\nSummary:");

    let summary = generator
        .generate(&prompt, SUMMARY_TEMPERATURE, SUMMARY_MAX_TOKENS)
        .await?;
    let summary = summary.trim().to_string();
    let vector = embedding.embed(&summary).await?;

    let draft = FactDraft::new(Scope::World, summary, SUMMARY_IMPORTANCE);
    let tx = conn.transaction().map_err(MemoryError::from)?;
    let summary_fact = store::append_fact(&tx, &draft, &vector, current_turn)?;
    for fact in &batch {
        store::supersede(&tx, &fact.id, &summary_fact.id)?;
    }
    store::write_audit_log(
        &tx,
        "summarize",
        &summary_fact.id,
        Some(&serde_json::json!({"folded": batch.len()})),
    )?;
    tx.commit().map_err(MemoryError::from)?;

    tracing::info!(
        folded = batch.len(),
        summary = %summary_fact.id,
        "summarized old world facts"
    );
    Ok(Some(summary_fact.id))
}
