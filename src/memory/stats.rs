//! Ledger statistics for the debug console and the `stats` subcommand.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::MemoryError;

/// Response from ledger_stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_facts: u64,
    pub active_facts: u64,
    pub superseded_facts: u64,
    pub by_scope_kind: HashMap<String, u64>,
    pub committed_turn: u64,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_turn: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_turn: Option<u64>,
}

/// Compute fact ledger statistics.
///
/// `db_path` is used for file size calculation; pass None for in-memory
/// databases.
pub fn ledger_stats(
    conn: &Connection,
    db_path: Option<&Path>,
) -> Result<StatsResponse, MemoryError> {
    let total: u64 = conn.query_row("SELECT COUNT(*) FROM facts", [], |r| r.get::<_, i64>(0))? as u64;
    let active: u64 = conn.query_row(
        "SELECT COUNT(*) FROM facts WHERE superseded_by IS NULL",
        [],
        |r| r.get::<_, i64>(0),
    )? as u64;

    let mut by_scope_kind = HashMap::new();
    {
        let mut stmt =
            conn.prepare("SELECT scope_kind, COUNT(*) FROM facts GROUP BY scope_kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        for row in rows {
            let (kind, count) = row?;
            by_scope_kind.insert(kind, count);
        }
    }

    let (oldest_turn, newest_turn): (Option<u64>, Option<u64>) = conn.query_row(
        "SELECT MIN(created_turn), MAX(created_turn) FROM facts",
        [],
        |row| {
            Ok((
                row.get::<_, Option<i64>>(0)?.map(|v| v as u64),
                row.get::<_, Option<i64>>(1)?.map(|v| v as u64),
            ))
        },
    )?;

    let committed_turn = crate::memory::store::turn_counter(conn)?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_facts: total,
        active_facts: active,
        superseded_facts: total - active,
        by_scope_kind,
        committed_turn,
        db_size_bytes,
        oldest_turn,
        newest_turn,
    })
}
