//! SQL DDL for the fact ledger.
//!
//! Defines the `facts` table (append-only), the `fact_log` audit table, and
//! the `session_meta` key/value table holding the schema version, embedding
//! dimensionality, and persisted turn counter. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the ledger tables.
const SCHEMA_SQL: &str = r#"
-- Append-only narrative fact ledger
CREATE TABLE IF NOT EXISTS facts (
    id TEXT PRIMARY KEY,
    scope_kind TEXT NOT NULL CHECK(scope_kind IN ('world','npc','location')),
    scope_ref TEXT,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_turn INTEGER NOT NULL,
    importance REAL NOT NULL CHECK(importance >= 0.0 AND importance <= 1.0),
    superseded_by TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_facts_scope ON facts(scope_kind, scope_ref);
CREATE INDEX IF NOT EXISTS idx_facts_turn ON facts(created_turn);
CREATE INDEX IF NOT EXISTS idx_facts_superseded ON facts(superseded_by);

-- Audit log
CREATE TABLE IF NOT EXISTS fact_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('append','revise','supersede','summarize')),
    fact_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Session metadata (schema version, embedding dimensionality, turn counter)
CREATE TABLE IF NOT EXISTS session_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO session_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO session_meta (key, value) VALUES ('turn_counter', '0')",
        [],
    )?;

    Ok(())
}
