use anyhow::Result;
use rusqlite::params;
use serde::Serialize;

use chronicler::config::ChroniclerConfig;
use chronicler::db;
use chronicler::memory::types::Fact;

/// Export format — the full ledger plus the audit log. Embeddings are
/// omitted; they are reproducible from the texts and only inflate the dump.
#[derive(Debug, Serialize)]
struct ExportData {
    facts: Vec<Fact>,
    log: Vec<AuditEntry>,
}

#[derive(Debug, Serialize)]
struct AuditEntry {
    operation: String,
    fact_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    created_at: String,
}

/// Export all facts and audit entries as JSON to stdout.
pub fn export(config: &ChroniclerConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path, config.embedding.dimensions)?;

    let mut stmt = conn.prepare(
        "SELECT id FROM facts ORDER BY created_turn, id",
    )?;
    let ids: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut facts = Vec::with_capacity(ids.len());
    for id in ids {
        let mut fact = chronicler::memory::store::get_fact(
            &conn,
            &chronicler::memory::types::FactId(id),
        )?;
        fact.embedding.clear();
        facts.push(fact);
    }

    let mut stmt = conn.prepare(
        "SELECT operation, fact_id, details, created_at FROM fact_log ORDER BY id",
    )?;
    let log: Vec<AuditEntry> = stmt
        .query_map(params![], |row| {
            let details_str: Option<String> = row.get(2)?;
            Ok(AuditEntry {
                operation: row.get(0)?,
                fact_id: row.get(1)?,
                details: details_str.and_then(|s| serde_json::from_str(&s).ok()),
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let data = ExportData { facts, log };

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!(
        "Exported {} facts and {} audit entries.",
        data.facts.len(),
        data.log.len()
    );

    Ok(())
}
