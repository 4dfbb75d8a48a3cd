//! CLI `inspect` command — display full details for a single fact.

use anyhow::Result;
use rusqlite::params;

use chronicler::config::ChroniclerConfig;
use chronicler::db;
use chronicler::memory::store::get_fact;
use chronicler::memory::types::FactId;

/// Print one fact and its audit history.
pub fn inspect(config: &ChroniclerConfig, fact_id: &str) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path, config.embedding.dimensions)?;

    let fact = get_fact(&conn, &FactId(fact_id.to_string()))?;

    println!("Fact {}", fact.id);
    println!("{}", "=".repeat(40));
    println!("  Scope:         {}", fact.scope);
    println!("  Created turn:  {}", fact.created_turn);
    println!("  Importance:    {:.2}", fact.importance);
    if let Some(superseded_by) = &fact.superseded_by {
        println!("  Superseded by: {superseded_by}");
    }
    println!("  Created at:    {}", fact.created_at);
    println!();
    println!("  {}", fact.text);
    println!();

    let mut stmt = conn.prepare(
        "SELECT operation, details, created_at FROM fact_log WHERE fact_id = ?1 ORDER BY id",
    )?;
    let entries = stmt
        .query_map(params![fact_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    println!("Audit log:");
    for (operation, details, created_at) in entries {
        match details {
            Some(details) => println!("  {created_at}  {operation}  {details}"),
            None => println!("  {created_at}  {operation}"),
        }
    }

    Ok(())
}
