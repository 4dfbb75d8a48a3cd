use anyhow::Result;

use chronicler::config::ChroniclerConfig;
use chronicler::db;
use chronicler::memory::stats::ledger_stats;

/// Display fact ledger statistics in the terminal.
pub fn stats(config: &ChroniclerConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path, config.embedding.dimensions)?;

    let response = ledger_stats(&conn, Some(&db_path))?;

    println!("Fact Ledger Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total facts:         {}", response.total_facts);
    println!("  Active:              {}", response.active_facts);
    println!("  Superseded:          {}", response.superseded_facts);
    println!();

    println!("By Scope:");
    for kind in &["world", "npc", "location"] {
        let count = response.by_scope_kind.get(*kind).copied().unwrap_or(0);
        println!("  {:<12} {}", kind, count);
    }
    println!();

    println!("Committed turn:        {}", response.committed_turn);
    println!("Database size:         {} bytes", response.db_size_bytes);

    if let Some(oldest) = response.oldest_turn {
        println!("Oldest fact turn:      {oldest}");
    }
    if let Some(newest) = response.newest_turn {
        println!("Newest fact turn:      {newest}");
    }

    Ok(())
}
