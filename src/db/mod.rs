pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the chronicle database at the given path, with schema
/// initialized and the store-wide embedding dimensionality pinned.
///
/// Reopening an existing database with a different configured dimensionality
/// is an error — scoring behavior must be identical across restarts.
pub fn open_database(path: impl AsRef<Path>, embedding_dim: usize) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    pin_embedding_dim(&conn, embedding_dim)?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database, used by tests and the offline demo.
pub fn open_memory_database(embedding_dim: usize) -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    pin_embedding_dim(&conn, embedding_dim)?;
    Ok(conn)
}

/// Record the embedding dimensionality on first open; reject a mismatch on
/// any later open.
fn pin_embedding_dim(conn: &Connection, embedding_dim: usize) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO session_meta (key, value) VALUES ('embedding_dim', ?1)",
        [embedding_dim.to_string()],
    )?;
    let stored: String = conn.query_row(
        "SELECT value FROM session_meta WHERE key = 'embedding_dim'",
        [],
        |row| row.get(0),
    )?;
    let stored: usize = stored
        .parse()
        .context("corrupt embedding_dim in session_meta")?;
    anyhow::ensure!(
        stored == embedding_dim,
        "database was created with {stored}-dimensional embeddings, configured {embedding_dim}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_rejected_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chronicle.db");
        {
            let _conn = open_database(&path, 384).unwrap();
        }
        let err = open_database(&path, 512);
        assert!(err.is_err());
    }
}
