//! Fact ledger — append, pool queries, importance revision, supersession.
//!
//! The ledger is append-only: a fact's text and embedding never change after
//! insertion. [`append_fact`] validates dimensionality and writes the fact
//! plus an audit row; callers that append several facts atomically (the
//! commit path) wrap the calls in one transaction. Pool queries return an
//! unranked candidate set — ranking is the scorer's job.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::MemoryError;
use crate::memory::types::{Fact, FactDraft, FactId, Scope};
use crate::memory::{bytes_to_embedding, embedding_to_bytes};

/// Append one fact to the ledger. Assigns the id, records the creating turn,
/// and audit-logs the write. Duplicate text is legal — repeated mentions are
/// consolidated later by importance revision, never rejected here.
pub fn append_fact(
    conn: &Connection,
    draft: &FactDraft,
    embedding: &[f32],
    created_turn: u64,
) -> Result<Fact, MemoryError> {
    let expected = embedding_dim(conn)?;
    if embedding.len() != expected {
        return Err(MemoryError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }

    let id = FactId::new();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO facts (id, scope_kind, scope_ref, text, embedding, created_turn, importance, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.as_str(),
            draft.scope.kind_str(),
            draft.scope.ref_str(),
            draft.text,
            embedding_to_bytes(embedding),
            created_turn as i64,
            draft.importance,
            now,
        ],
    )?;

    write_audit_log(conn, "append", &id, None)?;

    Ok(Fact {
        id,
        scope: draft.scope.clone(),
        text: draft.text.clone(),
        embedding: embedding.to_vec(),
        created_turn,
        importance: draft.importance,
        superseded_by: None,
        created_at: now,
    })
}

/// Fetch a candidate pool for the scorer: non-superseded facts matching the
/// scope filter (all scopes when absent), most recent `candidate_limit` by
/// creating turn. Stable order, not a ranking.
pub fn query_pool(
    conn: &Connection,
    scope_filter: Option<&Scope>,
    candidate_limit: usize,
) -> Result<Vec<Fact>, MemoryError> {
    let mut facts = match scope_filter {
        Some(scope) => {
            let mut stmt = conn.prepare(
                "SELECT id, scope_kind, scope_ref, text, embedding, created_turn, importance, superseded_by, created_at \
                 FROM facts \
                 WHERE superseded_by IS NULL AND scope_kind = ?1 AND scope_ref IS ?2 \
                 ORDER BY created_turn DESC, id DESC LIMIT ?3",
            )?;
            let rows = stmt.query_map(
                params![scope.kind_str(), scope.ref_str(), candidate_limit as i64],
                row_to_fact,
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, scope_kind, scope_ref, text, embedding, created_turn, importance, superseded_by, created_at \
                 FROM facts \
                 WHERE superseded_by IS NULL \
                 ORDER BY created_turn DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![candidate_limit as i64], row_to_fact)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    // Oldest-first reads better in prompts and diagnostics.
    facts.reverse();
    Ok(facts)
}

/// Fetch one fact by id.
pub fn get_fact(conn: &Connection, fact_id: &FactId) -> Result<Fact, MemoryError> {
    conn.query_row(
        "SELECT id, scope_kind, scope_ref, text, embedding, created_turn, importance, superseded_by, created_at \
         FROM facts WHERE id = ?1",
        params![fact_id.as_str()],
        row_to_fact,
    )
    .optional()?
    .ok_or_else(|| MemoryError::NotFound(fact_id.clone()))
}

/// Raise a fact's importance. Monotonic-increase only: a lower value fails
/// with `InvalidRevision` and leaves the stored importance unchanged.
pub fn revise_importance(
    conn: &Connection,
    fact_id: &FactId,
    new_importance: f64,
) -> Result<(), MemoryError> {
    let current: Option<f64> = conn
        .query_row(
            "SELECT importance FROM facts WHERE id = ?1",
            params![fact_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let current = current.ok_or_else(|| MemoryError::NotFound(fact_id.clone()))?;
    if new_importance < current {
        return Err(MemoryError::InvalidRevision {
            current,
            requested: new_importance,
        });
    }

    let clamped = new_importance.min(1.0);
    conn.execute(
        "UPDATE facts SET importance = ?1 WHERE id = ?2",
        params![clamped, fact_id.as_str()],
    )?;
    write_audit_log(
        conn,
        "revise",
        fact_id,
        Some(&serde_json::json!({"from": current, "to": clamped})),
    )?;
    Ok(())
}

/// Mark `old_id` as superseded by `new_id` (summaries replacing originals).
pub fn supersede(
    conn: &Connection,
    old_id: &FactId,
    new_id: &FactId,
) -> Result<(), MemoryError> {
    let rows = conn.execute(
        "UPDATE facts SET superseded_by = ?1 WHERE id = ?2",
        params![new_id.as_str(), old_id.as_str()],
    )?;
    if rows == 0 {
        return Err(MemoryError::NotFound(old_id.clone()));
    }
    write_audit_log(
        conn,
        "supersede",
        old_id,
        Some(&serde_json::json!({"superseded_by": new_id.as_str()})),
    )?;
    Ok(())
}

/// Number of facts in the ledger, including superseded ones.
pub fn fact_count(conn: &Connection) -> Result<u64, MemoryError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM facts", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// The persisted turn counter: number of the last committed turn.
pub fn turn_counter(conn: &Connection) -> Result<u64, MemoryError> {
    let value: String = conn.query_row(
        "SELECT value FROM session_meta WHERE key = 'turn_counter'",
        [],
        |row| row.get(0),
    )?;
    value
        .parse()
        .map_err(|_| MemoryError::InvalidQuery("corrupt turn counter".into()))
}

/// Advance the persisted turn counter. Called inside the commit transaction
/// so a failed turn never moves it.
pub fn set_turn_counter(conn: &Connection, turn: u64) -> Result<(), MemoryError> {
    conn.execute(
        "UPDATE session_meta SET value = ?1 WHERE key = 'turn_counter'",
        params![turn.to_string()],
    )?;
    Ok(())
}

/// Store-wide embedding dimensionality, pinned at database creation.
pub fn embedding_dim(conn: &Connection) -> Result<usize, MemoryError> {
    let value: String = conn.query_row(
        "SELECT value FROM session_meta WHERE key = 'embedding_dim'",
        [],
        |row| row.get(0),
    )?;
    value
        .parse()
        .map_err(|_| MemoryError::InvalidQuery("corrupt embedding_dim".into()))
}

/// Write an entry to the fact_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    fact_id: &FactId,
    details: Option<&serde_json::Value>,
) -> Result<(), MemoryError> {
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO fact_log (operation, fact_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, fact_id.as_str(), details_json, now],
    )?;
    Ok(())
}

fn row_to_fact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Fact> {
    let kind: String = row.get(1)?;
    let reference: Option<String> = row.get(2)?;
    let scope = Scope::from_parts(&kind, reference)
        .map_err(|_| rusqlite::Error::InvalidQuery)?;
    let blob: Vec<u8> = row.get(4)?;
    let superseded: Option<String> = row.get(7)?;
    Ok(Fact {
        id: FactId(row.get(0)?),
        scope,
        text: row.get(3)?,
        embedding: bytes_to_embedding(&blob),
        created_turn: row.get::<_, i64>(5)? as u64,
        importance: row.get(6)?,
        superseded_by: superseded.map(FactId),
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::types::EntityId;

    const DIM: usize = 8;

    fn test_db() -> Connection {
        db::open_memory_database(DIM).unwrap()
    }

    fn emb(spike: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        v[spike % DIM] = 1.0;
        v
    }

    #[test]
    fn append_assigns_id_and_turn() {
        let conn = test_db();
        let draft = FactDraft::new(Scope::World, "The gate creaked open", 0.5);
        let fact = append_fact(&conn, &draft, &emb(0), 3).unwrap();
        assert_eq!(fact.created_turn, 3);
        assert_eq!(fact.importance, 0.5);

        let stored = get_fact(&conn, &fact.id).unwrap();
        assert_eq!(stored.text, "The gate creaked open");
        assert_eq!(stored.embedding, emb(0));
    }

    #[test]
    fn append_rejects_wrong_dimensionality() {
        let conn = test_db();
        let draft = FactDraft::new(Scope::World, "bad vector", 0.5);
        let err = append_fact(&conn, &draft, &vec![0.0f32; DIM + 1], 1);
        assert!(matches!(
            err,
            Err(MemoryError::DimensionMismatch { expected: 8, actual: 9 })
        ));
    }

    #[test]
    fn duplicate_text_is_legal() {
        let conn = test_db();
        let draft = FactDraft::new(Scope::World, "The bell tolled", 0.5);
        let a = append_fact(&conn, &draft, &emb(0), 1).unwrap();
        let b = append_fact(&conn, &draft, &emb(0), 5).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(fact_count(&conn).unwrap(), 2);
    }

    #[test]
    fn pool_filters_by_scope() {
        let conn = test_db();
        let aldric = Scope::Npc(EntityId::new("aldric"));
        append_fact(&conn, &FactDraft::new(Scope::World, "w", 0.5), &emb(0), 1).unwrap();
        append_fact(&conn, &FactDraft::new(aldric.clone(), "n", 0.5), &emb(1), 2).unwrap();

        let world = query_pool(&conn, Some(&Scope::World), 10).unwrap();
        assert_eq!(world.len(), 1);
        assert_eq!(world[0].text, "w");

        let npc = query_pool(&conn, Some(&aldric), 10).unwrap();
        assert_eq!(npc.len(), 1);
        assert_eq!(npc[0].text, "n");

        let all = query_pool(&conn, None, 10).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn pool_keeps_most_recent_candidates() {
        let conn = test_db();
        for turn in 1..=6 {
            append_fact(
                &conn,
                &FactDraft::new(Scope::World, format!("turn {turn}"), 0.5),
                &emb(turn as usize),
                turn,
            )
            .unwrap();
        }
        let pool = query_pool(&conn, None, 3).unwrap();
        let turns: Vec<u64> = pool.iter().map(|f| f.created_turn).collect();
        assert_eq!(turns, vec![4, 5, 6]);
    }

    #[test]
    fn pool_excludes_superseded() {
        let conn = test_db();
        let a = append_fact(&conn, &FactDraft::new(Scope::World, "old", 0.5), &emb(0), 1)
            .unwrap();
        let b = append_fact(&conn, &FactDraft::new(Scope::World, "new", 0.5), &emb(1), 2)
            .unwrap();
        supersede(&conn, &a.id, &b.id).unwrap();

        let pool = query_pool(&conn, None, 10).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, b.id);
    }

    #[test]
    fn revision_is_monotonic() {
        let conn = test_db();
        let fact = append_fact(&conn, &FactDraft::new(Scope::World, "f", 0.5), &emb(0), 1)
            .unwrap();

        revise_importance(&conn, &fact.id, 0.8).unwrap();
        let err = revise_importance(&conn, &fact.id, 0.4);
        assert!(matches!(err, Err(MemoryError::InvalidRevision { .. })));

        // Unchanged after the failed revision
        let stored = get_fact(&conn, &fact.id).unwrap();
        assert_eq!(stored.importance, 0.8);
    }

    #[test]
    fn revise_unknown_fact_is_not_found() {
        let conn = test_db();
        let err = revise_importance(&conn, &FactId::new(), 0.9);
        assert!(matches!(err, Err(MemoryError::NotFound(_))));
    }

    #[test]
    fn supersede_unknown_fact_is_not_found() {
        let conn = test_db();
        let err = supersede(&conn, &FactId::new(), &FactId::new());
        assert!(matches!(err, Err(MemoryError::NotFound(_))));
    }

    #[test]
    fn audit_log_written_on_append() {
        let conn = test_db();
        let fact = append_fact(&conn, &FactDraft::new(Scope::World, "f", 0.5), &emb(0), 1)
            .unwrap();
        let (op, fid): (String, String) = conn
            .query_row(
                "SELECT operation, fact_id FROM fact_log WHERE fact_id = ?1",
                params![fact.id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(op, "append");
        assert_eq!(fid, fact.id.as_str());
    }

    #[test]
    fn turn_counter_round_trip() {
        let conn = test_db();
        assert_eq!(turn_counter(&conn).unwrap(), 0);
        set_turn_counter(&conn, 7).unwrap();
        assert_eq!(turn_counter(&conn).unwrap(), 7);
    }
}
