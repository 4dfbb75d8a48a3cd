mod helpers;

use helpers::{test_manager, DIM};
use chronicler::db;
use chronicler::memory::store;
use chronicler::memory::types::TurnEntry;

#[tokio::test]
async fn scoring_is_identical_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chronicle.db");

    let scores_before: Vec<(String, f64)> = {
        let conn = db::open_database(&path, DIM).unwrap();
        let mut manager = test_manager(conn, 5);

        manager
            .commit(TurnEntry {
                turn: 1,
                player_input: "I explore the cellar".into(),
                narrative: "A rusted lantern hangs from a hook. The cellar smells of cold earth."
                    .into(),
            })
            .await
            .unwrap();
        manager
            .commit(TurnEntry {
                turn: 2,
                player_input: "I lift the lantern".into(),
                narrative: "The lantern's glass is cracked but the wick survives.".into(),
            })
            .await
            .unwrap();

        let result = manager.retrieve("the rusted lantern", 3).await.unwrap();
        result
            .ranked_facts()
            .iter()
            .map(|f| (f.fact.id.to_string(), f.score))
            .collect()
    };

    // Same configuration, fresh process: ranking and scores must replay
    // exactly.
    let conn = db::open_database(&path, DIM).unwrap();
    let manager = test_manager(conn, 5);
    let result = manager.retrieve("the rusted lantern", 3).await.unwrap();
    let scores_after: Vec<(String, f64)> = result
        .ranked_facts()
        .iter()
        .map(|f| (f.fact.id.to_string(), f.score))
        .collect();

    assert_eq!(scores_before, scores_after);
}

#[tokio::test]
async fn embeddings_round_trip_through_the_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chronicle.db");

    let (id, original) = {
        let conn = db::open_database(&path, DIM).unwrap();
        let mut manager = test_manager(conn, 5);
        manager
            .commit(TurnEntry {
                turn: 1,
                player_input: "I read the plaque".into(),
                narrative: "The plaque names the founders of the keep.".into(),
            })
            .await
            .unwrap();
        let pool = store::query_pool(manager.connection(), None, 10).unwrap();
        (pool[0].id.clone(), pool[0].embedding.clone())
    };
    assert_eq!(original.len(), DIM);

    let conn = db::open_database(&path, DIM).unwrap();
    let reloaded = store::get_fact(&conn, &id).unwrap();
    assert_eq!(reloaded.embedding, original);
}

#[tokio::test]
async fn out_of_order_commit_is_rejected() {
    let mut manager = test_manager(helpers::test_conn(), 5);

    manager
        .commit(TurnEntry {
            turn: 1,
            player_input: "first".into(),
            narrative: "The first turn unfolds as expected.".into(),
        })
        .await
        .unwrap();

    // Committing turn 3 after turn 1 is a caller bug, not a turn failure.
    let err = manager
        .commit(TurnEntry {
            turn: 3,
            player_input: "skipped".into(),
            narrative: "This narrative must never land.".into(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("last committed turn"));

    // Double-committing the same turn is rejected too.
    let err = manager
        .commit(TurnEntry {
            turn: 1,
            player_input: "again".into(),
            narrative: "This narrative must never land either.".into(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("last committed turn"));

    assert_eq!(store::fact_count(manager.connection()).unwrap(), 1);
    assert_eq!(store::turn_counter(manager.connection()).unwrap(), 1);
}
