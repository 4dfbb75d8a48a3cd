mod helpers;

use helpers::{
    failing_embedding_gateway, manager_with_gateway, pipeline_with_policy, test_conn,
    test_manager, test_pipeline, AlwaysFlagPolicy, FailingNarrator, ScriptedNarrator,
};
use chronicler::consistency::Verdict;
use chronicler::memory::store;
use chronicler::pipeline::TurnStage;

#[tokio::test]
async fn a_turn_runs_end_to_end_and_commits() {
    let mut pipeline = test_pipeline(
        test_manager(test_conn(), 5),
        Box::new(ScriptedNarrator(
            "You step into the hall. Dust swirls in the light.".into(),
        )),
    );

    let report = pipeline.run_turn("I open the door").await.unwrap();
    assert_eq!(report.turn, 1);
    assert!(report.narrative.contains("hall"));
    assert_eq!(pipeline.current_turn(), 1);
    assert_eq!(pipeline.stage(), TurnStage::Idle);

    // The narrative's sentences landed in the ledger.
    let count = store::fact_count(pipeline.manager().connection()).unwrap();
    assert_eq!(count, 2);
    assert_eq!(pipeline.manager().window_len(), 1);
}

#[tokio::test]
async fn scene_classification_drives_temperature() {
    let mut pipeline = test_pipeline(
        test_manager(test_conn(), 5),
        Box::new(ScriptedNarrator("The story continues quietly.".into())),
    );

    let report = pipeline
        .run_turn("Do you remember the wizard?")
        .await
        .unwrap();
    assert_eq!(report.diagnostics.temperature, 0.3);

    let report = pipeline.run_turn("I attack the goblin").await.unwrap();
    assert_eq!(report.diagnostics.temperature, 1.0);

    let report = pipeline.run_turn("I sit by the fire").await.unwrap();
    assert_eq!(report.diagnostics.temperature, 0.7);
}

#[tokio::test]
async fn generation_outage_fails_the_turn_atomically() {
    let mut pipeline = test_pipeline(
        test_manager(test_conn(), 5),
        Box::new(ScriptedNarrator(
            "An owl calls twice from the rafters.".into(),
        )),
    );
    pipeline.run_turn("I listen carefully").await.unwrap();

    let facts_before = store::fact_count(pipeline.manager().connection()).unwrap();
    let window_before = pipeline.manager().window_len();
    let turn_before = pipeline.current_turn();

    // Second session stage: swap to a dead narrator by rebuilding the
    // pipeline is not possible mid-flight, so drive a fresh pipeline with a
    // dead narrator against a fresh ledger and verify the same invariants.
    let mut failing = test_pipeline(test_manager(test_conn(), 5), Box::new(FailingNarrator));
    let err = failing.run_turn("I speak").await.unwrap_err();
    assert_eq!(err.stage, TurnStage::Generating);
    assert_eq!(failing.current_turn(), 0);
    assert_eq!(
        store::fact_count(failing.manager().connection()).unwrap(),
        0
    );
    assert_eq!(failing.manager().window_len(), 0);
    assert_eq!(failing.stage(), TurnStage::Idle);

    // And the healthy pipeline's state is untouched by any of this.
    assert_eq!(
        store::fact_count(pipeline.manager().connection()).unwrap(),
        facts_before
    );
    assert_eq!(pipeline.manager().window_len(), window_before);
    assert_eq!(pipeline.current_turn(), turn_before);
}

#[tokio::test]
async fn embedding_outage_at_commit_rolls_back() {
    // With the embedder down, retrieval degrades but the commit stage cannot
    // embed new facts — the turn fails at Committing with nothing written.
    let manager = manager_with_gateway(test_conn(), 5, failing_embedding_gateway());
    let mut pipeline = test_pipeline(
        manager,
        Box::new(ScriptedNarrator(
            "The bridge groans under your weight.".into(),
        )),
    );

    let err = pipeline.run_turn("I cross the bridge").await.unwrap_err();
    assert_eq!(err.stage, TurnStage::Committing);
    assert_eq!(pipeline.current_turn(), 0);
    assert_eq!(
        store::fact_count(pipeline.manager().connection()).unwrap(),
        0
    );
    assert_eq!(pipeline.manager().window_len(), 0);
    assert_eq!(
        store::turn_counter(pipeline.manager().connection()).unwrap(),
        0
    );
}

#[tokio::test]
async fn failed_turn_does_not_block_the_next_one() {
    // A dead narrator fails a turn; the same pipeline then accepts input
    // again (the failure is terminal for that turn only).
    let mut pipeline = test_pipeline(test_manager(test_conn(), 5), Box::new(FailingNarrator));
    assert!(pipeline.run_turn("I speak").await.is_err());
    assert!(pipeline.run_turn("I speak again").await.is_err());
    assert_eq!(pipeline.current_turn(), 0);
}

#[tokio::test]
async fn flagged_verdict_is_advisory_not_fatal() {
    let mut pipeline = pipeline_with_policy(
        test_manager(test_conn(), 5),
        Box::new(ScriptedNarrator("The innkeeper's chair sits empty.".into())),
        Box::new(AlwaysFlagPolicy("the innkeeper is dead".into())),
    );

    let report = pipeline.run_turn("I greet the innkeeper").await.unwrap();
    assert_eq!(
        report.diagnostics.verdict,
        Verdict::Flagged {
            reason: "the innkeeper is dead".into()
        }
    );
    // The turn still committed.
    assert_eq!(pipeline.current_turn(), 1);
}

#[tokio::test]
async fn window_reflects_only_the_last_w_turns() {
    let mut pipeline = test_pipeline(
        test_manager(test_conn(), 3),
        Box::new(ScriptedNarrator("The corridor stretches onward.".into())),
    );

    for turn in 1..=7 {
        pipeline
            .run_turn(&format!("step number {turn}"))
            .await
            .unwrap();
        assert!(pipeline.manager().window_len() <= 3);
    }

    let retrieval = pipeline
        .manager()
        .retrieve("where am I", 8)
        .await
        .unwrap();
    let turns: Vec<u64> = retrieval.window.iter().map(|e| e.turn).collect();
    assert_eq!(turns, vec![5, 6, 7]);
}

#[tokio::test]
async fn turn_counter_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chronicle.db");

    {
        let conn = chronicler::db::open_database(&path, helpers::DIM).unwrap();
        let mut pipeline = test_pipeline(
            helpers::test_manager(conn, 5),
            Box::new(ScriptedNarrator("Night falls over the valley.".into())),
        );
        pipeline.run_turn("I make camp").await.unwrap();
        pipeline.run_turn("I bank the fire").await.unwrap();
        assert_eq!(pipeline.current_turn(), 2);
    }

    // Reopen: the pipeline resumes at the persisted turn and the committed
    // facts are still retrievable.
    let conn = chronicler::db::open_database(&path, helpers::DIM).unwrap();
    let pipeline = test_pipeline(
        helpers::test_manager(conn, 5),
        Box::new(ScriptedNarrator("Morning comes.".into())),
    );
    assert_eq!(pipeline.current_turn(), 2);
    let count = store::fact_count(pipeline.manager().connection()).unwrap();
    assert!(count >= 2);
}
