//! CLI `play` command — interactive story loop over the offline providers.
//!
//! Thin presentation only: reads player input, runs the turn pipeline, and
//! prints the narrative plus optional per-turn diagnostics. `quit` ends the
//! session, `debug` toggles the diagnostics display, `stats` prints ledger
//! counters mid-session.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;

use chronicler::config::ChroniclerConfig;
use chronicler::consistency::{ModelBackedPolicy, Verdict};
use chronicler::db;
use chronicler::embedding::{self, EmbeddingGateway};
use chronicler::extract::{EntityRegistry, HeuristicExtractor, RegistryClassifier};
use chronicler::generate::{self, GenerateGateway};
use chronicler::memory::manager::{MemoryManager, RetrievalSettings};
use chronicler::memory::stats::ledger_stats;
use chronicler::memory::types::{EntityId, PlaceId};
use chronicler::pipeline::{PipelineSettings, TurnPipeline, TurnReport};

/// Registry used by the demo session. A host application supplies its own.
fn demo_registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    registry.register_npc("Aldric", EntityId::new("npc_aldric"));
    registry.register_npc("Goblin King", EntityId::new("npc_goblin_king"));
    registry.register_location("Emberfall", PlaceId::new("loc_emberfall"));
    registry.register_location("the old castle", PlaceId::new("loc_old_castle"));
    registry
}

pub async fn play(config: &ChroniclerConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path, config.embedding.dimensions)?;

    let registry = demo_registry();
    let embedding_gateway = EmbeddingGateway::new(
        embedding::create_provider(&config.embedding)?,
        config.call_timeout(),
    );
    let generator = Arc::new(GenerateGateway::new(
        generate::create_provider(&config.generation)?,
        config.call_timeout(),
    ));

    let manager = MemoryManager::new(
        conn,
        config.window.capacity,
        embedding_gateway,
        Box::new(HeuristicExtractor::new(registry.clone())),
        Box::new(RegistryClassifier::new(registry)),
        config.scoring,
        RetrievalSettings {
            top_k: config.retrieval.top_k,
            candidate_pool: config.retrieval.candidate_pool,
        },
    );

    let policy = Box::new(ModelBackedPolicy::new(Arc::clone(&generator)));
    let mut pipeline = TurnPipeline::new(
        manager,
        generator,
        policy,
        PipelineSettings {
            max_tokens: config.generation.max_tokens,
            maintenance: config.maintenance.clone(),
        },
    )?;

    println!("chronicler — interactive story session");
    println!("Commands: 'quit' to exit, 'debug' to toggle diagnostics, 'stats' for ledger counters.");
    println!("The adventure begins...\n");

    let stdin = std::io::stdin();
    let mut debug_mode = false;

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        match input.to_lowercase().as_str() {
            "quit" => {
                println!("\nThe adventure continues in your imagination...");
                break;
            }
            "debug" => {
                debug_mode = !debug_mode;
                println!("diagnostics {}", if debug_mode { "on" } else { "off" });
                continue;
            }
            "stats" => {
                print_stats(&mut pipeline)?;
                continue;
            }
            _ => {}
        }

        match pipeline.run_turn(input).await {
            Ok(report) => {
                println!("\nNarrator: {}\n", report.narrative);
                if debug_mode {
                    print_diagnostics(&report);
                }
            }
            Err(err) => {
                eprintln!("\n[turn failed] {err}");
                eprintln!("The narrator stumbles momentarily but recovers...\n");
            }
        }
    }

    Ok(())
}

fn print_stats(pipeline: &mut TurnPipeline) -> Result<()> {
    let stats = ledger_stats(pipeline.manager().connection(), None)?;
    println!("  facts: {} active / {} total", stats.active_facts, stats.total_facts);
    println!("  committed turn: {}", stats.committed_turn);
    println!("  window occupancy: {}", pipeline.manager().window_len());
    Ok(())
}

fn print_diagnostics(report: &TurnReport) {
    println!("-- turn {} diagnostics --", report.turn);
    println!(
        "  scene: {} (temperature {:.1})",
        report.diagnostics.scene, report.diagnostics.temperature
    );
    if report.diagnostics.degraded {
        println!("  scoring: lexical fallback (embedding unavailable)");
    }
    match &report.diagnostics.verdict {
        Verdict::Consistent => println!("  consistency: ok"),
        Verdict::Flagged { reason } => println!("  consistency: flagged — {reason}"),
    }
    for (scope, ids) in &report.diagnostics.top_facts {
        if ids.is_empty() {
            continue;
        }
        let rendered: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        println!("  {scope}: {}", rendered.join(", "));
    }
    println!();
}
