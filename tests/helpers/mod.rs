#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;

use chronicler::consistency::{LorePolicy, Verdict};
use chronicler::db;
use chronicler::embedding::hashed::HashedEmbeddingProvider;
use chronicler::embedding::{EmbeddingGateway, EmbeddingProvider};
use chronicler::error::ProviderError;
use chronicler::extract::{EntityRegistry, HeuristicExtractor, RegistryClassifier};
use chronicler::generate::{GenerateGateway, GenerateProvider};
use chronicler::memory::manager::{MemoryManager, RetrievalSettings};
use chronicler::memory::score::ScoringWeights;
use chronicler::memory::types::{EntityId, PlaceId, RetrievalResult};
use chronicler::pipeline::{PipelineSettings, TurnPipeline};

pub const DIM: usize = 64;

/// Registry with a couple of known names, mirroring a host-supplied one.
pub fn test_registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    registry.register_npc("Aldric", EntityId::new("npc_aldric"));
    registry.register_location("tower", PlaceId::new("loc_tower"));
    registry
}

/// Open a fresh in-memory ledger.
pub fn test_conn() -> Connection {
    db::open_memory_database(DIM).unwrap()
}

pub fn hashed_gateway() -> EmbeddingGateway {
    EmbeddingGateway::new(
        Box::new(HashedEmbeddingProvider::new(DIM)),
        Duration::from_secs(5),
    )
}

pub fn failing_embedding_gateway() -> EmbeddingGateway {
    EmbeddingGateway::new(Box::new(FailingEmbedder), Duration::from_secs(5))
}

/// Manager over an in-memory ledger with the deterministic providers.
pub fn test_manager(conn: Connection, window_capacity: usize) -> MemoryManager {
    manager_with_gateway(conn, window_capacity, hashed_gateway())
}

pub fn manager_with_gateway(
    conn: Connection,
    window_capacity: usize,
    gateway: EmbeddingGateway,
) -> MemoryManager {
    let registry = test_registry();
    MemoryManager::new(
        conn,
        window_capacity,
        gateway,
        Box::new(HeuristicExtractor::new(registry.clone())),
        Box::new(RegistryClassifier::new(registry)),
        ScoringWeights::default(),
        RetrievalSettings {
            top_k: 5,
            candidate_pool: 100,
        },
    )
}

/// Pipeline over a manager with the given narrator and a permissive policy.
pub fn test_pipeline(
    manager: MemoryManager,
    narrator: Box<dyn GenerateProvider>,
) -> TurnPipeline {
    pipeline_with_policy(manager, narrator, Box::new(chronicler::consistency::PermissivePolicy))
}

pub fn pipeline_with_policy(
    manager: MemoryManager,
    narrator: Box<dyn GenerateProvider>,
    policy: Box<dyn LorePolicy>,
) -> TurnPipeline {
    let generator = Arc::new(GenerateGateway::new(narrator, Duration::from_secs(5)));
    TurnPipeline::new(
        manager,
        generator,
        policy,
        PipelineSettings {
            max_tokens: 400,
            maintenance: chronicler::config::MaintenanceConfig::default(),
        },
    )
    .unwrap()
}

/// Narrator that always returns the same text.
pub struct ScriptedNarrator(pub String);

#[async_trait]
impl GenerateProvider for ScriptedNarrator {
    async fn generate(
        &self,
        _prompt: &str,
        _temperature: f64,
        _max_tokens: usize,
    ) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

/// Narrator that is always down.
pub struct FailingNarrator;

#[async_trait]
impl GenerateProvider for FailingNarrator {
    async fn generate(
        &self,
        _prompt: &str,
        _temperature: f64,
        _max_tokens: usize,
    ) -> anyhow::Result<String> {
        anyhow::bail!("narrator offline")
    }
}

/// Embedder that is always down.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedder offline")
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Policy that flags every beat with a fixed reason.
pub struct AlwaysFlagPolicy(pub String);

#[async_trait]
impl LorePolicy for AlwaysFlagPolicy {
    async fn review(
        &self,
        _retrieval: &RetrievalResult,
        _proposed_beat: &str,
    ) -> Result<Verdict, ProviderError> {
        Ok(Verdict::Flagged {
            reason: self.0.clone(),
        })
    }
}
