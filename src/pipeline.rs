//! Turn pipeline — the state machine sequencing one player turn.
//!
//! `Idle → Retrieving → Validating → Generating → Committing → Idle`, one
//! turn at a time (`&mut self` makes overlapping turns unrepresentable). A
//! failed external call, after its single retry, fails the whole turn: the
//! error names the stage and the cause, nothing is committed, the turn
//! counter does not move, and the pipeline is back at `Idle` for the next
//! input.

use std::sync::Arc;

use thiserror::Error;

use crate::config::MaintenanceConfig;
use crate::consistency::{LorePolicy, Verdict};
use crate::error::MemoryError;
use crate::generate::GenerateGateway;
use crate::memory::manager::MemoryManager;
use crate::memory::types::{FactId, RetrievalResult, TurnEntry};

/// Player inputs that read as recollection, keyed on the original cue list.
const LORE_CUES: [&str; 5] = ["remember", "who was", "when", "recall", "what happened"];

/// Player inputs that read as action beats.
const ACTION_CUES: [&str; 6] = ["attack", "run", "danger", "fight", "escape", "hide"];

/// Retrieval dense enough to treat the turn as recall even without a cue.
const DENSE_RECALL_FACTS: usize = 8;

/// Where the pipeline is within the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Idle,
    Retrieving,
    Validating,
    Generating,
    Committing,
}

impl std::fmt::Display for TurnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::Validating => "validating",
            Self::Generating => "generating",
            Self::Committing => "committing",
        };
        f.write_str(s)
    }
}

/// Scene classification of a turn, driving generation temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    /// Recollection and lore questions — narrate conservatively.
    Recall,
    Normal,
    /// Combat, flight, danger — narrate loosely.
    Action,
}

impl SceneKind {
    /// Fixed mapping, not tunable per call.
    pub fn temperature(&self) -> f64 {
        match self {
            Self::Recall => 0.3,
            Self::Normal => 0.7,
            Self::Action => 1.0,
        }
    }
}

impl std::fmt::Display for SceneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Recall => "recall",
            Self::Normal => "normal",
            Self::Action => "action",
        };
        f.write_str(s)
    }
}

/// Structured failure of one turn. The store, the window, and the turn
/// counter are exactly as they were before the turn began.
#[derive(Debug, Error)]
#[error("turn failed while {stage}: {cause}")]
pub struct TurnError {
    pub stage: TurnStage,
    #[source]
    pub cause: Box<dyn std::error::Error + Send + Sync>,
}

impl TurnError {
    fn at(
        stage: TurnStage,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            stage,
            cause: Box::new(cause),
        }
    }
}

/// Per-turn introspection data surfaced next to the narrative.
#[derive(Debug, Clone)]
pub struct TurnDiagnostics {
    pub scene: SceneKind,
    pub temperature: f64,
    pub verdict: Verdict,
    /// Scoring fell back to lexical overlap this turn.
    pub degraded: bool,
    /// Top-scored fact ids per queried scope, for debug display.
    pub top_facts: Vec<(String, Vec<FactId>)>,
}

/// Result of one successful turn.
#[derive(Debug)]
pub struct TurnReport {
    pub turn: u64,
    pub narrative: String,
    pub diagnostics: TurnDiagnostics,
}

/// Pipeline knobs beyond what the manager already carries.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Token budget handed to the generation call.
    pub max_tokens: usize,
    pub maintenance: MaintenanceConfig,
}

/// One interactive session: the explicit context object every turn runs
/// against. Independent sessions are independent pipeline values.
pub struct TurnPipeline {
    manager: MemoryManager,
    generator: Arc<GenerateGateway>,
    policy: Box<dyn LorePolicy>,
    settings: PipelineSettings,
    turn: u64,
    stage: TurnStage,
}

impl TurnPipeline {
    /// Build a pipeline over an opened session, restoring the turn counter
    /// from the ledger.
    pub fn new(
        manager: MemoryManager,
        generator: Arc<GenerateGateway>,
        policy: Box<dyn LorePolicy>,
        settings: PipelineSettings,
    ) -> Result<Self, MemoryError> {
        let turn = manager.committed_turn()?;
        Ok(Self {
            manager,
            generator,
            policy,
            settings,
            turn,
            stage: TurnStage::Idle,
        })
    }

    /// Number of the last committed turn.
    pub fn current_turn(&self) -> u64 {
        self.turn
    }

    pub fn stage(&self) -> TurnStage {
        self.stage
    }

    pub fn manager(&self) -> &MemoryManager {
        &self.manager
    }

    /// Run one full turn. On error the session state is untouched and the
    /// pipeline accepts the next input.
    pub async fn run_turn(&mut self, player_input: &str) -> Result<TurnReport, TurnError> {
        let result = self.drive(player_input).await;
        self.stage = TurnStage::Idle;
        result
    }

    async fn drive(&mut self, player_input: &str) -> Result<TurnReport, TurnError> {
        let next_turn = self.turn + 1;

        self.stage = TurnStage::Retrieving;
        tracing::debug!(turn = next_turn, stage = %self.stage, "turn started");
        let retrieval = self
            .manager
            .retrieve(player_input, next_turn)
            .await
            .map_err(|e| TurnError::at(TurnStage::Retrieving, e))?;

        self.stage = TurnStage::Validating;
        let scene = classify_scene(player_input, retrieval.fact_count());
        let verdict = self
            .policy
            .review(&retrieval, player_input)
            .await
            .map_err(|e| TurnError::at(TurnStage::Validating, e))?;
        if let Verdict::Flagged { reason } = &verdict {
            tracing::warn!(turn = next_turn, reason = %reason, "consistency flag (advisory)");
        }

        self.stage = TurnStage::Generating;
        let temperature = scene.temperature();
        let prompt = assemble_prompt(player_input, &retrieval, &verdict);
        let narrative = self
            .generator
            .generate(&prompt, temperature, self.settings.max_tokens)
            .await
            .map_err(|e| TurnError::at(TurnStage::Generating, e))?;

        self.stage = TurnStage::Committing;
        let record = TurnEntry {
            turn: next_turn,
            player_input: player_input.to_string(),
            narrative: narrative.clone(),
        };
        self.manager
            .commit(record)
            .await
            .map_err(|e| TurnError::at(TurnStage::Committing, e))?;
        self.turn = next_turn;

        self.maybe_maintain(next_turn).await;

        let diagnostics = TurnDiagnostics {
            scene,
            temperature,
            verdict,
            degraded: retrieval.degraded,
            top_facts: retrieval
                .sections
                .iter()
                .map(|section| {
                    let label = section
                        .scope
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "all".to_string());
                    let ids = section.facts.iter().map(|f| f.fact.id.clone()).collect();
                    (label, ids)
                })
                .collect(),
        };

        Ok(TurnReport {
            turn: next_turn,
            narrative,
            diagnostics,
        })
    }

    /// Post-commit maintenance. Failures are logged, never fatal: the turn
    /// has already landed.
    async fn maybe_maintain(&mut self, turn: u64) {
        let maintenance = self.settings.maintenance.clone();
        if !maintenance.enabled || turn % maintenance.summary_interval != 0 {
            return;
        }
        if let Err(err) = self.manager.consolidate_duplicates() {
            tracing::warn!(error = %err, "duplicate consolidation failed");
        }
        let generator = Arc::clone(&self.generator);
        if let Err(err) = self
            .manager
            .summarize_old_facts(&generator, &maintenance, turn)
            .await
        {
            tracing::warn!(error = %err, "summarization failed");
        }
    }
}

/// Classify the scene from the player input and the retrieved-fact density.
/// Lore cues win over action cues; a dense retrieval reads as recall even
/// without a cue.
pub fn classify_scene(player_input: &str, retrieved_facts: usize) -> SceneKind {
    let lowered = player_input.to_lowercase();
    if LORE_CUES.iter().any(|cue| lowered.contains(cue)) {
        return SceneKind::Recall;
    }
    if ACTION_CUES.iter().any(|cue| lowered.contains(cue)) {
        return SceneKind::Action;
    }
    if retrieved_facts >= DENSE_RECALL_FACTS {
        return SceneKind::Recall;
    }
    SceneKind::Normal
}

/// Assemble the generation prompt: recent window turns, top-scored facts,
/// the advisory consistency note when flagged, then the player action.
fn assemble_prompt(
    player_input: &str,
    retrieval: &RetrievalResult,
    verdict: &Verdict,
) -> String {
    let mut prompt = String::new();

    if !retrieval.window.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for entry in &retrieval.window {
            prompt.push_str(&format!("Player: {}\n", entry.player_input));
            prompt.push_str(&format!("Narrator: {}\n", entry.narrative));
        }
        prompt.push('\n');
    }

    let ranked = retrieval.ranked_facts();
    if !ranked.is_empty() {
        prompt.push_str("Relevant memories from previous events:\n");
        for scored in &ranked {
            prompt.push_str(&format!("- {}\n", scored.fact.text));
        }
        prompt.push('\n');
    }

    if let Verdict::Flagged { reason } = verdict {
        prompt.push_str(&format!(
            "Consistency note: {reason}. Steer the narration away from this contradiction.\n\n"
        ));
    }

    prompt.push_str(&format!("Current player action: {player_input}\n\n"));
    prompt.push_str(
        "Respond as the narrator, continuing the story based on this action. \
         Integrate relevant memories naturally and keep the narrative engaging.",
    );
    prompt
}
