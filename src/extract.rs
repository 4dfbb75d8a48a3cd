//! Fact extraction and scope classification heuristics.
//!
//! Both collaborators are total functions — no findings means an empty
//! result, never an error. The defaults are deterministic: extraction splits
//! the narrative into sentences and seeds importance from salience keywords;
//! scope classification is a lowercase name lookup against the externally
//! supplied NPC/location registry.

use std::collections::HashMap;

use crate::memory::types::{EntityId, FactDraft, PlaceId, Scope};

/// Words that mark a sentence as pivotal to the story.
const HIGH_SALIENCE: [&str; 10] = [
    "quest", "key", "artifact", "defeat", "victory", "death", "betray", "oath", "curse",
    "prophecy",
];

/// Words that mark a sentence as noteworthy but routine.
const MEDIUM_SALIENCE: [&str; 7] = [
    "meet", "find", "give", "take", "learn", "discover", "receive",
];

/// Sentences at or below this length are fragments, not facts.
const MIN_SENTENCE_LEN: usize = 10;

/// Extracts zero or more fact drafts from a finalized turn.
pub trait FactExtractor: Send + Sync {
    fn extract(&self, player_input: &str, narrative: &str) -> Vec<FactDraft>;
}

/// Produces scope hints for a player input. Best-effort: an empty result
/// simply means no scoped partition gets an extra query this turn.
pub trait ScopeClassifier: Send + Sync {
    fn classify(&self, player_input: &str) -> Vec<Scope>;
}

/// The externally owned registry of known NPCs and places, keyed by the
/// names they appear under in narrative text.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    npcs: HashMap<String, EntityId>,
    locations: HashMap<String, PlaceId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_npc(&mut self, name: &str, id: EntityId) {
        self.npcs.insert(name.to_lowercase(), id);
    }

    pub fn register_location(&mut self, name: &str, id: PlaceId) {
        self.locations.insert(name.to_lowercase(), id);
    }

    /// Scopes for every registered name appearing in `text`, NPCs first,
    /// alphabetical within each kind. Matching is case-insensitive
    /// whole-substring lookup.
    pub fn scopes_in(&self, text: &str) -> Vec<Scope> {
        let lowered = text.to_lowercase();

        let mut npcs: Vec<(&String, &EntityId)> = self
            .npcs
            .iter()
            .filter(|(name, _)| lowered.contains(name.as_str()))
            .collect();
        npcs.sort_by(|a, b| a.0.cmp(b.0));

        let mut locations: Vec<(&String, &PlaceId)> = self
            .locations
            .iter()
            .filter(|(name, _)| lowered.contains(name.as_str()))
            .collect();
        locations.sort_by(|a, b| a.0.cmp(b.0));

        npcs.into_iter()
            .map(|(_, id)| Scope::Npc(id.clone()))
            .chain(
                locations
                    .into_iter()
                    .map(|(_, id)| Scope::Location(id.clone())),
            )
            .collect()
    }
}

/// Default extractor: one draft per narrative sentence, scoped to the first
/// registry match in that sentence (NPC before location) or world otherwise,
/// with keyword-seeded importance.
pub struct HeuristicExtractor {
    registry: EntityRegistry,
}

impl HeuristicExtractor {
    pub fn new(registry: EntityRegistry) -> Self {
        Self { registry }
    }
}

impl FactExtractor for HeuristicExtractor {
    fn extract(&self, _player_input: &str, narrative: &str) -> Vec<FactDraft> {
        split_sentences(narrative)
            .into_iter()
            .map(|sentence| {
                let scope = self
                    .registry
                    .scopes_in(&sentence)
                    .into_iter()
                    .next()
                    .unwrap_or(Scope::World);
                let importance = sentence_importance(&sentence);
                FactDraft::new(scope, sentence, importance)
            })
            .collect()
    }
}

/// Default classifier: registry lookup over the raw player input.
pub struct RegistryClassifier {
    registry: EntityRegistry,
}

impl RegistryClassifier {
    pub fn new(registry: EntityRegistry) -> Self {
        Self { registry }
    }
}

impl ScopeClassifier for RegistryClassifier {
    fn classify(&self, player_input: &str) -> Vec<Scope> {
        self.registry.scopes_in(player_input)
    }
}

/// Split on sentence punctuation, trim, and drop fragments.
fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() > MIN_SENTENCE_LEN)
        .map(str::to_string)
        .collect()
}

/// Base importance 0.5, +0.1 per pivotal keyword, +0.05 per routine keyword,
/// capped at 1.0.
fn sentence_importance(sentence: &str) -> f64 {
    let lowered = sentence.to_lowercase();
    let mut importance: f64 = 0.5;
    for keyword in HIGH_SALIENCE {
        if lowered.contains(keyword) {
            importance += 0.1;
        }
    }
    for keyword in MEDIUM_SALIENCE {
        if lowered.contains(keyword) {
            importance += 0.05;
        }
    }
    importance.min(1.0)
}
