//! Core narrative memory types.
//!
//! Defines [`Scope`] (the hierarchical partitioning of facts into world, NPC,
//! and location memory), [`Fact`] (one immutable ledger entry), the ephemeral
//! retrieval types, and the id newtypes referencing the externally owned
//! entity registry.

use serde::{Deserialize, Serialize};

/// Unique, immutable fact identifier (UUID v7, time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactId(pub String);

impl FactId {
    /// Mint a fresh id.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key into the external NPC registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key into the external location registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceId(pub String);

impl PlaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Memory partition a fact belongs to.
///
/// A closed variant set, not a free string — an invalid scope cannot be
/// represented. NPC and location scopes carry the registry key of the entity
/// they are bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    /// Shared world memory — always searched.
    World,
    /// Memory bound to a single NPC.
    Npc(EntityId),
    /// Memory bound to a single place.
    Location(PlaceId),
}

impl Scope {
    /// SQL-compatible kind discriminant.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::World => "world",
            Self::Npc(_) => "npc",
            Self::Location(_) => "location",
        }
    }

    /// Registry key for scoped variants, `None` for world.
    pub fn ref_str(&self) -> Option<&str> {
        match self {
            Self::World => None,
            Self::Npc(id) => Some(id.as_str()),
            Self::Location(id) => Some(id.as_str()),
        }
    }

    /// Rebuild a scope from its SQL representation.
    pub fn from_parts(kind: &str, reference: Option<String>) -> Result<Self, String> {
        match (kind, reference) {
            ("world", _) => Ok(Self::World),
            ("npc", Some(id)) => Ok(Self::Npc(EntityId(id))),
            ("location", Some(id)) => Ok(Self::Location(PlaceId(id))),
            ("npc", None) | ("location", None) => {
                Err(format!("scope kind {kind} requires a reference id"))
            }
            (other, _) => Err(format!("unknown scope kind: {other}")),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::World => f.write_str("world"),
            Self::Npc(id) => write!(f, "npc:{id}"),
            Self::Location(id) => write!(f, "location:{id}"),
        }
    }
}

/// One entry in the append-only fact ledger.
///
/// `text` and `embedding` are immutable after creation; the only permitted
/// mutations are monotonic importance revision and supersession by a newer
/// fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub scope: Scope,
    /// The atomic narrative statement.
    pub text: String,
    /// Fixed-dimensionality vector, computed once at append.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Logical turn counter at insertion. Drives recency decay.
    pub created_turn: u64,
    /// Salience in `[0.0, 1.0]`. Revised upward only, never decreased.
    pub importance: f64,
    /// Set when a newer fact (e.g. a summary) replaces this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<FactId>,
    /// RFC 3339 wall-clock timestamp, for the audit trail only.
    pub created_at: String,
}

/// Unstored fact produced by the extraction collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct FactDraft {
    pub scope: Scope,
    pub text: String,
    pub importance: f64,
}

impl FactDraft {
    pub fn new(scope: Scope, text: impl Into<String>, importance: f64) -> Self {
        Self {
            scope,
            text: text.into(),
            importance: importance.clamp(0.0, 1.0),
        }
    }
}

/// A fact paired with its relevance score for one query. Ephemeral.
#[derive(Debug, Clone)]
pub struct ScoredFact {
    pub fact: Fact,
    pub score: f64,
    /// Individual scoring terms, kept for diagnostics.
    pub similarity: f64,
    pub recency: f64,
}

/// One finalized turn: the player's input and the generated narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEntry {
    pub turn: u64,
    pub player_input: String,
    pub narrative: String,
}

/// Scored facts retrieved for one scope partition.
#[derive(Debug, Clone)]
pub struct ScopedRecall {
    /// The scope this section was queried under. `None` means the unfiltered
    /// whole-store pool.
    pub scope: Option<Scope>,
    pub facts: Vec<ScoredFact>,
}

/// Everything `retrieve` hands to the validation and generation stages.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Top-k facts per queried scope, world first.
    pub sections: Vec<ScopedRecall>,
    /// Snapshot of the working-memory window at retrieval time.
    pub window: Vec<TurnEntry>,
    /// True when embedding was unavailable and scoring fell back to
    /// lexical overlap.
    pub degraded: bool,
}

impl RetrievalResult {
    /// All retrieved facts across sections, highest score first.
    pub fn ranked_facts(&self) -> Vec<&ScoredFact> {
        let mut all: Vec<&ScoredFact> = self
            .sections
            .iter()
            .flat_map(|s| s.facts.iter())
            .collect();
        all.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        all
    }

    /// Total number of retrieved facts across all sections.
    pub fn fact_count(&self) -> usize {
        self.sections.iter().map(|s| s.facts.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_sql_round_trip() {
        let scopes = [
            Scope::World,
            Scope::Npc(EntityId::new("aldric")),
            Scope::Location(PlaceId::new("emberfall_tower")),
        ];
        for scope in scopes {
            let rebuilt = Scope::from_parts(
                scope.kind_str(),
                scope.ref_str().map(str::to_string),
            )
            .unwrap();
            assert_eq!(rebuilt, scope);
        }
    }

    #[test]
    fn scoped_kind_without_ref_is_rejected() {
        assert!(Scope::from_parts("npc", None).is_err());
        assert!(Scope::from_parts("location", None).is_err());
        assert!(Scope::from_parts("tavern", Some("x".into())).is_err());
    }

    #[test]
    fn draft_clamps_importance() {
        let draft = FactDraft::new(Scope::World, "The gate opened", 1.7);
        assert_eq!(draft.importance, 1.0);
        let draft = FactDraft::new(Scope::World, "The gate opened", -0.2);
        assert_eq!(draft.importance, 0.0);
    }

    #[test]
    fn fact_ids_are_unique() {
        let a = FactId::new();
        let b = FactId::new();
        assert_ne!(a, b);
    }
}
