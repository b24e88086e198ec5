use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PlayerId;
use crate::time::now_ms;

/// Recognized combat event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatEventKind {
    MatchStarted,
    MatchEnded,
    ProjectileFired,
    ProjectileHit,
    PlayerDamaged,
    PlayerKilled,
}

/// An immutable record emitted by the combat engine.
///
/// The event log is append-only during a match and cleared on reset.
/// Collaborators (statistics UI, logging, reward computation) consume these;
/// the engine never reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    pub id: Uuid,
    pub kind: CombatEventKind,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl CombatEvent {
    pub fn new(kind: CombatEventKind, player_id: Option<PlayerId>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp_ms: now_ms(),
            player_id,
            data,
        }
    }
}
