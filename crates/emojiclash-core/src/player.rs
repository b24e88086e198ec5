use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// A combatant as known to the lobby, before the engine builds its own state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub username: String,
    pub is_bot: bool,
    /// Only meaningful when `is_bot` is true.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

/// AI opponent difficulty tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Boss,
}
