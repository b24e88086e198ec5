use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use emojiclash_core::PlayerId;
use emojiclash_core::player::{Difficulty, PlayerProfile};

use crate::entities::CombatPlayer;
use crate::physics::Vec2;

/// Fixed behavior profile for an AI-controlled combatant.
#[derive(Debug, Clone)]
pub struct AiProfile {
    /// Probability of firing when a reaction window opens, in [0, 1].
    pub aggressiveness: f32,
    /// Aim precision in [0, 1]; jitter shrinks as this grows.
    pub accuracy_bonus: f32,
    /// Minimum time between actions.
    pub reaction_time_ms: f32,
    /// Preferred projectile emoji, matched against the deck's pool.
    pub emoji_preference: Vec<String>,
    /// Defensive bots only fire at targets weaker than themselves.
    pub defensive: bool,
}

impl AiProfile {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                aggressiveness: 0.5,
                accuracy_bonus: 0.2,
                reaction_time_ms: 1200.0,
                emoji_preference: Vec::new(),
                defensive: true,
            },
            Difficulty::Medium => Self {
                aggressiveness: 0.7,
                accuracy_bonus: 0.5,
                reaction_time_ms: 800.0,
                emoji_preference: Vec::new(),
                defensive: false,
            },
            Difficulty::Hard => Self {
                aggressiveness: 0.85,
                accuracy_bonus: 0.75,
                reaction_time_ms: 450.0,
                emoji_preference: Vec::new(),
                defensive: false,
            },
            Difficulty::Boss => Self {
                aggressiveness: 1.0,
                accuracy_bonus: 0.9,
                reaction_time_ms: 300.0,
                emoji_preference: vec!["👑".to_string(), "🔥".to_string()],
                defensive: false,
            },
        }
    }
}

/// A request to fire, produced by the AI and consumed by the engine.
/// The AI never mutates engine state directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireRequest {
    pub shooter: PlayerId,
    pub target: PlayerId,
    pub aim_point: Vec2,
}

/// Per-bot decision state.
#[derive(Debug)]
struct AiOpponent {
    player_id: PlayerId,
    profile: AiProfile,
    last_action_ms: f64,
}

impl AiOpponent {
    fn poll(
        &mut self,
        now_ms: f64,
        players: &[CombatPlayer],
        aim_jitter: f32,
        rng: &mut StdRng,
    ) -> Option<FireRequest> {
        if now_ms - self.last_action_ms < self.profile.reaction_time_ms as f64 {
            return None;
        }

        let me = players
            .iter()
            .find(|p| p.id == self.player_id && p.is_alive)?;

        let target = nearest_living_enemy(me, players)?;

        // The window is consumed whether or not a shot comes out of it.
        self.last_action_ms = now_ms;

        if self.profile.defensive && target.health >= me.health {
            return None;
        }
        if rng.random_range(0.0..1.0) >= self.profile.aggressiveness {
            return None;
        }

        let jitter = aim_jitter * (1.0 - self.profile.accuracy_bonus);
        let aim_point = Vec2::new(
            target.position.x + rng.random_range(-1.0..=1.0) * jitter,
            target.position.y + rng.random_range(-1.0..=1.0) * jitter,
        );

        Some(FireRequest {
            shooter: self.player_id,
            target: target.id,
            aim_point,
        })
    }
}

/// Select the nearest living enemy by Euclidean distance.
fn nearest_living_enemy<'a>(
    me: &CombatPlayer,
    players: &'a [CombatPlayer],
) -> Option<&'a CombatPlayer> {
    players
        .iter()
        .filter(|p| p.id != me.id && p.is_alive)
        .min_by(|a, b| {
            let da = a.position.distance(me.position);
            let db = b.position.distance(me.position);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// Owns the AI decision state for one match. One director per engine
/// instance; there is no shared global AI service.
#[derive(Debug)]
pub struct AiDirector {
    opponents: Vec<AiOpponent>,
    rng: StdRng,
}

impl AiDirector {
    pub fn new(seed: u64) -> Self {
        Self {
            opponents: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Rebuild the roster from match profiles. Non-bot profiles are ignored.
    pub fn rebuild(&mut self, profiles: &[PlayerProfile]) {
        self.opponents = profiles
            .iter()
            .filter(|p| p.is_bot)
            .map(|p| AiOpponent {
                player_id: p.id,
                profile: AiProfile::for_difficulty(p.difficulty.unwrap_or_default()),
                last_action_ms: 0.0,
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.opponents.clear();
    }

    /// Preferred emoji for a bot's projectiles, constrained to its deck pool.
    pub fn preferred_emoji(&self, player_id: PlayerId, pool: &[String]) -> Option<String> {
        let opponent = self.opponents.iter().find(|o| o.player_id == player_id)?;
        opponent
            .profile
            .emoji_preference
            .iter()
            .find(|e| pool.contains(e))
            .cloned()
    }

    /// Ask every bot whether it wants to fire this tick.
    pub fn poll(
        &mut self,
        now_ms: f64,
        players: &[CombatPlayer],
        aim_jitter: f32,
    ) -> SmallVec<[FireRequest; 4]> {
        let mut requests = SmallVec::new();
        for opponent in &mut self.opponents {
            if let Some(req) = opponent.poll(now_ms, players, aim_jitter, &mut self.rng) {
                requests.push(req);
            }
        }
        requests
    }
}
