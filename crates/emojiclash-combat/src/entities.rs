use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use emojiclash_core::card::EffectSlot;
use emojiclash_core::{PlayerId, ProjectileId};

use crate::physics::Vec2;

/// A combatant inside a running match. Built by the engine at `initialize`
/// from a deck's synergy-modified stats; mutated only by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatPlayer {
    pub id: PlayerId,
    pub username: String,
    pub is_bot: bool,
    pub position: Vec2,
    pub health: u32,
    pub max_health: u32,
    pub shield: u32,
    pub max_shield: u32,
    pub is_alive: bool,
    /// Per-projectile damage after synergy multipliers.
    pub damage: u32,
    /// Projectile launch speed after synergy multipliers (units/s).
    pub projectile_speed: f32,
    /// Shots per second.
    pub attack_speed: f32,
    /// Critical shot chance in [0, 1].
    pub luck: f32,
    /// Emoji drawn for this player's projectiles.
    pub emoji: String,
    /// On-hit effects carried by this player's projectiles.
    pub effect_loadout: Vec<EffectSlot>,
    pub piercing: bool,
    /// Runtime cooldown until the next shot is allowed.
    pub fire_cooldown_ms: f32,
    // Accumulated match stats.
    pub kills: u32,
    pub damage_dealt: u32,
    pub shots_fired: u32,
    pub shots_hit: u32,
}

impl CombatPlayer {
    /// shots_hit / shots_fired, or 0 before the first shot.
    pub fn accuracy(&self) -> f32 {
        if self.shots_fired == 0 {
            return 0.0;
        }
        self.shots_hit as f32 / self.shots_fired as f32
    }

    /// Apply damage, depleting shield before health. Health clamps at 0.
    /// Returns the amount that reached health.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let absorbed = amount.min(self.shield);
        self.shield -= absorbed;
        let overflow = amount - absorbed;
        let health_lost = overflow.min(self.health);
        self.health -= health_lost;
        health_lost
    }

    /// Damage that skips the shield entirely (burn ticks).
    pub fn take_direct_damage(&mut self, amount: u32) -> u32 {
        let health_lost = amount.min(self.health);
        self.health -= health_lost;
        health_lost
    }
}

/// A live emoji projectile. Deactivated on exceeding its bounce budget,
/// scoring a non-piercing hit, or being absorbed by a solid obstacle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: ProjectileId,
    pub owner_id: PlayerId,
    pub emoji: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: u32,
    pub size: f32,
    pub rotation: f32,
    /// Bounded ring of recent positions for trail rendering.
    pub trail: VecDeque<Vec2>,
    pub bounces: u32,
    pub max_bounces: u32,
    pub effects: Vec<EffectSlot>,
    pub piercing: bool,
    /// Players this projectile has already damaged. A piercing projectile
    /// keeps flying after a hit but never touches the same player twice.
    #[serde(default)]
    pub hit_players: SmallVec<[PlayerId; 2]>,
    pub is_active: bool,
}

impl Projectile {
    /// Record the current position in the trail ring, evicting the oldest.
    pub fn push_trail(&mut self, cap: usize) {
        self.trail.push_back(self.position);
        while self.trail.len() > cap {
            self.trail.pop_front();
        }
    }

    /// Count a bounce. A bounce past the budget deactivates the projectile
    /// instead of incrementing, so `bounces` never exceeds `max_bounces`.
    pub fn register_bounce(&mut self) {
        if self.bounces >= self.max_bounces {
            self.is_active = false;
        } else {
            self.bounces += 1;
        }
    }
}

/// Payload of a running status effect. Closed set, matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Burn { dps: u32 },
    Slow { factor: f32 },
    LuckyChance { bonus: f32 },
}

/// A status effect attached to a player. Removed when its duration runs out
/// or the target dies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: u64,
    pub target_id: PlayerId,
    /// Who applied the effect; burn kills are credited here.
    pub source_id: PlayerId,
    pub kind: EffectKind,
    pub remaining_ms: f32,
    /// Fractional burn damage carried between ticks.
    #[serde(default)]
    pub carry: f32,
}

impl ActiveEffect {
    pub fn from_slot(
        id: u64,
        target_id: PlayerId,
        source_id: PlayerId,
        slot: &EffectSlot,
    ) -> Option<Self> {
        let (kind, duration_ms) = match slot {
            EffectSlot::Burn { dps, duration_ms } => (EffectKind::Burn { dps: *dps }, *duration_ms),
            EffectSlot::Slow {
                factor,
                duration_ms,
            } => (EffectKind::Slow { factor: *factor }, *duration_ms),
            EffectSlot::LuckyChance { bonus, duration_ms } => {
                (EffectKind::LuckyChance { bonus: *bonus }, *duration_ms)
            },
            // Pierce is a projectile property, not a status effect.
            EffectSlot::Pierce => return None,
        };
        Some(Self {
            id,
            target_id,
            source_id,
            kind,
            remaining_ms: duration_ms as f32,
            carry: 0.0,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_ms <= 0.0
    }
}
