use serde::{Deserialize, Serialize};

use emojiclash_core::ObstacleId;

use crate::error::CombatError;
use crate::physics::Vec2;

/// Obstacle behavior on projectile contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    /// Absorbs the projectile and takes its damage.
    Solid,
    /// Reflects the projectile like an arena boundary.
    Bouncy,
}

/// A destructible axis-aligned rectangle inside the playfield.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    /// Top-left corner.
    pub position: Vec2,
    pub size: Vec2,
    pub kind: ObstacleKind,
    pub health: u32,
    pub max_health: u32,
}

impl Obstacle {
    pub fn min(&self) -> Vec2 {
        self.position
    }

    pub fn max(&self) -> Vec2 {
        self.position + self.size
    }
}

/// Physics and pacing tunables carried by the arena configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    /// Downward acceleration applied to projectile vertical velocity (units/s²).
    /// Zero for top-down arenas.
    pub gravity: f32,
    /// Per-second velocity retention in [0, 1]. 1.0 = no drag.
    pub friction: f32,
    /// Bounce energy retention in [0, 1].
    pub bounce_multiplier: f32,
    /// Cap on simultaneously live projectiles; firing past it is a no-op.
    pub max_projectiles: usize,
    /// Target simulation rate in Hz for the external driver.
    pub tick_rate: f32,
    pub round_duration_ms: u64,
    /// Escalation kicks in once time remaining drops below this.
    pub sudden_death_time_ms: u64,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            gravity: 0.0,
            friction: 1.0,
            bounce_multiplier: 0.85,
            max_projectiles: 64,
            tick_rate: 60.0,
            round_duration_ms: 90_000,
            sudden_death_time_ms: 15_000,
        }
    }
}

/// Static playfield configuration: bounds, obstacles, spawns, physics constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    pub player_spawns: Vec<Vec2>,
    #[serde(default)]
    pub settings: ArenaSettings,
}

impl Arena {
    /// Check the arena can host `player_count` combatants.
    pub fn validate(&self, player_count: usize) -> Result<(), CombatError> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(CombatError::Configuration(format!(
                "arena bounds must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.player_spawns.len() < player_count {
            return Err(CombatError::Configuration(format!(
                "arena has {} spawn points for {player_count} players",
                self.player_spawns.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.settings.friction) {
            return Err(CombatError::Configuration(format!(
                "friction must be in [0, 1], got {}",
                self.settings.friction
            )));
        }
        if !(0.0..=1.0).contains(&self.settings.bounce_multiplier) {
            return Err(CombatError::Configuration(format!(
                "bounce_multiplier must be in [0, 1], got {}",
                self.settings.bounce_multiplier
            )));
        }
        for spawn in &self.player_spawns {
            if spawn.x < 0.0 || spawn.x > self.width || spawn.y < 0.0 || spawn.y > self.height {
                return Err(CombatError::Configuration(format!(
                    "spawn point ({}, {}) outside arena bounds",
                    spawn.x, spawn.y
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }
}

/// A plain two-player dueling ground with a solid block mid-field and a
/// bouncy pillar above it.
pub fn default_arena() -> Arena {
    Arena {
        width: 800.0,
        height: 600.0,
        obstacles: vec![
            Obstacle {
                id: 1,
                position: Vec2::new(380.0, 250.0),
                size: Vec2::new(40.0, 100.0),
                kind: ObstacleKind::Solid,
                health: 120,
                max_health: 120,
            },
            Obstacle {
                id: 2,
                position: Vec2::new(370.0, 80.0),
                size: Vec2::new(60.0, 60.0),
                kind: ObstacleKind::Bouncy,
                health: 1,
                max_health: 1,
            },
        ],
        player_spawns: vec![Vec2::new(100.0, 300.0), Vec2::new(700.0, 300.0)],
        settings: ArenaSettings::default(),
    }
}

/// An empty arena with no obstacles, for tests and drills.
pub fn open_arena(width: f32, height: f32) -> Arena {
    Arena {
        width,
        height,
        obstacles: Vec::new(),
        player_spawns: vec![
            Vec2::new(width * 0.125, height * 0.5),
            Vec2::new(width * 0.875, height * 0.5),
        ],
        settings: ArenaSettings::default(),
    }
}
