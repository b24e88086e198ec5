use serde::{Deserialize, Serialize};

/// Data-driven tunables for the combat engine (projectile feel, escalation
/// curves, stat seeding). Arena-specific physics live in `ArenaSettings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Projectile speed before synergy speed multipliers (units/s).
    pub projectile_base_speed: f32,
    /// Projectile collision radius.
    pub projectile_size: f32,
    /// Player collision radius.
    pub player_radius: f32,
    /// Trail ring length kept per projectile for rendering.
    pub trail_len: usize,
    /// Bounces allowed before a projectile dies.
    pub max_bounces: u32,
    /// Flat health every player starts from before deck health is added.
    pub base_player_health: u32,
    /// Flat shield every player starts from before deck defense is added.
    pub base_player_shield: u32,
    /// Flat damage added to the deck's per-card average attack.
    pub base_projectile_damage: u32,
    /// Damage multiplier for a lucky (critical) shot.
    pub crit_multiplier: f32,
    /// Aim offset scale for AI shots at zero accuracy bonus (units).
    pub aim_jitter: f32,
    /// Per-second multiplicative speed ramp while in sudden death
    /// (0.05 = +5% per second, applied to newly fired projectiles).
    pub sudden_death_speed_ramp: f32,
    /// Per-second multiplicative damage ramp while in sudden death.
    pub sudden_death_damage_ramp: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            projectile_base_speed: 300.0,
            projectile_size: 8.0,
            player_radius: 20.0,
            trail_len: 10,
            max_bounces: 3,
            base_player_health: 100,
            base_player_shield: 30,
            base_projectile_damage: 8,
            crit_multiplier: 1.5,
            aim_jitter: 60.0,
            sudden_death_speed_ramp: 0.04,
            sudden_death_damage_ramp: 0.06,
        }
    }
}

impl CombatConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("EMOJICLASH_COMBAT_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        if let Ok(contents) = std::fs::read_to_string("config/combat.toml")
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        Self::default()
    }
}
