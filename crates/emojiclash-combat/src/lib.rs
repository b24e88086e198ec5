pub mod ai;
pub mod arena;
pub mod config;
pub mod controller;
pub mod entities;
pub mod error;
pub mod physics;
pub mod stats;
pub mod synergy;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use emojiclash_core::card::{Deck, EffectSlot};
use emojiclash_core::events::{CombatEvent, CombatEventKind};
use emojiclash_core::player::PlayerProfile;
use emojiclash_core::{PlayerId, ProjectileId};

use ai::AiDirector;
use arena::{Arena, ArenaSettings, ObstacleKind};
use config::CombatConfig;
use entities::{ActiveEffect, CombatPlayer, EffectKind, Projectile};
use error::CombatError;
use physics::{Axis, Vec2, advance_position, ray_aabb_intersection, ray_circle_intersection, reflect};
use stats::{CombatStats, EventLog, StatsAggregator};
use synergy::{SynergyModifier, SynergyRuleSet, default_rule_sets, resolve_modifier};

/// Per-call cap on `dt`, so long stalls cannot tunnel projectiles through
/// thin geometry.
pub const MAX_DT_MS: f32 = 100.0;

/// Match lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Initialized,
    Running,
    Paused,
    Ended,
}

/// One side of a match: who is fighting and with what deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSeat {
    pub profile: PlayerProfile,
    pub deck: Deck,
}

/// Read-only copy of simulation state published once per tick. Owned data;
/// readers can never reach back into the live engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub phase: Phase,
    pub players: Vec<CombatPlayer>,
    pub projectiles: Vec<Projectile>,
    pub active_effects: Vec<ActiveEffect>,
    pub time_remaining_ms: u64,
    pub winner: Option<PlayerId>,
}

/// The tick-driven combat simulation. Single logical thread: `advance` is
/// not reentrant, and external commands are applied between ticks by the
/// `MatchController`.
pub struct CombatEngine {
    phase: Phase,
    combat_config: CombatConfig,
    rule_sets: Vec<SynergyRuleSet>,
    arena: Option<Arena>,
    players: Vec<CombatPlayer>,
    projectiles: Vec<Projectile>,
    effects: Vec<ActiveEffect>,
    ai: AiDirector,
    log: EventLog,
    aggregator: StatsAggregator,
    /// Fire requests from human-controlled players, consumed next tick.
    pending_fires: Vec<(PlayerId, Vec2)>,
    /// Simulation clock in ms since `start`; drives AI reaction windows.
    clock_ms: f64,
    time_remaining_ms: f64,
    sudden_death_elapsed_ms: f64,
    winner: Option<PlayerId>,
    next_projectile_id: ProjectileId,
    next_effect_id: u64,
    rng: StdRng,
}

impl CombatEngine {
    pub fn new() -> Self {
        Self::with_config(CombatConfig::load())
    }

    pub fn with_config(config: CombatConfig) -> Self {
        Self::with_config_and_seed(config, emojiclash_core::time::now_ms())
    }

    /// Fixed-seed constructor for reproducible tests.
    pub fn with_config_and_seed(config: CombatConfig, seed: u64) -> Self {
        Self {
            phase: Phase::Idle,
            combat_config: config,
            rule_sets: default_rule_sets(),
            arena: None,
            players: Vec::new(),
            projectiles: Vec::new(),
            effects: Vec::new(),
            ai: AiDirector::new(seed),
            log: EventLog::default(),
            aggregator: StatsAggregator::default(),
            pending_fires: Vec::new(),
            clock_ms: 0.0,
            time_remaining_ms: 0.0,
            sudden_death_elapsed_ms: 0.0,
            winner: None,
            next_projectile_id: 1,
            next_effect_id: 1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &CombatConfig {
        &self.combat_config
    }

    /// Replace the synergy library. Only meaningful before `initialize`.
    pub fn set_rule_sets(&mut self, rule_sets: Vec<SynergyRuleSet>) {
        self.rule_sets = rule_sets;
    }

    pub fn stats(&self) -> CombatStats {
        self.aggregator.stats()
    }

    /// Events appended since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        self.log.drain_new()
    }

    /// Bounded trailing view of the event log for UI display.
    pub fn recent_events(&self, n: usize) -> &[CombatEvent] {
        self.log.recent(n)
    }

    /// Build players and arena state from synergy-modified decks.
    /// The only command that surfaces errors synchronously.
    pub fn initialize(
        &mut self,
        arena: Arena,
        seat_a: MatchSeat,
        seat_b: MatchSeat,
    ) -> Result<(), CombatError> {
        if self.phase != Phase::Idle {
            return Err(CombatError::InvalidTransition {
                from: self.phase,
                command: "initialize",
            });
        }
        arena.validate(2)?;
        for seat in [&seat_a, &seat_b] {
            if seat.deck.is_empty() {
                return Err(CombatError::Configuration(format!(
                    "player '{}' has an empty deck",
                    seat.profile.username
                )));
            }
        }
        if seat_a.profile.id == seat_b.profile.id {
            return Err(CombatError::Configuration(format!(
                "both seats share player id {}",
                seat_a.profile.id
            )));
        }

        self.ai
            .rebuild(&[seat_a.profile.clone(), seat_b.profile.clone()]);

        self.players.clear();
        for (i, seat) in [seat_a, seat_b].into_iter().enumerate() {
            let (modifier, _activations) = resolve_modifier(&seat.deck, &self.rule_sets);
            let spawn = arena.player_spawns[i];
            let player = self.build_player(&seat, spawn, &modifier);
            self.players.push(player);
        }

        self.time_remaining_ms = arena.settings.round_duration_ms as f64;
        self.arena = Some(arena);
        self.projectiles.clear();
        self.effects.clear();
        self.pending_fires.clear();
        self.log.clear();
        self.aggregator.reset();
        self.clock_ms = 0.0;
        self.sudden_death_elapsed_ms = 0.0;
        self.winner = None;
        self.next_projectile_id = 1;
        self.next_effect_id = 1;
        self.phase = Phase::Initialized;
        Ok(())
    }

    fn build_player(
        &self,
        seat: &MatchSeat,
        spawn: Vec2,
        modifier: &SynergyModifier,
    ) -> CombatPlayer {
        let deck = &seat.deck;
        let config = &self.combat_config;
        let avg_attack = deck.total_attack() / deck.len().max(1) as u32;
        let pool = deck.emoji_pool();
        let emoji = if seat.profile.is_bot {
            self.ai.preferred_emoji(seat.profile.id, &pool)
        } else {
            None
        }
        .or_else(|| pool.first().cloned())
        .unwrap_or_else(|| "⚔️".to_string());

        CombatPlayer {
            id: seat.profile.id,
            username: seat.profile.username.clone(),
            is_bot: seat.profile.is_bot,
            position: spawn,
            health: modifier.scale_health(config.base_player_health + deck.total_health()),
            max_health: modifier.scale_health(config.base_player_health + deck.total_health()),
            shield: config.base_player_shield + deck.total_defense(),
            max_shield: config.base_player_shield + deck.total_defense(),
            is_alive: true,
            damage: modifier.scale_damage(config.base_projectile_damage + avg_attack),
            projectile_speed: config.projectile_base_speed * modifier.speed_mult.max(0.1),
            attack_speed: deck.average_attack_speed().max(0.1),
            luck: ((modifier.luck_mult - 1.0) + modifier.special_chance).clamp(0.0, 1.0),
            emoji,
            effect_loadout: deck.effect_slots(),
            piercing: deck
                .effect_slots()
                .iter()
                .any(|s| matches!(s, EffectSlot::Pierce)),
            fire_cooldown_ms: 0.0,
            kills: 0,
            damage_dealt: 0,
            shots_fired: 0,
            shots_hit: 0,
        }
    }

    /// Begin the round. Records the start and emits `match_started`.
    pub fn start(&mut self) -> Result<(), CombatError> {
        if self.phase != Phase::Initialized {
            return Err(CombatError::InvalidTransition {
                from: self.phase,
                command: "start",
            });
        }
        self.phase = Phase::Running;
        self.emit(
            CombatEventKind::MatchStarted,
            None,
            serde_json::json!({ "players": self.players.iter().map(|p| p.id).collect::<Vec<_>>() }),
        );
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), CombatError> {
        if self.phase != Phase::Running {
            return Err(CombatError::InvalidTransition {
                from: self.phase,
                command: "pause",
            });
        }
        self.phase = Phase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), CombatError> {
        if self.phase != Phase::Paused {
            return Err(CombatError::InvalidTransition {
                from: self.phase,
                command: "resume",
            });
        }
        self.phase = Phase::Running;
        Ok(())
    }

    /// Force the match to an end with an optional winner. Valid from every
    /// phase except `Ended`, so the outcome is only ever announced once.
    pub fn end(&mut self, winner: Option<PlayerId>) -> Result<(), CombatError> {
        match self.phase {
            Phase::Idle | Phase::Initialized | Phase::Running | Phase::Paused => {
                self.winner = winner;
                self.finish_match();
                Ok(())
            },
            Phase::Ended => Err(CombatError::InvalidTransition {
                from: self.phase,
                command: "end",
            }),
        }
    }

    /// Clear all entity lists and events and return to `Idle`.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.arena = None;
        self.players.clear();
        self.projectiles.clear();
        self.effects.clear();
        self.pending_fires.clear();
        self.ai.clear();
        self.log.clear();
        self.aggregator.reset();
        self.clock_ms = 0.0;
        self.time_remaining_ms = 0.0;
        self.sudden_death_elapsed_ms = 0.0;
        self.winner = None;
        self.next_projectile_id = 1;
        self.next_effect_id = 1;
    }

    /// Queue a fire request for a human-controlled player, consumed at the
    /// start of the next tick.
    pub fn queue_fire(&mut self, player_id: PlayerId, aim_point: Vec2) {
        self.pending_fires.push((player_id, aim_point));
    }

    /// Publish an owned copy of the current state.
    pub fn snapshot(&self) -> CombatSnapshot {
        CombatSnapshot {
            phase: self.phase,
            players: self.players.clone(),
            projectiles: self.projectiles.clone(),
            active_effects: self.effects.clone(),
            time_remaining_ms: self.time_remaining_ms.max(0.0) as u64,
            winner: self.winner,
        }
    }

    /// Compact snapshot encoding for external collaborators.
    pub fn snapshot_bytes(&self) -> Vec<u8> {
        rmp_serde::to_vec(&self.snapshot()).unwrap_or_default()
    }

    /// Advance the simulation by `dt` seconds. Only steps in `Running`;
    /// anything else is a logged no-op that still returns a snapshot.
    /// Nothing in this path may panic or return an error.
    pub fn advance(&mut self, dt: f32) -> CombatSnapshot {
        if self.phase != Phase::Running {
            tracing::debug!(phase = ?self.phase, "advance ignored outside running phase");
            return self.snapshot();
        }
        let dt = if dt.is_finite() { dt } else { 0.0 };
        let dt = dt.clamp(0.0, MAX_DT_MS / 1000.0);
        let dt_ms = dt * 1000.0;
        self.clock_ms += dt_ms as f64;

        let Some(mut arena) = self.arena.take() else {
            tracing::debug!("advance called with no arena loaded");
            return self.snapshot();
        };
        let settings = arena.settings.clone();

        // 1. Cooldowns, then fire requests: queued human fires first, then AI.
        for player in &mut self.players {
            player.fire_cooldown_ms = (player.fire_cooldown_ms - dt_ms).max(0.0);
        }
        let mut fires: Vec<(PlayerId, Vec2)> = std::mem::take(&mut self.pending_fires);
        for request in self
            .ai
            .poll(self.clock_ms, &self.players, self.combat_config.aim_jitter)
        {
            fires.push((request.shooter, request.aim_point));
        }
        for (shooter, aim) in fires {
            self.try_fire(shooter, aim, &settings);
        }

        // 2 + 3. Integrate and collide, one collision per projectile per tick.
        let mut deaths: Vec<(PlayerId, PlayerId)> = Vec::new();
        let mut projectiles = std::mem::take(&mut self.projectiles);
        for proj in &mut projectiles {
            if !proj.is_active {
                continue;
            }
            self.step_projectile(proj, &mut arena, &settings, dt, &mut deaths);
        }
        projectiles.retain(|p| p.is_active);
        self.projectiles = projectiles;
        arena.obstacles.retain(|o| o.health > 0);

        // 4. Status effects.
        self.tick_effects(dt, &mut deaths);

        // 5. Deaths.
        self.apply_deaths(deaths);
        let still_alive: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.is_alive)
            .map(|p| p.id)
            .collect();
        self.effects
            .retain(|e| !e.is_expired() && still_alive.contains(&e.target_id));

        // 6. Win conditions.
        if still_alive.len() <= 1 {
            self.winner = still_alive.first().copied();
            self.finish_match();
        } else if self.time_remaining_ms <= 0.0 {
            self.winner = winner_by_health(&self.players);
            self.finish_match();
        }

        // 7. Round timer and sudden-death bookkeeping.
        if self.phase == Phase::Running {
            self.time_remaining_ms -= dt_ms as f64;
            if self.time_remaining_ms <= settings.sudden_death_time_ms as f64 {
                self.sudden_death_elapsed_ms += dt_ms as f64;
            }
        }

        self.arena = Some(arena);
        self.aggregator.observe_tick(dt_ms as f64);
        self.snapshot()
    }

    /// Speed and damage escalation factors for newly fired projectiles.
    /// Ramps are per-second tunables; 1.0 outside sudden death.
    fn sudden_death_factors(&self) -> (f32, f32) {
        let elapsed_s = (self.sudden_death_elapsed_ms / 1000.0) as f32;
        if elapsed_s <= 0.0 {
            return (1.0, 1.0);
        }
        (
            1.0 + self.combat_config.sudden_death_speed_ramp * elapsed_s,
            1.0 + self.combat_config.sudden_death_damage_ramp * elapsed_s,
        )
    }

    fn try_fire(&mut self, shooter: PlayerId, aim: Vec2, settings: &ArenaSettings) {
        if self.projectiles.iter().filter(|p| p.is_active).count() >= settings.max_projectiles {
            tracing::debug!(shooter, "projectile cap reached, fire request dropped");
            return;
        }
        let (speed_factor, damage_factor) = self.sudden_death_factors();
        let luck = {
            let Some(player) = self.players.iter().find(|p| p.id == shooter && p.is_alive) else {
                tracing::debug!(shooter, "fire request from missing or dead player skipped");
                return;
            };
            if player.fire_cooldown_ms > 0.0 {
                return;
            }
            effective_luck(player, &self.effects)
        };
        let crit = self.rng.random_range(0.0f32..1.0) < luck;

        let Some(player) = self.players.iter_mut().find(|p| p.id == shooter) else {
            return;
        };
        let cooldown_ms = 1000.0 / effective_attack_speed_of(player, &self.effects).max(0.01);
        player.fire_cooldown_ms = cooldown_ms;
        player.shots_fired += 1;

        let dir = {
            let d = (aim - player.position).normalized();
            if d == Vec2::ZERO { Vec2::new(1.0, 0.0) } else { d }
        };
        let mut damage = player.damage as f32 * damage_factor;
        if crit {
            damage *= self.combat_config.crit_multiplier;
        }
        let projectile = Projectile {
            id: self.next_projectile_id,
            owner_id: player.id,
            emoji: player.emoji.clone(),
            position: player.position,
            velocity: dir.scale(player.projectile_speed * speed_factor),
            damage: damage.round() as u32,
            size: self.combat_config.projectile_size,
            rotation: 0.0,
            trail: std::collections::VecDeque::new(),
            bounces: 0,
            max_bounces: self.combat_config.max_bounces,
            effects: player.effect_loadout.clone(),
            piercing: player.piercing,
            hit_players: SmallVec::new(),
            is_active: true,
        };
        self.next_projectile_id += 1;
        let projectile_id = projectile.id;
        let emoji = projectile.emoji.clone();
        self.projectiles.push(projectile);
        self.emit(
            CombatEventKind::ProjectileFired,
            Some(shooter),
            serde_json::json!({
                "projectile_id": projectile_id,
                "emoji": emoji,
                "crit": crit,
            }),
        );
    }

    /// Integrate one projectile and resolve at most one collision
    /// (closest-first along this tick's travel).
    fn step_projectile(
        &mut self,
        proj: &mut Projectile,
        arena: &mut Arena,
        settings: &ArenaSettings,
        dt: f32,
        deaths: &mut Vec<(PlayerId, PlayerId)>,
    ) {
        proj.velocity.y += settings.gravity * dt;
        if settings.friction < 1.0 {
            proj.velocity = proj.velocity.scale(settings.friction.powf(dt));
        }

        let old = proj.position;
        let new = advance_position(old, proj.velocity, dt);
        let travel = new - old;
        let travel_len = travel.length();
        let dir = travel.normalized();

        enum Contact {
            Player(usize),
            Obstacle(usize, Axis),
        }
        let mut nearest: Option<(f32, Contact)> = None;

        if travel_len > 1e-6 {
            let hit_radius = self.combat_config.player_radius + proj.size;
            for (i, target) in self.players.iter().enumerate() {
                if target.id == proj.owner_id
                    || !target.is_alive
                    || proj.hit_players.contains(&target.id)
                {
                    continue;
                }
                if let Some(t) = ray_circle_intersection(old, dir, target.position, hit_radius)
                    && t <= travel_len
                    && nearest.as_ref().is_none_or(|(best, _)| t < *best)
                {
                    nearest = Some((t, Contact::Player(i)));
                }
            }
            for (i, obstacle) in arena.obstacles.iter().enumerate() {
                let pad = Vec2::new(proj.size, proj.size);
                if let Some((t, axis)) =
                    ray_aabb_intersection(old, dir, obstacle.min() - pad, obstacle.max() + pad)
                    && t <= travel_len
                    && nearest.as_ref().is_none_or(|(best, _)| t < *best)
                {
                    nearest = Some((t, Contact::Obstacle(i, axis)));
                }
            }
        }

        match nearest {
            Some((t, Contact::Player(i))) => {
                proj.position = advance_position(old, dir, t);
                self.aggregator.record_collision();
                self.resolve_player_hit(proj, i, deaths);
            },
            Some((t, Contact::Obstacle(i, axis))) => {
                proj.position = advance_position(old, dir, t);
                self.aggregator.record_collision();
                let obstacle = &mut arena.obstacles[i];
                match obstacle.kind {
                    ObstacleKind::Bouncy => {
                        proj.register_bounce();
                        if proj.is_active {
                            proj.velocity = reflect(proj.velocity, axis, settings.bounce_multiplier);
                        }
                    },
                    ObstacleKind::Solid => {
                        obstacle.health = obstacle.health.saturating_sub(proj.damage);
                        proj.is_active = false;
                    },
                }
            },
            None => {
                proj.position = new;
                let r = proj.size;
                let bounce_axis = if proj.position.x < r {
                    proj.position.x = r;
                    Some(Axis::X)
                } else if proj.position.x > arena.width - r {
                    proj.position.x = arena.width - r;
                    Some(Axis::X)
                } else if proj.position.y < r {
                    proj.position.y = r;
                    Some(Axis::Y)
                } else if proj.position.y > arena.height - r {
                    proj.position.y = arena.height - r;
                    Some(Axis::Y)
                } else {
                    None
                };
                if let Some(axis) = bounce_axis {
                    self.aggregator.record_collision();
                    proj.register_bounce();
                    if proj.is_active {
                        proj.velocity = reflect(proj.velocity, axis, settings.bounce_multiplier);
                    }
                }
            },
        }

        if proj.is_active {
            proj.push_trail(self.combat_config.trail_len);
            proj.rotation = (proj.rotation + 4.0 * dt) % std::f32::consts::TAU;
        }
    }

    fn resolve_player_hit(
        &mut self,
        proj: &mut Projectile,
        target_index: usize,
        deaths: &mut Vec<(PlayerId, PlayerId)>,
    ) {
        let (target_id, health_lost, died) = {
            let target = &mut self.players[target_index];
            let health_lost = target.take_damage(proj.damage);
            (target.id, health_lost, target.health == 0 && target.is_alive)
        };
        proj.hit_players.push(target_id);

        if let Some(owner) = self.players.iter_mut().find(|p| p.id == proj.owner_id) {
            owner.shots_hit += 1;
            owner.damage_dealt += proj.damage;
        } else {
            tracing::debug!(owner_id = proj.owner_id, "hit by projectile with removed owner");
        }

        for slot in &proj.effects {
            if let Some(effect) =
                ActiveEffect::from_slot(self.next_effect_id, target_id, proj.owner_id, slot)
            {
                self.next_effect_id += 1;
                self.effects.push(effect);
            }
        }

        self.emit(
            CombatEventKind::ProjectileHit,
            Some(proj.owner_id),
            serde_json::json!({
                "projectile_id": proj.id,
                "target_id": target_id,
            }),
        );
        self.emit(
            CombatEventKind::PlayerDamaged,
            Some(target_id),
            serde_json::json!({
                "damage": proj.damage,
                "health_lost": health_lost,
                "source_id": proj.owner_id,
            }),
        );

        if died {
            deaths.push((target_id, proj.owner_id));
        }
        if !proj.piercing {
            proj.is_active = false;
        }
    }

    /// Decrement effect durations and apply periodic burn damage.
    fn tick_effects(&mut self, dt: f32, deaths: &mut Vec<(PlayerId, PlayerId)>) {
        let dt_ms = dt * 1000.0;
        let mut effects = std::mem::take(&mut self.effects);
        for effect in &mut effects {
            effect.remaining_ms -= dt_ms;
            if let EffectKind::Burn { dps } = effect.kind {
                effect.carry += dps as f32 * dt;
                let whole = effect.carry.floor();
                if whole >= 1.0 {
                    effect.carry -= whole;
                    let target_id = effect.target_id;
                    let source_id = effect.source_id;
                    let Some(target) = self
                        .players
                        .iter_mut()
                        .find(|p| p.id == target_id && p.is_alive)
                    else {
                        tracing::debug!(target_id, "burn effect on missing or dead target skipped");
                        continue;
                    };
                    let health_lost = target.take_direct_damage(whole as u32);
                    let died = target.health == 0;
                    self.emit(
                        CombatEventKind::PlayerDamaged,
                        Some(target_id),
                        serde_json::json!({
                            "damage": whole as u32,
                            "health_lost": health_lost,
                            "source_id": source_id,
                            "cause": "burn",
                        }),
                    );
                    if died {
                        deaths.push((target_id, source_id));
                    }
                }
            }
        }
        self.effects = effects;
    }

    fn apply_deaths(&mut self, deaths: Vec<(PlayerId, PlayerId)>) {
        for (victim_id, killer_id) in deaths {
            let Some(victim) = self
                .players
                .iter_mut()
                .find(|p| p.id == victim_id && p.is_alive)
            else {
                continue;
            };
            victim.is_alive = false;
            self.emit(
                CombatEventKind::PlayerKilled,
                Some(victim_id),
                serde_json::json!({ "killer_id": killer_id }),
            );
            if let Some(killer) = self.players.iter_mut().find(|p| p.id == killer_id) {
                killer.kills += 1;
            } else {
                tracing::debug!(killer_id, "kill credit for removed player skipped");
            }
        }
    }

    fn finish_match(&mut self) {
        self.phase = Phase::Ended;
        self.emit(
            CombatEventKind::MatchEnded,
            self.winner,
            serde_json::json!({ "winner": self.winner }),
        );
    }

    fn emit(
        &mut self,
        kind: CombatEventKind,
        player_id: Option<PlayerId>,
        data: serde_json::Value,
    ) {
        let event = CombatEvent::new(kind, player_id, data);
        self.aggregator.observe_event(&event);
        self.log.push(event);
    }
}

impl Default for CombatEngine {
    fn default() -> Self {
        Self::with_config(CombatConfig::default())
    }
}

/// Timer-exhaustion tiebreak: higher health wins, exact tie means no winner.
fn winner_by_health(players: &[CombatPlayer]) -> Option<PlayerId> {
    let best = players.iter().filter(|p| p.is_alive).max_by_key(|p| p.health)?;
    let tied = players
        .iter()
        .filter(|p| p.is_alive && p.health == best.health)
        .count();
    if tied > 1 { None } else { Some(best.id) }
}

/// Attack speed after slow effects targeting the player.
fn effective_attack_speed_of(player: &CombatPlayer, effects: &[ActiveEffect]) -> f32 {
    let mut speed = player.attack_speed;
    for effect in effects.iter().filter(|e| e.target_id == player.id) {
        if let EffectKind::Slow { factor } = effect.kind {
            speed *= factor.clamp(0.05, 1.0);
        }
    }
    speed
}

/// Critical chance after lucky-chance effects targeting the player.
fn effective_luck(player: &CombatPlayer, effects: &[ActiveEffect]) -> f32 {
    let mut luck = player.luck;
    for effect in effects.iter().filter(|e| e.target_id == player.id) {
        if let EffectKind::LuckyChance { bonus } = effect.kind {
            luck += bonus;
        }
    }
    luck.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena::{Obstacle, open_arena};
    use emojiclash_core::test_helpers::{make_deck, make_profiles};

    const DT: f32 = 1.0 / 60.0;

    /// Two human-controlled players in an open arena, no synergies, so every
    /// number in the assertions is deck-derived and deterministic.
    fn duel_engine() -> CombatEngine {
        let mut engine = CombatEngine::with_config_and_seed(CombatConfig::default(), 42);
        engine.set_rule_sets(Vec::new());
        let profiles = make_profiles(2);
        let mut human_b = profiles[1].clone();
        human_b.is_bot = false;
        human_b.difficulty = None;
        engine
            .initialize(
                open_arena(800.0, 600.0),
                MatchSeat {
                    profile: profiles[0].clone(),
                    deck: make_deck("Fire", 3),
                },
                MatchSeat {
                    profile: human_b,
                    deck: make_deck("Water", 3),
                },
            )
            .unwrap();
        engine
    }

    fn run_until_ended(engine: &mut CombatEngine, max_ticks: usize) {
        for _ in 0..max_ticks {
            engine.advance(DT);
            if engine.phase() == Phase::Ended {
                return;
            }
        }
    }

    #[test]
    fn initialize_builds_players_at_spawns() {
        let engine = duel_engine();
        assert_eq!(engine.phase(), Phase::Initialized);
        assert_eq!(engine.players.len(), 2);
        assert_eq!(engine.players[0].position, Vec2::new(100.0, 300.0));
        assert_eq!(engine.players[1].position, Vec2::new(700.0, 300.0));
        // make_deck("Fire", 3): 3 cards of 10/5/20 → health 100+60, shield 30+15.
        assert_eq!(engine.players[0].max_health, 160);
        assert_eq!(engine.players[0].max_shield, 45);
        assert_eq!(engine.players[0].damage, 18, "base 8 + avg attack 10");
        assert!(engine.players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn initialize_rejects_empty_deck() {
        let mut engine = CombatEngine::with_config_and_seed(CombatConfig::default(), 1);
        let profiles = make_profiles(2);
        let err = engine
            .initialize(
                open_arena(800.0, 600.0),
                MatchSeat {
                    profile: profiles[0].clone(),
                    deck: Deck::default(),
                },
                MatchSeat {
                    profile: profiles[1].clone(),
                    deck: make_deck("Water", 3),
                },
            )
            .unwrap_err();
        assert!(matches!(err, CombatError::Configuration(_)));
        assert_eq!(engine.phase(), Phase::Idle, "match must not start");
    }

    #[test]
    fn initialize_rejects_short_spawn_list() {
        let mut engine = CombatEngine::with_config_and_seed(CombatConfig::default(), 1);
        let mut arena = open_arena(800.0, 600.0);
        arena.player_spawns.truncate(1);
        let profiles = make_profiles(2);
        let err = engine
            .initialize(
                arena,
                MatchSeat {
                    profile: profiles[0].clone(),
                    deck: make_deck("Fire", 3),
                },
                MatchSeat {
                    profile: profiles[1].clone(),
                    deck: make_deck("Water", 3),
                },
            )
            .unwrap_err();
        assert!(matches!(err, CombatError::Configuration(_)));
    }

    #[test]
    fn lifecycle_transitions() {
        let mut engine = duel_engine();
        assert!(engine.pause().is_err(), "pause before start is invalid");
        engine.start().unwrap();
        assert_eq!(engine.phase(), Phase::Running);
        assert!(engine.start().is_err(), "double start is invalid");
        engine.pause().unwrap();
        assert_eq!(engine.phase(), Phase::Paused);
        engine.resume().unwrap();
        engine.end(None).unwrap();
        assert_eq!(engine.phase(), Phase::Ended);
        assert!(engine.end(None).is_err(), "double end is invalid");
        engine.reset();
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn start_emits_match_started() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CombatEventKind::MatchStarted);
    }

    #[test]
    fn advance_outside_running_is_noop() {
        let mut engine = duel_engine();
        let before = engine.snapshot();
        let after = engine.advance(DT);
        assert_eq!(before, after, "advance must not step outside running");
    }

    #[test]
    fn straight_shot_deals_exact_damage_once() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.drain_events();

        let target_pos = engine.players[1].position;
        engine.queue_fire(1, target_pos);

        // 600 units at 300 u/s: two simulated seconds is plenty.
        for _ in 0..180 {
            engine.advance(DT);
        }

        let target = &engine.players[1];
        assert_eq!(target.max_shield - target.shield, 18, "exactly one hit");
        assert_eq!(target.health, target.max_health, "shield absorbed it all");

        let shooter = &engine.players[0];
        assert_eq!(shooter.shots_fired, 1);
        assert_eq!(shooter.shots_hit, 1);
        assert_eq!(shooter.damage_dealt, 18);
        assert!((shooter.accuracy() - 1.0).abs() < 1e-6);

        let events = engine.drain_events();
        let fired = events
            .iter()
            .filter(|e| e.kind == CombatEventKind::ProjectileFired)
            .count();
        let hits = events
            .iter()
            .filter(|e| e.kind == CombatEventKind::ProjectileHit)
            .count();
        let damaged = events
            .iter()
            .filter(|e| e.kind == CombatEventKind::PlayerDamaged)
            .count();
        assert_eq!((fired, hits, damaged), (1, 1, 1));
    }

    #[test]
    fn piercing_shot_damages_a_player_once() {
        let mut engine = CombatEngine::with_config_and_seed(CombatConfig::default(), 42);
        engine.set_rule_sets(Vec::new());
        let profiles = make_profiles(2);
        let mut human_b = profiles[1].clone();
        human_b.is_bot = false;
        human_b.difficulty = None;
        let mut deck = make_deck("Fire", 3);
        deck.cards[0].effect_slots.push(EffectSlot::Pierce);
        engine
            .initialize(
                open_arena(800.0, 600.0),
                MatchSeat {
                    profile: profiles[0].clone(),
                    deck,
                },
                MatchSeat {
                    profile: human_b,
                    deck: make_deck("Water", 3),
                },
            )
            .unwrap();
        engine.start().unwrap();
        engine.drain_events();
        assert!(engine.players[0].piercing);

        engine.queue_fire(1, engine.players[1].position);
        // Four simulated seconds: the shot traverses the target's hit circle,
        // flies on, and bounces around until its budget runs out.
        for _ in 0..240 {
            engine.advance(DT);
        }

        let shooter = &engine.players[0];
        assert_eq!(shooter.shots_fired, 1);
        assert_eq!(shooter.shots_hit, 1, "one traversal is one hit");
        assert_eq!(shooter.damage_dealt, 18);

        let target = &engine.players[1];
        assert_eq!(target.max_shield - target.shield, 18);
        assert_eq!(target.health, target.max_health);

        let events = engine.drain_events();
        let hits = events
            .iter()
            .filter(|e| e.kind == CombatEventKind::ProjectileHit)
            .count();
        let damaged = events
            .iter()
            .filter(|e| e.kind == CombatEventKind::PlayerDamaged)
            .count();
        assert_eq!((hits, damaged), (1, 1));
    }

    #[test]
    fn end_is_valid_from_idle() {
        let mut engine = CombatEngine::with_config_and_seed(CombatConfig::default(), 1);
        engine.end(None).unwrap();
        assert_eq!(engine.phase(), Phase::Ended);
        assert!(engine.end(None).is_err(), "outcome is announced once");
    }

    #[test]
    fn event_order_matches_emission_order() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.queue_fire(1, engine.players[1].position);
        for _ in 0..180 {
            engine.advance(DT);
        }
        let kinds: Vec<CombatEventKind> = engine.drain_events().iter().map(|e| e.kind).collect();
        let hit_pos = kinds
            .iter()
            .position(|k| *k == CombatEventKind::ProjectileHit)
            .expect("hit should be recorded");
        assert_eq!(kinds[hit_pos + 1], CombatEventKind::PlayerDamaged);
    }

    #[test]
    fn kill_ends_match_with_surviving_winner() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.players[1].shield = 0;
        engine.players[1].health = 5;

        engine.queue_fire(1, engine.players[1].position);
        run_until_ended(&mut engine, 240);

        assert_eq!(engine.phase(), Phase::Ended);
        assert_eq!(engine.winner, Some(1));
        assert!(!engine.players[1].is_alive);
        assert_eq!(engine.players[1].health, 0, "health clamps at zero");
        assert_eq!(engine.players[0].kills, 1);

        let events = engine.drain_events();
        assert!(events.iter().any(|e| e.kind == CombatEventKind::PlayerKilled));
        let ended: Vec<_> = events
            .iter()
            .filter(|e| e.kind == CombatEventKind::MatchEnded)
            .collect();
        assert_eq!(ended.len(), 1);
        assert_eq!(ended[0].data["winner"], serde_json::json!(1));
    }

    #[test]
    fn timer_exhaustion_higher_health_wins() {
        let mut engine = duel_engine();
        if let Some(arena) = engine.arena.as_mut() {
            arena.settings.round_duration_ms = 200;
        }
        engine.time_remaining_ms = 200.0;
        engine.start().unwrap();
        engine.players[1].health = 40;

        run_until_ended(&mut engine, 120);
        assert_eq!(engine.phase(), Phase::Ended);
        assert_eq!(engine.winner, Some(1), "higher health wins the tiebreak");
    }

    #[test]
    fn timer_exhaustion_exact_tie_has_no_winner() {
        let mut engine = duel_engine();
        engine.time_remaining_ms = 200.0;
        engine.start().unwrap();
        engine.players[0].health = 50;
        engine.players[1].health = 50;

        run_until_ended(&mut engine, 120);
        assert_eq!(engine.phase(), Phase::Ended);
        assert_eq!(engine.winner, None);
    }

    #[test]
    fn projectile_cap_makes_extra_fires_noops() {
        let mut engine = duel_engine();
        if let Some(arena) = engine.arena.as_mut() {
            arena.settings.max_projectiles = 1;
        }
        engine.start().unwrap();
        let aim = engine.players[1].position;
        engine.queue_fire(1, aim);
        engine.queue_fire(1, aim);
        engine.queue_fire(2, engine.players[0].position);
        engine.advance(DT);

        assert_eq!(engine.projectiles.len(), 1);
        let fired: u32 = engine.players.iter().map(|p| p.shots_fired).sum();
        assert_eq!(fired, 1, "fires beyond the cap must not count as shots");
    }

    #[test]
    fn fire_cooldown_limits_rate() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        let aim = engine.players[1].position;
        // Attack speed is 1.0 shots/s; two requests in quick succession.
        engine.queue_fire(1, aim);
        engine.advance(DT);
        engine.queue_fire(1, aim);
        engine.advance(DT);
        assert_eq!(engine.players[0].shots_fired, 1, "second shot still cooling down");
    }

    #[test]
    fn bounces_stop_at_budget_and_deactivate() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        // Fire straight down at the bottom boundary from mid-field.
        engine.players[0].position = Vec2::new(400.0, 550.0);
        engine.queue_fire(1, Vec2::new(400.0, 599.0));

        for _ in 0..1800 {
            engine.advance(DT);
            for p in &engine.projectiles {
                assert!(p.bounces <= p.max_bounces);
            }
            if engine.projectiles.is_empty() {
                break;
            }
        }
        assert!(
            engine.projectiles.is_empty(),
            "projectile must die after its bounce budget"
        );
    }

    #[test]
    fn solid_obstacle_absorbs_projectile_and_takes_damage() {
        let mut engine = duel_engine();
        if let Some(arena) = engine.arena.as_mut() {
            arena.obstacles.push(Obstacle {
                id: 9,
                position: Vec2::new(380.0, 250.0),
                size: Vec2::new(40.0, 100.0),
                kind: ObstacleKind::Solid,
                health: 30,
                max_health: 30,
            });
        }
        engine.start().unwrap();
        engine.players[0].position = Vec2::new(100.0, 300.0);
        engine.queue_fire(1, Vec2::new(400.0, 300.0));

        for _ in 0..120 {
            engine.advance(DT);
        }
        assert!(engine.projectiles.is_empty(), "solid hit absorbs the shot");
        let arena = engine.arena.as_ref().unwrap();
        assert_eq!(arena.obstacles.len(), 1);
        assert_eq!(arena.obstacles[0].health, 12, "30 - 18 damage");
        // Target untouched behind cover.
        assert_eq!(engine.players[1].shield, engine.players[1].max_shield);
    }

    #[test]
    fn destroyed_obstacle_is_removed() {
        let mut engine = duel_engine();
        if let Some(arena) = engine.arena.as_mut() {
            arena.obstacles.push(Obstacle {
                id: 9,
                position: Vec2::new(380.0, 250.0),
                size: Vec2::new(40.0, 100.0),
                kind: ObstacleKind::Solid,
                health: 10,
                max_health: 10,
            });
        }
        engine.start().unwrap();
        engine.queue_fire(1, Vec2::new(400.0, 300.0));
        for _ in 0..120 {
            engine.advance(DT);
        }
        assert!(engine.arena.as_ref().unwrap().obstacles.is_empty());
    }

    #[test]
    fn bouncy_obstacle_reflects_projectile() {
        let mut engine = duel_engine();
        if let Some(arena) = engine.arena.as_mut() {
            arena.obstacles.push(Obstacle {
                id: 9,
                position: Vec2::new(380.0, 250.0),
                size: Vec2::new(40.0, 100.0),
                kind: ObstacleKind::Bouncy,
                health: 1,
                max_health: 1,
            });
        }
        engine.start().unwrap();
        engine.queue_fire(1, Vec2::new(400.0, 300.0));

        let mut reflected = false;
        for _ in 0..120 {
            engine.advance(DT);
            if engine.projectiles.iter().any(|p| p.velocity.x < 0.0) {
                reflected = true;
                break;
            }
        }
        assert!(reflected, "projectile should come back off the bouncy block");
    }

    #[test]
    fn burn_effect_ticks_down_health_and_expires() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.effects.push(ActiveEffect {
            id: 1,
            target_id: 2,
            source_id: 1,
            kind: EffectKind::Burn { dps: 10 },
            remaining_ms: 1000.0,
            carry: 0.0,
        });
        let start_health = engine.players[1].health;

        for _ in 0..90 {
            engine.advance(DT);
        }
        let burned = start_health - engine.players[1].health;
        assert!(
            (9..=11).contains(&burned),
            "one second of 10 dps burn, got {burned}"
        );
        assert!(engine.effects.is_empty(), "expired effect must be dropped");
        assert_eq!(
            engine.players[1].shield,
            engine.players[1].max_shield,
            "burn bypasses shield"
        );
    }

    #[test]
    fn burn_kill_credits_source_and_ends_match() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.players[1].shield = 0;
        engine.players[1].health = 3;
        engine.effects.push(ActiveEffect {
            id: 1,
            target_id: 2,
            source_id: 1,
            kind: EffectKind::Burn { dps: 20 },
            remaining_ms: 5000.0,
            carry: 0.0,
        });
        run_until_ended(&mut engine, 120);
        assert_eq!(engine.phase(), Phase::Ended);
        assert_eq!(engine.winner, Some(1));
        assert_eq!(engine.players[0].kills, 1);
    }

    #[test]
    fn slow_effect_stretches_cooldown() {
        let engine = duel_engine();
        let player = &engine.players[0];
        let effects = vec![ActiveEffect {
            id: 1,
            target_id: 1,
            source_id: 2,
            kind: EffectKind::Slow { factor: 0.5 },
            remaining_ms: 1000.0,
            carry: 0.0,
        }];
        assert!((effective_attack_speed_of(player, &effects) - 0.5).abs() < 1e-6);
        assert!((effective_attack_speed_of(player, &[]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn lucky_chance_effect_raises_luck() {
        let engine = duel_engine();
        let player = &engine.players[0];
        let effects = vec![ActiveEffect {
            id: 1,
            target_id: 1,
            source_id: 2,
            kind: EffectKind::LuckyChance { bonus: 0.4 },
            remaining_ms: 1000.0,
            carry: 0.0,
        }];
        assert!((effective_luck(player, &effects) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn pause_freezes_simulation() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.queue_fire(1, engine.players[1].position);
        engine.advance(DT);
        engine.pause().unwrap();
        let before = engine.snapshot();
        let after = engine.advance(DT);
        assert_eq!(before, after, "paused engine must not move");
        engine.resume().unwrap();
        let moved = engine.advance(DT);
        assert_ne!(before.projectiles, moved.projectiles);
    }

    #[test]
    fn reset_then_initialize_reproduces_initial_snapshot() {
        let mut engine = duel_engine();
        let first = engine.snapshot();

        engine.start().unwrap();
        engine.queue_fire(1, engine.players[1].position);
        for _ in 0..30 {
            engine.advance(DT);
        }

        engine.reset();
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.recent_events(10).is_empty());

        let profiles = make_profiles(2);
        let mut human_b = profiles[1].clone();
        human_b.is_bot = false;
        human_b.difficulty = None;
        engine
            .initialize(
                open_arena(800.0, 600.0),
                MatchSeat {
                    profile: profiles[0].clone(),
                    deck: make_deck("Fire", 3),
                },
                MatchSeat {
                    profile: human_b,
                    deck: make_deck("Water", 3),
                },
            )
            .unwrap();
        assert_eq!(engine.snapshot(), first, "re-entry must reproduce the start");
    }

    #[test]
    fn dt_is_clamped_against_tunneling() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.queue_fire(1, engine.players[1].position);
        engine.advance(DT);
        let before = engine.projectiles[0].position;
        engine.advance(10.0); // absurd stall; must act like 100 ms
        let after = engine.projectiles[0].position;
        let moved = before.distance(after);
        assert!(
            moved <= engine.players[0].projectile_speed * (MAX_DT_MS / 1000.0) + 1.0,
            "projectile moved {moved} units in one clamped tick"
        );
    }

    #[test]
    fn nan_dt_is_ignored() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        let before = engine.snapshot();
        let after = engine.advance(f32::NAN);
        assert_eq!(before.players, after.players);
        assert_eq!(engine.phase(), Phase::Running);
    }

    #[test]
    fn bot_opponent_fires_on_its_own() {
        let mut engine = CombatEngine::with_config_and_seed(CombatConfig::default(), 42);
        engine.set_rule_sets(Vec::new());
        let profiles = make_profiles(2); // second profile is a medium bot
        engine
            .initialize(
                open_arena(800.0, 600.0),
                MatchSeat {
                    profile: profiles[0].clone(),
                    deck: make_deck("Fire", 3),
                },
                MatchSeat {
                    profile: profiles[1].clone(),
                    deck: make_deck("Water", 3),
                },
            )
            .unwrap();
        engine.start().unwrap();

        for _ in 0..600 {
            engine.advance(DT);
        }
        assert!(
            engine.players[1].shots_fired > 0,
            "bot should have fired within ten seconds"
        );
        assert_eq!(engine.players[0].shots_fired, 0, "humans only fire on request");
    }

    #[test]
    fn sudden_death_ramps_scale_with_time() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        let (s0, d0) = engine.sudden_death_factors();
        assert_eq!((s0, d0), (1.0, 1.0));

        engine.sudden_death_elapsed_ms = 5000.0;
        let (s, d) = engine.sudden_death_factors();
        assert!((s - 1.2).abs() < 1e-4, "0.04/s ramp over 5 s");
        assert!((d - 1.3).abs() < 1e-4, "0.06/s ramp over 5 s");
    }

    #[test]
    fn stats_track_fired_damage_and_ticks() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        engine.queue_fire(1, engine.players[1].position);
        for _ in 0..180 {
            engine.advance(DT);
        }
        let stats = engine.stats();
        assert_eq!(stats.total_projectiles_fired, 1);
        assert_eq!(stats.total_damage_dealt, 18);
        assert_eq!(stats.total_collisions, 1);
        assert_eq!(stats.ticks, 180);
        assert!(stats.fps() > 0.0);
    }

    #[test]
    fn snapshot_is_detached_from_live_state() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        let mut snap = engine.advance(DT);
        snap.players[0].health = 1;
        assert_ne!(engine.players[0].health, 1, "snapshot edits must not leak");
        assert!(!engine.snapshot_bytes().is_empty());
    }

    #[test]
    fn shots_hit_never_exceeds_shots_fired() {
        let mut engine = duel_engine();
        engine.start().unwrap();
        for tick in 0..600 {
            if tick % 30 == 0 {
                engine.queue_fire(1, engine.players[1].position);
                engine.queue_fire(2, engine.players[0].position);
            }
            engine.advance(DT);
            for p in &engine.players {
                assert!(p.shots_hit <= p.shots_fired);
                assert!(p.health <= p.max_health);
                assert!(p.shield <= p.max_shield);
            }
            if engine.phase() == Phase::Ended {
                break;
            }
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn invariants_hold_under_random_fire(
                seed in 0u64..500,
                aims in proptest::collection::vec((0.0f32..800.0, 0.0f32..600.0), 5..25),
                dt in 0.005f32..0.08,
            ) {
                let mut engine = CombatEngine::with_config_and_seed(CombatConfig::default(), seed);
                engine.set_rule_sets(Vec::new());
                let profiles = make_profiles(2);
                engine
                    .initialize(
                        open_arena(800.0, 600.0),
                        MatchSeat {
                            profile: profiles[0].clone(),
                            deck: make_deck("Fire", 3),
                        },
                        MatchSeat {
                            profile: profiles[1].clone(),
                            deck: make_deck("Water", 3),
                        },
                    )
                    .unwrap();
                engine.start().unwrap();

                for (x, y) in &aims {
                    engine.queue_fire(1, Vec2::new(*x, *y));
                    for _ in 0..8 {
                        engine.advance(dt);
                    }
                    for p in &engine.players {
                        prop_assert!(p.health <= p.max_health);
                        prop_assert!(p.shield <= p.max_shield);
                        prop_assert!(p.shots_hit <= p.shots_fired);
                    }
                    for proj in &engine.projectiles {
                        prop_assert!(proj.bounces <= proj.max_bounces);
                        prop_assert!(proj.is_active);
                    }
                    if engine.phase() == Phase::Ended {
                        break;
                    }
                }
            }
        }
    }
}
