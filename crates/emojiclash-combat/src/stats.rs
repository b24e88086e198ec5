use serde::{Deserialize, Serialize};

use emojiclash_core::events::{CombatEvent, CombatEventKind};

/// How many trailing events the bounded UI view keeps.
pub const RECENT_EVENTS_CAP: usize = 100;

/// Append-only ordered event log. The full stream stays available to the
/// statistics aggregator; UIs read the bounded `recent` view. Delivery order
/// equals emission order within a tick.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<CombatEvent>,
    drained: usize,
}

impl EventLog {
    pub fn push(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    /// Events appended since the last drain, in emission order. Drained once
    /// per tick by the external driver; the log itself keeps everything.
    pub fn drain_new(&mut self) -> Vec<CombatEvent> {
        let new = self.events[self.drained..].to_vec();
        self.drained = self.events.len();
        new
    }

    /// The last `n` events (capped at `RECENT_EVENTS_CAP`), oldest first.
    pub fn recent(&self, n: usize) -> &[CombatEvent] {
        let n = n.min(RECENT_EVENTS_CAP).min(self.events.len());
        &self.events[self.events.len() - n..]
    }

    pub fn all(&self) -> &[CombatEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.drained = 0;
    }
}

/// Running combat totals and tick timing for external display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    pub total_projectiles_fired: u32,
    pub total_damage_dealt: u32,
    /// Every resolved projectile contact: player hits, obstacle strikes,
    /// and boundary bounces.
    pub total_collisions: u32,
    pub ticks: u64,
    pub avg_tick_ms: f32,
}

impl CombatStats {
    /// Effective simulation rate implied by the average tick spacing.
    pub fn fps(&self) -> f32 {
        if self.avg_tick_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / self.avg_tick_ms
    }
}

/// Folds the event stream and per-tick timing samples into `CombatStats`.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: CombatStats,
    accum_tick_ms: f64,
}

impl StatsAggregator {
    pub fn stats(&self) -> CombatStats {
        self.stats
    }

    pub fn observe_event(&mut self, event: &CombatEvent) {
        match event.kind {
            CombatEventKind::ProjectileFired => {
                self.stats.total_projectiles_fired += 1;
            },
            CombatEventKind::PlayerDamaged => {
                let damage = event.data.get("damage").and_then(|v| v.as_u64()).unwrap_or(0);
                self.stats.total_damage_dealt += damage as u32;
            },
            CombatEventKind::MatchStarted
            | CombatEventKind::MatchEnded
            | CombatEventKind::ProjectileHit
            | CombatEventKind::PlayerKilled => {},
        }
    }

    /// Record a resolved projectile contact (hit, obstacle strike, or bounce).
    pub fn record_collision(&mut self) {
        self.stats.total_collisions += 1;
    }

    pub fn observe_tick(&mut self, dt_ms: f64) {
        self.stats.ticks += 1;
        self.accum_tick_ms += dt_ms;
        self.stats.avg_tick_ms = (self.accum_tick_ms / self.stats.ticks as f64) as f32;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
