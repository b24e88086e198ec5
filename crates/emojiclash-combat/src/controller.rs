use emojiclash_core::PlayerId;
use emojiclash_core::events::CombatEvent;

use crate::arena::Arena;
use crate::error::CombatError;
use crate::physics::Vec2;
use crate::stats::CombatStats;
use crate::{CombatEngine, CombatSnapshot, MatchSeat, Phase};

/// A lifecycle or input command queued for the next tick boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCommand {
    Start,
    Pause,
    Resume,
    End { winner: Option<PlayerId> },
    Reset,
    Fire { player_id: PlayerId, aim_point: Vec2 },
}

/// Single owner of a `CombatEngine`. Commands arriving between ticks are
/// queued and applied in order at the next `advance`, so the simulation
/// never observes a mid-tick state change. Invalid commands are dropped
/// as logged no-ops; only `initialize` surfaces errors to the caller.
pub struct MatchController {
    engine: CombatEngine,
    queued: Vec<MatchCommand>,
}

impl MatchController {
    pub fn new() -> Self {
        Self::with_engine(CombatEngine::new())
    }

    pub fn with_engine(engine: CombatEngine) -> Self {
        Self {
            engine,
            queued: Vec::new(),
        }
    }

    pub fn engine(&self) -> &CombatEngine {
        &self.engine
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    pub fn snapshot(&self) -> CombatSnapshot {
        self.engine.snapshot()
    }

    pub fn stats(&self) -> CombatStats {
        self.engine.stats()
    }

    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        self.engine.drain_events()
    }

    pub fn recent_events(&self, n: usize) -> &[CombatEvent] {
        self.engine.recent_events(n)
    }

    /// Applied immediately rather than queued: match setup happens between
    /// rounds and its configuration errors must reach the caller.
    pub fn initialize(
        &mut self,
        arena: Arena,
        seat_a: MatchSeat,
        seat_b: MatchSeat,
    ) -> Result<(), CombatError> {
        self.queued.clear();
        self.engine.initialize(arena, seat_a, seat_b)
    }

    pub fn start(&mut self) {
        self.queued.push(MatchCommand::Start);
    }

    pub fn pause(&mut self) {
        self.queued.push(MatchCommand::Pause);
    }

    pub fn resume(&mut self) {
        self.queued.push(MatchCommand::Resume);
    }

    pub fn end(&mut self, winner: Option<PlayerId>) {
        self.queued.push(MatchCommand::End { winner });
    }

    pub fn reset(&mut self) {
        self.queued.push(MatchCommand::Reset);
    }

    pub fn fire(&mut self, player_id: PlayerId, aim_point: Vec2) {
        self.queued.push(MatchCommand::Fire {
            player_id,
            aim_point,
        });
    }

    /// Apply queued commands in arrival order, then step the simulation.
    pub fn advance(&mut self, dt: f32) -> CombatSnapshot {
        for command in std::mem::take(&mut self.queued) {
            self.apply(command);
        }
        self.engine.advance(dt)
    }

    fn apply(&mut self, command: MatchCommand) {
        let result = match &command {
            MatchCommand::Start => self.engine.start(),
            MatchCommand::Pause => self.engine.pause(),
            MatchCommand::Resume => self.engine.resume(),
            MatchCommand::End { winner } => self.engine.end(*winner),
            MatchCommand::Reset => {
                self.engine.reset();
                Ok(())
            },
            MatchCommand::Fire {
                player_id,
                aim_point,
            } => {
                self.engine.queue_fire(*player_id, *aim_point);
                Ok(())
            },
        };
        if let Err(err) = result {
            tracing::debug!(?command, %err, "command dropped as no-op");
        }
    }
}

impl Default for MatchController {
    fn default() -> Self {
        Self::with_engine(CombatEngine::default())
    }
}
