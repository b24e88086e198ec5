use crate::Phase;

/// Errors surfaced by the combat engine's command surface.
///
/// Simulation inconsistencies during `advance` (dangling id lookups) are not
/// errors; they are logged skips so the tick path never fails.
#[derive(Debug)]
pub enum CombatError {
    /// Bad arena or deck handed to `initialize`. The match is not started.
    Configuration(String),
    /// A lifecycle command that is not valid in the current phase.
    InvalidTransition {
        from: Phase,
        command: &'static str,
    },
}

impl std::fmt::Display for CombatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(m) => write!(f, "invalid configuration: {m}"),
            Self::InvalidTransition { from, command } => {
                write!(f, "command '{command}' not valid in phase {from:?}")
            },
        }
    }
}

impl std::error::Error for CombatError {}
