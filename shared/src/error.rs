use crate::orientation::Orientation;
use thiserror::Error;

/// Why a command left the mover untouched.
///
/// None of these are fatal: a rejected command never mutates state and is
/// never replicated.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Rejection {
    #[error("path blocked")]
    Blocked,
    #[error("timestamp {0} already applied")]
    DuplicateTimestamp(f64),
    #[error("requester is not the bound RCS operator")]
    NotRcsOperator,
    #[error("RCS mode is not active")]
    RcsInactive,
    #[error("cannot burn {0} along the flight axis while cruising")]
    ParallelBurn(Orientation),
    #[error("no working thrusters")]
    NoWorkingThrusters,
    #[error("no fuel")]
    NoFuel,
    #[error("too many burns pending")]
    BurnQueueFull,
    #[error("unknown mover {0}")]
    UnknownMover(u32),
}

impl Rejection {
    /// Text for the requesting player when a precondition is missing.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Rejection::NoWorkingThrusters => {
                Some("The shuttle has no working thrusters and cannot be started.")
            }
            Rejection::NoFuel => Some("This shuttle has no fuel and cannot be started."),
            Rejection::NotRcsOperator => Some("You must be piloting the RCS to fire thrusters."),
            _ => None,
        }
    }

    /// Duplicate delivery, never surfaced to the user.
    pub fn is_replay(&self) -> bool {
        matches!(self, Rejection::DuplicateTimestamp(_))
    }
}
