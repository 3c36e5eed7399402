/// Run-level state machine
///
/// A crawl run moves from `Init` to `Running` and ends in exactly one
/// terminal state.
use crate::CrawlError;
use std::fmt;

/// Represents the lifecycle state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Configuration loaded, nothing dispatched yet
    Init,

    /// Fetches are being dispatched
    Running,

    // ===== Terminal States =====
    /// Frontier exhausted or max depth reached
    Completed,

    /// The circuit breaker stopped the run
    CircuitOpen,

    /// Output or another run-level failure aborted the run
    FatalError,
}

impl RunState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::CircuitOpen | Self::FatalError)
    }

    /// Returns true if the transition `self -> next` is allowed
    ///
    /// Only `Init -> Running` and `Running -> <terminal>` are valid, plus
    /// `Init -> FatalError` for failures before the first dispatch.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        match (self, next) {
            (Self::Init, Self::Running) => true,
            (Self::Init, Self::FatalError) => true,
            (Self::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `next`, rejecting invalid transitions
    pub fn transition(&mut self, next: RunState) -> Result<(), CrawlError> {
        if !self.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::debug!("Run state {} -> {}", self, next);
        *self = next;
        Ok(())
    }

    /// Process exit code for a finished run
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::CircuitOpen => 3,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CircuitOpen => "circuit_open",
            Self::FatalError => "fatal_error",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
