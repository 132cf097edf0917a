//! Phase state machine.

use crate::statement::StatementKind;
use ilreplay_core::{DispatchError, Phase, ProtocolError, ReplayResult};
use tracing::info;

/// Label used for the end-of-body sentinel in diagnostics
pub const END_OF_BODY: &str = "end of body";

/// Tracks `Constructor -> BuildIL -> Done`
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
}

impl PhaseMachine {
    /// Start in the constructor phase
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Constructor,
        }
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the body has ended
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Check that `kind` may be dispatched now
    ///
    /// # Errors
    ///
    /// Returns error if the statement does not belong to the current phase
    pub fn check(&self, kind: StatementKind) -> ReplayResult<()> {
        if kind.allowed_in(self.phase) {
            Ok(())
        } else {
            Err(DispatchError::NotInPhase {
                name: kind.name().to_string(),
                phase: self.phase,
            }
            .into())
        }
    }

    /// Handle `DoneConstructor`
    ///
    /// # Errors
    ///
    /// Returns error outside the constructor phase
    pub fn done_constructor(&mut self) -> ReplayResult<()> {
        self.advance(Phase::Constructor, StatementKind::DoneConstructor.name())
    }

    /// Handle the end-of-body line
    ///
    /// # Errors
    ///
    /// Returns error outside the buildIL phase
    pub fn end_of_body(&mut self) -> ReplayResult<()> {
        self.advance(Phase::BuildIL, END_OF_BODY)
    }

    /// Handle an `S`-owned annotation line, which the recorder only writes
    /// between IL statements
    ///
    /// # Errors
    ///
    /// Returns error outside the buildIL phase
    pub fn annotation(&self) -> ReplayResult<()> {
        if self.phase == Phase::BuildIL {
            Ok(())
        } else {
            Err(ProtocolError::AnnotationOutsideBody { phase: self.phase }.into())
        }
    }

    /// Input ran out; fails unless the body has ended
    ///
    /// # Errors
    ///
    /// Returns error if replay has not reached `Done`
    pub fn finish(&self) -> ReplayResult<()> {
        if self.is_done() {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedEof { phase: self.phase }.into())
        }
    }

    fn advance(&mut self, from: Phase, statement: &str) -> ReplayResult<()> {
        match self.phase.next() {
            Some(next) if self.phase == from => {
                info!(from = %self.phase, to = %next, "phase transition");
                self.phase = next;
                Ok(())
            }
            _ => Err(ProtocolError::UnreachableTransition {
                statement: statement.to_string(),
                phase: self.phase,
            }
            .into()),
        }
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
