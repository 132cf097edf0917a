//! Replay phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a replay run
///
/// Transitions are one-directional: `Constructor -> BuildIL -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Method shape: name, file/line, parameters, locals, return type
    Constructor,
    /// Instruction-construction statements
    BuildIL,
    /// Body complete
    Done,
}

impl Phase {
    /// The phase that follows this one, if any
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Constructor => Some(Self::BuildIL),
            Self::BuildIL => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Whether replay has finished
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constructor => "constructor",
            Self::BuildIL => "buildIL",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(Phase::Constructor.next(), Some(Phase::BuildIL));
        assert_eq!(Phase::BuildIL.next(), Some(Phase::Done));
        assert_eq!(Phase::Done.next(), None);
        assert!(Phase::Constructor < Phase::Done);
    }

    #[test]
    fn test_phase_terminal() {
        assert!(!Phase::Constructor.is_terminal());
        assert!(!Phase::BuildIL.is_terminal());
        assert!(Phase::Done.is_terminal());
    }
}
