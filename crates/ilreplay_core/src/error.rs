//! Error types for ilreplay.
//!
//! Replay is all-or-nothing: every error below aborts the run at the point
//! of detection. The engine wraps whatever it gets in [`ReplayError::AtLine`]
//! so the diagnostic names the offending line.

use crate::id::{EntryKind, LogId};
use crate::phase::Phase;

/// Replay result type
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Malformed log text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    /// Empty line where a statement was expected
    #[error("empty line where a statement was expected")]
    EmptyLine,

    /// Token does not have any of the known shapes
    #[error("malformed token `{token}`: {reason}")]
    Malformed {
        /// Raw token text
        token: String,
        /// What was wrong with it
        reason: String,
    },

    /// Tag character with no digits after it
    #[error("unexpected short token `{token}`")]
    ShortToken {
        /// Raw token text
        token: String,
    },

    /// ID reference carries the wrong role tag
    #[error("token `{token}` has tag `{found}`, expected `{expected}`")]
    UnexpectedTag {
        /// Raw token text
        token: String,
        /// Tag required at this position
        expected: char,
        /// Tag found
        found: char,
    },

    /// Quoted text length prefix disagrees with its content
    #[error("quoted text declares {declared} characters but carries {actual}")]
    LengthMismatch {
        /// Declared character count
        declared: usize,
        /// Actual character count
        actual: usize,
    },

    /// Quoted text runs past the end of the line
    #[error("unterminated quoted text starting at `{token}`")]
    UnterminatedQuote {
        /// Length token that opened the quote
        token: String,
    },

    /// Not a valid integer or float
    #[error("invalid number `{token}`")]
    InvalidNumber {
        /// Raw token text
        token: String,
    },

    /// Not a valid `{0xHEX}` literal
    #[error("invalid hex address `{token}`")]
    InvalidAddress {
        /// Raw token text
        token: String,
    },

    /// Primitive type tag out of range
    #[error("unknown primitive type tag {tag}")]
    UnknownTypeTag {
        /// The tag
        tag: i64,
    },
}

/// Identifier registry misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Resolving an ID nothing was registered under
    #[error("ID {id} is not bound")]
    Unbound {
        /// The ID
        id: LogId,
    },

    /// Registering an ID twice
    #[error("ID {id} is already bound to a {existing}")]
    AlreadyBound {
        /// The ID
        id: LogId,
        /// Kind of the existing entry
        existing: EntryKind,
    },

    /// Registering a reserved ID
    #[error("ID {id} is reserved and cannot be bound")]
    ReservedId {
        /// The ID
        id: LogId,
    },

    /// Entry exists but is of the wrong kind
    #[error("ID {id} is a {found}, expected a {expected}")]
    KindMismatch {
        /// The ID
        id: LogId,
        /// Kind required by the caller
        expected: EntryKind,
        /// Kind registered
        found: EntryKind,
    },

    /// Key outlived a rebinding of its slot
    #[error("stale registry key for ID {id}")]
    StaleKey {
        /// The ID
        id: LogId,
    },
}

/// Statement could not be dispatched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Statement name not in the handler table
    #[error("unknown statement `{name}`")]
    UnknownStatement {
        /// Resolved statement name
        name: String,
    },

    /// Statement exists but not in the current phase
    #[error("statement `{name}` is not allowed in the {phase} phase")]
    NotInPhase {
        /// Statement name
        name: String,
        /// Current phase
        phase: Phase,
    },

    /// Line ended before the statement's arguments did
    #[error("missing argument: expected {expected}")]
    MissingArgument {
        /// Description of the expected argument
        expected: String,
    },

    /// Tokens left over after the statement's arguments
    #[error("{count} trailing token(s) starting at `{first}`")]
    TrailingTokens {
        /// Number of unconsumed tokens
        count: usize,
        /// First unconsumed token
        first: String,
    },
}

/// Log is well-formed but inconsistent with the replay protocol
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A call was expected to produce an object and did not
    #[error("`{statement}` did not produce the object declared as {id}")]
    MissingOutput {
        /// Statement name
        statement: String,
        /// ID the log declared for the output
        id: LogId,
    },

    /// `NewMethodBuilder` names a different builder than its owner
    #[error("method builder IDs do not match: owner {owner}, declared {declared}")]
    OwnerMismatch {
        /// Owner of the statement
        owner: LogId,
        /// ID carried as argument
        declared: LogId,
    },

    /// Phase transition that cannot happen from the current phase
    #[error("`{statement}` is unreachable in the {phase} phase")]
    UnreachableTransition {
        /// Sentinel statement
        statement: String,
        /// Current phase
        phase: Phase,
    },

    /// Statement annotation outside the IL body
    #[error("statement annotation in the {phase} phase")]
    AnnotationOutsideBody {
        /// Current phase
        phase: Phase,
    },

    /// Input ended before replay reached `Done`
    #[error("log ended during the {phase} phase")]
    UnexpectedEof {
        /// Phase at end of input
        phase: Phase,
    },

    /// Replay hit the configured line cap
    #[error("line limit of {limit} reached before the body ended")]
    LineLimit {
        /// Configured limit
        limit: usize,
    },
}

/// Failure reported by the builder API implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    /// Operation was refused
    #[error("{operation} rejected: {reason}")]
    Rejected {
        /// Builder operation
        operation: String,
        /// Why
        reason: String,
    },

    /// A handle that the implementation never issued
    #[error("unknown {kind} handle {handle}")]
    UnknownHandle {
        /// Handle kind
        kind: String,
        /// Raw handle value
        handle: u32,
    },
}

impl BuilderError {
    /// Shorthand for [`BuilderError::Rejected`]
    #[must_use]
    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Any replay failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// Lexical error
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Builder API error
    #[error(transparent)]
    Builder(#[from] BuilderError),

    /// Reading the log failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Error with the log line it happened on
    #[error("line {line}: {source} (`{text}`)")]
    AtLine {
        /// 1-based physical line number
        line: usize,
        /// Line text
        text: String,
        /// Underlying error
        #[source]
        source: Box<ReplayError>,
    },
}

impl ReplayError {
    /// Attach a line number and text, unless already attached
    #[must_use]
    pub fn at_line(self, line: usize, text: impl Into<String>) -> Self {
        match self {
            Self::AtLine { .. } => self,
            other => Self::AtLine {
                line,
                text: text.into(),
                source: Box::new(other),
            },
        }
    }

    /// The error without line context
    #[must_use]
    pub fn root(&self) -> &ReplayError {
        match self {
            Self::AtLine { source, .. } => source.root(),
            other => other,
        }
    }

    /// Line number, if attached
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Short category name for diagnostics
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.root() {
            Self::Lex(_) => "lex",
            Self::Registry(_) => "registry",
            Self::Dispatch(_) => "dispatch",
            Self::Protocol(_) => "protocol",
            Self::Builder(_) => "builder",
            Self::Io(_) => "io",
            Self::AtLine { .. } => "line",
        }
    }
}

impl From<std::io::Error> for ReplayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LexError::LengthMismatch {
            declared: 3,
            actual: 4,
        };
        assert_eq!(
            format!("{}", err),
            "quoted text declares 3 characters but carries 4"
        );

        let err = RegistryError::Unbound { id: LogId::new(13) };
        assert_eq!(format!("{}", err), "ID #13 is not bound");
    }

    #[test]
    fn test_kind_mismatch_display() {
        let err = RegistryError::KindMismatch {
            id: LogId::new(7),
            expected: EntryKind::IlValue,
            found: EntryKind::IlType,
        };
        let s = format!("{}", err);
        assert!(s.contains("#7"));
        assert!(s.contains("type"));
        assert!(s.contains("value"));
    }

    #[test]
    fn test_at_line_wraps_once() {
        let err: ReplayError = DispatchError::UnknownStatement {
            name: "Frobnicate".to_string(),
        }
        .into();
        let err = err.at_line(12, "B2 S40").at_line(99, "ignored");
        assert_eq!(err.line(), Some(12));
        assert_eq!(err.category(), "dispatch");
        let s = err.to_string();
        assert!(s.starts_with("line 12:"));
        assert!(s.contains("Frobnicate"));
    }

    #[test]
    fn test_root() {
        let inner: ReplayError = ProtocolError::UnexpectedEof {
            phase: Phase::BuildIL,
        }
        .into();
        let wrapped = inner.clone().at_line(3, "Def S1");
        assert_eq!(wrapped.root(), &inner);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.log");
        let err = ReplayError::from(io);
        assert_eq!(err.category(), "io");
        assert!(err.to_string().contains("missing.log"));
    }

    #[test]
    fn test_error_equality() {
        let err1: ReplayError = LexError::EmptyLine.into();
        let err2: ReplayError = LexError::EmptyLine.into();
        assert_eq!(err1, err2);

        let err3: ReplayError = BuilderError::rejected("Load", "no such local").into();
        assert_ne!(err1, err3);
    }
}
