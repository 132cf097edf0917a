//! Identifiers used by the recorder to name builder-side objects.
//!
//! Every object the recorder hands out is named by a small integer and
//! written with a one-letter role tag: `B2` is a builder, `V15` a value,
//! `T7` a type and `S16` an interned string (usually a statement name).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Log identifier - names one object for the lifetime of a replay run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogId(u32);

impl LogId {
    /// The "no object" sentinel, used for absent optional builders
    pub const NONE: Self = Self(0);

    /// Reserved for the recorder itself; never bound during replay
    pub const RECORDER: Self = Self(1);

    /// The method builder being replayed, as written by the recorder
    pub const METHOD_BUILDER: Self = Self(2);

    /// Create from a raw integer
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw integer
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether this is the `0` sentinel
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Convert the sentinel into `None`
    #[must_use]
    pub const fn non_zero(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }

    /// Render with a role tag, the way the recorder writes it
    #[must_use]
    pub fn tagged(&self, tag: IdTag) -> String {
        format!("{}{}", tag.as_char(), self.0)
    }
}

impl From<u32> for LogId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role tag written in front of an ID reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdTag {
    /// `B` - a method builder or IL builder
    Builder,
    /// `S` - an interned string, normally a statement name
    Statement,
    /// `T` - a type
    Type,
    /// `V` - a value
    Value,
}

impl IdTag {
    /// All tags, in wire order
    pub const ALL: [Self; 4] = [Self::Builder, Self::Statement, Self::Type, Self::Value];

    /// Parse a tag character
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Self::Builder),
            'S' => Some(Self::Statement),
            'T' => Some(Self::Type),
            'V' => Some(Self::Value),
            _ => None,
        }
    }

    /// Tag character on the wire
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Builder => 'B',
            Self::Statement => 'S',
            Self::Type => 'T',
            Self::Value => 'V',
        }
    }
}

impl fmt::Display for IdTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Kind of object an ID is bound to in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// The method builder (also usable as an IL builder)
    MethodBuilder,
    /// A sub-builder
    IlBuilder,
    /// An IL value
    IlValue,
    /// An IL type
    IlType,
    /// A string literal from a definition line
    RawString,
    /// A raw address literal from a definition line
    RawAddress,
}

impl EntryKind {
    /// Whether an entry of this kind can own builder statements
    #[must_use]
    pub const fn is_builder(self) -> bool {
        matches!(self, Self::MethodBuilder | Self::IlBuilder)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MethodBuilder => "method builder",
            Self::IlBuilder => "IL builder",
            Self::IlValue => "value",
            Self::IlType => "type",
            Self::RawString => "string",
            Self::RawAddress => "address",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids() {
        assert!(LogId::NONE.is_none());
        assert!(!LogId::METHOD_BUILDER.is_none());
        assert_eq!(LogId::METHOD_BUILDER.as_u32(), 2);
    }

    #[test]
    fn test_non_zero() {
        assert_eq!(LogId::new(0).non_zero(), None);
        assert_eq!(LogId::new(21).non_zero(), Some(LogId::new(21)));
    }

    #[test]
    fn test_tagged() {
        assert_eq!(LogId::new(15).tagged(IdTag::Value), "V15");
        assert_eq!(LogId::new(2).tagged(IdTag::Builder), "B2");
    }

    #[test]
    fn test_tag_roundtrip() {
        for tag in IdTag::ALL {
            assert_eq!(IdTag::from_char(tag.as_char()), Some(tag));
        }
        assert_eq!(IdTag::from_char('I'), None);
        assert_eq!(IdTag::from_char('D'), None);
    }

    #[test]
    fn test_entry_kind_is_builder() {
        assert!(EntryKind::MethodBuilder.is_builder());
        assert!(EntryKind::IlBuilder.is_builder());
        assert!(!EntryKind::IlValue.is_builder());
        assert!(!EntryKind::RawString.is_builder());
    }
}
