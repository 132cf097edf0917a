//! Token decoding.
//!
//! A raw token is interpreted according to what the position calls for.
//! The lexical forms are:
//!
//! * plain integer: `3`, `-12`
//! * floating point literal: `2.5`, `1e-3`
//! * ID reference: a role tag and decimal ID, `B2`, `V15`
//! * quoted text: `"N` followed by `[text]"`, two raw tokens
//! * hex address: `{0x7ffeeb656d30}`
//! * the `Def` keyword, which opens a definition line and doubles as an
//!   absent-builder placeholder

use ilreplay_core::{IdTag, LexError, LogId};
use serde::{Deserialize, Serialize};

/// Keyword that opens a definition line
pub const DEF_KEYWORD: &str = "Def";

/// Decoded token kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Plain integer
    Number(i64),
    /// Floating point literal
    Float(f64),
    /// Length-prefixed text
    QuotedText {
        /// Declared character count
        declared_len: usize,
        /// Content between the brackets
        content: String,
    },
    /// `{0xHEX}` literal
    HexAddress(u64),
    /// Tagged ID reference
    Reference {
        /// Role tag
        tag: IdTag,
        /// ID
        id: LogId,
    },
    /// The `Def` keyword
    Def,
}

/// A decoded token and the raw text it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// What the token decoded to
    pub kind: TokenKind,
    /// Raw text; both halves joined by a space for quoted text
    pub raw: String,
}

impl Token {
    /// Create a token
    #[must_use]
    pub fn new(kind: TokenKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    /// ID if this is a reference
    #[must_use]
    pub fn as_reference(&self) -> Option<(IdTag, LogId)> {
        match self.kind {
            TokenKind::Reference { tag, id } => Some((tag, id)),
            _ => None,
        }
    }
}

/// Whether a leading token marks a definition line (`Def` or literal `0`)
#[must_use]
pub fn is_definition_marker(raw: &str) -> bool {
    raw == DEF_KEYWORD || raw == "0"
}

/// Decode a plain integer
///
/// # Errors
///
/// Returns error if the token is not a decimal integer
pub fn decode_number(raw: &str) -> Result<i64, LexError> {
    raw.parse().map_err(|_| LexError::InvalidNumber {
        token: raw.to_string(),
    })
}

/// Decode a floating point literal
///
/// # Errors
///
/// Returns error if the token is not a number
pub fn decode_float(raw: &str) -> Result<f64, LexError> {
    raw.parse().map_err(|_| LexError::InvalidNumber {
        token: raw.to_string(),
    })
}

/// Decode a tagged ID reference with any tag
///
/// # Errors
///
/// Returns error if the tag is unknown or the digits are missing
pub fn decode_reference(raw: &str) -> Result<(IdTag, LogId), LexError> {
    let mut chars = raw.chars();
    let first = chars.next().ok_or_else(|| LexError::Malformed {
        token: String::new(),
        reason: "empty token".to_string(),
    })?;
    let tag = IdTag::from_char(first).ok_or_else(|| LexError::Malformed {
        token: raw.to_string(),
        reason: format!("`{}` is not an ID tag", first),
    })?;

    let digits = chars.as_str();
    if digits.is_empty() {
        return Err(LexError::ShortToken {
            token: raw.to_string(),
        });
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LexError::InvalidNumber {
            token: raw.to_string(),
        });
    }
    let id = digits.parse::<u32>().map_err(|_| LexError::InvalidNumber {
        token: raw.to_string(),
    })?;

    Ok((tag, LogId::new(id)))
}

/// Decode an ID reference that must carry `expected`
///
/// # Errors
///
/// Returns error if the reference is malformed or carries another tag
pub fn decode_tagged(raw: &str, expected: IdTag) -> Result<LogId, LexError> {
    let (tag, id) = decode_reference(raw)?;
    if tag != expected {
        return Err(LexError::UnexpectedTag {
            token: raw.to_string(),
            expected: expected.as_char(),
            found: tag.as_char(),
        });
    }
    Ok(id)
}

/// First step of quoted text: the `"N` length token
///
/// # Errors
///
/// Returns error if the token is not `"` followed by digits
pub fn decode_quote_length(raw: &str) -> Result<usize, LexError> {
    raw.strip_prefix('"')
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| LexError::Malformed {
            token: raw.to_string(),
            reason: "expected `\"` and a character count".to_string(),
        })
}

/// Second step of quoted text: the `[text]"` content token
///
/// # Errors
///
/// Returns error if the brackets are missing or the length disagrees
pub fn decode_quote_content(raw: &str, declared: usize) -> Result<String, LexError> {
    let content = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix("]\""))
        .ok_or_else(|| LexError::Malformed {
            token: raw.to_string(),
            reason: "quoted text must be `[...]\"`".to_string(),
        })?;

    let actual = content.chars().count();
    if actual != declared {
        return Err(LexError::LengthMismatch { declared, actual });
    }
    Ok(content.to_string())
}

/// Decode a `{0xHEX}` address literal
///
/// # Errors
///
/// Returns error if the braces, prefix or hex digits are missing
pub fn decode_address(raw: &str) -> Result<u64, LexError> {
    raw.strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .and_then(|hex| hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")))
        .filter(|digits| !digits.is_empty())
        .and_then(|digits| u64::from_str_radix(digits, 16).ok())
        .ok_or_else(|| LexError::InvalidAddress {
            token: raw.to_string(),
        })
}

/// Decode a single raw token by its leading character
///
/// Quoted text needs two raw tokens and is decoded by
/// [`crate::TokenCursor::next_token`] instead.
///
/// # Errors
///
/// Returns error if the token has none of the single-token forms
pub fn decode_single(raw: &str) -> Result<Token, LexError> {
    let kind = match raw.chars().next() {
        None => return Err(LexError::EmptyLine),
        Some('{') => TokenKind::HexAddress(decode_address(raw)?),
        Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => match raw.parse::<i64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Float(decode_float(raw)?),
        },
        Some(_) if raw == DEF_KEYWORD => TokenKind::Def,
        Some(_) => {
            let (tag, id) = decode_reference(raw)?;
            TokenKind::Reference { tag, id }
        }
    };
    Ok(Token::new(kind, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_definition_marker() {
        assert!(is_definition_marker("Def"));
        assert!(is_definition_marker("0"));
        assert!(!is_definition_marker("B2"));
        assert!(!is_definition_marker("10"));
    }

    #[test]
    fn test_decode_number() {
        assert_eq!(decode_number("42"), Ok(42));
        assert_eq!(decode_number("-7"), Ok(-7));
        assert!(decode_number("V3").is_err());
    }

    #[test]
    fn test_decode_reference() {
        assert_eq!(decode_reference("B2"), Ok((IdTag::Builder, LogId::new(2))));
        assert_eq!(decode_reference("V15"), Ok((IdTag::Value, LogId::new(15))));
        assert_eq!(decode_reference("T0"), Ok((IdTag::Type, LogId::NONE)));
    }

    #[test]
    fn test_decode_short_token() {
        assert_eq!(
            decode_reference("B"),
            Err(LexError::ShortToken {
                token: "B".to_string()
            })
        );
    }

    #[test]
    fn test_decode_bad_reference() {
        assert!(matches!(decode_reference("X4"), Err(LexError::Malformed { .. })));
        assert!(matches!(decode_reference("B4a"), Err(LexError::InvalidNumber { .. })));
        assert!(matches!(decode_reference("B-4"), Err(LexError::InvalidNumber { .. })));
    }

    #[test]
    fn test_decode_tagged() {
        assert_eq!(decode_tagged("V11", IdTag::Value), Ok(LogId::new(11)));
        assert_eq!(
            decode_tagged("T11", IdTag::Value),
            Err(LexError::UnexpectedTag {
                token: "T11".to_string(),
                expected: 'V',
                found: 'T',
            })
        );
    }

    #[test]
    fn test_decode_quoted() {
        let len = decode_quote_length("\"3").unwrap();
        assert_eq!(decode_quote_content("[Add]\"", len), Ok("Add".to_string()));
    }

    #[test]
    fn test_decode_quoted_length_mismatch() {
        assert_eq!(
            decode_quote_content("[Add]\"", 4),
            Err(LexError::LengthMismatch {
                declared: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_decode_quoted_counts_chars() {
        assert_eq!(decode_quote_content("[héllo]\"", 5), Ok("héllo".to_string()));
    }

    #[test]
    fn test_decode_quoted_malformed() {
        assert!(decode_quote_length("3").is_err());
        assert!(decode_quote_content("Add]\"", 3).is_err());
        assert!(decode_quote_content("[Add]", 3).is_err());
    }

    #[test]
    fn test_decode_address() {
        assert_eq!(decode_address("{0x102ef45c0}"), Ok(0x102ef45c0));
        assert_eq!(decode_address("{0X1F}"), Ok(0x1f));
        assert!(decode_address("{102ef45c0}").is_err());
        assert!(decode_address("{0x}").is_err());
        assert!(decode_address("0x10").is_err());
    }

    #[test]
    fn test_decode_single() {
        assert_eq!(decode_single("8").unwrap().kind, TokenKind::Number(8));
        assert_eq!(decode_single("2.5").unwrap().kind, TokenKind::Float(2.5));
        assert_eq!(decode_single("Def").unwrap().kind, TokenKind::Def);
        assert_eq!(
            decode_single("{0x10}").unwrap().kind,
            TokenKind::HexAddress(16)
        );
        let token = decode_single("S16").unwrap();
        assert_eq!(token.as_reference(), Some((IdTag::Statement, LogId::new(16))));
        assert_eq!(token.raw, "S16");
    }

    #[test]
    fn test_token_serialization() {
        let token = Token::new(
            TokenKind::QuotedText {
                declared_len: 3,
                content: "Add".to_string(),
            },
            "\"3 [Add]\"",
        );
        let json = serde_json::to_string(&token).unwrap();
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(token, back);
    }

    proptest! {
        #[test]
        fn prop_reference_roundtrip(id: u32, tag_index in 0usize..4) {
            let tag = IdTag::ALL[tag_index];
            let raw = LogId::new(id).tagged(tag);
            prop_assert_eq!(decode_reference(&raw), Ok((tag, LogId::new(id))));
        }

        #[test]
        fn prop_address_roundtrip(addr: u64) {
            let raw = format!("{{0x{:x}}}", addr);
            prop_assert_eq!(decode_address(&raw), Ok(addr));
        }

        #[test]
        fn prop_quote_length_enforced(content in "[a-z ]{0,20}", skew in 1usize..5) {
            let raw = format!("[{}]\"", content);
            let len = content.chars().count();
            prop_assert_eq!(decode_quote_content(&raw, len), Ok(content.clone()));
            prop_assert!(decode_quote_content(&raw, len + skew).is_err());
        }
    }
}
