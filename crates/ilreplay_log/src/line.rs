//! Line classification.
//!
//! The leading token decides what a line is:
//!
//! | leading token      | line                                  |
//! |--------------------|---------------------------------------|
//! | `Def` or `0`       | definition of a literal               |
//! | starts with `I`    | end of the method body                |
//! | starts with `S`    | statement annotation, ignored         |
//! | `B<id>`            | statement owned by builder `<id>`     |

use crate::cursor::TokenCursor;
use crate::token::{decode_reference, decode_tagged, is_definition_marker};
use ilreplay_core::{DispatchError, IdTag, LexError, LogId, ReplayResult};
use serde::{Deserialize, Serialize};

/// Literal carried by a definition line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefPayload {
    /// `"N [text]"`
    Text(String),
    /// `{0xHEX}`
    Address(u64),
}

/// A parsed definition line: `Def <tag><id> <payload>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    /// Tag the ID was written with
    pub tag: IdTag,
    /// ID being defined
    pub id: LogId,
    /// Literal
    pub payload: DefPayload,
}

/// A statement line with its arguments still undecoded
#[derive(Debug, Clone)]
pub struct StatementLine<'a> {
    /// Builder the statement is issued against
    pub owner: LogId,
    /// ID of the interned statement name
    pub name: LogId,
    /// Cursor positioned at the first argument
    pub args: TokenCursor<'a>,
}

/// What a log line is
#[derive(Debug, Clone)]
pub enum Line<'a> {
    /// Literal definition
    Definition(Definition),
    /// End of the method body
    EndOfBody,
    /// Recorder annotation
    Annotation,
    /// Builder statement
    Statement(StatementLine<'a>),
}

impl Line<'_> {
    /// Short label for diagnostics
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Definition(_) => "definition",
            Self::EndOfBody => "end of body",
            Self::Annotation => "annotation",
            Self::Statement(_) => "statement",
        }
    }
}

/// Classify one log line
///
/// # Errors
///
/// Returns error if the line is empty, cannot be tokenized, or its leading
/// tokens do not fit any line shape
pub fn classify(text: &str) -> ReplayResult<Line<'_>> {
    let mut cursor = TokenCursor::from_line(text)?;
    let lead = cursor.peek().ok_or(LexError::EmptyLine)?;

    if is_definition_marker(lead.text) {
        cursor.next_raw("definition marker")?;
        return parse_definition(&mut cursor).map(Line::Definition);
    }

    match lead.first_char() {
        Some('I') if lead.text.len() == 1 => Err(LexError::ShortToken {
            token: lead.text.to_string(),
        }
        .into()),
        Some('I') => Ok(Line::EndOfBody),
        Some('S') => Ok(Line::Annotation),
        _ => {
            cursor.next_raw("owner")?;
            let owner = decode_tagged(lead.text, IdTag::Builder)?;
            let name = cursor.next_reference(IdTag::Statement)?;
            Ok(Line::Statement(StatementLine {
                owner,
                name,
                args: cursor,
            }))
        }
    }
}

fn parse_definition(cursor: &mut TokenCursor<'_>) -> ReplayResult<Definition> {
    let raw = cursor.next_raw("defined ID")?;
    let (tag, id) = decode_reference(raw.text)?;

    let payload = match cursor.peek().and_then(|t| t.first_char()) {
        Some('"') => DefPayload::Text(cursor.next_text()?),
        Some('{') => DefPayload::Address(cursor.next_address()?),
        Some(_) => {
            let bad = cursor.next_raw("definition payload")?;
            return Err(LexError::Malformed {
                token: bad.text.to_string(),
                reason: "definition payload must be quoted text or a hex address".to_string(),
            }
            .into());
        }
        None => {
            return Err(DispatchError::MissingArgument {
                expected: "quoted text or hex address".to_string(),
            }
            .into());
        }
    };
    cursor.finish()?;

    Ok(Definition { tag, id, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilreplay_core::ReplayError;

    #[test]
    fn test_classify_text_definition() {
        match classify("Def S16 \"3 [Add]\"").unwrap() {
            Line::Definition(def) => {
                assert_eq!(def.tag, IdTag::Statement);
                assert_eq!(def.id, LogId::new(16));
                assert_eq!(def.payload, DefPayload::Text("Add".to_string()));
            }
            other => panic!("expected definition, got {}", other.label()),
        }
    }

    #[test]
    fn test_classify_zero_marker_address() {
        match classify("0 S40 {0x7ffeeb656d30}").unwrap() {
            Line::Definition(def) => {
                assert_eq!(def.payload, DefPayload::Address(0x7ffe_eb65_6d30));
            }
            other => panic!("expected definition, got {}", other.label()),
        }
    }

    #[test]
    fn test_classify_statement() {
        match classify("B2 S16 V15 V11 V13").unwrap() {
            Line::Statement(stmt) => {
                assert_eq!(stmt.owner, LogId::new(2));
                assert_eq!(stmt.name, LogId::new(16));
                assert_eq!(stmt.args.remaining(), 3);
            }
            other => panic!("expected statement, got {}", other.label()),
        }
    }

    #[test]
    fn test_classify_sentinels() {
        assert!(matches!(classify("I0").unwrap(), Line::EndOfBody));
        assert!(matches!(classify("S3 B2 3").unwrap(), Line::Annotation));
        assert!(matches!(
            classify("I"),
            Err(ReplayError::Lex(LexError::ShortToken { .. }))
        ));
    }

    #[test]
    fn test_classify_empty() {
        assert_eq!(
            classify("   ").unwrap_err(),
            ReplayError::from(LexError::EmptyLine)
        );
    }

    #[test]
    fn test_classify_value_owner() {
        assert!(matches!(
            classify("V2 S16"),
            Err(ReplayError::Lex(LexError::UnexpectedTag { .. }))
        ));
    }

    #[test]
    fn test_classify_missing_statement_name() {
        assert!(matches!(
            classify("B2"),
            Err(ReplayError::Dispatch(DispatchError::MissingArgument { .. }))
        ));
    }

    #[test]
    fn test_definition_errors() {
        assert!(matches!(
            classify("Def S16 7"),
            Err(ReplayError::Lex(LexError::Malformed { .. }))
        ));
        assert!(matches!(
            classify("Def S16"),
            Err(ReplayError::Dispatch(DispatchError::MissingArgument { .. }))
        ));
        assert!(matches!(
            classify("Def S16 \"3 [Add]\" V2"),
            Err(ReplayError::Dispatch(DispatchError::TrailingTokens { .. }))
        ));
        assert!(matches!(
            classify("Def S16 \"4 [Add]\""),
            Err(ReplayError::Lex(LexError::LengthMismatch { .. }))
        ));
    }
}
