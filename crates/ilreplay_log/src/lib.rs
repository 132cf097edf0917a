//! ilreplay log reader
//!
//! Turns the textual log written by the IL builder recorder into classified
//! lines and typed tokens. Nothing here knows what a statement means; that
//! is left to `ilreplay_replay`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod lexer;
pub mod line;
pub mod stream;
pub mod token;

pub use cursor::TokenCursor;
pub use lexer::{tokenize, RawToken};
pub use line::{classify, DefPayload, Definition, Line, StatementLine};
pub use stream::{LineSource, SourceLine};
pub use token::{Token, TokenKind};

#[cfg(test)]
mod tests {
    use super::*;
    use ilreplay_core::{IdTag, LogId};

    #[test]
    fn test_read_and_classify() {
        let log = "header\nDef S16 \"3 [Add]\"\nB2 S16 V15 V11 V13\nI0\n";
        let kinds: Vec<&str> = LineSource::new(log.as_bytes())
            .map(|line| {
                let line = line.unwrap();
                classify(&line.text).unwrap().label()
            })
            .collect();
        assert_eq!(kinds, vec!["definition", "statement", "end of body"]);
    }

    #[test]
    fn test_statement_arguments() {
        let Line::Statement(mut stmt) = classify("B2 S23 B19 0 V22").unwrap() else {
            panic!("expected statement");
        };
        assert_eq!(stmt.args.next_reference(IdTag::Builder).unwrap(), LogId::new(19));
        assert_eq!(stmt.args.next_optional_builder().unwrap(), None);
        assert_eq!(stmt.args.next_reference(IdTag::Value).unwrap(), LogId::new(22));
        assert!(stmt.args.finish().is_ok());
    }
}
