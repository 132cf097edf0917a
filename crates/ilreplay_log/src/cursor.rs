//! Cursor over one line's tokens.
//!
//! Each statement handler receives the cursor positioned after the owner and
//! statement-name tokens and pulls its arguments in order. Running out of
//! tokens is a [`DispatchError::MissingArgument`]; a handler ends by calling
//! [`TokenCursor::finish`], which rejects anything left over.

use crate::lexer::{tokenize, RawToken};
use crate::token::{
    decode_address, decode_float, decode_number, decode_quote_content, decode_quote_length,
    decode_single, decode_tagged, is_definition_marker, Token, TokenKind, DEF_KEYWORD,
};
use ilreplay_core::{DataType, DispatchError, IdTag, LexError, LogId, ReplayResult};

/// Cursor position in a tokenized line
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    tokens: Vec<RawToken<'a>>,
    position: usize,
}

impl<'a> TokenCursor<'a> {
    /// Create a cursor at the start of `tokens`
    #[must_use]
    pub fn new(tokens: Vec<RawToken<'a>>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Tokenize `line` and place a cursor at its start
    ///
    /// # Errors
    ///
    /// Returns error if the line cannot be tokenized
    pub fn from_line(line: &'a str) -> Result<Self, LexError> {
        Ok(Self::new(tokenize(line)?))
    }

    /// Index of the next token
    #[must_use]
    pub const fn pos(&self) -> usize {
        self.position
    }

    /// Number of tokens not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.position)
    }

    /// Whether every token has been consumed
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Next raw token without consuming it
    #[must_use]
    pub fn peek(&self) -> Option<RawToken<'a>> {
        self.tokens.get(self.position).copied()
    }

    /// Consume the next raw token
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingArgument`] naming `expected` if the
    /// line has ended
    pub fn next_raw(&mut self, expected: &str) -> ReplayResult<RawToken<'a>> {
        let token = self.peek().ok_or_else(|| DispatchError::MissingArgument {
            expected: expected.to_string(),
        })?;
        self.position += 1;
        Ok(token)
    }

    /// Consume an ID reference carrying `tag`
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended, or the token is not a reference
    /// with that tag
    pub fn next_reference(&mut self, tag: IdTag) -> ReplayResult<LogId> {
        let raw = self.next_raw(&format!("{} reference", tag))?;
        Ok(decode_tagged(raw.text, tag)?)
    }

    /// Consume an optional builder slot
    ///
    /// `0`, `Def` and `B0` all mean the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the token is neither a
    /// placeholder nor a builder reference
    pub fn next_optional_builder(&mut self) -> ReplayResult<Option<LogId>> {
        let raw = self.next_raw("builder reference or 0")?;
        if is_definition_marker(raw.text) {
            return Ok(None);
        }
        Ok(decode_tagged(raw.text, IdTag::Builder)?.non_zero())
    }

    /// Consume a reference with `tag` if any token is left
    ///
    /// # Errors
    ///
    /// Returns error if a token is present but is not a reference with `tag`
    pub fn next_trailing_reference(&mut self, tag: IdTag) -> ReplayResult<Option<LogId>> {
        if self.is_end() {
            return Ok(None);
        }
        self.next_reference(tag).map(Some)
    }

    /// Consume a plain integer
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the token is not an integer
    pub fn next_i64(&mut self) -> ReplayResult<i64> {
        let raw = self.next_raw("integer")?;
        Ok(decode_number(raw.text)?)
    }

    /// Consume a non-negative count
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the token is not a count
    pub fn next_count(&mut self) -> ReplayResult<usize> {
        let raw = self.next_raw("count")?;
        let n = decode_number(raw.text)?;
        usize::try_from(n).map_err(|_| {
            LexError::Malformed {
                token: raw.text.to_string(),
                reason: "count must not be negative".to_string(),
            }
            .into()
        })
    }

    /// Consume a floating point literal
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the token is not a number
    pub fn next_f64(&mut self) -> ReplayResult<f64> {
        let raw = self.next_raw("floating point literal")?;
        Ok(decode_float(raw.text)?)
    }

    /// Consume a `0`/`1` flag
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the token is any other value
    pub fn next_bool(&mut self) -> ReplayResult<bool> {
        let raw = self.next_raw("0 or 1")?;
        match decode_number(raw.text)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(LexError::Malformed {
                token: raw.text.to_string(),
                reason: "flag must be 0 or 1".to_string(),
            }
            .into()),
        }
    }

    /// Consume quoted text (two raw tokens)
    ///
    /// # Errors
    ///
    /// Returns error if either half is missing or malformed, or the declared
    /// length disagrees with the content
    pub fn next_text(&mut self) -> ReplayResult<String> {
        let len = self.next_raw("quoted text")?;
        let declared = decode_quote_length(len.text)?;
        let content = self.next_raw("quoted text content")?;
        Ok(decode_quote_content(content.text, declared)?)
    }

    /// Consume a `{0xHEX}` address
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the token is not an address
    pub fn next_address(&mut self) -> ReplayResult<u64> {
        let raw = self.next_raw("hex address")?;
        Ok(decode_address(raw.text)?)
    }

    /// Consume a primitive type tag
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the tag is unknown
    pub fn next_data_type(&mut self) -> ReplayResult<DataType> {
        let tag = self.next_i64()?;
        Ok(DataType::from_tag(tag)?)
    }

    /// Consume whatever token comes next, decoded by its own shape
    ///
    /// # Errors
    ///
    /// Returns error if the line has ended or the token is malformed
    pub fn next_token(&mut self) -> ReplayResult<Token> {
        let first = self.next_raw("token")?;
        if first.text.starts_with('"') {
            let declared = decode_quote_length(first.text)?;
            let content = self.next_raw("quoted text content")?;
            let text = decode_quote_content(content.text, declared)?;
            return Ok(Token::new(
                TokenKind::QuotedText {
                    declared_len: declared,
                    content: text,
                },
                format!("{} {}", first.text, content.text),
            ));
        }
        if first.text == DEF_KEYWORD {
            return Ok(Token::new(TokenKind::Def, first.text));
        }
        Ok(decode_single(first.text)?)
    }

    /// Require that every token has been consumed
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TrailingTokens`] if any are left
    pub fn finish(&self) -> ReplayResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(first) => Err(DispatchError::TrailingTokens {
                count: self.remaining(),
                first: first.text.to_string(),
            }
            .into()),
        }
    }
}
