//! Line tokenizer.
//!
//! Splits one physical log line on whitespace. The only compound form is
//! quoted text, which the recorder writes as two words, `"N` and
//! `[content]"`. The declared length `N` is used to find where the content
//! ends, so text containing spaces still comes out as one raw token.

use ilreplay_core::LexError;

/// A token as it appears in the line, before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawToken<'a> {
    /// Token text
    pub text: &'a str,
    /// Byte offset of the token within its line
    pub offset: usize,
}

impl<'a> RawToken<'a> {
    /// Create a raw token
    #[must_use]
    pub const fn new(text: &'a str, offset: usize) -> Self {
        Self { text, offset }
    }

    /// First character, if any
    #[must_use]
    pub fn first_char(&self) -> Option<char> {
        self.text.chars().next()
    }
}

/// Split a line into raw tokens
///
/// # Errors
///
/// Returns error if a quoted span is malformed or runs off the end of the line
pub fn tokenize(line: &str) -> Result<Vec<RawToken<'_>>, LexError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(start) = skip_whitespace(line, pos) {
        let end = word_end(line, start);
        let word = &line[start..end];
        tokens.push(RawToken::new(word, start));
        pos = end;

        if let Some(digits) = word.strip_prefix('"') {
            let declared: usize = digits.parse().map_err(|_| LexError::Malformed {
                token: word.to_string(),
                reason: "quoted text must start with a character count".to_string(),
            })?;

            let open = skip_whitespace(line, pos).ok_or_else(|| LexError::UnterminatedQuote {
                token: word.to_string(),
            })?;
            if !line[open..].starts_with('[') {
                return Err(LexError::Malformed {
                    token: line[open..word_end(line, open)].to_string(),
                    reason: "expected `[` to open quoted text".to_string(),
                });
            }

            let close = quoted_end(line, open, declared).ok_or_else(|| {
                LexError::UnterminatedQuote {
                    token: word.to_string(),
                }
            })?;
            tokens.push(RawToken::new(&line[open..close], open));
            pos = close;
        }
    }

    Ok(tokens)
}

fn skip_whitespace(line: &str, from: usize) -> Option<usize> {
    line[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
}

fn word_end(line: &str, from: usize) -> usize {
    line[from..]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map_or(line.len(), |(i, _)| from + i)
}

/// Byte offset just past the `]"` closing the quoted text opened at `open`.
fn quoted_end(line: &str, open: usize, declared: usize) -> Option<usize> {
    let body_start = open + 1;
    let body = &line[body_start..];

    if let Some(split) = char_offset(body, declared) {
        let tail = &body[split..];
        if tail.starts_with("]\"") && ends_word(&tail[2..]) {
            return Some(body_start + split + 2);
        }
    }

    // The declared count does not land on a closing `]"`. Fall back to the
    // first `]"` that ends a word and let the decoder report the mismatch.
    let mut search = 0;
    while let Some(found) = body[search..].find("]\"") {
        let end = search + found + 2;
        if ends_word(&body[end..]) {
            return Some(body_start + end);
        }
        search += found + 1;
    }
    None
}

fn char_offset(s: &str, chars: usize) -> Option<usize> {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(chars)
}

fn ends_word(rest: &str) -> bool {
    rest.chars().next().is_none_or(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(line: &str) -> Vec<&str> {
        tokenize(line).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_statement_line() {
        assert_eq!(texts("B2 S16 V15 V11 V13"), vec!["B2", "S16", "V15", "V11", "V13"]);
    }

    #[test]
    fn test_definition_line() {
        assert_eq!(texts("Def S16 \"3 [Add]\""), vec!["Def", "S16", "\"3", "[Add]\""]);
    }

    #[test]
    fn test_quoted_text_with_spaces() {
        assert_eq!(
            texts("B2 S5 \"11 [hello world]\" V3"),
            vec!["B2", "S5", "\"11", "[hello world]\"", "V3"]
        );
    }

    #[test]
    fn test_quoted_text_containing_close_marker() {
        assert_eq!(texts("Def S1 \"4 [a]\"b]\""), vec!["Def", "S1", "\"4", "[a]\"b]\""]);
    }

    #[test]
    fn test_empty_quoted_text() {
        assert_eq!(texts("Def S1 \"0 []\""), vec!["Def", "S1", "\"0", "[]\""]);
    }

    #[test]
    fn test_mismatched_length_still_splits() {
        // decoder reports the mismatch, tokenizer only finds the extent
        assert_eq!(texts("Def S1 \"9 [Add]\" V2"), vec!["Def", "S1", "\"9", "[Add]\"", "V2"]);
    }

    #[test]
    fn test_hex_and_offsets() {
        let tokens = tokenize("B2 S20 V18 {0x7ffeeb656d30}").unwrap();
        assert_eq!(tokens[3].text, "{0x7ffeeb656d30}");
        assert_eq!(tokens[3].offset, 11);
        assert_eq!(tokens[0].first_char(), Some('B'));
    }

    #[test]
    fn test_extra_whitespace() {
        assert_eq!(texts("  B2\tS30  1 "), vec!["B2", "S30", "1"]);
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            tokenize("Def S1 \"3 [Add"),
            Err(LexError::UnterminatedQuote { .. })
        ));
        assert!(matches!(
            tokenize("Def S1 \"3"),
            Err(LexError::UnterminatedQuote { .. })
        ));
    }

    #[test]
    fn test_quote_without_bracket() {
        assert!(matches!(
            tokenize("Def S1 \"3 Add]\""),
            Err(LexError::Malformed { .. })
        ));
    }

    #[test]
    fn test_quote_without_count() {
        assert!(matches!(
            tokenize("Def S1 \"x [Add]\""),
            Err(LexError::Malformed { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_quoted_content_survives(content in "[a-zA-Z0-9_ ./]{0,40}") {
            let len = content.chars().count();
            let line = format!("B2 S9 T7 \"{} [{}]\" V4", len, content);
            let tokens = tokenize(&line).unwrap();
            prop_assert_eq!(tokens.len(), 6);
            let expected = format!("[{}]\"", content);
            prop_assert_eq!(tokens[4].text, expected.as_str());
            prop_assert_eq!(tokens[5].text, "V4");
        }

        #[test]
        fn prop_plain_words_split(words in proptest::collection::vec("[A-Z][0-9]{1,5}", 0..12)) {
            let line = words.join(" ");
            let tokens = tokenize(&line).unwrap();
            let got: Vec<&str> = tokens.iter().map(|t| t.text).collect();
            let want: Vec<&str> = words.iter().map(String::as_str).collect();
            prop_assert_eq!(got, want);
        }
    }
}
