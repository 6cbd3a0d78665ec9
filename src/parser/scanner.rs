//! String-aware character scanning shared by the statement splitter, the call
//! chain tokenizer and the bare-key quoting pass.
//!
//! All positions are byte offsets into the scanned `&str`.

/// Tracks whether a character stream is currently inside a quoted string.
///
/// Recognizes `"`, `'` and backtick delimiters. A string only closes on the
/// delimiter that opened it, and a backslash escapes the next character.
#[derive(Debug, Default, Clone)]
pub struct QuoteTracker {
    delimiter: Option<char>,
    escaped: bool,
}

impl QuoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one character.
    ///
    /// Returns `true` if the character belongs to a string literal, opening
    /// and closing delimiters included.
    pub fn step(&mut self, ch: char) -> bool {
        if let Some(delimiter) = self.delimiter {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == delimiter {
                self.delimiter = None;
            }
            return true;
        }

        if is_quote(ch) {
            self.delimiter = Some(ch);
            return true;
        }

        false
    }
}

/// Quote characters that open a string literal
pub fn is_quote(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '`')
}

/// Characters allowed to start a shell identifier
pub fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

/// Characters allowed inside a shell identifier
pub fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// Find the byte offset of the delimiter closing the group opened at `open_at`.
///
/// `text[open_at..]` must start with `open`. Nested `open`/`close` pairs are
/// counted and delimiters inside string literals are ignored. Returns `None`
/// when the group never closes.
pub fn find_closing(text: &str, open_at: usize, open: char, close: char) -> Option<usize> {
    let mut tracker = QuoteTracker::new();
    let mut depth = 0usize;

    for (offset, ch) in text[open_at..].char_indices() {
        if tracker.step(ch) {
            continue;
        }
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(open_at + offset);
            }
        }
    }

    None
}

/// Read an identifier starting at byte offset `start`.
///
/// Returns the identifier and the offset just past it, or `None` if no
/// identifier starts there.
pub fn read_identifier(text: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &text[start..];
    let mut chars = rest.char_indices();
    match chars.next() {
        Some((_, ch)) if is_ident_start(ch) => {}
        _ => return None,
    }

    let end = chars
        .find(|(_, ch)| !is_ident_char(*ch))
        .map(|(offset, _)| offset)
        .unwrap_or(rest.len());

    Some((&rest[..end], start + end))
}

/// Offset of the first non-whitespace character at or after `start`
pub fn skip_whitespace(text: &str, start: usize) -> usize {
    text[start..]
        .char_indices()
        .find(|(_, ch)| !ch.is_whitespace())
        .map(|(offset, _)| start + offset)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_marks_string_characters() {
        let mut tracker = QuoteTracker::new();
        let marks: Vec<bool> = "a'b'c".chars().map(|ch| tracker.step(ch)).collect();
        assert_eq!(marks, vec![false, true, true, true, false]);
    }

    #[test]
    fn test_tracker_only_closes_on_matching_delimiter() {
        let mut tracker = QuoteTracker::new();
        let marks: Vec<bool> = "\"it's\"x".chars().map(|ch| tracker.step(ch)).collect();
        assert_eq!(marks, vec![true, true, true, true, true, true, false]);
    }

    #[test]
    fn test_tracker_respects_escapes() {
        let mut tracker = QuoteTracker::new();
        let marks: Vec<bool> = r#""a\"b"x"#.chars().map(|ch| tracker.step(ch)).collect();
        assert_eq!(marks, vec![true, true, true, true, true, true, false]);

        let mut tracker = QuoteTracker::new();
        let marks: Vec<bool> = r#""a\\"x"#.chars().map(|ch| tracker.step(ch)).collect();
        assert_eq!(marks, vec![true, true, true, true, true, false]);
    }

    #[test]
    fn test_find_closing_nested() {
        let text = "(a(b)c)d";
        assert_eq!(find_closing(text, 0, '(', ')'), Some(6));
        assert_eq!(find_closing(text, 2, '(', ')'), Some(4));
    }

    #[test]
    fn test_find_closing_ignores_strings() {
        let text = r#"({msg: ")"})"#;
        assert_eq!(find_closing(text, 0, '(', ')'), Some(text.len() - 1));
    }

    #[test]
    fn test_find_closing_unbalanced() {
        assert_eq!(find_closing("(a(b)", 0, '(', ')'), None);
    }

    #[test]
    fn test_read_identifier() {
        assert_eq!(read_identifier("$gt: 1", 0), Some(("$gt", 3)));
        assert_eq!(read_identifier("db.users", 3), Some(("users", 8)));
        assert_eq!(read_identifier("1abc", 0), None);
    }

    #[test]
    fn test_skip_whitespace() {
        assert_eq!(skip_whitespace("a  \n b", 1), 5);
        assert_eq!(skip_whitespace("a   ", 1), 4);
    }
}
