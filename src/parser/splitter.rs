//! Statement splitter for multi-statement scripts
//!
//! Splits a raw script on semicolons, never inside a quoted string and never
//! inside parentheses. It never fails: unbalanced parentheses run to the end
//! of the input and unterminated strings keep accumulating characters.

use super::scanner::QuoteTracker;

/// Statement splitter
pub struct StatementSplitter {
    input: Vec<char>,
    pos: usize,
    tracker: QuoteTracker,
    paren_depth: usize,
}

impl StatementSplitter {
    /// Create a new splitter over a raw script
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            tracker: QuoteTracker::new(),
            paren_depth: 0,
        }
    }

    /// Split the whole script into trimmed, non-empty statements
    ///
    /// # Examples
    ///
    /// ```
    /// use mongoquery::parser::StatementSplitter;
    ///
    /// let statements = StatementSplitter::split(r#"db.logs.find({msg:"a;b"}); db.logs.count({})"#);
    /// assert_eq!(statements, vec![r#"db.logs.find({msg:"a;b"})"#, "db.logs.count({})"]);
    /// ```
    pub fn split(input: &str) -> Vec<String> {
        let mut splitter = Self::new(input);
        let mut statements = Vec::new();

        while let Some(statement) = splitter.next_statement() {
            if !statement.is_empty() {
                statements.push(statement);
            }
        }

        statements
    }

    /// Scan up to the next top-level semicolon (or end of input).
    ///
    /// Returns `None` once the input is exhausted.
    fn next_statement(&mut self) -> Option<String> {
        if self.is_at_end() {
            return None;
        }

        let mut current = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();
            self.advance();

            if self.tracker.step(ch) {
                current.push(ch);
                continue;
            }

            match ch {
                '(' => self.paren_depth += 1,
                ')' => self.paren_depth = self.paren_depth.saturating_sub(1),
                ';' if self.paren_depth == 0 => return Some(current.trim().to_string()),
                _ => {}
            }
            current.push(ch);
        }

        Some(current.trim().to_string())
    }

    /// Get current character
    fn current_char(&self) -> char {
        self.input[self.pos]
    }

    /// Advance position
    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    /// Check if at end of input
    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}
