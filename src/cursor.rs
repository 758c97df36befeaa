//! Position-tracking view over template source text.

use crate::error::SourceLocation;

/// Character cursor with arbitrary lookahead. Positions are char
/// offsets, never byte offsets, so multibyte source is safe.
#[derive(Debug, Clone)]
pub struct Cursor {
    text: String,
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    pub fn new(source: &str) -> Self {
        Cursor {
            text: source.to_string(),
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    /// Current char offset. Always within `0..=len`.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// The character at the current position, if any.
    pub fn current(&self) -> Option<char> {
        self.peek(0)
    }

    /// The character `ahead` positions past the current one.
    pub fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    /// The character just behind the current position.
    pub fn prev(&self) -> Option<char> {
        if self.pos == 0 {
            None
        } else {
            self.chars.get(self.pos - 1).copied()
        }
    }

    pub fn advance(&mut self) {
        if self.pos < self.chars.len() {
            self.pos += 1;
        }
    }

    /// Consume up to `count` characters and return them as a string.
    pub fn consume(&mut self, count: usize) -> String {
        let end = (self.pos + count).min(self.chars.len());
        let taken: String = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        taken
    }

    pub fn source(&self) -> &str {
        &self.text
    }

    /// Row/col/window of the current position.
    pub fn location(&self) -> SourceLocation {
        SourceLocation::of(&self.text, self.pos)
    }
}
