//! Error types for template compilation and rendering.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A 1-based row/column position in template source, carrying a small
/// window of surrounding lines for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub row: usize,
    pub col: usize,
    /// `(row, line text)` pairs: one line before the offending line
    /// through two lines after it, where they exist.
    pub window: Vec<(usize, String)>,
}

impl SourceLocation {
    /// Compute the location of a character offset within `source`.
    pub fn of(source: &str, position: usize) -> Self {
        let mut row = 1;
        let mut col = 1;
        for ch in source.chars().take(position) {
            match ch {
                '\n' => {
                    row += 1;
                    col = 1;
                }
                '\r' => {}
                _ => col += 1,
            }
        }
        let lines: Vec<&str> = source
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
        let first = if row > 1 { row - 1 } else { 1 };
        let mut window = Vec::new();
        for r in first..=row + 2 {
            if r >= 1 && r <= lines.len() {
                window.push((r, lines[r - 1].to_string()));
            }
        }
        SourceLocation { row, col, window }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.row, self.col)
    }
}

/// Categories of template syntax errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnterminatedComment,
    IllegalCharacterAfterMarker(char),
    MarkerInsideBlock,
    UnmatchedQuote,
    UnmatchedBrace,
    UnmatchedParen,
    UnclosedTag(String),
    UnexpectedEndOfInput,
    /// Embedded code failed to parse; carries the parser's message.
    InvalidScript(String),
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxErrorKind::UnterminatedComment => write!(f, "unterminated comment"),
            SyntaxErrorKind::IllegalCharacterAfterMarker(c) => {
                write!(f, "illegal character '{}' after '@'", c)
            }
            SyntaxErrorKind::MarkerInsideBlock => {
                write!(f, "'@' is not allowed inside code blocks")
            }
            SyntaxErrorKind::UnmatchedQuote => write!(f, "unmatched quote"),
            SyntaxErrorKind::UnmatchedBrace => write!(f, "unmatched brace"),
            SyntaxErrorKind::UnmatchedParen => write!(f, "unmatched parenthesis"),
            SyntaxErrorKind::UnclosedTag(name) => write!(f, "unclosed tag <{}>", name),
            SyntaxErrorKind::UnexpectedEndOfInput => write!(f, "unexpected end of input"),
            SyntaxErrorKind::InvalidScript(msg) => write!(f, "invalid embedded code: {}", msg),
        }
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" in {}", p.display()),
        None => String::new(),
    }
}

/// Everything that can go wrong while compiling or rendering a template.
#[derive(Error, Debug)]
pub enum Error {
    /// Compile-time template syntax error. Fatal and non-retryable.
    #[error("syntax error{}: {kind} at {location}", path_suffix(.path))]
    Syntax {
        kind: SyntaxErrorKind,
        location: SourceLocation,
        path: Option<PathBuf>,
    },

    /// Error raised by embedded code while rendering.
    #[error("render error{}: {message}", path_suffix(.path))]
    Runtime {
        message: String,
        path: Option<PathBuf>,
    },

    /// Layout composition failure (missing renderBody, nesting too deep).
    #[error("layout error{}: {message}", path_suffix(.path))]
    Layout {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Syntax error at a character offset within `source`.
    pub fn syntax(kind: SyntaxErrorKind, source: &str, position: usize) -> Self {
        Error::Syntax {
            kind,
            location: SourceLocation::of(source, position),
            path: None,
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime {
            message: message.into(),
            path: None,
        }
    }

    pub fn layout(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Error::Layout {
            message: message.into(),
            path,
        }
    }

    /// Annotate the error with the owning template's path when not
    /// already set. IO errors pass through untouched.
    pub fn with_path(self, template: Option<&Path>) -> Self {
        let Some(template) = template else {
            return self;
        };
        match self {
            Error::Syntax {
                kind,
                location,
                path: None,
            } => Error::Syntax {
                kind,
                location,
                path: Some(template.to_path_buf()),
            },
            Error::Runtime {
                message,
                path: None,
            } => Error::Runtime {
                message,
                path: Some(template.to_path_buf()),
            },
            Error::Layout {
                message,
                path: None,
            } => Error::Layout {
                message,
                path: Some(template.to_path_buf()),
            },
            other => other,
        }
    }
}
