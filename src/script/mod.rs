//! Tokenizer, parser and evaluator for the embedded template code.
//!
//! The language is a small, strictly defined C-family subset evaluated
//! over `serde_json::Value`. Generated program text (see
//! `crate::codegen`) is real source in this subset, so anything the
//! code generator produces parses here.

pub mod ast;
pub mod interp;
pub mod parser;
pub mod token;

pub use interp::{NoHooks, RenderHooks};

/// A parse failure inside generated program text. `position` is a char
/// offset into that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub position: usize,
}

impl ScriptError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        ScriptError {
            message: message.into(),
            position,
        }
    }
}

/// Tokenize and parse program text into an executable program.
pub fn parse(source: &str) -> Result<ast::Program, ScriptError> {
    let tokens = token::Tokenizer::new(source).tokenize()?;
    parser::Parser::new(tokens).parse_program()
}
