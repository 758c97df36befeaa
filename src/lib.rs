//! vellum - a Razor-style template compiler and rendering engine.
//!
//! Templates are plain markup with a `@` marker switching into embedded
//! code: `@name` emits an escaped expression, `@{ ... }` runs a code
//! block, and `@if`/`@for`/`@while`/`@switch`/`@do`/`@try` interleave
//! control flow with markup. A single-pass lexer segments the template,
//! a code generator lowers the segments to a small program, and a
//! bundled interpreter executes that program against a
//! `serde_json::Value` model.
//!
//! ```
//! use serde_json::json;
//!
//! let compiled = vellum::compile("<p>Hello @name!</p>").unwrap();
//! let html = compiled.render(&json!({"name": "Sky"})).unwrap();
//! assert_eq!(html, "<p>Hello Sky!</p>");
//! ```
//!
//! File-based rendering with layouts, partials and a production cache
//! goes through [`ViewEngine`].

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod cache;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod escape;
pub mod lexer;
pub mod loader;
pub mod script;

// Re-export main types for public API
pub use compiler::{compile, compile_with_path, CompiledTemplate, Invocation};
pub use config::EngineConfig;
pub use engine::ViewEngine;
pub use error::{Error, Result, SourceLocation, SyntaxErrorKind};
pub use escape::{escape_html, raw, unescape_html};
pub use lexer::{Lexer, Mode, Segment, SegmentKind};
pub use loader::{FsLoader, ViewLoader};
pub use script::{NoHooks, RenderHooks};

// Re-export commonly used external types
pub use serde_json::{json, Value};
