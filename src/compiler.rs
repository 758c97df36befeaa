//! Template compilation: lexer + codegen + script parse, once per
//! template. The compiled unit is immutable and reusable across
//! invocations and threads.

use crate::codegen;
use crate::error::{Error, Result, SourceLocation, SyntaxErrorKind};
use crate::lexer::Lexer;
use crate::script::ast::Program;
use crate::script::interp::{self, NoHooks, RenderHooks};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};

static TEXT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<text>(.*?)</text>").expect("text tag pattern"));

/// A template compiled to an executable program.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    program_text: String,
    program: Program,
    source_path: Option<PathBuf>,
}

/// Result of one invocation, before layout composition.
pub struct Invocation {
    pub html: String,
    /// Whether `renderBody()` ran; checked when this template acts as
    /// a layout.
    pub body_called: bool,
}

impl CompiledTemplate {
    /// The generated program text. Identical inputs produce identical
    /// text.
    pub fn program_text(&self) -> &str {
        &self.program_text
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Execute against a model. `hooks` supplies partial and body
    /// behavior; use [`NoHooks`] for standalone string templates.
    pub fn invoke(&self, model: &Value, hooks: &dyn RenderHooks) -> Result<Invocation> {
        let rendered = interp::run(&self.program, model, hooks)
            .map_err(|e| e.with_path(self.source_path.as_deref()))?;
        Ok(Invocation {
            html: strip_text_tags(&rendered.html),
            body_called: rendered.body_called,
        })
    }

    /// Render with no engine attached: no partials, no layout pass.
    pub fn render(&self, model: &Value) -> Result<String> {
        Ok(self.invoke(model, &NoHooks)?.html)
    }
}

/// Compile template text into an executable unit.
pub fn compile(template: &str) -> Result<CompiledTemplate> {
    compile_with_path(template, None)
}

/// Compile template text read from `source_path`; errors are annotated
/// with the path.
pub fn compile_with_path(template: &str, source_path: Option<&Path>) -> Result<CompiledTemplate> {
    let segments = Lexer::new(template)
        .tokenize()
        .map_err(|e| e.with_path(source_path))?;
    let program_text = codegen::generate(&segments);
    log::debug!(
        "generated program ({} segments, {} chars)",
        segments.len(),
        program_text.len()
    );
    let program = crate::script::parse(&program_text).map_err(|e| Error::Syntax {
        kind: SyntaxErrorKind::InvalidScript(e.message),
        location: SourceLocation::of(&program_text, e.position),
        path: source_path.map(Path::to_path_buf),
    })?;
    Ok(CompiledTemplate {
        program_text,
        program,
        source_path: source_path.map(Path::to_path_buf),
    })
}

/// `<text>...</text>` exists only to force markup mode; the wrapper
/// disappears from output.
fn strip_text_tags(html: &str) -> String {
    TEXT_TAG.replace_all(html, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_template_renders_empty() {
        let compiled = compile("").unwrap();
        assert_eq!(compiled.render(&json!({})).unwrap(), "");
        assert_eq!(compiled.program_text(), "");
    }

    #[test]
    fn markup_round_trips() {
        let compiled = compile("<p>static</p>").unwrap();
        assert_eq!(compiled.render(&json!({})).unwrap(), "<p>static</p>");
    }

    #[test]
    fn expression_is_escaped() {
        let compiled = compile("<p>@name</p>").unwrap();
        let html = compiled.render(&json!({"name": "<Sky>"})).unwrap();
        assert_eq!(html, "<p>&lt;Sky&gt;</p>");
    }

    #[test]
    fn compiled_unit_is_reusable() {
        let compiled = compile("@greeting!").unwrap();
        assert_eq!(compiled.render(&json!({"greeting": "hi"})).unwrap(), "hi!");
        assert_eq!(compiled.render(&json!({"greeting": "yo"})).unwrap(), "yo!");
    }

    #[test]
    fn text_tags_are_stripped() {
        let compiled = compile("@if(ok){<text>plain words</text>}").unwrap();
        let html = compiled.render(&json!({"ok": true})).unwrap();
        assert_eq!(html, "plain words");
    }

    #[test]
    fn malformed_embedded_code_fails_at_compile_time() {
        let err = compile("@{var = ;}").unwrap_err();
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::InvalidScript(_),
                ..
            }
        ));
    }

    #[test]
    fn path_annotation_reaches_errors() {
        let err =
            compile_with_path("@{boom!", Some(Path::new("views/bad.html"))).unwrap_err();
        assert!(err.to_string().contains("views/bad.html"));
    }

    #[test]
    fn program_text_is_deterministic() {
        let a = compile("<p>@x</p>@if(y){<b>z</b>}").unwrap();
        let b = compile("<p>@x</p>@if(y){<b>z</b>}").unwrap();
        assert_eq!(a.program_text(), b.program_text());
    }
}
