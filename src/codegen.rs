//! Segment sequence to generated program text.

use crate::lexer::{Segment, SegmentKind};

/// Intrinsic that appends an already-safe literal chunk.
pub const EMIT_RAW: &str = "__emit_raw__";
/// Intrinsic that escapes a value and appends it.
pub const EMIT: &str = "__emit__";

/// Escape a markup chunk for embedding in a double-quoted string on a
/// single generated line.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

/// Lower the segment sequence into program text. Markup becomes an
/// emit-raw call, expressions an emit call, block code passes through
/// verbatim; statements are joined with newlines.
pub fn generate(segments: &[Segment]) -> String {
    let mut lines = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment.kind {
            SegmentKind::Markup => {
                lines.push(format!("{}(\"{}\");", EMIT_RAW, escape_literal(&segment.text)));
            }
            SegmentKind::Expression => {
                lines.push(format!("{}({});", EMIT, segment.text));
            }
            SegmentKind::Block => lines.push(segment.text.clone()),
        }
    }
    lines.join("\n")
}
