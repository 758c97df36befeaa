//! Single-pass markup/script segmenter.
//!
//! The lexer walks the template once, alternating between a markup read
//! and a script read, and produces a flat sequence of [`Segment`]s. It
//! performs no HTML validation and no expression parsing; expression
//! text is carried through verbatim for the code generator.

use crate::cursor::Cursor;
use crate::error::{Error, Result, SyntaxErrorKind};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// The character that switches from markup to script.
pub const MARKER: char = '@';

/// Which read procedure runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Markup,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal output text.
    Markup,
    /// An expression whose value is escaped and emitted.
    Expression,
    /// Embedded code carried through verbatim.
    Block,
}

/// The sole interface between the lexer and the code generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Segment {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteKind {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy)]
struct QuoteState {
    kind: QuoteKind,
    position: usize,
}

/// Distinguishes plain code braces from script-block braces, and tags
/// the control-flow kinds whose closing brace may carry a continuation
/// clause (`else`, `while`, `catch`, `finally`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceKind {
    Plain,
    Block,
    If,
    For,
    While,
    Do,
    Switch,
    Try,
}

#[derive(Debug, Clone, Copy)]
struct BraceState {
    kind: BraceKind,
    position: usize,
}

#[derive(Debug, Clone)]
struct TagState {
    name: String,
    position: usize,
}

/// Tag header currently being scanned in markup mode. Kept on the lexer
/// so `<div class="@cls">` survives the expression interruption.
#[derive(Debug, Clone)]
struct PendingTag {
    name: String,
    void: bool,
}

static VOID_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
        "meta", "param", "source", "track", "wbr",
    ]
    .into_iter()
    .collect()
});

/// Template keyword headers: keyword, brace kind, whether a
/// parenthesized head is required before the opening brace.
const KEYWORDS: [(&str, BraceKind, bool); 6] = [
    ("if", BraceKind::If, true),
    ("for", BraceKind::For, true),
    ("while", BraceKind::While, true),
    ("do", BraceKind::Do, false),
    ("switch", BraceKind::Switch, true),
    ("try", BraceKind::Try, false),
];

pub struct Lexer {
    cursor: Cursor,
    mode: Mode,
    quotes: Vec<QuoteState>,
    braces: Vec<BraceState>,
    brackets: Vec<usize>,
    tags: Vec<TagState>,
    pending_tag: Option<PendingTag>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            cursor: Cursor::new(source),
            mode: Mode::Markup,
            quotes: Vec::new(),
            braces: Vec::new(),
            brackets: Vec::new(),
            tags: Vec::new(),
            pending_tag: None,
        }
    }

    /// Run the full scan, returning segments in source order. Empty
    /// segments are dropped.
    pub fn tokenize(mut self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        while !self.cursor.at_end() {
            let segment = match self.mode {
                Mode::Markup => Some(Segment::new(SegmentKind::Markup, self.read_markup())),
                Mode::Script => self.next_script_segment()?,
            };
            if let Some(segment) = segment {
                if !segment.text.is_empty() {
                    segments.push(segment);
                }
            }
        }
        self.check_balanced()?;
        Ok(segments)
    }

    fn syntax_at(&self, kind: SyntaxErrorKind, position: usize) -> Error {
        Error::syntax(kind, self.cursor.source(), position)
    }

    /// All trackers must be empty once the input runs out; a leftover
    /// entry is reported at its opener's position.
    fn check_balanced(&self) -> Result<()> {
        if let Some(quote) = self.quotes.first() {
            return Err(self.syntax_at(SyntaxErrorKind::UnmatchedQuote, quote.position));
        }
        if let Some(brace) = self.braces.first() {
            return Err(self.syntax_at(SyntaxErrorKind::UnmatchedBrace, brace.position));
        }
        if let Some(&paren) = self.brackets.first() {
            return Err(self.syntax_at(SyntaxErrorKind::UnmatchedParen, paren));
        }
        if let Some(tag) = self.tags.first() {
            return Err(self.syntax_at(
                SyntaxErrorKind::UnclosedTag(tag.name.clone()),
                tag.position,
            ));
        }
        Ok(())
    }

    fn in_block(&self) -> bool {
        !self.braces.is_empty()
    }

    // ---- markup mode -------------------------------------------------

    /// Copy literal text until the marker or, inside a script block,
    /// until a tag closes the markup island. Never fails.
    fn read_markup(&mut self) -> String {
        let mut out = String::new();
        while let Some(ch) = self.cursor.current() {
            match ch {
                MARKER => break,
                '<' => match self.scan_tag_open(&mut out) {
                    Some(true) => {
                        self.mode = Mode::Script;
                        return out;
                    }
                    Some(false) => {}
                    // not a tag, just text
                    None => {
                        out.push(ch);
                        self.cursor.advance();
                    }
                },
                '>' if self.pending_tag.is_some() => {
                    let done = self.finish_pending_tag(&out);
                    out.push(ch);
                    self.cursor.advance();
                    if done {
                        self.mode = Mode::Script;
                        return out;
                    }
                }
                _ => {
                    out.push(ch);
                    self.cursor.advance();
                }
            }
        }
        self.mode = Mode::Script;
        out
    }

    /// Handle a `<` in markup mode. `Some(true)` means a tag ended a
    /// markup island inside a script block and control returns to the
    /// script read; `Some(false)` means a tag header was consumed or
    /// started; `None` means the `<` is literal text.
    fn scan_tag_open(&mut self, out: &mut String) -> Option<bool> {
        if let Some((name, len)) = self.match_closing_tag() {
            out.push_str(&self.cursor.consume(len));
            self.pop_tag(&name);
            return Some(self.in_block());
        }
        match self.cursor.peek(1) {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return None,
        }
        let start = self.cursor.position();
        let mut name = String::new();
        let mut len = 1;
        while let Some(c) = self.cursor.peek(len) {
            if c.is_ascii_alphanumeric() || c == '-' {
                name.push(c);
                len += 1;
            } else {
                break;
            }
        }
        out.push_str(&self.cursor.consume(len));
        let void = VOID_ELEMENTS.contains(name.to_ascii_lowercase().as_str());
        if !void && self.in_block() {
            self.tags.push(TagState {
                name: name.clone(),
                position: start,
            });
        }
        self.pending_tag = Some(PendingTag { name, void });
        Some(false)
    }

    /// Lookahead match of `</name >` at the current `<`; returns the tag
    /// name and the total length through `>`.
    fn match_closing_tag(&self) -> Option<(String, usize)> {
        if self.cursor.peek(1) != Some('/') {
            return None;
        }
        let mut i = 2;
        let mut name = String::new();
        while let Some(c) = self.cursor.peek(i) {
            if c.is_ascii_alphanumeric() || c == '-' {
                name.push(c);
                i += 1;
            } else {
                break;
            }
        }
        if name.is_empty() {
            return None;
        }
        i = self.skip_ws_from(i);
        if self.cursor.peek(i) == Some('>') {
            Some((name, i + 1))
        } else {
            None
        }
    }

    /// Pop the innermost open tag with the given name, along with any
    /// deeper entries left behind by sloppy nesting.
    fn pop_tag(&mut self, name: &str) {
        if let Some(i) = self
            .tags
            .iter()
            .rposition(|t| t.name.eq_ignore_ascii_case(name))
        {
            self.tags.truncate(i);
        }
    }

    /// Resolve the pending tag header at its `>`; reports whether markup
    /// should hand back to the script read.
    fn finish_pending_tag(&mut self, out: &str) -> bool {
        let Some(pending) = self.pending_tag.take() else {
            return false;
        };
        let self_closed = out.ends_with('/');
        if self_closed && !pending.void {
            self.pop_tag(&pending.name);
        }
        (pending.void || self_closed) && self.in_block()
    }

    // ---- script mode -------------------------------------------------

    fn next_script_segment(&mut self) -> Result<Option<Segment>> {
        if self.cursor.current() != Some(MARKER) {
            // a markup island inside a block ended; resume the block
            let code = self.read_block()?;
            return Ok(Some(Segment::new(SegmentKind::Block, code)));
        }
        let marker_pos = self.cursor.position();
        self.cursor.advance();
        let Some(next) = self.cursor.current() else {
            return Err(self.syntax_at(SyntaxErrorKind::UnexpectedEndOfInput, marker_pos));
        };
        match next {
            MARKER => {
                self.cursor.advance();
                self.mode = Mode::Markup;
                Ok(Some(Segment::new(SegmentKind::Markup, "@")))
            }
            '/' if self.cursor.peek(1) == Some('/') => {
                while let Some(c) = self.cursor.current() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                    self.cursor.advance();
                }
                self.mode = Mode::Markup;
                Ok(None)
            }
            '*' => {
                self.cursor.advance();
                loop {
                    if self.cursor.at_end() {
                        return Err(
                            self.syntax_at(SyntaxErrorKind::UnterminatedComment, marker_pos)
                        );
                    }
                    if self.cursor.current() == Some('*') && self.cursor.peek(1) == Some(MARKER) {
                        self.cursor.consume(2);
                        break;
                    }
                    self.cursor.advance();
                }
                self.mode = Mode::Markup;
                Ok(None)
            }
            '"' | '\'' => Err(self.syntax_at(
                SyntaxErrorKind::IllegalCharacterAfterMarker(next),
                self.cursor.position(),
            )),
            '(' => {
                let text = self.read_paren_expression()?;
                self.mode = Mode::Markup;
                let inner = text.trim_start_matches('(').trim_end_matches(')');
                if inner.trim().is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Segment::new(SegmentKind::Expression, text)))
                }
            }
            '{' => {
                let code = self.read_block()?;
                Ok(Some(Segment::new(SegmentKind::Block, code)))
            }
            c if c.is_alphabetic() => {
                if let Some(segment) = self.read_keyword_block()? {
                    Ok(Some(segment))
                } else {
                    let text = self.read_inline_expression()?;
                    Ok(Some(Segment::new(SegmentKind::Expression, text)))
                }
            }
            c if c.is_numeric() || c == '_' || c == '$' || c == '[' || c == '!' => {
                let text = self.read_inline_expression()?;
                Ok(Some(Segment::new(SegmentKind::Expression, text)))
            }
            c => Err(self.syntax_at(
                SyntaxErrorKind::IllegalCharacterAfterMarker(c),
                self.cursor.position(),
            )),
        }
    }

    /// `@if (...) {`, `@for (...) {`, `@while (...) {`, `@switch (...) {`,
    /// `@do {`, `@try {`. Returns `None` when the shape does not match so
    /// the inline-expression read takes over (e.g. `@iffy`).
    fn read_keyword_block(&mut self) -> Result<Option<Segment>> {
        for (keyword, kind, parens) in KEYWORDS {
            if let Some(len) = self.match_keyword_header(keyword, parens) {
                let brace_pos = self.cursor.position() + len - 1;
                let mut text = self.cursor.consume(len);
                self.braces.push(BraceState {
                    kind,
                    position: brace_pos,
                });
                text.push_str(&self.read_block()?);
                return Ok(Some(Segment::new(SegmentKind::Block, text)));
            }
        }
        Ok(None)
    }

    /// Length through the opening `{` when the header matches at the
    /// current position.
    fn match_keyword_header(&self, keyword: &str, parens: bool) -> Option<usize> {
        let i = self.match_word_at(0, keyword)?;
        let mut i = self.skip_ws_from(i);
        if parens {
            if self.cursor.peek(i) != Some('(') {
                return None;
            }
            i = self.match_paren_group_at(i)?;
            i = self.skip_ws_from(i);
        }
        if self.cursor.peek(i) == Some('{') {
            Some(i + 1)
        } else {
            None
        }
    }

    /// An expression started by an identifier-like character: member
    /// chains, calls, indexing. Terminated by whitespace, a comma, a
    /// quote, or any other character outside a group.
    fn read_inline_expression(&mut self) -> Result<String> {
        let mut out = String::new();
        let mut groups: Vec<usize> = Vec::new();
        let mut quote: Option<(char, usize)> = None;
        let mut prev: Option<char> = None;
        while let Some(ch) = self.cursor.current() {
            if let Some((q, _)) = quote {
                if ch == q && prev != Some('\\') {
                    quote = None;
                }
                out.push(ch);
                prev = Some(ch);
                self.cursor.advance();
                continue;
            }
            match ch {
                '"' | '\'' => {
                    // a quote outside a group ends the expression and
                    // belongs to the markup that follows
                    if groups.is_empty() {
                        break;
                    }
                    quote = Some((ch, self.cursor.position()));
                    out.push(ch);
                }
                '(' | '[' => {
                    groups.push(self.cursor.position());
                    out.push(ch);
                }
                ')' | ']' => {
                    if groups.is_empty() {
                        break;
                    }
                    groups.pop();
                    out.push(ch);
                    if groups.is_empty() {
                        // the chain continues through `.x`, `[i]`, `(..)`
                        let next = self.cursor.peek(1);
                        if !matches!(next, Some('.') | Some('[') | Some('(')) {
                            self.cursor.advance();
                            break;
                        }
                    }
                }
                ' ' | ',' => {
                    if groups.is_empty() {
                        break;
                    }
                    out.push(ch);
                }
                '.' => out.push(ch),
                '!' if out.chars().all(|c| c == '!') && groups.is_empty() => out.push(ch),
                c if c.is_alphanumeric() || c == '_' || c == '$' => out.push(c),
                _ => {
                    if !groups.is_empty() {
                        out.push(ch);
                    } else {
                        break;
                    }
                }
            }
            prev = Some(ch);
            self.cursor.advance();
        }
        if let Some((_, position)) = quote {
            return Err(self.syntax_at(SyntaxErrorKind::UnmatchedQuote, position));
        }
        if let Some(&position) = groups.first() {
            return Err(self.syntax_at(SyntaxErrorKind::UnmatchedParen, position));
        }
        self.mode = Mode::Markup;
        Ok(out)
    }

    /// `@(...)`: naive balanced-paren read, outer parens included.
    /// Quotes are deliberately not special-cased here.
    fn read_paren_expression(&mut self) -> Result<String> {
        let start = self.cursor.position();
        let mut depth = 0usize;
        let mut out = String::new();
        loop {
            let Some(ch) = self.cursor.current() else {
                return Err(self.syntax_at(SyntaxErrorKind::UnmatchedParen, start));
            };
            match ch {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            out.push(ch);
            self.cursor.advance();
            if depth == 0 {
                return Ok(out);
            }
        }
    }

    /// Verbatim embedded code until the script block's closing brace or
    /// until markup resumes at an unquoted `<`.
    fn read_block(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(ch) = self.cursor.current() {
            let position = self.cursor.position();
            let in_quote = !self.quotes.is_empty();
            if ch == MARKER && !in_quote {
                return Err(self.syntax_at(SyntaxErrorKind::MarkerInsideBlock, position));
            }
            if (ch == '"' || ch == '\'') && self.cursor.prev() != Some('\\') {
                let kind = if ch == '"' {
                    QuoteKind::Double
                } else {
                    QuoteKind::Single
                };
                match self.quotes.last() {
                    None => self.quotes.push(QuoteState { kind, position }),
                    Some(open) if open.kind == kind => {
                        self.quotes.pop();
                    }
                    Some(_) => {}
                }
                out.push(ch);
                self.cursor.advance();
                continue;
            }
            if in_quote {
                out.push(ch);
                self.cursor.advance();
                continue;
            }
            match ch {
                '<' if self.markup_resumes() => {
                    self.mode = Mode::Markup;
                    return Ok(out);
                }
                '(' => {
                    self.brackets.push(position);
                    out.push(ch);
                    self.cursor.advance();
                }
                ')' => {
                    if self.brackets.pop().is_none() {
                        return Err(self.syntax_at(SyntaxErrorKind::UnmatchedParen, position));
                    }
                    out.push(ch);
                    self.cursor.advance();
                }
                '{' => {
                    let kind = if self.cursor.prev() == Some(MARKER) {
                        BraceKind::Block
                    } else {
                        BraceKind::Plain
                    };
                    self.braces.push(BraceState { kind, position });
                    out.push(ch);
                    self.cursor.advance();
                }
                '}' => {
                    let Some(closed) = self.braces.pop() else {
                        return Err(self.syntax_at(SyntaxErrorKind::UnmatchedBrace, position));
                    };
                    if closed.kind == BraceKind::Plain {
                        out.push(ch);
                        self.cursor.advance();
                        continue;
                    }
                    match self.scan_continuation(closed.kind) {
                        Some((len, reopen)) => {
                            out.push_str(&self.cursor.consume(len));
                            if let Some(kind) = reopen {
                                self.braces.push(BraceState {
                                    kind,
                                    position: self.cursor.position(),
                                });
                            }
                        }
                        None => {
                            out.push(ch);
                            self.cursor.advance();
                            self.mode = Mode::Markup;
                            return Ok(out);
                        }
                    }
                }
                _ => {
                    out.push(ch);
                    self.cursor.advance();
                }
            }
        }
        // input ran out with the block still open; check_balanced
        // reports the unmatched opener
        self.mode = Mode::Markup;
        Ok(out)
    }

    /// An unquoted `<` hands back to markup unless it sits inside a
    /// parenthesized expression opened after the current brace.
    fn markup_resumes(&self) -> bool {
        match (self.brackets.last(), self.braces.last()) {
            (None, _) => true,
            (Some(&paren), Some(brace)) => paren < brace.position,
            (Some(_), None) => false,
        }
    }

    /// Continuation clause lookahead at a closing brace: `}else{`,
    /// `}else if(..){`, `}while(..)`, `}catch(..){`, `}finally{`.
    /// Returns the consumed length (including the `}`) and the brace
    /// kind to reopen, if any.
    fn scan_continuation(&self, kind: BraceKind) -> Option<(usize, Option<BraceKind>)> {
        match kind {
            BraceKind::If => {
                let i = self.skip_ws_from(1);
                let i = self.match_word_at(i, "else")?;
                let j = self.skip_ws_from(i);
                if self.cursor.peek(j) == Some('{') {
                    return Some((j + 1, Some(BraceKind::If)));
                }
                let j = self.match_word_at(j, "if")?;
                let j = self.skip_ws_from(j);
                if self.cursor.peek(j) != Some('(') {
                    return None;
                }
                let j = self.match_paren_group_at(j)?;
                let j = self.skip_ws_from(j);
                if self.cursor.peek(j) == Some('{') {
                    Some((j + 1, Some(BraceKind::If)))
                } else {
                    None
                }
            }
            BraceKind::Do => {
                let i = self.skip_ws_from(1);
                let i = self.match_word_at(i, "while")?;
                let i = self.skip_ws_from(i);
                if self.cursor.peek(i) != Some('(') {
                    return None;
                }
                let i = self.match_paren_group_at(i)?;
                Some((i, None))
            }
            BraceKind::Try => {
                let i = self.skip_ws_from(1);
                if let Some(j) = self.match_word_at(i, "catch") {
                    let j = self.skip_ws_from(j);
                    if self.cursor.peek(j) == Some('(') {
                        if let Some(j) = self.match_paren_group_at(j) {
                            let j = self.skip_ws_from(j);
                            if self.cursor.peek(j) == Some('{') {
                                return Some((j + 1, Some(BraceKind::Try)));
                            }
                        }
                    }
                }
                let j = self.match_word_at(i, "finally")?;
                let j = self.skip_ws_from(j);
                if self.cursor.peek(j) == Some('{') {
                    Some((j + 1, Some(BraceKind::Try)))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    // ---- lookahead helpers -------------------------------------------

    fn skip_ws_from(&self, mut i: usize) -> usize {
        while matches!(self.cursor.peek(i), Some(c) if c.is_whitespace()) {
            i += 1;
        }
        i
    }

    /// Match `word` at relative offset `i` with a word boundary after
    /// it; returns the offset past the word.
    fn match_word_at(&self, i: usize, word: &str) -> Option<usize> {
        let mut j = i;
        for ch in word.chars() {
            if self.cursor.peek(j) != Some(ch) {
                return None;
            }
            j += 1;
        }
        match self.cursor.peek(j) {
            Some(c) if c.is_alphanumeric() || c == '_' || c == '$' => None,
            _ => Some(j),
        }
    }

    /// Quote-aware balanced paren walk starting at a `(` at relative
    /// offset `start`; returns the offset past the matching `)`.
    fn match_paren_group_at(&self, start: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut prev: Option<char> = None;
        let mut i = start;
        while let Some(ch) = self.cursor.peek(i) {
            if let Some(q) = quote {
                if ch == q && prev != Some('\\') {
                    quote = None;
                }
            } else {
                match ch {
                    '"' | '\'' => quote = Some(ch),
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                }
            }
            prev = Some(ch);
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyntaxErrorKind;

    fn lex(source: &str) -> Vec<Segment> {
        Lexer::new(source).tokenize().unwrap()
    }

    fn lex_err(source: &str) -> Error {
        Lexer::new(source).tokenize().unwrap_err()
    }

    fn kinds(segments: &[Segment]) -> Vec<SegmentKind> {
        segments.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn plain_markup_is_one_segment() {
        let segments = lex("<p>hello</p>");
        assert_eq!(segments, vec![Segment::new(SegmentKind::Markup, "<p>hello</p>")]);
    }

    #[test]
    fn empty_input_yields_no_segments() {
        assert!(lex("").is_empty());
    }

    #[test]
    fn inline_expression() {
        let segments = lex("<p>@name</p>");
        assert_eq!(
            segments,
            vec![
                Segment::new(SegmentKind::Markup, "<p>"),
                Segment::new(SegmentKind::Expression, "name"),
                Segment::new(SegmentKind::Markup, "</p>"),
            ]
        );
    }

    #[test]
    fn member_chain_with_call_and_index() {
        let segments = lex("@user.tags.join(',') next");
        assert_eq!(segments[0], Segment::new(SegmentKind::Expression, "user.tags.join(',')"));
        assert_eq!(segments[1], Segment::new(SegmentKind::Markup, " next"));
    }

    #[test]
    fn chain_continues_through_index_after_call() {
        let segments = lex("@s.split(',')[0]!");
        assert_eq!(segments[0], Segment::new(SegmentKind::Expression, "s.split(',')[0]"));
        assert_eq!(segments[1], Segment::new(SegmentKind::Markup, "!"));
    }

    #[test]
    fn quote_terminates_inline_expression() {
        // the quote belongs to the surrounding attribute
        let segments = lex(r#"<a href="@url">x</a>"#);
        assert_eq!(segments[1], Segment::new(SegmentKind::Expression, "url"));
        assert_eq!(segments[2], Segment::new(SegmentKind::Markup, "\">x</a>"));
    }

    #[test]
    fn marker_escape() {
        let segments = lex("a@@b");
        assert_eq!(
            segments,
            vec![
                Segment::new(SegmentKind::Markup, "a"),
                Segment::new(SegmentKind::Markup, "@"),
                Segment::new(SegmentKind::Markup, "b"),
            ]
        );
    }

    #[test]
    fn line_comment_is_dropped() {
        let segments = lex("a@// note\nb");
        assert_eq!(
            segments,
            vec![
                Segment::new(SegmentKind::Markup, "a"),
                Segment::new(SegmentKind::Markup, "\nb"),
            ]
        );
    }

    #[test]
    fn block_comment_is_dropped() {
        let segments = lex("a@* ignore\nme *@b");
        assert_eq!(
            segments,
            vec![
                Segment::new(SegmentKind::Markup, "a"),
                Segment::new(SegmentKind::Markup, "b"),
            ]
        );
    }

    #[test]
    fn unterminated_comment_errors() {
        let err = lex_err("a@* never closed");
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::UnterminatedComment,
                ..
            }
        ));
    }

    #[test]
    fn parenthesized_expression_keeps_parens() {
        let segments = lex("@(a + b)");
        assert_eq!(segments, vec![Segment::new(SegmentKind::Expression, "(a + b)")]);
    }

    #[test]
    fn empty_parens_are_suppressed() {
        assert!(lex("@(  )").is_empty());
    }

    #[test]
    fn explicit_block() {
        let segments = lex("@{var x = 1;}");
        assert_eq!(segments, vec![Segment::new(SegmentKind::Block, "{var x = 1;}")]);
    }

    #[test]
    fn block_quotes_protect_angle_and_marker() {
        let segments = lex(r#"@{var a = "a<b@c";}"#);
        assert_eq!(
            segments,
            vec![Segment::new(SegmentKind::Block, r#"{var a = "a<b@c";}"#)]
        );
    }

    #[test]
    fn marker_inside_block_code_errors() {
        let err = lex_err("@{var x = @y;}");
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::MarkerInsideBlock,
                ..
            }
        ));
    }

    #[test]
    fn quote_after_marker_errors() {
        let err = lex_err(r#"@"no""#);
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::IllegalCharacterAfterMarker('"'),
                ..
            }
        ));
    }

    #[test]
    fn marker_at_end_of_input_errors() {
        let err = lex_err("tail@");
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::UnexpectedEndOfInput,
                ..
            }
        ));
    }

    #[test]
    fn bare_less_than_is_literal() {
        let segments = lex("1 < 2");
        assert_eq!(segments, vec![Segment::new(SegmentKind::Markup, "1 < 2")]);
    }

    #[test]
    fn if_block_with_markup_island() {
        let segments = lex("@if(ok){<div>yes</div>}");
        assert_eq!(
            segments,
            vec![
                Segment::new(SegmentKind::Block, "if(ok){"),
                Segment::new(SegmentKind::Markup, "<div>yes</div>"),
                Segment::new(SegmentKind::Block, "}"),
            ]
        );
    }

    #[test]
    fn else_if_chain_stays_in_script() {
        let segments = lex("@if(a){<b>1</b>}else if(b){<b>2</b>}else{<b>3</b>}");
        assert_eq!(
            kinds(&segments),
            vec![
                SegmentKind::Block,
                SegmentKind::Markup,
                SegmentKind::Block,
                SegmentKind::Markup,
                SegmentKind::Block,
                SegmentKind::Markup,
                SegmentKind::Block,
            ]
        );
        assert_eq!(segments[2].text, "}else if(b){");
        assert_eq!(segments[4].text, "}else{");
    }

    #[test]
    fn do_while_tail_is_consumed_as_code() {
        let segments = lex("@do{<i>x</i>}while(i < 3)");
        assert_eq!(segments.last().unwrap(), &Segment::new(SegmentKind::Block, "}while(i < 3)"));
    }

    #[test]
    fn try_catch_finally_chain() {
        let segments = lex("@try{<p>t</p>}catch(e){<p>c</p>}finally{<p>f</p>}");
        assert_eq!(segments[2].text, "}catch(e){");
        assert_eq!(segments[4].text, "}finally{");
        assert_eq!(segments[6].text, "}");
    }

    #[test]
    fn keyword_prefix_falls_back_to_expression() {
        let segments = lex("@iffy rest");
        assert_eq!(segments[0], Segment::new(SegmentKind::Expression, "iffy"));
    }

    #[test]
    fn void_tag_ends_markup_island() {
        let segments = lex("@if(x){<br>}");
        assert_eq!(
            segments,
            vec![
                Segment::new(SegmentKind::Block, "if(x){"),
                Segment::new(SegmentKind::Markup, "<br>"),
                Segment::new(SegmentKind::Block, "}"),
            ]
        );
    }

    #[test]
    fn self_closed_tag_ends_markup_island() {
        let segments = lex("@if(x){<svg-icon name=\"x\"/>}");
        assert_eq!(segments[1].text, "<svg-icon name=\"x\"/>");
        assert_eq!(segments[2].text, "}");
    }

    #[test]
    fn attribute_expression_keeps_tag_context() {
        let segments = lex("@if(x){<div class=\"@cls\">in</div>}");
        assert_eq!(
            kinds(&segments),
            vec![
                SegmentKind::Block,
                SegmentKind::Markup,
                SegmentKind::Expression,
                SegmentKind::Markup,
                SegmentKind::Block,
            ]
        );
        assert_eq!(segments[3].text, "\">in</div>");
    }

    #[test]
    fn nested_markup_inside_block_ping_pongs() {
        let segments = lex("@if(x){<div><b>hi</b></div>}");
        assert_eq!(segments.last().unwrap().text, "}");
        let joined: String = segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Markup)
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(joined, "<div><b>hi</b></div>");
    }

    #[test]
    fn less_than_in_parens_is_code() {
        let segments = lex("@if(a < b){<b>y</b>}");
        assert_eq!(segments[0].text, "if(a < b){");
    }

    #[test]
    fn unclosed_block_reports_opening_brace_line() {
        let err = lex_err("@{\nvar x = 1;");
        match err {
            Error::Syntax {
                kind: SyntaxErrorKind::UnmatchedBrace,
                location,
                ..
            } => assert_eq!(location.row, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unclosed_inline_paren_errors() {
        let err = lex_err("@foo(1, 2");
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::UnmatchedParen,
                ..
            }
        ));
    }

    #[test]
    fn stray_closing_brace_in_code_errors() {
        // after the do-while tail the read is still in script mode, so
        // the extra } has no opener
        let err = lex_err("@do{<i>a</i>}while(x)}");
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::UnmatchedBrace,
                ..
            }
        ));
    }

    #[test]
    fn brace_closed_after_marker_escape() {
        let segments = lex("@if(x){<b>a@@b</b>}");
        assert_eq!(segments.last().unwrap().text, "}");
    }
}
