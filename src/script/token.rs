//! Tokenizer for the embedded code subset.

use crate::script::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Let,
    Const,
    If,
    Else,
    For,
    While,
    Do,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Try,
    Catch,
    Finally,
    Throw,
    True,
    False,
    Null,
    Undefined,
}

fn keyword_of(word: &str) -> Option<Keyword> {
    Some(match word {
        "var" => Keyword::Var,
        "let" => Keyword::Let,
        "const" => Keyword::Const,
        "if" => Keyword::If,
        "else" => Keyword::Else,
        "for" => Keyword::For,
        "while" => Keyword::While,
        "do" => Keyword::Do,
        "switch" => Keyword::Switch,
        "case" => Keyword::Case,
        "default" => Keyword::Default,
        "break" => Keyword::Break,
        "continue" => Keyword::Continue,
        "try" => Keyword::Try,
        "catch" => Keyword::Catch,
        "finally" => Keyword::Finally,
        "throw" => Keyword::Throw,
        "true" => Keyword::True,
        "false" => Keyword::False,
        "null" => Keyword::Null,
        "undefined" => Keyword::Undefined,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Keyword(Keyword),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Colon,
    Question,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    /// Char offset of the token's first character.
    pub offset: usize,
}

pub struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Tokenizer {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0);
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_trivia(&mut self) -> Result<(), ScriptError> {
        loop {
            match self.peek(0) {
                Some(c) if c.is_whitespace() => {
                    self.pos += 1;
                }
                Some('/') if self.peek(1) == Some('/') => {
                    while let Some(c) = self.peek(0) {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some('/') if self.peek(1) == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.peek(0) {
                            Some('*') if self.peek(1) == Some('/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => self.pos += 1,
                            None => {
                                return Err(ScriptError::new("unterminated comment", start));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_string(&mut self, quote: char, start: usize) -> Result<Tok, ScriptError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(ScriptError::new("unterminated string literal", start)),
                Some(c) if c == quote => return Ok(Tok::Str(value)),
                Some('\\') => {
                    let Some(escaped) = self.bump() else {
                        return Err(ScriptError::new("unterminated string literal", start));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '0' => value.push('\0'),
                        other => value.push(other),
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn read_number(&mut self, start: usize) -> Result<Tok, ScriptError> {
        let mut text = String::new();
        while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
            if let Some(c) = self.bump() {
                text.push(c);
            }
        }
        if self.peek(0) == Some('.') && matches!(self.peek(1), Some(c) if c.is_ascii_digit()) {
            if let Some(c) = self.bump() {
                text.push(c);
            }
            while matches!(self.peek(0), Some(c) if c.is_ascii_digit()) {
                if let Some(c) = self.bump() {
                    text.push(c);
                }
            }
        }
        text.parse::<f64>()
            .map(Tok::Number)
            .map_err(|_| ScriptError::new(format!("invalid number literal '{}'", text), start))
    }

    /// Produce the full token stream, terminated by an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ScriptError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let offset = self.pos;
            let Some(ch) = self.peek(0) else {
                tokens.push(Token {
                    tok: Tok::Eof,
                    offset,
                });
                return Ok(tokens);
            };
            let tok = match ch {
                '"' | '\'' => {
                    self.pos += 1;
                    self.read_string(ch, offset)?
                }
                c if c.is_ascii_digit() => self.read_number(offset)?,
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    let mut word = String::new();
                    while matches!(
                        self.peek(0),
                        Some(c) if c.is_alphanumeric() || c == '_' || c == '$'
                    ) {
                        if let Some(c) = self.bump() {
                            word.push(c);
                        }
                    }
                    match keyword_of(&word) {
                        Some(kw) => Tok::Keyword(kw),
                        None => Tok::Ident(word),
                    }
                }
                _ => self.read_operator(offset)?,
            };
            tokens.push(Token { tok, offset });
        }
    }

    fn read_operator(&mut self, offset: usize) -> Result<Tok, ScriptError> {
        let two: String = [self.peek(0), self.peek(1)]
            .into_iter()
            .flatten()
            .collect();
        let three: String = [self.peek(0), self.peek(1), self.peek(2)]
            .into_iter()
            .flatten()
            .collect();
        let (tok, len) = match three.as_str() {
            "===" => (Tok::EqEqEq, 3),
            "!==" => (Tok::NotEqEq, 3),
            _ => match two.as_str() {
                "==" => (Tok::EqEq, 2),
                "!=" => (Tok::NotEq, 2),
                "<=" => (Tok::Le, 2),
                ">=" => (Tok::Ge, 2),
                "&&" => (Tok::AndAnd, 2),
                "||" => (Tok::OrOr, 2),
                "++" => (Tok::PlusPlus, 2),
                "--" => (Tok::MinusMinus, 2),
                "+=" => (Tok::PlusAssign, 2),
                "-=" => (Tok::MinusAssign, 2),
                "*=" => (Tok::StarAssign, 2),
                "/=" => (Tok::SlashAssign, 2),
                _ => match self.peek(0) {
                    Some('(') => (Tok::LParen, 1),
                    Some(')') => (Tok::RParen, 1),
                    Some('{') => (Tok::LBrace, 1),
                    Some('}') => (Tok::RBrace, 1),
                    Some('[') => (Tok::LBracket, 1),
                    Some(']') => (Tok::RBracket, 1),
                    Some(';') => (Tok::Semi, 1),
                    Some(',') => (Tok::Comma, 1),
                    Some('.') => (Tok::Dot, 1),
                    Some(':') => (Tok::Colon, 1),
                    Some('?') => (Tok::Question, 1),
                    Some('=') => (Tok::Assign, 1),
                    Some('<') => (Tok::Lt, 1),
                    Some('>') => (Tok::Gt, 1),
                    Some('!') => (Tok::Not, 1),
                    Some('+') => (Tok::Plus, 1),
                    Some('-') => (Tok::Minus, 1),
                    Some('*') => (Tok::Star, 1),
                    Some('/') => (Tok::Slash, 1),
                    Some('%') => (Tok::Percent, 1),
                    Some(c) => {
                        return Err(ScriptError::new(
                            format!("unexpected character '{}'", c),
                            offset,
                        ));
                    }
                    None => {
                        return Err(ScriptError::new("unexpected end of input", offset));
                    }
                },
            },
        };
        self.pos += len;
        Ok(tok)
    }
}
