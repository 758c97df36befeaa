//! Recursive-descent parser for the embedded code subset.

use crate::script::ast::{AssignOp, BinaryOp, Expr, Program, Stmt, SwitchCase, UnaryOp};
use crate::script::token::{Keyword, Tok, Token};
use crate::script::ScriptError;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Tokens must end with `Tok::Eof`, as the tokenizer guarantees.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token {
                tok: Tok::Eof,
                offset: 0,
            });
        }
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Tok {
        // the trailing Eof token is never consumed, so the clamp always
        // lands on a real token
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].offset
    }

    fn bump(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ScriptError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.err(format!("expected {}", what)))
        }
    }

    fn err(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::new(message, self.offset())
    }

    pub fn parse_program(mut self) -> Result<Program, ScriptError> {
        let mut stmts = Vec::new();
        while self.peek() != &Tok::Eof {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    // ---- statements --------------------------------------------------

    fn parse_stmt(&mut self) -> Result<Stmt, ScriptError> {
        match self.peek().clone() {
            Tok::Keyword(Keyword::Var) => {
                self.pos += 1;
                let stmt = self.parse_var_decls(true)?;
                self.eat(&Tok::Semi);
                Ok(stmt)
            }
            Tok::Keyword(Keyword::Let) | Tok::Keyword(Keyword::Const) => {
                self.pos += 1;
                let stmt = self.parse_var_decls(false)?;
                self.eat(&Tok::Semi);
                Ok(stmt)
            }
            Tok::Keyword(Keyword::If) => {
                self.pos += 1;
                self.parse_if()
            }
            Tok::Keyword(Keyword::For) => {
                self.pos += 1;
                self.parse_for()
            }
            Tok::Keyword(Keyword::While) => {
                self.pos += 1;
                self.expect(Tok::LParen, "'(' after while")?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen, "')' after while condition")?;
                let body = self.block_or_stmt()?;
                Ok(Stmt::While { cond, body })
            }
            Tok::Keyword(Keyword::Do) => {
                self.pos += 1;
                let body = self.block_or_stmt()?;
                self.expect(Tok::Keyword(Keyword::While), "'while' after do body")?;
                self.expect(Tok::LParen, "'(' after while")?;
                let cond = self.parse_expr()?;
                self.expect(Tok::RParen, "')' after while condition")?;
                self.eat(&Tok::Semi);
                Ok(Stmt::DoWhile { body, cond })
            }
            Tok::Keyword(Keyword::Switch) => {
                self.pos += 1;
                self.parse_switch()
            }
            Tok::Keyword(Keyword::Try) => {
                self.pos += 1;
                self.parse_try()
            }
            Tok::Keyword(Keyword::Throw) => {
                self.pos += 1;
                let value = self.parse_expr()?;
                self.eat(&Tok::Semi);
                Ok(Stmt::Throw(value))
            }
            Tok::Keyword(Keyword::Break) => {
                self.pos += 1;
                self.eat(&Tok::Semi);
                Ok(Stmt::Break)
            }
            Tok::Keyword(Keyword::Continue) => {
                self.pos += 1;
                self.eat(&Tok::Semi);
                Ok(Stmt::Continue)
            }
            Tok::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            Tok::Semi => {
                self.pos += 1;
                Ok(Stmt::Block(Vec::new()))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.eat(&Tok::Semi);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Declarator list after `var`/`let`/`const`; leaves the
    /// terminating semicolon for the caller.
    fn parse_var_decls(&mut self, function_scoped: bool) -> Result<Stmt, ScriptError> {
        let mut decls = Vec::new();
        loop {
            let Tok::Ident(name) = self.bump() else {
                return Err(self.err("expected variable name"));
            };
            let init = if self.eat(&Tok::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            decls.push((name, init));
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(Stmt::Var {
            decls,
            function_scoped,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(Tok::LParen, "'(' after if")?;
        let cond = self.parse_expr()?;
        self.expect(Tok::RParen, "')' after if condition")?;
        let then = self.block_or_stmt()?;
        let otherwise = if self.eat(&Tok::Keyword(Keyword::Else)) {
            if self.peek() == &Tok::Keyword(Keyword::If) {
                self.pos += 1;
                Some(vec![self.parse_if()?])
            } else {
                Some(self.block_or_stmt()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(Tok::LParen, "'(' after for")?;
        let init = if self.peek() == &Tok::Semi {
            None
        } else {
            let stmt = match self.peek().clone() {
                Tok::Keyword(Keyword::Var) => {
                    self.pos += 1;
                    self.parse_var_decls(true)?
                }
                Tok::Keyword(Keyword::Let) | Tok::Keyword(Keyword::Const) => {
                    self.pos += 1;
                    self.parse_var_decls(false)?
                }
                _ => Stmt::Expr(self.parse_expr()?),
            };
            Some(Box::new(stmt))
        };
        self.expect(Tok::Semi, "';' after for initializer")?;
        let cond = if self.peek() == &Tok::Semi {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Tok::Semi, "';' after for condition")?;
        let update = if self.peek() == &Tok::RParen {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Tok::RParen, "')' after for clauses")?;
        let body = self.block_or_stmt()?;
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt, ScriptError> {
        self.expect(Tok::LParen, "'(' after switch")?;
        let value = self.parse_expr()?;
        self.expect(Tok::RParen, "')' after switch value")?;
        self.expect(Tok::LBrace, "'{' to open switch body")?;
        let mut cases = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Keyword(Keyword::Case) => {
                    self.pos += 1;
                    let test = self.parse_expr()?;
                    self.expect(Tok::Colon, "':' after case value")?;
                    cases.push(SwitchCase {
                        test: Some(test),
                        body: self.parse_case_body()?,
                    });
                }
                Tok::Keyword(Keyword::Default) => {
                    self.pos += 1;
                    self.expect(Tok::Colon, "':' after default")?;
                    cases.push(SwitchCase {
                        test: None,
                        body: self.parse_case_body()?,
                    });
                }
                Tok::RBrace => {
                    self.pos += 1;
                    return Ok(Stmt::Switch { value, cases });
                }
                _ => return Err(self.err("expected 'case', 'default' or '}' in switch body")),
            }
        }
    }

    fn parse_case_body(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Keyword(Keyword::Case) | Tok::Keyword(Keyword::Default) | Tok::RBrace => {
                    return Ok(body);
                }
                Tok::Eof => return Err(self.err("unterminated switch body")),
                _ => body.push(self.parse_stmt()?),
            }
        }
    }

    fn parse_try(&mut self) -> Result<Stmt, ScriptError> {
        let body = self.parse_block()?;
        let catch = if self.eat(&Tok::Keyword(Keyword::Catch)) {
            let binding = if self.eat(&Tok::LParen) {
                let Tok::Ident(name) = self.bump() else {
                    return Err(self.err("expected catch binding name"));
                };
                self.expect(Tok::RParen, "')' after catch binding")?;
                Some(name)
            } else {
                None
            };
            Some((binding, self.parse_block()?))
        } else {
            None
        };
        let finally = if self.eat(&Tok::Keyword(Keyword::Finally)) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.err("try requires a catch or finally clause"));
        }
        Ok(Stmt::Try {
            body,
            catch,
            finally,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(Tok::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while self.peek() != &Tok::RBrace {
            if self.peek() == &Tok::Eof {
                return Err(self.err("unterminated block"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.pos += 1;
        Ok(stmts)
    }

    fn block_or_stmt(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        if self.peek() == &Tok::LBrace {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    // ---- expressions -------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expr, ScriptError> {
        let left = self.parse_ternary()?;
        let op = match self.peek() {
            Tok::Assign => AssignOp::Assign,
            Tok::PlusAssign => AssignOp::Add,
            Tok::MinusAssign => AssignOp::Sub,
            Tok::StarAssign => AssignOp::Mul,
            Tok::SlashAssign => AssignOp::Div,
            _ => return Ok(left),
        };
        if !is_lvalue(&left) {
            return Err(self.err("invalid assignment target"));
        }
        self.pos += 1;
        let value = self.parse_assign()?;
        Ok(Expr::Assign {
            target: Box::new(left),
            op,
            value: Box::new(value),
        })
    }

    fn parse_ternary(&mut self) -> Result<Expr, ScriptError> {
        let cond = self.parse_or()?;
        if !self.eat(&Tok::Question) {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect(Tok::Colon, "':' in conditional expression")?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_and()?;
        while self.eat(&Tok::OrOr) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Tok::AndAnd) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Tok::EqEq => BinaryOp::Eq,
                Tok::EqEqEq => BinaryOp::StrictEq,
                Tok::NotEq => BinaryOp::NotEq,
                Tok::NotEqEq => BinaryOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Tok::Lt => BinaryOp::Lt,
                Tok::Le => BinaryOp::Le,
                Tok::Gt => BinaryOp::Gt,
                Tok::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        match self.peek() {
            Tok::Not => {
                self.pos += 1;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Tok::Minus => {
                self.pos += 1;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Tok::PlusPlus | Tok::MinusMinus => {
                let delta = if self.peek() == &Tok::PlusPlus {
                    1.0
                } else {
                    -1.0
                };
                self.pos += 1;
                let target = self.parse_unary()?;
                if !is_lvalue(&target) {
                    return Err(self.err("invalid increment target"));
                }
                Ok(Expr::Increment {
                    target: Box::new(target),
                    delta,
                    prefix: true,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.pos += 1;
                    let Tok::Ident(name) = self.bump() else {
                        return Err(self.err("expected property name after '.'"));
                    };
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: name,
                    };
                }
                Tok::LBracket => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(Tok::RBracket, "']' after index")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Tok::LParen => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != &Tok::RParen {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&Tok::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(Tok::RParen, "')' after arguments")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Tok::PlusPlus | Tok::MinusMinus => {
                    if !is_lvalue(&expr) {
                        return Err(self.err("invalid increment target"));
                    }
                    let delta = if self.peek() == &Tok::PlusPlus {
                        1.0
                    } else {
                        -1.0
                    };
                    self.pos += 1;
                    expr = Expr::Increment {
                        target: Box::new(expr),
                        delta,
                        prefix: false,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        match self.bump() {
            Tok::Number(n) => Ok(Expr::Number(n)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::Ident(name) => Ok(Expr::Ident(name)),
            Tok::Keyword(Keyword::True) => Ok(Expr::Bool(true)),
            Tok::Keyword(Keyword::False) => Ok(Expr::Bool(false)),
            Tok::Keyword(Keyword::Null) | Tok::Keyword(Keyword::Undefined) => Ok(Expr::Null),
            Tok::LParen => {
                let expr = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(expr)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                if self.peek() != &Tok::RBracket {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Tok::RBracket, "']' after array literal")?;
                Ok(Expr::Array(items))
            }
            Tok::LBrace => {
                let mut entries = Vec::new();
                if self.peek() != &Tok::RBrace {
                    loop {
                        let key = match self.bump() {
                            Tok::Ident(name) => name,
                            Tok::Str(s) => s,
                            Tok::Number(n) => crate::escape::display_value(&serde_json::json!(n)),
                            _ => return Err(self.err("expected property key")),
                        };
                        self.expect(Tok::Colon, "':' after property key")?;
                        entries.push((key, self.parse_expr()?));
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Tok::RBrace, "'}' after object literal")?;
                Ok(Expr::Object(entries))
            }
            other => Err(ScriptError::new(
                format!("unexpected token {:?}", other),
                self.tokens
                    .get(self.pos.saturating_sub(1))
                    .map(|t| t.offset)
                    .unwrap_or_default(),
            )),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn is_lvalue(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let program = parse("x = 1 + 2 * 3;").unwrap();
        let Stmt::Expr(Expr::Assign { value, .. }) = &program[0] else {
            panic!("expected assignment");
        };
        let Expr::Binary {
            op: BinaryOp::Add,
            right,
            ..
        } = value.as_ref()
        else {
            panic!("expected addition at the top");
        };
        assert!(matches!(
            right.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn if_else_chain_nests() {
        let program = parse("if(a){1;}else if(b){2;}else{3;}").unwrap();
        let Stmt::If { otherwise, .. } = &program[0] else {
            panic!("expected if");
        };
        let chain = otherwise.as_ref().unwrap();
        assert!(matches!(chain[0], Stmt::If { .. }));
    }

    #[test]
    fn for_loop_with_var_init() {
        let program = parse("for(var i = 0; i < 3; i++){ total += i; }").unwrap();
        let Stmt::For {
            init, cond, update, ..
        } = &program[0]
        else {
            panic!("expected for");
        };
        assert!(matches!(
            init.as_deref(),
            Some(Stmt::Var {
                function_scoped: true,
                ..
            })
        ));
        assert!(cond.is_some());
        assert!(matches!(update, Some(Expr::Increment { .. })));
    }

    #[test]
    fn switch_cases_and_default() {
        let program = parse("switch(x){case 1: a(); case 2: b(); break; default: c();}").unwrap();
        let Stmt::Switch { cases, .. } = &program[0] else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 3);
        assert!(cases[2].test.is_none());
        assert_eq!(cases[1].body.len(), 2);
    }

    #[test]
    fn try_catch_finally() {
        let program = parse("try{a();}catch(e){b(e);}finally{c();}").unwrap();
        let Stmt::Try { catch, finally, .. } = &program[0] else {
            panic!("expected try");
        };
        assert_eq!(catch.as_ref().unwrap().0.as_deref(), Some("e"));
        assert!(finally.is_some());
    }

    #[test]
    fn bare_try_is_rejected() {
        assert!(parse("try{a();}").is_err());
    }

    #[test]
    fn object_and_array_literals() {
        let program = parse("var v = {name: 'x', \"n\": [1, 2]};").unwrap();
        let Stmt::Var { decls, .. } = &program[0] else {
            panic!("expected var");
        };
        let Some(Expr::Object(entries)) = &decls[0].1 else {
            panic!("expected object literal");
        };
        assert_eq!(entries[0].0, "name");
        assert!(matches!(entries[1].1, Expr::Array(_)));
    }

    #[test]
    fn ternary_and_logical() {
        let program = parse("y = a && b ? c : d || e;").unwrap();
        let Stmt::Expr(Expr::Assign { value, .. }) = &program[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(value.as_ref(), Expr::Ternary { .. }));
    }

    #[test]
    fn assignment_to_literal_is_an_error() {
        let err = parse("3 = x;").unwrap_err();
        assert!(err.message.contains("invalid assignment target"));
    }

    #[test]
    fn member_call_index_chain() {
        let program = parse("s.split(',')[0].trim();").unwrap();
        assert!(matches!(program[0], Stmt::Expr(Expr::Call { .. })));
    }
}
