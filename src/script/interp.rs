//! Tree-walking evaluator over `serde_json::Value`.
//!
//! Thrown script values travel as `Raised::Thrown` so `try`/`catch`
//! can intercept them; host failures (IO from partial loads) travel as
//! `Raised::Fatal` and are never catchable by template code.

use crate::codegen::{EMIT, EMIT_RAW};
use crate::error::{Error, Result};
use crate::escape;
use crate::script::ast::{AssignOp, BinaryOp, Expr, Stmt, SwitchCase, UnaryOp};
use serde_json::{Map, Number, Value};

/// Host hooks a template invocation needs from its surrounding engine.
pub trait RenderHooks {
    /// Render a partial view resolved against the configured partial
    /// directory.
    fn render_partial(&self, path: &str, model: &Value) -> Result<String>;

    /// The pre-rendered content a layout substitutes via `renderBody()`.
    fn body(&self) -> Option<&str>;
}

/// Hooks for standalone string templates with no engine attached.
pub struct NoHooks;

impl RenderHooks for NoHooks {
    fn render_partial(&self, path: &str, _model: &Value) -> Result<String> {
        Err(Error::runtime(format!(
            "renderPartial('{}') requires a view engine",
            path
        )))
    }

    fn body(&self) -> Option<&str> {
        None
    }
}

enum Raised {
    Thrown(Value),
    Fatal(Error),
}

type EResult<T> = std::result::Result<T, Raised>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Result of one template invocation.
pub struct Rendered {
    pub html: String,
    pub body_called: bool,
}

/// Execute a program against a model. The root scope binds `model`
/// itself plus every top-level model key as a named variable.
pub fn run(program: &[Stmt], model: &Value, hooks: &dyn RenderHooks) -> Result<Rendered> {
    let mut root = Map::new();
    if let Value::Object(fields) = model {
        for (key, value) in fields {
            root.insert(key.clone(), value.clone());
        }
    }
    root.insert("model".to_string(), model.clone());
    let mut interp = Interpreter {
        scopes: vec![root],
        output: Vec::new(),
        hooks,
        body_called: false,
    };
    for stmt in program {
        match interp.exec_stmt(stmt) {
            Ok(_) => {}
            Err(Raised::Thrown(value)) => return Err(Error::runtime(thrown_message(&value))),
            Err(Raised::Fatal(err)) => return Err(err),
        }
    }
    Ok(Rendered {
        html: interp.output.concat(),
        body_called: interp.body_called,
    })
}

fn thrown_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn throw(message: impl Into<String>) -> Raised {
    Raised::Thrown(Value::String(message.into()))
}

struct Interpreter<'a> {
    scopes: Vec<Map<String, Value>>,
    output: Vec<String>,
    hooks: &'a dyn RenderHooks,
    body_called: bool,
}

impl Interpreter<'_> {
    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> EResult<T>) -> EResult<T> {
        self.scopes.push(Map::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    // ---- statements --------------------------------------------------

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> EResult<Flow> {
        for stmt in stmts {
            let flow = self.exec_stmt(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> EResult<Flow> {
        self.with_scope(|me| me.exec_stmts(stmts))
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EResult<Flow> {
        match stmt {
            Stmt::Var {
                decls,
                function_scoped,
            } => {
                for (name, init) in decls {
                    let value = match init {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Null,
                    };
                    let scope = if *function_scoped {
                        self.scopes.first_mut()
                    } else {
                        self.scopes.last_mut()
                    };
                    if let Some(scope) = scope {
                        scope.insert(name.clone(), value);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.exec_block(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec_block(otherwise)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while truthy(&self.eval(cond)?) {
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, cond } => {
                loop {
                    if self.exec_block(body)? == Flow::Break {
                        break;
                    }
                    if !truthy(&self.eval(cond)?) {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => self.with_scope(|me| {
                if let Some(init) = init {
                    me.exec_stmt(init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !truthy(&me.eval(cond)?) {
                            break;
                        }
                    }
                    if me.exec_block(body)? == Flow::Break {
                        break;
                    }
                    if let Some(update) = update {
                        me.eval(update)?;
                    }
                }
                Ok(Flow::Normal)
            }),
            Stmt::Switch { value, cases } => self.exec_switch(value, cases),
            Stmt::Try {
                body,
                catch,
                finally,
            } => {
                let result = match self.exec_block(body) {
                    Err(Raised::Thrown(thrown)) => match catch {
                        Some((binding, handler)) => self.with_scope(|me| {
                            if let (Some(name), Some(scope)) = (binding, me.scopes.last_mut()) {
                                scope.insert(name.clone(), thrown);
                            }
                            me.exec_stmts(handler)
                        }),
                        None => Err(Raised::Thrown(thrown)),
                    },
                    other => other,
                };
                if let Some(finally) = finally {
                    match self.exec_block(finally)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                result
            }
            Stmt::Throw(expr) => {
                let value = self.eval(expr)?;
                Err(Raised::Thrown(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Block(stmts) => self.exec_block(stmts),
        }
    }

    /// Strict matching, fallthrough until `break`, `default` as the
    /// fallback entry point.
    fn exec_switch(&mut self, value: &Expr, cases: &[SwitchCase]) -> EResult<Flow> {
        let subject = self.eval(value)?;
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let test = self.eval(test)?;
                if strict_eq(&subject, &test) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Ok(Flow::Normal),
        };
        self.with_scope(|me| {
            for case in &cases[start..] {
                match me.exec_stmts(&case.body)? {
                    Flow::Normal => {}
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Continue => return Ok(Flow::Continue),
                }
            }
            Ok(Flow::Normal)
        })
    }

    // ---- expressions -------------------------------------------------

    fn eval(&mut self, expr: &Expr) -> EResult<Value> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(number_value(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Ident(name) => match self.lookup(name) {
                Some(value) => Ok(value.clone()),
                None => Err(throw(format!("{} is not defined", name))),
            },
            Expr::Member { object, property } => {
                let object = self.eval(object)?;
                member_value(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                index_value(&object, &index)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!truthy(&value)),
                    UnaryOp::Neg => number_value(-to_number(&value)),
                })
            }
            Expr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let left = self.eval(left)?;
                    if truthy(&left) {
                        self.eval(right)
                    } else {
                        Ok(left)
                    }
                }
                BinaryOp::Or => {
                    let left = self.eval(left)?;
                    if truthy(&left) {
                        Ok(left)
                    } else {
                        self.eval(right)
                    }
                }
                _ => {
                    let left = self.eval(left)?;
                    let right = self.eval(right)?;
                    Ok(apply_binary(*op, &left, &right))
                }
            },
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign { target, op, value } => {
                let mut value = self.eval(value)?;
                if *op != AssignOp::Assign {
                    let current = self.eval(target)?;
                    let binop = match op {
                        AssignOp::Add => BinaryOp::Add,
                        AssignOp::Sub => BinaryOp::Sub,
                        AssignOp::Mul => BinaryOp::Mul,
                        _ => BinaryOp::Div,
                    };
                    value = apply_binary(binop, &current, &value);
                }
                self.assign(target, value.clone())?;
                Ok(value)
            }
            Expr::Increment {
                target,
                delta,
                prefix,
            } => {
                let old = to_number(&self.eval(target)?);
                let new = old + delta;
                self.assign(target, number_value(new))?;
                Ok(number_value(if *prefix { new } else { old }))
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> EResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> EResult<Value> {
        match callee {
            Expr::Ident(name) => {
                let args = self.eval_args(args)?;
                self.call_builtin(name, args)
            }
            Expr::Member { object, property } if property == "push" => {
                let args = self.eval_args(args)?;
                self.call_push(object, args)
            }
            Expr::Member { object, property } => {
                let receiver = self.eval(object)?;
                let args = self.eval_args(args)?;
                call_method(&receiver, property, &args)
            }
            _ => Err(throw("expression is not a function")),
        }
    }

    fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> EResult<Value> {
        let first = || args.first().cloned().unwrap_or(Value::Null);
        match name {
            n if n == EMIT_RAW => {
                let value = first();
                match value {
                    Value::String(s) => self.output.push(s),
                    other => self.output.push(escape::display_value(&other)),
                }
                Ok(Value::Null)
            }
            n if n == EMIT => {
                self.output.push(escape::escape_value(&first()));
                Ok(Value::Null)
            }
            "raw" => Ok(escape::raw(first())),
            "escapeHtml" => Ok(Value::String(match first() {
                Value::String(s) => escape::escape_html(&s),
                other => escape::display_value(&other),
            })),
            "unescapeHtml" => Ok(Value::String(escape::unescape_html(
                &escape::display_value(&first()),
            ))),
            "renderBody" => {
                self.body_called = true;
                let body = self.hooks.body().unwrap_or("").to_string();
                self.output.push(body);
                Ok(Value::Null)
            }
            "renderPartial" => {
                let path = escape::display_value(&first());
                let model = match args.get(1) {
                    Some(model) => model.clone(),
                    None => self.lookup("model").cloned().unwrap_or(Value::Null),
                };
                let html = self
                    .hooks
                    .render_partial(&path, &model)
                    .map_err(Raised::Fatal)?;
                self.output.push(html);
                Ok(Value::Null)
            }
            other => Err(throw(format!("{} is not a function", other))),
        }
    }

    /// `array.push(..)` mutates in place, so it resolves its receiver
    /// as an assignment path.
    fn call_push(&mut self, object: &Expr, args: Vec<Value>) -> EResult<Value> {
        let (root, path) = self.eval_path(object)?;
        let slot = self.resolve_slot(&root, &path)?;
        let Value::Array(items) = slot else {
            return Err(throw("push is not a function"));
        };
        items.extend(args);
        Ok(number_value(items.len() as f64))
    }

    // ---- assignment --------------------------------------------------

    /// Flatten an assignment target into a root name plus evaluated
    /// path steps. Index expressions are evaluated before any mutable
    /// borrow of the scopes.
    fn eval_path(&mut self, target: &Expr) -> EResult<(String, Vec<Value>)> {
        match target {
            Expr::Ident(name) => Ok((name.clone(), Vec::new())),
            Expr::Member { object, property } => {
                let (root, mut path) = self.eval_path(object)?;
                path.push(Value::String(property.clone()));
                Ok((root, path))
            }
            Expr::Index { object, index } => {
                let index = self.eval(index)?;
                let (root, mut path) = self.eval_path(object)?;
                path.push(index);
                Ok((root, path))
            }
            _ => Err(throw("invalid assignment target")),
        }
    }

    /// Mutable slot for a path. An unknown root is created in the root
    /// scope; arrays grow as needed for out-of-range indices.
    fn resolve_slot(&mut self, root: &str, path: &[Value]) -> EResult<&mut Value> {
        let scope_index = (0..self.scopes.len())
            .rev()
            .find(|&i| self.scopes[i].contains_key(root))
            .unwrap_or(0);
        let Some(scope) = self.scopes.get_mut(scope_index) else {
            return Err(throw(format!("{} is not defined", root)));
        };
        let mut slot = scope.entry(root.to_string()).or_insert(Value::Null);
        for step in path {
            slot = match slot {
                Value::Object(map) => map
                    .entry(escape::display_value(step))
                    .or_insert(Value::Null),
                Value::Array(items) => {
                    let index = to_number(step);
                    if index.is_nan() || index < 0.0 {
                        return Err(throw(format!("invalid array index {}", step)));
                    }
                    let index = index as usize;
                    if index >= items.len() {
                        items.resize(index + 1, Value::Null);
                    }
                    &mut items[index]
                }
                Value::Null => {
                    return Err(throw(format!(
                        "cannot set property '{}' of null",
                        escape::display_value(step)
                    )));
                }
                _ => {
                    return Err(throw(format!(
                        "cannot set property '{}' of a primitive",
                        escape::display_value(step)
                    )));
                }
            };
        }
        Ok(slot)
    }

    fn assign(&mut self, target: &Expr, value: Value) -> EResult<()> {
        let (root, path) = self.eval_path(target)?;
        let slot = self.resolve_slot(&root, &path)?;
        *slot = value;
        Ok(())
    }
}

// ---- value semantics -------------------------------------------------

fn number_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => l == r,
        (Value::Object(l), Value::Object(r)) => l == r,
        _ => false,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            let (l, r) = (to_number(left), to_number(right));
            !l.is_nan() && l == r
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            let (l, r) = (to_number(left), to_number(right));
            !l.is_nan() && !r.is_nan() && l == r
        }
        _ => strict_eq(left, right),
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if left.is_string() || right.is_string() {
                Value::String(format!(
                    "{}{}",
                    escape::display_value(left),
                    escape::display_value(right)
                ))
            } else {
                number_value(to_number(left) + to_number(right))
            }
        }
        BinaryOp::Sub => number_value(to_number(left) - to_number(right)),
        BinaryOp::Mul => number_value(to_number(left) * to_number(right)),
        BinaryOp::Div => number_value(to_number(left) / to_number(right)),
        BinaryOp::Mod => number_value(to_number(left) % to_number(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let holds = match (left, right) {
                (Value::String(l), Value::String(r)) => match op {
                    BinaryOp::Lt => l < r,
                    BinaryOp::Le => l <= r,
                    BinaryOp::Gt => l > r,
                    _ => l >= r,
                },
                _ => {
                    let (l, r) = (to_number(left), to_number(right));
                    if l.is_nan() || r.is_nan() {
                        false
                    } else {
                        match op {
                            BinaryOp::Lt => l < r,
                            BinaryOp::Le => l <= r,
                            BinaryOp::Gt => l > r,
                            _ => l >= r,
                        }
                    }
                }
            };
            Value::Bool(holds)
        }
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(left, right)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_eq(left, right)),
        // And/Or short-circuit in eval and never reach here
        BinaryOp::And | BinaryOp::Or => Value::Null,
    }
}

fn member_value(object: &Value, property: &str) -> EResult<Value> {
    if property == "length" {
        return Ok(match object {
            Value::String(s) => number_value(s.chars().count() as f64),
            Value::Array(items) => number_value(items.len() as f64),
            _ => Value::Null,
        });
    }
    match object {
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Null => Err(throw(format!(
            "cannot read property '{}' of null",
            property
        ))),
        _ => Ok(Value::Null),
    }
}

fn index_value(object: &Value, index: &Value) -> EResult<Value> {
    match object {
        Value::Array(items) => {
            let i = to_number(index);
            if i.is_nan() || i < 0.0 || i as usize >= items.len() {
                Ok(Value::Null)
            } else {
                Ok(items[i as usize].clone())
            }
        }
        Value::String(s) => {
            let i = to_number(index);
            if i.is_nan() || i < 0.0 {
                return Ok(Value::Null);
            }
            Ok(s.chars()
                .nth(i as usize)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null))
        }
        Value::Object(map) => Ok(map
            .get(&escape::display_value(index))
            .cloned()
            .unwrap_or(Value::Null)),
        Value::Null => Err(throw("cannot index null")),
        _ => Ok(Value::Null),
    }
}

/// Built-in methods for the value types. Receivers are immutable;
/// `push` is handled by the interpreter because it mutates.
fn call_method(receiver: &Value, name: &str, args: &[Value]) -> EResult<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    match (receiver, name) {
        (_, "toString") => Ok(Value::String(match receiver {
            Value::Null => "null".to_string(),
            other => escape::display_value(other),
        })),
        (Value::Number(_), "toFixed") => {
            let digits = to_number(&arg(0)).max(0.0) as usize;
            Ok(Value::String(format!(
                "{:.*}",
                digits,
                to_number(receiver)
            )))
        }
        (Value::String(s), "toUpperCase") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "toLowerCase") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::String(s.trim().to_string())),
        (Value::String(s), "charAt") => {
            let i = to_number(&arg(0));
            if i.is_nan() || i < 0.0 {
                return Ok(Value::String(String::new()));
            }
            Ok(Value::String(
                s.chars().nth(i as usize).map(String::from).unwrap_or_default(),
            ))
        }
        (Value::String(s), "substring") => {
            let chars: Vec<char> = s.chars().collect();
            let clamp = |v: &Value| {
                let n = to_number(v);
                if n.is_nan() || n < 0.0 {
                    0
                } else {
                    (n as usize).min(chars.len())
                }
            };
            let mut a = clamp(&arg(0));
            let mut b = if args.len() > 1 {
                clamp(&arg(1))
            } else {
                chars.len()
            };
            if a > b {
                std::mem::swap(&mut a, &mut b);
            }
            Ok(Value::String(chars[a..b].iter().collect()))
        }
        (Value::String(s), "indexOf") => {
            let needle = escape::display_value(&arg(0));
            match s.find(&needle) {
                Some(byte_pos) => Ok(number_value(s[..byte_pos].chars().count() as f64)),
                None => Ok(number_value(-1.0)),
            }
        }
        (Value::String(s), "split") => {
            if args.is_empty() {
                return Ok(Value::Array(vec![Value::String(s.clone())]));
            }
            let sep = escape::display_value(&arg(0));
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(&sep)
                    .map(|p| Value::String(p.to_string()))
                    .collect()
            };
            Ok(Value::Array(parts))
        }
        (Value::String(s), "replace") => {
            let pattern = escape::display_value(&arg(0));
            let replacement = escape::display_value(&arg(1));
            Ok(Value::String(s.replacen(&pattern, &replacement, 1)))
        }
        (Value::String(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let (a, b) = slice_bounds(chars.len(), args);
            Ok(Value::String(chars[a..b].iter().collect()))
        }
        (Value::Array(items), "join") => {
            let sep = if args.is_empty() {
                ",".to_string()
            } else {
                escape::display_value(&arg(0))
            };
            Ok(Value::String(
                items
                    .iter()
                    .map(escape::display_value)
                    .collect::<Vec<_>>()
                    .join(&sep),
            ))
        }
        (Value::Array(items), "indexOf") => {
            let needle = arg(0);
            let found = items
                .iter()
                .position(|item| strict_eq(item, &needle))
                .map(|i| i as f64)
                .unwrap_or(-1.0);
            Ok(number_value(found))
        }
        (Value::Array(items), "slice") => {
            let (a, b) = slice_bounds(items.len(), args);
            Ok(Value::Array(items[a..b].to_vec()))
        }
        (Value::Null, _) => Err(throw(format!(
            "cannot call '{}' on null",
            name
        ))),
        _ => Err(throw(format!("{} is not a function", name))),
    }
}

/// Normalized `[start, end)` for `slice`, with negative indices counted
/// from the end.
fn slice_bounds(len: usize, args: &[Value]) -> (usize, usize) {
    let normalize = |value: Option<&Value>, default: usize| -> usize {
        let Some(value) = value else {
            return default;
        };
        let n = to_number(value);
        if n.is_nan() {
            return 0;
        }
        if n < 0.0 {
            len.saturating_sub((-n) as usize)
        } else {
            (n as usize).min(len)
        }
    };
    let a = normalize(args.first(), 0);
    let b = normalize(args.get(1), len);
    (a.min(b), b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;
    use serde_json::json;

    fn render(source: &str, model: Value) -> Result<String> {
        let program = parse(source).map_err(|e| Error::runtime(e.message))?;
        run(&program, &model, &NoHooks).map(|r| r.html)
    }

    fn ok(source: &str, model: Value) -> String {
        render(source, model).unwrap()
    }

    #[test]
    fn emit_escapes_strings() {
        let out = ok("__emit__(name);", json!({"name": "<b>"}));
        assert_eq!(out, "&lt;b&gt;");
    }

    #[test]
    fn emit_raw_passes_through() {
        let out = ok("__emit_raw__(\"<b>\");", json!({}));
        assert_eq!(out, "<b>");
    }

    #[test]
    fn raw_wrapper_suppresses_escaping() {
        let out = ok("__emit__(raw(html));", json!({"html": "<i>x</i>"}));
        assert_eq!(out, "<i>x</i>");
    }

    #[test]
    fn model_keys_are_bound() {
        let out = ok("__emit__(user.name);", json!({"user": {"name": "Ada"}}));
        assert_eq!(out, "Ada");
    }

    #[test]
    fn model_itself_is_bound() {
        let out = ok("__emit__(model.n);", json!({"n": 7}));
        assert_eq!(out, "7");
    }

    #[test]
    fn for_loop_accumulates() {
        let out = ok(
            "var total = 0; for(var i = 1; i <= 4; i++){ total += i; } __emit__(total);",
            json!({}),
        );
        assert_eq!(out, "10");
    }

    #[test]
    fn var_in_block_is_function_scoped() {
        let out = ok("{var a = 5;} __emit__(a);", json!({}));
        assert_eq!(out, "5");
    }

    #[test]
    fn let_is_block_scoped() {
        let err = render("{let a = 5;} __emit__(a);", json!({})).unwrap_err();
        assert!(err.to_string().contains("a is not defined"));
    }

    #[test]
    fn undefined_identifier_is_catchable() {
        let out = ok(
            "try { __emit__(missing); } catch(e) { __emit_raw__(\"caught \"); __emit__(e); }",
            json!({}),
        );
        assert_eq!(out, "caught missing is not defined");
    }

    #[test]
    fn missing_property_reads_null() {
        let out = ok(
            "__emit_raw__(\"[\"); __emit__(user.phone); __emit_raw__(\"]\");",
            json!({"user": {"name": "x"}}),
        );
        assert_eq!(out, "[]");
    }

    #[test]
    fn while_and_break() {
        let out = ok(
            "var i = 0; while(true){ i++; if(i === 3){ break; } } __emit__(i);",
            json!({}),
        );
        assert_eq!(out, "3");
    }

    #[test]
    fn continue_skips_iteration() {
        let out = ok(
            "var s = ''; for(var i = 0; i < 5; i++){ if(i % 2 === 0){ continue; } s += i; } __emit__(s);",
            json!({}),
        );
        assert_eq!(out, "13");
    }

    #[test]
    fn do_while_runs_once() {
        let out = ok("var n = 0; do { n++; } while(false); __emit__(n);", json!({}));
        assert_eq!(out, "1");
    }

    #[test]
    fn switch_falls_through_until_break() {
        let out = ok(
            "switch(x){case 1: __emit_raw__(\"a\"); case 2: __emit_raw__(\"b\"); break; default: __emit_raw__(\"d\");}",
            json!({"x": 1}),
        );
        assert_eq!(out, "ab");
    }

    #[test]
    fn switch_matches_strictly() {
        let out = ok(
            "switch(x){case 1: __emit_raw__(\"num\"); break; default: __emit_raw__(\"other\");}",
            json!({"x": "1"}),
        );
        assert_eq!(out, "other");
    }

    #[test]
    fn finally_always_runs() {
        let out = ok(
            "try { throw 'x'; } catch(e) { __emit_raw__(\"c\"); } finally { __emit_raw__(\"f\"); }",
            json!({}),
        );
        assert_eq!(out, "cf");
    }

    #[test]
    fn uncaught_throw_becomes_runtime_error() {
        let err = render("throw 'kaboom';", json!({})).unwrap_err();
        assert!(matches!(err, Error::Runtime { .. }));
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn string_methods() {
        let out = ok(
            "__emit__(s.trim().toUpperCase().substring(0, 2));",
            json!({"s": "  hello  "}),
        );
        assert_eq!(out, "HE");
    }

    #[test]
    fn split_and_index() {
        let out = ok("__emit__(s.split(',')[1]);", json!({"s": "a,b,c"}));
        assert_eq!(out, "b");
    }

    #[test]
    fn array_push_mutates() {
        let out = ok(
            "var xs = [1]; xs.push(2, 3); __emit__(xs.join('-'));",
            json!({}),
        );
        assert_eq!(out, "1-2-3");
    }

    #[test]
    fn nested_assignment_through_index() {
        let out = ok(
            "var m = {rows: [0, 0]}; m.rows[1] = 9; __emit__(m.rows.join(','));",
            json!({}),
        );
        assert_eq!(out, "0,9");
    }

    #[test]
    fn plus_concatenates_with_strings() {
        let out = ok("__emit__('n=' + 4 + 2);", json!({}));
        assert_eq!(out, "n=42");
    }

    #[test]
    fn loose_vs_strict_equality() {
        let out = ok(
            "__emit__(1 == '1'); __emit_raw__(\"|\"); __emit__(1 === '1');",
            json!({}),
        );
        assert_eq!(out, "true|false");
    }

    #[test]
    fn ternary_picks_branch() {
        let out = ok("__emit__(n > 2 ? 'big' : 'small');", json!({"n": 5}));
        assert_eq!(out, "big");
    }

    #[test]
    fn to_fixed_formats() {
        let out = ok("__emit__(p.toFixed(2));", json!({"p": 3.14159}));
        assert_eq!(out, "3.14");
    }

    #[test]
    fn render_body_flag_and_content() {
        struct BodyHooks;
        impl RenderHooks for BodyHooks {
            fn render_partial(&self, _: &str, _: &Value) -> Result<String> {
                unreachable!()
            }
            fn body(&self) -> Option<&str> {
                Some("<main>inner</main>")
            }
        }
        let program = parse("__emit_raw__(\"<html>\"); renderBody(); __emit_raw__(\"</html>\");")
            .unwrap();
        let rendered = run(&program, &json!({}), &BodyHooks).unwrap();
        assert!(rendered.body_called);
        assert_eq!(rendered.html, "<html><main>inner</main></html>");
    }

    #[test]
    fn no_hooks_rejects_partials() {
        let err = render("renderPartial('nav');", json!({})).unwrap_err();
        assert!(err.to_string().contains("requires a view engine"));
    }

    #[test]
    fn partial_failure_is_not_catchable() {
        let err = render(
            "try { renderPartial('nav'); } catch(e) { __emit_raw__('swallowed'); }",
            json!({}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a view engine"));
    }
}
