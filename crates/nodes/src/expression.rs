//! Expression evaluator (C3) — restricted boolean/arithmetic grammar used
//! by edge conditions and `if` nodes (spec §4.3).
//!
//! A small hand-rolled recursive-descent parser, not a general-purpose
//! expression-language crate (spec §9 Design Notes): the grammar is
//! intentionally narrow and the allow-list of accepted syntax is
//! exhaustive, which keeps the attack surface small and auditable.

use serde_json::Value;

use crate::resolver::{resolve_path, ResolveMode};
use crate::scope::ExecutionContext;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression parse error: {0}")]
    Parse(String),
    #[error("expression runtime error: {0}")]
    Runtime(String),
    #[error("security violation: {0}")]
    SecurityViolation(String),
}

/// Substrings that are rejected outright before tokenizing even starts.
/// These name type/reflection/process surfaces that have no business in a
/// data-flow predicate grammar.
const DENYLIST: &[&str] = &[
    "::", "new ", "class ", "classOf", "getClass", "Class.forName", "Runtime", "Process",
    "System.", "std::", "unsafe", "transmute", "__proto__", "constructor", "prototype",
    "import ", "require(", "eval(", "Function(", "exec(",
];

/// Characters the grammar ever needs. Anything outside this set is
/// rejected before parsing.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || matches!(
            c,
            '_' | '.' | '+' | '-' | '*' | '/' | '%' | '(' | ')' | '!' | '=' | '<' | '>' | '&' | '|' | '"' | '\''
        )
}

fn reject_unsafe(input: &str) -> Result<(), ExpressionError> {
    for needle in DENYLIST {
        if input.contains(needle) {
            return Err(ExpressionError::SecurityViolation(format!(
                "expression contains disallowed construct: {needle}"
            )));
        }
    }
    if let Some(bad) = input.chars().find(|c| !is_allowed_char(*c)) {
        return Err(ExpressionError::SecurityViolation(format!(
            "expression contains disallowed character: {bad:?}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Path(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '%' => { tokens.push(Token::Percent); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            '=' if chars.get(i + 1) == Some(&'=') => { tokens.push(Token::Eq); i += 2; }
            '!' if chars.get(i + 1) == Some(&'=') => { tokens.push(Token::Ne); i += 2; }
            '!' => { tokens.push(Token::Not); i += 1; }
            '<' if chars.get(i + 1) == Some(&'=') => { tokens.push(Token::Le); i += 2; }
            '<' => { tokens.push(Token::Lt); i += 1; }
            '>' if chars.get(i + 1) == Some(&'=') => { tokens.push(Token::Ge); i += 2; }
            '>' => { tokens.push(Token::Gt); i += 1; }
            '&' if chars.get(i + 1) == Some(&'&') => { tokens.push(Token::And); i += 2; }
            '|' if chars.get(i + 1) == Some(&'|') => { tokens.push(Token::Or); i += 2; }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == quote {
                        closed = true;
                        i += 1;
                        break;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                if !closed {
                    return Err(ExpressionError::Parse("unterminated string literal".into()));
                }
                tokens.push(Token::String(s));
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text.parse().map_err(|_| ExpressionError::Parse(format!("invalid number: {text}")))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(match text.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "null" => Token::Null,
                    _ => Token::Path(text),
                });
            }
            other => return Err(ExpressionError::Parse(format!("unexpected character: {other:?}"))),
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Path(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add, Sub, Mul, Div, Mod,
    Eq, Ne, Lt, Le, Gt, Ge,
    And, Or,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, tok: &Token) -> Result<(), ExpressionError> {
        match self.advance() {
            Some(ref t) if t == tok => Ok(()),
            other => Err(ExpressionError::Parse(format!("expected {tok:?}, found {other:?}"))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExpressionError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(Box::new(left), BinOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_equality()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::Binary(Box::new(left), BinOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinOp::Eq,
                Some(Token::Ne) => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Le) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::Ge) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::String(s)) => Ok(Expr::String(s)),
            Some(Token::Bool(b)) => Ok(Expr::Bool(b)),
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::Path(p)) => Ok(Expr::Path(p)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(ExpressionError::Parse(format!("unexpected token: {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn value_to_number(v: &Value) -> Result<f64, ExpressionError> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| ExpressionError::Runtime("non-finite number".into())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        Value::String(s) => s.parse().map_err(|_| ExpressionError::Runtime(format!("cannot coerce '{s}' to number"))),
        other => Err(ExpressionError::Runtime(format!("cannot coerce {other} to number"))),
    }
}

/// Truthiness coercion: null/zero/empty -> false, everything else -> true.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Ok(x), Ok(y)) = (value_to_number(a), value_to_number(b)) {
        if matches!(a, Value::Number(_) | Value::Bool(_) | Value::Null) || matches!(b, Value::Number(_) | Value::Bool(_) | Value::Null) {
            return x == y;
        }
    }
    a == b
}

fn eval(expr: &Expr, ctx: &ExecutionContext) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Number(n) => Ok(Value::from(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Path(p) => Ok(resolve_path(p, ctx).unwrap_or(Value::Null)),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, ctx)?))),
        Expr::Neg(inner) => {
            let n = value_to_number(&eval(inner, ctx)?)?;
            Ok(Value::from(-n))
        }
        Expr::Binary(l, op, r) => {
            match op {
                BinOp::And => {
                    let lv = eval(l, ctx)?;
                    if !truthy(&lv) {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(truthy(&eval(r, ctx)?)))
                }
                BinOp::Or => {
                    let lv = eval(l, ctx)?;
                    if truthy(&lv) {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(truthy(&eval(r, ctx)?)))
                }
                BinOp::Eq => Ok(Value::Bool(values_equal(&eval(l, ctx)?, &eval(r, ctx)?))),
                BinOp::Ne => Ok(Value::Bool(!values_equal(&eval(l, ctx)?, &eval(r, ctx)?))),
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    let lv = value_to_number(&eval(l, ctx)?)?;
                    let rv = value_to_number(&eval(r, ctx)?)?;
                    let result = match op {
                        BinOp::Lt => lv < rv,
                        BinOp::Le => lv <= rv,
                        BinOp::Gt => lv > rv,
                        BinOp::Ge => lv >= rv,
                        _ => unreachable!(),
                    };
                    Ok(Value::Bool(result))
                }
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                    let lv = value_to_number(&eval(l, ctx)?)?;
                    let rv = value_to_number(&eval(r, ctx)?)?;
                    let result = match op {
                        BinOp::Add => lv + rv,
                        BinOp::Sub => lv - rv,
                        BinOp::Mul => lv * rv,
                        BinOp::Div => {
                            if rv == 0.0 {
                                return Err(ExpressionError::Runtime("division by zero".into()));
                            }
                            lv / rv
                        }
                        BinOp::Mod => {
                            if rv == 0.0 {
                                return Err(ExpressionError::Runtime("modulo by zero".into()));
                            }
                            lv % rv
                        }
                        _ => unreachable!(),
                    };
                    Ok(Value::from(result))
                }
            }
        }
    }
}

/// Parse and evaluate `source` against `ctx`, returning the coerced
/// boolean per spec §4.3. An empty or blank expression evaluates to
/// `true` (unconditional edge).
pub fn evaluate_bool(source: &str, ctx: &ExecutionContext) -> Result<bool, ExpressionError> {
    if source.trim().is_empty() {
        return Ok(true);
    }
    reject_unsafe(source)?;
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExpressionError::Parse("trailing tokens after expression".into()));
    }
    let value = eval(&expr, ctx)?;
    Ok(truthy(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ExecutionContext;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn ctx_with_input(input: Value) -> ExecutionContext {
        ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, input, serde_json::Map::new(), HashMap::new())
    }

    #[test]
    fn blank_expression_is_true() {
        let ctx = ctx_with_input(json!({}));
        assert!(evaluate_bool("", &ctx).unwrap());
        assert!(evaluate_bool("   ", &ctx).unwrap());
    }

    #[test]
    fn simple_comparison() {
        let ctx = ctx_with_input(json!({ "triggerType": "manual" }));
        assert!(evaluate_bool(r#"input.triggerType == "manual""#, &ctx).unwrap());
        assert!(!evaluate_bool(r#"input.triggerType == "webhook""#, &ctx).unwrap());
    }

    #[test]
    fn arithmetic_and_grouping() {
        let ctx = ctx_with_input(json!({}));
        assert!(evaluate_bool("(1 + 2) * 3 == 9", &ctx).unwrap());
        assert!(evaluate_bool("10 % 3 == 1", &ctx).unwrap());
    }

    #[test]
    fn logical_operators() {
        let ctx = ctx_with_input(json!({ "a": true, "b": false }));
        assert!(evaluate_bool("input.a && !input.b", &ctx).unwrap());
        assert!(evaluate_bool("input.b || input.a", &ctx).unwrap());
    }

    #[test]
    fn truthiness_coercion_of_nonboolean_result() {
        let ctx = ctx_with_input(json!({ "count": 0 }));
        assert!(!evaluate_bool("input.count", &ctx).unwrap());
        let ctx = ctx_with_input(json!({ "count": 5 }));
        assert!(evaluate_bool("input.count", &ctx).unwrap());
    }

    #[test]
    fn dangerous_substrings_are_rejected() {
        let ctx = ctx_with_input(json!({}));
        assert!(matches!(evaluate_bool("System.exit(0)", &ctx), Err(ExpressionError::SecurityViolation(_))));
        assert!(matches!(evaluate_bool("std::process::Command", &ctx), Err(ExpressionError::SecurityViolation(_))));
    }

    #[test]
    fn disallowed_characters_are_rejected() {
        let ctx = ctx_with_input(json!({}));
        assert!(matches!(evaluate_bool("input.x; rm -rf /", &ctx), Err(ExpressionError::SecurityViolation(_))));
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        let ctx = ctx_with_input(json!({}));
        assert!(matches!(evaluate_bool("1 / 0 == 1", &ctx), Err(ExpressionError::Runtime(_))));
    }
}
