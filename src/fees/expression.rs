use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

use std::{collections::HashMap, fmt, str::FromStr};

use super::error::FeeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(Decimal),
    Bool(bool),
    Text(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Text(_) => "string",
        }
    }

    pub fn as_number(&self) -> Result<Decimal, FeeError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(FeeError::TypeMismatch(format!(
                "expected number, found {}",
                other.type_name()
            ))),
        }
    }

    fn as_bool(&self) -> Result<bool, FeeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(FeeError::TypeMismatch(format!(
                "expected bool, found {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Decimal::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Bindings an expression is evaluated against.
///
/// `now` backs the `now()` builtin so callers decide which instant
/// time-dependent terms see.
#[derive(Debug, Clone)]
pub struct Environment {
    now: i64,
    variables: HashMap<&'static str, Value>,
}

impl Environment {
    pub fn new(now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            now: now.timestamp(),
            variables: HashMap::new(),
        }
    }

    pub fn bind(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.variables.insert(name, value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Variable(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// A parsed fee expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, env: &Environment) -> Result<Value, FeeError> {
        eval(&self.root, env)
    }
}

impl FromStr for Expression {
    type Err = FeeError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(source)?;
        if tokens.len() > MAX_TOKENS {
            return Err(FeeError::Parse {
                offset: 0,
                message: format!("expression longer than {MAX_TOKENS} tokens"),
            });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.conditional()?;
        if let Some((offset, token)) = parser.tokens.get(parser.pos) {
            return Err(FeeError::Parse {
                offset: *offset,
                message: format!("unexpected {token:?}"),
            });
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Text(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FeeError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let (token, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let mut end = i;
                while end < chars.len() && (chars[end].1.is_ascii_digit() || chars[end].1 == '.')
                {
                    end += 1;
                }
                let literal: String = chars[i..end].iter().map(|(_, c)| c).collect();
                let number = Decimal::from_str(&literal).map_err(|_| FeeError::Parse {
                    offset,
                    message: format!("invalid number '{literal}'"),
                })?;
                (Token::Number(number), end - i)
            }
            '\'' | '"' => {
                let mut end = i + 1;
                while end < chars.len() && chars[end].1 != c {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(FeeError::Parse {
                        offset,
                        message: "unterminated string".to_string(),
                    });
                }
                let text: String = chars[i + 1..end].iter().map(|(_, c)| c).collect();
                (Token::Text(text), end + 1 - i)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i;
                while end < chars.len()
                    && (chars[end].1.is_ascii_alphanumeric() || chars[end].1 == '_')
                {
                    end += 1;
                }
                let ident: String = chars[i..end].iter().map(|(_, c)| c).collect();
                (Token::Ident(ident), end - i)
            }
            '&' if next == Some('&') => (Token::AndAnd, 2),
            '|' if next == Some('|') => (Token::OrOr, 2),
            '=' if next == Some('=') => (Token::EqEq, 2),
            '!' if next == Some('=') => (Token::NotEq, 2),
            '<' if next == Some('=') => (Token::Le, 2),
            '>' if next == Some('=') => (Token::Ge, 2),
            '!' => (Token::Bang, 1),
            '<' => (Token::Lt, 1),
            '>' => (Token::Gt, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '?' => (Token::Question, 1),
            ':' => (Token::Colon, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' => (Token::Star, 1),
            '/' => (Token::Slash, 1),
            other => {
                return Err(FeeError::Parse {
                    offset,
                    message: format!("unexpected character '{other}'"),
                })
            }
        };
        tokens.push((offset, token));
        i += width;
    }
    Ok(tokens)
}

const MAX_TOKENS: usize = 1024;
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(o, _)| *o)
            .unwrap_or(0)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), FeeError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(FeeError::Parse {
                offset: self.offset(),
                message: format!("expected {token:?}"),
            })
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Expr, FeeError>,
    ) -> Result<Expr, FeeError> {
        if self.depth == MAX_DEPTH {
            return Err(FeeError::Parse {
                offset: self.offset(),
                message: format!("nesting deeper than {MAX_DEPTH}"),
            });
        }
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }

    fn conditional(&mut self) -> Result<Expr, FeeError> {
        self.nested(Self::ternary)
    }

    fn ternary(&mut self) -> Result<Expr, FeeError> {
        let cond = self.or()?;
        if self.eat(&Token::Question) {
            let then = self.conditional()?;
            self.expect(Token::Colon)?;
            let otherwise = self.conditional()?;
            return Ok(Expr::Conditional(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn or(&mut self) -> Result<Expr, FeeError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, FeeError> {
        let mut lhs = self.comparison()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.comparison()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, FeeError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<Expr, FeeError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, FeeError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, FeeError> {
        if self.eat(&Token::Minus) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        if self.eat(&Token::Bang) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, FeeError> {
        let offset = self.offset();
        let token = self
            .tokens
            .get(self.pos)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| FeeError::Parse {
                offset,
                message: "unexpected end of expression".to_string(),
            })?;
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Text(s) => Ok(Expr::Literal(Value::Text(s))),
            Token::Ident(name) if name == "true" => Ok(Expr::Literal(Value::Bool(true))),
            Token::Ident(name) if name == "false" => Ok(Expr::Literal(Value::Bool(false))),
            Token::Ident(name) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Variable(name));
                }
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.conditional()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Ok(Expr::Call(name, args))
            }
            Token::LParen => {
                let inner = self.conditional()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(FeeError::Parse {
                offset,
                message: format!("unexpected {other:?}"),
            }),
        }
    }
}

fn eval(expr: &Expr, env: &Environment) -> Result<Value, FeeError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => env
            .variables
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| FeeError::UnknownVariable(name.clone())),
        Expr::Unary(UnaryOp::Neg, inner) => Ok(Value::Number(-eval(inner, env)?.as_number()?)),
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!eval(inner, env)?.as_bool()?)),
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            if !eval(lhs, env)?.as_bool()? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(rhs, env)?.as_bool()?))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            if eval(lhs, env)?.as_bool()? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(rhs, env)?.as_bool()?))
        }
        Expr::Binary(op, lhs, rhs) => binary(*op, eval(lhs, env)?, eval(rhs, env)?),
        Expr::Conditional(cond, then, otherwise) => {
            if eval(cond, env)?.as_bool()? {
                eval(then, env)
            } else {
                eval(otherwise, env)
            }
        }
        Expr::Call(name, args) => call(name, args, env),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, FeeError> {
    match op {
        BinaryOp::Eq | BinaryOp::Ne => {
            if std::mem::discriminant(&lhs) != std::mem::discriminant(&rhs) {
                return Err(FeeError::TypeMismatch(format!(
                    "cannot compare {} with {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            }
            let equal = lhs == rhs;
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        _ => {
            let (a, b) = (lhs.as_number()?, rhs.as_number()?);
            let result = match op {
                BinaryOp::Add => Value::Number(a.checked_add(b).ok_or(FeeError::Overflow)?),
                BinaryOp::Sub => Value::Number(a.checked_sub(b).ok_or(FeeError::Overflow)?),
                BinaryOp::Mul => Value::Number(a.checked_mul(b).ok_or(FeeError::Overflow)?),
                BinaryOp::Div => {
                    if b.is_zero() {
                        return Err(FeeError::DivisionByZero);
                    }
                    Value::Number(a.checked_div(b).ok_or(FeeError::Overflow)?)
                }
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::Le => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::Ge => Value::Bool(a >= b),
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => {
                    return Err(FeeError::TypeMismatch(format!("{op:?} on numbers")))
                }
            };
            Ok(result)
        }
    }
}

fn call(name: &str, args: &[Expr], env: &Environment) -> Result<Value, FeeError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(FeeError::WrongArity {
                name: name.to_string(),
                expected,
            })
        }
    };
    let number = |idx: usize| -> Result<Decimal, FeeError> { eval(&args[idx], env)?.as_number() };
    match name {
        "now" => {
            arity(0)?;
            Ok(Value::from(env.now))
        }
        "min" | "max" => {
            arity(2)?;
            let (a, b) = (number(0)?, number(1)?);
            Ok(Value::Number(if name == "min" { a.min(b) } else { a.max(b) }))
        }
        "ceil" => {
            arity(1)?;
            Ok(Value::Number(number(0)?.ceil()))
        }
        "floor" => {
            arity(1)?;
            Ok(Value::Number(number(0)?.floor()))
        }
        "double" => {
            arity(1)?;
            Ok(Value::Number(number(0)?))
        }
        "int" => {
            arity(1)?;
            let truncated = number(0)?.round_dp_with_strategy(0, RoundingStrategy::ToZero);
            truncated.to_i64().ok_or(FeeError::Overflow)?;
            Ok(Value::Number(truncated))
        }
        other => Err(FeeError::UnknownFunction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn env() -> Environment {
        Environment::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .bind("amount", 10_000_u64)
            .bind("inputType", "recoverable")
    }

    fn run(source: &str) -> Result<Value, FeeError> {
        source.parse::<Expression>()?.evaluate(&env())
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(run("1 + 2 * 3").unwrap(), Value::Number(dec!(7)));
        assert_eq!(run("(1 + 2) * 3").unwrap(), Value::Number(dec!(9)));
        assert_eq!(run("amount * 0.001").unwrap(), Value::Number(dec!(10)));
        assert_eq!(run("-amount / 4").unwrap(), Value::Number(dec!(-2500)));
    }

    #[test]
    fn conditionals_and_strings() {
        assert_eq!(
            run("inputType == 'recoverable' ? 0.0 : 200.0").unwrap(),
            Value::Number(dec!(0))
        );
        assert_eq!(
            run("amount > 5000 && !(inputType != \"recoverable\")").unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn builtins() {
        assert_eq!(run("now()").unwrap(), Value::from(1_700_000_000_i64));
        assert_eq!(run("min(amount, 3)").unwrap(), Value::Number(dec!(3)));
        assert_eq!(run("ceil(1.2) + floor(1.8)").unwrap(), Value::Number(dec!(3)));
        assert_eq!(run("int(double(7) / 2)").unwrap(), Value::Number(dec!(3)));
    }

    #[test]
    fn reports_errors() {
        assert_eq!(
            run("weight * 2").unwrap_err(),
            FeeError::UnknownVariable("weight".to_string())
        );
        assert_eq!(run("amount / 0").unwrap_err(), FeeError::DivisionByZero);
        assert!(matches!(run("1 +").unwrap_err(), FeeError::Parse { .. }));
        assert!(matches!(
            run("amount == 'x'").unwrap_err(),
            FeeError::TypeMismatch(_)
        ));
        assert!(matches!(
            run("max(1)").unwrap_err(),
            FeeError::WrongArity { .. }
        ));
    }

    #[test]
    fn rejects_runaway_nesting() {
        let parens = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(
            parens.parse::<Expression>().unwrap_err(),
            FeeError::Parse { .. }
        ));
        let negations = format!("{}1", "-".repeat(500));
        assert!(matches!(
            negations.parse::<Expression>().unwrap_err(),
            FeeError::Parse { .. }
        ));
        let long = format!("{}1", "1 + ".repeat(600));
        assert!(matches!(
            long.parse::<Expression>().unwrap_err(),
            FeeError::Parse { .. }
        ));
        let nested = format!("{}amount{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(run(&nested).unwrap(), Value::Number(dec!(10000)));
    }
}
