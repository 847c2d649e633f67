//! Arithmetic expressions over source dimension values
//!
//! Grammar (nothing else is accepted):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := primary ('^' unary)?
//! primary := number | '$' position | '$' name | '(' expr ')'
//! ```
//!
//! `^` is right-associative and binds tighter than unary minus, so
//! `-2^2` is `-4`.

use pgpc_core::error::{PgpcError, Result};
use std::fmt;

/// Deepest nesting of parentheses, prefix signs and powers accepted
pub const MAX_DEPTH: usize = 256;

/// Longest token stream accepted; bounds the depth of flat operator chains
pub const MAX_TOKENS: usize = 1024;

/// Reference to a source dimension inside an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// `$3`, 1-based
    Position(usize),
    /// `$Intensity`
    Name(String),
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Position(position) => write!(f, "${}", position),
            Placeholder::Name(name) => write!(f, "${}", name),
        }
    }
}

/// Supplies values for placeholders at evaluation time
pub trait Bindings {
    fn resolve(&self, placeholder: &Placeholder) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Placeholder(Placeholder),
    Op(Op),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Placeholder(Placeholder),
    Neg(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
}

/// A parsed expression, ready to evaluate against any bindings
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { source, tokens: &tokens, pos: 0, depth: 0 };
        let root = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("unexpected token {:?}", token)));
        }
        Ok(Self { source: source.to_string(), root })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every placeholder the expression references, in order of appearance
    pub fn placeholders(&self) -> Vec<&Placeholder> {
        fn walk<'n>(node: &'n Node, out: &mut Vec<&'n Placeholder>) {
            match node {
                Node::Number(_) => {}
                Node::Placeholder(p) => out.push(p),
                Node::Neg(inner) => walk(inner, out),
                Node::Binary(_, lhs, rhs) => {
                    walk(lhs, out);
                    walk(rhs, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    pub fn evaluate(&self, bindings: &dyn Bindings) -> Result<f64> {
        let value = self.eval_node(&self.root, bindings)?;
        if !value.is_finite() {
            return Err(self.error("result is not a finite number"));
        }
        Ok(value)
    }

    fn eval_node(&self, node: &Node, bindings: &dyn Bindings) -> Result<f64> {
        match node {
            Node::Number(value) => Ok(*value),
            Node::Placeholder(p) => bindings
                .resolve(p)
                .ok_or_else(|| self.error(format!("unknown placeholder {}", p))),
            Node::Neg(inner) => Ok(-self.eval_node(inner, bindings)?),
            Node::Binary(op, lhs, rhs) => {
                let lhs = self.eval_node(lhs, bindings)?;
                let rhs = self.eval_node(rhs, bindings)?;
                match op {
                    Op::Add => Ok(lhs + rhs),
                    Op::Sub => Ok(lhs - rhs),
                    Op::Mul => Ok(lhs * rhs),
                    Op::Div if rhs == 0.0 => Err(self.error("division by zero")),
                    Op::Div => Ok(lhs / rhs),
                    Op::Pow => Ok(lhs.powf(rhs)),
                }
            }
        }
    }

    fn error(&self, reason: impl Into<String>) -> PgpcError {
        PgpcError::InvalidExpression { expression: self.source.clone(), reason: reason.into() }
    }
}

/// Parse and evaluate in one step
pub fn evaluate(source: &str, bindings: &dyn Bindings) -> Result<f64> {
    Expression::parse(source)?.evaluate(bindings)
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let error = |reason: String| PgpcError::InvalidExpression {
        expression: source.to_string(),
        reason,
    };

    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' | '^' => {
                let op = match c {
                    '+' => Op::Add,
                    '-' => Op::Sub,
                    '*' => Op::Mul,
                    '/' => Op::Div,
                    _ => Op::Pow,
                };
                tokens.push(Token::Op(op));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                let ident: String = chars[start..end].iter().collect();
                if ident.is_empty() {
                    return Err(error(format!("empty placeholder at offset {}", i)));
                }

                let placeholder = if ident.chars().all(|c| c.is_ascii_digit()) {
                    match ident.parse::<usize>() {
                        Ok(position) if position >= 1 => Placeholder::Position(position),
                        _ => return Err(error(format!("invalid position placeholder ${}", ident))),
                    }
                } else {
                    Placeholder::Name(ident)
                };
                tokens.push(Token::Placeholder(placeholder));
                i = end;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }

                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| error(format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Number(value));
            }
            other => {
                return Err(error(format!("unexpected character '{}' at offset {}", other, i)));
            }
        }
    }

    if tokens.len() > MAX_TOKENS {
        return Err(error(format!("{} tokens, at most {} allowed", tokens.len(), MAX_TOKENS)));
    }
    Ok(tokens)
}

struct Parser<'t> {
    source: &'t str,
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, reason: impl Into<String>) -> PgpcError {
        PgpcError::InvalidExpression { expression: self.source.to_string(), reason: reason.into() }
    }

    fn expr(&mut self) -> Result<Node> {
        let mut node = self.term()?;
        while let Some(Token::Op(op @ (Op::Add | Op::Sub))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            node = Node::Binary(*op, Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn term(&mut self) -> Result<Node> {
        let mut node = self.unary()?;
        while let Some(Token::Op(op @ (Op::Mul | Op::Div))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            node = Node::Binary(*op, Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    /// Every nesting path (parentheses, prefix signs, exponents) passes here
    fn unary(&mut self) -> Result<Node> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nested deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let node = self.prefixed();
        self.depth -= 1;
        node
    }

    fn prefixed(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::Op(Op::Sub)) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op(Op::Add)) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.primary()?;
        if let Some(Token::Op(Op::Pow)) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary(Op::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Node::Number(*value)),
            Some(Token::Placeholder(p)) => Ok(Node::Placeholder(p.clone())),
            Some(Token::LParen) => {
                let node = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(node),
                    _ => Err(self.error("missing closing parenthesis")),
                }
            }
            Some(token) => Err(self.error(format!("unexpected token {:?}", token))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}
