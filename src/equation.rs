//! Restricted evaluator for the per-plant unavailability-loss equation.
//!
//! The equation is operator-limited on purpose: `+ - * / ^`, parentheses,
//! numeric literals, and the two bound variables `CSI` and `angle`. Any
//! other token is rejected at parse time, so a configuration file can
//! never smuggle arbitrary computation into the batch.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EquationError {
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unknown identifier '{0}' (only 'CSI' and 'angle' are bound)")]
    UnknownIdentifier(String),
    #[error("invalid number literal '{0}'")]
    BadNumber(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token at offset {0}")]
    UnexpectedToken(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Var {
    Csi,
    Angle,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(Var),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, EquationError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, i));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, i));
                i += 1;
            }
            '/' => {
                tokens.push((Token::Slash, i));
                i += 1;
            }
            '^' => {
                tokens.push((Token::Caret, i));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| EquationError::BadNumber(text.clone()))?;
                tokens.push((Token::Number(value), start));
            }
            _ if c.is_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_alphanumeric() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push((Token::Ident(text), start));
            }
            _ => return Err(EquationError::UnexpectedChar(c, i)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|&(_, offset)| offset)
            .unwrap_or(usize::MAX)
    }

    fn expr(&mut self) -> Result<Expr, EquationError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.term()?));
                }
                Some(Token::Minus) => {
                    self.advance();
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.term()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, EquationError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    lhs = Expr::Mul(Box::new(lhs), Box::new(self.unary()?));
                }
                Some(Token::Slash) => {
                    self.advance();
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.unary()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, EquationError> {
        if let Some(Token::Minus) = self.peek() {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.power()
    }

    // '^' binds tightest and is right-associative: 2^3^2 == 2^(3^2).
    fn power(&mut self) -> Result<Expr, EquationError> {
        let base = self.atom()?;
        if let Some(Token::Caret) = self.peek() {
            self.advance();
            let exponent = self.unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, EquationError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => match name.as_str() {
                "CSI" => Ok(Expr::Variable(Var::Csi)),
                "angle" => Ok(Expr::Variable(Var::Angle)),
                _ => Err(EquationError::UnknownIdentifier(name)),
            },
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(_) => Err(EquationError::UnexpectedToken(offset)),
                    None => Err(EquationError::UnexpectedEnd),
                }
            }
            Some(_) => Err(EquationError::UnexpectedToken(offset)),
            None => Err(EquationError::UnexpectedEnd),
        }
    }
}

fn eval(expr: &Expr, csi: f64, angle: f64) -> f64 {
    match expr {
        Expr::Number(value) => *value,
        Expr::Variable(Var::Csi) => csi,
        Expr::Variable(Var::Angle) => angle,
        Expr::Neg(inner) => -eval(inner, csi, angle),
        Expr::Add(a, b) => eval(a, csi, angle) + eval(b, csi, angle),
        Expr::Sub(a, b) => eval(a, csi, angle) - eval(b, csi, angle),
        Expr::Mul(a, b) => eval(a, csi, angle) * eval(b, csi, angle),
        Expr::Div(a, b) => eval(a, csi, angle) / eval(b, csi, angle),
        Expr::Pow(a, b) => eval(a, csi, angle).powf(eval(b, csi, angle)),
    }
}

/// A parsed, validated unavailability-loss equation.
#[derive(Debug, Clone)]
pub struct Equation {
    root: Expr,
}

impl Equation {
    pub fn parse(src: &str) -> Result<Self, EquationError> {
        let tokens = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(EquationError::UnexpectedToken(parser.offset()));
        }
        Ok(Self { root })
    }

    pub fn evaluate(&self, csi: f64, angle: f64) -> f64 {
        eval(&self.root, csi, angle)
    }
}
