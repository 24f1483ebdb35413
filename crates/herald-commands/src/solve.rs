//! Arithmetic evaluator behind the `solve` command
//!
//! Hand-rolled tokenizer plus precedence-climbing parser. Supported:
//! `+ - * / ^`, parentheses and unary minus; `^` binds tightest and is
//! right-associative. All failures are user-visible domain errors.

use crate::dispatcher::{Command, CommandContext};
use async_trait::async_trait;
use herald_core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Caret);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = literal
                    .parse()
                    .map_err(|_| Error::Domain(format!("bad number: {literal}")))?;
                tokens.push(Token::Number(value));
            }
            other => {
                return Err(Error::Domain(format!("unexpected character: {other}")));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Binding power and associativity for binary operators
    fn precedence(token: Token) -> Option<(u8, bool)> {
        match token {
            Token::Plus | Token::Minus => Some((1, false)),
            Token::Star | Token::Slash => Some((2, false)),
            Token::Caret => Some((3, true)),
            _ => None,
        }
    }

    fn parse_atom(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Minus) => Ok(-self.parse_atom()?),
            Some(Token::LParen) => {
                let inner = self.parse_expr(0)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::Domain("missing closing parenthesis".to_string())),
                }
            }
            _ => Err(Error::Domain("malformed expression".to_string())),
        }
    }

    fn parse_expr(&mut self, min_prec: u8) -> Result<f64> {
        let mut lhs = self.parse_atom()?;

        while let Some(op) = self.peek() {
            let Some((prec, right_assoc)) = Self::precedence(op) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.next();

            let next_min = if right_assoc { prec } else { prec + 1 };
            let rhs = self.parse_expr(next_min)?;

            lhs = match op {
                Token::Plus => lhs + rhs,
                Token::Minus => lhs - rhs,
                Token::Star => lhs * rhs,
                Token::Slash => {
                    if rhs == 0.0 {
                        return Err(Error::Domain("division by zero".to_string()));
                    }
                    lhs / rhs
                }
                Token::Caret => lhs.powf(rhs),
                _ => unreachable!("precedence() only admits binary operators"),
            };
        }
        Ok(lhs)
    }
}

pub fn evaluate(expr: &str) -> Result<f64> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(Error::Domain("empty expression".to_string()));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let value = parser.parse_expr(0)?;
    if parser.pos != tokens.len() {
        return Err(Error::Domain("trailing garbage in expression".to_string()));
    }
    Ok(value)
}

/// `solve <expression>`
pub struct Solve;

#[async_trait]
impl Command for Solve {
    fn name(&self) -> &str {
        "solve"
    }

    fn usage(&self) -> &str {
        "solve <expression>"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression (+ - * / ^ and parentheses)"
    }

    async fn run(&self, _ctx: &CommandContext, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(Error::Usage("nothing to solve".to_string()));
        }
        let value = evaluate(&args.join(" "))?;
        Ok(format!("{value}"))
    }
}
