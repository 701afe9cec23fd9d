//! Recursive-descent parser.
//!
//! Precedence, lowest first:
//!
//! | level        | forms                                              |
//! |--------------|----------------------------------------------------|
//! | conditional  | `c ? a : b`, `a if c else b` (right associative)   |
//! | or           | `a or b`, `a \|\| b`                               |
//! | and          | `a and b`, `a && b`                                |
//! | not          | `not a`, `!a`                                      |
//! | comparison   | `== != < <= > >=` (chainable)                      |
//! | additive     | `+ -`                                              |
//! | term         | `* / %`                                            |
//! | unary        | `-a`, `+a`                                         |
//! | power        | `a ** b` (right associative, binds tighter than a  |
//! |              | unary minus on its left)                           |
//! | postfix      | `f(args)`, `a[i]`                                  |
//!
//! The condition of `c ? a : b` is an `or`-level expression; a conditional
//! used as a condition must be parenthesized. The branches are full
//! conditionals, so `c1 ? c2 ? x : y : z` nests the inner ternary in the
//! then-branch and `c1 ? x : c2 ? y : z` nests it in the else-branch.

use crate::error::ParseError;

use super::ast::{BinaryOp, CompareOp, Expr, LogicalOp, UnaryOp};
use super::lexer::{Spanned, Token, tokenize};
use crate::value::Value;

/// Recursive descents allowed at once: bracketed groups, list items, call
/// arguments, ternary branches and prefix operators each take one level.
/// Every level costs a dozen parser frames, so 64 stays well inside a 2 MiB
/// thread stack.
const MAX_NESTING: usize = 64;

/// Height of the tree being built. Operator chains such as `1 + 2 + ... + n`
/// grow the tree without recursing in the parser, but evaluating, printing
/// and dropping the tree all recurse once per level.
const MAX_HEIGHT: usize = 400;

/// Parse formula text in either the surface or the canonical syntax.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
        height: 0,
        end: source.len(),
    };
    if parser.tokens.is_empty() {
        return Err(ParseError::new("empty expression", 0));
    }
    let expr = parser.parse_expression()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(ParseError::new(
            format!("unexpected {} after end of expression", extra.token.describe()),
            extra.offset,
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    nesting: usize,
    height: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.eat(&expected) {
            return Ok(());
        }
        let found = self
            .peek()
            .map_or_else(|| "end of expression".to_string(), Token::describe);
        Err(ParseError::new(
            format!("expected {}, found {}", expected.describe(), found),
            self.offset(),
        ))
    }

    /// Run `parse` one nesting level down.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.nesting >= MAX_NESTING {
            return Err(ParseError::new(
                format!(
                    "expression is nested too deeply (more than {} levels of brackets or prefix operators)",
                    MAX_NESTING
                ),
                self.offset(),
            ));
        }
        self.grow()?;
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        self.height -= 1;
        result
    }

    /// Account for one more level of tree height. Chain loops restore
    /// `height` themselves once the chain ends.
    fn grow(&mut self) -> Result<(), ParseError> {
        if self.height >= MAX_HEIGHT {
            return Err(ParseError::new(
                format!(
                    "expression is too long (more than {} chained operators)",
                    MAX_HEIGHT
                ),
                self.offset(),
            ));
        }
        self.height += 1;
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let head = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then_branch = self.parse_expression()?;
            self.expect(Token::Colon)?;
            let else_branch = self.parse_expression()?;
            return Ok(Expr::Conditional {
                condition: Box::new(head),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }
        if self.eat(&Token::If) {
            let condition = self.parse_or()?;
            self.expect(Token::Else)?;
            let else_branch = self.parse_expression()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(head),
                else_branch: Box::new(else_branch),
            });
        }
        Ok(head)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.height;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.grow()?;
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.height = start;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.height;
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            self.grow()?;
            let right = self.parse_not()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.height = start;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();
        while let Some(op) = self.peek().and_then(compare_op) {
            self.pos += 1;
            rest.push((op, self.parse_additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let start = self.height;
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.height = start;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.grow()?;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let start = self.height;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => {
                    self.height = start;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.grow()?;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::StarStar) {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.height;
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.grow()?;
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    let Expr::Name(function) = expr else {
                        return Err(ParseError::new(
                            "only named functions can be called",
                            self.offset(),
                        ));
                    };
                    self.pos += 1;
                    let args = self.parse_list(Token::RParen)?;
                    expr = Expr::Call { function, args };
                }
                _ => {
                    self.height = start;
                    return Ok(expr);
                }
            }
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn parse_list(&mut self, close: Token) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.eat(&close) {
            items.push(self.parse_expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        let Some(token) = self.advance() else {
            return Err(ParseError::new("unexpected end of expression", offset));
        };
        let expr = match token {
            Token::Int(i) => Expr::Literal(Value::Int(i)),
            Token::Float(f) => Expr::Literal(Value::Float(f)),
            Token::Str(s) => Expr::Literal(Value::Str(s)),
            Token::Bool(b) => Expr::Literal(Value::Bool(b)),
            Token::None => Expr::Literal(Value::Null),
            Token::Ident(name) => Expr::Name(name),
            Token::LParen => {
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                inner
            }
            Token::LBracket => Expr::List(self.parse_list(Token::RBracket)?),
            other => {
                return Err(ParseError::new(
                    format!("unexpected {}", other.describe()),
                    offset,
                ));
            }
        };
        Ok(expr)
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn compare_op(token: &Token) -> Option<CompareOp> {
    match token {
        Token::EqEq => Some(CompareOp::Eq),
        Token::NotEq => Some(CompareOp::Ne),
        Token::Lt => Some(CompareOp::Lt),
        Token::Le => Some(CompareOp::Le),
        Token::Gt => Some(CompareOp::Gt),
        Token::Ge => Some(CompareOp::Ge),
        _ => None,
    }
}
