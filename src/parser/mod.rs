//! Precedence-climbing expression parser.
//!
//! The parser is a pure function of the token stream and the operator table:
//! it performs no evaluation and has no side effects. Filter (`|`) and range
//! (`..`) operators flow through the same climb loop as everything else;
//! only their precedence values determine grouping.

use crate::ast::{Arguments, ExprKind, Expression};
use crate::error::ParseError;
use crate::extension::ExtensionRegistry;
use crate::lexer::{self, Token, TokenKind, TokenStream};
use crate::operator::{Associativity, BinaryOpKind, BinaryOperator, UnaryOperator};
use crate::value::Value;

/// Tokenize and parse one expression segment.
pub fn parse_source(
    text: &str,
    registry: &ExtensionRegistry,
    template: &str,
    start_line: u32,
) -> Result<Expression, ParseError> {
    let symbols = registry.operator_symbols();
    let tokens = lexer::tokenize(text, template, start_line, &symbols)?;
    ExpressionParser::new(TokenStream::new(tokens, start_line), registry, template).parse()
}

pub struct ExpressionParser<'a> {
    stream: TokenStream,
    registry: &'a ExtensionRegistry,
    template: &'a str,
}

impl<'a> ExpressionParser<'a> {
    pub fn new(stream: TokenStream, registry: &'a ExtensionRegistry, template: &'a str) -> Self {
        Self {
            stream,
            registry,
            template,
        }
    }

    /// Parse one complete expression; the stream must be exhausted after it.
    pub fn parse(mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_expression(0)?;
        if let Some(token) = self.stream.peek() {
            return Err(self.error(
                format!("unexpected {}", token.kind.describe()),
                token.line,
            ));
        }
        Ok(expr)
    }

    /// The climb loop: fold binary operators of at least `min_precedence`
    /// onto the accumulated left side. LEFT associativity raises the
    /// right-hand threshold by one so equal-precedence chains group
    /// left-to-right.
    fn parse_expression(&mut self, min_precedence: u32) -> Result<Expression, ParseError> {
        let mut left = self.parse_operand()?;
        loop {
            let Some((op, width)) = self.peek_binary_operator() else {
                break;
            };
            if op.precedence < min_precedence {
                break;
            }
            let line = self.stream.line();
            for _ in 0..width {
                self.stream.advance();
            }
            left = match op.kind {
                BinaryOpKind::Filter => {
                    let (name, args) = self.parse_name_and_args()?;
                    Expression::new(
                        ExprKind::Filter {
                            target: Box::new(left),
                            name,
                            args,
                        },
                        line,
                    )
                }
                BinaryOpKind::Is | BinaryOpKind::IsNot => {
                    let test_line = self.stream.line();
                    let (name, args) = self.parse_name_and_args()?;
                    let right = Expression::new(ExprKind::TestInvocation { name, args }, test_line);
                    Expression::new(
                        ExprKind::Binary {
                            op: op.kind,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        line,
                    )
                }
                _ => {
                    let next_min = match op.associativity {
                        Associativity::Left => op.precedence + 1,
                        Associativity::Right => op.precedence,
                    };
                    let right = self.parse_expression(next_min)?;
                    Expression::new(
                        ExprKind::Binary {
                            op: op.kind,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        line,
                    )
                }
            };
        }
        Ok(left)
    }

    /// A primary term, with a registered unary operator binding its operand
    /// at the operator's own precedence.
    fn parse_operand(&mut self) -> Result<Expression, ParseError> {
        if let Some(op) = self.peek_unary_operator() {
            let line = self.stream.line();
            self.stream.advance();
            let operand = self.parse_expression(op.precedence)?;
            return Ok(Expression::new(
                ExprKind::Unary {
                    op: op.kind,
                    operand: Box::new(operand),
                },
                line,
            ));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let eof_line = self.stream.line();
        let Some(token) = self.stream.advance() else {
            return Err(self.error("unexpected end of expression", eof_line));
        };
        let line = token.line;
        let expr = match token.kind {
            TokenKind::Int(i) => Expression::new(ExprKind::Literal(Value::Int(i)), line),
            TokenKind::Float(x) => Expression::new(ExprKind::Literal(Value::Float(x)), line),
            TokenKind::Str(s) => Expression::new(ExprKind::Literal(Value::String(s)), line),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Expression::new(ExprKind::Literal(Value::Bool(true)), line),
                "false" => Expression::new(ExprKind::Literal(Value::Bool(false)), line),
                "null" | "none" => Expression::new(ExprKind::Literal(Value::Null), line),
                _ => {
                    if matches!(
                        self.stream.peek(),
                        Some(Token {
                            kind: TokenKind::LeftParen,
                            ..
                        })
                    ) {
                        self.stream.advance();
                        let args = self.parse_arguments()?;
                        Expression::new(ExprKind::FunctionCall { name, args }, line)
                    } else {
                        Expression::new(ExprKind::Variable(name), line)
                    }
                }
            },
            TokenKind::LeftParen => {
                let inner = self.parse_expression(0)?;
                match self.stream.advance() {
                    Some(Token {
                        kind: TokenKind::RightParen,
                        ..
                    }) => inner,
                    Some(token) => {
                        return Err(self.error(
                            format!("expected ')', found {}", token.kind.describe()),
                            token.line,
                        ));
                    }
                    None => return Err(self.error("unmatched '('", line)),
                }
            }
            other => {
                return Err(self.error(format!("unexpected {}", other.describe()), line));
            }
        };
        self.parse_postfix(expr)
    }

    fn parse_postfix(&mut self, mut expr: Expression) -> Result<Expression, ParseError> {
        while matches!(
            self.stream.peek(),
            Some(Token {
                kind: TokenKind::Dot,
                ..
            })
        ) {
            let line = self.stream.line();
            self.stream.advance();
            let name = self.expect_ident("attribute name")?;
            expr = Expression::new(
                ExprKind::GetAttribute {
                    target: Box::new(expr),
                    name,
                },
                line,
            );
        }
        Ok(expr)
    }

    /// Filter and test right-hand sides: a bare name with an optional
    /// argument list.
    fn parse_name_and_args(&mut self) -> Result<(String, Arguments), ParseError> {
        let name = self.expect_ident("name")?;
        let args = if matches!(
            self.stream.peek(),
            Some(Token {
                kind: TokenKind::LeftParen,
                ..
            })
        ) {
            self.stream.advance();
            self.parse_arguments()?
        } else {
            Arguments::default()
        };
        Ok((name, args))
    }

    /// Argument list body; the opening parenthesis was already consumed.
    fn parse_arguments(&mut self) -> Result<Arguments, ParseError> {
        let mut args = Arguments::default();
        if matches!(
            self.stream.peek(),
            Some(Token {
                kind: TokenKind::RightParen,
                ..
            })
        ) {
            self.stream.advance();
            return Ok(args);
        }
        loop {
            let named = matches!(
                self.stream.peek(),
                Some(Token {
                    kind: TokenKind::Ident(_),
                    ..
                })
            ) && matches!(
                self.stream.peek_at(1),
                Some(Token {
                    kind: TokenKind::Assign,
                    ..
                })
            );
            if named {
                let name = self.expect_ident("argument name")?;
                self.stream.advance();
                let value = self.parse_expression(0)?;
                args.named.push((name, value));
            } else {
                args.positional.push(self.parse_expression(0)?);
            }
            match self.stream.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => {}
                Some(Token {
                    kind: TokenKind::RightParen,
                    ..
                }) => break,
                Some(token) => {
                    return Err(self.error(
                        format!("expected ',' or ')', found {}", token.kind.describe()),
                        token.line,
                    ));
                }
                None => {
                    return Err(self.error("unmatched '(' in argument list", self.stream.line()));
                }
            }
        }
        Ok(args)
    }

    fn peek_unary_operator(&self) -> Option<UnaryOperator> {
        let token = self.stream.peek()?;
        let symbol = match &token.kind {
            TokenKind::Op(s) => s.as_str(),
            TokenKind::Ident(w) => w.as_str(),
            _ => return None,
        };
        self.registry.unary_operator(symbol).cloned()
    }

    /// Longest-match lookup of the next binary operator. Word pairs
    /// (`is not`) are preferred over single words (`is`).
    fn peek_binary_operator(&self) -> Option<(BinaryOperator, usize)> {
        let token = self.stream.peek()?;
        match &token.kind {
            TokenKind::Op(s) => self.registry.binary_operator(s).cloned().map(|op| (op, 1)),
            TokenKind::Ident(w) => {
                if let Some(Token {
                    kind: TokenKind::Ident(next),
                    ..
                }) = self.stream.peek_at(1)
                {
                    let pair = format!("{w} {next}");
                    if let Some(op) = self.registry.binary_operator(&pair) {
                        return Some((op.clone(), 2));
                    }
                }
                self.registry.binary_operator(w).cloned().map(|op| (op, 1))
            }
            _ => None,
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        let eof_line = self.stream.line();
        match self.stream.advance() {
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Ok(name),
            Some(token) => Err(self.error(
                format!("expected {what}, found {}", token.kind.describe()),
                token.line,
            )),
            None => Err(self.error(
                format!("expected {what}, found end of expression"),
                eof_line,
            )),
        }
    }

    fn error(&self, message: impl Into<String>, line: u32) -> ParseError {
        ParseError::new(message, self.template, line)
    }
}
