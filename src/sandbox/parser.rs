//! Recursive-descent parser for the cleaning language.
//!
//! ```text
//! program   = sep* (statement (sep+ statement)*)? sep* EOF
//! statement = IDENT '=' expr | expr
//! expr      = primary ('.' IDENT '(' args? ')')*
//! primary   = IDENT | STRING | NUMBER | 'true' | 'false' | 'null'
//!           | '[' args? ']' | '(' expr ')'
//! args      = expr (',' expr)* ','?
//! ```

use crate::error::ScriptError;

use super::lexer::{tokenize, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Name(String),
    Literal(Literal),
    List(Vec<Expr>),
    Call {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StatementKind {
    Assign { name: String, value: Expr },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

/// Parses `source`, rejecting expressions nested more than `max_depth` deep.
///
/// Parentheses, list brackets, call arguments and each link of a method
/// chain count as one level. The bound keeps both this parser and the
/// evaluator's recursion off the end of the stack.
pub(crate) fn parse(source: &str, max_depth: usize) -> Result<Vec<Statement>, ScriptError> {
    let tokens = tokenize(source)?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    }
    .program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ScriptError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected {}", kind.describe())))
        }
    }

    fn unexpected(&self, context: &str) -> ScriptError {
        let token = self.peek();
        ScriptError::Syntax {
            line: token.line,
            column: token.column,
            message: format!("{}, found {}", context, token.kind.describe()),
        }
    }

    /// Goes one level deeper, or fails past `max_depth`.
    fn enter(&mut self) -> Result<(), ScriptError> {
        if self.depth >= self.max_depth {
            let token = self.peek();
            return Err(ScriptError::Syntax {
                line: token.line,
                column: token.column,
                message: format!("nesting too deep (limit {})", self.max_depth),
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn skip_separators(&mut self) {
        while self.check(&TokenKind::Separator) {
            self.advance();
        }
    }

    fn program(mut self) -> Result<Vec<Statement>, ScriptError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.check(&TokenKind::Eof) {
            statements.push(self.statement()?);
            if !self.check(&TokenKind::Eof) {
                self.expect(TokenKind::Separator)?;
            }
            self.skip_separators();
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, ScriptError> {
        let (line, column) = (self.peek().line, self.peek().column);
        let is_assignment = matches!(self.peek().kind, TokenKind::Ident(_))
            && self.peek_kind_at(1) == Some(&TokenKind::Assign);

        let kind = if is_assignment {
            let name = match self.advance().kind {
                TokenKind::Ident(name) => name,
                _ => return Err(self.unexpected("expected a name")),
            };
            if is_keyword(&name) {
                return Err(ScriptError::Syntax {
                    line,
                    column,
                    message: format!("cannot assign to '{}'", name),
                });
            }
            self.advance();
            StatementKind::Assign {
                name,
                value: self.expr()?,
            }
        } else {
            StatementKind::Expr(self.expr()?)
        };
        Ok(Statement { line, kind })
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.enter()?;
        let mut levels = 1;
        let mut expr = self.primary()?;
        while self.check(&TokenKind::Dot) {
            // each call wraps the chain so far as its receiver
            self.enter()?;
            levels += 1;
            self.advance();
            let method = match &self.peek().kind {
                TokenKind::Ident(name) => name.clone(),
                _ => return Err(self.unexpected("expected a method name after '.'")),
            };
            self.advance();
            self.expect(TokenKind::LParen)?;
            let args = self.args(&TokenKind::RParen)?;
            expr = Expr::Call {
                receiver: Box::new(expr),
                method,
                args,
            };
        }
        self.depth -= levels;
        Ok(expr)
    }

    fn args(&mut self, close: &TokenKind) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        while !self.check(close) {
            args.push(self.expr()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(close.clone())?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        if self.check(&TokenKind::LBracket) {
            self.advance();
            return Ok(Expr::List(self.args(&TokenKind::RBracket)?));
        }
        if self.check(&TokenKind::LParen) {
            self.advance();
            let inner = self.expr()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }

        let expr = match &self.peek().kind {
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                _ => Expr::Name(name.clone()),
            },
            TokenKind::Str(value) => Expr::Literal(Literal::Str(value.clone())),
            TokenKind::Int(value) => Expr::Literal(Literal::Int(*value)),
            TokenKind::Float(value) => Expr::Literal(Literal::Float(*value)),
            _ => return Err(self.unexpected("expected an expression")),
        };
        self.advance();
        Ok(expr)
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "true" | "false" | "null")
}
