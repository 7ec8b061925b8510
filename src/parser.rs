//! A recursive-descent parser with one token of lookahead.
//!
//! The parser walks a cursor over the scanned tokens and never backtracks.
//! Binary operators are parsed one precedence level per function, lowest
//! first:
//!
//! ```text
//! ||  ->  &&  ->  === !== == !=  ->  > >= < <=  ->  + -  ->  * /  ->  primary
//! ```
//!
//! Every level folds its operands left to right, so `10 - 3 - 2` becomes
//! `(10 - 3) - 2`.

use std::ops::Range;

use serde::Serialize;
use tracing::trace;

use crate::ast::{
    AdditiveOp, ComparisonOp, Expression, File, Function, If, LogicalOp, MultiplicativeOp,
    Statement,
};
use crate::scanner::{Token, TokenKind};

const STATEMENT_START: &[TokenKind] = &[
    TokenKind::Function,
    TokenKind::If,
    TokenKind::Print,
    TokenKind::VarDecl,
    TokenKind::Return,
    TokenKind::Identifier,
];

/// Combined limit on nested blocks, `if` chains, parenthesized expressions,
/// call arguments and operator chains.
pub const MAX_NESTING_DEPTH: usize = 256;

const PRIMARY_START: &[TokenKind] = &[
    TokenKind::Integer,
    TokenKind::String,
    TokenKind::True,
    TokenKind::False,
    TokenKind::Identifier,
    TokenKind::OpenParen,
];

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ParseError {
    #[error("expected {}, found {found} `{lexeme}`", expected_list(.expected))]
    UnexpectedToken {
        expected: Vec<TokenKind>,
        found: TokenKind,
        lexeme: String,
        span: Range<usize>,
    },
    #[error("expected {}, found end of input", expected_list(.expected))]
    UnexpectedEnd { expected: Vec<TokenKind> },
    #[error("program nests deeper than {limit} levels")]
    NestingTooDeep {
        limit: usize,
        span: Option<Range<usize>>,
    },
}

impl ParseError {
    pub fn expected(&self) -> &[TokenKind] {
        match self {
            ParseError::UnexpectedToken { expected, .. } => expected,
            ParseError::UnexpectedEnd { expected } => expected,
            ParseError::NestingTooDeep { .. } => &[],
        }
    }

    /// Byte range of the offending token, if there was one.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            ParseError::UnexpectedToken { span, .. } => Some(span.clone()),
            ParseError::UnexpectedEnd { .. } => None,
            ParseError::NestingTooDeep { span, .. } => span.clone(),
        }
    }
}

fn expected_list(kinds: &[TokenKind]) -> String {
    match kinds {
        [] => "nothing".to_string(),
        [only] => only.to_string(),
        [init @ .., last] => {
            let init = init
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("one of {init} or {last}")
        }
    }
}

fn equality_op(kind: TokenKind) -> Option<ComparisonOp> {
    match kind {
        TokenKind::StrictEqual => Some(ComparisonOp::StrictEqual),
        TokenKind::StrictNotEqual => Some(ComparisonOp::StrictNotEqual),
        TokenKind::Equal => Some(ComparisonOp::Equal),
        TokenKind::NotEqual => Some(ComparisonOp::NotEqual),
        _ => None,
    }
}

fn relational_op(kind: TokenKind) -> Option<ComparisonOp> {
    match kind {
        TokenKind::Greater => Some(ComparisonOp::Greater),
        TokenKind::GreaterEqual => Some(ComparisonOp::GreaterEqual),
        TokenKind::Less => Some(ComparisonOp::Less),
        TokenKind::LessEqual => Some(ComparisonOp::LessEqual),
        _ => None,
    }
}

fn additive_op(kind: TokenKind) -> Option<AdditiveOp> {
    match kind {
        TokenKind::Plus => Some(AdditiveOp::Add),
        TokenKind::Minus => Some(AdditiveOp::Subtract),
        _ => None,
    }
}

fn multiplicative_op(kind: TokenKind) -> Option<MultiplicativeOp> {
    match kind {
        TokenKind::Star => Some(MultiplicativeOp::Multiply),
        TokenKind::Slash => Some(MultiplicativeOp::Divide),
        _ => None,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // Discard all comments.
        tokens.retain(|token| token.kind != TokenKind::Comment);
        Self {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.cursor + offset).map(|token| token.kind)
    }

    /// Whether the token `offset` places ahead of the cursor has one of `kinds`.
    pub fn peek(&self, kinds: &[TokenKind], offset: usize) -> bool {
        self.kind_at(offset).is_some_and(|kind| kinds.contains(&kind))
    }

    /// Takes the current token if its kind is one of `kinds`.
    pub fn consume(&mut self, kinds: &[TokenKind]) -> Result<Token, ParseError> {
        if !self.peek(kinds, 0) {
            return Err(self.unexpected(kinds));
        }
        let token = self.tokens[self.cursor].clone();
        self.cursor += 1;
        Ok(token)
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                span: self.tokens.get(self.cursor).map(|token| token.span.clone()),
            });
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn skip_optional(&mut self, kind: TokenKind) {
        if self.peek(&[kind], 0) {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &[TokenKind]) -> ParseError {
        match self.tokens.get(self.cursor) {
            Some(token) => ParseError::UnexpectedToken {
                expected: expected.to_vec(),
                found: token.kind,
                lexeme: token.lexeme.clone(),
                span: token.span.clone(),
            },
            None => ParseError::UnexpectedEnd {
                expected: expected.to_vec(),
            },
        }
    }

    pub fn parse_file(&mut self) -> Result<File, ParseError> {
        let mut statements = vec![];
        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(File { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        trace!(cursor = self.cursor, next = ?self.kind_at(0), "Parsing statement");

        match self.kind_at(0) {
            Some(TokenKind::Function) => self.parse_function().map(Statement::Function),
            Some(TokenKind::If) => self.parse_if().map(Statement::If),
            Some(TokenKind::Print) => self.parse_print(),
            Some(TokenKind::VarDecl) => self.parse_var_decl(),
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::Identifier) => self.parse_identifier_statement(),
            _ => Err(self.unexpected(STATEMENT_START)),
        }
    }

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        self.consume(&[TokenKind::Function])?;
        let name = self.consume(&[TokenKind::Identifier])?.lexeme;
        trace!(%name, "Parsing function declaration");

        self.consume(&[TokenKind::OpenParen])?;
        let mut parameters = vec![];
        if self.peek(&[TokenKind::Identifier], 0) {
            parameters.push(self.consume(&[TokenKind::Identifier])?.lexeme);
            while self.peek(&[TokenKind::Comma], 0) {
                self.advance();
                parameters.push(self.consume(&[TokenKind::Identifier])?.lexeme);
            }
        }
        self.consume(&[TokenKind::CloseParen])?;

        let body = self.parse_block()?;
        Ok(Function {
            name,
            parameters,
            body,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.consume(&[TokenKind::OpenBrace])?;
        self.enter()?;
        let mut body = vec![];
        while !self.peek(&[TokenKind::CloseBrace], 0) {
            if self.is_at_end() {
                return Err(self.unexpected(&[TokenKind::CloseBrace]));
            }
            body.push(self.parse_statement()?);
        }
        self.consume(&[TokenKind::CloseBrace])?;
        self.leave(1);
        Ok(body)
    }

    fn parse_if(&mut self) -> Result<If, ParseError> {
        self.consume(&[TokenKind::If])?;
        self.enter()?;
        self.consume(&[TokenKind::OpenParen])?;
        let condition = self.parse_expression()?;
        self.consume(&[TokenKind::CloseParen])?;
        let then_body = self.parse_block()?;

        let else_body = if self.peek(&[TokenKind::Else], 0) {
            self.advance();
            if self.peek(&[TokenKind::If], 0) {
                trace!("Parsing else-if as a nested if");
                Some(vec![Statement::If(self.parse_if()?)])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        self.leave(1);
        Ok(If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_print(&mut self) -> Result<Statement, ParseError> {
        self.consume(&[TokenKind::Print])?;
        self.consume(&[TokenKind::OpenParen])?;
        let value = self.parse_expression()?;
        self.consume(&[TokenKind::CloseParen])?;
        self.consume(&[TokenKind::Semicolon])?;
        Ok(Statement::Print { value })
    }

    fn parse_var_decl(&mut self) -> Result<Statement, ParseError> {
        self.consume(&[TokenKind::VarDecl])?;
        let name = self.consume(&[TokenKind::Identifier])?.lexeme;
        self.consume(&[TokenKind::Assign])?;
        let value = self.parse_expression()?;
        self.consume(&[TokenKind::Semicolon])?;
        Ok(Statement::VarDecl { name, value })
    }

    fn parse_return(&mut self) -> Result<Statement, ParseError> {
        self.consume(&[TokenKind::Return])?;
        let value = if self.peek(&[TokenKind::Semicolon], 0) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&[TokenKind::Semicolon])?;
        Ok(Statement::Return { value })
    }

    /// The token after the identifier picks the statement form: `(` starts a
    /// call, `=` an assignment, and anything else leaves a variable reference
    /// heading an expression.
    fn parse_identifier_statement(&mut self) -> Result<Statement, ParseError> {
        if self.peek(&[TokenKind::OpenParen], 1) {
            let expr = self.parse_call()?;
            self.skip_optional(TokenKind::Semicolon);
            Ok(Statement::Expression { expr })
        } else if self.peek(&[TokenKind::Assign], 1) {
            let name = self.consume(&[TokenKind::Identifier])?.lexeme;
            self.consume(&[TokenKind::Assign])?;
            trace!(%name, "Parsing assignment statement");
            let value = self.parse_expression()?;
            self.consume(&[TokenKind::Semicolon])?;
            Ok(Statement::Assignment { name, value })
        } else {
            let expr = self.parse_expression()?;
            self.skip_optional(TokenKind::Semicolon);
            Ok(Statement::Expression { expr })
        }
    }

    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.enter()?;
        let expr = self.parse_logical_or()?;
        self.leave(1);
        Ok(expr)
    }

    fn parse_logical_or(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_logical_and()?;
        let mut folds = 0;
        while self.peek(&[TokenKind::Or], 0) {
            self.enter()?;
            folds += 1;
            self.advance();
            let right = self.parse_logical_and()?;
            expr = Expression::logical(expr, LogicalOp::Or, right);
        }
        self.leave(folds);
        Ok(expr)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_equality()?;
        let mut folds = 0;
        while self.peek(&[TokenKind::And], 0) {
            self.enter()?;
            folds += 1;
            self.advance();
            let right = self.parse_equality()?;
            expr = Expression::logical(expr, LogicalOp::And, right);
        }
        self.leave(folds);
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_relational()?;
        let mut folds = 0;
        while let Some(op) = self.kind_at(0).and_then(equality_op) {
            self.enter()?;
            folds += 1;
            self.advance();
            let right = self.parse_relational()?;
            expr = Expression::comparison(expr, op, right);
        }
        self.leave(folds);
        Ok(expr)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_additive()?;
        let mut folds = 0;
        while let Some(op) = self.kind_at(0).and_then(relational_op) {
            self.enter()?;
            folds += 1;
            self.advance();
            let right = self.parse_additive()?;
            expr = Expression::comparison(expr, op, right);
        }
        self.leave(folds);
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_multiplicative()?;
        let mut folds = 0;
        while let Some(op) = self.kind_at(0).and_then(additive_op) {
            self.enter()?;
            folds += 1;
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = Expression::additive(expr, op, right);
        }
        self.leave(folds);
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        let mut folds = 0;
        while let Some(op) = self.kind_at(0).and_then(multiplicative_op) {
            self.enter()?;
            folds += 1;
            self.advance();
            let right = self.parse_primary()?;
            expr = Expression::multiplicative(expr, op, right);
        }
        self.leave(folds);
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.kind_at(0) {
            Some(TokenKind::Integer) => {
                let token = self.consume(&[TokenKind::Integer])?;
                Ok(Expression::IntegerLiteral(token.lexeme))
            }
            Some(TokenKind::String) => {
                let token = self.consume(&[TokenKind::String])?;
                Ok(Expression::StringLiteral(token.lexeme))
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expression::BooleanLiteral(true))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expression::BooleanLiteral(false))
            }
            Some(TokenKind::Identifier) if self.peek(&[TokenKind::OpenParen], 1) => {
                self.parse_call()
            }
            Some(TokenKind::Identifier) => {
                let token = self.consume(&[TokenKind::Identifier])?;
                Ok(Expression::Var(token.lexeme))
            }
            Some(TokenKind::OpenParen) => {
                self.advance();
                trace!(cursor = self.cursor, "Parsing parenthesized expression");
                let expr = self.parse_expression()?;
                self.consume(&[TokenKind::CloseParen])?;
                Ok(expr)
            }
            _ => Err(self.unexpected(PRIMARY_START)),
        }
    }

    fn parse_call(&mut self) -> Result<Expression, ParseError> {
        let callee = self.consume(&[TokenKind::Identifier])?.lexeme;
        self.consume(&[TokenKind::OpenParen])?;
        let mut args = vec![];
        if !self.peek(&[TokenKind::CloseParen], 0) {
            args.push(self.parse_expression()?);
            while self.peek(&[TokenKind::Comma], 0) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        self.consume(&[TokenKind::CloseParen])?;
        Ok(Expression::FuncCall { callee, args })
    }
}

#[tracing::instrument(level = "trace", skip_all, fields(token_count = tokens.len()))]
pub fn parse(tokens: Vec<Token>) -> Result<File, ParseError> {
    Parser::new(tokens).parse_file()
}
