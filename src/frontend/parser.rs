use crate::diagnostics::{report_fatal, CompileError};

use super::{
    ast::{
        BinaryOp, Decl, DeclKind, Expression, ExpressionKind, FnDecl, FormalDecl, Identifier,
        NodeId, Program, Statement, StatementKind, TypeSpec, TypeSpecKind, UnaryOp, VarDecl,
    },
    lexer::{Keyword, Lexer, Span, Token, TokenKind},
    SourceFile,
};

#[derive(Debug)]
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    next_node_id: u32,
    /// Span of the most recently consumed closing brace; used to end the
    /// spans of block-shaped constructs.
    previous_span: Span,
}

impl<'source> Parser<'source> {
    pub fn parse_program(source_file: &'source SourceFile) -> Result<Program<'source>, CompileError> {
        let mut parser = Self {
            lexer: Lexer::new(source_file),
            next_node_id: 0,
            previous_span: Span::new(0, 0),
        };

        let mut program = Program {
            source_file,
            globals: Vec::new(),
        };

        while parser.lexer.peek().is_some() {
            program.globals.push(parser.parse_decl()?);
        }

        Ok(program)
    }

    fn create_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn syntax_error(&self, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            pos: self.lexer.source().position_of_span(span),
            message: message.into(),
        }
    }

    fn eof_error(&self, expecting: &str) -> CompileError {
        let end = self.lexer.source().contents.len();
        self.syntax_error(
            Span::new(end, end),
            format!("Expected {expecting} but reached end of file"),
        )
    }

    fn expect_next(&mut self, expecting: &str) -> Result<Token, CompileError> {
        self.lexer.next().ok_or_else(|| self.eof_error(expecting))
    }

    fn expect_peek(&mut self, expecting: &str) -> Result<Token, CompileError> {
        self.lexer.peek().ok_or_else(|| self.eof_error(expecting))
    }

    fn expect_next_to_be(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        let token = self.expect_next(&format!("{kind:?}"))?;

        if token.kind != kind {
            return Err(self.syntax_error(
                token.span,
                format!(
                    "Expected {:?} but found {:?} ({})",
                    kind,
                    token.kind,
                    self.lexer.source().value_of_span(token.span)
                ),
            ));
        }

        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token, CompileError> {
        self.expect_next_to_be(TokenKind::Keyword(keyword))
    }

    fn next_is(&mut self, kind: TokenKind) -> bool {
        self.lexer.peek().is_some_and(|t| t.kind == kind)
    }

    /// decl = ID ":" type ( ";" | fnTail )
    fn parse_decl(&mut self) -> Result<Decl, CompileError> {
        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon)?;
        let ty = self.parse_type_spec()?;

        let peeked = self.expect_peek("semicolon or formal parameter list")?;
        match peeked.kind {
            TokenKind::Semicolon => {
                let semi = self.expect_next_to_be(TokenKind::Semicolon)?;

                Ok(Decl {
                    id: self.create_node_id(),
                    span: Span::new(name.span.start, semi.span.end),
                    kind: DeclKind::Var(VarDecl { name, ty }),
                })
            }
            TokenKind::OpenParen => self.parse_fn_decl(name, ty),
            _ => Err(self.syntax_error(
                peeked.span,
                format!(
                    "Expected semicolon or formal parameter list but found {}",
                    self.lexer.source().value_of_span(peeked.span)
                ),
            )),
        }
    }

    // main
    fn parse_identifier(&mut self) -> Result<Identifier, CompileError> {
        let token = self.expect_next_to_be(TokenKind::Identifier)?;

        Ok(Identifier {
            id: self.create_node_id(),
            span: token.span,
            name: self.lexer.source().value_of_span(token.span).to_string(),
        })
    }

    /// type = prim ( "array" "[" INTLIT "]" )?
    fn parse_type_spec(&mut self) -> Result<TypeSpec, CompileError> {
        let token = self.expect_next("type")?;

        let kind = match token.kind {
            TokenKind::Keyword(Keyword::Int) => TypeSpecKind::Int,
            TokenKind::Keyword(Keyword::Byte) => TypeSpecKind::Byte,
            TokenKind::Keyword(Keyword::Bool) => TypeSpecKind::Bool,
            TokenKind::Keyword(Keyword::Void) => TypeSpecKind::Void,
            _ => {
                return Err(self.syntax_error(
                    token.span,
                    format!(
                        "Expected type but found {}",
                        self.lexer.source().value_of_span(token.span)
                    ),
                ))
            }
        };

        let base = TypeSpec {
            id: self.create_node_id(),
            span: token.span,
            kind,
        };

        if !self.next_is(TokenKind::Keyword(Keyword::Array)) {
            return Ok(base);
        }

        self.expect_keyword(Keyword::Array)?;
        self.expect_next_to_be(TokenKind::OpenBracket)?;
        let length_token = self.expect_next_to_be(TokenKind::IntegerLiteral)?;
        let close = self.expect_next_to_be(TokenKind::CloseBracket)?;

        let length_text = self.lexer.source().value_of_span(length_token.span);
        let length = length_text.parse::<u32>().map_err(|_| {
            self.syntax_error(length_token.span, "Array length out of range")
        })?;

        Ok(TypeSpec {
            id: self.create_node_id(),
            span: Span::new(base.span.start, close.span.end),
            kind: TypeSpecKind::Array {
                base: Box::new(base),
                length,
            },
        })
    }

    /// fnTail = "(" formals? ")" "{" stmt* "}"
    fn parse_fn_decl(&mut self, name: Identifier, ret: TypeSpec) -> Result<Decl, CompileError> {
        self.expect_next_to_be(TokenKind::OpenParen)?;

        let mut formals = Vec::new();

        if !self.next_is(TokenKind::CloseParen) {
            formals.push(self.parse_formal()?);

            while self.next_is(TokenKind::Comma) {
                self.expect_next_to_be(TokenKind::Comma)?;
                formals.push(self.parse_formal()?);
            }
        }

        self.expect_next_to_be(TokenKind::CloseParen)?;

        let body = self.parse_block()?;
        let close_span = self.previous_span;

        Ok(Decl {
            id: self.create_node_id(),
            span: Span::new(name.span.start, close_span.end),
            kind: DeclKind::Fn(Box::new(FnDecl {
                name,
                ret,
                formals,
                body,
            })),
        })
    }

    // a : int
    fn parse_formal(&mut self) -> Result<FormalDecl, CompileError> {
        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon)?;
        let ty = self.parse_type_spec()?;

        Ok(FormalDecl {
            id: self.create_node_id(),
            span: Span::new(name.span.start, ty.span.end),
            name,
            ty,
        })
    }

    /// "{" stmt* "}"
    fn parse_block(&mut self) -> Result<Vec<Statement>, CompileError> {
        self.expect_next_to_be(TokenKind::OpenBrace)?;

        let mut statements = Vec::new();

        while !self.next_is(TokenKind::CloseBrace) {
            if self.lexer.peek().is_none() {
                return Err(self.eof_error("statement or closing brace"));
            }

            statements.push(self.parse_statement()?);
        }

        let close = self.expect_next_to_be(TokenKind::CloseBrace)?;
        self.previous_span = close.span;

        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, CompileError> {
        let peeked = self.expect_peek("statement")?;

        match peeked.kind {
            TokenKind::Keyword(Keyword::Read) => self.parse_read_statement(),
            TokenKind::Keyword(Keyword::Write) => self.parse_write_statement(),
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Identifier
                if self
                    .lexer
                    .peek_nth(1)
                    .is_some_and(|t| t.kind == TokenKind::Colon) =>
            {
                self.parse_local_decl_statement()
            }
            TokenKind::Identifier => self.parse_expression_statement(),
            _ => Err(self.syntax_error(
                peeked.span,
                format!(
                    "Expected statement but found {}",
                    self.lexer.source().value_of_span(peeked.span)
                ),
            )),
        }
    }

    fn parse_local_decl_statement(&mut self) -> Result<Statement, CompileError> {
        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon)?;
        let ty = self.parse_type_spec()?;
        let semi = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(name.span.start, semi.span.end),
            kind: StatementKind::VarDecl(VarDecl { name, ty }),
        })
    }

    /// Assignment, call, post-increment, or post-decrement in statement
    /// position.
    fn parse_expression_statement(&mut self) -> Result<Statement, CompileError> {
        let expression = self.parse_expression()?;
        let expression_start = expression.span.start;

        let peeked = self.expect_peek("semicolon, ++, or --")?;
        match peeked.kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                if !expression.is_lvalue() {
                    return Err(
                        self.syntax_error(expression.span, "Target of ++/-- must be an lvalue")
                    );
                }

                let op = self.expect_next("++ or --")?;
                let semi = self.expect_next_to_be(TokenKind::Semicolon)?;

                let kind = if op.kind == TokenKind::PlusPlus {
                    StatementKind::PostIncrement(expression)
                } else {
                    StatementKind::PostDecrement(expression)
                };

                Ok(Statement {
                    id: self.create_node_id(),
                    span: Span::new(expression_start, semi.span.end),
                    kind,
                })
            }
            _ => {
                let semi = self.expect_next_to_be(TokenKind::Semicolon)?;
                let span = Span::new(expression.span.start, semi.span.end);

                let kind = match expression.kind {
                    ExpressionKind::Assignment { .. } => StatementKind::Assign(expression),
                    ExpressionKind::Call { .. } => StatementKind::Call(expression),
                    _ => {
                        return Err(self.syntax_error(
                            expression.span,
                            "Expression statement must be an assignment or a call",
                        ))
                    }
                };

                Ok(Statement {
                    id: self.create_node_id(),
                    span,
                    kind,
                })
            }
        }
    }

    // read lval ;
    fn parse_read_statement(&mut self) -> Result<Statement, CompileError> {
        let keyword = self.expect_keyword(Keyword::Read)?;
        let target = self.parse_lvalue()?;
        let semi = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(keyword.span.start, semi.span.end),
            kind: StatementKind::Read(target),
        })
    }

    // write exp ;
    fn parse_write_statement(&mut self) -> Result<Statement, CompileError> {
        let keyword = self.expect_keyword(Keyword::Write)?;
        let source = self.parse_expression()?;
        let semi = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(keyword.span.start, semi.span.end),
            kind: StatementKind::Write(source),
        })
    }

    fn parse_if_statement(&mut self) -> Result<Statement, CompileError> {
        let keyword = self.expect_keyword(Keyword::If)?;
        self.expect_next_to_be(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::CloseParen)?;

        let body = self.parse_block()?;
        let mut end = self.previous_span;

        if !self.next_is(TokenKind::Keyword(Keyword::Else)) {
            return Ok(Statement {
                id: self.create_node_id(),
                span: Span::new(keyword.span.start, end.end),
                kind: StatementKind::If { condition, body },
            });
        }

        self.expect_keyword(Keyword::Else)?;
        let else_body = self.parse_block()?;
        end = self.previous_span;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(keyword.span.start, end.end),
            kind: StatementKind::IfElse {
                condition,
                then_body: body,
                else_body,
            },
        })
    }

    fn parse_while_statement(&mut self) -> Result<Statement, CompileError> {
        let keyword = self.expect_keyword(Keyword::While)?;
        self.expect_next_to_be(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::CloseParen)?;

        let body = self.parse_block()?;
        let end = self.previous_span;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(keyword.span.start, end.end),
            kind: StatementKind::While { condition, body },
        })
    }

    fn parse_return_statement(&mut self) -> Result<Statement, CompileError> {
        let keyword = self.expect_keyword(Keyword::Return)?;

        let value = if self.next_is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        let semi = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(Statement {
            id: self.create_node_id(),
            span: Span::new(keyword.span.start, semi.span.end),
            kind: StatementKind::Return(value),
        })
    }

    /// Lowest precedence: right-associative assignment.
    fn parse_expression(&mut self) -> Result<Expression, CompileError> {
        let lhs = self.parse_logical_or()?;

        if !self.next_is(TokenKind::Assign) {
            return Ok(lhs);
        }

        if !lhs.is_lvalue() {
            return Err(self.syntax_error(lhs.span, "Assignment target must be an lvalue"));
        }

        self.expect_next_to_be(TokenKind::Assign)?;
        let rhs = self.parse_expression()?;

        Ok(Expression {
            id: self.create_node_id(),
            span: Span::new(lhs.span.start, rhs.span.end),
            kind: ExpressionKind::Assignment {
                target: Box::new(lhs),
                value: Box::new(rhs),
            },
        })
    }

    fn new_binary(&mut self, op: BinaryOp, lhs: Expression, rhs: Expression) -> Expression {
        Expression {
            id: self.create_node_id(),
            span: Span::new(lhs.span.start, rhs.span.end),
            kind: ExpressionKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    fn parse_logical_or(&mut self) -> Result<Expression, CompileError> {
        let mut lhs = self.parse_logical_and()?;

        while self.next_is(TokenKind::Or) {
            self.expect_next_to_be(TokenKind::Or)?;
            let rhs = self.parse_logical_and()?;
            lhs = self.new_binary(BinaryOp::Or, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, CompileError> {
        let mut lhs = self.parse_equality()?;

        while self.next_is(TokenKind::And) {
            self.expect_next_to_be(TokenKind::And)?;
            let rhs = self.parse_equality()?;
            lhs = self.new_binary(BinaryOp::And, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expression, CompileError> {
        let mut lhs = self.parse_relational()?;

        loop {
            let op = match self.lexer.peek().map(|t| t.kind) {
                Some(TokenKind::Equals) => BinaryOp::Equals,
                Some(TokenKind::NotEquals) => BinaryOp::NotEquals,
                _ => break,
            };

            self.expect_next("operator")?;
            let rhs = self.parse_relational()?;
            lhs = self.new_binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expression, CompileError> {
        let mut lhs = self.parse_additive()?;

        loop {
            let op = match self.lexer.peek().map(|t| t.kind) {
                Some(TokenKind::Less) => BinaryOp::Less,
                Some(TokenKind::LessEq) => BinaryOp::LessEq,
                Some(TokenKind::Greater) => BinaryOp::Greater,
                Some(TokenKind::GreaterEq) => BinaryOp::GreaterEq,
                _ => break,
            };

            self.expect_next("operator")?;
            let rhs = self.parse_additive()?;
            lhs = self.new_binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expression, CompileError> {
        let mut lhs = self.parse_multiplicative()?;

        loop {
            let op = match self.lexer.peek().map(|t| t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Subtract,
                _ => break,
            };

            self.expect_next("operator")?;
            let rhs = self.parse_multiplicative()?;
            lhs = self.new_binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, CompileError> {
        let mut lhs = self.parse_unary()?;

        loop {
            let op = match self.lexer.peek().map(|t| t.kind) {
                Some(TokenKind::Star) => BinaryOp::Multiply,
                Some(TokenKind::Slash) => BinaryOp::Divide,
                _ => break,
            };

            self.expect_next("operator")?;
            let rhs = self.parse_unary()?;
            lhs = self.new_binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression, CompileError> {
        let peeked = self.expect_peek("expression")?;

        let op = match peeked.kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };

        let op_token = self.expect_next("unary operator")?;
        let operand = self.parse_unary()?;

        Ok(Expression {
            id: self.create_node_id(),
            span: Span::new(op_token.span.start, operand.span.end),
            kind: ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn parse_primary(&mut self) -> Result<Expression, CompileError> {
        let token = self.expect_next("expression")?;

        match token.kind {
            TokenKind::IntegerLiteral => {
                let text = self.lexer.source().value_of_span(token.span);
                let value = match text.parse::<i64>() {
                    Ok(value) => value,
                    Err(_) => {
                        report_fatal(
                            self.lexer.source().position_of_span(token.span),
                            "Integer literal too large; using max value",
                        );
                        i64::MAX
                    }
                };

                Ok(Expression {
                    id: self.create_node_id(),
                    span: token.span,
                    kind: ExpressionKind::IntLiteral(value),
                })
            }
            TokenKind::StringLiteral => Ok(Expression {
                id: self.create_node_id(),
                span: token.span,
                kind: ExpressionKind::StrLiteral(
                    self.lexer.source().value_of_span(token.span).to_string(),
                ),
            }),
            TokenKind::Keyword(Keyword::True) => Ok(Expression {
                id: self.create_node_id(),
                span: token.span,
                kind: ExpressionKind::True,
            }),
            TokenKind::Keyword(Keyword::False) => Ok(Expression {
                id: self.create_node_id(),
                span: token.span,
                kind: ExpressionKind::False,
            }),
            TokenKind::Keyword(Keyword::Havoc) => Ok(Expression {
                id: self.create_node_id(),
                span: token.span,
                kind: ExpressionKind::Havoc,
            }),
            TokenKind::OpenParen => {
                let inner = self.parse_expression()?;
                self.expect_next_to_be(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::Identifier => self.parse_identifier_expression(token),
            _ => Err(self.syntax_error(
                token.span,
                format!(
                    "Expected expression but found {}",
                    self.lexer.source().value_of_span(token.span)
                ),
            )),
        }
    }

    /// An identifier already consumed: plain use, call, or index.
    fn parse_identifier_expression(
        &mut self,
        token: Token,
    ) -> Result<Expression, CompileError> {
        let name = self.lexer.source().value_of_span(token.span).to_string();

        match self.lexer.peek().map(|t| t.kind) {
            Some(TokenKind::OpenParen) => {
                let callee = Identifier {
                    id: self.create_node_id(),
                    span: token.span,
                    name,
                };

                self.expect_next_to_be(TokenKind::OpenParen)?;

                let mut arguments = Vec::new();
                if !self.next_is(TokenKind::CloseParen) {
                    arguments.push(self.parse_expression()?);

                    while self.next_is(TokenKind::Comma) {
                        self.expect_next_to_be(TokenKind::Comma)?;
                        arguments.push(self.parse_expression()?);
                    }
                }

                let close = self.expect_next_to_be(TokenKind::CloseParen)?;

                Ok(Expression {
                    id: self.create_node_id(),
                    span: Span::new(token.span.start, close.span.end),
                    kind: ExpressionKind::Call { callee, arguments },
                })
            }
            Some(TokenKind::OpenBracket) => {
                let base = Expression {
                    id: self.create_node_id(),
                    span: token.span,
                    kind: ExpressionKind::Identifier(name),
                };

                self.expect_next_to_be(TokenKind::OpenBracket)?;
                let index = self.parse_expression()?;
                let close = self.expect_next_to_be(TokenKind::CloseBracket)?;

                Ok(Expression {
                    id: self.create_node_id(),
                    span: Span::new(token.span.start, close.span.end),
                    kind: ExpressionKind::Index {
                        base: Box::new(base),
                        index: Box::new(index),
                    },
                })
            }
            _ => Ok(Expression {
                id: self.create_node_id(),
                span: token.span,
                kind: ExpressionKind::Identifier(name),
            }),
        }
    }

    // lval = ID ( "[" exp "]" )?
    fn parse_lvalue(&mut self) -> Result<Expression, CompileError> {
        let expression = self.parse_primary()?;

        if !expression.is_lvalue() {
            return Err(self.syntax_error(expression.span, "Expected an lvalue"));
        }

        Ok(expression)
    }
}
