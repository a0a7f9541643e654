use crate::ast::{BinaryOp, CompareOp, Expr, LogicalOp, MethodDef, Program, Stmt};
use crate::error::{MinipyError, Span};
use crate::lexer::{Lexer, TokenKind};

pub struct Parser {
    lexer: Lexer,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Self { lexer }
    }

    pub fn parse(&mut self) -> Result<Program, MinipyError> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.match_kind(&TokenKind::Newline) {
                continue;
            }
            statements.push(self.statement()?);
        }
        Ok(Program { statements })
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, MinipyError> {
        match self.kind() {
            TokenKind::Class => self.class_definition(),
            TokenKind::If => self.if_statement(),
            _ => {
                let stmt = self.simple_statement()?;
                self.consume(&TokenKind::Newline)?;
                Ok(stmt)
            }
        }
    }

    fn simple_statement(&mut self) -> Result<Stmt, MinipyError> {
        match self.kind() {
            TokenKind::Print => self.print_statement(),
            TokenKind::Return => self.return_statement(),
            _ => self.expression_or_assignment(),
        }
    }

    fn class_definition(&mut self) -> Result<Stmt, MinipyError> {
        let start = self.span().start;
        self.lexer.advance();
        let (name, _) = self.consume_id()?;

        let parent = if self.match_kind(&TokenKind::Char('(')) {
            let (parent, _) = self.consume_id()?;
            self.consume(&TokenKind::Char(')'))?;
            Some(parent)
        } else {
            None
        };

        self.consume(&TokenKind::Char(':'))?;
        self.consume(&TokenKind::Newline)?;
        self.consume(&TokenKind::Indent)?;

        let mut methods = Vec::new();
        while !self.check(&TokenKind::Dedent) {
            if self.match_kind(&TokenKind::Newline) {
                continue;
            }
            if self.check(&TokenKind::Eof) {
                return Err(MinipyError::parse_error(
                    self.span(),
                    format!("Unexpected end of file inside class '{}'", name),
                ));
            }
            methods.push(self.method_definition()?);
        }
        let end = self.span().end;
        self.lexer.advance();

        Ok(Stmt::ClassDef {
            name,
            parent,
            methods,
            span: Span::new(start, end),
        })
    }

    fn method_definition(&mut self) -> Result<MethodDef, MinipyError> {
        let start = self.span().start;
        self.consume(&TokenKind::Def)?;
        let (name, _) = self.consume_id()?;

        self.consume(&TokenKind::Char('('))?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::Char(')')) {
            loop {
                let (param, _) = self.consume_id()?;
                params.push(param);
                if !self.match_kind(&TokenKind::Char(',')) {
                    break;
                }
            }
        }
        self.consume(&TokenKind::Char(')'))?;
        self.consume(&TokenKind::Char(':'))?;

        // The declared receiver is bound as `self` at call time; the formal
        // parameter list covers call arguments only.
        if !params.is_empty() {
            params.remove(0);
        }

        let body = self.suite()?;
        if self.check(&TokenKind::Newline) {
            self.lexer.advance();
        }
        let end = match body.last() {
            Some(stmt) => stmt.span().end,
            None => start,
        };

        Ok(MethodDef {
            name,
            params,
            body,
            span: Span::new(start, end),
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, MinipyError> {
        let start = self.span().start;
        self.lexer.advance();
        let condition = self.expression()?;
        self.consume(&TokenKind::Char(':'))?;
        let then_branch = self.suite()?;

        let else_branch = if self.check(&TokenKind::Else) {
            self.lexer.advance();
            self.consume(&TokenKind::Char(':'))?;
            Some(self.suite()?)
        } else {
            None
        };

        // Inline suites leave the line terminator for the whole statement.
        if self.check(&TokenKind::Newline) {
            self.lexer.advance();
        }

        let end = else_branch
            .as_ref()
            .and_then(|stmts| stmts.last())
            .or_else(|| then_branch.last())
            .map_or(start, |stmt| stmt.span().end);

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: Span::new(start, end),
        })
    }

    /// A block after `:` — either an indented statement list or a single
    /// statement on the same line.
    fn suite(&mut self) -> Result<Vec<Stmt>, MinipyError> {
        if !self.check(&TokenKind::Newline) {
            return Ok(vec![self.simple_statement()?]);
        }
        self.lexer.advance();
        self.consume(&TokenKind::Indent)?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::Dedent) {
            if self.match_kind(&TokenKind::Newline) {
                continue;
            }
            if self.check(&TokenKind::Eof) {
                return Err(MinipyError::parse_error(
                    self.span(),
                    "Unexpected end of file inside an indented block",
                ));
            }
            statements.push(self.statement()?);
        }
        self.lexer.advance();
        Ok(statements)
    }

    fn print_statement(&mut self) -> Result<Stmt, MinipyError> {
        let start = self.span().start;
        let mut end = self.span().end;
        self.lexer.advance();

        let mut args = Vec::new();
        if !self.at_line_end() {
            loop {
                let arg = self.expression()?;
                end = arg.span().end;
                args.push(arg);
                if !self.match_kind(&TokenKind::Char(',')) {
                    break;
                }
            }
        }

        Ok(Stmt::Print {
            args,
            span: Span::new(start, end),
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, MinipyError> {
        let start = self.span().start;
        let mut end = self.span().end;
        self.lexer.advance();

        let value = if self.at_line_end() {
            None
        } else {
            let expr = self.expression()?;
            end = expr.span().end;
            Some(expr)
        };

        Ok(Stmt::Return {
            value,
            span: Span::new(start, end),
        })
    }

    fn expression_or_assignment(&mut self) -> Result<Stmt, MinipyError> {
        let start = self.span().start;
        let expr = self.expression()?;

        if !self.check(&TokenKind::Char('=')) {
            let end = expr.span().end;
            return Ok(Stmt::Expression {
                expr,
                span: Span::new(start, end),
            });
        }
        self.lexer.advance();
        let value = self.expression()?;
        let end = value.span().end;

        match expr {
            Expr::Variable { mut names, span } => {
                if let Some(last) = names.pop() {
                    if names.is_empty() {
                        Ok(Stmt::Assign {
                            name: last,
                            value,
                            span: Span::new(start, end),
                        })
                    } else {
                        Ok(Stmt::FieldAssign {
                            object: Expr::Variable {
                                names,
                                span: span.clone(),
                            },
                            field: last,
                            value,
                            span: Span::new(start, end),
                        })
                    }
                } else {
                    Err(MinipyError::parse_error(span, "Invalid assignment target"))
                }
            }
            other => Err(MinipyError::parse_error(
                other.span().clone(),
                "Invalid assignment target",
            )
            .with_help(
                "Only names and instance fields can be assigned. Examples: 'x = 1' or 'self.x = 1'",
            )),
        }
    }

    // ---------------------------------------------------------------------
    // Expressions, loosest binding first
    // ---------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, MinipyError> {
        self.or_expression()
    }

    fn or_expression(&mut self) -> Result<Expr, MinipyError> {
        let mut expr = self.and_expression()?;
        while self.match_kind(&TokenKind::Or) {
            let right = self.and_expression()?;
            let span = Span::new(expr.span().start, right.span().end);
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::Or,
                right: Box::new(right),
                span,
            };
        }
        Ok(expr)
    }

    fn and_expression(&mut self) -> Result<Expr, MinipyError> {
        let mut expr = self.not_expression()?;
        while self.match_kind(&TokenKind::And) {
            let right = self.not_expression()?;
            let span = Span::new(expr.span().start, right.span().end);
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::And,
                right: Box::new(right),
                span,
            };
        }
        Ok(expr)
    }

    fn not_expression(&mut self) -> Result<Expr, MinipyError> {
        if self.check(&TokenKind::Not) {
            let start = self.span().start;
            self.lexer.advance();
            let operand = self.not_expression()?;
            let span = Span::new(start, operand.span().end);
            return Ok(Expr::Not {
                operand: Box::new(operand),
                span,
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, MinipyError> {
        let left = self.additive()?;
        let operator = match self.kind() {
            TokenKind::Eq => CompareOp::Equal,
            TokenKind::NotEq => CompareOp::NotEqual,
            TokenKind::LessOrEq => CompareOp::LessEqual,
            TokenKind::GreaterOrEq => CompareOp::GreaterEqual,
            TokenKind::Char('<') => CompareOp::Less,
            TokenKind::Char('>') => CompareOp::Greater,
            _ => return Ok(left),
        };
        self.lexer.advance();
        let right = self.additive()?;
        let span = Span::new(left.span().start, right.span().end);
        Ok(Expr::Comparison {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span,
        })
    }

    fn additive(&mut self) -> Result<Expr, MinipyError> {
        let mut expr = self.multiplicative()?;
        loop {
            let operator = match self.kind() {
                TokenKind::Char('+') => BinaryOp::Add,
                TokenKind::Char('-') => BinaryOp::Subtract,
                _ => break,
            };
            self.lexer.advance();
            let right = self.multiplicative()?;
            let span = Span::new(expr.span().start, right.span().end);
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<Expr, MinipyError> {
        let mut expr = self.postfix()?;
        loop {
            let operator = match self.kind() {
                TokenKind::Char('*') => BinaryOp::Multiply,
                TokenKind::Char('/') => BinaryOp::Divide,
                _ => break,
            };
            self.lexer.advance();
            let right = self.postfix()?;
            let span = Span::new(expr.span().start, right.span().end);
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }
        Ok(expr)
    }

    /// Method calls chained onto any callable result: `X().f().g()`.
    fn postfix(&mut self) -> Result<Expr, MinipyError> {
        let mut expr = self.primary()?;
        while self.check(&TokenKind::Char('.')) {
            self.lexer.advance();
            let (method, _) = self.consume_id()?;
            let (args, end) = self.arguments()?;
            let span = Span::new(expr.span().start, end);
            expr = Expr::MethodCall {
                object: Box::new(expr),
                method,
                args,
                span,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, MinipyError> {
        let token = self.lexer.current().clone();
        match token.kind {
            TokenKind::Number(value) => {
                self.lexer.advance();
                Ok(Expr::Number {
                    value,
                    span: token.span,
                })
            }
            TokenKind::Str(value) => {
                self.lexer.advance();
                Ok(Expr::Str {
                    value,
                    span: token.span,
                })
            }
            TokenKind::True => {
                self.lexer.advance();
                Ok(Expr::Bool {
                    value: true,
                    span: token.span,
                })
            }
            TokenKind::False => {
                self.lexer.advance();
                Ok(Expr::Bool {
                    value: false,
                    span: token.span,
                })
            }
            TokenKind::None => {
                self.lexer.advance();
                Ok(Expr::None { span: token.span })
            }
            TokenKind::Char('(') => {
                self.lexer.advance();
                let expr = self.expression()?;
                self.consume(&TokenKind::Char(')'))?;
                Ok(expr)
            }
            TokenKind::Id(_) => self.dotted_or_call(),
            other => Err(MinipyError::parse_error(
                token.span,
                format!("Expected an expression but found {}", other),
            )),
        }
    }

    /// A dotted name, optionally followed by a call: a plain `a.b.c` read,
    /// a construction `X(args)`, a method call `a.b.f(args)`, or the
    /// builtin `str(arg)`.
    fn dotted_or_call(&mut self) -> Result<Expr, MinipyError> {
        let start = self.span().start;
        let (first, first_span) = self.consume_id()?;
        let mut names = vec![first];
        let mut end = first_span.end;

        while self.check(&TokenKind::Char('.')) {
            // `a.b(...)` is a method call; the trailing segment splits off
            // below once the '(' shows up.
            self.lexer.advance();
            let (name, name_span) = self.consume_id()?;
            names.push(name);
            end = name_span.end;
        }

        if !self.check(&TokenKind::Char('(')) {
            return Ok(Expr::Variable {
                names,
                span: Span::new(start, end),
            });
        }

        let (mut args, args_end) = self.arguments()?;
        let span = Span::new(start, args_end);

        if names.len() == 1 && names[0] == "str" {
            if args.len() == 1 {
                if let Some(arg) = args.pop() {
                    return Ok(Expr::Stringify {
                        arg: Box::new(arg),
                        span,
                    });
                }
            }
            return Err(MinipyError::parse_error(
                span,
                format!("str() takes exactly 1 argument, got {}", args.len()),
            )
            .with_help("Usage: str(value) renders any value as a string."));
        }

        if names.len() > 1 {
            if let Some(method) = names.pop() {
                let object = Expr::Variable {
                    names,
                    span: Span::new(start, end),
                };
                return Ok(Expr::MethodCall {
                    object: Box::new(object),
                    method,
                    args,
                    span,
                });
            }
        }
        let callee = Expr::Variable {
            names,
            span: Span::new(start, end),
        };
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            span,
        })
    }

    /// A parenthesized argument list; returns the arguments and the byte
    /// offset just past the closing parenthesis.
    fn arguments(&mut self) -> Result<(Vec<Expr>, usize), MinipyError> {
        self.consume(&TokenKind::Char('('))?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::Char(')')) {
            loop {
                args.push(self.expression()?);
                if !self.match_kind(&TokenKind::Char(',')) {
                    break;
                }
            }
        }
        let end = self.span().end;
        self.consume(&TokenKind::Char(')'))?;
        Ok((args, end))
    }

    // ---------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------

    fn kind(&self) -> &TokenKind {
        &self.lexer.current().kind
    }

    fn span(&self) -> Span {
        self.lexer.current().span.clone()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.lexer.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> Result<(), MinipyError> {
        self.lexer.expect(kind)?;
        self.lexer.advance();
        Ok(())
    }

    fn consume_id(&mut self) -> Result<(String, Span), MinipyError> {
        let name = self.lexer.expect_id()?;
        let span = self.span();
        self.lexer.advance();
        Ok((name, span))
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent | TokenKind::Else
        )
    }
}
