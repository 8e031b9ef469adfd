use crate::ast::{
    AssignOp, BinaryOp, Constant, ElseBranch, Expr, Param, Program, Span, Statement, UnaryOp,
};
use crate::lexer::{Token, TokenType};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.message, self.span.pos.line, self.span.pos.column
        )
    }
}

impl Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    /// Appends an `Eof` token when the stream does not already end with one.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.typ) != Some(&TokenType::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_else(Span::dummy);
            tokens.push(Token {
                typ: TokenType::Eof,
                value: String::new(),
                span,
            });
        }
        Self { tokens, index: 0 }
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let start = self.current().span;
        let mut lines = Vec::new();
        loop {
            self.skip_separators();
            if self.at_end() {
                break;
            }
            lines.push(self.parse_statement()?);
            self.expect_terminator()?;
        }
        let end = self.current().span;
        Ok(Program {
            span: start.to(end),
            lines,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.consume_type(TokenType::LBrace, "Expected '{'")?;
        let mut lines = Vec::new();
        loop {
            self.skip_separators();
            if self.check_type(TokenType::RBrace) {
                self.advance();
                return Ok(lines);
            }
            if self.at_end() {
                return self.error_here("Expected '}' before end of file");
            }
            lines.push(self.parse_statement()?);
            self.expect_terminator()?;
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let token = self.current().clone();
        match token.typ {
            TokenType::Comment => {
                self.advance();
                Ok(Statement::Comment {
                    span: token.span,
                    text: token.value,
                })
            }
            TokenType::At => {
                self.advance();
                let name = self.consume_type(TokenType::Ident, "Expected attribute name after '@'")?;
                Ok(Statement::Attribute {
                    span: token.span.to(name.span),
                    name: name.value,
                    name_span: name.span,
                })
            }
            TokenType::Keyword => match token.value.as_str() {
                "let" => self.parse_declaration(),
                "function" => self.parse_function(),
                "return" => {
                    self.advance();
                    let value = self.parse_expression(1)?;
                    Ok(Statement::Return {
                        span: token.span.to(value.span()),
                        value,
                    })
                }
                "if" => self.parse_if(),
                _ => self.error_here(format!("Unexpected keyword '{}'", token.value)),
            },
            TokenType::Ident => {
                if self.peek().typ == TokenType::LParen {
                    self.advance();
                    let (args, end) = self.parse_arguments()?;
                    return Ok(Statement::Call {
                        span: token.span.to(end),
                        name: token.value,
                        args,
                    });
                }
                self.parse_assignment()
            }
            _ => self.error_here(format!("Unexpected token '{}'", token.value)),
        }
    }

    fn parse_declaration(&mut self) -> Result<Statement, ParseError> {
        let start = self.advance().span;
        let name = self.consume_type(TokenType::Ident, "Expected variable name after 'let'")?;
        let op = self.consume_type(TokenType::Op, "Expected '=' after variable name")?;
        if op.value != "=" {
            return Err(ParseError {
                message: format!("Expected '=', found '{}'", op.value),
                span: op.span,
            });
        }
        let value = self.parse_expression(1)?;
        Ok(Statement::VariableDeclaration {
            span: start.to(value.span()),
            name: name.value,
            name_span: name.span,
            value,
        })
    }

    fn parse_assignment(&mut self) -> Result<Statement, ParseError> {
        let name = self.advance();
        let op_token = self.current().clone();
        let op = if op_token.typ == TokenType::Op {
            AssignOp::from_symbol(&op_token.value)
        } else {
            None
        };
        let Some(op) = op else {
            return self.error_here(format!("Expected assignment after '{}'", name.value));
        };
        self.advance();
        let value = self.parse_expression(1)?;
        Ok(Statement::Assignment {
            span: name.span.to(value.span()),
            name: name.value,
            name_span: name.span,
            op,
            op_span: op_token.span,
            value,
        })
    }

    fn parse_function(&mut self) -> Result<Statement, ParseError> {
        let start = self.advance().span;
        let name = self.consume_type(TokenType::Ident, "Expected function name")?;
        self.consume_type(TokenType::LParen, "Expected '(' after function name")?;
        let mut params = Vec::new();
        self.skip_newlines();
        if !self.check_type(TokenType::RParen) {
            loop {
                self.skip_newlines();
                let param = self.consume_type(TokenType::Ident, "Expected argument name")?;
                params.push(Param {
                    span: param.span,
                    name: param.value,
                });
                self.skip_newlines();
                if !self.check_type(TokenType::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.consume_type(TokenType::RParen, "Expected ')' after arguments")?;
        let body = self.parse_block()?;
        Ok(Statement::FunctionDeclaration {
            span: start.to(self.previous().span),
            name: name.value,
            name_span: name.span,
            params,
            body,
        })
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let start = self.advance().span;
        let condition = self.parse_expression(1)?;
        let then_body = self.parse_block()?;
        let mut else_branch = None;

        let checkpoint = self.index;
        self.skip_newlines();
        if self.check_keyword("else") {
            self.advance();
            if self.check_keyword("if") {
                else_branch = Some(ElseBranch::If(Box::new(self.parse_if()?)));
            } else {
                else_branch = Some(ElseBranch::Block(self.parse_block()?));
            }
        } else {
            self.index = checkpoint;
        }

        Ok(Statement::If {
            span: start.to(self.previous().span),
            condition,
            then_body,
            else_branch,
        })
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, Span), ParseError> {
        self.consume_type(TokenType::LParen, "Expected '('")?;
        let mut args = Vec::new();
        self.skip_newlines();
        if !self.check_type(TokenType::RParen) {
            loop {
                self.skip_newlines();
                args.push(self.parse_expression(1)?);
                self.skip_newlines();
                if !self.check_type(TokenType::Comma) {
                    break;
                }
                self.advance();
            }
        }
        let end = self.consume_type(TokenType::RParen, "Expected ')' after call arguments")?;
        Ok((args, end.span))
    }

    fn parse_expression(&mut self, min_precedence: i32) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let token = self.current().clone();
            if token.typ != TokenType::Op {
                break;
            }
            let Some(op) = BinaryOp::from_symbol(&token.value) else {
                break;
            };
            let precedence = precedence_of(op);
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_expression(precedence + 1)?;
            left = Expr::Binary {
                span: left.span().to(right.span()),
                op,
                op_span: token.span,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        let op = match (token.typ == TokenType::Op, token.value.as_str()) {
            (true, "-") => Some(UnaryOp::Minus),
            (true, "+") => Some(UnaryOp::Plus),
            (true, "!") => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                span: token.span.to(operand.span()),
                op,
                op_span: token.span,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.current().clone();
        match token.typ {
            TokenType::Number => {
                self.advance();
                let value = token.value.parse::<f64>().map_err(|_| ParseError {
                    message: format!("Invalid number literal '{}'", token.value),
                    span: token.span,
                })?;
                Ok(Expr::Constant {
                    span: token.span,
                    value: Constant::Number(value),
                })
            }
            TokenType::String => {
                self.advance();
                Ok(Expr::Constant {
                    span: token.span,
                    value: Constant::String(token.value),
                })
            }
            TokenType::Color => {
                self.advance();
                Ok(Expr::Constant {
                    span: token.span,
                    value: Constant::Color(token.value),
                })
            }
            TokenType::Keyword if token.value == "true" || token.value == "false" => {
                self.advance();
                Ok(Expr::Constant {
                    span: token.span,
                    value: Constant::Boolean(token.value == "true"),
                })
            }
            TokenType::Ident => {
                self.advance();
                if self.check_type(TokenType::LParen) {
                    let (args, end) = self.parse_arguments()?;
                    return Ok(Expr::Call {
                        span: token.span.to(end),
                        name: token.value,
                        args,
                    });
                }
                Ok(Expr::Identifier {
                    span: token.span,
                    name: token.value,
                })
            }
            TokenType::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expression(1)?;
                self.skip_newlines();
                let end = self.consume_type(TokenType::RParen, "Expected ')'")?;
                Ok(Expr::Paren {
                    span: token.span.to(end.span),
                    inner: Box::new(inner),
                })
            }
            TokenType::Eof => self.error_here("Expected expression before end of file"),
            _ => self.error_here(format!("Expected expression, found '{}'", token.value.escape_debug())),
        }
    }

    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        match self.current().typ {
            TokenType::Newline | TokenType::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenType::RBrace | TokenType::Comment | TokenType::Eof => Ok(()),
            _ => {
                let token = self.current();
                self.error_here(format!("Unexpected '{}' after statement", token.value))
            }
        }
    }

    fn consume_type(&mut self, typ: TokenType, message: &str) -> Result<Token, ParseError> {
        let token = self.current().clone();
        if token.typ == typ {
            self.advance();
            Ok(token)
        } else {
            Err(ParseError {
                message: message.to_string(),
                span: token.span,
            })
        }
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        let token = self.current();
        token.typ == TokenType::Keyword && token.value == keyword
    }

    fn check_type(&self, typ: TokenType) -> bool {
        self.current().typ == typ
    }

    fn skip_newlines(&mut self) {
        while self.check_type(TokenType::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while self.check_type(TokenType::Newline) || self.check_type(TokenType::Semicolon) {
            self.advance();
        }
    }

    fn at_end(&self) -> bool {
        self.current().typ == TokenType::Eof
    }

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.index + 1).min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.index.saturating_sub(1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn error_here<T: Into<String>, R>(&self, message: T) -> Result<R, ParseError> {
        Err(ParseError {
            message: message.into(),
            span: self.current().span,
        })
    }
}

fn precedence_of(op: BinaryOp) -> i32 {
    match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Equals
        | BinaryOp::NotEquals
        | BinaryOp::LessThan
        | BinaryOp::GreaterThan
        | BinaryOp::LessOrEqual
        | BinaryOp::GreaterOrEqual => 3,
        BinaryOp::Add | BinaryOp::Subtract => 4,
        BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 5,
    }
}
