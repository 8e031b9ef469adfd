use crate::ast::{Position, Span};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    Keyword,
    Ident,
    Number,
    String,
    Color,
    Op,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    At,
    Semicolon,
    Newline,
    Comment,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub typ: TokenType,
    pub value: String,
    pub span: Span,
}

impl Token {
    pub fn pos(&self) -> Position {
        self.span.pos
    }
}

#[derive(Debug, Clone)]
pub struct LexerError {
    pub message: String,
    pub span: Span,
}

impl Display for LexerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.message, self.span.pos.line, self.span.pos.column
        )
    }
}

impl Error for LexerError {}

const KEYWORDS: &[&str] = &["let", "function", "return", "if", "else", "true", "false"];

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        while !self.at_end() {
            let ch = self.peek();
            if ch == '\u{feff}' || ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
                continue;
            }
            let start = self.mark();
            if ch == '\n' {
                self.advance();
                tokens.push(self.token(TokenType::Newline, "\n", start));
                continue;
            }
            if ch == '/' && matches!(self.peek_at(1), '/' | '*') {
                tokens.push(self.read_comment()?);
                continue;
            }
            if ch == '"' {
                tokens.push(self.read_string()?);
                continue;
            }
            if ch == '#' {
                tokens.push(self.read_color()?);
                continue;
            }
            if ch.is_ascii_digit() || (ch == '.' && self.peek_at(1).is_ascii_digit()) {
                tokens.push(self.read_number());
                continue;
            }
            if ch.is_alphabetic() || ch == '_' {
                tokens.push(self.read_identifier());
                continue;
            }
            let typ = match ch {
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                ',' => TokenType::Comma,
                '@' => TokenType::At,
                ';' => TokenType::Semicolon,
                '+' | '-' | '*' | '/' | '%' | '=' | '!' | '<' | '>' | '&' | '|' => {
                    tokens.push(self.read_operator()?);
                    continue;
                }
                _ => {
                    return Err(LexerError {
                        message: format!("Unexpected character {:?}", ch),
                        span: self.span_from(start),
                    });
                }
            };
            self.advance();
            tokens.push(self.token(typ, &ch.to_string(), start));
        }
        let end = self.mark();
        tokens.push(self.token(TokenType::Eof, "", end));
        Ok(tokens)
    }

    fn read_operator(&mut self) -> Result<Token, LexerError> {
        let start = self.mark();
        let ch = self.advance();
        let mut value = ch.to_string();
        match ch {
            '&' | '|' => {
                if self.peek() != ch {
                    return Err(LexerError {
                        message: format!("Expected '{}{}'", ch, ch),
                        span: self.span_from(start),
                    });
                }
                value.push(self.advance());
            }
            _ => {
                if self.peek() == '=' {
                    value.push(self.advance());
                }
            }
        }
        Ok(self.token(TokenType::Op, &value, start))
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.mark();
        let mut text = String::new();
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_alphanumeric() || ch == '_' {
                text.push(self.advance());
            } else {
                break;
            }
        }
        let typ = if KEYWORDS.contains(&text.as_str()) {
            TokenType::Keyword
        } else {
            TokenType::Ident
        };
        self.token(typ, &text, start)
    }

    fn read_number(&mut self) -> Token {
        let start = self.mark();
        let mut text = String::new();
        let mut seen_dot = false;
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_ascii_digit() {
                text.push(self.advance());
                continue;
            }
            if ch == '.' && !seen_dot && self.peek_at(1).is_ascii_digit() {
                seen_dot = true;
                text.push(self.advance());
                continue;
            }
            break;
        }
        self.token(TokenType::Number, &text, start)
    }

    fn read_color(&mut self) -> Result<Token, LexerError> {
        let start = self.mark();
        let mut text = String::new();
        text.push(self.advance());
        while !self.at_end() && self.peek().is_ascii_hexdigit() {
            text.push(self.advance());
        }
        if text.len() != 7 {
            return Err(LexerError {
                message: format!("Invalid color literal '{}', expected #rrggbb", text),
                span: self.span_from(start),
            });
        }
        Ok(self.token(TokenType::Color, &text.to_lowercase(), start))
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        let start = self.mark();
        self.advance();
        let mut out = String::new();
        while !self.at_end() {
            let ch = self.advance();
            if ch == '"' {
                return Ok(self.token(TokenType::String, &out, start));
            }
            if ch == '\\' {
                if self.at_end() {
                    break;
                }
                let esc = self.advance();
                out.push(match esc {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    _ => esc,
                });
                continue;
            }
            if ch == '\n' {
                break;
            }
            out.push(ch);
        }
        Err(LexerError {
            message: "Unterminated string literal".to_string(),
            span: self.span_from(start),
        })
    }

    fn read_comment(&mut self) -> Result<Token, LexerError> {
        let start = self.mark();
        self.advance();
        let block = self.advance() == '*';
        let mut text = String::new();
        if !block {
            while !self.at_end() && self.peek() != '\n' {
                text.push(self.advance());
            }
            return Ok(self.token(TokenType::Comment, text.trim(), start));
        }
        while !self.at_end() {
            if self.peek() == '*' && self.peek_at(1) == '/' {
                self.advance();
                self.advance();
                return Ok(self.token(TokenType::Comment, text.trim(), start));
            }
            text.push(self.advance());
        }
        Err(LexerError {
            message: "Unterminated block comment".to_string(),
            span: self.span_from(start),
        })
    }

    fn token(&self, typ: TokenType, value: &str, start: (Position, usize)) -> Token {
        Token {
            typ,
            value: value.to_string(),
            span: self.span_from(start),
        }
    }

    fn mark(&self) -> (Position, usize) {
        (Position::new(self.line, self.column), self.index)
    }

    fn span_from(&self, start: (Position, usize)) -> Span {
        let (pos, offset) = start;
        Span::new(pos, offset, self.index.saturating_sub(offset).max(1))
    }

    fn at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_at(&self, distance: usize) -> char {
        self.chars.get(self.index + distance).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let ch = self.peek();
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }
}
