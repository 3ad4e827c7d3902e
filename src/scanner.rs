use tracing::{debug, trace};

use crate::error::ScanError;
use crate::token::{keyword, Literal, Token, TokenType};

pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: usize,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Scans the whole source. Always succeeds: malformed input is skipped
    /// and recorded in [`Scanner::errors`]. The returned list ends with `Eof`.
    pub fn scan_tokens(&mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::eof(self.line));
        debug!(
            tokens = self.tokens.len(),
            errors = self.errors.len(),
            "scan finished"
        );

        std::mem::take(&mut self.tokens)
    }

    pub fn errors(&self) -> &[ScanError] {
        &self.errors
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '!' => {
                let kind = if self.match_char('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(kind);
            }
            '/' => {
                if self.match_char('/') {
                    self.line_comment();
                } else if self.match_char('*') {
                    self.block_comment();
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            '0'..='9' => self.number(),
            'a'..='z' | 'A'..='Z' | '_' => self.identifier(),
            '"' => self.string(),
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            _ => {
                trace!(line = self.line, character = %c, "skipping unexpected character");
                self.errors.push(ScanError::UnexpectedCharacter {
                    line: self.line,
                    character: c,
                });
            }
        }
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += c.len_utf8();
        c
    }

    fn add_token(&mut self, kind: TokenType) {
        self.add_token_with_literal(kind, None);
    }

    fn add_token_with_literal(&mut self, kind: TokenType, literal: Option<Literal>) {
        let lexeme = &self.source[self.start..self.current];
        self.tokens.push(Token {
            kind,
            lexeme: lexeme.to_string(),
            literal,
            line: self.line,
        });
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }

        self.advance();
        true
    }

    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn line_comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }

    // Block comments do not nest: the first `*/` closes the comment.
    fn block_comment(&mut self) {
        let opened_at = self.line;

        while !(self.peek() == '*' && self.peek_next() == '/') && !self.is_at_end() {
            if self.advance() == '\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            self.errors
                .push(ScanError::UnterminatedComment { line: opened_at });
            return;
        }

        self.advance();
        self.advance();
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme = &self.source[self.start..self.current];
        match lexeme.parse::<f64>() {
            Ok(value) => {
                self.add_token_with_literal(TokenType::Number, Some(Literal::Number(value)))
            }
            Err(_) => self.errors.push(ScanError::UnexpectedCharacter {
                line: self.line,
                character: self.source[self.start..].chars().next().unwrap_or('\0'),
            }),
        }
    }

    fn string(&mut self) {
        let opened_at = self.line;

        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.errors
                .push(ScanError::UnterminatedString { line: opened_at });
            return;
        }

        // closing quote
        self.advance();

        let value = &self.source[self.start + 1..self.current - 1];
        self.add_token_with_literal(TokenType::String, Some(Literal::String(value.to_string())));
    }

    fn identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let kind = keyword(text).unwrap_or(TokenType::Identifier);
        let literal = match kind {
            TokenType::True => Some(Literal::Boolean(true)),
            TokenType::False => Some(Literal::Boolean(false)),
            TokenType::Nil => Some(Literal::Nil),
            _ => None,
        };
        self.add_token_with_literal(kind, literal);
    }
}

/// Convenience wrapper that scans `source` and drops the error list.
pub fn scan(source: &str) -> Vec<Token> {
    Scanner::new(source).scan_tokens()
}
