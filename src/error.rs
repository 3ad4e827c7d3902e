//! Error types for each phase of the pipeline.

use std::io;

use thiserror::Error;

use crate::token::{Token, TokenType};

/// Lexical problems. The scanner records these and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Unexpected character '{character}'.")]
    UnexpectedCharacter { line: usize, character: char },

    #[error("Unterminated string.")]
    UnterminatedString { line: usize },

    #[error("Unterminated block comment.")]
    UnterminatedComment { line: usize },
}

impl ScanError {
    pub fn line(&self) -> usize {
        match self {
            ScanError::UnexpectedCharacter { line, .. }
            | ScanError::UnterminatedString { line }
            | ScanError::UnterminatedComment { line } => *line,
        }
    }
}

/// Syntax error raised at the offending token.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} ({})", location(.token))]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl ParseError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        ParseError {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn line(&self) -> usize {
        self.token.line
    }

    /// Nothing is left to resynchronize on once the error sits at the end
    /// of input.
    pub fn at_end(&self) -> bool {
        self.token.kind == TokenType::Eof
    }
}

fn location(token: &Token) -> String {
    if token.kind == TokenType::Eof {
        "at end".to_string()
    } else {
        format!("at '{}'", token.lexeme)
    }
}

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Undefined variable '{}'.", .token.lexeme)]
    UndefinedVariable { token: Token },

    #[error("{message}")]
    Type { token: Token, message: String },

    #[error("Can only call functions, not {type_name}.")]
    NotCallable { token: Token, type_name: &'static str },

    #[error("Expected {expected} arguments but got {got}.")]
    Arity {
        token: Token,
        expected: usize,
        got: usize,
    },

    #[error("Can't return from top-level code.")]
    ReturnOutsideFunction { token: Token },

    #[error("Stack overflow.")]
    StackOverflow { token: Token },

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl RuntimeError {
    pub fn undefined(token: &Token) -> Self {
        RuntimeError::UndefinedVariable {
            token: token.clone(),
        }
    }

    pub fn type_error(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError::Type {
            token: token.clone(),
            message: message.into(),
        }
    }

    /// Source line of the token the error is bound to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            RuntimeError::UndefinedVariable { token }
            | RuntimeError::Type { token, .. }
            | RuntimeError::NotCallable { token, .. }
            | RuntimeError::Arity { token, .. }
            | RuntimeError::ReturnOutsideFunction { token }
            | RuntimeError::StackOverflow { token } => Some(token.line),
            RuntimeError::Output(_) => None,
        }
    }
}
