//! # lira
//!
//! A tree-walking interpreter for Lira, a small dynamically typed scripting
//! language.
//!
//! Source text flows one way through the pipeline:
//!
//! ```text
//! &str ─► Scanner ─► Vec<Token> ─► Parser ─► Vec<Stmt> ─► Interpreter ─► output
//! ```
//!
//! Scan and parse errors are recovered from and reported; the statements
//! that did parse still run. The first runtime error stops execution.

pub mod ast;
pub mod callable;
pub mod diagnostic;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod scanner;
pub mod token;
pub mod value;

use std::io::Write;

use tracing::debug;

use crate::ast::Stmt;

pub use diagnostic::{Diagnostic, Diagnostics, Phase};
pub use error::{ParseError, RuntimeError, ScanError};
pub use interpreter::Interpreter;
pub use parser::Parser;
pub use scanner::Scanner;
pub use value::Value;

/// Scans, parses and runs `source`, writing `print` output to `out`.
///
/// Returns every diagnostic produced along the way. An empty result means
/// the program ran to completion without errors.
pub fn run(source: &str, out: &mut dyn Write) -> Diagnostics {
    let (statements, mut diagnostics) = compile(source);

    let mut interpreter = Interpreter::new(out);
    if let Err(error) = interpreter.interpret(&statements) {
        debug!(%error, "execution halted");
        diagnostics.push(Diagnostic::from(&error));
    }

    diagnostics
}

/// Scans and parses `source` without running it. Returns the statements
/// that parsed together with the scan and parse diagnostics.
pub fn compile(source: &str) -> (Vec<Stmt>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();

    let mut scanner = Scanner::new(source);
    let tokens = scanner.scan_tokens();
    for error in scanner.errors() {
        diagnostics.push(Diagnostic::from(error));
    }

    let mut parser = Parser::new(tokens);
    let statements = parser.parse();
    for error in parser.errors() {
        diagnostics.push(Diagnostic::from(error));
    }

    (statements, diagnostics)
}
