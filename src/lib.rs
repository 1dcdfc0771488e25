// File: src/lib.rs
//
// Library interface for the Quill interpreter.
// Exposes modules for integration testing and external use.

pub mod ast;
pub mod errors;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod repl;

pub use interpreter::{Interpreter, Value};

use errors::Diagnostic;

/// Lexes, parses, and evaluates `source` with a fresh interpreter.
/// Returns the per-statement results together with every diagnostic
/// the three stages produced.
pub fn run_source(source: &str, source_name: &str) -> (Vec<Value>, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = lexer::tokenize(source, source_name);
    let mut parser = parser::Parser::new(tokens, source_name);
    let statements = parser.parse();
    diagnostics.append(&mut parser.diagnostics);

    let mut interpreter = Interpreter::with_source(source_name);
    let results = interpreter.run(&statements);
    diagnostics.append(&mut interpreter.diagnostics);
    (results, diagnostics)
}
