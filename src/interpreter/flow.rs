// File: src/interpreter/flow.rs
//
// Control signals threaded through statement execution.

use crate::interpreter::value::Value;

/// Outcome of executing one statement. `Break` is caught by the nearest
/// enclosing loop; `BreakAll` unwinds every enclosing loop and is
/// absorbed at the program root; `Return` unwinds to the enclosing call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Break,
    BreakAll,
    Return(Value),
}

/// Marker for an evaluation error. The diagnostic is already recorded by
/// the time this is raised; it only unwinds the current statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalHalt;
