// File: src/interpreter/value.rs
//
// Runtime value types for the Quill programming language. Evaluation
// produces Values; the parsed AST is never rewritten. Strings, lists and
// function definitions sit behind Arc so cloning a value is cheap;
// mutation always goes through rebinding, never through the shared
// payload.

use crate::ast::FuncDef;
use crate::interpreter::scope::{ScopeArena, ScopeId};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value: uninitialized result, valueless statement, bare `()`.
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<String>),
    List(Arc<Vec<Value>>),
    /// A type used as a value, by name (`type_of` results).
    Type(String),
    /// A scope frame used as a value (named blocks, imports).
    Scope(ScopeId),
    Func(Arc<FuncDef>),
    /// Alias to a binding; created only by the `ref` builtin and chased
    /// transparently wherever the underlying value is needed.
    Ref { scope: ScopeId, name: String },
    /// Result of a statement that failed to evaluate.
    Error,
}

impl Value {
    pub fn str(text: &str) -> Self {
        Value::Str(Arc::new(text.to_string()))
    }

    pub fn string(text: String) -> Self {
        Value::Str(Arc::new(text))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// The type-tag name of this value. Refs report "ref"; callers that
    /// care about the referent chase the alias first.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Type(_) => "type",
            Value::Scope(_) => "scope",
            Value::Func(_) => "func",
            Value::Ref { .. } => "ref",
            Value::Error => "error",
        }
    }

    /// Printable form. Needs the arena to name scopes and chase refs.
    pub fn render(&self, scopes: &ScopeArena) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => render_float(*v),
            Value::Bool(v) => v.to_string(),
            Value::Str(s) => s.as_ref().clone(),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.render(scopes)).collect();
                format!("[{}]", rendered.join(", "))
            }
            Value::Type(name) => name.clone(),
            Value::Scope(id) => format!("scope({})", scopes.name_of(*id)),
            Value::Func(def) => format!("func({})", def.name),
            Value::Ref { scope, name } => match scopes.chase(*scope, name) {
                Some(target) => target.render(scopes),
                None => "error".to_string(),
            },
            Value::Error => "error".to_string(),
        }
    }
}

/// Floats always print with a decimal point so `4 / 2` visibly stays
/// float.
pub fn render_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_floats_keep_their_decimal_point() {
        assert_eq!(render_float(2.0), "2.0");
        assert_eq!(render_float(-3.0), "-3.0");
        assert_eq!(render_float(2.5), "2.5");
    }

    #[test]
    fn list_rendering_is_recursive() {
        let scopes = ScopeArena::new();
        let v = Value::list(vec![Value::Int(1), Value::str("a"), Value::Bool(true)]);
        assert_eq!(v.render(&scopes), "[1, a, true]");
    }
}
