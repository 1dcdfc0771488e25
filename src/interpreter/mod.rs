// File: src/interpreter/mod.rs
//
// Tree-walking evaluator for the Quill programming language. Executes
// the immutable AST the parser produced: expressions evaluate to Values,
// statements yield Flow signals, and every error is recorded as a
// diagnostic while evaluation continues with the next independent
// statement.
//
// Scope discipline: blocks and calls open frames in the ScopeArena;
// anonymous frames are discarded on exit, named frames stay reachable
// through `::`. Calls are by-value: arguments are snapshot into a fresh
// frame and the caller's bindings are never touched.

pub mod flow;
pub mod scope;
pub mod value;

pub use flow::{EvalHalt, Flow};
pub use scope::{Binding, ScopeArena, ScopeId};
pub use value::Value;

use crate::ast::{FuncDef, IfBranch, Kind, Node};
use crate::errors::{find_closest_match, Diagnostic, SourceLocation, Stage};
use crate::interpreter::value::render_float;
use crate::lexer;
use crate::parser::Parser;
use std::path::Path;
use std::sync::{Arc, Mutex};

type ExecResult = Result<Flow, EvalHalt>;
type EvalResult = Result<Value, EvalHalt>;

/// Builtins are resolved before user functions and cannot be shadowed.
const BUILTINS: &[&str] = &["print", "type_of", "str", "ref", "import"];

pub struct Interpreter {
    pub scopes: ScopeArena,
    current: ScopeId,
    pub diagnostics: Vec<Diagnostic>,
    source: String,
    output: Option<Arc<Mutex<Vec<u8>>>>,
    depth: usize,
    max_depth: usize,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_source("<main>")
    }

    pub fn with_source(source_name: &str) -> Self {
        let scopes = ScopeArena::new();
        let current = scopes.global();
        Interpreter {
            scopes,
            current,
            diagnostics: Vec::new(),
            source: source_name.to_string(),
            output: None,
            depth: 0,
            max_depth: 200,
        }
    }

    /// Routes `print` into a buffer instead of stdout.
    pub fn set_output(&mut self, output: Arc<Mutex<Vec<u8>>>) {
        self.output = Some(output);
    }

    /// Executes top-level statements in order. Each statement yields one
    /// result value; a halted statement yields Error and later
    /// statements still run. Stray control signals are absorbed here.
    pub fn run(&mut self, statements: &[Node]) -> Vec<Value> {
        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            let value = match self.exec(statement) {
                Ok(Flow::Normal(value)) => value,
                Ok(Flow::Return(value)) => value,
                Ok(Flow::Break) | Ok(Flow::BreakAll) => Value::Empty,
                Err(EvalHalt) => Value::Error,
            };
            results.push(value);
        }
        results
    }

    /// Value of `name` as seen from the current scope (tests, REPL).
    pub fn get(&self, name: &str) -> Option<Value> {
        self.scopes
            .lookup(self.current, name)
            .map(|(scope, index)| self.scopes.value(scope, index).clone())
    }

    /// Declared type tag of `name` as seen from the current scope.
    pub fn get_type(&self, name: &str) -> Option<String> {
        self.scopes
            .lookup(self.current, name)
            .map(|(scope, index)| self.scopes.binding(scope, index).ty.clone())
    }

    /// Global bindings in declaration order (REPL `:vars`).
    pub fn globals(&self) -> &[Binding] {
        &self.scopes.frame(self.scopes.global()).bindings
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    // ----- diagnostics -----

    fn error_at(&mut self, node: &Node, message: String) {
        self.diagnostics.push(Diagnostic::error(
            Stage::Eval,
            &self.source,
            SourceLocation::new(node.line, node.column),
            message,
        ));
    }

    fn warn_at(&mut self, node: &Node, message: String) {
        self.diagnostics.push(Diagnostic::warning(
            Stage::Eval,
            &self.source,
            SourceLocation::new(node.line, node.column),
            message,
        ));
    }

    fn write_output(&mut self, text: &str) {
        if let Some(output) = &self.output {
            if let Ok(mut buffer) = output.lock() {
                buffer.extend_from_slice(text.as_bytes());
            }
        } else {
            print!("{}", text);
        }
    }

    // ----- statement execution -----

    fn exec(&mut self, node: &Node) -> ExecResult {
        if self.depth >= self.max_depth {
            self.error_at(node, "Recursion limit exceeded.".to_string());
            return Err(EvalHalt);
        }
        self.depth += 1;
        let result = self.exec_inner(node);
        self.depth -= 1;
        result
    }

    fn exec_inner(&mut self, node: &Node) -> ExecResult {
        match &node.kind {
            Kind::Block { name, body } => self.exec_block(name.as_ref(), body),
            Kind::While { cond, body } => self.exec_while(cond, body),
            Kind::If { branches } => self.exec_if(branches),
            Kind::Return(value) => {
                let value = match value {
                    Some(expr) => {
                        let value = self.eval(expr)?;
                        self.deref_value(value, expr)?
                    }
                    None => Value::Empty,
                };
                Ok(Flow::Return(value))
            }
            Kind::Break => Ok(Flow::Break),
            Kind::BreakAll => Ok(Flow::BreakAll),
            Kind::FuncDef(def) => {
                self.scopes.define(
                    self.current,
                    &def.name,
                    "func",
                    Value::Func(Arc::new(def.clone())),
                );
                Ok(Flow::Normal(Value::Empty))
            }
            Kind::TypeDef { name, body } => self.exec_type_def(name, body),
            Kind::Assign => {
                self.eval_assign(node)?;
                Ok(Flow::Normal(Value::Empty))
            }
            // Poisoned by the parser; already reported.
            Kind::Error => Ok(Flow::Normal(Value::Error)),
            _ => Ok(Flow::Normal(self.eval(node)?)),
        }
    }

    /// Runs a statement list. A halted statement is already recorded and
    /// does not stop its siblings; the first control signal does.
    fn exec_body(&mut self, body: &[Node]) -> ExecResult {
        for statement in body {
            match self.exec(statement) {
                Ok(Flow::Normal(_)) => {}
                Ok(signal) => return Ok(signal),
                Err(EvalHalt) => {}
            }
        }
        Ok(Flow::Normal(Value::Empty))
    }

    fn exec_block(&mut self, name: Option<&String>, body: &[Node]) -> ExecResult {
        let scope = self.scopes.new_scope(self.current, name.cloned());
        self.current = scope;
        let flow = self.exec_body(body);
        if let Some(parent) = self.scopes.exit_scope(scope) {
            self.current = parent;
        }
        flow
    }

    fn exec_type_def(&mut self, name: &str, body: &[Node]) -> ExecResult {
        self.scopes.register_type(self.current, name);
        self.exec_block(Some(&name.to_string()), body)
    }

    fn exec_while(&mut self, cond: &Node, body: &[Node]) -> ExecResult {
        loop {
            let value = self.eval(cond)?;
            let value = self.deref_value(value, cond)?;
            let keep_going = match value {
                Value::Bool(b) => b,
                _ => {
                    self.error_at(cond, "Condition must be a bool.".to_string());
                    return Err(EvalHalt);
                }
            };
            if !keep_going {
                return Ok(Flow::Normal(Value::Empty));
            }
            // Fresh anonymous frame per iteration: body declarations do
            // not leak into the next pass or past the loop.
            let scope = self.scopes.new_scope(self.current, None);
            self.current = scope;
            let flow = self.exec_body(body);
            if let Some(parent) = self.scopes.exit_scope(scope) {
                self.current = parent;
            }
            match flow? {
                Flow::Normal(_) => {}
                // A plain break stops this loop only.
                Flow::Break => return Ok(Flow::Normal(Value::Empty)),
                Flow::BreakAll => return Ok(Flow::BreakAll),
                Flow::Return(value) => return Ok(Flow::Return(value)),
            }
        }
    }

    fn exec_if(&mut self, branches: &[IfBranch]) -> ExecResult {
        for branch in branches {
            let taken = match &branch.cond {
                None => true,
                Some(cond) => {
                    let value = self.eval(cond)?;
                    let value = self.deref_value(value, cond)?;
                    match value {
                        Value::Bool(b) => b,
                        _ => {
                            self.error_at(cond, "Condition must be a bool.".to_string());
                            return Err(EvalHalt);
                        }
                    }
                }
            };
            if taken {
                // First matching branch runs to completion, then the
                // chain stops.
                return self.exec_body(&branch.body);
            }
        }
        Ok(Flow::Normal(Value::Empty))
    }

    // ----- expression evaluation -----

    fn eval(&mut self, node: &Node) -> EvalResult {
        if self.depth >= self.max_depth {
            self.error_at(node, "Recursion limit exceeded.".to_string());
            return Err(EvalHalt);
        }
        self.depth += 1;
        let result = self.eval_inner(node);
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, node: &Node) -> EvalResult {
        match &node.kind {
            Kind::Empty => Ok(Value::Empty),
            Kind::Error => Err(EvalHalt),
            Kind::Int(v) => Ok(Value::Int(*v)),
            Kind::Float(v) => Ok(Value::Float(*v)),
            Kind::Bool(v) => Ok(Value::Bool(*v)),
            Kind::Str(s) => Ok(Value::str(s)),
            Kind::Ident(name) => self.eval_ident(node, name),
            Kind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(item)?;
                    values.push(self.deref_value(value, item)?);
                }
                Ok(Value::list(values))
            }
            Kind::Plus => self.eval_binary(node, "+"),
            Kind::Minus => self.eval_binary(node, "-"),
            Kind::Star => self.eval_binary(node, "*"),
            Kind::Slash => self.eval_binary(node, "/"),
            Kind::EqEq => self.eval_binary(node, "=="),
            Kind::NotEq => self.eval_binary(node, "!="),
            Kind::Pos => self.eval_unary(node, "+"),
            Kind::Neg => self.eval_unary(node, "-"),
            Kind::ScopeAccess => self.eval_scope_access(node),
            Kind::Call { name, args } => self.eval_call(node, name, args),
            Kind::Assign => {
                self.eval_assign(node)?;
                Ok(Value::Empty)
            }
            Kind::Block { .. }
            | Kind::If { .. }
            | Kind::While { .. }
            | Kind::Return(_)
            | Kind::Break
            | Kind::BreakAll
            | Kind::FuncDef(_)
            | Kind::TypeDef { .. }
            | Kind::EndOfExpr => {
                self.error_at(node, "Cannot use a statement inside an expression.".to_string());
                Err(EvalHalt)
            }
        }
    }

    fn eval_ident(&mut self, node: &Node, name: &str) -> EvalResult {
        match self.scopes.lookup(self.current, name) {
            Some((scope, index)) => Ok(self.scopes.value(scope, index).clone()),
            // Recognized type names used as values resolve to the type
            // itself, so `type_of(x) == int` works.
            None if self.scopes.lookup_type_name(self.current, name) => {
                Ok(Value::Type(name.to_string()))
            }
            None => {
                let visible = self.scopes.visible_names(self.current);
                let message = match find_closest_match(name, &visible) {
                    Some(suggestion) => format!(
                        "Variable '{}' is not defined. Did you mean '{}'?",
                        name, suggestion
                    ),
                    None => format!("Variable '{}' is not defined.", name),
                };
                self.error_at(node, message);
                Err(EvalHalt)
            }
        }
    }

    /// Chases a Ref value to its current target.
    fn deref_value(&mut self, value: Value, node: &Node) -> EvalResult {
        match value {
            Value::Ref { scope, name } => match self.scopes.chase(scope, &name) {
                Some(target) => Ok(target),
                None => {
                    self.error_at(
                        node,
                        format!("Reference target '{}' no longer exists.", name),
                    );
                    Err(EvalHalt)
                }
            },
            other => Ok(other),
        }
    }

    fn eval_operand(&mut self, parent: &Node, child: &Option<Box<Node>>, sym: &str) -> EvalResult {
        match child {
            Some(node) => {
                let value = self.eval(node)?;
                self.deref_value(value, node)
            }
            None => {
                self.error_at(parent, format!("Malformed '{}' statement.", sym));
                Err(EvalHalt)
            }
        }
    }

    fn eval_binary(&mut self, node: &Node, sym: &'static str) -> EvalResult {
        let left = self.eval_operand(node, &node.left, sym)?;
        let right = self.eval_operand(node, &node.right, sym)?;
        let result = match sym {
            "+" => ops::add(&left, &right),
            "-" => ops::sub(&left, &right),
            "*" => ops::mul(&left, &right),
            "/" => ops::div(&left, &right),
            "==" => Ok(Value::Bool(ops::value_eq(&left, &right).unwrap_or(false))),
            _ => Ok(Value::Bool(!ops::value_eq(&left, &right).unwrap_or(false))),
        };
        match result {
            Ok(value) => Ok(value),
            Err(ops::OpError::Message(message)) => {
                self.error_at(node, message);
                Err(EvalHalt)
            }
            Err(ops::OpError::Mismatch) => {
                self.error_at(
                    node,
                    format!(
                        "Cannot perform '{}' on '{}' and '{}'.",
                        sym,
                        left.type_name(),
                        right.type_name()
                    ),
                );
                Err(EvalHalt)
            }
        }
    }

    fn eval_unary(&mut self, node: &Node, sym: &'static str) -> EvalResult {
        let operand = self.eval_operand(node, &node.right, sym)?;
        let result = if sym == "-" {
            ops::neg(&operand)
        } else {
            ops::pos(&operand)
        };
        match result {
            Ok(value) => Ok(value),
            Err(ops::OpError::Message(message)) => {
                self.error_at(node, message);
                Err(EvalHalt)
            }
            Err(ops::OpError::Mismatch) => {
                self.error_at(
                    node,
                    format!("Cannot perform '{}' on '{}'.", sym, operand.type_name()),
                );
                Err(EvalHalt)
            }
        }
    }

    // ----- scope-qualified access -----

    /// Resolves an expression that must denote a scope.
    fn resolve_scope(&mut self, node: &Node) -> Result<ScopeId, EvalHalt> {
        match &node.kind {
            Kind::Ident(name) => {
                let found = self.scopes.lookup(self.current, name);
                let value = found.map(|(scope, index)| self.scopes.value(scope, index).clone());
                let value = match value {
                    Some(value) => self.deref_value(value, node)?,
                    None => {
                        self.error_at(
                            node,
                            format!("Scope '{}' is not defined in current or outer scopes.", name),
                        );
                        return Err(EvalHalt);
                    }
                };
                match value {
                    Value::Scope(id) => Ok(id),
                    _ => {
                        self.error_at(node, format!("'{}' is not a scope.", name));
                        Err(EvalHalt)
                    }
                }
            }
            Kind::ScopeAccess => {
                let (scope, name) = self.resolve_place(node)?;
                match self.scopes.lookup_local(scope, &name) {
                    Some(index) => {
                        let value = self.scopes.value(scope, index).clone();
                        match self.deref_value(value, node)? {
                            Value::Scope(id) => Ok(id),
                            _ => {
                                self.error_at(node, format!("'{}' is not a scope.", name));
                                Err(EvalHalt)
                            }
                        }
                    }
                    None => {
                        let message = format!(
                            "'{}' is not defined in scope '{}'.",
                            name,
                            self.scopes.name_of(scope)
                        );
                        self.error_at(node, message);
                        Err(EvalHalt)
                    }
                }
            }
            Kind::Call { name, args } => {
                let value = self.eval_call(node, name, args)?;
                match self.deref_value(value, node)? {
                    Value::Scope(id) => Ok(id),
                    _ => {
                        self.error_at(node, format!("Call to '{}' does not yield a scope.", name));
                        Err(EvalHalt)
                    }
                }
            }
            _ => {
                self.error_at(node, "Expression does not yield a scope.".to_string());
                Err(EvalHalt)
            }
        }
    }

    /// Resolves a `::` node to (frame, member name) without requiring
    /// the member to exist.
    fn resolve_place(&mut self, node: &Node) -> Result<(ScopeId, String), EvalHalt> {
        let left = match &node.left {
            Some(left) => left.clone(),
            None => {
                self.error_at(node, "Malformed '::' statement.".to_string());
                return Err(EvalHalt);
            }
        };
        let scope = self.resolve_scope(&left)?;
        match node.right.as_deref() {
            Some(Node { kind: Kind::Ident(name), .. }) => Ok((scope, name.clone())),
            _ => {
                self.error_at(node, "Scope access expects a name on the right.".to_string());
                Err(EvalHalt)
            }
        }
    }

    fn eval_scope_access(&mut self, node: &Node) -> EvalResult {
        let (scope, name) = self.resolve_place(node)?;
        match self.scopes.lookup_local(scope, &name) {
            Some(index) => Ok(self.scopes.value(scope, index).clone()),
            None => {
                let message = format!(
                    "'{}' is not defined in scope '{}'.",
                    name,
                    self.scopes.name_of(scope)
                );
                self.error_at(node, message);
                Err(EvalHalt)
            }
        }
    }

    // ----- assignment -----

    fn eval_assign(&mut self, node: &Node) -> Result<(), EvalHalt> {
        let rhs = match &node.right {
            Some(rhs) => rhs.clone(),
            None => {
                self.error_at(node, "Malformed '=' statement.".to_string());
                return Err(EvalHalt);
            }
        };
        let value = self.eval(&rhs)?;

        let target = match &node.left {
            Some(target) => target.clone(),
            None => {
                self.error_at(node, "Malformed '=' statement.".to_string());
                return Err(EvalHalt);
            }
        };

        match &target.kind {
            Kind::Ident(name) => match self.scopes.lookup(self.current, name) {
                Some((scope, index)) => self.assign_binding(scope, index, value, node),
                None => {
                    let ty = self.infer_type(&value);
                    self.scopes.define(self.current, name, &ty, value);
                    Ok(())
                }
            },
            Kind::ScopeAccess => {
                let (scope, name) = self.resolve_place(&target)?;
                match self.scopes.lookup_local(scope, &name) {
                    Some(index) => self.assign_binding(scope, index, value, node),
                    None => {
                        // Foreign scopes never auto-declare.
                        let message = format!(
                            "'{}' is not defined in scope '{}'.",
                            name,
                            self.scopes.name_of(scope)
                        );
                        self.error_at(node, message);
                        Err(EvalHalt)
                    }
                }
            }
            _ => {
                self.error_at(node, "Invalid assignment target.".to_string());
                Err(EvalHalt)
            }
        }
    }

    fn assign_binding(
        &mut self,
        scope: ScopeId,
        index: usize,
        value: Value,
        node: &Node,
    ) -> Result<(), EvalHalt> {
        let value_ty = self.infer_type(&value);
        let binding_ty = self.scopes.binding(scope, index).ty.clone();

        if value_ty == binding_ty || binding_ty == "any" {
            self.scopes.set_value(scope, index, value);
            return Ok(());
        }

        // Casting needs the concrete value, not an alias to it.
        let value = self.deref_value(value, node)?;
        match ops::cast_class(&value_ty, &binding_ty) {
            ops::CastClass::Lossless => {
                self.scopes
                    .set_value(scope, index, ops::convert(&value, &binding_ty));
                Ok(())
            }
            ops::CastClass::Lossy => {
                self.warn_at(
                    node,
                    format!(
                        "Potential data loss casting '{}' to '{}'.",
                        value_ty, binding_ty
                    ),
                );
                self.scopes
                    .set_value(scope, index, ops::convert(&value, &binding_ty));
                Ok(())
            }
            ops::CastClass::Illegal => {
                self.error_at(
                    node,
                    format!(
                        "Cannot assign value of type '{}' to variable of type '{}'.",
                        value_ty, binding_ty
                    ),
                );
                Err(EvalHalt)
            }
        }
    }

    /// Type tag of a value; refs report their referent's tag.
    fn infer_type(&self, value: &Value) -> String {
        match value {
            Value::Ref { scope, name } => self
                .scopes
                .chase(*scope, name)
                .map(|target| target.type_name().to_string())
                .unwrap_or_else(|| "error".to_string()),
            other => other.type_name().to_string(),
        }
    }

    // ----- calls -----

    fn eval_call(&mut self, node: &Node, name: &str, args: &[Node]) -> EvalResult {
        if BUILTINS.contains(&name) {
            return self.eval_builtin(node, name, args);
        }

        let callee = match self.scopes.lookup(self.current, name) {
            Some((scope, index)) => self.scopes.value(scope, index).clone(),
            None => {
                self.error_at(node, format!("Function '{}' is not defined.", name));
                return Err(EvalHalt);
            }
        };
        let callee = self.deref_value(callee, node)?;
        let def: Arc<FuncDef> = match callee {
            Value::Func(def) => def,
            other => {
                self.error_at(
                    node,
                    format!(
                        "'{}' is not a function, it is of type '{}'.",
                        name,
                        other.type_name()
                    ),
                );
                return Err(EvalHalt);
            }
        };

        // Arguments evaluate in the caller's scope, snapshot by value.
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval(arg)?;
            arg_values.push(self.deref_value(value, arg)?);
        }

        if arg_values.len() != def.params.len() {
            self.error_at(
                node,
                format!("Function '{}' expects {} argument(s).", name, def.params.len()),
            );
            return Err(EvalHalt);
        }

        let scope = self.scopes.new_scope(self.current, None);
        self.current = scope;
        for (param, value) in def.params.iter().zip(arg_values) {
            let ty = self.infer_type(&value);
            self.scopes.define(scope, param, &ty, value);
        }

        let mut result = Value::Empty;
        for statement in &def.body {
            match self.exec(statement) {
                Ok(Flow::Normal(_)) => {}
                Ok(Flow::Return(value)) => {
                    result = value;
                    break;
                }
                // Loop signals never escape a call.
                Ok(Flow::Break) | Ok(Flow::BreakAll) => break,
                Err(EvalHalt) => {}
            }
        }

        if let Some(parent) = self.scopes.exit_scope(scope) {
            self.current = parent;
        }
        Ok(result)
    }

    // ----- builtins -----

    fn eval_builtin(&mut self, node: &Node, name: &str, args: &[Node]) -> EvalResult {
        match name {
            "print" => self.builtin_print(args),
            "type_of" => self.builtin_type_of(node, args),
            "str" => self.builtin_str(node, args),
            "ref" => self.builtin_ref(node, args),
            _ => self.builtin_import(node, args),
        }
    }

    fn check_arity(
        &mut self,
        node: &Node,
        name: &str,
        args: &[Node],
        arity: usize,
    ) -> Result<(), EvalHalt> {
        if args.len() != arity {
            self.error_at(
                node,
                format!("Function '{}' expects {} argument(s).", name, arity),
            );
            return Err(EvalHalt);
        }
        Ok(())
    }

    fn builtin_print(&mut self, args: &[Node]) -> EvalResult {
        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval(arg)?;
            let value = self.deref_value(value, arg)?;
            rendered.push(value.render(&self.scopes));
        }
        let mut line = rendered.join(" ");
        line.push('\n');
        self.write_output(&line);
        Ok(Value::Empty)
    }

    fn builtin_type_of(&mut self, node: &Node, args: &[Node]) -> EvalResult {
        self.check_arity(node, "type_of", args, 1)?;
        let value = self.eval(&args[0])?;
        let value = self.deref_value(value, &args[0])?;
        Ok(Value::Type(self.infer_type(&value)))
    }

    fn builtin_str(&mut self, node: &Node, args: &[Node]) -> EvalResult {
        self.check_arity(node, "str", args, 1)?;
        let value = self.eval(&args[0])?;
        let value = self.deref_value(value, &args[0])?;
        match value {
            Value::Int(v) => Ok(Value::string(v.to_string())),
            Value::Float(v) => Ok(Value::string(render_float(v))),
            Value::Bool(v) => Ok(Value::string(v.to_string())),
            Value::Str(_) => Ok(value),
            Value::Type(name) => Ok(Value::string(name)),
            other => {
                self.error_at(
                    node,
                    format!("Cannot convert '{}' to string.", other.type_name()),
                );
                Err(EvalHalt)
            }
        }
    }

    /// `ref(x)` aliases a binding; only identifiers and `::` paths name
    /// a binding.
    fn builtin_ref(&mut self, node: &Node, args: &[Node]) -> EvalResult {
        self.check_arity(node, "ref", args, 1)?;
        let target = &args[0];
        match &target.kind {
            Kind::Ident(name) => match self.scopes.lookup(self.current, name) {
                Some((scope, _)) => Ok(Value::Ref { scope, name: name.clone() }),
                None => {
                    let message = format!("Variable '{}' is not defined.", name);
                    self.error_at(target, message);
                    Err(EvalHalt)
                }
            },
            Kind::ScopeAccess => {
                let target = target.clone();
                let (scope, name) = self.resolve_place(&target)?;
                if self.scopes.lookup_local(scope, &name).is_some() {
                    Ok(Value::Ref { scope, name })
                } else {
                    let message = format!(
                        "'{}' is not defined in scope '{}'.",
                        name,
                        self.scopes.name_of(scope)
                    );
                    self.error_at(&target, message);
                    Err(EvalHalt)
                }
            }
            _ => {
                self.error_at(node, "ref() expects a variable.".to_string());
                Err(EvalHalt)
            }
        }
    }

    /// Evaluates another source file in a fresh interpreter and splices
    /// its global scope in as a named scope value. Failures abort only
    /// this call.
    fn builtin_import(&mut self, node: &Node, args: &[Node]) -> EvalResult {
        self.check_arity(node, "import", args, 1)?;
        let value = self.eval(&args[0])?;
        let value = self.deref_value(value, &args[0])?;
        let path = match value {
            Value::Str(path) => path,
            other => {
                self.error_at(
                    node,
                    format!(
                        "import() expects a file path string, not '{}'.",
                        other.type_name()
                    ),
                );
                return Err(EvalHalt);
            }
        };

        let source = match std::fs::read_to_string(path.as_ref()) {
            Ok(source) => source,
            Err(_) => {
                self.error_at(node, format!("Cannot open file '{}'.", path));
                return Err(EvalHalt);
            }
        };
        if source.trim().is_empty() {
            self.error_at(node, "Cannot import empty file.".to_string());
            return Err(EvalHalt);
        }

        let (tokens, lex_diagnostics) = lexer::tokenize(&source, &path);
        self.diagnostics.extend(lex_diagnostics);
        let mut parser = Parser::new(tokens, &path);
        let statements = parser.parse();
        self.diagnostics.append(&mut parser.diagnostics);

        let mut nested = Interpreter::with_source(&path);
        if let Some(output) = &self.output {
            nested.output = Some(output.clone());
        }
        nested.run(&statements);
        self.diagnostics.append(&mut nested.diagnostics);

        let stem = Path::new(path.as_ref())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import".to_string());
        let id = self
            .scopes
            .adopt(&nested.scopes, nested.scopes.global(), None, Some(stem));
        Ok(Value::Scope(id))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Operator and cast tables. Free functions so the dispatch in
/// eval_binary stays a straight lookup.
mod ops {
    use super::Value;

    #[derive(Debug)]
    pub enum OpError {
        /// No table entry for this kind pair; the caller formats the
        /// generic mismatch message.
        Mismatch,
        /// A table entry exists but the operation failed.
        Message(String),
    }

    enum Num {
        Int(i64),
        Float(f64),
    }

    /// Bools participate in arithmetic as 0/1.
    fn as_num(value: &Value) -> Option<Num> {
        match value {
            Value::Int(v) => Some(Num::Int(*v)),
            Value::Float(v) => Some(Num::Float(*v)),
            Value::Bool(b) => Some(Num::Int(*b as i64)),
            _ => None,
        }
    }

    fn num_result(
        a: Num,
        b: Num,
        int_op: fn(i64, i64) -> i64,
        float_op: fn(f64, f64) -> f64,
    ) -> Value {
        match (a, b) {
            (Num::Int(x), Num::Int(y)) => Value::Int(int_op(x, y)),
            (Num::Int(x), Num::Float(y)) => Value::Float(float_op(x as f64, y)),
            (Num::Float(x), Num::Int(y)) => Value::Float(float_op(x, y as f64)),
            (Num::Float(x), Num::Float(y)) => Value::Float(float_op(x, y)),
        }
    }

    pub fn add(left: &Value, right: &Value) -> Result<Value, OpError> {
        if let (Some(a), Some(b)) = (as_num(left), as_num(right)) {
            return Ok(num_result(a, b, i64::wrapping_add, |x, y| x + y));
        }
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::string(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.as_ref().clone();
                items.extend(b.iter().cloned());
                Ok(Value::list(items))
            }
            _ => Err(OpError::Mismatch),
        }
    }

    pub fn sub(left: &Value, right: &Value) -> Result<Value, OpError> {
        if let (Some(a), Some(b)) = (as_num(left), as_num(right)) {
            return Ok(num_result(a, b, i64::wrapping_sub, |x, y| x - y));
        }
        match (left, right) {
            // n - "text" drops the first n characters.
            (Value::Int(n), Value::Str(s)) => {
                let len = s.chars().count();
                if *n < 0 || *n as usize > len {
                    Err(OpError::Message(format!(
                        "Cannot remove {} characters from a string of length {}.",
                        n, len
                    )))
                } else {
                    Ok(Value::string(s.chars().skip(*n as usize).collect()))
                }
            }
            // "text" - n drops the last n characters.
            (Value::Str(s), Value::Int(n)) => {
                let len = s.chars().count();
                if *n < 0 || *n as usize > len {
                    Err(OpError::Message(format!(
                        "Cannot remove {} characters from a string of length {}.",
                        n, len
                    )))
                } else {
                    Ok(Value::string(s.chars().take(len - *n as usize).collect()))
                }
            }
            _ => Err(OpError::Mismatch),
        }
    }

    pub fn mul(left: &Value, right: &Value) -> Result<Value, OpError> {
        if let (Some(a), Some(b)) = (as_num(left), as_num(right)) {
            return Ok(num_result(a, b, i64::wrapping_mul, |x, y| x * y));
        }
        match (left, right) {
            // Repetition keeps element order: 2 * [a, b] = [a, b, a, b].
            (Value::Int(n), Value::List(items)) | (Value::List(items), Value::Int(n)) => {
                let count = (*n).max(0) as usize;
                let mut out = Vec::with_capacity(count * items.len());
                for _ in 0..count {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::list(out))
            }
            (Value::Int(n), Value::Str(s)) | (Value::Str(s), Value::Int(n)) => {
                Ok(Value::string(s.repeat((*n).max(0) as usize)))
            }
            _ => Err(OpError::Mismatch),
        }
    }

    pub fn div(left: &Value, right: &Value) -> Result<Value, OpError> {
        match (left, right) {
            // int/int always promotes to float.
            (Value::Int(a), Value::Int(b)) => Ok(Value::Float(*a as f64 / *b as f64)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 / b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a / *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            (Value::Int(a), Value::Bool(b)) => Ok(Value::Float(*a as f64 / (*b as i64) as f64)),
            (Value::Float(a), Value::Bool(b)) => Ok(Value::Float(a / (*b as i64) as f64)),
            (Value::Bool(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(OpError::Message("Division by zero.".to_string()))
                } else {
                    Ok(Value::Int(*a as i64 / b))
                }
            }
            (Value::Bool(a), Value::Float(b)) => Ok(Value::Float((*a as i64) as f64 / b)),
            (Value::Bool(a), Value::Bool(b)) => {
                if !b {
                    Err(OpError::Message("Division by zero.".to_string()))
                } else {
                    Ok(Value::Int(*a as i64))
                }
            }
            _ => Err(OpError::Mismatch),
        }
    }

    pub fn neg(value: &Value) -> Result<Value, OpError> {
        match value {
            Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
            Value::Str(s) => Ok(Value::string(s.chars().rev().collect::<String>())),
            // Historical behavior, pinned: the reversal drops the
            // original first element (-[1,2,3] is [3,2]).
            Value::List(items) => Ok(Value::list(items.iter().skip(1).rev().cloned().collect())),
            _ => Err(OpError::Mismatch),
        }
    }

    pub fn pos(value: &Value) -> Result<Value, OpError> {
        match value {
            Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::List(_) => Ok(value.clone()),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            _ => Err(OpError::Mismatch),
        }
    }

    /// Equality table: None means the pair is incomparable, which `==`
    /// reports as false and `!=` as true.
    pub fn value_eq(left: &Value, right: &Value) -> Option<bool> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => Some(a == b),
            (Value::Int(a), Value::Float(b)) => Some((*a as f64) == *b),
            (Value::Float(a), Value::Int(b)) => Some(*a == (*b as f64)),
            (Value::Float(a), Value::Float(b)) => Some(a == b),
            (Value::Bool(a), Value::Bool(b)) => Some(a == b),
            (Value::Str(a), Value::Str(b)) => Some(a == b),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !value_eq(x, y).unwrap_or(false) {
                        return Some(false);
                    }
                }
                Some(true)
            }
            (Value::Type(a), Value::Type(b)) => Some(a == b),
            _ => None,
        }
    }

    pub enum CastClass {
        Lossless,
        Lossy,
        Illegal,
    }

    /// Implicit-cast classes for assignment into a typed binding.
    pub fn cast_class(from: &str, to: &str) -> CastClass {
        match (from, to) {
            ("int", "float") | ("bool", "float") => CastClass::Lossless,
            ("float", "int") | ("bool", "int") | ("float", "bool") | ("int", "bool") => {
                CastClass::Lossy
            }
            _ => CastClass::Illegal,
        }
    }

    pub fn convert(value: &Value, to: &str) -> Value {
        match (value, to) {
            (Value::Int(v), "float") => Value::Float(*v as f64),
            (Value::Bool(b), "float") => Value::Float((*b as i64) as f64),
            (Value::Float(v), "int") => Value::Int(*v as i64),
            (Value::Bool(b), "int") => Value::Int(*b as i64),
            (Value::Float(v), "bool") => Value::Bool(*v != 0.0),
            (Value::Int(v), "bool") => Value::Bool(*v != 0),
            _ => value.clone(),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn addition_widens_and_concatenates() {
            assert!(matches!(add(&Value::Int(1), &Value::Int(2)), Ok(Value::Int(3))));
            assert!(
                matches!(add(&Value::Int(1), &Value::Float(0.5)), Ok(Value::Float(f)) if f == 1.5)
            );
            assert!(matches!(
                add(&Value::Bool(true), &Value::Bool(true)),
                Ok(Value::Int(2))
            ));
            assert!(
                matches!(add(&Value::str("a"), &Value::str("b")), Ok(Value::Str(s)) if s.as_str() == "ab")
            );
            assert!(matches!(
                add(&Value::str("a"), &Value::Int(1)),
                Err(OpError::Mismatch)
            ));
        }

        #[test]
        fn subtraction_slices_strings_from_either_side() {
            assert!(
                matches!(sub(&Value::Int(2), &Value::str("hello")), Ok(Value::Str(s)) if s.as_str() == "llo")
            );
            assert!(
                matches!(sub(&Value::str("hello"), &Value::Int(2)), Ok(Value::Str(s)) if s.as_str() == "hel")
            );
            assert!(matches!(
                sub(&Value::Int(6), &Value::str("hi")),
                Err(OpError::Message(_))
            ));
            assert!(
                matches!(sub(&Value::str("hi"), &Value::Int(2)), Ok(Value::Str(s)) if s.is_empty())
            );
        }

        #[test]
        fn repetition_keeps_element_order() {
            let twice = mul(&Value::Int(2), &Value::list(vec![Value::Int(1), Value::Int(2)]));
            match twice {
                Ok(Value::List(items)) => assert_eq!(
                    items.as_ref(),
                    &vec![Value::Int(1), Value::Int(2), Value::Int(1), Value::Int(2)]
                ),
                other => panic!("expected list, got {:?}", other),
            }
            assert!(
                matches!(mul(&Value::Int(3), &Value::str("ab")), Ok(Value::Str(s)) if s.as_str() == "ababab")
            );
            assert!(
                matches!(mul(&Value::Int(-1), &Value::str("ab")), Ok(Value::Str(s)) if s.is_empty())
            );
        }

        #[test]
        fn int_division_promotes_to_float() {
            assert!(matches!(div(&Value::Int(4), &Value::Int(2)), Ok(Value::Float(f)) if f == 2.0));
            assert!(matches!(
                div(&Value::Bool(true), &Value::Bool(true)),
                Ok(Value::Int(1))
            ));
            assert!(matches!(
                div(&Value::Bool(true), &Value::Int(0)),
                Err(OpError::Message(_))
            ));
        }

        #[test]
        fn negation_reverses_sequences() {
            let reversed = neg(&Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
            match reversed {
                Ok(Value::List(items)) => {
                    assert_eq!(items.as_ref(), &vec![Value::Int(3), Value::Int(2)])
                }
                other => panic!("expected list, got {:?}", other),
            }
            assert!(matches!(neg(&Value::str("abc")), Ok(Value::Str(s)) if s.as_str() == "cba"));
            assert!(matches!(neg(&Value::Bool(true)), Ok(Value::Int(-1))));
        }

        #[test]
        fn equality_is_structural_and_partial() {
            assert_eq!(value_eq(&Value::Int(1), &Value::Float(1.0)), Some(true));
            assert_eq!(value_eq(&Value::Bool(true), &Value::Int(1)), None);
            let a = Value::list(vec![Value::Int(1), Value::str("x")]);
            let b = Value::list(vec![Value::Int(1), Value::str("x")]);
            assert_eq!(value_eq(&a, &b), Some(true));
            let c = Value::list(vec![Value::Int(1)]);
            assert_eq!(value_eq(&a, &c), Some(false));
        }

        #[test]
        fn cast_classes_follow_the_table() {
            assert!(matches!(cast_class("int", "float"), CastClass::Lossless));
            assert!(matches!(cast_class("bool", "float"), CastClass::Lossless));
            assert!(matches!(cast_class("float", "int"), CastClass::Lossy));
            assert!(matches!(cast_class("int", "bool"), CastClass::Lossy));
            assert!(matches!(cast_class("string", "int"), CastClass::Illegal));
            assert!(matches!(cast_class("list", "string"), CastClass::Illegal));
        }
    }
}
