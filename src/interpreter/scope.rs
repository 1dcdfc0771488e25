// File: src/interpreter/scope.rs
//
// Scope-frame arena for the Quill interpreter. Frames are addressed by
// index, so the parent link and the child entries never form ownership
// cycles. A child frame is always also a binding of type "scope" in its
// parent, which is what makes named blocks addressable via `::`.

use crate::interpreter::value::Value;
use std::collections::HashMap;

/// Handle to a frame in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// One named, typed, mutable value slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub ty: String,
    pub value: Value,
}

/// One namespace frame. Bindings keep declaration order and are unique
/// by name. `types` is the set of type names this frame recognizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub name: String,
    pub named: bool,
    pub parent: Option<ScopeId>,
    pub bindings: Vec<Binding>,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeArena {
    frames: Vec<Frame>,
    anon_counter: usize,
}

impl ScopeArena {
    /// Creates the arena with the global frame (id 0) and the primitive
    /// type set.
    pub fn new() -> Self {
        let global = Frame {
            name: "global".to_string(),
            named: true,
            parent: None,
            bindings: Vec::new(),
            types: ["int", "bool", "float", "string", "scope", "any"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        };
        ScopeArena { frames: vec![global], anon_counter: 0 }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn frame(&self, id: ScopeId) -> &Frame {
        &self.frames[id.0]
    }

    fn frame_mut(&mut self, id: ScopeId) -> &mut Frame {
        &mut self.frames[id.0]
    }

    pub fn name_of(&self, id: ScopeId) -> &str {
        &self.frames[id.0].name
    }

    /// Creates a child frame and registers it as a scope-typed binding
    /// of the parent. Anonymous frames get counter names ("1", "2", ...).
    pub fn new_scope(&mut self, parent: ScopeId, name: Option<String>) -> ScopeId {
        let (name, named) = match name {
            Some(name) => (name, true),
            None => {
                self.anon_counter += 1;
                (self.anon_counter.to_string(), false)
            }
        };
        let id = ScopeId(self.frames.len());
        self.frames.push(Frame {
            name: name.clone(),
            named,
            parent: Some(parent),
            bindings: Vec::new(),
            types: Vec::new(),
        });
        self.define(parent, &name, "scope", Value::Scope(id));
        id
    }

    /// Leaves `id`, returning its parent. An anonymous frame is emptied
    /// and unhooked from the parent; its arena slot is simply abandoned.
    /// Named frames stay reachable.
    pub fn exit_scope(&mut self, id: ScopeId) -> Option<ScopeId> {
        let parent = self.frames[id.0].parent;
        if !self.frames[id.0].named {
            self.frames[id.0].bindings.clear();
            if let Some(parent) = parent {
                self.frame_mut(parent)
                    .bindings
                    .retain(|b| !matches!(b.value, Value::Scope(child) if child == id));
            }
        }
        parent
    }

    /// Outward lookup through the parent chain.
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<(ScopeId, usize)> {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if let Some(index) = self.lookup_local(id, name) {
                return Some((id, index));
            }
            cursor = self.frames[id.0].parent;
        }
        None
    }

    /// Lookup in exactly one frame; this is what `::` uses.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<usize> {
        self.frames[scope.0].bindings.iter().position(|b| b.name == name)
    }

    pub fn binding(&self, scope: ScopeId, index: usize) -> &Binding {
        &self.frames[scope.0].bindings[index]
    }

    pub fn value(&self, scope: ScopeId, index: usize) -> &Value {
        &self.frames[scope.0].bindings[index].value
    }

    pub fn set_value(&mut self, scope: ScopeId, index: usize, value: Value) {
        self.frames[scope.0].bindings[index].value = value;
    }

    /// Declares or overwrites a binding in one frame.
    pub fn define(&mut self, scope: ScopeId, name: &str, ty: &str, value: Value) {
        let frame = self.frame_mut(scope);
        match frame.bindings.iter_mut().find(|b| b.name == name) {
            Some(binding) => {
                binding.ty = ty.to_string();
                binding.value = value;
            }
            None => frame.bindings.push(Binding {
                name: name.to_string(),
                ty: ty.to_string(),
                value,
            }),
        }
    }

    /// Adds a recognized type name to a frame.
    pub fn register_type(&mut self, scope: ScopeId, name: &str) {
        let frame = self.frame_mut(scope);
        if !frame.types.iter().any(|t| t == name) {
            frame.types.push(name.to_string());
        }
    }

    /// True when `name` is a recognized type name in `from` or any
    /// outer frame.
    pub fn lookup_type_name(&self, from: ScopeId, name: &str) -> bool {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if self.frames[id.0].types.iter().any(|t| t == name) {
                return true;
            }
            cursor = self.frames[id.0].parent;
        }
        false
    }

    /// Every binding name visible from `from`, innermost first. Used for
    /// "did you mean" suggestions.
    pub fn visible_names(&self, from: ScopeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            for binding in &self.frames[id.0].bindings {
                if !names.contains(&binding.name) {
                    names.push(binding.name.clone());
                }
            }
            cursor = self.frames[id.0].parent;
        }
        names
    }

    /// Chases a ref chain starting at (scope, name) to the first
    /// non-ref value. Hop-limited so a self-referential binding cannot
    /// hang the interpreter.
    pub fn chase(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let mut scope = scope;
        let mut name = name.to_string();
        for _ in 0..64 {
            let index = self.lookup_local(scope, &name)?;
            match self.value(scope, index) {
                Value::Ref { scope: next_scope, name: next_name } => {
                    let next_scope = *next_scope;
                    let next_name = next_name.clone();
                    scope = next_scope;
                    name = next_name;
                }
                other => return Some(other.clone()),
            }
        }
        None
    }

    /// Copies a frame tree from another arena into this one, renaming
    /// the root. Child scopes come along recursively; refs are resolved
    /// to snapshots in the source arena (a dangling ref becomes Error).
    /// A source frame reached twice, including through a scope-value
    /// cycle, maps to a single adopted frame.
    pub fn adopt(
        &mut self,
        other: &ScopeArena,
        src: ScopeId,
        parent: Option<ScopeId>,
        rename: Option<String>,
    ) -> ScopeId {
        let mut adopted = HashMap::new();
        self.adopt_frame(other, src, parent, rename, &mut adopted)
    }

    fn adopt_frame(
        &mut self,
        other: &ScopeArena,
        src: ScopeId,
        parent: Option<ScopeId>,
        rename: Option<String>,
        adopted: &mut HashMap<ScopeId, ScopeId>,
    ) -> ScopeId {
        if let Some(&mapped) = adopted.get(&src) {
            return mapped;
        }
        let src_frame = other.frame(src);
        let id = ScopeId(self.frames.len());
        adopted.insert(src, id);
        self.frames.push(Frame {
            name: rename.unwrap_or_else(|| src_frame.name.clone()),
            named: true,
            parent,
            bindings: Vec::new(),
            types: src_frame.types.clone(),
        });
        for binding in &src_frame.bindings {
            let value = match &binding.value {
                Value::Scope(child) => {
                    Value::Scope(self.adopt_frame(other, *child, Some(id), None, adopted))
                }
                Value::Ref { scope, name } => match other.chase(*scope, name) {
                    Some(Value::Scope(child)) => {
                        Value::Scope(self.adopt_frame(other, child, Some(id), None, adopted))
                    }
                    Some(value) => value,
                    None => Value::Error,
                },
                other_value => other_value.clone(),
            };
            self.frames[id.0].bindings.push(Binding {
                name: binding.name.clone(),
                ty: binding.ty.clone(),
                value,
            });
        }
        id
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_frame_knows_primitive_types() {
        let scopes = ScopeArena::new();
        let global = scopes.global();
        assert_eq!(scopes.name_of(global), "global");
        assert!(scopes.frame(global).types.iter().any(|t| t == "int"));
        assert!(scopes.frame(global).types.iter().any(|t| t == "any"));
    }

    #[test]
    fn lookup_walks_outward_but_lookup_local_does_not() {
        let mut scopes = ScopeArena::new();
        let global = scopes.global();
        scopes.define(global, "x", "int", Value::Int(1));
        let inner = scopes.new_scope(global, None);
        assert!(scopes.lookup(inner, "x").is_some());
        assert!(scopes.lookup_local(inner, "x").is_none());
    }

    #[test]
    fn anonymous_frames_are_unhooked_on_exit() {
        let mut scopes = ScopeArena::new();
        let global = scopes.global();
        let inner = scopes.new_scope(global, None);
        scopes.define(inner, "tmp", "int", Value::Int(9));
        assert_eq!(scopes.frame(global).bindings.len(), 1);
        scopes.exit_scope(inner);
        assert!(scopes.frame(global).bindings.is_empty());
        assert!(scopes.frame(inner).bindings.is_empty());
    }

    #[test]
    fn named_frames_survive_exit() {
        let mut scopes = ScopeArena::new();
        let global = scopes.global();
        let named = scopes.new_scope(global, Some("config".to_string()));
        scopes.define(named, "port", "int", Value::Int(8080));
        scopes.exit_scope(named);
        let index = scopes.lookup_local(global, "config").expect("config binding");
        assert_eq!(*scopes.value(global, index), Value::Scope(named));
        let port = scopes.lookup_local(named, "port").expect("port binding");
        assert_eq!(*scopes.value(named, port), Value::Int(8080));
    }

    #[test]
    fn chase_follows_ref_chains_and_stops_cycles() {
        let mut scopes = ScopeArena::new();
        let global = scopes.global();
        scopes.define(global, "x", "int", Value::Int(7));
        scopes.define(global, "r", "int", Value::Ref { scope: global, name: "x".to_string() });
        assert_eq!(scopes.chase(global, "r"), Some(Value::Int(7)));

        scopes.define(global, "loop", "int", Value::Ref { scope: global, name: "loop".to_string() });
        assert_eq!(scopes.chase(global, "loop"), None);
    }

    #[test]
    fn adopt_copies_nested_scopes() {
        let mut source = ScopeArena::new();
        let src_global = source.global();
        source.define(src_global, "version", "int", Value::Int(3));
        let child = source.new_scope(src_global, Some("helpers".to_string()));
        source.define(child, "step", "int", Value::Int(2));

        let mut target = ScopeArena::new();
        let adopted = target.adopt(&source, src_global, None, Some("lib".to_string()));
        assert_eq!(target.name_of(adopted), "lib");
        let version = target.lookup_local(adopted, "version").expect("version");
        assert_eq!(*target.value(adopted, version), Value::Int(3));
        let helpers = target.lookup_local(adopted, "helpers").expect("helpers");
        match target.value(adopted, helpers) {
            Value::Scope(id) => {
                let step = target.lookup_local(*id, "step").expect("step");
                assert_eq!(*target.value(*id, step), Value::Int(2));
            }
            other => panic!("expected scope, got {:?}", other),
        }
    }

    #[test]
    fn adopt_maps_scope_cycles_to_a_single_frame() {
        let mut source = ScopeArena::new();
        let src_global = source.global();
        let module = source.new_scope(src_global, Some("m".to_string()));
        // Inside `m`, the name `m` resolves to the scope itself.
        source.define(module, "s", "scope", Value::Scope(module));

        let mut target = ScopeArena::new();
        let adopted = target.adopt(&source, module, None, Some("m".to_string()));
        let index = target.lookup_local(adopted, "s").expect("s binding");
        assert_eq!(*target.value(adopted, index), Value::Scope(adopted));
    }

    #[test]
    fn type_names_are_visible_from_inner_frames() {
        let mut scopes = ScopeArena::new();
        let global = scopes.global();
        let inner = scopes.new_scope(global, None);
        assert!(scopes.lookup_type_name(inner, "int"));
        assert!(scopes.lookup_type_name(global, "string"));
        assert!(!scopes.lookup_type_name(inner, "widget"));
        scopes.register_type(global, "widget");
        assert!(scopes.lookup_type_name(inner, "widget"));
    }
}
