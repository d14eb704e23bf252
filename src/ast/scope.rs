//! Lexical scope chain used while parsing (spec §4.5): file scope at the
//! root, a new scope pushed per block/loop/switch, variable and tag
//! namespaces kept separate as C requires — grounded on
//! `ast/ast.rs`'s `ScopeContext` and the lookup walk in
//! `traits.rs`'s `ContainsReferences`.

use rustc_hash::FxHashMap;

use crate::ast::{SymbolId, TypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    File,
    Block,
    /// A block that is also a loop body: `break`/`continue` are both valid
    /// inside it (directly, not just inside a nested plain block).
    Loop,
    /// A block that is also a switch body: `break` is valid, `continue` is
    /// not (unless an enclosing loop makes it so).
    Switch,
}

#[derive(Clone, Debug)]
pub enum Binding {
    Var(SymbolId),
    Typedef(TypeId),
    EnumConst { value: i64, ty: TypeId },
}

#[derive(Default)]
struct Scope {
    kind: Option<ScopeKind>,
    vars: FxHashMap<String, Binding>,
    tags: FxHashMap<String, TypeId>,
}

/// A stack of nested scopes. Held by the parser for the duration of one
/// translation unit; pushed on `{` (and on entry to `for`/`while`/`switch`
/// headers, whose own scope also holds the loop variable), popped on the
/// matching close.
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope { kind: Some(ScopeKind::File), ..Scope::default() }],
        }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope { kind: Some(kind), ..Scope::default() });
    }

    pub fn pop(&mut self) {
        debug_assert!(self.scopes.len() > 1, "popped file scope");
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_file_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn define_var(&mut self, name: impl Into<String>, binding: Binding) {
        self.scopes.last_mut().unwrap().vars.insert(name.into(), binding);
    }

    /// Whether `name` is already bound in the *innermost* scope (spec §4.5:
    /// redeclaration in the same scope is an error; shadowing an outer
    /// scope's binding is not).
    pub fn bound_in_current_scope(&self, name: &str) -> bool {
        self.scopes.last().unwrap().vars.contains_key(name)
    }

    pub fn define_tag(&mut self, name: impl Into<String>, ty: TypeId) {
        self.scopes.last_mut().unwrap().tags.insert(name.into(), ty);
    }

    pub fn tag_in_current_scope(&self, name: &str) -> Option<TypeId> {
        self.scopes.last().unwrap().tags.get(name).copied()
    }

    pub fn lookup_var(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name))
    }

    pub fn lookup_tag(&self, name: &str) -> Option<TypeId> {
        self.scopes.iter().rev().find_map(|s| s.tags.get(name)).copied()
    }

    pub fn in_loop(&self) -> bool {
        self.scopes.iter().rev().any(|s| matches!(s.kind, Some(ScopeKind::Loop)))
    }

    /// `break` is valid inside a loop *or* a switch (spec §4.5: it targets
    /// whichever of the two is innermost).
    pub fn in_loop_or_switch(&self) -> bool {
        self.scopes
            .iter()
            .rev()
            .any(|s| matches!(s.kind, Some(ScopeKind::Loop) | Some(ScopeKind::Switch)))
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack::new()
    }
}
