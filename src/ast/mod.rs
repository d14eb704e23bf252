//! The typed AST arena (spec §3, §4.5): parsing builds this tree, constant
//! evaluation and IR lowering both walk it read-only. Laid out the same way
//! as [`crate::types`]'s `TypeCtx` — a flat `Vec` arena addressed by dense
//! [`AstId`]s — so the parser, const-evaluator, and IR lowerer all share one
//! cheap-to-pass-around, cheap-to-index structure instead of an owned tree
//! of boxed nodes.

pub mod nodes;
pub mod scope;

pub use nodes::{
    AstId, AstNodeData, BinOp, CaseArm, ConvKind, Global, GlobalId, GlobalKind, InitElem, InitSlot,
    Linkage, LogOp, NodeKind, Symbol, SymbolId, UnOp,
};
pub use scope::{Binding, ScopeKind, ScopeStack};

use crate::diagnostics::errors::SourceLoc;
use crate::types::TypeCtx;
pub use crate::types::TypeId;

/// Owns every arena a translation unit needs once parsing starts: the type
/// graph, the AST node arena, the flat symbol table, and the list of
/// top-level globals in declaration order (spec §3's "Global record").
pub struct Ast {
    pub types: TypeCtx,
    nodes: Vec<AstNodeData>,
    symbols: Vec<Symbol>,
    globals: Vec<Global>,
    anon_label_count: u32,
}

impl Ast {
    pub fn new() -> Self {
        Ast {
            types: TypeCtx::new(),
            nodes: Vec::new(),
            symbols: Vec::new(),
            globals: Vec::new(),
            anon_label_count: 0,
        }
    }

    // ---- AST nodes ----

    pub fn push(&mut self, kind: NodeKind, ty: Option<TypeId>, loc: SourceLoc) -> AstId {
        let id = AstId(self.nodes.len() as u32);
        self.nodes.push(AstNodeData { kind, ty, loc, next: None });
        id
    }

    pub fn node(&self, id: AstId) -> &AstNodeData {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: AstId) -> &mut AstNodeData {
        &mut self.nodes[id.0 as usize]
    }

    /// Type of an expression node; `None` on statement nodes (spec §3).
    pub fn type_of(&self, id: AstId) -> Option<TypeId> {
        self.node(id).ty
    }

    /// Links `next` onto the tail of a statement chain rooted at `head`
    /// (or, if `head` is `None`, starts a new chain at `next`). Returns the
    /// chain's head, unchanged if it already existed.
    pub fn append_stmt(&mut self, head: Option<AstId>, next: AstId) -> AstId {
        match head {
            None => next,
            Some(head_id) => {
                let mut cursor = head_id;
                loop {
                    let nxt = self.node(cursor).next;
                    match nxt {
                        Some(n) => cursor = n,
                        None => break,
                    }
                }
                self.node_mut(cursor).next = Some(next);
                head_id
            }
        }
    }

    /// Iterates a statement chain starting at `head` by following `next`.
    pub fn stmt_chain(&self, head: Option<AstId>) -> StmtChainIter<'_> {
        StmtChainIter { ast: self, cursor: head }
    }

    // ---- symbols ----

    pub fn new_symbol(
        &mut self,
        name: impl Into<String>,
        ty: TypeId,
        is_global: bool,
        linkage: Linkage,
        global: Option<GlobalId>,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol { name: name.into(), ty, is_global, linkage, global });
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    // ---- globals ----

    pub fn new_global(&mut self, name: impl Into<String>, ty: TypeId, linkage: Linkage, kind: GlobalKind) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(Global { name: name.into(), ty, linkage, kind, label: None });
        id
    }

    /// Allocates a fresh `_G.<n>` label for a compiler-synthesised global
    /// (string literal pooling, compound-literal backing storage — spec §3).
    pub fn new_anon_global(&mut self, ty: TypeId, kind: GlobalKind) -> GlobalId {
        let n = self.anon_label_count;
        self.anon_label_count += 1;
        let label = format!("_G.{n}");
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(Global {
            name: label.clone(),
            ty,
            linkage: Linkage::Static,
            kind,
            label: Some(label),
        });
        id
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0 as usize]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut Global {
        &mut self.globals[id.0 as usize]
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals.iter().enumerate().map(|(i, g)| (GlobalId(i as u32), g))
    }

    /// The label an assembler-facing backend would emit for this global:
    /// its synthesised `_G.<n>` if anonymous, otherwise its source name.
    pub fn emit_label(&self, id: GlobalId) -> &str {
        let g = self.global(id);
        g.label.as_deref().unwrap_or(&g.name)
    }
}

impl Default for Ast {
    fn default() -> Self {
        Ast::new()
    }
}

pub struct StmtChainIter<'a> {
    ast: &'a Ast,
    cursor: Option<AstId>,
}

impl<'a> Iterator for StmtChainIter<'a> {
    type Item = AstId;

    fn next(&mut self) -> Option<AstId> {
        let cur = self.cursor?;
        self.cursor = self.ast.node(cur).next;
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::errors::SourceLoc;
    use std::path::PathBuf;

    fn loc() -> SourceLoc {
        SourceLoc { file: PathBuf::from("t.c"), line: 1, col: 1 }
    }

    #[test]
    fn stmt_chain_links_in_order() {
        let mut ast = Ast::new();
        let a = ast.push(NodeKind::Break, None, loc());
        let b = ast.push(NodeKind::Continue, None, loc());
        let c = ast.push(NodeKind::Break, None, loc());

        let head = ast.append_stmt(None, a);
        let head = ast.append_stmt(Some(head), b);
        let head = ast.append_stmt(Some(head), c);

        let seq: Vec<AstId> = ast.stmt_chain(Some(head)).collect();
        assert_eq!(seq, vec![a, b, c]);
    }

    #[test]
    fn anon_globals_get_distinct_labels() {
        let mut ast = Ast::new();
        let i = ast.types.t_num(crate::types::NumKind::Int);
        let g1 = ast.new_anon_global(i, GlobalKind::Data(None));
        let g2 = ast.new_anon_global(i, GlobalKind::Data(None));
        assert_ne!(ast.emit_label(g1), ast.emit_label(g2));
        assert_eq!(ast.emit_label(g1), "_G.0");
        assert_eq!(ast.emit_label(g2), "_G.1");
    }
}
