//! AST-to-IR lowering (spec §4.7): turns a fully parsed, fully typed
//! [`Ast`] into one [`IrFn`] per function definition. Expression lowering is
//! a straightforward recursive walk; every condition-context expression
//! (`if`/`while`/`for`/`&&`/`||`/`!`/`?:`) goes through the branch-chain
//! discipline in [`super::branch_chain`] instead of materialising a `{0,1}`
//! value at each step, exactly as spec §4.7 describes it. Grounded on the
//! teacher's `hir/control_flow_linearizer.rs` for the shape of a per-function
//! lowering pass (one struct owning the function under construction plus a
//! "current block" cursor) and on `hir/hir_builder.rs` for walking an
//! expression tree into flat instructions; the branch-chain machinery itself
//! has no teacher counterpart (see `branch_chain.rs`'s module doc).

use rustc_hash::FxHashMap;

use super::branch_chain::{patch_branch_chain, BranchChain, BranchSlot, CondValue};
use super::nodes::{BlockId, CmpOp, InsId, IrFn, Op, Program};
use crate::ast::{Ast, AstId, BinOp, ConvKind, GlobalId, GlobalKind, InitSlot, LogOp, NodeKind, SymbolId, UnOp};
use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::types::{ArrayLen, NumKind, Type, TypeId};

/// Lowers every function definition in `ast` to IR, leaving data globals as
/// they already are (spec §4.8: this crate stops at IR, a byte-level image
/// of `.data`/`.rodata` is the assembler's job).
pub fn lower_translation_unit(ast: Ast) -> Result<Program, CompileError> {
    let mut functions = Vec::new();
    let globals: Vec<(GlobalId, String, Vec<SymbolId>, AstId)> = ast
        .globals()
        .filter_map(|(id, g)| match &g.kind {
            GlobalKind::Function { params, body: Some(body) } => {
                Some((id, g.name.clone(), params.clone(), *body))
            }
            _ => None,
        })
        .collect();

    let mut ast = ast;
    for (gid, name, params, body) in globals {
        crate::ir_log!("lowering function {}", name);
        let f = Lowerer::lower_function(&mut ast, &name, &params, body)?;
        functions.push((gid, f));
    }

    Ok(Program { ast, functions })
}

struct Lowerer<'a> {
    ast: &'a mut Ast,
    f: IrFn,
    cur: BlockId,
    /// Stack slot holding each local (parameter or `VarDeclStmt` entry).
    locals: FxHashMap<SymbolId, InsId>,
    labels: FxHashMap<String, BlockId>,
    /// Deferred `goto`s to a label not yet seen, patched once it is.
    pending_gotos: FxHashMap<String, Vec<InsId>>,
    /// One merge-chain per nested loop/switch, innermost last.
    break_chains: Vec<BranchChain>,
    /// One merge-chain per nested loop, innermost last (`continue` target).
    continue_targets: Vec<BlockId>,
    /// Per-switch `case value -> block` map, innermost switch last; filled
    /// in lazily as `Case`/`Default` nodes are reached during body lowering.
    switch_case_blocks: Vec<FxHashMap<i64, BlockId>>,
    switch_default_blocks: Vec<Option<BlockId>>,
}

impl<'a> Lowerer<'a> {
    fn lower_function(ast: &mut Ast, name: &str, params: &[SymbolId], body: AstId) -> Result<IrFn, CompileError> {
        let f = IrFn::new(name);
        let mut l = Lowerer {
            ast,
            f,
            cur: BlockId(0),
            locals: FxHashMap::default(),
            labels: FxHashMap::default(),
            pending_gotos: FxHashMap::default(),
            break_chains: Vec::new(),
            continue_targets: Vec::new(),
            switch_case_blocks: Vec::new(),
            switch_default_blocks: Vec::new(),
        };
        l.cur = l.f.entry;

        for (i, &sym) in params.iter().enumerate() {
            let ty = l.ast.symbol(sym).ty;
            let arg = l.f.push(l.cur, Op::FArg(i as u32), ty);
            let slot = l.f.push(l.cur, Op::Alloc { elem: ty, count: None }, l.ptr_ty());
            l.f.push(l.cur, Op::Store { addr: slot, value: arg }, l.void_ty());
            l.locals.insert(sym, slot);
        }

        l.lower_stmt(body)?;
        if !l.f.is_terminated(l.cur) {
            l.f.push(l.cur, Op::Ret(None), l.void_ty());
        }

        if let Some((label, _)) = l.pending_gotos.iter().next() {
            let loc = l.ast.node(body).loc.clone();
            return Err(CompileError::semantic(format!("use of undeclared label '{label}'"), loc));
        }

        Ok(l.f)
    }

    // ---- small helpers ----

    fn void_ty(&mut self) -> TypeId {
        self.ast.types.t_void()
    }

    fn ptr_ty(&mut self) -> TypeId {
        let v = self.void_ty();
        self.ast.types.t_ptr(v)
    }

    fn loc_of(&self, id: AstId) -> SourceLoc {
        self.ast.node(id).loc.clone()
    }

    fn ty_of(&self, id: AstId) -> TypeId {
        self.ast.type_of(id).expect("expression node always carries a resolved type")
    }

    /// Emits an unconditional branch to `target` from the current block if
    /// it isn't already terminated (dead code after `return`/`break`/etc.
    /// leaves the block terminated already; nothing may follow a
    /// terminator), then makes `target` current.
    fn goto(&mut self, target: BlockId) {
        if !self.f.is_terminated(self.cur) {
            let void = self.void_ty();
            self.f.push(self.cur, Op::Br(target), void);
        }
        self.cur = target;
    }

    /// Wraps a list of plain `Br` instructions (already emitted, target not
    /// yet known) into a [`BranchChain`] `patch_branch_chain` can rewrite.
    /// `want_true` is meaningless for `Br` and ignored by the patcher.
    fn br_chain_of(ids: Vec<InsId>) -> BranchChain {
        ids.into_iter().map(|ins| BranchSlot { ins, want_true: true }).collect()
    }

    fn new_block(&mut self) -> BlockId {
        self.f.new_block()
    }

    /// Lowers `e` for its address instead of its value: lowers it normally,
    /// then deletes the implicit load that lowering an lvalue always emits
    /// and returns the address that load would have read from (spec §4.7:
    /// "Assignment walks the left operand, captures its lvalue pointer by
    /// deleting the implicit load emitted while compiling the lvalue").
    fn lvalue_addr(&mut self, e: AstId) -> Result<InsId, CompileError> {
        let v = self.lower_expr(e)?;
        match self.f.ins(v).op.clone() {
            Op::Load(addr) => {
                self.f.remove(v);
                Ok(addr)
            }
            // `VarRef` of an array/function already yields its address
            // without a load (decayed by the parser); reuse it directly.
            _ => Ok(v),
        }
    }

    // ---- statements ----

    fn lower_stmt(&mut self, id: AstId) -> Result<(), CompileError> {
        let kind = self.ast.node(id).kind.clone();
        match kind {
            NodeKind::VarDeclStmt { vars } => {
                for (sym, init) in vars {
                    let ty = self.ast.symbol(sym).ty;
                    let slot = self.f.push(self.cur, Op::Alloc { elem: ty, count: None }, self.ptr_ty());
                    self.locals.insert(sym, slot);
                    if let Some(init) = init {
                        self.lower_init_into(slot, ty, init)?;
                    }
                }
                Ok(())
            }

            NodeKind::TypedefStmt => Ok(()),

            NodeKind::ExprStmt(e) => {
                self.lower_expr(e)?;
                Ok(())
            }

            NodeKind::CompoundStmt { first } => {
                for stmt in self.ast.stmt_chain(first).collect::<Vec<_>>() {
                    self.lower_stmt(stmt)?;
                }
                Ok(())
            }

            NodeKind::If { cond, then_, else_ } => {
                let c = self.lower_cond(cond)?;
                let then_block = self.new_block();
                patch_branch_chain(&mut self.f, &c.true_chain, then_block);

                if let Some(else_) = else_ {
                    let else_block = self.new_block();
                    patch_branch_chain(&mut self.f, &c.false_chain, else_block);

                    self.cur = then_block;
                    self.lower_stmt(then_)?;
                    let mut merges = Vec::new();
                    if !self.f.is_terminated(self.cur) {
                        let void = self.void_ty();
                        let placeholder = self.f.entry; // patched below
                        merges.push(self.f.push(self.cur, Op::Br(placeholder), void));
                    }

                    self.cur = else_block;
                    self.lower_stmt(else_)?;
                    if !self.f.is_terminated(self.cur) {
                        let void = self.void_ty();
                        let placeholder = self.f.entry;
                        merges.push(self.f.push(self.cur, Op::Br(placeholder), void));
                    }

                    let merge_block = self.new_block();
                    patch_branch_chain(&mut self.f, &Self::br_chain_of(merges), merge_block);
                    self.cur = merge_block;
                } else {
                    let merge_block = self.new_block();
                    patch_branch_chain(&mut self.f, &c.false_chain, merge_block);

                    self.cur = then_block;
                    self.lower_stmt(then_)?;
                    self.goto(merge_block);

                    self.cur = merge_block;
                }
                Ok(())
            }

            NodeKind::While { cond, body } => {
                let head = self.new_block();
                self.goto(head);
                self.cur = head;
                let c = self.lower_cond(cond)?;

                let body_block = self.new_block();
                patch_branch_chain(&mut self.f, &c.true_chain, body_block);
                let merge_block = self.new_block();
                patch_branch_chain(&mut self.f, &c.false_chain, merge_block);

                self.break_chains.push(Vec::new());
                self.continue_targets.push(head);
                self.cur = body_block;
                self.lower_stmt(body)?;
                self.goto(head);
                let breaks = self.break_chains.pop().unwrap();
                self.continue_targets.pop();

                patch_branch_chain(&mut self.f, &breaks, merge_block);
                self.cur = merge_block;
                Ok(())
            }

            NodeKind::DoWhile { body, cond } => {
                let body_block = self.new_block();
                self.goto(body_block);

                let cond_block = self.new_block();
                let merge_block = self.new_block();

                self.break_chains.push(Vec::new());
                self.continue_targets.push(cond_block);
                self.cur = body_block;
                self.lower_stmt(body)?;
                self.goto(cond_block);

                self.cur = cond_block;
                let c = self.lower_cond(cond)?;
                patch_branch_chain(&mut self.f, &c.true_chain, body_block);
                patch_branch_chain(&mut self.f, &c.false_chain, merge_block);

                let breaks = self.break_chains.pop().unwrap();
                self.continue_targets.pop();
                patch_branch_chain(&mut self.f, &breaks, merge_block);
                self.cur = merge_block;
                Ok(())
            }

            NodeKind::For { init, cond, step, body } => {
                if let Some(init) = init {
                    self.lower_stmt(init)?;
                }

                let head = self.new_block();
                self.goto(head);
                self.cur = head;

                let (body_block, false_chain) = if let Some(cond) = cond {
                    let c = self.lower_cond(cond)?;
                    let body_block = self.new_block();
                    patch_branch_chain(&mut self.f, &c.true_chain, body_block);
                    (body_block, Some(c.false_chain))
                } else {
                    (self.new_block(), None)
                };

                let step_block = self.new_block();
                let merge_block = self.new_block();
                if let Some(fc) = false_chain {
                    patch_branch_chain(&mut self.f, &fc, merge_block);
                }

                self.break_chains.push(Vec::new());
                self.continue_targets.push(step_block);
                self.cur = body_block;
                self.lower_stmt(body)?;
                self.goto(step_block);

                self.cur = step_block;
                if let Some(step) = step {
                    self.lower_expr(step)?;
                }
                self.goto(head);

                let breaks = self.break_chains.pop().unwrap();
                self.continue_targets.pop();
                patch_branch_chain(&mut self.f, &breaks, merge_block);
                self.cur = merge_block;
                Ok(())
            }

            NodeKind::Switch { cond, body, cases } => {
                let scrutinee = self.lower_expr(cond)?;
                let ty = self.ty_of(cond);

                // Dispatch table: one equality compare + conditional branch
                // per case, in source order, the last false edge falling
                // through to the default (if any) or straight out (spec
                // §4.7's switch algorithm). The true edges and the final
                // fallthrough are deferred branch-chain slots; the false
                // edge of each comparison always goes to the very next
                // comparison (or is resolved immediately), so only those
                // two need chain treatment.
                let mut case_true_ins: Vec<(i64, InsId)> = Vec::new();
                for arm in &cases {
                    match arm.value {
                        Some(v) => {
                            let imm = self.f.push(self.cur, Op::Imm(v), ty);
                            let cmp = self.f.push(
                                self.cur,
                                Op::Cmp { op: CmpOp::Eq, lhs: scrutinee, rhs: imm },
                                ty,
                            );
                            let void = self.void_ty();
                            let placeholder = self.f.entry;
                            let br = self.f.push(
                                self.cur,
                                Op::CondBr { cond: cmp, true_: placeholder, false_: placeholder },
                                void,
                            );
                            case_true_ins.push((v, br));
                            let next_block = self.new_block();
                            patch_branch_chain(&mut self.f, &[BranchSlot { ins: br, want_true: false }], next_block);
                            self.cur = next_block;
                        }
                        None => {}
                    }
                }
                let fallthrough_block = self.cur;

                // Body lowering starts in a fresh block, never in
                // `fallthrough_block` itself: the body's first `Case`/
                // `Default` node unconditionally branches `self.cur` to its
                // case block via `goto`, and if that ran with
                // `cur == fallthrough_block` it would terminate
                // `fallthrough_block` with the wrong edge before
                // `f_patch_fallthrough` below ever got to it (leaving
                // `default` unreachable). Any statement preceding the first
                // case label lands in this block instead, which is dead
                // code by C's switch semantics either way.
                let body_start = self.new_block();
                self.cur = body_start;

                // Each `case`/`default` AST node, reached during body
                // lowering below, creates its block lazily (via
                // `switch_case_block`/`switch_default_block`) and records it
                // so the dispatch-table entries built above can be patched
                // once body lowering finishes.
                self.break_chains.push(Vec::new());
                self.switch_case_blocks.push(FxHashMap::default());
                self.switch_default_blocks.push(None);
                self.lower_stmt(body)?;
                let case_blocks = self.switch_case_blocks.pop().unwrap();
                let default_block = self.switch_default_blocks.pop().unwrap();

                for (v, br) in case_true_ins {
                    if let Some(&block) = case_blocks.get(&v) {
                        patch_branch_chain(&mut self.f, &[BranchSlot { ins: br, want_true: true }], block);
                    }
                }

                let merge_block = self.new_block();
                self.goto(merge_block);

                let fallthrough_target = default_block.unwrap_or(merge_block);
                self.f_patch_fallthrough(fallthrough_block, fallthrough_target);

                let breaks = self.break_chains.pop().unwrap();
                patch_branch_chain(&mut self.f, &breaks, merge_block);
                self.cur = merge_block;
                Ok(())
            }

            NodeKind::Case { value, inner } => {
                let block = self.switch_case_block(value);
                self.goto(block);
                self.lower_stmt(inner)
            }

            NodeKind::Default { inner } => {
                let block = self.switch_default_block();
                self.goto(block);
                self.lower_stmt(inner)
            }

            NodeKind::Break => {
                let void = self.void_ty();
                let placeholder = self.f.entry;
                let br = self.f.push(self.cur, Op::Br(placeholder), void);
                self.break_chains
                    .last_mut()
                    .expect("parser validates break only appears in a loop or switch")
                    .push(BranchSlot { ins: br, want_true: true });
                Ok(())
            }

            NodeKind::Continue => {
                let target = *self
                    .continue_targets
                    .last()
                    .expect("parser validates continue only appears in a loop");
                self.goto(target);
                Ok(())
            }

            NodeKind::Goto(label) => {
                let void = self.void_ty();
                let placeholder = self.f.entry;
                let br = self.f.push(self.cur, Op::Br(placeholder), void);
                match self.labels.get(&label) {
                    Some(&block) => patch_branch_chain(&mut self.f, &[BranchSlot { ins: br, want_true: true }], block),
                    None => self.pending_gotos.entry(label).or_default().push(br),
                }
                // Dead code until the next label; keep `cur` terminated so
                // a following statement opens a fresh, unreachable block.
                let next = self.new_block();
                self.cur = next;
                Ok(())
            }

            NodeKind::Label { name, inner } => {
                let block = self.new_block();
                self.goto(block);
                self.labels.insert(name.clone(), block);
                if let Some(pending) = self.pending_gotos.remove(&name) {
                    let chain = Self::br_chain_of(pending);
                    patch_branch_chain(&mut self.f, &chain, block);
                }
                self.lower_stmt(inner)
            }

            NodeKind::Return(value) => {
                let v = value.map(|e| self.lower_expr(e)).transpose()?;
                let void = self.void_ty();
                self.f.push(self.cur, Op::Ret(v), void);
                Ok(())
            }

            other => unreachable!("{other:?} is not a statement node"),
        }
    }

    fn switch_case_block(&mut self, value: i64) -> BlockId {
        if let Some(&block) = self.switch_case_blocks.last().and_then(|m| m.get(&value)) {
            return block;
        }
        let block = self.new_block();
        self.switch_case_blocks.last_mut().expect("case only lowered inside a switch body").insert(value, block);
        block
    }

    fn switch_default_block(&mut self) -> BlockId {
        if let Some(Some(block)) = self.switch_default_blocks.last() {
            return *block;
        }
        let block = self.new_block();
        *self.switch_default_blocks.last_mut().expect("default only lowered inside a switch body") = Some(block);
        block
    }

    fn f_patch_fallthrough(&mut self, from: BlockId, to: BlockId) {
        let saved = self.cur;
        self.cur = from;
        self.goto(to);
        self.cur = saved;
    }

    // ---- initialisers ----

    /// Stores `init` into the object at `addr` of type `ty` (spec §4.7): a
    /// wholly constant initialiser becomes an anonymous read-only global
    /// plus one `Copy`; anything else zeroes the destination first, then
    /// stores each non-constant element individually.
    fn lower_init_into(&mut self, addr: InsId, ty: TypeId, init: AstId) -> Result<(), CompileError> {
        if let Ok(folded) = self.try_const_init(ty, init) {
            let g = self.ast.new_anon_global(ty, GlobalKind::Data(Some(folded)));
            let size = self.ast.types.size_of(ty);
            let gaddr = self.f.push(self.cur, Op::GlobalAddr(g), self.ptr_ty());
            let void = self.void_ty();
            self.f.push(self.cur, Op::Copy { dst: addr, src: gaddr, size }, void);
            return Ok(());
        }

        let size = self.ast.types.size_of(ty);
        let void = self.void_ty();
        self.f.push(self.cur, Op::Zero { addr, size }, void);
        self.store_init_elements(addr, ty, init)
    }

    /// Whether `init` folds entirely to compile-time constants; if so,
    /// returns a node suitable for backing an anonymous global verbatim
    /// (the same node, since `InitList`/scalar nodes are exactly what
    /// `Global::Data`'s initialiser already expects).
    fn try_const_init(&self, _ty: TypeId, init: AstId) -> Result<AstId, CompileError> {
        fn all_const(ast: &Ast, id: AstId) -> bool {
            match &ast.node(id).kind {
                NodeKind::InitList(elems) => elems.iter().all(|e| all_const(ast, e.value)),
                _ => crate::consteval::eval(ast, id).is_ok(),
            }
        }
        if all_const(self.ast, init) {
            Ok(init)
        } else {
            Err(CompileError::internal("initializer is not constant", self.loc_of(init)))
        }
    }

    fn store_init_elements(&mut self, addr: InsId, ty: TypeId, init: AstId) -> Result<(), CompileError> {
        let kind = self.ast.node(init).kind.clone();
        let NodeKind::InitList(elems) = kind else {
            let v = self.lower_expr(init)?;
            let void = self.void_ty();
            self.f.push(self.cur, Op::Store { addr, value: v }, void);
            return Ok(());
        };

        for elem in elems {
            let (elem_ty, offset) = match &elem.slot {
                InitSlot::Index(i) => {
                    let elem_ty = self.ast.types.element_of(ty).expect("array InitList targets an array type");
                    (elem_ty, i * self.ast.types.size_of(elem_ty))
                }
                InitSlot::Field(name) => match self.ast.types.get(ty).clone() {
                    Type::Struct(agg) | Type::Union(agg) => {
                        let field = agg.field(name).expect("designator resolved at parse time");
                        (field.ty, field.offset)
                    }
                    _ => unreachable!("field InitSlot targets an aggregate type"),
                },
            };
            let elem_addr = self.f.push(self.cur, Op::Elem { base: addr, offset }, self.ptr_ty());
            self.lower_init_into(elem_addr, elem_ty, elem.value)?;
        }
        Ok(())
    }

    // ---- condition-context expressions (spec §4.7's branch-chain discipline) ----

    fn lower_cond(&mut self, e: AstId) -> Result<CondValue, CompileError> {
        let kind = self.ast.node(e).kind.clone();
        match kind {
            NodeKind::Logical { op: LogOp::And, lhs, rhs } => {
                let l = self.lower_cond(lhs)?;
                let rhs_block = self.new_block();
                patch_branch_chain(&mut self.f, &l.true_chain, rhs_block);
                self.cur = rhs_block;
                let r = self.lower_cond(rhs)?;
                let mut false_chain = l.false_chain;
                false_chain.extend(r.false_chain);
                Ok(CondValue { true_chain: r.true_chain, false_chain })
            }
            NodeKind::Logical { op: LogOp::Or, lhs, rhs } => {
                let l = self.lower_cond(lhs)?;
                let rhs_block = self.new_block();
                patch_branch_chain(&mut self.f, &l.false_chain, rhs_block);
                self.cur = rhs_block;
                let r = self.lower_cond(rhs)?;
                let mut true_chain = l.true_chain;
                true_chain.extend(r.true_chain);
                Ok(CondValue { true_chain, false_chain: r.false_chain })
            }
            NodeKind::Unary { op: UnOp::LogNot, operand } => Ok(self.lower_cond(operand)?.negate()),
            _ => {
                let v = self.lower_expr(e)?;
                let ty = self.ty_of(e);
                self.to_cond(v, ty)
            }
        }
    }

    /// Wraps an ordinary value into a `CondBr` (spec §4.7's `to_cond`); no
    /// extra comparison-against-zero is needed since `CondBr.cond` is
    /// defined as "branch if nonzero".
    fn to_cond(&mut self, v: InsId, _ty: TypeId) -> Result<CondValue, CompileError> {
        let void = self.void_ty();
        let placeholder = self.f.entry;
        let br = self.f.push(self.cur, Op::CondBr { cond: v, true_: placeholder, false_: placeholder }, void);
        Ok(CondValue::single(br))
    }

    /// Materialises a [`CondValue`] back into an ordinary `{0,1}` value
    /// (spec §4.7's `discharge`). When both chains are the single `CondBr`
    /// that `to_cond` just produced, the branch never needed to exist:
    /// delete it and hand back its raw comparison operand directly.
    fn discharge(&mut self, c: CondValue, ty: TypeId) -> InsId {
        if c.true_chain.len() == 1
            && c.false_chain.len() == 1
            && c.true_chain[0].ins == c.false_chain[0].ins
        {
            let ins = c.true_chain[0].ins;
            // The true-chain slot fires on the CondBr's `true_` edge exactly
            // when its own semantic "true" lines up with "cond nonzero"; a
            // negated condition (`!x`) swapped the chains without touching
            // the underlying CondBr, so this slot now names the `false_`
            // edge and the raw comparison must be inverted to match.
            let want_true = c.true_chain[0].want_true;
            if let Op::CondBr { cond, .. } = self.f.ins(ins).op {
                self.f.remove(ins);
                return if want_true {
                    cond
                } else {
                    let zero = self.f.push(self.cur, Op::Imm(0), ty);
                    self.f.push(self.cur, Op::Cmp { op: CmpOp::Eq, lhs: cond, rhs: zero }, ty)
                };
            }
        }

        let true_block = self.new_block();
        patch_branch_chain(&mut self.f, &c.true_chain, true_block);
        let one = self.f.push(true_block, Op::Imm(1), ty);
        let void = self.void_ty();
        let merge_block = self.new_block();
        self.f.push(true_block, Op::Br(merge_block), void);

        let false_block = self.new_block();
        patch_branch_chain(&mut self.f, &c.false_chain, false_block);
        let zero = self.f.push(false_block, Op::Imm(0), ty);
        self.f.push(false_block, Op::Br(merge_block), void);

        self.cur = merge_block;
        self.f.push(
            merge_block,
            Op::Phi { preds: vec![true_block, false_block], vals: vec![one, zero] },
            ty,
        )
    }

    // ---- ordinary-value expressions ----

    fn lower_expr(&mut self, e: AstId) -> Result<InsId, CompileError> {
        let ty = self.ty_of(e);
        let kind = self.ast.node(e).kind.clone();
        match kind {
            NodeKind::IntImm(n) => Ok(self.f.push(self.cur, Op::Imm(n), ty)),
            NodeKind::FloatImm(n) => Ok(self.f.push(self.cur, Op::FImm(n), ty)),

            // `e`'s own StrLit node is reused verbatim as the constant
            // initialiser backing the pooled global; the lowerer never
            // walks back into it as an ordinary expression.
            NodeKind::StrLit { .. } => {
                let g = self.ast.new_anon_global(ty, GlobalKind::Data(Some(e)));
                Ok(self.f.push(self.cur, Op::GlobalAddr(g), ty))
            }

            NodeKind::InitList(_) => unreachable!("InitList only appears as an initializer, never an ordinary expression"),

            NodeKind::VarRef(sym) => {
                let symbol = self.ast.symbol(sym).clone();
                let addr = match symbol.global {
                    Some(g) => self.f.push(self.cur, Op::GlobalAddr(g), ty),
                    None => *self
                        .locals
                        .get(&sym)
                        .expect("variable resolved to a symbol id without a lowered storage slot"),
                };
                if self.ast.types.is_incomplete(ty) {
                    // functions and unsized arrays: address is the value.
                    if matches!(self.ast.types.get(ty), Type::Function { .. }) {
                        return Ok(addr);
                    }
                }
                match self.ast.types.get(symbol.ty) {
                    Type::Function { .. } | Type::Array { .. } => Ok(addr),
                    _ => Ok(self.f.push(self.cur, Op::Load(addr), ty)),
                }
            }

            NodeKind::ConstPtr { global, offset } => {
                let base = self.f.push(self.cur, Op::GlobalAddr(global), ty);
                if offset == 0 {
                    Ok(base)
                } else {
                    let byte_ty = self.ast.types.t_num(NumKind::Char);
                    let byte_ptr = self.ast.types.t_ptr(byte_ty);
                    let cast = self.f.push(self.cur, Op::Bitcast(base), byte_ptr);
                    let idx = self.f.push(self.cur, Op::Imm(offset), self.ast.types.t_num(NumKind::Long));
                    let addr = self.f.push(self.cur, Op::Idx { base: cast, index: idx, elem: byte_ty }, byte_ptr);
                    Ok(self.f.push(self.cur, Op::Bitcast(addr), ty))
                }
            }

            NodeKind::Binary { op, lhs, rhs } => self.lower_binary(op, lhs, rhs, ty),

            NodeKind::Logical { .. } => {
                let c = self.lower_cond(e)?;
                Ok(self.discharge(c, ty))
            }

            NodeKind::Assign { op: None, lhs, rhs } => {
                let addr = self.lvalue_addr(lhs)?;
                let v = self.lower_expr(rhs)?;
                let void = self.void_ty();
                self.f.push(self.cur, Op::Store { addr, value: v }, void);
                Ok(self.f.push(self.cur, Op::Load(addr), ty))
            }

            NodeKind::Assign { op: Some(op), lhs, rhs } => {
                // The parser never wraps a compound assignment's rhs in a
                // promotion `Conv` (only plain `=` gets `convert_for_assignment`),
                // so the lowerer itself converts rhs to the storage type and
                // folds the operator in at that width, truncating on store
                // for narrower-than-int storage exactly as a plain `=` would.
                let addr = self.lvalue_addr(lhs)?;
                let cur_val = self.f.push(self.cur, Op::Load(addr), ty);
                let rhs_ty = self.ty_of(rhs);
                let rv_raw = self.lower_expr(rhs)?;
                let rv = self.convert_value(rv_raw, rhs_ty, ty)?;
                let result = self.apply_binop(op, cur_val, rv, ty, ty)?;
                let void = self.void_ty();
                self.f.push(self.cur, Op::Store { addr, value: result }, void);
                Ok(self.f.push(self.cur, Op::Load(addr), ty))
            }

            NodeKind::Unary { op: UnOp::AddrOf, operand } => self.lvalue_addr(operand),

            NodeKind::Unary { op: UnOp::Deref, operand } => {
                let addr = self.lower_expr(operand)?;
                Ok(self.f.push(self.cur, Op::Load(addr), ty))
            }

            NodeKind::Unary { op: UnOp::Neg, operand } => {
                let v = self.lower_expr(operand)?;
                let zero = if self.ast.types.is_fp(ty) {
                    self.f.push(self.cur, Op::FImm(0.0), ty)
                } else {
                    self.f.push(self.cur, Op::Imm(0), ty)
                };
                Ok(self.f.push(self.cur, Op::Sub(zero, v), ty))
            }

            NodeKind::Unary { op: UnOp::BitNot, operand } => {
                let v = self.lower_expr(operand)?;
                let neg1 = self.f.push(self.cur, Op::Imm(-1), ty);
                Ok(self.f.push(self.cur, Op::Xor(v, neg1), ty))
            }

            NodeKind::Unary { op: UnOp::LogNot, .. } => {
                let c = self.lower_cond(e)?;
                Ok(self.discharge(c, ty))
            }

            NodeKind::IncDec { pre, increment, operand } => {
                let addr = self.lvalue_addr(operand)?;
                let elem_ty = self.ty_of(operand);
                let old = self.f.push(self.cur, Op::Load(addr), elem_ty);
                let new = if let Some(pointee) = self.ast.types.pointee(elem_ty) {
                    // `p++`/`p--` on a pointer steps by the pointee size,
                    // same scaling as `p + 1` (spec §4.7).
                    let one = self.f.push(self.cur, Op::Imm(1), elem_ty);
                    let index = if increment {
                        one
                    } else {
                        let zero = self.f.push(self.cur, Op::Imm(0), elem_ty);
                        self.f.push(self.cur, Op::Sub(zero, one), elem_ty)
                    };
                    self.f.push(self.cur, Op::Idx { base: old, index, elem: pointee }, elem_ty)
                } else {
                    let one = self.f.push(self.cur, Op::Imm(1), elem_ty);
                    if increment {
                        self.f.push(self.cur, Op::Add(old, one), elem_ty)
                    } else {
                        self.f.push(self.cur, Op::Sub(old, one), elem_ty)
                    }
                };
                let void = self.void_ty();
                self.f.push(self.cur, Op::Store { addr, value: new }, void);
                Ok(if pre { new } else { old })
            }

            NodeKind::Conv { kind, operand } => self.lower_conv(kind, operand, ty),

            NodeKind::Cond { cond, then_, else_ } => {
                let c = self.lower_cond(cond)?;
                let then_block = self.new_block();
                patch_branch_chain(&mut self.f, &c.true_chain, then_block);
                let else_block = self.new_block();
                patch_branch_chain(&mut self.f, &c.false_chain, else_block);
                let merge_block = self.new_block();
                let void = self.void_ty();

                self.cur = then_block;
                let then_v = self.lower_expr(then_)?;
                let then_end = self.cur;
                self.f.push(then_end, Op::Br(merge_block), void);

                self.cur = else_block;
                let else_v = self.lower_expr(else_)?;
                let else_end = self.cur;
                self.f.push(else_end, Op::Br(merge_block), void);

                self.cur = merge_block;
                Ok(self.f.push(
                    merge_block,
                    Op::Phi { preds: vec![then_end, else_end], vals: vec![then_v, else_v] },
                    ty,
                ))
            }

            NodeKind::Index { base, index } => {
                let base_v = self.lower_expr(base)?;
                let index_v = self.lower_expr(index)?;
                let addr = self.f.push(self.cur, Op::Idx { base: base_v, index: index_v, elem: ty }, self.ptr_ty());
                Ok(self.f.push(self.cur, Op::Load(addr), ty))
            }

            NodeKind::Call { callee, args } => {
                let callee_v = self.lower_expr(callee)?;
                let mut arg_vals = Vec::with_capacity(args.len());
                for a in &args {
                    arg_vals.push(self.lower_expr(*a)?);
                }
                let call = self.f.push(self.cur, Op::Call { callee: callee_v, nargs: arg_vals.len() as u32 }, ty);
                for v in arg_vals {
                    let void = self.void_ty();
                    self.f.push(self.cur, Op::CArg(v), void);
                }
                Ok(call)
            }

            NodeKind::Field { base, name, arrow } => {
                let base_ty = self.ty_of(base);
                let base_addr = if arrow { self.lower_expr(base)? } else { self.lvalue_addr(base)? };
                let agg_ty = if arrow {
                    self.ast.types.pointee(base_ty).expect("'->' base resolved to a pointer type at parse time")
                } else {
                    base_ty
                };
                let offset = match self.ast.types.get(agg_ty) {
                    Type::Struct(agg) | Type::Union(agg) => {
                        agg.field(&name).expect("field name resolved at parse time").offset
                    }
                    _ => unreachable!("field base resolved to an aggregate type at parse time"),
                };
                let addr = self.f.push(self.cur, Op::Elem { base: base_addr, offset }, self.ptr_ty());
                Ok(self.f.push(self.cur, Op::Load(addr), ty))
            }

            NodeKind::Comma { lhs, rhs } => {
                self.lower_expr(lhs)?;
                self.lower_expr(rhs)
            }

            other => unreachable!("{other:?} is not an expression node"),
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: AstId, rhs: AstId, ty: TypeId) -> Result<InsId, CompileError> {
        let lty = self.ty_of(lhs);
        let rty = self.ty_of(rhs);
        let l_ptr = self.ast.types.is_pointer(lty);
        let r_ptr = self.ast.types.is_pointer(rty);

        if matches!(op, BinOp::Add | BinOp::Sub) && (l_ptr || r_ptr) {
            return self.lower_pointer_binary(op, lhs, rhs, lty, rty, ty);
        }

        let l = self.lower_expr(lhs)?;
        let r = self.lower_expr(rhs)?;
        // A comparison's operand type (for choosing signed/unsigned/float
        // division and comparison) is the *operands'* common type, not the
        // `int` the comparison itself always results in; for arithmetic ops
        // the two coincide, so read it off whichever operand isn't pointer.
        let operand_ty = lty;
        self.apply_binop(op, l, r, operand_ty, ty)
    }

    /// Pointer arithmetic (spec §4.7): `ptr ± int` scales the integer
    /// operand by the pointee size and emits `Idx`; `ptr - ptr` (to the same
    /// pointee type) subtracts the raw addresses and divides by the pointee
    /// size. Mirrors the scaling the constant evaluator already applies in
    /// `consteval::apply_binary`, which this runtime path must agree with.
    fn lower_pointer_binary(
        &mut self,
        op: BinOp,
        lhs: AstId,
        rhs: AstId,
        lty: TypeId,
        rty: TypeId,
        ty: TypeId,
    ) -> Result<InsId, CompileError> {
        let l_ptr = self.ast.types.is_pointer(lty);
        let r_ptr = self.ast.types.is_pointer(rty);

        if l_ptr && r_ptr {
            // `ptr - ptr`: both operands have the same pointee type at this
            // point (the parser only builds this node for `Sub`).
            let elem = self.ast.types.pointee(lty).expect("pointer type carries a pointee");
            let elem_size = self.ast.types.size_of(elem).max(1) as i64;
            let l = self.lower_expr(lhs)?;
            let r = self.lower_expr(rhs)?;
            let diff = self.f.push(self.cur, Op::Sub(l, r), ty);
            let size = self.f.push(self.cur, Op::Imm(elem_size), ty);
            return Ok(self.f.push(self.cur, Op::SDiv(diff, size), ty));
        }

        // One operand is the pointer, the other the integer; `Idx` always
        // wants (base, index) in that order, so swap them for `int + ptr`.
        let (ptr_ast, int_ast, ptr_ty) = if l_ptr { (lhs, rhs, lty) } else { (rhs, lhs, rty) };
        let elem = self.ast.types.pointee(ptr_ty).expect("pointer type carries a pointee");
        let base = self.lower_expr(ptr_ast)?;
        let index = self.lower_expr(int_ast)?;
        let index = if op == BinOp::Sub {
            let index_ty = self.ty_of(int_ast);
            let zero = self.f.push(self.cur, Op::Imm(0), index_ty);
            self.f.push(self.cur, Op::Sub(zero, index), index_ty)
        } else {
            index
        };
        Ok(self.f.push(self.cur, Op::Idx { base, index, elem }, ty))
    }

    /// `operand_ty` drives signed/unsigned/float dispatch; `result_ty` is
    /// what the produced instruction is tagged with (spec §4.7: comparisons
    /// always yield `int` regardless of their operands' type).
    fn apply_binop(&mut self, op: BinOp, l: InsId, r: InsId, operand_ty: TypeId, result_ty: TypeId) -> Result<InsId, CompileError> {
        let is_fp = self.ast.types.is_fp(operand_ty);
        let unsigned = match self.ast.types.get(operand_ty) {
            Type::Num(k) => k.is_unsigned(),
            _ => false,
        };

        Ok(match op {
            BinOp::Add => self.f.push(self.cur, Op::Add(l, r), result_ty),
            BinOp::Sub => self.f.push(self.cur, Op::Sub(l, r), result_ty),
            BinOp::Mul => self.f.push(self.cur, Op::Mul(l, r), result_ty),
            BinOp::Div if is_fp => self.f.push(self.cur, Op::FDiv(l, r), result_ty),
            BinOp::Div if unsigned => self.f.push(self.cur, Op::UDiv(l, r), result_ty),
            BinOp::Div => self.f.push(self.cur, Op::SDiv(l, r), result_ty),
            BinOp::Mod if unsigned => self.f.push(self.cur, Op::URem(l, r), result_ty),
            BinOp::Mod => self.f.push(self.cur, Op::SRem(l, r), result_ty),
            BinOp::Shl => self.f.push(self.cur, Op::Shl(l, r), result_ty),
            BinOp::Shr => self.f.push(self.cur, Op::Shr(l, r), result_ty),
            BinOp::BitAnd => self.f.push(self.cur, Op::And(l, r), result_ty),
            BinOp::BitOr => self.f.push(self.cur, Op::Or(l, r), result_ty),
            BinOp::BitXor => self.f.push(self.cur, Op::Xor(l, r), result_ty),
            BinOp::Eq => self.f.push(self.cur, Op::Cmp { op: CmpOp::Eq, lhs: l, rhs: r }, result_ty),
            BinOp::Ne => self.f.push(self.cur, Op::Cmp { op: CmpOp::Ne, lhs: l, rhs: r }, result_ty),
            BinOp::Lt => self.f.push(self.cur, Op::Cmp { op: CmpOp::Lt, lhs: l, rhs: r }, result_ty),
            BinOp::Le => self.f.push(self.cur, Op::Cmp { op: CmpOp::Le, lhs: l, rhs: r }, result_ty),
            BinOp::Gt => self.f.push(self.cur, Op::Cmp { op: CmpOp::Gt, lhs: l, rhs: r }, result_ty),
            BinOp::Ge => self.f.push(self.cur, Op::Cmp { op: CmpOp::Ge, lhs: l, rhs: r }, result_ty),
        })
    }

    fn lower_conv(&mut self, kind: ConvKind, operand: AstId, to: TypeId) -> Result<InsId, CompileError> {
        let from = self.ty_of(operand);
        let v = self.lower_expr(operand)?;

        match kind {
            ConvKind::ArrayDecay | ConvKind::FuncDecay => Ok(v),
            ConvKind::ExplicitCast | ConvKind::IntPromote | ConvKind::ArithConv | ConvKind::Truncate => {
                self.convert_value(v, from, to)
            }
        }
    }

    fn convert_value(&mut self, v: InsId, from: TypeId, to: TypeId) -> Result<InsId, CompileError> {
        if self.ast.types.are_equal(from, to) {
            return Ok(v);
        }

        let from_is_ptr = self.ast.types.is_pointer(from);
        let to_is_ptr = self.ast.types.is_pointer(to);
        let from_is_fp = self.ast.types.is_fp(from);
        let to_is_fp = self.ast.types.is_fp(to);

        if from_is_ptr && to_is_ptr {
            return Ok(self.f.push(self.cur, Op::Bitcast(v), to));
        }
        if from_is_ptr && self.ast.types.is_int(to) {
            return Ok(self.f.push(self.cur, Op::PtrToInt(v), to));
        }
        if self.ast.types.is_int(from) && to_is_ptr {
            return Ok(self.f.push(self.cur, Op::IntToPtr(v), to));
        }
        if from_is_fp && to_is_fp {
            return Ok(self.f.push(self.cur, Op::Bitcast(v), to));
        }
        if from_is_fp && !to_is_fp {
            return Ok(self.f.push(self.cur, Op::FloatToInt(v), to));
        }
        if !from_is_fp && to_is_fp {
            return Ok(self.f.push(self.cur, Op::IntToFloat(v), to));
        }

        // integer-to-integer: widen or narrow by declared bit width.
        let from_bits = self.ast.types.size_of(from) * 8;
        let to_bits = self.ast.types.size_of(to) * 8;
        let signed = match self.ast.types.get(from) {
            Type::Num(k) => k.is_signed(),
            _ => true,
        };
        if to_bits < from_bits {
            Ok(self.f.push(self.cur, Op::Trunc(v), to))
        } else if to_bits > from_bits {
            if signed {
                Ok(self.f.push(self.cur, Op::SExt(v), to))
            } else {
                Ok(self.f.push(self.cur, Op::ZExt(v), to))
            }
        } else {
            Ok(self.f.push(self.cur, Op::Bitcast(v), to))
        }
    }
}
