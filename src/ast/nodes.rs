//! The typed AST (spec §3, §4.5): a tagged union over every expression and
//! statement form C needs, arena-indexed the same way as [`crate::types`]
//! and [`crate::ir`] rather than boxed/linked via raw pointers — grounded on
//! `ast/ast_nodes.rs`'s enum-per-node-kind shape and `hir/hir_nodes.rs`'s
//! "every node owns its resolved type" discipline.

use crate::diagnostics::errors::SourceLoc;
use crate::lex::StringEncoding;
use crate::types::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AstId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Linkage {
    None,
    Static,
    Extern,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    BitNot,
    LogNot,
    Deref,
    AddrOf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvKind {
    IntPromote,
    ArithConv,
    ArrayDecay,
    FuncDecay,
    ExplicitCast,
    /// Narrowing/bitcast inserted when storing a wider arithmetic result
    /// into a narrower lvalue (compound-assignment truncation, spec §4.7).
    Truncate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitSlot {
    Index(u64),
    Field(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitElem {
    pub slot: InitSlot,
    pub value: AstId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseArm {
    /// `None` marks the `default:` arm.
    pub value: Option<i64>,
    pub body: AstId,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    // ---- expressions ----
    IntImm(i64),
    FloatImm(f64),
    StrLit { value: String, encoding: StringEncoding },
    InitList(Vec<InitElem>),
    VarRef(SymbolId),
    TypedefRef(TypeId),
    /// Address-of-named-global plus a signed byte offset (spec §3): the
    /// representation a constant pointer takes once folded.
    ConstPtr { global: GlobalId, offset: i64 },
    Binary { op: BinOp, lhs: AstId, rhs: AstId },
    Logical { op: LogOp, lhs: AstId, rhs: AstId },
    /// `op: None` is plain `=`; `Some(op)` is a compound assignment whose
    /// operator is folded in (spec §4.7).
    Assign { op: Option<BinOp>, lhs: AstId, rhs: AstId },
    Unary { op: UnOp, operand: AstId },
    IncDec { pre: bool, increment: bool, operand: AstId },
    Conv { kind: ConvKind, operand: AstId },
    Cond { cond: AstId, then_: AstId, else_: AstId },
    Index { base: AstId, index: AstId },
    Call { callee: AstId, args: Vec<AstId> },
    Field { base: AstId, name: String, arrow: bool },
    Comma { lhs: AstId, rhs: AstId },

    // ---- statements (linked via AstNodeData::next) ----
    /// Block-scope declarations; automatic-storage entries carry their
    /// initialiser inline (static/extern locals instead store it on the
    /// backing [`Global`], spec §4.5).
    VarDeclStmt { vars: Vec<(SymbolId, Option<AstId>)> },
    TypedefStmt,
    ExprStmt(AstId),
    CompoundStmt { first: Option<AstId> },
    If { cond: AstId, then_: AstId, else_: Option<AstId> },
    While { cond: AstId, body: AstId },
    DoWhile { body: AstId, cond: AstId },
    For { init: Option<AstId>, cond: Option<AstId>, step: Option<AstId>, body: AstId },
    Switch { cond: AstId, body: AstId, cases: Vec<CaseArm> },
    Case { value: i64, inner: AstId },
    Default { inner: AstId },
    Break,
    Continue,
    Goto(String),
    Label { name: String, inner: AstId },
    Return(Option<AstId>),
}

#[derive(Clone, Debug)]
pub struct AstNodeData {
    pub kind: NodeKind,
    /// Resolved type: always present on expression nodes, always absent on
    /// statement nodes (spec §3: "every expression node carries its fully
    /// resolved result type").
    pub ty: Option<TypeId>,
    pub loc: SourceLoc,
    /// Threads statement sequences together; unused by expression nodes
    /// (spec §3: "Statement nodes are linked via a next pointer").
    pub next: Option<AstId>,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeId,
    pub is_global: bool,
    pub linkage: Linkage,
    /// The [`Global`] this symbol names, when `is_global`; lets constant
    /// evaluation turn `&x` into a `Label` without re-resolving the name
    /// (spec §4.6).
    pub global: Option<GlobalId>,
}

#[derive(Clone, Debug)]
pub enum GlobalKind {
    /// `Some` initialiser, or `None` for a tentative/extern declaration.
    Data(Option<AstId>),
    /// `params` binds one [`SymbolId`] per declared parameter, in order, so
    /// the IR lowerer can emit an `FArg` instruction per parameter without
    /// re-walking the declarator; `body` is `Some` (a `CompoundStmt`) for a
    /// definition, `None` for a prototype.
    Function { params: Vec<SymbolId>, body: Option<AstId> },
}

#[derive(Clone, Debug)]
pub struct Global {
    pub name: String,
    pub ty: TypeId,
    pub linkage: Linkage,
    pub kind: GlobalKind,
    /// `_G.<n>` for a compiler-synthesised anonymous constant (spec §3);
    /// `None` for anything with a source-level name, which uses `name`
    /// itself (with platform underscore-prefixing left to the assembler).
    pub label: Option<String>,
}
