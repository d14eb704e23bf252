//! Human-readable IR dump (spec §4.8's debug-printer interface). Prints
//! every global and every lowered function with blocks and instructions
//! numbered by iteration order, which is already the order `IrFn::new_block`
//! and `IrFn::push` assign them — so the printer just has to walk the arenas
//! in order, never recompute a numbering of its own.

use std::fmt::Write;

use crate::ast::{Ast, GlobalKind};
use crate::types::{NumKind, Type, TypeCtx};

use super::nodes::{BlockId, InsId, IrFn, Op, Program};

pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for (id, global) in program.ast.globals() {
        if matches!(global.kind, GlobalKind::Function { .. }) {
            continue;
        }
        let _ = writeln!(out, "global {}: {}", program.ast.emit_label(id), type_name(&program.ast.types, global.ty));
    }
    for (id, func) in &program.functions {
        let name = &program.ast.global(*id).name;
        let _ = writeln!(out, "\nfn {name} {{");
        dump_fn(&mut out, &program.ast, func);
        let _ = writeln!(out, "}}");
    }
    out
}

fn dump_fn(out: &mut String, ast: &Ast, f: &IrFn) {
    for (i, _) in f.blocks.iter().enumerate() {
        let bb = BlockId(i as u32);
        let _ = writeln!(out, "  bb{}:", bb.0);
        for ins in f.block_instructions(bb) {
            let _ = writeln!(out, "    {}", dump_ins(ast, f, ins));
        }
    }
}

fn dump_ins(ast: &Ast, f: &IrFn, id: InsId) -> String {
    let ins = f.ins(id);
    let ty = type_name(&ast.types, ins.ty);
    let v = |id: InsId| format!("%{}", id.0);
    let body = match &ins.op {
        Op::Imm(n) => format!("imm {n}"),
        Op::FImm(n) => format!("fimm {n}"),
        Op::GlobalAddr(g) => format!("global_addr {}", ast.emit_label(*g)),
        Op::FArg(i) => format!("farg {i}"),
        Op::Alloc { elem, count } => match count {
            Some(c) => format!("alloc {} * {}", type_name(&ast.types, *elem), v(*c)),
            None => format!("alloc {}", type_name(&ast.types, *elem)),
        },
        Op::Load(a) => format!("load {}", v(*a)),
        Op::Store { addr, value } => format!("store {}, {}", v(*addr), v(*value)),
        Op::Idx { base, index, elem } => format!("idx {}, {} [{}]", v(*base), v(*index), type_name(&ast.types, *elem)),
        Op::Elem { base, offset } => format!("elem {}, +{offset}", v(*base)),
        Op::Add(a, b) => format!("add {}, {}", v(*a), v(*b)),
        Op::Sub(a, b) => format!("sub {}, {}", v(*a), v(*b)),
        Op::Mul(a, b) => format!("mul {}, {}", v(*a), v(*b)),
        Op::SDiv(a, b) => format!("sdiv {}, {}", v(*a), v(*b)),
        Op::UDiv(a, b) => format!("udiv {}, {}", v(*a), v(*b)),
        Op::SRem(a, b) => format!("srem {}, {}", v(*a), v(*b)),
        Op::URem(a, b) => format!("urem {}, {}", v(*a), v(*b)),
        Op::FDiv(a, b) => format!("fdiv {}, {}", v(*a), v(*b)),
        Op::Shl(a, b) => format!("shl {}, {}", v(*a), v(*b)),
        Op::Shr(a, b) => format!("shr {}, {}", v(*a), v(*b)),
        Op::And(a, b) => format!("and {}, {}", v(*a), v(*b)),
        Op::Or(a, b) => format!("or {}, {}", v(*a), v(*b)),
        Op::Xor(a, b) => format!("xor {}, {}", v(*a), v(*b)),
        Op::Cmp { op, lhs, rhs } => format!("cmp.{op:?} {}, {}", v(*lhs), v(*rhs)),
        Op::Trunc(a) => format!("trunc {}", v(*a)),
        Op::SExt(a) => format!("sext {}", v(*a)),
        Op::ZExt(a) => format!("zext {}", v(*a)),
        Op::IntToFloat(a) => format!("int_to_float {}", v(*a)),
        Op::FloatToInt(a) => format!("float_to_int {}", v(*a)),
        Op::PtrToInt(a) => format!("ptr_to_int {}", v(*a)),
        Op::IntToPtr(a) => format!("int_to_ptr {}", v(*a)),
        Op::Bitcast(a) => format!("bitcast {}", v(*a)),
        Op::Phi { preds, vals } => {
            let pairs: Vec<String> = preds
                .iter()
                .zip(vals.iter())
                .map(|(b, val)| format!("[bb{} -> {}]", b.0, v(*val)))
                .collect();
            format!("phi {}", pairs.join(", "))
        }
        Op::Br(target) => format!("br bb{}", target.0),
        Op::CondBr { cond, true_, false_ } => format!("condbr {}, bb{}, bb{}", v(*cond), true_.0, false_.0),
        Op::Call { callee, nargs } => format!("call {}, {nargs} args", v(*callee)),
        Op::CArg(a) => format!("carg {}", v(*a)),
        Op::Ret(Some(a)) => format!("ret {}", v(*a)),
        Op::Ret(None) => "ret".to_string(),
        Op::Zero { addr, size } => format!("zero {}, {size}", v(*addr)),
        Op::Copy { dst, src, size } => format!("copy {}, {}, {size}", v(*dst), v(*src)),
    };
    format!("{} = {ty} {body}", v(id))
}

/// Short, stable type spelling for diagnostics and IR dumps, not intended to
/// round-trip through the parser.
pub fn type_name(types: &TypeCtx, id: crate::types::TypeId) -> String {
    match types.get(id) {
        Type::Void => "void".to_string(),
        Type::Num(k) => num_name(*k).to_string(),
        Type::Pointer { elem } => format!("{}*", type_name(types, *elem)),
        Type::Array { elem, .. } => format!("{}[]", type_name(types, *elem)),
        Type::Function { ret, params, vararg } => {
            let mut ps: Vec<String> = params.iter().map(|p| type_name(types, *p)).collect();
            if *vararg {
                ps.push("...".to_string());
            }
            format!("{}({})", type_name(types, *ret), ps.join(", "))
        }
        Type::Struct(agg) => format!("struct {}", agg.tag.clone().unwrap_or_else(|| "<anon>".to_string())),
        Type::Union(agg) => format!("union {}", agg.tag.clone().unwrap_or_else(|| "<anon>".to_string())),
        Type::Enum(e) => format!("enum {}", e.tag.clone().unwrap_or_else(|| "<anon>".to_string())),
    }
}

fn num_name(k: NumKind) -> &'static str {
    match k {
        NumKind::Bool => "_Bool",
        NumKind::Char => "char",
        NumKind::SChar => "signed char",
        NumKind::UChar => "unsigned char",
        NumKind::Short => "short",
        NumKind::UShort => "unsigned short",
        NumKind::Int => "int",
        NumKind::UInt => "unsigned int",
        NumKind::Long => "long",
        NumKind::ULong => "unsigned long",
        NumKind::LongLong => "long long",
        NumKind::ULongLong => "unsigned long long",
        NumKind::Float => "float",
        NumKind::Double => "double",
        NumKind::LongDouble => "long double",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::BuildStamp;
    use std::path::PathBuf;

    fn lower(src: &str) -> Program {
        let pp = crate::preprocess::Preprocessor::new(
            src,
            PathBuf::from("t.c"),
            Vec::new(),
            BuildStamp::new("Jan  1 1970", "00:00:00"),
        );
        let (ast, _warnings) = crate::parse::Parser::parse_translation_unit(pp).expect("parse failed");
        super::super::lower_translation_unit(ast).expect("lowering failed")
    }

    #[test]
    fn dumps_a_trivial_main_with_numbered_blocks_and_values() {
        let program = lower("int main(void) { return 42; }");
        let text = dump_program(&program);
        assert!(text.contains("fn main {"));
        assert!(text.contains("bb0:"));
        assert!(text.contains("imm 42"));
        assert!(text.contains("ret %"));
    }

    #[test]
    fn dumps_a_data_global_with_its_type() {
        let program = lower("int counter = 41; int main(void) { return counter; }");
        let text = dump_program(&program);
        assert!(text.contains("global counter: int"));
    }
}
