//! The constant expression evaluator (spec §4.6).
//!
//! Walks a typed AST node and folds it to an integer immediate, a
//! floating-point immediate, or a *label-with-offset* — a symbolic pointer
//! expressed as an offset from a named [`Global`]. Used by the parser for
//! array bounds, `enum` constants, and `case` labels, and by the IR lowerer
//! for static initialisers. Entirely read-only over [`Ast`]/[`TypeCtx`] and
//! side-effect free, matching the teacher's separation of "fold constants"
//! from "build the tree" (`compiler_frontend/hir/hir_validation.rs` keeps
//! the same kind of evaluation pass distinct from tree construction).

use crate::ast::{Ast, AstId, BinOp, GlobalId, LogOp, NodeKind, UnOp};
use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::types::{NumKind, Type, TypeId};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Label { global: GlobalId, offset: i64 },
}

/// Folds `node` to a constant value, or reports a [`CompileError`] at the
/// node that defeated folding (spec §4.6: "Failure to fold is always
/// reported at the originating token").
pub fn eval(ast: &Ast, node: AstId) -> Result<ConstValue, CompileError> {
    let data = ast.node(node);
    let loc = data.loc.clone();

    match &data.kind {
        NodeKind::IntImm(n) => Ok(ConstValue::Int(*n)),
        NodeKind::FloatImm(f) => Ok(ConstValue::Float(*f)),
        NodeKind::ConstPtr { global, offset } => Ok(ConstValue::Label { global: *global, offset: *offset }),

        NodeKind::Unary { op: UnOp::AddrOf, operand } => {
            let (global, offset) = eval_address(ast, *operand)?;
            Ok(ConstValue::Label { global, offset })
        }
        NodeKind::Unary { op: UnOp::Deref, .. } => {
            Err(CompileError::const_eval("dereference of a non-constant pointer", loc))
        }
        NodeKind::Unary { op, operand } => apply_unary(*op, eval(ast, *operand)?, loc),

        NodeKind::Binary { op, lhs, rhs } => {
            let l = eval(ast, *lhs)?;
            let r = eval(ast, *rhs)?;
            apply_binary(*op, l, r, ast, node, loc)
        }

        NodeKind::Logical { op, lhs, rhs } => {
            let l = eval_int(ast, *lhs)?;
            let short_circuits = match op {
                LogOp::And => l == 0,
                LogOp::Or => l != 0,
            };
            if short_circuits {
                Ok(ConstValue::Int(matches!(op, LogOp::Or) as i64))
            } else {
                Ok(ConstValue::Int((eval_int(ast, *rhs)? != 0) as i64))
            }
        }

        NodeKind::Cond { cond, then_, else_ } => {
            if eval_int(ast, *cond)? != 0 { eval(ast, *then_) } else { eval(ast, *else_) }
        }

        NodeKind::Conv { operand, .. } => {
            let v = eval(ast, *operand)?;
            let to = data.ty.expect("expression node always carries a resolved type");
            convert(v, to, ast, loc)
        }

        NodeKind::Field { .. } | NodeKind::Index { .. } => {
            // Folding the *value* of an aggregate member/element has no
            // general answer without an initializer store to read from;
            // only its address folds (see `eval_address`).
            Err(CompileError::const_eval("expression is not a compile-time constant", loc))
        }

        NodeKind::Comma { rhs, .. } => eval(ast, *rhs),

        _ => Err(CompileError::const_eval("expression is not a compile-time constant", loc)),
    }
}

pub fn eval_int(ast: &Ast, node: AstId) -> Result<i64, CompileError> {
    match eval(ast, node)? {
        ConstValue::Int(n) => Ok(n),
        _ => Err(CompileError::const_eval(
            "expected an integer constant expression",
            ast.node(node).loc.clone(),
        )),
    }
}

pub fn eval_float(ast: &Ast, node: AstId) -> Result<f64, CompileError> {
    match eval(ast, node)? {
        ConstValue::Float(f) => Ok(f),
        ConstValue::Int(n) => Ok(n as f64),
        ConstValue::Label { .. } => Err(CompileError::const_eval(
            "expected a floating-point constant expression",
            ast.node(node).loc.clone(),
        )),
    }
}

/// Folds the *address* of an lvalue expression to `(global, byte offset)`
/// (spec §4.6: `&v`, and struct-field/array-index address propagation).
fn eval_address(ast: &Ast, node: AstId) -> Result<(GlobalId, i64), CompileError> {
    let data = ast.node(node);
    let loc = data.loc.clone();

    match &data.kind {
        NodeKind::VarRef(sym) => {
            let symbol = ast.symbol(*sym);
            symbol
                .global
                .map(|g| (g, 0))
                .ok_or_else(|| CompileError::const_eval("address of a local variable is not a constant expression", loc))
        }

        NodeKind::Unary { op: UnOp::Deref, operand } => match eval(ast, *operand)? {
            ConstValue::Label { global, offset } => Ok((global, offset)),
            _ => Err(CompileError::const_eval("dereference of a non-constant pointer", loc)),
        },

        NodeKind::Field { base, name, arrow } => {
            let (global, base_offset, struct_ty) = if *arrow {
                let (g, off) = match eval(ast, *base)? {
                    ConstValue::Label { global, offset } => (global, offset),
                    _ => return Err(CompileError::const_eval("base of '->' is not a constant pointer", loc)),
                };
                let ptr_ty = ast.type_of(*base).expect("expression node always carries a resolved type");
                let pointee = ast.types.pointee(ptr_ty).ok_or_else(|| {
                    CompileError::internal("'->' base did not resolve to a pointer type", loc.clone())
                })?;
                (g, off, pointee)
            } else {
                let (g, off) = eval_address(ast, *base)?;
                let ty = ast.type_of(*base).expect("expression node always carries a resolved type");
                (g, off, ty)
            };

            let field_offset = match ast.types.get(struct_ty) {
                Type::Struct(agg) | Type::Union(agg) => agg
                    .field(name)
                    .ok_or_else(|| CompileError::internal(format!("unknown field '{name}'"), loc.clone()))?
                    .offset,
                _ => return Err(CompileError::internal("'.'/'->' base is not an aggregate type", loc)),
            };
            Ok((global, base_offset + field_offset as i64))
        }

        NodeKind::Index { base, index } => {
            let (global, base_offset) = eval_address(ast, *base)?;
            let idx = eval_int(ast, *index)?;
            let elem_ty = ast
                .types
                .element_of(ast.type_of(*base).expect("expression node always carries a resolved type"))
                .ok_or_else(|| CompileError::internal("index base is not an array type", loc.clone()))?;
            let size = ast.types.size_of(elem_ty) as i64;
            Ok((global, base_offset + idx * size))
        }

        _ => Err(CompileError::const_eval("expression is not a compile-time address", loc)),
    }
}

fn apply_unary(op: UnOp, v: ConstValue, loc: SourceLoc) -> Result<ConstValue, CompileError> {
    match (op, v) {
        (UnOp::Neg, ConstValue::Int(n)) => Ok(ConstValue::Int(n.wrapping_neg())),
        (UnOp::Neg, ConstValue::Float(f)) => Ok(ConstValue::Float(-f)),
        (UnOp::BitNot, ConstValue::Int(n)) => Ok(ConstValue::Int(!n)),
        (UnOp::LogNot, ConstValue::Int(n)) => Ok(ConstValue::Int((n == 0) as i64)),
        (UnOp::LogNot, ConstValue::Float(f)) => Ok(ConstValue::Int((f == 0.0) as i64)),
        _ => Err(CompileError::const_eval("invalid unary operator in constant expression", loc)),
    }
}

/// The operand carrying the pointer in a `Binary` node (for `ptr ± int`),
/// and its pointee size (spec §4.6: integer side scales by pointee size).
fn pointee_size(ast: &Ast, lhs: AstId, rhs: AstId) -> Result<i64, CompileError> {
    let lt = ast.type_of(lhs).expect("expression node always carries a resolved type");
    let rt = ast.type_of(rhs).expect("expression node always carries a resolved type");
    let ptr_ty = if ast.types.is_pointer(lt) { lt } else { rt };
    let elem = ast
        .types
        .pointee(ptr_ty)
        .ok_or_else(|| CompileError::internal("pointer arithmetic operand is not a pointer", ast.node(lhs).loc.clone()))?;
    Ok(ast.types.size_of(elem).max(1) as i64)
}

fn is_unsigned_operand(ast: &Ast, lhs: AstId) -> bool {
    match ast.type_of(lhs).map(|t| ast.types.get(t)) {
        Some(Type::Num(k)) => k.is_unsigned(),
        Some(Type::Enum(e)) => matches!(ast.types.get(e.underlying), Type::Num(k) if k.is_unsigned()),
        _ => false,
    }
}

fn apply_binary(op: BinOp, l: ConstValue, r: ConstValue, ast: &Ast, node: AstId, loc: SourceLoc) -> Result<ConstValue, CompileError> {
    use ConstValue::*;
    let NodeKind::Binary { lhs, rhs, .. } = &ast.node(node).kind else {
        unreachable!("apply_binary only called for Binary nodes")
    };

    match (op, l, r) {
        (BinOp::Add, Label { global, offset }, Int(n)) | (BinOp::Add, Int(n), Label { global, offset }) => {
            let size = pointee_size(ast, *lhs, *rhs)?;
            Ok(Label { global, offset: offset + n * size })
        }
        (BinOp::Sub, Label { global, offset }, Int(n)) => {
            let size = pointee_size(ast, *lhs, *rhs)?;
            Ok(Label { global, offset: offset - n * size })
        }
        (BinOp::Sub, Label { global: g1, offset: o1 }, Label { global: g2, offset: o2 }) => {
            if g1 != g2 {
                return Err(CompileError::const_eval("pointer difference between distinct symbols", loc));
            }
            let size = pointee_size(ast, *lhs, *rhs)?.max(1);
            Ok(Int((o1 - o2) / size))
        }
        (BinOp::Eq, Label { global: g1, offset: o1 }, Label { global: g2, offset: o2 }) => {
            Ok(Int((g1 == g2 && o1 == o2) as i64))
        }
        (BinOp::Ne, Label { global: g1, offset: o1 }, Label { global: g2, offset: o2 }) => {
            Ok(Int((g1 != g2 || o1 != o2) as i64))
        }
        // A named global's address is never the null pointer.
        (BinOp::Eq, Label { .. }, Int(0)) | (BinOp::Eq, Int(0), Label { .. }) => Ok(Int(0)),
        (BinOp::Ne, Label { .. }, Int(0)) | (BinOp::Ne, Int(0), Label { .. }) => Ok(Int(1)),

        (op, Int(a), Int(b)) => int_binop(op, a, b, is_unsigned_operand(ast, *lhs), ast, node, loc),
        (op, Float(a), Float(b)) => float_binop(op, a, b, loc),
        (op, Int(a), Float(b)) => float_binop(op, a as f64, b, loc),
        (op, Float(a), Int(b)) => float_binop(op, a, b as f64, loc),

        _ => Err(CompileError::const_eval("invalid operand combination in constant expression", loc)),
    }
}

fn int_binop(op: BinOp, a: i64, b: i64, unsigned: bool, ast: &Ast, node: AstId, loc: SourceLoc) -> Result<ConstValue, CompileError> {
    if unsigned {
        let (ua, ub) = (a as u64, b as u64);
        let raw: i64 = match op {
            BinOp::Add => ua.wrapping_add(ub) as i64,
            BinOp::Sub => ua.wrapping_sub(ub) as i64,
            BinOp::Mul => ua.wrapping_mul(ub) as i64,
            BinOp::Div => {
                if ub == 0 {
                    return Err(CompileError::const_eval("division by zero in constant expression", loc));
                }
                (ua / ub) as i64
            }
            BinOp::Mod => {
                if ub == 0 {
                    return Err(CompileError::const_eval("division by zero in constant expression", loc));
                }
                (ua % ub) as i64
            }
            BinOp::Shl => ua.wrapping_shl((ub & 63) as u32) as i64,
            BinOp::Shr => ua.wrapping_shr((ub & 63) as u32) as i64,
            BinOp::BitAnd => (ua & ub) as i64,
            BinOp::BitOr => (ua | ub) as i64,
            BinOp::BitXor => (ua ^ ub) as i64,
            BinOp::Eq => return Ok(ConstValue::Int((ua == ub) as i64)),
            BinOp::Ne => return Ok(ConstValue::Int((ua != ub) as i64)),
            BinOp::Lt => return Ok(ConstValue::Int((ua < ub) as i64)),
            BinOp::Le => return Ok(ConstValue::Int((ua <= ub) as i64)),
            BinOp::Gt => return Ok(ConstValue::Int((ua > ub) as i64)),
            BinOp::Ge => return Ok(ConstValue::Int((ua >= ub) as i64)),
        };
        let ty = ast.type_of(node).expect("expression node always carries a resolved type");
        return Ok(ConstValue::Int(truncate_to(raw as i128, ty, ast)));
    }

    let raw: i128 = match op {
        BinOp::Add => a as i128 + b as i128,
        BinOp::Sub => a as i128 - b as i128,
        BinOp::Mul => a as i128 * b as i128,
        BinOp::Div => {
            if b == 0 {
                return Err(CompileError::const_eval("division by zero in constant expression", loc));
            }
            a as i128 / b as i128
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(CompileError::const_eval("division by zero in constant expression", loc));
            }
            a as i128 % b as i128
        }
        BinOp::Shl => (a as i128) << (b & 63),
        BinOp::Shr => (a as i128) >> (b & 63),
        BinOp::BitAnd => a as i128 & b as i128,
        BinOp::BitOr => a as i128 | b as i128,
        BinOp::BitXor => a as i128 ^ b as i128,
        BinOp::Eq => return Ok(ConstValue::Int((a == b) as i64)),
        BinOp::Ne => return Ok(ConstValue::Int((a != b) as i64)),
        BinOp::Lt => return Ok(ConstValue::Int((a < b) as i64)),
        BinOp::Le => return Ok(ConstValue::Int((a <= b) as i64)),
        BinOp::Gt => return Ok(ConstValue::Int((a > b) as i64)),
        BinOp::Ge => return Ok(ConstValue::Int((a >= b) as i64)),
    };
    let ty = ast.type_of(node).expect("expression node always carries a resolved type");
    Ok(ConstValue::Int(truncate_to(raw, ty, ast)))
}

fn float_binop(op: BinOp, a: f64, b: f64, loc: SourceLoc) -> Result<ConstValue, CompileError> {
    Ok(match op {
        BinOp::Add => ConstValue::Float(a + b),
        BinOp::Sub => ConstValue::Float(a - b),
        BinOp::Mul => ConstValue::Float(a * b),
        BinOp::Div => ConstValue::Float(a / b),
        BinOp::Eq => ConstValue::Int((a == b) as i64),
        BinOp::Ne => ConstValue::Int((a != b) as i64),
        BinOp::Lt => ConstValue::Int((a < b) as i64),
        BinOp::Le => ConstValue::Int((a <= b) as i64),
        BinOp::Gt => ConstValue::Int((a > b) as i64),
        BinOp::Ge => ConstValue::Int((a >= b) as i64),
        _ => return Err(CompileError::const_eval("invalid operator on floating-point constants", loc)),
    })
}

fn num_bits_signed(ty: TypeId, ast: &Ast) -> (u32, bool) {
    match ast.types.get(ty) {
        Type::Num(k) => ((k.size() as u32) * 8, !k.is_unsigned()),
        Type::Enum(e) => num_bits_signed(e.underlying, ast),
        Type::Pointer { .. } => (64, false),
        _ => (64, true),
    }
}

/// Truncates/sign-extends a wide intermediate result down to `ty`'s width
/// and signedness (spec §4.6: "Conversions truncate/sign-extend integers
/// per bit width").
fn truncate_to(raw: i128, ty: TypeId, ast: &Ast) -> i64 {
    let (bits, signed) = num_bits_signed(ty, ast);
    if bits >= 64 {
        return raw as i64;
    }
    let mask = (1i128 << bits) - 1;
    let v = raw & mask;
    if signed && (v & (1i128 << (bits - 1))) != 0 {
        (v - (1i128 << bits)) as i64
    } else {
        v as i64
    }
}

fn convert(v: ConstValue, to: TypeId, ast: &Ast, loc: SourceLoc) -> Result<ConstValue, CompileError> {
    match (v, ast.types.get(to)) {
        (ConstValue::Int(n), Type::Num(k)) if k.is_float() => Ok(ConstValue::Float(n as f64)),
        (ConstValue::Float(f), Type::Num(k)) if !k.is_float() => Ok(ConstValue::Int(truncate_to(f as i128, to, ast))),
        (ConstValue::Int(n), Type::Num(_)) | (ConstValue::Int(n), Type::Enum(_)) => {
            Ok(ConstValue::Int(truncate_to(n as i128, to, ast)))
        }
        // float-to-float width changes keep the value; we don't model the
        // precision loss of a double truncated to float.
        (ConstValue::Float(f), Type::Num(_)) => Ok(ConstValue::Float(f)),
        (v @ ConstValue::Label { .. }, Type::Pointer { .. }) => Ok(v),
        // `0` converted to a pointer type is the null pointer constant.
        (ConstValue::Int(0), Type::Pointer { .. }) => Ok(ConstValue::Int(0)),
        (ConstValue::Label { .. }, _) => {
            Err(CompileError::const_eval("cannot convert a symbolic address to this type", loc))
        }
        (v, _) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Linkage;
    use crate::diagnostics::errors::SourceLoc;
    use crate::types::NumKind;
    use std::path::PathBuf;

    fn loc() -> SourceLoc {
        SourceLoc { file: PathBuf::from("t.c"), line: 1, col: 1 }
    }

    #[test]
    fn folds_arithmetic_in_the_result_type() {
        let mut ast = Ast::new();
        let char_ty = ast.types.t_num(NumKind::Char);
        let a = ast.push(NodeKind::IntImm(100), Some(char_ty), loc());
        let b = ast.push(NodeKind::IntImm(100), Some(char_ty), loc());
        let sum = ast.push(NodeKind::Binary { op: BinOp::Add, lhs: a, rhs: b }, Some(char_ty), loc());
        // 100 + 100 = 200, which wraps a signed 8-bit char to -56.
        assert_eq!(eval_int(&ast, sum).unwrap(), -56);
    }

    #[test]
    fn folds_pointer_plus_int_by_element_size() {
        let mut ast = Ast::new();
        let int_ty = ast.types.t_num(NumKind::Int);
        let ptr_ty = ast.types.t_ptr(int_ty);
        let g = ast.new_global("arr", int_ty, Linkage::None, crate::ast::GlobalKind::Data(None));
        let sym = ast.new_symbol("arr", int_ty, true, Linkage::None, Some(g));
        let var = ast.push(NodeKind::VarRef(sym), Some(int_ty), loc());
        let addr = ast.push(NodeKind::Unary { op: UnOp::AddrOf, operand: var }, Some(ptr_ty), loc());
        let three = ast.push(NodeKind::IntImm(3), Some(int_ty), loc());
        let sum = ast.push(NodeKind::Binary { op: BinOp::Add, lhs: addr, rhs: three }, Some(ptr_ty), loc());
        match eval(&ast, sum).unwrap() {
            ConstValue::Label { global, offset } => {
                assert_eq!(global, g);
                assert_eq!(offset, 12);
            }
            other => panic!("expected a label, got {other:?}"),
        }
    }

    #[test]
    fn pointer_difference_across_symbols_is_rejected() {
        let mut ast = Ast::new();
        let int_ty = ast.types.t_num(NumKind::Int);
        let ptr_ty = ast.types.t_ptr(int_ty);
        let g1 = ast.new_global("a", int_ty, Linkage::None, crate::ast::GlobalKind::Data(None));
        let g2 = ast.new_global("b", int_ty, Linkage::None, crate::ast::GlobalKind::Data(None));
        let a = ast.push(NodeKind::ConstPtr { global: g1, offset: 0 }, Some(ptr_ty), loc());
        let b = ast.push(NodeKind::ConstPtr { global: g2, offset: 0 }, Some(ptr_ty), loc());
        let long_ty = ast.types.t_num(NumKind::LongLong);
        let diff = ast.push(NodeKind::Binary { op: BinOp::Sub, lhs: a, rhs: b }, Some(long_ty), loc());
        assert!(eval(&ast, diff).is_err());
    }

    #[test]
    fn division_by_zero_is_reported() {
        let mut ast = Ast::new();
        let int_ty = ast.types.t_num(NumKind::Int);
        let a = ast.push(NodeKind::IntImm(1), Some(int_ty), loc());
        let zero = ast.push(NodeKind::IntImm(0), Some(int_ty), loc());
        let div = ast.push(NodeKind::Binary { op: BinOp::Div, lhs: a, rhs: zero }, Some(int_ty), loc());
        assert!(eval_int(&ast, div).is_err());
    }
}
