//! Expression parsing (spec §4.5): Pratt-style precedence climbing over a
//! fixed table (comma, assignment, ternary, logical or/and, bitwise
//! or/xor/and, equality, relational, shift, additive, multiplicative,
//! unary, postfix), with every implicit conversion materialised as an
//! explicit `Conv` node rather than left implicit in the tree — grounded on
//! the usual-arithmetic-conversion and decay rules the teacher's
//! `hir/hir_validation.rs` type-checking pass applies, generalised from that
//! language's simpler numeric tower to C's integer/float/pointer lattice.

use super::Parser;
use crate::ast::{Binding, BinOp, ConvKind, LogOp, NodeKind, UnOp};
use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::lex::{StringEncoding, TokenKind};
use crate::types::{NumKind, Type, TypeId};
use crate::ast::AstId;

impl Parser {
    // ---- entry points ----

    /// The comma operator: lowest precedence, used at statement/for-clause
    /// boundaries where a full expression (not just an assignment) is legal.
    pub(crate) fn parse_expr(&mut self) -> Result<AstId, CompileError> {
        let mut lhs = self.parse_assignment_expr()?;
        while self.check_punc(",") {
            let loc = self.loc();
            self.bump()?;
            let rhs = self.parse_assignment_expr()?;
            let ty = self.ast.type_of(rhs);
            lhs = self.ast.push(NodeKind::Comma { lhs, rhs }, ty, loc);
        }
        Ok(lhs)
    }

    pub(crate) fn parse_assignment_expr(&mut self) -> Result<AstId, CompileError> {
        let lhs = self.parse_conditional_expr()?;

        let op = match &self.cur.kind {
            TokenKind::Punctuator("=") => Some(None),
            TokenKind::Punctuator("+=") => Some(Some(BinOp::Add)),
            TokenKind::Punctuator("-=") => Some(Some(BinOp::Sub)),
            TokenKind::Punctuator("*=") => Some(Some(BinOp::Mul)),
            TokenKind::Punctuator("/=") => Some(Some(BinOp::Div)),
            TokenKind::Punctuator("%=") => Some(Some(BinOp::Mod)),
            TokenKind::Punctuator("<<=") => Some(Some(BinOp::Shl)),
            TokenKind::Punctuator(">>=") => Some(Some(BinOp::Shr)),
            TokenKind::Punctuator("&=") => Some(Some(BinOp::BitAnd)),
            TokenKind::Punctuator("^=") => Some(Some(BinOp::BitXor)),
            TokenKind::Punctuator("|=") => Some(Some(BinOp::BitOr)),
            _ => None,
        };

        let Some(op) = op else { return Ok(lhs) };
        let loc = self.loc();
        self.bump()?;
        let rhs = self.parse_assignment_expr()?;
        let lty = self.ast.type_of(lhs).expect("expression node always carries a resolved type");

        let rhs = match op {
            None => self.convert_for_assignment(rhs, lty)?,
            Some(_) => rhs,
        };

        Ok(self.ast.push(NodeKind::Assign { op, lhs, rhs }, Some(lty), loc))
    }

    fn parse_conditional_expr(&mut self) -> Result<AstId, CompileError> {
        let cond = self.parse_logical_or()?;
        if !self.check_punc("?") {
            return Ok(cond);
        }
        let loc = self.loc();
        self.bump()?;
        let then_ = self.parse_expr()?;
        self.expect_punc(":")?;
        let else_ = self.parse_conditional_expr()?;

        let tty = self.ast.type_of(then_).expect("expression node always carries a resolved type");
        let ety = self.ast.type_of(else_).expect("expression node always carries a resolved type");
        let result_ty = self.usual_arith_result_type(tty, ety);
        let then_ = self.convert_to(then_, result_ty)?;
        let else_ = self.convert_to(else_, result_ty)?;

        Ok(self.ast.push(NodeKind::Cond { cond, then_, else_ }, Some(result_ty), loc))
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<AstId, CompileError>,
        ops: &[(&str, BinOp)],
    ) -> Result<AstId, CompileError> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (punc, op) in ops {
                if self.check_punc(punc) {
                    let loc = self.loc();
                    self.bump()?;
                    let rhs = next(self)?;
                    lhs = self.build_binary(*op, lhs, rhs, loc)?;
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_logical_or(&mut self) -> Result<AstId, CompileError> {
        let mut lhs = self.parse_logical_and()?;
        while self.check_punc("||") {
            let loc = self.loc();
            self.bump()?;
            let rhs = self.parse_logical_and()?;
            let int_ty = self.ast.types.t_num(NumKind::Int);
            lhs = self.ast.push(NodeKind::Logical { op: LogOp::Or, lhs, rhs }, Some(int_ty), loc);
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<AstId, CompileError> {
        let mut lhs = self.parse_bitor()?;
        while self.check_punc("&&") {
            let loc = self.loc();
            self.bump()?;
            let rhs = self.parse_bitor()?;
            let int_ty = self.ast.types.t_num(NumKind::Int);
            lhs = self.ast.push(NodeKind::Logical { op: LogOp::And, lhs, rhs }, Some(int_ty), loc);
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(Self::parse_bitxor, &[("|", BinOp::BitOr)])
    }

    fn parse_bitxor(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(Self::parse_bitand, &[("^", BinOp::BitXor)])
    }

    fn parse_bitand(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(Self::parse_equality, &[("&", BinOp::BitAnd)])
    }

    fn parse_equality(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(Self::parse_relational, &[("==", BinOp::Eq), ("!=", BinOp::Ne)])
    }

    fn parse_relational(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(
            Self::parse_shift,
            &[("<", BinOp::Lt), ("<=", BinOp::Le), (">", BinOp::Gt), (">=", BinOp::Ge)],
        )
    }

    fn parse_shift(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(Self::parse_additive, &[("<<", BinOp::Shl), (">>", BinOp::Shr)])
    }

    fn parse_additive(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(Self::parse_multiplicative, &[("+", BinOp::Add), ("-", BinOp::Sub)])
    }

    fn parse_multiplicative(&mut self) -> Result<AstId, CompileError> {
        self.binary_level(Self::parse_cast, &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)])
    }

    // ---- casts, unary, postfix, primary ----

    fn parse_cast(&mut self) -> Result<AstId, CompileError> {
        if self.check_punc("(") {
            let starts_type = {
                let nxt = self.peek()?.clone();
                self.token_starts_type(&nxt)
            };
            if starts_type {
                let loc = self.loc();
                self.bump()?; // '('
                let specs = self.parse_decl_specifiers()?;
                let (_, ty) = self.declarator(specs.base)?;
                self.expect_punc(")")?;

                if self.check_punc("{") {
                    return self.parse_compound_literal(ty, loc);
                }

                let operand = self.parse_cast()?;
                return Ok(self.ast.push(NodeKind::Conv { kind: ConvKind::ExplicitCast, operand }, Some(ty), loc));
            }
        }
        self.parse_unary()
    }

    fn parse_compound_literal(&mut self, ty: TypeId, loc: SourceLoc) -> Result<AstId, CompileError> {
        let init = self.parse_initializer(ty)?;
        let g = self.ast.new_anon_global(ty, crate::ast::GlobalKind::Data(Some(init)));
        let sym = self.ast.new_symbol(self.ast.emit_label(g).to_string(), ty, true, crate::ast::Linkage::Static, Some(g));
        Ok(self.ast.push(NodeKind::VarRef(sym), Some(ty), loc))
    }

    fn parse_unary(&mut self) -> Result<AstId, CompileError> {
        if self.check_kw("sizeof") {
            return self.parse_sizeof();
        }

        let unary_op = match &self.cur.kind {
            TokenKind::Punctuator("&") => Some(UnOp::AddrOf),
            TokenKind::Punctuator("*") => Some(UnOp::Deref),
            TokenKind::Punctuator("-") => Some(UnOp::Neg),
            TokenKind::Punctuator("~") => Some(UnOp::BitNot),
            TokenKind::Punctuator("!") => Some(UnOp::LogNot),
            TokenKind::Punctuator("+") => None, // unary plus: no-op besides promotion
            _ => return self.parse_inc_dec_or_postfix(),
        };

        let loc = self.loc();
        self.bump()?;

        match unary_op {
            None => {
                // Consumed a leading '+': promote and return the operand.
                let operand = self.parse_cast()?;
                self.int_promote(operand)
            }
            Some(UnOp::AddrOf) => {
                let operand = self.parse_cast()?;
                let operand_ty = self.ast.type_of(operand).expect("expression node always carries a resolved type");
                let ptr_ty = self.ast.types.t_ptr(operand_ty);
                Ok(self.ast.push(NodeKind::Unary { op: UnOp::AddrOf, operand }, Some(ptr_ty), loc))
            }
            Some(UnOp::Deref) => {
                let operand = self.parse_cast()?;
                let operand = self.decay(operand)?;
                let operand_ty = self.ast.type_of(operand).expect("expression node always carries a resolved type");
                let pointee = self.ast.types.pointee(operand_ty).ok_or_else(|| {
                    CompileError::semantic("cannot dereference a non-pointer expression", loc.clone())
                })?;
                Ok(self.ast.push(NodeKind::Unary { op: UnOp::Deref, operand }, Some(pointee), loc))
            }
            Some(UnOp::Neg) | Some(UnOp::BitNot) => {
                let operand = self.parse_cast()?;
                let operand = self.int_promote(operand)?;
                let ty = self.ast.type_of(operand).expect("expression node always carries a resolved type");
                Ok(self.ast.push(NodeKind::Unary { op: unary_op.unwrap(), operand }, Some(ty), loc))
            }
            Some(UnOp::LogNot) => {
                let operand = self.parse_cast()?;
                let int_ty = self.ast.types.t_num(NumKind::Int);
                Ok(self.ast.push(NodeKind::Unary { op: UnOp::LogNot, operand }, Some(int_ty), loc))
            }
        }
    }

    fn parse_sizeof(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'sizeof'
        let ul = self.ast.types.t_num(NumKind::ULong);

        if self.check_punc("(") {
            let starts_type = {
                let nxt = self.peek()?.clone();
                self.token_starts_type(&nxt)
            };
            if starts_type {
                self.bump()?; // '('
                let specs = self.parse_decl_specifiers()?;
                let (_, ty) = self.declarator(specs.base)?;
                self.expect_punc(")")?;
                let size = self.ast.types.size_of(ty);
                return Ok(self.ast.push(NodeKind::IntImm(size as i64), Some(ul), loc));
            }
        }

        let operand = self.parse_unary()?;
        let ty = self.ast.type_of(operand).expect("expression node always carries a resolved type");
        let size = self.ast.types.size_of(ty);
        Ok(self.ast.push(NodeKind::IntImm(size as i64), Some(ul), loc))
    }

    fn parse_inc_dec_or_postfix(&mut self) -> Result<AstId, CompileError> {
        if self.check_punc("++") || self.check_punc("--") {
            let loc = self.loc();
            let increment = self.check_punc("++");
            self.bump()?;
            let operand = self.parse_unary()?;
            let ty = self.ast.type_of(operand).expect("expression node always carries a resolved type");
            return Ok(self.ast.push(NodeKind::IncDec { pre: true, increment, operand }, Some(ty), loc));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<AstId, CompileError> {
        let mut e = self.parse_primary()?;
        loop {
            if self.check_punc("[") {
                let loc = self.loc();
                self.bump()?;
                let index = self.parse_expr()?;
                self.expect_punc("]")?;
                let base = self.decay(e)?;
                let base_ty = self.ast.type_of(base).expect("expression node always carries a resolved type");
                let elem = self.ast.types.pointee(base_ty).ok_or_else(|| {
                    CompileError::semantic("subscripted value is not an array or pointer", loc.clone())
                })?;
                e = self.ast.push(NodeKind::Index { base, index }, Some(elem), loc);
            } else if self.check_punc("(") {
                let loc = self.loc();
                self.bump()?;
                let mut args = Vec::new();
                if !self.check_punc(")") {
                    loop {
                        args.push(self.parse_assignment_expr()?);
                        if !self.eat_punc(",")? {
                            break;
                        }
                    }
                }
                self.expect_punc(")")?;
                let callee_ty = self.ast.type_of(e).expect("expression node always carries a resolved type");
                let fn_ty = match self.ast.types.get(callee_ty) {
                    Type::Pointer { elem } => *elem,
                    _ => callee_ty,
                };
                let ret = match self.ast.types.get(fn_ty) {
                    Type::Function { ret, .. } => *ret,
                    _ => return Err(CompileError::semantic("called object is not a function", loc)),
                };
                e = self.ast.push(NodeKind::Call { callee: e, args }, Some(ret), loc);
            } else if self.check_punc(".") || self.check_punc("->") {
                let arrow = self.check_punc("->");
                let loc = self.loc();
                self.bump()?;
                let name = self.expect_ident()?;
                let base_ty = self.ast.type_of(e).expect("expression node always carries a resolved type");
                let agg_ty = if arrow {
                    self.ast.types.pointee(base_ty).ok_or_else(|| {
                        CompileError::semantic("'->' requires a pointer to struct/union", loc.clone())
                    })?
                } else {
                    base_ty
                };
                let field_ty = match self.ast.types.get(agg_ty) {
                    Type::Struct(agg) | Type::Union(agg) => agg
                        .field(&name)
                        .ok_or_else(|| CompileError::semantic(format!("no member named '{name}'"), loc.clone()))?
                        .ty,
                    _ => return Err(CompileError::semantic("member access on a non-aggregate type", loc)),
                };
                e = self.ast.push(NodeKind::Field { base: e, name, arrow }, Some(field_ty), loc);
            } else if self.check_punc("++") || self.check_punc("--") {
                let loc = self.loc();
                let increment = self.check_punc("++");
                self.bump()?;
                let ty = self.ast.type_of(e).expect("expression node always carries a resolved type");
                e = self.ast.push(NodeKind::IncDec { pre: false, increment, operand: e }, Some(ty), loc);
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        match self.cur.kind.clone() {
            TokenKind::Punctuator("(") => {
                self.bump()?;
                let e = self.parse_expr()?;
                self.expect_punc(")")?;
                Ok(e)
            }
            TokenKind::Number(text) => {
                self.bump()?;
                self.parse_number_literal(&text, loc)
            }
            TokenKind::Char { value, .. } => {
                self.bump()?;
                let ty = self.ast.types.t_num(NumKind::Int);
                Ok(self.ast.push(NodeKind::IntImm(value as i64), Some(ty), loc))
            }
            TokenKind::Str { value, encoding } => {
                self.bump()?;
                self.parse_string_literal(value, encoding, loc)
            }
            TokenKind::Ident(name) => {
                self.bump()?;
                self.resolve_ident(&name, loc)
            }
            _ => Err(CompileError::syntax("expected an expression", loc)),
        }
    }

    fn resolve_ident(&mut self, name: &str, loc: SourceLoc) -> Result<AstId, CompileError> {
        match self.scopes_lookup_var(name) {
            Some(Binding::Var(sym)) => {
                let ty = self.ast.symbol(sym).ty;
                Ok(self.ast.push(NodeKind::VarRef(sym), Some(ty), loc))
            }
            Some(Binding::EnumConst { value, ty }) => Ok(self.ast.push(NodeKind::IntImm(value), Some(ty), loc)),
            Some(Binding::Typedef(_)) => Err(CompileError::syntax(format!("unexpected type name '{name}'"), loc)),
            None => Err(CompileError::semantic(format!("use of undeclared identifier '{name}'"), loc)),
        }
    }

    fn parse_string_literal(&mut self, value: String, encoding: StringEncoding, loc: SourceLoc) -> Result<AstId, CompileError> {
        let elem_kind = match encoding {
            StringEncoding::Utf8 => NumKind::Char,
            StringEncoding::Utf16 => NumKind::UShort,
            StringEncoding::Utf32 | StringEncoding::Wchar => NumKind::UInt,
        };
        let elem = self.ast.types.t_num(elem_kind);
        let len = value.chars().count() as u64 + 1; // + NUL terminator
        let ty = self.ast.types.t_arr(elem, crate::types::ArrayLen::Fixed(len));
        Ok(self.ast.push(NodeKind::StrLit { value, encoding }, Some(ty), loc))
    }

    fn parse_number_literal(&mut self, text: &str, loc: SourceLoc) -> Result<AstId, CompileError> {
        let lower = text.to_ascii_lowercase();
        let is_float = lower.contains('.')
            || (lower.contains('e') && !lower.starts_with("0x"))
            || (lower.ends_with('f') && !lower.starts_with("0x"));

        if is_float {
            let digits = lower.trim_end_matches(['f', 'l']);
            let is_f32 = lower.ends_with('f');
            let value: f64 = digits
                .parse()
                .map_err(|_| CompileError::lexical(format!("invalid floating constant '{text}'"), loc.clone()))?;
            let ty = self.ast.types.t_num(if is_f32 { NumKind::Float } else { NumKind::Double });
            return Ok(self.ast.push(NodeKind::FloatImm(value), Some(ty), loc));
        }

        let mut digits = lower.as_str();
        let mut unsigned = false;
        let mut long_count = 0u32;
        loop {
            if let Some(rest) = digits.strip_suffix('u') {
                unsigned = true;
                digits = rest;
            } else if let Some(rest) = digits.strip_suffix('l') {
                long_count += 1;
                digits = rest;
            } else {
                break;
            }
        }

        let value: i128 = if let Some(hex) = digits.strip_prefix("0x") {
            i128::from_str_radix(hex, 16)
        } else if let Some(oct) = digits.strip_prefix('0').filter(|_| digits.len() > 1 && digits.chars().all(|c| c.is_ascii_digit())) {
            i128::from_str_radix(oct, 8)
        } else {
            digits.parse()
        }
        .map_err(|_| CompileError::lexical(format!("invalid integer constant '{text}'"), loc.clone()))?;

        let kind = match (long_count, unsigned) {
            (0, false) if value <= i32::MAX as i128 => NumKind::Int,
            (0, false) => NumKind::Long,
            (0, true) if value <= u32::MAX as i128 => NumKind::UInt,
            (0, true) => NumKind::ULong,
            (1, false) => NumKind::Long,
            (1, true) => NumKind::ULong,
            (_, false) => NumKind::LongLong,
            (_, true) => NumKind::ULongLong,
        };
        let ty = self.ast.types.t_num(kind);
        Ok(self.ast.push(NodeKind::IntImm(value as i64), Some(ty), loc))
    }

    // ---- conversions shared across binary/assignment/call sites ----

    fn int_promote(&mut self, e: AstId) -> Result<AstId, CompileError> {
        let ty = self.ast.type_of(e).expect("expression node always carries a resolved type");
        let needs_promotion = matches!(
            self.ast.types.get(ty),
            Type::Num(k) if k.rank() < NumKind::Int.rank() && !k.is_float()
        ) || matches!(self.ast.types.get(ty), Type::Enum(_));
        if !needs_promotion {
            return Ok(e);
        }
        let loc = self.ast.node(e).loc.clone();
        let int_ty = self.ast.types.t_num(NumKind::Int);
        Ok(self.ast.push(NodeKind::Conv { kind: ConvKind::IntPromote, operand: e }, Some(int_ty), loc))
    }

    /// Array-to-pointer and function-to-pointer decay (spec §4.5).
    fn decay(&mut self, e: AstId) -> Result<AstId, CompileError> {
        let ty = self.ast.type_of(e).expect("expression node always carries a resolved type");
        let loc = self.ast.node(e).loc.clone();
        match self.ast.types.get(ty) {
            Type::Array { elem, .. } => {
                let elem = *elem;
                let ptr_ty = self.ast.types.t_ptr(elem);
                Ok(self.ast.push(NodeKind::Conv { kind: ConvKind::ArrayDecay, operand: e }, Some(ptr_ty), loc))
            }
            Type::Function { .. } => {
                let ptr_ty = self.ast.types.t_ptr(ty);
                Ok(self.ast.push(NodeKind::Conv { kind: ConvKind::FuncDecay, operand: e }, Some(ptr_ty), loc))
            }
            _ => Ok(e),
        }
    }

    /// The usual arithmetic conversions' result type (spec §4.5: "choose
    /// larger type; if equal size, prefer unsigned; float over integer").
    fn usual_arith_result_type(&mut self, a: TypeId, b: TypeId) -> TypeId {
        let (ka, kb) = match (self.ast.types.get(a), self.ast.types.get(b)) {
            (Type::Num(x), Type::Num(y)) => (*x, *y),
            _ => return a,
        };
        if ka.is_float() || kb.is_float() {
            let winner = if ka.rank() >= kb.rank() { ka } else { kb };
            return self.ast.types.t_num(winner);
        }
        let pa = if ka.rank() < NumKind::Int.rank() { NumKind::Int } else { ka };
        let pb = if kb.rank() < NumKind::Int.rank() { NumKind::Int } else { kb };
        let winner = if pa.rank() == pb.rank() {
            if pa.is_unsigned() { pa } else { pb }
        } else if pa.rank() > pb.rank() {
            pa
        } else {
            pb
        };
        self.ast.types.t_num(winner)
    }

    fn convert_to(&mut self, e: AstId, to: TypeId) -> Result<AstId, CompileError> {
        let from = self.ast.type_of(e).expect("expression node always carries a resolved type");
        if self.ast.types.are_equal(from, to) {
            return Ok(e);
        }
        let loc = self.ast.node(e).loc.clone();
        Ok(self.ast.push(NodeKind::Conv { kind: ConvKind::ArithConv, operand: e }, Some(to), loc))
    }

    /// Converts `rhs` to `target` the way `=`, `return`, argument passing,
    /// and initialisation all do: decay first, then an arithmetic
    /// conversion (narrowing included — truncation is a parser-level
    /// concern here, the IR lowerer emits the actual instruction).
    pub(crate) fn convert_for_assignment(&mut self, rhs: AstId, target: TypeId) -> Result<AstId, CompileError> {
        let decayed = self.decay(rhs)?;
        let from = self.ast.type_of(decayed).expect("expression node always carries a resolved type");
        if self.ast.types.are_equal(from, target) {
            return Ok(decayed);
        }

        let loc = self.ast.node(decayed).loc.clone();
        let from_narrower = self.ast.types.size_of(from) > self.ast.types.size_of(target) && self.ast.types.is_int(target);
        let kind = if from_narrower { ConvKind::Truncate } else { ConvKind::ArithConv };
        Ok(self.ast.push(NodeKind::Conv { kind, operand: decayed }, Some(target), loc))
    }

    fn build_binary(&mut self, op: BinOp, lhs: AstId, rhs: AstId, loc: SourceLoc) -> Result<AstId, CompileError> {
        let lhs = self.decay(lhs)?;
        let rhs = self.decay(rhs)?;
        let lty = self.ast.type_of(lhs).expect("expression node always carries a resolved type");
        let rty = self.ast.type_of(rhs).expect("expression node always carries a resolved type");

        let l_ptr = self.ast.types.is_pointer(lty);
        let r_ptr = self.ast.types.is_pointer(rty);

        if l_ptr || r_ptr {
            return self.build_pointer_binary(op, lhs, rhs, lty, rty, loc);
        }

        // Shifts promote each operand independently; the right operand's
        // width never widens the result the way the usual arithmetic
        // conversions would for `+`/`-`/etc (spec §4.5).
        if matches!(op, BinOp::Shl | BinOp::Shr) {
            let lhs = self.int_promote(lhs)?;
            let rhs = self.int_promote(rhs)?;
            let node_ty = self.ast.type_of(lhs).expect("expression node always carries a resolved type");
            return Ok(self.ast.push(NodeKind::Binary { op, lhs, rhs }, Some(node_ty), loc));
        }

        let result_ty = self.usual_arith_result_type(lty, rty);
        let lhs = self.convert_to(lhs, result_ty)?;
        let rhs = self.convert_to(rhs, result_ty)?;

        let node_ty = if matches!(op, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge) {
            self.ast.types.t_num(NumKind::Int)
        } else {
            result_ty
        };
        Ok(self.ast.push(NodeKind::Binary { op, lhs, rhs }, Some(node_ty), loc))
    }

    fn build_pointer_binary(
        &mut self,
        op: BinOp,
        lhs: AstId,
        rhs: AstId,
        lty: TypeId,
        rty: TypeId,
        loc: SourceLoc,
    ) -> Result<AstId, CompileError> {
        let l_ptr = self.ast.types.is_pointer(lty);
        let r_ptr = self.ast.types.is_pointer(rty);

        match op {
            BinOp::Add if l_ptr != r_ptr => Ok(self.ast.push(NodeKind::Binary { op, lhs, rhs }, Some(if l_ptr { lty } else { rty }), loc)),
            BinOp::Sub if l_ptr && !r_ptr => Ok(self.ast.push(NodeKind::Binary { op, lhs, rhs }, Some(lty), loc)),
            BinOp::Sub if l_ptr && r_ptr => {
                let ll = self.ast.types.t_num(NumKind::LongLong);
                Ok(self.ast.push(NodeKind::Binary { op, lhs, rhs }, Some(ll), loc))
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let int_ty = self.ast.types.t_num(NumKind::Int);
                Ok(self.ast.push(NodeKind::Binary { op, lhs, rhs }, Some(int_ty), loc))
            }
            _ => Err(CompileError::semantic("invalid operand types to binary operator", loc)),
        }
    }
}
