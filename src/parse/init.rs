//! Initialiser parsing (spec §4.5): scalar, array (including designated
//! `[n] = v`), struct (`.field = v`) and union (first member by default)
//! forms, plus string-literal initialisation of char/wide arrays. Grounded
//! on the same reserve/patch idiom `declarator.rs` uses for parenthesised
//! sub-declarators: an incomplete array's `TypeId` is patched in place once
//! the initialiser list's element count is known, rather than re-walking the
//! declarator once the brace list has been seen.

use super::Parser;
use crate::ast::{AstId, InitElem, InitSlot, NodeKind};
use crate::diagnostics::errors::CompileError;
use crate::lex::TokenKind;
use crate::types::{ArrayLen, Type, TypeId};

impl Parser {
    /// Entry point used by declarators (globals, locals, compound literals):
    /// parses whatever initialiser form `ty` admits, returning the `AstId`
    /// of the value/list to store under it.
    pub(crate) fn parse_initializer(&mut self, ty: TypeId) -> Result<AstId, CompileError> {
        // A bare string literal (no braces) initialising a char/wide array
        // is the common case and bypasses the brace-list machinery entirely
        // (spec §4.5: "string literals initialise char arrays directly").
        if self.ast.types.is_string_type(ty) && matches!(self.cur.kind, TokenKind::Str { .. }) {
            return self.consume_str_literal_as(ty);
        }

        if self.check_punc("{") {
            self.parse_brace_initializer(ty)
        } else {
            let e = self.parse_assignment_expr()?;
            self.convert_for_assignment(e, ty)
        }
    }

    /// Consumes the current `Str` token and builds a `StrLit` node typed as
    /// `ty` (rather than the literal's own natural array type), completing
    /// an incomplete array length from the string's length and widening a
    /// `Fixed` target that is too short into an excess-initialiser warning
    /// (spec §4.5: "Incomplete array types complete their length from the
    /// initialiser ... Excess initialisers issue a warning").
    fn consume_str_literal_as(&mut self, ty: TypeId) -> Result<AstId, CompileError> {
        let loc = self.loc();
        let (value, encoding) = match &self.cur.kind {
            TokenKind::Str { value, encoding } => (value.clone(), *encoding),
            _ => unreachable!("caller checked for a Str token"),
        };
        self.bump()?;

        let char_count = value.chars().count() as u64 + 1; // + NUL terminator
        let elem = self.ast.types.element_of(ty).expect("is_string_type implies an array type");

        match self.ast.types.get(ty) {
            Type::Array { len: ArrayLen::Incomplete, .. } => {
                self.ast.types.patch(ty, Type::Array { elem, len: ArrayLen::Fixed(char_count) });
            }
            Type::Array { len: ArrayLen::Fixed(n), .. } if char_count > *n => {
                self.warn("initializer-string for char array is too long");
            }
            _ => {}
        }

        Ok(self.ast.push(NodeKind::StrLit { value, encoding }, Some(ty), loc))
    }

    fn parse_brace_initializer(&mut self, ty: TypeId) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.expect_punc("{")?;

        match self.ast.types.get(ty).clone() {
            Type::Array { elem, len } => {
                // `{"hello"}` is equivalent to the unbraced form; only a
                // single lookahead token is needed to tell them apart here
                // since the string must be the brace list's only element.
                if self.ast.types.is_string_type(ty)
                    && matches!(self.cur.kind, TokenKind::Str { .. })
                    && matches!(self.peek()?.kind, TokenKind::Punctuator("}"))
                {
                    let node = self.consume_str_literal_as(ty)?;
                    self.bump()?; // '}'
                    return Ok(node);
                }

                if matches!(len, ArrayLen::Vla(_)) {
                    return Err(CompileError::semantic("variable-length array cannot have an initializer", loc));
                }

                let mut elems = Vec::new();
                let mut next_index: u64 = 0;
                let mut max_index: u64 = 0;
                while !self.check_punc("}") {
                    let index = if self.eat_punc("[")? {
                        let e = self.parse_assignment_expr()?;
                        let v = crate::consteval::eval_int(&self.ast, e)?;
                        self.expect_punc("]")?;
                        self.expect_punc("=")?;
                        v.max(0) as u64
                    } else {
                        next_index
                    };

                    if let ArrayLen::Fixed(n) = len {
                        if index >= n {
                            self.warn("excess elements in array initializer");
                        }
                    }

                    let value = self.parse_initializer(elem)?;
                    elems.push(InitElem { slot: InitSlot::Index(index), value });
                    next_index = index + 1;
                    max_index = max_index.max(next_index);

                    if !self.eat_punc(",")? {
                        break;
                    }
                }
                self.expect_punc("}")?;

                if let ArrayLen::Incomplete = len {
                    self.ast.types.patch(ty, Type::Array { elem, len: ArrayLen::Fixed(max_index) });
                }

                Ok(self.ast.push(NodeKind::InitList(elems), Some(ty), loc))
            }

            Type::Struct(agg) => {
                let fields = agg
                    .fields
                    .clone()
                    .ok_or_else(|| CompileError::semantic("initializing an incomplete struct type", loc.clone()))?;

                let mut elems = Vec::new();
                let mut next_field = 0usize;
                while !self.check_punc("}") {
                    let field_idx = if self.eat_punc(".")? {
                        let name = self.expect_ident()?;
                        self.expect_punc("=")?;
                        fields
                            .iter()
                            .position(|f| f.name == name)
                            .ok_or_else(|| CompileError::semantic(format!("no member named '{name}'"), self.loc()))?
                    } else if next_field < fields.len() {
                        next_field
                    } else {
                        self.warn("excess elements in struct initializer");
                        fields.len() - 1
                    };

                    let field = &fields[field_idx];
                    let value = self.parse_initializer(field.ty)?;
                    elems.push(InitElem { slot: InitSlot::Field(field.name.clone()), value });
                    next_field = field_idx + 1;

                    if !self.eat_punc(",")? {
                        break;
                    }
                }
                self.expect_punc("}")?;
                Ok(self.ast.push(NodeKind::InitList(elems), Some(ty), loc))
            }

            Type::Union(agg) => {
                let fields = agg
                    .fields
                    .clone()
                    .ok_or_else(|| CompileError::semantic("initializing an incomplete union type", loc.clone()))?;

                let field = if self.eat_punc(".")? {
                    let name = self.expect_ident()?;
                    self.expect_punc("=")?;
                    fields
                        .iter()
                        .find(|f| f.name == name)
                        .cloned()
                        .ok_or_else(|| CompileError::semantic(format!("no member named '{name}'"), self.loc()))?
                } else {
                    fields.first().cloned().ok_or_else(|| {
                        CompileError::semantic("union has no members to initialize", loc.clone())
                    })?
                };

                let value = self.parse_initializer(field.ty)?;
                self.eat_punc(",")?;
                self.expect_punc("}")?;
                Ok(self.ast.push(NodeKind::InitList(vec![InitElem { slot: InitSlot::Field(field.name), value }]), Some(ty), loc))
            }

            // Scalar brace elision: `int x = { 5 };`.
            _ => {
                let value = self.parse_initializer(ty)?;
                self.eat_punc(",")?;
                self.expect_punc("}")?;
                Ok(value)
            }
        }
    }
}
