//! Declaration specifiers and declarators (spec §4.5): storage class,
//! qualifiers, and base type accumulate from the specifier list; pointers,
//! arrays, function parameter lists, and parenthesised sub-declarators wrap
//! the base type from a separate declarator walk, the standard two-part
//! "decl-specs + declarator" recursive-descent shape — grounded on the
//! specifier/declarator split in `compiler_frontend/ast/ast.rs`'s
//! `ScopeContext`-driven declaration parsing, generalised here from that
//! language's single-keyword type system to C's combinable specifier set.

use super::Parser;
use crate::ast::{Binding, GlobalKind, Linkage};
use crate::diagnostics::errors::CompileError;
use crate::lex::{keyword_for, TokenKind};
use crate::types::{NumKind, Type, TypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    None,
    Typedef,
    Extern,
    Static,
}

impl StorageClass {
    pub fn linkage(self) -> Linkage {
        match self {
            StorageClass::Extern => Linkage::Extern,
            StorageClass::Static => Linkage::Static,
            StorageClass::None | StorageClass::Typedef => Linkage::None,
        }
    }
}

pub struct DeclSpecs {
    pub storage: StorageClass,
    pub base: TypeId,
}

impl Parser {
    fn set_storage(&self, cur: &mut StorageClass, seen: &mut bool, new: StorageClass) -> Result<(), CompileError> {
        if *seen {
            return Err(CompileError::syntax("multiple storage-class specifiers", self.loc()));
        }
        *seen = true;
        *cur = new;
        Ok(())
    }

    pub(crate) fn parse_decl_specifiers(&mut self) -> Result<DeclSpecs, CompileError> {
        let mut storage = StorageClass::None;
        let mut storage_seen = false;
        let mut signed_seen = false;
        let mut unsigned_seen = false;
        let mut short_seen = false;
        let mut long_count = 0u32;
        let mut base_kw: Option<&'static str> = None;
        let mut tag_type: Option<TypeId> = None;

        loop {
            let kw = match &self.cur.kind {
                TokenKind::Ident(name) => keyword_for(name),
                _ => None,
            };

            match kw {
                Some("typedef") => {
                    self.set_storage(&mut storage, &mut storage_seen, StorageClass::Typedef)?;
                    self.bump()?;
                }
                Some("extern") => {
                    self.set_storage(&mut storage, &mut storage_seen, StorageClass::Extern)?;
                    self.bump()?;
                }
                Some("static") => {
                    self.set_storage(&mut storage, &mut storage_seen, StorageClass::Static)?;
                    self.bump()?;
                }
                Some("auto") | Some("register") => {
                    if self.scopes_is_file_scope() {
                        return Err(CompileError::semantic("'auto'/'register' is not allowed at file scope", self.loc()));
                    }
                    self.bump()?;
                }
                Some("const") | Some("volatile") | Some("restrict") | Some("inline") => {
                    self.bump()?;
                }
                Some("signed") => {
                    signed_seen = true;
                    self.bump()?;
                }
                Some("unsigned") => {
                    unsigned_seen = true;
                    self.bump()?;
                }
                Some("short") => {
                    short_seen = true;
                    self.bump()?;
                }
                Some("long") => {
                    long_count += 1;
                    self.bump()?;
                }
                Some(k @ ("void" | "char" | "int" | "float" | "double" | "_Bool")) => {
                    if base_kw.is_some() || tag_type.is_some() {
                        return Err(CompileError::syntax("two or more data types in declaration specifiers", self.loc()));
                    }
                    base_kw = Some(k);
                    self.bump()?;
                }
                Some("struct") => {
                    if base_kw.is_some() || tag_type.is_some() {
                        return Err(CompileError::syntax("two or more data types in declaration specifiers", self.loc()));
                    }
                    tag_type = Some(self.parse_struct_or_union(false)?);
                }
                Some("union") => {
                    if base_kw.is_some() || tag_type.is_some() {
                        return Err(CompileError::syntax("two or more data types in declaration specifiers", self.loc()));
                    }
                    tag_type = Some(self.parse_struct_or_union(true)?);
                }
                Some("enum") => {
                    if base_kw.is_some() || tag_type.is_some() {
                        return Err(CompileError::syntax("two or more data types in declaration specifiers", self.loc()));
                    }
                    tag_type = Some(self.parse_enum()?);
                }
                _ => {
                    if base_kw.is_none() && tag_type.is_none() && !signed_seen && !unsigned_seen && !short_seen && long_count == 0 {
                        let ident_name = match &self.cur.kind {
                            TokenKind::Ident(n) => Some(n.clone()),
                            _ => None,
                        };
                        if let Some(name) = ident_name {
                            if let Some(Binding::Typedef(ty)) = self.scopes_lookup_var(&name) {
                                tag_type = Some(ty);
                                self.bump()?;
                            }
                        }
                    }
                    break;
                }
            }
        }

        if signed_seen && unsigned_seen {
            return Err(CompileError::syntax("both 'signed' and 'unsigned' in declaration specifiers", self.loc()));
        }

        let base = if let Some(t) = tag_type {
            t
        } else if base_kw == Some("void") {
            self.ast.types.t_void()
        } else {
            let kind = Self::resolve_num_kind(base_kw, signed_seen, unsigned_seen, short_seen, long_count);
            self.ast.types.t_num(kind)
        };

        Ok(DeclSpecs { storage, base })
    }

    fn resolve_num_kind(base_kw: Option<&str>, signed: bool, unsigned: bool, short: bool, long: u32) -> NumKind {
        match base_kw {
            Some("_Bool") => NumKind::Bool,
            Some("float") => NumKind::Float,
            Some("double") => {
                if long >= 1 {
                    NumKind::LongDouble
                } else {
                    NumKind::Double
                }
            }
            Some("char") => {
                if unsigned {
                    NumKind::UChar
                } else if signed {
                    NumKind::SChar
                } else {
                    NumKind::Char
                }
            }
            // `int`, or no type specifier at all (implicit-int, C89 §6.5.2).
            _ => {
                if short {
                    if unsigned { NumKind::UShort } else { NumKind::Short }
                } else if long >= 2 {
                    if unsigned { NumKind::ULongLong } else { NumKind::LongLong }
                } else if long == 1 {
                    if unsigned { NumKind::ULong } else { NumKind::Long }
                } else if unsigned {
                    NumKind::UInt
                } else {
                    NumKind::Int
                }
            }
        }
    }

    fn parse_struct_or_union(&mut self, is_union: bool) -> Result<TypeId, CompileError> {
        self.bump()?; // 'struct' / 'union'
        let tag = match &self.cur.kind {
            TokenKind::Ident(n) if keyword_for(n).is_none() => {
                let n = n.clone();
                self.bump()?;
                Some(n)
            }
            _ => None,
        };

        if !self.check_punc("{") {
            let tag_name = tag.ok_or_else(|| {
                CompileError::syntax("expected a tag name or '{' after struct/union", self.loc())
            })?;
            if let Some(existing) = self.scopes_lookup_tag(&tag_name) {
                return Ok(existing);
            }
            let ty = if is_union {
                self.ast.types.t_union(Some(tag_name.clone()), None)
            } else {
                self.ast.types.t_struct(Some(tag_name.clone()), None)
            };
            self.scopes_define_tag(tag_name, ty);
            return Ok(ty);
        }

        self.bump()?; // '{'
        let mut fields = Vec::new();
        while !self.check_punc("}") {
            let member_specs = self.parse_decl_specifiers()?;
            loop {
                let d_loc = self.loc();
                let (name, ty) = self.declarator(member_specs.base)?;
                let name = name.ok_or_else(|| CompileError::syntax("struct/union member requires a name", d_loc))?;
                fields.push((name, ty));
                if !self.eat_punc(",")? {
                    break;
                }
            }
            self.expect_punc(";")?;
        }
        self.bump()?; // '}'

        let ty = if is_union {
            self.ast.types.t_union(tag.clone(), Some(fields))
        } else {
            self.ast.types.t_struct(tag.clone(), Some(fields))
        };
        if let Some(tag_name) = tag {
            self.scopes_define_tag(tag_name, ty);
        }
        Ok(ty)
    }

    fn parse_enum(&mut self) -> Result<TypeId, CompileError> {
        self.bump()?; // 'enum'
        let tag = match &self.cur.kind {
            TokenKind::Ident(n) if keyword_for(n).is_none() => {
                let n = n.clone();
                self.bump()?;
                Some(n)
            }
            _ => None,
        };

        if !self.check_punc("{") {
            let tag_name = tag.ok_or_else(|| CompileError::syntax("expected a tag name or '{' after enum", self.loc()))?;
            return self
                .scopes_lookup_tag(&tag_name)
                .ok_or_else(|| CompileError::semantic(format!("use of undeclared enum tag '{tag_name}'"), self.loc()));
        }

        self.bump()?; // '{'
        let mut consts: Vec<(String, i64)> = Vec::new();
        let mut next_val: i64 = 0;
        while !self.check_punc("}") {
            let name = self.expect_ident()?;
            if self.eat_punc("=")? {
                let e = self.parse_assignment_expr()?;
                next_val = crate::consteval::eval_int(&self.ast, e)?;
            }
            consts.push((name, next_val));
            next_val += 1;
            if !self.eat_punc(",")? {
                break;
            }
        }
        self.expect_punc("}")?;

        let ty = self.ast.types.t_enum(tag.clone(), consts.clone());
        if let Some(tag_name) = tag {
            self.scopes_define_tag(tag_name, ty);
        }
        for (name, value) in consts {
            self.scopes_define_var(name, Binding::EnumConst { value, ty });
        }
        Ok(ty)
    }

    /// Parses one declarator (pointer prefixes, then a direct-declarator
    /// with array/function suffixes or a parenthesised sub-declarator) atop
    /// `base`. Returns `None` for the name on an abstract declarator (no
    /// identifier — used by `sizeof`/casts/parameter prototypes).
    ///
    /// Parenthesised sub-declarators (`int (*fp)(int)`) are resolved with a
    /// reserve/patch pair on the type arena rather than a second parsing
    /// pass over buffered tokens: `base` for the inner declarator is a
    /// reserved placeholder `TypeId`, and once the matching `)` and its own
    /// suffix have been parsed, the placeholder is patched to the type that
    /// suffix actually built.
    pub(crate) fn declarator(&mut self, base: TypeId) -> Result<(Option<String>, TypeId), CompileError> {
        let mut ty = base;
        while self.eat_punc("*")? {
            while self.eat_kw("const")? || self.eat_kw("volatile")? || self.eat_kw("restrict")? {}
            ty = self.ast.types.t_ptr(ty);
        }

        if self.eat_punc("(")? {
            let placeholder = self.ast.types.reserve();
            let (name, inner_ty) = self.declarator(placeholder)?;
            self.expect_punc(")")?;
            let resolved = self.type_suffix(ty)?;
            let resolved_shape = self.ast.types.get(resolved).clone();
            self.ast.types.patch(placeholder, resolved_shape);
            return Ok((name, inner_ty));
        }

        let name = match &self.cur.kind {
            TokenKind::Ident(n) if keyword_for(n).is_none() => {
                let n = n.clone();
                self.bump()?;
                Some(n)
            }
            _ => None,
        };

        let final_ty = self.type_suffix(ty)?;
        Ok((name, final_ty))
    }

    /// Parses zero or more `[len?]`/`(params)` suffixes, recursing so that
    /// the *first* suffix encountered ends up as the outermost type (array
    /// dimensions nest left-to-right; `int a[2][3]` is "array 2 of array 3
    /// of int").
    fn type_suffix(&mut self, base: TypeId) -> Result<TypeId, CompileError> {
        if self.eat_punc("[")? {
            let len = if self.check_punc("]") {
                crate::types::ArrayLen::Incomplete
            } else {
                let e = self.parse_assignment_expr()?;
                match crate::consteval::eval_int(&self.ast, e) {
                    Ok(n) => crate::types::ArrayLen::Fixed(n.max(0) as u64),
                    Err(_) => crate::types::ArrayLen::Vla(e),
                }
            };
            self.expect_punc("]")?;
            let elem = self.type_suffix(base)?;
            return Ok(self.ast.types.t_arr(elem, len));
        }

        if self.check_punc("(") {
            self.bump()?;
            let (params, vararg) = self.parse_param_list()?;
            self.expect_punc(")")?;
            let ret = self.type_suffix(base)?;
            self.last_fn_params = params.clone();
            self.last_fn_vararg = vararg;
            return Ok(self.ast.types.t_fn(ret, params.into_iter().map(|(_, t)| t).collect(), vararg));
        }

        Ok(base)
    }

    /// `void`, an empty list (old-style "unspecified parameters"), or a
    /// comma-separated parameter-declaration list optionally ending in
    /// `...` (spec §4.5: `...` requires at least one named parameter).
    fn parse_param_list(&mut self) -> Result<(Vec<(Option<String>, TypeId)>, bool), CompileError> {
        if self.check_kw("void") && matches!(self.peek()?.kind, TokenKind::Punctuator(")")) {
            self.bump()?;
            return Ok((Vec::new(), false));
        }
        if self.check_punc(")") {
            return Ok((Vec::new(), false));
        }

        let mut params = Vec::new();
        let mut vararg = false;
        loop {
            if self.eat_punc("...")? {
                if params.is_empty() {
                    return Err(CompileError::syntax("'...' requires at least one named parameter", self.loc()));
                }
                vararg = true;
                break;
            }

            let specs = self.parse_decl_specifiers()?;
            let (name, ty) = self.declarator(specs.base)?;
            // Arrays and functions decay to pointers in parameter position.
            let ty = match self.ast.types.get(ty) {
                Type::Array { elem, .. } => self.ast.types.t_ptr(*elem),
                Type::Function { .. } => self.ast.types.t_ptr(ty),
                Type::Void if name.is_none() && params.is_empty() => {
                    // Lone `(void)` parameter list: `type_suffix` would have
                    // already returned early via the check above; reaching
                    // here with a bare `void` means a malformed parameter.
                    return Err(CompileError::syntax("'void' must be the only parameter", self.loc()));
                }
                _ => ty,
            };
            params.push((name, ty));

            if !self.eat_punc(",")? {
                break;
            }
        }
        Ok((params, vararg))
    }

    pub(crate) fn local_declaration(&mut self) -> Result<crate::ast::AstId, CompileError> {
        let loc = self.loc();
        let specs = self.parse_decl_specifiers()?;
        if self.eat_punc(";")? {
            return Ok(self.ast.push(crate::ast::NodeKind::TypedefStmt, None, loc));
        }

        let mut vars: Vec<(crate::ast::SymbolId, Option<crate::ast::AstId>)> = Vec::new();

        loop {
            let d_loc = self.loc();
            let (name, ty) = self.declarator(specs.base)?;
            let name = name.ok_or_else(|| CompileError::syntax("declaration requires a name", d_loc))?;

            if specs.storage == StorageClass::Typedef {
                self.scopes_define_var(name, Binding::Typedef(ty));
            } else {
                let linkage = specs.storage.linkage();
                if matches!(linkage, Linkage::Static | Linkage::Extern) {
                    let g = self.ast.new_global(&name, ty, linkage, GlobalKind::Data(None));
                    let sym = self.ast.new_symbol(name.clone(), ty, true, linkage, Some(g));
                    self.scopes_define_var(name, Binding::Var(sym));
                    let init = if self.eat_punc("=")? { Some(self.parse_initializer(ty)?) } else { None };
                    self.ast.global_mut(g).kind = GlobalKind::Data(init);
                } else {
                    let sym = self.ast.new_symbol(name.clone(), ty, false, Linkage::None, None);
                    self.scopes_define_var(name, Binding::Var(sym));
                    let init = if self.eat_punc("=")? { Some(self.parse_initializer(ty)?) } else { None };
                    vars.push((sym, init));
                }
            }

            if !self.eat_punc(",")? {
                break;
            }
        }
        self.expect_punc(";")?;
        Ok(self.ast.push(crate::ast::NodeKind::VarDeclStmt { vars }, None, loc))
    }
}
