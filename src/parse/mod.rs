//! The parser and type checker (spec §4.5): recursive descent with one
//! token of lookahead (two for a few ambiguities — `ident:` labels,
//! `(type-name)` before a cast/sizeof operand), building the typed AST in
//! [`crate::ast`] directly off the token stream the preprocessor pulls in.
//! Grounded on the teacher's `ast/ast.rs` `ScopeContext`-driven declaration
//! loop and `ast/parse_function.rs`'s function-body assembly, generalised
//! from that language's single-keyword declarations to C's combinable
//! specifier/declarator grammar.

pub mod declarator;
pub mod expr;
pub mod init;
pub mod stmt;

use crate::ast::{Ast, Binding, GlobalKind, Linkage, ScopeKind, ScopeStack};
use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::diagnostics::warnings::CompilerWarning;
use crate::lex::{keyword_for, Token, TokenKind};
use crate::preprocess::Preprocessor;
use crate::types::{Type, TypeId};

pub(crate) use declarator::StorageClass;

/// Per-switch bookkeeping accumulated while its body is parsed: the set of
/// `case` values seen so far (duplicate detection), whether a `default` has
/// already been seen, and the arm list the enclosing `Switch` node stores
/// (spec §4.5: "case bodies added to the enclosing switch's case list as
/// they are parsed").
pub(crate) struct SwitchCtx {
    values: Vec<i64>,
    has_default: bool,
    arms: Vec<crate::ast::CaseArm>,
}

/// Owns the preprocessor, the AST under construction, and the lexical scope
/// chain for one translation unit. `last_fn_params`/`last_fn_vararg` are a
/// side channel: `declarator::type_suffix` only has room to return a single
/// `TypeId`, so a just-parsed function declarator's parameter list is
/// stashed here for the caller (`external_declaration`/`local_declaration`)
/// to pick up.
pub struct Parser {
    pp: Preprocessor,
    pub ast: Ast,
    scopes: ScopeStack,
    cur: Token,
    lookahead: Vec<Token>,
    switch_stack: Vec<SwitchCtx>,
    /// `(return type, is-void-return)` of the function currently being
    /// parsed; C functions never nest, so one slot suffices.
    current_fn: Option<(TypeId, bool)>,
    pub(crate) last_fn_params: Vec<(Option<String>, TypeId)>,
    pub(crate) last_fn_vararg: bool,
}

impl Parser {
    fn new(mut pp: Preprocessor) -> Result<Self, CompileError> {
        let first = pp.next_token()?;
        Ok(Parser {
            pp,
            ast: Ast::new(),
            scopes: ScopeStack::new(),
            cur: first,
            lookahead: Vec::new(),
            switch_stack: Vec::new(),
            current_fn: None,
            last_fn_params: Vec::new(),
            last_fn_vararg: false,
        })
    }

    /// Parses an entire translation unit, returning the built [`Ast`] plus
    /// every warning the preprocessor accumulated along the way.
    pub fn parse_translation_unit(pp: Preprocessor) -> Result<(Ast, Vec<CompilerWarning>), CompileError> {
        let mut parser = Parser::new(pp)?;
        parser.run()?;
        let warnings = parser.pp.warnings().to_vec();
        Ok((parser.ast, warnings))
    }

    fn run(&mut self) -> Result<(), CompileError> {
        while !matches!(self.cur.kind, TokenKind::Eof) {
            self.external_declaration()?;
        }
        Ok(())
    }

    // ---- token cursor ----

    fn loc(&self) -> SourceLoc {
        self.pp.loc(&self.cur)
    }

    fn bump(&mut self) -> Result<Token, CompileError> {
        let next = if self.lookahead.is_empty() {
            self.pp.next_token()?
        } else {
            self.lookahead.remove(0)
        };
        Ok(std::mem::replace(&mut self.cur, next))
    }

    fn peek(&mut self) -> Result<&Token, CompileError> {
        if self.lookahead.is_empty() {
            let t = self.pp.next_token()?;
            self.lookahead.push(t);
        }
        Ok(&self.lookahead[0])
    }

    fn check_punc(&self, s: &str) -> bool {
        matches!(self.cur.kind, TokenKind::Punctuator(p) if p == s)
    }

    fn check_kw(&self, kw: &str) -> bool {
        matches!(&self.cur.kind, TokenKind::Ident(name) if keyword_for(name) == Some(kw))
    }

    fn cur_keyword(&self) -> Option<&'static str> {
        match &self.cur.kind {
            TokenKind::Ident(name) => keyword_for(name),
            _ => None,
        }
    }

    fn eat_punc(&mut self, s: &str) -> Result<bool, CompileError> {
        if self.check_punc(s) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_kw(&mut self, kw: &str) -> Result<bool, CompileError> {
        if self.check_kw(kw) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punc(&mut self, s: &str) -> Result<(), CompileError> {
        if self.eat_punc(s)? {
            Ok(())
        } else {
            Err(CompileError::syntax(format!("expected '{s}'"), self.loc()))
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), CompileError> {
        if self.eat_kw(kw)? {
            Ok(())
        } else {
            Err(CompileError::syntax(format!("expected '{kw}'"), self.loc()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, CompileError> {
        match &self.cur.kind {
            TokenKind::Ident(name) if keyword_for(name).is_none() => {
                let n = name.clone();
                self.bump()?;
                Ok(n)
            }
            _ => Err(CompileError::syntax("expected an identifier", self.loc())),
        }
    }

    /// Whether the current token can start a declaration: a storage-class
    /// keyword, a type keyword, a qualifier, or a name already bound as a
    /// typedef in scope.
    fn is_decl_start(&self) -> bool {
        match &self.cur.kind {
            TokenKind::Ident(name) => {
                matches!(
                    keyword_for(name),
                    Some(
                        "void" | "char" | "short" | "int" | "long" | "float" | "double" | "signed"
                            | "unsigned" | "_Bool" | "struct" | "union" | "enum" | "typedef"
                            | "extern" | "static" | "auto" | "register" | "const" | "volatile"
                            | "restrict" | "inline"
                    )
                ) || matches!(self.scopes.lookup_var(name), Some(Binding::Typedef(_)))
            }
            _ => false,
        }
    }

    fn token_starts_type(&self, tok: &Token) -> bool {
        match &tok.kind {
            TokenKind::Ident(name) => {
                matches!(
                    keyword_for(name),
                    Some(
                        "void" | "char" | "short" | "int" | "long" | "float" | "double" | "signed"
                            | "unsigned" | "_Bool" | "struct" | "union" | "enum" | "const" | "volatile"
                    )
                ) || matches!(self.scopes.lookup_var(name), Some(Binding::Typedef(_)))
            }
            _ => false,
        }
    }

    // ---- scope accessors (shared by declarator.rs/expr.rs/stmt.rs) ----

    fn scopes_is_file_scope(&self) -> bool {
        self.scopes.is_file_scope()
    }

    fn scopes_lookup_var(&self, name: &str) -> Option<Binding> {
        self.scopes.lookup_var(name).cloned()
    }

    fn scopes_define_var(&mut self, name: impl Into<String>, binding: Binding) {
        self.scopes.define_var(name, binding);
    }

    fn scopes_lookup_tag(&self, name: &str) -> Option<TypeId> {
        self.scopes.lookup_tag(name)
    }

    fn warn(&mut self, msg: impl Into<String>) {
        let tok = self.cur.clone();
        self.pp.push_warning(msg, &tok);
    }

    fn scopes_define_tag(&mut self, name: impl Into<String>, ty: TypeId) {
        self.scopes.define_tag(name, ty);
    }

    // ---- top-level declarations ----

    fn external_declaration(&mut self) -> Result<(), CompileError> {
        let specs = self.parse_decl_specifiers()?;

        // A bare `struct S { ... };`/`enum E { ... };` with no declarator.
        if self.eat_punc(";")? {
            return Ok(());
        }

        loop {
            let d_loc = self.loc();
            let (name, ty) = self.declarator(specs.base)?;
            let name = name.ok_or_else(|| CompileError::syntax("declaration requires a name", d_loc))?;

            if specs.storage == StorageClass::Typedef {
                self.scopes.define_var(name, Binding::Typedef(ty));
                if !self.eat_punc(",")? {
                    break;
                }
                continue;
            }

            let is_function = matches!(self.ast.types.get(ty), Type::Function { .. });

            if is_function && self.check_punc("{") {
                self.finish_function_definition(name, ty, specs.storage.linkage())?;
                return Ok(());
            }

            self.finish_global_declarator(name, ty, specs.storage.linkage(), is_function)?;

            if !self.eat_punc(",")? {
                break;
            }
        }
        self.expect_punc(";")?;
        Ok(())
    }

    fn finish_global_declarator(
        &mut self,
        name: String,
        ty: TypeId,
        linkage: Linkage,
        is_function: bool,
    ) -> Result<(), CompileError> {
        let kind = if is_function { GlobalKind::Function { params: Vec::new(), body: None } } else { GlobalKind::Data(None) };
        let g = self.ast.new_global(name.clone(), ty, linkage, kind);
        let sym = self.ast.new_symbol(name.clone(), ty, true, linkage, Some(g));
        self.scopes.define_var(name, Binding::Var(sym));

        if !is_function && self.eat_punc("=")? {
            let init = self.parse_initializer(ty)?;
            self.ast.global_mut(g).kind = GlobalKind::Data(Some(init));
        }
        Ok(())
    }

    fn finish_function_definition(&mut self, name: String, ty: TypeId, linkage: Linkage) -> Result<(), CompileError> {
        let params = std::mem::take(&mut self.last_fn_params);
        self.last_fn_vararg = false;

        let g = self.ast.new_global(name.clone(), ty, linkage, GlobalKind::Function { params: Vec::new(), body: None });
        let sym = self.ast.new_symbol(name.clone(), ty, true, linkage, Some(g));
        self.scopes.define_var(name, Binding::Var(sym));

        let ret = match self.ast.types.get(ty) {
            Type::Function { ret, .. } => *ret,
            _ => return Err(CompileError::internal("function definition declarator did not build a function type", self.loc())),
        };
        let is_void_ret = matches!(self.ast.types.get(ret), Type::Void);

        self.scopes.push(ScopeKind::Block);
        let prev_fn = self.current_fn.replace((ret, is_void_ret));

        let mut param_syms = Vec::with_capacity(params.len());
        for (pname, pty) in &params {
            let psym = self.ast.new_symbol(pname.clone().unwrap_or_default(), *pty, false, Linkage::None, None);
            if let Some(pname) = pname {
                self.scopes.define_var(pname.clone(), Binding::Var(psym));
            }
            param_syms.push(psym);
        }

        let body = self.compound_stmt_body()?;
        self.scopes.pop();
        self.current_fn = prev_fn;

        self.ast.global_mut(g).kind = GlobalKind::Function { params: param_syms, body: Some(body) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::BuildStamp;
    use std::path::PathBuf;

    fn parse(src: &str) -> Ast {
        let pp = Preprocessor::new(src, PathBuf::from("t.c"), Vec::new(), BuildStamp::new("Jan  1 1970", "00:00:00"));
        Parser::parse_translation_unit(pp).expect("parse failed").0
    }

    #[test]
    fn parses_a_function_definition_with_a_return_statement() {
        let ast = parse("int add(int a, int b) { return a + b; }");
        let globals: Vec<_> = ast.globals().collect();
        assert_eq!(globals.len(), 1);
        assert_eq!(globals[0].1.name, "add");
        assert!(matches!(globals[0].1.kind, GlobalKind::Function { body: Some(_), .. }));
    }

    #[test]
    fn parses_global_variable_with_initializer() {
        let ast = parse("int counter = 41;");
        let globals: Vec<_> = ast.globals().collect();
        assert_eq!(globals.len(), 1);
        assert!(matches!(globals[0].1.kind, GlobalKind::Data(Some(_))));
    }

    #[test]
    fn rejects_duplicate_case_labels() {
        let pp = Preprocessor::new(
            "int f(int x) { switch (x) { case 1: break; case 1: break; } return 0; }",
            PathBuf::from("t.c"),
            Vec::new(),
            BuildStamp::new("Jan  1 1970", "00:00:00"),
        );
        assert!(Parser::parse_translation_unit(pp).is_err());
    }
}
