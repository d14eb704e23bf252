//! Statement parsing (spec §4.5): compound statements, the usual
//! control-flow forms, and `switch`'s case-list bookkeeping. Grounded on the
//! teacher's `ast/parse_function.rs` statement-sequencing loop, generalised
//! from that language's expression-oriented block-as-value model to C's
//! statement/expression split.

use super::{Parser, SwitchCtx};
use crate::ast::{AstId, CaseArm, NodeKind, ScopeKind};
use crate::diagnostics::errors::CompileError;
use crate::lex::TokenKind;

impl Parser {
    /// Pushes a block scope, parses `{ ... }`, pops it. Used for every
    /// nested block; a function's outermost block instead shares the scope
    /// its parameters were bound in (see `finish_function_definition`), so
    /// it calls `compound_stmt_body` directly.
    fn parse_compound_stmt(&mut self) -> Result<AstId, CompileError> {
        self.scopes.push(ScopeKind::Block);
        let body = self.compound_stmt_body();
        self.scopes.pop();
        body
    }

    pub(crate) fn compound_stmt_body(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.expect_punc("{")?;
        let mut head: Option<AstId> = None;
        while !self.check_punc("}") {
            let item = self.block_item()?;
            head = Some(self.ast.append_stmt(head, item));
        }
        self.bump()?; // '}'
        Ok(self.ast.push(NodeKind::CompoundStmt { first: head }, None, loc))
    }

    fn block_item(&mut self) -> Result<AstId, CompileError> {
        if self.is_decl_start() {
            self.local_declaration()
        } else {
            self.statement()
        }
    }

    fn statement(&mut self) -> Result<AstId, CompileError> {
        // `ident ':'` is a label; distinguishing it from an expression
        // statement starting with that identifier needs one token of
        // lookahead past it (spec §4.5).
        if let TokenKind::Ident(name) = &self.cur.kind {
            if crate::lex::keyword_for(name).is_none() && matches!(self.peek()?.kind, TokenKind::Punctuator(":")) {
                let loc = self.loc();
                let label_name = name.clone();
                self.bump()?; // identifier
                self.bump()?; // ':'
                let inner = self.statement()?;
                return Ok(self.ast.push(NodeKind::Label { name: label_name, inner }, None, loc));
            }
        }

        if self.check_punc("{") {
            return self.parse_compound_stmt();
        }
        if self.check_punc(";") {
            let loc = self.loc();
            self.bump()?;
            return Ok(self.ast.push(NodeKind::CompoundStmt { first: None }, None, loc));
        }

        match self.cur_keyword() {
            Some("if") => self.if_stmt(),
            Some("while") => self.while_stmt(),
            Some("do") => self.do_while_stmt(),
            Some("for") => self.for_stmt(),
            Some("switch") => self.switch_stmt(),
            Some("case") => self.case_stmt(),
            Some("default") => self.default_stmt(),
            Some("break") => self.break_stmt(),
            Some("continue") => self.continue_stmt(),
            Some("goto") => self.goto_stmt(),
            Some("return") => self.return_stmt(),
            _ => self.expr_stmt(),
        }
    }

    fn expr_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        let e = self.parse_expr()?;
        self.expect_punc(";")?;
        Ok(self.ast.push(NodeKind::ExprStmt(e), None, loc))
    }

    fn if_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'if'
        self.expect_punc("(")?;
        let cond = self.parse_expr()?;
        self.expect_punc(")")?;
        let then_ = self.statement()?;
        let else_ = if self.eat_kw("else")? { Some(self.statement()?) } else { None };
        Ok(self.ast.push(NodeKind::If { cond, then_, else_ }, None, loc))
    }

    fn while_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'while'
        self.expect_punc("(")?;
        let cond = self.parse_expr()?;
        self.expect_punc(")")?;
        self.scopes.push(ScopeKind::Loop);
        let body = self.statement();
        self.scopes.pop();
        let body = body?;
        Ok(self.ast.push(NodeKind::While { cond, body }, None, loc))
    }

    fn do_while_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'do'
        self.scopes.push(ScopeKind::Loop);
        let body = self.statement();
        self.scopes.pop();
        let body = body?;
        self.expect_kw("while")?;
        self.expect_punc("(")?;
        let cond = self.parse_expr()?;
        self.expect_punc(")")?;
        self.expect_punc(";")?;
        Ok(self.ast.push(NodeKind::DoWhile { body, cond }, None, loc))
    }

    fn for_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'for'
        self.expect_punc("(")?;
        self.scopes.push(ScopeKind::Loop);

        let result = (|| {
            let init = if self.check_punc(";") {
                self.bump()?;
                None
            } else if self.is_decl_start() {
                Some(self.local_declaration()?)
            } else {
                let e = self.parse_expr()?;
                let s = self.ast.push(NodeKind::ExprStmt(e), None, self.loc());
                self.expect_punc(";")?;
                Some(s)
            };

            let cond = if self.check_punc(";") { None } else { Some(self.parse_expr()?) };
            self.expect_punc(";")?;

            let step = if self.check_punc(")") { None } else { Some(self.parse_expr()?) };
            self.expect_punc(")")?;

            let body = self.statement()?;
            Ok(self.ast.push(NodeKind::For { init, cond, step, body }, None, loc))
        })();

        self.scopes.pop();
        result
    }

    fn switch_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'switch'
        self.expect_punc("(")?;
        let cond = self.parse_expr()?;
        self.expect_punc(")")?;

        self.switch_stack.push(SwitchCtx { values: Vec::new(), has_default: false, arms: Vec::new() });
        self.scopes.push(ScopeKind::Switch);
        let body = self.statement();
        self.scopes.pop();
        let body = body?;
        let ctx = self.switch_stack.pop().expect("switch context pushed above");

        Ok(self.ast.push(NodeKind::Switch { cond, body, cases: ctx.arms }, None, loc))
    }

    fn case_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'case'
        let e = self.parse_assignment_expr()?;
        let value = crate::consteval::eval_int(&self.ast, e)?;
        self.expect_punc(":")?;

        if self.switch_stack.is_empty() {
            return Err(CompileError::semantic("'case' label not within a switch statement", loc));
        }
        if self.switch_stack.last().unwrap().values.contains(&value) {
            return Err(CompileError::semantic(format!("duplicate case value '{value}'"), loc));
        }
        self.switch_stack.last_mut().unwrap().values.push(value);

        let inner = self.statement()?;
        let node = self.ast.push(NodeKind::Case { value, inner }, None, loc);
        self.switch_stack.last_mut().unwrap().arms.push(CaseArm { value: Some(value), body: node });
        Ok(node)
    }

    fn default_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'default'
        self.expect_punc(":")?;

        if self.switch_stack.is_empty() {
            return Err(CompileError::semantic("'default' label not within a switch statement", loc));
        }
        if self.switch_stack.last().unwrap().has_default {
            return Err(CompileError::semantic("multiple default labels in one switch", loc));
        }
        self.switch_stack.last_mut().unwrap().has_default = true;

        let inner = self.statement()?;
        let node = self.ast.push(NodeKind::Default { inner }, None, loc);
        self.switch_stack.last_mut().unwrap().arms.push(CaseArm { value: None, body: node });
        Ok(node)
    }

    fn break_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?;
        self.expect_punc(";")?;
        if !self.scopes.in_loop_or_switch() {
            return Err(CompileError::semantic("'break' statement not within a loop or switch", loc));
        }
        Ok(self.ast.push(NodeKind::Break, None, loc))
    }

    fn continue_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?;
        self.expect_punc(";")?;
        if !self.scopes.in_loop() {
            return Err(CompileError::semantic("'continue' statement not within a loop", loc));
        }
        Ok(self.ast.push(NodeKind::Continue, None, loc))
    }

    fn goto_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'goto'
        let name = self.expect_ident()?;
        self.expect_punc(";")?;
        Ok(self.ast.push(NodeKind::Goto(name), None, loc))
    }

    fn return_stmt(&mut self) -> Result<AstId, CompileError> {
        let loc = self.loc();
        self.bump()?; // 'return'
        let (ret_ty, is_void) = self
            .current_fn
            .ok_or_else(|| CompileError::internal("return statement parsed outside any function", loc.clone()))?;

        let value = if self.check_punc(";") {
            None
        } else {
            let e = self.parse_expr()?;
            Some(self.convert_for_assignment(e, ret_ty)?)
        };
        self.expect_punc(";")?;

        if is_void && value.is_some() {
            return Err(CompileError::semantic("void function should not return a value", loc));
        }
        if !is_void && value.is_none() {
            return Err(CompileError::semantic("non-void function should return a value", loc));
        }
        Ok(self.ast.push(NodeKind::Return(value), None, loc))
    }
}
