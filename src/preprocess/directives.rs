//! Directive dispatch: `#define`, `#undef`, `#include`, `#import`, `#if`
//! family, `#line`, `#pragma`, `#error`, `#warning` (spec §4.3).

use super::cond_eval::eval_condition;
use super::macro_table::MacroDef;
use super::Preprocessor;
use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::lex::{Lexer, Token, TokenKind};

impl Preprocessor {
    /// Called when a `#` is seen as the first token on a line. Consumes and
    /// acts on the whole directive; returns `Ok(())` once the line has been
    /// fully handled (including its terminating newline).
    pub(super) fn handle_directive(&mut self, hash: Token) -> Result<(), CompileError> {
        let name_tok = self.raw_lex()?;
        if name_tok.is_newline() || name_tok.is_eof() {
            // A lone `#` on a line is a null directive; no-op.
            return Ok(());
        }
        let name = name_tok.ident_name().unwrap_or("").to_string();

        // Inside a dead `#if`/`#ifdef` branch, only the directives that
        // manage the conditional stack itself are interpreted; everything
        // else (including a malformed `#define` or a missing `#include`)
        // is scanned past without side effects (spec §4.3: `skip_cond_incl`).
        if !self.cond.is_active()
            && !matches!(name.as_str(), "if" | "ifdef" | "ifndef" | "elif" | "else" | "endif")
        {
            self.skip_to_newline()?;
            return Ok(());
        }

        match name.as_str() {
            "define" => self.directive_define(),
            "undef" => self.directive_undef(&hash),
            "include" => self.directive_include(&hash, false),
            "import" => self.directive_include(&hash, true),
            "if" => self.directive_if(&hash),
            "ifdef" => self.directive_ifdef(&hash, true),
            "ifndef" => self.directive_ifdef(&hash, false),
            "elif" => self.directive_elif(&hash),
            "else" => self.directive_else(&hash),
            "endif" => self.directive_endif(&hash),
            "line" => self.directive_line(&hash),
            "error" => self.directive_error(&hash),
            "warning" => self.directive_warning(&hash),
            "pragma" => self.directive_pragma(&hash),
            _ => Err(CompileError::preprocessor(
                format!("unknown preprocessor directive '#{name}'"),
                self.loc(&hash),
            )),
        }
    }

    fn directive_define(&mut self) -> Result<(), CompileError> {
        let name_tok = self.raw_lex()?;
        let name = name_tok
            .ident_name()
            .ok_or_else(|| CompileError::preprocessor("macro name must be an identifier", self.loc(&name_tok)))?
            .to_string();

        let next = self.raw_lex()?;
        let def = if matches!(&next.kind, TokenKind::Punctuator("(")) && !next.space_before {
            self.define_function_like(&name, &name_tok)?
        } else {
            self.current_lexer_mut().undo_tk(next);
            self.define_object_like(&name_tok)?
        };

        if let MacroDef::ObjectLike { body } | MacroDef::FunctionLike { body, .. } = &def {
            check_paste_not_at_ends(body, &name_tok)?;
        }

        self.macros.define(name, def);
        Ok(())
    }

    fn define_object_like(&mut self, name_tok: &Token) -> Result<MacroDef, CompileError> {
        let mut body = Vec::new();
        loop {
            let tok = self.raw_lex()?;
            if tok.is_newline() || tok.is_eof() {
                break;
            }
            body.push(tok);
        }
        let _ = name_tok;
        Ok(MacroDef::ObjectLike { body })
    }

    fn define_function_like(&mut self, _name: &str, name_tok: &Token) -> Result<MacroDef, CompileError> {
        self.raw_lex()?; // consume '('
        let mut params = Vec::new();
        let mut vararg = false;
        loop {
            let tok = self.raw_lex()?;
            match &tok.kind {
                TokenKind::Punctuator(")") => break,
                TokenKind::Punctuator(",") => continue,
                TokenKind::Punctuator("...") => {
                    vararg = true;
                }
                TokenKind::Ident(p) => params.push(p.clone()),
                _ => {
                    return Err(CompileError::preprocessor(
                        "malformed macro parameter list",
                        self.loc(&tok),
                    ))
                }
            }
        }

        let mut body = Vec::new();
        loop {
            let tok = self.raw_lex()?;
            if tok.is_newline() || tok.is_eof() {
                break;
            }
            body.push(tok);
        }
        let _ = name_tok;
        Ok(MacroDef::FunctionLike { params, vararg, body })
    }

    fn directive_undef(&mut self, hash: &Token) -> Result<(), CompileError> {
        let name_tok = self.raw_lex()?;
        let name = name_tok
            .ident_name()
            .ok_or_else(|| CompileError::preprocessor("macro name must be an identifier", self.loc(hash)))?;
        self.macros.undef(name);
        self.skip_to_newline()?;
        Ok(())
    }

    fn directive_include(&mut self, hash: &Token, is_import: bool) -> Result<(), CompileError> {
        let (path, quoted) = self.current_lexer_mut().lex_include_path()?;
        self.skip_to_newline()?;
        self.open_include(&path, quoted, is_import, hash)
    }

    fn directive_if(&mut self, hash: &Token) -> Result<(), CompileError> {
        let line = self.read_directive_line_tokens()?;
        if !self.cond.is_active() {
            self.cond.push_skipped();
            return Ok(());
        }
        let resolved = self.resolve_if_line(line)?;
        let value = eval_condition(&resolved)?;
        self.cond.push_if(value);
        let _ = hash;
        Ok(())
    }

    fn directive_ifdef(&mut self, hash: &Token, want_defined: bool) -> Result<(), CompileError> {
        let name_tok = self.raw_lex()?;
        self.skip_to_newline()?;
        if !self.cond.is_active() {
            self.cond.push_skipped();
            return Ok(());
        }
        let name = name_tok
            .ident_name()
            .ok_or_else(|| CompileError::preprocessor("macro name must be an identifier", self.loc(hash)))?;
        let defined = self.macros.is_defined(name);
        self.cond.push_if(defined == want_defined);
        Ok(())
    }

    fn directive_elif(&mut self, hash: &Token) -> Result<(), CompileError> {
        // Per spec/C convention, an `#elif` whose enclosing chain is already
        // dead (a prior arm was taken, or the chain itself sits inside an
        // inactive outer conditional) has its condition neither expanded nor
        // folded — skipping that work also means a malformed expression in
        // genuinely-dead code is never a fatal error.
        if !self.cond.parent_active() || self.cond.current_taken() {
            self.skip_to_newline()?;
            return self
                .cond
                .elif(false)
                .map_err(|m| CompileError::preprocessor(m, self.loc(hash)));
        }

        let line = self.read_directive_line_tokens()?;
        let resolved = self.resolve_if_line(line)?;
        let value = eval_condition(&resolved)?;
        self.cond
            .elif(value)
            .map_err(|m| CompileError::preprocessor(m, self.loc(hash)))
    }

    fn directive_else(&mut self, hash: &Token) -> Result<(), CompileError> {
        self.skip_to_newline()?;
        self.cond.else_().map_err(|m| CompileError::preprocessor(m, self.loc(hash)))
    }

    fn directive_endif(&mut self, hash: &Token) -> Result<(), CompileError> {
        self.skip_to_newline()?;
        self.cond.endif().map_err(|m| CompileError::preprocessor(m, self.loc(hash)))
    }

    /// Rewrites `defined X` / `defined(X)` to `1`/`0` without macro-expanding
    /// `X`, then macro-expands everything else on the line.
    fn resolve_if_line(&mut self, line: Vec<Token>) -> Result<Vec<Token>, CompileError> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < line.len() {
            if line[i].eq_str("defined") {
                let (name, consumed) = if line.get(i + 1).map(|t| t.eq_str("(")).unwrap_or(false) {
                    let name = line
                        .get(i + 2)
                        .and_then(|t| t.ident_name())
                        .ok_or_else(|| CompileError::preprocessor("expected identifier after 'defined('", self.loc(&line[i])))?
                        .to_string();
                    (name, 4)
                } else {
                    let name = line
                        .get(i + 1)
                        .and_then(|t| t.ident_name())
                        .ok_or_else(|| CompileError::preprocessor("expected identifier after 'defined'", self.loc(&line[i])))?
                        .to_string();
                    (name, 2)
                };
                let value = self.macros.is_defined(&name) as i64;
                out.push(int_token(value, &line[i]));
                i += consumed;
            } else {
                out.push(line[i].clone());
                i += 1;
            }
        }

        // Macro-expand the resolved line using a disposable token-vector lexer.
        self.macro_expand_tokens(out)
    }

    fn directive_line(&mut self, hash: &Token) -> Result<(), CompileError> {
        let line_tok = self.raw_lex()?;
        let line_no: i32 = match &line_tok.kind {
            TokenKind::Number(n) => n.parse().map_err(|_| {
                CompileError::preprocessor("expected line number after #line", self.loc(hash))
            })?,
            _ => return Err(CompileError::preprocessor("expected line number after #line", self.loc(hash))),
        };

        let next = self.raw_lex()?;
        if let TokenKind::Str { value, .. } = &next.kind {
            self.set_current_file_override(value.clone());
            self.skip_to_newline()?;
        } else if !(next.is_newline() || next.is_eof()) {
            return Err(CompileError::preprocessor("expected string literal after #line number", self.loc(hash)));
        }
        self.set_current_line_override(line_no, hash.pos.line_number);
        Ok(())
    }

    fn directive_error(&mut self, hash: &Token) -> Result<(), CompileError> {
        let text = self.current_lexer_mut().lex_rest_of_line();
        Err(CompileError::preprocessor(format!("#error {}", text.trim()), self.loc(hash)))
    }

    fn directive_warning(&mut self, hash: &Token) -> Result<(), CompileError> {
        let text = self.current_lexer_mut().lex_rest_of_line();
        self.push_warning(format!("#warning {}", text.trim()), hash);
        self.skip_to_newline()?;
        Ok(())
    }

    fn directive_pragma(&mut self, hash: &Token) -> Result<(), CompileError> {
        let name_tok = self.raw_lex()?;
        if name_tok.eq_str("once") {
            self.mark_include_once_current();
            self.skip_to_newline()?;
            return Ok(());
        }
        Err(CompileError::preprocessor(
            format!("unknown #pragma '{}'", name_tok.spelling),
            self.loc(&name_tok),
        ))
    }

    fn read_directive_line_tokens(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut out = Vec::new();
        loop {
            let tok = self.raw_lex()?;
            if tok.is_newline() || tok.is_eof() {
                break;
            }
            out.push(tok);
        }
        Ok(out)
    }

    fn skip_to_newline(&mut self) -> Result<(), CompileError> {
        loop {
            let tok = self.raw_lex()?;
            if tok.is_newline() || tok.is_eof() {
                break;
            }
        }
        Ok(())
    }
}

fn check_paste_not_at_ends(body: &[Token], name_tok: &Token) -> Result<(), CompileError> {
    if body.first().map(|t| t.eq_str("##")).unwrap_or(false)
        || body.last().map(|t| t.eq_str("##")).unwrap_or(false)
    {
        return Err(CompileError::preprocessor(
            "'##' cannot appear at the start or end of a macro body",
            SourceLoc::new(
                name_tok.file.as_ref().clone(),
                name_tok.pos.line_number,
                name_tok.pos.char_column,
            ),
        ));
    }
    Ok(())
}

fn int_token(value: i64, at: &Token) -> Token {
    let text = value.to_string();
    Token::new(TokenKind::Number(text.clone()), at.file.clone(), at.pos, text)
}

/// Macro-expands a flat, already-lexed token vector in isolation (used by
/// `#if`/`#elif`, which run before the main pull loop sees the rest of the
/// line).
impl Preprocessor {
    fn macro_expand_tokens(&mut self, tokens: Vec<Token>) -> Result<Vec<Token>, CompileError> {
        let mut lexer = Lexer::from_tokens(tokens);
        let mut out = Vec::new();
        loop {
            let tok = lexer.lex_tk();
            if tok.is_eof() {
                break;
            }
            if tok.is_ident() {
                let name = tok.ident_name().unwrap().to_string();
                if !tok.hide_set.contains(&name) {
                    if let Some(def) = self.macros.get(&name) {
                        if let MacroDef::ObjectLike { body } = def {
                            let hs = tok.hide_set.with(&name);
                            let body = body.clone();
                            for mut t in body {
                                t.hide_set = t.hide_set.union(&hs);
                                lexer.undo_tk(t);
                            }
                            continue;
                        }
                        // Function-like macros in #if conditions are
                        // uncommon; left unexpanded here and evaluated as
                        // the bare identifier (=> 0) per §4.3.
                    }
                }
            }
            out.push(tok);
        }
        Ok(out)
    }
}
