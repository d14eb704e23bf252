//! Macro substitution: Prosser's hide-set algorithm (spec §4.3).

use super::builtins::expand_builtin;
use super::macro_table::MacroDef;
use super::{Expansion, Preprocessor};
use crate::diagnostics::errors::CompileError;
use crate::lex::lexer::glue_tks;
use crate::lex::{HideSet, Token, TokenKind};

impl Preprocessor {
    /// Tries to expand `tok` (already known to be an identifier) as a macro.
    /// Returns [`Expansion::Unexpanded`] carrying `tok` back if it is not a
    /// macro, is hidden by its own hide-set, or is a function-like macro
    /// name not followed by `(` — in every such case `tok` itself is simply
    /// handed back, never pushed onto the lexer, so the caller can emit it
    /// directly without a re-lex round trip.
    pub(super) fn try_expand(&mut self, tok: Token) -> Result<Expansion, CompileError> {
        let name = match tok.ident_name() {
            Some(n) => n.to_string(),
            None => return Ok(Expansion::Unexpanded(tok)),
        };

        if tok.hide_set.contains(&name) {
            return Ok(Expansion::Unexpanded(tok));
        }

        let Some(def) = self.macros.get(&name) else {
            return Ok(Expansion::Unexpanded(tok));
        };

        match def {
            MacroDef::Builtin(_) => {
                self.expand_builtin_ref(&name, tok);
                Ok(Expansion::Expanded)
            }
            MacroDef::ObjectLike { .. } => {
                self.expand_object_like(&name, tok)?;
                Ok(Expansion::Expanded)
            }
            MacroDef::FunctionLike { .. } => {
                if self.expand_function_like(&name, tok.clone())? {
                    Ok(Expansion::Expanded)
                } else {
                    // Not followed by `(`: emit the identifier unchanged.
                    Ok(Expansion::Unexpanded(tok))
                }
            }
        }
    }

    fn expand_builtin_ref(&mut self, name: &str, tok: Token) {
        let Some(MacroDef::Builtin(kind)) = self.macros.get(name) else {
            unreachable!()
        };
        let current_line = self.current_line(&tok);
        let rewritten = expand_builtin(kind, &tok, &self.current_file_display(), current_line, &self.stamp);
        self.current_lexer_mut().undo_tk(rewritten);
    }

    fn expand_object_like(&mut self, name: &str, tok: Token) -> Result<(), CompileError> {
        let Some(MacroDef::ObjectLike { body }) = self.macros.get(name) else {
            unreachable!()
        };
        let new_hide_set = tok.hide_set.with(name);
        let expanded: Vec<Token> = body
            .iter()
            .cloned()
            .map(|mut t| {
                t.hide_set = t.hide_set.union(&new_hide_set);
                t
            })
            .collect();
        self.current_lexer_mut().undo_tks(expanded);
        Ok(())
    }

    /// Returns `Ok(true)` if `(` followed and the macro was expanded;
    /// `Ok(false)` if no `(` followed (caller must re-emit the bare name).
    fn expand_function_like(&mut self, name: &str, invocation: Token) -> Result<bool, CompileError> {
        let next = self.raw_lex_skip_newlines()?;
        if !matches!(&next.kind, TokenKind::Punctuator("(")) {
            self.current_lexer_mut().undo_tk(next);
            return Ok(false);
        }

        let (params, vararg, body) = {
            let Some(MacroDef::FunctionLike { params, vararg, body }) = self.macros.get(name)
            else {
                unreachable!()
            };
            (params.clone(), *vararg, body.clone())
        };

        let (args, closing_paren) = self.parse_macro_args(&params, vararg, &invocation)?;

        let new_hide_set = invocation
            .hide_set
            .intersect(&closing_paren.hide_set)
            .with(name);

        let substituted = self.substitute_body(&body, &params, vararg, &args)?;
        let expanded: Vec<Token> = substituted
            .into_iter()
            .map(|mut t| {
                t.hide_set = t.hide_set.union(&new_hide_set);
                t
            })
            .collect();
        self.current_lexer_mut().undo_tks(expanded);
        Ok(true)
    }

    /// Parses comma-separated arguments up to the matching `)`, respecting
    /// nested parens; variadic parameters swallow all remaining commas.
    fn parse_macro_args(
        &mut self,
        params: &[String],
        vararg: bool,
        invocation: &Token,
    ) -> Result<(Vec<Vec<Token>>, Token), CompileError> {
        let mut args: Vec<Vec<Token>> = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut depth = 0usize;

        let closing = loop {
            let tok = self.raw_lex_skip_newlines()?;
            if tok.is_eof() {
                return Err(CompileError::preprocessor(
                    "unterminated macro argument list",
                    self.loc(&invocation),
                ));
            }
            match &tok.kind {
                TokenKind::Punctuator("(") => {
                    depth += 1;
                    current.push(tok);
                }
                TokenKind::Punctuator(")") if depth == 0 => {
                    args.push(std::mem::take(&mut current));
                    break tok;
                }
                TokenKind::Punctuator(")") => {
                    depth -= 1;
                    current.push(tok);
                }
                TokenKind::Punctuator(",") if depth == 0 && !(vararg && args.len() + 1 >= params.len()) => {
                    args.push(std::mem::take(&mut current));
                }
                _ => current.push(tok),
            }
        };

        // A single empty argument is allowed when num_params == 1.
        if args.len() == 1 && args[0].is_empty() && params.len() == 1 {
            // keep as-is: one empty argument
        }

        let expected = if vararg { params.len().max(1) } else { params.len() };
        if args.len() < expected && !(params.is_empty() && args.len() == 1 && args[0].is_empty()) {
            return Err(CompileError::preprocessor(
                "macro argument count mismatch",
                self.loc(invocation),
            ));
        }

        Ok((args, closing))
    }

    /// Performs `#`, `##`, and plain parameter substitution over a macro
    /// body, then returns the resulting token sequence (not yet hide-set
    /// stamped with the invocation's own name — the caller does that).
    fn substitute_body(
        &mut self,
        body: &[Token],
        params: &[String],
        vararg: bool,
        args: &[Vec<Token>],
    ) -> Result<Vec<Token>, CompileError> {
        let va_args_index = if vararg { Some(params.len()) } else { None };
        let param_index = |name: &str| -> Option<usize> {
            if vararg && name == "__VA_ARGS__" {
                return va_args_index;
            }
            params.iter().position(|p| p == name)
        };

        let mut out: Vec<Token> = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let tok = &body[i];

            if tok.eq_str("#") && i + 1 < body.len() {
                if let Some(idx) = tok_param_index(&body[i + 1], &param_index) {
                    let arg = args.get(idx).cloned().unwrap_or_default();
                    out.push(stringify(&arg, tok));
                    i += 2;
                    continue;
                }
            }

            if tok.eq_str("##") {
                // `<anything> ## <param-or-token>`: paste previous output
                // token with the first token of this operand.
                let prev = out.pop().ok_or_else(|| {
                    CompileError::preprocessor("'##' cannot appear at start of macro body", self.loc(tok))
                })?;
                i += 1;
                let rhs = body.get(i).ok_or_else(|| {
                    CompileError::preprocessor("'##' cannot appear at end of macro body", self.loc(tok))
                })?;

                if let Some(idx) = tok_param_index(rhs, &param_index) {
                    let arg = args.get(idx).cloned().unwrap_or_default();
                    if Some(idx) == va_args_index && arg.is_empty() && prev.eq_str(",") {
                        // `, ## __VA_ARGS__` with empty varargs: drop the comma.
                        i += 1;
                        continue;
                    }
                    if arg.is_empty() {
                        out.push(prev);
                        i += 1;
                        continue;
                    }
                    let glued = glue_tks(&prev, &arg[0])?;
                    out.push(glued);
                    out.extend(arg[1..].iter().cloned());
                    i += 1;
                    continue;
                }

                let glued = glue_tks(&prev, rhs)?;
                out.push(glued);
                i += 1;
                continue;
            }

            if let Some(idx) = tok_param_index(tok, &param_index) {
                // Pre-expand unless this occurrence feeds a following `##`
                // (handled above) or a preceding `#` (handled above).
                let followed_by_paste = body.get(i + 1).map(|t| t.eq_str("##")).unwrap_or(false);
                let arg = args.get(idx).cloned().unwrap_or_default();
                if followed_by_paste {
                    out.extend(arg);
                } else {
                    out.extend(self.pre_expand_argument(arg)?);
                }
                i += 1;
                continue;
            }

            out.push(tok.clone());
            i += 1;
        }

        Ok(out)
    }

    /// Recursively expands an argument's tokens in isolation, using a fresh
    /// lexer fed from just those tokens (spec §9: first-class
    /// create-lexer-from-tokens operation).
    fn pre_expand_argument(&mut self, tokens: Vec<Token>) -> Result<Vec<Token>, CompileError> {
        if tokens.is_empty() {
            return Ok(tokens);
        }
        let mut sub = crate::lex::Lexer::from_tokens(tokens);
        let mut out = Vec::new();
        loop {
            let tok = sub.lex_tk();
            if tok.is_eof() {
                break;
            }
            if tok.is_ident() {
                let name = tok.ident_name().unwrap().to_string();
                if !tok.hide_set.contains(&name) {
                    if let Some(def) = self.macros.get(&name) {
                        match def {
                            MacroDef::ObjectLike { body } => {
                                let hs = tok.hide_set.with(&name);
                                let body = body.clone();
                                for mut t in body {
                                    t.hide_set = t.hide_set.union(&hs);
                                    sub.undo_tk(t);
                                }
                                continue;
                            }
                            // Function-like/builtin pre-expansion inside an
                            // argument is rare; fall through unexpanded
                            // rather than re-enter the full driver here.
                            _ => {}
                        }
                    }
                }
            }
            out.push(tok);
        }
        Ok(out)
    }
}

fn tok_param_index(tok: &Token, lookup: &impl Fn(&str) -> Option<usize>) -> Option<usize> {
    tok.ident_name().and_then(lookup)
}

/// `#` stringify: spaces collapsed to single spaces between tokens,
/// leading/trailing whitespace stripped (spec §4.3).
fn stringify(arg: &[Token], hash_tok: &Token) -> Token {
    let mut s = String::new();
    for (i, t) in arg.iter().enumerate() {
        if i > 0 && t.space_before {
            s.push(' ');
        }
        if matches!(t.kind, TokenKind::Str { .. } | TokenKind::Char { .. }) {
            for c in t.spelling.chars() {
                if c == '"' || c == '\\' {
                    s.push('\\');
                }
                s.push(c);
            }
        } else {
            s.push_str(&t.spelling);
        }
    }
    let spelling = format!("\"{s}\"");
    Token::new(
        TokenKind::Str {
            value: s,
            encoding: crate::lex::StringEncoding::Utf8,
        },
        hash_tok.file.clone(),
        hash_tok.pos,
        spelling,
    )
}
