//! The preprocessor (spec §4.3): a single-threaded pull pipeline that turns
//! raw lexer tokens into the post-expansion stream the parser consumes.
//!
//! State is deliberately small and all owned by one [`Preprocessor`]: a
//! stack of [`Frame`]s (one per nested `#include`), a [`MacroTable`], a
//! [`CondStack`], and the include-once set. Everything else in this module
//! lives across `expand.rs` (hide-set substitution), `directives.rs`
//! (directive dispatch), `cond.rs`/`cond_eval.rs` (conditional inclusion),
//! `builtins.rs` (predefined macros), and `macro_table.rs` (macro storage).

mod builtins;
mod cond;
mod cond_eval;
mod directives;
mod expand;
mod macro_table;

pub use builtins::BuildStamp;
pub use cond::CondStack;
pub use macro_table::{BuiltinMacro, MacroDef, MacroTable};

use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::diagnostics::warnings::CompilerWarning;
use crate::lex::{Lexer, Token, TokenKind};
use rustc_hash::FxHashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One nested file in the `#include` stack (spec §4.3: "Include nests lexer
/// state on a parent-pointer stack").
struct Frame {
    lexer: Lexer,
    /// Directory of this frame's file, searched first for `#include "..."`.
    dir: PathBuf,
    /// Set by `#line "file"`; overrides the physical file name for
    /// `__FILE__` and diagnostics until the frame ends or is overridden again.
    file_override: Option<String>,
    /// Set by `#line N`: `(physical line of the line the directive applies
    /// to, the value N reports for that line)`.
    line_anchor: Option<(i32, i32)>,
}

pub(super) enum Expansion {
    /// The token was not a macro reference (or was hidden by its own
    /// hide-set, or a function-like macro not followed by `(`); the caller
    /// should emit it as-is.
    Unexpanded(Token),
    /// Replacement tokens were pushed back onto the current lexer; the
    /// caller should loop and re-lex.
    Expanded,
}

pub struct Preprocessor {
    frames: Vec<Frame>,
    macros: MacroTable,
    cond: CondStack,
    include_once: FxHashSet<PathBuf>,
    include_paths: Vec<PathBuf>,
    stamp: BuildStamp,
    warnings: Vec<CompilerWarning>,
    at_line_start: bool,
}

impl Preprocessor {
    pub fn new(source: &str, file: PathBuf, include_paths: Vec<PathBuf>, stamp: BuildStamp) -> Self {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        let lexer = Lexer::new(source, file);
        Preprocessor {
            frames: vec![Frame {
                lexer,
                dir,
                file_override: None,
                line_anchor: None,
            }],
            macros: MacroTable::new(),
            cond: CondStack::new(),
            include_once: FxHashSet::default(),
            include_paths,
            stamp,
            warnings: Vec::new(),
            at_line_start: true,
        }
    }

    pub fn open_file(path: &Path, include_paths: Vec<PathBuf>, stamp: BuildStamp) -> io::Result<Self> {
        let source = fs::read_to_string(path)?;
        Ok(Self::new(&source, path.to_path_buf(), include_paths, stamp))
    }

    pub fn warnings(&self) -> &[CompilerWarning] {
        &self.warnings
    }

    pub fn define(&mut self, name: String, def: MacroDef) {
        self.macros.define(name, def);
    }

    /// Pulls the next post-expansion, post-conditional token. Returns an
    /// `Eof` token exactly once nesting has fully unwound; never returns one
    /// early (spec §3: "End-of-file is reported once").
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        loop {
            let tok = self.raw_lex()?;

            if tok.is_eof() {
                if self.cond.unterminated() {
                    return Err(CompileError::preprocessor(
                        "unterminated conditional directive (missing #endif)",
                        self.loc(&tok),
                    ));
                }
                return Ok(tok);
            }

            if tok.is_newline() {
                self.at_line_start = true;
                continue;
            }

            let at_start = self.at_line_start;
            self.at_line_start = false;

            if at_start && matches!(tok.kind, TokenKind::Punctuator("#")) {
                self.handle_directive(tok)?;
                continue;
            }

            if !self.cond.is_active() {
                continue;
            }

            if tok.is_ident() {
                match self.try_expand(tok)? {
                    Expansion::Expanded => continue,
                    Expansion::Unexpanded(t) => return Ok(t),
                }
            }

            return Ok(tok);
        }
    }

    /// Lexes one token from the current frame with no macro expansion,
    /// transparently popping finished `#include` frames (spec §4.3).
    pub(super) fn raw_lex(&mut self) -> Result<Token, CompileError> {
        loop {
            let frame = self.frames.last_mut().expect("preprocessor frame stack is never empty");
            let tok = frame.lexer.lex_tk()?;
            if tok.is_eof() {
                if self.frames.len() == 1 {
                    return Ok(tok);
                }
                self.frames.pop();
                continue;
            }
            return Ok(tok);
        }
    }

    pub(super) fn raw_lex_skip_newlines(&mut self) -> Result<Token, CompileError> {
        loop {
            let tok = self.raw_lex()?;
            if !tok.is_newline() {
                return Ok(tok);
            }
        }
    }

    pub(super) fn current_lexer_mut(&mut self) -> &mut Lexer {
        &mut self.frames.last_mut().expect("preprocessor frame stack is never empty").lexer
    }

    pub(super) fn current_file_display(&self) -> String {
        let frame = self.frames.last().expect("preprocessor frame stack is never empty");
        frame
            .file_override
            .clone()
            .unwrap_or_else(|| frame.lexer.file().display().to_string())
    }

    pub(super) fn current_line(&self, tok: &Token) -> i32 {
        let frame = self.frames.last().expect("preprocessor frame stack is never empty");
        match frame.line_anchor {
            Some((anchor_phys, anchor_val)) => anchor_val + (tok.pos.line_number - anchor_phys),
            None => tok.pos.line_number,
        }
    }

    pub(super) fn set_current_file_override(&mut self, name: String) {
        self.frames.last_mut().expect("preprocessor frame stack is never empty").file_override = Some(name);
    }

    /// `value` is the line number `#line` reports for the physical line
    /// immediately after the directive (`directive_physical_line + 1`).
    pub(super) fn set_current_line_override(&mut self, value: i32, directive_physical_line: i32) {
        self.frames.last_mut().expect("preprocessor frame stack is never empty").line_anchor =
            Some((directive_physical_line + 1, value));
    }

    pub(super) fn push_warning(&mut self, msg: impl Into<String>, at: &Token) {
        self.warnings.push(CompilerWarning::new(msg, self.loc(at)));
    }

    pub(super) fn mark_include_once_current(&mut self) {
        let path = self
            .frames
            .last()
            .expect("preprocessor frame stack is never empty")
            .lexer
            .file()
            .to_path_buf();
        let canonical = std::fs::canonicalize(&path).unwrap_or(path);
        self.include_once.insert(canonical);
    }

    pub(super) fn open_include(
        &mut self,
        path: &str,
        quoted: bool,
        is_import: bool,
        hash: &Token,
    ) -> Result<(), CompileError> {
        let requested = PathBuf::from(path);
        let mut candidates: Vec<PathBuf> = Vec::new();

        if requested.is_absolute() {
            candidates.push(requested.clone());
        } else {
            if quoted {
                let dir = self.frames.last().expect("preprocessor frame stack is never empty").dir.clone();
                candidates.push(dir.join(&requested));
            }
            for inc in &self.include_paths {
                candidates.push(inc.join(&requested));
            }
        }

        let Some(found) = candidates.into_iter().find(|p| p.is_file()) else {
            return Err(CompileError::preprocessor(
                format!("'{path}' file not found"),
                self.loc(hash),
            ));
        };

        let canonical = std::fs::canonicalize(&found).unwrap_or_else(|_| found.clone());
        if self.include_once.contains(&canonical) {
            return Ok(());
        }
        if is_import {
            self.include_once.insert(canonical.clone());
        }

        let source = fs::read_to_string(&found).map_err(|e| {
            CompileError::preprocessor(format!("failed to read '{}': {e}", found.display()), self.loc(hash))
        })?;
        let dir = found.parent().map(Path::to_path_buf).unwrap_or_default();
        let lexer = Lexer::new(&source, found.clone());
        self.frames.push(Frame {
            lexer,
            dir,
            file_override: None,
            line_anchor: None,
        });
        Ok(())
    }

    pub fn loc(&self, tok: &Token) -> SourceLoc {
        SourceLoc::new(tok.file.as_ref().clone(), tok.pos.line_number, tok.pos.char_column)
    }
}
