//! A self-contained compiler frontend for a substantial subset of C (spec
//! §1): source text flows bytes -> characters -> raw tokens -> cooked
//! tokens -> typed AST -> SSA IR, each stage pulled by the next (spec §2).
//! Machine-code generation, register allocation, and assembly emission are
//! out of scope — external collaborators this crate does not implement
//! (spec §1, §4.8).

#![allow(dead_code)]

pub mod ast;
pub mod cli;
pub mod consteval;
pub mod diagnostics;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod preprocess;
pub mod settings;
pub mod source;
pub mod string_interning;
pub mod types;

use std::path::PathBuf;

use diagnostics::{CompileError, CompilerMessages};
use ir::Program;
use preprocess::{BuildStamp, Preprocessor};
use settings::Config;

/// Runs the whole frontend pipeline for one translation unit: preprocess,
/// parse (which drives the preprocessor token-by-token and builds the typed
/// AST inline, spec §4.5), then lower to IR (spec §4.7). Mirrors the
/// teacher's `CompilerFrontend` staged-method shape, collapsed to a single
/// function since this crate has only the one pull pipeline to run, not a
/// struct of independently invokable stages.
pub fn compile(config: &Config, stamp: BuildStamp) -> Result<(Program, CompilerMessages), CompilerMessages> {
    let source = std::fs::read_to_string(&config.input).map_err(|e| {
        CompilerMessages::from(CompileError::internal(
            format!("failed to read '{}': {e}", config.input.display()),
            diagnostics::SourceLoc::new(config.input.clone(), 0, 0),
        ))
    })?;

    let pp = Preprocessor::new(&source, config.input.clone(), config.include_paths.clone(), stamp);

    let (ast, warnings) = parse::Parser::parse_translation_unit(pp).map_err(CompilerMessages::from)?;

    let program = ir::lower_translation_unit(ast).map_err(CompilerMessages::from)?;

    let messages = CompilerMessages { errors: Vec::new(), warnings };
    Ok((program, messages))
}

/// Resolves a project's default `#include <...>` search list plus whatever
/// `ccfront.toml` next to the input adds (spec §6). Split out of `compile`
/// so the CLI can build a [`Config`] before any diagnostics exist to report
/// load failures against.
pub fn load_config(input: PathBuf) -> std::io::Result<Config> {
    let mut config = Config::new(input.clone());
    if let Some(dir) = input.parent() {
        config.load_project_file(dir)?;
    }
    Ok(config)
}
