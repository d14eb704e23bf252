//! Built-in macro callbacks (spec §3, §6). Each rewrites the single
//! identifier token that referenced it in place; the preprocessor then
//! pushes the rewritten token back so it reparses as an ordinary literal.

use super::macro_table::BuiltinMacro;
use crate::lex::{StringEncoding, Token, TokenKind};

/// Wall-clock date/time captured once, at preprocessor construction, so that
/// every `__DATE__`/`__TIME__` expansion within one run is consistent (spec
/// §5: the pipeline is synchronous and has no business reading the clock
/// mid-compile).
#[derive(Clone, Debug)]
pub struct BuildStamp {
    pub date: String,
    pub time: String,
}

impl BuildStamp {
    /// Caller-supplied stamp (spec workflows forbid querying the wall clock
    /// deep in the pipeline); the CLI driver fetches the real date/time once
    /// at startup and threads it down to here.
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        BuildStamp { date: date.into(), time: time.into() }
    }
}

pub fn expand_builtin(
    kind: &BuiltinMacro,
    reference: &Token,
    current_file: &str,
    current_line: i32,
    stamp: &BuildStamp,
) -> Token {
    let mut tok = reference.clone();
    match kind {
        BuiltinMacro::File => {
            tok.kind = TokenKind::Str {
                value: current_file.to_string(),
                encoding: StringEncoding::Utf8,
            };
            tok.spelling = format!("\"{current_file}\"");
        }
        BuiltinMacro::Line => {
            let s = current_line.to_string();
            tok.kind = TokenKind::Number(s.clone());
            tok.spelling = s;
        }
        BuiltinMacro::Date => {
            tok.kind = TokenKind::Str {
                value: stamp.date.clone(),
                encoding: StringEncoding::Utf8,
            };
            tok.spelling = format!("\"{}\"", stamp.date);
        }
        BuiltinMacro::Time => {
            tok.kind = TokenKind::Str {
                value: stamp.time.clone(),
                encoding: StringEncoding::Utf8,
            };
            tok.spelling = format!("\"{}\"", stamp.time);
        }
        BuiltinMacro::StdC => {
            tok.kind = TokenKind::Number("1".to_string());
            tok.spelling = "1".to_string();
        }
        BuiltinMacro::StdCVersion => {
            tok.kind = TokenKind::Number("199901L".to_string());
            tok.spelling = "199901L".to_string();
        }
        BuiltinMacro::StdCHosted => {
            tok.kind = TokenKind::Number("1".to_string());
            tok.spelling = "1".to_string();
        }
    }
    tok
}
