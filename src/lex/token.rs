//! Token representation (spec §3, §4.2).
//!
//! A token is immutable from the lexer's point of view but is copied and
//! mutated during macro substitution (its hide-set grows; its kind can be
//! rewritten in place by a built-in macro), so `Token` derives `Clone` and
//! every field is plain owned data rather than a borrow.

use crate::source::reader::CharPosition;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// Per-token set of macro names suppressed from expansion at that token's
/// position (Prosser's algorithm, spec §4.3). Shared via `Rc` so that
/// unioning a hide-set into thousands of copied body tokens during macro
/// substitution doesn't repeatedly clone the same backing set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HideSet(Rc<BTreeSet<String>>);

impl HideSet {
    pub fn empty() -> Self {
        HideSet(Rc::new(BTreeSet::new()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// `self ∪ {name}`.
    pub fn with(&self, name: &str) -> Self {
        if self.0.contains(name) {
            return self.clone();
        }
        let mut set = (*self.0).clone();
        set.insert(name.to_string());
        HideSet(Rc::new(set))
    }

    /// `self ∪ other`.
    pub fn union(&self, other: &HideSet) -> Self {
        if self.0.is_empty() {
            return other.clone();
        }
        if other.0.is_empty() {
            return self.clone();
        }
        let mut set = (*self.0).clone();
        set.extend(other.0.iter().cloned());
        HideSet(Rc::new(set))
    }

    /// `self ∩ other`.
    pub fn intersect(&self, other: &HideSet) -> Self {
        let set: BTreeSet<String> = self.0.intersection(&other.0).cloned().collect();
        HideSet(Rc::new(set))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Utf16,
    Utf32,
    Wchar,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Punctuator(&'static str),
    /// Every identifier-shaped token, keywords included: spec §4.3 requires
    /// that keyword recognition happen only when the parser consumes a
    /// token, never during macro substitution or `#if` evaluation. Use
    /// [`keyword_for`] at the parser boundary to test/classify.
    Ident(String),
    /// Numeric literal kept as text; the parser/constant-evaluator is
    /// responsible for interpreting suffixes and base.
    Number(String),
    Char { value: u32, encoding: StringEncoding },
    Str { value: String, encoding: StringEncoding },
    /// A function-like macro parameter placeholder, used only inside a
    /// macro body between definition and substitution.
    MacroParam(usize),
    Newline,
    Space,
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub file: Rc<PathBuf>,
    pub pos: CharPosition,
    /// Whether this token was preceded by whitespace (including, per the
    /// preprocessor's stringify operator, across a line continuation).
    pub space_before: bool,
    pub hide_set: HideSet,
    /// The raw spelling as it appeared in source (or as synthesised by
    /// macro substitution / `glue_tks`); used by `#` stringify and `##`
    /// paste, and for diagnostics.
    pub spelling: String,
}

impl Token {
    pub fn new(kind: TokenKind, file: Rc<PathBuf>, pos: CharPosition, spelling: String) -> Self {
        Token {
            kind,
            file,
            pos,
            space_before: false,
            hide_set: HideSet::empty(),
            spelling,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    pub fn is_newline(&self) -> bool {
        matches!(self.kind, TokenKind::Newline)
    }

    pub fn is_ident(&self) -> bool {
        matches!(self.kind, TokenKind::Ident(_))
    }

    pub fn ident_name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn eq_str(&self, s: &str) -> bool {
        self.spelling == s
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spelling)
    }
}

/// Longest-match punctuator table, ordered longest-first so the lexer can
/// scan it in order and take the first match.
pub const PUNCTUATORS: &[&str] = &[
    "...", "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=",
    "-=", "*=", "/=", "%=", "&=", "^=", "|=", "##", "[", "]", "(", ")", "{", "}", ".", "&", "*",
    "+", "-", "~", "!", "/", "%", "<", ">", "^", "|", "?", ":", ";", "=", ",", "#",
];

pub const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Bool",
];

/// Classifies an identifier's spelling as a keyword, if it is one. Called
/// only at the parser boundary (see [`TokenKind::Ident`]) so that macro
/// bodies and `#if` conditions see plain identifiers, matching the
/// preprocessor's hands-off treatment of `if`/`while`/etc. inside macros.
pub fn keyword_for(name: &str) -> Option<&'static str> {
    KEYWORDS.iter().find(|&&kw| kw == name).copied()
}
