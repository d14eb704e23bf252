//! Property-based tests for the quantified invariants in spec §8: integer
//! literal suffix typing and the preprocessor's hide-set discipline.

use std::path::PathBuf;

use proptest::prelude::*;

use ccfront::ast::NodeKind;
use ccfront::preprocess::{BuildStamp, Preprocessor};
use ccfront::types::{NumKind, Type};

fn stamp() -> BuildStamp {
    BuildStamp::new("Jan  1 1970", "00:00:00")
}

/// Parses `src` as a standalone translation unit and returns the type of the
/// natural (pre-assignment-conversion) value of the sole global `x`'s
/// initialiser. `long long` is wide enough to hold every unsuffixed or
/// `u`-suffixed int literal this module generates, so the parser always
/// wraps the literal in a `Conv` node rather than accepting it as-is,
/// giving a node to unwrap back to the literal's own inferred type.
fn natural_literal_type(src: &str) -> NumKind {
    let pp = Preprocessor::new(src, PathBuf::from("t.c"), Vec::new(), stamp());
    let (ast, _warnings) = ccfront::parse::Parser::parse_translation_unit(pp).expect("parse failed");
    let (_, global) = ast.globals().find(|(_, g)| g.name == "x").expect("global 'x' exists");
    let init = match global.kind {
        ccfront::ast::GlobalKind::Data(Some(id)) => id,
        _ => panic!("expected a data global with an initialiser"),
    };
    let operand = match &ast.node(init).kind {
        NodeKind::Conv { operand, .. } => *operand,
        other => panic!("expected the initialiser to be wrapped in a Conv node, got {other:?}"),
    };
    let ty = ast.type_of(operand).expect("literal node carries a resolved type");
    match ast.types.get(ty) {
        Type::Num(k) => *k,
        other => panic!("expected a numeric type, got {other:?}"),
    }
}

proptest! {
    /// An unsuffixed decimal literal that fits `i32` is typed `int` (spec §8,
    /// "suffix-driven integer literal typing").
    #[test]
    fn unsuffixed_literal_in_int_range_is_typed_int(n in 0i64..=i32::MAX as i64) {
        let ty = natural_literal_type(&format!("long long x = {n};"));
        prop_assert_eq!(ty, NumKind::Int);
    }

    /// A `u`-suffixed literal that fits `u32` is typed `unsigned int`,
    /// regardless of how many decimal digits it takes to write.
    #[test]
    fn u_suffixed_literal_in_uint_range_is_typed_unsigned_int(n in 0u32..=u32::MAX) {
        let ty = natural_literal_type(&format!("long long x = {n}u;"));
        prop_assert_eq!(ty, NumKind::UInt);
    }

    /// An unsuffixed literal too large for `int` climbs the signed ladder to
    /// `long`, regardless of how much larger it is.
    #[test]
    fn unsuffixed_literal_above_int_range_is_typed_long(n in (i32::MAX as i64 + 1)..=i64::MAX) {
        let ty = natural_literal_type(&format!("long long x = {n};"));
        prop_assert_eq!(ty, NumKind::Long);
    }
}

/// Collects every token `next_token` produces for `src`, stopping at `Eof`.
fn tokenize_all(src: &str) -> Vec<ccfront::lex::Token> {
    let mut pp = Preprocessor::new(src, PathBuf::from("t.c"), Vec::new(), stamp());
    let mut tokens = Vec::new();
    loop {
        let tok = pp.next_token().expect("preprocessing failed");
        let is_eof = matches!(tok.kind, ccfront::lex::TokenKind::Eof);
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    tokens
}

proptest! {
    /// Prosser's algorithm (spec §4.3): every token produced while expanding
    /// an object-like macro named `M` carries `M` in its hide-set, so `M`
    /// itself can never re-trigger expansion from inside its own body.
    #[test]
    fn every_token_from_an_object_macro_expansion_carries_its_own_name_in_its_hide_set(
        value in 1i64..=1000,
    ) {
        let src = format!("#define M {value} + {value}\nint x = M;\n");
        let tokens = tokenize_all(&src);
        let inside_expansion: Vec<_> = tokens
            .iter()
            .filter(|t| matches!(&t.kind, ccfront::lex::TokenKind::Number(n) if n == &value.to_string()))
            .collect();
        prop_assert_eq!(inside_expansion.len(), 2);
        for tok in inside_expansion {
            prop_assert!(tok.hide_set.contains("M"));
        }
    }

    /// Tokenizing the same source twice, from scratch, is deterministic —
    /// the preprocessor carries no hidden global state across runs.
    #[test]
    fn tokenizing_the_same_source_twice_is_deterministic(value in 0i64..=10_000) {
        let src = format!("#define N {value}\nint x = N * 2;\n");
        let a = tokenize_all(&src);
        let b = tokenize_all(&src);
        prop_assert_eq!(a.len(), b.len());
        for (ta, tb) in a.iter().zip(b.iter()) {
            prop_assert_eq!(format!("{:?}", ta.kind), format!("{:?}", tb.kind));
        }
    }
}
