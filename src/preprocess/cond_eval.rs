//! Integer constant-expression evaluation for `#if`/`#elif` (spec §4.3,
//! §4.5). This is a small self-contained evaluator over a token slice,
//! deliberately not the full AST constant evaluator: at `#if` time there is
//! no type system yet, only plain `long long` arithmetic with `defined(X)`
//! rewritten to `1`/`0` and every other bare identifier treated as `0`.

use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::lex::{Token, TokenKind};

pub fn eval_condition(tokens: &[Token]) -> Result<bool, CompileError> {
    let mut p = Parser { tokens, pos: 0 };
    let v = p.conditional()?;
    if p.pos != p.tokens.len() {
        return Err(err(p.peek(), "trailing tokens in #if expression"));
    }
    Ok(v != 0)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.peek().map(|t| t.eq_str(s)).unwrap_or(false) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn conditional(&mut self) -> Result<i64, CompileError> {
        let cond = self.logical_or()?;
        if self.eat("?") {
            let then_v = self.conditional()?;
            if !self.eat(":") {
                return Err(err(self.peek(), "expected ':' in '?:'"));
            }
            let else_v = self.conditional()?;
            return Ok(if cond != 0 { then_v } else { else_v });
        }
        Ok(cond)
    }

    fn logical_or(&mut self) -> Result<i64, CompileError> {
        let mut v = self.logical_and()?;
        while self.eat("||") {
            let rhs = self.logical_and()?;
            v = ((v != 0) || (rhs != 0)) as i64;
        }
        Ok(v)
    }

    fn logical_and(&mut self) -> Result<i64, CompileError> {
        let mut v = self.bit_or()?;
        while self.eat("&&") {
            let rhs = self.bit_or()?;
            v = ((v != 0) && (rhs != 0)) as i64;
        }
        Ok(v)
    }

    fn bit_or(&mut self) -> Result<i64, CompileError> {
        let mut v = self.bit_xor()?;
        while self.eat("|") {
            v |= self.bit_xor()?;
        }
        Ok(v)
    }

    fn bit_xor(&mut self) -> Result<i64, CompileError> {
        let mut v = self.bit_and()?;
        while self.eat("^") {
            v ^= self.bit_and()?;
        }
        Ok(v)
    }

    fn bit_and(&mut self) -> Result<i64, CompileError> {
        let mut v = self.equality()?;
        while self.eat("&") {
            v &= self.equality()?;
        }
        Ok(v)
    }

    fn equality(&mut self) -> Result<i64, CompileError> {
        let mut v = self.relational()?;
        loop {
            if self.eat("==") {
                v = (v == self.relational()?) as i64;
            } else if self.eat("!=") {
                v = (v != self.relational()?) as i64;
            } else {
                break;
            }
        }
        Ok(v)
    }

    fn relational(&mut self) -> Result<i64, CompileError> {
        let mut v = self.shift()?;
        loop {
            if self.eat("<") {
                v = (v < self.shift()?) as i64;
            } else if self.eat(">") {
                v = (v > self.shift()?) as i64;
            } else if self.eat("<=") {
                v = (v <= self.shift()?) as i64;
            } else if self.eat(">=") {
                v = (v >= self.shift()?) as i64;
            } else {
                break;
            }
        }
        Ok(v)
    }

    fn shift(&mut self) -> Result<i64, CompileError> {
        let mut v = self.additive()?;
        loop {
            if self.eat("<<") {
                v <<= self.additive()?;
            } else if self.eat(">>") {
                v >>= self.additive()?;
            } else {
                break;
            }
        }
        Ok(v)
    }

    fn additive(&mut self) -> Result<i64, CompileError> {
        let mut v = self.multiplicative()?;
        loop {
            if self.eat("+") {
                v += self.multiplicative()?;
            } else if self.eat("-") {
                v -= self.multiplicative()?;
            } else {
                break;
            }
        }
        Ok(v)
    }

    fn multiplicative(&mut self) -> Result<i64, CompileError> {
        let mut v = self.unary()?;
        loop {
            if self.eat("*") {
                v *= self.unary()?;
            } else if self.eat("/") {
                let rhs = self.unary()?;
                if rhs == 0 {
                    return Err(err(self.peek(), "division by zero in #if expression"));
                }
                v /= rhs;
            } else if self.eat("%") {
                let rhs = self.unary()?;
                if rhs == 0 {
                    return Err(err(self.peek(), "division by zero in #if expression"));
                }
                v %= rhs;
            } else {
                break;
            }
        }
        Ok(v)
    }

    fn unary(&mut self) -> Result<i64, CompileError> {
        if self.eat("!") {
            return Ok((self.unary()? == 0) as i64);
        }
        if self.eat("~") {
            return Ok(!self.unary()?);
        }
        if self.eat("-") {
            return Ok(-self.unary()?);
        }
        if self.eat("+") {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i64, CompileError> {
        if self.eat("(") {
            let v = self.conditional()?;
            if !self.eat(")") {
                return Err(err(self.peek(), "expected ')'"));
            }
            return Ok(v);
        }

        let tok = self.bump().ok_or_else(|| err(None, "unexpected end of #if expression"))?;
        match &tok.kind {
            TokenKind::Number(text) => parse_int_literal(text, tok),
            TokenKind::Char { value, .. } => Ok(*value as i64),
            TokenKind::Ident(_) => {
                // Any identifier surviving to this point is not a macro
                // (macro expansion already ran); §4.3 says it evaluates to 0.
                Ok(0)
            }
            _ => Err(err(Some(tok), "unexpected token in #if expression")),
        }
    }
}

fn parse_int_literal(text: &str, tok: &Token) -> Result<i64, CompileError> {
    let trimmed = text.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or(trimmed.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        i64::from_str_radix(&trimmed[1..], 8)
    } else {
        trimmed.parse::<i64>()
    };
    parsed.map_err(|_| err(Some(tok), "invalid integer literal in #if expression"))
}

fn err(tok: Option<&Token>, msg: &str) -> CompileError {
    let loc = match tok {
        Some(t) => SourceLoc::new(t.file.as_ref().clone(), t.pos.line_number, t.pos.char_column),
        None => SourceLoc::default(),
    };
    CompileError::preprocessor(msg, loc)
}
