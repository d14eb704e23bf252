//! Token producer (spec §4.2). Wraps a [`FileReader`] and turns its
//! character stream into [`Token`]s, with its own push-back stack so the
//! preprocessor and parser can look ahead and put tokens back.

use super::escapes::{buf_push_utf8, decode_escape};
use super::token::{HideSet, StringEncoding, Token, TokenKind, PUNCTUATORS};
use crate::diagnostics::errors::{CompileError, SourceLoc};
use crate::source::reader::{CharPosition, FileReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub struct Lexer {
    reader: FileReader,
    file: Rc<PathBuf>,
    pushback: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str, file: PathBuf) -> Self {
        Lexer {
            reader: FileReader::new(source),
            file: Rc::new(file),
            pushback: Vec::new(),
        }
    }

    pub fn from_reader(reader: FileReader, file: PathBuf) -> Self {
        Lexer {
            reader,
            file: Rc::new(file),
            pushback: Vec::new(),
        }
    }

    /// Builds a lexer over a flat token sequence rather than a file, used by
    /// the preprocessor to pre-expand macro arguments in isolation (spec
    /// §4.3, §9 "first-class create-lexer-from-token-sequence").
    pub fn from_tokens(tokens: Vec<Token>) -> TokenVecLexer {
        TokenVecLexer {
            tokens,
            index: 0,
            pushback: Vec::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn undo_tk(&mut self, tok: Token) {
        self.pushback.push(tok);
    }

    pub fn undo_tks(&mut self, toks: Vec<Token>) {
        for tok in toks.into_iter().rev() {
            self.pushback.push(tok);
        }
    }

    /// Produces the next token, decoding whitespace/comments as the
    /// `space_before` flag on whatever real token follows, and distinguishing
    /// newline tokens from ordinary space (spec §4.2 last paragraph).
    pub fn lex_tk(&mut self) -> Result<Token, CompileError> {
        if let Some(tok) = self.pushback.pop() {
            return Ok(tok);
        }

        let mut space_before = false;
        loop {
            match self.reader.peek() {
                None => {
                    let pos = self.reader.position();
                    let mut tok = Token::new(TokenKind::Eof, self.file.clone(), pos, String::new());
                    tok.space_before = space_before;
                    return Ok(tok);
                }
                Some('\n') => {
                    self.reader.next();
                    let pos = self.reader.position();
                    let mut tok =
                        Token::new(TokenKind::Newline, self.file.clone(), pos, "\n".to_string());
                    tok.space_before = space_before;
                    return Ok(tok);
                }
                Some(c) if c == ' ' || c == '\t' || c == '\x0b' || c == '\x0c' => {
                    self.reader.next();
                    space_before = true;
                }
                Some('/') => {
                    self.reader.next();
                    match self.reader.peek() {
                        Some('/') => {
                            self.reader.next();
                            while !matches!(self.reader.peek(), None | Some('\n')) {
                                self.reader.next();
                            }
                            space_before = true;
                        }
                        Some('*') => {
                            self.reader.next();
                            self.skip_block_comment()?;
                            space_before = true;
                        }
                        _ => {
                            self.reader.undo('/');
                            break;
                        }
                    }
                }
                _ => break,
            }
        }

        let pos = self.reader.position_of_next();
        let mut tok = self.lex_real_token(pos)?;
        tok.space_before = space_before;
        Ok(tok)
    }

    fn skip_block_comment(&mut self) -> Result<(), CompileError> {
        loop {
            match self.reader.next() {
                None => {
                    return Err(CompileError::lexical(
                        "unterminated block comment",
                        self.loc(self.reader.position()),
                    ));
                }
                Some('*') if self.reader.peek() == Some('/') => {
                    self.reader.next();
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn lex_real_token(&mut self, pos: CharPosition) -> Result<Token, CompileError> {
        let c = match self.reader.peek() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, self.file.clone(), pos, String::new())),
        };

        if is_ident_start(c) {
            return self.lex_ident_or_prefixed_literal(pos);
        }
        if c.is_ascii_digit() {
            return self.lex_number(pos);
        }
        if c == '\'' {
            return self.lex_char(pos, StringEncoding::Utf8);
        }
        if c == '"' {
            return self.lex_string(pos, StringEncoding::Utf8);
        }
        if c == '.' {
            // Disambiguate `.` / `...` from a leading-dot float like `.5`.
            self.reader.next();
            if let Some(d) = self.reader.peek() {
                if d.is_ascii_digit() {
                    self.reader.undo('.');
                    return self.lex_number(pos);
                }
            }
            self.reader.undo('.');
            return self.lex_punctuator(pos);
        }
        self.lex_punctuator(pos)
    }

    fn lex_ident_or_prefixed_literal(&mut self, pos: CharPosition) -> Result<Token, CompileError> {
        let c = self.reader.next().unwrap();
        // Encoding-prefixed character/string literals: L'...'  u'...'  U'...'
        // u8"..."  etc. Only consume the prefix if a quote genuinely follows.
        if matches!(c, 'L' | 'u' | 'U') {
            if self.reader.peek() == Some('8') && c == 'u' {
                self.reader.next();
                if self.reader.peek() == Some('"') {
                    return self.lex_string(pos, StringEncoding::Utf8);
                }
                self.reader.undo_chs("8");
            } else if self.reader.peek() == Some('\'') {
                let enc = if c == 'L' {
                    StringEncoding::Wchar
                } else if c == 'u' {
                    StringEncoding::Utf16
                } else {
                    StringEncoding::Utf32
                };
                return self.lex_char(pos, enc);
            } else if self.reader.peek() == Some('"') {
                let enc = if c == 'L' {
                    StringEncoding::Wchar
                } else if c == 'u' {
                    StringEncoding::Utf16
                } else {
                    StringEncoding::Utf32
                };
                return self.lex_string(pos, enc);
            }
        }

        let mut spelling = String::new();
        spelling.push(c);
        while let Some(c) = self.reader.peek() {
            if is_ident_continue(c) {
                spelling.push(c);
                self.reader.next();
            } else {
                break;
            }
        }
        Ok(Token::new(
            TokenKind::Ident(spelling.clone()),
            self.file.clone(),
            pos,
            spelling,
        ))
    }

    fn lex_number(&mut self, pos: CharPosition) -> Result<Token, CompileError> {
        let mut spelling = String::new();
        while let Some(c) = self.reader.peek() {
            if c.is_ascii_digit() || c == '.' || is_ident_continue(c) {
                // An exponent sign only belongs to the literal right after
                // e/E/p/P.
                spelling.push(c);
                self.reader.next();
                if matches!(c, 'e' | 'E' | 'p' | 'P') {
                    if let Some(sign) = self.reader.peek() {
                        if sign == '+' || sign == '-' {
                            spelling.push(sign);
                            self.reader.next();
                        }
                    }
                }
            } else {
                break;
            }
        }
        Ok(Token::new(
            TokenKind::Number(spelling.clone()),
            self.file.clone(),
            pos,
            spelling,
        ))
    }

    fn lex_char(&mut self, pos: CharPosition, encoding: StringEncoding) -> Result<Token, CompileError> {
        self.reader.next(); // opening quote
        let mut raw = Vec::new();
        loop {
            match self.reader.next() {
                None | Some('\n') => {
                    return Err(CompileError::lexical(
                        "unterminated character constant",
                        self.loc(pos),
                    ));
                }
                Some('\'') => break,
                Some(c) => raw.push(c),
            }
        }

        let value = self.decode_literal_body(&raw, pos)?;
        let value = value.first().copied().ok_or_else(|| {
            CompileError::lexical("empty character constant", self.loc(pos))
        })?;

        let spelling: String = std::iter::once('\'').chain(raw).chain(['\'']).collect();
        Ok(Token::new(
            TokenKind::Char { value, encoding },
            self.file.clone(),
            pos,
            spelling,
        ))
    }

    fn lex_string(&mut self, pos: CharPosition, encoding: StringEncoding) -> Result<Token, CompileError> {
        self.reader.next(); // opening quote
        let mut raw = Vec::new();
        loop {
            match self.reader.next() {
                None | Some('\n') => {
                    return Err(CompileError::lexical("unterminated string literal", self.loc(pos)));
                }
                Some('"') => break,
                Some(c) => raw.push(c),
            }
        }

        let values = self.decode_literal_body(&raw, pos)?;
        let mut bytes = Vec::new();
        for v in values {
            buf_push_utf8(&mut bytes, v);
        }
        let value = String::from_utf8_lossy(&bytes).into_owned();

        let spelling: String = std::iter::once('"').chain(raw).chain(['"']).collect();
        Ok(Token::new(
            TokenKind::Str { value, encoding },
            self.file.clone(),
            pos,
            spelling,
        ))
    }

    /// Shared escape-decoding walk used by both character and string
    /// literals; returns one scalar value per logical character.
    fn decode_literal_body(&self, raw: &[char], pos: CharPosition) -> Result<Vec<u32>, CompileError> {
        let mut out = Vec::new();
        let mut chars = raw.to_vec().into_iter().peekable();
        while let Some(c) = chars.next() {
            if c == '\\' {
                let escape = decode_escape(&mut chars, &self.file, pos)?;
                out.push(escape.value);
            } else {
                out.push(c as u32);
            }
        }
        Ok(out)
    }

    fn lex_punctuator(&mut self, pos: CharPosition) -> Result<Token, CompileError> {
        for &punct in PUNCTUATORS {
            if self.matches_ahead(punct) {
                for _ in 0..punct.chars().count() {
                    self.reader.next();
                }
                return Ok(Token::new(
                    TokenKind::Punctuator(punct),
                    self.file.clone(),
                    pos,
                    punct.to_string(),
                ));
            }
        }

        let c = self.reader.next().unwrap_or('\0');
        Err(CompileError::lexical(
            format!("invalid character '{c}'"),
            self.loc(pos),
        ))
    }

    fn matches_ahead(&mut self, s: &str) -> bool {
        let mut consumed = Vec::new();
        let mut ok = true;
        for expect in s.chars() {
            match self.reader.next() {
                Some(c) if c == expect => consumed.push(c),
                other => {
                    if let Some(c) = other {
                        consumed.push(c);
                    }
                    ok = false;
                    break;
                }
            }
        }
        for c in consumed.into_iter().rev() {
            self.reader.undo(c);
        }
        ok
    }

    /// Raw text to end of line, for `#error`/`#warning` (spec §4.2).
    pub fn lex_rest_of_line(&mut self) -> String {
        let mut s = String::new();
        while !matches!(self.reader.peek(), None | Some('\n')) {
            s.push(self.reader.next().unwrap());
        }
        s
    }

    /// Peels `"path"` or `<path>` for `#include`, returning the path and
    /// whether to search starting from the current file's directory.
    pub fn lex_include_path(&mut self) -> Result<(String, bool), CompileError> {
        while matches!(self.reader.peek(), Some(' ') | Some('\t')) {
            self.reader.next();
        }
        let pos = self.reader.position_of_next();
        match self.reader.next() {
            Some('"') => {
                let mut path = String::new();
                loop {
                    match self.reader.next() {
                        Some('"') => break,
                        Some(c) => path.push(c),
                        None => {
                            return Err(CompileError::preprocessor(
                                "unterminated include path",
                                self.loc(pos),
                            ))
                        }
                    }
                }
                Ok((path, true))
            }
            Some('<') => {
                let mut path = String::new();
                loop {
                    match self.reader.next() {
                        Some('>') => break,
                        Some(c) => path.push(c),
                        None => {
                            return Err(CompileError::preprocessor(
                                "unterminated include path",
                                self.loc(pos),
                            ))
                        }
                    }
                }
                Ok((path, false))
            }
            _ => Err(CompileError::preprocessor(
                "expected \"FILENAME\" or <FILENAME>",
                self.loc(pos),
            )),
        }
    }

    fn loc(&self, pos: CharPosition) -> SourceLoc {
        SourceLoc::new((*self.file).clone(), pos.line_number, pos.char_column)
    }
}

/// Concatenates two tokens by reinjecting their textual forms and re-lexing
/// (the preprocessor `##` operator). Fails if the result is not exactly one
/// token (spec §4.2, §4.3).
pub fn glue_tks(a: &Token, b: &Token) -> Result<Token, CompileError> {
    let combined = format!("{}{}", a.spelling, b.spelling);
    let mut lexer = Lexer::new(&combined, (*a.file).clone());
    let first = lexer.lex_tk()?;
    let second = lexer.lex_tk()?;
    if !second.is_eof() {
        return Err(CompileError::preprocessor(
            format!("pasting \"{}\" and \"{}\" does not give a valid token", a.spelling, b.spelling),
            SourceLoc::new((*a.file).clone(), a.pos.line_number, a.pos.char_column),
        ));
    }
    let mut glued = first;
    glued.pos = a.pos;
    glued.hide_set = HideSet::empty();
    glued.spelling = combined;
    Ok(glued)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// A lexer-shaped view over an already-tokenised sequence, used for macro
/// argument pre-expansion (spec §9: "create lexer from token sequence" must
/// be first-class).
pub struct TokenVecLexer {
    tokens: Vec<Token>,
    index: usize,
    pushback: Vec<Token>,
}

impl TokenVecLexer {
    pub fn lex_tk(&mut self) -> Token {
        if let Some(tok) = self.pushback.pop() {
            return tok;
        }
        match self.tokens.get(self.index) {
            Some(tok) => {
                self.index += 1;
                tok.clone()
            }
            None => {
                let file = self
                    .tokens
                    .last()
                    .map(|t| t.file.clone())
                    .unwrap_or_else(|| Rc::new(PathBuf::new()));
                Token::new(TokenKind::Eof, file, CharPosition::default(), String::new())
            }
        }
    }

    pub fn undo_tk(&mut self, tok: Token) {
        self.pushback.push(tok);
    }
}
