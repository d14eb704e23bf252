pub mod escapes;
pub mod lexer;
pub mod token;

pub use lexer::{glue_tks, Lexer, TokenVecLexer};
pub use token::{keyword_for, HideSet, StringEncoding, Token, TokenKind};
