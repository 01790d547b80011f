//! Source-text front end.
//!
//! Transforms class-language source into program tables and expression ASTs:
//! - [`lexer`]: tokenization (escape-expanded source → tokens)
//! - [`ast`]: the closed node enum plus class/method definitions
//! - [`parser`]: recursive descent (tokens → AST and declarations)
//!
//! Lex and parse errors abort the current load immediately; no partial
//! program is ever accepted.

pub mod ast;
pub mod lexer;
pub mod parser;
