//! Static-analysis front end for PHP: lexer, parser, symbol table, control
//! flow graphs with liveness, and a PCRE parser for regex literals.

pub mod analysis;
pub mod ast;
pub mod cfg;
pub mod config;
pub mod highlight;
pub mod lexer;
pub mod line_index;
pub mod parser;
pub mod regex;
pub mod source;
pub mod span;
pub mod symbols;

pub use span::Span;
