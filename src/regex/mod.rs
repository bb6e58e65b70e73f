//! PCRE patterns found in PHP string literals.
//!
//! A literal like `'/^a+$/i'` is split into delimiters, pattern and modifier
//! suffix; the pattern becomes a [`RegexTree`]. Every node keeps the span it
//! covers in the PHP source and the options in effect at that point.

pub mod ast;
mod parser;
pub mod visitor;

use thiserror::Error;
use tracing::debug;

use crate::lexer::literal::unescape_string;
use crate::lexer::token::SyntaxToken;
use crate::span::Span;

pub use ast::{
    AnchorKind, ConditionReference, EscapedClass, GroupKind, GroupReference, Quantifier, QuantifierMode, RegexFlags,
    RegexNode, RegexNodeKind, RegexTree, to_sexpr,
};
pub use visitor::{RegexVisitor, walk_regex};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegexParseError {
    #[error("empty regular expression")]
    Empty,
    #[error("delimiter must not be alphanumeric, backslash or NUL, found {0:?}")]
    InvalidDelimiter(char),
    #[error("no ending delimiter {0:?} found")]
    MissingEndDelimiter(char),
    #[error("unknown modifier {modifier:?} at offset {offset}")]
    UnknownModifier { modifier: char, offset: usize },
    #[error("not a plain string literal")]
    NotALiteral,
    #[error("{message} at offset {offset}")]
    Syntax { message: &'static str, offset: usize },
}

/// Parses a delimited pattern with its modifiers, as passed to `preg_*`.
/// Spans are byte offsets into `text`.
pub fn parse_literal(text: &str, flags: RegexFlags) -> Result<RegexTree, RegexParseError> {
    let chars: Vec<(char, Span)> = text.char_indices().map(|(i, c)| (c, Span::new(i, i + c.len_utf8()))).collect();
    parse_delimited(&chars, flags, text.len())
}

/// Parses the literal value of a PHP string token. Escapes are decoded
/// first, and node spans point back into the PHP source.
pub fn parse_string_literal(token: &SyntaxToken<'_>, flags: RegexFlags) -> Result<RegexTree, RegexParseError> {
    let decoded = unescape_string(token.text, token.span.start).ok_or(RegexParseError::NotALiteral)?;
    parse_delimited(&decoded.chars, flags, token.span.end)
}

/// Parses a pattern already stripped of its delimiters. An escaped
/// `delimiter` inside it is an ordinary literal.
pub fn parse(pattern: &str, delimiter: char, flags: RegexFlags) -> Result<RegexTree, RegexParseError> {
    let mut tree = parse_pattern(pattern, flags)?;
    tree.delimiters = Some((delimiter, closing_delimiter(delimiter)));
    Ok(tree)
}

/// Parses a bare pattern, with no delimiters or modifiers.
pub fn parse_pattern(pattern: &str, flags: RegexFlags) -> Result<RegexTree, RegexParseError> {
    let chars: Vec<(char, Span)> =
        pattern.char_indices().map(|(i, c)| (c, Span::new(i, i + c.len_utf8()))).collect();
    let span = Span::new(0, pattern.len());
    build_tree(&chars, flags, None, span, pattern.len())
}

/// Bracket-style delimiters close with their mirror character.
pub fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

fn parse_delimited(chars: &[(char, Span)], flags: RegexFlags, end_offset: usize) -> Result<RegexTree, RegexParseError> {
    let leading = chars.iter().take_while(|(c, _)| c.is_ascii_whitespace()).count();
    let Some(&(open, _)) = chars.get(leading) else {
        return Err(RegexParseError::Empty);
    };
    if open.is_alphanumeric() || open == '\\' || open == '\0' {
        return Err(RegexParseError::InvalidDelimiter(open));
    }
    let close = closing_delimiter(open);
    let body_start = leading + 1;
    let body_end = find_closing(chars, body_start, open, close).ok_or(RegexParseError::MissingEndDelimiter(close))?;

    let mut flags = flags;
    for &(modifier, span) in &chars[body_end + 1..] {
        match modifier {
            // PHP tolerates line breaks and spaces among the modifiers.
            '\n' | '\r' | ' ' => {}
            letter => match RegexFlags::from_modifier(letter) {
                Some(flag) => flags = flags | flag,
                None => return Err(RegexParseError::UnknownModifier { modifier, offset: span.start }),
            },
        }
    }

    let first = chars[leading].1.start;
    let last = chars.last().map_or(end_offset, |&(_, span)| span.end);
    let body = &chars[body_start..body_end];
    let body_end_offset = chars[body_end].1.start;
    build_tree(body, flags, Some((open, close)), Span::new(first, last), body_end_offset)
}

/// Index of the closing delimiter. Backslash escapes skip a character;
/// bracket delimiters nest.
fn find_closing(chars: &[(char, Span)], from: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = from;
    while i < chars.len() {
        let c = chars[i].0;
        if c == '\\' {
            i += 2;
            continue;
        }
        if c == close && depth == 0 {
            return Some(i);
        }
        if open != close {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
            }
        }
        i += 1;
    }
    None
}

fn build_tree(
    chars: &[(char, Span)],
    flags: RegexFlags,
    delimiters: Option<(char, char)>,
    span: Span,
    end_offset: usize,
) -> Result<RegexTree, RegexParseError> {
    let (root, group_count, group_names) = parser::RegexParser::new(chars, flags, end_offset).parse()?;
    debug!(groups = group_count, "parsed regular expression");
    Ok(RegexTree { root, delimiters, flags, group_count, group_names, span })
}
