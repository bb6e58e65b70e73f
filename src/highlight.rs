//! Syntax highlighting and symbol cross-references for one file.
//!
//! Everything here is read-only over the token stream and symbol table.

use std::collections::HashMap;

use serde::Serialize;

use crate::lexer::token::{TokenKind, TriviaKind};
use crate::lexer::TokenStream;
use crate::span::{Span, TextRange};
use crate::symbols::{ScopeKind, SymbolId, SymbolKind, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightCategory {
    Keyword,
    String,
    Comment,
    /// `/** ... */`
    DocComment,
    Number,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightedRange {
    pub category: HighlightCategory,
    pub span: Span,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolReferences {
    pub name: String,
    pub kind: SymbolKind,
    pub declaration: TextRange,
    pub usages: Vec<TextRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Highlighting {
    /// In source order.
    pub ranges: Vec<HighlightedRange>,
    pub symbols: Vec<SymbolReferences>,
}

pub fn highlight(tokens: &TokenStream<'_>, symbols: &SymbolTable<'_>) -> Highlighting {
    let mut ranges = Vec::new();
    for token in tokens.tokens() {
        for trivia in &token.leading_trivia {
            let category = match trivia.kind {
                TriviaKind::Comment => HighlightCategory::Comment,
                TriviaKind::DocComment => HighlightCategory::DocComment,
                TriviaKind::Whitespace => continue,
            };
            ranges.push(HighlightedRange { category, span: trivia.span, range: tokens.range(trivia.span) });
        }
        if let Some(category) = token_category(token.kind) {
            ranges.push(HighlightedRange { category, span: token.span, range: tokens.range(token.span) });
        }
    }

    Highlighting { ranges, symbols: references(tokens, symbols) }
}

fn token_category(kind: TokenKind) -> Option<HighlightCategory> {
    if kind.is_keyword() || kind.is_type_keyword() {
        Some(HighlightCategory::Keyword)
    } else if kind.is_string_like() {
        Some(HighlightCategory::String)
    } else if kind.is_number() {
        Some(HighlightCategory::Number)
    } else if kind == TokenKind::Variable {
        Some(HighlightCategory::Variable)
    } else {
        None
    }
}

/// Variables an arrow function captures implicitly are reported on the
/// captured symbol, together with their first occurrence.
fn references(tokens: &TokenStream<'_>, symbols: &SymbolTable<'_>) -> Vec<SymbolReferences> {
    let mut folded: HashMap<SymbolId, Vec<Span>> = HashMap::new();
    for symbol in symbols.symbols() {
        if is_implicit_capture(symbols, symbol.id) {
            let owner = symbols.resolve_alias(symbol.id);
            let spans = folded.entry(owner).or_default();
            if !symbol.declaration.is_function_like() {
                spans.push(symbol.declaration_span());
            }
            spans.extend(symbol.usage_spans());
        }
    }

    symbols
        .symbols()
        .iter()
        .filter(|symbol| !is_implicit_capture(symbols, symbol.id))
        .map(|symbol| {
            let mut usages: Vec<Span> = symbol.usage_spans().collect();
            if let Some(extra) = folded.get(&symbol.id) {
                usages.extend(extra);
                usages.sort();
            }
            SymbolReferences {
                name: symbol.name.clone(),
                kind: symbol.kind,
                declaration: tokens.range(symbol.declaration_span()),
                usages: usages.into_iter().map(|span| tokens.range(span)).collect(),
            }
        })
        .collect()
}

fn is_implicit_capture(symbols: &SymbolTable<'_>, id: SymbolId) -> bool {
    let symbol = symbols.symbol(id);
    symbol.alias.is_some() && symbols.scope(symbol.scope).kind == ScopeKind::ArrowFunction
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;

    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    #[test]
    fn categories_follow_token_kinds() {
        let arena = Bump::new();
        let tokens = tokenize("<?php /** doc */ function f($a) { return $a + 1; } // end");
        let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
        let symbols = SymbolTable::build(program);
        let highlighting = highlight(&tokens, &symbols);

        let categories: Vec<HighlightCategory> = highlighting.ranges.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            [
                HighlightCategory::DocComment,
                HighlightCategory::Keyword,
                HighlightCategory::Variable,
                HighlightCategory::Keyword,
                HighlightCategory::Variable,
                HighlightCategory::Number,
                HighlightCategory::Comment,
            ]
        );

        let parameter = highlighting.symbols.iter().find(|s| s.name == "a").expect("parameter symbol");
        assert_eq!(parameter.kind, SymbolKind::Parameter);
        assert_eq!(parameter.usages.len(), 1);
        assert_eq!(parameter.usages[0].start.line, 1);
    }

    #[test]
    fn arrow_function_usages_fold_into_captured_variable() {
        let arena = Bump::new();
        let tokens = tokenize("<?php $x = 1; $f = fn() => $x;");
        let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
        let symbols = SymbolTable::build(program);
        let highlighting = highlight(&tokens, &symbols);

        let xs: Vec<&SymbolReferences> = highlighting.symbols.iter().filter(|s| s.name == "x").collect();
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0].usages.len(), 1);
    }
}
