use tracing::trace;

use super::token::{SyntaxToken, Token, TokenKind, Trivia, TriviaKind};
use super::{Lexer, LexerStart};
use crate::ast::AstNode;
use crate::config::AnalyzerConfig;
use crate::line_index::LineIndex;
use crate::span::{Position, Span, TextRange};

/// Every token of a source text with positions and attached trivia.
///
/// The last token is always `Eof`; trivia at the end of the file hangs off it.
#[derive(Debug, Clone)]
pub struct TokenStream<'src> {
    source: &'src str,
    tokens: Vec<SyntaxToken<'src>>,
    line_index: LineIndex,
}

pub fn tokenize(source: &str) -> TokenStream<'_> {
    tokenize_with(source, LexerStart::Inline, &AnalyzerConfig::default())
}

pub fn tokenize_with<'src>(source: &'src str, start: LexerStart, config: &AnalyzerConfig) -> TokenStream<'src> {
    let lexer = Lexer::with_start(source.as_bytes(), start).short_open_tag(config.short_open_tag);
    let mut cursor = PositionCursor::default();
    let mut tokens = Vec::new();
    let mut trivia = Vec::new();
    let mut offset = 0;

    for raw in lexer {
        if raw.span.start > offset {
            let span = Span::new(offset, raw.span.start);
            trivia.push(cursor.trivia(TriviaKind::Whitespace, span, source));
        }
        offset = raw.span.end;

        match raw.kind {
            TokenKind::Comment => trivia.push(cursor.trivia(TriviaKind::Comment, raw.span, source)),
            TokenKind::DocComment => trivia.push(cursor.trivia(TriviaKind::DocComment, raw.span, source)),
            kind => {
                let text = raw.span.as_str(source);
                let start = cursor.position;
                cursor.advance(text);
                tokens.push(SyntaxToken {
                    kind,
                    span: raw.span,
                    text,
                    line: start.line,
                    column: start.column,
                    end_line: cursor.position.line,
                    end_column: cursor.position.column,
                    leading_trivia: std::mem::take(&mut trivia),
                });
            }
        }
    }

    trace!(tokens = tokens.len(), "tokenized source");
    TokenStream { source, tokens, line_index: LineIndex::new(source) }
}

/// Running line/column while walking the source front to back.
struct PositionCursor {
    position: Position,
    after_cr: bool,
}

impl Default for PositionCursor {
    fn default() -> Self {
        Self { position: Position::new(1, 0), after_cr: false }
    }
}

impl PositionCursor {
    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '\n' if self.after_cr => {}
                '\n' | '\r' => {
                    self.position.line += 1;
                    self.position.column = 0;
                }
                _ => self.position.column += 1,
            }
            self.after_cr = c == '\r';
        }
    }

    fn trivia<'src>(&mut self, kind: TriviaKind, span: Span, source: &'src str) -> Trivia<'src> {
        let text = span.as_str(source);
        let start = self.position;
        self.advance(text);
        Trivia { kind, span, text, line: start.line, column: start.column }
    }
}

impl<'src> TokenStream<'src> {
    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn tokens(&self) -> &[SyntaxToken<'src>] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.len() <= 1
    }

    pub fn get(&self, index: usize) -> Option<&SyntaxToken<'src>> {
        self.tokens.get(index)
    }

    pub fn eof(&self) -> &SyntaxToken<'src> {
        &self.tokens[self.tokens.len() - 1]
    }

    pub fn compact(&self) -> Vec<Token> {
        self.tokens.iter().map(SyntaxToken::token).collect()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn text(&self, span: Span) -> &'src str {
        span.as_str(self.source)
    }

    /// Index of the token starting exactly at `offset`.
    pub fn index_starting_at(&self, offset: usize) -> Option<usize> {
        let idx = self.tokens.partition_point(|t| t.span.start < offset);
        (idx < self.tokens.len() && self.tokens[idx].span.start == offset).then_some(idx)
    }

    /// Index of the non-empty token ending exactly at `offset`.
    pub fn index_ending_at(&self, offset: usize) -> Option<usize> {
        let idx = self.tokens.partition_point(|t| t.span.end <= offset && !t.is_eof());
        (idx > 0 && self.tokens[idx - 1].span.end == offset).then(|| idx - 1)
    }

    /// Tokens fully covered by `span`.
    pub fn tokens_in(&self, span: Span) -> &[SyntaxToken<'src>] {
        let from = self.tokens.partition_point(|t| t.span.start < span.start);
        let to = self.tokens.partition_point(|t| t.span.end <= span.end && t.span.start < span.end);
        if from >= to { &[] } else { &self.tokens[from..to] }
    }

    pub fn position(&self, offset: usize) -> Position {
        self.line_index.position(self.source, offset)
    }

    pub fn range(&self, span: Span) -> TextRange {
        TextRange::new(self.position(span.start), self.position(span.end))
    }

    /// Start and end position of a node parsed from this stream.
    pub fn range_of(&self, node: AstNode<'_>) -> TextRange {
        self.range(node.span())
    }

    /// Source text rebuilt from the tokens of `span`, with one space between
    /// tokens that were not adjacent.
    pub fn reconstruct(&self, span: Span) -> String {
        let mut out = String::new();
        let mut previous: Option<&SyntaxToken<'src>> = None;
        for token in self.tokens_in(span) {
            if let Some(prev) = previous
                && (prev.end_line != token.line || prev.end_column != token.column)
            {
                out.push(' ');
            }
            out.push_str(token.text);
            previous = Some(token);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivia_attaches_to_following_token() {
        let stream = tokenize("<?php // note\n$a = 1; /** doc */");
        let var = &stream.tokens()[1];
        assert_eq!(var.kind, TokenKind::Variable);
        assert_eq!(var.leading_trivia.len(), 2);
        assert_eq!(var.leading_trivia[0].kind, TriviaKind::Comment);
        assert_eq!(var.leading_trivia[0].text, "// note");
        assert_eq!(stream.eof().leading_trivia.last().map(|t| t.kind), Some(TriviaKind::DocComment));
    }

    #[test]
    fn positions_advance_over_multiline_tokens() {
        let stream = tokenize("<?php\n$s = 'a\nb'; $t");
        let string = &stream.tokens()[3];
        assert_eq!((string.line, string.column), (2, 5));
        assert_eq!((string.end_line, string.end_column), (3, 2));
        let t = &stream.tokens()[5];
        assert_eq!((t.line, t.column), (3, 4));
    }

    #[test]
    fn lookup_by_offset() {
        let stream = tokenize("<?php $a = 1;");
        assert_eq!(stream.index_starting_at(6), Some(1));
        assert_eq!(stream.index_starting_at(7), None);
        assert_eq!(stream.index_ending_at(8), Some(1));
        assert_eq!(stream.tokens_in(Span::new(6, 13)).len(), 4);
    }
}
