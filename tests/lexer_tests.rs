use php_analyzer::config::AnalyzerConfig;
use php_analyzer::lexer::token::{TokenKind, TriviaKind};
use php_analyzer::lexer::{LexerStart, tokenize, tokenize_with};

const SAMPLE: &str = r#"<html><?php
/** Greets. */
function greet(string $name): string {
    // plain comment
    $msg = "Hello {$name}, you have $count items\n";
    $doc = <<<EOT
Dear $name,
EOT;
    return $msg . $doc . 0x1F . 1_000 . 1.5e3;
}
?>
</html>"#;

#[test]
fn trivia_and_tokens_rebuild_the_source() {
    let stream = tokenize(SAMPLE);
    let mut rebuilt = String::new();
    for token in stream.tokens() {
        for trivia in &token.leading_trivia {
            rebuilt.push_str(trivia.text);
        }
        rebuilt.push_str(token.text);
    }
    assert_eq!(rebuilt, SAMPLE);
}

#[test]
fn token_spans_match_their_text() {
    let stream = tokenize(SAMPLE);
    let mut previous_end = 0;
    for token in stream.tokens() {
        assert!(token.span.start >= previous_end);
        assert_eq!(token.span.as_str(SAMPLE), token.text);
        assert_eq!(stream.position(token.span.start).line, token.line);
        previous_end = token.span.end;
    }
    assert!(stream.eof().is_eof());
    assert_eq!(stream.eof().span.start, SAMPLE.len());
}

#[test]
fn comments_become_trivia() {
    let stream = tokenize(SAMPLE);
    let kinds: Vec<TriviaKind> = stream
        .tokens()
        .iter()
        .flat_map(|t| t.leading_trivia.iter())
        .filter(|t| t.kind != TriviaKind::Whitespace)
        .map(|t| t.kind)
        .collect();
    assert_eq!(kinds, [TriviaKind::DocComment, TriviaKind::Comment]);
    assert!(stream.tokens().iter().all(|t| !matches!(t.kind, TokenKind::Comment | TokenKind::DocComment)));
}

#[test]
fn scripting_start_needs_no_open_tag() {
    let stream = tokenize_with("$a = 1;", LexerStart::Scripting, &AnalyzerConfig::default());
    let kinds: Vec<TokenKind> = stream.tokens().iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        [TokenKind::Variable, TokenKind::Eq, TokenKind::LNumber, TokenKind::SemiColon, TokenKind::Eof]
    );
}

#[test]
fn reconstruction_normalizes_spacing() {
    let stream = tokenize("<?php $a   =\n\t[1,2];");
    let span = php_analyzer::Span::new(6, stream.source().len());
    assert_eq!(stream.reconstruct(span), "$a = [1,2];");
}
