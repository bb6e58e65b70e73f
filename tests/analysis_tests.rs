use std::path::Path;

use bumpalo::Bump;
use php_analyzer::analysis::{AnalysisError, analyze_file, analyze_source};
use php_analyzer::config::AnalyzerConfig;
use php_analyzer::highlight::{HighlightCategory, highlight};
use php_analyzer::lexer::tokenize;
use php_analyzer::parser::Parser;
use php_analyzer::symbols::SymbolTable;

#[test]
fn configured_regex_functions_are_checked() {
    let config = AnalyzerConfig::from_json(r#"{"regex_functions": ["My_Match"]}"#).expect("config");
    let code = "<?php\nmy_match('/[a-/', $s);\npreg_match('/(/', $s);\n";
    let summary = analyze_source("t.php", code, &config).expect("analysis");
    assert_eq!(summary.regex_literals, 1);
    assert_eq!(summary.regex_errors.len(), 1);
    assert!(summary.regex_errors[0].starts_with("2:"), "{:?}", summary.regex_errors);
}

#[test]
fn short_open_tags_follow_the_configuration() {
    let code = "<? echo 1;";
    let off = analyze_source("t.php", code, &AnalyzerConfig::default()).expect("analysis");
    assert_eq!(off.statements, 1);

    let config = AnalyzerConfig { short_open_tag: true, ..AnalyzerConfig::default() };
    let on = analyze_source("t.php", code, &config).expect("analysis");
    assert_eq!(on.statements, 2);
}

#[test]
fn summary_serializes_for_reports() {
    let summary = analyze_source("t.php", "<?php $a = 1; echo $a;", &AnalyzerConfig::default()).expect("analysis");
    let json = serde_json::to_value(&summary).expect("json");
    assert_eq!(json["path"], "t.php");
    assert_eq!(json["functions"], 1);
    assert_eq!(json["symbols"], 1);
}

#[test]
fn files_are_decoded_with_the_configured_encoding() {
    let path = std::env::temp_dir().join(format!("php-analyzer-{}.php", std::process::id()));
    std::fs::write(&path, b"<?php echo '\xe9t\xe9';").expect("write fixture");
    let config = AnalyzerConfig { encoding: "ISO-8859-1".to_string(), ..AnalyzerConfig::default() };
    let summary = analyze_file(&path, &config);
    let _ = std::fs::remove_file(&path);
    assert_eq!(summary.expect("analysis").statements, 2);
}

#[test]
fn missing_files_report_their_path() {
    let error = analyze_file(Path::new("does/not/exist.php"), &AnalyzerConfig::default()).unwrap_err();
    assert!(matches!(error, AnalysisError::Io { .. }));
    assert!(error.to_string().contains("does/not/exist.php"));
}

#[test]
fn unknown_encodings_are_rejected() {
    let path = std::env::temp_dir().join(format!("php-analyzer-enc-{}.php", std::process::id()));
    std::fs::write(&path, b"<?php").expect("write fixture");
    let config = AnalyzerConfig { encoding: "klingon".to_string(), ..AnalyzerConfig::default() };
    let result = analyze_file(&path, &config);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(AnalysisError::Source(_))));
}

#[test]
fn highlighting_covers_strings_and_comments() {
    let arena = Bump::new();
    let tokens = tokenize("<?php\n# note\n$s = 'x';\n");
    let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
    let symbols = SymbolTable::build(program);
    let highlighting = highlight(&tokens, &symbols);

    let comment = &highlighting.ranges[0];
    assert_eq!(comment.category, HighlightCategory::Comment);
    assert_eq!((comment.range.start.line, comment.range.start.column), (2, 0));
    let string = highlighting.ranges.iter().find(|r| r.category == HighlightCategory::String).expect("string");
    assert_eq!(tokens.text(string.span), "'x'");

    let json = serde_json::to_value(&highlighting).expect("json");
    assert_eq!(json["ranges"][0]["category"], "comment");
    assert_eq!(json["symbols"][0]["name"], "s");
}
