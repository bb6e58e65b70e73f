use php_analyzer::Span;
use php_analyzer::lexer::token::TokenKind;
use php_analyzer::lexer::tokenize;
use php_analyzer::regex::{
    self, ConditionReference, GroupKind, GroupReference, RegexFlags, RegexNode, RegexNodeKind, RegexParseError,
    RegexVisitor, to_sexpr, walk_regex,
};

fn sexpr(literal: &str) -> String {
    let tree = regex::parse_literal(literal, RegexFlags::empty()).expect("valid pattern");
    to_sexpr(&tree.root)
}

fn syntax_error(literal: &str) -> (&'static str, usize) {
    match regex::parse_literal(literal, RegexFlags::empty()) {
        Err(RegexParseError::Syntax { message, offset }) => (message, offset),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn delimiters_and_modifiers() {
    let tree = regex::parse_literal("/a+b/i", RegexFlags::empty()).expect("valid pattern");
    assert_eq!(tree.delimiters, Some(('/', '/')));
    assert!(tree.flags.contains(RegexFlags::CASE_INSENSITIVE));
    assert!(tree.root.is_case_insensitive());
    assert_eq!(tree.span, Span::new(0, 6));
    assert_eq!(to_sexpr(&tree.root), "(seq (repeat 1 inf Greedy 'a') 'b')");
}

#[test]
fn bracket_delimiters_nest() {
    let tree = regex::parse_literal("{a{2}}x", RegexFlags::empty()).expect("valid pattern");
    assert_eq!(tree.delimiters, Some(('{', '}')));
    assert!(tree.flags.contains(RegexFlags::EXTENDED));
    assert_eq!(to_sexpr(&tree.root), "(seq (repeat 2 2 Greedy 'a'))");
}

#[test]
fn leading_whitespace_and_spaced_modifiers() {
    let tree = regex::parse_literal("  #a#m s\n", RegexFlags::empty()).expect("valid pattern");
    assert_eq!(tree.delimiters, Some(('#', '#')));
    assert_eq!(tree.flags.to_string(), "ms");
}

#[test]
fn delimiter_errors() {
    assert_eq!(regex::parse_literal("", RegexFlags::empty()), Err(RegexParseError::Empty));
    assert_eq!(regex::parse_literal("abc", RegexFlags::empty()), Err(RegexParseError::InvalidDelimiter('a')));
    assert_eq!(regex::parse_literal("\\a\\", RegexFlags::empty()), Err(RegexParseError::InvalidDelimiter('\\')));
    assert_eq!(regex::parse_literal("/abc", RegexFlags::empty()), Err(RegexParseError::MissingEndDelimiter('/')));
    assert_eq!(
        regex::parse_literal("(abc", RegexFlags::empty()),
        Err(RegexParseError::MissingEndDelimiter(')'))
    );
    assert_eq!(
        regex::parse_literal("/a/k", RegexFlags::empty()),
        Err(RegexParseError::UnknownModifier { modifier: 'k', offset: 3 })
    );
}

#[test]
fn escaped_delimiter_is_literal() {
    assert_eq!(sexpr(r"/a\/b/"), "(seq 'a' '/' 'b')");
}

#[test]
fn groups_and_references() {
    assert_eq!(sexpr(r"/(?<year>\d+)-\k<year>/"), r#"(seq (group 1 year (seq (repeat 1 inf Greedy \d))) '-' (backref Named("year")))"#);
    assert_eq!(sexpr("/(?:a|b)*?/"), "(seq (repeat 0 inf Lazy (group NonCapturing (or (seq 'a') (seq 'b')))))");
    assert_eq!(sexpr(r"/(a)\1/"), "(seq (group 1 (seq 'a')) (backref Number(1)))");
}

#[test]
fn group_names_are_numbered() {
    let tree = regex::parse_literal("/(a)(?<b>b)(?:c)(d)/", RegexFlags::empty()).expect("valid pattern");
    assert_eq!(tree.group_count, 3);
    assert_eq!(tree.group_number("b"), Some(2));
    assert_eq!(tree.group_number("c"), None);
}

#[test]
fn duplicate_names_need_the_j_modifier() {
    assert_eq!(syntax_error("/(?<a>x)(?<a>y)/").0, "two named subpatterns have the same name");
    assert!(regex::parse_literal("/(?<a>x)|(?<a>y)/J", RegexFlags::empty()).is_ok());
}

#[test]
fn inline_flags_apply_to_the_rest_of_the_group() {
    let tree = regex::parse_literal("/(?i)a/", RegexFlags::empty()).expect("valid pattern");
    assert_eq!(to_sexpr(&tree.root), "(seq (flags +i -) 'a')");
    let RegexNodeKind::Sequence(items) = &tree.root.kind else {
        panic!("expected a sequence");
    };
    assert!(!items[0].is_case_insensitive());
    assert!(items[1].is_case_insensitive());

    assert_eq!(sexpr("/(?i:a)b/"), "(seq (group +i - (seq 'a')) 'b')");
}

#[test]
fn conditional_with_and_without_no_branch() {
    assert_eq!(
        sexpr("/(a)(?(1)b|c)/"),
        "(seq (group 1 (seq 'a')) (if (ref Group(Number(1))) (seq 'b') | (seq 'c')))"
    );
    assert_eq!(sexpr("/(a)(?(1)b)/"), "(seq (group 1 (seq 'a')) (if (ref Group(Number(1))) (seq 'b')))");
    assert_eq!(sexpr("/(a)(?(1)b|)/"), "(seq (group 1 (seq 'a')) (if (ref Group(Number(1))) (seq 'b') | (seq)))");
}

#[test]
fn conditional_shape_in_bare_patterns() {
    let tree = regex::parse_pattern("(?(1)a)", RegexFlags::empty()).expect("valid pattern");
    let RegexNodeKind::Sequence(items) = &tree.root.kind else {
        panic!("expected a sequence");
    };
    let RegexNodeKind::Conditional { condition, pipe, no, .. } = &items[0].kind else {
        panic!("expected a conditional");
    };
    assert!(matches!(
        condition.kind,
        RegexNodeKind::ReferenceCondition(ConditionReference::Group(GroupReference::Number(1)))
    ));
    assert!(pipe.is_none());
    assert!(no.is_none());

    let tree = regex::parse_pattern("(?(2)a|b)", RegexFlags::empty()).expect("valid pattern");
    assert_eq!(to_sexpr(&tree.root), "(seq (if (ref Group(Number(2))) (seq 'a') | (seq 'b')))");
}

#[test]
fn conditional_with_three_branches_fails() {
    assert_eq!(syntax_error("/(a)(?(1)b|c|d)/").0, "conditional subpattern contains more than two branches");
}

#[test]
fn posix_classes_inside_brackets() {
    assert_eq!(sexpr("/[[:alpha:]x]/"), "(seq (class (posix alpha) 'x'))");
    assert_eq!(sexpr("/[^[:^digit:]]/"), "(seq (not-class (posix ^digit)))");
}

#[derive(Default)]
struct PosixCounter {
    classes: Vec<(String, bool)>,
}

impl RegexVisitor for PosixCounter {
    fn visit_posix_class(&mut self, node: &RegexNode) {
        if let RegexNodeKind::PosixClass { name, negated } = &node.kind {
            self.classes.push((name.clone(), *negated));
        }
    }
}

fn posix_classes(pattern: &str) -> Vec<(String, bool)> {
    let tree = regex::parse_pattern(pattern, RegexFlags::empty()).expect("valid pattern");
    let mut counter = PosixCounter::default();
    counter.visit_tree(&tree);
    counter.classes
}

#[test]
fn malformed_posix_class_is_literal() {
    assert_eq!(sexpr("/[[:x]/"), "(seq (class '[' ':' 'x'))");
    assert_eq!(posix_classes("[[:^alpha:]]"), [("alpha".to_string(), true)]);
    assert!(posix_classes("[[:alpha]]").is_empty());
}

#[test]
fn class_ranges() {
    assert_eq!(sexpr("/[a-z-]/"), "(seq (class (range 'a' 'z') '-'))");
    assert_eq!(sexpr(r"/[\d-z]/"), r"(seq (class \d '-' 'z'))");
    assert_eq!(syntax_error("/[z-a]/"), ("range out of order in character class", 2));
}

#[test]
fn quoting_inside_a_class_keeps_metacharacters() {
    assert_eq!(sexpr(r"/[\Q]\E]/"), "(seq (class ']'))");
    assert_eq!(sexpr(r"/[\Qa-[\Ez]/"), "(seq (class 'a' '-' '[' 'z'))");
    assert_eq!(syntax_error(r"/[\Q]/").0, "missing terminating ] for character class");
}

#[test]
fn quantifier_without_atom_fails() {
    assert_eq!(syntax_error("/*a/").0, "quantifier does not follow a repeatable item");
    assert_eq!(sexpr("/a{,/"), "(seq 'a' '{' ',')");
}

#[test]
fn unbalanced_parentheses() {
    assert_eq!(syntax_error("/a)/"), ("unmatched closing parenthesis", 2));
    assert_eq!(syntax_error("/(a/").0, "missing closing parenthesis");
}

#[test]
fn string_literal_spans_point_into_php_source() {
    let source = r"<?php preg_match('/a\\d/', $s);";
    let tokens = tokenize(source);
    let token = tokens.tokens().iter().find(|t| t.kind == TokenKind::StringLiteral).expect("string token");
    let tree = regex::parse_string_literal(token, RegexFlags::empty()).expect("valid pattern");

    assert_eq!(to_sexpr(&tree.root), r"(seq 'a' \d)");
    assert_eq!(tree.span, Span::new(18, 24));
    let RegexNodeKind::Sequence(items) = &tree.root.kind else {
        panic!("expected a sequence");
    };
    assert_eq!(items[1].span, Span::new(20, 23));
    assert_eq!(items[1].span.as_str(source), r"\\d");
}

#[test]
fn interpolated_strings_are_not_literals() {
    let tokens = tokenize(r#"<?php preg_match("/$x/", $s);"#);
    let quote = tokens.tokens().iter().find(|t| t.kind == TokenKind::DoubleQuote).expect("opening quote");
    assert_eq!(regex::parse_string_literal(quote, RegexFlags::empty()), Err(RegexParseError::NotALiteral));
}

#[derive(Default)]
struct GroupCounter {
    capturing: usize,
    lookarounds: usize,
}

impl RegexVisitor for GroupCounter {
    fn visit_group(&mut self, node: &RegexNode, kind: &GroupKind, _body: &RegexNode) {
        match kind {
            GroupKind::Capturing { .. } => self.capturing += 1,
            kind if kind.is_lookaround() => self.lookarounds += 1,
            _ => {}
        }
        walk_regex(self, node);
    }
}

#[test]
fn visitor_reaches_nested_groups() {
    let tree = regex::parse_literal("/((?=a)(b(?<!c)))+/", RegexFlags::empty()).expect("valid pattern");
    let mut counter = GroupCounter::default();
    counter.visit_tree(&tree);
    assert_eq!(counter.capturing, 2);
    assert_eq!(counter.lookarounds, 2);
}
