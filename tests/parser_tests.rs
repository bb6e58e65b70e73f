use bumpalo::Bump;
use php_analyzer::ast::locator::Locator;
use php_analyzer::ast::sexpr::SExprFormatter;
use php_analyzer::ast::visitor::{Visitor, walk_expr, walk_stmt};
use php_analyzer::ast::{AstNode, Expr, ExprId, ParentMap, Program, Stmt, StmtId};
use php_analyzer::lexer::{TokenStream, tokenize};
use php_analyzer::parser::Parser;
use php_analyzer::symbols::SymbolTable;

fn with_program<R>(code: &str, check: impl FnOnce(&TokenStream<'_>, &Program<'_>) -> R) -> R {
    let arena = Bump::new();
    let tokens = tokenize(code);
    let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
    check(&tokens, program)
}

fn sexpr(code: &str) -> String {
    with_program(code, |_, program| SExprFormatter::format(AstNode::Program(program)))
}

#[test]
fn echo_of_binary_expression() {
    assert_eq!(sexpr("<?php echo 1 + 2;"), "(program\n  (nop)\n  (echo (+ (integer 1) (integer 2))))");
}

#[test]
fn control_flow_sections() {
    let code = "<?php if ($a) { echo 1; } else { echo 2; } while ($b) { $a = 1; }";
    insta::assert_snapshot!(sexpr(code), @r"
    (program
      (nop)
      (if (variable $a)
        (then
          (echo (integer 1)))
        (else
          (echo (integer 2))))
      (while (variable $b)
        (body
          (assign (variable $a) (integer 1)))))
    ");
}

#[test]
fn calls_render_their_arguments() {
    assert_eq!(sexpr("<?php f(1);"), "(program\n  (nop)\n  (call (name f) (arg (integer 1))))");
}

/// Sorts variable occurrences by whether they bind to a symbol and whether
/// they sit inside a function-like body.
struct BindingAudit<'a, 'ast> {
    symbols: &'a SymbolTable<'ast>,
    parents: &'a ParentMap<'ast>,
    unbound: Vec<&'ast str>,
    inside_functions: usize,
    top_level: usize,
}

impl<'ast> Visitor<'ast> for BindingAudit<'_, 'ast> {
    fn visit_expr(&mut self, expr: ExprId<'ast>) {
        if let Expr::Variable { name, .. } = expr {
            let node = AstNode::Expr(expr);
            if self.symbols.symbol_for(node).is_none() {
                self.unbound.push(name);
            }
            match self.parents.enclosing_function(node) {
                Some(_) => self.inside_functions += 1,
                None => self.top_level += 1,
            }
        }
        walk_expr(self, expr);
    }
}

#[test]
fn visitor_reads_symbols_and_parents() {
    let code = r#"<?php
function demo($items) {
    foreach ($items as $item) {
        echo $this->name, $$item;
    }
    return fn() => $items;
}
$outside = 1;
"#;
    with_program(code, |_, program| {
        assert!(program.errors.is_empty(), "{:?}", program.errors);
        let symbols = SymbolTable::build(program);
        let parents = ParentMap::build(program);
        let mut audit = BindingAudit {
            symbols: &symbols,
            parents: &parents,
            unbound: Vec::new(),
            inside_functions: 0,
            top_level: 0,
        };
        audit.visit_program(program);
        assert_eq!(audit.unbound, ["this"]);
        assert_eq!(audit.inside_functions, 5);
        assert_eq!(audit.top_level, 1);
    });
}

/// Every statement and expression starts and ends on a token.
struct TokenBounds<'t, 'src> {
    tokens: &'t TokenStream<'src>,
    checked: usize,
}

impl TokenBounds<'_, '_> {
    fn check(&mut self, node: AstNode<'_>) {
        let span = node.span();
        assert_eq!(node.first_token(self.tokens).span.start, span.start);
        if !span.is_empty() {
            assert_eq!(node.last_token(self.tokens).span.end, span.end);
        }
        self.checked += 1;
    }
}

impl<'ast> Visitor<'ast> for TokenBounds<'_, '_> {
    fn visit_stmt(&mut self, stmt: StmtId<'ast>) {
        self.check(AstNode::Stmt(stmt));
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: ExprId<'ast>) {
        self.check(AstNode::Expr(expr));
        walk_expr(self, expr);
    }
}

#[test]
fn nodes_are_bounded_by_tokens() {
    let code = r#"<?php
namespace App;

class Counter {
    private int $count = 0;

    public function add(int $by = 1): static {
        $this->count += $by;
        return $this;
    }
}

function total(array $items): int {
    $sum = 0;
    foreach ($items as $key => $item) {
        $sum += $item['value'] ?? 0;
    }
    return $sum > 10 ? $sum : -$sum;
}

$f = fn($x) => $x * 2;
echo total([['value' => 1]]), $f(3);
"#;
    with_program(code, |tokens, program| {
        assert!(program.errors.is_empty(), "{:?}", program.errors);
        let root = AstNode::Program(program);
        assert_eq!(root.first_token(tokens).span.start, 0);
        assert!(root.last_token(tokens).is_eof());

        let mut bounds = TokenBounds { tokens, checked: 0 };
        bounds.visit_program(program);
        assert!(bounds.checked > 30);
    });
}

#[test]
fn statements_reconstruct_from_tokens() {
    with_program("<?php\nif ($a)   {\n  echo $b ;\n}", |tokens, program| {
        let text = tokens.reconstruct(program.statements[1].span());
        assert_eq!(text, "if ($a) { echo $b ; }");
        let range = tokens.range_of(AstNode::Stmt(program.statements[1]));
        assert_eq!((range.start.line, range.start.column), (2, 0));
        assert_eq!((range.end.line, range.end.column), (4, 1));
    });
}

#[test]
fn parent_links_reach_the_program() {
    with_program("<?php function f() { return g(1); }", |_, program| {
        let Stmt::Function { body, .. } = program.statements[1] else {
            panic!("expected function");
        };
        let Stmt::Return { expr: Some(call), .. } = body[0] else {
            panic!("expected return");
        };
        let parents = ParentMap::build(program);
        let call = AstNode::Expr(call);
        assert_eq!(parents.parent(call), Some(AstNode::Stmt(body[0])));
        assert_eq!(parents.enclosing_function(call), Some(AstNode::Stmt(program.statements[1])));
        assert_eq!(parents.ancestors(call).last(), Some(AstNode::Program(program)));
    });
}

#[test]
fn locator_finds_the_innermost_node() {
    with_program("<?php echo $a + 1;", |_, program| {
        let root = AstNode::Program(program);
        let path = Locator::find(root, 11);
        assert_eq!(path.first(), Some(&root));
        assert!(matches!(path.last(), Some(AstNode::Expr(Expr::Variable { name: "a", .. }))));
        assert_eq!(path.len(), 4);
        assert!(Locator::find(root, 100).is_empty());
    });
}

#[test]
fn missing_semicolon_recovers() {
    with_program("<?php\necho 1\necho 2;\n", |_, program| {
        let messages: Vec<&str> = program.errors.iter().map(|e| e.message).collect();
        assert_eq!(messages, ["expected ';'"]);
        let echoes = program.statements.iter().filter(|s| matches!(s, Stmt::Echo { .. })).count();
        assert_eq!(echoes, 2);
    });
}

#[test]
fn missing_brace_is_reported_at_end_of_file() {
    with_program("<?php\nif (true) {\n    echo 1;\necho 2;\n", |tokens, program| {
        let last = program.errors.last().expect("an error");
        assert_eq!(last.message, "expected '}'");
        assert_eq!(last.span.start, tokens.source().len());
    });
}

#[test]
fn inline_html_is_a_statement() {
    with_program("<p>hi</p><?php echo 1; ?>\n<b>", |_, program| {
        assert!(program.errors.is_empty());
        let html = program.statements.iter().filter(|s| matches!(s, Stmt::InlineHtml { .. })).count();
        assert_eq!(html, 2);
    });
}
