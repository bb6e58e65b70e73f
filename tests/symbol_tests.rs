use bumpalo::Bump;
use php_analyzer::Span;
use php_analyzer::ast::{AstNode, BinaryOp, Expr};
use php_analyzer::lexer::tokenize;
use php_analyzer::parser::Parser;
use php_analyzer::symbols::{CallResolution, ScopeId, ScopeKind, SymbolKind, SymbolTable};

fn with_table<R>(code: &str, check: impl FnOnce(&SymbolTable<'_>) -> R) -> R {
    let arena = Bump::new();
    let tokens = tokenize(code);
    let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
    assert!(program.errors.is_empty(), "{:?}", program.errors);
    let table = SymbolTable::build(program);
    check(&table)
}

fn scope_of_kind(table: &SymbolTable<'_>, kind: ScopeKind) -> ScopeId {
    table.scopes().iter().find(|scope| scope.kind == kind).map(|scope| scope.id).expect("scope of that kind")
}

#[test]
fn functions_do_not_see_globals() {
    with_table("<?php $a = 1; function f() { echo $a; }", |table| {
        let global = table.lookup(ScopeId::GLOBAL, "a").expect("global $a");
        let function = scope_of_kind(table, ScopeKind::Function);
        let local = table.lookup(function, "a").expect("local $a");
        assert_ne!(global.id, local.id);
        assert_eq!(local.alias, None);
        assert!(global.usages.is_empty());
        assert!(local.usages.is_empty());
    });
}

#[test]
fn global_reassignment_shares_the_symbol() {
    with_table("<?php $a = 1; function f() { echo $a; } $a = 2; echo $a;", |table| {
        let global = table.lookup(ScopeId::GLOBAL, "a").expect("global $a");
        assert_eq!(global.usages.len(), 2);
        let function = scope_of_kind(table, ScopeKind::Function);
        assert!(global.usages.iter().all(|usage| table.symbol_id_for(*usage) == Some(global.id)));
        assert_ne!(table.lookup(function, "a").map(|s| s.id), Some(global.id));
    });
}

#[test]
fn foreach_value_may_alias_earlier_assignments() {
    with_table("<?php $a = 1; foreach ($arr as $a) { }", |table| {
        let a = table.lookup(ScopeId::GLOBAL, "a").expect("$a");
        assert_eq!(a.possible_values.len(), 2);
        assert!(matches!(a.possible_values[0], AstNode::Expr(Expr::Integer { .. })));
        assert_eq!(Some(a.possible_values[1]), a.usages.last().copied());
    });
}

#[test]
fn later_occurrences_are_usages() {
    with_table("<?php $a = 1; $b = $a + $a; $a = 2;", |table| {
        let a = table.lookup(ScopeId::GLOBAL, "a").expect("$a");
        assert_eq!(a.usages.len(), 3);
        assert_eq!(a.possible_values.len(), 2);
        for usage in &a.usages {
            assert_eq!(table.symbol_id_for(*usage), Some(a.id));
        }
    });
}

#[test]
fn assignment_target_declares_before_its_value() {
    with_table("<?php $x = $x ?? 0;", |table| {
        let x = table.lookup(ScopeId::GLOBAL, "x").expect("$x");
        assert_eq!(x.declaration.span(), Span::new(6, 8));
        let usages: Vec<_> = x.usage_spans().collect();
        assert_eq!(usages, [Span::new(11, 13)]);
        assert!(matches!(x.possible_values[..], [AstNode::Expr(Expr::Binary { op: BinaryOp::Coalesce, .. })]));
    });
}

#[test]
fn parameters_are_declared_in_their_function() {
    with_table("<?php function f(int $n) { return $n * 2; }", |table| {
        let function = scope_of_kind(table, ScopeKind::Function);
        let n = table.lookup(function, "n").expect("parameter");
        assert_eq!(n.kind, SymbolKind::Parameter);
        assert_eq!(n.usages.len(), 1);
        assert!(matches!(n.possible_values[0], AstNode::Param(_)));
    });
}

#[test]
fn closure_use_captures_enclosing_variable() {
    with_table("<?php $x = 1; $c = function () use ($x) { return $x; };", |table| {
        let outer = table.lookup(ScopeId::GLOBAL, "x").expect("global $x");
        let closure = scope_of_kind(table, ScopeKind::Closure);
        assert_eq!(table.scope(closure).captures, [outer.id]);

        let inner = table.lookup(closure, "x").expect("captured $x");
        assert_eq!(inner.alias, Some(outer.id));
        assert_eq!(inner.usages.len(), 1);
        assert_eq!(outer.usages.len(), 1);
    });
}

#[test]
fn arrow_functions_capture_by_value() {
    with_table("<?php $x = 1; $f = fn() => $x;", |table| {
        let outer = table.lookup(ScopeId::GLOBAL, "x").expect("global $x");
        let arrow = scope_of_kind(table, ScopeKind::ArrowFunction);
        let inner = table.lookup(arrow, "x").expect("captured $x");
        assert_eq!(inner.alias, Some(outer.id));
        assert_eq!(table.scope(arrow).captures, [outer.id]);
        assert_eq!(table.resolve_alias(inner.id), outer.id);
    });
}

#[test]
fn nested_arrow_functions_chain_their_captures() {
    with_table("<?php $x = 1; $f = fn() => fn() => $x;", |table| {
        let outer = table.lookup(ScopeId::GLOBAL, "x").expect("global $x");
        let arrows: Vec<ScopeId> = table
            .scopes()
            .iter()
            .filter(|scope| scope.kind == ScopeKind::ArrowFunction)
            .map(|scope| scope.id)
            .collect();
        assert_eq!(arrows.len(), 2);

        let middle = table.lookup(arrows[0], "x").expect("intermediate capture");
        let innermost = table.lookup(arrows[1], "x").expect("innermost $x");
        assert_eq!(middle.alias, Some(outer.id));
        assert_eq!(innermost.alias, Some(middle.id));
        assert_eq!(table.resolve_alias(innermost.id), outer.id);
    });
}

#[test]
fn arrow_parameters_shadow_outer_variables() {
    with_table("<?php $x = 1; $f = fn($x) => $x;", |table| {
        let arrow = scope_of_kind(table, ScopeKind::ArrowFunction);
        let inner = table.lookup(arrow, "x").expect("parameter");
        assert_eq!(inner.kind, SymbolKind::Parameter);
        assert_eq!(inner.alias, None);
        assert!(table.scope(arrow).captures.is_empty());
    });
}

#[test]
fn foreach_binds_key_and_value() {
    with_table("<?php foreach ($items as $k => $v) { echo $k, $v; }", |table| {
        let k = table.lookup(ScopeId::GLOBAL, "k").expect("$k");
        let v = table.lookup(ScopeId::GLOBAL, "v").expect("$v");
        assert_eq!(k.usages.len(), 1);
        assert_eq!(v.usages.len(), 1);
        assert_eq!(v.possible_values, [v.declaration]);
    });
}

#[test]
fn superglobals_live_in_the_global_scope() {
    with_table("<?php function f() { return $_GET['q']; }", |table| {
        assert!(table.lookup(ScopeId::GLOBAL, "_GET").is_some());
        let function = scope_of_kind(table, ScopeKind::Function);
        assert!(table.lookup(function, "_GET").is_none());
    });
}

#[test]
fn calls_resolve_to_declarations() {
    let code = "<?php
function helper() {}
class Box {
    public function open() {}
    public function run() { $this->open(); self::open(); $other->open(); }
}
helper();
missing();
$callback();
";
    with_table(code, |table| {
        let helper = table.function("helper").expect("helper").id;
        let open = table.class("Box").and_then(|class| {
            let scope = table.scopes().iter().find(|scope| scope.class == Some(class.id))?;
            scope.member(SymbolKind::Method, "open")
        });
        let open = open.expect("method open");

        let mut resolutions = Vec::new();
        collect_calls(table, &mut resolutions);
        assert!(resolutions.contains(&CallResolution::Function(helper)));
        assert_eq!(resolutions.iter().filter(|r| **r == CallResolution::Method(open)).count(), 2);
        assert!(resolutions.contains(&CallResolution::Unknown));
        assert_eq!(resolutions.iter().filter(|r| **r == CallResolution::Unresolvable).count(), 2);
    });
}

/// Resolutions of every call expression in the program.
fn collect_calls(table: &SymbolTable<'_>, out: &mut Vec<CallResolution>) {
    let program = match table.global_scope().node {
        AstNode::Program(program) => program,
        _ => return,
    };
    let mut stack: Vec<AstNode<'_>> = vec![AstNode::Program(program)];
    while let Some(node) = stack.pop() {
        if let AstNode::Expr(expr @ (Expr::Call { .. } | Expr::MethodCall { .. } | Expr::StaticCall { .. })) = node {
            out.push(table.resolve_call(expr));
        }
        stack.extend(node.children().into_iter().flatten());
    }
}
