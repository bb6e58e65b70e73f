use std::collections::BTreeSet;

use bumpalo::Bump;
use php_analyzer::ast::{AstNode, ClassMember, Expr, Program, Stmt};
use php_analyzer::cfg::{CfgError, ControlFlowGraph, LiveVariables};
use php_analyzer::lexer::tokenize;
use php_analyzer::parser::Parser;
use php_analyzer::symbols::{SymbolId, SymbolTable};

fn with_program<R>(code: &str, check: impl FnOnce(&Program<'_>, &SymbolTable<'_>) -> R) -> R {
    let arena = Bump::new();
    let tokens = tokenize(code);
    let program = arena.alloc(Parser::new(&tokens, &arena).parse_program());
    assert!(program.errors.is_empty(), "{:?}", program.errors);
    let symbols = SymbolTable::build(program);
    check(program, &symbols)
}

fn first_function<'a>(program: &'a Program<'a>) -> AstNode<'a> {
    program
        .statements
        .iter()
        .find(|stmt| matches!(stmt, Stmt::Function { .. }))
        .map(|stmt| AstNode::Stmt(*stmt))
        .expect("a function")
}

fn describe(code: &str) -> String {
    with_program(code, |program, _| ControlFlowGraph::build(first_function(program)).expect("graph").describe())
}

fn names(symbols: &SymbolTable<'_>, set: &BTreeSet<SymbolId>) -> Vec<String> {
    set.iter().map(|&id| symbols.symbol(id).name.clone()).collect()
}

#[test]
fn if_else_branches_rejoin() {
    insta::assert_snapshot!(
        describe("<?php function f($a) { if ($a) { $b = 1; } else { $b = 2; } return $b; }"),
        @r"
    B5 [1] ? B4 : B3 (start)
    B4 [1] -> B2
    B3 [1] -> B2
    B2 [1] -> B0 then B1
    B1 [0] -> B0
    B0 (end)
    "
    );
}

#[test]
fn statement_ternary_branches_like_if() {
    insta::assert_snapshot!(
        describe("<?php function f($x) { $x ? a() : b(); }"),
        @r"
    B4 [1] ? B3 : B2 (start)
    B3 [1] -> B1
    B2 [1] -> B1
    B1 [0] -> B0
    B0 (end)
    "
    );
}

#[test]
fn short_ternary_falls_through_when_true() {
    insta::assert_snapshot!(
        describe("<?php function f($x) { $x ?: b(); }"),
        @r"
    B3 [1] ? B1 : B2 (start)
    B2 [1] -> B1
    B1 [0] -> B0
    B0 (end)
    "
    );
}

#[test]
fn top_level_if_has_one_branch_point() {
    with_program("<?php if ($x) { a(); } else { b(); }", |program, _| {
        let cfg = ControlFlowGraph::build(AstNode::Program(program)).expect("graph");
        let branches: Vec<_> = cfg.blocks().iter().filter(|b| b.is_branching()).collect();
        assert_eq!(branches.len(), 1);

        let arms = branches[0].normal_successors();
        assert_eq!(arms.len(), 2);
        let joins: Vec<_> = arms
            .iter()
            .map(|&arm| {
                assert_eq!(cfg.block(arm).elements().len(), 1);
                cfg.block(arm).normal_successors()
            })
            .collect();
        assert_eq!(joins[0], joins[1]);
        assert_eq!(joins[0].len(), 1);

        let end = cfg.block(cfg.end());
        assert!(end.is_end());
        assert!(end.elements().is_empty());
        assert!(end.successors().is_empty());
    });
}

#[test]
fn try_body_throws_into_handler() {
    insta::assert_snapshot!(
        describe("<?php function f() { try { a(); } catch (E $e) { b(); } c(); }"),
        @r"
    B5 [0] -> B4 (start)
    B4 [1] -> B1 catch [3]
    B3 [1] -> B2
    B2 [1] -> B1
    B1 [1] -> B0
    B0 (end)
    "
    );
}

#[test]
fn return_runs_finally_first() {
    insta::assert_snapshot!(
        describe("<?php function f() { try { return 1; } finally { g(); } }"),
        @r"
    B5 [0] -> B4 (start)
    B4 [1] -> B2 catch [2] then B3
    B3 [0] -> B2 catch [2]
    B2 [1] -> B1 exit [0]
    B1 [0] -> B0
    B0 (end)
    "
    );
}

#[test]
fn goto_jumps_to_its_label() {
    insta::assert_snapshot!(
        describe("<?php function f() { goto done; a(); done: b(); }"),
        @r"
    B3 [1] -> B1 then B2 (start)
    B2 [1] -> B1
    B1 [2] -> B0
    B0 (end)
    "
    );
}

#[test]
fn code_after_return_has_no_predecessors() {
    with_program("<?php function f() { return 1; dead(); }", |program, _| {
        let cfg = ControlFlowGraph::build(first_function(program)).expect("graph");
        let start = cfg.block(cfg.start());
        let dead = start.syntactic_successor().expect("syntactic successor");
        assert!(cfg.block(dead).predecessors().is_empty());
        assert_eq!(start.normal_successors(), [cfg.end()]);
        assert!(cfg.reachable().contains(&dead));
    });
}

#[test]
fn arrow_function_body_is_one_block() {
    with_program("<?php $f = fn($x) => $x + 1;", |program, _| {
        let Stmt::Expression { expr: Expr::Assign { expr: arrow, .. }, .. } = program.statements[1] else {
            panic!("expected assignment");
        };
        let cfg = ControlFlowGraph::build(AstNode::Expr(arrow)).expect("graph");
        assert_eq!(cfg.describe(), "B1 [1] -> B0 (start)\nB0 (end)\n");
    });
}

#[test]
fn only_function_bodies_have_graphs() {
    with_program("<?php echo 1; abstract class A { abstract function f(); }", |program, _| {
        let echo = AstNode::Stmt(program.statements[1]);
        assert!(matches!(ControlFlowGraph::build(echo), Err(CfgError::NotAFunctionBody { .. })));

        let Stmt::Class { members, .. } = program.statements[2] else {
            panic!("expected class");
        };
        let method = members.iter().find(|m| matches!(m, ClassMember::Method { .. })).expect("method");
        assert!(matches!(
            ControlFlowGraph::build(AstNode::ClassMember(method)),
            Err(CfgError::MissingBody { .. })
        ));
    });
}

#[test]
#[should_panic(expected = "end block")]
fn end_block_holds_no_elements() {
    with_program("<?php function f() { a(); }", |program, _| {
        let function = first_function(program);
        let mut cfg = ControlFlowGraph::build(function).expect("graph");
        let end = cfg.end();
        cfg.block_mut(end).add_element(function);
    });
}

#[test]
fn branch_variables_are_live_where_read() {
    with_program(
        "<?php function f($a) { if ($a) { $b = 1; } else { $b = 2; } return $b; }",
        |program, symbols| {
            let cfg = ControlFlowGraph::build(first_function(program)).expect("graph");
            let live = LiveVariables::analyze(&cfg, symbols);
            assert_eq!(names(symbols, live.live_in(cfg.start())), ["a"]);
            let join = cfg.blocks().iter().find(|b| b.syntactic_successor().is_some()).expect("return block");
            assert_eq!(names(symbols, live.live_in(join.id())), ["b"]);
            assert!(live.live_in(cfg.end()).is_empty());
        },
    );
}

#[test]
fn finally_reads_keep_variables_live() {
    with_program("<?php function f($x) { try { return; } finally { echo $x; } }", |program, symbols| {
        let cfg = ControlFlowGraph::build(first_function(program)).expect("graph");
        let live = LiveVariables::analyze(&cfg, symbols);
        assert_eq!(names(symbols, live.live_in(cfg.start())), ["x"]);
    });
}

#[test]
fn closures_read_their_captures() {
    with_program("<?php function f($x) { $g = function () use ($x) { return $x; }; return $g; }", |program, symbols| {
        let cfg = ControlFlowGraph::build(first_function(program)).expect("graph");
        let live = LiveVariables::analyze(&cfg, symbols);
        assert_eq!(names(symbols, live.gen_set(cfg.start())), ["x"]);
        assert_eq!(names(symbols, live.kill(cfg.start())), ["g"]);
    });
}

#[test]
fn liveness_reaches_a_fixpoint() {
    let code = "<?php function f($n) {
        $total = 0;
        for ($i = 0; $i < $n; $i++) {
            if ($i % 2) { continue; }
            foreach ($n as $k => $v) { $total += $v; break 2; }
        }
        return $total;
    }";
    with_program(code, |program, symbols| {
        let cfg = ControlFlowGraph::build(first_function(program)).expect("graph");
        let first = LiveVariables::analyze(&cfg, symbols);
        let second = LiveVariables::analyze(&cfg, symbols);
        assert_eq!(first, second);
        for id in cfg.reachable() {
            let out: BTreeSet<SymbolId> =
                cfg.block(id).successors().iter().flat_map(|&s| first.live_in(s).iter().copied()).collect();
            assert_eq!(first.live_out(id), &out);
        }
    });
}
