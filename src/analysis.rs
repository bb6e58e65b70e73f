//! One file through the whole pipeline: decode, tokenize, parse, resolve
//! symbols, build a control flow graph and liveness for every function body,
//! and parse the regex literals passed to `preg_*` style functions.
//!
//! Each call owns its own arena, so files can be analyzed in parallel with
//! nothing shared but the configuration.

use std::path::Path;

use bumpalo::Bump;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info_span, warn};

use crate::ast::visitor::{Visitor, walk_children, walk_expr};
use crate::ast::{AstNode, ClassMember, Expr, ExprId, Program, StmtId, Stmt};
use crate::cfg::{CfgError, ControlFlowGraph, LiveVariables};
use crate::config::AnalyzerConfig;
use crate::lexer::{LexerStart, TokenStream, tokenize_with};
use crate::parser::{Parser, SyntaxError};
use crate::regex::{self, RegexFlags};
use crate::source::{self, SourceError};
use crate::symbols::SymbolTable;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub tokens: usize,
    pub statements: usize,
    pub symbols: usize,
    /// Function-like bodies with a control flow graph, plus the file itself.
    pub functions: usize,
    pub cfg_blocks: usize,
    /// Blocks where at least one variable is live on entry.
    pub live_blocks: usize,
    pub regex_literals: usize,
    pub regex_errors: Vec<String>,
}

pub fn analyze_file(path: &Path, config: &AnalyzerConfig) -> Result<FileSummary, AnalysisError> {
    let bytes = std::fs::read(path).map_err(|source| AnalysisError::Io { path: path.display().to_string(), source })?;
    let text = source::decode(&bytes, &config.encoding)?;
    analyze_source(&path.display().to_string(), &text, config)
}

pub fn analyze_source(path: &str, text: &str, config: &AnalyzerConfig) -> Result<FileSummary, AnalysisError> {
    let _span = info_span!("analyze", path).entered();

    let tokens = tokenize_with(text, LexerStart::Inline, config);
    let arena = Bump::new();
    let program: &Program<'_> = arena.alloc(Parser::new(&tokens, &arena).parse_program());
    if let Some(error) = program.errors.first() {
        let error = SyntaxError::from_parse_error(&tokens, error);
        debug!(%error, "skipping file with a syntax error");
        return Err(error.into());
    }

    let symbols = SymbolTable::build(program);
    let mut summary = FileSummary {
        path: path.to_string(),
        tokens: tokens.len(),
        statements: program.statements.len(),
        symbols: symbols.symbols().len(),
        ..FileSummary::default()
    };

    let mut bodies = vec![AstNode::Program(program)];
    let mut collector = FileCollector { tokens: &tokens, config, bodies: &mut bodies, summary: &mut summary };
    collector.visit_program(program);

    for body in bodies {
        match ControlFlowGraph::build(body) {
            Ok(cfg) => {
                let liveness = LiveVariables::analyze(&cfg, &symbols);
                summary.functions += 1;
                summary.cfg_blocks += cfg.len();
                summary.live_blocks += cfg.blocks().iter().filter(|b| !liveness.live_in(b.id()).is_empty()).count();
            }
            Err(CfgError::MissingBody { .. }) => {}
            Err(error) => warn!(%error, "no control flow graph"),
        }
    }

    debug!(symbols = summary.symbols, blocks = summary.cfg_blocks, "file analyzed");
    Ok(summary)
}

/// Collects function bodies and checks regex literals in one walk.
struct FileCollector<'a, 'src, 'ast> {
    tokens: &'a TokenStream<'src>,
    config: &'a AnalyzerConfig,
    bodies: &'a mut Vec<AstNode<'ast>>,
    summary: &'a mut FileSummary,
}

impl<'ast> FileCollector<'_, '_, 'ast> {
    fn regex_argument(&mut self, func: ExprId<'ast>, args: &'ast [crate::ast::Arg<'ast>]) {
        let Expr::Name { name, .. } = func else { return };
        if !self.config.is_regex_function(name.last()) {
            return;
        }
        let Some(Expr::String { span, .. }) = args.first().map(|arg| arg.value) else {
            return;
        };
        let Some(token) = self.tokens.index_starting_at(span.start).and_then(|i| self.tokens.get(i)) else {
            return;
        };
        self.summary.regex_literals += 1;
        if let Err(error) = regex::parse_string_literal(token, RegexFlags::empty()) {
            let position = self.tokens.position(span.start);
            warn!(line = position.line, %error, "malformed regular expression");
            self.summary.regex_errors.push(format!("{}:{}: {error}", position.line, position.column));
        }
    }
}

impl<'ast> Visitor<'ast> for FileCollector<'_, '_, 'ast> {
    fn visit_stmt(&mut self, stmt: StmtId<'ast>) {
        if let Stmt::Function { .. } = stmt {
            self.bodies.push(AstNode::Stmt(stmt));
        }
        walk_children(self, AstNode::Stmt(stmt));
    }

    fn visit_expr(&mut self, expr: ExprId<'ast>) {
        match expr {
            Expr::Closure { .. } | Expr::ArrowFunction { .. } => self.bodies.push(AstNode::Expr(expr)),
            Expr::Call { func, args, .. } => self.regex_argument(func, args),
            _ => {}
        }
        walk_expr(self, expr);
    }

    fn visit_class_member(&mut self, member: &'ast ClassMember<'ast>) {
        if let ClassMember::Method { body: Some(_), .. } = member {
            self.bodies.push(AstNode::ClassMember(member));
        }
        walk_children(self, AstNode::ClassMember(member));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bodies_and_regex_literals() {
        let code = "<?php\nfunction f($a) { return preg_match('/a+/', $a); }\n$g = fn($x) => preg_replace('/(/', '', $x);\n";
        let summary = analyze_source("t.php", code, &AnalyzerConfig::default()).expect("analysis");
        assert_eq!(summary.functions, 3);
        assert_eq!(summary.regex_literals, 2);
        assert_eq!(summary.regex_errors.len(), 1);
        assert!(summary.regex_errors[0].starts_with("3:"));
    }

    #[test]
    fn syntax_error_stops_the_file() {
        let error = analyze_source("t.php", "<?php function (", &AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(error, AnalysisError::Syntax(_)));
    }
}
