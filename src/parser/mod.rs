mod attributes;
mod expr;
mod types;

use bumpalo::Bump;
use thiserror::Error;
use tracing::debug;

use crate::ast::*;
use crate::lexer::stream::TokenStream;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

/// Grammar entry points for [`parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    CompilationUnit,
    Statement,
    Expression,
    Type,
    Name,
}

/// The first syntax error of a unit, located in the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at line {line}, column {column}: {expected}, found {found:?}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub expected: String,
    pub found: String,
}

impl SyntaxError {
    pub fn from_parse_error(tokens: &TokenStream<'_>, error: &ParseError) -> Self {
        let position = tokens.position(error.span.start);
        let found = if error.span.is_empty() {
            "end of file".to_string()
        } else {
            tokens.text(error.span).to_string()
        };
        Self {
            line: position.line,
            column: position.column,
            offset: error.span.start,
            expected: error.message.to_string(),
            found,
        }
    }
}

/// Parses `tokens` as `rule`. The whole stream must be consumed, and any
/// recovered error is reported as the first [`SyntaxError`].
pub fn parse<'ast>(tokens: &TokenStream<'_>, rule: Rule, arena: &'ast Bump) -> Result<AstNode<'ast>, SyntaxError> {
    let mut parser = Parser::new(tokens, arena);
    let node = match rule {
        Rule::CompilationUnit => AstNode::Program(arena.alloc(parser.parse_program())),
        Rule::Statement => AstNode::Stmt(parser.parse_stmt()),
        Rule::Expression => AstNode::Expr(parser.parse_expr(0)),
        Rule::Type => AstNode::Type(arena.alloc(parser.parse_type())),
        Rule::Name => AstNode::Name(arena.alloc(parser.parse_name())),
    };
    if !parser.at(TokenKind::Eof) {
        parser.error("expected end of input");
    }
    match parser.errors.first() {
        Some(error) => {
            debug!(errors = parser.errors.len(), "parse failed");
            Err(SyntaxError::from_parse_error(tokens, error))
        }
        None => Ok(node),
    }
}

enum MemberOwner {
    Class,
    Interface,
    Trait,
    Enum,
}

pub struct Parser<'src, 'ast> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    arena: &'ast Bump,
    current_token: Token,
    next_token: Token,
    prev_end: usize,
    errors: Vec<ParseError>,
}

impl<'src, 'ast> Parser<'src, 'ast> {
    pub fn new(stream: &TokenStream<'src>, arena: &'ast Bump) -> Self {
        let tokens = stream.compact();
        let eof = stream.eof().token();
        let prev_end = tokens.first().map_or(0, |t| t.span.start);
        let mut parser = Self {
            source: stream.source(),
            tokens,
            pos: 0,
            arena,
            current_token: eof,
            next_token: eof,
            prev_end,
            errors: Vec::new(),
        };
        parser.sync_lookahead();
        parser
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn sync_lookahead(&mut self) {
        self.current_token = self.peek_token(0);
        self.next_token = self.peek_token(1);
    }

    fn peek_token(&self, n: usize) -> Token {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)]
    }

    fn bump(&mut self) {
        if self.current_token.kind == TokenKind::Eof {
            return;
        }
        self.prev_end = self.current_token.span.end;
        self.pos += 1;
        self.sync_lookahead();
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current_token.kind == kind
    }

    fn at_ampersand(&self) -> bool {
        self.current_token.kind.is_ampersand()
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &'static str) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error(message);
            false
        }
    }

    fn error(&mut self, message: &'static str) {
        self.errors.push(ParseError { span: self.current_token.span, message });
    }

    fn start(&self) -> usize {
        self.current_token.span.start
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn text(&self, token: Token) -> &'src str {
        token.span.as_str(self.source)
    }

    fn alloc_str(&self, text: &str) -> &'ast str {
        self.arena.alloc_str(text)
    }

    fn ident(&mut self) -> Ident<'ast> {
        let token = self.current_token;
        self.bump();
        Ident { value: self.alloc_str(self.text(token)), span: token.span }
    }

    /// An identifier, keywords included, as allowed for member names.
    fn member_ident(&mut self) -> Ident<'ast> {
        if self.at(TokenKind::Identifier) || self.current_token.kind.is_semi_reserved() {
            self.ident()
        } else {
            self.error("expected identifier");
            Ident { value: "", span: self.current_token.span }
        }
    }

    fn expect_ident(&mut self) -> Ident<'ast> {
        if self.at(TokenKind::Identifier) {
            self.ident()
        } else {
            self.error("expected identifier");
            Ident { value: "", span: self.current_token.span }
        }
    }

    fn stmts(&self, stmts: &[StmtId<'ast>]) -> &'ast [StmtId<'ast>] {
        self.arena.alloc_slice_copy(stmts)
    }

    fn expect_semicolon(&mut self) {
        match self.current_token.kind {
            TokenKind::SemiColon => self.bump(),
            // A closing tag or the end of input terminates a statement.
            TokenKind::CloseTag | TokenKind::Eof => {}
            _ => {
                self.error("expected ';'");
                self.sync_to_statement_end();
            }
        }
    }

    fn sync_to_statement_end(&mut self) {
        while !matches!(
            self.current_token.kind,
            TokenKind::SemiColon | TokenKind::CloseBrace | TokenKind::CloseTag | TokenKind::Eof
        ) {
            self.bump();
        }
        self.eat(TokenKind::SemiColon);
    }

    pub(crate) fn parse_name(&mut self) -> Name<'ast> {
        let start = self.start();
        let mut kind = NameKind::Unqualified;
        if self.eat(TokenKind::NsSeparator) {
            kind = NameKind::FullyQualified;
        } else if self.at(TokenKind::Namespace) && self.next_token.kind == TokenKind::NsSeparator {
            self.bump();
            self.bump();
            kind = NameKind::Relative;
        }

        let mut parts = Vec::new();
        loop {
            if self.at(TokenKind::Identifier) || self.current_token.kind.is_semi_reserved() {
                parts.push(self.ident());
            } else {
                self.error("expected name");
                break;
            }
            let continues = self.at(TokenKind::NsSeparator)
                && (self.next_token.kind == TokenKind::Identifier || self.next_token.kind.is_semi_reserved());
            if !continues {
                break;
            }
            self.bump();
        }
        if kind == NameKind::Unqualified && parts.len() > 1 {
            kind = NameKind::Qualified;
        }

        Name { kind, parts: self.arena.alloc_slice_copy(&parts), span: self.span_from(start) }
    }

    fn parse_name_list(&mut self) -> &'ast [Name<'ast>] {
        let mut names = vec![self.parse_name()];
        while self.eat(TokenKind::Comma) {
            names.push(self.parse_name());
        }
        self.arena.alloc_slice_copy(&names)
    }

    pub fn parse_program(&mut self) -> Program<'ast> {
        let start = self.start();
        let mut statements = Vec::new();
        while !self.at(TokenKind::Eof) {
            statements.push(self.parse_stmt());
        }
        let eof = self.current_token;
        Program {
            statements: self.stmts(&statements),
            eof,
            errors: self.arena.alloc_slice_copy(&self.errors),
            span: Span::new(start, eof.span.end),
        }
    }

    /// One statement. Always consumes at least one token unless at the end
    /// of input.
    pub(crate) fn parse_stmt(&mut self) -> StmtId<'ast> {
        let before = self.pos;
        let stmt = self.parse_stmt_inner();
        if self.pos == before && !self.at(TokenKind::Eof) {
            let span = self.current_token.span;
            if self.errors.last().map(|e| e.span) != Some(span) {
                self.error("unexpected token");
            }
            self.bump();
            return self.arena.alloc(Stmt::Error { span });
        }
        stmt
    }

    /// Statements up to (not including) one of `terminators`.
    fn parse_stmts_until(&mut self, terminators: &[TokenKind]) -> &'ast [StmtId<'ast>] {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::Eof) && !terminators.contains(&self.current_token.kind) {
            stmts.push(self.parse_stmt());
        }
        self.stmts(&stmts)
    }

    /// `{ statements }`
    pub(crate) fn parse_block_body(&mut self) -> &'ast [StmtId<'ast>] {
        if !self.expect(TokenKind::OpenBrace, "expected '{'") {
            return &[];
        }
        let body = self.parse_stmts_until(&[TokenKind::CloseBrace]);
        self.expect(TokenKind::CloseBrace, "expected '}'");
        body
    }

    /// The body of a control statement in brace or single-statement form.
    fn parse_embedded_body(&mut self) -> &'ast [StmtId<'ast>] {
        let stmt = self.parse_stmt();
        match stmt {
            Stmt::Block { statements, .. } => statements,
            _ => self.stmts(&[stmt]),
        }
    }

    /// The body of a loop or declare, in either brace or `: ... endX;` form.
    fn parse_loop_body(&mut self, end: TokenKind) -> &'ast [StmtId<'ast>] {
        if self.eat(TokenKind::Colon) {
            let body = self.parse_stmts_until(&[end]);
            self.expect(end, "expected end of alternative block");
            self.expect_semicolon();
            body
        } else {
            self.parse_embedded_body()
        }
    }

    fn parse_stmt_inner(&mut self) -> StmtId<'ast> {
        if self.at(TokenKind::Identifier) && self.next_token.kind == TokenKind::Colon {
            let start = self.start();
            let name = self.ident();
            self.bump();
            return self.arena.alloc(Stmt::Label { name, span: self.span_from(start) });
        }

        match self.current_token.kind {
            TokenKind::Attribute => {
                let (after, after_next) = self.token_after_attributes();
                let declaration = match after {
                    TokenKind::Function => after_next == TokenKind::Identifier || after_next.is_ampersand(),
                    TokenKind::Class
                    | TokenKind::Interface
                    | TokenKind::Trait
                    | TokenKind::Enum
                    | TokenKind::Abstract
                    | TokenKind::Final
                    | TokenKind::Readonly
                    | TokenKind::Const => true,
                    _ => false,
                };
                if !declaration {
                    return self.parse_expression_stmt();
                }
                let start = self.start();
                let attributes = self.parse_attributes();
                match self.current_token.kind {
                    TokenKind::Function => self.parse_function(attributes, start),
                    TokenKind::Interface => self.parse_interface(attributes, start),
                    TokenKind::Trait => self.parse_trait(attributes, start),
                    TokenKind::Enum => self.parse_enum(attributes, start),
                    TokenKind::Const => self.parse_const_stmt(attributes, start),
                    _ => self.parse_class(attributes, start),
                }
            }
            TokenKind::Function
                if self.next_token.kind == TokenKind::Identifier
                    || (self.next_token.kind.is_ampersand() && self.peek_token(2).kind == TokenKind::Identifier) =>
            {
                let start = self.start();
                self.parse_function(&[], start)
            }
            TokenKind::Abstract | TokenKind::Final | TokenKind::Class => {
                let start = self.start();
                self.parse_class(&[], start)
            }
            TokenKind::Readonly if matches!(self.next_token.kind, TokenKind::Class | TokenKind::Final | TokenKind::Abstract) => {
                let start = self.start();
                self.parse_class(&[], start)
            }
            TokenKind::Interface => {
                let start = self.start();
                self.parse_interface(&[], start)
            }
            TokenKind::Trait => {
                let start = self.start();
                self.parse_trait(&[], start)
            }
            TokenKind::Enum => {
                let start = self.start();
                self.parse_enum(&[], start)
            }
            TokenKind::Const => {
                let start = self.start();
                self.parse_const_stmt(&[], start)
            }
            TokenKind::HaltCompiler => self.parse_halt_compiler(),
            TokenKind::Echo | TokenKind::OpenTagEcho => self.parse_echo(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::Namespace if self.next_token.kind != TokenKind::NsSeparator => self.parse_namespace(),
            TokenKind::Use => self.parse_use(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Throw => self.parse_throw(),
            TokenKind::Goto => self.parse_goto(),
            TokenKind::Break | TokenKind::Continue => self.parse_break_continue(),
            TokenKind::Declare => self.parse_declare(),
            TokenKind::Global => self.parse_global(),
            TokenKind::Static if matches!(self.next_token.kind, TokenKind::Variable) => self.parse_static(),
            TokenKind::Unset => self.parse_unset(),
            TokenKind::OpenBrace => {
                let start = self.start();
                let statements = self.parse_block_body();
                self.arena.alloc(Stmt::Block { statements, span: self.span_from(start) })
            }
            TokenKind::SemiColon | TokenKind::CloseTag | TokenKind::OpenTag => {
                let span = self.current_token.span;
                self.bump();
                self.arena.alloc(Stmt::Nop { span })
            }
            TokenKind::InlineHtml => {
                let token = self.current_token;
                self.bump();
                self.arena.alloc(Stmt::InlineHtml { value: self.alloc_str(self.text(token)), span: token.span })
            }
            _ => self.parse_expression_stmt(),
        }
    }

    /// Kinds of the two tokens following the attribute groups at the cursor.
    fn token_after_attributes(&self) -> (TokenKind, TokenKind) {
        let mut i = self.pos;
        let last = self.tokens.len() - 1;
        while i < last && self.tokens[i].kind == TokenKind::Attribute {
            let mut depth = 0usize;
            while i < last {
                match self.tokens[i].kind {
                    TokenKind::Attribute | TokenKind::OpenBracket => depth += 1,
                    TokenKind::CloseBracket => depth = depth.saturating_sub(1),
                    _ => {}
                }
                i += 1;
                if depth == 0 {
                    break;
                }
            }
        }
        (self.tokens[i.min(last)].kind, self.tokens[(i + 1).min(last)].kind)
    }

    fn parse_expression_stmt(&mut self) -> StmtId<'ast> {
        let start = self.start();
        let expr = self.parse_expr(0);
        self.expect_semicolon();
        self.arena.alloc(Stmt::Expression { expr, span: self.span_from(start) })
    }

    fn parse_halt_compiler(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        self.expect(TokenKind::OpenParen, "expected '('");
        self.expect(TokenKind::CloseParen, "expected ')'");
        if !self.eat(TokenKind::CloseTag) {
            self.expect_semicolon();
        }
        // Everything after the call is raw data.
        self.eat(TokenKind::InlineHtml);
        self.arena.alloc(Stmt::HaltCompiler { span: self.span_from(start) })
    }

    fn parse_echo(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let mut exprs = vec![self.parse_expr(0)];
        while self.eat(TokenKind::Comma) {
            exprs.push(self.parse_expr(0));
        }
        self.expect_semicolon();
        self.arena.alloc(Stmt::Echo { exprs: self.arena.alloc_slice_copy(&exprs), span: self.span_from(start) })
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current_token.kind,
            TokenKind::SemiColon | TokenKind::CloseTag | TokenKind::Eof | TokenKind::CloseBrace
        )
    }

    fn parse_return(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let expr = if self.at_statement_end() { None } else { Some(self.parse_expr(0)) };
        self.expect_semicolon();
        self.arena.alloc(Stmt::Return { expr, span: self.span_from(start) })
    }

    fn parse_condition(&mut self) -> ExprId<'ast> {
        self.expect(TokenKind::OpenParen, "expected '('");
        let condition = self.parse_expr(0);
        self.expect(TokenKind::CloseParen, "expected ')'");
        condition
    }

    fn parse_if(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let condition = self.parse_condition();
        if !self.eat(TokenKind::Colon) {
            return self.parse_if_tail(start, condition);
        }

        let stmt = self.parse_alt_if_tail(start, condition);
        self.expect(TokenKind::EndIf, "expected 'endif'");
        self.expect_semicolon();
        // The outermost `if` of an alternative chain owns `endif;`.
        match stmt {
            Stmt::If { condition, then_block, else_block, .. } => self.arena.alloc(Stmt::If {
                condition: *condition,
                then_block: *then_block,
                else_block: *else_block,
                span: self.span_from(start),
            }),
            other => other,
        }
    }

    /// Body and else branches of an `if` or `elseif` in brace form.
    fn parse_if_tail(&mut self, start: usize, condition: ExprId<'ast>) -> StmtId<'ast> {
        let then_block = self.parse_embedded_body();
        let else_block = if self.at(TokenKind::ElseIf) {
            let elseif_start = self.start();
            self.bump();
            let condition = self.parse_condition();
            let nested = self.parse_if_tail(elseif_start, condition);
            Some(self.stmts(&[nested]))
        } else if self.eat(TokenKind::Else) {
            Some(self.parse_embedded_body())
        } else {
            None
        };
        self.arena.alloc(Stmt::If { condition, then_block, else_block, span: self.span_from(start) })
    }

    /// `if (...):` chains. Stops before `endif`.
    fn parse_alt_if_tail(&mut self, start: usize, condition: ExprId<'ast>) -> StmtId<'ast> {
        let terminators = [TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf];
        let then_block = self.parse_stmts_until(&terminators);
        let else_block = if self.at(TokenKind::ElseIf) {
            let elseif_start = self.start();
            self.bump();
            let condition = self.parse_condition();
            self.expect(TokenKind::Colon, "expected ':'");
            let nested = self.parse_alt_if_tail(elseif_start, condition);
            Some(self.stmts(&[nested]))
        } else if self.eat(TokenKind::Else) {
            self.expect(TokenKind::Colon, "expected ':'");
            Some(self.parse_stmts_until(&[TokenKind::EndIf]))
        } else {
            None
        };
        self.arena.alloc(Stmt::If { condition, then_block, else_block, span: self.span_from(start) })
    }

    fn parse_while(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let condition = self.parse_condition();
        let body = self.parse_loop_body(TokenKind::EndWhile);
        self.arena.alloc(Stmt::While { condition, body, span: self.span_from(start) })
    }

    fn parse_do_while(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let body = self.parse_embedded_body();
        self.expect(TokenKind::While, "expected 'while'");
        let condition = self.parse_condition();
        self.expect_semicolon();
        self.arena.alloc(Stmt::DoWhile { body, condition, span: self.span_from(start) })
    }

    fn parse_expr_list_until(&mut self, end: TokenKind) -> &'ast [ExprId<'ast>] {
        let mut exprs = Vec::new();
        if !self.at(end) {
            exprs.push(self.parse_expr(0));
            while self.eat(TokenKind::Comma) {
                exprs.push(self.parse_expr(0));
            }
        }
        self.arena.alloc_slice_copy(&exprs)
    }

    fn parse_for(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        self.expect(TokenKind::OpenParen, "expected '('");
        let init = self.parse_expr_list_until(TokenKind::SemiColon);
        self.expect(TokenKind::SemiColon, "expected ';'");
        let condition = self.parse_expr_list_until(TokenKind::SemiColon);
        self.expect(TokenKind::SemiColon, "expected ';'");
        let loop_expr = self.parse_expr_list_until(TokenKind::CloseParen);
        self.expect(TokenKind::CloseParen, "expected ')'");
        let body = self.parse_loop_body(TokenKind::EndFor);
        self.arena.alloc(Stmt::For { init, condition, loop_expr, body, span: self.span_from(start) })
    }

    fn parse_foreach(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        self.expect(TokenKind::OpenParen, "expected '('");
        let expr = self.parse_expr(0);
        self.expect(TokenKind::As, "expected 'as'");

        let mut by_ref = self.at_ampersand();
        if by_ref {
            self.bump();
        }
        let first = self.parse_expr(0);
        let (key_var, value_var) = if self.eat(TokenKind::DoubleArrow) {
            if by_ref {
                self.error("key cannot be taken by reference");
            }
            by_ref = self.at_ampersand();
            if by_ref {
                self.bump();
            }
            (Some(first), self.parse_expr(0))
        } else {
            (None, first)
        };
        self.expect(TokenKind::CloseParen, "expected ')'");
        let body = self.parse_loop_body(TokenKind::EndForeach);

        self.arena.alloc(Stmt::Foreach { expr, key_var, value_var, by_ref, body, span: self.span_from(start) })
    }

    fn parse_switch(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let condition = self.parse_condition();

        let alternative = self.eat(TokenKind::Colon);
        if !alternative {
            self.expect(TokenKind::OpenBrace, "expected '{'");
        }
        let end = if alternative { TokenKind::EndSwitch } else { TokenKind::CloseBrace };
        self.eat(TokenKind::SemiColon);

        let mut cases = Vec::new();
        while !self.at(end) && !self.at(TokenKind::Eof) {
            let case_start = self.start();
            let condition = if self.eat(TokenKind::Case) {
                Some(self.parse_expr(0))
            } else if self.eat(TokenKind::Default) {
                None
            } else {
                self.error("expected 'case' or 'default'");
                self.bump();
                continue;
            };
            if !self.eat(TokenKind::Colon) && !self.eat(TokenKind::SemiColon) {
                self.error("expected ':'");
            }
            let body = self.parse_stmts_until(&[TokenKind::Case, TokenKind::Default, end]);
            cases.push(Case { condition, body, span: self.span_from(case_start) });
        }

        if alternative {
            self.expect(TokenKind::EndSwitch, "expected 'endswitch'");
            self.expect_semicolon();
        } else {
            self.expect(TokenKind::CloseBrace, "expected '}'");
        }

        self.arena.alloc(Stmt::Switch {
            condition,
            cases: self.arena.alloc_slice_copy(&cases),
            span: self.span_from(start),
        })
    }

    fn parse_try(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let body = self.parse_block_body();

        let mut catches = Vec::new();
        while self.at(TokenKind::Catch) {
            let catch_start = self.start();
            self.bump();
            self.expect(TokenKind::OpenParen, "expected '('");
            let mut types = vec![self.parse_name()];
            while self.eat(TokenKind::Pipe) {
                types.push(self.parse_name());
            }
            let var = if self.at(TokenKind::Variable) { Some(self.parse_simple_variable()) } else { None };
            self.expect(TokenKind::CloseParen, "expected ')'");
            let body = self.parse_block_body();
            catches.push(Catch {
                types: self.arena.alloc_slice_copy(&types),
                var,
                body,
                span: self.span_from(catch_start),
            });
        }

        let finally = if self.eat(TokenKind::Finally) { Some(self.parse_block_body()) } else { None };
        if catches.is_empty() && finally.is_none() {
            self.error("expected 'catch' or 'finally'");
        }

        self.arena.alloc(Stmt::Try {
            body,
            catches: self.arena.alloc_slice_copy(&catches),
            finally,
            span: self.span_from(start),
        })
    }

    fn parse_throw(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let expr = self.parse_expr(0);
        self.expect_semicolon();
        self.arena.alloc(Stmt::Throw { expr, span: self.span_from(start) })
    }

    fn parse_goto(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let label = self.expect_ident();
        self.expect_semicolon();
        self.arena.alloc(Stmt::Goto { label, span: self.span_from(start) })
    }

    fn parse_break_continue(&mut self) -> StmtId<'ast> {
        let start = self.start();
        let is_break = self.at(TokenKind::Break);
        self.bump();
        let level = if self.at_statement_end() { None } else { Some(self.parse_expr(0)) };
        if let Some(level) = level
            && !matches!(level, Expr::Integer { .. })
        {
            self.errors.push(ParseError { span: level.span(), message: "loop level must be an integer literal" });
        }
        self.expect_semicolon();
        let span = self.span_from(start);
        if is_break {
            self.arena.alloc(Stmt::Break { level, span })
        } else {
            self.arena.alloc(Stmt::Continue { level, span })
        }
    }

    fn parse_declare(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        self.expect(TokenKind::OpenParen, "expected '('");
        let mut declares = Vec::new();
        loop {
            let item_start = self.start();
            let key = self.expect_ident();
            self.expect(TokenKind::Eq, "expected '='");
            let value = self.parse_expr(0);
            declares.push(DeclareItem { key, value, span: self.span_from(item_start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "expected ')'");

        let body = if self.at(TokenKind::Colon) {
            self.parse_loop_body(TokenKind::EndDeclare)
        } else if self.at_statement_end() && !self.at(TokenKind::CloseBrace) {
            self.expect_semicolon();
            &[]
        } else {
            self.parse_embedded_body()
        };

        self.arena.alloc(Stmt::Declare {
            declares: self.arena.alloc_slice_copy(&declares),
            body,
            span: self.span_from(start),
        })
    }

    fn parse_global(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let mut vars = vec![self.parse_simple_variable()];
        while self.eat(TokenKind::Comma) {
            vars.push(self.parse_simple_variable());
        }
        self.expect_semicolon();
        self.arena.alloc(Stmt::Global { vars: self.arena.alloc_slice_copy(&vars), span: self.span_from(start) })
    }

    fn parse_static(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let mut vars = Vec::new();
        loop {
            let var_start = self.start();
            let var = self.parse_simple_variable();
            let default = if self.eat(TokenKind::Eq) { Some(self.parse_expr(0)) } else { None };
            vars.push(StaticVar { var, default, span: self.span_from(var_start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_semicolon();
        self.arena.alloc(Stmt::Static { vars: self.arena.alloc_slice_copy(&vars), span: self.span_from(start) })
    }

    fn parse_unset(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        self.expect(TokenKind::OpenParen, "expected '('");
        let mut vars = Vec::new();
        while !self.at(TokenKind::CloseParen) && !self.at(TokenKind::Eof) {
            vars.push(self.parse_expr(0));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "expected ')'");
        self.expect_semicolon();
        self.arena.alloc(Stmt::Unset { vars: self.arena.alloc_slice_copy(&vars), span: self.span_from(start) })
    }

    fn parse_const_stmt(&mut self, attributes: &'ast [AttributeGroup<'ast>], start: usize) -> StmtId<'ast> {
        self.bump();
        let consts = self.parse_const_list();
        self.expect_semicolon();
        self.arena.alloc(Stmt::Const { attributes, consts, span: self.span_from(start) })
    }

    fn parse_const_list(&mut self) -> &'ast [ClassConst<'ast>] {
        let mut consts = Vec::new();
        loop {
            let const_start = self.start();
            let name = self.member_ident();
            self.expect(TokenKind::Eq, "expected '='");
            let value = self.parse_expr(0);
            consts.push(ClassConst { name, value, span: self.span_from(const_start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.arena.alloc_slice_copy(&consts)
    }

    fn parse_namespace(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let name = if self.at(TokenKind::OpenBrace) { None } else { Some(self.parse_name()) };
        let body = if self.at(TokenKind::OpenBrace) {
            Some(self.parse_block_body())
        } else {
            self.expect_semicolon();
            None
        };
        self.arena.alloc(Stmt::Namespace { name, body, span: self.span_from(start) })
    }

    fn parse_use_kind(&mut self) -> Option<UseKind> {
        if self.eat(TokenKind::Function) {
            Some(UseKind::Function)
        } else if self.eat(TokenKind::Const) {
            Some(UseKind::Const)
        } else {
            None
        }
    }

    fn parse_use(&mut self) -> StmtId<'ast> {
        let start = self.start();
        self.bump();
        let kind = self.parse_use_kind().unwrap_or(UseKind::Normal);

        let mut prefix = None;
        let mut uses = Vec::new();
        loop {
            let item_start = self.start();
            let name = self.parse_name();
            if self.at(TokenKind::NsSeparator) && self.next_token.kind == TokenKind::OpenBrace {
                self.bump();
                self.bump();
                prefix = Some(name);
                while !self.at(TokenKind::CloseBrace) && !self.at(TokenKind::Eof) {
                    let inner_start = self.start();
                    let inner_kind = self.parse_use_kind().unwrap_or(kind);
                    let name = self.parse_name();
                    let alias = if self.eat(TokenKind::As) { Some(self.expect_ident()) } else { None };
                    uses.push(UseItem { name, alias, kind: inner_kind, span: self.span_from(inner_start) });
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::CloseBrace, "expected '}'");
                break;
            }
            let alias = if self.eat(TokenKind::As) { Some(self.expect_ident()) } else { None };
            uses.push(UseItem { name, alias, kind, span: self.span_from(item_start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_semicolon();

        self.arena.alloc(Stmt::Use {
            prefix,
            uses: self.arena.alloc_slice_copy(&uses),
            kind,
            span: self.span_from(start),
        })
    }

    fn parse_function(&mut self, attributes: &'ast [AttributeGroup<'ast>], start: usize) -> StmtId<'ast> {
        self.bump();
        let by_ref = self.at_ampersand();
        if by_ref {
            self.bump();
        }
        let name = self.expect_ident();
        let params = self.parse_parameter_list();
        let return_type = self.parse_return_type();
        let body = self.parse_block_body();
        self.arena.alloc(Stmt::Function { attributes, by_ref, name, params, return_type, body, span: self.span_from(start) })
    }

    pub(crate) fn parse_return_type(&mut self) -> Option<&'ast Type<'ast>> {
        if self.eat(TokenKind::Colon) { Some(self.arena.alloc(self.parse_type())) } else { None }
    }

    pub(crate) fn parse_parameter_list(&mut self) -> &'ast [Param<'ast>] {
        let mut params = Vec::new();
        if !self.expect(TokenKind::OpenParen, "expected '('") {
            return &[];
        }
        while !self.at(TokenKind::CloseParen) && !self.at(TokenKind::Eof) {
            params.push(self.parse_param());
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "expected ')'");
        self.arena.alloc_slice_copy(&params)
    }

    fn parse_param(&mut self) -> Param<'ast> {
        let start = self.start();
        let attributes = self.parse_attributes();
        let mut modifiers = Vec::new();
        while matches!(
            self.current_token.kind,
            TokenKind::Public | TokenKind::Protected | TokenKind::Private | TokenKind::Readonly
        ) {
            modifiers.push(self.current_token);
            self.bump();
        }

        let ty = if self.at(TokenKind::Variable) || self.at(TokenKind::Ellipsis) || self.at_ampersand() {
            None
        } else {
            Some(&*self.arena.alloc(self.parse_type()))
        };
        let by_ref = self.at_ampersand();
        if by_ref {
            self.bump();
        }
        let variadic = self.eat(TokenKind::Ellipsis);

        let name = if self.at(TokenKind::Variable) {
            let token = self.current_token;
            self.bump();
            Ident { value: self.alloc_str(&self.text(token)[1..]), span: token.span }
        } else {
            self.error("expected parameter variable");
            Ident { value: "", span: self.current_token.span }
        };
        let default = if self.eat(TokenKind::Eq) { Some(self.parse_expr(0)) } else { None };

        Param {
            attributes,
            modifiers: self.arena.alloc_slice_copy(&modifiers),
            ty,
            by_ref,
            variadic,
            name,
            default,
            span: self.span_from(start),
        }
    }

    fn parse_class_modifiers(&mut self) -> &'ast [Token] {
        let mut modifiers = Vec::new();
        while matches!(self.current_token.kind, TokenKind::Abstract | TokenKind::Final | TokenKind::Readonly) {
            modifiers.push(self.current_token);
            self.bump();
        }
        self.arena.alloc_slice_copy(&modifiers)
    }

    fn parse_class(&mut self, attributes: &'ast [AttributeGroup<'ast>], start: usize) -> StmtId<'ast> {
        let modifiers = self.parse_class_modifiers();
        self.expect(TokenKind::Class, "expected 'class'");
        let name = self.expect_ident();
        let extends = if self.eat(TokenKind::Extends) { Some(self.parse_name()) } else { None };
        let implements = if self.eat(TokenKind::Implements) { self.parse_name_list() } else { &[] };
        let members = self.parse_class_body(MemberOwner::Class);
        self.arena.alloc(Stmt::Class { attributes, modifiers, name, extends, implements, members, span: self.span_from(start) })
    }

    fn parse_interface(&mut self, attributes: &'ast [AttributeGroup<'ast>], start: usize) -> StmtId<'ast> {
        self.bump();
        let name = self.expect_ident();
        let extends = if self.eat(TokenKind::Extends) { self.parse_name_list() } else { &[] };
        let members = self.parse_class_body(MemberOwner::Interface);
        self.arena.alloc(Stmt::Interface { attributes, name, extends, members, span: self.span_from(start) })
    }

    fn parse_trait(&mut self, attributes: &'ast [AttributeGroup<'ast>], start: usize) -> StmtId<'ast> {
        self.bump();
        let name = self.expect_ident();
        let members = self.parse_class_body(MemberOwner::Trait);
        self.arena.alloc(Stmt::Trait { attributes, name, members, span: self.span_from(start) })
    }

    fn parse_enum(&mut self, attributes: &'ast [AttributeGroup<'ast>], start: usize) -> StmtId<'ast> {
        self.bump();
        let name = self.expect_ident();
        let backed_type = self.parse_return_type();
        let implements = if self.eat(TokenKind::Implements) { self.parse_name_list() } else { &[] };
        let members = self.parse_class_body(MemberOwner::Enum);
        self.arena.alloc(Stmt::Enum { attributes, name, backed_type, implements, members, span: self.span_from(start) })
    }

    fn parse_class_body(&mut self, owner: MemberOwner) -> &'ast [ClassMember<'ast>] {
        let mut members = Vec::new();
        if !self.expect(TokenKind::OpenBrace, "expected '{'") {
            return &[];
        }
        while !self.at(TokenKind::CloseBrace) && !self.at(TokenKind::Eof) {
            let before = self.pos;
            if let Some(member) = self.parse_class_member(&owner) {
                members.push(member);
            }
            if self.pos == before {
                self.error("unexpected token in class body");
                self.bump();
            }
        }
        self.expect(TokenKind::CloseBrace, "expected '}'");
        self.arena.alloc_slice_copy(&members)
    }

    fn parse_class_member(&mut self, owner: &MemberOwner) -> Option<ClassMember<'ast>> {
        let start = self.start();
        let attributes = self.parse_attributes();

        if self.at(TokenKind::Use) {
            self.bump();
            return Some(self.parse_trait_use(start));
        }

        if self.at(TokenKind::Case) {
            if !matches!(owner, MemberOwner::Enum) {
                self.error("enum cases are only allowed in enums");
            }
            self.bump();
            let name = self.member_ident();
            let value = if self.eat(TokenKind::Eq) { Some(self.parse_expr(0)) } else { None };
            self.expect_semicolon();
            return Some(ClassMember::Case { attributes, name, value, span: self.span_from(start) });
        }

        let mut modifiers = Vec::new();
        while matches!(
            self.current_token.kind,
            TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Readonly
                | TokenKind::Var
        ) {
            modifiers.push(self.current_token);
            self.bump();
        }
        let modifiers: &'ast [Token] = self.arena.alloc_slice_copy(&modifiers);

        if self.at(TokenKind::Const) {
            self.bump();
            let ty = if self.next_token.kind == TokenKind::Eq {
                None
            } else {
                Some(&*self.arena.alloc(self.parse_type()))
            };
            let consts = self.parse_const_list();
            self.expect_semicolon();
            return Some(ClassMember::Const { attributes, modifiers, ty, consts, span: self.span_from(start) });
        }

        if self.at(TokenKind::Function) {
            self.bump();
            let by_ref = self.at_ampersand();
            if by_ref {
                self.bump();
            }
            let name = self.member_ident();
            let params = self.parse_parameter_list();
            let return_type = self.parse_return_type();
            let body = if self.at(TokenKind::OpenBrace) {
                if matches!(owner, MemberOwner::Interface) {
                    self.error("interface methods cannot have a body");
                }
                Some(self.parse_block_body())
            } else {
                self.expect_semicolon();
                None
            };
            return Some(ClassMember::Method {
                attributes,
                modifiers,
                by_ref,
                name,
                params,
                return_type,
                body,
                span: self.span_from(start),
            });
        }

        if modifiers.is_empty() && attributes.is_empty() && !self.at(TokenKind::Variable) {
            return None;
        }

        let ty = if self.at(TokenKind::Variable) { None } else { Some(&*self.arena.alloc(self.parse_type())) };
        let mut entries = Vec::new();
        loop {
            let entry_start = self.start();
            if !self.at(TokenKind::Variable) {
                self.error("expected property name");
                break;
            }
            let token = self.current_token;
            self.bump();
            let name = Ident { value: self.alloc_str(&self.text(token)[1..]), span: token.span };
            let default = if self.eat(TokenKind::Eq) { Some(self.parse_expr(0)) } else { None };
            entries.push(PropertyEntry { name, default, span: self.span_from(entry_start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if self.at(TokenKind::OpenBrace) {
            // TODO: model property hooks instead of skipping them.
            self.skip_balanced_braces();
        } else {
            self.expect_semicolon();
        }

        Some(ClassMember::Property {
            attributes,
            modifiers,
            ty,
            entries: self.arena.alloc_slice_copy(&entries),
            span: self.span_from(start),
        })
    }

    fn skip_balanced_braces(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current_token.kind {
                TokenKind::OpenBrace | TokenKind::CurlyOpen | TokenKind::DollarOpenCurlyBraces => depth += 1,
                TokenKind::CloseBrace => depth = depth.saturating_sub(1),
                TokenKind::Eof => return,
                _ => {}
            }
            self.bump();
            if depth == 0 {
                return;
            }
        }
    }

    fn parse_trait_use(&mut self, start: usize) -> ClassMember<'ast> {
        let traits = self.parse_name_list();
        let mut adaptations = Vec::new();
        if self.eat(TokenKind::OpenBrace) {
            while !self.at(TokenKind::CloseBrace) && !self.at(TokenKind::Eof) {
                let before = self.pos;
                let adaptation_start = self.start();
                let method = self.parse_trait_method_ref();
                if self.eat(TokenKind::Insteadof) {
                    let insteadof = self.parse_name_list();
                    adaptations.push(TraitAdaptation::Precedence { method, insteadof, span: self.span_from(adaptation_start) });
                } else if self.expect(TokenKind::As, "expected 'as' or 'insteadof'") {
                    let visibility = if matches!(
                        self.current_token.kind,
                        TokenKind::Public | TokenKind::Protected | TokenKind::Private
                    ) {
                        let token = self.current_token;
                        self.bump();
                        Some(token)
                    } else {
                        None
                    };
                    let alias = if self.at(TokenKind::SemiColon) { None } else { Some(self.member_ident()) };
                    adaptations.push(TraitAdaptation::Alias { method, visibility, alias, span: self.span_from(adaptation_start) });
                }
                self.expect_semicolon();
                if self.pos == before {
                    self.bump();
                }
            }
            self.expect(TokenKind::CloseBrace, "expected '}'");
        } else {
            self.expect_semicolon();
        }
        ClassMember::TraitUse { traits, adaptations: self.arena.alloc_slice_copy(&adaptations), span: self.span_from(start) }
    }

    fn parse_trait_method_ref(&mut self) -> TraitMethodRef<'ast> {
        let start = self.start();
        let qualified = matches!(self.next_token.kind, TokenKind::DoubleColon | TokenKind::NsSeparator)
            || self.at(TokenKind::NsSeparator);
        let trait_name = if qualified {
            let name = self.parse_name();
            self.expect(TokenKind::DoubleColon, "expected '::'");
            Some(name)
        } else {
            None
        };
        let method = self.member_ident();
        TraitMethodRef { trait_name, method, span: self.span_from(start) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn program_errors(code: &str) -> Vec<&'static str> {
        let arena = Bump::new();
        let tokens = tokenize(code);
        let mut parser = Parser::new(&tokens, &arena);
        let program = parser.parse_program();
        program.errors.iter().map(|e| e.message).collect()
    }

    #[test]
    fn alternative_if_chain_nests_elseif() {
        let arena = Bump::new();
        let tokens = tokenize("<?php if ($a): echo 1; elseif ($b): echo 2; else: echo 3; endif;");
        let mut parser = Parser::new(&tokens, &arena);
        let program = parser.parse_program();
        assert!(program.errors.is_empty());
        let Stmt::If { else_block: Some(else_block), span, .. } = program.statements[1] else {
            panic!("expected if");
        };
        assert_eq!(span.end, tokens.source().len());
        assert!(matches!(else_block[0], Stmt::If { else_block: Some(_), .. }));
    }

    #[test]
    fn group_use_keeps_prefix() {
        let arena = Bump::new();
        let tokens = tokenize("<?php use App\\{Foo, function bar as baz};");
        let mut parser = Parser::new(&tokens, &arena);
        let program = parser.parse_program();
        let Stmt::Use { prefix: Some(prefix), uses, .. } = program.statements[1] else {
            panic!("expected group use");
        };
        assert_eq!(prefix.joined(), "App");
        assert_eq!(uses[1].kind, UseKind::Function);
        assert_eq!(uses[1].local_name(), "baz");
        assert_eq!(uses[1].full_name(Some(prefix)), "App\\bar");
    }

    #[test]
    fn missing_semicolon_is_reported_once() {
        assert_eq!(program_errors("<?php $a = 1 $b = 2;"), vec!["expected ';'"]);
    }

    #[test]
    fn strict_parse_reports_position() {
        let arena = Bump::new();
        let tokens = tokenize("<?php\nfunction (");
        let error = parse(&tokens, Rule::CompilationUnit, &arena).unwrap_err();
        assert_eq!(error.line, 2);
        assert!(!error.expected.is_empty());
    }

    #[test]
    fn break_level_must_be_literal() {
        assert_eq!(
            program_errors("<?php while (1) { break $a; }"),
            vec!["loop level must be an integer literal"]
        );
    }
}
