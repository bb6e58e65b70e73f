use crate::ast::{
    Arg, ArrayItem, AssignOp, AttributeGroup, BinaryOp, CastKind, ClosureUse, Expr, ExprId, IncludeKind,
    MagicConstKind, MatchArm, Name, NameKind, StringKind, UnaryOp,
};
use crate::lexer::token::TokenKind;
use crate::parser::{MemberOwner, Parser};
use crate::span::Span;

const ASSIGN_LBP: u8 = 205;
const ASSIGN_RBP: u8 = 35;
const TERNARY_BP: u8 = 40;
const NOT_BP: u8 = 160;
const INSTANCEOF_BP: u8 = 170;
const UNARY_BP: u8 = 180;
const NEW_BP: u8 = 200;
const POSTFIX_BP: u8 = 210;
/// Operand power of `print`, `yield` and `include`, below assignment.
const LOOSE_PREFIX_BP: u8 = 32;

fn infix_binding_power(kind: TokenKind) -> Option<(BinaryOp, u8, u8)> {
    use TokenKind::*;
    let entry = match kind {
        LogicalOr => (BinaryOp::LogicalOr, 10, 11),
        LogicalXor => (BinaryOp::LogicalXor, 20, 21),
        LogicalAnd => (BinaryOp::LogicalAnd, 30, 31),
        Coalesce => (BinaryOp::Coalesce, 51, 50),
        PipePipe => (BinaryOp::Or, 60, 61),
        AmpersandAmpersand => (BinaryOp::And, 70, 71),
        Pipe => (BinaryOp::BitOr, 80, 81),
        Caret => (BinaryOp::BitXor, 90, 91),
        AmpersandFollowedByVarOrVararg | AmpersandNotFollowedByVarOrVararg => (BinaryOp::BitAnd, 100, 101),
        EqEq => (BinaryOp::EqEq, 110, 111),
        BangEq => (BinaryOp::NotEq, 110, 111),
        EqEqEq => (BinaryOp::EqEqEq, 110, 111),
        BangEqEq => (BinaryOp::NotEqEq, 110, 111),
        Spaceship => (BinaryOp::Spaceship, 110, 111),
        Lt => (BinaryOp::Lt, 120, 121),
        LtEq => (BinaryOp::LtEq, 120, 121),
        Gt => (BinaryOp::Gt, 120, 121),
        GtEq => (BinaryOp::GtEq, 120, 121),
        Dot => (BinaryOp::Concat, 125, 126),
        Sl => (BinaryOp::ShiftLeft, 130, 131),
        Sr => (BinaryOp::ShiftRight, 130, 131),
        Plus => (BinaryOp::Plus, 140, 141),
        Minus => (BinaryOp::Minus, 140, 141),
        Asterisk => (BinaryOp::Mul, 150, 151),
        Slash => (BinaryOp::Div, 150, 151),
        Percent => (BinaryOp::Mod, 150, 151),
        Pow => (BinaryOp::Pow, 191, 190),
        _ => return None,
    };
    Some(entry)
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    use TokenKind::*;
    let op = match kind {
        PlusEq => AssignOp::Plus,
        MinusEq => AssignOp::Minus,
        MulEq => AssignOp::Mul,
        DivEq => AssignOp::Div,
        ModEq => AssignOp::Mod,
        ConcatEq => AssignOp::Concat,
        PowEq => AssignOp::Pow,
        AndEq => AssignOp::BitAnd,
        OrEq => AssignOp::BitOr,
        XorEq => AssignOp::BitXor,
        SlEq => AssignOp::ShiftLeft,
        SrEq => AssignOp::ShiftRight,
        CoalesceEq => AssignOp::Coalesce,
        _ => return None,
    };
    Some(op)
}

fn cast_kind(kind: TokenKind) -> Option<CastKind> {
    let cast = match kind {
        TokenKind::IntCast => CastKind::Int,
        TokenKind::BoolCast => CastKind::Bool,
        TokenKind::FloatCast => CastKind::Float,
        TokenKind::StringCast => CastKind::String,
        TokenKind::ArrayCast => CastKind::Array,
        TokenKind::ObjectCast => CastKind::Object,
        TokenKind::UnsetCast => CastKind::Unset,
        _ => return None,
    };
    Some(cast)
}

fn magic_const_kind(kind: TokenKind) -> Option<MagicConstKind> {
    let magic = match kind {
        TokenKind::Line => MagicConstKind::Line,
        TokenKind::File => MagicConstKind::File,
        TokenKind::Dir => MagicConstKind::Dir,
        TokenKind::ClassC => MagicConstKind::Class,
        TokenKind::TraitC => MagicConstKind::Trait,
        TokenKind::MethodC => MagicConstKind::Method,
        TokenKind::FuncC => MagicConstKind::Function,
        TokenKind::NsC => MagicConstKind::Namespace,
        _ => return None,
    };
    Some(magic)
}

/// Tokens an expression never starts with; a missing operand is reported
/// without consuming them.
fn closes_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::SemiColon
            | TokenKind::Comma
            | TokenKind::CloseParen
            | TokenKind::CloseBracket
            | TokenKind::CloseBrace
            | TokenKind::OpenBrace
            | TokenKind::Colon
            | TokenKind::DoubleArrow
            | TokenKind::CloseTag
            | TokenKind::Eof
    )
}

impl<'src, 'ast> Parser<'src, 'ast> {
    pub(crate) fn parse_expr(&mut self, min_bp: u8) -> ExprId<'ast> {
        let start = self.start();
        let mut left = self.parse_nud();

        loop {
            let kind = self.current_token.kind;

            if POSTFIX_BP >= min_bp {
                match kind {
                    TokenKind::OpenBracket
                    | TokenKind::Arrow
                    | TokenKind::NullSafeArrow
                    | TokenKind::DoubleColon
                    | TokenKind::OpenParen => {
                        left = self.parse_postfix(left, start);
                        continue;
                    }
                    TokenKind::Inc | TokenKind::Dec => {
                        self.bump();
                        let span = self.span_from(start);
                        left = if kind == TokenKind::Inc {
                            self.arena.alloc(Expr::PostInc { var: left, span })
                        } else {
                            self.arena.alloc(Expr::PostDec { var: left, span })
                        };
                        continue;
                    }
                    _ => {}
                }
            }

            // Assignment binds to the variable on its left whatever the
            // surrounding precedence, so `!$a = f()` is `!($a = f())`.
            if ASSIGN_LBP >= min_bp && left.is_assignable() {
                if kind == TokenKind::Eq {
                    self.bump();
                    if self.at_ampersand() {
                        self.bump();
                        let expr = self.parse_expr(ASSIGN_RBP);
                        left = self.arena.alloc(Expr::AssignRef { var: left, expr, span: self.span_from(start) });
                    } else {
                        let expr = self.parse_expr(ASSIGN_RBP);
                        left = self.arena.alloc(Expr::Assign { var: left, expr, span: self.span_from(start) });
                    }
                    continue;
                }
                if let Some(op) = assign_op(kind) {
                    self.bump();
                    let expr = self.parse_expr(ASSIGN_RBP);
                    left = self.arena.alloc(Expr::AssignOp { var: left, op, expr, span: self.span_from(start) });
                    continue;
                }
            }

            if kind == TokenKind::Question && TERNARY_BP >= min_bp {
                self.bump();
                let if_true = if self.eat(TokenKind::Colon) {
                    None
                } else {
                    let if_true = self.parse_expr(0);
                    self.expect(TokenKind::Colon, "expected ':'");
                    Some(if_true)
                };
                let if_false = self.parse_expr(TERNARY_BP + 1);
                left = self.arena.alloc(Expr::Ternary { condition: left, if_true, if_false, span: self.span_from(start) });
                continue;
            }

            if kind == TokenKind::InstanceOf && INSTANCEOF_BP >= min_bp {
                self.bump();
                let class = self.parse_class_reference();
                left = self.arena.alloc(Expr::InstanceOf { expr: left, class, span: self.span_from(start) });
                continue;
            }

            if let Some((op, lbp, rbp)) = infix_binding_power(kind) {
                if lbp < min_bp {
                    break;
                }
                self.bump();
                let right = self.parse_expr(rbp);
                left = self.arena.alloc(Expr::Binary { left, op, right, span: self.span_from(start) });
                continue;
            }

            break;
        }

        left
    }

    fn parse_postfix(&mut self, left: ExprId<'ast>, start: usize) -> ExprId<'ast> {
        match self.current_token.kind {
            TokenKind::OpenBracket => {
                self.bump();
                let dim = if self.at(TokenKind::CloseBracket) { None } else { Some(self.parse_expr(0)) };
                self.expect(TokenKind::CloseBracket, "expected ']'");
                self.arena.alloc(Expr::ArrayDimFetch { array: left, dim, span: self.span_from(start) })
            }
            TokenKind::Arrow | TokenKind::NullSafeArrow => {
                let nullsafe = self.at(TokenKind::NullSafeArrow);
                self.bump();
                let member = self.parse_member_name();
                if self.at(TokenKind::OpenParen) {
                    let args = self.parse_call_arguments();
                    self.arena.alloc(Expr::MethodCall { target: left, method: member, args, nullsafe, span: self.span_from(start) })
                } else {
                    self.arena.alloc(Expr::PropertyFetch { target: left, property: member, nullsafe, span: self.span_from(start) })
                }
            }
            TokenKind::DoubleColon => {
                self.bump();
                match self.current_token.kind {
                    TokenKind::Variable | TokenKind::Dollar => {
                        let property = self.parse_simple_variable();
                        if self.at(TokenKind::OpenParen) {
                            let args = self.parse_call_arguments();
                            self.arena.alloc(Expr::StaticCall { class: left, method: property, args, span: self.span_from(start) })
                        } else {
                            self.arena.alloc(Expr::StaticPropertyFetch { class: left, property, span: self.span_from(start) })
                        }
                    }
                    TokenKind::OpenBrace => {
                        self.bump();
                        let method = self.parse_expr(0);
                        self.expect(TokenKind::CloseBrace, "expected '}'");
                        let args = self.parse_call_arguments();
                        self.arena.alloc(Expr::StaticCall { class: left, method, args, span: self.span_from(start) })
                    }
                    _ => {
                        let ident = self.member_ident();
                        let member = self.arena.alloc(Expr::Identifier { name: ident.value, span: ident.span });
                        if self.at(TokenKind::OpenParen) {
                            let args = self.parse_call_arguments();
                            self.arena.alloc(Expr::StaticCall { class: left, method: member, args, span: self.span_from(start) })
                        } else {
                            self.arena.alloc(Expr::ClassConstFetch { class: left, constant: member, span: self.span_from(start) })
                        }
                    }
                }
            }
            _ => {
                let args = self.parse_call_arguments();
                self.arena.alloc(Expr::Call { func: left, args, span: self.span_from(start) })
            }
        }
    }

    /// Member after `->`: a name, a variable or `{expr}`.
    fn parse_member_name(&mut self) -> ExprId<'ast> {
        match self.current_token.kind {
            TokenKind::Variable | TokenKind::Dollar => self.parse_simple_variable(),
            TokenKind::OpenBrace => {
                self.bump();
                let expr = self.parse_expr(0);
                self.expect(TokenKind::CloseBrace, "expected '}'");
                expr
            }
            _ => {
                let ident = self.member_ident();
                self.arena.alloc(Expr::Identifier { name: ident.value, span: ident.span })
            }
        }
    }

    /// `$a`, `$$a` or `${expr}` without any trailing access.
    pub(crate) fn parse_simple_variable(&mut self) -> ExprId<'ast> {
        let token = self.current_token;
        match token.kind {
            TokenKind::Variable => {
                self.bump();
                let name = self.alloc_str(&self.text(token)[1..]);
                self.arena.alloc(Expr::Variable { name, span: token.span })
            }
            TokenKind::Dollar => {
                let start = self.start();
                self.bump();
                let name = if self.eat(TokenKind::OpenBrace) {
                    let expr = self.parse_expr(0);
                    self.expect(TokenKind::CloseBrace, "expected '}'");
                    expr
                } else {
                    self.parse_simple_variable()
                };
                self.arena.alloc(Expr::IndirectVariable { name, span: self.span_from(start) })
            }
            _ => {
                self.error("expected variable");
                self.arena.alloc(Expr::Error { span: token.span })
            }
        }
    }

    fn parse_nud(&mut self) -> ExprId<'ast> {
        let token = self.current_token;
        let start = token.span.start;

        if let Some(kind) = cast_kind(token.kind) {
            self.bump();
            let expr = self.parse_expr(UNARY_BP);
            return self.arena.alloc(Expr::Cast { kind, expr, span: self.span_from(start) });
        }
        if let Some(kind) = magic_const_kind(token.kind) {
            self.bump();
            return self.arena.alloc(Expr::MagicConst { kind, span: token.span });
        }

        match token.kind {
            TokenKind::Variable | TokenKind::Dollar => self.parse_simple_variable(),
            TokenKind::LNumber => {
                self.bump();
                self.arena.alloc(Expr::Integer { value: self.alloc_str(self.text(token)), span: token.span })
            }
            TokenKind::DNumber => {
                self.bump();
                self.arena.alloc(Expr::Float { value: self.alloc_str(self.text(token)), span: token.span })
            }
            TokenKind::StringLiteral => {
                self.bump();
                self.arena.alloc(Expr::String { value: self.alloc_str(self.text(token)), span: token.span })
            }
            TokenKind::DoubleQuote => self.parse_interpolated(StringKind::DoubleQuoted, TokenKind::DoubleQuote),
            TokenKind::Backtick => self.parse_interpolated(StringKind::ShellExec, TokenKind::Backtick),
            TokenKind::StartHeredoc => {
                let kind = if self.text(token).contains('\'') { StringKind::Nowdoc } else { StringKind::Heredoc };
                self.parse_interpolated(kind, TokenKind::EndHeredoc)
            }
            TokenKind::TypeTrue | TokenKind::TypeFalse => {
                self.bump();
                self.arena.alloc(Expr::Boolean { value: token.kind == TokenKind::TypeTrue, span: token.span })
            }
            TokenKind::TypeNull => {
                self.bump();
                self.arena.alloc(Expr::Null { span: token.span })
            }
            TokenKind::Static if matches!(self.next_token.kind, TokenKind::Function | TokenKind::Fn) => {
                self.bump();
                self.parse_closure_like(&[], true, start)
            }
            TokenKind::Function | TokenKind::Fn => self.parse_closure_like(&[], false, start),
            TokenKind::Attribute => {
                let attributes = self.parse_attributes();
                let is_static = self.eat(TokenKind::Static);
                if matches!(self.current_token.kind, TokenKind::Function | TokenKind::Fn) {
                    self.parse_closure_like(attributes, is_static, start)
                } else {
                    self.error("expected closure after attributes");
                    self.arena.alloc(Expr::Error { span: self.span_from(start) })
                }
            }
            TokenKind::Static => {
                let ident = self.ident();
                self.name_expr(Name {
                    kind: NameKind::Unqualified,
                    parts: self.arena.alloc_slice_copy(&[ident]),
                    span: ident.span,
                })
            }
            TokenKind::Identifier | TokenKind::NsSeparator => {
                let name = self.parse_name();
                self.name_expr(name)
            }
            TokenKind::Namespace if self.next_token.kind == TokenKind::NsSeparator => {
                let name = self.parse_name();
                self.name_expr(name)
            }
            kind if kind.is_type_keyword() => {
                let name = self.parse_name();
                self.name_expr(name)
            }
            TokenKind::OpenParen => {
                self.bump();
                let expr = self.parse_expr(0);
                self.expect(TokenKind::CloseParen, "expected ')'");
                expr
            }
            TokenKind::OpenBracket => {
                self.bump();
                let items = self.parse_array_items(TokenKind::CloseBracket);
                self.arena.alloc(Expr::Array { items, short: true, span: self.span_from(start) })
            }
            TokenKind::Array if self.next_token.kind == TokenKind::OpenParen => {
                self.bump();
                self.bump();
                let items = self.parse_array_items(TokenKind::CloseParen);
                self.arena.alloc(Expr::Array { items, short: false, span: self.span_from(start) })
            }
            TokenKind::List => {
                self.bump();
                self.expect(TokenKind::OpenParen, "expected '('");
                let items = self.parse_array_items(TokenKind::CloseParen);
                self.arena.alloc(Expr::List { items, span: self.span_from(start) })
            }
            TokenKind::Plus | TokenKind::Minus | TokenKind::Bang | TokenKind::BitNot | TokenKind::At => {
                self.bump();
                let (op, bp) = match token.kind {
                    TokenKind::Plus => (UnaryOp::Plus, UNARY_BP),
                    TokenKind::Minus => (UnaryOp::Minus, UNARY_BP),
                    TokenKind::Bang => (UnaryOp::Not, NOT_BP),
                    TokenKind::BitNot => (UnaryOp::BitNot, UNARY_BP),
                    _ => (UnaryOp::Silence, UNARY_BP),
                };
                let expr = self.parse_expr(bp);
                self.arena.alloc(Expr::Unary { op, expr, span: self.span_from(start) })
            }
            TokenKind::Inc | TokenKind::Dec => {
                self.bump();
                let var = self.parse_expr(UNARY_BP);
                let span = self.span_from(start);
                if token.kind == TokenKind::Inc {
                    self.arena.alloc(Expr::PreInc { var, span })
                } else {
                    self.arena.alloc(Expr::PreDec { var, span })
                }
            }
            TokenKind::New => self.parse_new(),
            TokenKind::Clone => {
                self.bump();
                let expr = self.parse_expr(NEW_BP);
                self.arena.alloc(Expr::Clone { expr, span: self.span_from(start) })
            }
            TokenKind::Print => {
                self.bump();
                let expr = self.parse_expr(LOOSE_PREFIX_BP);
                self.arena.alloc(Expr::Print { expr, span: self.span_from(start) })
            }
            TokenKind::Yield => {
                self.bump();
                if closes_expression(self.current_token.kind) {
                    return self.arena.alloc(Expr::Yield { key: None, value: None, span: self.span_from(start) });
                }
                let first = self.parse_expr(LOOSE_PREFIX_BP);
                let (key, value) = if self.eat(TokenKind::DoubleArrow) {
                    (Some(first), self.parse_expr(LOOSE_PREFIX_BP))
                } else {
                    (None, first)
                };
                self.arena.alloc(Expr::Yield { key, value: Some(value), span: self.span_from(start) })
            }
            TokenKind::YieldFrom => {
                self.bump();
                let expr = self.parse_expr(LOOSE_PREFIX_BP);
                self.arena.alloc(Expr::YieldFrom { expr, span: self.span_from(start) })
            }
            TokenKind::Throw => {
                self.bump();
                let expr = self.parse_expr(0);
                self.arena.alloc(Expr::Throw { expr, span: self.span_from(start) })
            }
            TokenKind::Include | TokenKind::IncludeOnce | TokenKind::Require | TokenKind::RequireOnce => {
                self.bump();
                let kind = match token.kind {
                    TokenKind::Include => IncludeKind::Include,
                    TokenKind::IncludeOnce => IncludeKind::IncludeOnce,
                    TokenKind::Require => IncludeKind::Require,
                    _ => IncludeKind::RequireOnce,
                };
                let expr = self.parse_expr(LOOSE_PREFIX_BP);
                self.arena.alloc(Expr::Include { kind, expr, span: self.span_from(start) })
            }
            TokenKind::Eval | TokenKind::Empty => {
                self.bump();
                self.expect(TokenKind::OpenParen, "expected '('");
                let expr = self.parse_expr(0);
                self.expect(TokenKind::CloseParen, "expected ')'");
                let span = self.span_from(start);
                if token.kind == TokenKind::Eval {
                    self.arena.alloc(Expr::Eval { expr, span })
                } else {
                    self.arena.alloc(Expr::Empty { expr, span })
                }
            }
            TokenKind::Isset => {
                self.bump();
                self.expect(TokenKind::OpenParen, "expected '('");
                let vars = self.parse_expr_list_until(TokenKind::CloseParen);
                self.eat(TokenKind::Comma);
                self.expect(TokenKind::CloseParen, "expected ')'");
                self.arena.alloc(Expr::Isset { vars, span: self.span_from(start) })
            }
            TokenKind::Exit => {
                self.bump();
                let expr = if self.eat(TokenKind::OpenParen) {
                    let expr = if self.at(TokenKind::CloseParen) { None } else { Some(self.parse_expr(0)) };
                    self.expect(TokenKind::CloseParen, "expected ')'");
                    expr
                } else {
                    None
                };
                self.arena.alloc(Expr::Exit { expr, span: self.span_from(start) })
            }
            TokenKind::Match => self.parse_match(),
            _ => {
                self.error("expected expression");
                if !closes_expression(token.kind) {
                    self.bump();
                }
                self.arena.alloc(Expr::Error { span: token.span })
            }
        }
    }

    fn name_expr(&mut self, name: Name<'ast>) -> ExprId<'ast> {
        self.arena.alloc(Expr::Name { name, span: name.span })
    }

    /// Class operand of `new` and `instanceof`.
    fn parse_class_reference(&mut self) -> ExprId<'ast> {
        let start = self.start();
        match self.current_token.kind {
            TokenKind::Variable | TokenKind::Dollar => {
                let mut expr = self.parse_simple_variable();
                loop {
                    match self.current_token.kind {
                        TokenKind::OpenBracket => {
                            self.bump();
                            let dim = if self.at(TokenKind::CloseBracket) { None } else { Some(self.parse_expr(0)) };
                            self.expect(TokenKind::CloseBracket, "expected ']'");
                            expr = self.arena.alloc(Expr::ArrayDimFetch { array: expr, dim, span: self.span_from(start) });
                        }
                        TokenKind::Arrow | TokenKind::NullSafeArrow => {
                            let nullsafe = self.at(TokenKind::NullSafeArrow);
                            self.bump();
                            let property = self.parse_member_name();
                            expr = self.arena.alloc(Expr::PropertyFetch { target: expr, property, nullsafe, span: self.span_from(start) });
                        }
                        TokenKind::DoubleColon if matches!(self.next_token.kind, TokenKind::Variable | TokenKind::Dollar) => {
                            self.bump();
                            let property = self.parse_simple_variable();
                            expr = self.arena.alloc(Expr::StaticPropertyFetch { class: expr, property, span: self.span_from(start) });
                        }
                        _ => return expr,
                    }
                }
            }
            TokenKind::OpenParen => {
                self.bump();
                let expr = self.parse_expr(0);
                self.expect(TokenKind::CloseParen, "expected ')'");
                expr
            }
            TokenKind::Static => {
                let ident = self.ident();
                self.name_expr(Name { kind: NameKind::Unqualified, parts: self.arena.alloc_slice_copy(&[ident]), span: ident.span })
            }
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace => {
                let name = self.parse_name();
                self.name_expr(name)
            }
            _ => {
                self.error("expected class name");
                self.arena.alloc(Expr::Error { span: self.current_token.span })
            }
        }
    }

    fn parse_new(&mut self) -> ExprId<'ast> {
        let start = self.start();
        self.bump();

        if self.at(TokenKind::Class) || self.at(TokenKind::Attribute) || self.at(TokenKind::Readonly) {
            let class_start = self.start();
            let attributes = self.parse_attributes();
            self.eat(TokenKind::Readonly);
            self.expect(TokenKind::Class, "expected 'class'");
            let args = if self.at(TokenKind::OpenParen) { self.parse_call_arguments() } else { &[] };
            let extends = if self.eat(TokenKind::Extends) { Some(self.parse_name()) } else { None };
            let implements = if self.eat(TokenKind::Implements) { self.parse_name_list() } else { &[] };
            let members = self.parse_class_body(MemberOwner::Class);
            let class = self.arena.alloc(Expr::AnonymousClass {
                attributes,
                args,
                extends,
                implements,
                members,
                span: self.span_from(class_start),
            });
            return self.arena.alloc(Expr::New { class, args: &[], span: self.span_from(start) });
        }

        let class = self.parse_class_reference();
        let args = if self.at(TokenKind::OpenParen) { self.parse_call_arguments() } else { &[] };
        self.arena.alloc(Expr::New { class, args, span: self.span_from(start) })
    }

    /// `(args)`, with named arguments, unpacking and the `(...)` placeholder.
    pub(super) fn parse_call_arguments(&mut self) -> &'ast [Arg<'ast>] {
        if !self.expect(TokenKind::OpenParen, "expected '('") {
            return &[];
        }

        let mut args = Vec::new();
        if self.at(TokenKind::Ellipsis) && self.next_token.kind == TokenKind::CloseParen {
            let span = self.current_token.span;
            self.bump();
            let value = self.arena.alloc(Expr::VariadicPlaceholder { span });
            args.push(Arg { name: None, value, unpack: false, span });
        }

        while !self.at(TokenKind::CloseParen) && !self.at(TokenKind::Eof) {
            let start = self.start();
            let name = if (self.at(TokenKind::Identifier) || self.current_token.kind.is_semi_reserved())
                && self.next_token.kind == TokenKind::Colon
            {
                let name = self.ident();
                self.bump();
                Some(name)
            } else {
                None
            };
            let unpack = self.eat(TokenKind::Ellipsis);
            let value = self.parse_expr(0);
            args.push(Arg { name, value, unpack, span: self.span_from(start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "expected ')'");
        self.arena.alloc_slice_copy(&args)
    }

    /// Items up to `close`, which is consumed. Empty slots of a destructuring
    /// list are skipped.
    fn parse_array_items(&mut self, close: TokenKind) -> &'ast [ArrayItem<'ast>] {
        let mut items = Vec::new();
        while !self.at(close) && !self.at(TokenKind::Eof) {
            if self.eat(TokenKind::Comma) {
                continue;
            }
            let start = self.start();
            let mut key = None;
            let mut by_ref = false;
            let unpack = self.eat(TokenKind::Ellipsis);
            if self.at_ampersand() {
                self.bump();
                by_ref = true;
            }
            let mut value = self.parse_expr(0);
            if !unpack && !by_ref && self.eat(TokenKind::DoubleArrow) {
                key = Some(value);
                if self.at_ampersand() {
                    self.bump();
                    by_ref = true;
                }
                value = self.parse_expr(0);
            }
            items.push(ArrayItem { key, value, by_ref, unpack, span: self.span_from(start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, "expected end of array");
        self.arena.alloc_slice_copy(&items)
    }

    /// Closures and arrow functions, from the `function` or `fn` keyword.
    fn parse_closure_like(
        &mut self,
        attributes: &'ast [AttributeGroup<'ast>],
        is_static: bool,
        start: usize,
    ) -> ExprId<'ast> {
        let is_arrow = self.at(TokenKind::Fn);
        self.bump();
        let by_ref = self.at_ampersand();
        if by_ref {
            self.bump();
        }
        let params = self.parse_parameter_list();

        if is_arrow {
            let return_type = self.parse_return_type();
            self.expect(TokenKind::DoubleArrow, "expected '=>'");
            let expr = self.parse_expr(0);
            return self.arena.alloc(Expr::ArrowFunction {
                attributes,
                is_static,
                by_ref,
                params,
                return_type,
                expr,
                span: self.span_from(start),
            });
        }

        let mut uses = Vec::new();
        if self.eat(TokenKind::Use) {
            self.expect(TokenKind::OpenParen, "expected '('");
            while !self.at(TokenKind::CloseParen) && !self.at(TokenKind::Eof) {
                let use_start = self.start();
                let by_ref = self.at_ampersand();
                if by_ref {
                    self.bump();
                }
                if !self.at(TokenKind::Variable) {
                    self.error("expected variable");
                    break;
                }
                let var = self.parse_simple_variable();
                uses.push(ClosureUse { var, by_ref, span: self.span_from(use_start) });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::CloseParen, "expected ')'");
        }
        let return_type = self.parse_return_type();
        let body = self.parse_block_body();

        self.arena.alloc(Expr::Closure {
            attributes,
            is_static,
            by_ref,
            params,
            uses: self.arena.alloc_slice_copy(&uses),
            return_type,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_match(&mut self) -> ExprId<'ast> {
        let start = self.start();
        self.bump();
        let condition = self.parse_condition();
        self.expect(TokenKind::OpenBrace, "expected '{'");

        let mut arms = Vec::new();
        while !self.at(TokenKind::CloseBrace) && !self.at(TokenKind::Eof) {
            let arm_start = self.start();
            let conditions = if self.at(TokenKind::Default)
                && matches!(self.next_token.kind, TokenKind::DoubleArrow | TokenKind::Comma)
            {
                self.bump();
                self.eat(TokenKind::Comma);
                None
            } else {
                let mut conditions = Vec::new();
                while !self.at(TokenKind::DoubleArrow) && !self.at(TokenKind::Eof) {
                    conditions.push(self.parse_expr(0));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let conditions: &'ast [ExprId<'ast>] = self.arena.alloc_slice_copy(&conditions);
                Some(conditions)
            };
            self.expect(TokenKind::DoubleArrow, "expected '=>'");
            let body = self.parse_expr(0);
            arms.push(MatchArm { conditions, body, span: self.span_from(arm_start) });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseBrace, "expected '}'");

        self.arena.alloc(Expr::Match { condition, arms: self.arena.alloc_slice_copy(&arms), span: self.span_from(start) })
    }

    /// Double-quoted strings, backticks and heredocs, up to `close`.
    fn parse_interpolated(&mut self, kind: StringKind, close: TokenKind) -> ExprId<'ast> {
        let start = self.start();
        self.bump();

        let mut parts: Vec<ExprId<'ast>> = Vec::new();
        while !self.at(close) && !self.at(TokenKind::Eof) {
            let token = self.current_token;
            match token.kind {
                TokenKind::EncapsedAndWhitespace => {
                    self.bump();
                    parts.push(self.arena.alloc(Expr::EncapsedPart { value: self.alloc_str(self.text(token)), span: token.span }));
                }
                TokenKind::Variable => parts.push(self.parse_string_variable()),
                TokenKind::CurlyOpen => {
                    self.bump();
                    parts.push(self.parse_expr(0));
                    self.expect(TokenKind::CloseBrace, "expected '}'");
                }
                TokenKind::DollarOpenCurlyBraces => parts.push(self.parse_dollar_brace()),
                _ => {
                    self.error("unexpected token in string");
                    self.bump();
                }
            }
        }
        self.expect(close, "unterminated string");

        self.arena.alloc(Expr::InterpolatedString {
            kind,
            parts: self.arena.alloc_slice_copy(&parts),
            span: self.span_from(start),
        })
    }

    /// `$a`, `$a[0]`, `$a[key]`, `$a[$i]` or `$a->b` inside a string.
    fn parse_string_variable(&mut self) -> ExprId<'ast> {
        let start = self.start();
        let var = self.parse_simple_variable();
        if self.eat(TokenKind::OpenBracket) {
            let token = self.current_token;
            let dim: ExprId<'ast> = match token.kind {
                TokenKind::Minus if self.next_token.kind == TokenKind::NumString => {
                    self.bump();
                    self.bump();
                    let span = self.span_from(token.span.start);
                    self.arena.alloc(Expr::Integer { value: self.alloc_str(span.as_str(self.source)), span })
                }
                TokenKind::NumString => {
                    self.bump();
                    self.arena.alloc(Expr::Integer { value: self.alloc_str(self.text(token)), span: token.span })
                }
                TokenKind::Identifier => {
                    self.bump();
                    self.arena.alloc(Expr::Identifier { name: self.alloc_str(self.text(token)), span: token.span })
                }
                TokenKind::Variable => self.parse_simple_variable(),
                _ => {
                    self.error("expected array offset");
                    self.arena.alloc(Expr::Error { span: token.span })
                }
            };
            self.expect(TokenKind::CloseBracket, "expected ']'");
            return self.arena.alloc(Expr::ArrayDimFetch { array: var, dim: Some(dim), span: self.span_from(start) });
        }
        if self.at(TokenKind::Arrow) && self.next_token.kind == TokenKind::Identifier {
            self.bump();
            let ident = self.ident();
            let property = self.arena.alloc(Expr::Identifier { name: ident.value, span: ident.span });
            return self.arena.alloc(Expr::PropertyFetch { target: var, property, nullsafe: false, span: self.span_from(start) });
        }
        var
    }

    /// `${name}`, `${name[expr]}` or `${expr}` inside a string.
    fn parse_dollar_brace(&mut self) -> ExprId<'ast> {
        let start = self.start();
        self.bump();
        if self.at(TokenKind::Identifier)
            && matches!(self.next_token.kind, TokenKind::CloseBrace | TokenKind::OpenBracket)
        {
            let ident = self.ident();
            let var = self.arena.alloc(Expr::Variable { name: ident.value, span: ident.span });
            let expr = if self.eat(TokenKind::OpenBracket) {
                let dim = self.parse_expr(0);
                self.expect(TokenKind::CloseBracket, "expected ']'");
                self.arena.alloc(Expr::ArrayDimFetch { array: var, dim: Some(dim), span: Span::new(ident.span.start, self.prev_end) })
            } else {
                var
            };
            self.expect(TokenKind::CloseBrace, "expected '}'");
            return expr;
        }
        let name = self.parse_expr(0);
        self.expect(TokenKind::CloseBrace, "expected '}'");
        self.arena.alloc(Expr::IndirectVariable { name, span: self.span_from(start) })
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;

    use crate::ast::sexpr::SExprFormatter;
    use crate::ast::AstNode;
    use crate::config::AnalyzerConfig;
    use crate::lexer::{tokenize_with, LexerStart};
    use crate::parser::{parse, Rule};

    fn expr(code: &str) -> String {
        let arena = Bump::new();
        let tokens = tokenize_with(code, LexerStart::Scripting, &AnalyzerConfig::default());
        let node = parse(&tokens, Rule::Expression, &arena).expect("expression parses");
        SExprFormatter::format(node)
    }

    #[test]
    fn precedence_follows_php() {
        assert_eq!(expr("1 + 2 * 3"), "(+ (integer 1) (* (integer 2) (integer 3)))");
        assert_eq!(expr("'a' . 1 + 2"), "(. (string 'a') (+ (integer 1) (integer 2)))");
        assert_eq!(expr("-2 ** 2"), "(- (** (integer 2) (integer 2)))");
        assert_eq!(expr("$a ?? $b ?? $c"), "(?? (variable $a) (?? (variable $b) (variable $c)))");
    }

    #[test]
    fn assignment_binds_to_its_variable() {
        assert_eq!(expr("!$a = f()"), "(! (assign (variable $a) (call (name f))))");
        assert_eq!(expr("$a = $b and $c"), "(and (assign (variable $a) (variable $b)) (variable $c))");
    }

    #[test]
    fn member_access_chains() {
        assert_eq!(
            expr("$a?->b()::C"),
            "(class-const-fetch (nullsafe-method-call (variable $a) (identifier b)) (identifier C))"
        );
        assert_eq!(expr("new Foo(...$args)"), "(new (name Foo) (arg ... (variable $args)))");
    }

    #[test]
    fn interpolation_parts() {
        assert_eq!(
            expr("\"x $a[0] {$b->c}\""),
            "(interpolated (encapsed \"x \") (dim-fetch (variable $a) (integer 0)) (encapsed \" \") (property-fetch (variable $b) (identifier c)))"
        );
    }

    #[test]
    fn arrow_function_body_is_an_expression() {
        let arena = Bump::new();
        let tokens = tokenize_with("fn($x) => $x + $y", LexerStart::Scripting, &AnalyzerConfig::default());
        let node = parse(&tokens, Rule::Expression, &arena).expect("arrow function parses");
        let AstNode::Expr(crate::ast::Expr::ArrowFunction { params, .. }) = node else {
            panic!("expected arrow function");
        };
        assert_eq!(params[0].name.value, "x");
    }
}
