pub mod locator;
pub mod node;
pub mod parents;
pub mod sexpr;
pub mod visitor;

pub use node::{AstNode, NodeId};
pub use parents::ParentMap;

use crate::lexer::token::Token;
use crate::span::Span;

pub type ExprId<'ast> = &'ast Expr<'ast>;
pub type StmtId<'ast> = &'ast Stmt<'ast>;

/// The compilation unit. It owns the end-of-file token, so it always has at
/// least one token.
#[derive(Debug)]
pub struct Program<'ast> {
    pub statements: &'ast [StmtId<'ast>],
    pub eof: Token,
    pub errors: &'ast [ParseError],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub message: &'static str,
}

/// A single-token name: a label, member name, parameter or alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    pub value: &'ast str,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Unqualified,
    Qualified,
    /// Leading `\`.
    FullyQualified,
    /// Leading `namespace\`.
    Relative,
}

#[derive(Debug, Clone, Copy)]
pub struct Name<'ast> {
    pub kind: NameKind,
    pub parts: &'ast [Ident<'ast>],
    pub span: Span,
}

impl<'ast> Name<'ast> {
    /// Parts joined with `\`, without any leading separator.
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('\\');
            }
            out.push_str(part.value);
        }
        out
    }

    pub fn last(&self) -> &'ast str {
        self.parts.last().map(|p| p.value).unwrap_or("")
    }

    pub fn is_unqualified(&self) -> bool {
        self.kind == NameKind::Unqualified
    }

    /// `self`, `static` or `parent`.
    pub fn is_special_class(&self) -> bool {
        self.is_unqualified()
            && ["self", "static", "parent"]
                .iter()
                .any(|k| self.last().eq_ignore_ascii_case(k))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Type<'ast> {
    /// Keyword types: `int`, `array`, `static`, `callable`, ...
    Simple(Ident<'ast>),
    Named(Name<'ast>),
    Nullable {
        ty: &'ast Type<'ast>,
        span: Span,
    },
    Union {
        types: &'ast [Type<'ast>],
        span: Span,
    },
    Intersection {
        types: &'ast [Type<'ast>],
        span: Span,
    },
}

impl<'ast> Type<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Type::Simple(ident) => ident.span,
            Type::Named(name) => name.span,
            Type::Nullable { span, .. } | Type::Union { span, .. } | Type::Intersection { span, .. } => *span,
        }
    }

    pub fn with_span(self, span: Span) -> Self {
        match self {
            Type::Nullable { ty, .. } => Type::Nullable { ty, span },
            Type::Union { types, .. } => Type::Union { types, span },
            Type::Intersection { types, .. } => Type::Intersection { types, span },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Attribute<'ast> {
    pub name: Name<'ast>,
    pub args: &'ast [Arg<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeGroup<'ast> {
    pub attributes: &'ast [Attribute<'ast>],
    pub span: Span,
}

#[derive(Debug)]
pub enum Stmt<'ast> {
    Echo {
        exprs: &'ast [ExprId<'ast>],
        span: Span,
    },
    Return {
        expr: Option<ExprId<'ast>>,
        span: Span,
    },
    /// `elseif` chains nest: the else block holds a single `If`.
    If {
        condition: ExprId<'ast>,
        then_block: &'ast [StmtId<'ast>],
        else_block: Option<&'ast [StmtId<'ast>]>,
        span: Span,
    },
    While {
        condition: ExprId<'ast>,
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    DoWhile {
        body: &'ast [StmtId<'ast>],
        condition: ExprId<'ast>,
        span: Span,
    },
    For {
        init: &'ast [ExprId<'ast>],
        condition: &'ast [ExprId<'ast>],
        loop_expr: &'ast [ExprId<'ast>],
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    Foreach {
        expr: ExprId<'ast>,
        key_var: Option<ExprId<'ast>>,
        value_var: ExprId<'ast>,
        by_ref: bool,
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    Block {
        statements: &'ast [StmtId<'ast>],
        span: Span,
    },
    Function {
        attributes: &'ast [AttributeGroup<'ast>],
        by_ref: bool,
        name: Ident<'ast>,
        params: &'ast [Param<'ast>],
        return_type: Option<&'ast Type<'ast>>,
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    Class {
        attributes: &'ast [AttributeGroup<'ast>],
        modifiers: &'ast [Token],
        name: Ident<'ast>,
        extends: Option<Name<'ast>>,
        implements: &'ast [Name<'ast>],
        members: &'ast [ClassMember<'ast>],
        span: Span,
    },
    Interface {
        attributes: &'ast [AttributeGroup<'ast>],
        name: Ident<'ast>,
        extends: &'ast [Name<'ast>],
        members: &'ast [ClassMember<'ast>],
        span: Span,
    },
    Trait {
        attributes: &'ast [AttributeGroup<'ast>],
        name: Ident<'ast>,
        members: &'ast [ClassMember<'ast>],
        span: Span,
    },
    Enum {
        attributes: &'ast [AttributeGroup<'ast>],
        name: Ident<'ast>,
        backed_type: Option<&'ast Type<'ast>>,
        implements: &'ast [Name<'ast>],
        members: &'ast [ClassMember<'ast>],
        span: Span,
    },
    Namespace {
        name: Option<Name<'ast>>,
        body: Option<&'ast [StmtId<'ast>]>,
        span: Span,
    },
    /// `prefix` is the shared part of a group use, `use A\{B, C}`.
    Use {
        prefix: Option<Name<'ast>>,
        uses: &'ast [UseItem<'ast>],
        kind: UseKind,
        span: Span,
    },
    Switch {
        condition: ExprId<'ast>,
        cases: &'ast [Case<'ast>],
        span: Span,
    },
    Try {
        body: &'ast [StmtId<'ast>],
        catches: &'ast [Catch<'ast>],
        finally: Option<&'ast [StmtId<'ast>]>,
        span: Span,
    },
    Throw {
        expr: ExprId<'ast>,
        span: Span,
    },
    Const {
        attributes: &'ast [AttributeGroup<'ast>],
        consts: &'ast [ClassConst<'ast>],
        span: Span,
    },
    Break {
        level: Option<ExprId<'ast>>,
        span: Span,
    },
    Continue {
        level: Option<ExprId<'ast>>,
        span: Span,
    },
    Global {
        vars: &'ast [ExprId<'ast>],
        span: Span,
    },
    Static {
        vars: &'ast [StaticVar<'ast>],
        span: Span,
    },
    Unset {
        vars: &'ast [ExprId<'ast>],
        span: Span,
    },
    Expression {
        expr: ExprId<'ast>,
        span: Span,
    },
    InlineHtml {
        value: &'ast str,
        span: Span,
    },
    Declare {
        declares: &'ast [DeclareItem<'ast>],
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    Goto {
        label: Ident<'ast>,
        span: Span,
    },
    Label {
        name: Ident<'ast>,
        span: Span,
    },
    HaltCompiler {
        span: Span,
    },
    /// Empty statement, opening and closing tags.
    Nop {
        span: Span,
    },
    Error {
        span: Span,
    },
}

impl<'ast> Stmt<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Echo { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Foreach { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::Function { span, .. }
            | Stmt::Class { span, .. }
            | Stmt::Interface { span, .. }
            | Stmt::Trait { span, .. }
            | Stmt::Enum { span, .. }
            | Stmt::Namespace { span, .. }
            | Stmt::Use { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Const { span, .. }
            | Stmt::Break { span, .. }
            | Stmt::Continue { span, .. }
            | Stmt::Global { span, .. }
            | Stmt::Static { span, .. }
            | Stmt::Unset { span, .. }
            | Stmt::Expression { span, .. }
            | Stmt::InlineHtml { span, .. }
            | Stmt::Declare { span, .. }
            | Stmt::Goto { span, .. }
            | Stmt::Label { span, .. }
            | Stmt::HaltCompiler { span }
            | Stmt::Nop { span }
            | Stmt::Error { span } => *span,
        }
    }

    /// Function, class-like and namespace declarations.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Stmt::Function { .. }
                | Stmt::Class { .. }
                | Stmt::Interface { .. }
                | Stmt::Trait { .. }
                | Stmt::Enum { .. }
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Param<'ast> {
    pub attributes: &'ast [AttributeGroup<'ast>],
    /// Constructor promotion modifiers.
    pub modifiers: &'ast [Token],
    pub ty: Option<&'ast Type<'ast>>,
    pub by_ref: bool,
    pub variadic: bool,
    /// Variable name without the `$`.
    pub name: Ident<'ast>,
    pub default: Option<ExprId<'ast>>,
    pub span: Span,
}

#[derive(Debug)]
pub enum Expr<'ast> {
    Assign {
        var: ExprId<'ast>,
        expr: ExprId<'ast>,
        span: Span,
    },
    AssignRef {
        var: ExprId<'ast>,
        expr: ExprId<'ast>,
        span: Span,
    },
    AssignOp {
        var: ExprId<'ast>,
        op: AssignOp,
        expr: ExprId<'ast>,
        span: Span,
    },
    Binary {
        left: ExprId<'ast>,
        op: BinaryOp,
        right: ExprId<'ast>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: ExprId<'ast>,
        span: Span,
    },
    PreInc {
        var: ExprId<'ast>,
        span: Span,
    },
    PreDec {
        var: ExprId<'ast>,
        span: Span,
    },
    PostInc {
        var: ExprId<'ast>,
        span: Span,
    },
    PostDec {
        var: ExprId<'ast>,
        span: Span,
    },
    Cast {
        kind: CastKind,
        expr: ExprId<'ast>,
        span: Span,
    },
    InstanceOf {
        expr: ExprId<'ast>,
        class: ExprId<'ast>,
        span: Span,
    },
    Call {
        func: ExprId<'ast>,
        args: &'ast [Arg<'ast>],
        span: Span,
    },
    MethodCall {
        target: ExprId<'ast>,
        method: ExprId<'ast>,
        args: &'ast [Arg<'ast>],
        nullsafe: bool,
        span: Span,
    },
    StaticCall {
        class: ExprId<'ast>,
        method: ExprId<'ast>,
        args: &'ast [Arg<'ast>],
        span: Span,
    },
    PropertyFetch {
        target: ExprId<'ast>,
        property: ExprId<'ast>,
        nullsafe: bool,
        span: Span,
    },
    StaticPropertyFetch {
        class: ExprId<'ast>,
        property: ExprId<'ast>,
        span: Span,
    },
    ClassConstFetch {
        class: ExprId<'ast>,
        constant: ExprId<'ast>,
        span: Span,
    },
    ArrayDimFetch {
        array: ExprId<'ast>,
        dim: Option<ExprId<'ast>>, // None for $a[]
        span: Span,
    },
    New {
        class: ExprId<'ast>,
        args: &'ast [Arg<'ast>],
        span: Span,
    },
    AnonymousClass {
        attributes: &'ast [AttributeGroup<'ast>],
        args: &'ast [Arg<'ast>],
        extends: Option<Name<'ast>>,
        implements: &'ast [Name<'ast>],
        members: &'ast [ClassMember<'ast>],
        span: Span,
    },
    Clone {
        expr: ExprId<'ast>,
        span: Span,
    },
    /// `$name`, stored without the `$`.
    Variable {
        name: &'ast str,
        span: Span,
    },
    /// `$$name` and `${expr}`.
    IndirectVariable {
        name: ExprId<'ast>,
        span: Span,
    },
    /// Member or constant name after `->` or `::`.
    Identifier {
        name: &'ast str,
        span: Span,
    },
    /// Function, constant or class reference.
    Name {
        name: Name<'ast>,
        span: Span,
    },
    Integer {
        value: &'ast str,
        span: Span,
    },
    Float {
        value: &'ast str,
        span: Span,
    },
    /// A literal string token, quotes included.
    String {
        value: &'ast str,
        span: Span,
    },
    InterpolatedString {
        kind: StringKind,
        parts: &'ast [ExprId<'ast>],
        span: Span,
    },
    /// Literal text between interpolations.
    EncapsedPart {
        value: &'ast str,
        span: Span,
    },
    Boolean {
        value: bool,
        span: Span,
    },
    Null {
        span: Span,
    },
    MagicConst {
        kind: MagicConstKind,
        span: Span,
    },
    Array {
        items: &'ast [ArrayItem<'ast>],
        short: bool,
        span: Span,
    },
    List {
        items: &'ast [ArrayItem<'ast>],
        span: Span,
    },
    Isset {
        vars: &'ast [ExprId<'ast>],
        span: Span,
    },
    Empty {
        expr: ExprId<'ast>,
        span: Span,
    },
    Exit {
        expr: Option<ExprId<'ast>>,
        span: Span,
    },
    Eval {
        expr: ExprId<'ast>,
        span: Span,
    },
    Include {
        kind: IncludeKind,
        expr: ExprId<'ast>,
        span: Span,
    },
    Print {
        expr: ExprId<'ast>,
        span: Span,
    },
    Closure {
        attributes: &'ast [AttributeGroup<'ast>],
        is_static: bool,
        by_ref: bool,
        params: &'ast [Param<'ast>],
        uses: &'ast [ClosureUse<'ast>],
        return_type: Option<&'ast Type<'ast>>,
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    ArrowFunction {
        attributes: &'ast [AttributeGroup<'ast>],
        is_static: bool,
        by_ref: bool,
        params: &'ast [Param<'ast>],
        return_type: Option<&'ast Type<'ast>>,
        expr: ExprId<'ast>,
        span: Span,
    },
    Match {
        condition: ExprId<'ast>,
        arms: &'ast [MatchArm<'ast>],
        span: Span,
    },
    /// `if_true` is absent for the short form `a ?: b`.
    Ternary {
        condition: ExprId<'ast>,
        if_true: Option<ExprId<'ast>>,
        if_false: ExprId<'ast>,
        span: Span,
    },
    Yield {
        key: Option<ExprId<'ast>>,
        value: Option<ExprId<'ast>>,
        span: Span,
    },
    YieldFrom {
        expr: ExprId<'ast>,
        span: Span,
    },
    Throw {
        expr: ExprId<'ast>,
        span: Span,
    },
    /// The `...` of a first-class callable, `strlen(...)`.
    VariadicPlaceholder {
        span: Span,
    },
    Error {
        span: Span,
    },
}

impl<'ast> Expr<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Expr::Assign { span, .. }
            | Expr::AssignRef { span, .. }
            | Expr::AssignOp { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::PreInc { span, .. }
            | Expr::PreDec { span, .. }
            | Expr::PostInc { span, .. }
            | Expr::PostDec { span, .. }
            | Expr::Cast { span, .. }
            | Expr::InstanceOf { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::StaticCall { span, .. }
            | Expr::PropertyFetch { span, .. }
            | Expr::StaticPropertyFetch { span, .. }
            | Expr::ClassConstFetch { span, .. }
            | Expr::ArrayDimFetch { span, .. }
            | Expr::New { span, .. }
            | Expr::AnonymousClass { span, .. }
            | Expr::Clone { span, .. }
            | Expr::Variable { span, .. }
            | Expr::IndirectVariable { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Name { span, .. }
            | Expr::Integer { span, .. }
            | Expr::Float { span, .. }
            | Expr::String { span, .. }
            | Expr::InterpolatedString { span, .. }
            | Expr::EncapsedPart { span, .. }
            | Expr::Boolean { span, .. }
            | Expr::Null { span }
            | Expr::MagicConst { span, .. }
            | Expr::Array { span, .. }
            | Expr::List { span, .. }
            | Expr::Isset { span, .. }
            | Expr::Empty { span, .. }
            | Expr::Exit { span, .. }
            | Expr::Eval { span, .. }
            | Expr::Include { span, .. }
            | Expr::Print { span, .. }
            | Expr::Closure { span, .. }
            | Expr::ArrowFunction { span, .. }
            | Expr::Match { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Yield { span, .. }
            | Expr::YieldFrom { span, .. }
            | Expr::Throw { span, .. }
            | Expr::VariadicPlaceholder { span }
            | Expr::Error { span } => *span,
        }
    }

    /// Expressions that may appear on the left of an assignment.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Variable { .. }
                | Expr::IndirectVariable { .. }
                | Expr::ArrayDimFetch { .. }
                | Expr::PropertyFetch { .. }
                | Expr::StaticPropertyFetch { .. }
                | Expr::List { .. }
                | Expr::Array { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    /// `@`
    Silence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    EqEq,
    EqEqEq,
    NotEq,
    NotEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Spaceship,
    And,
    Or,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => ".",
            BinaryOp::Pow => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::EqEq => "==",
            BinaryOp::EqEqEq => "===",
            BinaryOp::NotEq => "!=",
            BinaryOp::NotEqEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Spaceship => "<=>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::LogicalAnd => "and",
            BinaryOp::LogicalOr => "or",
            BinaryOp::LogicalXor => "xor",
            BinaryOp::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Int,
    Bool,
    Float,
    String,
    Array,
    Object,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicConstKind {
    Line,
    File,
    Dir,
    Class,
    Trait,
    Method,
    Function,
    Namespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    DoubleQuoted,
    ShellExec,
    Heredoc,
    Nowdoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Normal,
    Function,
    Const,
}

#[derive(Debug, Clone, Copy)]
pub struct Arg<'ast> {
    pub name: Option<Ident<'ast>>,
    pub value: ExprId<'ast>,
    pub unpack: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct ArrayItem<'ast> {
    pub key: Option<ExprId<'ast>>,
    pub value: ExprId<'ast>,
    pub by_ref: bool,
    pub unpack: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct ClosureUse<'ast> {
    /// Always an `Expr::Variable`.
    pub var: ExprId<'ast>,
    pub by_ref: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchArm<'ast> {
    /// `None` for the `default` arm.
    pub conditions: Option<&'ast [ExprId<'ast>]>,
    pub body: ExprId<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct Case<'ast> {
    pub condition: Option<ExprId<'ast>>, // None for default
    pub body: &'ast [StmtId<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct Catch<'ast> {
    pub types: &'ast [Name<'ast>],
    pub var: Option<ExprId<'ast>>,
    pub body: &'ast [StmtId<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct StaticVar<'ast> {
    pub var: ExprId<'ast>,
    pub default: Option<ExprId<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct UseItem<'ast> {
    pub name: Name<'ast>,
    pub alias: Option<Ident<'ast>>,
    pub kind: UseKind,
    pub span: Span,
}

impl<'ast> UseItem<'ast> {
    /// The imported name, with the group prefix when there is one.
    pub fn full_name(&self, prefix: Option<&Name<'_>>) -> String {
        match prefix {
            Some(prefix) => format!("{}\\{}", prefix.joined(), self.name.joined()),
            None => self.name.joined(),
        }
    }

    /// The local name the import introduces.
    pub fn local_name(&self) -> &'ast str {
        self.alias.map(|a| a.value).unwrap_or_else(|| self.name.last())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassConst<'ast> {
    pub name: Ident<'ast>,
    pub value: ExprId<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct DeclareItem<'ast> {
    pub key: Ident<'ast>,
    pub value: ExprId<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyEntry<'ast> {
    /// Property name without the `$`.
    pub name: Ident<'ast>,
    pub default: Option<ExprId<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub struct TraitMethodRef<'ast> {
    pub trait_name: Option<Name<'ast>>,
    pub method: Ident<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy)]
pub enum TraitAdaptation<'ast> {
    Precedence {
        method: TraitMethodRef<'ast>,
        insteadof: &'ast [Name<'ast>],
        span: Span,
    },
    Alias {
        method: TraitMethodRef<'ast>,
        visibility: Option<Token>,
        alias: Option<Ident<'ast>>,
        span: Span,
    },
}

impl<'ast> TraitAdaptation<'ast> {
    pub fn span(&self) -> Span {
        match self {
            TraitAdaptation::Precedence { span, .. } | TraitAdaptation::Alias { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ClassMember<'ast> {
    Property {
        attributes: &'ast [AttributeGroup<'ast>],
        modifiers: &'ast [Token],
        ty: Option<&'ast Type<'ast>>,
        entries: &'ast [PropertyEntry<'ast>],
        span: Span,
    },
    Method {
        attributes: &'ast [AttributeGroup<'ast>],
        modifiers: &'ast [Token],
        by_ref: bool,
        name: Ident<'ast>,
        params: &'ast [Param<'ast>],
        return_type: Option<&'ast Type<'ast>>,
        /// `None` for abstract and interface methods.
        body: Option<&'ast [StmtId<'ast>]>,
        span: Span,
    },
    Const {
        attributes: &'ast [AttributeGroup<'ast>],
        modifiers: &'ast [Token],
        ty: Option<&'ast Type<'ast>>,
        consts: &'ast [ClassConst<'ast>],
        span: Span,
    },
    TraitUse {
        traits: &'ast [Name<'ast>],
        adaptations: &'ast [TraitAdaptation<'ast>],
        span: Span,
    },
    Case {
        attributes: &'ast [AttributeGroup<'ast>],
        name: Ident<'ast>,
        value: Option<ExprId<'ast>>,
        span: Span,
    },
}

impl<'ast> ClassMember<'ast> {
    pub fn span(&self) -> Span {
        match self {
            ClassMember::Property { span, .. }
            | ClassMember::Method { span, .. }
            | ClassMember::Const { span, .. }
            | ClassMember::TraitUse { span, .. }
            | ClassMember::Case { span, .. } => *span,
        }
    }
}
