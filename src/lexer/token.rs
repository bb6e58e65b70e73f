use serde::Serialize;

use crate::span::Span;

/// The compact token stored in the syntax tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, Serialize)]
pub enum TokenKind {
    // Keywords
    Function, Fn, Class, Interface, Trait, Extends, Implements, Enum,
    If, Else, ElseIf, EndIf, Return, Echo, Print,
    While, Do, For, Foreach, EndWhile, EndFor, EndForeach, As, Switch, EndSwitch, Case, Default, Break, Continue, Goto,
    Try, Catch, Finally, Throw,
    Public, Protected, Private, Static, Abstract, Final, Readonly, Var,
    Namespace, Use, Global, Insteadof,
    New, Clone, InstanceOf,
    Array, Const,
    Include, IncludeOnce, Require, RequireOnce, Eval, Exit,
    Empty, Isset, Unset, List,
    Yield, YieldFrom,
    Declare, EndDeclare, Match,
    HaltCompiler, // __halt_compiler
    Attribute, // #[

    // Magic constants
    Line, File, Dir, ClassC, TraitC, MethodC, FuncC, NsC,

    // Types
    TypeBool, TypeInt, TypeFloat, TypeString, TypeObject, TypeVoid, TypeIterable, TypeCallable, TypeMixed, TypeNever, TypeNull, TypeFalse, TypeTrue,

    // Casts
    IntCast, FloatCast, StringCast, ArrayCast, ObjectCast, BoolCast, UnsetCast,

    // Identifiers & literals
    Identifier,
    LNumber,
    DNumber,
    StringLiteral,
    NumString, // array offset inside a string
    Variable,
    InlineHtml,
    EncapsedAndWhitespace,
    DollarOpenCurlyBraces, // ${
    CurlyOpen, // {$
    Backtick, // `
    DoubleQuote, // "
    StartHeredoc, // <<<LABEL
    EndHeredoc, // closing label
    Dollar, // $ of $$a
    NsSeparator, // \

    // Trivia, never part of the parser's token stream
    Comment,
    DocComment,

    // Symbols
    Arrow, // ->
    NullSafeArrow, // ?->
    DoubleArrow, // =>
    DoubleColon, // ::
    Ellipsis, // ...

    Plus, Minus, Asterisk, Slash, Percent, Dot,
    Pow, // **
    Inc, Dec, // ++, --

    Eq, // =
    PlusEq, MinusEq, MulEq, DivEq, ModEq, ConcatEq, PowEq,
    AndEq, OrEq, XorEq, SlEq, SrEq, CoalesceEq,

    EqEq, // ==
    EqEqEq, // ===
    Bang, // !
    BangEq, // != and <>
    BangEqEq, // !==
    Lt, // <
    LtEq, // <=
    Gt, // >
    GtEq, // >=
    Spaceship, // <=>

    AmpersandFollowedByVarOrVararg,
    AmpersandNotFollowedByVarOrVararg,
    Pipe, // |
    Caret, // ^
    BitNot, // ~
    Sl, // <<
    Sr, // >>

    AmpersandAmpersand, // &&
    PipePipe, // ||
    LogicalAnd, // and
    LogicalOr, // or
    LogicalXor, // xor
    Question, // ?
    Coalesce, // ??
    At, // @

    SemiColon,
    Colon,
    Comma,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,

    OpenTag, // <?php
    OpenTagEcho, // <?=
    CloseTag, // ?>

    Eof,

    // Single unrecognized character
    Error,
}

impl TokenKind {
    pub fn is_ampersand(self) -> bool {
        matches!(self, TokenKind::AmpersandFollowedByVarOrVararg | TokenKind::AmpersandNotFollowedByVarOrVararg)
    }

    pub fn is_cast(self) -> bool {
        matches!(
            self,
            TokenKind::IntCast
                | TokenKind::FloatCast
                | TokenKind::StringCast
                | TokenKind::ArrayCast
                | TokenKind::ObjectCast
                | TokenKind::BoolCast
                | TokenKind::UnsetCast
        )
    }

    pub fn is_magic_const(self) -> bool {
        matches!(
            self,
            TokenKind::Line
                | TokenKind::File
                | TokenKind::Dir
                | TokenKind::ClassC
                | TokenKind::TraitC
                | TokenKind::MethodC
                | TokenKind::FuncC
                | TokenKind::NsC
        )
    }

    pub fn is_type_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::TypeBool
                | TokenKind::TypeInt
                | TokenKind::TypeFloat
                | TokenKind::TypeString
                | TokenKind::TypeObject
                | TokenKind::TypeVoid
                | TokenKind::TypeIterable
                | TokenKind::TypeCallable
                | TokenKind::TypeMixed
                | TokenKind::TypeNever
                | TokenKind::TypeNull
                | TokenKind::TypeFalse
                | TokenKind::TypeTrue
        )
    }

    /// Keywords that may still be used as member, constant or label names.
    pub fn is_semi_reserved(self) -> bool {
        self.is_reserved_word() || self.is_magic_const() || self.is_type_keyword()
    }

    pub fn is_reserved_word(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Function | Fn | Class | Interface | Trait | Extends | Implements | Enum
                | If | Else | ElseIf | EndIf | Return | Echo | Print
                | While | Do | For | Foreach | EndWhile | EndFor | EndForeach | As | Switch | EndSwitch
                | Case | Default | Break | Continue | Goto
                | Try | Catch | Finally | Throw
                | Public | Protected | Private | Static | Abstract | Final | Readonly | Var
                | Namespace | Use | Global | Insteadof
                | New | Clone | InstanceOf | Array | Const
                | Include | IncludeOnce | Require | RequireOnce | Eval | Exit
                | Empty | Isset | Unset | List | Yield | Declare | EndDeclare | Match
                | HaltCompiler | LogicalAnd | LogicalOr | LogicalXor
        )
    }

    /// Category used by highlighters.
    pub fn is_keyword(self) -> bool {
        self.is_reserved_word() || self.is_magic_const() || self.is_cast() || self == TokenKind::YieldFrom
    }

    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            TokenKind::StringLiteral
                | TokenKind::EncapsedAndWhitespace
                | TokenKind::DoubleQuote
                | TokenKind::Backtick
                | TokenKind::StartHeredoc
                | TokenKind::EndHeredoc
                | TokenKind::NumString
        )
    }

    pub fn is_number(self) -> bool {
        matches!(self, TokenKind::LNumber | TokenKind::DNumber)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TriviaKind {
    Whitespace,
    Comment,
    DocComment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trivia<'src> {
    pub kind: TriviaKind,
    pub span: Span,
    pub text: &'src str,
    pub line: usize,
    pub column: usize,
}

/// A token of the token stream with its text, position and leading trivia.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxToken<'src> {
    pub kind: TokenKind,
    pub span: Span,
    pub text: &'src str,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub leading_trivia: Vec<Trivia<'src>>,
}

impl<'src> SyntaxToken<'src> {
    pub fn token(&self) -> Token {
        Token { kind: self.kind, span: self.span }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
