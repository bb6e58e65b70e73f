use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::span::Span;

/// Pattern modifiers and inline options. Modifier letters map to bits one to
/// one; `(?i)` inside a pattern toggles the same bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RegexFlags(u16);

impl RegexFlags {
    pub const CASE_INSENSITIVE: Self = Self(1);
    pub const MULTILINE: Self = Self(1 << 1);
    pub const DOTALL: Self = Self(1 << 2);
    pub const EXTENDED: Self = Self(1 << 3);
    pub const UTF8: Self = Self(1 << 4);
    pub const ANCHORED: Self = Self(1 << 5);
    pub const DOLLAR_ENDONLY: Self = Self(1 << 6);
    pub const UNGREEDY: Self = Self(1 << 7);
    pub const EXTRA: Self = Self(1 << 8);
    pub const DUPNAMES: Self = Self(1 << 9);
    pub const NO_AUTO_CAPTURE: Self = Self(1 << 10);
    pub const STUDY: Self = Self(1 << 11);
    /// `xx`: whitespace inside character classes is ignored too.
    pub const EXTENDED_MORE: Self = Self(1 << 12);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The flag of a pattern modifier letter, as written after the closing
    /// delimiter.
    pub fn from_modifier(letter: char) -> Option<Self> {
        Some(match letter {
            'i' => Self::CASE_INSENSITIVE,
            'm' => Self::MULTILINE,
            's' => Self::DOTALL,
            'x' => Self::EXTENDED,
            'u' => Self::UTF8,
            'A' => Self::ANCHORED,
            'D' => Self::DOLLAR_ENDONLY,
            'U' => Self::UNGREEDY,
            'X' => Self::EXTRA,
            'J' => Self::DUPNAMES,
            'n' => Self::NO_AUTO_CAPTURE,
            'S' => Self::STUDY,
            _ => return None,
        })
    }

    /// The flag of a letter inside `(?...)`, which accepts fewer letters
    /// than the modifier suffix.
    pub fn from_inline(letter: char) -> Option<Self> {
        match letter {
            'i' | 'm' | 's' | 'x' | 'U' | 'X' | 'J' | 'n' => Self::from_modifier(letter),
            _ => None,
        }
    }
}

impl std::ops::BitOr for RegexFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for RegexFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for letter in "imsxuADUXJnS".chars() {
            if let Some(flag) = Self::from_modifier(letter)
                && self.contains(flag)
            {
                f.write_char(letter)?;
            }
        }
        Ok(())
    }
}

/// A parsed pattern together with what surrounded it in the literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexTree {
    pub root: RegexNode,
    /// Opening and closing delimiter, absent for a bare pattern.
    pub delimiters: Option<(char, char)>,
    /// Flags from the modifier suffix and the caller.
    pub flags: RegexFlags,
    pub group_count: u32,
    pub group_names: Vec<(String, u32)>,
    pub span: Span,
}

impl RegexTree {
    pub fn group_number(&self, name: &str) -> Option<u32> {
        self.group_names.iter().find(|(n, _)| n == name).map(|(_, index)| *index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexNode {
    pub kind: RegexNodeKind,
    pub span: Span,
    /// Options in effect where the node starts.
    pub flags: RegexFlags,
}

impl RegexNode {
    pub fn is_case_insensitive(&self) -> bool {
        self.flags.contains(RegexFlags::CASE_INSENSITIVE)
    }

    /// Direct children in pattern order.
    pub fn children(&self) -> Vec<&RegexNode> {
        match &self.kind {
            RegexNodeKind::Sequence(items) | RegexNodeKind::Disjunction(items) => items.iter().collect(),
            RegexNodeKind::CharacterClass { items, .. } => items.iter().collect(),
            RegexNodeKind::Group { body, .. } | RegexNodeKind::Quantified { body, .. } => vec![body],
            RegexNodeKind::Conditional { condition, yes, no, .. } => {
                let mut out = vec![&**condition, &**yes];
                out.extend(no.as_deref());
                out
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexNodeKind {
    /// Items matched one after the other; may be empty.
    Sequence(Vec<RegexNode>),
    /// Alternatives separated by `|`.
    Disjunction(Vec<RegexNode>),
    Literal(char),
    /// `.`
    Dot,
    Anchor(AnchorKind),
    /// `\d`, `\w`, `\R` and the other backslash classes.
    EscapedClass(EscapedClass),
    /// `\p{L}`, `\pL`, `\P{Greek}`, `\p{^Lu}`.
    UnicodeProperty { name: String, negated: bool },
    /// `[...]`
    CharacterClass { negated: bool, items: Vec<RegexNode> },
    /// `a-z` inside a character class.
    CharacterRange { from: char, to: char },
    /// `[:alpha:]` or `[:^alpha:]` inside a character class.
    PosixClass { name: String, negated: bool },
    Group { kind: GroupKind, body: Box<RegexNode> },
    Quantified { body: Box<RegexNode>, quantifier: Quantifier },
    BackReference(GroupReference),
    /// `(?R)`, `(?1)`, `(?&name)`, `\g<name>`.
    SubroutineCall(GroupReference),
    /// `(?i)`: changes the options for the rest of the enclosing group.
    InlineFlags { set: RegexFlags, clear: RegexFlags },
    /// `(?#...)`
    Comment(String),
    /// `(*UTF8)`, `(*FAIL)` and other backtracking verbs.
    Verb(String),
    /// `(?(condition)yes|no)`. `pipe` is absent when there is no `|`, so an
    /// empty no-branch after a `|` stays distinct from a missing one.
    Conditional {
        condition: Box<RegexNode>,
        yes: Box<RegexNode>,
        pipe: Option<Span>,
        no: Option<Box<RegexNode>>,
    },
    /// Reference used as the condition of a conditional subpattern.
    ReferenceCondition(ConditionReference),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    /// `^`
    LineStart,
    /// `$`
    LineEnd,
    /// `\A`
    SubjectStart,
    /// `\z`
    SubjectEnd,
    /// `\Z`
    SubjectEndOrNewline,
    /// `\G`
    FirstMatchPosition,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
    /// `\K`
    ResetMatchStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapedClass {
    Digit,
    NotDigit,
    Word,
    NotWord,
    Space,
    NotSpace,
    HorizontalSpace,
    NotHorizontalSpace,
    VerticalSpace,
    NotVerticalSpace,
    /// `\R`
    Newline,
    /// `\X`
    Grapheme,
    /// `\N`
    NotNewline,
}

impl EscapedClass {
    pub fn from_letter(letter: char) -> Option<Self> {
        Some(match letter {
            'd' => Self::Digit,
            'D' => Self::NotDigit,
            'w' => Self::Word,
            'W' => Self::NotWord,
            's' => Self::Space,
            'S' => Self::NotSpace,
            'h' => Self::HorizontalSpace,
            'H' => Self::NotHorizontalSpace,
            'v' => Self::VerticalSpace,
            'V' => Self::NotVerticalSpace,
            'R' => Self::Newline,
            'X' => Self::Grapheme,
            'N' => Self::NotNewline,
            _ => return None,
        })
    }

    pub fn letter(self) -> char {
        match self {
            Self::Digit => 'd',
            Self::NotDigit => 'D',
            Self::Word => 'w',
            Self::NotWord => 'W',
            Self::Space => 's',
            Self::NotSpace => 'S',
            Self::HorizontalSpace => 'h',
            Self::NotHorizontalSpace => 'H',
            Self::VerticalSpace => 'v',
            Self::NotVerticalSpace => 'V',
            Self::Newline => 'R',
            Self::Grapheme => 'X',
            Self::NotNewline => 'N',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    /// `(...)`, `(?<name>...)`, `(?'name'...)`, `(?P<name>...)`.
    Capturing { index: u32, name: Option<String> },
    /// `(?:...)`
    NonCapturing,
    /// `(?i-m:...)`
    Flags { set: RegexFlags, clear: RegexFlags },
    /// `(?>...)`
    Atomic,
    /// `(?|...)`
    BranchReset,
    /// `(?=...)`, `(?!...)`
    Lookahead { negated: bool },
    /// `(?<=...)`, `(?<!...)`
    Lookbehind { negated: bool },
}

impl GroupKind {
    pub fn is_lookaround(&self) -> bool {
        matches!(self, Self::Lookahead { .. } | Self::Lookbehind { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupReference {
    Number(u32),
    /// `-1` is the closest group opened before the reference.
    Relative(i32),
    Named(String),
    /// The whole pattern, `(?R)` or `(?0)`.
    Recursion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionReference {
    /// `(?(1)`, `(?(-1)`, `(?(<name>)`, `(?('name')`, `(?(name)`.
    Group(GroupReference),
    /// `(?(R)`, `(?(R1)`, `(?(R&name)`.
    Recursion(Option<GroupReference>),
    /// `(?(DEFINE)`
    Define,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantifierMode {
    Greedy,
    /// Trailing `?`.
    Lazy,
    /// Trailing `+`.
    Possessive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub min: u32,
    /// `None` is unbounded.
    pub max: Option<u32>,
    pub mode: QuantifierMode,
}

/// Renders a node as a compact s-expression, mostly for tests and debug
/// output.
pub fn to_sexpr(node: &RegexNode) -> String {
    let mut out = String::new();
    write_sexpr(&mut out, node);
    out
}

fn write_sexpr(out: &mut String, node: &RegexNode) {
    let _ = match &node.kind {
        RegexNodeKind::Literal(c) => write!(out, "{c:?}"),
        RegexNodeKind::Dot => write!(out, "dot"),
        RegexNodeKind::Anchor(kind) => write!(out, "(anchor {kind:?})"),
        RegexNodeKind::EscapedClass(class) => write!(out, "\\{}", class.letter()),
        RegexNodeKind::UnicodeProperty { name, negated } => {
            write!(out, "(property {}{name})", if *negated { "^" } else { "" })
        }
        RegexNodeKind::CharacterRange { from, to } => write!(out, "(range {from:?} {to:?})"),
        RegexNodeKind::PosixClass { name, negated } => {
            write!(out, "(posix {}{name})", if *negated { "^" } else { "" })
        }
        RegexNodeKind::BackReference(reference) => write!(out, "(backref {reference:?})"),
        RegexNodeKind::SubroutineCall(reference) => write!(out, "(call {reference:?})"),
        RegexNodeKind::InlineFlags { set, clear } => write!(out, "(flags +{set} -{clear})"),
        RegexNodeKind::Comment(text) => write!(out, "(comment {text:?})"),
        RegexNodeKind::Verb(name) => write!(out, "(verb {name})"),
        RegexNodeKind::ReferenceCondition(reference) => write!(out, "(ref {reference:?})"),
        RegexNodeKind::Quantified { body, quantifier } => {
            let max = quantifier.max.map_or_else(|| "inf".to_owned(), |max| max.to_string());
            let _ = write!(out, "(repeat {} {max} {:?} ", quantifier.min, quantifier.mode);
            write_sexpr(out, body);
            write!(out, ")")
        }
        RegexNodeKind::Conditional { condition, yes, pipe, no } => {
            out.push_str("(if ");
            write_sexpr(out, condition);
            out.push(' ');
            write_sexpr(out, yes);
            if pipe.is_some() {
                out.push_str(" |");
            }
            if let Some(no) = no {
                out.push(' ');
                write_sexpr(out, no);
            }
            write!(out, ")")
        }
        RegexNodeKind::Group { kind, body } => {
            let _ = match kind {
                GroupKind::Capturing { index, name: Some(name) } => write!(out, "(group {index} {name} "),
                GroupKind::Capturing { index, name: None } => write!(out, "(group {index} "),
                GroupKind::Flags { set, clear } => write!(out, "(group +{set} -{clear} "),
                other => write!(out, "(group {other:?} "),
            };
            write_sexpr(out, body);
            write!(out, ")")
        }
        RegexNodeKind::Sequence(items) => list(out, "seq", items),
        RegexNodeKind::Disjunction(items) => list(out, "or", items),
        RegexNodeKind::CharacterClass { negated, items } => list(out, if *negated { "not-class" } else { "class" }, items),
    };
}

fn list(out: &mut String, label: &str, items: &[RegexNode]) -> fmt::Result {
    out.push('(');
    out.push_str(label);
    for item in items {
        out.push(' ');
        write_sexpr(out, item);
    }
    out.write_char(')')
}
