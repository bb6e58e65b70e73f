use super::ast::*;
use super::RegexParseError;
use crate::span::Span;

/// Recursive descent over the pattern characters. Each character keeps the
/// span it occupies in the original text, so node spans point into PHP
/// source even when the pattern came out of an escaped string literal.
pub(super) struct RegexParser<'c> {
    chars: &'c [(char, Span)],
    pos: usize,
    flags: RegexFlags,
    group_count: u32,
    group_names: Vec<(String, u32)>,
    /// Where errors in an empty pattern point.
    end_offset: usize,
}

impl<'c> RegexParser<'c> {
    pub(super) fn new(chars: &'c [(char, Span)], flags: RegexFlags, end_offset: usize) -> Self {
        Self { chars, pos: 0, flags, group_count: 0, group_names: Vec::new(), end_offset }
    }

    pub(super) fn parse(mut self) -> Result<(RegexNode, u32, Vec<(String, u32)>), RegexParseError> {
        let root = self.disjunction(false)?;
        if let Some(&(c, span)) = self.chars.get(self.pos) {
            // Only an unbalanced `)` stops the top-level disjunction early.
            debug_assert_eq!(c, ')');
            return Err(self.error_at(span.start, "unmatched closing parenthesis"));
        }
        Ok((root, self.group_count, self.group_names))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(c, _)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(c, _)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_str(&self, text: &str) -> bool {
        text.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn offset(&self) -> usize {
        match self.chars.get(self.pos) {
            Some(&(_, span)) => span.start,
            None => self.chars.last().map_or(self.end_offset, |&(_, span)| span.end),
        }
    }

    fn span_from(&self, start: usize) -> Span {
        if self.pos == start {
            let offset = self.offset();
            return Span::new(offset, offset);
        }
        Span::new(self.chars[start].1.start, self.chars[self.pos - 1].1.end)
    }

    fn node(&self, kind: RegexNodeKind, start: usize, flags: RegexFlags) -> RegexNode {
        RegexNode { kind, span: self.span_from(start), flags }
    }

    fn error_at(&self, offset: usize, message: &'static str) -> RegexParseError {
        RegexParseError::Syntax { message, offset }
    }

    fn error(&self, message: &'static str) -> RegexParseError {
        self.error_at(self.offset(), message)
    }

    fn expect(&mut self, expected: char, message: &'static str) -> Result<(), RegexParseError> {
        if self.eat(expected) { Ok(()) } else { Err(self.error(message)) }
    }

    /// Whitespace and `#` comments are insignificant in extended mode.
    fn skip_extended(&mut self) {
        if !self.flags.contains(RegexFlags::EXTENDED) {
            return;
        }
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Alternatives up to an unmatched `)` or the end of input. Inline
    /// flags set in one alternative carry over to the following ones.
    fn disjunction(&mut self, branch_reset: bool) -> Result<RegexNode, RegexParseError> {
        let start = self.pos;
        let flags = self.flags;
        let base_count = self.group_count;
        let mut highest = base_count;
        let mut alternatives = vec![self.sequence()?];
        while self.eat('|') {
            if branch_reset {
                highest = highest.max(self.group_count);
                self.group_count = base_count;
            }
            alternatives.push(self.sequence()?);
        }
        if branch_reset {
            self.group_count = highest.max(self.group_count);
        }
        if alternatives.len() == 1 {
            return Ok(alternatives.remove(0));
        }
        Ok(self.node(RegexNodeKind::Disjunction(alternatives), start, flags))
    }

    fn sequence(&mut self) -> Result<RegexNode, RegexParseError> {
        let start = self.pos;
        let flags = self.flags;
        let mut items: Vec<RegexNode> = Vec::new();
        loop {
            self.skip_extended();
            let Some(c) = self.peek() else { break };
            match c {
                '|' | ')' => break,
                '*' | '+' | '?' => {
                    return Err(self.error("quantifier does not follow a repeatable item"));
                }
                '{' if self.quantifier_ahead() => {
                    return Err(self.error("quantifier does not follow a repeatable item"));
                }
                _ => {}
            }
            if c == '\\' && self.peek_at(1) == Some('Q') {
                self.quoted(&mut items);
                continue;
            }
            let atom = self.atom()?;
            let Some(atom) = atom else { continue };
            let atom = self.quantified(atom)?;
            items.push(atom);
        }
        Ok(self.node(RegexNodeKind::Sequence(items), start, flags))
    }

    /// `\Q...\E`: every character up to `\E` is literal.
    fn quoted(&mut self, items: &mut Vec<RegexNode>) {
        self.pos += 2;
        while self.pos < self.chars.len() {
            if self.at_str("\\E") {
                self.pos += 2;
                return;
            }
            let start = self.pos;
            let flags = self.flags;
            if let Some(c) = self.bump() {
                items.push(self.node(RegexNodeKind::Literal(c), start, flags));
            }
        }
    }

    fn quantified(&mut self, atom: RegexNode) -> Result<RegexNode, RegexParseError> {
        let mut atom = atom;
        loop {
            self.skip_extended();
            let start_offset = atom.span.start;
            let Some((min, max)) = self.quantifier_bounds()? else {
                return Ok(atom);
            };
            let mode = if self.eat('?') {
                QuantifierMode::Lazy
            } else if self.eat('+') {
                QuantifierMode::Possessive
            } else {
                QuantifierMode::Greedy
            };
            let end = self.chars[self.pos - 1].1.end;
            let flags = atom.flags;
            atom = RegexNode {
                kind: RegexNodeKind::Quantified { body: Box::new(atom), quantifier: Quantifier { min, max, mode } },
                span: Span::new(start_offset, end),
                flags,
            };
            // A second quantifier needs something repeatable in between.
            self.skip_extended();
            if matches!(self.peek(), Some('*' | '+' | '?')) || (self.peek() == Some('{') && self.quantifier_ahead()) {
                return Err(self.error("nothing to repeat"));
            }
        }
    }

    fn quantifier_bounds(&mut self) -> Result<Option<(u32, Option<u32>)>, RegexParseError> {
        let bounds = match self.peek() {
            Some('*') => (0, None),
            Some('+') => (1, None),
            Some('?') => (0, Some(1)),
            Some('{') if self.quantifier_ahead() => return self.braced_quantifier().map(Some),
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(bounds))
    }

    /// `{n}`, `{n,}` or `{n,m}`; anything else after `{` is a literal brace.
    fn quantifier_ahead(&self) -> bool {
        let mut i = 1;
        let mut digits = 0;
        while self.peek_at(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
            digits += 1;
        }
        if digits == 0 {
            return false;
        }
        if self.peek_at(i) == Some(',') {
            i += 1;
            while self.peek_at(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
        }
        self.peek_at(i) == Some('}')
    }

    fn braced_quantifier(&mut self) -> Result<(u32, Option<u32>), RegexParseError> {
        let start = self.offset();
        self.pos += 1;
        let min = self.number().ok_or_else(|| self.error("number too big in quantifier"))?;
        let max = if self.eat(',') {
            if self.peek() == Some('}') {
                None
            } else {
                Some(self.number().ok_or_else(|| self.error("number too big in quantifier"))?)
            }
        } else {
            Some(min)
        };
        self.expect('}', "missing } in quantifier")?;
        if max.is_some_and(|max| max < min) {
            return Err(self.error_at(start, "numbers out of order in {} quantifier"));
        }
        Ok((min, max))
    }

    fn number(&mut self) -> Option<u32> {
        let mut value: u32 = 0;
        let mut any = false;
        while let Some(digit) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value.checked_mul(10)?.checked_add(digit)?;
            self.pos += 1;
            any = true;
        }
        any.then_some(value)
    }

    /// One item of a sequence. `None` for constructs that match nothing and
    /// leave no node, like a lone `\E`.
    fn atom(&mut self) -> Result<Option<RegexNode>, RegexParseError> {
        let start = self.pos;
        let flags = self.flags;
        let Some(c) = self.bump() else {
            return Err(self.error("unexpected end of pattern"));
        };
        let kind = match c {
            '(' => return self.group(start).map(Some),
            '[' => return self.character_class(start).map(Some),
            '.' => RegexNodeKind::Dot,
            '^' => RegexNodeKind::Anchor(AnchorKind::LineStart),
            '$' => RegexNodeKind::Anchor(AnchorKind::LineEnd),
            '\\' => match self.escape(false)? {
                Some(kind) => kind,
                None => return Ok(None),
            },
            other => RegexNodeKind::Literal(other),
        };
        Ok(Some(self.node(kind, start, flags)))
    }

    /// The construct after a backslash. Inside a character class `\b` is a
    /// backspace and references are not allowed.
    fn escape(&mut self, in_class: bool) -> Result<Option<RegexNodeKind>, RegexParseError> {
        let Some(c) = self.bump() else {
            return Err(self.error("\\ at end of pattern"));
        };
        if let Some(class) = EscapedClass::from_letter(c) {
            let allowed = !in_class || !matches!(class, EscapedClass::Newline | EscapedClass::Grapheme | EscapedClass::NotNewline);
            if allowed {
                return Ok(Some(RegexNodeKind::EscapedClass(class)));
            }
            return Err(self.error("escape sequence is invalid in character class"));
        }
        let kind = match c {
            'p' | 'P' => self.unicode_property(c == 'P')?,
            'b' if in_class => RegexNodeKind::Literal('\u{8}'),
            'b' => RegexNodeKind::Anchor(AnchorKind::WordBoundary),
            'B' if !in_class => RegexNodeKind::Anchor(AnchorKind::NotWordBoundary),
            'A' if !in_class => RegexNodeKind::Anchor(AnchorKind::SubjectStart),
            'z' if !in_class => RegexNodeKind::Anchor(AnchorKind::SubjectEnd),
            'Z' if !in_class => RegexNodeKind::Anchor(AnchorKind::SubjectEndOrNewline),
            'G' if !in_class => RegexNodeKind::Anchor(AnchorKind::FirstMatchPosition),
            'K' if !in_class => RegexNodeKind::Anchor(AnchorKind::ResetMatchStart),
            'E' => return Ok(None),
            'g' if !in_class => self.g_reference()?,
            'k' if !in_class => {
                let close = match self.bump() {
                    Some('<') => '>',
                    Some('\'') => '\'',
                    Some('{') => '}',
                    _ => return Err(self.error("\\k is not followed by a braced, angle-bracketed or quoted name")),
                };
                RegexNodeKind::BackReference(GroupReference::Named(self.group_name(close)?))
            }
            '1'..='9' if !in_class => {
                self.pos -= 1;
                let number = self.number().ok_or_else(|| self.error("group number is too big"))?;
                RegexNodeKind::BackReference(GroupReference::Number(number))
            }
            '0'..='7' => RegexNodeKind::Literal(self.octal(c)),
            'o' => {
                self.expect('{', "missing opening brace after \\o")?;
                let value = self.radix_digits(8, '}')?;
                RegexNodeKind::Literal(value)
            }
            'x' => RegexNodeKind::Literal(self.hex_escape()?),
            'c' => {
                let control = self.bump().ok_or_else(|| self.error("\\c at end of pattern"))?;
                let value = (control.to_ascii_uppercase() as u32) ^ 0x40;
                RegexNodeKind::Literal(char::from_u32(value).unwrap_or(control))
            }
            'a' => RegexNodeKind::Literal('\u{7}'),
            'e' => RegexNodeKind::Literal('\u{1b}'),
            'f' => RegexNodeKind::Literal('\u{c}'),
            'n' => RegexNodeKind::Literal('\n'),
            'r' => RegexNodeKind::Literal('\r'),
            't' => RegexNodeKind::Literal('\t'),
            other if other.is_ascii_alphanumeric() => return Err(self.error("unrecognized character follows \\")),
            other => RegexNodeKind::Literal(other),
        };
        Ok(Some(kind))
    }

    fn unicode_property(&mut self, negated: bool) -> Result<RegexNodeKind, RegexParseError> {
        let mut negated = negated;
        let name = if self.eat('{') {
            if self.eat('^') {
                negated = !negated;
            }
            let mut name = String::new();
            loop {
                match self.bump() {
                    Some('}') => break,
                    Some(c) => name.push(c),
                    None => return Err(self.error("malformed \\p or \\P sequence")),
                }
            }
            name
        } else {
            match self.bump() {
                Some(c) if c.is_ascii_alphabetic() => c.to_string(),
                _ => return Err(self.error("malformed \\p or \\P sequence")),
            }
        };
        if name.is_empty() {
            return Err(self.error("unknown property name after \\P or \\p"));
        }
        Ok(RegexNodeKind::UnicodeProperty { name, negated })
    }

    /// `\g1`, `\g{-1}`, `\g{name}` are back-references; `\g<..>` and
    /// `\g'..'` call a subpattern.
    fn g_reference(&mut self) -> Result<RegexNodeKind, RegexParseError> {
        match self.peek() {
            Some('<') | Some('\'') => {
                let close = if self.bump() == Some('<') { '>' } else { '\'' };
                let reference = self.reference_until(close)?;
                Ok(RegexNodeKind::SubroutineCall(reference))
            }
            Some('{') => {
                self.pos += 1;
                let reference = self.reference_until('}')?;
                Ok(RegexNodeKind::BackReference(reference))
            }
            _ => {
                let negative = self.eat('-');
                if !negative {
                    self.eat('+');
                }
                let number = self.number().ok_or_else(|| self.error("a numbered reference must not be zero"))?;
                Ok(RegexNodeKind::BackReference(self.numbered_reference(number, negative)?))
            }
        }
    }

    /// A number, signed relative number or name up to `close`.
    fn reference_until(&mut self, close: char) -> Result<GroupReference, RegexParseError> {
        let reference = match self.peek() {
            Some('-') | Some('+') => {
                let negative = self.bump() == Some('-');
                let number = self.number().ok_or_else(|| self.error("invalid relative reference"))?;
                self.relative_reference(number, negative)?
            }
            Some(c) if c.is_ascii_digit() => {
                let number = self.number().ok_or_else(|| self.error("group number is too big"))?;
                if number == 0 { GroupReference::Recursion } else { GroupReference::Number(number) }
            }
            _ => return self.group_name(close).map(GroupReference::Named),
        };
        self.expect(close, "missing terminator for subpattern reference")?;
        Ok(reference)
    }

    fn numbered_reference(&self, number: u32, negative: bool) -> Result<GroupReference, RegexParseError> {
        if negative {
            return self.relative_reference(number, true);
        }
        if number == 0 {
            return Err(self.error("a numbered reference must not be zero"));
        }
        Ok(GroupReference::Number(number))
    }

    fn relative_reference(&self, number: u32, negative: bool) -> Result<GroupReference, RegexParseError> {
        let value = i32::try_from(number).map_err(|_| self.error("group number is too big"))?;
        if value == 0 {
            return Err(self.error("a relative reference must not be zero"));
        }
        Ok(GroupReference::Relative(if negative { -value } else { value }))
    }

    /// A group name terminated by `close`, which is consumed.
    fn group_name(&mut self, close: char) -> Result<String, RegexParseError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == close {
                break;
            }
            if !(c.is_alphanumeric() || c == '_') {
                return Err(self.error("syntax error in subpattern name (missing terminator?)"));
            }
            name.push(c);
            self.pos += 1;
        }
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error("subpattern name expected"));
        }
        self.expect(close, "syntax error in subpattern name (missing terminator?)")?;
        Ok(name)
    }

    fn octal(&mut self, first: char) -> char {
        let mut value = first.to_digit(8).unwrap_or(0);
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(digit) => {
                    value = value * 8 + digit;
                    self.pos += 1;
                }
                None => break,
            }
        }
        char::from_u32(value).unwrap_or('\0')
    }

    fn hex_escape(&mut self) -> Result<char, RegexParseError> {
        if self.eat('{') {
            return self.radix_digits(16, '}');
        }
        let mut value = 0;
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(digit) => {
                    value = value * 16 + digit;
                    self.pos += 1;
                }
                None => break,
            }
        }
        Ok(char::from_u32(value).unwrap_or('\0'))
    }

    fn radix_digits(&mut self, radix: u32, close: char) -> Result<char, RegexParseError> {
        let mut value: u32 = 0;
        let mut any = false;
        while let Some(digit) = self.peek().and_then(|c| c.to_digit(radix)) {
            value = value
                .checked_mul(radix)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| self.error("character code point value is too large"))?;
            self.pos += 1;
            any = true;
        }
        if !any {
            return Err(self.error("digits missing in \\x{} or \\o{}"));
        }
        self.expect(close, "missing closing brace in character code")?;
        char::from_u32(value).ok_or_else(|| self.error("character code point value is too large"))
    }

    fn group(&mut self, start: usize) -> Result<RegexNode, RegexParseError> {
        let flags = self.flags;
        if self.peek() == Some('*') {
            return self.verb(start);
        }
        if !self.eat('?') {
            if self.flags.contains(RegexFlags::NO_AUTO_CAPTURE) {
                return self.group_body(start, GroupKind::NonCapturing);
            }
            self.group_count += 1;
            let index = self.group_count;
            return self.group_body(start, GroupKind::Capturing { index, name: None });
        }

        let Some(c) = self.peek() else {
            return Err(self.error("unrecognized character after (? or (?-"));
        };
        match c {
            '#' => {
                self.pos += 1;
                let mut text = String::new();
                loop {
                    match self.bump() {
                        Some(')') => break,
                        Some(c) => text.push(c),
                        None => return Err(self.error("missing ) after (?# comment")),
                    }
                }
                Ok(self.node(RegexNodeKind::Comment(text), start, flags))
            }
            ':' => {
                self.pos += 1;
                self.group_body(start, GroupKind::NonCapturing)
            }
            '>' => {
                self.pos += 1;
                self.group_body(start, GroupKind::Atomic)
            }
            '|' => {
                self.pos += 1;
                self.group_body(start, GroupKind::BranchReset)
            }
            '=' | '!' => {
                self.pos += 1;
                self.group_body(start, GroupKind::Lookahead { negated: c == '!' })
            }
            '<' if matches!(self.peek_at(1), Some('=' | '!')) => {
                let negated = self.peek_at(1) == Some('!');
                self.pos += 2;
                self.group_body(start, GroupKind::Lookbehind { negated })
            }
            '<' | '\'' => {
                self.pos += 1;
                let close = if c == '<' { '>' } else { '\'' };
                self.named_group(start, close)
            }
            'P' => {
                self.pos += 1;
                match self.bump() {
                    Some('<') => self.named_group(start, '>'),
                    Some('=') => {
                        let name = self.group_name(')')?;
                        Ok(self.node(RegexNodeKind::BackReference(GroupReference::Named(name)), start, flags))
                    }
                    Some('>') => {
                        let name = self.group_name(')')?;
                        Ok(self.node(RegexNodeKind::SubroutineCall(GroupReference::Named(name)), start, flags))
                    }
                    _ => Err(self.error("unrecognized character after (?P")),
                }
            }
            '&' => {
                self.pos += 1;
                let name = self.group_name(')')?;
                Ok(self.node(RegexNodeKind::SubroutineCall(GroupReference::Named(name)), start, flags))
            }
            'R' if self.peek_at(1) == Some(')') => {
                self.pos += 2;
                Ok(self.node(RegexNodeKind::SubroutineCall(GroupReference::Recursion), start, flags))
            }
            '0'..='9' | '+' | '-' if c != '-' || self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                let reference = self.reference_until(')')?;
                Ok(self.node(RegexNodeKind::SubroutineCall(reference), start, flags))
            }
            '(' => {
                self.pos += 1;
                self.conditional(start)
            }
            _ => self.flag_group(start),
        }
    }

    fn verb(&mut self, start: usize) -> Result<RegexNode, RegexParseError> {
        let flags = self.flags;
        self.pos += 1;
        let mut name = String::new();
        loop {
            match self.bump() {
                Some(')') => break,
                Some(c) => name.push(c),
                None => return Err(self.error("missing ) after (* verb")),
            }
        }
        Ok(self.node(RegexNodeKind::Verb(name), start, flags))
    }

    fn named_group(&mut self, start: usize, close: char) -> Result<RegexNode, RegexParseError> {
        let name = self.group_name(close)?;
        self.group_count += 1;
        let index = self.group_count;
        let duplicates = self.flags.contains(RegexFlags::DUPNAMES);
        if !duplicates && self.group_names.iter().any(|(n, _)| *n == name) {
            return Err(self.error("two named subpatterns have the same name"));
        }
        self.group_names.push((name.clone(), index));
        self.group_body(start, GroupKind::Capturing { index, name: Some(name) })
    }

    /// Parses the alternatives of a group and its closing parenthesis.
    /// Options changed inside the group end with it.
    fn group_body(&mut self, start: usize, kind: GroupKind) -> Result<RegexNode, RegexParseError> {
        let flags = self.flags;
        if let GroupKind::Flags { set, clear } = kind {
            self.flags = self.flags.difference(clear).union(set);
        }
        let body = self.disjunction(kind == GroupKind::BranchReset)?;
        self.expect(')', "missing closing parenthesis")?;
        self.flags = flags;
        Ok(self.node(RegexNodeKind::Group { kind, body: Box::new(body) }, start, flags))
    }

    /// `(?i)`, `(?-s)`, `(?^)` or the grouping form `(?i:...)`.
    fn flag_group(&mut self, start: usize) -> Result<RegexNode, RegexParseError> {
        let flags = self.flags;
        let mut set = RegexFlags::empty();
        let mut clear = RegexFlags::empty();
        let mut negate = false;
        if self.eat('^') {
            clear = RegexFlags::CASE_INSENSITIVE
                | RegexFlags::MULTILINE
                | RegexFlags::DOTALL
                | RegexFlags::EXTENDED
                | RegexFlags::EXTENDED_MORE
                | RegexFlags::NO_AUTO_CAPTURE;
        }
        loop {
            match self.bump() {
                Some(')') => {
                    self.flags = self.flags.difference(clear).union(set);
                    return Ok(self.node(RegexNodeKind::InlineFlags { set, clear }, start, flags));
                }
                Some(':') => return self.group_body(start, GroupKind::Flags { set, clear }),
                Some('-') if !negate => negate = true,
                Some('x') if self.peek() == Some('x') => {
                    self.pos += 1;
                    let both = RegexFlags::EXTENDED | RegexFlags::EXTENDED_MORE;
                    if negate { clear = clear | both } else { set = set | both }
                }
                Some(letter) => {
                    let flag =
                        RegexFlags::from_inline(letter).ok_or_else(|| self.error("unrecognized character after (? or (?-"))?;
                    if negate {
                        clear = clear | flag;
                        if flag == RegexFlags::EXTENDED {
                            clear = clear | RegexFlags::EXTENDED_MORE;
                        }
                    } else {
                        set = set | flag;
                    }
                }
                None => return Err(self.error("missing closing parenthesis")),
            }
        }
    }

    /// After `(?(`: the condition, the mandatory yes-branch and the
    /// optional `|` with its no-branch.
    fn conditional(&mut self, start: usize) -> Result<RegexNode, RegexParseError> {
        let flags = self.flags;
        let condition_start = self.pos - 1;
        let condition = if self.peek() == Some('?')
            && (matches!(self.peek_at(1), Some('=' | '!'))
                || (self.peek_at(1) == Some('<') && matches!(self.peek_at(2), Some('=' | '!'))))
        {
            let group = self.group(condition_start)?;
            if !matches!(&group.kind, RegexNodeKind::Group { kind, .. } if kind.is_lookaround()) {
                return Err(self.error("assertion expected after (?( or (?(?C)"));
            }
            group
        } else {
            let reference = self.condition_reference()?;
            self.expect(')', "malformed number or name after (?(")?;
            self.node(RegexNodeKind::ReferenceCondition(reference), condition_start, flags)
        };

        let yes = self.sequence()?;
        let mut pipe = None;
        let mut no = None;
        if self.peek() == Some('|') {
            let at = self.pos;
            self.pos += 1;
            pipe = Some(self.span_from(at));
            no = Some(Box::new(self.sequence()?));
            if self.peek() == Some('|') {
                return Err(self.error("conditional subpattern contains more than two branches"));
            }
        }
        self.expect(')', "missing closing parenthesis for condition")?;
        self.flags = flags;
        let kind = RegexNodeKind::Conditional { condition: Box::new(condition), yes: Box::new(yes), pipe, no };
        Ok(self.node(kind, start, flags))
    }

    fn condition_reference(&mut self) -> Result<ConditionReference, RegexParseError> {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let number = self.number().ok_or_else(|| self.error("group number is too big"))?;
                Ok(ConditionReference::Group(GroupReference::Number(number)))
            }
            Some('+' | '-') => {
                let negative = self.bump() == Some('-');
                let number = self.number().ok_or_else(|| self.error("malformed number or name after (?("))?;
                Ok(ConditionReference::Group(self.relative_reference(number, negative)?))
            }
            Some('<') | Some('\'') => {
                let close = if self.bump() == Some('<') { '>' } else { '\'' };
                Ok(ConditionReference::Group(GroupReference::Named(self.group_name(close)?)))
            }
            Some('R') => {
                self.pos += 1;
                match self.peek() {
                    Some(')') => Ok(ConditionReference::Recursion(None)),
                    Some('&') => {
                        self.pos += 1;
                        let name = self.bare_name()?;
                        Ok(ConditionReference::Recursion(Some(GroupReference::Named(name))))
                    }
                    Some(c) if c.is_ascii_digit() => {
                        let number = self.number().ok_or_else(|| self.error("group number is too big"))?;
                        Ok(ConditionReference::Recursion(Some(GroupReference::Number(number))))
                    }
                    // A group simply named `R...`.
                    _ => {
                        self.pos -= 1;
                        Ok(ConditionReference::Group(GroupReference::Named(self.bare_name()?)))
                    }
                }
            }
            _ if self.at_str("DEFINE)") => {
                self.pos += "DEFINE".len();
                Ok(ConditionReference::Define)
            }
            _ => Ok(ConditionReference::Group(GroupReference::Named(self.bare_name()?))),
        }
    }

    /// A name up to, not including, the next `)`.
    fn bare_name(&mut self) -> Result<String, RegexParseError> {
        let mut name = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            name.push(c);
            self.pos += 1;
        }
        if name.is_empty() {
            return Err(self.error("malformed number or name after (?("));
        }
        Ok(name)
    }

    fn character_class(&mut self, start: usize) -> Result<RegexNode, RegexParseError> {
        let flags = self.flags;
        let negated = self.eat('^');
        let mut items: Vec<RegexNode> = Vec::new();
        // A leading `]` is a literal.
        if self.peek() == Some(']') {
            let at = self.pos;
            self.pos += 1;
            items.push(self.node(RegexNodeKind::Literal(']'), at, flags));
        }
        // Inside `\Q...\E` every character is a plain member.
        let mut quoting = false;
        loop {
            if !quoting && self.flags.contains(RegexFlags::EXTENDED_MORE) {
                while self.peek().is_some_and(|c| c == ' ' || c == '\t') {
                    self.pos += 1;
                }
            }
            let Some(c) = self.peek() else {
                return Err(self.error("missing terminating ] for character class"));
            };
            if c == ']' && !quoting {
                self.pos += 1;
                break;
            }
            let item_start = self.pos;
            let Some(item) = self.class_item(&mut quoting)? else { continue };
            if quoting {
                items.push(item);
                continue;
            }

            // `a-z`; a `-` before `]` or after a class escape is literal.
            let range_start = match item.kind {
                RegexNodeKind::Literal(from) if self.peek() == Some('-') && !matches!(self.peek_at(1), Some(']') | None) => {
                    Some(from)
                }
                _ => None,
            };
            let Some(from) = range_start else {
                items.push(item);
                continue;
            };
            let dash = self.pos;
            self.pos += 1;
            let dash_node = RegexNode { kind: RegexNodeKind::Literal('-'), span: self.chars[dash].1, flags };
            match self.class_item(&mut quoting)? {
                Some(RegexNode { kind: RegexNodeKind::Literal(to), .. }) => {
                    if to < from {
                        return Err(self.error_at(item.span.start, "range out of order in character class"));
                    }
                    items.push(self.node(RegexNodeKind::CharacterRange { from, to }, item_start, flags));
                }
                Some(other) => items.extend([item, dash_node, other]),
                None => items.extend([item, dash_node]),
            }
        }
        Ok(self.node(RegexNodeKind::CharacterClass { negated, items }, start, flags))
    }

    /// One member of a bracket class. `None` for sequences that add no
    /// member, such as `\Q`, `\E` and ignored escapes.
    fn class_item(&mut self, quoting: &mut bool) -> Result<Option<RegexNode>, RegexParseError> {
        let start = self.pos;
        let flags = self.flags;
        if *quoting {
            if self.at_str("\\E") {
                self.pos += 2;
                *quoting = false;
                return Ok(None);
            }
            let Some(c) = self.bump() else {
                return Err(self.error("missing terminating ] for character class"));
            };
            return Ok(Some(self.node(RegexNodeKind::Literal(c), start, flags)));
        }
        if self.peek() == Some('[')
            && let Some(posix) = self.posix_class()
        {
            return Ok(Some(posix));
        }
        let Some(c) = self.bump() else {
            return Err(self.error("missing terminating ] for character class"));
        };
        let kind = if c == '\\' {
            if self.peek() == Some('Q') {
                self.pos += 1;
                *quoting = true;
                return Ok(None);
            }
            match self.escape(true)? {
                Some(kind) => kind,
                None => return Ok(None),
            }
        } else {
            RegexNodeKind::Literal(c)
        };
        Ok(Some(self.node(kind, start, flags)))
    }

    /// `[:name:]` or `[:^name:]`. Anything that does not close properly is
    /// left for ordinary class parsing, starting with a literal `[`.
    fn posix_class(&mut self) -> Option<RegexNode> {
        let start = self.pos;
        let flags = self.flags;
        if self.peek_at(1) != Some(':') {
            return None;
        }
        let mut i = 2;
        let negated = self.peek_at(i) == Some('^');
        if negated {
            i += 1;
        }
        let mut name = String::new();
        while let Some(c) = self.peek_at(i).filter(|c| c.is_ascii_alphabetic()) {
            name.push(c);
            i += 1;
        }
        if name.is_empty() || self.peek_at(i) != Some(':') || self.peek_at(i + 1) != Some(']') {
            return None;
        }
        self.pos += i + 2;
        Some(self.node(RegexNodeKind::PosixClass { name, negated }, start, flags))
    }
}
