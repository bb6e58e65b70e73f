pub mod literal;
pub mod stream;
pub mod token;

pub use stream::{TokenStream, tokenize, tokenize_with};
use token::{Token, TokenKind};

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LexerMode {
    Standard,
    LookingForProperty,
}

/// Where scanning begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexerStart {
    /// Inline HTML until an opening tag, as for a file.
    #[default]
    Inline,
    /// Directly inside PHP code, as for a snippet.
    Scripting,
}

#[derive(Debug, Clone, PartialEq)]
enum LexerState {
    Initial,
    Scripting,
    DoubleQuotes,
    Backquote,
    Heredoc(Vec<u8>),
    Nowdoc(Vec<u8>),
    HaltCompiler,
    RawData,
    VarOffset,
}

/// `$var->prop` inside an interpolated string.
#[derive(Debug, Clone, Copy, PartialEq)]
enum StringProperty {
    None,
    Arrow,
    Name,
}

#[derive(Clone)]
pub struct Lexer<'src> {
    input: &'src [u8],
    cursor: usize,
    state_stack: Vec<LexerState>,
    mode: LexerMode,
    string_property: StringProperty,
    short_open_tag: bool,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src [u8]) -> Self {
        Self::with_start(input, LexerStart::Inline)
    }

    pub fn with_start(input: &'src [u8], start: LexerStart) -> Self {
        let state = match start {
            LexerStart::Inline => LexerState::Initial,
            LexerStart::Scripting => LexerState::Scripting,
        };
        Self {
            input,
            cursor: 0,
            state_stack: vec![state],
            mode: LexerMode::Standard,
            string_property: StringProperty::None,
            short_open_tag: false,
            finished: false,
        }
    }

    pub fn short_open_tag(mut self, enabled: bool) -> Self {
        self.short_open_tag = enabled;
        self
    }

    pub fn set_mode(&mut self, mode: LexerMode) {
        self.mode = mode;
    }

    pub fn input_slice(&self, span: Span) -> &'src [u8] {
        &self.input[span.start..span.end]
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.cursor).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.cursor + offset).copied()
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.cursor += n;
    }

    fn at_end(&self) -> bool {
        self.cursor >= self.input.len()
    }

    fn eof(&mut self) -> Token {
        self.finished = true;
        Token { kind: TokenKind::Eof, span: Span::new(self.input.len(), self.input.len()) }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) {
        while let Some(c) = self.peek() {
            if is_label_char(c) {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> TokenKind {
        let mut is_float = false;

        if self.peek() == Some(b'0') {
            self.advance();
            let radix_digit: Option<fn(u8) -> bool> = match self.peek() {
                Some(b'x' | b'X') => Some(|c: u8| c.is_ascii_hexdigit()),
                Some(b'b' | b'B') => Some(|c: u8| c == b'0' || c == b'1'),
                Some(b'o' | b'O') => Some(|c: u8| (b'0'..=b'7').contains(&c)),
                _ => None,
            };
            if let Some(is_digit) = radix_digit {
                if self.peek_at(1).is_some_and(is_digit) {
                    self.advance();
                    while let Some(c) = self.peek() {
                        if is_digit(c) || (c == b'_' && self.peek_at(1).is_some_and(is_digit)) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    return TokenKind::LNumber;
                }
                return TokenKind::LNumber;
            }
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == b'_' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                self.advance();
            } else if c == b'.' && !is_float && self.peek_at(1) != Some(b'.') {
                is_float = true;
                self.advance();
            } else if (c == b'e' || c == b'E')
                && (self.peek_at(1).is_some_and(|n| n.is_ascii_digit())
                    || (matches!(self.peek_at(1), Some(b'+' | b'-'))
                        && self.peek_at(2).is_some_and(|n| n.is_ascii_digit())))
            {
                is_float = true;
                self.advance_n(2);
                while let Some(d) = self.peek() {
                    if d.is_ascii_digit() || (d == b'_' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) {
                        self.advance();
                    } else {
                        break;
                    }
                }
                break;
            } else {
                break;
            }
        }

        if is_float { TokenKind::DNumber } else { TokenKind::LNumber }
    }

    fn consume_single_line_comment(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == b'\n' || c == b'\r' {
                break;
            } else if c == b'?' && self.peek_at(1) == Some(b'>') {
                // `?>` ends the comment as well as the PHP region
                break;
            }
            self.advance();
        }
        TokenKind::Comment
    }

    fn consume_multi_line_comment(&mut self) -> TokenKind {
        let is_doc = self.peek() == Some(b'*') && self.peek_at(1) != Some(b'/');
        if is_doc {
            self.advance();
        }

        match memchr::memmem::find(&self.input[self.cursor..], b"*/") {
            Some(idx) => self.advance_n(idx + 2),
            None => self.cursor = self.input.len(),
        }

        if is_doc { TokenKind::DocComment } else { TokenKind::Comment }
    }

    fn next_in_var_offset(&mut self) -> Token {
        let start = self.cursor;
        let Some(c) = self.peek() else {
            self.state_stack.pop();
            return self.next_token();
        };

        let kind = match c {
            b'[' => {
                self.advance();
                TokenKind::OpenBracket
            }
            b']' => {
                self.advance();
                self.state_stack.pop();
                TokenKind::CloseBracket
            }
            b'-' => {
                self.advance();
                TokenKind::Minus
            }
            b'$' if self.peek_at(1).is_some_and(is_label_start) => {
                self.advance();
                self.read_identifier();
                TokenKind::Variable
            }
            c if c.is_ascii_digit() => {
                while self.peek().is_some_and(|d| d.is_ascii_digit()) {
                    self.advance();
                }
                TokenKind::NumString
            }
            c if is_label_start(c) => {
                self.read_identifier();
                TokenKind::Identifier
            }
            _ => {
                // Malformed offset: let the enclosing string state take over.
                self.state_stack.pop();
                return self.next_token();
            }
        };

        Token { kind, span: Span::new(start, self.cursor) }
    }

    /// Interpolation at the cursor inside a string or heredoc, if any.
    fn interpolation_start(&mut self) -> Option<Token> {
        let start = self.cursor;
        match self.peek()? {
            b'$' if self.peek_at(1).is_some_and(is_label_start) => {
                self.advance();
                self.read_identifier();
                if self.peek() == Some(b'[') && self.peek_at(1).is_some_and(|c| c == b'$' || c == b'-' || is_label_char(c)) {
                    self.state_stack.push(LexerState::VarOffset);
                } else if self.peek() == Some(b'-')
                    && self.peek_at(1) == Some(b'>')
                    && self.peek_at(2).is_some_and(is_label_start)
                {
                    self.string_property = StringProperty::Arrow;
                }
                Some(Token { kind: TokenKind::Variable, span: Span::new(start, self.cursor) })
            }
            b'$' if self.peek_at(1) == Some(b'{') => {
                self.advance_n(2);
                self.state_stack.push(LexerState::Scripting);
                Some(Token { kind: TokenKind::DollarOpenCurlyBraces, span: Span::new(start, self.cursor) })
            }
            b'{' if self.peek_at(1) == Some(b'$') => {
                self.advance();
                self.state_stack.push(LexerState::Scripting);
                Some(Token { kind: TokenKind::CurlyOpen, span: Span::new(start, self.cursor) })
            }
            _ => None,
        }
    }

    fn string_property_token(&mut self) -> Option<Token> {
        let start = self.cursor;
        match self.string_property {
            StringProperty::None => None,
            StringProperty::Arrow => {
                self.advance_n(2);
                self.string_property = StringProperty::Name;
                Some(Token { kind: TokenKind::Arrow, span: Span::new(start, self.cursor) })
            }
            StringProperty::Name => {
                self.read_identifier();
                self.string_property = StringProperty::None;
                Some(Token { kind: TokenKind::Identifier, span: Span::new(start, self.cursor) })
            }
        }
    }

    fn starts_interpolation(&self, at: usize) -> bool {
        match self.input.get(at) {
            Some(b'$') => self.input.get(at + 1).is_some_and(|&c| is_label_start(c) || c == b'{'),
            Some(b'{') => self.input.get(at + 1) == Some(&b'$'),
            _ => false,
        }
    }

    fn next_in_double_quotes(&mut self) -> Token {
        if self.at_end() {
            return self.eof();
        }
        if let Some(token) = self.string_property_token() {
            return token;
        }

        let start = self.cursor;
        let closing = if matches!(self.state_stack.last(), Some(LexerState::Backquote)) { b'`' } else { b'"' };

        if self.peek() == Some(closing) {
            self.advance();
            self.state_stack.pop();
            let kind = if closing == b'"' { TokenKind::DoubleQuote } else { TokenKind::Backtick };
            return Token { kind, span: Span::new(start, self.cursor) };
        }

        if let Some(token) = self.interpolation_start() {
            return token;
        }

        while let Some(c) = self.peek() {
            if c == closing || self.starts_interpolation(self.cursor) {
                break;
            }
            if c == b'\\' && self.peek_at(1).is_some() {
                self.advance();
            }
            self.advance();
        }

        Token { kind: TokenKind::EncapsedAndWhitespace, span: Span::new(start, self.cursor) }
    }

    fn read_single_quoted(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == b'\'' {
                self.advance();
                return TokenKind::StringLiteral;
            } else if c == b'\\' {
                self.advance();
                if self.peek().is_some() {
                    self.advance();
                }
            } else {
                self.advance();
            }
        }
        TokenKind::Error
    }

    /// Scans a double-quoted or backquoted literal. Without interpolation the
    /// whole literal is one token, otherwise only the opening quote is returned
    /// and the string state is entered.
    fn read_double_quoted(&mut self, quote: u8, start_pos: usize) -> TokenKind {
        let opening = if quote == b'"' { TokenKind::DoubleQuote } else { TokenKind::Backtick };
        let state = if quote == b'"' { LexerState::DoubleQuotes } else { LexerState::Backquote };
        while let Some(c) = self.peek() {
            if c == quote {
                self.advance();
                return if quote == b'"' { TokenKind::StringLiteral } else { self.enter_string(start_pos, state, opening) };
            } else if c == b'\\' {
                self.advance();
                if self.peek().is_some() {
                    self.advance();
                }
            } else if self.starts_interpolation(self.cursor) {
                return self.enter_string(start_pos, state, opening);
            } else {
                self.advance();
            }
        }
        TokenKind::Error
    }

    fn enter_string(&mut self, start_pos: usize, state: LexerState, opening: TokenKind) -> TokenKind {
        self.cursor = start_pos + 1;
        self.state_stack.push(state);
        opening
    }

    fn read_heredoc_start(&mut self, start: usize) -> Token {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.advance();
        }

        let quote = self.peek();
        let is_quoted = quote == Some(b'\'') || quote == Some(b'"');
        let is_nowdoc = quote == Some(b'\'');
        if is_quoted {
            self.advance();
        }

        let label_start = self.cursor;
        self.read_identifier();
        let label = self.input[label_start..self.cursor].to_vec();

        if is_quoted && self.peek() == quote {
            self.advance();
        }

        match self.peek() {
            Some(b'\n') => self.advance(),
            Some(b'\r') => {
                self.advance();
                if self.peek() == Some(b'\n') {
                    self.advance();
                }
            }
            _ => {}
        }

        if is_nowdoc {
            self.state_stack.push(LexerState::Nowdoc(label));
        } else {
            self.state_stack.push(LexerState::Heredoc(label));
        }

        Token { kind: TokenKind::StartHeredoc, span: Span::new(start, self.cursor) }
    }

    /// Length of the closing label line at the cursor, indentation included.
    fn check_heredoc_end(&self, label: &[u8]) -> Option<usize> {
        let mut current = self.cursor;
        while matches!(self.input.get(current), Some(b' ' | b'\t')) {
            current += 1;
        }

        let after = current + label.len();
        if label.is_empty() || after > self.input.len() || &self.input[current..after] != label {
            return None;
        }
        match self.input.get(after) {
            Some(&c) if is_label_char(c) => None,
            _ => Some(after - self.cursor),
        }
    }

    fn is_followed_by_var_or_vararg(&self) -> bool {
        let mut cursor = self.cursor;
        while cursor < self.input.len() {
            let c = self.input[cursor];
            if c.is_ascii_whitespace() {
                cursor += 1;
                continue;
            }

            if c == b'#' || (c == b'/' && self.input.get(cursor + 1) == Some(&b'/')) {
                while cursor < self.input.len() && self.input[cursor] != b'\n' {
                    cursor += 1;
                }
                continue;
            }
            if c == b'/' && self.input.get(cursor + 1) == Some(&b'*') {
                cursor = match memchr::memmem::find(&self.input[cursor + 2..], b"*/") {
                    Some(idx) => cursor + 2 + idx + 2,
                    None => self.input.len(),
                };
                continue;
            }

            if c == b'$' {
                return self.input.get(cursor + 1).is_some_and(|&n| is_label_start(n));
            }
            return self.input[cursor..].starts_with(b"...");
        }
        false
    }

    fn next_in_nowdoc(&mut self, label: Vec<u8>) -> Token {
        if self.at_end() {
            return self.eof();
        }

        let start = self.cursor;
        if let Some(len) = self.check_heredoc_end(&label) {
            self.advance_n(len);
            self.state_stack.pop();
            return Token { kind: TokenKind::EndHeredoc, span: Span::new(start, self.cursor) };
        }

        while let Some(c) = self.peek() {
            self.advance();
            if c == b'\n' && self.check_heredoc_end(&label).is_some() {
                break;
            }
        }

        Token { kind: TokenKind::EncapsedAndWhitespace, span: Span::new(start, self.cursor) }
    }

    fn next_in_heredoc(&mut self, label: Vec<u8>) -> Token {
        if self.at_end() {
            return self.eof();
        }
        if let Some(token) = self.string_property_token() {
            return token;
        }

        let start = self.cursor;
        let at_line_start = start == 0 || matches!(self.input[start - 1], b'\n' | b'\r');
        if at_line_start && let Some(len) = self.check_heredoc_end(&label) {
            self.advance_n(len);
            self.state_stack.pop();
            return Token { kind: TokenKind::EndHeredoc, span: Span::new(start, self.cursor) };
        }

        if let Some(token) = self.interpolation_start() {
            return token;
        }

        while let Some(c) = self.peek() {
            if self.starts_interpolation(self.cursor) {
                break;
            }
            self.advance();
            if c == b'\\' && self.peek().is_some_and(|n| n != b'\n') {
                self.advance();
            }
            if c == b'\n' && self.check_heredoc_end(&label).is_some() {
                break;
            }
        }

        Token { kind: TokenKind::EncapsedAndWhitespace, span: Span::new(start, self.cursor) }
    }

    fn next_in_halt_compiler(&mut self) -> Token {
        self.skip_whitespace();
        if self.at_end() {
            return self.eof();
        }

        let start = self.cursor;
        let c = self.input[self.cursor];
        self.advance();

        let kind = match c {
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b';' => {
                self.state_stack.pop();
                self.state_stack.push(LexerState::RawData);
                TokenKind::SemiColon
            }
            b'?' if self.peek() == Some(b'>') => {
                self.advance();
                self.state_stack.pop();
                self.state_stack.push(LexerState::RawData);
                TokenKind::CloseTag
            }
            b'#' => self.consume_single_line_comment(),
            b'/' if self.peek() == Some(b'/') => {
                self.advance();
                self.consume_single_line_comment()
            }
            b'/' if self.peek() == Some(b'*') => {
                self.advance();
                self.consume_multi_line_comment()
            }
            _ => TokenKind::Error,
        };

        Token { kind, span: Span::new(start, self.cursor) }
    }

    /// Length of the opening tag at the cursor, with its kind.
    fn open_tag_at(&self) -> Option<(TokenKind, usize)> {
        let rest = &self.input[self.cursor..];
        if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case(b"<?php") {
            return match rest.get(5) {
                None => Some((TokenKind::OpenTag, 5)),
                Some(b'\r') if rest.get(6) == Some(&b'\n') => Some((TokenKind::OpenTag, 7)),
                Some(c) if c.is_ascii_whitespace() => Some((TokenKind::OpenTag, 6)),
                _ if self.short_open_tag => Some((TokenKind::OpenTag, 2)),
                _ => None,
            };
        }
        if rest.starts_with(b"<?=") {
            return Some((TokenKind::OpenTagEcho, 3));
        }
        if self.short_open_tag && rest.starts_with(b"<?") {
            return Some((TokenKind::OpenTag, 2));
        }
        None
    }

    fn next_in_initial(&mut self) -> Token {
        let start = self.cursor;
        while let Some(idx) = memchr::memchr(b'<', &self.input[self.cursor..]) {
            self.cursor += idx;
            if let Some((kind, len)) = self.open_tag_at() {
                if self.cursor > start {
                    return Token { kind: TokenKind::InlineHtml, span: Span::new(start, self.cursor) };
                }
                self.state_stack.pop();
                self.state_stack.push(LexerState::Scripting);
                self.advance_n(len);
                return Token { kind, span: Span::new(start, self.cursor) };
            }
            self.advance();
        }

        self.cursor = self.input.len();
        if self.cursor > start {
            return Token { kind: TokenKind::InlineHtml, span: Span::new(start, self.cursor) };
        }
        self.eof()
    }

    fn next_token(&mut self) -> Token {
        match self.state_stack.last().cloned() {
            Some(LexerState::Initial) => return self.next_in_initial(),
            Some(LexerState::DoubleQuotes | LexerState::Backquote) => return self.next_in_double_quotes(),
            Some(LexerState::Heredoc(label)) => return self.next_in_heredoc(label),
            Some(LexerState::Nowdoc(label)) => return self.next_in_nowdoc(label),
            Some(LexerState::HaltCompiler) => return self.next_in_halt_compiler(),
            Some(LexerState::VarOffset) => return self.next_in_var_offset(),
            Some(LexerState::RawData) => {
                if self.at_end() {
                    return self.eof();
                }
                let start = self.cursor;
                self.cursor = self.input.len();
                return Token { kind: TokenKind::InlineHtml, span: Span::new(start, self.cursor) };
            }
            Some(LexerState::Scripting) | None => {}
        }

        self.skip_whitespace();
        if self.at_end() {
            return self.eof();
        }

        let looking_for_property = std::mem::replace(&mut self.mode, LexerMode::Standard) == LexerMode::LookingForProperty;
        let start = self.cursor;
        let char = self.input[self.cursor];
        self.advance();

        let kind = match char {
            b'$' => {
                if self.peek().is_some_and(is_label_start) {
                    self.read_identifier();
                    TokenKind::Variable
                } else {
                    TokenKind::Dollar
                }
            }
            b'\\' => TokenKind::NsSeparator,
            b'\'' => self.read_single_quoted(),
            b'"' => self.read_double_quoted(b'"', start),
            b'`' => self.read_double_quoted(b'`', start),
            b'#' => {
                if self.peek() == Some(b'[') {
                    self.advance();
                    TokenKind::Attribute
                } else {
                    self.consume_single_line_comment()
                }
            }
            b';' => TokenKind::SemiColon,
            b':' => {
                if self.peek() == Some(b':') {
                    self.advance();
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            b',' => TokenKind::Comma,
            b'{' => {
                self.state_stack.push(LexerState::Scripting);
                TokenKind::OpenBrace
            }
            b'}' => {
                if self.state_stack.len() > 1 {
                    self.state_stack.pop();
                }
                TokenKind::CloseBrace
            }
            b'(' => self.read_cast().unwrap_or(TokenKind::OpenParen),
            b')' => TokenKind::CloseParen,
            b'[' => TokenKind::OpenBracket,
            b']' => TokenKind::CloseBracket,
            b'+' => match self.peek() {
                Some(b'+') => { self.advance(); TokenKind::Inc }
                Some(b'=') => { self.advance(); TokenKind::PlusEq }
                _ => TokenKind::Plus,
            },
            b'-' => match self.peek() {
                Some(b'>') => {
                    self.advance();
                    self.mode = LexerMode::LookingForProperty;
                    TokenKind::Arrow
                }
                Some(b'-') => { self.advance(); TokenKind::Dec }
                Some(b'=') => { self.advance(); TokenKind::MinusEq }
                _ => TokenKind::Minus,
            },
            b'*' => match self.peek() {
                Some(b'*') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::PowEq
                    } else {
                        TokenKind::Pow
                    }
                }
                Some(b'=') => { self.advance(); TokenKind::MulEq }
                _ => TokenKind::Asterisk,
            },
            b'/' => match self.peek() {
                Some(b'/') => {
                    self.advance();
                    self.consume_single_line_comment()
                }
                Some(b'*') => {
                    self.advance();
                    self.consume_multi_line_comment()
                }
                Some(b'=') => { self.advance(); TokenKind::DivEq }
                _ => TokenKind::Slash,
            },
            b'%' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::ModEq
                } else {
                    TokenKind::Percent
                }
            }
            b'.' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::ConcatEq
                } else if self.peek() == Some(b'.') && self.peek_at(1) == Some(b'.') {
                    self.advance_n(2);
                    TokenKind::Ellipsis
                } else if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.cursor -= 1;
                    self.read_number()
                } else {
                    TokenKind::Dot
                }
            }
            b'=' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                }
                Some(b'>') => { self.advance(); TokenKind::DoubleArrow }
                _ => TokenKind::Eq,
            },
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.peek() == Some(b'<') && self.peek_at(1) == Some(b'<') && self.heredoc_label_follows(self.cursor + 2) {
                    self.advance_n(2);
                    return self.read_heredoc_start(start);
                }
                match self.peek() {
                    Some(b'=') => {
                        self.advance();
                        if self.peek() == Some(b'>') {
                            self.advance();
                            TokenKind::Spaceship
                        } else {
                            TokenKind::LtEq
                        }
                    }
                    Some(b'<') => {
                        self.advance();
                        if self.peek() == Some(b'=') {
                            self.advance();
                            TokenKind::SlEq
                        } else {
                            TokenKind::Sl
                        }
                    }
                    Some(b'>') => { self.advance(); TokenKind::BangEq }
                    _ => TokenKind::Lt,
                }
            }
            b'>' => match self.peek() {
                Some(b'=') => { self.advance(); TokenKind::GtEq }
                Some(b'>') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::SrEq
                    } else {
                        TokenKind::Sr
                    }
                }
                _ => TokenKind::Gt,
            },
            b'&' => match self.peek() {
                Some(b'&') => { self.advance(); TokenKind::AmpersandAmpersand }
                Some(b'=') => { self.advance(); TokenKind::AndEq }
                _ if self.is_followed_by_var_or_vararg() => TokenKind::AmpersandFollowedByVarOrVararg,
                _ => TokenKind::AmpersandNotFollowedByVarOrVararg,
            },
            b'|' => match self.peek() {
                Some(b'|') => { self.advance(); TokenKind::PipePipe }
                Some(b'=') => { self.advance(); TokenKind::OrEq }
                _ => TokenKind::Pipe,
            },
            b'^' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::XorEq
                } else {
                    TokenKind::Caret
                }
            }
            b'~' => TokenKind::BitNot,
            b'@' => TokenKind::At,
            b'?' => match self.peek() {
                Some(b'>') => {
                    self.advance();
                    self.state_stack.pop();
                    self.state_stack.push(LexerState::Initial);
                    match self.peek() {
                        Some(b'\n') => self.advance(),
                        Some(b'\r') => {
                            self.advance();
                            if self.peek() == Some(b'\n') {
                                self.advance();
                            }
                        }
                        _ => {}
                    }
                    TokenKind::CloseTag
                }
                Some(b'?') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::CoalesceEq
                    } else {
                        TokenKind::Coalesce
                    }
                }
                Some(b'-') if self.peek_at(1) == Some(b'>') => {
                    self.advance_n(2);
                    self.mode = LexerMode::LookingForProperty;
                    TokenKind::NullSafeArrow
                }
                _ => TokenKind::Question,
            },
            c if c.is_ascii_digit() => {
                self.cursor -= 1;
                self.read_number()
            }
            c if is_label_start(c) => {
                if (c == b'b' || c == b'B') && !looking_for_property {
                    if self.peek() == Some(b'\'') {
                        self.advance();
                        return Token { kind: self.read_single_quoted(), span: Span::new(start, self.cursor) };
                    } else if self.peek() == Some(b'"') {
                        let quote_pos = self.cursor;
                        self.advance();
                        return Token { kind: self.read_double_quoted(b'"', quote_pos), span: Span::new(start, self.cursor) };
                    }
                }

                self.read_identifier();
                if looking_for_property {
                    TokenKind::Identifier
                } else {
                    self.keyword_or_identifier(start)
                }
            }
            _ => TokenKind::Error,
        };

        if looking_for_property && matches!(kind, TokenKind::Comment | TokenKind::DocComment) {
            self.mode = LexerMode::LookingForProperty;
        }

        Token { kind, span: Span::new(start, self.cursor) }
    }

    fn heredoc_label_follows(&self, mut at: usize) -> bool {
        while matches!(self.input.get(at), Some(b' ' | b'\t')) {
            at += 1;
        }
        if matches!(self.input.get(at), Some(b'\'' | b'"')) {
            at += 1;
        }
        self.input.get(at).is_some_and(|&c| is_label_start(c))
    }

    fn read_cast(&mut self) -> Option<TokenKind> {
        let saved_cursor = self.cursor;
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.advance();
        }

        let start_ident = self.cursor;
        self.read_identifier();
        let ident = &self.input[start_ident..self.cursor];
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.advance();
        }

        let cast_kind = if !ident.is_empty() && self.peek() == Some(b')') {
            match ident.to_ascii_lowercase().as_slice() {
                b"int" | b"integer" => Some(TokenKind::IntCast),
                b"bool" | b"boolean" => Some(TokenKind::BoolCast),
                b"float" | b"double" | b"real" => Some(TokenKind::FloatCast),
                b"string" | b"binary" => Some(TokenKind::StringCast),
                b"array" => Some(TokenKind::ArrayCast),
                b"object" => Some(TokenKind::ObjectCast),
                b"unset" => Some(TokenKind::UnsetCast),
                _ => None,
            }
        } else {
            None
        };

        match cast_kind {
            Some(kind) => {
                self.advance();
                Some(kind)
            }
            None => {
                self.cursor = saved_cursor;
                None
            }
        }
    }

    /// `from` after `yield`, separated by whitespace only.
    fn yield_from_len(&self) -> Option<usize> {
        let mut at = self.cursor;
        while self.input.get(at).is_some_and(|c| c.is_ascii_whitespace()) {
            at += 1;
        }
        if at == self.cursor || at + 4 > self.input.len() || !self.input[at..at + 4].eq_ignore_ascii_case(b"from") {
            return None;
        }
        match self.input.get(at + 4) {
            Some(&c) if is_label_char(c) => None,
            _ => Some(at + 4 - self.cursor),
        }
    }

    /// `enum` is a keyword only when a declaration name follows.
    fn enum_declaration_follows(&self) -> bool {
        let mut at = self.cursor;
        while self.input.get(at).is_some_and(|c| c.is_ascii_whitespace()) {
            at += 1;
        }
        if at == self.cursor || !self.input.get(at).is_some_and(|&c| is_label_start(c)) {
            return false;
        }
        let end = at + self.input[at..].iter().take_while(|&&c| is_label_char(c)).count();
        let word = self.input[at..end].to_ascii_lowercase();
        word != b"extends" && word != b"implements"
    }

    fn keyword_or_identifier(&mut self, start: usize) -> TokenKind {
        let text = self.input[start..self.cursor].to_ascii_lowercase();
        match text.as_slice() {
            b"or" => TokenKind::LogicalOr,
            b"and" => TokenKind::LogicalAnd,
            b"xor" => TokenKind::LogicalXor,
            b"bool" => TokenKind::TypeBool,
            b"int" => TokenKind::TypeInt,
            b"float" => TokenKind::TypeFloat,
            b"string" => TokenKind::TypeString,
            b"mixed" => TokenKind::TypeMixed,
            b"never" => TokenKind::TypeNever,
            b"null" => TokenKind::TypeNull,
            b"false" => TokenKind::TypeFalse,
            b"true" => TokenKind::TypeTrue,
            b"callable" => TokenKind::TypeCallable,
            b"iterable" => TokenKind::TypeIterable,
            b"void" => TokenKind::TypeVoid,
            b"object" => TokenKind::TypeObject,
            b"exit" | b"die" => TokenKind::Exit,
            b"function" => TokenKind::Function,
            b"fn" => TokenKind::Fn,
            b"const" => TokenKind::Const,
            b"return" => TokenKind::Return,
            b"yield" => match self.yield_from_len() {
                Some(len) => {
                    self.advance_n(len);
                    TokenKind::YieldFrom
                }
                None => TokenKind::Yield,
            },
            b"try" => TokenKind::Try,
            b"catch" => TokenKind::Catch,
            b"finally" => TokenKind::Finally,
            b"throw" => TokenKind::Throw,
            b"if" => TokenKind::If,
            b"elseif" => TokenKind::ElseIf,
            b"endif" => TokenKind::EndIf,
            b"else" => TokenKind::Else,
            b"while" => TokenKind::While,
            b"endwhile" => TokenKind::EndWhile,
            b"do" => TokenKind::Do,
            b"for" => TokenKind::For,
            b"endfor" => TokenKind::EndFor,
            b"foreach" => TokenKind::Foreach,
            b"endforeach" => TokenKind::EndForeach,
            b"declare" => TokenKind::Declare,
            b"enddeclare" => TokenKind::EndDeclare,
            b"instanceof" => TokenKind::InstanceOf,
            b"insteadof" => TokenKind::Insteadof,
            b"as" => TokenKind::As,
            b"switch" => TokenKind::Switch,
            b"endswitch" => TokenKind::EndSwitch,
            b"case" => TokenKind::Case,
            b"default" => TokenKind::Default,
            b"break" => TokenKind::Break,
            b"continue" => TokenKind::Continue,
            b"goto" => TokenKind::Goto,
            b"echo" => TokenKind::Echo,
            b"print" => TokenKind::Print,
            b"enum" if self.enum_declaration_follows() => TokenKind::Enum,
            b"class" => TokenKind::Class,
            b"interface" => TokenKind::Interface,
            b"trait" => TokenKind::Trait,
            b"extends" => TokenKind::Extends,
            b"implements" => TokenKind::Implements,
            b"new" => TokenKind::New,
            b"clone" => TokenKind::Clone,
            b"var" => TokenKind::Var,
            b"public" => TokenKind::Public,
            b"protected" => TokenKind::Protected,
            b"private" => TokenKind::Private,
            b"final" => TokenKind::Final,
            b"abstract" => TokenKind::Abstract,
            b"static" => TokenKind::Static,
            b"readonly" => TokenKind::Readonly,
            b"namespace" => TokenKind::Namespace,
            b"use" => TokenKind::Use,
            b"global" => TokenKind::Global,
            b"isset" => TokenKind::Isset,
            b"empty" => TokenKind::Empty,
            b"__halt_compiler" => {
                self.state_stack.pop();
                self.state_stack.push(LexerState::HaltCompiler);
                TokenKind::HaltCompiler
            }
            b"__class__" => TokenKind::ClassC,
            b"__trait__" => TokenKind::TraitC,
            b"__function__" => TokenKind::FuncC,
            b"__method__" => TokenKind::MethodC,
            b"__line__" => TokenKind::Line,
            b"__file__" => TokenKind::File,
            b"__dir__" => TokenKind::Dir,
            b"__namespace__" => TokenKind::NsC,
            b"array" => TokenKind::Array,
            b"match" => TokenKind::Match,
            b"list" => TokenKind::List,
            b"include" => TokenKind::Include,
            b"include_once" => TokenKind::IncludeOnce,
            b"require" => TokenKind::Require,
            b"require_once" => TokenKind::RequireOnce,
            b"eval" => TokenKind::Eval,
            b"unset" => TokenKind::Unset,
            _ => TokenKind::Identifier,
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    /// Yields tokens up to and including a single `Eof`.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        Some(self.next_token())
    }
}

fn is_label_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_label_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src.as_bytes()).map(|t| t.kind).collect()
    }

    #[test]
    fn alternative_syntax_terminators() {
        assert_eq!(
            kinds("<?php endif endwhile endfor endforeach endswitch enddeclare"),
            vec![
                TokenKind::OpenTag,
                TokenKind::EndIf,
                TokenKind::EndWhile,
                TokenKind::EndFor,
                TokenKind::EndForeach,
                TokenKind::EndSwitch,
                TokenKind::EndDeclare,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn property_names_after_arrow_are_identifiers() {
        assert_eq!(
            kinds("<?php $a->class?->list"),
            vec![
                TokenKind::OpenTag,
                TokenKind::Variable,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::NullSafeArrow,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn enum_is_contextual() {
        assert_eq!(kinds("<?php enum Suit {}")[1], TokenKind::Enum);
        assert_eq!(kinds("<?php enum(1);")[1], TokenKind::Identifier);
    }

    #[test]
    fn unterminated_heredoc_stops_at_end_of_input() {
        let tokens = kinds("<?php <<<EOT\nabc");
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
        assert_eq!(tokens.iter().filter(|k| **k == TokenKind::Eof).count(), 1);
    }

    #[test]
    fn close_tag_swallows_one_newline() {
        let tokens: Vec<Token> = Lexer::new(b"<?php ?>\n\nx").collect();
        assert_eq!(tokens[1].kind, TokenKind::CloseTag);
        assert_eq!(tokens[1].span, Span::new(6, 9));
        assert_eq!(tokens[2].span, Span::new(9, 11));
    }
}
