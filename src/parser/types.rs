use crate::ast::{Ident, Type};
use crate::lexer::token::TokenKind;
use crate::parser::Parser;

impl<'src, 'ast> Parser<'src, 'ast> {
    /// `?T`, `A|B`, `A&B` and the disjunctive normal form `(A&B)|null`.
    pub(crate) fn parse_type(&mut self) -> Type<'ast> {
        let start = self.start();
        if self.eat(TokenKind::Question) {
            let inner = self.parse_type_atomic();
            return Type::Nullable { ty: self.arena.alloc(inner), span: self.span_from(start) };
        }

        let first = self.parse_type_intersection();
        if !self.at(TokenKind::Pipe) {
            return first;
        }
        let mut types = vec![first];
        while self.eat(TokenKind::Pipe) {
            types.push(self.parse_type_intersection());
        }
        Type::Union { types: self.arena.alloc_slice_copy(&types), span: self.span_from(start) }
    }

    fn parse_type_intersection(&mut self) -> Type<'ast> {
        let start = self.start();
        let first = self.parse_type_atomic();
        // `A & $x` is a by-reference parameter, not an intersection.
        if !self.at(TokenKind::AmpersandNotFollowedByVarOrVararg) {
            return first;
        }
        let mut types = vec![first];
        while self.eat(TokenKind::AmpersandNotFollowedByVarOrVararg) {
            types.push(self.parse_type_atomic());
        }
        Type::Intersection { types: self.arena.alloc_slice_copy(&types), span: self.span_from(start) }
    }

    fn parse_type_atomic(&mut self) -> Type<'ast> {
        let start = self.start();
        match self.current_token.kind {
            TokenKind::OpenParen => {
                self.bump();
                let inner = self.parse_type_intersection();
                self.expect(TokenKind::CloseParen, "expected ')'");
                inner.with_span(self.span_from(start))
            }
            TokenKind::Array | TokenKind::Static => Type::Simple(self.ident()),
            kind if kind.is_type_keyword() => Type::Simple(self.ident()),
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace => Type::Named(self.parse_name()),
            _ => {
                self.error("expected type");
                Type::Simple(Ident { value: "", span: self.current_token.span })
            }
        }
    }
}
