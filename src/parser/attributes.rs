use crate::ast::{Attribute, AttributeGroup};
use crate::lexer::token::TokenKind;
use crate::parser::Parser;

impl<'src, 'ast> Parser<'src, 'ast> {
    /// Zero or more `#[...]` groups.
    pub(super) fn parse_attributes(&mut self) -> &'ast [AttributeGroup<'ast>] {
        let mut groups = Vec::new();
        while self.at(TokenKind::Attribute) {
            let start = self.start();
            self.bump();

            let mut attributes = Vec::new();
            while !self.at(TokenKind::CloseBracket) && !self.at(TokenKind::Eof) {
                let attribute_start = self.start();
                let name = self.parse_name();
                let args = if self.at(TokenKind::OpenParen) { self.parse_call_arguments() } else { &[] };
                attributes.push(Attribute { name, args, span: self.span_from(attribute_start) });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::CloseBracket, "expected ']'");

            groups.push(AttributeGroup {
                attributes: self.arena.alloc_slice_copy(&attributes),
                span: self.span_from(start),
            });
        }
        self.arena.alloc_slice_copy(&groups)
    }
}
