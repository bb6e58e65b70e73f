//! Depth-first traversal over the syntax tree.
//!
//! Every hook defaults to walking the node's children in source order, so an
//! implementation only overrides the node kinds it cares about and calls the
//! matching `walk_*` function to keep descending.

use crate::ast::*;

pub trait Visitor<'ast> {
    fn visit_program(&mut self, program: &'ast Program<'ast>) {
        walk_program(self, program);
    }

    fn visit_stmt(&mut self, stmt: StmtId<'ast>) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: ExprId<'ast>) {
        walk_expr(self, expr);
    }

    fn visit_param(&mut self, param: &'ast Param<'ast>) {
        walk_children(self, AstNode::Param(param));
    }

    fn visit_arg(&mut self, arg: &'ast Arg<'ast>) {
        walk_children(self, AstNode::Arg(arg));
    }

    fn visit_array_item(&mut self, item: &'ast ArrayItem<'ast>) {
        walk_children(self, AstNode::ArrayItem(item));
    }

    fn visit_closure_use(&mut self, usage: &'ast ClosureUse<'ast>) {
        walk_children(self, AstNode::ClosureUse(usage));
    }

    fn visit_match_arm(&mut self, arm: &'ast MatchArm<'ast>) {
        walk_children(self, AstNode::MatchArm(arm));
    }

    fn visit_case(&mut self, case: &'ast Case<'ast>) {
        walk_children(self, AstNode::Case(case));
    }

    fn visit_catch(&mut self, catch: &'ast Catch<'ast>) {
        walk_children(self, AstNode::Catch(catch));
    }

    fn visit_class_member(&mut self, member: &'ast ClassMember<'ast>) {
        walk_children(self, AstNode::ClassMember(member));
    }

    fn visit_property_entry(&mut self, entry: &'ast PropertyEntry<'ast>) {
        walk_children(self, AstNode::PropertyEntry(entry));
    }

    fn visit_static_var(&mut self, var: &'ast StaticVar<'ast>) {
        walk_children(self, AstNode::StaticVar(var));
    }

    fn visit_use_item(&mut self, item: &'ast UseItem<'ast>) {
        walk_children(self, AstNode::UseItem(item));
    }

    fn visit_class_const(&mut self, constant: &'ast ClassConst<'ast>) {
        walk_children(self, AstNode::ClassConst(constant));
    }

    fn visit_declare_item(&mut self, item: &'ast DeclareItem<'ast>) {
        walk_children(self, AstNode::DeclareItem(item));
    }

    fn visit_trait_adaptation(&mut self, adaptation: &'ast TraitAdaptation<'ast>) {
        walk_children(self, AstNode::TraitAdaptation(adaptation));
    }

    fn visit_trait_method_ref(&mut self, method: &'ast TraitMethodRef<'ast>) {
        walk_children(self, AstNode::TraitMethodRef(method));
    }

    fn visit_attribute_group(&mut self, group: &'ast AttributeGroup<'ast>) {
        walk_children(self, AstNode::AttributeGroup(group));
    }

    fn visit_attribute(&mut self, attribute: &'ast Attribute<'ast>) {
        walk_children(self, AstNode::Attribute(attribute));
    }

    fn visit_name(&mut self, name: &'ast Name<'ast>) {
        walk_children(self, AstNode::Name(name));
    }

    fn visit_type(&mut self, ty: &'ast Type<'ast>) {
        walk_children(self, AstNode::Type(ty));
    }

    fn visit_ident(&mut self, _ident: &'ast Ident<'ast>) {}
}

/// Routes `node` to the hook for its kind.
pub fn visit_node<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, node: AstNode<'ast>) {
    match node {
        AstNode::Program(n) => visitor.visit_program(n),
        AstNode::Stmt(n) => visitor.visit_stmt(n),
        AstNode::Expr(n) => visitor.visit_expr(n),
        AstNode::Param(n) => visitor.visit_param(n),
        AstNode::Arg(n) => visitor.visit_arg(n),
        AstNode::ArrayItem(n) => visitor.visit_array_item(n),
        AstNode::ClosureUse(n) => visitor.visit_closure_use(n),
        AstNode::MatchArm(n) => visitor.visit_match_arm(n),
        AstNode::Case(n) => visitor.visit_case(n),
        AstNode::Catch(n) => visitor.visit_catch(n),
        AstNode::ClassMember(n) => visitor.visit_class_member(n),
        AstNode::PropertyEntry(n) => visitor.visit_property_entry(n),
        AstNode::StaticVar(n) => visitor.visit_static_var(n),
        AstNode::UseItem(n) => visitor.visit_use_item(n),
        AstNode::ClassConst(n) => visitor.visit_class_const(n),
        AstNode::DeclareItem(n) => visitor.visit_declare_item(n),
        AstNode::TraitAdaptation(n) => visitor.visit_trait_adaptation(n),
        AstNode::TraitMethodRef(n) => visitor.visit_trait_method_ref(n),
        AstNode::AttributeGroup(n) => visitor.visit_attribute_group(n),
        AstNode::Attribute(n) => visitor.visit_attribute(n),
        AstNode::Name(n) => visitor.visit_name(n),
        AstNode::Type(n) => visitor.visit_type(n),
        AstNode::Ident(n) => visitor.visit_ident(n),
    }
}

pub fn walk_children<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, node: AstNode<'ast>) {
    for child in node.children().into_iter().flatten() {
        visit_node(visitor, child);
    }
}

pub fn walk_program<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, program: &'ast Program<'ast>) {
    for stmt in program.statements {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, stmt: StmtId<'ast>) {
    walk_children(visitor, AstNode::Stmt(stmt));
}

pub fn walk_expr<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, expr: ExprId<'ast>) {
    walk_children(visitor, AstNode::Expr(expr));
}
