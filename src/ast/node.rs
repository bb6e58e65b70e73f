use super::*;
use crate::lexer::stream::TokenStream;
use crate::lexer::token::SyntaxToken;

/// A reference to any node of the tree, the unit that visitors, parent
/// links, symbols and control flow blocks all work with.
#[derive(Debug, Clone, Copy)]
pub enum AstNode<'a> {
    Program(&'a Program<'a>),
    Stmt(StmtId<'a>),
    Expr(ExprId<'a>),
    Param(&'a Param<'a>),
    Arg(&'a Arg<'a>),
    ArrayItem(&'a ArrayItem<'a>),
    ClosureUse(&'a ClosureUse<'a>),
    MatchArm(&'a MatchArm<'a>),
    Case(&'a Case<'a>),
    Catch(&'a Catch<'a>),
    ClassMember(&'a ClassMember<'a>),
    PropertyEntry(&'a PropertyEntry<'a>),
    StaticVar(&'a StaticVar<'a>),
    UseItem(&'a UseItem<'a>),
    ClassConst(&'a ClassConst<'a>),
    DeclareItem(&'a DeclareItem<'a>),
    TraitAdaptation(&'a TraitAdaptation<'a>),
    TraitMethodRef(&'a TraitMethodRef<'a>),
    AttributeGroup(&'a AttributeGroup<'a>),
    Attribute(&'a Attribute<'a>),
    Name(&'a Name<'a>),
    Type(&'a Type<'a>),
    Ident(&'a Ident<'a>),
}

/// Identity of a node: its kind and arena address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    tag: u8,
    addr: usize,
}

impl<'a> PartialEq for AstNode<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<'a> Eq for AstNode<'a> {}

impl<'a> std::hash::Hash for AstNode<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state)
    }
}

fn addr<T>(value: &T) -> usize {
    value as *const T as usize
}

type Children<'a> = Vec<Option<AstNode<'a>>>;

fn push_stmts<'a>(out: &mut Children<'a>, stmts: &'a [StmtId<'a>]) {
    out.extend(stmts.iter().map(|s| Some(AstNode::Stmt(s))));
}

fn push_exprs<'a>(out: &mut Children<'a>, exprs: &'a [ExprId<'a>]) {
    out.extend(exprs.iter().map(|e| Some(AstNode::Expr(e))));
}

fn push_expr<'a>(out: &mut Children<'a>, expr: Option<ExprId<'a>>) {
    out.push(expr.map(AstNode::Expr));
}

fn push_attributes<'a>(out: &mut Children<'a>, groups: &'a [AttributeGroup<'a>]) {
    out.extend(groups.iter().map(|g| Some(AstNode::AttributeGroup(g))));
}

fn push_params<'a>(out: &mut Children<'a>, params: &'a [Param<'a>]) {
    out.extend(params.iter().map(|p| Some(AstNode::Param(p))));
}

fn push_args<'a>(out: &mut Children<'a>, args: &'a [Arg<'a>]) {
    out.extend(args.iter().map(|a| Some(AstNode::Arg(a))));
}

fn push_names<'a>(out: &mut Children<'a>, names: &'a [Name<'a>]) {
    out.extend(names.iter().map(|n| Some(AstNode::Name(n))));
}

fn push_members<'a>(out: &mut Children<'a>, members: &'a [ClassMember<'a>]) {
    out.extend(members.iter().map(|m| Some(AstNode::ClassMember(m))));
}

fn push_type<'a>(out: &mut Children<'a>, ty: Option<&'a Type<'a>>) {
    out.push(ty.map(AstNode::Type));
}

fn push_items<'a>(out: &mut Children<'a>, items: &'a [ArrayItem<'a>]) {
    out.extend(items.iter().map(|i| Some(AstNode::ArrayItem(i))));
}

impl<'a> AstNode<'a> {
    pub fn id(&self) -> NodeId {
        let (tag, addr) = match self {
            AstNode::Program(n) => (0, addr(*n)),
            AstNode::Stmt(n) => (1, addr(*n)),
            AstNode::Expr(n) => (2, addr(*n)),
            AstNode::Param(n) => (3, addr(*n)),
            AstNode::Arg(n) => (4, addr(*n)),
            AstNode::ArrayItem(n) => (5, addr(*n)),
            AstNode::ClosureUse(n) => (6, addr(*n)),
            AstNode::MatchArm(n) => (7, addr(*n)),
            AstNode::Case(n) => (8, addr(*n)),
            AstNode::Catch(n) => (9, addr(*n)),
            AstNode::ClassMember(n) => (10, addr(*n)),
            AstNode::PropertyEntry(n) => (11, addr(*n)),
            AstNode::StaticVar(n) => (12, addr(*n)),
            AstNode::UseItem(n) => (13, addr(*n)),
            AstNode::ClassConst(n) => (14, addr(*n)),
            AstNode::DeclareItem(n) => (15, addr(*n)),
            AstNode::TraitAdaptation(n) => (16, addr(*n)),
            AstNode::TraitMethodRef(n) => (17, addr(*n)),
            AstNode::AttributeGroup(n) => (18, addr(*n)),
            AstNode::Attribute(n) => (19, addr(*n)),
            AstNode::Name(n) => (20, addr(*n)),
            AstNode::Type(n) => (21, addr(*n)),
            AstNode::Ident(n) => (22, addr(*n)),
        };
        NodeId { tag, addr }
    }

    pub fn span(&self) -> Span {
        match self {
            AstNode::Program(n) => n.span,
            AstNode::Stmt(n) => n.span(),
            AstNode::Expr(n) => n.span(),
            AstNode::Param(n) => n.span,
            AstNode::Arg(n) => n.span,
            AstNode::ArrayItem(n) => n.span,
            AstNode::ClosureUse(n) => n.span,
            AstNode::MatchArm(n) => n.span,
            AstNode::Case(n) => n.span,
            AstNode::Catch(n) => n.span,
            AstNode::ClassMember(n) => n.span(),
            AstNode::PropertyEntry(n) => n.span,
            AstNode::StaticVar(n) => n.span,
            AstNode::UseItem(n) => n.span,
            AstNode::ClassConst(n) => n.span,
            AstNode::DeclareItem(n) => n.span,
            AstNode::TraitAdaptation(n) => n.span(),
            AstNode::TraitMethodRef(n) => n.span,
            AstNode::AttributeGroup(n) => n.span,
            AstNode::Attribute(n) => n.span,
            AstNode::Name(n) => n.span,
            AstNode::Type(n) => n.span(),
            AstNode::Ident(n) => n.span,
        }
    }

    pub fn as_stmt(&self) -> Option<StmtId<'a>> {
        match *self {
            AstNode::Stmt(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_expr(&self) -> Option<ExprId<'a>> {
        match *self {
            AstNode::Expr(e) => Some(e),
            _ => None,
        }
    }

    /// Functions, methods, closures and arrow functions.
    pub fn is_function_like(&self) -> bool {
        matches!(
            self,
            AstNode::Stmt(Stmt::Function { .. })
                | AstNode::ClassMember(ClassMember::Method { .. })
                | AstNode::Expr(Expr::Closure { .. } | Expr::ArrowFunction { .. })
        )
    }

    /// Direct children in source order. Absent optional children are `None`.
    pub fn children(&self) -> Vec<Option<AstNode<'a>>> {
        let mut out = Vec::new();
        match *self {
            AstNode::Program(program) => push_stmts(&mut out, program.statements),
            AstNode::Stmt(stmt) => stmt_children(stmt, &mut out),
            AstNode::Expr(expr) => expr_children(expr, &mut out),
            AstNode::Param(param) => {
                push_attributes(&mut out, param.attributes);
                push_type(&mut out, param.ty);
                out.push(Some(AstNode::Ident(&param.name)));
                push_expr(&mut out, param.default);
            }
            AstNode::Arg(arg) => {
                out.push(arg.name.as_ref().map(AstNode::Ident));
                out.push(Some(AstNode::Expr(arg.value)));
            }
            AstNode::ArrayItem(item) => {
                push_expr(&mut out, item.key);
                out.push(Some(AstNode::Expr(item.value)));
            }
            AstNode::ClosureUse(usage) => out.push(Some(AstNode::Expr(usage.var))),
            AstNode::MatchArm(arm) => {
                if let Some(conditions) = arm.conditions {
                    push_exprs(&mut out, conditions);
                }
                out.push(Some(AstNode::Expr(arm.body)));
            }
            AstNode::Case(case) => {
                push_expr(&mut out, case.condition);
                push_stmts(&mut out, case.body);
            }
            AstNode::Catch(catch) => {
                push_names(&mut out, catch.types);
                push_expr(&mut out, catch.var);
                push_stmts(&mut out, catch.body);
            }
            AstNode::ClassMember(member) => member_children(member, &mut out),
            AstNode::PropertyEntry(entry) => {
                out.push(Some(AstNode::Ident(&entry.name)));
                push_expr(&mut out, entry.default);
            }
            AstNode::StaticVar(var) => {
                out.push(Some(AstNode::Expr(var.var)));
                push_expr(&mut out, var.default);
            }
            AstNode::UseItem(item) => {
                out.push(Some(AstNode::Name(&item.name)));
                out.push(item.alias.as_ref().map(AstNode::Ident));
            }
            AstNode::ClassConst(constant) => {
                out.push(Some(AstNode::Ident(&constant.name)));
                out.push(Some(AstNode::Expr(constant.value)));
            }
            AstNode::DeclareItem(item) => {
                out.push(Some(AstNode::Ident(&item.key)));
                out.push(Some(AstNode::Expr(item.value)));
            }
            AstNode::TraitAdaptation(adaptation) => match adaptation {
                TraitAdaptation::Precedence { method, insteadof, .. } => {
                    out.push(Some(AstNode::TraitMethodRef(method)));
                    push_names(&mut out, insteadof);
                }
                TraitAdaptation::Alias { method, alias, .. } => {
                    out.push(Some(AstNode::TraitMethodRef(method)));
                    out.push(alias.as_ref().map(AstNode::Ident));
                }
            },
            AstNode::TraitMethodRef(method) => {
                out.push(method.trait_name.as_ref().map(AstNode::Name));
                out.push(Some(AstNode::Ident(&method.method)));
            }
            AstNode::AttributeGroup(group) => {
                out.extend(group.attributes.iter().map(|a| Some(AstNode::Attribute(a))));
            }
            AstNode::Attribute(attribute) => {
                out.push(Some(AstNode::Name(&attribute.name)));
                push_args(&mut out, attribute.args);
            }
            AstNode::Name(name) => out.extend(name.parts.iter().map(|p| Some(AstNode::Ident(p)))),
            AstNode::Type(ty) => match ty {
                Type::Simple(ident) => out.push(Some(AstNode::Ident(ident))),
                Type::Named(name) => out.push(Some(AstNode::Name(name))),
                Type::Nullable { ty, .. } => out.push(Some(AstNode::Type(ty))),
                Type::Union { types, .. } | Type::Intersection { types, .. } => {
                    out.extend(types.iter().map(|t| Some(AstNode::Type(t))));
                }
            },
            AstNode::Ident(_) => {}
        }
        out
    }

    /// The first token of the node.
    ///
    /// # Panics
    ///
    /// Panics when the node's span does not start at a token of `tokens`,
    /// which means the tree and the stream come from different sources.
    pub fn first_token<'t, 'src>(&self, tokens: &'t TokenStream<'src>) -> &'t SyntaxToken<'src> {
        let span = self.span();
        match tokens.index_starting_at(span.start).and_then(|i| tokens.get(i)) {
            Some(token) => token,
            None => panic!("node at {}..{} does not start at a token", span.start, span.end),
        }
    }

    /// The last token of the node. The program's last token is end-of-file.
    ///
    /// # Panics
    ///
    /// Same conditions as [`AstNode::first_token`].
    pub fn last_token<'t, 'src>(&self, tokens: &'t TokenStream<'src>) -> &'t SyntaxToken<'src> {
        if matches!(self, AstNode::Program(_)) {
            return tokens.eof();
        }
        let span = self.span();
        if span.is_empty() {
            return self.first_token(tokens);
        }
        match tokens.index_ending_at(span.end).and_then(|i| tokens.get(i)) {
            Some(token) => token,
            None => panic!("node at {}..{} does not end at a token", span.start, span.end),
        }
    }
}

fn stmt_children<'a>(stmt: StmtId<'a>, out: &mut Children<'a>) {
    match stmt {
        Stmt::Echo { exprs, .. } => push_exprs(out, exprs),
        Stmt::Return { expr, .. } => push_expr(out, *expr),
        Stmt::If { condition, then_block, else_block, .. } => {
            out.push(Some(AstNode::Expr(condition)));
            push_stmts(out, then_block);
            if let Some(else_block) = else_block {
                push_stmts(out, else_block);
            }
        }
        Stmt::While { condition, body, .. } => {
            out.push(Some(AstNode::Expr(condition)));
            push_stmts(out, body);
        }
        Stmt::DoWhile { body, condition, .. } => {
            push_stmts(out, body);
            out.push(Some(AstNode::Expr(condition)));
        }
        Stmt::For { init, condition, loop_expr, body, .. } => {
            push_exprs(out, init);
            push_exprs(out, condition);
            push_exprs(out, loop_expr);
            push_stmts(out, body);
        }
        Stmt::Foreach { expr, key_var, value_var, body, .. } => {
            out.push(Some(AstNode::Expr(expr)));
            push_expr(out, *key_var);
            out.push(Some(AstNode::Expr(value_var)));
            push_stmts(out, body);
        }
        Stmt::Block { statements, .. } => push_stmts(out, statements),
        Stmt::Function { attributes, name, params, return_type, body, .. } => {
            push_attributes(out, attributes);
            out.push(Some(AstNode::Ident(name)));
            push_params(out, params);
            push_type(out, *return_type);
            push_stmts(out, body);
        }
        Stmt::Class { attributes, name, extends, implements, members, .. } => {
            push_attributes(out, attributes);
            out.push(Some(AstNode::Ident(name)));
            out.push(extends.as_ref().map(AstNode::Name));
            push_names(out, implements);
            push_members(out, members);
        }
        Stmt::Interface { attributes, name, extends, members, .. } => {
            push_attributes(out, attributes);
            out.push(Some(AstNode::Ident(name)));
            push_names(out, extends);
            push_members(out, members);
        }
        Stmt::Trait { attributes, name, members, .. } => {
            push_attributes(out, attributes);
            out.push(Some(AstNode::Ident(name)));
            push_members(out, members);
        }
        Stmt::Enum { attributes, name, backed_type, implements, members, .. } => {
            push_attributes(out, attributes);
            out.push(Some(AstNode::Ident(name)));
            push_type(out, *backed_type);
            push_names(out, implements);
            push_members(out, members);
        }
        Stmt::Namespace { name, body, .. } => {
            out.push(name.as_ref().map(AstNode::Name));
            if let Some(body) = body {
                push_stmts(out, body);
            }
        }
        Stmt::Use { prefix, uses, .. } => {
            out.push(prefix.as_ref().map(AstNode::Name));
            out.extend(uses.iter().map(|u| Some(AstNode::UseItem(u))));
        }
        Stmt::Switch { condition, cases, .. } => {
            out.push(Some(AstNode::Expr(condition)));
            out.extend(cases.iter().map(|c| Some(AstNode::Case(c))));
        }
        Stmt::Try { body, catches, finally, .. } => {
            push_stmts(out, body);
            out.extend(catches.iter().map(|c| Some(AstNode::Catch(c))));
            if let Some(finally) = finally {
                push_stmts(out, finally);
            }
        }
        Stmt::Throw { expr, .. } | Stmt::Expression { expr, .. } => out.push(Some(AstNode::Expr(expr))),
        Stmt::Const { attributes, consts, .. } => {
            push_attributes(out, attributes);
            out.extend(consts.iter().map(|c| Some(AstNode::ClassConst(c))));
        }
        Stmt::Break { level, .. } | Stmt::Continue { level, .. } => push_expr(out, *level),
        Stmt::Global { vars, .. } | Stmt::Unset { vars, .. } => push_exprs(out, vars),
        Stmt::Static { vars, .. } => out.extend(vars.iter().map(|v| Some(AstNode::StaticVar(v)))),
        Stmt::Declare { declares, body, .. } => {
            out.extend(declares.iter().map(|d| Some(AstNode::DeclareItem(d))));
            push_stmts(out, body);
        }
        Stmt::Goto { label, .. } => out.push(Some(AstNode::Ident(label))),
        Stmt::Label { name, .. } => out.push(Some(AstNode::Ident(name))),
        Stmt::InlineHtml { .. } | Stmt::HaltCompiler { .. } | Stmt::Nop { .. } | Stmt::Error { .. } => {}
    }
}

fn expr_children<'a>(expr: ExprId<'a>, out: &mut Children<'a>) {
    match expr {
        Expr::Assign { var, expr, .. } | Expr::AssignRef { var, expr, .. } | Expr::AssignOp { var, expr, .. } => {
            out.push(Some(AstNode::Expr(var)));
            out.push(Some(AstNode::Expr(expr)));
        }
        Expr::Binary { left, right, .. } => {
            out.push(Some(AstNode::Expr(left)));
            out.push(Some(AstNode::Expr(right)));
        }
        Expr::Unary { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::Clone { expr, .. }
        | Expr::Empty { expr, .. }
        | Expr::Eval { expr, .. }
        | Expr::Include { expr, .. }
        | Expr::Print { expr, .. }
        | Expr::YieldFrom { expr, .. }
        | Expr::Throw { expr, .. } => out.push(Some(AstNode::Expr(expr))),
        Expr::PreInc { var, .. } | Expr::PreDec { var, .. } | Expr::PostInc { var, .. } | Expr::PostDec { var, .. } => {
            out.push(Some(AstNode::Expr(var)))
        }
        Expr::InstanceOf { expr, class, .. } => {
            out.push(Some(AstNode::Expr(expr)));
            out.push(Some(AstNode::Expr(class)));
        }
        Expr::Call { func, args, .. } => {
            out.push(Some(AstNode::Expr(func)));
            push_args(out, args);
        }
        Expr::MethodCall { target, method, args, .. } => {
            out.push(Some(AstNode::Expr(target)));
            out.push(Some(AstNode::Expr(method)));
            push_args(out, args);
        }
        Expr::StaticCall { class, method, args, .. } => {
            out.push(Some(AstNode::Expr(class)));
            out.push(Some(AstNode::Expr(method)));
            push_args(out, args);
        }
        Expr::PropertyFetch { target, property, .. } => {
            out.push(Some(AstNode::Expr(target)));
            out.push(Some(AstNode::Expr(property)));
        }
        Expr::StaticPropertyFetch { class, property, .. } => {
            out.push(Some(AstNode::Expr(class)));
            out.push(Some(AstNode::Expr(property)));
        }
        Expr::ClassConstFetch { class, constant, .. } => {
            out.push(Some(AstNode::Expr(class)));
            out.push(Some(AstNode::Expr(constant)));
        }
        Expr::ArrayDimFetch { array, dim, .. } => {
            out.push(Some(AstNode::Expr(array)));
            push_expr(out, *dim);
        }
        Expr::New { class, args, .. } => {
            out.push(Some(AstNode::Expr(class)));
            push_args(out, args);
        }
        Expr::AnonymousClass { attributes, args, extends, implements, members, .. } => {
            push_attributes(out, attributes);
            push_args(out, args);
            out.push(extends.as_ref().map(AstNode::Name));
            push_names(out, implements);
            push_members(out, members);
        }
        Expr::IndirectVariable { name, .. } => out.push(Some(AstNode::Expr(name))),
        Expr::Name { name, .. } => out.push(Some(AstNode::Name(name))),
        Expr::InterpolatedString { parts, .. } => push_exprs(out, parts),
        Expr::Array { items, .. } | Expr::List { items, .. } => push_items(out, items),
        Expr::Isset { vars, .. } => push_exprs(out, vars),
        Expr::Exit { expr, .. } => push_expr(out, *expr),
        Expr::Closure { attributes, params, uses, return_type, body, .. } => {
            push_attributes(out, attributes);
            push_params(out, params);
            out.extend(uses.iter().map(|u| Some(AstNode::ClosureUse(u))));
            push_type(out, *return_type);
            push_stmts(out, body);
        }
        Expr::ArrowFunction { attributes, params, return_type, expr, .. } => {
            push_attributes(out, attributes);
            push_params(out, params);
            push_type(out, *return_type);
            out.push(Some(AstNode::Expr(expr)));
        }
        Expr::Match { condition, arms, .. } => {
            out.push(Some(AstNode::Expr(condition)));
            out.extend(arms.iter().map(|a| Some(AstNode::MatchArm(a))));
        }
        Expr::Ternary { condition, if_true, if_false, .. } => {
            out.push(Some(AstNode::Expr(condition)));
            push_expr(out, *if_true);
            out.push(Some(AstNode::Expr(if_false)));
        }
        Expr::Yield { key, value, .. } => {
            push_expr(out, *key);
            push_expr(out, *value);
        }
        Expr::Variable { .. }
        | Expr::Identifier { .. }
        | Expr::Integer { .. }
        | Expr::Float { .. }
        | Expr::String { .. }
        | Expr::EncapsedPart { .. }
        | Expr::Boolean { .. }
        | Expr::Null { .. }
        | Expr::MagicConst { .. }
        | Expr::VariadicPlaceholder { .. }
        | Expr::Error { .. } => {}
    }
}

fn member_children<'a>(member: &'a ClassMember<'a>, out: &mut Children<'a>) {
    match member {
        ClassMember::Property { attributes, ty, entries, .. } => {
            push_attributes(out, attributes);
            push_type(out, *ty);
            out.extend(entries.iter().map(|e| Some(AstNode::PropertyEntry(e))));
        }
        ClassMember::Method { attributes, name, params, return_type, body, .. } => {
            push_attributes(out, attributes);
            out.push(Some(AstNode::Ident(name)));
            push_params(out, params);
            push_type(out, *return_type);
            if let Some(body) = body {
                push_stmts(out, body);
            }
        }
        ClassMember::Const { attributes, ty, consts, .. } => {
            push_attributes(out, attributes);
            push_type(out, *ty);
            out.extend(consts.iter().map(|c| Some(AstNode::ClassConst(c))));
        }
        ClassMember::TraitUse { traits, adaptations, .. } => {
            push_names(out, traits);
            out.extend(adaptations.iter().map(|a| Some(AstNode::TraitAdaptation(a))));
        }
        ClassMember::Case { attributes, name, value, .. } => {
            push_attributes(out, attributes);
            out.push(Some(AstNode::Ident(name)));
            push_expr(out, *value);
        }
    }
}
