use crate::ast::visitor::{visit_node, Visitor};
use crate::ast::*;

/// Renders a tree as an indented s-expression, one statement per line.
pub struct SExprFormatter {
    output: String,
    indent: usize,
}

impl Default for SExprFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl SExprFormatter {
    pub fn new() -> Self {
        Self { output: String::new(), indent: 0 }
    }

    pub fn format(node: AstNode<'_>) -> String {
        let mut formatter = Self::new();
        visit_node(&mut formatter, node);
        formatter.finish()
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn newline(&mut self) {
        self.output.push('\n');
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
    }

    fn section<'ast>(&mut self, label: &str, stmts: &'ast [StmtId<'ast>]) {
        self.newline();
        self.write("(");
        self.write(label);
        self.indent += 1;
        for stmt in stmts {
            self.newline();
            self.visit_stmt(stmt);
        }
        self.indent -= 1;
        self.write(")");
    }

    /// Generic rendering: the label, then inline children, with statement
    /// children on their own lines.
    fn node<'ast>(&mut self, node: AstNode<'ast>) {
        if let Some(leaf) = leaf_text(node) {
            self.write(&leaf);
            return;
        }
        self.write("(");
        self.write(&label(node));
        self.indent += 1;
        for child in node.children().into_iter().flatten() {
            if let AstNode::Stmt(stmt) = child {
                self.newline();
                self.visit_stmt(stmt);
            } else {
                self.write(" ");
                self.node(child);
            }
        }
        self.indent -= 1;
        self.write(")");
    }
}

impl<'ast> Visitor<'ast> for SExprFormatter {
    fn visit_program(&mut self, program: &'ast Program<'ast>) {
        self.write("(program");
        self.indent += 1;
        for stmt in program.statements {
            self.newline();
            self.visit_stmt(stmt);
        }
        self.indent -= 1;
        self.write(")");
    }

    fn visit_stmt(&mut self, stmt: StmtId<'ast>) {
        match stmt {
            Stmt::Expression { expr, .. } => self.visit_expr(expr),
            Stmt::If { condition, then_block, else_block, .. } => {
                self.write("(if ");
                self.visit_expr(condition);
                self.indent += 1;
                self.section("then", then_block);
                if let Some(else_block) = else_block {
                    self.section("else", else_block);
                }
                self.indent -= 1;
                self.write(")");
            }
            Stmt::While { condition, body, .. } => {
                self.write("(while ");
                self.visit_expr(condition);
                self.indent += 1;
                self.section("body", body);
                self.indent -= 1;
                self.write(")");
            }
            _ => self.node(AstNode::Stmt(stmt)),
        }
    }

    fn visit_expr(&mut self, expr: ExprId<'ast>) {
        self.node(AstNode::Expr(expr));
    }

    fn visit_param(&mut self, param: &'ast Param<'ast>) {
        self.node(AstNode::Param(param));
    }

    fn visit_ident(&mut self, ident: &'ast Ident<'ast>) {
        self.write(ident.value);
    }
}

fn name_text(name: &Name<'_>) -> String {
    match name.kind {
        NameKind::FullyQualified => format!("\\{}", name.joined()),
        NameKind::Relative => format!("namespace\\{}", name.joined()),
        _ => name.joined(),
    }
}

fn leaf_text(node: AstNode<'_>) -> Option<String> {
    let text = match node {
        AstNode::Ident(ident) => ident.value.to_string(),
        AstNode::Name(name) => name_text(name),
        AstNode::Type(Type::Simple(ident)) => ident.value.to_string(),
        AstNode::Type(Type::Named(name)) => name_text(name),
        AstNode::Expr(expr) => match expr {
            Expr::Variable { name, .. } => format!("(variable ${name})"),
            Expr::Identifier { name, .. } => format!("(identifier {name})"),
            Expr::Name { name, .. } => format!("(name {})", name_text(name)),
            Expr::Integer { value, .. } => format!("(integer {value})"),
            Expr::Float { value, .. } => format!("(float {value})"),
            Expr::String { value, .. } => format!("(string {value})"),
            Expr::EncapsedPart { value, .. } => format!("(encapsed {value:?})"),
            Expr::Boolean { value, .. } => format!("(boolean {value})"),
            Expr::Null { .. } => "(null)".to_string(),
            Expr::MagicConst { kind, .. } => format!("(magic-const {kind:?})"),
            Expr::VariadicPlaceholder { .. } => "(placeholder)".to_string(),
            Expr::Error { .. } => "(error)".to_string(),
            _ => return None,
        },
        AstNode::Stmt(Stmt::Nop { .. }) => "(nop)".to_string(),
        AstNode::Stmt(Stmt::Error { .. }) => "(error)".to_string(),
        AstNode::Stmt(Stmt::InlineHtml { .. }) => "(inline-html)".to_string(),
        _ => return None,
    };
    Some(text)
}

fn label(node: AstNode<'_>) -> String {
    match node {
        AstNode::Program(_) => "program".into(),
        AstNode::Stmt(stmt) => stmt_label(stmt).into(),
        AstNode::Expr(expr) => expr_label(expr),
        AstNode::Param(param) => {
            let mut label = String::from("param");
            if param.by_ref {
                label.push_str(" &");
            }
            if param.variadic {
                label.push_str(" ...");
            }
            label
        }
        AstNode::Arg(arg) if arg.unpack => "arg ...".into(),
        AstNode::Arg(_) => "arg".into(),
        AstNode::ArrayItem(item) if item.by_ref => "item &".into(),
        AstNode::ArrayItem(item) if item.unpack => "item ...".into(),
        AstNode::ArrayItem(_) => "item".into(),
        AstNode::ClosureUse(usage) if usage.by_ref => "use &".into(),
        AstNode::ClosureUse(_) => "use".into(),
        AstNode::MatchArm(arm) if arm.conditions.is_none() => "default-arm".into(),
        AstNode::MatchArm(_) => "arm".into(),
        AstNode::Case(case) if case.condition.is_none() => "default".into(),
        AstNode::Case(_) => "case".into(),
        AstNode::Catch(_) => "catch".into(),
        AstNode::ClassMember(member) => match member {
            ClassMember::Property { .. } => "property",
            ClassMember::Method { .. } => "method",
            ClassMember::Const { .. } => "class-const",
            ClassMember::TraitUse { .. } => "trait-use",
            ClassMember::Case { .. } => "enum-case",
        }
        .into(),
        AstNode::PropertyEntry(_) => "prop".into(),
        AstNode::StaticVar(_) => "static-var".into(),
        AstNode::UseItem(_) => "use-item".into(),
        AstNode::ClassConst(_) => "const".into(),
        AstNode::DeclareItem(_) => "declare-item".into(),
        AstNode::TraitAdaptation(TraitAdaptation::Precedence { .. }) => "insteadof".into(),
        AstNode::TraitAdaptation(TraitAdaptation::Alias { .. }) => "as".into(),
        AstNode::TraitMethodRef(_) => "method-ref".into(),
        AstNode::AttributeGroup(_) => "attributes".into(),
        AstNode::Attribute(_) => "attribute".into(),
        AstNode::Name(_) => "name".into(),
        AstNode::Type(ty) => match ty {
            Type::Nullable { .. } => "nullable",
            Type::Union { .. } => "union",
            Type::Intersection { .. } => "intersection",
            _ => "type",
        }
        .into(),
        AstNode::Ident(_) => "ident".into(),
    }
}

fn stmt_label(stmt: &Stmt<'_>) -> &'static str {
    match stmt {
        Stmt::Echo { .. } => "echo",
        Stmt::Return { .. } => "return",
        Stmt::If { .. } => "if",
        Stmt::While { .. } => "while",
        Stmt::DoWhile { .. } => "do-while",
        Stmt::For { .. } => "for",
        Stmt::Foreach { by_ref: true, .. } => "foreach &",
        Stmt::Foreach { .. } => "foreach",
        Stmt::Block { .. } => "block",
        Stmt::Function { .. } => "function",
        Stmt::Class { .. } => "class",
        Stmt::Interface { .. } => "interface",
        Stmt::Trait { .. } => "trait",
        Stmt::Enum { .. } => "enum",
        Stmt::Namespace { .. } => "namespace",
        Stmt::Use { kind: UseKind::Function, .. } => "use function",
        Stmt::Use { kind: UseKind::Const, .. } => "use const",
        Stmt::Use { .. } => "use",
        Stmt::Switch { .. } => "switch",
        Stmt::Try { .. } => "try",
        Stmt::Throw { .. } => "throw",
        Stmt::Const { .. } => "const",
        Stmt::Break { .. } => "break",
        Stmt::Continue { .. } => "continue",
        Stmt::Global { .. } => "global",
        Stmt::Static { .. } => "static",
        Stmt::Unset { .. } => "unset",
        Stmt::Expression { .. } => "expr",
        Stmt::InlineHtml { .. } => "inline-html",
        Stmt::Declare { .. } => "declare",
        Stmt::Goto { .. } => "goto",
        Stmt::Label { .. } => "label",
        Stmt::HaltCompiler { .. } => "halt-compiler",
        Stmt::Nop { .. } => "nop",
        Stmt::Error { .. } => "error",
    }
}

fn expr_label(expr: &Expr<'_>) -> String {
    let label = match expr {
        Expr::Assign { .. } => "assign",
        Expr::AssignRef { .. } => "assign-ref",
        Expr::AssignOp { op, .. } => return format!("assign-op {op:?}"),
        Expr::Binary { op, .. } => op.symbol(),
        Expr::Unary { op, .. } => match op {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Silence => "@",
        },
        Expr::PreInc { .. } => "pre-inc",
        Expr::PreDec { .. } => "pre-dec",
        Expr::PostInc { .. } => "post-inc",
        Expr::PostDec { .. } => "post-dec",
        Expr::Cast { kind, .. } => return format!("cast {kind:?}"),
        Expr::InstanceOf { .. } => "instanceof",
        Expr::Call { .. } => "call",
        Expr::MethodCall { nullsafe: true, .. } => "nullsafe-method-call",
        Expr::MethodCall { .. } => "method-call",
        Expr::StaticCall { .. } => "static-call",
        Expr::PropertyFetch { nullsafe: true, .. } => "nullsafe-property-fetch",
        Expr::PropertyFetch { .. } => "property-fetch",
        Expr::StaticPropertyFetch { .. } => "static-property-fetch",
        Expr::ClassConstFetch { .. } => "class-const-fetch",
        Expr::ArrayDimFetch { .. } => "dim-fetch",
        Expr::New { .. } => "new",
        Expr::AnonymousClass { .. } => "anonymous-class",
        Expr::Clone { .. } => "clone",
        Expr::IndirectVariable { .. } => "indirect-variable",
        Expr::InterpolatedString { kind, .. } => match kind {
            StringKind::DoubleQuoted => "interpolated",
            StringKind::ShellExec => "shell-exec",
            StringKind::Heredoc => "heredoc",
            StringKind::Nowdoc => "nowdoc",
        },
        Expr::Array { .. } => "array",
        Expr::List { .. } => "list",
        Expr::Isset { .. } => "isset",
        Expr::Empty { .. } => "empty",
        Expr::Exit { .. } => "exit",
        Expr::Eval { .. } => "eval",
        Expr::Include { kind, .. } => return format!("include {kind:?}"),
        Expr::Print { .. } => "print",
        Expr::Closure { is_static: true, .. } => "static-closure",
        Expr::Closure { .. } => "closure",
        Expr::ArrowFunction { .. } => "arrow-fn",
        Expr::Match { .. } => "match",
        Expr::Ternary { .. } => "ternary",
        Expr::Yield { .. } => "yield",
        Expr::YieldFrom { .. } => "yield-from",
        Expr::Throw { .. } => "throw",
        _ => "expr",
    };
    label.to_string()
}
