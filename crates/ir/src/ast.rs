//! Typed AST for JavaScript sources.
//!
//! The tree is produced once by the parser and never mutated afterwards.
//! Function-like nodes and classes live in arenas on [`Program`] and are
//! referenced by [`FnId`] / [`ClassId`], so analyses can key caches and
//! visited-sets on plain integers instead of node addresses.

use serde::{Deserialize, Serialize};

/// Index of a function in [`Program::functions`].
pub type FnId = usize;
/// Index of a class in [`Program::classes`].
pub type ClassId = usize;

/// Byte range plus the 1-based line/column of its start.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Source text covered by the span, empty when out of range.
    pub fn snippet<'s>(&self, src: &'s str) -> &'s str {
        src.get(self.start..self.end).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub functions: Vec<Function>,
    pub classes: Vec<Class>,
    pub span: Span,
}

impl Program {
    pub fn function(&self, id: FnId) -> Option<&Function> {
        self.functions.get(id)
    }

    pub fn class(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: FnId,
    pub name: Option<String>,
    pub params: Vec<Pat>,
    pub body: FnBody,
    pub is_arrow: bool,
    pub is_async: bool,
    /// Lexically enclosing function, `None` at top level.
    pub parent: Option<FnId>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FnBody {
    Block(Vec<Stmt>),
    /// Concise arrow body.
    Expr(Box<Expr>),
}

impl Function {
    pub fn block(&self) -> &[Stmt] {
        match &self.body {
            FnBody::Block(stmts) => stmts,
            FnBody::Expr(_) => &[],
        }
    }

    /// Identifier of the first parameter when it is a plain name.
    pub fn param_name(&self, index: usize) -> Option<&str> {
        match self.params.get(index)? {
            Pat::Ident { name, .. } => Some(name),
            Pat::Assign { target, .. } => match target.as_ref() {
                Pat::Ident { name, .. } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    pub name: Option<String>,
    pub super_class: Option<Box<Expr>>,
    pub constructor: Option<FnId>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMember {
    pub key: PropKey,
    pub is_static: bool,
    pub kind: MemberKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemberKind {
    Method(FnId),
    Getter(FnId),
    Setter(FnId),
    Field(Option<Expr>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    Var(VarDecl),
    Function(FnId),
    Class(ClassId),
    Return(Option<Expr>),
    If {
        test: Expr,
        cons: Box<Stmt>,
        alt: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Switch {
        disc: Expr,
        cases: Vec<SwitchCase>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        left: ForHead,
        right: Expr,
        body: Box<Stmt>,
        of: bool,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Try {
        block: Vec<Stmt>,
        param: Option<Pat>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Import(ImportDecl),
    Empty,
    /// CST kind without a typed counterpart; skipped by every pass.
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub kind: VarKind,
    pub decls: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDeclarator {
    pub target: Pat,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForHead {
    Decl(VarKind, Pat),
    Pat(Pat),
}

impl ForHead {
    pub fn pat(&self) -> &Pat {
        match self {
            ForHead::Decl(_, p) | ForHead::Pat(p) => p,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    pub source: String,
    pub bindings: Vec<ImportBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBinding {
    pub local: String,
    /// Imported export name; `None` for default and namespace imports.
    pub imported: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    Or,
    And,
    Nullish,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(String),
    This,
    Super,
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Regex {
        pattern: String,
        flags: String,
    },
    /// `quasis.len() == exprs.len() + 1`.
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    TaggedTemplate {
        tag: Box<Expr>,
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Array(Vec<Expr>),
    Object(Vec<Prop>),
    Function(FnId),
    Class(ClassId),
    Unary {
        op: String,
        arg: Box<Expr>,
    },
    Update {
        op: String,
        prefix: bool,
        arg: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        /// `=`, `+=`, `||=`, ...
        op: String,
        target: Box<Pat>,
        value: Box<Expr>,
    },
    Cond {
        test: Box<Expr>,
        cons: Box<Expr>,
        alt: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        prop: MemberProp,
        optional: bool,
    },
    Seq(Vec<Expr>),
    Await(Box<Expr>),
    Yield(Option<Box<Expr>>),
    Spread(Box<Expr>),
    /// Dynamic `import(specifier)`.
    Import(Box<Expr>),
    Jsx(Box<JsxElement>),
    Unsupported(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemberProp {
    Ident(String),
    Private(String),
    Computed(Box<Expr>),
}

impl MemberProp {
    /// Property name when statically known (`a.b`, `a["b"]`, `a[0]`).
    pub fn static_name(&self) -> Option<String> {
        match self {
            MemberProp::Ident(n) => Some(n.clone()),
            MemberProp::Private(_) => None,
            MemberProp::Computed(e) => match &e.kind {
                ExprKind::Str(s) => Some(s.clone()),
                ExprKind::Num(n) => Some(number_to_string(*n)),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Prop {
    KeyValue { key: PropKey, value: Expr },
    Shorthand { name: String, span: Span },
    Method { key: PropKey, func: FnId },
    Accessor { key: PropKey, func: FnId },
    Spread(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropKey {
    Ident(String),
    Str(String),
    Num(f64),
    Computed(Box<Expr>),
}

impl PropKey {
    pub fn static_name(&self) -> Option<String> {
        match self {
            PropKey::Ident(s) | PropKey::Str(s) => Some(s.clone()),
            PropKey::Num(n) => Some(number_to_string(*n)),
            PropKey::Computed(e) => match &e.kind {
                ExprKind::Str(s) => Some(s.clone()),
                ExprKind::Num(n) => Some(number_to_string(*n)),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pat {
    Ident {
        name: String,
        span: Span,
    },
    Object {
        props: Vec<ObjectPatProp>,
        span: Span,
    },
    Array {
        elems: Vec<Option<Pat>>,
        span: Span,
    },
    Assign {
        target: Box<Pat>,
        default: Box<Expr>,
        span: Span,
    },
    Rest {
        arg: Box<Pat>,
        span: Span,
    },
    /// Member expression used as an assignment target.
    Expr(Box<Expr>),
    Unsupported {
        kind: String,
        span: Span,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectPatProp {
    KeyValue { key: PropKey, value: Pat },
    Rest(Pat),
}

impl Pat {
    pub fn span(&self) -> Span {
        match self {
            Pat::Ident { span, .. }
            | Pat::Object { span, .. }
            | Pat::Array { span, .. }
            | Pat::Assign { span, .. }
            | Pat::Rest { span, .. }
            | Pat::Unsupported { span, .. } => *span,
            Pat::Expr(e) => e.span,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Pat::Ident { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Every identifier the pattern binds, in source order.
    pub fn bound_names(&self) -> Vec<(&str, Span)> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<(&'a str, Span)>) {
        match self {
            Pat::Ident { name, span } => out.push((name, *span)),
            Pat::Object { props, .. } => {
                for p in props {
                    match p {
                        ObjectPatProp::KeyValue { value, .. } => value.collect_names(out),
                        ObjectPatProp::Rest(r) => r.collect_names(out),
                    }
                }
            }
            Pat::Array { elems, .. } => {
                for e in elems.iter().flatten() {
                    e.collect_names(out);
                }
            }
            Pat::Assign { target, .. } => target.collect_names(out),
            Pat::Rest { arg, .. } => arg.collect_names(out),
            Pat::Expr(_) | Pat::Unsupported { .. } => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsxElement {
    pub name: String,
    pub attrs: Vec<JsxAttr>,
    pub children: Vec<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsxAttr {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

impl Expr {
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str_lit(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Str(s) => Some(s),
            ExprKind::Template { quasis, exprs } if exprs.is_empty() => {
                quasis.first().map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Str(_) | ExprKind::Num(_) | ExprKind::Bool(_) | ExprKind::Null
        ) || self.as_str_lit().is_some()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ExprKind::Function(_))
    }

    /// Property name of a member expression, when static.
    pub fn member_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Member { prop, .. } => prop.static_name(),
            _ => None,
        }
    }

    /// Dotted path of a static member chain rooted at an identifier or
    /// `this`, e.g. `window.location.hash`.
    pub fn member_path(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Ident(n) => Some(n.clone()),
            ExprKind::This => Some("this".into()),
            ExprKind::Member { object, prop, .. } => {
                let base = object.member_path()?;
                let name = prop.static_name()?;
                Some(format!("{base}.{name}"))
            }
            _ => None,
        }
    }

    /// Leftmost identifier of a member chain (`a` for `a.b[c].d`).
    pub fn root_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(n) => Some(n),
            ExprKind::Member { object, .. } => object.root_ident(),
            _ => None,
        }
    }
}

/// Formats a number the way `String(n)` does for the common cases.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else if n == 0.0 {
        "0".into()
    } else {
        format!("{n}")
    }
}
