//! Lexical scope tree built in one top-down traversal of the program.
//!
//! Scopes live in an arena and point at their parent by index. Every
//! identifier reference is mapped to the scope it occurs in (keyed by the
//! byte offset of the identifier), so later passes can answer "which
//! binding does this name refer to" without re-walking the tree.

use std::collections::HashMap;

use ir::{
    ClassId, Expr, ExprKind, FnBody, FnId, ForHead, MemberKind, MemberProp, ObjectPatProp, Pat,
    Program, Prop, PropKey, Span, Stmt, StmtKind, VarKind,
};

pub type ScopeId = usize;

/// Pseudo scope holding bindings created by assignment to undeclared names.
pub const IMPLICIT: ScopeId = usize::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub scope: ScopeId,
    pub name: String,
}

impl BindingKey {
    pub fn is_implicit(&self) -> bool {
        self.scope == IMPLICIT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Param,
    Var,
    Let,
    Const,
    Function,
    Class,
    Import,
    CatchParam,
    Implicit,
}

/// Step from a destructuring source to the bound value.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSeg {
    Key(String),
    Index(usize),
    /// Array rest element starting at the index.
    RestFrom(usize),
    /// Object rest.
    Rest,
}

/// Where a definition takes its value from.
#[derive(Debug, Clone, Copy)]
pub enum Origin<'p> {
    Value(&'p Expr),
    /// `x += e`
    Compound(&'p Expr),
    Param { func: FnId, index: usize },
    RestParam { func: FnId, index: usize },
    /// Element of a `for..of` iterable.
    Element(&'p Expr),
    Function(FnId),
    Class(ClassId),
    Opaque,
}

#[derive(Debug, Clone)]
pub struct Def<'p> {
    pub origin: Origin<'p>,
    pub path: Vec<PathSeg>,
    pub default: Option<&'p Expr>,
    /// Declarator, assignment or loop-head span.
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Binding<'p> {
    pub kind: BindingKind,
    pub span: Span,
    pub defs: Vec<Def<'p>>,
}

#[derive(Debug, Clone)]
pub struct Scope<'p> {
    pub parent: Option<ScopeId>,
    /// Function owning the scope, `None` at top level.
    pub func: Option<FnId>,
    pub bindings: HashMap<String, Binding<'p>>,
}

#[derive(Debug, Default)]
pub struct ScopeTree<'p> {
    pub scopes: Vec<Scope<'p>>,
    pub implicit: HashMap<String, Binding<'p>>,
    pub fn_scope: HashMap<FnId, ScopeId>,
}

impl<'p> ScopeTree<'p> {
    /// Nearest declared binding of `name` visible from `scope`.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<BindingKey> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = self.scopes.get(id)?;
            if s.bindings.contains_key(name) {
                return Some(BindingKey {
                    scope: id,
                    name: name.to_string(),
                });
            }
            cur = s.parent;
        }
        None
    }

    /// Declared binding, else the implicit global created by assignment.
    pub fn lookup_or_implicit(&self, scope: ScopeId, name: &str) -> Option<BindingKey> {
        self.lookup(scope, name).or_else(|| {
            self.implicit.contains_key(name).then(|| BindingKey {
                scope: IMPLICIT,
                name: name.to_string(),
            })
        })
    }

    pub fn binding(&self, key: &BindingKey) -> Option<&Binding<'p>> {
        if key.is_implicit() {
            self.implicit.get(&key.name)
        } else {
            self.scopes.get(key.scope)?.bindings.get(&key.name)
        }
    }

    fn binding_mut(&mut self, key: &BindingKey) -> Option<&mut Binding<'p>> {
        if key.is_implicit() {
            self.implicit.get_mut(&key.name)
        } else {
            self.scopes.get_mut(key.scope)?.bindings.get_mut(&key.name)
        }
    }

    pub fn func_of(&self, scope: ScopeId) -> Option<FnId> {
        self.scopes.get(scope).and_then(|s| s.func)
    }
}

/// Per-node facts recorded while the scopes are built.
#[derive(Debug, Default)]
pub struct Index<'p> {
    /// Scope of every identifier, `this` and shorthand property, by start offset.
    pub sites: HashMap<usize, ScopeId>,
    /// Every expression in pre-order with its scope.
    pub exprs: Vec<(&'p Expr, ScopeId)>,
    pub stmts: Vec<(&'p Stmt, ScopeId)>,
    pub returns: HashMap<FnId, Vec<&'p Expr>>,
    /// Methods defined inside an object literal, mapped to that literal.
    pub this_object: HashMap<FnId, &'p Expr>,
    /// Constructors and instance methods of classes.
    pub fn_class: HashMap<FnId, ClassId>,
}

pub fn build(prog: &Program) -> (ScopeTree<'_>, Index<'_>) {
    let mut b = Builder {
        prog,
        tree: ScopeTree::default(),
        index: Index::default(),
    };
    let root = b.new_scope(None, None);
    b.hoist_vars(root, &prog.body);
    b.declare_block(root, &prog.body);
    b.visit_stmts(&prog.body, root);
    (b.tree, b.index)
}

struct Builder<'p> {
    prog: &'p Program,
    tree: ScopeTree<'p>,
    index: Index<'p>,
}

impl<'p> Builder<'p> {
    fn new_scope(&mut self, parent: Option<ScopeId>, func: Option<FnId>) -> ScopeId {
        self.tree.scopes.push(Scope {
            parent,
            func,
            bindings: HashMap::new(),
        });
        self.tree.scopes.len() - 1
    }

    fn declare(&mut self, scope: ScopeId, name: &str, kind: BindingKind, span: Span) {
        if let Some(s) = self.tree.scopes.get_mut(scope) {
            s.bindings.entry(name.to_string()).or_insert_with(|| Binding {
                kind,
                span,
                defs: Vec::new(),
            });
        }
    }

    fn add_def(&mut self, scope: ScopeId, name: &str, def: Def<'p>) {
        if let Some(key) = self.tree.lookup(scope, name) {
            if let Some(b) = self.tree.binding_mut(&key) {
                b.defs.push(def);
            }
            return;
        }
        let span = def.span;
        self.tree
            .implicit
            .entry(name.to_string())
            .or_insert_with(|| Binding {
                kind: BindingKind::Implicit,
                span,
                defs: Vec::new(),
            })
            .defs
            .push(def);
    }

    fn hoist_vars(&mut self, scope: ScopeId, stmts: &'p [Stmt]) {
        for s in stmts {
            self.hoist_stmt(scope, s);
        }
    }

    fn hoist_stmt(&mut self, scope: ScopeId, s: &'p Stmt) {
        match &s.kind {
            StmtKind::Var(d) if d.kind == VarKind::Var => {
                for decl in &d.decls {
                    for (name, span) in decl.target.bound_names() {
                        self.declare(scope, name, BindingKind::Var, span);
                    }
                }
            }
            StmtKind::If { cons, alt, .. } => {
                self.hoist_stmt(scope, cons);
                if let Some(alt) = alt {
                    self.hoist_stmt(scope, alt);
                }
            }
            StmtKind::Block(b) => self.hoist_vars(scope, b),
            StmtKind::For { init, body, .. } => {
                if let Some(init) = init {
                    self.hoist_stmt(scope, init);
                }
                self.hoist_stmt(scope, body);
            }
            StmtKind::ForIn { left, body, .. } => {
                if let ForHead::Decl(VarKind::Var, pat) = left {
                    for (name, span) in pat.bound_names() {
                        self.declare(scope, name, BindingKind::Var, span);
                    }
                }
                self.hoist_stmt(scope, body);
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::Labeled { body, .. } => self.hoist_stmt(scope, body),
            StmtKind::Try {
                block,
                handler,
                finalizer,
                ..
            } => {
                self.hoist_vars(scope, block);
                if let Some(h) = handler {
                    self.hoist_vars(scope, h);
                }
                if let Some(f) = finalizer {
                    self.hoist_vars(scope, f);
                }
            }
            StmtKind::Switch { cases, .. } => {
                for c in cases {
                    self.hoist_vars(scope, &c.body);
                }
            }
            _ => {}
        }
    }

    /// Declares the lexical bindings of a block before it is visited.
    fn declare_block(&mut self, scope: ScopeId, stmts: &'p [Stmt]) {
        let prog = self.prog;
        for s in stmts {
            match &s.kind {
                StmtKind::Var(d) if d.kind != VarKind::Var => {
                    let kind = if d.kind == VarKind::Const {
                        BindingKind::Const
                    } else {
                        BindingKind::Let
                    };
                    for decl in &d.decls {
                        for (name, span) in decl.target.bound_names() {
                            self.declare(scope, name, kind, span);
                        }
                    }
                }
                StmtKind::Function(id) => {
                    let Some(f) = prog.function(*id) else { continue };
                    if let Some(name) = &f.name {
                        self.declare(scope, name, BindingKind::Function, f.span);
                        self.add_def(scope, name, plain_def(Origin::Function(*id), f.span));
                    }
                }
                StmtKind::Class(id) => {
                    let Some(c) = prog.class(*id) else { continue };
                    if let Some(name) = &c.name {
                        self.declare(scope, name, BindingKind::Class, c.span);
                        self.add_def(scope, name, plain_def(Origin::Class(*id), c.span));
                    }
                }
                StmtKind::Import(decl) => {
                    for b in &decl.bindings {
                        self.declare(scope, &b.local, BindingKind::Import, b.span);
                        self.add_def(scope, &b.local, plain_def(Origin::Opaque, b.span));
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_stmts(&mut self, stmts: &'p [Stmt], scope: ScopeId) {
        for s in stmts {
            self.visit_stmt(s, scope);
        }
    }

    fn visit_stmt(&mut self, s: &'p Stmt, scope: ScopeId) {
        self.index.stmts.push((s, scope));
        let func = self.tree.func_of(scope);
        match &s.kind {
            StmtKind::Expr(e) | StmtKind::Throw(e) => self.visit_expr(e, scope),
            StmtKind::Var(d) => {
                for decl in &d.decls {
                    if let Some(init) = &decl.init {
                        self.visit_expr(init, scope);
                    }
                    self.visit_pat_exprs(&decl.target, scope);
                    if let Some(init) = &decl.init {
                        self.bind_pat(
                            scope,
                            &decl.target,
                            Origin::Value(init),
                            Vec::new(),
                            None,
                            decl.span,
                        );
                    }
                }
            }
            StmtKind::Function(id) => self.visit_fn(*id, scope, false),
            StmtKind::Class(id) => self.visit_class(*id, scope),
            StmtKind::Return(e) => {
                if let Some(e) = e {
                    self.visit_expr(e, scope);
                    if let Some(f) = func {
                        self.index.returns.entry(f).or_default().push(e);
                    }
                }
            }
            StmtKind::If { test, cons, alt } => {
                self.visit_expr(test, scope);
                self.visit_stmt(cons, scope);
                if let Some(alt) = alt {
                    self.visit_stmt(alt, scope);
                }
            }
            StmtKind::Block(stmts) => {
                let inner = self.new_scope(Some(scope), func);
                self.declare_block(inner, stmts);
                self.visit_stmts(stmts, inner);
            }
            StmtKind::Switch { disc, cases } => {
                self.visit_expr(disc, scope);
                let inner = self.new_scope(Some(scope), func);
                for c in cases {
                    self.declare_block(inner, &c.body);
                }
                for c in cases {
                    if let Some(t) = &c.test {
                        self.visit_expr(t, inner);
                    }
                    self.visit_stmts(&c.body, inner);
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let inner = self.new_scope(Some(scope), func);
                if let Some(init) = init {
                    self.declare_block(inner, std::slice::from_ref(init.as_ref()));
                    self.visit_stmt(init, inner);
                }
                if let Some(t) = test {
                    self.visit_expr(t, inner);
                }
                if let Some(u) = update {
                    self.visit_expr(u, inner);
                }
                self.visit_stmt(body, inner);
            }
            StmtKind::ForIn {
                left,
                right,
                body,
                of,
            } => {
                self.visit_expr(right, scope);
                let inner = self.new_scope(Some(scope), func);
                let pat = left.pat();
                if let ForHead::Decl(kind, _) = left {
                    if *kind != VarKind::Var {
                        for (name, span) in pat.bound_names() {
                            self.declare(inner, name, BindingKind::Let, span);
                        }
                    }
                }
                self.visit_pat_exprs(pat, inner);
                let origin = if *of {
                    Origin::Element(right)
                } else {
                    Origin::Opaque
                };
                self.bind_pat(inner, pat, origin, Vec::new(), None, pat.span());
                self.visit_stmt(body, inner);
            }
            StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
                self.visit_expr(test, scope);
                self.visit_stmt(body, scope);
            }
            StmtKind::Try {
                block,
                param,
                handler,
                finalizer,
            } => {
                let inner = self.new_scope(Some(scope), func);
                self.declare_block(inner, block);
                self.visit_stmts(block, inner);
                if let Some(h) = handler {
                    let catch = self.new_scope(Some(scope), func);
                    if let Some(p) = param {
                        for (name, span) in p.bound_names() {
                            self.declare(catch, name, BindingKind::CatchParam, span);
                        }
                        self.visit_pat_exprs(p, catch);
                        self.bind_pat(catch, p, Origin::Opaque, Vec::new(), None, p.span());
                    }
                    self.declare_block(catch, h);
                    self.visit_stmts(h, catch);
                }
                if let Some(f) = finalizer {
                    let fin = self.new_scope(Some(scope), func);
                    self.declare_block(fin, f);
                    self.visit_stmts(f, fin);
                }
            }
            StmtKind::Labeled { body, .. } => self.visit_stmt(body, scope),
            StmtKind::Import(_)
            | StmtKind::Break(_)
            | StmtKind::Continue(_)
            | StmtKind::Empty
            | StmtKind::Unsupported(_) => {}
        }
    }

    fn visit_fn(&mut self, id: FnId, scope: ScopeId, is_expr: bool) {
        let prog = self.prog;
        let Some(f) = prog.function(id) else { return };
        let inner = self.new_scope(Some(scope), Some(id));
        self.tree.fn_scope.insert(id, inner);
        if is_expr && !f.is_arrow {
            if let Some(name) = &f.name {
                self.declare(inner, name, BindingKind::Function, f.span);
                self.add_def(inner, name, plain_def(Origin::Function(id), f.span));
            }
        }
        for p in &f.params {
            for (name, span) in p.bound_names() {
                self.declare(inner, name, BindingKind::Param, span);
            }
        }
        for (index, p) in f.params.iter().enumerate() {
            self.visit_pat_exprs(p, inner);
            match p {
                Pat::Rest { arg, span } => self.bind_pat(
                    inner,
                    arg,
                    Origin::RestParam { func: id, index },
                    Vec::new(),
                    None,
                    *span,
                ),
                _ => self.bind_pat(
                    inner,
                    p,
                    Origin::Param { func: id, index },
                    Vec::new(),
                    None,
                    p.span(),
                ),
            }
        }
        match &f.body {
            FnBody::Block(stmts) => {
                self.hoist_vars(inner, stmts);
                self.declare_block(inner, stmts);
                self.visit_stmts(stmts, inner);
            }
            FnBody::Expr(e) => {
                self.visit_expr(e, inner);
                self.index.returns.entry(id).or_default().push(e);
            }
        }
    }

    fn visit_class(&mut self, id: ClassId, scope: ScopeId) {
        let prog = self.prog;
        let Some(c) = prog.class(id) else { return };
        if let Some(sc) = &c.super_class {
            self.visit_expr(sc, scope);
        }
        let inner = self.new_scope(Some(scope), self.tree.func_of(scope));
        if let Some(name) = &c.name {
            self.declare(inner, name, BindingKind::Class, c.span);
            self.add_def(inner, name, plain_def(Origin::Class(id), c.span));
        }
        if let Some(ctor) = c.constructor {
            self.index.fn_class.insert(ctor, id);
            self.visit_fn(ctor, inner, false);
        }
        for m in &c.members {
            if let PropKey::Computed(e) = &m.key {
                self.visit_expr(e, inner);
            }
            match &m.kind {
                MemberKind::Method(f) | MemberKind::Getter(f) | MemberKind::Setter(f) => {
                    if !m.is_static {
                        self.index.fn_class.insert(*f, id);
                    }
                    self.visit_fn(*f, inner, false);
                }
                MemberKind::Field(Some(e)) => self.visit_expr(e, inner),
                MemberKind::Field(None) => {}
            }
        }
    }

    fn bind_pat(
        &mut self,
        scope: ScopeId,
        pat: &'p Pat,
        origin: Origin<'p>,
        path: Vec<PathSeg>,
        default: Option<&'p Expr>,
        span: Span,
    ) {
        match pat {
            Pat::Ident { name, span: at } => {
                self.index.sites.insert(at.start, scope);
                self.add_def(
                    scope,
                    name,
                    Def {
                        origin,
                        path,
                        default,
                        span,
                    },
                );
            }
            Pat::Object { props, .. } => {
                for p in props {
                    match p {
                        ObjectPatProp::KeyValue { key, value } => match key.static_name() {
                            Some(k) => {
                                let mut sub = path.clone();
                                sub.push(PathSeg::Key(k));
                                self.bind_pat(scope, value, origin, sub, None, span);
                            }
                            None => {
                                self.bind_pat(scope, value, Origin::Opaque, Vec::new(), None, span)
                            }
                        },
                        ObjectPatProp::Rest(r) => {
                            let mut sub = path.clone();
                            sub.push(PathSeg::Rest);
                            self.bind_pat(scope, r, origin, sub, None, span);
                        }
                    }
                }
            }
            Pat::Array { elems, .. } => {
                for (i, e) in elems.iter().enumerate() {
                    let Some(e) = e else { continue };
                    let mut sub = path.clone();
                    match e {
                        Pat::Rest { arg, .. } => {
                            sub.push(PathSeg::RestFrom(i));
                            self.bind_pat(scope, arg, origin, sub, None, span);
                        }
                        _ => {
                            sub.push(PathSeg::Index(i));
                            self.bind_pat(scope, e, origin, sub, None, span);
                        }
                    }
                }
            }
            Pat::Assign {
                target,
                default: d,
                ..
            } => self.bind_pat(scope, target, origin, path, Some(d), span),
            Pat::Rest { arg, .. } => {
                let mut sub = path;
                sub.push(PathSeg::Rest);
                self.bind_pat(scope, arg, origin, sub, None, span);
            }
            Pat::Expr(_) | Pat::Unsupported { .. } => {}
        }
    }

    /// Visits expressions embedded in a pattern: defaults, computed keys
    /// and member targets.
    fn visit_pat_exprs(&mut self, pat: &'p Pat, scope: ScopeId) {
        match pat {
            Pat::Ident { span, .. } => {
                self.index.sites.insert(span.start, scope);
            }
            Pat::Object { props, .. } => {
                for p in props {
                    match p {
                        ObjectPatProp::KeyValue { key, value } => {
                            if let PropKey::Computed(e) = key {
                                self.visit_expr(e, scope);
                            }
                            self.visit_pat_exprs(value, scope);
                        }
                        ObjectPatProp::Rest(r) => self.visit_pat_exprs(r, scope),
                    }
                }
            }
            Pat::Array { elems, .. } => {
                for e in elems.iter().flatten() {
                    self.visit_pat_exprs(e, scope);
                }
            }
            Pat::Assign {
                target, default, ..
            } => {
                self.visit_expr(default, scope);
                self.visit_pat_exprs(target, scope);
            }
            Pat::Rest { arg, .. } => self.visit_pat_exprs(arg, scope),
            Pat::Expr(e) => self.visit_expr(e, scope),
            Pat::Unsupported { .. } => {}
        }
    }

    fn visit_expr(&mut self, e: &'p Expr, scope: ScopeId) {
        self.index.exprs.push((e, scope));
        match &e.kind {
            ExprKind::Ident(_) | ExprKind::This => {
                self.index.sites.insert(e.span.start, scope);
            }
            ExprKind::Function(id) => self.visit_fn(*id, scope, true),
            ExprKind::Class(id) => self.visit_class(*id, scope),
            ExprKind::Template { exprs, .. } => {
                for x in exprs {
                    self.visit_expr(x, scope);
                }
            }
            ExprKind::TaggedTemplate { tag, exprs, .. } => {
                self.visit_expr(tag, scope);
                for x in exprs {
                    self.visit_expr(x, scope);
                }
            }
            ExprKind::Array(items) | ExprKind::Seq(items) => {
                for x in items {
                    self.visit_expr(x, scope);
                }
            }
            ExprKind::Object(props) => self.visit_object(e, props, scope),
            ExprKind::Unary { arg, .. }
            | ExprKind::Update { arg, .. }
            | ExprKind::Await(arg)
            | ExprKind::Spread(arg)
            | ExprKind::Import(arg) => {
                self.visit_expr(arg, scope);
                if let (ExprKind::Update { .. }, Some(name)) = (&e.kind, arg.as_ident()) {
                    self.add_def(scope, name, plain_def(Origin::Opaque, e.span));
                }
            }
            ExprKind::Yield(arg) => {
                if let Some(a) = arg {
                    self.visit_expr(a, scope);
                }
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.visit_expr(left, scope);
                self.visit_expr(right, scope);
            }
            ExprKind::Assign { op, target, value } => {
                self.visit_expr(value, scope);
                self.visit_pat_exprs(target, scope);
                let origin = match op.as_str() {
                    "=" | "||=" | "??=" | "&&=" => Origin::Value(value),
                    "+=" => Origin::Compound(value),
                    _ => Origin::Opaque,
                };
                match target.as_ref() {
                    Pat::Expr(_) | Pat::Unsupported { .. } => {}
                    pat => self.bind_pat(scope, pat, origin, Vec::new(), None, e.span),
                }
            }
            ExprKind::Cond { test, cons, alt } => {
                self.visit_expr(test, scope);
                self.visit_expr(cons, scope);
                self.visit_expr(alt, scope);
            }
            ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
                self.visit_expr(callee, scope);
                for a in args {
                    self.visit_expr(a, scope);
                }
            }
            ExprKind::Member { object, prop, .. } => {
                self.visit_expr(object, scope);
                if let MemberProp::Computed(p) = prop {
                    self.visit_expr(p, scope);
                }
            }
            ExprKind::Jsx(el) => {
                for a in &el.attrs {
                    if let Some(v) = &a.value {
                        self.visit_expr(v, scope);
                    }
                }
                for c in &el.children {
                    self.visit_expr(c, scope);
                }
            }
            ExprKind::Super
            | ExprKind::Str(_)
            | ExprKind::Num(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Regex { .. }
            | ExprKind::Unsupported(_) => {}
        }
    }

    fn visit_object(&mut self, obj: &'p Expr, props: &'p [Prop], scope: ScopeId) {
        let prog = self.prog;
        for p in props {
            match p {
                Prop::KeyValue { key, value } => {
                    if let PropKey::Computed(k) = key {
                        self.visit_expr(k, scope);
                    }
                    if let ExprKind::Function(f) = value.kind {
                        if prog.function(f).is_some_and(|f| !f.is_arrow) {
                            self.index.this_object.insert(f, obj);
                        }
                    }
                    self.visit_expr(value, scope);
                }
                Prop::Shorthand { span, .. } => {
                    self.index.sites.insert(span.start, scope);
                }
                Prop::Method { key, func } | Prop::Accessor { key, func } => {
                    if let PropKey::Computed(k) = key {
                        self.visit_expr(k, scope);
                    }
                    self.index.this_object.insert(*func, obj);
                    self.visit_fn(*func, scope, false);
                }
                Prop::Spread(x) => self.visit_expr(x, scope),
            }
        }
    }
}

fn plain_def(origin: Origin<'_>, span: Span) -> Def<'_> {
    Def {
        origin,
        path: Vec::new(),
        default: None,
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(src: &str) -> Program {
        parsers::parse_javascript(src, false).expect("parse")
    }

    #[test]
    fn var_hoists_to_function_scope() {
        let prog = tree("function f(){ if (x) { var a = 1; } let b = 2; }");
        let (scopes, _) = build(&prog);
        let fs = scopes.fn_scope[&0];
        assert!(scopes.scopes[fs].bindings.contains_key("a"));
        assert!(scopes.scopes[fs].bindings.contains_key("b"));
        assert_eq!(scopes.scopes[fs].bindings["a"].defs.len(), 1);
    }

    #[test]
    fn block_let_does_not_leak() {
        let prog = tree("{ let a = 1; } a;");
        let (scopes, index) = build(&prog);
        let (use_site, _) = index
            .exprs
            .iter()
            .rev()
            .find(|(e, _)| e.as_ident() == Some("a"))
            .copied()
            .expect("use");
        let scope = index.sites[&use_site.span.start];
        assert!(scopes.lookup(scope, "a").is_none());
    }

    #[test]
    fn bare_assignment_creates_implicit_global() {
        let prog = tree("function f(){ leaked = 3; }");
        let (scopes, _) = build(&prog);
        assert_eq!(scopes.implicit["leaked"].defs.len(), 1);
        assert!(scopes.lookup(0, "leaked").is_none());
    }

    #[test]
    fn destructured_params_record_paths_and_defaults() {
        let prog = tree("function f({ url, opts: { method = 'GET' } }, ...rest) {}");
        let (scopes, _) = build(&prog);
        let fs = scopes.fn_scope[&0];
        let method = &scopes.scopes[fs].bindings["method"].defs[0];
        assert_eq!(
            method.path,
            vec![PathSeg::Key("opts".into()), PathSeg::Key("method".into())]
        );
        assert!(method.default.is_some());
        assert!(matches!(
            scopes.scopes[fs].bindings["rest"].defs[0].origin,
            Origin::RestParam { index: 1, .. }
        ));
    }

    #[test]
    fn object_literal_methods_know_their_object() {
        let prog = tree("var api = { get() { return this.base; }, base: '/v1' };");
        let (_, index) = build(&prog);
        assert!(index.this_object.contains_key(&0));
    }
}
