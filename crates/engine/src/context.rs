//! Shared analysis context: scopes, the per-node index, object member
//! tables and the call graph. Built once per program and read by every
//! pass.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use ir::{ClassId, Expr, ExprKind, FnId, MemberKind, Pat, Program, Prop, Span};
use tracing::debug;

use crate::callgraph::{CallGraph, Env, Scoped};
use crate::options::AnalysisOptions;
use crate::resolve::Resolver;
use crate::scope::{self, BindingKey, Index, Origin, ScopeId, ScopeTree};
use crate::value::{Proto, Value};

/// Names that refer to the global object itself.
pub const GLOBAL_ROOTS: &[&str] = &["window", "self", "globalThis"];

/// Host globals an implicit (assignment-created) binding never shadows.
const BUILTINS: &[&str] = &[
    "window",
    "self",
    "globalThis",
    "document",
    "location",
    "navigator",
    "history",
    "localStorage",
    "sessionStorage",
    "name",
    "fetch",
    "eval",
    "Function",
    "XMLHttpRequest",
    "EventSource",
    "WebSocket",
    "Image",
    "Worker",
    "SharedWorker",
    "importScripts",
    "setTimeout",
    "setInterval",
    "postMessage",
    "onmessage",
    "open",
    "top",
    "parent",
    "opener",
    "trustedTypes",
    "$",
    "jQuery",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Identity of an object that receives property writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjKey {
    Binding(BindingKey),
    /// Dotted path below the global object.
    Global(String),
    Proto(Proto),
    Func(FnId),
    Class(ClassId),
    Field(Box<ObjKey>, String),
}

#[derive(Debug, Clone, Copy)]
pub enum MemberVal<'p> {
    Expr(&'p Expr),
    Func(FnId),
    Getter(FnId),
}

#[derive(Debug, Clone, Copy)]
pub struct MemberDef<'p> {
    pub value: MemberVal<'p>,
    pub span: Span,
}

/// Property writes, prototype tables and array registries.
#[derive(Debug, Default)]
pub struct Tables<'p> {
    pub members: HashMap<(ObjKey, String), Vec<MemberDef<'p>>>,
    /// Values appended to an array with `push`/`unshift`.
    pub pushes: HashMap<ObjKey, Vec<&'p Expr>>,
    /// Object a function was stored on as a property.
    pub method_owner: HashMap<FnId, ObjKey>,
    pub class_super: HashMap<ClassId, ClassId>,
    /// Functions that copy the properties of their second argument onto
    /// their first.
    pub copiers: BTreeSet<FnId>,
}

impl<'p> Tables<'p> {
    fn add(&mut self, owner: ObjKey, name: String, value: MemberVal<'p>, span: Span) {
        if let MemberVal::Func(f) = value {
            self.method_owner.entry(f).or_insert_with(|| owner.clone());
        }
        self.members
            .entry((owner, name))
            .or_default()
            .push(MemberDef { value, span });
    }

    fn add_expr(&mut self, owner: ObjKey, name: String, value: &'p Expr, span: Span) {
        match value.kind {
            ExprKind::Function(f) => {
                self.method_owner.entry(f).or_insert_with(|| owner.clone());
                self.members
                    .entry((owner, name))
                    .or_default()
                    .push(MemberDef {
                        value: MemberVal::Expr(value),
                        span,
                    });
            }
            _ => self.add(owner, name, MemberVal::Expr(value), span),
        }
    }

    /// Copies the properties of an object literal onto `owner`.
    fn add_literal(&mut self, owner: &ObjKey, props: &'p [Prop], span: Span) {
        for p in props {
            match p {
                Prop::KeyValue { key, value } => {
                    if let Some(name) = key.static_name() {
                        self.add_expr(owner.clone(), name, value, span);
                    }
                }
                Prop::Method { key, func } => {
                    if let Some(name) = key.static_name() {
                        self.add(owner.clone(), name, MemberVal::Func(*func), span);
                    }
                }
                Prop::Accessor { key, func } => {
                    if let Some(name) = key.static_name() {
                        self.add(owner.clone(), name, MemberVal::Getter(*func), span);
                    }
                }
                Prop::Shorthand { .. } | Prop::Spread(_) => {}
            }
        }
    }

    fn absorb(&mut self, other: Tables<'p>) {
        for (k, v) in other.members {
            self.members.entry(k).or_default().extend(v);
        }
        for (k, v) in other.pushes {
            self.pushes.entry(k).or_default().extend(v);
        }
        for (k, v) in other.method_owner {
            self.method_owner.entry(k).or_insert(v);
        }
        self.copiers.extend(other.copiers);
    }

    /// Class members, property assignments and `push` registries.
    fn build(cx: &Context<'p>) -> Tables<'p> {
        let mut t = Tables::default();
        let prog = cx.prog;
        for c in &prog.classes {
            for m in &c.members {
                let Some(name) = m.key.static_name() else { continue };
                let owner = if m.is_static {
                    ObjKey::Class(c.id)
                } else {
                    ObjKey::Proto(Proto::Class(c.id))
                };
                let value = match &m.kind {
                    MemberKind::Method(f) | MemberKind::Setter(f) => MemberVal::Func(*f),
                    MemberKind::Getter(f) => MemberVal::Getter(*f),
                    MemberKind::Field(Some(e)) => MemberVal::Expr(e),
                    MemberKind::Field(None) => continue,
                };
                t.add(owner, name, value, c.span);
            }
            if let Some(sc) = &c.super_class {
                if let Value::Class(parent) = cx.resolver().resolve(sc) {
                    t.class_super.insert(c.id, parent);
                }
            }
        }
        // Writes through `this` are keyed by the method owners found in the
        // first sweep.
        for this_sweep in [false, true] {
            for &(e, scope) in &cx.index.exprs {
                match &e.kind {
                    ExprKind::Assign { op, target, value } if op != "+=" => {
                        let Pat::Expr(m) = target.as_ref() else { continue };
                        let ExprKind::Member { object, prop, .. } = &m.kind else {
                            continue;
                        };
                        if matches!(object.kind, ExprKind::This) != this_sweep {
                            continue;
                        }
                        let mut r = cx.resolver();
                        let Some(name) = r.prop_name(prop) else { continue };
                        let owner = if this_sweep {
                            match cx.this_fn(scope) {
                                Some(f) => cx.this_key(&t, f),
                                None => Some(ObjKey::Global(String::new())),
                            }
                        } else {
                            r.obj_key(object)
                        };
                        let Some(owner) = owner else { continue };
                        if name == "prototype" {
                            if let (ExprKind::Object(props), Value::Func(f)) =
                                (&value.kind, r.resolve(object))
                            {
                                t.add_literal(&ObjKey::Proto(Proto::Func(f)), props, e.span);
                            }
                        }
                        t.add_expr(owner, name, value, e.span);
                    }
                    ExprKind::Call { callee, args, .. } if !this_sweep => {
                        let ExprKind::Member { object, prop, .. } = &callee.kind else {
                            continue;
                        };
                        let is_push = matches!(
                            prop.static_name().as_deref(),
                            Some("push") | Some("unshift")
                        );
                        if !is_push {
                            continue;
                        }
                        if let Some(owner) = cx.resolver().obj_key(object) {
                            t.pushes.entry(owner).or_default().extend(args.iter());
                        }
                    }
                    _ => {}
                }
            }
        }
        t
    }

    /// Second phase: finds property-copy helpers structurally and applies
    /// the object literals passed to them.
    fn mixins(cx: &Context<'p>) -> Tables<'p> {
        let mut t = Tables::default();
        for &(e, scope) in &cx.index.exprs {
            let Some(f) = cx.scopes.func_of(scope) else { continue };
            match &e.kind {
                ExprKind::Assign { target, value, .. } => {
                    let Pat::Expr(m) = target.as_ref() else { continue };
                    if let (
                        ExprKind::Member { object: to, .. },
                        ExprKind::Member { object: from, .. },
                    ) = (&m.kind, &value.kind)
                    {
                        if is_computed(m)
                            && is_computed(value)
                            && cx.param_index(to, f) == Some(0)
                            && cx.param_index(from, f) == Some(1)
                        {
                            t.copiers.insert(f);
                        }
                    }
                }
                ExprKind::Call { callee, args, .. } => {
                    if cx.resolver().resolve(callee) == Value::Global("Object.assign".into())
                        && args.len() >= 2
                        && cx.param_index(&args[0], f) == Some(0)
                        && cx.param_index(&args[1], f) == Some(1)
                    {
                        t.copiers.insert(f);
                    }
                }
                _ => {}
            }
        }
        for &(e, _) in &cx.index.exprs {
            let ExprKind::Call { callee, args, .. } = &e.kind else { continue };
            if args.len() < 2 {
                continue;
            }
            let mut r = cx.resolver();
            let callee_val = r.resolve(callee);
            let builtin = callee_val == Value::Global("Object.assign".into());
            let copier = callee_val
                .members()
                .iter()
                .any(|v| matches!(v, Value::Func(f) if t.copiers.contains(f)));
            if !builtin && !copier {
                continue;
            }
            let Some(owner) = r.obj_key(&args[0]) else { continue };
            let sources = if builtin { &args[1..] } else { &args[1..2] };
            for src in sources {
                if let ExprKind::Object(props) = &src.kind {
                    t.add_literal(&owner, props, e.span);
                }
            }
        }
        debug!(copiers = t.copiers.len(), "mixin copiers found");
        t
    }
}

fn is_computed(e: &Expr) -> bool {
    matches!(
        &e.kind,
        ExprKind::Member {
            prop: ir::MemberProp::Computed(_),
            ..
        }
    )
}

pub struct Context<'p> {
    pub prog: &'p Program,
    pub src: &'p str,
    pub opts: AnalysisOptions,
    pub scopes: ScopeTree<'p>,
    pub index: Index<'p>,
    pub tables: Tables<'p>,
    pub calls: CallGraph<'p>,
    pub(crate) binding_memo: RefCell<HashMap<BindingKey, (Value, BTreeSet<FnId>)>>,
    pub(crate) env_memo: RefCell<HashMap<(FnId, usize), Vec<Scoped>>>,
}

impl<'p> Context<'p> {
    pub fn new(prog: &'p Program, src: &'p str, opts: &AnalysisOptions) -> Self {
        let (scopes, index) = scope::build(prog);
        let mut cx = Context {
            prog,
            src,
            opts: opts.clone(),
            scopes,
            index,
            tables: Tables::default(),
            calls: CallGraph::default(),
            binding_memo: RefCell::new(HashMap::new()),
            env_memo: RefCell::new(HashMap::new()),
        };
        let tables = Tables::build(&cx);
        cx.tables = tables;
        cx.reset_memos();
        let mixins = Tables::mixins(&cx);
        cx.tables.absorb(mixins);
        cx.reset_memos();
        let calls = CallGraph::build(&cx);
        cx.calls = calls;
        cx.reset_memos();
        let indirect = CallGraph::indirect(&cx);
        cx.calls.absorb(indirect);
        cx.reset_memos();
        debug!(
            scopes = cx.scopes.scopes.len(),
            functions = prog.functions.len(),
            callees = cx.calls.callers.len(),
            "context built"
        );
        cx
    }

    fn reset_memos(&self) {
        self.binding_memo.borrow_mut().clear();
        self.env_memo.borrow_mut().clear();
    }

    pub fn resolver(&self) -> Resolver<'_, 'p> {
        Resolver::new(self, Env::new())
    }

    pub fn scope_at(&self, start: usize) -> Option<ScopeId> {
        self.index.sites.get(&start).copied()
    }

    /// Declared binding an identifier expression refers to.
    pub fn binding_of(&self, e: &Expr) -> Option<BindingKey> {
        let name = e.as_ident()?;
        self.scopes.lookup(self.scope_at(e.span.start)?, name)
    }

    /// True when the identifier is bound by a declaration, so it cannot
    /// be the host global of the same name.
    pub fn is_declared(&self, e: &Expr) -> bool {
        self.binding_of(e).is_some()
    }

    /// Nearest enclosing non-arrow function of a scope.
    pub fn this_fn(&self, scope: ScopeId) -> Option<FnId> {
        let mut f = self.scopes.func_of(scope)?;
        loop {
            let func = self.prog.function(f)?;
            if !func.is_arrow {
                return Some(f);
            }
            f = func.parent?;
        }
    }

    /// Object that `this.x = ...` writes land on inside `f`.
    pub fn this_key(&self, tables: &Tables<'p>, f: FnId) -> Option<ObjKey> {
        if let Some(c) = self.index.fn_class.get(&f) {
            return Some(ObjKey::Proto(Proto::Class(*c)));
        }
        if let Some(owner) = tables.method_owner.get(&f) {
            return Some(owner.clone());
        }
        if self.index.this_object.contains_key(&f) {
            return None;
        }
        Some(ObjKey::Proto(Proto::Func(f)))
    }

    /// Position of `e` among the parameters of `f` when it is a plain
    /// parameter reference.
    pub fn param_index(&self, e: &Expr, f: FnId) -> Option<usize> {
        let key = self.binding_of(e)?;
        let binding = self.scopes.binding(&key)?;
        binding.defs.iter().find_map(|d| match d.origin {
            Origin::Param { func, index } if func == f && d.path.is_empty() => Some(index),
            _ => None,
        })
    }

    /// Function containing an expression at `scope`.
    pub fn func_at(&self, scope: ScopeId) -> Option<FnId> {
        self.scopes.func_of(scope)
    }

    /// Trimmed source line, cut to 200 characters.
    pub fn code_context(&self, line: usize) -> Option<String> {
        let text = self.src.lines().nth(line.checked_sub(1)?)?.trim();
        if text.is_empty() {
            return None;
        }
        Some(text.chars().take(200).collect())
    }
}
