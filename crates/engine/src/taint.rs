//! Taint tracking from user-controlled sources to DOM, code, redirect and
//! request sinks.
//!
//! The tracker walks the same bindings, member tables and call records as
//! the value resolver but carries a [`Taint`] instead of a value. Function
//! parameters take the merged taint of every caller's argument unless a
//! call is being evaluated, in which case the call's own argument taint is
//! used.

use std::collections::{BTreeSet, HashMap};

use ir::{Expr, ExprKind, FnId, JsxElement, MemberProp, Pat, Prop, PropKey, Span};
use tracing::debug;

use crate::callgraph::ArgSlot;
use crate::context::{Context, MemberVal, ObjKey};
use crate::scope::{BindingKey, Def, Origin, PathSeg};
use crate::value::{Proto, Value};

const LOCATION_PARTS: &[&str] = &[
    "hash", "search", "href", "pathname", "origin", "protocol", "hostname", "host", "port",
];

const DOCUMENT_PARTS: &[&str] = &[
    "URL",
    "documentURI",
    "domain",
    "referrer",
    "cookie",
    "title",
    "baseURI",
    "URLUnencoded",
];

const SANITIZER_GLOBALS: &[&str] = &[
    "encodeURIComponent",
    "encodeURI",
    "escape",
    "parseInt",
    "parseFloat",
    "Number",
    "Boolean",
    "DOMPurify.sanitize",
];

const SANITIZER_METHODS: &[&str] = &["sanitize", "escapeHtml", "escapeHTML", "htmlEscape"];

const PROPAGATOR_GLOBALS: &[&str] = &[
    "decodeURIComponent",
    "decodeURI",
    "atob",
    "unescape",
    "JSON.parse",
    "JSON.stringify",
    "String",
    "Object.assign",
    "Object.values",
    "Object.entries",
    "Array.from",
    "Promise.resolve",
    "structuredClone",
];

/// Methods whose arguments flow into the result besides the receiver.
const ARG_FLOW_METHODS: &[&str] = &[
    "concat", "replace", "replaceAll", "padStart", "padEnd", "join", "then",
];

const ELEMENT_URL_PROPS: &[&str] = &["href", "src", "action", "formAction"];
const HTML_PROPS: &[&str] = &["innerHTML", "outerHTML", "srcdoc"];
const JQUERY_DOM: &[&str] = &[
    "html",
    "append",
    "prepend",
    "before",
    "after",
    "replaceWith",
    "wrap",
    "wrapAll",
    "wrapInner",
];
const DANGEROUS_ATTRS: &[&str] = &["href", "src", "action", "formaction", "style", "srcdoc"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Taint {
    #[default]
    Clean,
    Tainted { source: String, sanitized: bool },
}

impl Taint {
    fn source(name: impl Into<String>) -> Taint {
        Taint::Tainted {
            source: name.into(),
            sanitized: false,
        }
    }

    pub fn is_tainted(&self) -> bool {
        matches!(self, Taint::Tainted { .. })
    }

    /// Unsanitized taint dominates sanitized, which dominates clean.
    pub fn merge(self, other: Taint) -> Taint {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Taint::Clean => 0,
            Taint::Tainted { sanitized: true, .. } => 1,
            Taint::Tainted { .. } => 2,
        }
    }

    fn sanitize(self) -> Taint {
        match self {
            Taint::Tainted { source, .. } => Taint::Tainted {
                source,
                sanitized: true,
            },
            clean => clean,
        }
    }
}

/// Restricts which definitions of a binding are visible at a use site.
pub trait DefFilter {
    fn admits(&self, use_at: usize, key: &BindingKey, def: &Def<'_>) -> bool;
}

/// A sink occurrence and the expression that flows into it.
#[derive(Debug, Clone)]
pub struct SinkSite<'p> {
    pub kind: &'static str,
    pub sink: String,
    pub arg: &'p Expr,
    pub span: Span,
}

pub struct Tracker<'a, 'p> {
    cx: &'a Context<'p>,
    handlers: &'a BTreeSet<FnId>,
    filter: Option<&'a dyn DefFilter>,
    frames: Vec<(FnId, Vec<Taint>)>,
    /// Definitions under evaluation, by binding and def index.
    guard: Vec<(BindingKey, usize)>,
    params_busy: BTreeSet<(FnId, usize)>,
    depth: usize,
    steps: usize,
    cut: bool,
    memo: HashMap<BindingKey, Taint>,
    param_memo: HashMap<(FnId, usize), Taint>,
}

impl<'a, 'p> Tracker<'a, 'p> {
    pub fn new(
        cx: &'a Context<'p>,
        handlers: &'a BTreeSet<FnId>,
        filter: Option<&'a dyn DefFilter>,
    ) -> Self {
        Tracker {
            cx,
            handlers,
            filter,
            frames: Vec::new(),
            guard: Vec::new(),
            params_busy: BTreeSet::new(),
            depth: 0,
            steps: 0,
            cut: false,
            memo: HashMap::new(),
            param_memo: HashMap::new(),
        }
    }

    /// Top-level taint of one expression, with a fresh step budget.
    pub fn evaluate(&mut self, e: &'p Expr) -> Taint {
        self.steps = 0;
        self.cut = false;
        self.taint(e)
    }

    pub fn taint(&mut self, e: &'p Expr) -> Taint {
        self.steps += 1;
        if self.steps > self.cx.opts.step_budget || self.depth >= self.cx.opts.max_depth {
            self.cut = true;
            return Taint::Clean;
        }
        self.depth += 1;
        let t = self.taint_kind(e);
        self.depth -= 1;
        t
    }

    fn taint_kind(&mut self, e: &'p Expr) -> Taint {
        if let Some(src) = self.source_of(e) {
            return Taint::source(src);
        }
        match &e.kind {
            ExprKind::Ident(name) => self.ident(name, e.span.start),
            ExprKind::Template { exprs, .. } | ExprKind::TaggedTemplate { exprs, .. } => {
                self.merge_all(exprs.iter())
            }
            ExprKind::Array(items) => self.merge_all(items.iter()),
            ExprKind::Object(props) => {
                let mut t = Taint::Clean;
                for p in props {
                    match p {
                        Prop::KeyValue { value, .. } | Prop::Spread(value) => {
                            t = t.merge(self.taint(value));
                        }
                        Prop::Shorthand { name, span } => {
                            t = t.merge(self.ident(name, span.start));
                        }
                        Prop::Method { .. } | Prop::Accessor { .. } => {}
                    }
                }
                t
            }
            ExprKind::Binary { op, left, right } if op == "+" => {
                let l = self.taint(left);
                l.merge(self.taint(right))
            }
            ExprKind::Logical { left, right, .. } => {
                let l = self.taint(left);
                l.merge(self.taint(right))
            }
            ExprKind::Cond { cons, alt, .. } => {
                let l = self.taint(cons);
                l.merge(self.taint(alt))
            }
            ExprKind::Assign { value, .. } => self.taint(value),
            ExprKind::Seq(items) => items.last().map_or(Taint::Clean, |x| self.taint(x)),
            ExprKind::Await(x) | ExprKind::Spread(x) => self.taint(x),
            ExprKind::Member { object, prop, .. } => self.member(object, prop),
            ExprKind::Call { callee, args, .. } => self.call(callee, args),
            ExprKind::New { callee, args } => {
                if self.user_functions(callee).is_empty() {
                    self.merge_all(args.iter())
                } else {
                    Taint::Clean
                }
            }
            _ => Taint::Clean,
        }
    }

    fn merge_all(&mut self, items: impl Iterator<Item = &'p Expr>) -> Taint {
        let mut t = Taint::Clean;
        for x in items {
            t = t.merge(self.taint(x));
        }
        t
    }

    /// Catalog source read by `e`, named canonically.
    fn source_of(&mut self, e: &'p Expr) -> Option<String> {
        let cx = self.cx;
        match &e.kind {
            ExprKind::Member { object, prop, .. } => {
                if prop.static_name().as_deref() == Some("data") && self.is_handler_event(object)
                {
                    return Some("event.data".into());
                }
                global_source(&cx.resolver().resolve(e))
            }
            ExprKind::Ident(name) => {
                if let Some(key) = cx.binding_of(e) {
                    return self.message_data_binding(&key).then(|| "event.data".into());
                }
                if cx.scopes.implicit.contains_key(name.as_str()) {
                    return None;
                }
                global_source(&Value::Global(name.clone()))
            }
            ExprKind::Call { callee, .. } => {
                let v = cx.resolver().resolve(callee);
                v.members().iter().find_map(|m| match m {
                    Value::Global(p)
                        if p == "localStorage.getItem" || p == "sessionStorage.getItem" =>
                    {
                        Some(p.clone())
                    }
                    _ => None,
                })
            }
            _ => None,
        }
    }

    /// Identifier bound to the event parameter of a message handler.
    fn is_handler_event(&self, e: &Expr) -> bool {
        let cx = self.cx;
        let Some(key) = cx.binding_of(e) else { return false };
        self.is_handler_param(&key)
    }

    fn is_handler_param(&self, key: &BindingKey) -> bool {
        let Some(b) = self.cx.scopes.binding(key) else { return false };
        b.defs.iter().any(|d| {
            matches!(d.origin, Origin::Param { func, index: 0 } if self.handlers.contains(&func))
                && d.path.is_empty()
        })
    }

    /// `({ data }) => ...` or `const { data } = event` inside a handler.
    fn message_data_binding(&self, key: &BindingKey) -> bool {
        let Some(b) = self.cx.scopes.binding(key) else { return false };
        b.defs.iter().any(|d| {
            let from_data = matches!(d.path.first(), Some(PathSeg::Key(k)) if k == "data");
            from_data
                && match d.origin {
                    Origin::Param { func, index: 0 } => self.handlers.contains(&func),
                    Origin::Value(init) => self.is_handler_event(init),
                    _ => false,
                }
        })
    }

    fn ident(&mut self, name: &str, at: usize) -> Taint {
        let cx = self.cx;
        let key = cx.scope_at(at).and_then(|s| cx.scopes.lookup_or_implicit(s, name));
        match key {
            Some(key) => self.binding(&key, at),
            None => Taint::Clean,
        }
    }

    fn binding(&mut self, key: &BindingKey, at: usize) -> Taint {
        let cx = self.cx;
        let cacheable = self.frames.is_empty() && self.filter.is_none();
        if cacheable {
            if let Some(t) = self.memo.get(key) {
                return t.clone();
            }
        }
        let Some(binding) = cx.scopes.binding(key) else {
            return Taint::Clean;
        };
        let outer_cut = std::mem::replace(&mut self.cut, false);
        let mut t = Taint::Clean;
        // A self-read such as `x = x.trim()` sees the other definitions.
        for (i, def) in binding.defs.iter().enumerate() {
            if let Some(filter) = self.filter {
                if !filter.admits(at, key, def) {
                    continue;
                }
            }
            let slot = (key.clone(), i);
            if self.guard.contains(&slot) {
                self.cut = true;
                continue;
            }
            self.guard.push(slot);
            t = t.merge(self.def(def));
            self.guard.pop();
        }
        let pushes_slot = (key.clone(), binding.defs.len());
        if let Some(pushed) = cx.tables.pushes.get(&ObjKey::Binding(key.clone())) {
            if self.guard.contains(&pushes_slot) {
                self.cut = true;
            } else {
                self.guard.push(pushes_slot);
                for &p in pushed {
                    t = t.merge(self.taint(p));
                }
                self.guard.pop();
            }
        }
        if cacheable && !self.cut {
            self.memo.insert(key.clone(), t.clone());
        }
        self.cut |= outer_cut;
        t
    }

    fn def(&mut self, def: &Def<'p>) -> Taint {
        let t = match def.origin {
            Origin::Value(e) if !def.path.is_empty() => {
                let t = self.taint(e);
                match self.destructured_source(e, &def.path) {
                    Some(src) => t.merge(Taint::source(src)),
                    None => t,
                }
            }
            Origin::Value(e) | Origin::Compound(e) | Origin::Element(e) => self.taint(e),
            Origin::Param { func, index } => self.param(func, index, false),
            Origin::RestParam { func, index } => self.param(func, index, true),
            Origin::Function(_) | Origin::Class(_) | Origin::Opaque => Taint::Clean,
        };
        match def.default {
            Some(d) => t.merge(self.taint(d)),
            None => t,
        }
    }

    /// `var { hash } = location` reads `location.hash`.
    fn destructured_source(&self, init: &'p Expr, path: &[PathSeg]) -> Option<String> {
        let mut r = self.cx.resolver();
        let mut v = r.resolve(init);
        for seg in path {
            let PathSeg::Key(k) = seg else { return None };
            v = r.member_of(&v, Some(k));
        }
        global_source(&v)
    }

    fn param(&mut self, func: FnId, index: usize, rest: bool) -> Taint {
        if let Some((_, frame)) = self.frames.iter().rev().find(|(f, _)| *f == func) {
            let slice: Vec<Taint> = if rest {
                frame.iter().skip(index).cloned().collect()
            } else {
                frame.get(index).cloned().into_iter().collect()
            };
            return slice.into_iter().fold(Taint::Clean, Taint::merge);
        }
        let memo_key = (func, index);
        if self.filter.is_none() {
            if let Some(t) = self.param_memo.get(&memo_key) {
                return t.clone();
            }
        }
        if !self.params_busy.insert(memo_key) {
            self.cut = true;
            return Taint::Clean;
        }
        let cx = self.cx;
        let outer_cut = std::mem::replace(&mut self.cut, false);
        let saved = std::mem::take(&mut self.frames);
        let mut t = Taint::Clean;
        if let Some(records) = cx.calls.callers.get(&func) {
            for rec in records {
                t = t.merge(self.slot_taint(&rec.args, index, rest));
            }
        }
        self.frames = saved;
        self.params_busy.remove(&memo_key);
        if self.filter.is_none() && !self.cut {
            self.param_memo.insert(memo_key, t.clone());
        }
        self.cut |= outer_cut;
        t
    }

    fn slot_taint(&mut self, slots: &[ArgSlot<'p>], index: usize, rest: bool) -> Taint {
        let mut t = Taint::Clean;
        for (i, slot) in slots.iter().enumerate() {
            let (ArgSlot::Expr(e) | ArgSlot::Elements(e) | ArgSlot::Spread(e)) = *slot;
            let spread = matches!(slot, ArgSlot::Spread(_));
            if i == index || (rest && i > index) || (spread && i <= index) {
                t = t.merge(self.taint(e));
            }
        }
        t
    }

    fn member(&mut self, object: &'p Expr, prop: &'p MemberProp) -> Taint {
        let mut t = self.taint(object);
        let cx = self.cx;
        let mut r = cx.resolver();
        if let (Some(owner), Some(name)) = (r.obj_key(object), prop.static_name()) {
            if let Some(defs) = cx.tables.members.get(&(owner, name)) {
                for d in defs {
                    if let MemberVal::Expr(x) = d.value {
                        t = t.merge(self.taint(x));
                    }
                }
            }
        }
        t
    }

    fn user_functions(&mut self, callee: &'p Expr) -> Vec<FnId> {
        self.cx.resolver().functions(callee)
    }

    fn call(&mut self, callee: &'p Expr, args: &'p [Expr]) -> Taint {
        let cx = self.cx;
        let funcs = self.user_functions(callee);
        if !funcs.is_empty() {
            let frame: Vec<Taint> = args.iter().map(|a| self.taint(a)).collect();
            let mut t = Taint::Clean;
            for f in funcs {
                t = t.merge(self.invoke(f, frame.clone()));
            }
            return t;
        }

        let callee_val = cx.resolver().resolve(callee);
        let global = callee_val.members().iter().find_map(|m| match m {
            Value::Global(p) => Some(p.clone()),
            _ => None,
        });
        if let Some(path) = &global {
            if SANITIZER_GLOBALS.contains(&path.as_str()) || path.starts_with("Math.") {
                return self.merge_all(args.iter()).sanitize();
            }
            if PROPAGATOR_GLOBALS.contains(&path.as_str()) {
                return self.merge_all(args.iter());
            }
        }
        let ExprKind::Member { object, prop, .. } = &callee.kind else {
            return Taint::Clean;
        };
        let Some(name) = prop.static_name() else {
            return self.taint(object);
        };
        if SANITIZER_METHODS.contains(&name.as_str()) {
            return self.merge_all(args.iter()).sanitize();
        }
        let mut t = self.taint(object);
        if ARG_FLOW_METHODS.contains(&name.as_str()) {
            t = t.merge(self.merge_all(args.iter()));
        }
        t
    }

    fn invoke(&mut self, f: FnId, frame: Vec<Taint>) -> Taint {
        let cx = self.cx;
        if self.frames.iter().any(|(g, _)| *g == f) || self.frames.len() >= 16 {
            return Taint::Clean;
        }
        let Some(returns) = cx.index.returns.get(&f) else {
            return Taint::Clean;
        };
        self.frames.push((f, frame));
        let mut t = Taint::Clean;
        for &r in returns {
            t = t.merge(self.taint(r));
        }
        self.frames.pop();
        t
    }
}

/// Source name for a resolved global read, if it is in the catalog.
fn global_source(v: &Value) -> Option<String> {
    v.members().iter().find_map(|m| {
        let Value::Global(p) = m else { return None };
        let p: &str = p
            .strip_prefix("document.")
            .filter(|rest| rest.starts_with("location"))
            .unwrap_or(p);
        let hit = match p.split_once('.') {
            Some(("location", part)) => LOCATION_PARTS.contains(&part),
            Some(("document", part)) => DOCUMENT_PARTS.contains(&part),
            Some(("history", "state")) => true,
            None => p == "name",
            _ => false,
        };
        hit.then(|| if p == "name" { "window.name".to_string() } else { p.to_string() })
    })
}

/// Functions registered as `message` event handlers.
pub fn message_handlers(cx: &Context<'_>) -> BTreeSet<FnId> {
    let mut out = BTreeSet::new();
    for &(e, _) in &cx.index.exprs {
        let handler = match &e.kind {
            ExprKind::Call { callee, args, .. } => {
                let is_listen = callee.member_name().as_deref() == Some("addEventListener");
                let is_message = args.first().and_then(Expr::as_str_lit) == Some("message");
                match args.get(1) {
                    Some(h) if is_listen && is_message => h,
                    _ => continue,
                }
            }
            ExprKind::Assign { op, target, value } if op == "=" => {
                let name = match target.as_ref() {
                    Pat::Expr(m) => m.member_name(),
                    Pat::Ident { name, .. } => Some(name.clone()),
                    _ => None,
                };
                if name.as_deref() != Some("onmessage") {
                    continue;
                }
                value.as_ref()
            }
            _ => continue,
        };
        out.extend(cx.resolver().functions(handler));
    }
    out
}

/// Every sink occurrence in the program, tainted or not.
pub fn sink_sites<'p>(cx: &Context<'p>) -> Vec<SinkSite<'p>> {
    let mut out = Vec::new();
    for &(e, _) in &cx.index.exprs {
        match &e.kind {
            ExprKind::Assign { target, value, .. } => assign_sink(cx, e, target, value, &mut out),
            ExprKind::Call { callee, args, .. } => call_sink(cx, e, callee, args, &mut out),
            ExprKind::New { callee, args } => {
                let v = cx.resolver().resolve(callee);
                let names = ["Function", "Worker", "SharedWorker", "WebSocket", "EventSource"];
                let Some(name) = global_name(&v, &names) else { continue };
                let (kind, arg) = match name {
                    "Function" => ("eval", args.last()),
                    "Worker" | "SharedWorker" => ("eval", args.first()),
                    _ => ("request-forgery", args.first()),
                };
                if let Some(arg) = arg {
                    push_sink(&mut out, kind, name, arg, e.span);
                }
            }
            ExprKind::Import(spec) => push_sink(&mut out, "eval", "import()", spec, e.span),
            ExprKind::Jsx(el) => jsx_sink(el, e.span, &mut out),
            ExprKind::Object(props) => {
                for p in props {
                    if let Prop::KeyValue {
                        key: PropKey::Ident(k) | PropKey::Str(k),
                        value,
                    } = p
                    {
                        if k == "dangerouslySetInnerHTML" {
                            if let Some(html) = html_field(value) {
                                push_sink(&mut out, "xss", "dangerouslySetInnerHTML", html, e.span);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn push_sink<'p>(
    out: &mut Vec<SinkSite<'p>>,
    kind: &'static str,
    sink: &str,
    arg: &'p Expr,
    span: Span,
) {
    out.push(SinkSite {
        kind,
        sink: sink.to_string(),
        arg,
        span,
    });
}

pub(crate) fn global_name<'v>(v: &'v Value, names: &[&str]) -> Option<&'v str> {
    v.members().into_iter().find_map(|m| match m {
        Value::Global(p) if names.contains(&p.as_str()) => Some(p.as_str()),
        _ => None,
    })
}

/// True for values that can be a DOM node: not a plain literal object or
/// an instance of a user-defined type.
fn may_be_element(v: &Value) -> bool {
    v.members().iter().all(|m| {
        !matches!(
            m,
            Value::Map(_)
                | Value::List(_)
                | Value::Str(_)
                | Value::Num(_)
                | Value::Instance(Proto::Func(_) | Proto::Class(_))
        )
    })
}

fn is_location(v: &Value) -> bool {
    global_name(v, &["location", "document.location"]).is_some()
}

/// A local binding named like a host object, e.g. a `location` parameter.
fn is_shadowed_host(cx: &Context<'_>, e: &Expr) -> bool {
    matches!(&e.kind, ExprKind::Ident(n) if matches!(n.as_str(), "location" | "window" | "document"))
        && cx.is_declared(e)
}

fn assign_sink<'p>(
    cx: &Context<'p>,
    e: &'p Expr,
    target: &'p Pat,
    value: &'p Expr,
    out: &mut Vec<SinkSite<'p>>,
) {
    match target {
        Pat::Ident { name, .. } if name == "location" => {
            let declared = cx
                .scope_at(target.span().start)
                .and_then(|s| cx.scopes.lookup(s, name))
                .is_some();
            if !declared {
                push_sink(out, "redirect", "location", value, e.span);
            }
        }
        Pat::Expr(m) => {
            let ExprKind::Member { object, prop, .. } = &m.kind else { return };
            let Some(name) = prop.static_name() else { return };
            if is_shadowed_host(cx, object) {
                return;
            }
            let obj = cx.resolver().resolve(object);
            if name == "location" && global_name(&obj, &["", "document"]).is_some() {
                push_sink(out, "redirect", "location", value, e.span);
            } else if is_location(&obj) {
                if matches!(name.as_str(), "href" | "pathname" | "search") {
                    push_sink(out, "redirect", &format!("location.{name}"), value, e.span);
                }
            } else if (HTML_PROPS.contains(&name.as_str())
                || ELEMENT_URL_PROPS.contains(&name.as_str()))
                && may_be_element(&obj)
            {
                push_sink(out, "xss", &name, value, e.span);
            }
        }
        _ => {}
    }
}

fn call_sink<'p>(
    cx: &Context<'p>,
    e: &'p Expr,
    callee: &'p Expr,
    args: &'p [Expr],
    out: &mut Vec<SinkSite<'p>>,
) {
    let mut r = cx.resolver();
    let v = r.resolve(callee);
    let first = args.first();
    if let Some(name) = global_name(
        &v,
        &[
            "eval",
            "setTimeout",
            "setInterval",
            "importScripts",
            "navigator.serviceWorker.register",
            "document.write",
            "document.writeln",
            "location.assign",
            "location.replace",
            "document.location.assign",
            "document.location.replace",
            "open",
            "fetch",
            "navigator.sendBeacon",
        ],
    ) {
        let (kind, sink) = match name {
            "eval" | "setTimeout" | "setInterval" | "importScripts" => ("eval", name.to_string()),
            "navigator.serviceWorker.register" => ("eval", "serviceWorker.register".to_string()),
            "document.write" | "document.writeln" => ("xss", name.to_string()),
            "open" => ("redirect", "window.open".to_string()),
            "fetch" => ("request-forgery", "fetch".to_string()),
            "navigator.sendBeacon" => ("request-forgery", "sendBeacon".to_string()),
            other => ("redirect", other.trim_start_matches("document.").to_string()),
        };
        if let Some(arg) = first {
            push_sink(out, kind, &sink, arg, e.span);
        }
        return;
    }

    if let ExprKind::Ident(n) = &callee.kind {
        if (n == "$" || n == "jQuery") && !cx.is_declared(callee) {
            if let Some(arg) = first {
                if !arg.is_literal() && !arg.is_function() {
                    push_sink(out, "xss", "$()", arg, e.span);
                }
            }
        }
        return;
    }

    let ExprKind::Member { object, prop, .. } = &callee.kind else { return };
    let Some(name) = prop.static_name() else { return };
    match name.as_str() {
        "insertAdjacentHTML" => {
            if let Some(arg) = args.get(1) {
                push_sink(out, "xss", "insertAdjacentHTML", arg, e.span);
            }
        }
        "setHTMLUnsafe" | "createContextualFragment" => {
            if let Some(arg) = first {
                push_sink(out, "xss", &name, arg, e.span);
            }
        }
        "setAttribute" => {
            let attr = first.and_then(|a| r.resolve(a).as_str().map(str::to_lowercase));
            if let (Some(attr), Some(arg)) = (attr, args.get(1)) {
                if attr.starts_with("on") || DANGEROUS_ATTRS.contains(&attr.as_str()) {
                    push_sink(out, "xss", &format!("setAttribute({attr})"), arg, e.span);
                }
            }
        }
        "open" => {
            let recv = r.resolve(object);
            let is_xhr = recv
                .members()
                .iter()
                .any(|m| matches!(m, Value::Instance(Proto::Global(g)) if g == "XMLHttpRequest"));
            if is_xhr {
                if let Some(arg) = args.get(1) {
                    push_sink(out, "request-forgery", "XMLHttpRequest.open", arg, e.span);
                }
            }
        }
        m if JQUERY_DOM.contains(&m) && is_jquery_chain(cx, object) => {
            if let Some(arg) = first {
                push_sink(out, "xss", &format!("jQuery.{m}"), arg, e.span);
            }
        }
        _ => {}
    }
}

/// `$(...)`-rooted call chains and `$`-prefixed element variables.
fn is_jquery_chain(cx: &Context<'_>, e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Call { callee, .. } => match &callee.kind {
            ExprKind::Ident(n) => (n == "$" || n == "jQuery") && !cx.is_declared(callee),
            ExprKind::Member { object, .. } => is_jquery_chain(cx, object),
            _ => false,
        },
        ExprKind::Ident(n) => n.starts_with('$') && n.len() > 1,
        ExprKind::Member { object, .. } => is_jquery_chain(cx, object),
        _ => false,
    }
}

fn html_field(value: &Expr) -> Option<&Expr> {
    let ExprKind::Object(props) = &value.kind else { return None };
    props.iter().find_map(|p| match p {
        Prop::KeyValue {
            key: PropKey::Ident(k) | PropKey::Str(k),
            value,
        } if k == "__html" => Some(value),
        _ => None,
    })
}

fn jsx_sink<'p>(el: &'p JsxElement, span: Span, out: &mut Vec<SinkSite<'p>>) {
    for attr in &el.attrs {
        if attr.name != "dangerouslySetInnerHTML" {
            continue;
        }
        if let Some(html) = attr.value.as_ref().and_then(html_field) {
            push_sink(out, "xss", "dangerouslySetInnerHTML", html, span);
        }
    }
}

/// Sink sites whose argument carries user-controlled taint.
pub fn tainted_sinks<'p>(
    cx: &Context<'p>,
    handlers: &BTreeSet<FnId>,
) -> Vec<(SinkSite<'p>, Taint)> {
    let mut tracker = Tracker::new(cx, handlers, None);
    let mut out = Vec::new();
    for site in sink_sites(cx) {
        let t = tracker.evaluate(site.arg);
        if t.is_tainted() {
            out.push((site, t));
        }
    }
    debug!(candidates = out.len(), handlers = handlers.len(), "taint pass done");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;

    fn sinks(src: &str) -> Vec<(String, String, Taint)> {
        let prog = parsers::parse_javascript(src, false).expect("parse");
        let opts = AnalysisOptions::default();
        let cx = Context::new(&prog, src, &opts);
        let handlers = message_handlers(&cx);
        tainted_sinks(&cx, &handlers)
            .into_iter()
            .map(|(s, t)| (s.kind.to_string(), s.sink, t))
            .collect()
    }

    #[test]
    fn merge_prefers_unsanitized() {
        let raw = Taint::source("location.hash");
        let clean = raw.clone().sanitize();
        assert_eq!(clean.clone().merge(raw.clone()), raw);
        assert_eq!(Taint::Clean.merge(clean.clone()), clean);
    }

    #[test]
    fn destructuring_and_callbacks_keep_taint() {
        let out = sinks(
            "const { q: query = '' } = { q: location.search }; [query].forEach(function (v) { document.body.innerHTML = v; });",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "xss");
    }

    #[test]
    fn function_arguments_are_not_eval_findings() {
        assert!(sinks("setTimeout(function () {}, location.hash.length);").is_empty());
        let out = sinks("setTimeout(location.hash.slice(1), 10);");
        assert_eq!(out[0].1, "setTimeout");
    }

    #[test]
    fn message_data_is_a_source() {
        let out = sinks("window.addEventListener('message', ({ data }) => { eval(data); });");
        assert_eq!(
            out[0].2,
            Taint::Tainted {
                source: "event.data".into(),
                sanitized: false
            }
        );
    }

    #[test]
    fn non_catalog_dom_reads_are_clean() {
        assert!(sinks("el.innerHTML = other.textContent;").is_empty());
    }

    #[test]
    fn shadowed_location_is_not_a_source() {
        let src = "function f(location) { document.body.innerHTML = location.hash; } f({ hash: 'x' });";
        assert!(sinks(src).is_empty());
    }
}
