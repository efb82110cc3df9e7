//! Value resolver: maps an expression to the abstract [`Value`] it may
//! hold, following bindings, object members, calls and common builtins.
//!
//! Resolution never fails. Gaps degrade to `Unknown`, cycles to
//! `Circular`, and parameters of functions without a frame in the active
//! environment become named `Sym` placeholders (the function is recorded
//! in [`Resolver::needed`] so callers can retry with caller environments).

use std::collections::BTreeSet;

use ir::{Expr, ExprKind, FnId, LogicalOp, MemberProp, Prop, PropKey};

use crate::callgraph::{ArgSlot, CallRecord, Env};
use crate::context::{is_builtin, Context, MemberDef, MemberVal, ObjKey, GLOBAL_ROOTS};
use crate::scope::{BindingKey, Def, Origin, PathSeg};
use crate::value::{encode_uri_component, Field, Proto, Sym, Value};

const MAX_CALL_DEPTH: usize = 16;

pub struct Resolver<'a, 'p> {
    cx: &'a Context<'p>,
    pub env: Env,
    /// Functions whose parameters were read without a frame.
    pub needed: BTreeSet<FnId>,
    depth: usize,
    steps: usize,
    guard: Vec<BindingKey>,
    calls: Vec<FnId>,
    /// Set when a bound or a cycle cut the current resolution short.
    limited: bool,
}

impl<'a, 'p> Resolver<'a, 'p> {
    pub fn new(cx: &'a Context<'p>, env: Env) -> Self {
        Resolver {
            cx,
            env,
            needed: BTreeSet::new(),
            depth: 0,
            steps: 0,
            guard: Vec::new(),
            calls: Vec::new(),
            limited: false,
        }
    }

    fn max(&self) -> usize {
        self.cx.opts.max_values
    }

    fn join(&self, values: Vec<Value>) -> Value {
        Value::join(values, self.max())
    }

    pub fn resolve(&mut self, e: &'p Expr) -> Value {
        self.steps += 1;
        if self.steps > self.cx.opts.step_budget || self.depth >= self.cx.opts.max_depth {
            self.limited = true;
            return Value::Unknown;
        }
        self.depth += 1;
        let v = self.resolve_kind(e);
        self.depth -= 1;
        v
    }

    fn resolve_kind(&mut self, e: &'p Expr) -> Value {
        match &e.kind {
            ExprKind::Str(s) => Value::Str(s.clone()),
            ExprKind::Num(n) => Value::Num(*n),
            ExprKind::Bool(b) => Value::Bool(*b),
            ExprKind::Null => Value::Null,
            ExprKind::Template { quasis, exprs } => {
                let mut v = Value::Str(quasis.first().cloned().unwrap_or_default());
                for (i, x) in exprs.iter().enumerate() {
                    let part = self.resolve(x);
                    let part = hole(part, x);
                    v = Value::concat(&v, &part, self.max());
                    let tail = Value::Str(quasis.get(i + 1).cloned().unwrap_or_default());
                    v = Value::concat(&v, &tail, self.max());
                }
                v
            }
            ExprKind::Ident(name) => self.resolve_name(name, e.span.start),
            ExprKind::This => match self.cx.scope_at(e.span.start).and_then(|s| self.cx.this_fn(s)) {
                Some(f) => self.this_of(f),
                None => Value::Global(String::new()),
            },
            ExprKind::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for it in items {
                    if let ExprKind::Spread(inner) = &it.kind {
                        match self.resolve(inner) {
                            Value::List(xs) => out.extend(xs),
                            _ => out.push(Value::Unknown),
                        }
                    } else {
                        out.push(self.resolve(it));
                    }
                }
                Value::List(out)
            }
            ExprKind::Object(props) => self.object_value(props),
            ExprKind::Function(f) => Value::Func(*f),
            ExprKind::Class(c) => Value::Class(*c),
            ExprKind::Unary { op, arg } => {
                let v = self.resolve(arg);
                match (op.as_str(), v) {
                    ("!", v) => v.truthiness().map_or(Value::Unknown, |t| Value::Bool(!t)),
                    ("-", Value::Num(n)) => Value::Num(-n),
                    ("+", Value::Num(n)) => Value::Num(n),
                    _ => Value::Unknown,
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.resolve(left);
                let r = self.resolve(right);
                match (op.as_str(), &l, &r) {
                    ("+", _, _) => Value::concat(&hole(l.clone(), left), &hole(r, right), self.max()),
                    ("-", Value::Num(a), Value::Num(b)) => Value::Num(a - b),
                    ("*", Value::Num(a), Value::Num(b)) => Value::Num(a * b),
                    ("/", Value::Num(a), Value::Num(b)) if *b != 0.0 => Value::Num(a / b),
                    _ => Value::Unknown,
                }
            }
            ExprKind::Logical { op, left, right } => self.logical(*op, left, right),
            ExprKind::Cond { test, cons, alt } => match self.resolve(test).truthiness() {
                Some(true) => self.resolve(cons),
                Some(false) => self.resolve(alt),
                None => {
                    let a = self.resolve(cons);
                    let b = self.resolve(alt);
                    self.join(vec![a, b])
                }
            },
            ExprKind::Assign { op, value, .. } if op.as_str() != "+=" => self.resolve(value),
            ExprKind::Seq(items) => match items.last() {
                Some(last) => self.resolve(last),
                None => Value::Unknown,
            },
            ExprKind::Await(x) | ExprKind::Spread(x) => self.resolve(x),
            ExprKind::Call { callee, args, .. } => self.call(callee, args),
            ExprKind::New { callee, args } => self.construct(callee, args),
            ExprKind::Member { object, prop, .. } => self.member(object, prop),
            _ => Value::Unknown,
        }
    }

    /// Value of the name `name` as seen from the identifier starting at `at`.
    pub fn resolve_name(&mut self, name: &str, at: usize) -> Value {
        if name == "undefined" {
            return Value::Unknown;
        }
        let cx = self.cx;
        let key = cx.scope_at(at).and_then(|s| cx.scopes.lookup(s, name));
        match key {
            Some(key) => {
                let v = self.resolve_binding(&key);
                strip_self_alias(v, name, self.max())
            }
            None => self.global_name(name),
        }
    }

    fn global_name(&mut self, name: &str) -> Value {
        if GLOBAL_ROOTS.contains(&name) {
            return Value::Global(String::new());
        }
        let cx = self.cx;
        let mut vals = Vec::new();
        if !is_builtin(name) && cx.scopes.implicit.contains_key(name) {
            let key = BindingKey {
                scope: crate::scope::IMPLICIT,
                name: name.to_string(),
            };
            vals.push(self.resolve_binding(&key));
        }
        if let Some(defs) = cx
            .tables
            .members
            .get(&(ObjKey::Global(String::new()), name.to_string()))
        {
            for d in defs {
                vals.push(self.member_def(d));
            }
        }
        if vals.is_empty() {
            Value::Global(name.to_string())
        } else {
            self.join(vals)
        }
    }

    fn global_path(&mut self, path: &str) -> Value {
        let mut segs = path.split('.');
        let mut v = match segs.next() {
            Some(first) if !first.is_empty() => self.global_name(first),
            _ => return Value::Global(String::new()),
        };
        for s in segs {
            v = self.member_of(&v, Some(s));
        }
        v
    }

    pub fn resolve_binding(&mut self, key: &BindingKey) -> Value {
        let cx = self.cx;
        let cacheable = self.env.is_empty();
        if cacheable {
            let hit = cx.binding_memo.borrow().get(key).cloned();
            if let Some((v, needed)) = hit {
                self.needed.extend(needed);
                return v;
            }
        }
        if self.guard.contains(key) {
            self.limited = true;
            return Value::Circular;
        }
        let Some(binding) = cx.scopes.binding(key) else {
            return Value::Unknown;
        };
        let outer_limited = std::mem::replace(&mut self.limited, false);
        let outer_needed = std::mem::take(&mut self.needed);
        self.guard.push(key.clone());

        let mut plain = Vec::new();
        let mut compounds = Vec::new();
        for def in &binding.defs {
            match def.origin {
                Origin::Compound(e) => compounds.push(e),
                _ => plain.push(self.resolve_def(key, def)),
            }
        }
        let mut v = if plain.is_empty() {
            Value::Unknown
        } else {
            self.join(plain)
        };
        for c in compounds {
            let rhs = self.resolve(c);
            v = Value::concat(&v, &hole(rhs, c), self.max());
        }
        if let Some(pushed) = cx.tables.pushes.get(&ObjKey::Binding(key.clone())) {
            v = self.with_pushes(v, pushed);
        }

        self.guard.pop();
        let mine = std::mem::replace(&mut self.needed, outer_needed);
        self.needed.extend(mine.iter().copied());
        if cacheable && !self.limited {
            cx.binding_memo
                .borrow_mut()
                .insert(key.clone(), (v.clone(), mine));
        }
        self.limited |= outer_limited;
        v
    }

    fn with_pushes(&mut self, v: Value, pushed: &[&'p Expr]) -> Value {
        let mut extra = Vec::new();
        for &p in pushed {
            extra.push(self.resolve(p));
        }
        let mut items = Vec::new();
        for m in v.into_members() {
            if let Value::List(xs) = m {
                items.extend(xs);
            }
        }
        items.extend(extra);
        Value::List(items)
    }

    fn resolve_def(&mut self, key: &BindingKey, def: &Def<'p>) -> Value {
        let base = match def.origin {
            Origin::Value(e) | Origin::Compound(e) => self.resolve(e),
            Origin::Param { func, index } => match self.env.get(&func) {
                Some(frame) => match frame.get(index) {
                    Some(v) if !v.is_unresolved() => v.clone(),
                    _ => return self.missing(key, def),
                },
                None => {
                    self.needed.insert(func);
                    return self.symbolic(key, def);
                }
            },
            Origin::RestParam { func, index } => match self.env.get(&func) {
                Some(frame) => Value::List(frame.iter().skip(index).cloned().collect()),
                None => {
                    self.needed.insert(func);
                    return self.symbolic(key, def);
                }
            },
            Origin::Element(iterable) => {
                let v = self.resolve(iterable);
                element_of(v, self.max())
            }
            Origin::Function(f) => Value::Func(f),
            Origin::Class(c) => Value::Class(c),
            Origin::Opaque => Value::Unknown,
        };
        let mut v = self.project(base, &def.path);
        if !def.path.is_empty() {
            if let Value::Sym(s) = &mut v {
                if s.binding.is_none() {
                    s.name = key.name.clone();
                    s.binding = Some(key.clone());
                }
            }
        }
        match (def.default, v) {
            (Some(d), v) if v.is_unresolved() => self.resolve(d),
            (Some(d), Value::Sym(mut s)) if s.default.is_none() => {
                s.default = Some(Box::new(self.resolve(d)));
                Value::Sym(s)
            }
            (_, v) => v,
        }
    }

    fn symbolic(&mut self, key: &BindingKey, def: &Def<'p>) -> Value {
        let default = def.default.map(|d| Box::new(self.resolve(d)));
        Value::Sym(Sym {
            name: key.name.clone(),
            binding: Some(key.clone()),
            default,
        })
    }

    fn missing(&mut self, key: &BindingKey, def: &Def<'p>) -> Value {
        match def.default {
            Some(d) => self.resolve(d),
            None => Value::Sym(Sym {
                name: key.name.clone(),
                binding: Some(key.clone()),
                default: None,
            }),
        }
    }

    fn project(&mut self, mut v: Value, path: &[PathSeg]) -> Value {
        for seg in path {
            v = match seg {
                PathSeg::Key(k) => self.member_of(&v, Some(k)),
                PathSeg::Index(i) => {
                    let parts: Vec<Value> = v
                        .members()
                        .into_iter()
                        .map(|m| match m {
                            Value::List(xs) => xs.get(*i).cloned().unwrap_or(Value::Unknown),
                            Value::Sym(s) => Value::Sym(s.clone()),
                            _ => Value::Unknown,
                        })
                        .collect();
                    self.join(parts)
                }
                PathSeg::RestFrom(i) => match v {
                    Value::List(xs) => Value::List(xs.into_iter().skip(*i).collect()),
                    other => other,
                },
                PathSeg::Rest => v,
            };
        }
        v
    }

    /// Property `key` of every alternative of `v`; `None` reads all values.
    pub fn member_of(&mut self, v: &Value, key: Option<&str>) -> Value {
        if let Value::Many(items) = v {
            let mut out = Vec::with_capacity(items.len());
            for m in items {
                out.push(self.member_of(m, key));
            }
            return self.join(out);
        }
        let cx = self.cx;
        match (v, key) {
            (Value::Map(fields), None) => {
                let vals = fields.iter().map(|f| f.value.clone()).collect();
                self.join(vals)
            }
            (Value::Map(_), Some(k)) => v.get(k).cloned().unwrap_or(Value::Unknown),
            (Value::List(items), None) => self.join(items.clone()),
            (Value::List(items), Some("length")) => Value::Num(items.len() as f64),
            (Value::List(items), Some(k)) => k
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Unknown),
            (Value::Str(s), Some("length")) => Value::Num(s.chars().count() as f64),
            (Value::Global(p), Some(k)) => {
                if p.is_empty() {
                    return self.global_name(k);
                }
                let defs = self.defs_of(&ObjKey::Global(p.clone()), k);
                if defs.is_empty() {
                    Value::Global(format!("{p}.{k}"))
                } else {
                    self.join(defs)
                }
            }
            (Value::Instance(proto), Some(k)) => {
                let mut proto = proto.clone();
                let mut hops = 0;
                loop {
                    let defs = self.defs_of(&ObjKey::Proto(proto.clone()), k);
                    if !defs.is_empty() {
                        return self.join(defs);
                    }
                    let parent = match &proto {
                        Proto::Class(c) => cx.tables.class_super.get(c).copied(),
                        _ => None,
                    };
                    match parent {
                        Some(p) if hops < 8 => {
                            proto = Proto::Class(p);
                            hops += 1;
                        }
                        _ => return Value::Unknown,
                    }
                }
            }
            (Value::Func(f), Some(k)) => {
                let defs = self.defs_of(&ObjKey::Func(*f), k);
                self.join(defs)
            }
            (Value::Class(c), Some(k)) => {
                let defs = self.defs_of(&ObjKey::Class(*c), k);
                self.join(defs)
            }
            (Value::Sym(_), Some(k)) => Value::Sym(Sym::named(k)),
            (Value::Sym(s), None) => Value::Sym(s.clone()),
            _ => Value::Unknown,
        }
    }

    fn defs_of(&mut self, owner: &ObjKey, key: &str) -> Vec<Value> {
        let cx = self.cx;
        let Some(defs) = cx.tables.members.get(&(owner.clone(), key.to_string())) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(defs.len());
        for d in defs {
            out.push(self.member_def(d));
        }
        out
    }

    fn member_def(&mut self, d: &MemberDef<'p>) -> Value {
        match d.value {
            MemberVal::Expr(e) => self.resolve(e),
            MemberVal::Func(f) => Value::Func(f),
            MemberVal::Getter(f) => self.call_function(f, Vec::new()),
        }
    }

    pub fn prop_name(&mut self, prop: &'p MemberProp) -> Option<String> {
        match prop {
            MemberProp::Ident(n) => Some(n.clone()),
            MemberProp::Private(n) => Some(format!("#{n}")),
            MemberProp::Computed(e) => match self.resolve(e) {
                v @ (Value::Str(_) | Value::Num(_)) => v.scalar_string(),
                _ => None,
            },
        }
    }

    fn member(&mut self, object: &'p Expr, prop: &'p MemberProp) -> Value {
        let keys: Option<Vec<String>> = match prop {
            MemberProp::Ident(n) => Some(vec![n.clone()]),
            MemberProp::Private(n) => Some(vec![format!("#{n}")]),
            MemberProp::Computed(x) if self.rewritten_in_place(x) => None,
            MemberProp::Computed(x) => {
                let kv = self.resolve(x);
                let ks: Option<Vec<String>> =
                    kv.members().iter().map(|m| m.scalar_string()).collect();
                ks.filter(|k| !k.is_empty())
            }
        };
        let ov = self.resolve(object);
        let mut out = Vec::new();
        match keys {
            Some(keys) => {
                let owner = self.obj_key(object);
                for k in &keys {
                    out.push(self.member_of(&ov, Some(k)));
                    if let Some(owner) = &owner {
                        if !matches!(owner, ObjKey::Global(_)) {
                            out.extend(self.defs_of(owner, k));
                        }
                    }
                }
                if let Some(owner) = &owner {
                    let key = match owner {
                        ObjKey::Global(p) if !p.is_empty() => keys
                            .first()
                            .map(|k| ObjKey::Global(format!("{p}.{k}"))),
                        ObjKey::Global(_) => keys.first().map(|k| ObjKey::Global(k.clone())),
                        other => keys
                            .first()
                            .map(|k| ObjKey::Field(Box::new(other.clone()), k.clone())),
                    };
                    let cx = self.cx;
                    if let Some(pushed) = key.and_then(|k| cx.tables.pushes.get(&k)) {
                        let base = self.join(out);
                        return self.with_pushes(base, pushed);
                    }
                }
            }
            None => out.push(self.member_of(&ov, None)),
        }
        self.join(out)
    }

    /// A binding updated by `++`, `--` or a compound assignment, such as a
    /// loop counter. Indexing with it may reach every entry.
    fn rewritten_in_place(&self, x: &Expr) -> bool {
        let cx = self.cx;
        let Some(key) = cx.binding_of(x) else {
            return false;
        };
        cx.scopes.binding(&key).is_some_and(|b| {
            b.defs
                .iter()
                .any(|d| matches!(d.origin, Origin::Opaque | Origin::Compound(_)))
        })
    }

    /// Identity of the object an expression denotes, for member tables.
    pub fn obj_key(&mut self, e: &'p Expr) -> Option<ObjKey> {
        let cx = self.cx;
        match &e.kind {
            ExprKind::Ident(n) => {
                if let Some(key) = cx.binding_of(e) {
                    return Some(ObjKey::Binding(key));
                }
                if GLOBAL_ROOTS.contains(&n.as_str()) {
                    Some(ObjKey::Global(String::new()))
                } else {
                    Some(ObjKey::Global(n.clone()))
                }
            }
            ExprKind::This => match cx.scope_at(e.span.start).and_then(|s| cx.this_fn(s)) {
                Some(f) => cx.this_key(&cx.tables, f),
                None => Some(ObjKey::Global(String::new())),
            },
            ExprKind::Member { object, prop, .. } => {
                let name = self.prop_name(prop)?;
                if name == "prototype" {
                    match self.resolve(object) {
                        Value::Func(f) => return Some(ObjKey::Proto(Proto::Func(f))),
                        Value::Class(c) => return Some(ObjKey::Proto(Proto::Class(c))),
                        _ => {}
                    }
                }
                Some(match self.obj_key(object)? {
                    ObjKey::Global(p) if p.is_empty() => ObjKey::Global(name),
                    ObjKey::Global(p) => ObjKey::Global(format!("{p}.{name}")),
                    other => ObjKey::Field(Box::new(other), name),
                })
            }
            _ => None,
        }
    }

    fn this_of(&mut self, f: FnId) -> Value {
        let cx = self.cx;
        if let Some(c) = cx.index.fn_class.get(&f) {
            return Value::Instance(Proto::Class(*c));
        }
        if let Some(owner) = cx.tables.method_owner.get(&f) {
            return match owner {
                ObjKey::Proto(p) => Value::Instance(p.clone()),
                ObjKey::Binding(b) => self.resolve_binding(b),
                ObjKey::Global(p) => self.global_path(p),
                ObjKey::Func(g) => Value::Func(*g),
                ObjKey::Class(c) => Value::Class(*c),
                ObjKey::Field(..) => Value::Unknown,
            };
        }
        if let Some(lit) = cx.index.this_object.get(&f) {
            return self.resolve(*lit);
        }
        Value::Instance(Proto::Func(f))
    }

    fn object_value(&mut self, props: &'p [Prop]) -> Value {
        let mut fields: Vec<Field> = Vec::new();
        for p in props {
            match p {
                Prop::KeyValue { key, value } => {
                    let Some(k) = self.prop_key(key) else { continue };
                    let v = self.resolve(value);
                    push_field(&mut fields, k, v, false);
                }
                Prop::Shorthand { name, span } => {
                    let v = self.resolve_name(name, span.start);
                    push_field(&mut fields, name.clone(), v, false);
                }
                Prop::Method { key, func } | Prop::Accessor { key, func } => {
                    if let Some(k) = self.prop_key(key) {
                        push_field(&mut fields, k, Value::Func(*func), false);
                    }
                }
                Prop::Spread(x) => match self.resolve(x) {
                    Value::Map(fs) => {
                        for f in fs {
                            push_field(&mut fields, f.key, f.value, true);
                        }
                    }
                    Value::Sym(s) => {
                        let name = s.name.clone();
                        push_field(&mut fields, name, Value::Sym(s), true);
                    }
                    _ => {}
                },
            }
        }
        Value::Map(fields)
    }

    fn prop_key(&mut self, key: &'p PropKey) -> Option<String> {
        match key {
            PropKey::Computed(e) => self.resolve(e).scalar_string(),
            other => other.static_name(),
        }
    }

    fn logical(&mut self, op: LogicalOp, left: &'p Expr, right: &'p Expr) -> Value {
        let l = self.resolve(left);
        let decided = match op {
            LogicalOp::Or => l.truthiness(),
            LogicalOp::Nullish => match &l {
                Value::Null => Some(false),
                v if v.is_scalar() || matches!(v, Value::Map(_) | Value::List(_)) => Some(true),
                _ => None,
            },
            LogicalOp::And => {
                return match l.truthiness() {
                    Some(false) => l,
                    _ => self.resolve(right),
                }
            }
        };
        match decided {
            Some(true) => l,
            Some(false) => self.resolve(right),
            None => {
                let r = self.resolve(right);
                match l {
                    Value::Sym(mut s) if s.default.is_none() => {
                        s.default = Some(Box::new(r));
                        Value::Sym(s)
                    }
                    Value::Unknown | Value::Circular => Value::Sym(Sym {
                        name: placeholder_name(left),
                        binding: None,
                        default: Some(Box::new(r)),
                    }),
                    other => self.join(vec![other, r]),
                }
            }
        }
    }

    fn call(&mut self, callee: &'p Expr, args: &'p [Expr]) -> Value {
        if let ExprKind::Member { object, prop, .. } = &callee.kind {
            if let Some(name) = prop.static_name() {
                if let Some(v) = self.method_builtin(object, &name, args) {
                    return v;
                }
            }
        }
        let cv = self.resolve(callee);
        let mut out = Vec::new();
        for m in cv.into_members() {
            match m {
                Value::Func(f) => {
                    let frame = self.args_frame(args);
                    out.push(self.call_function(f, frame));
                }
                Value::Global(p) => out.push(self.global_call(&p, args)),
                _ => {}
            }
        }
        if out.is_empty() {
            Value::Unknown
        } else {
            self.join(out)
        }
    }

    fn method_builtin(&mut self, object: &'p Expr, name: &str, args: &'p [Expr]) -> Option<Value> {
        match name {
            "then" => {
                let recv = self.resolve(object);
                let Some(cb) = args.first() else { return Some(recv) };
                let mut out = Vec::new();
                for m in self.resolve(cb).into_members() {
                    if let Value::Func(f) = m {
                        out.push(self.call_function(f, vec![recv.clone()]));
                    }
                }
                Some(if out.is_empty() { Value::Unknown } else { self.join(out) })
            }
            "catch" | "finally" => Some(self.resolve(object)),
            "call" | "apply" => {
                let target = self.resolve(object);
                let funcs: Vec<FnId> = target
                    .members()
                    .iter()
                    .filter_map(|m| match m {
                        Value::Func(f) => Some(*f),
                        _ => None,
                    })
                    .collect();
                if funcs.is_empty() {
                    return None;
                }
                let frame = if name == "call" {
                    self.args_frame(args.get(1..).unwrap_or(&[]))
                } else {
                    match args.get(1).map(|a| self.resolve(a)) {
                        Some(Value::List(xs)) => xs,
                        _ => Vec::new(),
                    }
                };
                let mut out = Vec::new();
                for f in funcs {
                    out.push(self.call_function(f, frame.clone()));
                }
                Some(self.join(out))
            }
            "join" => {
                let recv = self.resolve(object);
                let sep = match args.first().map(|a| self.resolve(a)) {
                    Some(Value::Str(s)) => s,
                    None => ",".to_string(),
                    Some(_) => return Some(Value::Unknown),
                };
                let mut out = Vec::new();
                for m in recv.members() {
                    let Value::List(items) = m else { continue };
                    let mut acc = Value::Str(String::new());
                    for (i, it) in items.iter().enumerate() {
                        if i > 0 {
                            acc = Value::concat(&acc, &Value::Str(sep.clone()), self.max());
                        }
                        let piece = hole(it.clone(), object);
                        acc = Value::concat(&acc, &piece, self.max());
                    }
                    out.push(acc);
                }
                if out.is_empty() {
                    None
                } else {
                    Some(self.join(out))
                }
            }
            "concat" => {
                let recv = self.resolve(object);
                match recv {
                    Value::List(mut items) => {
                        for a in args {
                            match self.resolve(a) {
                                Value::List(xs) => items.extend(xs),
                                other => items.push(other),
                            }
                        }
                        Some(Value::List(items))
                    }
                    v @ (Value::Str(_) | Value::Partial(_) | Value::Sym(_)) => {
                        let mut acc = v;
                        for a in args {
                            let piece = self.resolve(a);
                            acc = Value::concat(&acc, &hole(piece, a), self.max());
                        }
                        Some(acc)
                    }
                    _ => None,
                }
            }
            "toLowerCase" | "toUpperCase" | "trim" | "toString" | "valueOf" => {
                let recv = self.resolve(object);
                let mapped: Vec<Value> = recv
                    .into_members()
                    .into_iter()
                    .map(|m| match (name, m) {
                        ("toLowerCase", Value::Str(s)) => Value::Str(s.to_lowercase()),
                        ("toUpperCase", Value::Str(s)) => Value::Str(s.to_uppercase()),
                        ("trim", Value::Str(s)) => Value::Str(s.trim().to_string()),
                        ("toString", v) if v.is_scalar() => {
                            Value::Str(v.scalar_string().unwrap_or_default())
                        }
                        (_, v) => v,
                    })
                    .collect();
                Some(self.join(mapped))
            }
            "replace" | "replaceAll" => {
                let recv = self.resolve(object);
                let (Some(pat), Some(rep)) = (args.first(), args.get(1)) else {
                    return None;
                };
                let Value::Str(needle) = self.resolve(pat) else {
                    return None;
                };
                let Value::Str(hay) = recv else { return None };
                let Some(at) = hay.find(&needle) else {
                    return Some(Value::Str(hay));
                };
                let replacement = self.resolve(rep);
                let replacement = hole(replacement, rep);
                let head = Value::Str(hay[..at].to_string());
                let tail = Value::Str(hay[at + needle.len()..].to_string());
                let v = Value::concat(&head, &replacement, self.max());
                Some(Value::concat(&v, &tail, self.max()))
            }
            _ => None,
        }
    }

    fn global_call(&mut self, path: &str, args: &'p [Expr]) -> Value {
        let first = |r: &mut Self| match args.first() {
            Some(a) => r.resolve(a),
            None => Value::Unknown,
        };
        match path {
            "JSON.stringify" | "String" | "Promise.resolve" | "Object.freeze" | "encodeURI"
            | "decodeURIComponent" | "decodeURI" => first(self),
            "encodeURIComponent" => match first(self) {
                Value::Str(s) => Value::Str(encode_uri_component(&s)),
                Value::Num(n) => Value::Str(ir::number_to_string(n)),
                other => other,
            },
            "Number" | "parseInt" | "parseFloat" => match first(self) {
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|n| Value::Num(if path == "parseInt" { n.trunc() } else { n }))
                    .unwrap_or(Value::Unknown),
                v @ (Value::Num(_) | Value::Sym(_)) => v,
                _ => Value::Unknown,
            },
            "Object.assign" => {
                let mut fields: Vec<Field> = Vec::new();
                for a in args {
                    for m in self.resolve(a).into_members() {
                        if let Value::Map(fs) = m {
                            for f in fs {
                                push_field(&mut fields, f.key, f.value, f.spread);
                            }
                        }
                    }
                }
                Value::Map(fields)
            }
            _ => Value::Unknown,
        }
    }

    fn construct(&mut self, callee: &'p Expr, args: &'p [Expr]) -> Value {
        let cv = self.resolve(callee);
        let mut out = Vec::new();
        for m in cv.into_members() {
            let v = match m {
                Value::Func(f) => Value::Instance(Proto::Func(f)),
                Value::Class(c) => Value::Instance(Proto::Class(c)),
                Value::Global(p) => match p.as_str() {
                    "URLSearchParams" | "Headers" | "URL" | "String" => match args.first() {
                        Some(a) => self.resolve(a),
                        None => Value::Map(Vec::new()),
                    },
                    _ => Value::Instance(Proto::Global(p)),
                },
                _ => continue,
            };
            out.push(v);
        }
        if out.is_empty() {
            Value::Unknown
        } else {
            self.join(out)
        }
    }

    fn args_frame(&mut self, args: &'p [Expr]) -> Vec<Value> {
        let mut out = Vec::with_capacity(args.len());
        for a in args {
            if let ExprKind::Spread(inner) = &a.kind {
                match self.resolve(inner) {
                    Value::List(xs) => out.extend(xs),
                    _ => break,
                }
            } else {
                out.push(self.resolve(a));
            }
        }
        out
    }

    /// Resolves the return values of `f` with `frame` bound to its params.
    pub fn call_function(&mut self, f: FnId, frame: Vec<Value>) -> Value {
        if self.calls.contains(&f) || self.calls.len() >= MAX_CALL_DEPTH {
            self.limited = true;
            return Value::Circular;
        }
        let cx = self.cx;
        let Some(returns) = cx.index.returns.get(&f) else {
            return Value::Unknown;
        };
        let saved = self.env.insert(f, frame);
        let guard = std::mem::take(&mut self.guard);
        self.calls.push(f);
        let mut vals = Vec::with_capacity(returns.len());
        for &r in returns {
            vals.push(self.resolve(r));
        }
        self.calls.pop();
        self.guard = guard;
        match saved {
            Some(old) => {
                self.env.insert(f, old);
            }
            None => {
                self.env.remove(&f);
            }
        }
        self.join(vals)
    }

    /// Argument values a call record passes, in parameter order.
    pub fn frame(&mut self, rec: &CallRecord<'p>) -> Vec<Value> {
        let mut out = Vec::with_capacity(rec.args.len());
        for slot in &rec.args {
            match *slot {
                ArgSlot::Expr(e) => out.push(self.resolve(e)),
                ArgSlot::Elements(e) => {
                    let v = self.resolve(e);
                    out.push(element_of(v, self.max()));
                }
                ArgSlot::Spread(e) => match self.resolve(e) {
                    Value::List(xs) => out.extend(xs),
                    _ => break,
                },
            }
        }
        out
    }

    /// Function values an expression may evaluate to, constructors
    /// included for classes.
    pub fn functions(&mut self, e: &'p Expr) -> Vec<FnId> {
        let cx = self.cx;
        let mut out = Vec::new();
        for m in self.resolve(e).into_members() {
            let f = match m {
                Value::Func(f) => Some(f),
                Value::Class(c) => cx.prog.class(c).and_then(|c| c.constructor),
                _ => None,
            };
            if let Some(f) = f {
                if !out.contains(&f) {
                    out.push(f);
                }
            }
        }
        out
    }
}

/// Replaces an operand with no string form with a placeholder named
/// after it.
pub fn hole(v: Value, e: &Expr) -> Value {
    if v.to_parts().is_none() && !matches!(v, Value::Many(_)) {
        Value::Sym(Sym::named(placeholder_name(e)))
    } else {
        v
    }
}

pub fn placeholder_name(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Ident(n) => n.clone(),
        ExprKind::Member { prop, .. } => prop.static_name().unwrap_or_else(|| "param".into()),
        ExprKind::Call { callee, .. } => placeholder_name(callee),
        ExprKind::Await(x) => placeholder_name(x),
        _ => "param".into(),
    }
}

fn element_of(v: Value, max: usize) -> Value {
    let mut out = Vec::new();
    for m in v.into_members() {
        match m {
            Value::List(items) => out.extend(items),
            s @ Value::Sym(_) => out.push(s),
            _ => {}
        }
    }
    Value::join(out, max)
}

fn push_field(fields: &mut Vec<Field>, key: String, value: Value, spread: bool) {
    if let Some(existing) = fields.iter_mut().find(|f| f.key == key) {
        existing.value = value;
        existing.spread = spread;
    } else {
        fields.push(Field { key, value, spread });
    }
}

/// A declared binding never denotes the host global of the same name.
fn strip_self_alias(v: Value, name: &str, max: usize) -> Value {
    let aliases = |m: &Value| match m {
        Value::Global(p) => p == name || p.starts_with(&format!("{name}.")),
        _ => false,
    };
    if !v.members().iter().any(|m| aliases(m)) {
        return v;
    }
    let kept: Vec<Value> = v.into_members().into_iter().filter(|m| !aliases(m)).collect();
    Value::join(kept, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;

    fn value_of(src: &str, name: &str) -> Value {
        let prog = parsers::parse_javascript(src, false).expect("parse");
        let opts = AnalysisOptions::default();
        let cx = Context::new(&prog, src, &opts);
        let mut r = cx.resolver();
        let key = cx.scopes.lookup(0, name).expect("binding");
        r.resolve_binding(&key)
    }

    #[test]
    fn concatenation_and_templates() {
        let v = value_of("const base = '/api'; const u = `${base}/users/` + 'list';", "u");
        assert_eq!(v, Value::Str("/api/users/list".into()));
    }

    #[test]
    fn computed_access_reads_all_values() {
        let v = value_of(
            "const E = { a: '/one', b: '/two' }; function f(k) { return E[k]; } const u = f(x);",
            "u",
        );
        assert_eq!(
            v,
            Value::Many(vec![Value::Str("/one".into()), Value::Str("/two".into())])
        );
    }

    #[test]
    fn calls_trace_returns_through_branches() {
        let v = value_of(
            "function pick(m) { if (m) { return 'POST'; } else { return 'PUT'; } } const v = pick(1);",
            "v",
        );
        assert_eq!(
            v,
            Value::Many(vec![Value::Str("POST".into()), Value::Str("PUT".into())])
        );
    }

    #[test]
    fn this_fields_resolve_through_prototype_methods() {
        let v = value_of(
            "function Api() { this.base = '/v2'; } Api.prototype.url = function () { return this.base + '/items'; }; const u = new Api().url();",
            "u",
        );
        assert_eq!(v, Value::Str("/v2/items".into()));
    }

    #[test]
    fn or_fallback_becomes_symbol_default() {
        let v = value_of("function f(o) { return o.method || 'GET'; } const m = f();", "m");
        match v {
            Value::Sym(s) => assert_eq!(s.default.as_deref(), Some(&Value::Str("GET".into()))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn self_referencing_binding_is_circular_not_looping() {
        let v = value_of("var a = b; var b = a;", "a");
        assert!(v.is_unresolved());
    }

    #[test]
    fn pushed_values_join_the_list() {
        let v = value_of("const urls = ['/a']; urls.push('/b'); const all = urls.join(',');", "all");
        assert_eq!(v, Value::Str("/a,/b".into()));
    }
}
