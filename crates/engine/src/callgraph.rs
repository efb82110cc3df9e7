//! Caller records per function and the parameter environments built
//! from them.
//!
//! A callee is recorded when its function value resolves without caller
//! context. Calls through parameters (callbacks handed to a wrapper,
//! handlers pulled out of a registry) only resolve once the enclosing
//! function's own callers are known, so they are kept pending and
//! retried in [`CallGraph::indirect`] under the caller environments.

use std::collections::{BTreeMap, BTreeSet};

use ir::{Expr, ExprKind, FnId, Span};
use tracing::trace;

use crate::context::Context;
use crate::resolve::Resolver;
use crate::scope::Origin;
use crate::value::Value;

/// Argument frames of the functions a value depends on, keyed by function.
pub type Env = BTreeMap<FnId, Vec<Value>>;

const ROUNDS: usize = 4;

const ARRAY_CALLBACKS: &[&str] = &[
    "forEach", "map", "filter", "find", "findIndex", "some", "every", "flatMap",
];

#[derive(Debug, Clone, Copy)]
pub enum ArgSlot<'p> {
    Expr(&'p Expr),
    /// An element of the iterable the expression evaluates to.
    Elements(&'p Expr),
    Spread(&'p Expr),
}

#[derive(Debug, Clone)]
pub struct CallRecord<'p> {
    /// Function containing the call, `None` at top level.
    pub caller: Option<FnId>,
    pub args: Vec<ArgSlot<'p>>,
    /// Object a method is called on, `c` in `c.get(..)`.
    pub receiver: Option<&'p Expr>,
    pub span: Span,
}

/// A parameter environment plus where each of its frames came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Scoped {
    env: Env,
    /// Start offset of the call that bound each function's frame.
    bound: BTreeMap<FnId, usize>,
    /// Constructor `new` sites a method receiver may have been built by.
    receivers: BTreeMap<FnId, BTreeSet<usize>>,
}

impl Scoped {
    /// False when a constructor frame comes from an instantiation the
    /// receiver of a method frame was not built by.
    fn agrees(&self, other: &Scoped) -> bool {
        fn fits(a: &Scoped, b: &Scoped) -> bool {
            a.receivers
                .iter()
                .all(|(ctor, sites)| b.bound.get(ctor).map_or(true, |s| sites.contains(s)))
        }
        fits(self, other) && fits(other, self)
    }

    fn merged(&self, other: &Scoped) -> Scoped {
        let mut out = self.clone();
        for (k, v) in &other.env {
            out.env.entry(*k).or_insert_with(|| v.clone());
        }
        for (k, v) in &other.bound {
            out.bound.entry(*k).or_insert(*v);
        }
        for (k, v) in &other.receivers {
            out.receivers.entry(*k).or_insert_with(|| v.clone());
        }
        out
    }
}

/// Every pairing of `acc` with `frames`, up to `max_envs`. With `paired`,
/// pairings whose instantiation sites disagree are skipped.
fn cross(acc: &[Scoped], frames: &[Scoped], max_envs: usize, paired: bool) -> Vec<Scoped> {
    let mut out = Vec::new();
    for a in acc {
        for fr in frames {
            if out.len() >= max_envs {
                return out;
            }
            if paired && !a.agrees(fr) {
                continue;
            }
            out.push(a.merged(fr));
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct CallGraph<'p> {
    pub callers: BTreeMap<FnId, Vec<CallRecord<'p>>>,
    pending: Vec<(&'p Expr, CallRecord<'p>)>,
}

impl<'p> CallGraph<'p> {
    fn record(&mut self, callee: FnId, rec: CallRecord<'p>) {
        let list = self.callers.entry(callee).or_default();
        if !list.iter().any(|r| r.span == rec.span && r.caller == rec.caller) {
            list.push(rec);
        }
    }

    /// Calls whose callee resolves without caller context.
    pub fn build(cx: &Context<'p>) -> CallGraph<'p> {
        let mut g = CallGraph::default();
        for &(e, scope) in &cx.index.exprs {
            let caller = cx.scopes.func_of(scope);
            for (callee, args) in call_shapes(e) {
                let receiver = match &callee.kind {
                    ExprKind::Member { object, .. } => Some(object.as_ref()),
                    _ => None,
                };
                let rec = CallRecord {
                    caller,
                    args,
                    receiver,
                    span: e.span,
                };
                let mut r = cx.resolver();
                let funcs = r.functions(callee);
                if !r.needed.is_empty() {
                    g.pending.push((callee, rec.clone()));
                }
                for f in funcs {
                    g.record(f, rec.clone());
                }
            }
        }
        trace!(
            direct = g.callers.len(),
            pending = g.pending.len(),
            "call graph built"
        );
        g
    }

    /// Callees that only resolve under caller environments.
    pub fn indirect(cx: &Context<'p>) -> CallGraph<'p> {
        let mut g = CallGraph::default();
        for (callee, rec) in &cx.calls.pending {
            let callee: &'p Expr = *callee;
            for (_, funcs) in cx.evaluate(|r| r.functions(callee)) {
                for f in funcs {
                    g.record(f, rec.clone());
                }
            }
        }
        g
    }

    pub fn absorb(&mut self, other: CallGraph<'p>) {
        for (f, recs) in other.callers {
            for rec in recs {
                self.record(f, rec);
            }
        }
    }
}

/// Callee expressions and argument slots a call-like expression passes.
fn call_shapes(e: &Expr) -> Vec<(&Expr, Vec<ArgSlot<'_>>)> {
    let mut out = Vec::new();
    match &e.kind {
        ExprKind::Call { callee, args, .. } => {
            out.push((callee.as_ref(), plain_slots(args)));
            if let ExprKind::Member { object, prop, .. } = &callee.kind {
                let name = prop.static_name();
                match name.as_deref() {
                    Some("call") => {
                        out.push((object.as_ref(), plain_slots(args.get(1..).unwrap_or(&[]))))
                    }
                    Some("apply") => {
                        let slots = match args.get(1) {
                            Some(Expr {
                                kind: ExprKind::Array(items),
                                ..
                            }) => plain_slots(items),
                            Some(a) => vec![ArgSlot::Spread(a)],
                            None => Vec::new(),
                        };
                        out.push((object.as_ref(), slots));
                    }
                    Some(m) if ARRAY_CALLBACKS.contains(&m) => {
                        if let Some(cb) = args.first() {
                            out.push((cb, vec![ArgSlot::Elements(object)]));
                        }
                    }
                    Some("reduce" | "reduceRight") => {
                        if let Some(cb) = args.first() {
                            let acc = match args.get(1) {
                                Some(init) => ArgSlot::Expr(init),
                                None => ArgSlot::Elements(object),
                            };
                            out.push((cb, vec![acc, ArgSlot::Elements(object)]));
                        }
                    }
                    Some("then") => {
                        if let Some(cb) = args.first() {
                            out.push((cb, vec![ArgSlot::Expr(object)]));
                        }
                    }
                    _ => {}
                }
            }
        }
        ExprKind::New { callee, args } => out.push((callee.as_ref(), plain_slots(args))),
        _ => {}
    }
    out
}

fn plain_slots(args: &[Expr]) -> Vec<ArgSlot<'_>> {
    args.iter()
        .map(|a| match &a.kind {
            ExprKind::Spread(inner) => ArgSlot::Spread(inner),
            _ => ArgSlot::Expr(a),
        })
        .collect()
}

impl<'p> Context<'p> {
    /// Runs `f` once per parameter environment it needs. The first run
    /// uses no frames; functions whose parameters it read are then bound
    /// to the argument frames of their callers, transitively up to
    /// `max_caller_depth`, and `f` runs again per combined environment.
    pub fn evaluate<T>(&self, mut f: impl FnMut(&mut Resolver<'_, 'p>) -> T) -> Vec<(Env, T)> {
        self.evaluate_at(0, &[], &mut f)
            .into_iter()
            .map(|(scoped, v)| (scoped.env, v))
            .collect()
    }

    fn evaluate_at<T>(
        &self,
        depth: usize,
        chain: &[FnId],
        f: &mut dyn FnMut(&mut Resolver<'_, 'p>) -> T,
    ) -> Vec<(Scoped, T)> {
        let max_envs = self.opts.max_envs.max(1);
        let mut envs = vec![Scoped::default()];
        let mut expanded: BTreeSet<FnId> = chain.iter().copied().collect();
        let mut round = 0;
        loop {
            let mut results = Vec::with_capacity(envs.len());
            let mut newly = BTreeSet::new();
            for scoped in &envs {
                let mut r = Resolver::new(self, scoped.env.clone());
                let v = f(&mut r);
                newly.extend(
                    r.needed
                        .iter()
                        .copied()
                        .filter(|n| !expanded.contains(n) && !scoped.env.contains_key(n)),
                );
                results.push((scoped.clone(), v));
            }
            round += 1;
            if newly.is_empty() || depth >= self.opts.max_caller_depth || round >= ROUNDS {
                return results;
            }

            let mut next: Vec<Scoped> = Vec::new();
            for scoped in &envs {
                let mut acc = vec![scoped.clone()];
                for n in &newly {
                    let mut sub_chain = chain.to_vec();
                    sub_chain.push(*n);
                    let frames = self.environments(*n, depth, &sub_chain);
                    if frames.is_empty() {
                        continue;
                    }
                    let mut crossed = cross(&acc, &frames, max_envs, true);
                    if crossed.is_empty() {
                        crossed = cross(&acc, &frames, max_envs, false);
                    }
                    acc = crossed;
                }
                for a in acc {
                    if next.len() < max_envs && !next.contains(&a) {
                        next.push(a);
                    }
                }
            }
            expanded.extend(newly);
            if next == envs {
                return results;
            }
            envs = next;
        }
    }

    /// Environments binding `f`'s parameters to each caller's arguments.
    fn environments(&self, f: FnId, depth: usize, chain: &[FnId]) -> Vec<Scoped> {
        if let Some(hit) = self.env_memo.borrow().get(&(f, depth)) {
            return hit.clone();
        }
        let max_envs = self.opts.max_envs.max(1);
        let mut out: Vec<Scoped> = Vec::new();
        if let Some(records) = self.calls.callers.get(&f) {
            for rec in records {
                let receivers = self.receiver_sites(rec);
                let frames =
                    self.evaluate_at(depth + 1, chain, &mut |r: &mut Resolver<'_, 'p>| {
                        r.frame(rec)
                    });
                for (mut scoped, frame) in frames {
                    scoped.env.insert(f, frame);
                    scoped.bound.insert(f, rec.span.start);
                    for (ctor, sites) in &receivers {
                        scoped
                            .receivers
                            .entry(*ctor)
                            .or_insert_with(|| sites.clone());
                    }
                    if out.len() < max_envs && !out.contains(&scoped) {
                        out.push(scoped);
                    }
                }
            }
        }
        self.env_memo.borrow_mut().insert((f, depth), out.clone());
        out
    }

    /// Constructors and `new` sites the receiver of a method call was
    /// built by. Empty unless every definition of the receiver is a
    /// `new` expression.
    fn receiver_sites(&self, rec: &CallRecord<'p>) -> BTreeMap<FnId, BTreeSet<usize>> {
        let mut out: BTreeMap<FnId, BTreeSet<usize>> = BTreeMap::new();
        let Some(key) = rec.receiver.and_then(|r| self.binding_of(r)) else {
            return out;
        };
        let Some(binding) = self.scopes.binding(&key) else {
            return out;
        };
        for def in &binding.defs {
            let Origin::Value(init) = def.origin else {
                return BTreeMap::new();
            };
            let ExprKind::New { callee, .. } = &init.kind else {
                return BTreeMap::new();
            };
            if !def.path.is_empty() {
                return BTreeMap::new();
            }
            for ctor in self.resolver().functions(callee) {
                out.entry(ctor).or_default().insert(init.span.start);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;

    fn with_cx(src: &str, check: impl FnOnce(&Context<'_>)) {
        let prog = parsers::parse_javascript(src, false).expect("parse");
        let opts = AnalysisOptions::default();
        let cx = Context::new(&prog, src, &opts);
        check(&cx);
    }

    fn fn_named(cx: &Context<'_>, name: &str) -> FnId {
        cx.prog
            .functions
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
            .map(|f| f.id)
            .expect("function")
    }

    #[test]
    fn direct_calls_are_recorded() {
        with_cx("function a(x) {} a(1); a(2);", |cx| {
            let f = fn_named(cx, "a");
            assert_eq!(cx.calls.callers[&f].len(), 2);
        });
    }

    #[test]
    fn callbacks_through_parameters_resolve_indirectly() {
        with_cx(
            "function run(cb) { cb('/x'); } function h(u) {} run(h);",
            |cx| {
                let h = fn_named(cx, "h");
                let recs = cx.calls.callers.get(&h).expect("h has callers");
                assert_eq!(recs[0].caller, Some(fn_named(cx, "run")));
            },
        );
    }

    #[test]
    fn environments_follow_callers() {
        with_cx(
            "function get(p) { return '/api/' + p; } get('a'); get('b');",
            |cx| {
                let f = fn_named(cx, "get");
                let ret = cx.index.returns[&f][0];
                let values: Vec<Value> = cx
                    .evaluate(|r| r.resolve(ret))
                    .into_iter()
                    .map(|(_, v)| v)
                    .collect();
                assert_eq!(
                    values,
                    vec![Value::Str("/api/a".into()), Value::Str("/api/b".into())]
                );
            },
        );
    }
}
