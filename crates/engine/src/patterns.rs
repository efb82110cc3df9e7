//! Taint-independent dangerous-pattern detectors: postMessage origin
//! handling, prototype pollution, dynamic regular expressions and
//! pass-through Trusted Types policies.

use std::collections::BTreeSet;

use ir::{Expr, ExprKind, FnBody, FnId, MemberProp, Pat, Prop, Span, StmtKind};
use tracing::debug;

use crate::context::Context;
use crate::report::{DangerousPattern, Severity};
use crate::scope::PathSeg;
use crate::taint::{global_name, SinkSite, Taint, Tracker};
use crate::value::Value;

const STRICT_OPS: &[&str] = &["===", "!==", "==", "!="];
const SUBSTRING_METHODS: &[&str] = &["indexOf", "includes", "startsWith", "endsWith"];
const ALLOWLIST_METHODS: &[&str] = &["includes", "indexOf", "has"];
const POLICY_HOOKS: &[&str] = &["createHTML", "createScript", "createScriptURL"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum OriginCheck {
    None,
    Weak,
    Strict,
}

pub fn detect(
    cx: &Context<'_>,
    handlers: &BTreeSet<FnId>,
    sites: &[SinkSite<'_>],
) -> Vec<DangerousPattern> {
    let mut out = Vec::new();
    for &f in handlers {
        if let Some(p) = message_handler(cx, f, sites) {
            out.push(p);
        }
    }
    let untrusted = unguarded_handlers(cx, handlers);
    let mut tracker = Tracker::new(cx, &untrusted, None);
    for &(e, _) in &cx.index.exprs {
        match &e.kind {
            ExprKind::Call { callee, args, .. } => {
                wildcard_target(e, callee, args, &mut out);
                pollution_call(cx, &mut tracker, e, callee, args, &mut out);
                regex_call(cx, &mut tracker, e, callee, args, &mut out);
                trusted_types(cx, e, callee, args, &mut out);
            }
            ExprKind::New { callee, args } => regex_call(cx, &mut tracker, e, callee, args, &mut out),
            ExprKind::Assign { target, value, .. } => {
                pollution_assign(&mut tracker, e, target, value, &mut out)
            }
            _ => {}
        }
    }
    debug!(patterns = out.len(), "pattern pass done");
    out
}

/// Handlers without a strict origin check. Message data is only a taint
/// source inside these.
pub fn unguarded_handlers(cx: &Context<'_>, handlers: &BTreeSet<FnId>) -> BTreeSet<FnId> {
    handlers
        .iter()
        .copied()
        .filter(|&f| {
            cx.prog
                .function(f)
                .map_or(true, |func| origin_check(cx, func.span) != OriginCheck::Strict)
        })
        .collect()
}

fn pattern(kind: &str, severity: Severity, description: String, span: Span) -> DangerousPattern {
    DangerousPattern {
        kind: kind.to_string(),
        severity,
        description,
        location: Some(span.into()),
    }
}

fn message_handler(cx: &Context<'_>, f: FnId, sites: &[SinkSite<'_>]) -> Option<DangerousPattern> {
    let func = cx.prog.function(f)?;
    let span = func.span;
    let check = origin_check(cx, span);
    if check == OriginCheck::Strict {
        return None;
    }
    let reaches_sink = sites
        .iter()
        .any(|s| matches!(s.kind, "xss" | "eval" | "redirect") && span.contains(s.span));
    let severity = if reaches_sink {
        Severity::High
    } else {
        Severity::Medium
    };
    let (kind, what) = match check {
        OriginCheck::Weak => (
            "postmessage-weak-origin",
            "checks event.origin with a substring match",
        ),
        _ => ("postmessage-no-origin", "does not check event.origin"),
    };
    let tail = if reaches_sink {
        " and writes message data to a dangerous sink"
    } else {
        ""
    };
    Some(pattern(
        kind,
        severity,
        format!("message event handler {what}{tail}"),
        span,
    ))
}

/// Strongest origin check inside the handler body.
fn origin_check(cx: &Context<'_>, body: Span) -> OriginCheck {
    let mut best = OriginCheck::None;
    for &(e, _) in &cx.index.exprs {
        if !body.contains(e.span) {
            continue;
        }
        let found = match &e.kind {
            ExprKind::Binary { op, left, right } if STRICT_OPS.contains(&op.as_str()) => {
                if is_origin(cx, left) || is_origin(cx, right) {
                    OriginCheck::Strict
                } else {
                    OriginCheck::None
                }
            }
            ExprKind::Call { callee, args, .. } => {
                let ExprKind::Member { object, prop, .. } = &callee.kind else {
                    continue;
                };
                let name = prop.static_name().unwrap_or_default();
                if is_origin(cx, object) && SUBSTRING_METHODS.contains(&name.as_str()) {
                    OriginCheck::Weak
                } else if ALLOWLIST_METHODS.contains(&name.as_str())
                    && args.first().is_some_and(|a| is_origin(cx, a))
                {
                    OriginCheck::Strict
                } else {
                    OriginCheck::None
                }
            }
            _ => OriginCheck::None,
        };
        best = best.max(found);
    }
    for &(s, _) in &cx.index.stmts {
        if let StmtKind::Switch { disc, .. } = &s.kind {
            if body.contains(s.span) && is_origin(cx, disc) {
                best = best.max(OriginCheck::Strict);
            }
        }
    }
    best
}

/// `event.origin` or a binding destructured from an event's `origin`.
fn is_origin<'p>(cx: &Context<'p>, e: &'p Expr) -> bool {
    match &e.kind {
        ExprKind::Member { object, prop, .. } => {
            prop.static_name().as_deref() == Some("origin")
                && !matches!(cx.resolver().resolve(object), Value::Global(_))
        }
        ExprKind::Ident(name) if name == "origin" => {
            let Some(key) = cx.binding_of(e) else {
                return false;
            };
            cx.scopes.binding(&key).is_some_and(|b| {
                b.defs
                    .iter()
                    .any(|d| matches!(d.path.last(), Some(PathSeg::Key(k)) if k == "origin"))
            })
        }
        _ => false,
    }
}

fn wildcard_target(e: &Expr, callee: &Expr, args: &[Expr], out: &mut Vec<DangerousPattern>) {
    if callee.member_name().as_deref() != Some("postMessage") {
        return;
    }
    if args.get(1).and_then(Expr::as_str_lit) != Some("*") {
        return;
    }
    let target = match &callee.kind {
        ExprKind::Member { object, .. } => object.member_path().unwrap_or_else(|| "window".into()),
        _ => "window".into(),
    };
    out.push(pattern(
        "postmessage-wildcard-target",
        Severity::Medium,
        format!("{target}.postMessage sends data to any origin ('*')"),
        e.span,
    ));
}

fn source_of(t: &Taint) -> Option<&str> {
    match t {
        Taint::Tainted { source, .. } => Some(source),
        Taint::Clean => None,
    }
}

fn pollution_assign<'p>(
    tracker: &mut Tracker<'_, 'p>,
    e: &'p Expr,
    target: &'p Pat,
    value: &'p Expr,
    out: &mut Vec<DangerousPattern>,
) {
    let Pat::Expr(t) = target else { return };
    let ExprKind::Member { prop, .. } = &t.kind else {
        return;
    };
    match prop {
        MemberProp::Computed(key) if !key.is_literal() => {
            let taint = tracker.evaluate(key);
            if let Some(src) = source_of(&taint) {
                out.push(pattern(
                    "prototype-pollution",
                    Severity::High,
                    format!("property name from {src} used as an assignment key"),
                    e.span,
                ));
            }
        }
        _ if prop.static_name().as_deref() == Some("__proto__") => {
            let taint = tracker.evaluate(value);
            if let Some(src) = source_of(&taint) {
                out.push(pattern(
                    "prototype-pollution",
                    Severity::High,
                    format!("__proto__ assigned from {src}"),
                    e.span,
                ));
            }
        }
        _ => {}
    }
}

fn pollution_call<'p>(
    cx: &Context<'p>,
    tracker: &mut Tracker<'_, 'p>,
    e: &'p Expr,
    callee: &'p Expr,
    args: &'p [Expr],
    out: &mut Vec<DangerousPattern>,
) {
    let v = cx.resolver().resolve(callee);
    let Some(api) = global_name(
        &v,
        &["Object.defineProperty", "Reflect.set", "Reflect.defineProperty", "Object.assign"],
    ) else {
        return;
    };
    if api == "Object.assign" {
        for src in args.iter().skip(1) {
            let taint = tracker.evaluate(src);
            if let Some(name) = source_of(&taint) {
                out.push(pattern(
                    "prototype-pollution-merge",
                    Severity::Medium,
                    format!("Object.assign merges an object derived from {name}"),
                    e.span,
                ));
                return;
            }
        }
        return;
    }
    let Some(key) = args.get(1) else { return };
    if key.is_literal() || cx.resolver().resolve(key).is_scalar() {
        return;
    }
    let taint = tracker.evaluate(key);
    let (severity, description) = match source_of(&taint) {
        Some(src) => (Severity::High, format!("{api} with a key derived from {src}")),
        None => (Severity::Low, format!("{api} with a non-literal key")),
    };
    out.push(pattern("prototype-pollution", severity, description, e.span));
}

fn regex_call<'p>(
    cx: &Context<'p>,
    tracker: &mut Tracker<'_, 'p>,
    e: &'p Expr,
    callee: &'p Expr,
    args: &'p [Expr],
    out: &mut Vec<DangerousPattern>,
) {
    let Some(arg) = args.first() else { return };
    if matches!(arg.kind, ExprKind::Regex { .. }) || arg.is_literal() {
        return;
    }
    let v = cx.resolver().resolve(callee);
    let (kind, severity, what) = if global_name(&v, &["RegExp"]).is_some() {
        ("regex-dynamic", Severity::Medium, "RegExp built")
    } else if matches!(e.kind, ExprKind::Call { .. })
        && matches!(
            callee.member_name().as_deref(),
            Some("match" | "matchAll" | "search")
        )
    {
        ("regex-implicit", Severity::Low, "string coerced to a RegExp")
    } else {
        return;
    };
    let taint = tracker.evaluate(arg);
    if let Some(src) = source_of(&taint) {
        out.push(pattern(kind, severity, format!("{what} from {src}"), e.span));
    }
}

fn trusted_types(
    cx: &Context<'_>,
    e: &Expr,
    callee: &Expr,
    args: &[Expr],
    out: &mut Vec<DangerousPattern>,
) {
    if callee.member_name().as_deref() != Some("createPolicy") {
        return;
    }
    let on_trusted_types = match &callee.kind {
        ExprKind::Member { object, .. } => object
            .member_path()
            .is_some_and(|p| p == "trustedTypes" || p.ends_with(".trustedTypes")),
        _ => false,
    };
    if !on_trusted_types {
        return;
    }
    let Some(ExprKind::Object(props)) = args.get(1).map(|a| &a.kind) else {
        return;
    };
    for p in props {
        let (key, func) = match p {
            Prop::Method { key, func } => (key, Some(*func)),
            Prop::KeyValue { key, value } => match value.kind {
                ExprKind::Function(f) => (key, Some(f)),
                _ => (key, None),
            },
            _ => continue,
        };
        let Some(hook) = key.static_name() else { continue };
        if !POLICY_HOOKS.contains(&hook.as_str()) {
            continue;
        }
        if func.is_some_and(|f| is_identity(cx, f)) {
            out.push(pattern(
                "trusted-types-passthrough",
                Severity::Medium,
                format!("Trusted Types policy {hook} returns its input unchanged"),
                e.span,
            ));
        }
    }
}

/// `s => s` or `function (s) { return s; }`.
fn is_identity(cx: &Context<'_>, f: FnId) -> bool {
    let Some(func) = cx.prog.function(f) else {
        return false;
    };
    let Some(param) = func.params.first().and_then(Pat::as_ident) else {
        return false;
    };
    let returned = match &func.body {
        FnBody::Expr(e) => Some(e.as_ref()),
        FnBody::Block(stmts) => match stmts.as_slice() {
            [only] => match &only.kind {
                StmtKind::Return(Some(e)) => Some(e),
                _ => None,
            },
            _ => None,
        },
    };
    returned.and_then(Expr::as_ident) == Some(param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;
    use crate::taint::{message_handlers, sink_sites};

    fn patterns(src: &str) -> Vec<DangerousPattern> {
        let prog = parsers::parse_javascript(src, false).expect("parse");
        let opts = AnalysisOptions::default();
        let cx = Context::new(&prog, src, &opts);
        let handlers = message_handlers(&cx);
        let sites = sink_sites(&cx);
        detect(&cx, &handlers, &sites)
    }

    fn kinds(src: &str) -> Vec<(String, Severity)> {
        patterns(src)
            .into_iter()
            .map(|p| (p.kind, p.severity))
            .collect()
    }

    #[test]
    fn handler_without_origin_check() {
        assert_eq!(
            kinds("window.addEventListener('message', function (e) { document.body.innerHTML = e.data; });"),
            vec![("postmessage-no-origin".to_string(), Severity::High)]
        );
        assert_eq!(
            kinds("window.addEventListener('message', function (e) { console.log(e.data); });"),
            vec![("postmessage-no-origin".to_string(), Severity::Medium)]
        );
    }

    #[test]
    fn strict_origin_check_clears_handler() {
        assert!(kinds(
            "window.addEventListener('message', function (e) { if (e.origin !== 'https://trusted.com') return; document.body.innerHTML = e.data; });"
        )
        .is_empty());
        assert!(kinds(
            "var ALLOWED = ['https://a.com']; onmessage = ({ origin, data }) => { if (!ALLOWED.includes(origin)) return; eval(data); };"
        )
        .is_empty());
    }

    #[test]
    fn substring_origin_check_is_weak() {
        assert_eq!(
            kinds("window.addEventListener('message', e => { if (e.origin.indexOf('trusted.com') > -1) { eval(e.data); } });"),
            vec![("postmessage-weak-origin".to_string(), Severity::High)]
        );
    }

    #[test]
    fn wildcard_post_message() {
        let out = patterns("window.opener.postMessage({ token: t }, '*'); parent.postMessage(x, 'https://a.com');");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, "postmessage-wildcard-target");
        assert_eq!(out[0].severity, Severity::Medium);
        assert!(out[0].description.contains("window.opener"));
    }

    #[test]
    fn prototype_pollution_shapes() {
        let out = kinds(
            "var k = location.hash.slice(1); var o = {}; o[k] = 1; Object.defineProperty(o, name2, {}); Object.assign(o, JSON.parse(location.search));",
        );
        assert!(out.contains(&("prototype-pollution".to_string(), Severity::High)));
        assert!(out.contains(&("prototype-pollution".to_string(), Severity::Low)));
        assert!(out.contains(&("prototype-pollution-merge".to_string(), Severity::Medium)));
    }

    #[test]
    fn literal_keys_are_not_pollution() {
        assert!(kinds("var o = {}; o['a'] = location.hash; Object.defineProperty(o, 'x', {});").is_empty());
    }

    #[test]
    fn dynamic_regexes() {
        let out = kinds(
            "var q = location.search; new RegExp(q); 'abc'.match(q); 'abc'.split(q); new RegExp('^a$');",
        );
        assert_eq!(
            out,
            vec![
                ("regex-dynamic".to_string(), Severity::Medium),
                ("regex-implicit".to_string(), Severity::Low),
            ]
        );
    }

    #[test]
    fn passthrough_policies() {
        let out = kinds(
            "trustedTypes.createPolicy('p', { createHTML: s => s, createScriptURL(u) { return u; }, createScript: s => s.trim() });",
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|(k, _)| k == "trusted-types-passthrough"));
    }
}
