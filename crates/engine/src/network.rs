//! Network call-site synthesis.
//!
//! Each recognized request shape is evaluated once per parameter
//! environment (see [`Context::evaluate`]), so wrapper functions yield one
//! call site per caller with URL and method kept paired.

use std::collections::{BTreeMap, HashMap};

use ir::{Expr, ExprKind, MemberProp, Pat};
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::constraints::Constraints;
use crate::context::{Context, ObjKey};
use crate::report::{CallSite, ParamDescriptor, ParamLocation};
use crate::resolve::Resolver;
use crate::value::{Part, Proto, Sym, Value};

/// Characters that carry no endpoint identity on their own.
const URL_SEPARATORS: &[char] = &['/', '?', '&', '=', '#', '.'];

enum Shape<'p> {
    Fetch {
        url: &'p Expr,
        init: Option<&'p Expr>,
    },
    Xhr {
        method: &'p Expr,
        url: &'p Expr,
        headers: Vec<(&'p Expr, &'p Expr)>,
        sends: Vec<&'p Expr>,
    },
    Beacon {
        url: &'p Expr,
        data: Option<&'p Expr>,
    },
    /// EventSource, WebSocket and image beacons: a URL and nothing else.
    Plain {
        kind: &'static str,
        url: &'p Expr,
    },
    Ajax {
        url: Option<&'p Expr>,
        settings: Option<&'p Expr>,
        method: Option<&'static str>,
        data: Option<&'p Expr>,
    },
    Load {
        url: &'p Expr,
        data: Option<&'p Expr>,
    },
}

impl Shape<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Shape::Fetch { .. } => "fetch",
            Shape::Xhr { .. } => "xhr",
            Shape::Beacon { .. } => "beacon",
            Shape::Plain { kind, .. } => *kind,
            Shape::Ajax { .. } | Shape::Load { .. } => "jquery",
        }
    }
}

/// Request pieces resolved under one environment.
struct Raw {
    url: Value,
    /// `None` when the call leaves the method implicit.
    method: Option<Value>,
    default_method: &'static str,
    headers: Vec<(String, Value)>,
    body: Option<Value>,
    /// jQuery sends `data` as a query string for GET.
    data_query_on_get: bool,
}

impl<'p> Shape<'p> {
    fn resolve(&self, r: &mut Resolver<'_, 'p>) -> Raw {
        match self {
            Shape::Fetch { url, init } => {
                let init = init.map(|i| r.resolve(i));
                Raw {
                    url: r.resolve(*url),
                    method: init.as_ref().and_then(|i| field(i, "method")),
                    default_method: "GET",
                    headers: init
                        .as_ref()
                        .and_then(|i| field(i, "headers"))
                        .map(|h| header_fields(&h))
                        .unwrap_or_default(),
                    body: init.as_ref().and_then(|i| field(i, "body")),
                    data_query_on_get: false,
                }
            }
            Shape::Xhr {
                method,
                url,
                headers,
                sends,
            } => {
                let mut hs = Vec::new();
                for &(k, v) in headers.iter() {
                    if let Some(name) = r.resolve(k).scalar_string() {
                        hs.push((name, r.resolve(v)));
                    }
                }
                let bodies: Vec<Value> = sends.iter().map(|&b| r.resolve(b)).collect();
                Raw {
                    url: r.resolve(*url),
                    method: Some(r.resolve(*method)),
                    default_method: "GET",
                    headers: hs,
                    body: if bodies.is_empty() {
                        None
                    } else {
                        Some(Value::join(bodies, usize::MAX))
                    },
                    data_query_on_get: false,
                }
            }
            Shape::Beacon { url, data } => Raw {
                url: r.resolve(*url),
                method: None,
                default_method: "POST",
                headers: Vec::new(),
                body: data.map(|d| r.resolve(d)),
                data_query_on_get: false,
            },
            Shape::Plain { url, .. } => Raw {
                url: r.resolve(*url),
                method: None,
                default_method: "GET",
                headers: Vec::new(),
                body: None,
                data_query_on_get: false,
            },
            Shape::Ajax {
                url,
                settings,
                method,
                data,
            } => {
                let settings = settings.map(|s| r.resolve(s));
                let url = match *url {
                    Some(u) => r.resolve(u),
                    None => settings
                        .as_ref()
                        .and_then(|s| field(s, "url"))
                        .unwrap_or(Value::Unknown),
                };
                let explicit = settings
                    .as_ref()
                    .and_then(|s| field(s, "method").or_else(|| field(s, "type")));
                let mut headers = settings
                    .as_ref()
                    .and_then(|s| field(s, "headers"))
                    .map(|h| header_fields(&h))
                    .unwrap_or_default();
                if let Some(ct) = settings.as_ref().and_then(|s| field(s, "contentType")) {
                    headers.push(("Content-Type".to_string(), ct));
                }
                let body = match *data {
                    Some(d) => Some(r.resolve(d)),
                    None => settings.as_ref().and_then(|s| field(s, "data")),
                };
                Raw {
                    url,
                    method: explicit.or_else(|| method.map(|m| Value::Str(m.to_string()))),
                    default_method: "GET",
                    headers,
                    body,
                    data_query_on_get: true,
                }
            }
            Shape::Load { url, data } => {
                let body = data.map(|d| r.resolve(d));
                let posts = body
                    .as_ref()
                    .is_some_and(|b| b.members().iter().any(|m| matches!(m, Value::Map(_))));
                Raw {
                    url: r.resolve(*url),
                    method: None,
                    default_method: if posts { "POST" } else { "GET" },
                    headers: Vec::new(),
                    body,
                    data_query_on_get: true,
                }
            }
        }
    }
}

/// Field `key` across the object alternatives of `v`.
fn field(v: &Value, key: &str) -> Option<Value> {
    let mut found = Vec::new();
    for m in v.members() {
        let m = match m {
            Value::Sym(Sym {
                default: Some(d), ..
            }) => d.as_ref(),
            other => other,
        };
        if let Some(x) = m.get(key) {
            found.push(x.clone());
        }
    }
    if found.is_empty() {
        None
    } else {
        Some(Value::join(found, usize::MAX))
    }
}

fn header_fields(v: &Value) -> Vec<(String, Value)> {
    let mut out: Vec<(String, Value)> = Vec::new();
    for m in v.members() {
        if let Value::Map(fields) = m {
            for f in fields {
                if !f.spread {
                    out.push((f.key.clone(), f.value.clone()));
                }
            }
        }
    }
    out
}

/// Finds request shapes and renders call sites in source order.
pub fn synthesize(cx: &Context<'_>, constraints: &Constraints) -> Vec<CallSite> {
    let xhr_extras = xhr_calls(cx);
    let mut sites: Vec<CallSite> = Vec::new();
    let mut per_location: HashMap<(usize, usize), usize> = HashMap::new();
    for &(e, _) in &cx.index.exprs {
        let Some(shape) = detect(cx, e, &xhr_extras) else { continue };
        let kind = shape.kind();
        let raws = cx.evaluate(|r| shape.resolve(r));
        let mut emitted = 0;
        for (_, raw) in raws {
            for mut site in render(kind, &raw, constraints, cx.opts.max_values) {
                if sites
                    .iter()
                    .any(|s| s.kind == site.kind && s.url == site.url && s.method == site.method)
                {
                    continue;
                }
                let n = per_location.entry((e.span.line, e.span.column)).or_default();
                site.id = Some(format!("{}:{}#{}", e.span.line, e.span.column, n));
                *n += 1;
                emitted += 1;
                sites.push(site);
            }
        }
        if emitted == 0 {
            trace!(kind, line = e.span.line, "network sink suppressed");
        }
    }
    sites
}

type XhrExtras<'p> = HashMap<ObjKey, (Vec<(&'p Expr, &'p Expr)>, Vec<&'p Expr>)>;

/// `setRequestHeader` and `send` calls grouped by receiver.
fn xhr_calls<'p>(cx: &Context<'p>) -> XhrExtras<'p> {
    let mut out: XhrExtras<'p> = HashMap::new();
    for &(e, _) in &cx.index.exprs {
        let ExprKind::Call { callee, args, .. } = &e.kind else { continue };
        let ExprKind::Member { object, prop, .. } = &callee.kind else {
            continue;
        };
        let name = prop.static_name();
        if !matches!(name.as_deref(), Some("setRequestHeader" | "send")) {
            continue;
        }
        let mut r = cx.resolver();
        if !is_instance_of(&r.resolve(object), "XMLHttpRequest") {
            continue;
        }
        let Some(key) = r.obj_key(object) else { continue };
        let entry = out.entry(key).or_default();
        match (name.as_deref(), args.first(), args.get(1)) {
            (Some("setRequestHeader"), Some(k), Some(v)) => entry.0.push((k, v)),
            (Some("send"), Some(b), _) => entry.1.push(b),
            _ => {}
        }
    }
    out
}

fn is_instance_of(v: &Value, global: &str) -> bool {
    v.members()
        .iter()
        .any(|m| matches!(m, Value::Instance(Proto::Global(g)) if g == global))
}

fn resolves_to_global(cx: &Context<'_>, e: &Expr, names: &[&str]) -> bool {
    // A declared identifier of the same name is never the host global.
    if let ExprKind::Ident(_) = e.kind {
        if cx.is_declared(e) {
            return false;
        }
    }
    cx.resolver()
        .resolve(e)
        .members()
        .iter()
        .any(|m| matches!(m, Value::Global(p) if names.contains(&p.as_str())))
}

/// `$`/`jQuery` as the root of a call chain.
fn is_jquery(cx: &Context<'_>, e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Ident(n) if n == "$" || n == "jQuery" => !cx.is_declared(e),
        _ => resolves_to_global(cx, e, &["$", "jQuery"]),
    }
}

fn detect<'p>(cx: &Context<'p>, e: &'p Expr, xhr: &XhrExtras<'p>) -> Option<Shape<'p>> {
    match &e.kind {
        ExprKind::Call { callee, args, .. } => {
            if resolves_to_global(cx, callee, &["fetch"]) {
                return Some(Shape::Fetch {
                    url: args.first()?,
                    init: args.get(1),
                });
            }
            if resolves_to_global(cx, callee, &["navigator.sendBeacon"]) {
                return Some(Shape::Beacon {
                    url: args.first()?,
                    data: args.get(1),
                });
            }
            let ExprKind::Member { object, prop, .. } = &callee.kind else {
                return None;
            };
            let name = prop.static_name()?;
            if name == "open" {
                let mut r = cx.resolver();
                if is_instance_of(&r.resolve(object), "XMLHttpRequest") {
                    let (headers, sends) = r
                        .obj_key(object)
                        .and_then(|k| xhr.get(&k).cloned())
                        .unwrap_or_default();
                    return Some(Shape::Xhr {
                        method: args.first()?,
                        url: args.get(1)?,
                        headers,
                        sends,
                    });
                }
            }
            if is_jquery(cx, object) {
                let first_is_settings =
                    matches!(args.first().map(|a| &a.kind), Some(ExprKind::Object(_)));
                return match name.as_str() {
                    "ajax" if first_is_settings => Some(Shape::Ajax {
                        url: None,
                        settings: args.first(),
                        method: None,
                        data: None,
                    }),
                    "ajax" => Some(Shape::Ajax {
                        url: args.first(),
                        settings: args.get(1),
                        method: None,
                        data: None,
                    }),
                    "get" | "getJSON" | "post" => {
                        let method = if name == "post" { "POST" } else { "GET" };
                        if first_is_settings {
                            return Some(Shape::Ajax {
                                url: None,
                                settings: args.first(),
                                method: Some(method),
                                data: None,
                            });
                        }
                        let data = args.get(1).filter(|d| !d.is_function());
                        Some(Shape::Ajax {
                            url: Some(args.first()?),
                            settings: None,
                            method: Some(method),
                            data,
                        })
                    }
                    _ => None,
                };
            }
            if name == "load" {
                if let ExprKind::Call { callee: root, .. } = &object.kind {
                    if is_jquery(cx, root) {
                        return Some(Shape::Load {
                            url: args.first()?,
                            data: args.get(1).filter(|d| !d.is_function()),
                        });
                    }
                }
            }
            None
        }
        ExprKind::New { callee, args } => {
            let kind = if resolves_to_global(cx, callee, &["EventSource"]) {
                "eventsource"
            } else if resolves_to_global(cx, callee, &["WebSocket"]) {
                "websocket"
            } else {
                return None;
            };
            Some(Shape::Plain {
                kind,
                url: args.first()?,
            })
        }
        ExprKind::Assign { op, target, value } if op == "=" => {
            let Pat::Expr(m) = target.as_ref() else { return None };
            let ExprKind::Member { object, prop, .. } = &m.kind else {
                return None;
            };
            if !matches!(prop, MemberProp::Ident(p) if p == "src") {
                return None;
            }
            if !is_instance_of(&cx.resolver().resolve(object), "Image") {
                return None;
            }
            Some(Shape::Plain {
                kind: "image",
                url: value,
            })
        }
        _ => None,
    }
}

fn render(kind: &str, raw: &Raw, constraints: &Constraints, max: usize) -> Vec<CallSite> {
    let urls: Vec<&Value> = raw.url.members();
    let methods: Vec<Option<String>> = match &raw.method {
        None => vec![Some(raw.default_method.to_string())],
        Some(m) => m.members().into_iter().map(method_name).collect(),
    };
    let combos: Vec<(&Value, &Option<String>)> = if urls.len() == methods.len() {
        urls.iter().copied().zip(methods.iter()).collect()
    } else {
        urls.iter()
            .flat_map(|u| methods.iter().map(move |m| (*u, m)))
            .take(max.max(1))
            .collect()
    };

    let mut out = Vec::new();
    for (url, method) in combos {
        let Some(method) = method else { continue };
        let Some((rendered, mut params)) = render_url(url, constraints) else {
            continue;
        };
        let mut headers = BTreeMap::new();
        for (name, value) in &raw.headers {
            match value {
                v if v.is_scalar() => {
                    headers.insert(name.clone(), v.scalar_string().unwrap_or_default());
                }
                Value::Sym(s) => {
                    if let Some(d) = s.default.as_deref().and_then(Value::scalar_string) {
                        headers.insert(name.clone(), d);
                    }
                    push_param(
                        &mut params,
                        descriptor(name, ParamLocation::Header, value, false, constraints),
                    );
                }
                _ => {}
            }
        }
        if let Some(body) = &raw.body {
            let location = if raw.data_query_on_get && method == "GET" {
                ParamLocation::Query
            } else {
                ParamLocation::Body
            };
            for p in body_params(body, location, constraints) {
                push_param(&mut params, p);
            }
        }
        out.push(CallSite {
            id: None,
            kind: kind.to_string(),
            url: rendered,
            method: method.clone(),
            headers,
            params,
        });
    }
    out
}

fn method_name(v: &Value) -> Option<String> {
    match v {
        Value::Str(s) if !s.is_empty() => Some(s.to_uppercase()),
        Value::Sym(Sym {
            default: Some(d), ..
        }) => d.as_str().filter(|s| !s.is_empty()).map(str::to_uppercase),
        _ => None,
    }
}

fn push_param(params: &mut Vec<ParamDescriptor>, p: ParamDescriptor) {
    if !params
        .iter()
        .any(|q| q.name == p.name && q.location == p.location)
    {
        params.push(p);
    }
}

/// URL text with `{name}` placeholders plus the path and query params.
/// `None` when no literal piece identifies an endpoint.
fn render_url(url: &Value, constraints: &Constraints) -> Option<(String, Vec<ParamDescriptor>)> {
    let mut parts = url.to_parts()?;
    if let [Part::Hole(Sym {
        default: Some(d), ..
    })] = parts.as_slice()
    {
        if let Value::Str(s) = d.as_ref() {
            parts = vec![Part::Text(s.clone())];
        }
    }
    let literal: String = parts
        .iter()
        .filter_map(|p| match p {
            Part::Text(t) => Some(t.as_str()),
            Part::Hole(_) => None,
        })
        .collect();
    if !literal
        .chars()
        .any(|c| !URL_SEPARATORS.contains(&c) && !c.is_whitespace())
    {
        return None;
    }

    let mut params = Vec::new();
    let mut text = String::new();
    let mut query: Vec<Part> = Vec::new();
    let mut in_query = false;
    for p in parts {
        if in_query {
            query.push(p);
            continue;
        }
        match p {
            Part::Text(t) => match t.find('?') {
                Some(i) => {
                    text.push_str(&t[..=i]);
                    in_query = true;
                    query.push(Part::Text(t[i + 1..].to_string()));
                }
                None => text.push_str(&t),
            },
            Part::Hole(s) => {
                text.push_str(&format!("{{{}}}", s.name));
                let v = Value::Sym(s.clone());
                push_param(
                    &mut params,
                    descriptor(&s.name, ParamLocation::Path, &v, false, constraints),
                );
            }
        }
    }
    for (i, (key, value)) in pairs(&query).into_iter().enumerate() {
        if i > 0 {
            text.push('&');
        }
        match value {
            PairValue::Lit(v) => {
                text.push_str(&format!("{key}={v}"));
                push_param(
                    &mut params,
                    ParamDescriptor {
                        name: key,
                        ty: "string".into(),
                        location: ParamLocation::Query,
                        required: false,
                        default_value: Some(JsonValue::String(v)),
                        valid_values: None,
                        spread: false,
                    },
                );
            }
            PairValue::Hole(s) => {
                text.push_str(&format!("{key}={{{key}}}"));
                let v = Value::Sym(s);
                push_param(
                    &mut params,
                    descriptor(&key, ParamLocation::Query, &v, false, constraints),
                );
            }
            PairValue::Bare => text.push_str(&key),
        }
    }
    Some((text, params))
}

enum PairValue {
    Lit(String),
    Hole(Sym),
    /// A key without `=`.
    Bare,
}

/// Splits form/query parts into `key=value` pairs on `&`.
fn pairs(parts: &[Part]) -> Vec<(String, PairValue)> {
    let mut segments: Vec<Vec<Part>> = vec![Vec::new()];
    for p in parts {
        match p {
            Part::Text(t) => {
                let mut pieces = t.split('&');
                if let Some(first) = pieces.next() {
                    push_text(segments.last_mut(), first);
                }
                for piece in pieces {
                    segments.push(Vec::new());
                    push_text(segments.last_mut(), piece);
                }
            }
            Part::Hole(s) => {
                if let Some(seg) = segments.last_mut() {
                    seg.push(Part::Hole(s.clone()));
                }
            }
        }
    }

    let mut out = Vec::new();
    for seg in segments {
        let Some(Part::Text(head)) = seg.first() else { continue };
        let Some((key, rest)) = head.split_once('=') else {
            if seg.len() == 1 && !head.is_empty() {
                out.push((head.clone(), PairValue::Bare));
            }
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let hole = seg.iter().find_map(|p| match p {
            Part::Hole(s) => Some(s.clone()),
            Part::Text(_) => None,
        });
        let value = match hole {
            Some(s) => PairValue::Hole(s),
            None => PairValue::Lit(rest.to_string()),
        };
        out.push((key.to_string(), value));
    }
    out
}

fn push_text(seg: Option<&mut Vec<Part>>, text: &str) {
    let Some(seg) = seg else { return };
    if text.is_empty() {
        return;
    }
    match seg.last_mut() {
        Some(Part::Text(prev)) => prev.push_str(text),
        _ => seg.push(Part::Text(text.to_string())),
    }
}

/// Parameters carried by a request body or jQuery `data`.
fn body_params(
    body: &Value,
    location: ParamLocation,
    constraints: &Constraints,
) -> Vec<ParamDescriptor> {
    let mut out = Vec::new();
    for m in body.members() {
        let m = match m {
            Value::Sym(Sym {
                default: Some(d), ..
            }) if matches!(d.as_ref(), Value::Map(_)) => d.as_ref(),
            other => other,
        };
        match m {
            Value::Map(fields) => {
                for f in fields {
                    let p = descriptor(&f.key, location, &f.value, f.spread, constraints);
                    push_param(&mut out, p);
                }
            }
            Value::Str(_) | Value::Partial(_) => {
                let Some(parts) = m.to_parts() else { continue };
                let is_form = parts.iter().any(|p| matches!(p, Part::Text(t) if t.contains('=')));
                if !is_form {
                    continue;
                }
                for (key, value) in pairs(&parts) {
                    let p = match value {
                        PairValue::Lit(v) => ParamDescriptor {
                            name: key,
                            ty: "string".into(),
                            location,
                            required: true,
                            default_value: Some(JsonValue::String(v)),
                            valid_values: None,
                            spread: false,
                        },
                        PairValue::Hole(s) => {
                            descriptor(&key, location, &Value::Sym(s), false, constraints)
                        }
                        PairValue::Bare => continue,
                    };
                    push_param(&mut out, p);
                }
            }
            _ => {}
        }
    }
    out
}

fn descriptor(
    name: &str,
    location: ParamLocation,
    value: &Value,
    spread: bool,
    constraints: &Constraints,
) -> ParamDescriptor {
    let mut p = ParamDescriptor {
        name: name.to_string(),
        ty: value.type_name().to_string(),
        location,
        required: true,
        default_value: None,
        valid_values: None,
        spread,
    };
    match value {
        Value::Sym(s) => {
            if spread {
                p.ty = "object".into();
                p.required = false;
            }
            if let Some(d) = &s.default {
                p.required = false;
                p.default_value = d.to_json();
            }
            p.valid_values = constraints.lookup(s).map(|c| c.valid_values());
        }
        Value::Many(items) => {
            if items.iter().all(Value::is_scalar) {
                p.valid_values = Some(items.iter().filter_map(Value::scalar_string).collect());
            }
        }
        other => p.default_value = other.to_json(),
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url_of(v: Value) -> Option<String> {
        render_url(&v, &Constraints::default()).map(|(u, _)| u)
    }

    #[test]
    fn separators_alone_do_not_make_an_endpoint() {
        assert_eq!(url_of(Value::Str("/".into())), None);
        assert_eq!(
            url_of(Value::Partial(vec![
                Part::Text("/".into()),
                Part::Hole(Sym::named("u")),
            ])),
            None
        );
        assert_eq!(url_of(Value::Str("/api".into())), Some("/api".into()));
    }

    #[test]
    fn holes_become_path_and_query_params() {
        let v = Value::Partial(vec![
            Part::Text("/users/".into()),
            Part::Hole(Sym::named("id")),
            Part::Text("?page=".into()),
            Part::Hole(Sym::named("p")),
            Part::Text("&sort=asc".into()),
        ]);
        let (url, params) = render_url(&v, &Constraints::default()).expect("rendered");
        assert_eq!(url, "/users/{id}?page={page}&sort=asc");
        let names: Vec<(&str, ParamLocation)> =
            params.iter().map(|p| (p.name.as_str(), p.location)).collect();
        assert_eq!(
            names,
            vec![
                ("id", ParamLocation::Path),
                ("page", ParamLocation::Query),
                ("sort", ParamLocation::Query),
            ]
        );
        assert_eq!(params[2].default_value, Some(JsonValue::from("asc")));
    }

    #[test]
    fn form_bodies_split_into_fields() {
        let body = Value::Partial(vec![
            Part::Text("user=".into()),
            Part::Hole(Sym::named("name")),
            Part::Text("&remember=1".into()),
        ]);
        let params = body_params(&body, ParamLocation::Body, &Constraints::default());
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "user");
        assert!(params[0].required);
        assert_eq!(params[1].default_value, Some(JsonValue::from("1")));
    }
}
