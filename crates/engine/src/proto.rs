//! Protobuf runtime conventions: bidirectional integer enums and
//! numbered-field accessor methods.

use std::collections::{BTreeMap, HashMap};

use ir::{Expr, ExprKind, FnBody, FnId, MemberKind, MemberProp, Pat, Prop, StmtKind};

use crate::context::Context;
use crate::report::{ProtoEnum, ProtoFieldMap};

const GET_FIELD: &[&str] = &["getField", "getFieldWithDefault"];

pub fn enums(cx: &Context<'_>) -> Vec<ProtoEnum> {
    let names = literal_names(cx);
    let mut out = Vec::new();
    for &(e, _) in &cx.index.exprs {
        let ExprKind::Object(props) = &e.kind else { continue };
        if let Some(values) = bidirectional(props) {
            out.push(ProtoEnum {
                name: names.get(&e.span.start).cloned(),
                values,
            });
        }
    }

    // TypeScript: E[E["A"] = 0] = "A"
    let mut reverse: BTreeMap<(Option<FnId>, String), BTreeMap<String, i64>> = BTreeMap::new();
    for &(e, scope) in &cx.index.exprs {
        if let Some((owner, name, n)) = reverse_mapped(e) {
            reverse
                .entry((cx.func_at(scope), owner))
                .or_default()
                .insert(name, n);
        }
    }
    for ((_, owner), values) in reverse {
        out.push(ProtoEnum {
            name: Some(owner),
            values,
        });
    }
    out
}

/// Names objects get from `var X = {..}` and `a.b.X = {..}`, keyed by
/// the object's start offset.
fn literal_names(cx: &Context<'_>) -> HashMap<usize, String> {
    let mut names = HashMap::new();
    for &(s, _) in &cx.index.stmts {
        let StmtKind::Var(decl) = &s.kind else { continue };
        for d in &decl.decls {
            if let (Some(name), Some(init)) = (d.target.as_ident(), &d.init) {
                names.insert(init.span.start, name.to_string());
            }
        }
    }
    for &(e, _) in &cx.index.exprs {
        let ExprKind::Assign { target, value, .. } = &e.kind else { continue };
        let name = match target.as_ref() {
            Pat::Ident { name, .. } => Some(name.clone()),
            Pat::Expr(t) => t.member_path(),
            _ => None,
        };
        if let Some(name) = name {
            names.insert(value.span.start, name);
        }
    }
    names
}

fn integer(e: &Expr) -> Option<i64> {
    let n = match &e.kind {
        ExprKind::Num(n) => *n,
        ExprKind::Unary { op, arg } if op == "-" => match arg.kind {
            ExprKind::Num(n) => -n,
            _ => return None,
        },
        _ => return None,
    };
    (n.fract() == 0.0 && n.abs() < 9.0e15).then_some(n as i64)
}

/// `{A: 0, B: 1, 0: "A", 1: "B"}`: names map to integers and every
/// integer key maps back to a name with that value.
fn bidirectional(props: &[Prop]) -> Option<BTreeMap<String, i64>> {
    let mut forward = BTreeMap::new();
    let mut backward = Vec::new();
    for p in props {
        let Prop::KeyValue { key, value } = p else {
            return None;
        };
        let key = key.static_name()?;
        if let Ok(n) = key.parse::<i64>() {
            backward.push((n, value.as_str_lit()?.to_string()));
        } else {
            forward.insert(key, integer(value)?);
        }
    }
    if forward.is_empty() || backward.is_empty() {
        return None;
    }
    let consistent = backward
        .iter()
        .all(|(n, name)| forward.get(name) == Some(n));
    consistent.then_some(forward)
}

fn reverse_mapped(e: &Expr) -> Option<(String, String, i64)> {
    let ExprKind::Assign { op, target, value } = &e.kind else {
        return None;
    };
    if op != "=" {
        return None;
    }
    let name = value.as_str_lit()?;
    let Pat::Expr(outer) = target.as_ref() else {
        return None;
    };
    let ExprKind::Member {
        object,
        prop: MemberProp::Computed(inner),
        ..
    } = &outer.kind
    else {
        return None;
    };
    let owner = object.member_path()?;
    let ExprKind::Assign {
        target: inner_target,
        value: inner_value,
        ..
    } = &inner.kind
    else {
        return None;
    };
    let Pat::Expr(inner_member) = inner_target.as_ref() else {
        return None;
    };
    let ExprKind::Member {
        object: inner_object,
        prop,
        ..
    } = &inner_member.kind
    else {
        return None;
    };
    if inner_object.member_path().as_deref() != Some(owner.as_str())
        || prop.static_name().as_deref() != Some(name)
    {
        return None;
    }
    Some((owner, name.to_string(), integer(inner_value)?))
}

pub fn field_maps(cx: &Context<'_>) -> Vec<ProtoFieldMap> {
    let mut messages: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut add = |message: String, accessor: String, f: FnId| {
        if let Some(n) = field_number(cx, f) {
            messages
                .entry(message)
                .or_default()
                .insert(n.to_string(), accessor);
        }
    };

    for &(e, _) in &cx.index.exprs {
        let ExprKind::Assign { target, value, .. } = &e.kind else { continue };
        let Pat::Expr(t) = target.as_ref() else { continue };
        let Some(path) = t.member_path() else { continue };
        if let Some((message, accessor)) = path.rsplit_once(".prototype.") {
            if let ExprKind::Function(f) = value.kind {
                add(message.to_string(), accessor.to_string(), f);
            }
        } else if let Some(message) = path.strip_suffix(".prototype") {
            let ExprKind::Object(props) = &value.kind else { continue };
            for p in props {
                let (key, f) = match p {
                    Prop::Method { key, func } => (key, *func),
                    Prop::KeyValue { key, value } => match value.kind {
                        ExprKind::Function(f) => (key, f),
                        _ => continue,
                    },
                    _ => continue,
                };
                if let Some(name) = key.static_name() {
                    add(message.to_string(), name, f);
                }
            }
        }
    }

    for class in &cx.prog.classes {
        let Some(message) = class.name.clone() else { continue };
        for m in &class.members {
            let MemberKind::Method(f) = m.kind else { continue };
            if m.is_static {
                continue;
            }
            if let Some(name) = m.key.static_name() {
                add(message.clone(), name, f);
            }
        }
    }

    messages
        .into_iter()
        .map(|(message, fields)| ProtoFieldMap { message, fields })
        .collect()
}

/// `N` when the body is exactly `return jspb.Message.getField(this, N)`.
fn field_number(cx: &Context<'_>, f: FnId) -> Option<i64> {
    let func = cx.prog.function(f)?;
    let ret = match &func.body {
        FnBody::Expr(e) => e.as_ref(),
        FnBody::Block(stmts) => match stmts.as_slice() {
            [only] => match &only.kind {
                StmtKind::Return(Some(e)) => e,
                _ => return None,
            },
            _ => return None,
        },
    };
    let ExprKind::Call { callee, args, .. } = &ret.kind else {
        return None;
    };
    let path = callee.member_path()?;
    let method = path.strip_prefix("jspb.Message.")?;
    if !GET_FIELD.contains(&method) {
        return None;
    }
    match args.as_slice() {
        [this, n, ..] if matches!(this.kind, ExprKind::This) => integer(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;

    fn run<T>(src: &str, f: impl FnOnce(&Context<'_>) -> T) -> T {
        let prog = parsers::parse_javascript(src, false).expect("parse");
        let opts = AnalysisOptions::default();
        let cx = Context::new(&prog, src, &opts);
        f(&cx)
    }

    #[test]
    fn bidirectional_object_literal() {
        let out = run(
            "var Status = {ACTIVE: 0, DISABLED: 1, 0: 'ACTIVE', 1: 'DISABLED'}; var plain = {A: 0, B: 1};",
            enums,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name.as_deref(), Some("Status"));
        assert_eq!(out[0].values["DISABLED"], 1);
    }

    #[test]
    fn mismatched_reverse_entry_is_not_an_enum() {
        assert!(run("var E = {A: 0, 0: 'B'};", enums).is_empty());
    }

    #[test]
    fn typescript_reverse_mapping() {
        let out = run(
            "var Color; (function (Color) { Color[Color['Red'] = 0] = 'Red'; Color[Color['Blue'] = 2] = 'Blue'; })(Color || (Color = {}));",
            enums,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name.as_deref(), Some("Color"));
        assert_eq!(out[0].values.len(), 2);
        assert_eq!(out[0].values["Blue"], 2);
    }

    #[test]
    fn prototype_and_class_accessors() {
        let out = run(
            "proto.api.User.prototype.getName = function () { return jspb.Message.getField(this, 1); };\n\
             proto.api.User.prototype.getId = function () { return jspb.Message.getFieldWithDefault(this, 2, 0); };\n\
             proto.api.User.prototype.toObject = function () { return {}; };\n\
             class Order { getTotal() { return jspb.Message.getField(this, 4); } }",
            field_maps,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].message, "Order");
        assert_eq!(out[0].fields["4"], "getTotal");
        assert_eq!(out[1].message, "proto.api.User");
        assert_eq!(out[1].fields.len(), 2);
        assert_eq!(out[1].fields["1"], "getName");
    }
}
