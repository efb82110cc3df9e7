//! Finite literal sets a variable is compared against.
//!
//! Sources are `switch` case labels, `===`/`==` OR-chains, and membership
//! tests against literal arrays (`includes`, `indexOf(..) !== -1`).

use ir::{Expr, ExprKind, LogicalOp, StmtKind};
use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::report::ValueConstraint;
use crate::scope::BindingKey;
use crate::value::{Sym, Value};

/// Variable or member path a constraint applies to. `root` is the binding
/// of the leftmost identifier, `None` for implicit globals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    pub root: Option<BindingKey>,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub subject: Subject,
    pub values: Vec<Value>,
    pub sources: Vec<&'static str>,
}

#[derive(Debug, Default)]
pub struct Constraints {
    entries: Vec<Constraint>,
}

impl Constraints {
    pub fn mine(cx: &Context<'_>) -> Constraints {
        let mut found: Vec<(usize, Subject, Vec<Value>, &'static str)> = Vec::new();

        for &(stmt, _) in &cx.index.stmts {
            let StmtKind::Switch { disc, cases } = &stmt.kind else { continue };
            let Some(subject) = subject_of(cx, disc) else { continue };
            let values: Vec<Value> = cases
                .iter()
                .filter_map(|c| c.test.as_ref().and_then(literal))
                .collect();
            if !values.is_empty() {
                found.push((stmt.span.start, subject, values, "switch"));
            }
        }

        for &(e, _) in &cx.index.exprs {
            match &e.kind {
                ExprKind::Logical {
                    op: LogicalOp::Or, ..
                } => {
                    let mut terms = Vec::new();
                    flatten_or(e, &mut terms);
                    if let Some((subject, values)) = equality_chain(cx, &terms) {
                        found.push((e.span.start, subject, values, "equality-chain"));
                    }
                }
                ExprKind::Call { callee, args, .. } => {
                    if let Some((subject, values)) = membership(cx, callee, args, "includes") {
                        found.push((e.span.start, subject, values, "includes"));
                    }
                }
                ExprKind::Binary { op, left, right } => {
                    let ExprKind::Call { callee, args, .. } = &left.kind else { continue };
                    let bound = cx.resolver().resolve(right);
                    let present = matches!(
                        (op.as_str(), &bound),
                        ("!==" | "!=" | ">", Value::Num(n)) if *n == -1.0
                    ) || matches!((op.as_str(), &bound), (">=", Value::Num(n)) if *n == 0.0);
                    if !present {
                        continue;
                    }
                    if let Some((subject, values)) = membership(cx, callee, args, "indexOf") {
                        found.push((e.span.start, subject, values, "includes"));
                    }
                }
                _ => {}
            }
        }

        found.sort_by_key(|(start, ..)| *start);
        let mut out = Constraints::default();
        for (_, subject, values, source) in found {
            out.add(subject, values, source);
        }
        out
    }

    fn add(&mut self, subject: Subject, values: Vec<Value>, source: &'static str) {
        let idx = match self.entries.iter().position(|c| c.subject == subject) {
            Some(i) => i,
            None => {
                self.entries.push(Constraint {
                    subject,
                    values: Vec::new(),
                    sources: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        for v in values {
            if !entry.values.contains(&v) {
                entry.values.push(v);
            }
        }
        if !entry.sources.contains(&source) {
            entry.sources.push(source);
        }
    }

    /// Constraint for the variable a placeholder stands for. Placeholders
    /// without a binding match by name when exactly one constraint has
    /// that final path segment.
    pub fn lookup(&self, sym: &Sym) -> Option<&Constraint> {
        if let Some(key) = &sym.binding {
            if let Some(c) = self
                .entries
                .iter()
                .find(|c| c.subject.root.as_ref() == Some(key) && c.subject.path == key.name)
            {
                return Some(c);
            }
        }
        let mut by_name = self
            .entries
            .iter()
            .filter(|c| c.subject.path.rsplit('.').next() == Some(sym.name.as_str()));
        match (by_name.next(), by_name.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_report(&self) -> Vec<ValueConstraint> {
        self.entries
            .iter()
            .map(|c| ValueConstraint {
                variable: c.subject.path.clone(),
                values: c
                    .values
                    .iter()
                    .map(|v| v.to_json().unwrap_or(JsonValue::Null))
                    .collect(),
                sources: c.sources.iter().map(|s| s.to_string()).collect(),
            })
            .collect()
    }
}

impl Constraint {
    /// Values as strings, the form parameter descriptors carry.
    pub fn valid_values(&self) -> Vec<String> {
        self.values.iter().filter_map(Value::scalar_string).collect()
    }
}

fn subject_of(cx: &Context<'_>, e: &Expr) -> Option<Subject> {
    let path = e.member_path()?;
    if path.starts_with("this") {
        return Some(Subject { root: None, path });
    }
    let root = e.root_ident()?;
    let key = cx
        .scope_at(root_start(e))
        .and_then(|s| cx.scopes.lookup(s, root));
    Some(Subject { root: key, path })
}

fn root_start(e: &Expr) -> usize {
    match &e.kind {
        ExprKind::Member { object, .. } => root_start(object),
        _ => e.span.start,
    }
}

fn literal(e: &Expr) -> Option<Value> {
    match &e.kind {
        ExprKind::Str(s) => Some(Value::Str(s.clone())),
        ExprKind::Num(n) => Some(Value::Num(*n)),
        ExprKind::Bool(b) => Some(Value::Bool(*b)),
        ExprKind::Unary { op, arg } if op == "-" => match arg.kind {
            ExprKind::Num(n) => Some(Value::Num(-n)),
            _ => None,
        },
        _ => e.as_str_lit().map(|s| Value::Str(s.to_string())),
    }
}

fn flatten_or<'e>(e: &'e Expr, out: &mut Vec<&'e Expr>) {
    match &e.kind {
        ExprKind::Logical {
            op: LogicalOp::Or,
            left,
            right,
        } => {
            flatten_or(left, out);
            flatten_or(right, out);
        }
        _ => out.push(e),
    }
}

/// `x === "a" || x === "b"`: at least two comparisons of one subject.
fn equality_chain(cx: &Context<'_>, terms: &[&Expr]) -> Option<(Subject, Vec<Value>)> {
    if terms.len() < 2 {
        return None;
    }
    let mut subject: Option<Subject> = None;
    let mut values = Vec::new();
    for t in terms {
        let ExprKind::Binary { op, left, right } = &t.kind else {
            return None;
        };
        if op != "===" && op != "==" {
            return None;
        }
        let (var, lit) = match (literal(left), literal(right)) {
            (None, Some(v)) => (left, v),
            (Some(v), None) => (right, v),
            _ => return None,
        };
        let s = subject_of(cx, var)?;
        match &subject {
            Some(prev) if *prev != s => return None,
            Some(_) => {}
            None => subject = Some(s),
        }
        if !values.contains(&lit) {
            values.push(lit);
        }
    }
    subject.map(|s| (s, values))
}

/// `list.method(x)` where `list` resolves to an array of literals.
fn membership<'p>(
    cx: &Context<'p>,
    callee: &'p Expr,
    args: &'p [Expr],
    method: &str,
) -> Option<(Subject, Vec<Value>)> {
    let ExprKind::Member { object, prop, .. } = &callee.kind else {
        return None;
    };
    if prop.static_name().as_deref() != Some(method) {
        return None;
    }
    let subject = subject_of(cx, args.first()?)?;
    let Value::List(items) = cx.resolver().resolve(object) else {
        return None;
    };
    let values: Vec<Value> = items
        .into_iter()
        .filter(|v| matches!(v, Value::Str(_) | Value::Num(_) | Value::Bool(_)))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some((subject, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;

    fn mine(src: &str) -> Vec<ValueConstraint> {
        let prog = parsers::parse_javascript(src, false).expect("parse");
        let opts = AnalysisOptions::default();
        let cx = Context::new(&prog, src, &opts);
        Constraints::mine(&cx).to_report()
    }

    #[test]
    fn switch_labels() {
        let out = mine(
            "function go(action) { switch (action) { case 'create': break; case 'update': break; case 'delete': break; default: } }",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].variable, "action");
        assert_eq!(out[0].values.len(), 3);
        assert_eq!(out[0].sources, vec!["switch"]);
    }

    #[test]
    fn equality_chain_needs_two_terms() {
        assert!(mine("if (mode === 'a') {}").is_empty());
        let out = mine("if (mode === 'a' || mode === 'b' || 'c' == mode) {}");
        assert_eq!(out[0].values.len(), 3);
        assert_eq!(out[0].sources, vec!["equality-chain"]);
    }

    #[test]
    fn membership_through_bound_array() {
        let out = mine(
            "const KINDS = ['x', 'y']; function f(k) { if (KINDS.indexOf(k) !== -1) {} if (['z'].includes(k)) {} }",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].values,
            vec![
                JsonValue::from("x"),
                JsonValue::from("y"),
                JsonValue::from("z")
            ]
        );
        assert_eq!(out[0].sources, vec!["includes"]);
    }

    #[test]
    fn mixed_subjects_are_not_a_chain() {
        assert!(mine("if (a === 'x' || b === 'y') {}").is_empty());
    }
}
