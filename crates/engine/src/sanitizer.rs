//! Path-sensitive re-evaluation of taint candidates.
//!
//! The taint pass is flow-insensitive: every definition of a binding
//! contributes. Here each candidate is evaluated again with only the
//! definitions that reach the use along some CFG path, so a sanitizing
//! reassignment on every path downgrades the finding and one unsanitized
//! path keeps it high.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use ir::FnId;
use tracing::debug;

use crate::cfg::{build_cfg, FnScope, FunctionCfg};
use crate::context::Context;
use crate::report::{SecuritySink, Severity};
use crate::scope::{BindingKey, Def};
use crate::taint::{self, DefFilter, Taint, Tracker};

struct Flow {
    cfg: FunctionCfg,
    reaching: Vec<BTreeSet<usize>>,
}

/// Admits a definition when it is not a write inside the using function
/// (parameters, outer closures, hoisted functions) or when it reaches the
/// statement holding the use.
pub struct ReachingDefs<'a, 'p> {
    cx: &'a Context<'p>,
    flows: RefCell<HashMap<Option<FnId>, Rc<Flow>>>,
}

impl<'a, 'p> ReachingDefs<'a, 'p> {
    pub fn new(cx: &'a Context<'p>) -> Self {
        ReachingDefs {
            cx,
            flows: RefCell::new(HashMap::new()),
        }
    }

    fn flow(&self, func: Option<FnId>) -> Rc<Flow> {
        if let Some(hit) = self.flows.borrow().get(&func) {
            return Rc::clone(hit);
        }
        let scope = match func {
            Some(f) => FnScope::Function(f),
            None => FnScope::TopLevel,
        };
        let cfg = build_cfg(self.cx.prog, scope);
        let reaching = cfg.reaching_definitions();
        let flow = Rc::new(Flow { cfg, reaching });
        self.flows.borrow_mut().insert(func, Rc::clone(&flow));
        flow
    }
}

impl DefFilter for ReachingDefs<'_, '_> {
    fn admits(&self, use_at: usize, key: &BindingKey, def: &Def<'_>) -> bool {
        let Some(scope) = self.cx.scope_at(use_at) else {
            return true;
        };
        let flow = self.flow(self.cx.func_at(scope));
        let Some(idx) = flow.cfg.def_index(&key.name, def.span) else {
            return true;
        };
        let Some(node) = flow.cfg.node_at(use_at) else {
            return true;
        };
        flow.reaching
            .get(node)
            .map_or(true, |live| live.contains(&idx))
    }
}

/// Security findings: taint candidates confirmed along reaching
/// definitions, graded `high` when any path is unsanitized and `info`
/// when every tainted path passes a sanitizer.
pub fn security_sinks(cx: &Context<'_>, handlers: &BTreeSet<FnId>) -> Vec<SecuritySink> {
    let candidates = taint::tainted_sinks(cx, handlers);
    let filter = ReachingDefs::new(cx);
    let mut tracker = Tracker::new(cx, handlers, Some(&filter));
    let mut out: Vec<SecuritySink> = Vec::new();
    let mut downgraded = 0usize;
    for (site, _) in candidates {
        let Taint::Tainted { source, sanitized } = tracker.evaluate(site.arg) else {
            continue;
        };
        if sanitized {
            downgraded += 1;
        }
        let finding = SecuritySink {
            kind: site.kind.to_string(),
            sink: site.sink,
            severity: if sanitized {
                Severity::Info
            } else {
                Severity::High
            },
            source: Some(source),
            source_type: Some("user-controlled".to_string()),
            code_context: cx.code_context(site.span.line),
            location: Some(site.span.into()),
            sanitized,
        };
        if !out.iter().any(|f| {
            f.kind == finding.kind && f.sink == finding.sink && f.location == finding.location
        }) {
            out.push(finding);
        }
    }
    debug!(findings = out.len(), downgraded, "sanitizer pass done");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AnalysisOptions;

    fn findings(src: &str) -> Vec<SecuritySink> {
        let prog = parsers::parse_javascript(src, false).expect("parse");
        let opts = AnalysisOptions::default();
        let cx = Context::new(&prog, src, &opts);
        let handlers = taint::message_handlers(&cx);
        security_sinks(&cx, &handlers)
    }

    #[test]
    fn sanitizer_on_every_path_downgrades() {
        let out = findings(
            "var x = location.hash; var y = encodeURIComponent(x); document.body.innerHTML = y;",
        );
        assert_eq!(out.len(), 1);
        assert!(out[0].sanitized);
        assert_eq!(out[0].severity, Severity::Info);
        assert_eq!(out[0].source.as_deref(), Some("location.hash"));
    }

    #[test]
    fn one_branch_sanitizing_stays_high() {
        let out = findings(
            "var x = location.hash; if (window.strict) { x = encodeURIComponent(x); } document.body.innerHTML = x;",
        );
        assert_eq!(out.len(), 1);
        assert!(!out[0].sanitized);
        assert_eq!(out[0].severity, Severity::High);
    }

    #[test]
    fn both_branches_sanitizing_downgrade() {
        let out = findings(
            "var x = location.hash; if (a) { x = encodeURIComponent(x); } else { x = parseInt(x); } document.body.innerHTML = x;",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::Info);
    }

    #[test]
    fn overwritten_with_literal_is_dropped() {
        let out = findings("var x = location.hash; x = 'safe'; document.body.innerHTML = x;");
        assert!(out.is_empty());
    }

    #[test]
    fn closures_see_every_outer_write() {
        let out = findings(
            "var x = location.hash; function show() { document.body.innerHTML = x; } x = encodeURIComponent(x); show();",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].severity, Severity::High);
        assert_eq!(out[0].code_context.as_deref().map(|c| c.contains("innerHTML")), Some(true));
    }
}
