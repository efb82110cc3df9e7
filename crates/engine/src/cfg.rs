//! Statement-level control flow graphs and reaching definitions.
//!
//! One graph per function body (or the top-level script). Statements that
//! only transfer control (`if`, loops, `switch`) contribute a head node
//! spanning their test; blocks contribute no node of their own. Nested
//! function bodies are separate graphs and are never entered.

use std::collections::BTreeSet;

use ir::{
    number_to_string, Expr, ExprKind, FnBody, FnId, MemberProp, Pat, Program, Prop, PropKey,
    Span, Stmt, StmtKind, SwitchCase, CFG,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnScope {
    TopLevel,
    Function(FnId),
}

/// A binding write at a CFG node. `span` matches the span the scope
/// builder records on the corresponding definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefSite {
    pub name: String,
    pub node: usize,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionCfg {
    pub cfg: CFG,
    pub defs: Vec<DefSite>,
}

impl FunctionCfg {
    /// Innermost node whose span contains `offset`.
    pub fn node_at(&self, offset: usize) -> Option<usize> {
        self.cfg
            .nodes
            .iter()
            .filter(|n| n.id != self.cfg.entry && n.id != self.cfg.exit)
            .filter(|n| n.span.start <= offset && offset < n.span.end)
            .min_by_key(|n| n.span.len())
            .map(|n| n.id)
    }

    pub fn def_index(&self, name: &str, span: Span) -> Option<usize> {
        self.defs
            .iter()
            .position(|d| d.name == name && d.span == span)
    }

    /// Definitions (indices into `defs`) live on entry to each node.
    pub fn reaching_definitions(&self) -> Vec<BTreeSet<usize>> {
        let n = self.cfg.nodes.len();
        let mut gen: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut kill: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for (i, d) in self.defs.iter().enumerate() {
            // a later write of the same name in one node supersedes earlier ones
            gen[d.node].retain(|&g| self.defs[g].name != d.name);
            gen[d.node].insert(i);
        }
        for d in &self.defs {
            let node = d.node;
            let shadowed = self
                .defs
                .iter()
                .enumerate()
                .filter(|(j, o)| o.name == d.name && !gen[node].contains(j))
                .map(|(j, _)| j);
            kill[node].extend(shadowed);
        }

        let preds = self.cfg.predecessor_table();
        let mut inn: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut out: Vec<BTreeSet<usize>> = gen.clone();
        let mut changed = true;
        while changed {
            changed = false;
            for id in 0..n {
                let mut next_in = BTreeSet::new();
                for &p in &preds[id] {
                    next_in.extend(out[p].iter().copied());
                }
                let mut next_out = gen[id].clone();
                next_out.extend(next_in.difference(&kill[id]).copied());
                if next_in != inn[id] || next_out != out[id] {
                    inn[id] = next_in;
                    out[id] = next_out;
                    changed = true;
                }
            }
        }
        inn
    }
}

/// Builds the CFG of a function body or of the top-level statements.
/// Unknown function ids yield a graph with only entry and exit.
pub fn build_cfg(prog: &Program, scope: FnScope) -> FunctionCfg {
    let mut b = Builder::default();
    let entry = b.cfg.add_node(0, "entry", Span::default());
    let exit = b.cfg.add_node(0, "exit", Span::default());
    b.cfg.entry = entry;
    b.cfg.exit = exit;

    let tail = match scope {
        FnScope::TopLevel => b.stmts(&prog.body, vec![entry]),
        FnScope::Function(id) => match prog.function(id).map(|f| &f.body) {
            Some(FnBody::Block(stmts)) => b.stmts(stmts, vec![entry]),
            Some(FnBody::Expr(e)) => {
                let node = b.node(e.span, format!("return {}", label(e)), &[entry]);
                b.expr_defs(e, node);
                vec![node]
            }
            None => vec![entry],
        },
    };
    for t in tail {
        b.cfg.add_edge(t, exit);
    }
    FunctionCfg {
        cfg: b.cfg,
        defs: b.defs,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKind {
    Loop,
    Switch,
    Block,
}

struct Jump {
    kind: JumpKind,
    label: Option<String>,
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

#[derive(Default)]
struct Builder {
    cfg: CFG,
    defs: Vec<DefSite>,
    jumps: Vec<Jump>,
    pending_label: Option<String>,
}

impl Builder {
    fn node(&mut self, span: Span, code: String, preds: &[usize]) -> usize {
        let id = self.cfg.add_node(span.line, code, span);
        for &p in preds {
            self.cfg.add_edge(p, id);
        }
        id
    }

    fn def(&mut self, name: &str, node: usize, span: Span) {
        self.defs.push(DefSite {
            name: name.to_string(),
            node,
            span,
        });
    }

    fn stmts(&mut self, stmts: &[Stmt], mut preds: Vec<usize>) -> Vec<usize> {
        for s in stmts {
            preds = self.stmt(s, preds);
        }
        preds
    }

    fn stmt(&mut self, s: &Stmt, preds: Vec<usize>) -> Vec<usize> {
        let pending = self.pending_label.take();
        match &s.kind {
            StmtKind::Expr(e) => {
                let n = self.node(s.span, label_of(e), &preds);
                self.expr_defs(e, n);
                vec![n]
            }
            StmtKind::Var(decl) => {
                let names: Vec<String> = decl
                    .decls
                    .iter()
                    .flat_map(|d| d.target.bound_names())
                    .map(|(n, _)| n.to_string())
                    .collect();
                let kw = match decl.kind {
                    ir::VarKind::Var => "var",
                    ir::VarKind::Let => "let",
                    ir::VarKind::Const => "const",
                };
                let n = self.node(s.span, format!("{kw} {}", names.join(", ")), &preds);
                for d in &decl.decls {
                    if let Some(init) = &d.init {
                        self.expr_defs(init, n);
                        for (name, _) in d.target.bound_names() {
                            self.def(name, n, d.span);
                        }
                    }
                    self.pat_defaults(&d.target, n);
                }
                vec![n]
            }
            StmtKind::Return(value) => {
                let code = match value {
                    Some(v) => format!("return {}", label(v)),
                    None => "return".to_string(),
                };
                let n = self.node(s.span, code, &preds);
                if let Some(v) = value {
                    self.expr_defs(v, n);
                }
                let exit = self.cfg.exit;
                self.cfg.add_edge(n, exit);
                Vec::new()
            }
            StmtKind::Throw(e) => {
                let n = self.node(s.span, format!("throw {}", label(e)), &preds);
                self.expr_defs(e, n);
                let exit = self.cfg.exit;
                self.cfg.add_edge(n, exit);
                Vec::new()
            }
            StmtKind::Block(stmts) => self.labeled_block(pending, |b| b.stmts(stmts, preds)),
            StmtKind::If { test, cons, alt } => {
                let head = self.node(test.span, format!("if ({})", label(test)), &preds);
                self.expr_defs(test, head);
                let cons = cons.as_ref();
                let alt = alt.as_deref();
                self.labeled_block(pending, |b| {
                    let mut exits = b.stmt(cons, vec![head]);
                    match alt {
                        Some(alt) => exits.extend(b.stmt(alt, vec![head])),
                        None => exits.push(head),
                    }
                    exits
                })
            }
            StmtKind::While { test, body } => {
                let head = self.node(test.span, format!("while ({})", label(test)), &preds);
                self.expr_defs(test, head);
                let jump = self.in_jump(JumpKind::Loop, pending, |b| b.stmt(body, vec![head]));
                for e in jump.exits.iter().chain(&jump.continues) {
                    self.cfg.add_edge(*e, head);
                }
                let mut exits = vec![head];
                exits.extend(jump.breaks);
                exits
            }
            StmtKind::DoWhile { body, test } => {
                let start = Span {
                    end: s.span.start + 2,
                    ..s.span
                };
                let top = self.node(start, "do".to_string(), &preds);
                let jump = self.in_jump(JumpKind::Loop, pending, |b| b.stmt(body, vec![top]));
                let mut into_test = jump.exits;
                into_test.extend(jump.continues);
                let t = self.node(test.span, format!("while ({})", label(test)), &into_test);
                self.expr_defs(test, t);
                self.cfg.add_edge(t, top);
                let mut exits = vec![t];
                exits.extend(jump.breaks);
                exits
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let after_init = match init {
                    Some(i) => self.stmt(i, preds),
                    None => preds,
                };
                let head_span = test.as_ref().map(|t| t.span).unwrap_or(Span {
                    end: s.span.start + 3,
                    ..s.span
                });
                let code = match test {
                    Some(t) => format!("for (; {};)", label(t)),
                    None => "for (;;)".to_string(),
                };
                let head = self.node(head_span, code, &after_init);
                if let Some(t) = test {
                    self.expr_defs(t, head);
                }
                let jump = self.in_jump(JumpKind::Loop, pending, |b| b.stmt(body, vec![head]));
                let mut back = jump.exits;
                back.extend(jump.continues);
                match update {
                    Some(u) => {
                        let un = self.node(u.span, label_of(u), &back);
                        self.expr_defs(u, un);
                        self.cfg.add_edge(un, head);
                    }
                    None => {
                        for e in back {
                            self.cfg.add_edge(e, head);
                        }
                    }
                }
                let mut exits = Vec::new();
                if test.is_some() {
                    exits.push(head);
                }
                exits.extend(jump.breaks);
                exits
            }
            StmtKind::ForIn {
                left,
                right,
                body,
                of,
            } => {
                let pat = left.pat();
                let span = Span {
                    start: pat.span().start.min(right.span.start),
                    end: pat.span().end.max(right.span.end),
                    ..pat.span()
                };
                let kw = if *of { "of" } else { "in" };
                let names: Vec<&str> = pat.bound_names().into_iter().map(|(n, _)| n).collect();
                let head = self.node(
                    span,
                    format!("for ({} {kw} {})", names.join(", "), label(right)),
                    &preds,
                );
                self.expr_defs(right, head);
                for name in names {
                    self.def(name, head, pat.span());
                }
                let jump = self.in_jump(JumpKind::Loop, pending, |b| b.stmt(body, vec![head]));
                for e in jump.exits.iter().chain(&jump.continues) {
                    self.cfg.add_edge(*e, head);
                }
                let mut exits = vec![head];
                exits.extend(jump.breaks);
                exits
            }
            StmtKind::Switch { disc, cases } => {
                let head = self.node(disc.span, format!("switch ({})", label(disc)), &preds);
                self.expr_defs(disc, head);
                let jump = self.in_jump(JumpKind::Switch, pending, |b| b.cases(cases, head));
                let mut exits = jump.exits;
                exits.extend(jump.breaks);
                exits
            }
            StmtKind::Try {
                block,
                param: _,
                handler,
                finalizer,
            } => {
                let first = self.cfg.nodes.len();
                let mut exits = self.stmts(block, preds.clone());
                let last = self.cfg.nodes.len();
                if let Some(h) = handler {
                    // any statement of the block may throw
                    let mut into_handler = preds;
                    into_handler.extend(first..last);
                    exits.extend(self.stmts(h, into_handler));
                }
                match finalizer {
                    Some(f) => self.stmts(f, exits),
                    None => exits,
                }
            }
            StmtKind::Break(target) => {
                let target = target.as_deref();
                if let Some(j) = self.jumps.iter_mut().rev().find(|j| match target {
                    Some(l) => j.label.as_deref() == Some(l),
                    None => j.kind != JumpKind::Block,
                }) {
                    j.breaks.extend(preds);
                }
                Vec::new()
            }
            StmtKind::Continue(target) => {
                let target = target.as_deref();
                if let Some(j) = self.jumps.iter_mut().rev().find(|j| {
                    j.kind == JumpKind::Loop
                        && target.map_or(true, |l| j.label.as_deref() == Some(l))
                }) {
                    j.continues.extend(preds);
                }
                Vec::new()
            }
            StmtKind::Labeled { label: l, body } => {
                self.pending_label = Some(l.clone());
                self.stmt(body, preds)
            }
            StmtKind::Function(_)
            | StmtKind::Class(_)
            | StmtKind::Import(_)
            | StmtKind::Empty
            | StmtKind::Unsupported(_) => preds,
        }
    }

    fn cases(&mut self, cases: &[SwitchCase], head: usize) -> Vec<usize> {
        let mut fall: Vec<usize> = Vec::new();
        for c in cases {
            let mut preds = vec![head];
            preds.append(&mut fall);
            fall = self.stmts(&c.body, preds);
        }
        if !cases.iter().any(|c| c.test.is_none()) {
            fall.push(head);
        }
        fall
    }

    /// A labeled non-loop statement is a break target for its label.
    fn labeled_block(
        &mut self,
        label: Option<String>,
        f: impl FnOnce(&mut Builder) -> Vec<usize>,
    ) -> Vec<usize> {
        if label.is_none() {
            return f(self);
        }
        let jump = self.in_jump(JumpKind::Block, label, f);
        let mut exits = jump.exits;
        exits.extend(jump.breaks);
        exits
    }

    fn in_jump(
        &mut self,
        kind: JumpKind,
        label: Option<String>,
        f: impl FnOnce(&mut Builder) -> Vec<usize>,
    ) -> JumpResult {
        self.jumps.push(Jump {
            kind,
            label,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
        let exits = f(self);
        let jump = self.jumps.pop();
        let (breaks, continues) = jump.map(|j| (j.breaks, j.continues)).unwrap_or_default();
        JumpResult {
            exits,
            breaks,
            continues,
        }
    }

    fn pat_defaults(&mut self, pat: &Pat, node: usize) {
        match pat {
            Pat::Assign {
                target, default, ..
            } => {
                self.expr_defs(default, node);
                self.pat_defaults(target, node);
            }
            Pat::Object { props, .. } => {
                for p in props {
                    match p {
                        ir::ObjectPatProp::KeyValue { key, value } => {
                            if let PropKey::Computed(k) = key {
                                self.expr_defs(k, node);
                            }
                            self.pat_defaults(value, node);
                        }
                        ir::ObjectPatProp::Rest(r) => self.pat_defaults(r, node),
                    }
                }
            }
            Pat::Array { elems, .. } => {
                for e in elems.iter().flatten() {
                    self.pat_defaults(e, node);
                }
            }
            Pat::Rest { arg, .. } => self.pat_defaults(arg, node),
            Pat::Expr(e) => self.expr_defs(e, node),
            Pat::Ident { .. } | Pat::Unsupported { .. } => {}
        }
    }

    /// Writes performed while evaluating `e`, in evaluation order.
    fn expr_defs(&mut self, e: &Expr, node: usize) {
        match &e.kind {
            ExprKind::Assign { target, value, .. } => {
                self.expr_defs(value, node);
                self.pat_defaults(target, node);
                if !matches!(target.as_ref(), Pat::Expr(_) | Pat::Unsupported { .. }) {
                    for (name, _) in target.bound_names() {
                        self.def(name, node, e.span);
                    }
                }
            }
            ExprKind::Update { arg, .. } => match arg.as_ident() {
                Some(name) => self.def(name, node, e.span),
                None => self.expr_defs(arg, node),
            },
            ExprKind::Template { exprs, .. } | ExprKind::Array(exprs) | ExprKind::Seq(exprs) => {
                for x in exprs {
                    self.expr_defs(x, node);
                }
            }
            ExprKind::TaggedTemplate { tag, exprs, .. } => {
                self.expr_defs(tag, node);
                for x in exprs {
                    self.expr_defs(x, node);
                }
            }
            ExprKind::Object(props) => {
                for p in props {
                    match p {
                        Prop::KeyValue { key, value } => {
                            if let PropKey::Computed(k) = key {
                                self.expr_defs(k, node);
                            }
                            self.expr_defs(value, node);
                        }
                        Prop::Spread(x) => self.expr_defs(x, node),
                        Prop::Shorthand { .. } | Prop::Method { .. } | Prop::Accessor { .. } => {}
                    }
                }
            }
            ExprKind::Unary { arg, .. }
            | ExprKind::Await(arg)
            | ExprKind::Spread(arg)
            | ExprKind::Import(arg) => self.expr_defs(arg, node),
            ExprKind::Yield(arg) => {
                if let Some(a) = arg {
                    self.expr_defs(a, node);
                }
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr_defs(left, node);
                self.expr_defs(right, node);
            }
            ExprKind::Cond { test, cons, alt } => {
                self.expr_defs(test, node);
                self.expr_defs(cons, node);
                self.expr_defs(alt, node);
            }
            ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
                self.expr_defs(callee, node);
                for a in args {
                    self.expr_defs(a, node);
                }
            }
            ExprKind::Member { object, prop, .. } => {
                self.expr_defs(object, node);
                if let MemberProp::Computed(k) = prop {
                    self.expr_defs(k, node);
                }
            }
            ExprKind::Jsx(el) => {
                for a in &el.attrs {
                    if let Some(v) = &a.value {
                        self.expr_defs(v, node);
                    }
                }
                for c in &el.children {
                    self.expr_defs(c, node);
                }
            }
            ExprKind::Ident(_)
            | ExprKind::This
            | ExprKind::Super
            | ExprKind::Str(_)
            | ExprKind::Num(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Regex { .. }
            | ExprKind::Function(_)
            | ExprKind::Class(_)
            | ExprKind::Unsupported(_) => {}
        }
    }
}

struct JumpResult {
    exits: Vec<usize>,
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

/// Expression statements render as their outermost operation.
fn label_of(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Assign { op, target, value } => {
            let lhs = match target.as_ref() {
                Pat::Ident { name, .. } => name.clone(),
                Pat::Expr(t) => label(t),
                _ => "[pattern]".to_string(),
            };
            format!("{lhs} {op} {}", label(value))
        }
        _ => label(e),
    }
}

fn label(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Ident(n) => n.clone(),
        ExprKind::This => "this".to_string(),
        ExprKind::Str(s) => format!("{s:?}"),
        ExprKind::Num(n) => number_to_string(*n),
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Null => "null".to_string(),
        ExprKind::Member { .. } => e.member_path().unwrap_or_else(|| "<member>".to_string()),
        ExprKind::Call { callee, .. } => format!("{}(..)", label(callee)),
        ExprKind::New { callee, .. } => format!("new {}(..)", label(callee)),
        ExprKind::Await(arg) => format!("await {}", label(arg)),
        ExprKind::Template { .. } => "`..`".to_string(),
        ExprKind::Function(_) => "function".to_string(),
        ExprKind::Assign { .. } => label_of(e),
        _ => "..".to_string(),
    }
}
