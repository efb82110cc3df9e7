//! Lowering of the tree-sitter-javascript CST into the typed [`ir`] AST.

use ir::{
    Class, ClassId, ClassMember, Expr, ExprKind, FnBody, FnId, ForHead, Function, ImportBinding,
    ImportDecl, JsxAttr, JsxElement, LogicalOp, MemberKind, MemberProp, ObjectPatProp, Pat,
    Program, Prop, PropKey, Span, Stmt, StmtKind, SwitchCase, VarDecl, VarDeclarator, VarKind,
};
use tracing::debug;
use tree_sitter::Node;

use crate::ParseError;

/// Deepest CST nesting that is lowered structurally. Anything below it
/// becomes `Unsupported` so hostile inputs cannot exhaust the stack.
pub const MAX_NESTING: usize = 512;

/// Parses `source` and lowers it into a [`Program`].
///
/// With `force_script` the source is treated as a classic script and any
/// top-level `import`/`export` declaration is rejected.
///
/// # Example
/// ```
/// use parsers::parse_javascript;
/// let program = parse_javascript("fetch('/api/items');", false).unwrap();
/// assert_eq!(program.body.len(), 1);
/// assert!(parse_javascript("import x from 'y';", true).is_err());
/// ```
pub fn parse_javascript(source: &str, force_script: bool) -> Result<Program, ParseError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(tree_sitter_javascript::language())
        .map_err(|e| ParseError::new(1, 1, format!("failed to load javascript grammar: {e}")))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParseError::new(1, 1, "parser produced no tree"))?;
    let root = tree.root_node();

    if root.has_error() || root.is_error() {
        let bad = first_error(root).unwrap_or(root);
        let pos = bad.start_position();
        let message = if bad.is_missing() {
            format!("missing `{}`", bad.kind())
        } else {
            let text = source.get(bad.start_byte()..bad.end_byte()).unwrap_or("");
            let token: String = text.chars().take(24).collect();
            format!("unexpected token `{}`", token.trim())
        };
        debug!(line = pos.row + 1, column = pos.column + 1, "Source contains parse errors");
        return Err(ParseError::new(pos.row + 1, pos.column + 1, message));
    }

    if force_script {
        for child in named(root) {
            if matches!(child.kind(), "import_statement" | "export_statement") {
                let pos = child.start_position();
                return Err(ParseError::new(
                    pos.row + 1,
                    pos.column + 1,
                    "import/export declarations are not allowed in a script",
                ));
            }
        }
    }

    let mut lw = Lowerer {
        src: source,
        functions: Vec::new(),
        classes: Vec::new(),
        fn_stack: Vec::new(),
        depth: 0,
    };
    let body = lw.stmts(root);
    let span = lw.span(root);
    debug!(
        statements = body.len(),
        functions = lw.functions.len(),
        classes = lw.classes.len(),
        "Lowered javascript source"
    );
    Ok(Program {
        body,
        functions: lw.functions,
        classes: lw.classes,
        span,
    })
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Named children minus comments.
fn named(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect();
    children
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

struct Lowerer<'s> {
    src: &'s str,
    functions: Vec<Function>,
    classes: Vec<Class>,
    fn_stack: Vec<FnId>,
    depth: usize,
}

impl<'s> Lowerer<'s> {
    fn text(&self, n: Node) -> &'s str {
        self.src.get(n.start_byte()..n.end_byte()).unwrap_or("")
    }

    fn span(&self, n: Node) -> Span {
        let p = n.start_position();
        Span {
            start: n.start_byte(),
            end: n.end_byte(),
            line: p.row + 1,
            column: p.column + 1,
        }
    }

    fn stmts(&mut self, n: Node) -> Vec<Stmt> {
        named(n)
            .into_iter()
            .filter(|c| c.kind() != "hash_bang_line")
            .map(|c| self.stmt(c))
            .collect()
    }

    fn stmt(&mut self, n: Node) -> Stmt {
        let span = self.span(n);
        if self.depth >= MAX_NESTING {
            return Stmt {
                kind: StmtKind::Unsupported(n.kind().to_string()),
                span,
            };
        }
        self.depth += 1;
        let kind = self.stmt_kind(n);
        self.depth -= 1;
        Stmt { kind, span }
    }

    fn boxed_stmt(&mut self, n: Option<Node>) -> Box<Stmt> {
        match n {
            Some(n) => Box::new(self.stmt(n)),
            None => Box::new(Stmt {
                kind: StmtKind::Empty,
                span: Span::default(),
            }),
        }
    }

    fn stmt_kind(&mut self, n: Node) -> StmtKind {
        match n.kind() {
            "expression_statement" => match named(n).first() {
                Some(e) => StmtKind::Expr(self.expr(*e)),
                None => StmtKind::Empty,
            },
            "variable_declaration" => StmtKind::Var(self.var_decl(n, VarKind::Var)),
            "lexical_declaration" => {
                let kind = if has_token(n, "const") {
                    VarKind::Const
                } else {
                    VarKind::Let
                };
                StmtKind::Var(self.var_decl(n, kind))
            }
            "function_declaration" | "generator_function_declaration" => {
                StmtKind::Function(self.function(n, false))
            }
            "class_declaration" => StmtKind::Class(self.class(n)),
            "statement_block" => StmtKind::Block(self.stmts(n)),
            "if_statement" => {
                let test = self.field_expr(n, "condition");
                let cons = self.boxed_stmt(n.child_by_field_name("consequence"));
                let alt = n.child_by_field_name("alternative").map(|alt| {
                    let inner = if alt.kind() == "else_clause" {
                        named(alt).first().copied()
                    } else {
                        Some(alt)
                    };
                    self.boxed_stmt(inner)
                });
                StmtKind::If { test, cons, alt }
            }
            "switch_statement" => {
                let disc = self.field_expr(n, "value");
                let mut cases = Vec::new();
                if let Some(body) = n.child_by_field_name("body") {
                    for case in named(body) {
                        let value = case.child_by_field_name("value");
                        let test = match (case.kind(), value) {
                            ("switch_case", Some(v)) => Some(self.expr(v)),
                            _ => None,
                        };
                        let value_id = value.map(|v| v.id());
                        let body = named(case)
                            .into_iter()
                            .filter(|c| Some(c.id()) != value_id)
                            .map(|c| self.stmt(c))
                            .collect();
                        cases.push(SwitchCase {
                            test,
                            body,
                            span: self.span(case),
                        });
                    }
                }
                StmtKind::Switch { disc, cases }
            }
            "for_statement" => {
                let init = n.child_by_field_name("initializer").and_then(|i| match i.kind() {
                    "empty_statement" => None,
                    _ => Some(Box::new(self.stmt(i))),
                });
                let test = n
                    .child_by_field_name("condition")
                    .and_then(|c| self.statement_expr(c));
                let update = n.child_by_field_name("increment").map(|u| self.expr(u));
                let body = self.boxed_stmt(n.child_by_field_name("body"));
                StmtKind::For {
                    init,
                    test,
                    update,
                    body,
                }
            }
            "for_in_statement" => {
                let decl = if has_token(n, "var") {
                    Some(VarKind::Var)
                } else if has_token(n, "let") {
                    Some(VarKind::Let)
                } else if has_token(n, "const") {
                    Some(VarKind::Const)
                } else {
                    None
                };
                let left_pat = match n.child_by_field_name("left") {
                    Some(l) => self.pat(l),
                    None => Pat::Unsupported {
                        kind: "for_in_statement".into(),
                        span: self.span(n),
                    },
                };
                let left = match decl {
                    Some(k) => ForHead::Decl(k, left_pat),
                    None => ForHead::Pat(left_pat),
                };
                let right = self.field_expr(n, "right");
                let body = self.boxed_stmt(n.child_by_field_name("body"));
                StmtKind::ForIn {
                    left,
                    right,
                    body,
                    of: has_token(n, "of"),
                }
            }
            "while_statement" => StmtKind::While {
                test: self.field_expr(n, "condition"),
                body: self.boxed_stmt(n.child_by_field_name("body")),
            },
            "do_statement" => StmtKind::DoWhile {
                body: self.boxed_stmt(n.child_by_field_name("body")),
                test: self.field_expr(n, "condition"),
            },
            "try_statement" => {
                let block = n
                    .child_by_field_name("body")
                    .map(|b| self.stmts(b))
                    .unwrap_or_default();
                let mut param = None;
                let mut handler = None;
                if let Some(h) = n.child_by_field_name("handler") {
                    param = h.child_by_field_name("parameter").map(|p| self.pat(p));
                    handler = Some(
                        h.child_by_field_name("body")
                            .map(|b| self.stmts(b))
                            .unwrap_or_default(),
                    );
                }
                let finalizer = n.child_by_field_name("finalizer").map(|f| {
                    f.child_by_field_name("body")
                        .map(|b| self.stmts(b))
                        .unwrap_or_default()
                });
                StmtKind::Try {
                    block,
                    param,
                    handler,
                    finalizer,
                }
            }
            "throw_statement" => match named(n).first() {
                Some(e) => StmtKind::Throw(self.expr(*e)),
                None => StmtKind::Empty,
            },
            "return_statement" => StmtKind::Return(named(n).first().map(|e| self.expr(*e))),
            "break_statement" => StmtKind::Break(self.label(n)),
            "continue_statement" => StmtKind::Continue(self.label(n)),
            "labeled_statement" => {
                let label = self.label(n).unwrap_or_default();
                let body = n
                    .child_by_field_name("body")
                    .or_else(|| named(n).last().copied());
                StmtKind::Labeled {
                    label,
                    body: self.boxed_stmt(body),
                }
            }
            "import_statement" => StmtKind::Import(self.import(n)),
            "export_statement" => {
                if let Some(decl) = n.child_by_field_name("declaration") {
                    self.stmt_kind(decl)
                } else if let Some(value) = n.child_by_field_name("value") {
                    StmtKind::Expr(self.expr(value))
                } else {
                    StmtKind::Empty
                }
            }
            "empty_statement" | "debugger_statement" => StmtKind::Empty,
            other => StmtKind::Unsupported(other.to_string()),
        }
    }

    fn label(&self, n: Node) -> Option<String> {
        n.child_by_field_name("label")
            .map(|l| self.text(l).to_string())
    }

    /// `for (;cond;)` conditions are wrapped in an expression statement.
    fn statement_expr(&mut self, n: Node) -> Option<Expr> {
        match n.kind() {
            "empty_statement" => None,
            "expression_statement" => named(n).first().map(|e| self.expr(*e)),
            _ => Some(self.expr(n)),
        }
    }

    fn var_decl(&mut self, n: Node, kind: VarKind) -> VarDecl {
        let mut decls = Vec::new();
        for d in named(n) {
            if d.kind() != "variable_declarator" {
                continue;
            }
            let target = match d.child_by_field_name("name") {
                Some(name) => self.pat(name),
                None => Pat::Unsupported {
                    kind: "variable_declarator".into(),
                    span: self.span(d),
                },
            };
            let init = d.child_by_field_name("value").map(|v| self.expr(v));
            decls.push(VarDeclarator {
                target,
                init,
                span: self.span(d),
            });
        }
        VarDecl { kind, decls }
    }

    fn import(&mut self, n: Node) -> ImportDecl {
        let source = n
            .child_by_field_name("source")
            .map(|s| string_value(self.text(s)))
            .unwrap_or_default();
        let mut bindings = Vec::new();
        for clause in named(n).into_iter().filter(|c| c.kind() == "import_clause") {
            for part in named(clause) {
                match part.kind() {
                    "identifier" => bindings.push(ImportBinding {
                        local: self.text(part).to_string(),
                        imported: None,
                        span: self.span(part),
                    }),
                    "namespace_import" => {
                        if let Some(id) = named(part).first() {
                            bindings.push(ImportBinding {
                                local: self.text(*id).to_string(),
                                imported: None,
                                span: self.span(*id),
                            });
                        }
                    }
                    "named_imports" => {
                        for spec in named(part) {
                            let Some(name) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let local = spec.child_by_field_name("alias").unwrap_or(name);
                            bindings.push(ImportBinding {
                                local: self.text(local).to_string(),
                                imported: Some(string_value(self.text(name))),
                                span: self.span(local),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        ImportDecl { source, bindings }
    }

    fn field_expr(&mut self, n: Node, field: &str) -> Expr {
        match n.child_by_field_name(field) {
            Some(c) => self.expr(c),
            None => Expr {
                kind: ExprKind::Unsupported(format!("missing {field}")),
                span: self.span(n),
            },
        }
    }

    fn boxed(&mut self, n: Node, field: &str) -> Box<Expr> {
        Box::new(self.field_expr(n, field))
    }

    fn expr(&mut self, n: Node) -> Expr {
        if n.kind() == "parenthesized_expression" {
            if let Some(inner) = named(n).first() {
                return self.expr(*inner);
            }
        }
        let span = self.span(n);
        if self.depth >= MAX_NESTING {
            return Expr {
                kind: ExprKind::Unsupported(n.kind().to_string()),
                span,
            };
        }
        self.depth += 1;
        let kind = self.expr_kind(n);
        self.depth -= 1;
        Expr { kind, span }
    }

    fn expr_kind(&mut self, n: Node) -> ExprKind {
        match n.kind() {
            "identifier" | "property_identifier" | "shorthand_property_identifier"
            | "statement_identifier" | "undefined" => ExprKind::Ident(self.text(n).to_string()),
            "this" => ExprKind::This,
            "super" => ExprKind::Super,
            "string" => ExprKind::Str(string_value(self.text(n))),
            "template_string" => {
                let (quasis, exprs) = self.template(n);
                ExprKind::Template { quasis, exprs }
            }
            "number" => ExprKind::Num(parse_number(self.text(n))),
            "true" => ExprKind::Bool(true),
            "false" => ExprKind::Bool(false),
            "null" => ExprKind::Null,
            "regex" => ExprKind::Regex {
                pattern: n
                    .child_by_field_name("pattern")
                    .map(|p| self.text(p).to_string())
                    .unwrap_or_default(),
                flags: n
                    .child_by_field_name("flags")
                    .map(|f| self.text(f).to_string())
                    .unwrap_or_default(),
            },
            "array" => ExprKind::Array(named(n).into_iter().map(|c| self.expr(c)).collect()),
            "object" => ExprKind::Object(self.props(n)),
            "function" | "function_expression" | "generator_function" => {
                ExprKind::Function(self.function(n, false))
            }
            "arrow_function" => ExprKind::Function(self.function(n, true)),
            "class" => ExprKind::Class(self.class(n)),
            "call_expression" => {
                let func = n.child_by_field_name("function");
                let args = n.child_by_field_name("arguments");
                if func.map(|f| f.kind()) == Some("import") {
                    let spec = match args.and_then(|a| named(a).first().copied()) {
                        Some(a) => self.expr(a),
                        None => Expr {
                            kind: ExprKind::Unsupported("import".into()),
                            span: self.span(n),
                        },
                    };
                    return ExprKind::Import(Box::new(spec));
                }
                let callee = self.boxed(n, "function");
                match args {
                    Some(a) if a.kind() == "template_string" => {
                        let (quasis, exprs) = self.template(a);
                        ExprKind::TaggedTemplate {
                            tag: callee,
                            quasis,
                            exprs,
                        }
                    }
                    _ => ExprKind::Call {
                        callee,
                        args: args.map(|a| self.args(a)).unwrap_or_default(),
                        optional: is_optional(n),
                    },
                }
            }
            "new_expression" => {
                let callee = self.boxed(n, "constructor");
                let args = n
                    .child_by_field_name("arguments")
                    .map(|a| self.args(a))
                    .unwrap_or_default();
                ExprKind::New { callee, args }
            }
            "member_expression" => {
                let object = self.boxed(n, "object");
                let prop = match n.child_by_field_name("property") {
                    Some(p) if p.kind() == "private_property_identifier" => {
                        MemberProp::Private(self.text(p).to_string())
                    }
                    Some(p) => MemberProp::Ident(self.text(p).to_string()),
                    None => MemberProp::Ident(String::new()),
                };
                ExprKind::Member {
                    object,
                    prop,
                    optional: is_optional(n),
                }
            }
            "subscript_expression" => ExprKind::Member {
                object: self.boxed(n, "object"),
                prop: MemberProp::Computed(self.boxed(n, "index")),
                optional: is_optional(n),
            },
            "assignment_expression" | "augmented_assignment_expression" => {
                let op = if n.kind() == "assignment_expression" {
                    "=".to_string()
                } else {
                    self.operator(n)
                };
                let target = match n.child_by_field_name("left") {
                    Some(l) => self.pat(l),
                    None => Pat::Unsupported {
                        kind: n.kind().to_string(),
                        span: self.span(n),
                    },
                };
                ExprKind::Assign {
                    op,
                    target: Box::new(target),
                    value: self.boxed(n, "right"),
                }
            }
            "binary_expression" => {
                let op = self.operator(n);
                let left = self.boxed(n, "left");
                let right = self.boxed(n, "right");
                let logical = match op.as_str() {
                    "||" => Some(LogicalOp::Or),
                    "&&" => Some(LogicalOp::And),
                    "??" => Some(LogicalOp::Nullish),
                    _ => None,
                };
                match logical {
                    Some(op) => ExprKind::Logical { op, left, right },
                    None => ExprKind::Binary { op, left, right },
                }
            }
            "unary_expression" => ExprKind::Unary {
                op: self.operator(n),
                arg: self.boxed(n, "argument"),
            },
            "update_expression" => {
                let prefix = match (
                    n.child_by_field_name("operator"),
                    n.child_by_field_name("argument"),
                ) {
                    (Some(o), Some(a)) => o.start_byte() < a.start_byte(),
                    _ => false,
                };
                ExprKind::Update {
                    op: self.operator(n),
                    prefix,
                    arg: self.boxed(n, "argument"),
                }
            }
            "ternary_expression" => ExprKind::Cond {
                test: self.boxed(n, "condition"),
                cons: self.boxed(n, "consequence"),
                alt: self.boxed(n, "alternative"),
            },
            "sequence_expression" => {
                let mut parts = Vec::new();
                self.flatten_sequence(n, &mut parts);
                ExprKind::Seq(parts)
            }
            "await_expression" => match named(n).first() {
                Some(e) => ExprKind::Await(Box::new(self.expr(*e))),
                None => ExprKind::Unsupported("await_expression".into()),
            },
            "yield_expression" => {
                ExprKind::Yield(named(n).first().map(|e| Box::new(self.expr(*e))))
            }
            "spread_element" => match named(n).first() {
                Some(e) => ExprKind::Spread(Box::new(self.expr(*e))),
                None => ExprKind::Unsupported("spread_element".into()),
            },
            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                ExprKind::Jsx(Box::new(self.jsx(n)))
            }
            other => ExprKind::Unsupported(other.to_string()),
        }
    }

    fn operator(&self, n: Node) -> String {
        if let Some(op) = n.child_by_field_name("operator") {
            return self.text(op).to_string();
        }
        let mut cursor = n.walk();
        let op = n
            .children(&mut cursor)
            .find(|c| !c.is_named() && !matches!(c.kind(), "(" | ")"))
            .map(|c| self.text(c).to_string())
            .unwrap_or_default();
        op
    }

    fn flatten_sequence(&mut self, n: Node, out: &mut Vec<Expr>) {
        for c in named(n) {
            if c.kind() == "sequence_expression" {
                self.flatten_sequence(c, out);
            } else {
                out.push(self.expr(c));
            }
        }
    }

    fn args(&mut self, n: Node) -> Vec<Expr> {
        named(n).into_iter().map(|c| self.expr(c)).collect()
    }

    fn template(&mut self, n: Node) -> (Vec<String>, Vec<Expr>) {
        let inner_end = n.end_byte().saturating_sub(1);
        let mut pos = n.start_byte() + 1;
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        for sub in named(n) {
            if sub.kind() != "template_substitution" {
                continue;
            }
            let raw = self.src.get(pos..sub.start_byte()).unwrap_or("");
            quasis.push(unescape(raw));
            exprs.push(match named(sub).first() {
                Some(e) => self.expr(*e),
                None => Expr {
                    kind: ExprKind::Unsupported("template_substitution".into()),
                    span: self.span(sub),
                },
            });
            pos = sub.end_byte();
        }
        let raw = self.src.get(pos..inner_end.max(pos)).unwrap_or("");
        quasis.push(unescape(raw));
        (quasis, exprs)
    }

    fn props(&mut self, n: Node) -> Vec<Prop> {
        let mut props = Vec::new();
        for p in named(n) {
            match p.kind() {
                "pair" => {
                    let key = self.prop_key(p.child_by_field_name("key"));
                    let value = self.field_expr(p, "value");
                    props.push(Prop::KeyValue { key, value });
                }
                "shorthand_property_identifier" => props.push(Prop::Shorthand {
                    name: self.text(p).to_string(),
                    span: self.span(p),
                }),
                "method_definition" => {
                    let key = self.prop_key(p.child_by_field_name("name"));
                    let accessor = has_token(p, "get") || has_token(p, "set");
                    let func = self.function(p, false);
                    props.push(if accessor {
                        Prop::Accessor { key, func }
                    } else {
                        Prop::Method { key, func }
                    });
                }
                "spread_element" => {
                    if let Some(e) = named(p).first() {
                        let value = self.expr(*e);
                        props.push(Prop::Spread(value));
                    }
                }
                _ => {}
            }
        }
        props
    }

    fn prop_key(&mut self, n: Option<Node>) -> PropKey {
        let Some(n) = n else {
            return PropKey::Str(String::new());
        };
        match n.kind() {
            "property_identifier" | "identifier" | "private_property_identifier" => {
                PropKey::Ident(self.text(n).to_string())
            }
            "string" => PropKey::Str(string_value(self.text(n))),
            "number" => PropKey::Num(parse_number(self.text(n))),
            "computed_property_name" => match named(n).first() {
                Some(e) => PropKey::Computed(Box::new(self.expr(*e))),
                None => PropKey::Str(String::new()),
            },
            _ => PropKey::Str(self.text(n).to_string()),
        }
    }

    fn pat(&mut self, n: Node) -> Pat {
        let span = self.span(n);
        if self.depth >= MAX_NESTING {
            return Pat::Unsupported {
                kind: n.kind().to_string(),
                span,
            };
        }
        self.depth += 1;
        let pat = self.pat_inner(n, span);
        self.depth -= 1;
        pat
    }

    fn pat_inner(&mut self, n: Node, span: Span) -> Pat {
        match n.kind() {
            "identifier" | "shorthand_property_identifier_pattern" | "undefined" => Pat::Ident {
                name: self.text(n).to_string(),
                span,
            },
            "object_pattern" => {
                let mut props = Vec::new();
                for p in named(n) {
                    match p.kind() {
                        "pair_pattern" => {
                            let key = self.prop_key(p.child_by_field_name("key"));
                            let value = match p.child_by_field_name("value") {
                                Some(v) => self.pat(v),
                                None => Pat::Unsupported {
                                    kind: "pair_pattern".into(),
                                    span: self.span(p),
                                },
                            };
                            props.push(ObjectPatProp::KeyValue { key, value });
                        }
                        "shorthand_property_identifier_pattern" => {
                            let name = self.text(p).to_string();
                            props.push(ObjectPatProp::KeyValue {
                                key: PropKey::Ident(name.clone()),
                                value: Pat::Ident {
                                    name,
                                    span: self.span(p),
                                },
                            });
                        }
                        "object_assignment_pattern" => {
                            let (Some(left), Some(right)) =
                                (p.child_by_field_name("left"), p.child_by_field_name("right"))
                            else {
                                continue;
                            };
                            let key = PropKey::Ident(self.text(left).to_string());
                            let target = self.pat(left);
                            let default = self.expr(right);
                            props.push(ObjectPatProp::KeyValue {
                                key,
                                value: Pat::Assign {
                                    target: Box::new(target),
                                    default: Box::new(default),
                                    span: self.span(p),
                                },
                            });
                        }
                        "rest_pattern" => {
                            if let Some(inner) = named(p).first() {
                                let inner = self.pat(*inner);
                                props.push(ObjectPatProp::Rest(inner));
                            }
                        }
                        _ => {}
                    }
                }
                Pat::Object { props, span }
            }
            "array_pattern" => {
                let mut elems: Vec<Option<Pat>> = Vec::new();
                let mut slot = 0usize;
                let mut cursor = n.walk();
                let children: Vec<Node> = n.children(&mut cursor).collect();
                for c in children {
                    if c.kind() == "," {
                        slot += 1;
                    } else if c.is_named() && c.kind() != "comment" {
                        while elems.len() < slot {
                            elems.push(None);
                        }
                        elems.push(Some(self.pat(c)));
                    }
                }
                Pat::Array { elems, span }
            }
            "assignment_pattern" => {
                let target = match n.child_by_field_name("left") {
                    Some(l) => self.pat(l),
                    None => Pat::Unsupported {
                        kind: "assignment_pattern".into(),
                        span,
                    },
                };
                Pat::Assign {
                    target: Box::new(target),
                    default: self.boxed(n, "right"),
                    span,
                }
            }
            "rest_pattern" => match named(n).first() {
                Some(inner) => Pat::Rest {
                    arg: Box::new(self.pat(*inner)),
                    span,
                },
                None => Pat::Unsupported {
                    kind: "rest_pattern".into(),
                    span,
                },
            },
            "parenthesized_expression" => match named(n).first() {
                Some(inner) => self.pat(*inner),
                None => Pat::Unsupported {
                    kind: "parenthesized_expression".into(),
                    span,
                },
            },
            "member_expression" | "subscript_expression" => Pat::Expr(Box::new(self.expr(n))),
            other => Pat::Unsupported {
                kind: other.to_string(),
                span,
            },
        }
    }

    fn function(&mut self, n: Node, is_arrow: bool) -> FnId {
        let id = self.functions.len();
        let parent = self.fn_stack.last().copied();
        let name = n
            .child_by_field_name("name")
            .map(|c| self.text(c).to_string());
        self.functions.push(Function {
            id,
            name,
            params: Vec::new(),
            body: FnBody::Block(Vec::new()),
            is_arrow,
            is_async: has_token(n, "async"),
            parent,
            span: self.span(n),
        });
        self.fn_stack.push(id);
        let params = if let Some(p) = n.child_by_field_name("parameters") {
            named(p).into_iter().map(|c| self.pat(c)).collect()
        } else if let Some(p) = n.child_by_field_name("parameter") {
            vec![self.pat(p)]
        } else {
            Vec::new()
        };
        let body = match n.child_by_field_name("body") {
            Some(b) if b.kind() == "statement_block" => FnBody::Block(self.stmts(b)),
            Some(b) => FnBody::Expr(Box::new(self.expr(b))),
            None => FnBody::Block(Vec::new()),
        };
        self.fn_stack.pop();
        if let Some(f) = self.functions.get_mut(id) {
            f.params = params;
            f.body = body;
        }
        id
    }

    fn class(&mut self, n: Node) -> ClassId {
        let id = self.classes.len();
        let name = n
            .child_by_field_name("name")
            .map(|c| self.text(c).to_string());
        self.classes.push(Class {
            id,
            name,
            super_class: None,
            constructor: None,
            members: Vec::new(),
            span: self.span(n),
        });
        let super_class = named(n)
            .into_iter()
            .find(|c| c.kind() == "class_heritage")
            .and_then(|h| named(h).first().copied())
            .map(|e| Box::new(self.expr(e)));
        let mut constructor = None;
        let mut members = Vec::new();
        if let Some(body) = n.child_by_field_name("body") {
            for m in named(body) {
                let is_static = has_token(m, "static");
                match m.kind() {
                    "method_definition" => {
                        let name_node = m.child_by_field_name("name");
                        let is_ctor = !is_static
                            && name_node.map(|c| self.text(c)) == Some("constructor");
                        let key = self.prop_key(name_node);
                        let getter = has_token(m, "get");
                        let setter = has_token(m, "set");
                        let func = self.function(m, false);
                        if is_ctor {
                            constructor = Some(func);
                            continue;
                        }
                        let kind = if getter {
                            MemberKind::Getter(func)
                        } else if setter {
                            MemberKind::Setter(func)
                        } else {
                            MemberKind::Method(func)
                        };
                        members.push(ClassMember {
                            key,
                            is_static,
                            kind,
                        });
                    }
                    "field_definition" | "public_field_definition" => {
                        let key = self.prop_key(m.child_by_field_name("property"));
                        let value = m.child_by_field_name("value").map(|v| self.expr(v));
                        members.push(ClassMember {
                            key,
                            is_static,
                            kind: MemberKind::Field(value),
                        });
                    }
                    _ => {}
                }
            }
        }
        if let Some(c) = self.classes.get_mut(id) {
            c.super_class = super_class;
            c.constructor = constructor;
            c.members = members;
        }
        id
    }

    fn jsx(&mut self, n: Node) -> JsxElement {
        let open = match n.kind() {
            "jsx_element" => n
                .child_by_field_name("open_tag")
                .or_else(|| named(n).first().copied()),
            "jsx_self_closing_element" => Some(n),
            _ => None,
        };
        let name = open
            .and_then(|o| o.child_by_field_name("name"))
            .map(|c| self.text(c).to_string())
            .unwrap_or_default();
        let mut attrs = Vec::new();
        if let Some(open) = open {
            for a in named(open) {
                if a.kind() != "jsx_attribute" {
                    continue;
                }
                let parts = named(a);
                let Some(attr_name) = parts.first() else {
                    continue;
                };
                let value = parts.get(1).map(|v| self.jsx_value(*v));
                attrs.push(JsxAttr {
                    name: self.text(*attr_name).to_string(),
                    value,
                    span: self.span(a),
                });
            }
        }
        let mut children = Vec::new();
        if n.kind() != "jsx_self_closing_element" {
            for c in named(n) {
                match c.kind() {
                    "jsx_expression" => {
                        if let Some(e) = named(c).first() {
                            children.push(self.expr(*e));
                        }
                    }
                    "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                        children.push(self.expr(c))
                    }
                    _ => {}
                }
            }
        }
        JsxElement {
            name,
            attrs,
            children,
        }
    }

    fn jsx_value(&mut self, v: Node) -> Expr {
        match v.kind() {
            "jsx_expression" => match named(v).first() {
                Some(e) => self.expr(*e),
                None => Expr {
                    kind: ExprKind::Unsupported("jsx_expression".into()),
                    span: self.span(v),
                },
            },
            _ => self.expr(v),
        }
    }
}

fn is_optional(n: Node) -> bool {
    let mut cursor = n.walk();
    let found = n
        .children(&mut cursor)
        .any(|c| c.kind() == "optional_chain" || c.kind() == "?.");
    found
}

/// Contents of a quoted string literal with escapes resolved.
fn string_value(raw: &str) -> String {
    let inner = if raw.len() >= 2
        && (raw.starts_with('"') || raw.starts_with('\''))
        && raw.ends_with(raw.chars().next().unwrap_or('"'))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    unescape(inner)
}

pub(crate) fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            break;
        };
        match e {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('x');
                        out.push_str(&hex);
                    }
                }
            }
            'u' => {
                let code = read_unicode(&mut chars);
                match code {
                    Some(hi @ 0xD800..=0xDBFF) => {
                        let mut look = chars.clone();
                        let lo = if look.next() == Some('\\') && look.next() == Some('u') {
                            read_unicode(&mut look).filter(|lo| (0xDC00..=0xDFFF).contains(lo))
                        } else {
                            None
                        };
                        match lo {
                            Some(lo) => {
                                chars = look;
                                let cp = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                                out.push(char::from_u32(cp).unwrap_or('\u{FFFD}'));
                            }
                            None => out.push('\u{FFFD}'),
                        }
                    }
                    Some(cp) => out.push(char::from_u32(cp).unwrap_or('\u{FFFD}')),
                    None => out.push('u'),
                }
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }
    out
}

fn read_unicode(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<u32> {
    if chars.peek() == Some(&'{') {
        chars.next();
        let mut hex = String::new();
        for c in chars.by_ref() {
            if c == '}' {
                break;
            }
            hex.push(c);
        }
        u32::from_str_radix(&hex, 16).ok()
    } else {
        let hex: String = chars.by_ref().take(4).collect();
        if hex.len() == 4 {
            u32::from_str_radix(&hex, 16).ok()
        } else {
            None
        }
    }
}

fn parse_number(text: &str) -> f64 {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let cleaned = cleaned.strip_suffix('n').unwrap_or(&cleaned);
    let lower = cleaned.to_ascii_lowercase();
    let radix = |digits: &str, r: u32| {
        u64::from_str_radix(digits, r)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN)
    };
    if let Some(h) = lower.strip_prefix("0x") {
        radix(h, 16)
    } else if let Some(o) = lower.strip_prefix("0o") {
        radix(o, 8)
    } else if let Some(b) = lower.strip_prefix("0b") {
        radix(b, 2)
    } else if lower.len() > 1
        && lower.starts_with('0')
        && lower.chars().all(|c| ('0'..='7').contains(&c))
    {
        radix(&lower[1..], 8)
    } else {
        lower.parse::<f64>().unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_handles_common_escapes() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"\x41B\u{43}"), "ABC");
        assert_eq!(unescape(r"\uD83D\uDE00"), "\u{1F600}");
        assert_eq!(unescape(r"\'q\'"), "'q'");
        assert_eq!(unescape("line\\\ncont"), "linecont");
    }

    #[test]
    fn numbers_cover_radix_and_separators() {
        assert_eq!(parse_number("0x1F"), 31.0);
        assert_eq!(parse_number("0b101"), 5.0);
        assert_eq!(parse_number("1_000"), 1000.0);
        assert_eq!(parse_number("10n"), 10.0);
        assert_eq!(parse_number("1e3"), 1000.0);
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_number("0"), 0.0);
    }

    #[test]
    fn string_value_strips_quotes() {
        assert_eq!(string_value("'abc'"), "abc");
        assert_eq!(string_value("\"a\\\"b\""), "a\"b");
    }
}
