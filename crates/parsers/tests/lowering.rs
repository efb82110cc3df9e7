use ir::{ExprKind, FnBody, ForHead, MemberKind, ObjectPatProp, Pat, Prop, StmtKind, VarKind};
use parsers::{parse_file, parse_javascript, ParserMetrics};
use std::fs;
use tempfile::tempdir;

fn first_expr(src: &str) -> ExprKind {
    let program = parse_javascript(src, false).unwrap();
    match &program.body[0].kind {
        StmtKind::Expr(e) => e.kind.clone(),
        other => panic!("expected expression statement, got {other:?}"),
    }
}

#[test]
fn functions_are_stored_in_arena_with_parents() {
    let src = "function outer(a, b = 2) { return function inner() { return () => a; }; }";
    let program = parse_javascript(src, false).unwrap();
    assert_eq!(program.functions.len(), 3);
    let outer = &program.functions[0];
    assert_eq!(outer.name.as_deref(), Some("outer"));
    assert_eq!(outer.params.len(), 2);
    assert!(matches!(outer.params[1], Pat::Assign { .. }));
    assert_eq!(program.functions[1].parent, Some(0));
    assert_eq!(program.functions[2].parent, Some(1));
    assert!(program.functions[2].is_arrow);
    assert!(matches!(program.functions[2].body, FnBody::Expr(_)));
}

#[test]
fn template_literals_split_into_quasis_and_expressions() {
    match first_expr("`/api/${svc}/items?x=${n}`;") {
        ExprKind::Template { quasis, exprs } => {
            assert_eq!(quasis, vec!["/api/", "/items?x=", ""]);
            assert_eq!(exprs.len(), 2);
            assert_eq!(exprs[0].as_ident(), Some("svc"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn logical_operators_are_separate_from_binary() {
    match first_expr("a || 'x';") {
        ExprKind::Logical { .. } => {}
        other => panic!("unexpected {other:?}"),
    }
    match first_expr("a + 'x';") {
        ExprKind::Binary { op, .. } => assert_eq!(op, "+"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn sequence_expressions_are_flattened() {
    match first_expr("(a, b, c, d);") {
        ExprKind::Seq(parts) => assert_eq!(parts.len(), 4),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn destructuring_keeps_keys_defaults_and_holes() {
    let src = "const { hash: h, search = '?', ...rest } = location; let [, second] = list;";
    let program = parse_javascript(src, false).unwrap();
    let StmtKind::Var(decl) = &program.body[0].kind else {
        panic!("expected declaration");
    };
    assert_eq!(decl.kind, VarKind::Const);
    let Pat::Object { props, .. } = &decl.decls[0].target else {
        panic!("expected object pattern");
    };
    assert_eq!(props.len(), 3);
    assert!(matches!(&props[1], ObjectPatProp::KeyValue { value: Pat::Assign { .. }, .. }));
    assert!(matches!(&props[2], ObjectPatProp::Rest(_)));

    let StmtKind::Var(decl) = &program.body[1].kind else {
        panic!("expected declaration");
    };
    let Pat::Array { elems, .. } = &decl.decls[0].target else {
        panic!("expected array pattern");
    };
    assert!(elems[0].is_none());
    assert_eq!(elems[1].as_ref().and_then(|p| p.as_ident()), Some("second"));
}

#[test]
fn classes_record_constructor_and_members() {
    let src = "class Api extends Base { constructor(u) { super(); this.u = u; } static make() {} get url() { return this.u; } timeout = 5; }";
    let program = parse_javascript(src, false).unwrap();
    let class = &program.classes[0];
    assert_eq!(class.name.as_deref(), Some("Api"));
    assert!(class.super_class.is_some());
    assert!(class.constructor.is_some());
    assert_eq!(class.members.len(), 3);
    assert!(class.members[0].is_static);
    assert!(matches!(class.members[1].kind, MemberKind::Getter(_)));
    assert!(matches!(class.members[2].kind, MemberKind::Field(Some(_))));
}

#[test]
fn object_literals_keep_methods_and_spreads() {
    match first_expr("({ a: 1, b, c() {}, ...d, ['e']: 2 });") {
        ExprKind::Object(props) => {
            assert_eq!(props.len(), 5);
            assert!(matches!(props[1], Prop::Shorthand { .. }));
            assert!(matches!(props[2], Prop::Method { .. }));
            assert!(matches!(props[3], Prop::Spread(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn for_of_records_declaration_kind() {
    let program = parse_javascript("for (const u of urls) fetch(u);", false).unwrap();
    match &program.body[0].kind {
        StmtKind::ForIn { left, of, .. } => {
            assert!(*of);
            assert!(matches!(left, ForHead::Decl(VarKind::Const, _)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn jsx_attributes_are_lowered() {
    let src = "const el = <div dangerouslySetInnerHTML={{ __html: html }} />;";
    let program = parse_javascript(src, false).unwrap();
    let StmtKind::Var(decl) = &program.body[0].kind else {
        panic!("expected declaration");
    };
    match &decl.decls[0].init.as_ref().unwrap().kind {
        ExprKind::Jsx(el) => {
            assert_eq!(el.name, "div");
            assert_eq!(el.attrs[0].name, "dangerouslySetInnerHTML");
            assert!(matches!(
                el.attrs[0].value.as_ref().map(|v| &v.kind),
                Some(ExprKind::Object(_))
            ));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn syntax_errors_report_position() {
    let err = parse_javascript("var a = ;\nfoo(", false).unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.column >= 1);
}

#[test]
fn force_script_rejects_module_syntax() {
    assert!(parse_javascript("export const a = 1;", false).is_ok());
    let err = parse_javascript("export const a = 1;", true).unwrap_err();
    assert!(err.message.contains("import/export"));
    assert!(parse_javascript("import('./chunk.js');", true).is_ok());
}

#[test]
fn imports_record_local_bindings() {
    let program = parse_javascript("import api, { get as g } from './api';", false).unwrap();
    match &program.body[0].kind {
        StmtKind::Import(decl) => {
            assert_eq!(decl.source, "./api");
            let locals: Vec<&str> = decl.bindings.iter().map(|b| b.local.as_str()).collect();
            assert_eq!(locals, vec!["api", "g"]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn deep_nesting_degrades_to_unsupported() {
    let depth = 2000;
    let src = format!("x = {}1{};", "[".repeat(depth), "]".repeat(depth));
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(move || parse_javascript(&src, false).map(|p| p.body.len()))
        .unwrap();
    assert_eq!(handle.join().unwrap().unwrap(), 1);
}

#[test]
fn parse_file_counts_metrics() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("ok.js");
    let bad = dir.path().join("bad.js");
    let other = dir.path().join("notes.txt");
    fs::write(&good, "fetch('/a');").unwrap();
    fs::write(&bad, "function (").unwrap();
    fs::write(&other, "hello").unwrap();

    let mut metrics = ParserMetrics::default();
    assert!(parse_file(&good, false, Some(&mut metrics)).unwrap().is_some());
    assert!(parse_file(&bad, false, Some(&mut metrics)).is_err());
    assert!(parse_file(&other, false, Some(&mut metrics)).unwrap().is_none());
    assert_eq!(metrics.files_parsed, 1);
    assert_eq!(metrics.parse_errors, 1);
}
