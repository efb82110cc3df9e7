use super::*;
use serde_json::Value as JsonValue;

fn span(start: usize, end: usize, line: usize, column: usize) -> Span {
    Span {
        start,
        end,
        line,
        column,
    }
}

fn ident(name: &str) -> Expr {
    Expr {
        kind: ExprKind::Ident(name.into()),
        span: Span::default(),
    }
}

fn member(object: Expr, name: &str) -> Expr {
    Expr {
        kind: ExprKind::Member {
            object: Box::new(object),
            prop: MemberProp::Ident(name.into()),
            optional: false,
        },
        span: Span::default(),
    }
}

#[test]
fn member_path_follows_static_chain() {
    let e = member(member(ident("window"), "location"), "hash");
    assert_eq!(e.member_path().as_deref(), Some("window.location.hash"));
    assert_eq!(e.root_ident(), Some("window"));
    assert_eq!(e.member_name().as_deref(), Some("hash"));
}

#[test]
fn computed_member_with_literal_is_static() {
    let e = Expr {
        kind: ExprKind::Member {
            object: Box::new(ident("a")),
            prop: MemberProp::Computed(Box::new(Expr {
                kind: ExprKind::Num(2.0),
                span: Span::default(),
            })),
            optional: false,
        },
        span: Span::default(),
    };
    assert_eq!(e.member_path().as_deref(), Some("a.2"));
}

#[test]
fn bound_names_walks_nested_patterns() {
    let pat = Pat::Object {
        props: vec![
            ObjectPatProp::KeyValue {
                key: PropKey::Ident("a".into()),
                value: Pat::Ident {
                    name: "a".into(),
                    span: span(1, 2, 1, 2),
                },
            },
            ObjectPatProp::KeyValue {
                key: PropKey::Ident("b".into()),
                value: Pat::Array {
                    elems: vec![
                        None,
                        Some(Pat::Assign {
                            target: Box::new(Pat::Ident {
                                name: "c".into(),
                                span: span(8, 9, 1, 9),
                            }),
                            default: Box::new(ident("d")),
                            span: span(8, 13, 1, 9),
                        }),
                    ],
                    span: span(5, 14, 1, 6),
                },
            },
            ObjectPatProp::Rest(Pat::Ident {
                name: "rest".into(),
                span: span(19, 23, 1, 20),
            }),
        ],
        span: span(0, 25, 1, 1),
    };
    let names: Vec<&str> = pat.bound_names().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["a", "c", "rest"]);
}

#[test]
fn numbers_format_like_javascript() {
    assert_eq!(number_to_string(3.0), "3");
    assert_eq!(number_to_string(1.5), "1.5");
    assert_eq!(number_to_string(-0.0), "0");
    assert_eq!(number_to_string(f64::NAN), "NaN");
    assert_eq!(number_to_string(f64::INFINITY), "Infinity");
}

#[test]
fn span_snippet_is_bounds_checked() {
    let src = "fetch('/a')";
    assert_eq!(span(0, 5, 1, 1).snippet(src), "fetch");
    assert_eq!(span(5, 50, 1, 6).snippet(src), "");
    assert!(span(0, 11, 1, 1).contains(span(6, 10, 1, 7)));
}

#[test]
fn cfg_exports_and_tracks_edges() {
    let mut cfg = CFG::default();
    let entry = cfg.add_node(0, "entry", Span::default());
    let a = cfg.add_node(1, "x = \"a\"", span(0, 7, 1, 1));
    let exit = cfg.add_node(0, "exit", Span::default());
    cfg.entry = entry;
    cfg.exit = exit;
    cfg.add_edge(entry, a);
    cfg.add_edge(a, exit);
    cfg.add_edge(a, exit);
    assert_eq!(cfg.edges.len(), 2);
    assert_eq!(cfg.successors(a).collect::<Vec<_>>(), vec![exit]);
    assert_eq!(cfg.predecessor_table()[a], vec![entry]);

    let dot = cfg.to_dot();
    assert!(dot.starts_with("digraph CFG {"));
    assert!(dot.contains("1 [label=\"1:x = \\\"a\\\"\"];"));
    assert!(cfg.to_mermaid().contains("0 --> 1"));

    let v: JsonValue = serde_json::from_str(&cfg.to_json().unwrap()).unwrap();
    assert_eq!(v["nodes"][1]["span"]["column"], 1);
}
