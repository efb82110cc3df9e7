use engine::{analyze, AnalysisResult, Severity};
use serde_json::json;

fn run(src: &str) -> AnalysisResult {
    analyze(src, "", false).expect("analyze")
}

#[test]
fn taint_survives_a_chain_of_copies() {
    let out = run(
        "var a = location.hash; var b = a; var c = b; var d = c; var e = d; document.body.innerHTML = e;",
    )
    .security_sinks;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, "xss");
    assert_eq!(out[0].sink, "innerHTML");
    assert_eq!(out[0].severity, Severity::High);
    assert_eq!(out[0].source.as_deref(), Some("location.hash"));
    assert!(!out[0].sanitized);
}

#[test]
fn encoded_write_is_downgraded_but_raw_sibling_is_not() {
    let out = run(
        "var x = location.hash;\nvar y = encodeURIComponent(x);\ndocument.body.innerHTML = y;\ndocument.body.innerHTML = x;\n",
    )
    .security_sinks;
    assert_eq!(out.len(), 2);
    assert!(out[0].sanitized);
    assert_eq!(out[0].severity, Severity::Info);
    assert!(!out[1].sanitized);
    assert_eq!(out[1].severity, Severity::High);
}

#[test]
fn switch_labels_become_a_constraint() {
    let src = r#"
        function dispatch(action) {
            switch (action) {
                case "create": return 1;
                case "update": return 2;
                case "delete": return 3;
            }
        }
    "#;
    let constraints = run(src).value_constraints;
    let action = constraints
        .iter()
        .find(|c| c.variable == "action")
        .expect("constraint on action");
    assert_eq!(action.values.len(), 3);
    for label in ["create", "update", "delete"] {
        assert!(action.values.contains(&json!(label)));
    }
}

#[test]
fn message_listener_severity_follows_its_body() {
    let graded = |body: &str| {
        let src = format!("window.addEventListener('message', function (event) {{ {body} }});");
        run(&src)
            .dangerous_patterns
            .into_iter()
            .filter(|p| p.kind == "postmessage-no-origin")
            .map(|p| p.severity)
            .collect::<Vec<_>>()
    };
    assert_eq!(
        graded("document.body.innerHTML = event.data;"),
        vec![Severity::High]
    );
    assert_eq!(graded("console.log(event.data);"), vec![Severity::Medium]);
    assert!(graded(
        "if (event.origin !== 'https://trusted.com') { return; } document.body.innerHTML = event.data;"
    )
    .is_empty());
}

#[test]
fn repeated_runs_serialize_identically() {
    let src = r#"
        var Status = { ACTIVE: 0, BANNED: 1, 0: "ACTIVE", 1: "BANNED" };
        var api = { base: "/v1" };
        function call(path, verb, payload) {
            return fetch(api.base + "/" + path, { method: verb, headers: { "X-App": "web" }, body: JSON.stringify(payload) });
        }
        call("users", "POST", { name: "a", role: "admin", tags: [] });
        call("users/search", "GET");
        switch (mode) { case "a": case "b": case "c": break; }
        document.write(location.search);
        window.addEventListener("message", function (e) { eval(e.data); });
    "#;
    let first = serde_json::to_string(&run(src)).expect("json");
    for _ in 0..5 {
        assert_eq!(serde_json::to_string(&run(src)).expect("json"), first);
    }
}
