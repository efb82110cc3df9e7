use engine::{analyze, analyze_with_options, AnalysisOptions, SecuritySink, Severity};

const PAGE: &str = "https://app.example.com/static/main.js";

fn sinks(src: &str) -> Vec<SecuritySink> {
    analyze(src, PAGE, false).expect("analyze").security_sinks
}

#[test]
fn taint_crosses_functions_and_objects() {
    let src = r#"
        function read() { return location.hash.slice(1); }
        function wrap(v) { return { html: "<b>" + v + "</b>" }; }
        var msg = wrap(read());
        document.getElementById("out").innerHTML = msg.html;
    "#;
    let out = sinks(src);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, "xss");
    assert_eq!(out[0].sink, "innerHTML");
    assert_eq!(out[0].severity, Severity::High);
    assert_eq!(out[0].source.as_deref(), Some("location.hash"));
    assert_eq!(out[0].source_type.as_deref(), Some("user-controlled"));
    let loc = out[0].location.expect("location");
    assert_eq!(loc.line, 5);
}

#[test]
fn redirects_and_code_sinks() {
    let src = r#"
        var next = new URLSearchParams(location.search).get("next");
        location.href = next;
        setTimeout(document.referrer, 10);
    "#;
    let out = sinks(src);
    let kinds: Vec<(&str, &str)> = out.iter().map(|s| (s.kind.as_str(), s.sink.as_str())).collect();
    assert!(kinds.contains(&("redirect", "location.href")));
    assert!(kinds.contains(&("eval", "setTimeout")));
}

#[test]
fn shadowed_sources_and_sinks_are_ignored() {
    let src = r#"
        function render(location) { document.body.innerHTML = location.hash; }
        function run(eval) { eval(window.name); }
        function nav(location) { location.href = document.URL; }
    "#;
    assert!(sinks(src).is_empty());
}

#[test]
fn sanitized_flow_is_reported_as_info() {
    let src = r#"
        var q = location.search;
        var safe = DOMPurify.sanitize(q);
        document.body.innerHTML = safe;
    "#;
    let out = sinks(src);
    assert_eq!(out.len(), 1);
    assert!(out[0].sanitized);
    assert_eq!(out[0].severity, Severity::Info);
}

#[test]
fn sanitizing_one_path_is_not_enough() {
    let src = r#"
        var q = location.search;
        if (window.trusted) { q = encodeURIComponent(q); }
        document.write(q);
    "#;
    let out = sinks(src);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].sink, "document.write");
    assert_eq!(out[0].severity, Severity::High);
    assert!(!out[0].sanitized);
}

#[test]
fn literal_values_never_reach_findings() {
    let src = r#"
        document.body.innerHTML = "<p>static</p>";
        eval("1 + 1");
        location.href = "/home";
    "#;
    assert!(sinks(src).is_empty());
}

#[test]
fn message_handlers_are_graded_by_what_they_reach() {
    let risky = analyze(
        "window.addEventListener('message', function (e) { location.href = e.data.url; });",
        PAGE,
        false,
    )
    .expect("analyze");
    assert_eq!(risky.dangerous_patterns.len(), 1);
    assert_eq!(risky.dangerous_patterns[0].kind, "postmessage-no-origin");
    assert_eq!(risky.dangerous_patterns[0].severity, Severity::High);
    assert!(risky.security_sinks.iter().any(|s| s.kind == "redirect"));

    let quiet = analyze(
        "window.addEventListener('message', function (e) { console.log(e.data); });",
        PAGE,
        false,
    )
    .expect("analyze");
    assert_eq!(quiet.dangerous_patterns[0].severity, Severity::Medium);
    assert!(quiet.security_sinks.is_empty());

    let checked = analyze(
        "window.addEventListener('message', function (e) { if (e.origin !== 'https://app.example.com') return; location.href = e.data.url; });",
        PAGE,
        false,
    )
    .expect("analyze");
    assert!(checked.dangerous_patterns.is_empty());
    assert!(checked.security_sinks.is_empty());
}

#[test]
fn findings_are_sorted_by_location() {
    let src = "eval(location.hash);\ndocument.body.innerHTML = location.search;\nlocation.assign(document.referrer);\n";
    let out = sinks(src);
    let lines: Vec<usize> = out
        .iter()
        .map(|s| s.location.expect("location").line)
        .collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn proto_conventions_surface_in_results() {
    let src = r#"
        var Status = { ACTIVE: 0, BANNED: 1, 0: "ACTIVE", 1: "BANNED" };
        proto.acct.User.prototype.getEmail = function () {
            return jspb.Message.getFieldWithDefault(this, 3, "");
        };
    "#;
    let result = analyze(src, PAGE, false).expect("analyze");
    assert_eq!(result.proto_enums.len(), 1);
    assert_eq!(result.proto_enums[0].name.as_deref(), Some("Status"));
    assert_eq!(result.proto_field_maps.len(), 1);
    assert_eq!(result.proto_field_maps[0].message, "proto.acct.User");
    assert_eq!(result.proto_field_maps[0].fields["3"], "getEmail");
}

#[test]
fn source_map_url_resolves_against_the_page() {
    let src = "fetch('/api/ping');\n//# sourceMappingURL=main.js.map\n";
    let result = analyze(src, PAGE, false).expect("analyze");
    assert_eq!(
        result.source_map_url.as_deref(),
        Some("https://app.example.com/static/main.js.map")
    );
    assert!(analyze("fetch('/a');", PAGE, false)
        .expect("analyze")
        .source_map_url
        .is_none());
}

#[test]
fn syntax_errors_carry_a_position() {
    let err = analyze("function (", PAGE, false).expect_err("should fail");
    let parse = err
        .downcast_ref::<parsers::ParseError>()
        .expect("parse error");
    assert_eq!(parse.line, 1);
}

#[test]
fn reassigning_through_itself_keeps_taint() {
    let out = sinks("var x = location.hash; x = x.trim(); document.body.innerHTML = x;");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].severity, Severity::High);
    assert_eq!(out[0].source.as_deref(), Some("location.hash"));

    let out = sinks(
        "var x = location.hash; if (c) { x = x.trim(); } else { x = x.slice(1); } document.body.innerHTML = x;",
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].severity, Severity::High);

    let out = sinks(
        "var x = location.hash; if (a) { x = encodeURIComponent(x); } else { x = encodeURIComponent(x); } document.body.innerHTML = x;",
    );
    assert_eq!(out.len(), 1);
    assert!(out[0].sanitized);
    assert_eq!(out[0].severity, Severity::Info);
}

#[test]
fn destructuring_a_source_object_reads_its_parts() {
    for (src, source) in [
        ("var { hash } = location; eval(hash);", "location.hash"),
        ("var { hash: h } = location; eval(h);", "location.hash"),
        ("var { hash: h = 'x' } = location; eval(h);", "location.hash"),
        ("const { search } = window.location; eval(search);", "location.search"),
    ] {
        let out = sinks(src);
        assert_eq!(out.len(), 1, "{src}");
        assert_eq!(out[0].source.as_deref(), Some(source), "{src}");
    }
}

#[test]
fn findings_do_not_depend_on_unrelated_code() {
    fn chain(i: usize) -> String {
        let mut f = format!("function f{i}() {{ var a0 = location.hash; ");
        for hop in 1..12 {
            f.push_str(&format!("var a{hop} = a{}; ", hop - 1));
        }
        f.push_str("document.body.innerHTML = a11; }\n");
        f
    }
    let opts = AnalysisOptions {
        step_budget: 120,
        ..AnalysisOptions::default()
    };
    let one = analyze_with_options(&chain(0), PAGE, false, &opts).expect("analyze");
    assert_eq!(one.security_sinks.len(), 1);

    let many: String = (0..60).map(chain).collect();
    let out = analyze_with_options(&many, PAGE, false, &opts).expect("analyze");
    assert_eq!(out.security_sinks.len(), 60);
    assert!(out.security_sinks.iter().all(|s| s.severity == Severity::High));
}
