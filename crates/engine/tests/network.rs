use engine::{analyze, CallSite, ParamLocation};

fn call_sites(src: &str) -> Vec<CallSite> {
    analyze(src, "https://app.example.com/static/main.js", false)
        .expect("analyze")
        .fetch_call_sites
}

fn url_methods(sites: &[CallSite]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = sites
        .iter()
        .map(|s| (s.url.clone(), s.method.clone()))
        .collect();
    out.sort();
    out
}

#[test]
fn direct_fetch_defaults_to_get() {
    let sites = call_sites("fetch('/api/users');");
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].kind, "fetch");
    assert_eq!(sites[0].url, "/api/users");
    assert_eq!(sites[0].method, "GET");
    assert!(sites[0].id.is_some());
}

#[test]
fn shadowed_globals_are_not_network_sinks() {
    let src = r#"
        function load(fetch) { fetch('/api/one'); }
        (function () { var fetch = function (u) { return u; }; fetch('/api/two'); })();
        function legacy(XMLHttpRequest) {
            var x = new XMLHttpRequest();
            x.open('GET', '/api/three');
        }
        function plugin($) { $.get('/api/four'); }
        function nav(navigator) { navigator.sendBeacon('/api/five', 'x'); }
    "#;
    assert!(call_sites(src).is_empty());
}

#[test]
fn unresolved_urls_are_suppressed() {
    let src = r#"
        function go(url) { return fetch(url); }
        fetch(config.endpoint);
        fetch('/' + dynamicPath);
    "#;
    assert!(call_sites(src).is_empty());
}

#[test]
fn callers_keep_url_and_method_paired() {
    let src = r#"
        function rpc(service, method, verb) {
            return fetch("/rpc/" + service + "/" + method, { method: verb });
        }
        rpc("auth", "login", "POST");
        rpc("auth", "refresh", "POST");
        rpc("billing", "invoice", "GET");
    "#;
    let sites = call_sites(src);
    assert_eq!(
        url_methods(&sites),
        vec![
            ("/rpc/auth/login".to_string(), "POST".to_string()),
            ("/rpc/auth/refresh".to_string(), "POST".to_string()),
            ("/rpc/billing/invoice".to_string(), "GET".to_string()),
        ]
    );
}

#[test]
fn wrapper_bodies_expose_object_fields() {
    let src = r#"
        function apiRequest(method, path, body) {
            return fetch("/api/" + path, { method: method, body: JSON.stringify(body) });
        }
        apiRequest("POST", "orders", { item: "widget", qty: 3 });
    "#;
    let sites = call_sites(src);
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].url, "/api/orders");
    assert_eq!(sites[0].method, "POST");
    let names: Vec<&str> = sites[0].params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["item", "qty"]);
    assert!(sites[0]
        .params
        .iter()
        .all(|p| p.location == ParamLocation::Body));
    assert_eq!(sites[0].params[1].ty, "number");
}

#[test]
fn unresolved_pieces_become_parameters() {
    let src = r#"
        function getUser(id, page) {
            return fetch(`/api/users/${id}/posts?page=${page}&limit=20`);
        }
    "#;
    let sites = call_sites(src);
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].url, "/api/users/{id}/posts?page={page}&limit=20");
    let params: Vec<(&str, ParamLocation)> = sites[0]
        .params
        .iter()
        .map(|p| (p.name.as_str(), p.location))
        .collect();
    assert_eq!(
        params,
        vec![
            ("id", ParamLocation::Path),
            ("page", ParamLocation::Query),
            ("limit", ParamLocation::Query),
        ]
    );
    assert!(!sites[0].params[2].required);
}

#[test]
fn mined_constraints_annotate_parameters() {
    let src = r#"
        function act(action) {
            switch (action) {
                case "create":
                case "update":
                case "delete":
                    break;
            }
            return fetch("/api/items?action=" + action);
        }
    "#;
    let result = analyze(src, "", false).expect("analyze");
    assert_eq!(result.value_constraints.len(), 1);
    assert_eq!(result.value_constraints[0].variable, "action");
    assert_eq!(result.value_constraints[0].values.len(), 3);
    let site = &result.fetch_call_sites[0];
    assert_eq!(site.params[0].name, "action");
    assert_eq!(
        site.params[0].valid_values,
        Some(vec![
            "create".to_string(),
            "update".to_string(),
            "delete".to_string()
        ])
    );
}

#[test]
fn xhr_collects_headers_and_body() {
    let src = r#"
        var xhr = new XMLHttpRequest();
        xhr.open("PUT", "/api/profile");
        xhr.setRequestHeader("X-Token", "abc");
        xhr.send(JSON.stringify({ name: "n" }));
    "#;
    let sites = call_sites(src);
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].kind, "xhr");
    assert_eq!(sites[0].method, "PUT");
    assert_eq!(sites[0].headers.get("X-Token").map(String::as_str), Some("abc"));
    assert_eq!(sites[0].params[0].name, "name");
}

#[test]
fn jquery_family() {
    let src = r#"
        $.post("/api/login", { user: "u" });
        jQuery.ajax({ url: "/api/search", type: "get", data: { q: "x" } });
    "#;
    let sites = call_sites(src);
    assert_eq!(
        url_methods(&sites),
        vec![
            ("/api/login".to_string(), "POST".to_string()),
            ("/api/search".to_string(), "GET".to_string()),
        ]
    );
    let search = sites.iter().find(|s| s.url == "/api/search").expect("search");
    assert_eq!(search.params[0].location, ParamLocation::Query);
}

#[test]
fn beacons_sockets_and_images() {
    let src = r#"
        navigator.sendBeacon("/collect", "a=1");
        new WebSocket("wss://rt.example.com/feed");
        new EventSource("/events");
        var img = new Image();
        img.src = "/pixel.gif";
    "#;
    let sites = call_sites(src);
    let kinds: Vec<(&str, &str)> = sites
        .iter()
        .map(|s| (s.kind.as_str(), s.method.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("beacon", "POST"),
            ("websocket", "GET"),
            ("eventsource", "GET"),
            ("image", "GET"),
        ]
    );
}

#[test]
fn callbacks_receive_wrapper_arguments() {
    let src = r#"
        function withRetry(fn) { return fn("/api/retry"); }
        withRetry(function (u) { return fetch(u); });
    "#;
    let sites = call_sites(src);
    assert_eq!(url_methods(&sites), vec![("/api/retry".to_string(), "GET".to_string())]);
}

#[test]
fn loop_index_reaches_every_endpoint() {
    let src = r#"
        var EP = ["/a/one", "/a/two", "/a/three"];
        for (var i = 0; i < EP.length; i++) {
            fetch(EP[i]);
        }
    "#;
    let mut urls: Vec<String> = call_sites(src).into_iter().map(|s| s.url).collect();
    urls.sort();
    assert_eq!(urls, vec!["/a/one", "/a/three", "/a/two"]);
}

#[test]
fn instances_keep_their_own_base_url() {
    let src = r#"
        class Client {
            constructor(base) { this.base = base; }
            get(path) { return fetch(this.base + path); }
        }
        var c = new Client("https://api.x.com");
        c.get("/v1/me");
        var d = new Client("https://b.x.com");
        d.get("/v2/you");
    "#;
    let sites = call_sites(src);
    assert_eq!(
        url_methods(&sites),
        vec![
            ("https://api.x.com/v1/me".to_string(), "GET".to_string()),
            ("https://b.x.com/v2/you".to_string(), "GET".to_string()),
        ]
    );
}

#[test]
fn output_is_stable_across_runs() {
    let src = r#"
        var API = { users: "/api/users", teams: "/api/teams" };
        function get(kind) { return fetch(API[kind]); }
        get(window.kind);
        document.body.innerHTML = location.hash;
    "#;
    let a = serde_json::to_string(&analyze(src, "", false).expect("analyze")).expect("json");
    let b = serde_json::to_string(&analyze(src, "", false).expect("analyze")).expect("json");
    assert_eq!(a, b);
}
