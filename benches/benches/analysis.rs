use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use engine::{AnalysisOptions, BatchRequest};

/// A webpack-style bundle with `modules` wrapper-heavy modules.
fn synthetic_bundle(modules: usize) -> String {
    let mut src = String::from(
        r#"var API = { base: "/api/v2" };
function request(method, path, body) {
    return fetch(API.base + "/" + path, { method: method, body: JSON.stringify(body) });
}
"#,
    );
    for i in 0..modules {
        src.push_str(&format!(
            r#"
(function (exports) {{
    var Kind{i} = {{ DRAFT: 0, LIVE: 1, 0: "DRAFT", 1: "LIVE" }};
    function list{i}(page) {{ return request("GET", "items{i}?page=" + page); }}
    function save{i}(item) {{
        switch (item.state) {{ case "draft": case "live": break; }}
        return request("POST", "items{i}", {{ name: item.name, state: item.state }});
    }}
    exports.render{i} = function (el) {{ el.innerHTML = location.hash.slice({i}); }};
    list{i}(1);
    save{i}({{ name: "n{i}", state: "draft" }});
}})({{}});
"#
        ));
    }
    src
}

fn bench_parse(c: &mut Criterion) {
    let src = synthetic_bundle(50);
    c.bench_function("parse_bundle_50", |b| {
        b.iter(|| parsers::parse_javascript(black_box(&src), false).expect("parse"))
    });
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_bundle");
    for modules in [10usize, 50, 200] {
        let src = synthetic_bundle(modules);
        group.bench_with_input(BenchmarkId::from_parameter(modules), &src, |b, src| {
            b.iter(|| engine::analyze(black_box(src), "https://example.com/main.js", false))
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let requests: Vec<BatchRequest> = (0..16)
        .map(|i| BatchRequest {
            code: synthetic_bundle(5 + i),
            source_url: format!("https://example.com/chunk{i}.js"),
            force_script: false,
        })
        .collect();
    let opts = AnalysisOptions::default();
    c.bench_function("analyze_batch_16", |b| {
        b.iter(|| engine::analyze_batch(black_box(&requests), &opts))
    });
}

criterion_group!(benches, bench_parse, bench_analyze, bench_batch);
criterion_main!(benches);
