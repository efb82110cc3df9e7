//! Static analysis engine for JavaScript bundles.
//!
//! [`analyze`] parses a bundle and runs every pass over it: network call
//! sites are recovered through wrappers and caller environments, value
//! constraints are mined from control flow, taint is tracked from
//! user-controlled sources into DOM, code, redirect and request sinks and
//! confirmed along control-flow paths, and taint-independent dangerous
//! patterns and protobuf conventions are collected. Each call is a pure
//! function of its input; nothing is shared between calls.

use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use ir::Program;
use tracing::{debug, warn};

pub mod callgraph;
pub mod cfg;
pub mod constraints;
pub mod context;
pub mod network;
pub mod options;
pub mod patterns;
pub mod proto;
pub mod report;
pub mod resolve;
pub mod sanitizer;
pub mod scope;
pub mod taint;
pub mod value;

pub use cfg::{build_cfg, FnScope, FunctionCfg};
pub use options::AnalysisOptions;
pub use report::{
    AnalysisResult, BatchItem, BatchRequest, CallSite, DangerousPattern, Location,
    ParamDescriptor, ParamLocation, ProtoEnum, ProtoFieldMap, SecuritySink, Severity,
    ValueConstraint,
};

use crate::constraints::Constraints;
use crate::context::Context;

/// Parses `code` and analyzes it with default limits.
///
/// # Example
/// ```
/// let result = engine::analyze("fetch('/api/users');", "https://example.com/app.js", false).unwrap();
/// assert_eq!(result.fetch_call_sites[0].url, "/api/users");
/// assert_eq!(result.fetch_call_sites[0].method, "GET");
/// ```
pub fn analyze(code: &str, source_url: &str, force_script: bool) -> Result<AnalysisResult> {
    analyze_with_options(code, source_url, force_script, &AnalysisOptions::default())
}

/// Parses `code` and analyzes it. Parse failures surface as a
/// [`parsers::ParseError`] inside the returned error.
pub fn analyze_with_options(
    code: &str,
    source_url: &str,
    force_script: bool,
    opts: &AnalysisOptions,
) -> Result<AnalysisResult> {
    let prog = parsers::parse_javascript(code, force_script)?;
    Ok(analyze_program(&prog, code, source_url, opts))
}

/// Runs every pass over an already parsed program.
pub fn analyze_program(
    prog: &Program,
    source: &str,
    source_url: &str,
    opts: &AnalysisOptions,
) -> AnalysisResult {
    let cx = Context::new(prog, source, opts);

    let constraints = Constraints::mine(&cx);
    let fetch_call_sites = network::synthesize(&cx, &constraints);

    let handlers = taint::message_handlers(&cx);
    let sites = taint::sink_sites(&cx);
    let untrusted = patterns::unguarded_handlers(&cx, &handlers);
    let mut security_sinks = sanitizer::security_sinks(&cx, &untrusted);
    let mut dangerous_patterns = patterns::detect(&cx, &handlers, &sites);
    security_sinks.sort_by(|a, b| {
        (a.location, &a.kind, &a.sink).cmp(&(b.location, &b.kind, &b.sink))
    });
    dangerous_patterns.sort_by(|a, b| (a.location, &a.kind).cmp(&(b.location, &b.kind)));

    let result = AnalysisResult {
        fetch_call_sites,
        value_constraints: constraints.to_report(),
        proto_enums: proto::enums(&cx),
        proto_field_maps: proto::field_maps(&cx),
        security_sinks,
        dangerous_patterns,
        source_map_url: parsers::extract_source_map_url(source, source_url),
    };
    debug!(
        call_sites = result.fetch_call_sites.len(),
        constraints = result.value_constraints.len(),
        sinks = result.security_sinks.len(),
        patterns = result.dangerous_patterns.len(),
        "analysis finished"
    );
    result
}

/// Analyzes each request in order. A failing or panicking item yields
/// `success: false` and never affects the others.
pub fn analyze_batch(requests: &[BatchRequest], opts: &AnalysisOptions) -> Vec<BatchItem> {
    requests
        .iter()
        .enumerate()
        .map(|(i, req)| {
            let run = panic::catch_unwind(AssertUnwindSafe(|| {
                analyze_with_options(&req.code, &req.source_url, req.force_script, opts)
            }));
            match run {
                Ok(Ok(result)) => BatchItem {
                    success: true,
                    security_sinks: result.security_sinks,
                    dangerous_patterns: result.dangerous_patterns,
                    error: None,
                },
                Ok(Err(err)) => {
                    warn!(item = i, source_url = %req.source_url, error = %err, "batch item failed");
                    BatchItem {
                        error: Some(format!("{err:#}")),
                        ..BatchItem::default()
                    }
                }
                Err(payload) => {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "analysis panicked".to_string());
                    warn!(item = i, source_url = %req.source_url, error = %msg, "batch item panicked");
                    BatchItem {
                        error: Some(msg),
                        ..BatchItem::default()
                    }
                }
            }
        })
        .collect()
}
