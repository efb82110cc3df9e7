//! Debugging dumps of the lowered syntax tree and control flow graph.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};

use engine::{build_cfg, FnScope};
use ir::Program;

use crate::args::{CfgArgs, GraphFormat, InspectArgs};

fn load(args: &InspectArgs) -> Result<(String, Program)> {
    let code = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let prog = parsers::parse_javascript(&code, args.force_script)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;
    Ok((code, prog))
}

pub fn dump_ast(args: InspectArgs) -> Result<()> {
    let (_, prog) = load(&args)?;
    let mut out = io::stdout();
    serde_json::to_writer_pretty(&mut out, &prog)?;
    writeln!(out)?;
    Ok(())
}

pub fn dump_cfg(args: CfgArgs) -> Result<()> {
    let (_, prog) = load(&args.input)?;
    let flow = build_cfg(&prog, FnScope::TopLevel);
    let mut out = io::stdout();
    if args.reaching {
        let reaching = flow.reaching_definitions();
        for node in &flow.cfg.nodes {
            let defs: Vec<String> = reaching
                .get(node.id)
                .into_iter()
                .flatten()
                .filter_map(|&i| flow.defs.get(i))
                .map(|d| format!("{}@{}", d.name, d.span.line))
                .collect();
            writeln!(out, "{:>4} {:<40} {}", node.id, node.code, defs.join(" "))?;
        }
        return Ok(());
    }
    match args.graph {
        GraphFormat::Dot => write!(out, "{}", flow.cfg.to_dot())?,
        GraphFormat::Mermaid => write!(out, "{}", flow.cfg.to_mermaid())?,
        GraphFormat::Json => writeln!(out, "{}", flow.cfg.to_json()?)?,
    }
    Ok(())
}
