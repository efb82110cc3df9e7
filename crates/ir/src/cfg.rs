use serde::{Deserialize, Serialize};

use crate::ast::Span;

/// Statement-level CFG node. `code` is a one-line rendering used by the
/// exporters; synthetic entry/exit nodes have an empty span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CFGNode {
    pub id: usize,
    pub line: usize,
    pub code: String,
    pub span: Span,
}

/// Control flow graph of one function body (or the top-level script).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CFG {
    pub nodes: Vec<CFGNode>,
    pub edges: Vec<(usize, usize)>,
    pub entry: usize,
    pub exit: usize,
}

impl CFG {
    /// Appends a node and returns its id.
    pub fn add_node(&mut self, line: usize, code: impl Into<String>, span: Span) -> usize {
        let id = self.nodes.len();
        self.nodes.push(CFGNode {
            id,
            line,
            code: code.into(),
            span,
        });
        id
    }

    pub fn add_edge(&mut self, from: usize, to: usize) {
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
        }
    }

    pub fn successors(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |(a, _)| *a == id)
            .map(|(_, b)| *b)
    }

    pub fn predecessors(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .filter(move |(_, b)| *b == id)
            .map(|(a, _)| *a)
    }

    /// Predecessor lists indexed by node id.
    pub fn predecessor_table(&self) -> Vec<Vec<usize>> {
        let mut preds = vec![Vec::new(); self.nodes.len()];
        for (a, b) in &self.edges {
            if let Some(list) = preds.get_mut(*b) {
                list.push(*a);
            }
        }
        preds
    }

    /// Exports the graph to DOT format.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph CFG {\n");
        for node in &self.nodes {
            out.push_str(&format!(
                "    {} [label=\"{}:{}\"];\n",
                node.id,
                node.line,
                escape_label(&node.code)
            ));
        }
        for (a, b) in &self.edges {
            out.push_str(&format!("    {a} -> {b};\n"));
        }
        out.push('}');
        out
    }

    /// Exports the graph to Mermaid format.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for node in &self.nodes {
            out.push_str(&format!(
                "    {}[\"{}:{}\"]\n",
                node.id,
                node.line,
                node.code.replace('"', "'")
            ));
        }
        for (a, b) in &self.edges {
            out.push_str(&format!("    {a} --> {b}\n"));
        }
        out
    }

    /// Exports the graph to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
