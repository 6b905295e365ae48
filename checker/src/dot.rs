// dot.rs — Graphviz DOT output for checked block graphs
//
// Renders a graph together with its last recompute: nodes show their type
// and inferred shape (or the code that blocked them), edges carry the shape
// flowing through them.
//
// Preconditions: `result` was produced by `recompute(graph)`.
// Postconditions: returns a valid DOT string; identical inputs give identical
//                 bytes.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::{self, Write};

use crate::block::{BlockCategory, BlockType};
use crate::graph::{EdgeRecord, Graph, NodeRecord};
use crate::propagate::{EdgeVerdict, Recomputation};

/// Emit the checked graph as a Graphviz DOT string.
pub fn emit_dot(graph: &Graph, result: &Recomputation) -> String {
    let mut buf = String::new();
    // Writing to a String cannot fail.
    let _ = write_dot(&mut buf, graph, result);
    buf
}

fn write_dot(buf: &mut String, graph: &Graph, result: &Recomputation) -> fmt::Result {
    writeln!(buf, "digraph nsc {{")?;
    writeln!(buf, "    rankdir=LR;")?;
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];")?;
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];")?;

    writeln!(buf)?;
    for node in graph.nodes() {
        let attrs = node_attrs(node, result);
        writeln!(buf, "    {} [{}];", quote(node.id.as_str()), attrs)?;
    }

    let drawable: Vec<&EdgeRecord> = graph
        .edges()
        .iter()
        .filter(|e| graph.node(&e.source).is_some() && graph.node(&e.target).is_some())
        .collect();
    if !drawable.is_empty() {
        writeln!(buf)?;
    }
    for edge in drawable {
        let src = quote(edge.source.as_str());
        let tgt = quote(edge.target.as_str());
        match result.edges.get(&edge.id) {
            Some(verdict) => writeln!(buf, "    {src} -> {tgt} [{}];", edge_attrs(edge, verdict))?,
            None => writeln!(buf, "    {src} -> {tgt};")?,
        }
    }

    writeln!(buf, "}}")
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Quote a name as a DOT ID, escaping `"` and `\`.
fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn category_color(block: BlockType) -> &'static str {
    match block.category() {
        BlockCategory::Io => "lightsalmon",
        BlockCategory::Layer => "lightblue",
        BlockCategory::Normalization => "lightgreen",
        BlockCategory::Elementwise => "lightyellow",
        BlockCategory::Merge => "plum",
        BlockCategory::Text => "lightcyan",
        BlockCategory::Annotation => "white",
    }
}

/// DOT attributes for a node: three-line label `id / type / shape-or-code`.
fn node_attrs(node: &NodeRecord, result: &Recomputation) -> String {
    let name = escape_label(node.id.as_str());
    if node.block == BlockType::Board {
        return format!("shape=note, style=filled, fillcolor=white, label=\"{name}\"");
    }
    let (color, detail) = match result.get(&node.id) {
        Some(r) => match (&r.output_shape, &r.error) {
            (Some(shape), None) => (category_color(node.block), shape.to_string()),
            (_, Some(e)) => ("tomato", e.code.to_string()),
            (None, None) => ("tomato", String::new()),
        },
        // Duplicate-id shadow or otherwise unchecked.
        None => ("gray90", String::new()),
    };
    format!(
        "shape=box, style=filled, fillcolor={color}, label=\"{name}\\n{}\\n{}\"",
        node.block,
        escape_label(&detail)
    )
}

fn edge_attrs(edge: &EdgeRecord, verdict: &EdgeVerdict) -> String {
    let handle = if edge.target_handle == crate::block::DEFAULT_INPUT {
        String::new()
    } else {
        format!(", headlabel=\"{}\"", escape_label(&edge.target_handle))
    };
    match verdict {
        EdgeVerdict::Ok { shape } => format!("label=\"{}\"{handle}", shape),
        EdgeVerdict::Invalid { code, .. } => {
            format!("color=red, fontcolor=red, label=\"{code}\"{handle}")
        }
        EdgeVerdict::Inactive => format!("style=dotted, color=gray50{handle}"),
        EdgeVerdict::Ignored { code } => {
            format!("style=dashed, color=gray70, fontcolor=gray50, label=\"{code}\"{handle}")
        }
    }
}

fn escape_label(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Tests ──
