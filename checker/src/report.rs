// report.rs — Text and JSON renderings of a recompute
//
// The summary is what the CLI prints by default: one line per node, then
// warnings, then one line per edge. JSON is the serde form of
// `Recomputation`; its compact encoding is canonical (ordered maps, stable
// field order) and is what the fingerprint hashes.
//
// Preconditions: `result` was produced by `recompute(graph)`.
// Postconditions: output depends only on `graph` and `result`.
// Failure modes: JSON encoding errors are propagated (none occur in practice).
// Side effects: none.

use std::collections::HashSet;
use std::fmt::{self, Write};

use serde::Serialize;

use crate::connect::{ProposedEdge, ValidationResult};
use crate::graph::Graph;
use crate::propagate::{EdgeVerdict, Recomputation, ShapeResult};

// ── Summary ─────────────────────────────────────────────────────────────────

/// Human-readable summary of a recompute.
pub fn render_summary(graph: &Graph, result: &Recomputation) -> String {
    let mut buf = String::new();
    // Writing to a String cannot fail.
    let _ = write_summary(&mut buf, graph, result);
    buf
}

fn write_summary(buf: &mut String, graph: &Graph, result: &Recomputation) -> fmt::Result {
    for node in graph.nodes() {
        let Some(r) = result.get(&node.id) else {
            continue;
        };
        writeln!(buf, "{}: {} {}", node.id, node.block, node_status(r))?;
    }

    if !result.warnings.is_empty() {
        writeln!(buf)?;
        for w in &result.warnings {
            writeln!(buf, "{}", w)?;
        }
    }

    let mut seen = HashSet::new();
    let mut first = true;
    for edge in graph.edges() {
        if !seen.insert(&edge.id) {
            continue;
        }
        let Some(verdict) = result.edges.get(&edge.id) else {
            continue;
        };
        if first {
            writeln!(buf)?;
            first = false;
        }
        writeln!(
            buf,
            "{}: {}.{} -> {}.{} {}",
            edge.id,
            edge.source,
            edge.source_handle,
            edge.target,
            edge.target_handle,
            edge_status(verdict)
        )?;
    }

    let blocked = result.blocked().count();
    writeln!(buf)?;
    writeln!(
        buf,
        "{} resolved, {} blocked, {} warning(s)",
        result.nodes.len() - blocked,
        blocked,
        result.warnings.len()
    )
}

fn node_status(r: &ShapeResult) -> String {
    match (&r.output_shape, &r.error) {
        (_, Some(e)) => format!("BLOCKED {} {}", e.code, e.message),
        (Some(shape), None) => format!("-> {}", shape),
        (None, None) => "BLOCKED".to_string(),
    }
}

fn edge_status(v: &EdgeVerdict) -> String {
    match v {
        EdgeVerdict::Ok { shape } => format!("ok {}", shape),
        EdgeVerdict::Invalid { code, .. } => format!("invalid {}", code),
        EdgeVerdict::Inactive => "inactive".to_string(),
        EdgeVerdict::Ignored { code } => format!("ignored {}", code),
    }
}

/// One line per checked connection.
pub fn render_validation(proposal: &ProposedEdge, verdict: &ValidationResult) -> String {
    match (&verdict.code, &verdict.error) {
        (Some(code), Some(message)) => format!("connect {}: rejected {} {}", proposal, code, message),
        _ => format!("connect {}: valid", proposal),
    }
}

// ── JSON ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CheckedConnection<'a> {
    proposal: &'a ProposedEdge,
    #[serde(flatten)]
    verdict: &'a ValidationResult,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a Recomputation,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    connections: Vec<CheckedConnection<'a>>,
}

/// Pretty JSON of the result plus any checked connections.
pub fn render_json(
    result: &Recomputation,
    connections: &[(ProposedEdge, ValidationResult)],
) -> serde_json::Result<String> {
    let report = JsonReport {
        result,
        connections: connections
            .iter()
            .map(|(proposal, verdict)| CheckedConnection { proposal, verdict })
            .collect(),
    };
    serde_json::to_string_pretty(&report)
}

/// Compact JSON with no whitespace. Map keys are ordered, so equal results
/// always encode to equal bytes.
pub fn canonical_json(result: &Recomputation) -> serde_json::Result<String> {
    serde_json::to_string(result)
}

// ── Fingerprint ─────────────────────────────────────────────────────────────

impl Recomputation {
    /// SHA-256 of the canonical JSON, as 64 lowercase hex characters.
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        use sha2::{Digest, Sha256};

        let canonical = canonical_json(self)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        Ok(bytes_to_hex(&digest))
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockType;
    use crate::param::ParamSet;
    use crate::propagate::recompute;

    fn mlp(in_features: u64) -> Graph {
        let mut g = Graph::new();
        g.add_node("x", BlockType::Input, ParamSet::new().with("dataset", "MNIST"))
            .add_node("flat", BlockType::Flatten, ParamSet::new())
            .add_node(
                "fc",
                BlockType::Linear,
                ParamSet::new()
                    .with("in_features", in_features)
                    .with("out_features", 10u64),
            )
            .connect("x", "flat")
            .connect("flat", "fc");
        g
    }

    #[test]
    fn summary_lists_nodes_edges_and_totals() {
        let g = mlp(784);
        let text = render_summary(&g, &recompute(&g));
        assert_eq!(
            text,
            "fc: Linear -> [10]\n\
             flat: Flatten -> [784]\n\
             x: Input -> [1, 28, 28]\n\
             \n\
             e-x-flat: x.out -> flat.in ok [1, 28, 28]\n\
             e-flat-fc: flat.out -> fc.in ok [784]\n\
             \n\
             3 resolved, 0 blocked, 0 warning(s)\n"
        );
    }

    #[test]
    fn summary_shows_blocked_code() {
        let g = mlp(100);
        let text = render_summary(&g, &recompute(&g));
        assert!(text.contains(
            "fc: Linear BLOCKED E0101 in_features expects 100, but the input provides 784\n"
        ));
        assert!(text.contains("e-flat-fc: flat.out -> fc.in invalid E0101\n"));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = recompute(&mlp(784)).fingerprint().unwrap();
        let b = recompute(&mlp(784)).fingerprint().unwrap();
        let c = recompute(&mlp(100)).fingerprint().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn json_carries_state_and_shape() {
        let g = mlp(784);
        let json = render_json(&recompute(&g), &[]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["nodes"]["flat"]["state"], "resolved");
        assert_eq!(v["nodes"]["flat"]["outputShape"], serde_json::json!([784]));
        assert_eq!(v["edges"]["e-x-flat"]["status"], "ok");
        assert!(v.get("connections").is_none());
    }

    #[test]
    fn json_includes_connections() {
        let g = mlp(784);
        let result = recompute(&g);
        let proposal = ProposedEdge::new("fc", "flat");
        let verdict = crate::connect::validate_against(&g, &result, &proposal);
        let json = render_json(&result, &[(proposal, verdict)]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["connections"][0]["valid"], false);
        assert_eq!(v["connections"][0]["code"], "E0130");
        assert_eq!(v["connections"][0]["proposal"]["source"], "fc");
    }

    #[test]
    fn validation_lines() {
        let p = ProposedEdge::new("a", "b");
        assert_eq!(render_validation(&p, &ValidationResult::accept()), "connect a.out -> b.in: valid");
    }
}
