// graph.rs — Node/edge records and the graph snapshot handed to the engine
//
// A `Graph` is an immutable-by-convention snapshot of what the editor holds:
// nodes keyed by id plus the edge list in insertion order. Nothing here checks
// that edges make sense; dangling endpoints, unknown handles, and repeated
// edges are legal inputs that the propagation engine reports as warnings.
//
// Preconditions: none.
// Postconditions: `from_json` yields a graph whose node types are all known.
// Failure modes: malformed JSON, unknown block type name → `GraphDecodeError`.
// Side effects: none.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::{BlockType, UnknownBlockType, DEFAULT_INPUT, DEFAULT_OUTPUT};
use crate::id::{EdgeId, NodeId};
use crate::param::ParamSet;

// ── Public types ────────────────────────────────────────────────────────────

/// One placed block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub block: BlockType,
    pub params: ParamSet,
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, block: BlockType, params: ParamSet) -> Self {
        NodeRecord {
            id: NodeId::new(id),
            block,
            params,
        }
    }
}

/// One connection, from an output handle to an input handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

impl EdgeRecord {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        EdgeRecord {
            id: EdgeId::new(id),
            source: NodeId::new(source),
            source_handle: source_handle.into(),
            target: NodeId::new(target),
            target_handle: target_handle.into(),
        }
    }

    /// Same endpoints and handles, regardless of id.
    pub fn same_connection(&self, other: &EdgeRecord) -> bool {
        self.source == other.source
            && self.source_handle == other.source_handle
            && self.target == other.target
            && self.target_handle == other.target_handle
    }
}

/// Snapshot of the editor's graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: BTreeMap<NodeId, NodeRecord>,
    edges: Vec<EdgeRecord>,
    duplicate_nodes: Vec<NodeId>,
}

#[derive(Debug, Error)]
pub enum GraphDecodeError {
    #[error("malformed graph document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node '{node}': {source}")]
    BlockType {
        node: String,
        #[source]
        source: UnknownBlockType,
    },
}

// ── Construction ────────────────────────────────────────────────────────────

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. A repeated id keeps the first record and is remembered
    /// so the engine can warn about it.
    pub fn insert_node(&mut self, node: NodeRecord) -> bool {
        if self.nodes.contains_key(&node.id) {
            self.duplicate_nodes.push(node.id);
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn push_edge(&mut self, edge: EdgeRecord) {
        self.edges.push(edge);
    }

    /// Chaining form of `insert_node`.
    pub fn add_node(&mut self, id: &str, block: BlockType, params: ParamSet) -> &mut Self {
        self.insert_node(NodeRecord::new(id, block, params));
        self
    }

    /// Connect `source.out` to `target.in` with id `e-{source}-{target}`.
    pub fn connect(&mut self, source: &str, target: &str) -> &mut Self {
        self.connect_handles(source, DEFAULT_OUTPUT, target, DEFAULT_INPUT)
    }

    /// Connect explicit handles. The id is `e-{source}-{target}` for default
    /// handles and `e-{source}-{target}.{target_handle}` otherwise.
    pub fn connect_handles(
        &mut self,
        source: &str,
        source_handle: &str,
        target: &str,
        target_handle: &str,
    ) -> &mut Self {
        let id = if source_handle == DEFAULT_OUTPUT && target_handle == DEFAULT_INPUT {
            format!("e-{}-{}", source, target)
        } else {
            format!("e-{}-{}.{}", source, target, target_handle)
        };
        self.push_edge(EdgeRecord::new(
            id,
            source,
            source_handle,
            target,
            target_handle,
        ));
        self
    }

    /// Copy of this graph with one more edge; the original is untouched.
    pub fn with_edge(&self, edge: EdgeRecord) -> Graph {
        let mut next = self.clone();
        next.push_edge(edge);
        next
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn node(&self, id: &NodeId) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn duplicate_nodes(&self) -> &[NodeId] {
        &self.duplicate_nodes
    }

    // ── JSON document ───────────────────────────────────────────────────────

    /// Decode the editor's saved-graph document.
    pub fn from_json(text: &str) -> Result<Graph, GraphDecodeError> {
        let doc: GraphDocument = serde_json::from_str(text)?;
        Graph::from_document(doc)
    }

    fn from_document(doc: GraphDocument) -> Result<Graph, GraphDecodeError> {
        let mut graph = Graph::new();
        for node in doc.nodes {
            let block: BlockType = node
                .block_type
                .parse()
                .map_err(|source| GraphDecodeError::BlockType {
                    node: node.id.clone(),
                    source,
                })?;
            let mut params = node.params;
            if let Some(function) = BlockType::implied_activation(&node.block_type) {
                if params.get("activation").is_none() {
                    params.set("activation", function);
                }
            }
            graph.insert_node(NodeRecord::new(node.id, block, params));
        }
        for edge in doc.edges {
            let id = edge
                .id
                .unwrap_or_else(|| format!("e-{}-{}", edge.source, edge.target));
            graph.push_edge(EdgeRecord::new(
                id,
                edge.source,
                edge.source_handle.unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
                edge.target,
                edge.target_handle.unwrap_or_else(|| DEFAULT_INPUT.to_string()),
            ));
        }
        Ok(graph)
    }

    /// Encode as a saved-graph document (positions and metadata omitted).
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Doc<'a> {
            version: &'a str,
            nodes: Vec<&'a NodeRecord>,
            edges: &'a [EdgeRecord],
        }
        serde_json::to_string_pretty(&Doc {
            version: DOCUMENT_VERSION,
            nodes: self.nodes().collect(),
            edges: &self.edges,
        })
    }
}

const DOCUMENT_VERSION: &str = "1.0";

// ── Wire format ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GraphDocument {
    #[serde(default)]
    #[allow(dead_code)]
    version: Option<serde_json::Value>,
    nodes: Vec<NodeDocument>,
    #[serde(default)]
    edges: Vec<EdgeDocument>,
}

#[derive(Deserialize)]
struct NodeDocument {
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    params: ParamSet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EdgeDocument {
    #[serde(default)]
    id: Option<String>,
    source: String,
    #[serde(default)]
    source_handle: Option<String>,
    target: String,
    #[serde(default)]
    target_handle: Option<String>,
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamValue;

    const DOC: &str = r#"{
        "version": "1.0",
        "nodes": [
            {"id": "input-1", "type": "Input", "params": {"dataset": "MNIST"}, "position": {"x": 0, "y": 0}},
            {"id": "act-1", "type": "relu", "params": {}},
            {"id": "fc", "type": "linear", "params": {"in_features": 784, "out_features": 10}}
        ],
        "edges": [
            {"id": "e1", "source": "input-1", "sourceHandle": "out", "target": "act-1", "targetHandle": "in"},
            {"source": "act-1", "target": "fc"}
        ],
        "metadata": {"name": "Untitled Model"}
    }"#;

    #[test]
    fn decodes_document_with_defaults() {
        let g = Graph::from_json(DOC).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);

        let fc = g.node(&NodeId::from("fc")).unwrap();
        assert_eq!(fc.block, BlockType::Linear);

        let e = &g.edges()[1];
        assert_eq!(e.id, EdgeId::from("e-act-1-fc"));
        assert_eq!(e.source_handle, "out");
        assert_eq!(e.target_handle, "in");
    }

    #[test]
    fn activation_alias_sets_function() {
        let g = Graph::from_json(DOC).unwrap();
        let act = g.node(&NodeId::from("act-1")).unwrap();
        assert_eq!(act.block, BlockType::Activation);
        assert_eq!(
            act.params.get("activation"),
            Some(&ParamValue::Text("relu".to_string()))
        );
    }

    #[test]
    fn unknown_type_is_a_decode_error() {
        let err = Graph::from_json(r#"{"nodes": [{"id": "x", "type": "Transformer"}]}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "node 'x': unknown block type 'Transformer'");
    }

    #[test]
    fn duplicate_node_keeps_first() {
        let mut g = Graph::new();
        g.add_node("a", BlockType::Flatten, ParamSet::new());
        g.add_node("a", BlockType::Dropout, ParamSet::new());
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.node(&NodeId::from("a")).unwrap().block, BlockType::Flatten);
        assert_eq!(g.duplicate_nodes(), &[NodeId::from("a")]);
    }

    #[test]
    fn connect_handles_names_edge_after_target_handle() {
        let mut g = Graph::new();
        g.connect_handles("q", "out", "attn", "query");
        assert_eq!(g.edges()[0].id, EdgeId::from("e-q-attn.query"));
    }

    #[test]
    fn document_roundtrips_through_to_json() {
        let g = Graph::from_json(DOC).unwrap();
        let back = Graph::from_json(&g.to_json().unwrap()).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn with_edge_leaves_original_untouched() {
        let mut g = Graph::new();
        g.add_node("a", BlockType::Input, ParamSet::new());
        let next = g.with_edge(EdgeRecord::new("e", "a", "out", "b", "in"));
        assert_eq!(g.edge_count(), 0);
        assert_eq!(next.edge_count(), 1);
    }
}
