// propagate.rs — Whole-graph shape propagation
//
// `recompute` orders the graph with a cycle-aware Kahn sweep, drives each
// node through its transfer function, and returns a fresh `Recomputation`:
// one `ShapeResult` per tensor-carrying node, one `EdgeVerdict` per edge id,
// and graph-level warnings for edges the engine had to ignore.
//
// Preconditions: none; dangling edges, unknown handles, repeated edges and
//                cycles are all accepted.
// Postconditions: every non-Board node has exactly one result;
//                 `Resolved ⇔ output_shape.is_some() ∧ error.is_none()`;
//                 identical graphs produce identical results.
// Failure modes: none at the call level; failures are per-node data.
// Side effects: `log` output at debug/trace level only.

use std::collections::{BTreeMap, HashMap, VecDeque};

use log::{debug, trace};
use serde::Serialize;

use crate::diag::{codes, DiagCode, Diagnostic};
use crate::error::{Failure, ShapeError};
use crate::graph::{EdgeRecord, Graph, NodeRecord};
use crate::id::{EdgeId, NodeId};
use crate::param::check_schema;
use crate::registry::{compute_output_shape, InputShapes};
use crate::shape::Shape;

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Resolved,
    Blocked,
}

/// Why a node is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub code: DiagCode,
    pub message: String,
    pub error: ShapeError,
    /// Input handle the failure is attributed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Incoming edges the failure is attributed to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeId>,
    /// Node whose local failure this one is inherited from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<NodeId>,
}

impl ErrorInfo {
    fn new(failure: Failure, edges: Vec<EdgeId>) -> Self {
        let origin = match &failure.error {
            ShapeError::UpstreamError { origin } => Some(origin.clone()),
            _ => None,
        };
        ErrorInfo {
            code: failure.code(),
            message: failure.error.to_string(),
            error: failure.error,
            handle: failure.handle,
            edges,
            origin,
        }
    }
}

/// Result of one node for one recompute pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeResult {
    pub state: NodeState,
    pub output_shape: Option<Shape>,
    pub error: Option<ErrorInfo>,
}

impl ShapeResult {
    pub fn resolved(shape: Shape) -> Self {
        ShapeResult {
            state: NodeState::Resolved,
            output_shape: Some(shape),
            error: None,
        }
    }

    pub fn blocked(error: ErrorInfo) -> Self {
        ShapeResult {
            state: NodeState::Blocked,
            output_shape: None,
            error: Some(error),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == NodeState::Resolved
    }

    pub fn shape(&self) -> Option<&Shape> {
        self.output_shape.as_ref()
    }
}

pub type ShapeMap = BTreeMap<NodeId, ShapeResult>;

/// How an edge looks after a recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EdgeVerdict {
    /// Carries `shape` into a node that accepted it.
    Ok { shape: Shape },
    /// The target's failure is attributed to this edge.
    Invalid { code: DiagCode, message: String },
    /// The source produced no shape (blocked, or part of a cycle).
    Inactive,
    /// Not considered by the engine; see the matching warning.
    Ignored { code: DiagCode },
}

impl EdgeVerdict {
    pub fn is_invalid(&self) -> bool {
        matches!(self, EdgeVerdict::Invalid { .. })
    }
}

/// Everything one `recompute` call produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recomputation {
    pub nodes: ShapeMap,
    pub edges: BTreeMap<EdgeId, EdgeVerdict>,
    pub warnings: Vec<Diagnostic>,
}

impl Recomputation {
    pub fn get(&self, node: &NodeId) -> Option<&ShapeResult> {
        self.nodes.get(node)
    }

    pub fn shape_of(&self, node: &NodeId) -> Option<&Shape> {
        self.nodes.get(node).and_then(ShapeResult::shape)
    }

    pub fn error_of(&self, node: &NodeId) -> Option<&ErrorInfo> {
        self.nodes.get(node).and_then(|r| r.error.as_ref())
    }

    /// The node whose local failure explains why `node` is blocked: itself
    /// for a local failure or a cycle, the recorded origin for an inherited
    /// one. `None` when `node` is resolved or absent.
    pub fn origin_of<'a>(&'a self, node: &'a NodeId) -> Option<&'a NodeId> {
        let info = self.error_of(node)?;
        Some(info.origin.as_ref().unwrap_or(node))
    }

    pub fn blocked(&self) -> impl Iterator<Item = (&NodeId, &ErrorInfo)> {
        self.nodes
            .iter()
            .filter_map(|(id, r)| r.error.as_ref().map(|e| (id, e)))
    }

    /// Every node resolved and no edge marked invalid.
    pub fn is_valid(&self) -> bool {
        self.nodes.values().all(ShapeResult::is_resolved)
            && !self.edges.values().any(EdgeVerdict::is_invalid)
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Recompute every node's output shape from scratch.
pub fn recompute(graph: &Graph) -> Recomputation {
    let mut warnings = Vec::new();
    for id in graph.duplicate_nodes() {
        warnings.push(
            Diagnostic::warning(codes::W0203, format!("node id '{}' appears more than once", id))
                .with_node(id.clone())
                .with_hint("only the first node with this id is checked"),
        );
    }

    let classes = classify_edges(graph, &mut warnings);
    let active: Vec<&EdgeRecord> = graph
        .edges()
        .iter()
        .zip(&classes)
        .filter(|(_, c)| matches!(c, EdgeClass::Active))
        .map(|(e, _)| e)
        .collect();

    let nodes: Vec<&NodeRecord> = graph.nodes().filter(|n| n.block.carries_tensors()).collect();
    let (order, stuck) = topological_order(&nodes, &active);
    debug!(
        "recompute: {} nodes, {} active edges, {} in cycles",
        nodes.len(),
        active.len(),
        stuck.len()
    );

    let mut incoming: HashMap<&NodeId, Vec<&EdgeRecord>> = HashMap::new();
    for &edge in &active {
        incoming.entry(&edge.target).or_default().push(edge);
    }

    let mut results = ShapeMap::new();
    for node in &stuck {
        results.insert(
            node.id.clone(),
            ShapeResult::blocked(ErrorInfo::new(ShapeError::CycleDetected.into(), Vec::new())),
        );
    }
    for node in order {
        let edges = incoming.get(&node.id).map(Vec::as_slice).unwrap_or(&[]);
        let result = evaluate(node, edges, &results);
        trace!("{} ({}): {:?}", node.id, node.block, result.state);
        results.insert(node.id.clone(), result);
    }

    let edges = edge_verdicts(graph, &classes, &results);
    Recomputation {
        nodes: results,
        edges,
        warnings,
    }
}

// ── Edge classification ─────────────────────────────────────────────────────

enum EdgeClass {
    Active,
    Ignored(DiagCode),
}

/// Edges `recompute` takes into account, in graph order. The connection
/// validator uses this to decide whether a handle is already occupied.
pub(crate) fn active_edges(graph: &Graph) -> Vec<&EdgeRecord> {
    let mut kept: Vec<&EdgeRecord> = Vec::new();
    for edge in graph.edges() {
        if classify(graph, edge, &kept).is_ok() {
            kept.push(edge);
        }
    }
    kept
}

fn classify_edges(graph: &Graph, warnings: &mut Vec<Diagnostic>) -> Vec<EdgeClass> {
    let mut classes = Vec::with_capacity(graph.edge_count());
    let mut kept: Vec<&EdgeRecord> = Vec::new();
    for edge in graph.edges() {
        let class = match classify(graph, edge, &kept) {
            Ok(()) => {
                kept.push(edge);
                EdgeClass::Active
            }
            Err(warning) => {
                let code = warning.code.unwrap_or(codes::W0200);
                warnings.push(warning.with_edge(edge.id.clone()));
                EdgeClass::Ignored(code)
            }
        };
        classes.push(class);
    }
    classes
}

fn classify(graph: &Graph, edge: &EdgeRecord, kept: &[&EdgeRecord]) -> Result<(), Diagnostic> {
    let endpoint = |id: &NodeId| {
        graph.node(id).ok_or_else(|| {
            Diagnostic::warning(
                codes::W0200,
                format!("edge '{}' references missing node '{}'", edge.id, id),
            )
        })
    };
    let source = endpoint(&edge.source)?;
    let target = endpoint(&edge.target)?;

    if !source.block.has_output(&edge.source_handle) {
        return Err(unknown_handle(edge, source, &edge.source_handle, "output"));
    }
    if target.block.input(&edge.target_handle).is_none() {
        return Err(unknown_handle(edge, target, &edge.target_handle, "input"));
    }
    if kept.iter().any(|k| k.same_connection(edge)) {
        return Err(Diagnostic::warning(
            codes::W0202,
            format!(
                "edge '{}' repeats an existing connection {}.{} -> {}.{}",
                edge.id, edge.source, edge.source_handle, edge.target, edge.target_handle
            ),
        ));
    }
    Ok(())
}

fn unknown_handle(edge: &EdgeRecord, node: &NodeRecord, handle: &str, side: &str) -> Diagnostic {
    let diag = Diagnostic::warning(
        codes::W0201,
        format!(
            "edge '{}' uses unknown {} handle '{}' on '{}' ({})",
            edge.id, side, handle, node.id, node.block
        ),
    )
    .with_node(node.id.clone());
    let names: Vec<&str> = if side == "output" {
        node.block.outputs().to_vec()
    } else {
        node.block.inputs().iter().map(|h| h.name).collect()
    };
    if names.is_empty() {
        diag.with_hint(format!("{} has no {} handles", node.block, side))
    } else {
        diag.with_hint(format!("expected one of: {}", names.join(", ")))
    }
}

// ── Ordering ────────────────────────────────────────────────────────────────

/// Kahn's algorithm with deterministic (id-sorted) tie breaking. Returns the
/// processing order and, separately, every node the sweep never reached.
fn topological_order<'g>(
    nodes: &[&'g NodeRecord],
    edges: &[&EdgeRecord],
) -> (Vec<&'g NodeRecord>, Vec<&'g NodeRecord>) {
    let mut in_degree: HashMap<&NodeId, usize> = HashMap::new();
    let mut adj: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for node in nodes {
        in_degree.insert(&node.id, 0);
    }
    for edge in edges {
        if let Some(deg) = in_degree.get_mut(&edge.target) {
            *deg += 1;
        }
        adj.entry(&edge.source).or_default().push(&edge.target);
    }

    // `nodes` arrives in id order, so the initial queue is already sorted.
    let mut queue: VecDeque<&NodeId> = nodes
        .iter()
        .map(|n| &n.id)
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut visited: Vec<&NodeId> = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        visited.push(id);
        if let Some(neighbors) = adj.get(id) {
            let mut sorted = neighbors.clone();
            sorted.sort();
            for next in sorted {
                if let Some(deg) = in_degree.get_mut(next) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    let by_id: HashMap<&NodeId, &'g NodeRecord> = nodes.iter().map(|n| (&n.id, *n)).collect();
    let order = visited.iter().filter_map(|id| by_id.get(id).copied()).collect();
    let stuck = nodes
        .iter()
        .copied()
        .filter(|n| in_degree.get(&n.id).is_some_and(|d| *d > 0))
        .collect();
    (order, stuck)
}

// ── Per-node evaluation ─────────────────────────────────────────────────────

fn evaluate(node: &NodeRecord, incoming: &[&EdgeRecord], results: &ShapeMap) -> ShapeResult {
    match try_evaluate(node, incoming, results) {
        Ok(shape) => ShapeResult::resolved(shape),
        Err(failure) => {
            let edges = blamed_edges(&failure, incoming, results);
            ShapeResult::blocked(ErrorInfo::new(failure, edges))
        }
    }
}

/// Incoming edges a failure is attributed to. An inherited failure blames
/// only the edges whose source is blocked; a merge failure that names an
/// input position blames that edge alone.
fn blamed_edges(failure: &Failure, incoming: &[&EdgeRecord], results: &ShapeMap) -> Vec<EdgeId> {
    let Some(handle) = &failure.handle else {
        return Vec::new();
    };
    let inherited = matches!(failure.error, ShapeError::UpstreamError { .. });
    incoming
        .iter()
        .filter(|e| &e.target_handle == handle)
        .enumerate()
        .filter(|(i, e)| {
            if inherited {
                results.get(&e.source).and_then(ShapeResult::shape).is_none()
            } else {
                failure.input.is_none_or(|input| input == *i)
            }
        })
        .map(|(_, e)| e.id.clone())
        .collect()
}

/// Local checks first (schema, handle occupancy, missing inputs), then
/// inherited failures, then the transfer function itself.
fn try_evaluate(
    node: &NodeRecord,
    incoming: &[&EdgeRecord],
    results: &ShapeMap,
) -> Result<Shape, Failure> {
    let block = node.block;
    check_schema(block.params(), &node.params)?;

    for handle in block.inputs() {
        let count = incoming
            .iter()
            .filter(|e| e.target_handle == handle.name)
            .count();
        if count == 0 {
            return Err(Failure::at(
                handle.name,
                ShapeError::MissingInput {
                    handle: handle.name.to_string(),
                },
            ));
        }
        if count > 1 && !handle.merge {
            return Err(Failure::at(
                handle.name,
                ShapeError::HandleConflict {
                    handle: handle.name.to_string(),
                    count,
                },
            ));
        }
    }

    let mut inputs = InputShapes::new();
    for edge in incoming {
        match results.get(&edge.source) {
            Some(ShapeResult {
                output_shape: Some(shape),
                ..
            }) => inputs.push(&edge.target_handle, shape.clone()),
            other => {
                let origin = other
                    .and_then(|r| r.error.as_ref())
                    .and_then(|e| e.origin.clone())
                    .unwrap_or_else(|| edge.source.clone());
                return Err(Failure::at(
                    &edge.target_handle,
                    ShapeError::UpstreamError { origin },
                ));
            }
        }
    }

    compute_output_shape(block, &node.params, &inputs)
}

// ── Edge verdicts ───────────────────────────────────────────────────────────

fn edge_verdicts(
    graph: &Graph,
    classes: &[EdgeClass],
    results: &ShapeMap,
) -> BTreeMap<EdgeId, EdgeVerdict> {
    let mut verdicts = BTreeMap::new();
    for (edge, class) in graph.edges().iter().zip(classes) {
        let verdict = match class {
            EdgeClass::Ignored(code) => EdgeVerdict::Ignored { code: *code },
            EdgeClass::Active => active_verdict(edge, results),
        };
        // A repeated id keeps the verdict of its first occurrence.
        verdicts.entry(edge.id.clone()).or_insert(verdict);
    }
    verdicts
}

fn active_verdict(edge: &EdgeRecord, results: &ShapeMap) -> EdgeVerdict {
    let Some(shape) = results.get(&edge.source).and_then(ShapeResult::shape) else {
        return EdgeVerdict::Inactive;
    };
    match results.get(&edge.target).and_then(|r| r.error.as_ref()) {
        Some(info) if info.edges.contains(&edge.id) => EdgeVerdict::Invalid {
            code: info.code,
            message: info.message.clone(),
        },
        _ => EdgeVerdict::Ok {
            shape: shape.clone(),
        },
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
