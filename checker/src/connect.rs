// connect.rs — Pre-flight validation of a proposed edge
//
// Called while the user is still dragging a connection, before the edge
// exists. The check never mutates the graph and never recomputes it: it
// reuses the source shape from the last `recompute` and runs the target's
// transfer rule with only the inputs it can already see.
//
// Check order: both nodes exist → handles exist and the target handle is free
// (unless it merges) → not a self-loop → target rule accepts the candidate
// shape. Without a known source shape the connection is provisionally valid.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::{DEFAULT_INPUT, DEFAULT_OUTPUT};
use crate::diag::DiagCode;
use crate::error::ShapeError;
use crate::graph::{EdgeRecord, Graph, NodeRecord};
use crate::id::{EdgeId, NodeId};
use crate::propagate::{active_edges, EdgeVerdict, Recomputation};
use crate::registry::{check_candidate, InputShapes};
use crate::shape::Shape;

/// A connection the user is about to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedEdge {
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

impl ProposedEdge {
    /// `source.out` → `target.in`.
    pub fn new(source: &str, target: &str) -> Self {
        Self::with_handles(source, DEFAULT_OUTPUT, target, DEFAULT_INPUT)
    }

    pub fn with_handles(source: &str, source_handle: &str, target: &str, target_handle: &str) -> Self {
        ProposedEdge {
            source: NodeId::from(source),
            source_handle: source_handle.to_string(),
            target: NodeId::from(target),
            target_handle: target_handle.to_string(),
        }
    }

    /// The edge record this proposal would become once committed.
    pub fn to_edge(&self, id: EdgeId) -> EdgeRecord {
        EdgeRecord {
            id,
            source: self.source.clone(),
            source_handle: self.source_handle.clone(),
            target: self.target.clone(),
            target_handle: self.target_handle.clone(),
        }
    }
}

impl fmt::Display for ProposedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source, self.source_handle, self.target, self.target_handle
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected SOURCE[.HANDLE]=TARGET[.HANDLE], got '{0}'")]
pub struct ProposalSyntaxError(pub String);

impl FromStr for ProposedEdge {
    type Err = ProposalSyntaxError;

    /// `a=b`, `a.out=b.key`, …
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ProposalSyntaxError(s.to_string());
        let (lhs, rhs) = s.split_once('=').ok_or_else(err)?;
        let endpoint = |side: &str, default: &str| -> Option<(String, String)> {
            let side = side.trim();
            let (node, handle) = side.split_once('.').unwrap_or((side, default));
            let (node, handle) = (node.trim(), handle.trim());
            if node.is_empty() || handle.is_empty() {
                None
            } else {
                Some((node.to_string(), handle.to_string()))
            }
        };
        let (source, source_handle) = endpoint(lhs, DEFAULT_OUTPUT).ok_or_else(err)?;
        let (target, target_handle) = endpoint(rhs, DEFAULT_INPUT).ok_or_else(err)?;
        Ok(ProposedEdge {
            source: NodeId::new(source),
            source_handle,
            target: NodeId::new(target),
            target_handle,
        })
    }
}

/// Verdict on a proposed edge. Ephemeral; never stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<DiagCode>,
    #[serde(skip)]
    pub failure: Option<ShapeError>,
}

impl ValidationResult {
    pub fn accept() -> Self {
        ValidationResult {
            valid: true,
            error: None,
            code: None,
            failure: None,
        }
    }

    pub fn reject(error: ShapeError) -> Self {
        ValidationResult {
            valid: false,
            error: Some(error.to_string()),
            code: Some(error.code()),
            failure: Some(error),
        }
    }
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Validate `proposal` given the source's last known output shape.
pub fn validate_connection(
    graph: &Graph,
    proposal: &ProposedEdge,
    known_source_shape: Option<&Shape>,
) -> ValidationResult {
    validate_with_peers(graph, proposal, known_source_shape, InputShapes::new())
}

/// Validate `proposal` against the last recompute of `graph`, taking the
/// source shape from it and also checking the candidate against the shapes
/// already arriving at the target's other inputs.
pub fn validate_against(
    graph: &Graph,
    last: &Recomputation,
    proposal: &ProposedEdge,
) -> ValidationResult {
    let mut peers = InputShapes::new();
    for edge in graph.edges().iter().filter(|e| e.target == proposal.target) {
        if matches!(last.edges.get(&edge.id), Some(EdgeVerdict::Ignored { .. })) {
            continue;
        }
        if let Some(shape) = last.shape_of(&edge.source) {
            peers.push(&edge.target_handle, shape.clone());
        }
    }
    validate_with_peers(graph, proposal, last.shape_of(&proposal.source), peers)
}

fn validate_with_peers(
    graph: &Graph,
    proposal: &ProposedEdge,
    known_source_shape: Option<&Shape>,
    peers: InputShapes,
) -> ValidationResult {
    match check(graph, proposal, known_source_shape, peers) {
        Ok(()) => ValidationResult::accept(),
        Err(error) => {
            debug!("rejecting {}: {}", proposal, error);
            ValidationResult::reject(error)
        }
    }
}

fn check(
    graph: &Graph,
    proposal: &ProposedEdge,
    known_source_shape: Option<&Shape>,
    mut peers: InputShapes,
) -> Result<(), ShapeError> {
    let source = lookup(graph, &proposal.source)?;
    let target = lookup(graph, &proposal.target)?;

    if !source.block.has_output(&proposal.source_handle) {
        return Err(unavailable(
            &proposal.source_handle,
            format!("{} has no output handle '{}'", source.block, proposal.source_handle),
        ));
    }
    let Some(handle) = target.block.input(&proposal.target_handle) else {
        return Err(unavailable(
            &proposal.target_handle,
            format!("{} has no input handle '{}'", target.block, proposal.target_handle),
        ));
    };
    if !handle.merge {
        let occupant = active_edges(graph)
            .into_iter()
            .find(|e| e.target == target.id && e.target_handle == handle.name);
        if let Some(edge) = occupant {
            return Err(unavailable(
                handle.name,
                format!("already connected from '{}'", edge.source),
            ));
        }
    }

    if source.id == target.id {
        return Err(ShapeError::SelfConnection {
            node: source.id.clone(),
        });
    }

    let Some(shape) = known_source_shape else {
        return Ok(());
    };
    peers.push(handle.name, shape.clone());
    check_candidate(target.block, &target.params, &peers).map_err(|f| f.error)
}

fn lookup<'g>(graph: &'g Graph, id: &NodeId) -> Result<&'g NodeRecord, ShapeError> {
    graph
        .node(id)
        .ok_or_else(|| ShapeError::UnknownNode { node: id.clone() })
}

fn unavailable(handle: &str, reason: String) -> ShapeError {
    ShapeError::HandleUnavailable {
        handle: handle.to_string(),
        reason,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
