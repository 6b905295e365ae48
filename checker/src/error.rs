// error.rs — Shape failure taxonomy
//
// `ShapeError` is the closed set of reasons a node can be blocked or a proposed
// connection rejected. Failures are data: they are stored in result maps,
// rendered to users, and never abort a recompute.

use serde::Serialize;
use thiserror::Error;

use crate::diag::{codes, DiagCode};
use crate::id::NodeId;
use crate::shape::Shape;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum ShapeError {
    #[error("required input '{handle}' is not connected")]
    MissingInput { handle: String },

    #[error("{param} expects {expected}, but the input provides {actual}")]
    DimensionMismatch {
        param: String,
        expected: u64,
        actual: u64,
    },

    #[error("input shapes differ: {expected} vs {actual}")]
    ShapeMismatch { expected: Shape, actual: Shape },

    #[error("inputs disagree outside concat axis {axis}: {expected} vs {actual}")]
    AxisMismatch {
        axis: usize,
        expected: Shape,
        actual: Shape,
    },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch { expected: u64, actual: u64 },

    #[error("convolution reduces {axis} to {size}")]
    InvalidSpatialReduction { axis: String, size: i64 },

    #[error("expected input of rank {expected}, got rank {actual}")]
    RankMismatch { expected: String, actual: usize },

    #[error("axis {axis} is out of range for rank {rank}")]
    AxisOutOfRange { axis: i64, rank: usize },

    #[error("sequence length {actual} exceeds max_len {max_len}")]
    SequenceTooLong { max_len: u64, actual: u64 },

    #[error("unknown dataset '{dataset}'")]
    UnknownDataset { dataset: String },

    #[error("invalid parameter '{key}': {reason}")]
    InvalidParam { key: String, reason: String },

    #[error("node is inside or downstream of a cycle")]
    CycleDetected,

    #[error("blocked by upstream node '{origin}'")]
    UpstreamError { origin: NodeId },

    #[error("input '{handle}' accepts one connection, found {count}")]
    HandleConflict { handle: String, count: usize },

    #[error("handle '{handle}' is unavailable: {reason}")]
    HandleUnavailable { handle: String, reason: String },

    #[error("cannot connect node '{node}' to itself")]
    SelfConnection { node: NodeId },

    #[error("node '{node}' does not exist")]
    UnknownNode { node: NodeId },
}

impl ShapeError {
    /// Stable diagnostic code for this failure.
    pub fn code(&self) -> DiagCode {
        match self {
            ShapeError::MissingInput { .. } => codes::E0100,
            ShapeError::DimensionMismatch { .. } => codes::E0101,
            ShapeError::ShapeMismatch { .. } => codes::E0102,
            ShapeError::AxisMismatch { .. } => codes::E0103,
            ShapeError::EmbeddingDimMismatch { .. } => codes::E0104,
            ShapeError::InvalidSpatialReduction { .. } => codes::E0105,
            ShapeError::RankMismatch { .. } => codes::E0106,
            ShapeError::AxisOutOfRange { .. } => codes::E0107,
            ShapeError::SequenceTooLong { .. } => codes::E0108,
            ShapeError::UnknownDataset { .. } => codes::E0110,
            ShapeError::InvalidParam { .. } => codes::E0111,
            ShapeError::CycleDetected => codes::E0120,
            ShapeError::UpstreamError { .. } => codes::E0121,
            ShapeError::HandleConflict { .. } => codes::E0122,
            ShapeError::HandleUnavailable { .. } => codes::E0130,
            ShapeError::SelfConnection { .. } => codes::E0131,
            ShapeError::UnknownNode { .. } => codes::E0132,
        }
    }

    /// Whether the failure originates at the node itself rather than being
    /// inherited from the graph around it.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            ShapeError::CycleDetected | ShapeError::UpstreamError { .. }
        )
    }

    pub fn invalid_param(key: &str, reason: impl Into<String>) -> Self {
        ShapeError::InvalidParam {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

// ── Failure ─────────────────────────────────────────────────────────────────

/// A transfer-function failure: the error plus the input handle it is
/// attributed to. `handle` is `None` for failures caused by parameters alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub error: ShapeError,
    pub handle: Option<String>,
    /// Position of the offending shape among the handle's inputs, for merge
    /// handles. `None` blames every edge on the handle.
    pub input: Option<usize>,
}

impl Failure {
    pub fn at(handle: &str, error: ShapeError) -> Self {
        Failure {
            error,
            handle: Some(handle.to_string()),
            input: None,
        }
    }

    pub fn at_input(handle: &str, input: usize, error: ShapeError) -> Self {
        Failure {
            input: Some(input),
            ..Failure::at(handle, error)
        }
    }

    pub fn code(&self) -> DiagCode {
        self.error.code()
    }
}

impl From<ShapeError> for Failure {
    fn from(error: ShapeError) -> Self {
        Failure {
            error,
            handle: None,
            input: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_message() {
        let e = ShapeError::DimensionMismatch {
            param: "in_features".to_string(),
            expected: 10,
            actual: 28,
        };
        assert_eq!(e.to_string(), "in_features expects 10, but the input provides 28");
        assert_eq!(e.code(), codes::E0101);
    }

    #[test]
    fn inherited_failures_are_not_local() {
        assert!(!ShapeError::CycleDetected.is_local());
        assert!(!ShapeError::UpstreamError {
            origin: NodeId::from("a")
        }
        .is_local());
        assert!(ShapeError::MissingInput {
            handle: "in".to_string()
        }
        .is_local());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let e = ShapeError::EmbeddingDimMismatch {
            expected: 32,
            actual: 64,
        };
        assert_eq!(
            serde_json::to_string(&e).unwrap(),
            r#"{"kind":"EmbeddingDimMismatch","expected":32,"actual":64}"#
        );
    }

    #[test]
    fn failure_from_error_has_no_handle() {
        let f: Failure = ShapeError::UnknownDataset {
            dataset: "IMAGENET".to_string(),
        }
        .into();
        assert_eq!(f.handle, None);
        assert_eq!(f.code(), codes::E0110);
    }
}
