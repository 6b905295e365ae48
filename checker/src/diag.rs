// diag.rs — Unified diagnostics model
//
// Shared diagnostic types for graph-level warnings, sketch front-end errors,
// and the codes attached to node failures. Node failures themselves are typed
// `ShapeError`s; each maps onto one of the codes below.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::id::{EdgeId, NodeId};

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`, `W0200`).
///
/// Once assigned, a code must never be reassigned to a different meaning:
/// presentation layers key styling and help text off these strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DiagCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Code table.
pub mod codes {
    use super::DiagCode;

    // E01xx: node shape failures
    pub const E0100: DiagCode = DiagCode("E0100"); // missing input
    pub const E0101: DiagCode = DiagCode("E0101"); // dimension mismatch
    pub const E0102: DiagCode = DiagCode("E0102"); // shape mismatch
    pub const E0103: DiagCode = DiagCode("E0103"); // axis mismatch
    pub const E0104: DiagCode = DiagCode("E0104"); // embedding dim mismatch
    pub const E0105: DiagCode = DiagCode("E0105"); // invalid spatial reduction
    pub const E0106: DiagCode = DiagCode("E0106"); // rank mismatch
    pub const E0107: DiagCode = DiagCode("E0107"); // axis out of range
    pub const E0108: DiagCode = DiagCode("E0108"); // sequence too long
    pub const E0110: DiagCode = DiagCode("E0110"); // unknown dataset
    pub const E0111: DiagCode = DiagCode("E0111"); // invalid parameter
    pub const E0120: DiagCode = DiagCode("E0120"); // cycle detected
    pub const E0121: DiagCode = DiagCode("E0121"); // upstream error
    pub const E0122: DiagCode = DiagCode("E0122"); // handle conflict

    // E013x: connection pre-flight rejections
    pub const E0130: DiagCode = DiagCode("E0130"); // handle unavailable
    pub const E0131: DiagCode = DiagCode("E0131"); // self connection
    pub const E0132: DiagCode = DiagCode("E0132"); // unknown node

    // W02xx: structural graph warnings
    pub const W0200: DiagCode = DiagCode("W0200"); // dangling edge
    pub const W0201: DiagCode = DiagCode("W0201"); // unknown handle
    pub const W0202: DiagCode = DiagCode("W0202"); // duplicate edge
    pub const W0203: DiagCode = DiagCode("W0203"); // duplicate node id

    // E03xx: sketch front end
    pub const E0300: DiagCode = DiagCode("E0300"); // syntax error
    pub const E0301: DiagCode = DiagCode("E0301"); // unknown block type
    pub const E0302: DiagCode = DiagCode("E0302"); // undeclared node
    pub const E0303: DiagCode = DiagCode("E0303"); // duplicate node name
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic about the graph as a whole, or about one node/edge of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeId>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, or subject.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            message: message.into(),
            hint: None,
            node: None,
            edge: None,
        }
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message).with_code(code)
    }

    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_edge(mut self, edge: EdgeId) -> Self {
        self.edge = Some(edge);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
