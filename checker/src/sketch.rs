// sketch.rs — Lowering of parsed sketches into graphs
//
// Turns a `Sketch` AST into the same `Graph` snapshot the JSON loader
// produces. Node declarations are collected first so chains may mention nodes
// declared further down. Edge ids are `e0, e1, …` in source order.
//
// Preconditions: none; `load` lexes and parses itself.
// Postconditions: on success, every edge endpoint names a declared node.
// Failure modes: syntax (E0300), unknown block type (E0301), undeclared
//                node (E0302), duplicate node name (E0303).
// Side effects: none.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::ast::{self, Span, Statement};
use crate::block::{BlockType, DEFAULT_INPUT, DEFAULT_OUTPUT};
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::graph::{EdgeRecord, Graph, NodeRecord};
use crate::id::EdgeIdAllocator;
use crate::param::{ParamSet, ParamValue};

/// A diagnostic anchored to a byte range of the sketch source.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchDiagnostic {
    pub diagnostic: Diagnostic,
    pub span: Span,
}

impl SketchDiagnostic {
    fn new(code: DiagCode, message: impl Into<String>, span: Span) -> Self {
        SketchDiagnostic {
            diagnostic: Diagnostic::error(code, message),
            span,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.diagnostic = self.diagnostic.with_hint(hint);
        self
    }

    /// 1-based line and column of the span start.
    pub fn position(&self, source: &str) -> (usize, usize) {
        let offset = self.span.start.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let col = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
        (line, col)
    }

    /// `path:line:col: error[E0302]: …`
    pub fn render(&self, source: &str, path: &str) -> String {
        let (line, col) = self.position(source);
        format!("{}:{}:{}: {}", path, line, col, self.diagnostic)
    }
}

impl fmt::Display for SketchDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.diagnostic)
    }
}

/// All errors from one failed sketch load.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("sketch has {} error(s)", .0.len())]
pub struct SketchErrors(pub Vec<SketchDiagnostic>);

// ── Public entry point ──────────────────────────────────────────────────────

/// Lex, parse and lower a sketch.
pub fn load(source: &str) -> Result<Graph, SketchErrors> {
    let parsed = crate::parser::parse(source);
    let mut errors: Vec<SketchDiagnostic> = parsed
        .errors
        .iter()
        .map(|e| {
            let span = *e.span();
            SketchDiagnostic::new(codes::E0300, e.to_string(), span)
        })
        .collect();

    let Some(sketch) = parsed.sketch else {
        return Err(SketchErrors(errors));
    };
    let graph = lower(&sketch, &mut errors);
    if errors.is_empty() {
        Ok(graph)
    } else {
        Err(SketchErrors(errors))
    }
}

/// Lower a parsed sketch. Errors are appended to `errors`; the returned graph
/// holds everything that lowered cleanly.
pub fn lower(sketch: &ast::Sketch, errors: &mut Vec<SketchDiagnostic>) -> Graph {
    let mut graph = Graph::new();
    let mut declared: HashSet<&str> = HashSet::new();

    for stmt in &sketch.statements {
        let Statement::Node(decl) = stmt else {
            continue;
        };
        if !declared.insert(decl.name.name.as_str()) {
            errors.push(SketchDiagnostic::new(
                codes::E0303,
                format!("node '{}' is declared more than once", decl.name.name),
                decl.name.span,
            ));
            continue;
        }
        match lower_node(decl) {
            Ok(node) => {
                graph.insert_node(node);
            }
            Err(e) => errors.push(e),
        }
    }

    let mut ids = EdgeIdAllocator::new();
    for stmt in &sketch.statements {
        let Statement::Chain(chain) = stmt else {
            continue;
        };
        for ep in &chain.endpoints {
            if !declared.contains(ep.node.name.as_str()) {
                errors.push(SketchDiagnostic::new(
                    codes::E0302,
                    format!("node '{}' is not declared", ep.node.name),
                    ep.node.span,
                ));
            }
        }
        for (i, pair) in chain.endpoints.windows(2).enumerate() {
            let (from, to) = (&pair[0], &pair[1]);
            // Only the head of a chain may name an output handle; later
            // endpoints use their handle for the incoming edge.
            let source_handle = match (&from.handle, i) {
                (Some(h), 0) => h.name.as_str(),
                _ => DEFAULT_OUTPUT,
            };
            let target_handle = to.handle.as_ref().map_or(DEFAULT_INPUT, |h| h.name.as_str());
            graph.push_edge(EdgeRecord::new(
                ids.alloc().0,
                from.node.name.as_str(),
                source_handle,
                to.node.name.as_str(),
                target_handle,
            ));
        }
    }

    graph
}

fn lower_node(decl: &ast::NodeDecl) -> Result<NodeRecord, SketchDiagnostic> {
    let block = BlockType::from_name(&decl.block.name).ok_or_else(|| {
        let known: Vec<&str> = BlockType::ALL.iter().map(|t| t.name()).collect();
        SketchDiagnostic::new(
            codes::E0301,
            format!("unknown block type '{}'", decl.block.name),
            decl.block.span,
        )
        .with_hint(format!("known types: {}", known.join(", ")))
    })?;

    let mut params = ParamSet::new();
    if let Some(function) = BlockType::implied_activation(&decl.block.name) {
        params.set("activation", function);
    }
    for arg in &decl.args {
        let value = match &arg.value {
            ast::Value::Number(n, _) => ParamValue::Number(*n),
            ast::Value::Bool(b, _) => ParamValue::Bool(*b),
            ast::Value::Text(s, _) => ParamValue::Text(s.clone()),
            ast::Value::Array(items, _) => ParamValue::Seq(items.clone()),
        };
        params.set(arg.key.name.as_str(), value);
    }
    Ok(NodeRecord::new(decl.name.name.as_str(), block, params))
}

// ── Tests ───────────────────────────────────────────────────────────────────
