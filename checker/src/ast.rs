// AST node types for graph sketches.
//
// Every node carries a `SimpleSpan` so lowering errors can point back into
// the source.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// A complete sketch: a sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Sketch {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Node(NodeDecl),
    Chain(Chain),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Node(n) => n.span,
            Statement::Chain(c) => c.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── node_decl: IDENT '=' IDENT '(' args? ')' ──

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecl {
    pub name: Ident,
    pub block: Ident,
    pub args: Vec<ParamArg>,
    pub span: Span,
}

/// `key = value`
#[derive(Debug, Clone, PartialEq)]
pub struct ParamArg {
    pub key: Ident,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64, Span),
    Bool(bool, Span),
    /// String literal or bare identifier.
    Text(String, Span),
    Array(Vec<f64>, Span),
}

impl Value {
    pub fn span(&self) -> Span {
        match self {
            Value::Number(_, s) | Value::Bool(_, s) | Value::Text(_, s) | Value::Array(_, s) => *s,
        }
    }
}

// ── chain: endpoint ('->' endpoint)+ ──

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub endpoints: Vec<Endpoint>,
    pub span: Span,
}

/// `node` or `node.handle`
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub node: Ident,
    pub handle: Option<Ident>,
    pub span: Span,
}
