// nsc — Neural Shape Checker
//
// Library root. Shape inference, connection validation and the graph sketch
// front end.

pub mod ast;
pub mod block;
pub mod connect;
pub mod diag;
pub mod dot;
pub mod error;
pub mod graph;
pub mod id;
pub mod lexer;
pub mod load;
pub mod param;
pub mod parser;
pub mod propagate;
pub mod registry;
pub mod report;
pub mod shape;
pub mod sketch;

pub use block::BlockType;
pub use connect::{validate_against, validate_connection, ProposedEdge, ValidationResult};
pub use error::{Failure, ShapeError};
pub use graph::{EdgeRecord, Graph, NodeRecord};
pub use id::{EdgeId, NodeId};
pub use param::{ParamSet, ParamValue};
pub use propagate::{recompute, EdgeVerdict, Recomputation, ShapeResult};
pub use registry::compute_output_shape;
pub use shape::{Dim, Shape};
