//! Error types for dependency analysis and execution.

use actdata_core::{CoreError, Entry, ParamKind, ParameterId};
use thiserror::Error;

/// Failures while building the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A binding names an entry that is not an attached Parameter.
    #[error("tree function ParameterId({function}) references unknown parameter '{entry}'")]
    DanglingReference { function: ParameterId, entry: Entry },
}

/// Failures raised by a Tree Function body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FunctionError {
    #[error("input {index} rejected: {reason}")]
    InvalidInput { index: usize, reason: String },

    #[error("computation failed: {0}")]
    Computation(String),
}

/// Why a single vertex could not produce its outputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no tree function registered under '{name}'")]
    UnknownFunction { name: String },

    #[error("function takes {expected} inputs, binding supplies {actual}")]
    InputCount { expected: usize, actual: usize },

    #[error("input {index} must be {expected}, found {actual}")]
    InputKind {
        index: usize,
        expected: ParamKind,
        actual: String,
    },

    #[error("input {index} is not well-formed")]
    IllFormedInput { index: usize },

    #[error("input {index} is not valid")]
    InvalidInput { index: usize },

    #[error("function produces {expected} outputs, binding expects {actual}")]
    OutputCount { expected: usize, actual: usize },

    #[error("output {index} must be {expected}, function produced {actual}")]
    OutputKind {
        index: usize,
        expected: ParamKind,
        actual: ParamKind,
    },

    #[error(transparent)]
    Function(#[from] FunctionError),
}

/// Errors returned by the execution engine and background tasks.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The graph has loops; nothing was executed.
    #[error("dependency cycle through {count} parameters", count = .parameters.len())]
    Cycle { parameters: Vec<ParameterId> },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("tree function '{name}' is already registered")]
    DuplicateFunction { name: String },

    /// The document is held by an in-flight background execution.
    #[error("document is locked by a running execution")]
    DocumentBusy,

    #[error("execution task failed: {reason}")]
    TaskJoin { reason: String },
}
