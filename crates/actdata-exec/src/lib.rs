//! Dependency analysis and Tree-Function execution for actdata documents.
//!
//! # Modules
//!
//! - [`graph`]: the dependency graph between Tree-Function invocations
//! - [`analyzer`]: loop detection and cyclic Parameter sets
//! - [`iterator`]: level-ordered traversal from a root vertex
//! - [`function`]: the [`TreeFunction`] trait and its registry
//! - [`engine`]: ordered, incremental execution passes
//! - [`task`]: background passes over a shared document

pub mod analyzer;
pub mod engine;
pub mod error;
pub mod function;
pub mod graph;
pub mod iterator;
pub mod task;

pub use analyzer::{DependencyAnalyzer, GraphState, LoopStrategy};
pub use engine::{ExecuteOptions, ExecutionEngine, ExecutionReport, RunStatus, VertexStatus};
pub use error::{ExecError, FunctionError, GraphError, ValidationError};
pub use function::{FunctionRegistry, TreeFunction};
pub use graph::{DependencyGraph, Direction, Vertex, VertexId};
pub use iterator::LevelIterator;
pub use task::{ExecutionTask, SharedDocument};
