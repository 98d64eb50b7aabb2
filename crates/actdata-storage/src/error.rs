//! Storage error types for actdata-storage.
//!
//! [`StorageError`] covers snapshot (de)serialization, file access, version
//! conversion and post-load integrity checks.

use actdata_core::CoreError;
use thiserror::Error;

/// Errors produced by persistence and conversion.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// No chain of registered conversions leads from `from` to `to`.
    #[error("no conversion path from version {from} to version {to}")]
    UnreachableVersion { from: u32, to: u32 },

    #[error("conversion {old} -> {new} is already registered")]
    DuplicateConversion { old: u32, new: u32 },

    /// A conversion routine failed; the document keeps its partial state.
    #[error("conversion {old} -> {new} failed: {source}")]
    RoutineFailed {
        old: u32,
        new: u32,
        source: Box<StorageError>,
    },

    /// Nodes that are not well-formed after loading.
    #[error("ill-formed nodes after load: {}", .nodes.join(", "))]
    IllFormed { nodes: Vec<String> },

    #[error("node not found: '{node}'")]
    UnknownNode { node: String },

    /// Raised by conversion routines.
    #[error("conversion error: {reason}")]
    Conversion { reason: String },
}
