//! Core error types for actdata-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Structural
//! failures (unknown types, out-of-range parameters, kind mismatches) live in
//! [`CoreError`]; command misuse lives in [`TransactionError`]; raw label
//! store failures live in [`LabelError`].

use thiserror::Error;

use crate::id::{LabelId, NodeId, ParameterId};
use crate::value::ParamKind;

/// Core errors produced by the actdata-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A Node type was instantiated without being registered.
    #[error("unknown node type: '{name}'")]
    UnknownType { name: String },

    /// A Node type name was registered twice.
    #[error("duplicate node type: '{name}'")]
    DuplicateType { name: String },

    /// A Parameter index exceeds the registered Parameter count of its Node.
    #[error("parameter index {index} out of range for node {node} ({count} registered)")]
    OutOfRange {
        node: NodeId,
        index: usize,
        count: usize,
    },

    /// No attached Node lives at the given ID.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// No attached Parameter lives at the given ID.
    #[error("parameter not found: ParameterId({id})", id = id.0)]
    ParameterNotFound { id: ParameterId },

    /// A registered Parameter slot has no label under its Node.
    #[error("node {node} has no parameter at index {index}")]
    MissingParameter { node: NodeId, index: usize },

    /// A value of the wrong kind was written to a Parameter.
    #[error("parameter {id} expects {expected:?}, got {actual:?}")]
    KindMismatch {
        id: ParameterId,
        expected: ParamKind,
        actual: ParamKind,
    },

    /// A snapshot was requested from a Parameter that holds no valid-kind value.
    #[error("parameter {id} is not well-formed")]
    IllFormedParameter { id: ParameterId },

    /// An entry does not address a location the operation accepts.
    #[error("invalid entry '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: String },

    /// A parent/child link would give a Node two parents or close a cycle.
    #[error("cannot link node {node}: {reason}")]
    Hierarchy { node: NodeId, reason: String },

    /// `paste_as_child` was given a clipboard with no Nodes.
    #[error("clipboard is empty")]
    EmptyClipboard,

    /// A transaction command was misused.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The label store rejected a mutation.
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Transaction command misuse. Always local to the offending call; the
/// document is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// `open_command` while a transaction is already open.
    #[error("a transaction is already open")]
    AlreadyOpen,

    /// `commit_command` or `abort_command` without an open transaction.
    #[error("no open transaction")]
    NoOpenTransaction,

    /// Undo or redo asked for more steps than the history holds.
    #[error("history range exceeded: requested {requested}, available {available}")]
    HistoryRange { requested: usize, available: usize },

    /// Undo, redo or a mode switch was called while a transaction is open.
    #[error("operation not allowed while a transaction is open")]
    TransactionActive,
}

/// Failures of the raw label store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    /// The label index was never allocated.
    #[error("unknown label: LabelId({id})", id = id.0)]
    UnknownLabel { id: LabelId },

    /// A mutation was attempted while recording without an open scope.
    #[error("mutation outside of an open scope")]
    NoOpenScope,

    /// A scope was opened while another one is open.
    #[error("a mutation scope is already open")]
    ScopeAlreadyOpen,

    /// The mark passed to `delta_since` is past the end of the scope history.
    #[error("scope mark {mark} is past the recorded history ({recorded})")]
    InvalidMark { mark: usize, recorded: usize },

    /// Every child tag under the parent is taken.
    #[error("no free child tag under LabelId({id})", id = parent.0)]
    TagOverflow { parent: LabelId },
}
