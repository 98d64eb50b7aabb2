//! Stable ID newtypes for document entities.
//!
//! Every entity of the document lives in the label arena of the
//! [`LabelStore`](crate::label::LabelStore); the IDs below are typed views of
//! the same arena index, so a `NodeId` cannot be used where a `ParameterId`
//! is expected even though both address labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Arena index of a label. Indices are never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabelId(pub u32);

/// Identity of a Node: the label the Node is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identity of a Parameter: the label the Parameter is rooted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterId(pub u32);

// Display implementations -- just print the inner value.

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Bridges between typed IDs and the raw label index.

impl From<NodeId> for LabelId {
    fn from(id: NodeId) -> Self {
        LabelId(id.0)
    }
}

impl From<ParameterId> for LabelId {
    fn from(id: ParameterId) -> Self {
        LabelId(id.0)
    }
}

impl From<LabelId> for NodeId {
    fn from(label: LabelId) -> Self {
        NodeId(label.0)
    }
}

impl From<LabelId> for ParameterId {
    fn from(label: LabelId) -> Self {
        ParameterId(label.0)
    }
}
