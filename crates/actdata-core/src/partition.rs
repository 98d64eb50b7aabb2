//! Read-only Partition view: the typed collection of Nodes of one kind.

use crate::document::Document;
use crate::id::{LabelId, NodeId};
use crate::label::Entry;

#[derive(Debug, Clone, Copy)]
pub struct Partition<'a> {
    doc: &'a Document,
    node_type: &'a str,
    label: LabelId,
}

impl<'a> Partition<'a> {
    pub(crate) fn new(doc: &'a Document, node_type: &'a str, label: LabelId) -> Self {
        Partition {
            doc,
            node_type,
            label,
        }
    }

    pub fn node_type(&self) -> &'a str {
        self.node_type
    }

    pub fn entry(&self) -> Entry {
        self.doc
            .store
            .entry(self.label)
            .unwrap_or_else(|_| Entry::root())
    }

    /// Attached Nodes, in creation order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.doc.store.children(self.label).map(NodeId::from).collect()
    }

    pub fn len(&self) -> usize {
        self.doc.store.children(self.label).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
