//! Read-only Node view and well-formedness reporting.

use serde::{Deserialize, Serialize};

use crate::document::{Document, NAME, NODE_TYPE};
use crate::error::CoreError;
use crate::id::{LabelId, NodeId, ParameterId};
use crate::label::{AttrValue, Entry};
use crate::parameter::Parameter;
use crate::schema::NodeSchema;

/// Outcome of a well-formedness check on one Node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellFormedReport {
    pub node: NodeId,
    pub data_object_id: String,
    pub node_type: String,
    /// Parameter count declared by the Node's schema.
    pub expected_count: usize,
    /// Parameters actually attached under the Node.
    pub actual_count: usize,
    /// Slots whose Parameter has the wrong kind, or that are mandatory and
    /// not well-formed.
    pub ill_formed: Vec<usize>,
}

impl WellFormedReport {
    pub fn is_well_formed(&self) -> bool {
        self.expected_count == self.actual_count && self.ill_formed.is_empty()
    }
}

/// A Node living in a document.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub(crate) fn new(doc: &'a Document, id: NodeId) -> Self {
        Node { doc, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn label(&self) -> LabelId {
        self.id.into()
    }

    pub fn entry(&self) -> Entry {
        self.doc
            .store
            .entry(self.label())
            .unwrap_or_else(|_| Entry::root())
    }

    /// Process-unique identifier derived from the Node's label.
    pub fn data_object_id(&self) -> String {
        self.entry().to_string()
    }

    pub fn node_type(&self) -> &'a str {
        self.doc
            .store
            .attribute(self.label(), NODE_TYPE)
            .and_then(AttrValue::as_text)
            .unwrap_or("")
    }

    pub fn schema(&self) -> Result<&'a NodeSchema, CoreError> {
        self.doc.registry.get(self.node_type())
    }

    pub fn name(&self) -> Option<&'a str> {
        self.doc
            .store
            .attribute(self.label(), NAME)
            .and_then(AttrValue::as_text)
    }

    pub fn is_attached(&self) -> bool {
        self.doc.store.is_alive(self.label())
    }

    pub fn parent_node(&self) -> Option<NodeId> {
        self.doc.parent_node(self.id)
    }

    pub fn child_nodes(&self) -> Vec<NodeId> {
        self.doc.child_nodes(self.id)
    }

    /// The Parameter registered at `index`.
    pub fn parameter(&self, index: usize) -> Result<Parameter<'a>, CoreError> {
        let count = self.schema()?.param_count();
        if index >= count {
            return Err(CoreError::OutOfRange {
                node: self.id,
                index,
                count,
            });
        }
        self.doc
            .store
            .find_child(self.label(), index as u32 + 1)
            .map(|label| Parameter::new(self.doc, ParameterId::from(label)))
            .ok_or(CoreError::MissingParameter {
                node: self.id,
                index,
            })
    }

    /// Parameter by slot name.
    pub fn parameter_by_name(&self, name: &str) -> Result<Parameter<'a>, CoreError> {
        let schema = self.schema()?;
        let index = schema.index_of(name).ok_or(CoreError::OutOfRange {
            node: self.id,
            index: schema.param_count(),
            count: schema.param_count(),
        })?;
        self.parameter(index)
    }

    /// Attached Parameters, ordered by index. Not limited to the schema.
    pub fn parameters(&self) -> Vec<Parameter<'a>> {
        self.doc
            .parameter_labels(self.id)
            .into_iter()
            .map(|id| Parameter::new(self.doc, id))
            .collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.doc.parameter_labels(self.id).len()
    }

    pub fn well_formed_report(&self) -> WellFormedReport {
        let params = self.parameters();
        let mut report = WellFormedReport {
            node: self.id,
            data_object_id: self.data_object_id(),
            node_type: self.node_type().to_string(),
            expected_count: 0,
            actual_count: params.len(),
            ill_formed: Vec::new(),
        };
        let Ok(schema) = self.schema() else {
            return report;
        };
        report.expected_count = schema.param_count();

        for (index, slot) in schema.slots.iter().enumerate() {
            let Some(param) = params.iter().find(|p| p.index() == index) else {
                report.ill_formed.push(index);
                continue;
            };
            let wrong_kind = param.kind() != Some(slot.kind);
            if wrong_kind || (slot.mandatory && !param.is_well_formed()) {
                report.ill_formed.push(index);
            }
        }
        report
    }

    pub fn is_well_formed(&self) -> bool {
        self.is_attached() && self.well_formed_report().is_well_formed()
    }
}
