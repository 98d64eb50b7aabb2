//! Node type schemas and the node type registry.
//!
//! Each Node type declares an ordered list of [`ParamSlot`]s once, at
//! registration time. The [`NodeRegistry`] is built explicitly by the
//! application before the first document is created and is then shared
//! read-only (usually behind an `Arc`).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value::{ParamKind, ParamValue};

/// One named, typed Parameter slot of a Node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSlot {
    pub name: String,
    pub kind: ParamKind,
    /// A Node is ill-formed while any mandatory slot is ill-formed.
    pub mandatory: bool,
    /// Value assigned when the Node is created.
    pub default: Option<ParamValue>,
}

impl ParamSlot {
    pub fn mandatory(name: impl Into<String>, kind: ParamKind) -> Self {
        ParamSlot {
            name: name.into(),
            kind,
            mandatory: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        ParamSlot {
            name: name.into(),
            kind,
            mandatory: false,
            default: None,
        }
    }

    pub fn with_default(mut self, value: ParamValue) -> Self {
        self.default = Some(value);
        self
    }
}

/// The Parameter layout of one Node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub type_name: String,
    pub slots: Vec<ParamSlot>,
}

impl NodeSchema {
    pub fn new(type_name: impl Into<String>, slots: Vec<ParamSlot>) -> Self {
        NodeSchema {
            type_name: type_name.into(),
            slots,
        }
    }

    pub fn param_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&ParamSlot> {
        self.slots.get(index)
    }

    /// Index of the slot with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.name == name)
    }

    pub fn has_tree_functions(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.kind == ParamKind::TreeFunction)
    }
}

/// Registry of Node types, in registration order.
///
/// Registration is write-once per type name: registering a name twice fails
/// with [`CoreError::DuplicateType`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRegistry {
    schemas: IndexMap<String, NodeSchema>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a Node type.
    pub fn register(&mut self, schema: NodeSchema) -> Result<(), CoreError> {
        if self.schemas.contains_key(&schema.type_name) {
            return Err(CoreError::DuplicateType {
                name: schema.type_name,
            });
        }
        tracing::debug!(node_type = %schema.type_name, slots = schema.slots.len(), "registered node type");
        self.schemas.insert(schema.type_name.clone(), schema);
        Ok(())
    }

    /// Looks up a registered type, failing with [`CoreError::UnknownType`].
    pub fn get(&self, type_name: &str) -> Result<&NodeSchema, CoreError> {
        self.schemas
            .get(type_name)
            .ok_or_else(|| CoreError::UnknownType {
                name: type_name.to_string(),
            })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered schemas, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeSchema> {
        self.schemas.values()
    }
}
