//! Plain snapshots of a document's Nodes and Parameters.
//!
//! A snapshot is the DTO export of every attached Node, ordered by data
//! object id, plus the stored schema version. Importing a snapshot rebuilds
//! the Nodes at their original entries so every reference stays valid. The
//! Node hierarchy travels as each parent's list of child data object ids.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use actdata_core::{
    CoreError, Document, DocumentConfig, Entry, NodeId, NodeRegistry, ParameterDto,
};

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_type: String,
    pub data_object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parameters: Vec<ParameterDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub schema_version: Option<u32>,
    pub nodes: Vec<NodeSnapshot>,
}

impl DocumentSnapshot {
    pub fn export(doc: &Document) -> Result<Self, StorageError> {
        let mut nodes = Vec::new();
        for id in doc.nodes() {
            let node = doc.node(id)?;
            let parameters = node
                .parameters()
                .iter()
                .map(|param| param.export_dto())
                .collect::<Result<Vec<_>, CoreError>>()?;
            nodes.push((
                node.entry(),
                NodeSnapshot {
                    node_type: node.node_type().to_string(),
                    data_object_id: node.data_object_id(),
                    name: node.name().map(str::to_string),
                    parameters,
                    children: node
                        .child_nodes()
                        .into_iter()
                        .map(|child| Ok(doc.node(child)?.data_object_id()))
                        .collect::<Result<Vec<_>, CoreError>>()?,
                },
            ));
        }
        nodes.sort_by(|(a, _), (b, _)| a.cmp(b));

        Ok(DocumentSnapshot {
            schema_version: doc.version(),
            nodes: nodes.into_iter().map(|(_, node)| node).collect(),
        })
    }

    /// Rebuilds a document. Transactions stay disabled on the result so
    /// that conversion can run next.
    pub fn import(
        &self,
        registry: Arc<NodeRegistry>,
        config: DocumentConfig,
    ) -> Result<Document, StorageError> {
        let mut doc = Document::with_config(registry, config)?;
        doc.disable_transactions()?;

        for snapshot in &self.nodes {
            let entry = parse_entry(&snapshot.data_object_id)?;
            let node = doc.restore_node(&snapshot.node_type, &entry)?;
            if let Some(name) = &snapshot.name {
                doc.set_node_name(node, name)?;
            }
            for dto in &snapshot.parameters {
                doc.put_parameter(node, dto.gid.pid, dto)?;
            }
        }
        for snapshot in self.nodes.iter().filter(|n| !n.children.is_empty()) {
            let parent = restored(&doc, &snapshot.data_object_id)?;
            for child in &snapshot.children {
                let child = restored(&doc, child)?;
                doc.add_child_node(parent, child)?;
            }
        }
        if let Some(version) = self.schema_version {
            doc.set_version(version)?;
        }

        tracing::debug!(
            nodes = self.nodes.len(),
            version = ?self.schema_version,
            "snapshot imported"
        );
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StorageError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StorageError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn parse_entry(data_object_id: &str) -> Result<Entry, CoreError> {
    data_object_id.parse().map_err(|_| CoreError::InvalidEntry {
        entry: data_object_id.to_string(),
        reason: "not a label path".to_string(),
    })
}

fn restored(doc: &Document, data_object_id: &str) -> Result<NodeId, CoreError> {
    doc.find_node(data_object_id)
        .ok_or_else(|| CoreError::InvalidEntry {
            entry: data_object_id.to_string(),
            reason: "no node in the snapshot".to_string(),
        })
}
