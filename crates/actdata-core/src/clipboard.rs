//! Copying a Node with its child Nodes and pasting the copy elsewhere.
//!
//! A [`NodeClipboard`] is a detached snapshot: Parameter DTOs plus the
//! hierarchy between the copied Nodes. Relations that stay inside the copied
//! subtree are relocated onto the pasted Nodes. Relations reaching outside
//! are dropped at copy time unless a [`ReferenceFilter`] lets them through,
//! in which case the pasted Parameter keeps pointing at the original target.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::dto::{ParameterDto, ParameterGid};
use crate::error::CoreError;
use crate::id::{LabelId, NodeId};
use crate::label::Entry;
use crate::node::Node;
use crate::value::ParamValue;

/// Which out-of-scope relations survive a copy. The default keeps none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceFilter {
    /// Tree Functions, by function name, kept even when bound to data
    /// outside the copy.
    pub functions: BTreeSet<String>,
    /// Reference Parameters, by node type and index, kept even when their
    /// targets lie outside the copy.
    pub references: BTreeSet<(String, usize)>,
}

impl ReferenceFilter {
    pub fn pass_function(mut self, function: impl Into<String>) -> Self {
        self.functions.insert(function.into());
        self
    }

    pub fn pass_reference(mut self, node_type: impl Into<String>, index: usize) -> Self {
        self.references.insert((node_type.into(), index));
        self
    }
}

/// One Node of a copied subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopiedNode {
    pub node_type: String,
    /// Entry of the Node the copy was taken from.
    pub source: Entry,
    pub name: Option<String>,
    /// Position of the parent within the clipboard; `None` for the root.
    pub parent: Option<usize>,
    pub parameters: Vec<ParameterDto>,
}

/// A copied Node subtree, root first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeClipboard {
    nodes: Vec<CopiedNode>,
}

impl NodeClipboard {
    pub fn nodes(&self) -> &[CopiedNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Document {
    /// Copies a Node and its child Nodes, dropping every relation that
    /// reaches outside of them.
    pub fn copy_node(&self, id: NodeId) -> Result<NodeClipboard, CoreError> {
        self.copy_node_with(id, &ReferenceFilter::default())
    }

    pub fn copy_node_with(
        &self,
        id: NodeId,
        filter: &ReferenceFilter,
    ) -> Result<NodeClipboard, CoreError> {
        self.node(id)?;
        let subtree = self.subtree(id);
        let scope = subtree
            .iter()
            .map(|node| self.store.entry(LabelId::from(*node)))
            .collect::<Result<Vec<_>, _>>()?;
        let inside = |entry: &Entry| {
            scope
                .iter()
                .any(|node| entry == node || entry.is_descendant_of(node))
        };
        let position: HashMap<NodeId, usize> = subtree
            .iter()
            .enumerate()
            .map(|(index, node)| (*node, index))
            .collect();

        let mut nodes = Vec::with_capacity(subtree.len());
        for (index, node_id) in subtree.iter().enumerate() {
            let node = Node::new(self, *node_id);
            let node_type = node.node_type();
            let mut parameters = Vec::new();
            for param in node.parameters() {
                let mut dto = param.export_dto()?;
                let passes = filter
                    .references
                    .contains(&(node_type.to_string(), dto.gid.pid));
                dto.value = match dto.value.take() {
                    Some(ParamValue::Reference(target)) if !inside(&target) && !passes => None,
                    Some(ParamValue::ReferenceList(targets)) if !passes => Some(
                        ParamValue::ReferenceList(targets.into_iter().filter(|e| inside(e)).collect()),
                    ),
                    Some(ParamValue::TreeFunction(binding))
                        if !binding.inputs.iter().chain(&binding.outputs).all(|e| inside(e))
                            && !filter.functions.contains(&binding.function) =>
                    {
                        None
                    }
                    other => other,
                };
                parameters.push(dto);
            }
            let parent = if index == 0 {
                None
            } else {
                node.parent_node().and_then(|p| position.get(&p).copied())
            };
            nodes.push(CopiedNode {
                node_type: node_type.to_string(),
                source: node.entry(),
                name: node.name().map(str::to_string),
                parent,
                parameters,
            });
        }

        tracing::debug!(node = %id, copied = nodes.len(), "node copied");
        Ok(NodeClipboard { nodes })
    }

    /// Recreates the copied subtree under `parent` (top level when `None`)
    /// and returns the new root. The root gets a name unique among its
    /// siblings of the same type; relations inside the copy are relocated.
    pub fn paste_as_child(
        &mut self,
        clipboard: &NodeClipboard,
        parent: Option<NodeId>,
    ) -> Result<NodeId, CoreError> {
        let root = clipboard.nodes.first().ok_or(CoreError::EmptyClipboard)?;
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        let root_name =
            self.unique_child_name(parent, &root.node_type, root.name.as_deref().unwrap_or(""));

        let mut created = Vec::with_capacity(clipboard.len());
        let mut relocation = HashMap::new();
        for copied in &clipboard.nodes {
            let id = self.create_node(&copied.node_type)?;
            relocation.insert(copied.source.clone(), self.store.entry(LabelId::from(id))?);
            created.push(id);
        }

        for (copied, id) in clipboard.nodes.iter().zip(&created) {
            let node_entry = self.store.entry(LabelId::from(*id))?.to_string();
            for dto in &copied.parameters {
                let mut dto = dto.clone();
                dto.gid = ParameterGid::new(node_entry.clone(), dto.gid.pid);
                dto.value = dto.value.map(|value| relocate(value, &relocation));
                self.put_parameter(*id, dto.gid.pid, &dto)?;
            }
        }

        for (index, (copied, id)) in clipboard.nodes.iter().zip(&created).enumerate() {
            if index == 0 {
                self.set_node_name(*id, &root_name)?;
            } else if let Some(name) = &copied.name {
                self.set_node_name(*id, name)?;
            }
            if let Some(owner) = copied.parent.and_then(|p| created.get(p)) {
                self.add_child_node(*owner, *id)?;
            }
        }
        let pasted = created[0];
        if let Some(parent) = parent {
            self.add_child_node(parent, pasted)?;
        }

        tracing::debug!(node = %pasted, pasted = created.len(), name = %root_name, "node pasted");
        Ok(pasted)
    }
}

fn relocate(value: ParamValue, table: &HashMap<Entry, Entry>) -> ParamValue {
    let moved = |entry: Entry| -> Entry {
        if let Some(target) = table.get(&entry) {
            return target.clone();
        }
        match entry.parent().and_then(|owner| table.get(&owner)) {
            Some(target) => target.child(entry.last_tag()),
            None => entry,
        }
    };
    match value {
        ParamValue::Reference(entry) => ParamValue::Reference(moved(entry)),
        ParamValue::ReferenceList(entries) => {
            ParamValue::ReferenceList(entries.into_iter().map(moved).collect())
        }
        ParamValue::TreeFunction(mut binding) => {
            binding.inputs = binding.inputs.into_iter().map(moved).collect();
            binding.outputs = binding.outputs.into_iter().map(moved).collect();
            ParamValue::TreeFunction(binding)
        }
        other => other,
    }
}
