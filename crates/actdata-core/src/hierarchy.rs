//! Parent/child links between Nodes, and unique sibling names.
//!
//! A Node lives in the Partition of its type; the hierarchy is a second,
//! type-independent tree on top of that. A Node has at most one parent and
//! keeps its children in insertion order.

use std::collections::HashSet;

use crate::document::{Document, CHILDREN, PARENT};
use crate::error::CoreError;
use crate::id::{LabelId, NodeId};
use crate::label::{AttrValue, Entry};
use crate::node::Node;

impl Document {
    /// Appends `child` to the children of `parent`.
    ///
    /// Fails when `child` already has a parent, or when `parent` lies in the
    /// subtree of `child`.
    pub fn add_child_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), CoreError> {
        let parent_label = self.node_label(parent)?;
        let child_label = self.node_label(child)?;
        if let Some(current) = self.parent_node(child) {
            return Err(CoreError::Hierarchy {
                node: child,
                reason: format!("already a child of node {current}"),
            });
        }
        if parent == child || self.ancestors(parent).contains(&child) {
            return Err(CoreError::Hierarchy {
                node: child,
                reason: format!("node {parent} lies in its subtree"),
            });
        }

        let mut children = self.child_entries(parent_label);
        children.push(self.store.entry(child_label)?);
        let parent_entry = self.store.entry(parent_label)?;
        self.store
            .set_attribute(parent_label, CHILDREN, AttrValue::ReferenceList(children))?;
        self.store
            .set_attribute(child_label, PARENT, AttrValue::Reference(parent_entry))?;
        tracing::debug!(%parent, %child, "child node linked");
        Ok(())
    }

    /// Unlinks `child` from `parent` without deleting it. Returns `false`
    /// when `child` is not a child of `parent`.
    pub fn remove_child_node(&mut self, parent: NodeId, child: NodeId) -> Result<bool, CoreError> {
        self.node_label(parent)?;
        self.node_label(child)?;
        if self.parent_node(child) != Some(parent) {
            return Ok(false);
        }
        self.unlink_child(parent, child)?;
        Ok(true)
    }

    pub(crate) fn unlink_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CoreError> {
        let parent_label = LabelId::from(parent);
        let child_label = LabelId::from(child);
        let child_entry = self.store.entry(child_label)?;
        let children: Vec<Entry> = self
            .child_entries(parent_label)
            .into_iter()
            .filter(|entry| *entry != child_entry)
            .collect();
        if children.is_empty() {
            self.store.remove_attribute(parent_label, CHILDREN)?;
        } else {
            self.store
                .set_attribute(parent_label, CHILDREN, AttrValue::ReferenceList(children))?;
        }
        self.store.remove_attribute(child_label, PARENT)?;
        Ok(())
    }

    pub fn parent_node(&self, id: NodeId) -> Option<NodeId> {
        match self.store.attribute(id.into(), PARENT)? {
            AttrValue::Reference(entry) => self.node_at(entry),
            _ => None,
        }
    }

    /// Attached children of a Node, in insertion order.
    pub fn child_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.child_entries(id.into())
            .iter()
            .filter_map(|entry| self.node_at(entry))
            .collect()
    }

    /// Attached Nodes without a parent, partition by partition.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.nodes()
            .into_iter()
            .filter(|node| self.parent_node(*node).is_none())
            .collect()
    }

    /// `id` followed by its descendants, depth first.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            order.push(node);
            stack.extend(self.child_nodes(node).into_iter().rev());
        }
        order
    }

    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent_node(id);
        while let Some(node) = current {
            if chain.contains(&node) {
                break;
            }
            chain.push(node);
            current = self.parent_node(node);
        }
        chain
    }

    fn node_at(&self, entry: &Entry) -> Option<NodeId> {
        let label = self.store.find(entry)?;
        self.is_node_label(label).then(|| NodeId::from(label))
    }

    fn child_entries(&self, label: LabelId) -> Vec<Entry> {
        self.store
            .attribute(label, CHILDREN)
            .and_then(AttrValue::as_references)
            .map(<[Entry]>::to_vec)
            .unwrap_or_default()
    }

    /// A name for a new Node of `node_type` under `parent` (top level when
    /// `None`) that no sibling of the same type carries yet. A blank `base`
    /// falls back to the type name.
    pub fn unique_child_name(&self, parent: Option<NodeId>, node_type: &str, base: &str) -> String {
        let siblings = match parent {
            Some(parent) => self.child_nodes(parent),
            None => self.root_nodes(),
        };
        let names: Vec<&str> = siblings
            .into_iter()
            .map(|node| Node::new(self, node))
            .filter(|node| node.node_type() == node_type)
            .filter_map(|node| node.name())
            .collect();
        let base = if base.trim().is_empty() { node_type } else { base };
        unique_name(names, base)
    }
}

/// `base` suffixed with one past the highest index among `names` of the
/// form `<base> <n>`, or with `1` when there is none. A trailing index on
/// `base` itself is ignored.
pub fn unique_name<'a>(names: impl IntoIterator<Item = &'a str>, base: &str) -> String {
    let stem = strip_index(base);
    let next = names
        .into_iter()
        .filter_map(|name| {
            let (head, tail) = name.trim().rsplit_once(char::is_whitespace)?;
            if head.trim_end() != stem {
                return None;
            }
            tail.parse::<u64>().ok()
        })
        .max()
        .map_or(1, |n| n.saturating_add(1));
    format!("{stem} {next}")
}

fn strip_index(name: &str) -> &str {
    let trimmed = name.trim();
    match trimmed.rsplit_once(char::is_whitespace) {
        Some((head, tail)) if tail.parse::<u64>().is_ok() => head.trim_end(),
        _ => trimmed,
    }
}
