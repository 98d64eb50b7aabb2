//! In-memory label store: an ordered tree of addressable labels carrying
//! typed attributes.
//!
//! Every label is identified by its [`LabelId`] (an arena index, never
//! reused) and addressed by its [`Entry`] (the tag path from the root, such
//! as `0:2:1:3`). Labels are never physically removed: [`LabelStore::forget`]
//! detaches a label, which detaches its whole subtree, and
//! [`LabelStore::child_or_create`] revives a forgotten label at the same tag.
//!
//! # Recording
//!
//! Mutations go through an optional scope. While recording is on, every
//! mutation must happen inside an open scope and is appended to the scope's
//! change list as a [`Change`]; committing the scope yields a [`Delta`] that
//! can later be reverted or reapplied. While recording is off, mutations are
//! applied directly and leave no trace.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

use crate::error::LabelError;
use crate::id::LabelId;

/// Stable attribute type key.
pub type AttrKey = &'static str;

/// Hierarchical tag path of a label, rooted at tag `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Entry(SmallVec<[u32; 8]>);

/// Error returned when an entry string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed entry '{0}'")]
pub struct ParseEntryError(pub String);

impl Entry {
    /// The entry of the root label.
    pub fn root() -> Self {
        Entry(smallvec![0])
    }

    /// Builds an entry from raw tags. Returns `None` for an empty path.
    pub fn from_tags(tags: &[u32]) -> Option<Self> {
        if tags.is_empty() {
            None
        } else {
            Some(Entry(SmallVec::from_slice(tags)))
        }
    }

    pub fn tags(&self) -> &[u32] {
        &self.0
    }

    /// Number of tags in the path. The root has depth 1.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Tag of the addressed label within its parent.
    pub fn last_tag(&self) -> u32 {
        self.0.last().copied().unwrap_or(0)
    }

    pub fn child(&self, tag: u32) -> Entry {
        let mut tags = self.0.clone();
        tags.push(tag);
        Entry(tags)
    }

    pub fn parent(&self) -> Option<Entry> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Entry(SmallVec::from_slice(&self.0[..self.0.len() - 1])))
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Entry) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", tag)?;
        }
        Ok(())
    }
}

impl FromStr for Entry {
    type Err = ParseEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tags = s
            .split(':')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<SmallVec<[u32; 8]>, _>>()
            .map_err(|_| ParseEntryError(s.to_string()))?;
        if tags.is_empty() {
            return Err(ParseEntryError(s.to_string()));
        }
        Ok(Entry(tags))
    }
}

impl TryFrom<String> for Entry {
    type Error = ParseEntryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Entry> for String {
    fn from(entry: Entry) -> Self {
        entry.to_string()
    }
}

/// A typed attribute value attached to a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    IntArray(Vec<i64>),
    RealArray(Vec<f64>),
    TextArray(Vec<String>),
    Reference(Entry),
    ReferenceList(Vec<Entry>),
}

impl AttrValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_references(&self) -> Option<&[Entry]> {
        match self {
            AttrValue::ReferenceList(v) => Some(v),
            _ => None,
        }
    }
}

/// One recorded mutation of the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A label was created or revived.
    LabelAdded { label: LabelId },
    /// A label was detached.
    LabelForgotten { label: LabelId },
    /// An attribute was attached, replaced or detached.
    Attribute {
        label: LabelId,
        key: AttrKey,
        before: Option<AttrValue>,
        after: Option<AttrValue>,
    },
}

impl Change {
    pub fn label(&self) -> LabelId {
        match self {
            Change::LabelAdded { label }
            | Change::LabelForgotten { label }
            | Change::Attribute { label, .. } => *label,
        }
    }
}

/// Ordered before/after record of the changes made inside one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    changes: Vec<Change>,
}

impl Delta {
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Every label the delta touches, in index order.
    pub fn labels(&self) -> BTreeSet<LabelId> {
        self.changes.iter().map(Change::label).collect()
    }
}

#[derive(Debug, Clone)]
struct LabelData {
    tag: u32,
    parent: Option<LabelId>,
    children: Vec<LabelId>,
    alive: bool,
    attributes: IndexMap<AttrKey, AttrValue>,
}

impl LabelData {
    fn new(tag: u32, parent: Option<LabelId>) -> Self {
        LabelData {
            tag,
            parent,
            children: Vec::new(),
            alive: true,
            attributes: IndexMap::new(),
        }
    }
}

/// Arena-backed label tree with scoped change recording.
#[derive(Debug, Clone)]
pub struct LabelStore {
    labels: Vec<LabelData>,
    scope: Option<Vec<Change>>,
    recording: bool,
}

impl Default for LabelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelStore {
    /// Creates a store holding only the root label, with recording off.
    pub fn new() -> Self {
        LabelStore {
            labels: vec![LabelData::new(0, None)],
            scope: None,
            recording: false,
        }
    }

    pub fn root(&self) -> LabelId {
        LabelId(0)
    }

    /// Number of labels ever allocated, attached or not.
    pub fn allocated(&self) -> usize {
        self.labels.len()
    }

    // ---- navigation ----

    fn data(&self, id: LabelId) -> Result<&LabelData, LabelError> {
        self.labels
            .get(id.0 as usize)
            .ok_or(LabelError::UnknownLabel { id })
    }

    fn data_mut(&mut self, id: LabelId) -> Result<&mut LabelData, LabelError> {
        self.labels
            .get_mut(id.0 as usize)
            .ok_or(LabelError::UnknownLabel { id })
    }

    pub fn tag(&self, id: LabelId) -> Result<u32, LabelError> {
        Ok(self.data(id)?.tag)
    }

    pub fn parent(&self, id: LabelId) -> Option<LabelId> {
        self.labels.get(id.0 as usize).and_then(|d| d.parent)
    }

    /// Full tag path of a label.
    pub fn entry(&self, id: LabelId) -> Result<Entry, LabelError> {
        let mut tags: SmallVec<[u32; 8]> = SmallVec::new();
        let mut current = Some(id);
        while let Some(label) = current {
            let data = self.data(label)?;
            tags.push(data.tag);
            current = data.parent;
        }
        tags.reverse();
        Ok(Entry(tags))
    }

    /// True when the label and every ancestor are attached.
    pub fn is_alive(&self, id: LabelId) -> bool {
        let mut current = Some(id);
        while let Some(label) = current {
            match self.labels.get(label.0 as usize) {
                Some(data) if data.alive => current = data.parent,
                _ => return false,
            }
        }
        true
    }

    /// Locates an attached label by its path.
    pub fn find(&self, entry: &Entry) -> Option<LabelId> {
        let (first, rest) = entry.tags().split_first()?;
        if *first != 0 {
            return None;
        }
        let mut current = self.root();
        for tag in rest {
            current = self.find_child(current, *tag)?;
        }
        Some(current)
    }

    /// Attached child of `parent` carrying `tag`.
    pub fn find_child(&self, parent: LabelId, tag: u32) -> Option<LabelId> {
        self.any_child(parent, tag)
            .filter(|child| self.labels[child.0 as usize].alive)
    }

    fn any_child(&self, parent: LabelId, tag: u32) -> Option<LabelId> {
        let data = self.labels.get(parent.0 as usize)?;
        data.children
            .iter()
            .copied()
            .find(|child| self.labels[child.0 as usize].tag == tag)
    }

    /// Attached children of a label, in insertion order.
    pub fn children(&self, id: LabelId) -> impl Iterator<Item = LabelId> + '_ {
        self.labels
            .get(id.0 as usize)
            .into_iter()
            .flat_map(|data| data.children.iter().copied())
            .filter(move |child| self.labels[child.0 as usize].alive)
    }

    // ---- attributes ----

    pub fn attribute(&self, id: LabelId, key: AttrKey) -> Option<&AttrValue> {
        self.labels
            .get(id.0 as usize)
            .and_then(|data| data.attributes.get(key))
    }

    pub fn attributes(&self, id: LabelId) -> impl Iterator<Item = (AttrKey, &AttrValue)> + '_ {
        self.labels
            .get(id.0 as usize)
            .into_iter()
            .flat_map(|data| data.attributes.iter().map(|(k, v)| (*k, v)))
    }

    /// Attaches or replaces an attribute. Writing an equal value is a no-op
    /// and returns `false`.
    pub fn set_attribute(
        &mut self,
        id: LabelId,
        key: AttrKey,
        value: AttrValue,
    ) -> Result<bool, LabelError> {
        self.guard()?;
        let data = self.data_mut(id)?;
        if data.attributes.get(key) == Some(&value) {
            return Ok(false);
        }
        let before = data.attributes.insert(key, value.clone());
        self.record(Change::Attribute {
            label: id,
            key,
            before,
            after: Some(value),
        });
        Ok(true)
    }

    /// Detaches an attribute, returning its previous value.
    pub fn remove_attribute(
        &mut self,
        id: LabelId,
        key: AttrKey,
    ) -> Result<Option<AttrValue>, LabelError> {
        self.guard()?;
        let before = self.data_mut(id)?.attributes.shift_remove(key);
        if let Some(previous) = &before {
            self.record(Change::Attribute {
                label: id,
                key,
                before: Some(previous.clone()),
                after: None,
            });
        }
        Ok(before)
    }

    /// Detaches every attribute of a label.
    pub fn clear_attributes(&mut self, id: LabelId) -> Result<(), LabelError> {
        let keys: Vec<AttrKey> = self.data(id)?.attributes.keys().copied().collect();
        for key in keys {
            self.remove_attribute(id, key)?;
        }
        Ok(())
    }

    // ---- structure ----

    /// Returns the child of `parent` at `tag`, creating or reviving it.
    pub fn child_or_create(&mut self, parent: LabelId, tag: u32) -> Result<LabelId, LabelError> {
        self.guard()?;
        self.data(parent)?;
        if let Some(existing) = self.any_child(parent, tag) {
            if !self.labels[existing.0 as usize].alive {
                self.labels[existing.0 as usize].alive = true;
                self.record(Change::LabelAdded { label: existing });
            }
            return Ok(existing);
        }

        let id = LabelId(self.labels.len() as u32);
        self.labels.push(LabelData::new(tag, Some(parent)));
        self.data_mut(parent)?.children.push(id);
        self.record(Change::LabelAdded { label: id });
        Ok(id)
    }

    /// Creates a child with a tag one past the highest tag ever used under
    /// `parent`, so entries of forgotten labels are not handed out again.
    pub fn new_child(&mut self, parent: LabelId) -> Result<LabelId, LabelError> {
        let next = self
            .data(parent)?
            .children
            .iter()
            .map(|child| self.labels[child.0 as usize].tag)
            .max()
            .map_or(Some(1), |tag| tag.checked_add(1))
            .ok_or(LabelError::TagOverflow { parent })?;
        self.child_or_create(parent, next)
    }

    /// Detaches a label and, through it, its subtree. The root cannot be
    /// forgotten.
    pub fn forget(&mut self, id: LabelId) -> Result<(), LabelError> {
        self.guard()?;
        if id == self.root() {
            return Ok(());
        }
        let data = self.data_mut(id)?;
        if data.alive {
            data.alive = false;
            self.record(Change::LabelForgotten { label: id });
        }
        Ok(())
    }

    // ---- scopes ----

    pub fn set_recording(&mut self, on: bool) {
        self.recording = on;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn has_open_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub fn open_scope(&mut self) -> Result<(), LabelError> {
        if self.scope.is_some() {
            return Err(LabelError::ScopeAlreadyOpen);
        }
        self.scope = Some(Vec::new());
        Ok(())
    }

    /// Closes the scope and returns everything it recorded.
    pub fn commit_scope(&mut self) -> Result<Delta, LabelError> {
        let changes = self.scope.take().ok_or(LabelError::NoOpenScope)?;
        Ok(Delta { changes })
    }

    /// Closes the scope and reverts everything it recorded.
    pub fn abort_scope(&mut self) -> Result<(), LabelError> {
        let changes = self.scope.take().ok_or(LabelError::NoOpenScope)?;
        self.revert(&Delta { changes });
        Ok(())
    }

    /// Position in the open scope's history.
    pub fn mark(&self) -> Result<usize, LabelError> {
        self.scope
            .as_ref()
            .map(Vec::len)
            .ok_or(LabelError::NoOpenScope)
    }

    /// Changes recorded in the open scope since `mark`.
    pub fn delta_since(&self, mark: usize) -> Result<Delta, LabelError> {
        let changes = self.scope.as_ref().ok_or(LabelError::NoOpenScope)?;
        if mark > changes.len() {
            return Err(LabelError::InvalidMark {
                mark,
                recorded: changes.len(),
            });
        }
        Ok(Delta {
            changes: changes[mark..].to_vec(),
        })
    }

    /// Undoes a delta, newest change first. Never recorded.
    pub fn revert(&mut self, delta: &Delta) {
        for change in delta.changes.iter().rev() {
            self.apply(change, false);
        }
    }

    /// Replays a delta, oldest change first. Never recorded.
    pub fn reapply(&mut self, delta: &Delta) {
        for change in &delta.changes {
            self.apply(change, true);
        }
    }

    fn apply(&mut self, change: &Change, forward: bool) {
        let Some(data) = self.labels.get_mut(change.label().0 as usize) else {
            return;
        };
        match change {
            Change::LabelAdded { .. } => data.alive = forward,
            Change::LabelForgotten { .. } => data.alive = !forward,
            Change::Attribute {
                key, before, after, ..
            } => {
                let target = if forward { after } else { before };
                match target {
                    Some(value) => {
                        data.attributes.insert(*key, value.clone());
                    }
                    None => {
                        data.attributes.shift_remove(key);
                    }
                }
            }
        }
    }

    fn guard(&self) -> Result<(), LabelError> {
        if self.recording && self.scope.is_none() {
            return Err(LabelError::NoOpenScope);
        }
        Ok(())
    }

    fn record(&mut self, change: Change) {
        if !self.recording {
            return;
        }
        if let Some(scope) = self.scope.as_mut() {
            scope.push(change);
        }
    }
}
