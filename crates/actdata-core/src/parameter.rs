//! Read-only Parameter view.
//!
//! A [`Parameter`] borrows the [`Document`] and reads everything from the
//! label store on demand; it holds no state of its own. All writes go through
//! the document so that modifications are logged and dependents marked.

use serde::{Deserialize, Serialize};

use crate::document::{Document, EVAL_STRING, NAME, PENDING, SEMANTIC_ID, USER_FLAGS, VALID};
use crate::dto::{ParameterDto, ParameterGid};
use crate::error::CoreError;
use crate::id::{LabelId, NodeId, ParameterId};
use crate::label::{AttrValue, Entry};
use crate::value::{ParamKind, ParamValue, KIND};

/// How a write is reported to the dependency machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationKind {
    /// Logged as touched; every downstream Tree-Function output becomes pending.
    Touched,
    /// Logged as impacted; dependents are left alone.
    Impacted,
    /// Not logged.
    Silent,
}

/// A Parameter living in a document.
#[derive(Debug, Clone, Copy)]
pub struct Parameter<'a> {
    doc: &'a Document,
    id: ParameterId,
}

impl<'a> Parameter<'a> {
    pub(crate) fn new(doc: &'a Document, id: ParameterId) -> Self {
        Parameter { doc, id }
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    fn label(&self) -> LabelId {
        self.id.into()
    }

    /// The owning Node.
    pub fn node(&self) -> Option<NodeId> {
        self.doc.store.parent(self.label()).map(NodeId::from)
    }

    /// Position of the Parameter within its Node.
    pub fn index(&self) -> usize {
        self.doc
            .store
            .tag(self.label())
            .map(|tag| tag.saturating_sub(1) as usize)
            .unwrap_or(0)
    }

    pub fn entry(&self) -> Entry {
        self.doc
            .store
            .entry(self.label())
            .unwrap_or_else(|_| Entry::root())
    }

    pub fn kind(&self) -> Option<ParamKind> {
        self.doc
            .store
            .attribute(self.label(), KIND)
            .and_then(AttrValue::as_text)
            .and_then(|raw| raw.parse().ok())
    }

    pub fn value(&self) -> Option<ParamValue> {
        ParamValue::read(&self.doc.store, self.label(), self.kind()?)
    }

    /// The label and all its ancestors are attached.
    pub fn is_attached(&self) -> bool {
        self.doc.store.is_alive(self.label())
    }

    /// Attached, with a value conforming to its kind.
    pub fn is_well_formed(&self) -> bool {
        self.is_attached() && self.value().is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.flag(VALID).unwrap_or(false)
    }

    pub fn is_pending(&self) -> bool {
        self.flag(PENDING).unwrap_or(false)
    }

    pub fn name(&self) -> &'a str {
        self.text(NAME)
    }

    pub fn semantic_id(&self) -> &'a str {
        self.text(SEMANTIC_ID)
    }

    pub fn eval_string(&self) -> &'a str {
        self.text(EVAL_STRING)
    }

    pub fn user_flags(&self) -> i64 {
        self.doc
            .store
            .attribute(self.label(), USER_FLAGS)
            .and_then(AttrValue::as_integer)
            .unwrap_or(0)
    }

    pub fn gid(&self) -> ParameterGid {
        let node = self
            .node()
            .and_then(|n| self.doc.store.entry(n.into()).ok())
            .map(|e| e.to_string())
            .unwrap_or_default();
        ParameterGid::new(node, self.index())
    }

    /// Snapshot of the Parameter. Fails when it is not well-formed.
    pub fn to_dto(&self) -> Result<ParameterDto, CoreError> {
        if !self.is_well_formed() {
            return Err(CoreError::IllFormedParameter { id: self.id });
        }
        self.export_dto()
    }

    /// Snapshot of the Parameter, with `value: None` when it holds no
    /// well-formed value. Used by persistence and conversion.
    pub fn export_dto(&self) -> Result<ParameterDto, CoreError> {
        let kind = self
            .kind()
            .ok_or(CoreError::ParameterNotFound { id: self.id })?;
        Ok(ParameterDto {
            gid: self.gid(),
            kind,
            name: self.name().to_string(),
            semantic_id: self.semantic_id().to_string(),
            eval_string: self.eval_string().to_string(),
            user_flags: self.user_flags(),
            is_valid: self.is_valid(),
            is_pending: self.is_pending(),
            value: self.value(),
        })
    }

    fn flag(&self, key: &'static str) -> Option<bool> {
        self.doc
            .store
            .attribute(self.label(), key)
            .and_then(AttrValue::as_bool)
    }

    fn text(&self, key: &'static str) -> &'a str {
        self.doc
            .store
            .attribute(self.label(), key)
            .and_then(AttrValue::as_text)
            .unwrap_or("")
    }
}
