//! Deterministic content fingerprints using blake3.
//!
//! Two documents with the same fingerprint hold the same Nodes at the same
//! entries with the same Parameter content and schema version. Undo
//! history and the LogBook are not part of the content.
//!
//! # Determinism
//!
//! Snapshots order Nodes by entry and Parameters by index, and contain no
//! `HashMap`, so `serde_json::to_vec` is canonical for them.

use actdata_core::Document;

use crate::error::StorageError;
use crate::snapshot::DocumentSnapshot;

pub fn fingerprint(doc: &Document) -> Result<blake3::Hash, StorageError> {
    fingerprint_snapshot(&DocumentSnapshot::export(doc)?)
}

pub fn fingerprint_snapshot(snapshot: &DocumentSnapshot) -> Result<blake3::Hash, StorageError> {
    let bytes = serde_json::to_vec(snapshot)?;
    Ok(blake3::hash(&bytes))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use actdata_core::{
        ModificationKind, NodeRegistry, NodeSchema, ParamKind, ParamSlot, ParamValue,
    };

    fn doc_with(value: i64) -> Document {
        let mut registry = NodeRegistry::new();
        registry
            .register(NodeSchema::new(
                "Counter",
                vec![ParamSlot::mandatory("n", ParamKind::Int).with_default(ParamValue::Int(0))],
            ))
            .unwrap();
        let mut doc = Document::new(Arc::new(registry)).unwrap();
        doc.open_command().unwrap();
        let node = doc.create_node("Counter").unwrap();
        let n = doc.parameter(node, 0).unwrap().id();
        doc.set_value(n, ParamValue::Int(value), ModificationKind::Touched)
            .unwrap();
        doc.commit_command().unwrap();
        doc
    }

    #[test]
    fn same_content_same_fingerprint() {
        let a = fingerprint(&doc_with(3)).unwrap();
        let b = fingerprint(&doc_with(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_value_different_fingerprint() {
        let a = fingerprint(&doc_with(3)).unwrap();
        let b = fingerprint(&doc_with(4)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn history_is_not_content() {
        let mut doc = doc_with(3);
        let before = fingerprint(&doc).unwrap();
        doc.clear_history();
        doc.clear_logbook();
        assert_eq!(fingerprint(&doc).unwrap(), before);
    }
}
