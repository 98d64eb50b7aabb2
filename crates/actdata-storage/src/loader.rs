//! Loading and saving documents as JSON snapshot files.
//!
//! Loading imports the snapshot with transactions disabled, converts it
//! from its stored schema version to the loader's target version, checks
//! that every Node is well-formed, then turns transactions back on.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use actdata_core::{Document, DocumentConfig, NodeRegistry};

use crate::conversion::Converter;
use crate::error::StorageError;
use crate::snapshot::DocumentSnapshot;

#[derive(Debug)]
pub struct Loader {
    registry: Arc<NodeRegistry>,
    converter: Converter,
    target_version: u32,
    config: DocumentConfig,
}

impl Loader {
    pub fn new(registry: Arc<NodeRegistry>, converter: Converter, target_version: u32) -> Self {
        Self {
            registry,
            converter,
            target_version,
            config: DocumentConfig::from_env(),
        }
    }

    pub fn with_config(mut self, config: DocumentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn target_version(&self) -> u32 {
        self.target_version
    }

    /// A fresh document stamped with the target version.
    pub fn create(&self) -> Result<Document, StorageError> {
        let mut doc = Document::with_config(Arc::clone(&self.registry), self.config.clone())?;
        doc.disable_transactions()?;
        doc.set_version(self.target_version)?;
        doc.enable_transactions()?;
        Ok(doc)
    }

    pub fn save(&self, doc: &Document, path: &Path) -> Result<(), StorageError> {
        let snapshot = DocumentSnapshot::export(doc)?;
        fs::write(path, snapshot.to_json()?)?;
        tracing::info!(path = %path.display(), nodes = snapshot.nodes.len(), "document saved");
        Ok(())
    }

    pub fn load(&self, path: &Path) -> Result<Document, StorageError> {
        let bytes = fs::read(path)?;
        let snapshot = DocumentSnapshot::from_json(&bytes)?;
        let doc = self.restore(&snapshot)?;
        tracing::info!(path = %path.display(), version = self.target_version, "document loaded");
        Ok(doc)
    }

    /// Imports and upgrades a snapshot. Snapshots without a stored version
    /// are taken to be at the target version.
    pub fn restore(&self, snapshot: &DocumentSnapshot) -> Result<Document, StorageError> {
        let mut doc = snapshot.import(Arc::clone(&self.registry), self.config.clone())?;
        let stored = snapshot.schema_version.unwrap_or(self.target_version);
        self.converter
            .perform(&mut doc, stored, self.target_version)?;
        doc.set_version(self.target_version)?;

        let ill_formed: Vec<String> = doc
            .check_well_formed()
            .into_iter()
            .map(|report| report.data_object_id)
            .collect();
        if !ill_formed.is_empty() {
            tracing::warn!(nodes = ill_formed.len(), "loaded document is ill-formed");
            return Err(StorageError::IllFormed { nodes: ill_formed });
        }

        doc.clear_logbook();
        doc.enable_transactions()?;
        Ok(doc)
    }
}
