//! Schema-version conversion of loaded documents.
//!
//! A [`Converter`] holds one routine per `(old, new)` version pair and
//! upgrades a document through the shortest chain of registered pairs.
//! Routines run with transactions disabled; each completed step stores its
//! target version in the document. History is cleared afterwards since it
//! would refer to the pre-conversion layout.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use actdata_core::{CoreError, Document, TransactionError};

use crate::error::StorageError;

/// A single conversion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionDelta {
    pub old: u32,
    pub new: u32,
}

impl VersionDelta {
    pub fn new(old: u32, new: u32) -> Self {
        Self { old, new }
    }
}

impl fmt::Display for VersionDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.old, self.new)
    }
}

pub type ConversionRoutine = Box<dyn Fn(&mut Document) -> Result<(), StorageError> + Send + Sync>;

/// A version step and the routine performing it.
pub struct ConversionTuple {
    pub delta: VersionDelta,
    routine: ConversionRoutine,
}

impl ConversionTuple {
    pub fn new<F>(old: u32, new: u32, routine: F) -> Self
    where
        F: Fn(&mut Document) -> Result<(), StorageError> + Send + Sync + 'static,
    {
        Self {
            delta: VersionDelta::new(old, new),
            routine: Box::new(routine),
        }
    }

    fn run(&self, doc: &mut Document) -> Result<(), StorageError> {
        (self.routine)(doc)
    }
}

impl fmt::Debug for ConversionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionTuple")
            .field("delta", &self.delta)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Converter {
    tuples: BTreeMap<VersionDelta, ConversionTuple>,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tuple: ConversionTuple) -> Result<(), StorageError> {
        let delta = tuple.delta;
        if self.tuples.contains_key(&delta) {
            return Err(StorageError::DuplicateConversion {
                old: delta.old,
                new: delta.new,
            });
        }
        self.tuples.insert(delta, tuple);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Shortest chain of registered steps from `old` to `new`. Among chains
    /// of equal length the one with the smallest intermediate versions wins.
    pub fn chain(&self, old: u32, new: u32) -> Option<Vec<VersionDelta>> {
        if old == new {
            return Some(Vec::new());
        }

        let mut came_from: HashMap<u32, VersionDelta> = HashMap::new();
        let mut queue = VecDeque::from([old]);
        while let Some(version) = queue.pop_front() {
            let steps = self.tuples.keys().filter(|delta| delta.old == version);
            for delta in steps {
                if delta.new == old || came_from.contains_key(&delta.new) {
                    continue;
                }
                came_from.insert(delta.new, *delta);
                if delta.new == new {
                    return Some(walk_back(&came_from, old, new));
                }
                queue.push_back(delta.new);
            }
        }
        None
    }

    /// Converts `doc` from version `old` to version `new`.
    ///
    /// Fails with `UnreachableVersion`, leaving the document untouched,
    /// when no chain exists. A failing routine aborts the chain and leaves
    /// the document partially converted.
    pub fn perform(&self, doc: &mut Document, old: u32, new: u32) -> Result<(), StorageError> {
        if old == new {
            return Ok(());
        }
        if doc.has_open_command() {
            return Err(CoreError::Transaction(TransactionError::TransactionActive).into());
        }
        let chain = self
            .chain(old, new)
            .ok_or(StorageError::UnreachableVersion { from: old, to: new })?;

        let recording = doc.transactions_enabled();
        if recording {
            doc.disable_transactions()?;
        }
        let outcome = self.run_chain(doc, &chain);
        if recording {
            doc.enable_transactions()?;
        }
        doc.clear_history();

        match &outcome {
            Ok(()) => tracing::info!(from = old, to = new, steps = chain.len(), "document converted"),
            Err(err) => tracing::warn!(from = old, to = new, error = %err, "conversion failed"),
        }
        outcome
    }

    fn run_chain(&self, doc: &mut Document, chain: &[VersionDelta]) -> Result<(), StorageError> {
        for delta in chain {
            let Some(tuple) = self.tuples.get(delta) else {
                return Err(StorageError::UnreachableVersion {
                    from: delta.old,
                    to: delta.new,
                });
            };
            tracing::debug!(step = %delta, "running conversion routine");
            tuple.run(doc).map_err(|err| StorageError::RoutineFailed {
                old: delta.old,
                new: delta.new,
                source: Box::new(err),
            })?;
            doc.set_version(delta.new)?;
        }
        Ok(())
    }
}

fn walk_back(came_from: &HashMap<u32, VersionDelta>, old: u32, new: u32) -> Vec<VersionDelta> {
    let mut chain = Vec::new();
    let mut version = new;
    while version != old {
        let Some(delta) = came_from.get(&version) else {
            break;
        };
        chain.push(*delta);
        version = delta.old;
    }
    chain.reverse();
    chain
}
