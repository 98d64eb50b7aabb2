//! Modification log used to decide what an execution pass must re-run.
//!
//! Tracks three sections, all keyed by [`ParameterId`]: touched (written by
//! a client or a producer), impacted (affected without a direct write) and
//! forced (Tree Functions that must run on the next pass regardless of
//! their inputs).

use std::collections::BTreeSet;

use crate::id::ParameterId;

/// The accumulated set of modified Parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBook {
    /// Parameters written with a `Touched` modification.
    touched: BTreeSet<ParameterId>,
    /// Parameters recorded with an `Impacted` modification.
    impacted: BTreeSet<ParameterId>,
    /// Tree-Function Parameters forced to execute.
    forced: BTreeSet<ParameterId>,
}

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, id: ParameterId) {
        self.touched.insert(id);
    }

    pub fn impact(&mut self, id: ParameterId) {
        self.impacted.insert(id);
    }

    pub fn force(&mut self, id: ParameterId) {
        self.forced.insert(id);
    }

    pub fn is_touched(&self, id: ParameterId) -> bool {
        self.touched.contains(&id)
    }

    pub fn is_impacted(&self, id: ParameterId) -> bool {
        self.impacted.contains(&id)
    }

    pub fn is_forced(&self, id: ParameterId) -> bool {
        self.forced.contains(&id)
    }

    /// Touched or impacted.
    pub fn is_modified(&self, id: ParameterId) -> bool {
        self.is_touched(id) || self.is_impacted(id)
    }

    /// Drops a Parameter from every section.
    pub fn release(&mut self, id: ParameterId) {
        self.touched.remove(&id);
        self.impacted.remove(&id);
        self.forced.remove(&id);
    }

    pub fn clear(&mut self) {
        self.touched.clear();
        self.impacted.clear();
        self.forced.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty() && self.impacted.is_empty() && self.forced.is_empty()
    }

    pub fn touched(&self) -> impl Iterator<Item = ParameterId> + '_ {
        self.touched.iter().copied()
    }

    pub fn impacted(&self) -> impl Iterator<Item = ParameterId> + '_ {
        self.impacted.iter().copied()
    }

    pub fn forced(&self) -> impl Iterator<Item = ParameterId> + '_ {
        self.forced.iter().copied()
    }
}
