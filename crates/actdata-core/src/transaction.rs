//! Transaction engine: atomic commands with bounded undo/redo history.
//!
//! A transaction wraps one mutation scope of the [`LabelStore`]. Committing
//! pushes the scope's [`Delta`] onto the undo stack (evicting the oldest
//! delta past the configured limit) and clears the redo stack; aborting
//! reverts the scope. Undo and redo move deltas between the two stacks and
//! report the labels they affected so the document can re-touch the
//! Parameters living there.
//!
//! # States
//!
//! `Closed -> Open -> {Committed | Aborted} -> Closed`. Transactions do not
//! nest. While transactions are disabled every command is a no-op and the
//! store mutates without recording.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::TransactionError;
use crate::id::{LabelId, ParameterId};
use crate::label::{Delta, LabelStore};
use crate::logbook::LogBook;

/// A Parameter affected by an undo or redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParameter {
    pub id: ParameterId,
    /// False when the Parameter was detached by the step.
    pub alive: bool,
}

/// Parameters affected by an undo or redo, in ID order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub parameters: Vec<TxParameter>,
}

impl TxResult {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn contains(&self, id: ParameterId) -> bool {
        self.parameters.iter().any(|p| p.id == id)
    }

    /// IDs of the Parameters still attached after the step.
    pub fn alive(&self) -> impl Iterator<Item = ParameterId> + '_ {
        self.parameters.iter().filter(|p| p.alive).map(|p| p.id)
    }
}

/// Undo/redo stacks plus the state of the currently open transaction.
#[derive(Debug, Clone)]
pub struct TransactionEngine {
    undo: VecDeque<Delta>,
    redo: Vec<Delta>,
    undo_limit: usize,
    enabled: bool,
    /// LogBook as it was when the open transaction started; `Some` while open.
    logbook_at_open: Option<LogBook>,
}

impl TransactionEngine {
    /// Creates a disabled engine. Call [`enable`](Self::enable) to start
    /// recording.
    pub fn new(undo_limit: usize) -> Self {
        TransactionEngine {
            undo: VecDeque::new(),
            redo: Vec::new(),
            undo_limit,
            enabled: false,
            logbook_at_open: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_open(&self) -> bool {
        self.logbook_at_open.is_some()
    }

    pub fn nb_undos(&self) -> usize {
        self.undo.len()
    }

    pub fn nb_redos(&self) -> usize {
        self.redo.len()
    }

    pub fn undo_limit(&self) -> usize {
        self.undo_limit
    }

    /// Changes the undo limit, evicting the oldest deltas if needed.
    pub fn set_undo_limit(&mut self, limit: usize) {
        self.undo_limit = limit;
        self.evict();
    }

    pub fn clear_history(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    // ---- mode ----

    pub fn enable(&mut self, store: &mut LabelStore) -> Result<(), TransactionError> {
        if self.is_open() {
            return Err(TransactionError::TransactionActive);
        }
        self.enabled = true;
        store.set_recording(true);
        Ok(())
    }

    pub fn disable(&mut self, store: &mut LabelStore) -> Result<(), TransactionError> {
        if self.is_open() {
            return Err(TransactionError::TransactionActive);
        }
        self.enabled = false;
        store.set_recording(false);
        Ok(())
    }

    // ---- commands ----

    /// Opens a transaction. Returns `false` when transactions are disabled.
    pub fn open(
        &mut self,
        store: &mut LabelStore,
        logbook: &LogBook,
    ) -> Result<bool, TransactionError> {
        if !self.enabled {
            return Ok(false);
        }
        if self.is_open() {
            return Err(TransactionError::AlreadyOpen);
        }
        store
            .open_scope()
            .map_err(|_| TransactionError::AlreadyOpen)?;
        self.logbook_at_open = Some(logbook.clone());
        tracing::debug!(undos = self.undo.len(), "transaction opened");
        Ok(true)
    }

    /// Commits the open transaction. Returns `true` when a delta was pushed
    /// on the undo stack; a transaction that changed nothing records nothing.
    pub fn commit(&mut self, store: &mut LabelStore) -> Result<bool, TransactionError> {
        if !self.enabled {
            return Ok(false);
        }
        if self.logbook_at_open.take().is_none() {
            return Err(TransactionError::NoOpenTransaction);
        }
        let delta = store
            .commit_scope()
            .map_err(|_| TransactionError::NoOpenTransaction)?;
        if delta.is_empty() {
            tracing::debug!("transaction committed without changes");
            return Ok(false);
        }

        tracing::debug!(changes = delta.len(), "transaction committed");
        self.undo.push_back(delta);
        self.evict();
        self.redo.clear();
        Ok(true)
    }

    /// Aborts the open transaction, reverting the store and the LogBook.
    pub fn abort(
        &mut self,
        store: &mut LabelStore,
        logbook: &mut LogBook,
    ) -> Result<(), TransactionError> {
        if !self.enabled {
            return Ok(());
        }
        let saved = self
            .logbook_at_open
            .take()
            .ok_or(TransactionError::NoOpenTransaction)?;
        store
            .abort_scope()
            .map_err(|_| TransactionError::NoOpenTransaction)?;
        *logbook = saved;
        tracing::debug!("transaction aborted");
        Ok(())
    }

    /// Reverts the `n` most recent deltas, newest first, and returns every
    /// label they touched.
    pub fn undo(
        &mut self,
        store: &mut LabelStore,
        n: usize,
    ) -> Result<BTreeSet<LabelId>, TransactionError> {
        self.check_history(n, self.undo.len())?;
        let mut affected = BTreeSet::new();
        if !self.enabled {
            return Ok(affected);
        }
        for _ in 0..n {
            let Some(delta) = self.undo.pop_back() else {
                break;
            };
            store.revert(&delta);
            affected.extend(delta.labels());
            self.redo.push(delta);
        }
        tracing::debug!(steps = n, labels = affected.len(), "undo applied");
        Ok(affected)
    }

    /// Replays the `n` most recently undone deltas, oldest first, and
    /// returns every label they touched.
    pub fn redo(
        &mut self,
        store: &mut LabelStore,
        n: usize,
    ) -> Result<BTreeSet<LabelId>, TransactionError> {
        self.check_history(n, self.redo.len())?;
        let mut affected = BTreeSet::new();
        if !self.enabled {
            return Ok(affected);
        }
        for _ in 0..n {
            let Some(delta) = self.redo.pop() else {
                break;
            };
            store.reapply(&delta);
            affected.extend(delta.labels());
            self.undo.push_back(delta);
        }
        self.evict();
        tracing::debug!(steps = n, labels = affected.len(), "redo applied");
        Ok(affected)
    }

    fn check_history(&self, requested: usize, available: usize) -> Result<(), TransactionError> {
        if !self.enabled {
            return Ok(());
        }
        if self.is_open() {
            return Err(TransactionError::TransactionActive);
        }
        if requested > available {
            return Err(TransactionError::HistoryRange {
                requested,
                available,
            });
        }
        Ok(())
    }

    fn evict(&mut self) {
        while self.undo.len() > self.undo_limit {
            self.undo.pop_front();
        }
    }
}
