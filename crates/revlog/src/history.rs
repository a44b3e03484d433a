#![forbid(unsafe_code)]

//! Undo/redo history of transactions.
//!
//! [`TransactionLog`] keeps dual stacks of [`Transaction`]s:
//!
//! - **Commit**: executes a transaction and records it if anything applied
//! - **Branch handling**: a new commit clears the redo stack
//! - **Depth limits**: oldest transactions evicted past `max_depth`
//! - **Memory limits**: redo entries, then oldest undo entries, evicted past
//!   `max_bytes`; the newest undo entry is never evicted for bytes
//!
//! # Invariants
//!
//! 1. `total_bytes` equals the sum of `size_bytes()` over both stacks
//! 2. `undo_stack.len() <= config.max_depth` after any operation, unless
//!    `max_depth` is 0 (unlimited)
//! 4. A transaction that applied anything is undoable right after `record`
//! 3. A transaction moves between stacks only when its undo/redo finished;
//!    on failure it stays where it was, with its report returned
//!
//! ```text
//! commit(t3)
//! ┌───────────────────────────────────────┐
//! │ Undo Stack: [t1, t2, t3]              │
//! │ Redo Stack: []                        │
//! └───────────────────────────────────────┘
//!
//! undo()
//! ┌───────────────────────────────────────┐
//! │ Undo Stack: [t1, t2]                  │
//! │ Redo Stack: [t3]                      │
//! └───────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::transaction::{Transaction, TxReport};

/// Configuration for the transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct HistoryConfig {
    /// Maximum number of transactions kept for undo (0 = unlimited).
    pub max_depth: usize,
    /// Maximum total bytes across both stacks (0 = unlimited).
    pub max_bytes: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            max_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_depth: usize, max_bytes: usize) -> Self {
        Self {
            max_depth,
            max_bytes,
        }
    }

    /// Create unlimited configuration (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: 0,
            max_bytes: 0,
        }
    }
}

/// Undo/redo stacks of executed transactions.
pub struct TransactionLog {
    /// Transactions available for undo (newest at back).
    undo_stack: VecDeque<Transaction>,
    /// Transactions available for redo (newest at back).
    redo_stack: VecDeque<Transaction>,
    config: HistoryConfig,
    total_bytes: usize,
}

impl fmt::Debug for TransactionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionLog")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("total_bytes", &self.total_bytes)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl TransactionLog {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            config,
            total_bytes: 0,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Execute `tx` and record it.
    ///
    /// The transaction is recorded whenever at least one command applied, so
    /// a partial execute can still be undone through the log. A transaction
    /// larger than `max_bytes` on its own is still kept as the newest entry;
    /// everything older is evicted instead.
    pub fn commit(&mut self, mut tx: Transaction) -> TxReport {
        let report = tx.execute();
        self.record(tx);
        report
    }

    /// Record a transaction that was already executed.
    ///
    /// Clears the redo stack. A transaction with nothing applied is dropped.
    pub fn record(&mut self, tx: Transaction) {
        if tx.applied_len() == 0 {
            tracing::debug!(target: "revlog.history", label = tx.label(), "nothing applied; not recorded");
            return;
        }

        self.clear_redo();
        self.total_bytes += tx.size_bytes();
        tracing::debug!(
            target: "revlog.history",
            label = tx.label(),
            undo_depth = self.undo_stack.len() + 1,
            "recorded transaction"
        );
        self.undo_stack.push_back(tx);
        self.enforce_limits();
    }

    /// Undo the most recent transaction.
    ///
    /// Returns `None` if there is nothing to undo. If the undo stops early the
    /// transaction stays on the undo stack.
    pub fn undo(&mut self) -> Option<TxReport> {
        let mut tx = self.undo_stack.pop_back()?;
        let old_size = tx.size_bytes();
        let report = tx.undo();
        self.total_bytes = self.total_bytes.saturating_sub(old_size) + tx.size_bytes();

        if tx.applied_len() == 0 {
            self.redo_stack.push_back(tx);
        } else {
            tracing::warn!(target: "revlog.history", label = tx.label(), "undo incomplete; kept on undo stack");
            self.undo_stack.push_back(tx);
        }
        Some(report)
    }

    /// Re-execute the most recently undone transaction.
    ///
    /// Returns `None` if there is nothing to redo. The transaction moves back
    /// to the undo stack if anything applied.
    pub fn redo(&mut self) -> Option<TxReport> {
        let mut tx = self.redo_stack.pop_back()?;
        let old_size = tx.size_bytes();
        let report = tx.execute();
        self.total_bytes = self.total_bytes.saturating_sub(old_size) + tx.size_bytes();

        if tx.applied_len() > 0 {
            self.undo_stack.push_back(tx);
            self.enforce_limits();
        } else {
            tracing::warn!(target: "revlog.history", label = tx.label(), "redo applied nothing; kept on redo stack");
            self.redo_stack.push_back(tx);
        }
        Some(report)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // ========================================================================
    // Info
    // ========================================================================

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Labels of undoable transactions (most recent first).
    pub fn undo_labels(&self, limit: usize) -> Vec<&str> {
        self.undo_stack
            .iter()
            .rev()
            .take(limit)
            .map(Transaction::label)
            .collect()
    }

    /// Labels of redoable transactions (most recent first).
    pub fn redo_labels(&self, limit: usize) -> Vec<&str> {
        self.redo_stack
            .iter()
            .rev()
            .take(limit)
            .map(Transaction::label)
            .collect()
    }

    /// Get total memory usage in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.total_bytes
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Forget all history. The store is not touched.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_bytes = 0;
    }

    fn clear_redo(&mut self) {
        for tx in self.redo_stack.drain(..) {
            self.total_bytes = self.total_bytes.saturating_sub(tx.size_bytes());
        }
    }

    /// Evict oldest entries until depth and memory limits hold.
    fn enforce_limits(&mut self) {
        while self.config.max_depth > 0 && self.undo_stack.len() > self.config.max_depth {
            if let Some(tx) = self.undo_stack.pop_front() {
                self.total_bytes = self.total_bytes.saturating_sub(tx.size_bytes());
                tracing::debug!(target: "revlog.history", label = tx.label(), "evicted (depth)");
            }
        }

        if self.config.max_bytes > 0 {
            while self.total_bytes > self.config.max_bytes {
                if let Some(tx) = self.redo_stack.pop_front() {
                    self.total_bytes = self.total_bytes.saturating_sub(tx.size_bytes());
                    continue;
                }

                if self.undo_stack.len() <= 1 {
                    break;
                }
                if let Some(tx) = self.undo_stack.pop_front() {
                    self.total_bytes = self.total_bytes.saturating_sub(tx.size_bytes());
                    tracing::debug!(target: "revlog.history", label = tx.label(), "evicted (bytes)");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CallbackCmd, CommandError, Effect, RecordCmd};
    use crate::store::SharedStore;
    use crate::transaction::TxStatus;

    fn insert_tx(store: &SharedStore<String>, label: &str, values: &[&str]) -> Transaction {
        let mut tx = Transaction::new(label);
        for v in values {
            tx.add_command(RecordCmd::insert(store, (*v).to_string()));
        }
        tx
    }

    #[test]
    fn test_new_log() {
        let log = TransactionLog::default();
        assert!(!log.can_undo());
        assert!(!log.can_redo());
        assert_eq!(log.memory_usage(), 0);
    }

    #[test]
    fn test_commit_undo_redo() {
        let store = SharedStore::new();
        let mut log = TransactionLog::default();

        log.commit(insert_tx(&store, "first", &["a", "b"]));
        log.commit(insert_tx(&store, "second", &["c"]));
        assert_eq!(store.snapshot(), vec!["a", "b", "c"]);
        assert_eq!(log.undo_labels(10), vec!["second", "first"]);

        let report = log.undo().expect("something to undo");
        assert_eq!(report.status(), TxStatus::Complete);
        assert_eq!(store.snapshot(), vec!["a", "b"]);
        assert_eq!(log.redo_labels(10), vec!["second"]);

        log.undo();
        assert!(store.is_empty());
        assert!(log.undo().is_none());

        log.redo();
        log.redo();
        assert_eq!(store.snapshot(), vec!["a", "b", "c"]);
        assert!(log.redo().is_none());
    }

    #[test]
    fn test_commit_clears_redo() {
        let store = SharedStore::new();
        let mut log = TransactionLog::default();
        log.commit(insert_tx(&store, "a", &["a"]));
        log.undo();
        assert!(log.can_redo());

        log.commit(insert_tx(&store, "b", &["b"]));
        assert!(!log.can_redo());
        assert_eq!(log.redo_depth(), 0);
    }

    #[test]
    fn test_commit_of_failed_tx_not_recorded() {
        let mut log = TransactionLog::default();
        let tx = Transaction::new("doomed").with_command(
            CallbackCmd::new("fail").with_apply(|| Err(CommandError::Other("no".into()))),
        );
        let report = log.commit(tx);
        assert_eq!(report.succeeded(), 0);
        assert!(!log.can_undo());
    }

    #[test]
    fn test_partial_commit_is_recorded() {
        let store = SharedStore::new();
        let mut log = TransactionLog::default();
        let mut tx = insert_tx(&store, "partial", &["a"]);
        tx.add_command(CallbackCmd::new("fail").with_apply(|| Err(CommandError::Other("no".into()))));

        let report = log.commit(tx);
        assert!(!report.is_complete());
        assert_eq!(log.undo_depth(), 1);

        log.undo();
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_undo_stays_on_undo_stack() {
        let mut log = TransactionLog::default();
        let tx = Transaction::new("stuck").with_command(
            CallbackCmd::new("stuck")
                .with_apply(|| Ok(Effect::Changed))
                .with_invert(|| Err(CommandError::Other("no".into()))),
        );
        log.commit(tx);

        let report = log.undo().unwrap();
        assert!(report.failure().is_some());
        assert_eq!(log.undo_depth(), 1);
        assert_eq!(log.redo_depth(), 0);
    }

    #[test]
    fn test_max_depth_enforced() {
        let store = SharedStore::new();
        let mut log = TransactionLog::new(HistoryConfig::new(3, 0));
        for i in 0..5 {
            log.commit(insert_tx(&store, &format!("tx{i}"), &["v"]));
        }
        assert_eq!(log.undo_depth(), 3);
        assert_eq!(log.undo_labels(1), vec!["tx4"]);
    }

    #[test]
    fn test_byte_limit_evicts_old_transactions() {
        let store = SharedStore::new();
        let mut log = TransactionLog::new(HistoryConfig::new(100, 1));
        for i in 0..5 {
            log.commit(insert_tx(&store, &format!("tx{i}"), &["v"]));
        }
        assert!(log.undo_depth() < 5, "depth={}", log.undo_depth());
    }

    #[test]
    fn test_byte_limit_keeps_newest_transaction() {
        let store = SharedStore::new();
        let mut log = TransactionLog::new(HistoryConfig::new(100, 64));
        let tx = insert_tx(&store, "big", &["v"]);
        assert!(tx.size_bytes() > 64, "size={}", tx.size_bytes());

        log.commit(tx);
        assert_eq!(store.snapshot(), vec!["v"]);
        assert!(log.can_undo());

        log.commit(insert_tx(&store, "bigger", &["w"]));
        assert_eq!(log.undo_labels(10), vec!["bigger"]);

        log.undo();
        assert_eq!(store.snapshot(), vec!["v"]);
    }

    #[test]
    fn test_zero_depth_is_unlimited() {
        let store = SharedStore::new();
        let mut log = TransactionLog::new(HistoryConfig::unlimited());
        for i in 0..150 {
            log.commit(insert_tx(&store, &format!("tx{i}"), &["v"]));
        }
        assert_eq!(log.undo_depth(), 150);
        assert_eq!(HistoryConfig::unlimited().max_depth, 0);
    }

    #[test]
    fn test_memory_tracking() {
        let store = SharedStore::new();
        let mut log = TransactionLog::new(HistoryConfig::unlimited());
        log.commit(insert_tx(&store, "a", &["hello"]));
        let after_first = log.memory_usage();
        assert!(after_first > 0);

        log.commit(insert_tx(&store, "b", &["world"]));
        assert!(log.memory_usage() > after_first);

        log.undo();
        log.redo();
        log.clear();
        assert_eq!(log.memory_usage(), 0);
        assert!(!log.can_undo());
    }

    #[test]
    fn test_config_defaults() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_depth, 100);
        assert_eq!(config.max_bytes, 10 * 1024 * 1024);
        assert_eq!(HistoryConfig::unlimited().max_bytes, 0);
        let log = TransactionLog::new(HistoryConfig::new(42, 1024));
        assert_eq!(log.config().max_depth, 42);
    }

    #[test]
    fn test_debug_impl() {
        let log = TransactionLog::default();
        let s = format!("{log:?}");
        assert!(s.contains("TransactionLog"));
        assert!(s.contains("undo_depth"));
    }
}
