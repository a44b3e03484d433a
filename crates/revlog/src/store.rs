#![forbid(unsafe_code)]

//! Ordered record store mutated by reversible commands.
//!
//! [`RecordStore`] is the single owned collection that commands act upon. It
//! exposes exactly two mutations, [`append`](RecordStore::append) and
//! [`remove_first_match`](RecordStore::remove_first_match); nothing else
//! touches the record sequence.
//!
//! [`SharedStore`] wraps a store in an `Arc<Mutex<_>>` so that many commands
//! (and many transactions) can reference the same instance. Each primitive
//! call takes the lock for that call only:
//!
//! ```text
//! Transaction A ──► RecordCmd ──┐
//!                               ├──► SharedStore ──lock──► RecordStore { records }
//! Transaction B ──► RecordCmd ──┘
//! ```
//!
//! This keeps individual appends and removals from interleaving, but a
//! multi-command batch is not isolated from other writers.
//!
//! # Invariants
//!
//! - A failed `append` or `remove_first_match` leaves `records` untouched.
//! - `remove_first_match` always removes the leftmost equal record.
//! - `snapshot()` returns an owned copy; callers can never alias the records.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Values that can live in a [`RecordStore`].
///
/// Records are opaque tokens compared by value. `Display` is used for audit
/// strings and error messages. Commands hold their value by copy and are
/// shared across threads, so records must be `Send + Sync`.
pub trait Record: Clone + PartialEq + fmt::Display + Send + Sync + 'static {}

impl<T> Record for T where T: Clone + PartialEq + fmt::Display + Send + Sync + 'static {}

/// What `remove_first_match` does when no equal record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum MissingPolicy {
    /// Treat the removal as a no-op and report that nothing changed.
    #[default]
    Ignore,
    /// Fail with [`StoreError::NotFound`].
    Reject,
}

/// Constraints enforced by a [`RecordStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct StoreConfig {
    /// Maximum number of records (0 = unlimited).
    pub max_records: usize,
    /// Reject appends of a value that is already present.
    pub unique: bool,
    /// Behavior of removals that find no match.
    pub missing: MissingPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_records: 0,
            unique: false,
            missing: MissingPolicy::Ignore,
        }
    }
}

impl StoreConfig {
    /// Limit the store to `max_records` entries.
    #[must_use]
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// Enforce value uniqueness on append.
    #[must_use]
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Set the missing-record policy.
    #[must_use]
    pub fn with_missing(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }

    /// Strict preset: removals of absent values fail instead of silently
    /// succeeding.
    #[must_use]
    pub fn strict() -> Self {
        Self::default().with_missing(MissingPolicy::Reject)
    }
}

/// Errors raised by store primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `remove_first_match` found nothing under [`MissingPolicy::Reject`].
    #[error("record '{value}' not found")]
    NotFound { value: String },
    /// `append` of a value already present in a unique store.
    #[error("record '{value}' already present")]
    Duplicate { value: String },
    /// `append` into a full store.
    #[error("store is full ({capacity} records)")]
    CapacityExceeded { capacity: usize },
}

/// Ordered sequence of records; duplicates permitted unless configured
/// otherwise.
#[derive(Debug, Clone)]
pub struct RecordStore<T> {
    records: Vec<T>,
    config: StoreConfig,
}

impl<T: Record> Default for RecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordStore<T> {
    /// Create an empty store with the base (permissive) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store enforcing `config`.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            records: Vec::new(),
            config,
        }
    }

    /// Add `value` to the end of the sequence.
    pub fn append(&mut self, value: T) -> Result<(), StoreError> {
        if self.config.max_records > 0 && self.records.len() >= self.config.max_records {
            return Err(StoreError::CapacityExceeded {
                capacity: self.config.max_records,
            });
        }
        if self.config.unique && self.records.contains(&value) {
            return Err(StoreError::Duplicate {
                value: value.to_string(),
            });
        }

        tracing::trace!(target: "revlog.store", value = %value, len = self.records.len() + 1, "append");
        self.records.push(value);
        Ok(())
    }

    /// Remove the leftmost record equal to `value`.
    ///
    /// Returns `Ok(true)` if a record was removed and `Ok(false)` if none
    /// matched under [`MissingPolicy::Ignore`].
    pub fn remove_first_match(&mut self, value: &T) -> Result<bool, StoreError> {
        match self.records.iter().position(|r| r == value) {
            Some(idx) => {
                self.records.remove(idx);
                tracing::trace!(target: "revlog.store", value = %value, index = idx, "remove_first_match");
                Ok(true)
            }
            None => match self.config.missing {
                MissingPolicy::Ignore => {
                    tracing::trace!(target: "revlog.store", value = %value, "remove_first_match: no match");
                    Ok(false)
                }
                MissingPolicy::Reject => Err(StoreError::NotFound {
                    value: value.to_string(),
                }),
            },
        }
    }

    /// Owned copy of the current records.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.records.clone()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check if an equal record is present.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.records.contains(value)
    }

    /// The constraints this store enforces.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Cloneable handle to one [`RecordStore`].
///
/// Clones share the same records. Every method locks for the duration of a
/// single primitive call.
pub struct SharedStore<T> {
    inner: Arc<Mutex<RecordStore<T>>>,
}

impl<T> Clone for SharedStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Record + fmt::Debug> fmt::Debug for SharedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStore")
            .field("records", &self.lock().records)
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl<T: Record> Default for SharedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> From<RecordStore<T>> for SharedStore<T> {
    fn from(store: RecordStore<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }
}

impl<T: Record> SharedStore<T> {
    /// Create a handle to a new, empty, permissive store.
    #[must_use]
    pub fn new() -> Self {
        RecordStore::new().into()
    }

    /// Create a handle to a new, empty store enforcing `config`.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        RecordStore::with_config(config).into()
    }

    /// See [`RecordStore::append`].
    pub fn append(&self, value: T) -> Result<(), StoreError> {
        self.lock().append(value)
    }

    /// See [`RecordStore::remove_first_match`].
    pub fn remove_first_match(&self, value: &T) -> Result<bool, StoreError> {
        self.lock().remove_first_match(value)
    }

    /// See [`RecordStore::snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().snapshot()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.lock().contains(value)
    }

    #[must_use]
    pub fn config(&self) -> StoreConfig {
        self.lock().config().clone()
    }

    /// Check whether two handles refer to the same store.
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, RecordStore<T>> {
        // A panic while holding the lock cannot leave `records` half-written:
        // every mutation is a single Vec call.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn store_of(values: &[&str]) -> RecordStore<String> {
        let mut store = RecordStore::new();
        for v in values {
            store.append((*v).to_string()).unwrap();
        }
        store
    }

    #[test]
    fn test_new_store_is_empty() {
        let store: RecordStore<String> = RecordStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.snapshot(), Vec::<String>::new());
    }

    #[test]
    fn test_append_preserves_order_and_duplicates() {
        let store = store_of(&["a", "b", "a"]);
        assert_eq!(store.snapshot(), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_remove_first_match_takes_leftmost() {
        let mut store = store_of(&["x", "y", "x", "z"]);
        assert_eq!(store.remove_first_match(&"x".to_string()), Ok(true));
        assert_eq!(store.snapshot(), vec!["y", "x", "z"]);
    }

    #[test]
    fn test_remove_missing_is_noop_by_default() {
        let mut store = store_of(&["a"]);
        assert_eq!(store.remove_first_match(&"ghost".to_string()), Ok(false));
        assert_eq!(store.snapshot(), vec!["a"]);
    }

    #[test]
    fn test_remove_missing_rejected_when_strict() {
        let mut store = RecordStore::with_config(StoreConfig::strict());
        store.append("a".to_string()).unwrap();
        let err = store.remove_first_match(&"ghost".to_string()).unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                value: "ghost".into()
            }
        );
        assert_eq!(store.snapshot(), vec!["a"]);
    }

    #[test]
    fn test_capacity_limit() {
        let mut store = RecordStore::with_config(StoreConfig::default().with_max_records(2));
        store.append(1u32).unwrap();
        store.append(2u32).unwrap();
        assert_eq!(
            store.append(3u32),
            Err(StoreError::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(store.snapshot(), vec![1, 2]);
    }

    #[test]
    fn test_unique_rejects_duplicate() {
        let mut store = RecordStore::with_config(StoreConfig::default().with_unique(true));
        store.append("a".to_string()).unwrap();
        let err = store.append("a".to_string()).unwrap_err();
        assert!(err.to_string().contains("already present"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_does_not_alias() {
        let store = store_of(&["a"]);
        let mut snap = store.snapshot();
        snap.push("b".to_string());
        snap[0] = "changed".to_string();
        assert_eq!(store.snapshot(), vec!["a"]);
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::CapacityExceeded { capacity: 7 };
        assert!(err.to_string().contains('7'));
        let err = StoreError::NotFound {
            value: "Data1".into(),
        };
        assert!(err.to_string().contains("Data1"));
    }

    #[test]
    fn test_shared_handles_see_same_records() {
        let a: SharedStore<String> = SharedStore::new();
        let b = a.clone();
        a.append("one".into()).unwrap();
        b.append("two".into()).unwrap();
        assert!(a.same_store(&b));
        assert_eq!(a.snapshot(), vec!["one", "two"]);
        assert!(!a.same_store(&SharedStore::new()));
    }

    #[test]
    fn test_shared_store_concurrent_appends() {
        let store: SharedStore<u32> = SharedStore::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        store.append(t * 100 + i).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }

    #[test]
    fn test_shared_store_config_roundtrip() {
        let store: SharedStore<String> = SharedStore::with_config(StoreConfig::strict());
        assert_eq!(store.config().missing, MissingPolicy::Reject);
    }

    #[test]
    fn test_debug_impl() {
        let store: SharedStore<String> = SharedStore::new();
        store.append("dbg".into()).unwrap();
        let s = format!("{store:?}");
        assert!(s.contains("SharedStore"));
        assert!(s.contains("dbg"));
    }
}
