#![forbid(unsafe_code)]

//! Reversible commands over a [`SharedStore`].
//!
//! This module provides the [`ReversibleCmd`] capability (`apply`, `invert`,
//! `describe`) and two implementations:
//!
//! - [`RecordCmd`]: the closed `Insert`/`Delete` pair over a record store.
//! - [`CallbackCmd`]: apply/invert supplied as closures, for mutations the
//!   record pair does not cover.
//!
//! # Invariants
//!
//! - `invert()` is the exact semantic inverse of `apply()` for the command's
//!   own captured value. It never consults a snapshot of earlier store state.
//! - Commands are immutable after construction; `apply`/`invert` take `&self`
//!   and may be called any number of times.
//! - `describe()` is for audit output only and never drives control flow.
//!
//! # Failure Modes
//!
//! - **Constraint violation**: a configured store rejects the mutation
//!   - Surfaces as [`CommandError::Store`]; the store is unchanged
//! - **Silent no-op**: `Delete` of an absent value under the permissive policy
//!   - Surfaces as `Ok(Effect::Unchanged)` so audit logs can tell

use std::fmt;
use std::time::Instant;

use thiserror::Error;

use crate::store::{Record, SharedStore, StoreError};

/// Who/what created a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandSource {
    /// Direct caller action.
    #[default]
    User,
    /// Built by application code on the caller's behalf.
    Programmatic,
    /// Re-issued from a recorded log.
    Replay,
}

/// Metadata attached to every command for tracing.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// When the command was created.
    pub created_at: Instant,
    /// Who/what created the command.
    pub source: CommandSource,
}

impl CommandMetadata {
    #[must_use]
    pub fn new(source: CommandSource) -> Self {
        Self {
            created_at: Instant::now(),
            source,
        }
    }
}

impl Default for CommandMetadata {
    fn default() -> Self {
        Self::new(CommandSource::User)
    }
}

/// Observable effect of a successful `apply`/`invert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// The store was mutated.
    Changed,
    /// The call succeeded without touching the store.
    Unchanged,
}

/// Result of applying or inverting a command.
pub type CommandResult<T = Effect> = Result<T, CommandError>;

/// Errors that can occur while applying or inverting a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The underlying store rejected the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Cancellation was requested before this command ran.
    #[error("cancelled before the command ran")]
    Cancelled,
    /// Command cannot run in its current configuration.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// A self-contained, reversible unit of mutation.
pub trait ReversibleCmd: Send + Sync {
    /// Perform the forward mutation.
    fn apply(&self) -> CommandResult;

    /// Perform the exact reverse of [`apply`](Self::apply).
    fn invert(&self) -> CommandResult;

    /// Audit line for the forward mutation (e.g. `"Inserted: Data1"`).
    fn describe(&self) -> String;

    /// Audit line for the inverse mutation.
    fn describe_inverse(&self) -> String {
        format!("Reverted: {}", self.describe())
    }

    /// Size of this command in bytes for memory budgeting.
    fn size_bytes(&self) -> usize;

    fn metadata(&self) -> &CommandMetadata;

    fn debug_name(&self) -> &'static str {
        "ReversibleCmd"
    }
}

impl fmt::Debug for dyn ReversibleCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.debug_name())
            .field("description", &self.describe())
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

// ============================================================================
// Record commands
// ============================================================================

/// The two record mutations, tagged with their payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOp<T> {
    /// `apply` appends; `invert` removes the first match.
    Insert(T),
    /// `apply` removes the first match; `invert` appends.
    Delete(T),
}

impl<T: Record> RecordOp<T> {
    /// The captured value.
    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Insert(v) | Self::Delete(v) => v,
        }
    }

    /// The operation that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Insert(v) => Self::Delete(v.clone()),
            Self::Delete(v) => Self::Insert(v.clone()),
        }
    }

    fn run(&self, store: &SharedStore<T>) -> CommandResult {
        match self {
            Self::Insert(v) => {
                store.append(v.clone())?;
                Ok(Effect::Changed)
            }
            Self::Delete(v) => {
                if store.remove_first_match(v)? {
                    Ok(Effect::Changed)
                } else {
                    Ok(Effect::Unchanged)
                }
            }
        }
    }
}

impl<T: Record> fmt::Display for RecordOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert(v) => write!(f, "Inserted: {v}"),
            Self::Delete(v) => write!(f, "Deleted: {v}"),
        }
    }
}

/// A [`RecordOp`] bound to the store it mutates.
pub struct RecordCmd<T> {
    op: RecordOp<T>,
    store: SharedStore<T>,
    metadata: CommandMetadata,
}

impl<T: Record + fmt::Debug> fmt::Debug for RecordCmd<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCmd")
            .field("op", &self.op)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<T: Record> RecordCmd<T> {
    /// Bind `op` to `store`.
    #[must_use]
    pub fn new(store: &SharedStore<T>, op: RecordOp<T>) -> Self {
        Self {
            op,
            store: store.clone(),
            metadata: CommandMetadata::default(),
        }
    }

    /// Command that appends `value` to `store`.
    #[must_use]
    pub fn insert(store: &SharedStore<T>, value: T) -> Self {
        Self::new(store, RecordOp::Insert(value))
    }

    /// Command that removes the first `value` from `store`.
    #[must_use]
    pub fn delete(store: &SharedStore<T>, value: T) -> Self {
        Self::new(store, RecordOp::Delete(value))
    }

    /// Set the command source.
    #[must_use]
    pub fn with_source(mut self, source: CommandSource) -> Self {
        self.metadata.source = source;
        self
    }

    #[must_use]
    pub fn op(&self) -> &RecordOp<T> {
        &self.op
    }

    /// Handle to the target store.
    #[must_use]
    pub fn store(&self) -> &SharedStore<T> {
        &self.store
    }
}

impl<T: Record> ReversibleCmd for RecordCmd<T> {
    fn apply(&self) -> CommandResult {
        self.op.run(&self.store)
    }

    fn invert(&self) -> CommandResult {
        self.op.inverse().run(&self.store)
    }

    fn describe(&self) -> String {
        self.op.to_string()
    }

    fn describe_inverse(&self) -> String {
        self.op.inverse().to_string()
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.op.value().to_string().len()
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn debug_name(&self) -> &'static str {
        match self.op {
            RecordOp::Insert(_) => "InsertCmd",
            RecordOp::Delete(_) => "DeleteCmd",
        }
    }
}

// ============================================================================
// Callback commands
// ============================================================================

/// Callback type for both directions of a [`CallbackCmd`].
pub type CmdFn = Box<dyn Fn() -> CommandResult + Send + Sync>;

/// Command whose mutations are supplied as closures.
///
/// The closures capture whatever store handle they need. A command without
/// an apply (or invert) callback fails with [`CommandError::InvalidState`].
pub struct CallbackCmd {
    description: String,
    metadata: CommandMetadata,
    apply: Option<CmdFn>,
    invert: Option<CmdFn>,
}

impl fmt::Debug for CallbackCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCmd")
            .field("description", &self.description)
            .field("metadata", &self.metadata)
            .field("has_apply", &self.apply.is_some())
            .field("has_invert", &self.invert.is_some())
            .finish()
    }
}

impl CallbackCmd {
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            metadata: CommandMetadata::new(CommandSource::Programmatic),
            apply: None,
            invert: None,
        }
    }

    /// Set the apply callback.
    #[must_use]
    pub fn with_apply<F>(mut self, f: F) -> Self
    where
        F: Fn() -> CommandResult + Send + Sync + 'static,
    {
        self.apply = Some(Box::new(f));
        self
    }

    /// Set the invert callback.
    #[must_use]
    pub fn with_invert<F>(mut self, f: F) -> Self
    where
        F: Fn() -> CommandResult + Send + Sync + 'static,
    {
        self.invert = Some(Box::new(f));
        self
    }
}

impl ReversibleCmd for CallbackCmd {
    fn apply(&self) -> CommandResult {
        match self.apply {
            Some(ref apply) => apply(),
            None => Err(CommandError::InvalidState(
                "no apply callback set".to_string(),
            )),
        }
    }

    fn invert(&self) -> CommandResult {
        match self.invert {
            Some(ref invert) => invert(),
            None => Err(CommandError::InvalidState(
                "no invert callback set".to_string(),
            )),
        }
    }

    fn describe(&self) -> String {
        self.description.clone()
    }

    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.description.len()
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn debug_name(&self) -> &'static str {
        "CallbackCmd"
    }
}

// ============================================================================
// Tests
// ============================================================================
