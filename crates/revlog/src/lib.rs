#![forbid(unsafe_code)]

//! Reversible command log.
//!
//! Groups mutating operations against a shared record store into ordered,
//! undoable batches.
//!
//! # Key Components
//!
//! - [`SharedStore`] - handle to the ordered record sequence commands mutate
//! - [`ReversibleCmd`] - capability set `{apply, invert, describe}`
//! - [`RecordCmd`] - the `Insert`/`Delete` pair over a store
//! - [`Transaction`] - ordered batch with execute and reverse-order undo
//! - [`TransactionLog`] - undo/redo history of transactions
//!
//! # Example
//!
//! ```
//! use revlog::{RecordCmd, SharedStore, Transaction, TxStatus};
//!
//! let store = SharedStore::new();
//! let mut tx = Transaction::new("demo")
//!     .with_command(RecordCmd::insert(&store, "Data1".to_string()))
//!     .with_command(RecordCmd::insert(&store, "Data2".to_string()))
//!     .with_command(RecordCmd::delete(&store, "Data1".to_string()));
//!
//! assert_eq!(tx.execute().status(), TxStatus::Complete);
//! assert_eq!(store.snapshot(), vec!["Data2"]);
//!
//! tx.undo();
//! assert!(store.is_empty());
//! ```
//!
//! # Concurrency
//!
//! Each store primitive runs under the store's lock, but a transaction's
//! batch is not isolated: the design assumes one logical mutator applying
//! one transaction at a time.

pub mod cancellation;
pub mod command;
#[cfg(feature = "config")]
pub mod config;
pub mod history;
pub mod store;
pub mod transaction;

pub use cancellation::{CancellationSource, CancellationToken};
pub use command::{
    CallbackCmd, CommandError, CommandMetadata, CommandResult, CommandSource, Effect, RecordCmd,
    RecordOp, ReversibleCmd,
};
#[cfg(feature = "config")]
pub use config::{ConfigError, RevlogConfig};
pub use history::{HistoryConfig, TransactionLog};
pub use store::{MissingPolicy, Record, RecordStore, SharedStore, StoreConfig, StoreError};
pub use transaction::{Phase, StepOutcome, Transaction, TxReport, TxState, TxStatus};
