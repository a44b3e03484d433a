#![forbid(unsafe_code)]

//! Ordered, undoable batches of commands.
//!
//! A [`Transaction`] owns an append-only list of [`ReversibleCmd`]s. Calling
//! [`execute`](Transaction::execute) applies them in insertion order and
//! records which ones succeeded; [`undo`](Transaction::undo) inverts exactly
//! those, newest first.
//!
//! # State machine
//!
//! ```text
//!            execute()              undo()
//!   Built ─────────────► Executed ─────────► Undone
//!                           ▲                  │
//!                           └──── execute() ───┘
//! ```
//!
//! There is no terminal state: a transaction may cycle through
//! execute/undo indefinitely.
//!
//! # Invariants
//!
//! 1. `undo` inverts commands in strict reverse of the order they were
//!    applied, as recorded in the application log
//! 2. Execution stops at the first failing (or cancelled) step; later
//!    commands are never applied during that call
//! 3. After a partial execute, `undo` reverses only the successful prefix
//! 4. `undo` with an empty application log is a no-op returning an empty
//!    report
//!
//! Partial success is data, not an error: every call returns a [`TxReport`]
//! listing each attempted step and its outcome.

use std::fmt;

use crate::cancellation::CancellationToken;
use crate::command::{CommandError, CommandResult, Effect, ReversibleCmd};

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxState {
    /// No `execute` has run yet.
    #[default]
    Built,
    /// The most recent call was `execute` (possibly partial), or an `undo`
    /// that did not finish.
    Executed,
    /// The most recent `undo` reverted every applied command.
    Undone,
}

/// Which direction a [`TxReport`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Execute,
    Undo,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute => f.write_str("execute"),
            Self::Undo => f.write_str("undo"),
        }
    }
}

/// Outcome of one attempted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Position of the command in insertion order.
    pub index: usize,
    /// Audit line (`describe()` on execute, `describe_inverse()` on undo).
    pub description: String,
    /// What the command returned.
    pub result: CommandResult,
}

impl StepOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// The error, if this step failed.
    #[must_use]
    pub fn error(&self) -> Option<&CommandError> {
        self.result.as_ref().err()
    }

    /// The effect, if this step succeeded.
    #[must_use]
    pub fn effect(&self) -> Option<Effect> {
        self.result.as_ref().ok().copied()
    }
}

/// Summary classification of a [`TxReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Nothing was targeted (empty transaction, or undo with nothing applied).
    NoOp,
    /// Every targeted command succeeded.
    Complete,
    /// `succeeded` of `total` targeted commands succeeded before the run
    /// stopped.
    Partial { succeeded: usize, total: usize },
}

/// Ordered list of step outcomes from one `execute` or `undo` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReport {
    phase: Phase,
    steps: Vec<StepOutcome>,
    total: usize,
    applied_after: usize,
}

impl TxReport {
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Attempted steps, in the order they ran.
    #[must_use]
    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    /// Number of attempted steps (successes plus at most one failure).
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of commands the call set out to run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of steps that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.steps.iter().filter(|s| s.is_ok()).count()
    }

    /// The step that stopped the run, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&StepOutcome> {
        self.steps.last().filter(|s| !s.is_ok())
    }

    /// Size of the transaction's application log after this call.
    #[must_use]
    pub fn applied_after(&self) -> usize {
        self.applied_after
    }

    #[must_use]
    pub fn status(&self) -> TxStatus {
        let succeeded = self.succeeded();
        if self.total == 0 {
            TxStatus::NoOp
        } else if succeeded == self.total {
            TxStatus::Complete
        } else {
            TxStatus::Partial {
                succeeded,
                total: self.total,
            }
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.status(), TxStatus::Complete | TxStatus::NoOp)
    }

    /// Audit lines of the successful steps.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(|s| s.is_ok())
            .map(|s| s.description.as_str())
    }

    #[must_use]
    pub fn into_steps(self) -> Vec<StepOutcome> {
        self.steps
    }
}

/// An ordered batch of commands executed and undone as a unit.
pub struct Transaction {
    label: String,
    /// Commands in insertion order.
    commands: Vec<Box<dyn ReversibleCmd>>,
    /// Indices of commands applied by the latest `execute`, in application
    /// order. Shrinks from the back as `undo` reverts them.
    applied: Vec<usize>,
    state: TxState,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("label", &self.label)
            .field("commands_count", &self.commands.len())
            .field("applied", &self.applied.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new("transaction")
    }
}

impl Transaction {
    /// Create an empty transaction.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
            applied: Vec::new(),
            state: TxState::Built,
        }
    }

    /// Append a command.
    ///
    /// Allowed in any state. A command added after `execute` is not applied
    /// retroactively; it runs on the next `execute`.
    pub fn add_command<C: ReversibleCmd + 'static>(&mut self, cmd: C) {
        self.commands.push(Box::new(cmd));
    }

    /// Append an already boxed command.
    pub fn add_boxed(&mut self, cmd: Box<dyn ReversibleCmd>) {
        self.commands.push(cmd);
    }

    /// Builder form of [`add_command`](Self::add_command).
    #[must_use]
    pub fn with_command<C: ReversibleCmd + 'static>(mut self, cmd: C) -> Self {
        self.add_command(cmd);
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Length of the successful prefix still in effect.
    #[must_use]
    pub fn applied_len(&self) -> usize {
        self.applied.len()
    }

    /// Indices of applied commands, in the order they were applied.
    #[must_use]
    pub fn applied_order(&self) -> &[usize] {
        &self.applied
    }

    /// Command at `index` in insertion order.
    #[must_use]
    pub fn command(&self, index: usize) -> Option<&dyn ReversibleCmd> {
        self.commands.get(index).map(|c| c.as_ref())
    }

    /// Forward audit lines, in insertion order.
    #[must_use]
    pub fn descriptions(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.describe()).collect()
    }

    /// Size in bytes for memory accounting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.label.len()
            + self.applied.capacity() * std::mem::size_of::<usize>()
            + self.commands.iter().map(|c| c.size_bytes()).sum::<usize>()
    }

    /// Apply every command in insertion order.
    pub fn execute(&mut self) -> TxReport {
        self.execute_with(&CancellationToken::never())
    }

    /// Apply every command in insertion order, checking `token` before each
    /// step.
    ///
    /// Stops at the first failure or cancellation; the store keeps whatever
    /// the successful prefix did. The returned report includes the stopping
    /// step.
    pub fn execute_with(&mut self, token: &CancellationToken) -> TxReport {
        let span = tracing::debug_span!(
            "revlog.tx.execute",
            label = %self.label,
            commands = self.commands.len(),
            applied = tracing::field::Empty,
        )
        .entered();

        if self.state == TxState::Executed && !self.applied.is_empty() {
            tracing::warn!(
                target: "revlog.tx",
                label = %self.label,
                untracked = self.applied.len(),
                "re-executing without undo; previous prefix is no longer tracked"
            );
        }
        self.applied.clear();

        let mut steps = Vec::with_capacity(self.commands.len());
        for (index, cmd) in self.commands.iter().enumerate() {
            let description = cmd.describe();
            let result = if token.is_cancelled() {
                Err(CommandError::Cancelled)
            } else {
                cmd.apply()
            };

            match &result {
                Ok(effect) => {
                    tracing::debug!(
                        target: "revlog.tx",
                        index,
                        effect = ?effect,
                        source = ?cmd.metadata().source,
                        "{description}"
                    );
                    self.applied.push(index);
                }
                Err(err) => {
                    tracing::warn!(
                        target: "revlog.tx",
                        index,
                        error = %err,
                        "execute stopped at {description}"
                    );
                }
            }

            let failed = result.is_err();
            steps.push(StepOutcome {
                index,
                description,
                result,
            });
            if failed {
                break;
            }
        }

        self.state = TxState::Executed;
        span.record("applied", self.applied.len());

        TxReport {
            phase: Phase::Execute,
            steps,
            total: self.commands.len(),
            applied_after: self.applied.len(),
        }
    }

    /// Invert the applied commands, newest first.
    pub fn undo(&mut self) -> TxReport {
        self.undo_with(&CancellationToken::never())
    }

    /// Invert the applied commands, newest first, checking `token` before
    /// each step.
    ///
    /// A failing (or cancelled) step stops the run. The stopping command and
    /// every command before it stay in the application log, so a later
    /// `undo` resumes where this one stopped.
    pub fn undo_with(&mut self, token: &CancellationToken) -> TxReport {
        let total = self.applied.len();
        let span = tracing::debug_span!(
            "revlog.tx.undo",
            label = %self.label,
            applied = total,
            remaining = tracing::field::Empty,
        )
        .entered();

        let mut steps = Vec::with_capacity(total);
        while let Some(&index) = self.applied.last() {
            let cmd = &self.commands[index];
            let description = cmd.describe_inverse();
            let result = if token.is_cancelled() {
                Err(CommandError::Cancelled)
            } else {
                cmd.invert()
            };

            let failed = match &result {
                Ok(effect) => {
                    tracing::debug!(
                        target: "revlog.tx",
                        index,
                        effect = ?effect,
                        "{description}"
                    );
                    self.applied.pop();
                    false
                }
                Err(err) => {
                    tracing::warn!(
                        target: "revlog.tx",
                        index,
                        error = %err,
                        "undo stopped at {description}"
                    );
                    true
                }
            };

            steps.push(StepOutcome {
                index,
                description,
                result,
            });
            if failed {
                break;
            }
        }

        if total > 0 && self.applied.is_empty() {
            self.state = TxState::Undone;
        }
        span.record("remaining", self.applied.len());

        TxReport {
            phase: Phase::Undo,
            steps,
            total,
            applied_after: self.applied.len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
