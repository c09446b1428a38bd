//! One-shot result cells linking a dispatched work item to its status record.
//!
//! The dispatcher owns the [`Completion`] half and settles it exactly once; the
//! status record owns the [`CompletionCell`] and drains it without blocking.

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::OperationError;

/// Value carried by a settled cell: the result string or the failure.
pub type OperationOutcome = Result<String, OperationError>;

/// Create a linked completion/cell pair.
#[must_use]
pub fn completion_cell() -> (Completion, CompletionCell) {
    let (sender, receiver) = oneshot::channel();
    (Completion { sender }, CompletionCell { receiver })
}

/// Producer half, consumed when the operation settles.
#[derive(Debug)]
pub struct Completion {
    sender: oneshot::Sender<OperationOutcome>,
}

impl Completion {
    /// Settle with a successful result.
    ///
    /// Returns `false` when the status record was already dropped.
    pub fn succeed(self, result: impl Into<String>) -> bool {
        self.sender.send(Ok(result.into())).is_ok()
    }

    /// Settle with a failure.
    ///
    /// Returns `false` when the status record was already dropped.
    pub fn fail(self, error: OperationError) -> bool {
        self.sender.send(Err(error)).is_ok()
    }
}

/// Consumer half, polled without blocking.
#[derive(Debug)]
pub struct CompletionCell {
    receiver: oneshot::Receiver<OperationOutcome>,
}

/// Observation from a non-blocking drain of a [`CompletionCell`].
#[derive(Debug)]
pub enum CellState {
    /// Nothing has been delivered yet.
    Empty,
    /// The operation settled; the value can only be taken once.
    Settled(OperationOutcome),
    /// The producer was dropped without settling.
    Abandoned,
}

impl CompletionCell {
    /// Take the settled value if one is available.
    pub fn try_take(&mut self) -> CellState {
        match self.receiver.try_recv() {
            Ok(outcome) => CellState::Settled(outcome),
            Err(TryRecvError::Empty) => CellState::Empty,
            Err(TryRecvError::Closed) => CellState::Abandoned,
        }
    }
}
