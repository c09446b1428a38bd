//! Keyed status table deduplicating in-flight store operations.
//!
//! # Design
//! - One `std::sync::Mutex` guards the table; it is never held across `.await`.
//! - A record is `Running` until a poll drains its completion cell, then
//!   `Completed` forever. Failures remove the record so the key can be retried.
//! - Every record carries a generation so a late eviction (root-hash failure
//!   after the lock was released) cannot remove a newer record for the key.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cairn_core::{CellState, Completion, CompletionCell, OperationError, RequestKey, completion_cell};
use tracing::debug;

/// Outcome of a single poll against the status table.
#[derive(Debug)]
pub enum Observation {
    /// No record existed; the operation was handed to `start`.
    Started {
        /// Generation of the new record.
        generation: u64,
    },
    /// The operation is still running.
    Pending {
        /// Generation of the running record.
        generation: u64,
    },
    /// The operation succeeded; the result stays cached.
    Settled {
        /// Result string delivered by the dispatcher.
        result: String,
        /// Generation of the completed record.
        generation: u64,
        /// `true` only for the poll that drained the completion cell.
        newly_settled: bool,
    },
    /// The operation failed and its record was removed.
    Failed(OperationError),
}

#[derive(Debug)]
enum RecordState {
    Running(CompletionCell),
    Completed(String),
}

#[derive(Debug)]
struct Record {
    generation: u64,
    state: RecordState,
}

#[derive(Debug, Default)]
struct Table {
    records: HashMap<RequestKey, Record>,
    next_generation: u64,
}

/// Status table shared by every poller.
#[derive(Debug, Default)]
pub struct StatusTracker {
    table: Mutex<Table>,
}

impl StatusTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll `key`, starting the operation through `start` when no record exists.
    ///
    /// `start` runs while the table lock is held and must not block; it
    /// receives the producer half of the new record's completion cell.
    pub fn observe<F>(&self, key: &RequestKey, start: F) -> Observation
    where
        F: FnOnce(Completion),
    {
        let mut table = self.lock();
        let Some(record) = table.records.get_mut(key) else {
            let generation = table.next_generation;
            table.next_generation += 1;
            let (completion, cell) = completion_cell();
            table.records.insert(
                key.clone(),
                Record {
                    generation,
                    state: RecordState::Running(cell),
                },
            );
            start(completion);
            debug!(key = %key, generation, "request record created");
            return Observation::Started { generation };
        };

        let generation = record.generation;
        let cell = match &mut record.state {
            RecordState::Completed(result) => {
                return Observation::Settled {
                    result: result.clone(),
                    generation,
                    newly_settled: false,
                };
            }
            RecordState::Running(cell) => cell,
        };

        match cell.try_take() {
            CellState::Empty => Observation::Pending { generation },
            CellState::Settled(Ok(result)) => {
                record.state = RecordState::Completed(result.clone());
                debug!(key = %key, generation, "request record completed");
                Observation::Settled {
                    result,
                    generation,
                    newly_settled: true,
                }
            }
            CellState::Settled(Err(error)) => {
                table.records.remove(key);
                debug!(key = %key, generation, error = %error, "request record failed");
                Observation::Failed(error)
            }
            CellState::Abandoned => {
                table.records.remove(key);
                debug!(key = %key, generation, "request record abandoned by dispatcher");
                Observation::Failed(OperationError::DispatcherUnavailable)
            }
        }
    }

    /// Remove `key` if its record still has `generation`.
    ///
    /// Returns whether a record was removed.
    pub fn evict(&self, key: &RequestKey, generation: u64) -> bool {
        let mut table = self.lock();
        let matches = table
            .records
            .get(key)
            .is_some_and(|record| record.generation == generation);
        if matches {
            table.records.remove(key);
            debug!(key = %key, generation, "request record evicted");
        }
        matches
    }

    /// Number of tracked records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether no records are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
