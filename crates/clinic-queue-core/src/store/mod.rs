//! Storage backends.
//!
//! One [`ClinicStore`] trait with two interchangeable implementations:
//!
//! - [`SqliteStore`]: local durable storage scoped to one device. Change
//!   notifications reach listeners in this process only.
//! - [`SharedStore`]: a shared document collection. Every client holding the
//!   same store receives every change.
//!
//! Every mutation publishes a [`StoreEvent`] carrying the full new state of the
//! affected collection, after the write completes and outside any lock. Events
//! can therefore reach a listener out of order; each carries a version taken
//! while the write lock was held, and a higher version is always newer.

mod shared;
mod sqlite;

pub use shared::*;
pub use sqlite::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use chrono::NaiveDate;
use thiserror::Error;

use crate::db::DbError;
use crate::feed::{Listener, ListenerId};
use crate::models::{CounterState, PatientRecord};

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(e: PoisonError<T>) -> Self {
        StoreError::Poisoned(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A change pushed by a store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Full patient list after a change, most recent first
    PatientsChanged {
        version: u64,
        patients: Arc<Vec<PatientRecord>>,
    },
    /// Full counter state after a change
    CountersChanged { version: u64, counters: CounterState },
}

impl StoreEvent {
    pub fn version(&self) -> u64 {
        match self {
            StoreEvent::PatientsChanged { version, .. } => *version,
            StoreEvent::CountersChanged { version, .. } => *version,
        }
    }
}

/// Monotonic event version source. Call `next` while holding the write lock.
#[derive(Debug, Default)]
pub(crate) struct EventVersion(AtomicU64);

impl EventVersion {
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Persistence contract shared by both backends.
pub trait ClinicStore: Send + Sync {
    /// Load every doctor's counter.
    fn load_counters(&self) -> StoreResult<CounterState>;

    /// Write one doctor's counter.
    fn save_counter(&self, doctor_id: &str, value: u32) -> StoreResult<()>;

    /// Write every counter in `state`.
    fn save_counters(&self, state: &CounterState) -> StoreResult<()>;

    /// Local date of the last daily reset, if one was ever recorded.
    fn last_reset_date(&self) -> StoreResult<Option<NaiveDate>>;

    fn set_last_reset_date(&self, date: NaiveDate) -> StoreResult<()>;

    fn insert_patient(&self, record: &PatientRecord) -> StoreResult<()>;

    /// All patients, most recently added first.
    fn list_patients(&self) -> StoreResult<Vec<PatientRecord>>;

    /// Delete every patient. Returns the number removed.
    fn delete_all_patients(&self) -> StoreResult<usize>;

    /// Register for change notifications.
    fn subscribe(&self, listener: Listener<StoreEvent>) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// Timestamp format used for `lastUpdated` fields.
pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
