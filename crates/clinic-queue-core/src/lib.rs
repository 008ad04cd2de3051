//! Clinic Queue Core Library
//!
//! Front-desk core for a small clinic: patient registration with per-doctor
//! appointment numbers, a daily counter reset, and live views over a shared
//! store.
//!
//! # Architecture
//!
//! ```text
//!  Receptionist UI ──► ClinicQueueCore (FFI)
//!                            │
//!                         Clinic ───────────────► snapshots to subscribers
//!                       ┌────┴─────┐                      ▲
//!               CounterAllocator  PatientStore            │
//!                 │  ▲        └─────┬─────┘               │
//!   daily reset ──┘  │              ▼                     │
//!   (midnight)       │        dyn ClinicStore ──── pushed changes
//!                    │        ┌─────┴──────┐
//!                    └────── SqliteStore  SharedStore
//! ```
//!
//! # Modules
//!
//! - [`allocator`]: per-doctor appointment counters and the daily reset
//! - [`patient_store`]: patient registration and listing
//! - [`clinic`]: the service object tying both to a store
//! - [`store`]: storage trait with SQLite and shared-document backends
//! - [`db`]: SQLite schema and queries
//! - [`models`]: domain types (Doctor, AppointmentNumber, PatientRecord, stats)

pub mod allocator;
pub mod auth;
pub mod clinic;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod patient_store;
pub mod schedule;
pub mod store;

// Re-export commonly used types
pub use allocator::{CounterAllocator, IssuedNumber};
pub use clinic::Clinic;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClinicConfig;
pub use db::Database;
pub use error::{ClinicError, ClinicResult};
pub use feed::Subscription;
pub use models::{
    AppointmentNumber, ClinicSnapshot, ClinicStats, CounterState, Doctor, DoctorCount,
    PatientRecord, PatientStatus, Roster,
};
pub use patient_store::{PatientStore, Registration};
pub use schedule::DailyResetHandle;
pub use store::{ClinicStore, SharedStore, SqliteStore, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use tracing::info;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicQueueError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<ClinicError> for ClinicQueueError {
    fn from(e: ClinicError) -> Self {
        match e {
            ClinicError::Validation(msg) => ClinicQueueError::Validation(msg),
            ClinicError::Auth => ClinicQueueError::Unauthorized(ClinicError::Auth.to_string()),
            ClinicError::Storage(e) => ClinicQueueError::Storage(e.to_string()),
            ClinicError::Config(e) => ClinicQueueError::Config(e.to_string()),
            ClinicError::Scheduler(e) => ClinicQueueError::Scheduler(e.to_string()),
        }
    }
}

impl From<StoreError> for ClinicQueueError {
    fn from(e: StoreError) -> Self {
        ClinicQueueError::Storage(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicQueueError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicQueueError::Storage(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a clinic database at the given path and start the daily
/// reset worker.
#[uniffi::export]
pub fn open_clinic(path: String) -> Result<Arc<ClinicQueueCore>, ClinicQueueError> {
    let store = Arc::new(SqliteStore::open(&path)?);
    info!(%path, "opening clinic database");
    ClinicQueueCore::start(store)
}

/// Create an in-memory clinic (for testing).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<ClinicQueueCore>, ClinicQueueError> {
    let store = Arc::new(SqliteStore::open_in_memory()?);
    ClinicQueueCore::start(store)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicQueueCore {
    clinic: Arc<Clinic>,
    scheduler: Mutex<Option<DailyResetHandle>>,
}

impl ClinicQueueCore {
    fn start(store: Arc<dyn ClinicStore>) -> Result<Arc<Self>, ClinicQueueError> {
        let clinic = Arc::new(Clinic::new(
            ClinicConfig::from_env(),
            store,
            Arc::new(SystemClock),
        )?);
        let scheduler = clinic.start_daily_reset()?;
        Ok(Arc::new(Self {
            clinic,
            scheduler: Mutex::new(Some(scheduler)),
        }))
    }
}

#[uniffi::export]
impl ClinicQueueCore {
    // =========================================================================
    // Appointment Numbers
    // =========================================================================

    /// Issue the next appointment number for a doctor.
    pub fn issue_number(&self, doctor: String) -> Result<FfiIssuedNumber, ClinicQueueError> {
        Ok(self.clinic.issue_number(&doctor)?.into())
    }

    /// Preview the next appointment number for a doctor.
    pub fn peek_next(&self, doctor: String) -> Result<String, ClinicQueueError> {
        Ok(self.clinic.peek_next(&doctor)?.to_string())
    }

    /// Zero one doctor's counter.
    pub fn reset_doctor(&self, doctor: String) -> Result<(), ClinicQueueError> {
        Ok(self.clinic.reset_doctor(&doctor)?)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Register a patient with the next number for `doctor`.
    pub fn add_patient(
        &self,
        name: String,
        doctor: String,
    ) -> Result<FfiRegistration, ClinicQueueError> {
        Ok(self.clinic.add_patient(&name, &doctor)?.into())
    }

    /// Patients, most recent first, optionally for one doctor.
    pub fn list_patients(
        &self,
        filter_doctor: Option<String>,
    ) -> Result<Vec<FfiPatient>, ClinicQueueError> {
        let patients = self.clinic.list_patients(filter_doctor.as_deref())?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Dashboard counts.
    pub fn get_stats(&self) -> Result<FfiStats, ClinicQueueError> {
        Ok(self.clinic.get_stats()?.into())
    }

    /// Delete all patients and zero all counters.
    pub fn reset_all(&self, passphrase: String) -> Result<(), ClinicQueueError> {
        Ok(self.clinic.reset_all(&passphrase)?)
    }

    // =========================================================================
    // Roster, Subscriptions, Lifecycle
    // =========================================================================

    pub fn doctors(&self) -> Vec<FfiDoctor> {
        self.clinic.doctors().iter().cloned().map(|d| d.into()).collect()
    }

    /// Receive the current snapshot now and after every change.
    pub fn subscribe(
        &self,
        listener: Box<dyn SnapshotListener>,
    ) -> Result<Arc<FfiSubscription>, ClinicQueueError> {
        let listener: Arc<dyn SnapshotListener> = Arc::from(listener);
        let subscription = self
            .clinic
            .subscribe(move |snapshot: &ClinicSnapshot| listener.on_snapshot(snapshot.into()))?;
        Ok(Arc::new(FfiSubscription {
            inner: Mutex::new(Some(subscription)),
        }))
    }

    /// Reload patients and counters from storage.
    pub fn refresh(&self) -> Result<(), ClinicQueueError> {
        Ok(self.clinic.refresh()?)
    }

    /// Stop the background daily reset worker.
    pub fn stop_daily_reset(&self) -> Result<(), ClinicQueueError> {
        if let Some(handle) = self.scheduler.lock()?.take() {
            handle.shutdown();
        }
        Ok(())
    }
}

/// Receives clinic snapshots on the thread that caused the change.
#[uniffi::export(callback_interface)]
pub trait SnapshotListener: Send + Sync {
    fn on_snapshot(&self, snapshot: FfiSnapshot);
}

/// Live snapshot subscription. Cancelled on `cancel` or when released.
#[derive(uniffi::Object)]
pub struct FfiSubscription {
    inner: Mutex<Option<Subscription<ClinicSnapshot>>>,
}

#[uniffi::export]
impl FfiSubscription {
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.take();
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|s| s.is_active())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub doctor: String,
    pub appointment_number: String,
    pub date_added: String,
    pub status: String,
}

impl From<PatientRecord> for FfiPatient {
    fn from(record: PatientRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            doctor: record.doctor,
            appointment_number: record.appointment_number,
            date_added: record.date_added,
            status: record.status.as_str().to_string(),
        }
    }
}

/// FFI-safe issued appointment number.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIssuedNumber {
    pub number: String,
    pub storage_warning: Option<String>,
}

impl From<IssuedNumber> for FfiIssuedNumber {
    fn from(issued: IssuedNumber) -> Self {
        Self {
            number: issued.number.to_string(),
            storage_warning: issued.storage_warning,
        }
    }
}

/// FFI-safe registration result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegistration {
    pub patient: FfiPatient,
    pub storage_warning: Option<String>,
}

impl From<Registration> for FfiRegistration {
    fn from(registration: Registration) -> Self {
        Self {
            patient: registration.record.into(),
            storage_warning: registration.storage_warning,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctor {
    pub id: String,
    pub name: String,
    pub tag: String,
}

impl From<Doctor> for FfiDoctor {
    fn from(doctor: Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name,
            tag: doctor.tag,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctorCount {
    pub doctor_id: String,
    pub doctor_name: String,
    pub count: u64,
}

/// FFI-safe dashboard counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStats {
    pub total: u64,
    pub per_doctor: Vec<FfiDoctorCount>,
    pub today_count: u64,
}

impl From<ClinicStats> for FfiStats {
    fn from(stats: ClinicStats) -> Self {
        Self {
            total: stats.total as u64,
            per_doctor: stats
                .per_doctor
                .into_iter()
                .map(|c| FfiDoctorCount {
                    doctor_id: c.doctor_id,
                    doctor_name: c.doctor_name,
                    count: c.count as u64,
                })
                .collect(),
            today_count: stats.today_count as u64,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCounter {
    pub doctor_id: String,
    pub value: u32,
}

/// FFI-safe clinic snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSnapshot {
    pub patients: Vec<FfiPatient>,
    pub counters: Vec<FfiCounter>,
    pub stats: FfiStats,
}

impl From<&ClinicSnapshot> for FfiSnapshot {
    fn from(snapshot: &ClinicSnapshot) -> Self {
        Self {
            patients: snapshot.patients.iter().cloned().map(|p| p.into()).collect(),
            counters: snapshot
                .counters
                .iter()
                .map(|(doctor_id, value)| FfiCounter {
                    doctor_id: doctor_id.to_string(),
                    value,
                })
                .collect(),
            stats: snapshot.stats.clone().into(),
        }
    }
}
