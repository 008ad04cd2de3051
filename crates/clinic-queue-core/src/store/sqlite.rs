//! Local durable backend on SQLite.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing::debug;

use super::{timestamp_now, ClinicStore, EventVersion, StoreEvent, StoreResult};
use crate::db::Database;
use crate::feed::{ChangeFeed, Listener, ListenerId};
use crate::models::{CounterState, PatientRecord};

/// SQLite-backed store scoped to one device.
///
/// A single logical writer is assumed. Two processes opening the same file can
/// race on counter updates.
pub struct SqliteStore {
    db: Mutex<Database>,
    version: EventVersion,
    feed: ChangeFeed<StoreEvent>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::from_database(Database::open(path)?))
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            version: EventVersion::default(),
            feed: ChangeFeed::new(),
        }
    }

    /// Number of attached change listeners.
    pub fn listener_count(&self) -> usize {
        self.feed.listener_count()
    }
}

impl ClinicStore for SqliteStore {
    fn load_counters(&self) -> StoreResult<CounterState> {
        Ok(self.db.lock()?.get_counters()?)
    }

    fn save_counter(&self, doctor_id: &str, value: u32) -> StoreResult<()> {
        let event = {
            let db = self.db.lock()?;
            db.set_counter(doctor_id, value, &timestamp_now())?;
            StoreEvent::CountersChanged {
                counters: db.get_counters()?,
                version: self.version.next(),
            }
        };
        debug!(doctor = doctor_id, value, "counter saved");
        self.feed.publish(&event);
        Ok(())
    }

    fn save_counters(&self, state: &CounterState) -> StoreResult<()> {
        let event = {
            let db = self.db.lock()?;
            db.set_counters(state, &timestamp_now())?;
            StoreEvent::CountersChanged {
                counters: db.get_counters()?,
                version: self.version.next(),
            }
        };
        debug!("all counters saved");
        self.feed.publish(&event);
        Ok(())
    }

    fn last_reset_date(&self) -> StoreResult<Option<NaiveDate>> {
        Ok(self.db.lock()?.get_last_reset_date()?)
    }

    fn set_last_reset_date(&self, date: NaiveDate) -> StoreResult<()> {
        Ok(self.db.lock()?.set_last_reset_date(date)?)
    }

    fn insert_patient(&self, record: &PatientRecord) -> StoreResult<()> {
        let event = {
            let db = self.db.lock()?;
            db.insert_patient(record)?;
            StoreEvent::PatientsChanged {
                patients: Arc::new(db.list_patients()?),
                version: self.version.next(),
            }
        };
        debug!(id = %record.id, appointment = %record.appointment_number, "patient stored");
        self.feed.publish(&event);
        Ok(())
    }

    fn list_patients(&self) -> StoreResult<Vec<PatientRecord>> {
        Ok(self.db.lock()?.list_patients()?)
    }

    fn delete_all_patients(&self) -> StoreResult<usize> {
        let (deleted, version) = {
            let db = self.db.lock()?;
            (db.delete_all_patients()?, self.version.next())
        };
        debug!(deleted, "all patients deleted");
        self.feed.publish(&StoreEvent::PatientsChanged {
            version,
            patients: Arc::new(Vec::new()),
        });
        Ok(deleted)
    }

    fn subscribe(&self, listener: Listener<StoreEvent>) -> ListenerId {
        self.feed.subscribe(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.feed.unsubscribe(id)
    }
}
