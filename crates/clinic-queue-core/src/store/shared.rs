//! Shared document-collection backend with push notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use super::{timestamp_now, ClinicStore, EventVersion, StoreError, StoreEvent, StoreResult};
use crate::feed::{ChangeFeed, Listener, ListenerId};
use crate::models::{CounterState, PatientRecord};

#[derive(Default)]
struct Documents {
    /// The single counters document, `{"<id>Counter": n, "lastUpdated": ts}`
    counters: Option<Value>,
    /// Patient collection, most recent first
    patients: Vec<PatientRecord>,
    last_reset: Option<NaiveDate>,
}

/// A document store shared by every clinic session that holds it.
///
/// Each session wraps the same `Arc<SharedStore>`; a write from any session is
/// pushed to all subscribers. Counter writes are plain read-then-write on the
/// counters document: concurrent sessions may skip or repeat a number.
pub struct SharedStore {
    docs: RwLock<Documents>,
    online: AtomicBool,
    version: EventVersion,
    feed: ChangeFeed<StoreEvent>,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self {
            docs: RwLock::new(Documents::default()),
            online: AtomicBool::new(true),
            version: EventVersion::default(),
            feed: ChangeFeed::new(),
        }
    }
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle reachability. While offline every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        if !online {
            warn!("shared store marked offline");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Raw counters document, as other clients see it.
    pub fn counters_document(&self) -> StoreResult<Option<Value>> {
        self.ensure_online()?;
        Ok(self.docs.read()?.counters.clone())
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("shared store is offline".into()))
        }
    }

    fn write_counters<F>(&self, update: F) -> StoreResult<CounterState>
    where
        F: FnOnce(&mut CounterState),
    {
        self.ensure_online()?;
        let (state, version) = {
            let mut docs = self.docs.write()?;
            let mut state = docs
                .counters
                .as_ref()
                .map(CounterState::from_document)
                .unwrap_or_default();
            update(&mut state);
            state.set_last_updated(timestamp_now());
            docs.counters = Some(state.to_document());
            (state, self.version.next())
        };
        self.feed.publish(&StoreEvent::CountersChanged {
            version,
            counters: state.clone(),
        });
        Ok(state)
    }
}

impl ClinicStore for SharedStore {
    fn load_counters(&self) -> StoreResult<CounterState> {
        self.ensure_online()?;
        Ok(self
            .docs
            .read()?
            .counters
            .as_ref()
            .map(CounterState::from_document)
            .unwrap_or_default())
    }

    fn save_counter(&self, doctor_id: &str, value: u32) -> StoreResult<()> {
        self.write_counters(|state| state.set(doctor_id, value))?;
        debug!(doctor = doctor_id, value, "counter document updated");
        Ok(())
    }

    fn save_counters(&self, state: &CounterState) -> StoreResult<()> {
        self.write_counters(|current| {
            for (doctor_id, value) in state.iter() {
                current.set(doctor_id, value);
            }
        })?;
        debug!("counter document replaced");
        Ok(())
    }

    fn last_reset_date(&self) -> StoreResult<Option<NaiveDate>> {
        self.ensure_online()?;
        Ok(self.docs.read()?.last_reset)
    }

    fn set_last_reset_date(&self, date: NaiveDate) -> StoreResult<()> {
        self.ensure_online()?;
        self.docs.write()?.last_reset = Some(date);
        Ok(())
    }

    fn insert_patient(&self, record: &PatientRecord) -> StoreResult<()> {
        self.ensure_online()?;
        let event = {
            let mut docs = self.docs.write()?;
            // Keep most-recent-first even when client clocks disagree
            let pos = docs
                .patients
                .iter()
                .position(|p| p.date_added <= record.date_added)
                .unwrap_or(docs.patients.len());
            docs.patients.insert(pos, record.clone());
            StoreEvent::PatientsChanged {
                patients: Arc::new(docs.patients.clone()),
                version: self.version.next(),
            }
        };
        debug!(id = %record.id, appointment = %record.appointment_number, "patient document added");
        self.feed.publish(&event);
        Ok(())
    }

    fn list_patients(&self) -> StoreResult<Vec<PatientRecord>> {
        self.ensure_online()?;
        Ok(self.docs.read()?.patients.clone())
    }

    fn delete_all_patients(&self) -> StoreResult<usize> {
        self.ensure_online()?;
        let (deleted, version) = {
            let mut docs = self.docs.write()?;
            let deleted = docs.patients.len();
            docs.patients.clear();
            (deleted, self.version.next())
        };
        debug!(deleted, "patient collection cleared");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentNumber, Doctor};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    fn record_at(name: &str, minute: u32) -> PatientRecord {
        PatientRecord::new(
            name.into(),
            &Doctor::new("umar", "Dr. Umar Farooq", "UMAR"),
            &AppointmentNumber::new("UMAR", minute),
            Utc.with_ymd_and_hms(2024, 1, 15, 9, minute, 0).unwrap(),
        )
    }

    #[test]
    fn test_counter_document_layout() {
        let store = SharedStore::new();
        assert_eq!(store.counters_document().unwrap(), None);

        store.save_counter("umar", 3).unwrap();
        store.save_counter("samreen", 1).unwrap();

        let doc = store.counters_document().unwrap().unwrap();
        assert_eq!(doc["umarCounter"], 3);
        assert_eq!(doc["samreenCounter"], 1);
        assert!(doc["lastUpdated"].is_string());
    }

    #[test]
    fn test_save_counter_keeps_other_fields() {
        let store = SharedStore::new();
        store.save_counter("umar", 3).unwrap();
        store.save_counter("samreen", 2).unwrap();
        store.save_counter("umar", 4).unwrap();

        let state = store.load_counters().unwrap();
        assert_eq!(state.get("umar"), 4);
        assert_eq!(state.get("samreen"), 2);
    }

    #[test]
    fn test_patients_most_recent_first() {
        let store = SharedStore::new();
        store.insert_patient(&record_at("Alice", 1)).unwrap();
        store.insert_patient(&record_at("Carol", 3)).unwrap();
        // Arrives late from a client with a slow clock
        store.insert_patient(&record_at("Bob", 2)).unwrap();

        let names: Vec<_> = store
            .list_patients()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Carol", "Bob", "Alice"]);
    }

    #[test]
    fn test_push_to_every_subscriber() {
        let store = Arc::new(SharedStore::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        for client in 0..2 {
            let received = Arc::clone(&received);
            store.subscribe(Arc::new(move |event: &StoreEvent| {
                if let StoreEvent::PatientsChanged { patients, .. } = event {
                    received.lock().unwrap().push((client, patients.len()));
                }
            }));
        }

        store.insert_patient(&record_at("Alice", 1)).unwrap();
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert!(received.contains(&(0, 1)));
        assert!(received.contains(&(1, 1)));
    }

    #[test]
    fn test_offline_rejects_operations() {
        let store = SharedStore::new();
        store.save_counter("umar", 1).unwrap();
        store.set_online(false);

        assert!(matches!(
            store.save_counter("umar", 2),
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.list_patients().is_err());
        assert!(store.insert_patient(&record_at("Alice", 1)).is_err());

        store.set_online(true);
        assert_eq!(store.load_counters().unwrap().get("umar"), 1);
        assert!(store.list_patients().unwrap().is_empty());
    }

    #[test]
    fn test_delete_all_keeps_counters_and_marker() {
        let store = SharedStore::new();
        let date = (Utc::now() - Duration::days(1)).date_naive();
        store.save_counter("umar", 2).unwrap();
        store.set_last_reset_date(date).unwrap();
        store.insert_patient(&record_at("Alice", 1)).unwrap();

        assert_eq!(store.delete_all_patients().unwrap(), 1);
        assert_eq!(store.load_counters().unwrap().get("umar"), 2);
        assert_eq!(store.last_reset_date().unwrap(), Some(date));
    }
}
