//! Patient registration and listing.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info};

use crate::allocator::CounterAllocator;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{count_on, ClinicStats, Doctor, PatientRecord, Roster};
use crate::store::ClinicStore;

/// A stored registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub record: PatientRecord,
    /// Set when the appointment counter could not be persisted
    pub storage_warning: Option<String>,
}

/// In-memory list plus the version of the push it came from.
#[derive(Default)]
struct PatientView {
    version: u64,
    records: Arc<Vec<PatientRecord>>,
}

/// Append-only patient collection with an in-memory, most-recent-first view.
pub struct PatientStore {
    store: Arc<dyn ClinicStore>,
    view: RwLock<PatientView>,
}

impl PatientStore {
    /// Load the current patient list from the store.
    pub fn new(store: Arc<dyn ClinicStore>) -> ClinicResult<Self> {
        let records = store.list_patients()?;
        Ok(Self {
            store,
            view: RwLock::new(PatientView {
                version: 0,
                records: Arc::new(records),
            }),
        })
    }

    /// Register a patient with the next appointment number for `doctor`.
    pub fn add(
        &self,
        name: &str,
        doctor: &str,
        allocator: &CounterAllocator,
        added_at: DateTime<Utc>,
    ) -> ClinicResult<Registration> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClinicError::Validation("Please enter patient name".into()));
        }
        let doctor = allocator.roster().resolve(doctor)?;

        let issued = allocator.issue(doctor)?;
        let record = PatientRecord::new(name.to_string(), doctor, &issued.number, added_at);

        if let Err(e) = self.store.insert_patient(&record) {
            error!(number = %issued.number, error = %e, "failed to store patient");
            return Err(e.into());
        }
        self.insert_local(&record)?;

        info!(id = %record.id, number = %record.appointment_number, "patient registered");
        Ok(Registration {
            record,
            storage_warning: issued.storage_warning,
        })
    }

    /// All patients, most recently added first.
    pub fn list(&self) -> ClinicResult<Vec<PatientRecord>> {
        Ok(self.view.read()?.records.as_ref().clone())
    }

    /// Shared handle to the current list.
    pub fn snapshot(&self) -> ClinicResult<Arc<Vec<PatientRecord>>> {
        Ok(Arc::clone(&self.view.read()?.records))
    }

    /// Patients for one doctor, or all when `doctor` is `None`.
    pub fn filter(&self, doctor: Option<&Doctor>) -> ClinicResult<Vec<PatientRecord>> {
        let view = self.view.read()?;
        let records = &view.records;
        Ok(match doctor {
            Some(doctor) => records.iter().filter(|p| p.is_for(doctor)).cloned().collect(),
            None => records.as_ref().clone(),
        })
    }

    /// Patients registered on the local date `today`.
    pub fn count_today(&self, today: NaiveDate) -> ClinicResult<usize> {
        Ok(count_on(&self.view.read()?.records, today))
    }

    pub fn stats(&self, roster: &Roster, today: NaiveDate) -> ClinicResult<ClinicStats> {
        Ok(ClinicStats::compute(&self.view.read()?.records, roster, today))
    }

    /// Delete every patient. Irreversible; callers must authorize first.
    pub fn reset_all(&self) -> ClinicResult<usize> {
        let deleted = self.store.delete_all_patients().map_err(|e| {
            error!(error = %e, "failed to delete patients");
            e
        })?;
        self.view.write()?.records = Arc::new(Vec::new());
        info!(deleted, "all patient records deleted");
        Ok(deleted)
    }

    /// Replace the in-memory list with a pushed snapshot. A push older than
    /// the last one applied is dropped. Returns whether it was applied.
    pub fn apply_remote(
        &self,
        version: u64,
        records: Arc<Vec<PatientRecord>>,
    ) -> ClinicResult<bool> {
        let mut view = self.view.write()?;
        if version <= view.version {
            debug!(version, current = view.version, "stale patient push dropped");
            return Ok(false);
        }
        *view = PatientView { version, records };
        Ok(true)
    }

    /// Reload the list from the store.
    pub fn refresh(&self) -> ClinicResult<()> {
        let records = self.store.list_patients()?;
        self.view.write()?.records = Arc::new(records);
        Ok(())
    }

    /// Put a freshly stored record at the head of the list, unless a push
    /// already delivered it.
    fn insert_local(&self, record: &PatientRecord) -> ClinicResult<()> {
        let mut view = self.view.write()?;
        if view.records.iter().any(|p| p.id == record.id) {
            return Ok(());
        }
        let mut updated = Vec::with_capacity(view.records.len() + 1);
        updated.push(record.clone());
        updated.extend(view.records.iter().cloned());
        view.records = Arc::new(updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SharedStore, SqliteStore};
    use crate::models::AppointmentNumber;
    use chrono::{Duration, Local};

    fn setup() -> (Arc<dyn ClinicStore>, PatientStore, CounterAllocator) {
        let store: Arc<dyn ClinicStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let patients = PatientStore::new(Arc::clone(&store)).unwrap();
        let allocator = CounterAllocator::new(Roster::default(), Arc::clone(&store)).unwrap();
        (store, patients, allocator)
    }

    #[test]
    fn test_add_and_list() {
        let (_, patients, alloc) = setup();
        let now = Utc::now();

        let alice = patients.add("  Alice ", "umar", &alloc, now).unwrap();
        let bob = patients
            .add("Bob", "samreen", &alloc, now + Duration::seconds(1))
            .unwrap();

        assert_eq!(alice.record.name, "Alice");
        assert_eq!(alice.record.appointment_number, "UMAR-#1");
        assert_eq!(bob.record.appointment_number, "SAMREEN-#1");
        assert!(alice.storage_warning.is_none());

        let names: Vec<_> = patients.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bob", "Alice"]);
    }

    #[test]
    fn test_validation_leaves_no_trace() {
        let (store, patients, alloc) = setup();

        assert!(matches!(
            patients.add("", "umar", &alloc, Utc::now()),
            Err(ClinicError::Validation(_))
        ));
        assert!(matches!(
            patients.add("   ", "umar", &alloc, Utc::now()),
            Err(ClinicError::Validation(_))
        ));
        assert!(matches!(
            patients.add("Name", "", &alloc, Utc::now()),
            Err(ClinicError::Validation(_))
        ));

        assert!(patients.list().unwrap().is_empty());
        assert!(store.list_patients().unwrap().is_empty());
        assert_eq!(alloc.current("umar").unwrap(), 0);
    }

    #[test]
    fn test_filter_by_doctor() {
        let (_, patients, alloc) = setup();
        let now = Utc::now();
        patients.add("Alice", "umar", &alloc, now).unwrap();
        patients
            .add("Bob", "samreen", &alloc, now + Duration::seconds(1))
            .unwrap();

        let umar = alloc.roster().find("umar").unwrap().clone();
        let filtered = patients.filter(Some(&umar)).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Alice");
        assert_eq!(patients.filter(None).unwrap().len(), 2);
    }

    #[test]
    fn test_count_today_excludes_yesterday() {
        let (store, patients, alloc) = setup();
        let doctor = alloc.roster().find("umar").unwrap().clone();

        store
            .insert_patient(&PatientRecord::new(
                "Yesterday".into(),
                &doctor,
                &AppointmentNumber::new("UMAR", 9),
                Utc::now() - Duration::days(1),
            ))
            .unwrap();
        patients.refresh().unwrap();
        patients.add("Today", "umar", &alloc, Utc::now()).unwrap();

        let today = Local::now().date_naive();
        assert_eq!(patients.list().unwrap().len(), 2);
        assert_eq!(patients.count_today(today).unwrap(), 1);
        assert_eq!(patients.stats(alloc.roster(), today).unwrap().total, 2);
    }

    #[test]
    fn test_reset_all() {
        let (store, patients, alloc) = setup();
        patients.add("Alice", "umar", &alloc, Utc::now()).unwrap();
        patients.add("Bob", "umar", &alloc, Utc::now()).unwrap();

        assert_eq!(patients.reset_all().unwrap(), 2);
        assert!(patients.list().unwrap().is_empty());
        assert!(store.list_patients().unwrap().is_empty());
        // Counters are not this component's concern
        assert_eq!(alloc.current("umar").unwrap(), 2);
    }

    #[test]
    fn test_store_failure_surfaces() {
        let shared = Arc::new(SharedStore::new());
        let store: Arc<dyn ClinicStore> = shared.clone();
        let patients = PatientStore::new(Arc::clone(&store)).unwrap();
        let alloc = CounterAllocator::new(Roster::default(), store).unwrap();

        shared.set_online(false);
        let result = patients.add("Alice", "umar", &alloc, Utc::now());
        assert!(matches!(result, Err(ClinicError::Storage(_))));
        assert!(patients.list().unwrap().is_empty());
        // Number was consumed; the next one skips ahead
        assert_eq!(alloc.peek_next("umar").unwrap().to_string(), "UMAR-#2");
    }

    #[test]
    fn test_older_push_is_dropped() {
        let (_, patients, alloc) = setup();
        let doctor = alloc.roster().find("umar").unwrap().clone();
        let alice = PatientRecord::new(
            "Alice".into(),
            &doctor,
            &AppointmentNumber::new("UMAR", 1),
            Utc::now(),
        );
        let bob = PatientRecord::new(
            "Bob".into(),
            &doctor,
            &AppointmentNumber::new("UMAR", 2),
            Utc::now(),
        );

        let newer = Arc::new(vec![bob, alice.clone()]);
        assert!(patients.apply_remote(2, newer).unwrap());
        assert!(!patients.apply_remote(1, Arc::new(vec![alice])).unwrap());
        assert!(!patients.apply_remote(2, Arc::new(Vec::new())).unwrap());

        let names: Vec<_> = patients.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bob", "Alice"]);
        assert!(patients.apply_remote(3, Arc::new(Vec::new())).unwrap());
        assert!(patients.list().unwrap().is_empty());
    }
}
