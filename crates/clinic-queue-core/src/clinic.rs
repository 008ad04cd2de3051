//! The clinic service object handed to the UI layer.

use std::sync::{Arc, Weak};

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::allocator::{CounterAllocator, IssuedNumber};
use crate::auth::ResetGuard;
use crate::clock::Clock;
use crate::config::ClinicConfig;
use crate::error::{ClinicError, ClinicResult};
use crate::feed::{ChangeFeed, Listener, ListenerId, Subscription};
use crate::models::{AppointmentNumber, ClinicSnapshot, ClinicStats, PatientRecord, Roster};
use crate::patient_store::{PatientStore, Registration};
use crate::schedule::{spawn_daily_reset, DailyResetHandle};
use crate::store::{ClinicStore, StoreEvent};

/// Front-desk core: counters, patients, and the daily reset, over one store.
///
/// Construct once and share by reference. Pushed store changes overwrite the
/// in-memory state and are re-published to subscribers as [`ClinicSnapshot`]s.
pub struct Clinic {
    config: ClinicConfig,
    guard: ResetGuard,
    store: Arc<dyn ClinicStore>,
    clock: Arc<dyn Clock>,
    allocator: Arc<CounterAllocator>,
    patients: Arc<PatientStore>,
    snapshots: Arc<ChangeFeed<ClinicSnapshot>>,
    store_listener: ListenerId,
}

impl Clinic {
    /// Load state from `store` and run the startup daily-reset check.
    pub fn new(
        config: ClinicConfig,
        store: Arc<dyn ClinicStore>,
        clock: Arc<dyn Clock>,
    ) -> ClinicResult<Self> {
        config.validate()?;
        let guard = config.reset_guard()?;

        let allocator = Arc::new(CounterAllocator::new(
            config.doctors.clone(),
            Arc::clone(&store),
        )?);
        let patients = Arc::new(PatientStore::new(Arc::clone(&store))?);
        let snapshots = Arc::new(ChangeFeed::new());

        let store_listener = store.subscribe(push_handler(
            &allocator,
            &patients,
            &snapshots,
            config.doctors.clone(),
            Arc::clone(&clock),
        ));

        let clinic = Self {
            config,
            guard,
            store,
            clock,
            allocator,
            patients,
            snapshots,
            store_listener,
        };

        clinic.run_daily_reset_check()?;
        info!(
            doctors = clinic.config.doctors.len(),
            patients = clinic.patients.snapshot()?.len(),
            "clinic opened"
        );
        Ok(clinic)
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    pub fn doctors(&self) -> &Roster {
        &self.config.doctors
    }

    /// Issue the next appointment number for `doctor` without registering anyone.
    pub fn issue_number(&self, doctor: &str) -> ClinicResult<IssuedNumber> {
        self.allocator.issue_number(doctor)
    }

    /// Preview the next appointment number for `doctor`.
    pub fn peek_next(&self, doctor: &str) -> ClinicResult<AppointmentNumber> {
        self.allocator.peek_next(doctor)
    }

    /// Register a patient and assign their appointment number.
    pub fn add_patient(&self, name: &str, doctor: &str) -> ClinicResult<Registration> {
        let now = self.clock.now().with_timezone(&Utc);
        self.patients.add(name, doctor, &self.allocator, now)
    }

    /// Patients, most recent first, optionally for one doctor. An empty
    /// filter means all doctors.
    pub fn list_patients(&self, filter_doctor: Option<&str>) -> ClinicResult<Vec<PatientRecord>> {
        let doctor = match filter_doctor.map(str::trim).filter(|f| !f.is_empty()) {
            Some(filter) => Some(self.config.doctors.resolve(filter)?),
            None => None,
        };
        self.patients.filter(doctor)
    }

    pub fn get_stats(&self) -> ClinicResult<ClinicStats> {
        self.patients.stats(&self.config.doctors, self.today())
    }

    pub fn count_today(&self) -> ClinicResult<usize> {
        self.patients.count_today(self.today())
    }

    /// Delete every patient and zero every counter. Requires the configured
    /// reset passphrase.
    ///
    /// Patients are deleted first, then counters are zeroed. If the counter
    /// write fails after the delete succeeded, the patients stay deleted and
    /// the counters keep their values; the error is returned and the reset can
    /// be retried.
    pub fn reset_all(&self, passphrase: &str) -> ClinicResult<()> {
        if !self.guard.verify(passphrase) {
            warn!("full reset rejected: incorrect passphrase");
            return Err(ClinicError::Auth);
        }

        let deleted = self.patients.reset_all()?;
        self.allocator.reset_all()?;
        info!(deleted, "all clinic data reset");
        Ok(())
    }

    /// Zero one doctor's counter.
    pub fn reset_doctor(&self, doctor: &str) -> ClinicResult<()> {
        self.allocator.reset_doctor(doctor)
    }

    /// Reset counters if the day changed since the last reset.
    pub fn run_daily_reset_check(&self) -> ClinicResult<bool> {
        self.allocator.reset_if_new_day(self.clock.now())
    }

    /// Start the background worker that resets counters at local midnight.
    pub fn start_daily_reset(&self) -> ClinicResult<DailyResetHandle> {
        Ok(spawn_daily_reset(
            Arc::clone(&self.allocator),
            Arc::clone(&self.clock),
            self.config.reset_check_interval(),
        )?)
    }

    /// Reload patients and counters from the store.
    pub fn refresh(&self) -> ClinicResult<()> {
        self.patients.refresh()?;
        self.allocator.reload()
    }

    /// Current state as one immutable value.
    pub fn snapshot(&self) -> ClinicResult<ClinicSnapshot> {
        build_snapshot(&self.allocator, &self.patients, &self.config.doctors, self.today())
    }

    /// Receive a snapshot now and after every change. Dropping the returned
    /// subscription stops delivery.
    pub fn subscribe<F>(&self, callback: F) -> ClinicResult<Subscription<ClinicSnapshot>>
    where
        F: Fn(&ClinicSnapshot) + Send + Sync + 'static,
    {
        let listener: Listener<ClinicSnapshot> = Arc::new(callback);
        listener(&self.snapshot()?);
        Ok(Subscription::attach(&self.snapshots, listener))
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }
}

impl Drop for Clinic {
    fn drop(&mut self) {
        self.store.unsubscribe(self.store_listener);
    }
}

fn build_snapshot(
    allocator: &CounterAllocator,
    patients: &PatientStore,
    roster: &Roster,
    today: NaiveDate,
) -> ClinicResult<ClinicSnapshot> {
    let list = patients.snapshot()?;
    let stats = ClinicStats::compute(&list, roster, today);
    Ok(ClinicSnapshot {
        patients: list,
        counters: allocator.counters()?,
        stats,
    })
}

/// Store listener that applies pushed state and re-publishes snapshots.
fn push_handler(
    allocator: &Arc<CounterAllocator>,
    patients: &Arc<PatientStore>,
    snapshots: &Arc<ChangeFeed<ClinicSnapshot>>,
    roster: Roster,
    clock: Arc<dyn Clock>,
) -> Listener<StoreEvent> {
    let allocator: Weak<CounterAllocator> = Arc::downgrade(allocator);
    let patients: Weak<PatientStore> = Arc::downgrade(patients);
    let snapshots: Weak<ChangeFeed<ClinicSnapshot>> = Arc::downgrade(snapshots);

    Arc::new(move |event: &StoreEvent| {
        let (Some(allocator), Some(patients), Some(snapshots)) =
            (allocator.upgrade(), patients.upgrade(), snapshots.upgrade())
        else {
            return;
        };

        let applied = match event {
            StoreEvent::PatientsChanged { version, patients: list } => {
                patients.apply_remote(*version, Arc::clone(list))
            }
            StoreEvent::CountersChanged { version, counters } => {
                allocator.apply_remote(*version, counters.clone())
            }
        };
        match applied {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                warn!(error = %e, "failed to apply pushed change");
                return;
            }
        }

        if snapshots.listener_count() == 0 {
            return;
        }
        match build_snapshot(&allocator, &patients, &roster, clock.now().date_naive()) {
            Ok(snapshot) => snapshots.publish(&snapshot),
            Err(e) => warn!(error = %e, "failed to build snapshot"),
        }
    })
}
