//! Per-doctor appointment number allocation.
//!
//! Counters live in memory and are written through to the store on every
//! change. The counter is persisted before the patient record that uses it, so
//! a crash in between leaves a skipped number rather than a duplicate.
//!
//! Issuance reads the stored counter, increments it, and writes it back. It is
//! serialized within one allocator. Across sessions sharing a store the update
//! is a plain read-then-write with no compare-and-swap, so two sessions issuing
//! at the same moment can produce the same number.
//!
//! A number whose counter write failed is remembered until a later write for
//! that doctor succeeds. Issuance never goes below it, so a store that missed
//! the write cannot hand the same number out again.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::error::{ClinicError, ClinicResult};
use crate::models::{AppointmentNumber, CounterState, Doctor, Roster};
use crate::db::DbError;
use crate::store::{ClinicStore, StoreError};

/// Result of issuing an appointment number.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedNumber {
    pub number: AppointmentNumber,
    /// Set when the counter could not be persisted. The number is still
    /// issued and the in-memory counter stays advanced.
    pub storage_warning: Option<String>,
}

impl IssuedNumber {
    pub fn is_persisted(&self) -> bool {
        self.storage_warning.is_none()
    }
}

/// Owns the per-doctor counters and the daily reset.
pub struct CounterAllocator {
    roster: Roster,
    store: Arc<dyn ClinicStore>,
    state: RwLock<CounterState>,
    /// Version of the last pushed counter state applied
    remote_version: Mutex<u64>,
    /// Issued numbers the store has not recorded
    unsaved: Mutex<BTreeMap<String, u32>>,
    issue_lock: Mutex<()>,
}

impl CounterAllocator {
    /// Load counters from the store.
    pub fn new(roster: Roster, store: Arc<dyn ClinicStore>) -> ClinicResult<Self> {
        let state = store.load_counters()?;
        debug!(?state, "counters loaded");
        Ok(Self {
            roster,
            store,
            state: RwLock::new(state),
            remote_version: Mutex::new(0),
            unsaved: Mutex::new(BTreeMap::new()),
            issue_lock: Mutex::new(()),
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Issue the next number for `doctor` (id, name, or tag).
    pub fn issue_number(&self, doctor: &str) -> ClinicResult<IssuedNumber> {
        let doctor = self.roster.resolve(doctor)?;
        self.issue(doctor)
    }

    /// Issue the next number for a resolved roster doctor.
    pub fn issue(&self, doctor: &Doctor) -> ClinicResult<IssuedNumber> {
        self.ensure_known(doctor)?;
        let _serial = self.issue_lock.lock()?;

        let stored = match self.store.load_counters() {
            Ok(counters) => Some(counters.get(&doctor.id)),
            Err(e) => {
                warn!(doctor = %doctor.id, error = %e, "counter read failed, using in-memory value");
                None
            }
        };
        let floor = self.unsaved.lock()?.get(&doctor.id).copied().unwrap_or(0);
        let sequence = {
            let mut state = self.state.write()?;
            let base = stored.unwrap_or_else(|| state.get(&doctor.id));
            state.set(&doctor.id, base.max(floor));
            state.increment(&doctor.id)
        };
        let number = AppointmentNumber::new(&doctor.tag, sequence);

        let storage_warning = match self.store.save_counter(&doctor.id, sequence) {
            Ok(()) => {
                self.unsaved.lock()?.remove(&doctor.id);
                None
            }
            Err(e) => {
                warn!(doctor = %doctor.id, %number, error = %e, "appointment counter not persisted");
                self.unsaved.lock()?.insert(doctor.id.clone(), sequence);
                Some(e.to_string())
            }
        };

        debug!(doctor = %doctor.id, %number, "appointment number issued");
        Ok(IssuedNumber {
            number,
            storage_warning,
        })
    }

    /// The number the next `issue_number` call would return. No side effects.
    pub fn peek_next(&self, doctor: &str) -> ClinicResult<AppointmentNumber> {
        let doctor = self.roster.resolve(doctor)?;
        let current = self.state.read()?.get(&doctor.id);
        let floor = self.unsaved.lock()?.get(&doctor.id).copied().unwrap_or(0);
        Ok(AppointmentNumber::new(
            &doctor.tag,
            current.max(floor).saturating_add(1),
        ))
    }

    /// Current counter value for `doctor`.
    pub fn current(&self, doctor: &str) -> ClinicResult<u32> {
        let doctor = self.roster.resolve(doctor)?;
        Ok(self.state.read()?.get(&doctor.id))
    }

    /// Copy of the in-memory counters.
    pub fn counters(&self) -> ClinicResult<CounterState> {
        Ok(self.state.read()?.clone())
    }

    /// Zero one doctor's counter.
    pub fn reset_doctor(&self, doctor: &str) -> ClinicResult<()> {
        let doctor = self.roster.resolve(doctor)?;
        let _serial = self.issue_lock.lock()?;

        self.state.write()?.set(&doctor.id, 0);
        self.store.save_counter(&doctor.id, 0).map_err(|e| {
            error!(doctor = %doctor.id, error = %e, "counter reset not persisted");
            e
        })?;
        self.unsaved.lock()?.remove(&doctor.id);

        info!(doctor = %doctor.id, "appointment counter reset");
        Ok(())
    }

    /// Zero every counter.
    pub fn reset_all(&self) -> ClinicResult<()> {
        let _serial = self.issue_lock.lock()?;

        let state = {
            let mut state = self.state.write()?;
            state.reset(&self.roster);
            state.clone()
        };
        self.store.save_counters(&state).map_err(|e| {
            error!(error = %e, "counter reset not persisted");
            e
        })?;
        self.unsaved.lock()?.clear();

        info!("all appointment counters reset");
        Ok(())
    }

    /// Reset every counter if no reset has been recorded for `now`'s local
    /// date. Returns whether a reset happened.
    ///
    /// An unreadable marker counts as no marker: counters are reset and the
    /// marker is rewritten.
    pub fn reset_if_new_day(&self, now: DateTime<Local>) -> ClinicResult<bool> {
        let today = now.date_naive();
        let last = match self.store.last_reset_date() {
            Ok(last) => last,
            Err(StoreError::Database(DbError::InvalidData(detail))) => {
                warn!(%detail, "unreadable daily reset marker, resetting");
                None
            }
            Err(e) => return Err(e.into()),
        };
        if last == Some(today) {
            return Ok(false);
        }

        self.reset_all()?;
        self.store.set_last_reset_date(today)?;
        info!(%today, previous = ?last, "daily counter reset");
        Ok(true)
    }

    /// Overwrite in-memory counters with a pushed snapshot. A push older than
    /// the last one applied is dropped. Returns whether it was applied.
    pub fn apply_remote(&self, version: u64, counters: CounterState) -> ClinicResult<bool> {
        let mut state = self.state.write()?;
        let mut applied = self.remote_version.lock()?;
        if version <= *applied {
            debug!(version, current = *applied, "stale counter push dropped");
            return Ok(false);
        }
        *applied = version;
        *state = counters;
        Ok(true)
    }

    /// Reload counters from the store.
    pub fn reload(&self) -> ClinicResult<()> {
        let counters = self.store.load_counters()?;
        *self.state.write()? = counters;
        Ok(())
    }

    fn ensure_known(&self, doctor: &Doctor) -> ClinicResult<()> {
        if self.roster.doctors().iter().any(|d| d.id == doctor.id) {
            Ok(())
        } else {
            Err(ClinicError::Validation(format!(
                "Unknown doctor: {}",
                doctor.name
            )))
        }
    }
}
