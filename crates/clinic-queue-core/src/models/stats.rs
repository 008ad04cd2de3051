//! Dashboard statistics and snapshots.

use std::sync::Arc;

use chrono::NaiveDate;

use super::appointment::CounterState;
use super::doctor::Roster;
use super::patient::PatientRecord;

/// Record count for one doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorCount {
    pub doctor_id: String,
    pub doctor_name: String,
    pub count: usize,
}

/// Running totals shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicStats {
    pub total: usize,
    /// Per-doctor record counts, in roster order
    pub per_doctor: Vec<DoctorCount>,
    /// Records registered on the current local date
    pub today_count: usize,
}

impl ClinicStats {
    pub fn compute(patients: &[PatientRecord], roster: &Roster, today: NaiveDate) -> Self {
        let per_doctor = roster
            .iter()
            .map(|doctor| DoctorCount {
                doctor_id: doctor.id.clone(),
                doctor_name: doctor.name.clone(),
                count: patients.iter().filter(|p| p.is_for(doctor)).count(),
            })
            .collect();

        Self {
            total: patients.len(),
            per_doctor,
            today_count: count_on(patients, today),
        }
    }

    pub fn count_for(&self, doctor_id: &str) -> usize {
        self.per_doctor
            .iter()
            .find(|c| c.doctor_id == doctor_id)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

/// Count records registered on a given local date.
pub fn count_on(patients: &[PatientRecord], date: NaiveDate) -> usize {
    patients
        .iter()
        .filter(|p| p.added_on() == Some(date))
        .count()
}

/// Immutable view of the clinic delivered to subscribers.
#[derive(Debug, Clone)]
pub struct ClinicSnapshot {
    /// All records, most recent first
    pub patients: Arc<Vec<PatientRecord>>,
    pub counters: CounterState,
    pub stats: ClinicStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentNumber, Doctor};
    use chrono::{Duration, Local, Utc};

    fn record(doctor: &Doctor, seq: u32, days_ago: i64) -> PatientRecord {
        PatientRecord::new(
            format!("Patient {}", seq),
            doctor,
            &AppointmentNumber::new(&doctor.tag, seq),
            Utc::now() - Duration::days(days_ago),
        )
    }

    #[test]
    fn test_compute_stats() {
        let roster = Roster::default();
        let umar = &roster.doctors()[0];
        let samreen = &roster.doctors()[1];
        let patients = vec![
            record(umar, 2, 0),
            record(samreen, 1, 0),
            record(umar, 1, 1),
        ];

        let stats = ClinicStats::compute(&patients, &roster, Local::now().date_naive());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count_for("umar"), 2);
        assert_eq!(stats.count_for("samreen"), 1);
        assert_eq!(stats.count_for("nobody"), 0);
        assert_eq!(stats.today_count, 2);
        assert_eq!(stats.per_doctor[0].doctor_name, "Dr. Umar Farooq");
    }

    #[test]
    fn test_empty_stats() {
        let roster = Roster::default();
        let stats = ClinicStats::compute(&[], &roster, Local::now().date_naive());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.today_count, 0);
        assert_eq!(stats.per_doctor.len(), 2);
    }
}
