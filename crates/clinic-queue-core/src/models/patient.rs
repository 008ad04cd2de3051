//! Patient models.

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::appointment::AppointmentNumber;
use super::doctor::Doctor;

/// Patient record status.
///
/// Records carry a status but no transitions exist yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PatientStatus {
    #[default]
    Active,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "Active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(PatientStatus::Active),
            _ => None,
        }
    }
}

/// A registered patient. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    /// UUID generated at registration
    pub id: String,
    /// Patient name (trimmed, non-empty)
    pub name: String,
    /// Doctor display name
    pub doctor: String,
    /// Appointment number, `<TAG>-#<N>`
    pub appointment_number: String,
    /// Registration timestamp (RFC 3339, UTC)
    pub date_added: String,
    pub status: PatientStatus,
}

impl PatientRecord {
    /// Create a new record for a freshly issued appointment number.
    pub fn new(
        name: String,
        doctor: &Doctor,
        appointment_number: &AppointmentNumber,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            doctor: doctor.name.clone(),
            appointment_number: appointment_number.to_string(),
            date_added: added_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            status: PatientStatus::Active,
        }
    }

    /// Parsed registration timestamp.
    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.date_added)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Local calendar date the patient was registered on.
    pub fn added_on(&self) -> Option<NaiveDate> {
        self.added_at()
            .map(|ts| ts.with_timezone(&Local).date_naive())
    }

    pub fn is_for(&self, doctor: &Doctor) -> bool {
        self.doctor == doctor.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn umar() -> Doctor {
        Doctor::new("umar", "Dr. Umar Farooq", "UMAR")
    }

    #[test]
    fn test_new_record() {
        let added = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let record = PatientRecord::new(
            "Alice".into(),
            &umar(),
            &AppointmentNumber::new("UMAR", 1),
            added,
        );

        assert_eq!(record.id.len(), 36); // UUID format
        assert_eq!(record.doctor, "Dr. Umar Farooq");
        assert_eq!(record.appointment_number, "UMAR-#1");
        assert_eq!(record.date_added, "2024-01-15T10:00:00.000Z");
        assert_eq!(record.status, PatientStatus::Active);
        assert_eq!(record.added_at(), Some(added));
        assert!(record.is_for(&umar()));
    }

    #[test]
    fn test_unique_ids() {
        let now = Utc::now();
        let number = AppointmentNumber::new("UMAR", 1);
        let a = PatientRecord::new("A".into(), &umar(), &number, now);
        let b = PatientRecord::new("A".into(), &umar(), &number, now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_document_keys() {
        let record = PatientRecord::new(
            "Alice".into(),
            &umar(),
            &AppointmentNumber::new("UMAR", 2),
            Utc::now(),
        );
        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["appointmentNumber"], "UMAR-#2");
        assert_eq!(doc["status"], "Active");
        assert!(doc["dateAdded"].is_string());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PatientStatus::Active.as_str(), "Active");
        assert_eq!(PatientStatus::parse("Active"), Some(PatientStatus::Active));
        assert_eq!(PatientStatus::parse("Discharged"), None);
    }
}
