//! Patient database operations.

use rusqlite::{params, Row};

use super::{Database, DbResult};
use crate::models::{PatientRecord, PatientStatus};

const PATIENT_COLUMNS: &str = "id, name, doctor, appointment_number, date_added, status";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
    let status: String = row.get(5)?;
    Ok(PatientRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        doctor: row.get(2)?,
        appointment_number: row.get(3)?,
        date_added: row.get(4)?,
        status: PatientStatus::parse(&status).unwrap_or_default(),
    })
}

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &PatientRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (id, name, doctor, appointment_number, date_added, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                patient.id,
                patient.name,
                patient.doctor,
                patient.appointment_number,
                patient.date_added,
                patient.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// List all patients, most recently added first.
    pub fn list_patients(&self) -> DbResult<Vec<PatientRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY date_added DESC, rowid DESC",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([], patient_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete every patient. Irreversible.
    pub fn delete_all_patients(&self) -> DbResult<usize> {
        Ok(self.conn.execute("DELETE FROM patients", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentNumber, Doctor};
    use chrono::{Duration, TimeZone, Utc};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn umar() -> Doctor {
        Doctor::new("umar", "Dr. Umar Farooq", "UMAR")
    }

    fn samreen() -> Doctor {
        Doctor::new("samreen", "Dr. Samreen Malik", "SAMREEN")
    }

    #[test]
    fn test_insert_and_list() {
        let db = setup_db();
        let patient = PatientRecord::new(
            "Alice".into(),
            &umar(),
            &AppointmentNumber::new("UMAR", 1),
            Utc::now(),
        );

        db.insert_patient(&patient).unwrap();

        let listed = db.list_patients().unwrap();
        assert_eq!(listed, vec![patient]);
    }

    #[test]
    fn test_most_recent_first() {
        let db = setup_db();
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();

        let alice = PatientRecord::new(
            "Alice".into(),
            &umar(),
            &AppointmentNumber::new("UMAR", 1),
            base,
        );
        let bob = PatientRecord::new(
            "Bob".into(),
            &samreen(),
            &AppointmentNumber::new("SAMREEN", 1),
            base + Duration::minutes(5),
        );
        db.insert_patient(&alice).unwrap();
        db.insert_patient(&bob).unwrap();

        let names: Vec<_> = db
            .list_patients()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Bob", "Alice"]);
    }

    #[test]
    fn test_same_timestamp_keeps_insertion_order() {
        let db = setup_db();
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();

        for (i, name) in ["First", "Second", "Third"].iter().enumerate() {
            let p = PatientRecord::new(
                name.to_string(),
                &umar(),
                &AppointmentNumber::new("UMAR", i as u32 + 1),
                at,
            );
            db.insert_patient(&p).unwrap();
        }

        let names: Vec<_> = db
            .list_patients()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Third", "Second", "First"]);
    }

    #[test]
    fn test_delete_all() {
        let db = setup_db();
        for i in 1..=3 {
            db.insert_patient(&PatientRecord::new(
                format!("Patient {}", i),
                &umar(),
                &AppointmentNumber::new("UMAR", i),
                Utc::now(),
            ))
            .unwrap();
        }
        assert_eq!(db.list_patients().unwrap().len(), 3);

        assert_eq!(db.delete_all_patients().unwrap(), 3);
        assert!(db.list_patients().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = setup_db();
        let patient = PatientRecord::new(
            "Alice".into(),
            &umar(),
            &AppointmentNumber::new("UMAR", 1),
            Utc::now(),
        );
        db.insert_patient(&patient).unwrap();
        assert!(db.insert_patient(&patient).is_err());
    }
}
