//! Appointment counter and reset-marker database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::CounterState;

/// Meta key holding the last daily reset date.
pub const LAST_RESET_KEY: &str = "last_daily_reset";

impl Database {
    /// Load all counters.
    pub fn get_counters(&self) -> DbResult<CounterState> {
        let mut stmt = self
            .conn
            .prepare("SELECT doctor_id, value, last_updated FROM counters ORDER BY doctor_id")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut state = CounterState::new();
        let mut latest: Option<String> = None;
        for row in rows {
            let (doctor_id, value, last_updated) = row?;
            state.set(&doctor_id, value);
            if latest.as_deref().map_or(true, |l| last_updated.as_str() > l) {
                latest = Some(last_updated);
            }
        }
        if let Some(ts) = latest {
            state.set_last_updated(ts);
        }
        Ok(state)
    }

    /// Write one doctor's counter.
    pub fn set_counter(&self, doctor_id: &str, value: u32, updated_at: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO counters (doctor_id, value, last_updated) VALUES (?1, ?2, ?3)
            ON CONFLICT(doctor_id) DO UPDATE SET
                value = excluded.value,
                last_updated = excluded.last_updated
            "#,
            params![doctor_id, value, updated_at],
        )?;
        Ok(())
    }

    /// Write every counter in one transaction.
    pub fn set_counters(&self, state: &CounterState, updated_at: &str) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (doctor_id, value) in state.iter() {
            tx.execute(
                r#"
                INSERT INTO counters (doctor_id, value, last_updated) VALUES (?1, ?2, ?3)
                ON CONFLICT(doctor_id) DO UPDATE SET
                    value = excluded.value,
                    last_updated = excluded.last_updated
                "#,
                params![doctor_id, value, updated_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a meta value.
    pub fn get_meta(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    /// Set a meta value.
    pub fn set_meta(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Date of the last daily counter reset.
    pub fn get_last_reset_date(&self) -> DbResult<Option<NaiveDate>> {
        match self.get_meta(LAST_RESET_KEY)? {
            Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| DbError::InvalidData(format!("{} = {}", LAST_RESET_KEY, value))),
            None => Ok(None),
        }
    }

    /// Record the date of a daily counter reset.
    pub fn set_last_reset_date(&self, date: NaiveDate) -> DbResult<()> {
        self.set_meta(LAST_RESET_KEY, &date.format("%Y-%m-%d").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Roster;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_empty_counters() {
        let db = setup_db();
        let state = db.get_counters().unwrap();
        assert_eq!(state.get("umar"), 0);
        assert_eq!(state.last_updated(), None);
    }

    #[test]
    fn test_set_and_get_counter() {
        let db = setup_db();
        db.set_counter("umar", 3, "2024-01-15T10:00:00.000Z").unwrap();
        db.set_counter("samreen", 1, "2024-01-15T10:05:00.000Z").unwrap();
        db.set_counter("umar", 4, "2024-01-15T10:10:00.000Z").unwrap();

        let state = db.get_counters().unwrap();
        assert_eq!(state.get("umar"), 4);
        assert_eq!(state.get("samreen"), 1);
        assert_eq!(state.last_updated(), Some("2024-01-15T10:10:00.000Z"));
    }

    #[test]
    fn test_set_counters_resets_all() {
        let db = setup_db();
        db.set_counter("umar", 7, "2024-01-15T10:00:00.000Z").unwrap();
        db.set_counter("samreen", 2, "2024-01-15T10:00:00.000Z").unwrap();

        let mut state = db.get_counters().unwrap();
        state.reset(&Roster::default());
        db.set_counters(&state, "2024-01-16T00:00:00.000Z").unwrap();

        let state = db.get_counters().unwrap();
        assert_eq!(state.get("umar"), 0);
        assert_eq!(state.get("samreen"), 0);
    }

    #[test]
    fn test_last_reset_date() {
        let db = setup_db();
        assert_eq!(db.get_last_reset_date().unwrap(), None);

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        db.set_last_reset_date(date).unwrap();
        assert_eq!(db.get_last_reset_date().unwrap(), Some(date));
        assert_eq!(db.get_meta(LAST_RESET_KEY).unwrap(), Some("2024-01-15".into()));
    }

    #[test]
    fn test_corrupt_reset_marker() {
        let db = setup_db();
        db.set_meta(LAST_RESET_KEY, "yesterday-ish").unwrap();
        assert!(matches!(
            db.get_last_reset_date(),
            Err(DbError::InvalidData(_))
        ));
    }
}
