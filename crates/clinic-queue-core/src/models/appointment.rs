//! Appointment numbers and per-doctor counters.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use super::doctor::Roster;

/// Key suffix for counter fields in the shared counters document.
const COUNTER_FIELD_SUFFIX: &str = "Counter";
const LAST_UPDATED_FIELD: &str = "lastUpdated";

/// An appointment number, rendered as `<TAG>-#<N>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppointmentNumber {
    tag: String,
    sequence: u32,
}

impl AppointmentNumber {
    pub fn new(tag: impl Into<String>, sequence: u32) -> Self {
        Self {
            tag: tag.into(),
            sequence,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for AppointmentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-#{}", self.tag, self.sequence)
    }
}

/// Per-doctor appointment counters.
///
/// Doctors without an entry read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CounterState {
    counters: BTreeMap<String, u32>,
    last_updated: Option<String>,
}

impl CounterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value for a doctor.
    pub fn get(&self, doctor_id: &str) -> u32 {
        self.counters.get(doctor_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, doctor_id: &str, value: u32) {
        self.counters.insert(doctor_id.to_string(), value);
    }

    /// Increment a doctor's counter and return the new value.
    pub fn increment(&mut self, doctor_id: &str) -> u32 {
        let counter = self.counters.entry(doctor_id.to_string()).or_insert(0);
        *counter = counter.saturating_add(1);
        *counter
    }

    /// Zero every counter in the roster (and any stray entries).
    pub fn reset(&mut self, roster: &Roster) {
        for value in self.counters.values_mut() {
            *value = 0;
        }
        for doctor in roster.iter() {
            self.counters.insert(doctor.id.clone(), 0);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counters.iter().map(|(id, v)| (id.as_str(), *v))
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    pub fn set_last_updated(&mut self, timestamp: impl Into<String>) {
        self.last_updated = Some(timestamp.into());
    }

    /// Render as the shared counters document:
    /// `{"umarCounter": 3, "samreenCounter": 1, "lastUpdated": "..."}`.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        for (id, value) in &self.counters {
            doc.insert(format!("{}{}", id, COUNTER_FIELD_SUFFIX), Value::from(*value));
        }
        if let Some(ts) = &self.last_updated {
            doc.insert(LAST_UPDATED_FIELD.to_string(), Value::from(ts.clone()));
        }
        Value::Object(doc)
    }

    /// Read a shared counters document. Missing or non-numeric fields read as zero.
    pub fn from_document(doc: &Value) -> Self {
        let mut state = Self::default();
        let Some(fields) = doc.as_object() else {
            return state;
        };

        for (key, value) in fields {
            if key == LAST_UPDATED_FIELD {
                state.last_updated = value.as_str().map(str::to_string);
            } else if let Some(id) = key.strip_suffix(COUNTER_FIELD_SUFFIX) {
                let count = value
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(0);
                state.counters.insert(id.to_string(), count);
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display() {
        let number = AppointmentNumber::new("UMAR", 12);
        assert_eq!(number.to_string(), "UMAR-#12");
        assert_eq!(number.tag(), "UMAR");
        assert_eq!(number.sequence(), 12);
    }

    #[test]
    fn test_increment_and_reset() {
        let roster = Roster::default();
        let mut state = CounterState::new();
        assert_eq!(state.get("umar"), 0);
        assert_eq!(state.increment("umar"), 1);
        assert_eq!(state.increment("umar"), 2);
        assert_eq!(state.get("samreen"), 0);

        state.reset(&roster);
        assert_eq!(state.get("umar"), 0);
        assert_eq!(state.iter().count(), 2);
    }

    #[test]
    fn test_document_layout() {
        let mut state = CounterState::new();
        state.set("umar", 4);
        state.set("samreen", 2);
        state.set_last_updated("2024-01-15T10:00:00.000Z");

        let doc = state.to_document();
        assert_eq!(
            doc,
            json!({
                "umarCounter": 4,
                "samreenCounter": 2,
                "lastUpdated": "2024-01-15T10:00:00.000Z"
            })
        );
        assert_eq!(CounterState::from_document(&doc), state);
    }

    #[test]
    fn test_document_lenient_read() {
        let state = CounterState::from_document(&json!({
            "umarCounter": "seven",
            "samreenCounter": 5,
            "unrelated": true
        }));
        assert_eq!(state.get("umar"), 0);
        assert_eq!(state.get("samreen"), 5);
        assert_eq!(state.last_updated(), None);
    }
}
