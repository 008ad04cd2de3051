//! Doctor roster models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum similarity for suggesting a doctor on a misspelled selection.
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// A doctor patients can be booked with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Doctor {
    /// Short stable key (e.g. "umar"), used to store the doctor's counter
    pub id: String,
    /// Display name stored on patient records
    pub name: String,
    /// Appointment number prefix (e.g. "UMAR")
    pub tag: String,
}

impl Doctor {
    /// Create a doctor entry.
    pub fn new(id: impl Into<String>, name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Check whether `input` names this doctor by id, display name, or tag.
    pub fn matches(&self, input: &str) -> bool {
        let input = input.trim();
        self.id.eq_ignore_ascii_case(input)
            || self.name.eq_ignore_ascii_case(input)
            || self.tag.eq_ignore_ascii_case(input)
    }

    fn similarity(&self, input: &str) -> f64 {
        let input = input.trim().to_lowercase();
        [&self.id, &self.name, &self.tag]
            .iter()
            .map(|candidate| strsim::normalized_levenshtein(&candidate.to_lowercase(), &input))
            .fold(0.0, f64::max)
    }
}

/// Doctor selection errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RosterError {
    #[error("Please select a doctor")]
    NoneSelected,

    #[error("Unknown doctor: {0}")]
    Unknown(String),

    #[error("Unknown doctor: {input} (did you mean {suggestion}?)")]
    Misspelled { input: String, suggestion: String },
}

/// The fixed set of doctors for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Roster {
    doctors: Vec<Doctor>,
}

impl Roster {
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self { doctors }
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn iter(&self) -> impl Iterator<Item = &Doctor> {
        self.doctors.iter()
    }

    pub fn len(&self) -> usize {
        self.doctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
    }

    /// Find a doctor by id, display name, or tag (case-insensitive).
    pub fn find(&self, input: &str) -> Option<&Doctor> {
        self.doctors.iter().find(|d| d.matches(input))
    }

    /// Resolve a UI selection to a known doctor.
    pub fn resolve(&self, input: &str) -> Result<&Doctor, RosterError> {
        if input.trim().is_empty() {
            return Err(RosterError::NoneSelected);
        }

        if let Some(doctor) = self.find(input) {
            return Ok(doctor);
        }

        match self.closest(input) {
            Some(doctor) => Err(RosterError::Misspelled {
                input: input.trim().to_string(),
                suggestion: doctor.name.clone(),
            }),
            None => Err(RosterError::Unknown(input.trim().to_string())),
        }
    }

    /// Closest doctor to a misspelled selection, if any is close enough.
    pub fn closest(&self, input: &str) -> Option<&Doctor> {
        self.doctors
            .iter()
            .map(|d| (d, d.similarity(input)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(d, _)| d)
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(vec![
            Doctor::new("umar", "Dr. Umar Farooq", "UMAR"),
            Doctor::new("samreen", "Dr. Samreen Malik", "SAMREEN"),
        ])
    }
}
