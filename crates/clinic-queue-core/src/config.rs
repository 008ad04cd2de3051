//! Clinic configuration.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{passphrase_digest, ResetGuard};
use crate::models::Roster;

/// Passphrase used when none is configured.
pub const DEFAULT_RESET_PASSPHRASE: &str = "admin123";

/// Default interval between daily-reset checks.
pub const DEFAULT_RESET_CHECK_SECS: u64 = 300;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("At least one doctor must be configured")]
    EmptyRoster,

    #[error("Duplicate doctor {field}: {value}")]
    DuplicateDoctor { field: &'static str, value: String },

    #[error("Doctor entry has an empty {0}")]
    BlankDoctorField(&'static str),

    #[error("Invalid reset passphrase digest: {0}")]
    InvalidDigest(#[from] hex::FromHexError),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClinicConfig {
    /// Known doctors, in display order
    pub doctors: Roster,
    /// Hex SHA-256 of the passphrase required for a full data reset
    pub reset_passphrase_sha256: String,
    /// Upper bound on how long the daily-reset worker sleeps between checks
    pub reset_check_interval_secs: u64,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            doctors: Roster::default(),
            reset_passphrase_sha256: passphrase_digest(DEFAULT_RESET_PASSPHRASE),
            reset_check_interval_secs: DEFAULT_RESET_CHECK_SECS,
        }
    }
}

impl ClinicConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// - `CLINIC_RESET_PASSPHRASE`: plaintext passphrase, hashed on load
    /// - `CLINIC_RESET_CHECK_SECS`: daily-reset check interval in seconds
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match env::var("CLINIC_RESET_PASSPHRASE") {
            Ok(passphrase) if !passphrase.is_empty() => {
                config.reset_passphrase_sha256 = passphrase_digest(&passphrase);
            }
            _ => warn!("CLINIC_RESET_PASSPHRASE not set, using the default reset passphrase"),
        }

        match env::var("CLINIC_RESET_CHECK_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            Some(secs) if secs > 0 => config.reset_check_interval_secs = secs,
            _ => debug!(
                "CLINIC_RESET_CHECK_SECS not set, using {}s",
                DEFAULT_RESET_CHECK_SECS
            ),
        }

        config
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the reset passphrase.
    pub fn with_reset_passphrase(mut self, passphrase: &str) -> Self {
        self.reset_passphrase_sha256 = passphrase_digest(passphrase);
        self
    }

    pub fn with_doctors(mut self, doctors: Roster) -> Self {
        self.doctors = doctors;
        self
    }

    pub fn reset_check_interval(&self) -> Duration {
        Duration::from_secs(self.reset_check_interval_secs.max(1))
    }

    pub fn reset_guard(&self) -> Result<ResetGuard, ConfigError> {
        Ok(ResetGuard::from_hex(&self.reset_passphrase_sha256)?)
    }

    /// Check roster and digest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.doctors.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        let mut tags = HashSet::new();
        for doctor in self.doctors.iter() {
            if doctor.id.trim().is_empty() {
                return Err(ConfigError::BlankDoctorField("id"));
            }
            if doctor.name.trim().is_empty() {
                return Err(ConfigError::BlankDoctorField("name"));
            }
            if doctor.tag.trim().is_empty() {
                return Err(ConfigError::BlankDoctorField("tag"));
            }
            if !ids.insert(doctor.id.to_lowercase()) {
                return Err(ConfigError::DuplicateDoctor {
                    field: "id",
                    value: doctor.id.clone(),
                });
            }
            if !names.insert(doctor.name.to_lowercase()) {
                return Err(ConfigError::DuplicateDoctor {
                    field: "name",
                    value: doctor.name.clone(),
                });
            }
            if !tags.insert(doctor.tag.to_lowercase()) {
                return Err(ConfigError::DuplicateDoctor {
                    field: "tag",
                    value: doctor.tag.clone(),
                });
            }
        }

        self.reset_guard()?;
        Ok(())
    }
}
