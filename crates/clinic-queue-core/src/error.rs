//! Service-level errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::models::RosterError;
use crate::store::StoreError;

/// Errors surfaced to the UI layer.
///
/// `Validation` and `Auth` leave all state untouched. `Storage` may leave
/// in-memory state ahead of what was persisted.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Incorrect reset passphrase")]
    Auth,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] std::io::Error),
}

impl From<RosterError> for ClinicError {
    fn from(e: RosterError) -> Self {
        ClinicError::Validation(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::Storage(StoreError::from(e))
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;
