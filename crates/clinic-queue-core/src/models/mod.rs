//! Domain models for the clinic front desk.

mod appointment;
mod doctor;
mod patient;
mod stats;

pub use appointment::*;
pub use doctor::*;
pub use patient::*;
pub use stats::*;
