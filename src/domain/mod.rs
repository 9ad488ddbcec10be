//! Domain layer: Core hospital types and their invariants.
//!
//! This module contains pure Rust types with no I/O.
//! All types are serializable and validate their text fields.

mod appointment;
mod inventory;
mod medical_record;
mod schedule;
mod user;
mod validation;

pub use appointment::{split_into_slots, Appointment, AppointmentStatus, TimeSlot, SLOT_MINUTES};
pub use inventory::{Medication, ReplenishmentRequest, ReplenishmentStatus};
pub use medical_record::{
    ContactInformation, Diagnosis, MedicalRecord, Prescription, PrescriptionStatus, Treatment,
};
pub use schedule::Schedule;
pub use user::{hash_password, Role, User, DEFAULT_PASSWORD};
pub use validation::{ensure_identifier, ensure_non_empty, ensure_storable, ValidationError};
