//! Storage port: Trait for persistent storage operations.
//!
//! This trait abstracts the storage backend (text files or SQLite) from the
//! application logic. Collections are loaded and saved whole: the service
//! keeps everything in memory and writes a collection through after it
//! changes.

use std::collections::BTreeMap;

use crate::domain::{Appointment, MedicalRecord, Medication, ReplenishmentRequest, Schedule, User};

/// Doctor schedules keyed by doctor hospital ID.
pub type Schedules = BTreeMap<String, Schedule>;

/// Trait for local storage operations.
pub trait Storage: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every registered user.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be read or holds bad data.
    fn load_users(&self) -> Result<Vec<User>, Self::Error>;

    /// Replace the stored users.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn save_users(&self, users: &[User]) -> Result<(), Self::Error>;

    /// # Errors
    /// Returns error if the backing store cannot be read or holds bad data.
    fn load_appointments(&self) -> Result<Vec<Appointment>, Self::Error>;

    /// # Errors
    /// Returns error if storage operation fails.
    fn save_appointments(&self, appointments: &[Appointment]) -> Result<(), Self::Error>;

    /// # Errors
    /// Returns error if the backing store cannot be read or holds bad data.
    fn load_medical_records(&self) -> Result<Vec<MedicalRecord>, Self::Error>;

    /// # Errors
    /// Returns error if storage operation fails.
    fn save_medical_records(&self, records: &[MedicalRecord]) -> Result<(), Self::Error>;

    /// # Errors
    /// Returns error if the backing store cannot be read or holds bad data.
    fn load_medications(&self) -> Result<Vec<Medication>, Self::Error>;

    /// # Errors
    /// Returns error if storage operation fails.
    fn save_medications(&self, medications: &[Medication]) -> Result<(), Self::Error>;

    /// # Errors
    /// Returns error if the backing store cannot be read or holds bad data.
    fn load_replenishment_requests(&self) -> Result<Vec<ReplenishmentRequest>, Self::Error>;

    /// # Errors
    /// Returns error if storage operation fails.
    fn save_replenishment_requests(
        &self,
        requests: &[ReplenishmentRequest],
    ) -> Result<(), Self::Error>;

    /// Load doctor availability.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be read or holds bad data.
    fn load_schedules(&self) -> Result<Schedules, Self::Error>;

    /// # Errors
    /// Returns error if storage operation fails.
    fn save_schedules(&self, schedules: &Schedules) -> Result<(), Self::Error>;
}
