//! Application layer: Use cases orchestrating domain and ports.
//!
//! [`HospitalService`] is the in-memory registry of every collection. Its
//! operations are grouped by role, one module each.

mod admin;
mod auth;
mod doctor;
mod hospital;
mod patient;
mod pharmacist;

use chrono::{Local, NaiveDate, NaiveDateTime};

pub use hospital::HospitalService;

use crate::domain::Role;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub hospital_id: String,
    pub name: String,
    pub role: Role,
}

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall-clock time in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Doubles shared by the service tests.

    use std::sync::Mutex;

    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use super::{Clock, HospitalService};
    use crate::adapters::StorageError;
    use crate::domain::{Medication, Role, TimeSlot, User};
    use crate::ports::{Notifier, Recipient, Schedules, Storage};

    /// Storage double that keeps each collection in memory.
    #[derive(Default)]
    pub struct MemoryStorage {
        pub users: Mutex<Vec<User>>,
        pub appointments: Mutex<Vec<crate::domain::Appointment>>,
        pub records: Mutex<Vec<crate::domain::MedicalRecord>>,
        pub medications: Mutex<Vec<Medication>>,
        pub requests: Mutex<Vec<crate::domain::ReplenishmentRequest>>,
        pub schedules: Mutex<Schedules>,
        /// Collections whose saves fail, by name.
        pub failing: Mutex<Vec<&'static str>>,
    }

    impl MemoryStorage {
        /// Make every later save of `collection` fail.
        pub fn fail_saves(&self, collection: &'static str) {
            if let Ok(mut failing) = self.failing.lock() {
                failing.push(collection);
            }
        }

        pub fn heal(&self) {
            if let Ok(mut failing) = self.failing.lock() {
                failing.clear();
            }
        }

        fn write<T>(&self, collection: &'static str, m: &Mutex<T>, value: T) -> Result<(), StorageError> {
            let fails = self
                .failing
                .lock()
                .map_err(|_| StorageError::Lock)?
                .contains(&collection);
            if fails {
                return Err(StorageError::Io {
                    path: collection.into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            *m.lock().map_err(|_| StorageError::Lock)? = value;
            Ok(())
        }
    }

    fn read<T: Clone>(m: &Mutex<T>) -> Result<T, StorageError> {
        m.lock().map(|v| v.clone()).map_err(|_| StorageError::Lock)
    }

    impl Storage for MemoryStorage {
        type Error = StorageError;

        fn load_users(&self) -> Result<Vec<User>, StorageError> {
            read(&self.users)
        }
        fn save_users(&self, v: &[User]) -> Result<(), StorageError> {
            self.write("users", &self.users, v.to_vec())
        }
        fn load_appointments(&self) -> Result<Vec<crate::domain::Appointment>, StorageError> {
            read(&self.appointments)
        }
        fn save_appointments(&self, v: &[crate::domain::Appointment]) -> Result<(), StorageError> {
            self.write("appointments", &self.appointments, v.to_vec())
        }
        fn load_medical_records(&self) -> Result<Vec<crate::domain::MedicalRecord>, StorageError> {
            read(&self.records)
        }
        fn save_medical_records(&self, v: &[crate::domain::MedicalRecord]) -> Result<(), StorageError> {
            self.write("records", &self.records, v.to_vec())
        }
        fn load_medications(&self) -> Result<Vec<Medication>, StorageError> {
            read(&self.medications)
        }
        fn save_medications(&self, v: &[Medication]) -> Result<(), StorageError> {
            self.write("medications", &self.medications, v.to_vec())
        }
        fn load_replenishment_requests(
            &self,
        ) -> Result<Vec<crate::domain::ReplenishmentRequest>, StorageError> {
            read(&self.requests)
        }
        fn save_replenishment_requests(
            &self,
            v: &[crate::domain::ReplenishmentRequest],
        ) -> Result<(), StorageError> {
            self.write("requests", &self.requests, v.to_vec())
        }
        fn load_schedules(&self) -> Result<Schedules, StorageError> {
            read(&self.schedules)
        }
        fn save_schedules(&self, v: &Schedules) -> Result<(), StorageError> {
            self.write("schedules", &self.schedules, v.clone())
        }
    }

    /// Notifier double that records every message.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(Recipient, String)>>,
    }

    impl RecordingNotifier {
        pub fn messages_to(&self, recipient: Recipient) -> Vec<String> {
            self.sent
                .lock()
                .map(|sent| {
                    sent.iter()
                        .filter(|(r, _)| *r == recipient)
                        .map(|(_, m)| m.clone())
                        .collect()
                })
                .unwrap_or_default()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, recipient: Recipient, message: &str) {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((recipient, message.to_string()));
            }
        }
    }

    /// Clock pinned to a settable instant.
    pub struct FixedClock(pub Mutex<NaiveDateTime>);

    impl FixedClock {
        pub fn at(now: NaiveDateTime) -> Self {
            Self(Mutex::new(now))
        }

        pub fn set(&self, now: NaiveDateTime) {
            if let Ok(mut t) = self.0.lock() {
                *t = now;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0.lock().map(|t| *t).unwrap_or_else(|p| *p.into_inner())
        }
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    pub fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    pub fn slot(day: NaiveDate, h: u32, m: u32) -> TimeSlot {
        let start = day.and_time(at(h, m));
        TimeSlot::new(start, start + chrono::Duration::minutes(30)).expect("valid slot")
    }

    /// "Now" for most service tests: Monday 2030-01-07 08:00.
    pub fn monday_morning() -> NaiveDateTime {
        date(2030, 1, 7).and_time(at(8, 0))
    }

    pub type TestService = HospitalService<MemoryStorage, RecordingNotifier>;

    /// Seeded fixture: one user per role plus a second patient and doctor,
    /// each still on the default password except the administrator.
    pub struct Fixture {
        pub service: TestService,
        pub storage: std::sync::Arc<MemoryStorage>,
        pub notifier: std::sync::Arc<RecordingNotifier>,
        pub clock: std::sync::Arc<FixedClock>,
    }

    pub fn fixture() -> Fixture {
        let dob = date(1980, 1, 1);
        let mut admin = User::new("A001", "Ada Admin", dob, "Female", Role::Administrator).expect("valid");
        admin.set_password("admin-pass");
        let users = vec![
            admin,
            User::new("D001", "John Smith", dob, "Male", Role::Doctor).expect("valid"),
            User::new("D002", "Emily Clarke", dob, "Female", Role::Doctor).expect("valid"),
            User::new("PH001", "Mark Lee", dob, "Male", Role::Pharmacist).expect("valid"),
            User::new("P1001", "Alice Brown", dob, "Female", Role::Patient).expect("valid"),
            User::new("P1002", "Bob Stone", dob, "Male", Role::Patient).expect("valid"),
        ];

        let storage = std::sync::Arc::new(MemoryStorage::default());
        *storage.users.lock().expect("lock") = users;
        *storage.medications.lock().expect("lock") = vec![
            Medication::new("Paracetamol", 100, Some("PharmaCo"), 20).expect("valid"),
            Medication::new("Ibuprofen", 8, None, 10).expect("valid"),
        ];

        let notifier = std::sync::Arc::new(RecordingNotifier::default());
        let clock = std::sync::Arc::new(FixedClock::at(monday_morning()));
        let service = HospitalService::with_clock(
            std::sync::Arc::clone(&storage),
            std::sync::Arc::clone(&notifier),
            clock.clone(),
        )
        .expect("Should load");

        Fixture {
            service,
            storage,
            notifier,
            clock,
        }
    }
}
