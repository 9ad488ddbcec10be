//! The hospital registry: loaded collections plus write-through persistence.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use super::{Clock, Session, SystemClock};
use crate::adapters::StorageError;
use crate::domain::{
    Appointment, MedicalRecord, Medication, ReplenishmentRequest, Role, TimeSlot, User,
};
use crate::ports::{Notifier, Recipient, Schedules, Storage};
use crate::{Result, WardbookError};

/// Every collection, as loaded from storage.
#[derive(Debug, Default, Clone)]
pub(super) struct Registry {
    pub users: Vec<User>,
    pub appointments: Vec<Appointment>,
    pub records: Vec<MedicalRecord>,
    pub medications: Vec<Medication>,
    pub requests: Vec<ReplenishmentRequest>,
    pub schedules: Schedules,
}

/// One persisted collection of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collection {
    Users,
    Appointments,
    Records,
    Medications,
    Requests,
    Schedules,
}

impl Collection {
    const ALL: [Self; 6] = [
        Self::Users,
        Self::Appointments,
        Self::Records,
        Self::Medications,
        Self::Requests,
        Self::Schedules,
    ];

    fn differs(self, a: &Registry, b: &Registry) -> bool {
        match self {
            Self::Users => a.users != b.users,
            Self::Appointments => a.appointments != b.appointments,
            Self::Records => a.records != b.records,
            Self::Medications => a.medications != b.medications,
            Self::Requests => a.requests != b.requests,
            Self::Schedules => a.schedules != b.schedules,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Users => "users",
            Self::Appointments => "appointments",
            Self::Records => "medical records",
            Self::Medications => "medications",
            Self::Requests => "replenishment requests",
            Self::Schedules => "schedules",
        };
        f.write_str(name)
    }
}

impl Registry {
    pub fn user(&self, hospital_id: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.hospital_id.eq_ignore_ascii_case(hospital_id))
    }

    pub fn doctor(&self, hospital_id: &str) -> Result<&User> {
        self.user(hospital_id)
            .filter(|u| u.role == Role::Doctor)
            .ok_or_else(|| WardbookError::not_found("Doctor", hospital_id))
    }

    pub fn record_mut(&mut self, patient_id: &str) -> Result<&mut MedicalRecord> {
        self.records
            .iter_mut()
            .find(|r| r.patient_id.eq_ignore_ascii_case(patient_id))
            .ok_or_else(|| WardbookError::not_found("Medical record", patient_id))
    }

    pub fn record(&self, patient_id: &str) -> Result<&MedicalRecord> {
        self.records
            .iter()
            .find(|r| r.patient_id.eq_ignore_ascii_case(patient_id))
            .ok_or_else(|| WardbookError::not_found("Medical record", patient_id))
    }

    pub fn appointment_mut(&mut self, id: u32) -> Result<&mut Appointment> {
        self.appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| WardbookError::not_found("Appointment", id.to_string()))
    }

    pub fn medication_mut(&mut self, name: &str) -> Result<&mut Medication> {
        self.medications
            .iter_mut()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| WardbookError::not_found("Medication", name.trim()))
    }

    pub fn next_appointment_id(&self) -> u32 {
        self.appointments.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }

    /// Slots of `doctor_id` on `date` that start after `now` and are not
    /// held by another appointment.
    pub fn free_slots(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        now: chrono::NaiveDateTime,
    ) -> Vec<TimeSlot> {
        let held: HashSet<TimeSlot> = self
            .appointments
            .iter()
            .filter(|a| a.doctor_id.eq_ignore_ascii_case(doctor_id) && a.status.holds_slot())
            .map(|a| a.slot)
            .collect();

        self.schedules
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(doctor_id))
            .map(|(_, schedule)| {
                schedule
                    .slots_on(date)
                    .iter()
                    .filter(|slot| slot.start > now && !held.contains(slot))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct patients with a live or completed appointment with `doctor_id`.
    pub fn patients_of(&self, doctor_id: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for a in &self.appointments {
            if a.doctor_id.eq_ignore_ascii_case(doctor_id)
                && a.status.holds_slot()
                && !seen.contains(&a.patient_id)
            {
                seen.push(a.patient_id.clone());
            }
        }
        seen.sort();
        seen
    }
}

/// Hospital service: the in-memory registry behind every role menu.
///
/// Each mutating operation edits a copy of the registry inside
/// [`commit`](Self::commit). The copy replaces the registry only after every
/// collection it changed has been written through the [`Storage`] port.
pub struct HospitalService<S, N>
where
    S: Storage,
    N: Notifier,
{
    storage: Arc<S>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    state: Mutex<Registry>,
}

impl<S, N> HospitalService<S, N>
where
    S: Storage,
    S::Error: Into<StorageError>,
    N: Notifier,
{
    /// Load every collection using the system clock.
    ///
    /// # Errors
    /// Returns error if any collection fails to load.
    pub fn load(storage: Arc<S>, notifier: Arc<N>) -> Result<Self> {
        Self::with_clock(storage, notifier, Arc::new(SystemClock))
    }

    /// Load every collection with an explicit clock.
    ///
    /// Patients without a medical record get an empty one, which is
    /// persisted immediately.
    ///
    /// # Errors
    /// Returns error if any collection fails to load or the new records
    /// cannot be saved.
    pub fn with_clock(storage: Arc<S>, notifier: Arc<N>, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = |e: S::Error| WardbookError::Storage(e.into());

        let mut registry = Registry {
            users: storage.load_users().map_err(store)?,
            appointments: storage.load_appointments().map_err(store)?,
            records: storage.load_medical_records().map_err(store)?,
            medications: storage.load_medications().map_err(store)?,
            requests: storage.load_replenishment_requests().map_err(store)?,
            schedules: storage.load_schedules().map_err(store)?,
        };

        let mut seen = HashSet::new();
        for user in &registry.users {
            if !seen.insert(user.hospital_id.to_lowercase()) {
                tracing::warn!("Duplicate hospital ID {} in user data", user.hospital_id);
            }
        }

        let missing: Vec<MedicalRecord> = registry
            .users
            .iter()
            .filter(|u| u.role == Role::Patient)
            .filter(|u| registry.record(&u.hospital_id).is_err())
            .map(MedicalRecord::for_patient)
            .collect();
        if !missing.is_empty() {
            tracing::info!("Creating {} missing medical records", missing.len());
            registry.records.extend(missing);
            storage
                .save_medical_records(&registry.records)
                .map_err(store)?;
        }

        tracing::info!(
            "Loaded {} users, {} appointments, {} records, {} medications",
            registry.users.len(),
            registry.appointments.len(),
            registry.records.len(),
            registry.medications.len()
        );

        Ok(Self {
            storage,
            notifier,
            clock,
            state: Mutex::new(registry),
        })
    }

    pub(super) fn registry(&self) -> Result<MutexGuard<'_, Registry>> {
        self.state
            .lock()
            .map_err(|_| WardbookError::State("registry lock poisoned".to_string()))
    }

    /// Current local time according to the service clock.
    pub fn now(&self) -> chrono::NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub(super) fn notify(&self, recipient: Recipient, message: &str) {
        self.notifier.notify(recipient, message);
    }

    /// Reject a session whose role is not `role`.
    pub(super) fn require(session: &Session, role: Role) -> Result<()> {
        if session.role == role {
            Ok(())
        } else {
            Err(WardbookError::Unauthorized { required: role })
        }
    }

    fn store(e: S::Error) -> WardbookError {
        WardbookError::Storage(e.into())
    }

    /// Apply `change` to a copy of the registry, write every collection it
    /// touched, then make the copy current.
    ///
    /// If `change` fails nothing is written. If a write fails the registry
    /// is left as it was, and collections already written are restored.
    ///
    /// # Errors
    /// Returns the error of `change` or of the first failed write.
    pub(super) fn commit<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let mut reg = self.registry()?;
        let mut draft = reg.clone();
        let value = change(&mut draft)?;

        let touched: Vec<Collection> = Collection::ALL
            .into_iter()
            .filter(|c| c.differs(&reg, &draft))
            .collect();
        for (i, collection) in touched.iter().enumerate() {
            if let Err(e) = self.persist(*collection, &draft) {
                tracing::warn!("Saving {} failed, changes discarded: {}", collection, e);
                for written in &touched[..i] {
                    if let Err(undo) = self.persist(*written, &reg) {
                        tracing::error!("Could not restore saved {}: {}", written, undo);
                    }
                }
                return Err(e);
            }
        }

        *reg = draft;
        Ok(value)
    }

    fn persist(&self, collection: Collection, reg: &Registry) -> Result<()> {
        match collection {
            Collection::Users => self.persist_users(reg),
            Collection::Appointments => self.persist_appointments(reg),
            Collection::Records => self.persist_records(reg),
            Collection::Medications => self.persist_medications(reg),
            Collection::Requests => self.persist_requests(reg),
            Collection::Schedules => self.persist_schedules(reg),
        }
    }

    fn persist_users(&self, reg: &Registry) -> Result<()> {
        self.storage.save_users(&reg.users).map_err(Self::store)
    }

    fn persist_appointments(&self, reg: &Registry) -> Result<()> {
        self.storage
            .save_appointments(&reg.appointments)
            .map_err(Self::store)
    }

    fn persist_records(&self, reg: &Registry) -> Result<()> {
        self.storage
            .save_medical_records(&reg.records)
            .map_err(Self::store)
    }

    fn persist_medications(&self, reg: &Registry) -> Result<()> {
        self.storage
            .save_medications(&reg.medications)
            .map_err(Self::store)
    }

    fn persist_requests(&self, reg: &Registry) -> Result<()> {
        self.storage
            .save_replenishment_requests(&reg.requests)
            .map_err(Self::store)
    }

    fn persist_schedules(&self, reg: &Registry) -> Result<()> {
        self.storage
            .save_schedules(&reg.schedules)
            .map_err(Self::store)
    }

    /// Flush every collection to storage.
    ///
    /// # Errors
    /// Returns the first storage failure.
    pub fn save_all(&self) -> Result<()> {
        let reg = self.registry()?;
        for collection in Collection::ALL {
            self.persist(collection, &reg)?;
        }
        tracing::info!("Saved all collections");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{fixture, FixedClock, MemoryStorage, RecordingNotifier};
    use super::*;
    use crate::domain::DEFAULT_PASSWORD;

    #[test]
    fn test_load_creates_missing_records() {
        let f = fixture();
        let records = f.storage.records.lock().expect("lock").clone();
        let ids: Vec<&str> = records.iter().map(|r| r.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["P1001", "P1002"]);
    }

    #[test]
    fn test_empty_storage_loads() {
        let service = HospitalService::with_clock(
            Arc::new(MemoryStorage::default()),
            Arc::new(RecordingNotifier::default()),
            Arc::new(FixedClock::at(super::super::testing::monday_morning())),
        )
        .expect("Should load");
        assert!(service
            .authenticate(Role::Patient, "P1001", DEFAULT_PASSWORD)
            .is_err());
    }

    #[test]
    fn test_save_all_writes_every_collection() {
        let f = fixture();
        f.storage.users.lock().expect("lock").clear();
        f.storage.medications.lock().expect("lock").clear();

        f.service.save_all().expect("Should save");
        assert_eq!(f.storage.users.lock().expect("lock").len(), 6);
        assert_eq!(f.storage.medications.lock().expect("lock").len(), 2);
    }

    #[test]
    fn test_text_database_reloads_after_staff_activity() {
        use super::super::testing::date;
        use crate::adapters::textdb::TextStorage;

        let dir = tempfile::tempdir().expect("Should create temp dir");
        let storage = Arc::new(TextStorage::new(dir.path()));
        let mut admin = User::new("A001", "Ada Admin", date(1970, 1, 1), "Female", Role::Administrator)
            .expect("valid");
        admin.set_password("admin-pass");
        storage.save_users(&[admin]).expect("Should seed users");
        storage
            .save_medications(&[Medication::new("Paracetamol", 100, None, 20).expect("valid")])
            .expect("Should seed inventory");

        let open = |storage: &Arc<TextStorage>| {
            HospitalService::with_clock(
                Arc::clone(storage),
                Arc::new(RecordingNotifier::default()),
                Arc::new(FixedClock::at(super::super::testing::monday_morning())),
            )
        };

        let service = open(&storage).expect("Should load");
        let admin = service
            .authenticate(Role::Administrator, "A001", "admin-pass")
            .expect("Should log in");
        assert!(service
            .add_user(&admin, "PH;1", "Mark Lee", date(1985, 3, 2), "Male", Role::Pharmacist)
            .is_err());
        service
            .add_user(&admin, "PH-1", "Mark Lee", date(1985, 3, 2), "Male", Role::Pharmacist)
            .expect("Should add");
        let pharmacist = service
            .authenticate(Role::Pharmacist, "PH-1", DEFAULT_PASSWORD)
            .expect("Should log in");
        service
            .submit_replenishment_request(&pharmacist, "Paracetamol", 5)
            .expect("Should submit");
        drop(service);

        let reloaded = open(&storage).expect("Should reload");
        let admin = reloaded
            .authenticate(Role::Administrator, "A001", "admin-pass")
            .expect("Should log in");
        let requests = reloaded.replenishment_requests(&admin).expect("list");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].requested_by, "Pharmacist: PH-1");
        assert_eq!(reloaded.staff(&admin, Some(Role::Pharmacist)).expect("list").len(), 1);
    }
}
