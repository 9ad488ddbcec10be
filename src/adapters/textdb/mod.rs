//! Text database adapter: one pipe-delimited file per entity type.
//!
//! This is the original on-disk format of the hospital data. Each entity
//! type implements [`LineRecord`], and a generic [`DataLoader`] reads and
//! writes a whole file of them. [`TextStorage`] composes one loader per
//! type behind the [`Storage`] port.
//!
//! # Durability
//!
//! Saves write a sibling `.tmp` file and rename it over the target, so a
//! crash mid-write leaves the previous contents intact.

mod codec;

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::StorageError;
use crate::domain::{
    Appointment, MedicalRecord, Medication, ReplenishmentRequest, Schedule, TimeSlot, User,
    ValidationError,
};
use crate::ports::{Schedules, Storage};

/// Reason a single line could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: String, found: usize },

    #[error("bad date or time '{0}'")]
    BadDate(String),

    #[error("bad number '{0}'")]
    BadNumber(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Invalid(String),
}

/// A value stored as one line of a text file.
pub trait LineRecord: Sized {
    /// File the records live in, relative to the data directory.
    const FILE_NAME: &'static str;

    fn to_line(&self) -> String;

    /// # Errors
    /// Returns error if the line is malformed.
    fn from_line(line: &str) -> Result<Self, RecordError>;
}

/// One line of `schedules.txt`: a doctor's slots on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub slots: Vec<TimeSlot>,
}

/// Reads and writes a whole file of `T`.
pub struct DataLoader<T: LineRecord> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: LineRecord> DataLoader<T> {
    /// Loader for `T::FILE_NAME` inside `data_dir`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(T::FILE_NAME),
            _record: PhantomData,
        }
    }

    /// Read every record. A missing file yields an empty list.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or a line is malformed.
    pub fn load(&self) -> Result<Vec<T>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} not found, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let record = T::from_line(line).map_err(|source| StorageError::Malformed {
                file: T::FILE_NAME.to_string(),
                line: index + 1,
                source,
            })?;
            records.push(record);
        }

        tracing::debug!("Loaded {} records from {}", records.len(), T::FILE_NAME);
        Ok(records)
    }

    /// Replace the file contents with `records`.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self, records: &[T]) -> Result<(), StorageError> {
        let io_err = |source: std::io::Error| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let tmp = self.path.with_extension("txt.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(io_err)?;
            for record in records {
                writeln!(file, "{}", record.to_line()).map_err(io_err)?;
            }
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        tracing::debug!("Saved {} records to {}", records.len(), T::FILE_NAME);
        Ok(())
    }
}

/// Text-file storage adapter.
pub struct TextStorage {
    users: DataLoader<User>,
    appointments: DataLoader<Appointment>,
    medical_records: DataLoader<MedicalRecord>,
    medications: DataLoader<Medication>,
    replenishment_requests: DataLoader<ReplenishmentRequest>,
    schedules: DataLoader<ScheduleEntry>,
}

impl TextStorage {
    /// Open the text database rooted at `data_dir`.
    ///
    /// The directory is created on first save if it does not exist.
    #[must_use]
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Self {
            users: DataLoader::new(&data_dir),
            appointments: DataLoader::new(&data_dir),
            medical_records: DataLoader::new(&data_dir),
            medications: DataLoader::new(&data_dir),
            replenishment_requests: DataLoader::new(&data_dir),
            schedules: DataLoader::new(&data_dir),
        }
    }
}

impl Storage for TextStorage {
    type Error = StorageError;

    fn load_users(&self) -> Result<Vec<User>, Self::Error> {
        self.users.load()
    }

    fn save_users(&self, users: &[User]) -> Result<(), Self::Error> {
        self.users.save(users)
    }

    fn load_appointments(&self) -> Result<Vec<Appointment>, Self::Error> {
        self.appointments.load()
    }

    fn save_appointments(&self, appointments: &[Appointment]) -> Result<(), Self::Error> {
        self.appointments.save(appointments)
    }

    fn load_medical_records(&self) -> Result<Vec<MedicalRecord>, Self::Error> {
        self.medical_records.load()
    }

    fn save_medical_records(&self, records: &[MedicalRecord]) -> Result<(), Self::Error> {
        self.medical_records.save(records)
    }

    fn load_medications(&self) -> Result<Vec<Medication>, Self::Error> {
        self.medications.load()
    }

    fn save_medications(&self, medications: &[Medication]) -> Result<(), Self::Error> {
        self.medications.save(medications)
    }

    fn load_replenishment_requests(&self) -> Result<Vec<ReplenishmentRequest>, Self::Error> {
        let mut requests = self.replenishment_requests.load()?;

        // Legacy lines carry no ID: number them after the highest explicit one.
        let mut next_id = requests.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        for request in requests.iter_mut().filter(|r| r.id == 0) {
            request.id = next_id;
            next_id += 1;
        }
        Ok(requests)
    }

    fn save_replenishment_requests(
        &self,
        requests: &[ReplenishmentRequest],
    ) -> Result<(), Self::Error> {
        self.replenishment_requests.save(requests)
    }

    fn load_schedules(&self) -> Result<Schedules, Self::Error> {
        let mut schedules = Schedules::new();
        for entry in self.schedules.load()? {
            let schedule: &mut Schedule = schedules.entry(entry.doctor_id).or_default();
            let mut slots = schedule.slots_on(entry.date).to_vec();
            slots.extend(entry.slots);
            schedule.set_availability(entry.date, slots);
        }
        Ok(schedules)
    }

    fn save_schedules(&self, schedules: &Schedules) -> Result<(), Self::Error> {
        let entries: Vec<ScheduleEntry> = schedules
            .iter()
            .flat_map(|(doctor_id, schedule)| {
                schedule.iter().map(move |(date, slots)| ScheduleEntry {
                    doctor_id: doctor_id.clone(),
                    date: *date,
                    slots: slots.clone(),
                })
            })
            .collect();
        self.schedules.save(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{split_into_slots, ReplenishmentStatus, Role};
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let storage = TextStorage::new(dir.path());
        assert!(storage.load_users().expect("Should load").is_empty());
        assert!(storage.load_schedules().expect("Should load").is_empty());
    }

    #[test]
    fn test_users_roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let storage = TextStorage::new(dir.path().join("nested"));

        let mut admin = User::new("A001", "Ada Admin", date(1970, 1, 1), "Female", Role::Administrator)
            .expect("valid");
        admin.set_password("hunter22");
        let doctor = User::new("D001", "John Smith", date(1975, 3, 12), "Male", Role::Doctor)
            .expect("valid");

        storage
            .save_users(&[admin.clone(), doctor.clone()])
            .expect("Should save");
        let loaded = storage.load_users().expect("Should load");
        assert_eq!(loaded, vec![admin, doctor]);
        assert!(!dir.path().join("nested").join("users.txt.tmp").exists());
    }

    #[test]
    fn test_malformed_line_reports_file_and_line() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        fs::write(
            dir.path().join("inventory.txt"),
            "Paracetamol|100|NULL\n\nIbuprofen|lots|NULL\n",
        )
        .expect("Should write");

        let storage = TextStorage::new(dir.path());
        let err = storage.load_medications().expect_err("Should fail");
        match err {
            StorageError::Malformed { file, line, .. } => {
                assert_eq!(file, "inventory.txt");
                assert_eq!(line, 3);
            }
            other => panic!("Unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        fs::write(
            dir.path().join("inventory.txt"),
            "Paracetamol|100|NULL|10\r\n   \r\nIbuprofen|5|PharmaCo\r\n",
        )
        .expect("Should write");

        let meds = TextStorage::new(dir.path())
            .load_medications()
            .expect("Should load");
        assert_eq!(meds.len(), 2);
        assert_eq!(meds[0].low_stock_alert, 10);
        assert_eq!(meds[1].supplier.as_deref(), Some("PharmaCo"));
    }

    #[test]
    fn test_legacy_replenishment_ids() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        fs::write(
            dir.path().join("replenishment_requests.txt"),
            "Paracetamol;50;Pharmacist: PH001;2024-11-01\n\
             5;Ibuprofen;20;Pharmacist: PH001;2024-11-02;Rejected\n\
             Aspirin;10;Pharmacist: PH002;2024-11-03\n",
        )
        .expect("Should write");

        let requests = TextStorage::new(dir.path())
            .load_replenishment_requests()
            .expect("Should load");
        let ids: Vec<u32> = requests.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![6, 5, 7]);
        assert_eq!(requests[1].status, ReplenishmentStatus::Rejected);
        assert_eq!(requests[2].status, ReplenishmentStatus::Pending);
    }

    #[test]
    fn test_schedules_merge_lines_and_roundtrip() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        fs::write(
            dir.path().join("schedules.txt"),
            "D001|2030-01-02|09:00-10:00\nD001|2030-01-02|13:00-13:30\nD002|2030-01-03|08:00-08:30\n",
        )
        .expect("Should write");

        let storage = TextStorage::new(dir.path());
        let schedules = storage.load_schedules().expect("Should load");
        assert_eq!(schedules["D001"].slots_on(date(2030, 1, 2)).len(), 3);
        assert_eq!(schedules["D002"].slots_on(date(2030, 1, 3)).len(), 1);

        storage.save_schedules(&schedules).expect("Should save");
        let reloaded = storage.load_schedules().expect("Should load");
        assert_eq!(reloaded, schedules);

        let nine = NaiveTime::from_hms_opt(9, 0, 0).expect("valid time");
        let ten = NaiveTime::from_hms_opt(10, 0, 0).expect("valid time");
        assert_eq!(
            &reloaded["D001"].slots_on(date(2030, 1, 2))[..2],
            split_into_slots(date(2030, 1, 2), nine, ten).as_slice()
        );
    }
}
