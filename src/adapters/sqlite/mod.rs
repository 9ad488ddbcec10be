//! SQLite adapter: Implementation of Storage.
//!
//! Every collection lives in its own table. Nested lists (diagnoses,
//! treatments, appointment outcomes) are stored as JSON text.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex surfaces as
//! [`StorageError::Lock`] instead of a panic.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use super::StorageError;
use crate::domain::{
    Appointment, ContactInformation, MedicalRecord, Medication, ReplenishmentRequest, TimeSlot,
    User,
};
use crate::ports::{Schedules, Storage};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Lock)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS users (
                hospital_id TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                gender TEXT NOT NULL,
                role TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS appointments (
                id INTEGER PRIMARY KEY,
                patient_id TEXT NOT NULL,
                doctor_id TEXT NOT NULL,
                slot_start TEXT NOT NULL,
                slot_end TEXT NOT NULL,
                status TEXT NOT NULL,
                outcome TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_appointments_doctor
                ON appointments(doctor_id, slot_start);

            CREATE TABLE IF NOT EXISTS medical_records (
                patient_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                gender TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                email_address TEXT NOT NULL,
                blood_type TEXT,
                diagnoses TEXT NOT NULL,
                treatments TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS medications (
                name TEXT PRIMARY KEY,
                quantity INTEGER NOT NULL,
                supplier TEXT,
                low_stock_alert INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS replenishment_requests (
                id INTEGER PRIMARY KEY,
                medication_name TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                requested_by TEXT NOT NULL,
                request_date TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS schedule_slots (
                doctor_id TEXT NOT NULL,
                slot_start TEXT NOT NULL,
                slot_end TEXT NOT NULL,
                PRIMARY KEY (doctor_id, slot_start, slot_end)
            );
            ",
        )?;

        Ok(())
    }
}

/// Map a bad column value into a rusqlite conversion error.
fn conversion<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn parse_column<T>(row: &Row<'_>, column: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(column)?;
    text.parse().map_err(|e| conversion(column, e))
}

fn date_column(row: &Row<'_>, column: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(column)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| conversion(column, e))
}

fn datetime_column(row: &Row<'_>, column: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(column)?;
    NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT).map_err(|e| conversion(column, e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, column: usize) -> rusqlite::Result<T> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text).map_err(|e| conversion(column, e))
}

fn slot_columns(row: &Row<'_>, start: usize) -> rusqlite::Result<TimeSlot> {
    let from = datetime_column(row, start)?;
    let to = datetime_column(row, start + 1)?;
    TimeSlot::new(from, to).map_err(|e| conversion(start, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl Storage for SqliteStorage {
    type Error = StorageError;

    fn load_users(&self) -> Result<Vec<User>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT hospital_id, password_hash, name, date_of_birth, gender, role
            FROM users
            ORDER BY rowid
            ",
        )?;

        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    hospital_id: row.get(0)?,
                    password_hash: row.get(1)?,
                    name: row.get(2)?,
                    date_of_birth: date_column(row, 3)?,
                    gender: row.get(4)?,
                    role: parse_column(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Loaded {} users from database", users.len());
        Ok(users)
    }

    fn save_users(&self, users: &[User]) -> Result<(), Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM users", [])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO users (hospital_id, password_hash, name, date_of_birth, gender, role)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;
            for u in users {
                stmt.execute(params![
                    u.hospital_id,
                    u.password_hash,
                    u.name,
                    u.date_of_birth.format(DATE_FORMAT).to_string(),
                    u.gender,
                    u.role.to_string(),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Saved {} users to database", users.len());
        Ok(())
    }

    fn load_appointments(&self) -> Result<Vec<Appointment>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT id, patient_id, doctor_id, slot_start, slot_end, status, outcome
            FROM appointments
            ORDER BY id
            ",
        )?;

        let appointments = stmt
            .query_map([], |row| {
                let outcome: Option<String> = row.get(6)?;
                let outcome = outcome
                    .map(|json| serde_json::from_str(&json).map_err(|e| conversion(6, e)))
                    .transpose()?;
                Ok(Appointment {
                    id: row.get(0)?,
                    patient_id: row.get(1)?,
                    doctor_id: row.get(2)?,
                    slot: slot_columns(row, 3)?,
                    status: parse_column(row, 5)?,
                    outcome,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(appointments)
    }

    fn save_appointments(&self, appointments: &[Appointment]) -> Result<(), Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM appointments", [])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO appointments (
                    id, patient_id, doctor_id, slot_start, slot_end, status, outcome
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )?;
            for a in appointments {
                let outcome = a.outcome.as_ref().map(to_json).transpose()?;
                stmt.execute(params![
                    a.id,
                    a.patient_id,
                    a.doctor_id,
                    a.slot.start.format(DATETIME_FORMAT).to_string(),
                    a.slot.end.format(DATETIME_FORMAT).to_string(),
                    a.status.to_string(),
                    outcome,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Saved {} appointments to database", appointments.len());
        Ok(())
    }

    fn load_medical_records(&self) -> Result<Vec<MedicalRecord>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT patient_id, name, date_of_birth, gender, phone_number,
                   email_address, blood_type, diagnoses, treatments
            FROM medical_records
            ORDER BY rowid
            ",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(MedicalRecord {
                    patient_id: row.get(0)?,
                    name: row.get(1)?,
                    date_of_birth: date_column(row, 2)?,
                    gender: row.get(3)?,
                    contact: ContactInformation {
                        phone_number: row.get(4)?,
                        email_address: row.get(5)?,
                    },
                    blood_type: row.get(6)?,
                    diagnoses: json_column(row, 7)?,
                    treatments: json_column(row, 8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn save_medical_records(&self, records: &[MedicalRecord]) -> Result<(), Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM medical_records", [])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO medical_records (
                    patient_id, name, date_of_birth, gender, phone_number,
                    email_address, blood_type, diagnoses, treatments
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )?;
            for r in records {
                stmt.execute(params![
                    r.patient_id,
                    r.name,
                    r.date_of_birth.format(DATE_FORMAT).to_string(),
                    r.gender,
                    r.contact.phone_number,
                    r.contact.email_address,
                    r.blood_type,
                    to_json(&r.diagnoses)?,
                    to_json(&r.treatments)?,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Saved {} medical records to database", records.len());
        Ok(())
    }

    fn load_medications(&self) -> Result<Vec<Medication>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name, quantity, supplier, low_stock_alert FROM medications ORDER BY rowid",
        )?;

        let medications = stmt
            .query_map([], |row| {
                Ok(Medication {
                    name: row.get(0)?,
                    quantity: row.get(1)?,
                    supplier: row.get(2)?,
                    low_stock_alert: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(medications)
    }

    fn save_medications(&self, medications: &[Medication]) -> Result<(), Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM medications", [])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO medications (name, quantity, supplier, low_stock_alert)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )?;
            for m in medications {
                stmt.execute(params![m.name, m.quantity, m.supplier, m.low_stock_alert])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Saved {} medications to database", medications.len());
        Ok(())
    }

    fn load_replenishment_requests(&self) -> Result<Vec<ReplenishmentRequest>, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT id, medication_name, quantity, requested_by, request_date, status
            FROM replenishment_requests
            ORDER BY id
            ",
        )?;

        let requests = stmt
            .query_map([], |row| {
                Ok(ReplenishmentRequest {
                    id: row.get(0)?,
                    medication_name: row.get(1)?,
                    quantity: row.get(2)?,
                    requested_by: row.get(3)?,
                    request_date: date_column(row, 4)?,
                    status: parse_column(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    fn save_replenishment_requests(
        &self,
        requests: &[ReplenishmentRequest],
    ) -> Result<(), Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM replenishment_requests", [])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO replenishment_requests (
                    id, medication_name, quantity, requested_by, request_date, status
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;
            for r in requests {
                stmt.execute(params![
                    r.id,
                    r.medication_name,
                    r.quantity,
                    r.requested_by,
                    r.request_date.format(DATE_FORMAT).to_string(),
                    r.status.to_string(),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Saved {} replenishment requests to database", requests.len());
        Ok(())
    }

    fn load_schedules(&self) -> Result<Schedules, Self::Error> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT doctor_id, slot_start, slot_end
            FROM schedule_slots
            ORDER BY doctor_id, slot_start
            ",
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, slot_columns(row, 1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut schedules = Schedules::new();
        for (doctor_id, slot) in rows {
            let schedule = schedules.entry(doctor_id).or_default();
            let mut slots = schedule.slots_on(slot.date()).to_vec();
            slots.push(slot);
            schedule.set_availability(slot.date(), slots);
        }
        Ok(schedules)
    }

    fn save_schedules(&self, schedules: &Schedules) -> Result<(), Self::Error> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM schedule_slots", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO schedule_slots (doctor_id, slot_start, slot_end) VALUES (?1, ?2, ?3)",
            )?;
            for (doctor_id, schedule) in schedules {
                for slot in schedule.iter().flat_map(|(_, slots)| slots) {
                    stmt.execute(params![
                        doctor_id,
                        slot.start.format(DATETIME_FORMAT).to_string(),
                        slot.end.format(DATETIME_FORMAT).to_string(),
                    ])?;
                }
            }
        }
        tx.commit()?;

        tracing::debug!("Saved schedules of {} doctors to database", schedules.len());
        Ok(())
    }
}
