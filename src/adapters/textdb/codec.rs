//! Line encodings for each entity type.
//!
//! Top-level fields are separated by `|` (replenishment requests use `;`).
//! Optional values are written as `NULL`. Free-text fields nested inside a
//! `;`-separated encoding escape `\`, `;` and `,` with a backslash.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::{LineRecord, RecordError, ScheduleEntry};
use crate::domain::{
    split_into_slots, Appointment, ContactInformation, Diagnosis, MedicalRecord, Medication,
    Prescription, ReplenishmentRequest, ReplenishmentStatus, TimeSlot, Treatment, User,
};

const NULL: &str = "NULL";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

fn fields(line: &str, separator: char, expected: &[usize]) -> Result<Vec<String>, RecordError> {
    let parts: Vec<String> = line.split(separator).map(str::to_string).collect();
    if !expected.contains(&parts.len()) {
        return Err(RecordError::FieldCount {
            expected: expected
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or "),
            found: parts.len(),
        });
    }
    Ok(parts)
}

fn parse_date(value: &str) -> Result<NaiveDate, RecordError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| RecordError::BadDate(value.to_string()))
}

fn parse_time(value: &str) -> Result<NaiveTime, RecordError> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|_| RecordError::BadDate(value.to_string()))
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, RecordError> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT)
        .map_err(|_| RecordError::BadDate(value.to_string()))
}

fn parse_u32(value: &str) -> Result<u32, RecordError> {
    value
        .trim()
        .parse()
        .map_err(|_| RecordError::BadNumber(value.to_string()))
}

fn optional(value: &str) -> Option<&str> {
    if value == NULL {
        None
    } else {
        Some(value)
    }
}

fn or_null(value: Option<&str>) -> &str {
    value.unwrap_or(NULL)
}

/// Backslash-escape `\` and every character in `special`.
pub(crate) fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Drop the escaping added by [`escape`].
pub(crate) fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Split on `separator` occurrences that are not backslash-escaped.
///
/// Escapes are preserved in the returned pieces.
pub(crate) fn split_unescaped(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == separator {
            parts.push(&value[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&value[start..]);
    parts
}

fn encode_slot(slot: &TimeSlot) -> String {
    format!(
        "{}-{}",
        slot.start.format(DATETIME_FORMAT),
        slot.end.format(DATETIME_FORMAT)
    )
}

fn decode_slot(value: &str) -> Result<TimeSlot, RecordError> {
    // Both halves are fixed width, so the separating '-' sits at byte 16.
    let value = value.trim();
    match (value.get(..16), value.get(16..17), value.get(17..)) {
        (Some(start), Some("-"), Some(end)) => {
            Ok(TimeSlot::new(parse_datetime(start)?, parse_datetime(end)?)?)
        }
        _ => Err(RecordError::Invalid(format!("bad time slot '{value}'"))),
    }
}

/// Encode a treatment as `service;date;med:status,...;comments;doctor`.
pub(crate) fn encode_treatment(t: &Treatment) -> String {
    let date = t.date.map(|d| d.format(DATE_FORMAT).to_string());
    let prescriptions = if t.prescriptions.is_empty() {
        NULL.to_string()
    } else {
        t.prescriptions
            .iter()
            .map(|p| format!("{}:{}", p.medication_name, p.status))
            .collect::<Vec<_>>()
            .join(",")
    };
    let comments = if t.comments.is_empty() {
        NULL.to_string()
    } else {
        escape(&t.comments, &[';'])
    };

    let service = if t.service_type.is_empty() {
        NULL
    } else {
        t.service_type.as_str()
    };
    let parts: [&str; 5] = [
        service,
        or_null(date.as_deref()),
        &prescriptions,
        &comments,
        or_null(t.doctor_id.as_deref()),
    ];
    parts.join(";")
}

pub(crate) fn decode_treatment(value: &str) -> Result<Treatment, RecordError> {
    let parts = split_unescaped(value, ';');
    if parts.len() != 5 {
        return Err(RecordError::FieldCount {
            expected: "5 treatment".to_string(),
            found: parts.len(),
        });
    }

    let date = optional(parts[1]).map(parse_date).transpose()?;
    let prescriptions = match optional(parts[2]) {
        None => Vec::new(),
        Some(list) => list
            .split(',')
            .filter(|entry| !entry.trim().is_empty())
            .map(|entry| -> Result<Prescription, RecordError> {
                let (name, status) = entry
                    .split_once(':')
                    .ok_or_else(|| RecordError::Invalid(format!("bad prescription '{entry}'")))?;
                Ok(Prescription::new(name, status.parse()?)?)
            })
            .collect::<Result<Vec<_>, RecordError>>()?,
    };

    Ok(Treatment {
        service_type: optional(parts[0]).unwrap_or_default().to_string(),
        date,
        prescriptions,
        comments: optional(parts[3]).map(unescape).unwrap_or_default(),
        doctor_id: optional(parts[4]).map(str::to_string),
    })
}

fn encode_diagnosis(d: &Diagnosis) -> String {
    let mut out = format!("{};{}", d.description, d.date.format(DATE_FORMAT));
    if !d.comments.is_empty() {
        out.push(';');
        out.push_str(&escape(&d.comments, &[';', ',']));
    }
    out
}

fn decode_diagnosis(value: &str) -> Result<Diagnosis, RecordError> {
    let parts = split_unescaped(value, ';');
    match parts.as_slice() {
        [description, date] | [description, date, _] => {
            let mut diagnosis = Diagnosis::new(description, parse_date(date)?)?;
            if let Some(comments) = parts.get(2) {
                diagnosis.comments = unescape(comments);
            }
            Ok(diagnosis)
        }
        _ => Err(RecordError::Invalid(format!("bad diagnosis '{value}'"))),
    }
}

impl LineRecord for User {
    const FILE_NAME: &'static str = "users.txt";

    fn to_line(&self) -> String {
        let dob = self.date_of_birth.format(DATE_FORMAT).to_string();
        let role = self.role.to_string();
        let parts: [&str; 6] = [
            &self.hospital_id,
            &self.password_hash,
            &self.name,
            &dob,
            &self.gender,
            &role,
        ];
        parts.join("|")
    }

    fn from_line(line: &str) -> Result<Self, RecordError> {
        let f = fields(line, '|', &[6])?;
        let mut user = User::new(
            f[0].as_str(),
            f[2].as_str(),
            parse_date(&f[3])?,
            f[4].as_str(),
            f[5].parse()?,
        )?;
        if f[1].trim().is_empty() {
            return Err(RecordError::Invalid("empty password hash".to_string()));
        }
        user.password_hash = f[1].trim().to_string();
        Ok(user)
    }
}

impl LineRecord for Appointment {
    const FILE_NAME: &'static str = "appts.txt";

    fn to_line(&self) -> String {
        let outcome = self
            .outcome
            .as_ref()
            .map_or_else(|| NULL.to_string(), encode_treatment);
        [
            self.id.to_string(),
            self.patient_id.clone(),
            self.doctor_id.clone(),
            encode_slot(&self.slot),
            self.status.to_string(),
            outcome,
        ]
        .join("|")
    }

    fn from_line(line: &str) -> Result<Self, RecordError> {
        let f = fields(line, '|', &[6])?;
        let outcome = match optional(f[5].trim()) {
            None | Some("") => None,
            Some(encoded) => Some(decode_treatment(encoded)?),
        };
        Ok(Appointment {
            id: parse_u32(&f[0])?,
            patient_id: f[1].trim().to_string(),
            doctor_id: f[2].trim().to_string(),
            slot: decode_slot(&f[3])?,
            status: f[4].parse()?,
            outcome,
        })
    }
}

impl LineRecord for MedicalRecord {
    const FILE_NAME: &'static str = "med_records.txt";

    fn to_line(&self) -> String {
        let diagnoses = if self.diagnoses.is_empty() {
            NULL.to_string()
        } else {
            self.diagnoses
                .iter()
                .map(encode_diagnosis)
                .collect::<Vec<_>>()
                .join(",")
        };
        let treatments = if self.treatments.is_empty() {
            NULL.to_string()
        } else {
            self.treatments
                .iter()
                .map(encode_treatment)
                .collect::<Vec<_>>()
                .join("^")
        };

        let dob = self.date_of_birth.format(DATE_FORMAT).to_string();
        let parts: [&str; 9] = [
            &self.patient_id,
            &self.name,
            &dob,
            &self.gender,
            &self.contact.phone_number,
            &self.contact.email_address,
            or_null(self.blood_type.as_deref()),
            &diagnoses,
            &treatments,
        ];
        parts.join("|")
    }

    fn from_line(line: &str) -> Result<Self, RecordError> {
        let f = fields(line, '|', &[9])?;

        let diagnoses = match optional(f[7].trim()) {
            None | Some("") => Vec::new(),
            Some(list) => split_unescaped(list, ',')
                .into_iter()
                .map(decode_diagnosis)
                .collect::<Result<_, _>>()?,
        };
        let treatments = match optional(f[8].trim()) {
            None | Some("") => Vec::new(),
            Some(list) => list
                .split('^')
                .map(decode_treatment)
                .collect::<Result<_, _>>()?,
        };

        Ok(MedicalRecord {
            patient_id: f[0].trim().to_string(),
            name: f[1].clone(),
            date_of_birth: parse_date(&f[2])?,
            gender: f[3].clone(),
            contact: ContactInformation {
                phone_number: f[4].clone(),
                email_address: f[5].clone(),
            },
            blood_type: optional(f[6].trim())
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            diagnoses,
            treatments,
        })
    }
}

impl LineRecord for Medication {
    const FILE_NAME: &'static str = "inventory.txt";

    fn to_line(&self) -> String {
        [
            self.name.clone(),
            self.quantity.to_string(),
            or_null(self.supplier.as_deref()).to_string(),
            self.low_stock_alert.to_string(),
        ]
        .join("|")
    }

    fn from_line(line: &str) -> Result<Self, RecordError> {
        let f = fields(line, '|', &[3, 4])?;
        let alert = match f.get(3) {
            Some(value) => parse_u32(value)?,
            None => 0,
        };
        Ok(Medication::new(
            &f[0],
            parse_u32(&f[1])?,
            optional(f[2].trim()),
            alert,
        )?)
    }
}

impl LineRecord for ReplenishmentRequest {
    const FILE_NAME: &'static str = "replenishment_requests.txt";

    fn to_line(&self) -> String {
        [
            self.id.to_string(),
            self.medication_name.clone(),
            self.quantity.to_string(),
            self.requested_by.clone(),
            self.request_date.format(DATE_FORMAT).to_string(),
            self.status.to_string(),
        ]
        .join(";")
    }

    /// Legacy four-field lines carry no ID; they decode with `id == 0`
    /// and are numbered by the loader.
    fn from_line(line: &str) -> Result<Self, RecordError> {
        let f = fields(line, ';', &[4, 6])?;
        let (id, rest, status) = if f.len() == 6 {
            let id = parse_u32(&f[0])?;
            if id == 0 {
                return Err(RecordError::Invalid("request ID must be positive".to_string()));
            }
            (id, &f[1..5], f[5].parse()?)
        } else {
            (0, &f[..], ReplenishmentStatus::Pending)
        };

        let medication_name = rest[0].trim();
        if medication_name.is_empty() || medication_name == NULL {
            return Err(RecordError::Invalid("missing medication name".to_string()));
        }
        Ok(ReplenishmentRequest {
            id,
            medication_name: medication_name.to_string(),
            quantity: parse_u32(&rest[1])?,
            requested_by: optional(rest[2].trim()).unwrap_or_default().to_string(),
            request_date: parse_date(&rest[3])?,
            status,
        })
    }
}

impl LineRecord for ScheduleEntry {
    const FILE_NAME: &'static str = "schedules.txt";

    fn to_line(&self) -> String {
        let ranges = self
            .slots
            .iter()
            .map(|s| format!("{}-{}", s.start.format(TIME_FORMAT), s.end.format(TIME_FORMAT)))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}|{}|{}",
            self.doctor_id,
            self.date.format(DATE_FORMAT),
            ranges
        )
    }

    /// Each `HH:mm-HH:mm` range is cut into 30-minute slots.
    fn from_line(line: &str) -> Result<Self, RecordError> {
        let f = fields(line, '|', &[3])?;
        let date = parse_date(&f[1])?;
        let mut slots = Vec::new();
        for range in f[2].split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let (from, to) = range
                .split_once('-')
                .ok_or_else(|| RecordError::Invalid(format!("bad time range '{range}'")))?;
            let (from, to) = (parse_time(from)?, parse_time(to)?);
            if to <= from {
                return Err(RecordError::Invalid(format!("empty time range '{range}'")));
            }
            slots.extend(split_into_slots(date, from, to));
        }
        Ok(ScheduleEntry {
            doctor_id: f[0].trim().to_string(),
            date,
            slots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppointmentStatus, PrescriptionStatus, Role};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_split_unescaped() {
        assert_eq!(split_unescaped(r"a;b\;c;d", ';'), vec!["a", r"b\;c", "d"]);
        assert_eq!(split_unescaped("", ';'), vec![""]);
        assert_eq!(unescape(r"b\;c\\"), r"b;c\");
        assert_eq!(escape(r"x;y\", &[';']), r"x\;y\\");
    }

    #[test]
    fn test_user_line_format() {
        let line = "D001|XohImNooBHFR0OVvjcYpJ3NgPQ1qq73WKhHvch0VQtg=|John Smith|1975-03-12|Male|Doctor";
        let user = User::from_line(line).expect("Should parse");
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.date_of_birth, date(1975, 3, 12));
        assert_eq!(user.to_line(), line);

        assert!(User::from_line("D001|hash|John|1975-03-12|Male").is_err());
        assert!(User::from_line("D001|hash|John|12/03/1975|Male|Doctor").is_err());
        assert!(User::from_line("D001|hash|John|1975-03-12|Male|Nurse").is_err());
    }

    #[test]
    fn test_appointment_with_outcome() {
        let line = r"7|P1001|D001|2024-11-05T09:00-2024-11-05T09:30|Completed|Consultation;2024-11-05;Paracetamol:Pending,Ibuprofen:Dispensed;Rest\; drink water;D001";
        let appt = Appointment::from_line(line).expect("Should parse");
        assert_eq!(appt.id, 7);
        assert_eq!(appt.status, AppointmentStatus::Completed);
        assert_eq!(appt.slot.end - appt.slot.start, chrono::Duration::minutes(30));

        let outcome = appt.outcome.as_ref().expect("Should have outcome");
        assert_eq!(outcome.comments, "Rest; drink water");
        assert_eq!(outcome.prescriptions.len(), 2);
        assert_eq!(outcome.prescriptions[1].status, PrescriptionStatus::Dispensed);
        assert_eq!(outcome.doctor_id.as_deref(), Some("D001"));

        assert_eq!(appt.to_line(), line);
    }

    #[test]
    fn test_appointment_without_outcome_accepts_legacy_status() {
        let appt = Appointment::from_line("3|P1001|D002|2024-11-05T10:00-2024-11-05T10:30|Scheduled|NULL")
            .expect("Should parse");
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert!(appt.outcome.is_none());
        assert!(appt.to_line().ends_with("|Confirmed|NULL"));

        assert!(Appointment::from_line("3|P1001|D002|2024-11-05T10:00|Requested|NULL").is_err());
    }

    #[test]
    fn test_medical_record_line() {
        let line = "P1001|Alice Brown|1980-05-14|Female|91234567|alice@example.com|A+|Hypertension;2023-01-10,Asthma;2022-06-01|Check-up;2023-01-10;NULL;All good;D001";
        let record = MedicalRecord::from_line(line).expect("Should parse");
        assert_eq!(record.blood_type.as_deref(), Some("A+"));
        assert_eq!(record.diagnoses.len(), 2);
        assert_eq!(record.diagnoses[1].description, "Asthma");
        assert_eq!(record.treatments.len(), 1);
        assert!(record.treatments[0].prescriptions.is_empty());
        assert_eq!(record.to_line(), line);

        let empty = MedicalRecord::from_line("P1002|Bob|1990-01-01|Male|||NULL|NULL|NULL")
            .expect("Should parse");
        assert!(empty.blood_type.is_none());
        assert!(empty.diagnoses.is_empty() && empty.treatments.is_empty());
    }

    #[test]
    fn test_diagnosis_comments_survive() {
        let user = User::new("P1", "Ann", date(1990, 1, 1), "Female", Role::Patient).expect("valid");
        let mut record = MedicalRecord::for_patient(&user);
        let mut d = Diagnosis::new("Flu", date(2024, 2, 1)).expect("valid");
        d.comments = "mild, see GP; recheck".to_string();
        record.add_diagnosis(d.clone());
        record.add_diagnosis(Diagnosis::new("Cold", date(2024, 3, 1)).expect("valid"));

        let back = MedicalRecord::from_line(&record.to_line()).expect("Should parse");
        assert_eq!(back.diagnoses, vec![d, record.diagnoses[1].clone()]);
    }

    #[test]
    fn test_inventory_legacy_line() {
        let med = Medication::from_line("Paracetamol|100|NULL").expect("Should parse");
        assert_eq!(med.low_stock_alert, 0);
        assert!(med.supplier.is_none());
        assert_eq!(med.to_line(), "Paracetamol|100|NULL|0");

        let med = Medication::from_line("Amoxicillin|5|PharmaCo|10").expect("Should parse");
        assert!(med.is_low_stock());
        assert!(Medication::from_line("Amoxicillin|five|PharmaCo").is_err());
    }

    #[test]
    fn test_replenishment_lines() {
        let legacy = ReplenishmentRequest::from_line("Paracetamol;50;Pharmacist: PH001;2024-11-01")
            .expect("Should parse");
        assert_eq!(legacy.id, 0);
        assert_eq!(legacy.status, ReplenishmentStatus::Pending);
        assert_eq!(legacy.requested_by, "Pharmacist: PH001");

        let line = "4;Ibuprofen;20;Pharmacist: PH001;2024-11-02;Approved";
        let current = ReplenishmentRequest::from_line(line).expect("Should parse");
        assert_eq!(current.id, 4);
        assert_eq!(current.to_line(), line);

        assert!(ReplenishmentRequest::from_line("0;Ibuprofen;20;x;2024-11-02;Pending").is_err());
        assert!(ReplenishmentRequest::from_line("Ibuprofen;20;x").is_err());
    }

    #[test]
    fn test_schedule_ranges_are_split() {
        let entry = ScheduleEntry::from_line("D001|2024-11-05|09:00-10:00,14:00-14:30").expect("Should parse");
        assert_eq!(entry.slots.len(), 3);
        assert_eq!(entry.to_line(), "D001|2024-11-05|09:00-09:30,09:30-10:00,14:00-14:30");

        assert!(ScheduleEntry::from_line("D001|2024-11-05|10:00-09:00").is_err());
        let empty = ScheduleEntry::from_line("D001|2024-11-05|").expect("Should parse");
        assert!(empty.slots.is_empty());
    }
}
