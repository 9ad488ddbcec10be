//! Patient medical records: diagnoses, treatments and prescriptions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::user::User;
use super::validation::{ensure_non_empty, ensure_storable, ValidationError};

/// How to reach a patient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInformation {
    pub phone_number: String,
    pub email_address: String,
}

impl ContactInformation {
    /// Build contact details after validating both fields.
    ///
    /// # Errors
    /// Returns error if a field cannot be stored or the email lacks an `@`.
    pub fn new(phone_number: &str, email_address: &str) -> Result<Self, ValidationError> {
        let phone_number = phone_number.trim();
        let email_address = email_address.trim();
        ensure_storable("phone number", phone_number)?;
        ensure_storable("email address", email_address)?;
        if phone_number.contains(';') || email_address.contains(';') {
            return Err(ValidationError::Invalid {
                field: "contact information",
                reason: "must not contain ';'".to_string(),
            });
        }
        if !email_address.is_empty() && !email_address.contains('@') {
            return Err(ValidationError::Invalid {
                field: "email address",
                reason: "missing '@'".to_string(),
            });
        }
        if phone_number
            .chars()
            .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')')))
        {
            return Err(ValidationError::Invalid {
                field: "phone number",
                reason: "only digits, spaces and + - ( ) are allowed".to_string(),
            });
        }
        Ok(Self {
            phone_number: phone_number.to_string(),
            email_address: email_address.to_string(),
        })
    }
}

/// A diagnosed condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub description: String,
    pub date: NaiveDate,
    pub comments: String,
}

impl Diagnosis {
    /// # Errors
    /// Returns error if the description is empty or cannot be stored.
    pub fn new(description: &str, date: NaiveDate) -> Result<Self, ValidationError> {
        let description = description.trim();
        ensure_non_empty("diagnosis", description)?;
        ensure_storable("diagnosis", description)?;
        if description.contains([';', ',']) {
            return Err(ValidationError::Invalid {
                field: "diagnosis",
                reason: "must not contain ';' or ','".to_string(),
            });
        }
        Ok(Self {
            description: description.to_string(),
            date,
            comments: String::new(),
        })
    }

    /// Attach free-text comments.
    ///
    /// # Errors
    /// Returns error if the comments cannot be stored.
    pub fn with_comments(mut self, comments: &str) -> Result<Self, ValidationError> {
        let comments = comments.trim();
        ensure_storable("diagnosis comments", comments)?;
        self.comments = comments.to_string();
        Ok(self)
    }
}

/// Dispensing state of a prescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrescriptionStatus {
    Pending,
    Dispensed,
    Cancelled,
}

impl std::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Dispensed => write!(f, "Dispensed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::str::FromStr for PrescriptionStatus {
    type Err = ValidationError;

    /// An empty status means pending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "pending" => Ok(Self::Pending),
            "dispensed" => Ok(Self::Dispensed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(ValidationError::UnknownValue {
                kind: "prescription status",
                value: other.to_string(),
            }),
        }
    }
}

/// A medication prescribed during a treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub medication_name: String,
    pub status: PrescriptionStatus,
}

impl Prescription {
    /// # Errors
    /// Returns error if the medication name is empty or cannot be stored.
    pub fn new(medication_name: &str, status: PrescriptionStatus) -> Result<Self, ValidationError> {
        let medication_name = medication_name.trim();
        ensure_non_empty("medication name", medication_name)?;
        ensure_storable("medication name", medication_name)?;
        if medication_name.contains([';', ',', ':']) {
            return Err(ValidationError::Invalid {
                field: "medication name",
                reason: "must not contain ';', ',' or ':'".to_string(),
            });
        }
        Ok(Self {
            medication_name: medication_name.to_string(),
            status,
        })
    }

    /// Parse a `name[:status]` list separated by commas, as typed in the
    /// outcome form. Blank input yields no prescriptions.
    ///
    /// # Errors
    /// Returns the first invalid entry.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, ValidationError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((name, status)) => Self::new(name, status.parse()?),
                None => Self::new(entry, PrescriptionStatus::Pending),
            })
            .collect()
    }
}

/// A service delivered to a patient, usually the outcome of an appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    pub service_type: String,
    pub date: Option<NaiveDate>,
    pub prescriptions: Vec<Prescription>,
    pub comments: String,
    pub doctor_id: Option<String>,
}

impl Treatment {
    /// Create a treatment record.
    ///
    /// # Errors
    /// Returns error if the service type or comments are empty or unstorable.
    pub fn new(
        service_type: &str,
        date: NaiveDate,
        prescriptions: Vec<Prescription>,
        comments: &str,
    ) -> Result<Self, ValidationError> {
        let service_type = service_type.trim();
        let comments = comments.trim();
        ensure_non_empty("service type", service_type)?;
        ensure_non_empty("treatment comments", comments)?;
        ensure_storable("service type", service_type)?;
        ensure_storable("treatment comments", comments)?;
        if service_type.contains(';') {
            return Err(ValidationError::Invalid {
                field: "service type",
                reason: "must not contain ';'".to_string(),
            });
        }
        Ok(Self {
            service_type: service_type.to_string(),
            date: Some(date),
            prescriptions,
            comments: comments.to_string(),
            doctor_id: None,
        })
    }

    /// Whether any prescription still awaits the pharmacy.
    #[must_use]
    pub fn has_pending_prescriptions(&self) -> bool {
        self.prescriptions
            .iter()
            .any(|p| p.status == PrescriptionStatus::Pending)
    }
}

/// The full medical history of one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub patient_id: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub contact: ContactInformation,
    pub blood_type: Option<String>,
    pub diagnoses: Vec<Diagnosis>,
    pub treatments: Vec<Treatment>,
}

impl MedicalRecord {
    /// Blank record for a newly registered patient.
    #[must_use]
    pub fn for_patient(patient: &User) -> Self {
        Self {
            patient_id: patient.hospital_id.clone(),
            name: patient.name.clone(),
            date_of_birth: patient.date_of_birth,
            gender: patient.gender.clone(),
            contact: ContactInformation::default(),
            blood_type: None,
            diagnoses: Vec::new(),
            treatments: Vec::new(),
        }
    }

    pub fn add_diagnosis(&mut self, diagnosis: Diagnosis) {
        self.diagnoses.push(diagnosis);
    }

    pub fn add_treatment(&mut self, treatment: Treatment) {
        self.treatments.push(treatment);
    }

    /// Mutable access to one prescription by position.
    pub fn prescription_mut(
        &mut self,
        treatment_index: usize,
        prescription_index: usize,
    ) -> Option<&mut Prescription> {
        self.treatments
            .get_mut(treatment_index)?
            .prescriptions
            .get_mut(prescription_index)
    }

    /// Render the record as display lines.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Patient ID     : {}", self.patient_id),
            format!("Name           : {}", self.name),
            format!("Date of Birth  : {}", self.date_of_birth.format("%Y-%m-%d")),
            format!("Gender         : {}", self.gender),
            format!("Phone Number   : {}", or_na(&self.contact.phone_number)),
            format!("Email Address  : {}", or_na(&self.contact.email_address)),
            format!(
                "Blood Type     : {}",
                self.blood_type.as_deref().unwrap_or("N/A")
            ),
            String::new(),
            "Past Diagnoses:".to_string(),
        ];

        if self.diagnoses.is_empty() {
            lines.push("  - No past diagnoses recorded.".to_string());
        }
        for d in &self.diagnoses {
            lines.push(format!("  - {} (Date: {})", d.description, d.date.format("%Y-%m-%d")));
        }

        lines.push(String::new());
        lines.push("Past Treatments:".to_string());
        if self.treatments.is_empty() {
            lines.push("  - No past treatments recorded.".to_string());
        }
        for (i, t) in self.treatments.iter().enumerate() {
            lines.push(format!(
                "  [{}] {} on {} by {}",
                i + 1,
                t.service_type,
                t.date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                t.doctor_id.as_deref().unwrap_or("N/A")
            ));
            if t.prescriptions.is_empty() {
                lines.push("      Prescriptions: none".to_string());
            }
            for p in &t.prescriptions {
                lines.push(format!("      - {} | {}", p.medication_name, p.status));
            }
            lines.push(format!("      Notes: {}", or_na(&t.comments)));
        }

        lines
    }
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 2).expect("valid date")
    }

    #[test]
    fn test_parse_prescription_list() {
        let list = Prescription::parse_list("Paracetamol, Ibuprofen:dispensed ,, ").expect("Should parse");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].status, PrescriptionStatus::Pending);
        assert_eq!(list[1].medication_name, "Ibuprofen");
        assert_eq!(list[1].status, PrescriptionStatus::Dispensed);

        assert!(Prescription::parse_list("Aspirin:lost").is_err());
        assert!(Prescription::parse_list("").expect("Should parse").is_empty());
    }

    #[test]
    fn test_treatment_validation() {
        assert!(Treatment::new("", date(), Vec::new(), "notes").is_err());
        assert!(Treatment::new("Consultation", date(), Vec::new(), " ").is_err());
        assert!(Treatment::new("X;ray", date(), Vec::new(), "ok").is_err());

        let t = Treatment::new("Consultation", date(), Vec::new(), "Rest; fluids").expect("Should create");
        assert_eq!(t.date, Some(date()));
        assert!(!t.has_pending_prescriptions());
    }

    #[test]
    fn test_record_for_patient_and_prescription_access() {
        let user = User::new("P1001", "Alice Brown", date(), "Female", Role::Patient).expect("valid");
        let mut record = MedicalRecord::for_patient(&user);
        assert_eq!(record.patient_id, "P1001");
        assert!(record.prescription_mut(0, 0).is_none());

        let rx = Prescription::new("Amoxicillin", PrescriptionStatus::Pending).expect("valid");
        let t = Treatment::new("Consultation", date(), vec![rx], "Follow up in 2 weeks").expect("valid");
        record.add_treatment(t);
        assert!(record.treatments[0].has_pending_prescriptions());

        record
            .prescription_mut(0, 0)
            .expect("Should exist")
            .status = PrescriptionStatus::Dispensed;
        assert!(!record.treatments[0].has_pending_prescriptions());

        let lines = record.summary_lines();
        assert!(lines.iter().any(|l| l.contains("Amoxicillin | Dispensed")));
    }

    #[test]
    fn test_contact_validation() {
        assert!(ContactInformation::new("+65 9123-4567", "alice@example.com").is_ok());
        assert!(ContactInformation::new("91234567", "not-an-email").is_err());
        assert!(ContactInformation::new("call me", "").is_err());
        assert!(ContactInformation::new("", "").is_ok());
    }
}
