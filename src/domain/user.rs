//! Hospital users and their credentials.
//!
//! Passwords are never kept in plain text. The stored form is the base64
//! SHA-256 digest of `hospital_id ++ password`, which is also what the
//! text database persists.

use base64::engine::general_purpose;
use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::validation::{ensure_identifier, ensure_non_empty, ensure_storable, ValidationError};

/// Password every new account starts with.
pub const DEFAULT_PASSWORD: &str = "password";

/// Role of a user inside the hospital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Administrator,
    Doctor,
    Pharmacist,
    Patient,
}

impl Role {
    /// All roles in login-menu order.
    pub const ALL: [Role; 4] = [
        Role::Administrator,
        Role::Doctor,
        Role::Pharmacist,
        Role::Patient,
    ];

    /// Whether this role belongs to hospital staff.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        !matches!(self, Self::Patient)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Administrator => write!(f, "Administrator"),
            Self::Doctor => write!(f, "Doctor"),
            Self::Pharmacist => write!(f, "Pharmacist"),
            Self::Patient => write!(f, "Patient"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "administrator" => Ok(Self::Administrator),
            "doctor" => Ok(Self::Doctor),
            "pharmacist" => Ok(Self::Pharmacist),
            "patient" => Ok(Self::Patient),
            other => Err(ValidationError::UnknownValue {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A registered user of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub hospital_id: String,
    pub password_hash: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub role: Role,
}

impl User {
    /// Create a user holding the default password.
    ///
    /// # Errors
    /// Returns error if any text field is empty or cannot be stored.
    pub fn new(
        hospital_id: impl Into<String>,
        name: impl Into<String>,
        date_of_birth: NaiveDate,
        gender: impl Into<String>,
        role: Role,
    ) -> Result<Self, ValidationError> {
        let hospital_id = hospital_id.into().trim().to_string();
        let name = name.into().trim().to_string();
        let gender = gender.into().trim().to_string();

        ensure_non_empty("hospital ID", &hospital_id)?;
        ensure_non_empty("name", &name)?;
        ensure_non_empty("gender", &gender)?;
        ensure_storable("hospital ID", &hospital_id)?;
        ensure_storable("name", &name)?;
        ensure_storable("gender", &gender)?;
        ensure_identifier("hospital ID", &hospital_id)?;

        let password_hash = hash_password(&hospital_id, DEFAULT_PASSWORD);
        Ok(Self {
            hospital_id,
            password_hash,
            name,
            date_of_birth,
            gender,
            role,
        })
    }

    /// Check a plain-text password against the stored hash.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        self.password_hash == hash_password(&self.hospital_id, password)
    }

    /// Replace the password.
    pub fn set_password(&mut self, password: &str) {
        self.password_hash = hash_password(&self.hospital_id, password);
    }

    /// Whether the account still uses the default password.
    #[must_use]
    pub fn uses_default_password(&self) -> bool {
        self.verify_password(DEFAULT_PASSWORD)
    }
}

/// Hash a password the way the user file stores it.
#[must_use]
pub fn hash_password(hospital_id: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hospital_id.as_bytes());
    hasher.update(password.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dob() -> NaiveDate {
        NaiveDate::from_ymd_opt(1980, 5, 14).expect("valid date")
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("DOCTOR".parse::<Role>().expect("Should parse"), Role::Doctor);
        assert_eq!(" patient ".parse::<Role>().expect("Should parse"), Role::Patient);
        assert!("nurse".parse::<Role>().is_err());
        assert_eq!(Role::Pharmacist.to_string(), "Pharmacist");
        assert!(Role::Administrator.is_staff());
        assert!(!Role::Patient.is_staff());
    }

    #[test]
    fn test_hash_is_base64_sha256() {
        let hash = hash_password("D001", "password");
        // 32 digest bytes encode to 44 padded base64 chars
        assert_eq!(hash.len(), 44);
        assert!(hash.ends_with('='));
        assert_ne!(hash, hash_password("D002", "password"));
    }

    #[test]
    fn test_new_user_has_default_password() {
        let mut user = User::new("P1001", "Alice Brown", dob(), "Female", Role::Patient)
            .expect("Should create");
        assert!(user.uses_default_password());
        assert!(user.verify_password(DEFAULT_PASSWORD));

        user.set_password("s3cret!");
        assert!(!user.uses_default_password());
        assert!(user.verify_password("s3cret!"));
        assert!(!user.verify_password("password"));
    }

    #[test]
    fn test_new_user_rejects_unstorable_fields() {
        assert!(User::new("P1|01", "Alice", dob(), "Female", Role::Patient).is_err());
        assert!(User::new("P 101", "Alice", dob(), "Female", Role::Patient).is_err());
        assert!(User::new("PH;1", "Alice", dob(), "Female", Role::Pharmacist).is_err());
        assert!(User::new("D,1", "Alice", dob(), "Female", Role::Doctor).is_err());
        assert!(User::new("P101", "", dob(), "Female", Role::Patient).is_err());
    }
}
