//! Pharmacy stock and replenishment.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::validation::{ensure_non_empty, ensure_storable, ValidationError};

/// A stocked medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub quantity: u32,
    pub supplier: Option<String>,
    /// Stock level at or below which the item is flagged
    pub low_stock_alert: u32,
}

impl Medication {
    /// # Errors
    /// Returns error if the name or supplier cannot be stored.
    pub fn new(
        name: &str,
        quantity: u32,
        supplier: Option<&str>,
        low_stock_alert: u32,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        ensure_non_empty("medication name", name)?;
        ensure_storable("medication name", name)?;
        if name.contains([';', ',', ':']) {
            return Err(ValidationError::Invalid {
                field: "medication name",
                reason: "must not contain ';', ',' or ':'".to_string(),
            });
        }
        let supplier = supplier.map(str::trim).filter(|s| !s.is_empty());
        if let Some(s) = supplier {
            ensure_storable("supplier", s)?;
        }
        Ok(Self {
            name: name.to_string(),
            quantity,
            supplier: supplier.map(str::to_string),
            low_stock_alert,
        })
    }

    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_alert
    }
}

/// Review state of a replenishment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplenishmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for ReplenishmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Approved => write!(f, "Approved"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

impl std::str::FromStr for ReplenishmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(ValidationError::UnknownValue {
                kind: "replenishment status",
                value: other.to_string(),
            }),
        }
    }
}

/// A pharmacist's request for more stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentRequest {
    pub id: u32,
    pub medication_name: String,
    pub quantity: u32,
    pub requested_by: String,
    pub request_date: NaiveDate,
    pub status: ReplenishmentStatus,
}

impl std::fmt::Display for ReplenishmentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Replenishment request #{}: {} x{} by {} on {} [{}]",
            self.id,
            self.medication_name,
            self.quantity,
            self.requested_by,
            self.request_date.format("%Y-%m-%d"),
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_stock_threshold_is_inclusive() {
        let mut med = Medication::new("Paracetamol", 20, Some("PharmaCo"), 20).expect("valid");
        assert!(med.is_low_stock());
        med.quantity = 21;
        assert!(!med.is_low_stock());
    }

    #[test]
    fn test_blank_supplier_is_absent() {
        let med = Medication::new("Ibuprofen", 5, Some("  "), 0).expect("valid");
        assert!(med.supplier.is_none());
        assert!(Medication::new("Ibu;profen", 5, None, 0).is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "APPROVED".parse::<ReplenishmentStatus>().expect("Should parse"),
            ReplenishmentStatus::Approved
        );
        assert!("maybe".parse::<ReplenishmentStatus>().is_err());
    }
}
