//! Appointment booking types.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::medical_record::Treatment;
use super::validation::ValidationError;

/// Length of a bookable slot in minutes.
pub const SLOT_MINUTES: i64 = 30;

/// A bounded block of time on a single day.
///
/// Two slots are equal when their bounds are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSlot {
    /// Create a slot.
    ///
    /// # Errors
    /// Returns error unless `start < end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::Invalid {
                field: "time slot",
                reason: "end time must be after start time".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Calendar date the slot starts on.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} - {}",
            self.start.format("%Y-%m-%d"),
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Cut `[from, to)` on `date` into consecutive 30-minute slots.
///
/// A trailing remainder shorter than a full slot is dropped.
#[must_use]
pub fn split_into_slots(date: NaiveDate, from: NaiveTime, to: NaiveTime) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    let end = date.and_time(to);
    let mut cursor = date.and_time(from);

    while cursor + Duration::minutes(SLOT_MINUTES) <= end {
        let next = cursor + Duration::minutes(SLOT_MINUTES);
        slots.push(TimeSlot {
            start: cursor,
            end: next,
        });
        cursor = next;
    }

    slots
}

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    /// Submitted by the patient, awaiting the doctor
    Requested,
    /// Accepted by the doctor
    Confirmed,
    /// Rejected by the doctor
    Declined,
    /// Withdrawn by the patient
    Cancelled,
    /// Took place and has an outcome record
    Completed,
}

impl AppointmentStatus {
    /// Whether an appointment in this state blocks its slot.
    #[must_use]
    pub fn holds_slot(&self) -> bool {
        matches!(self, Self::Requested | Self::Confirmed | Self::Completed)
    }

    /// Whether the patient may still change or cancel the appointment.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Requested | Self::Confirmed)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "Requested",
            Self::Confirmed => "Confirmed",
            Self::Declined => "Declined",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "requested" | "pending" => Ok(Self::Requested),
            "confirmed" | "scheduled" => Ok(Self::Confirmed),
            "declined" => Ok(Self::Declined),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(ValidationError::UnknownValue {
                kind: "appointment status",
                value: other.to_string(),
            }),
        }
    }
}

/// A booking between a patient and a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: u32,
    pub patient_id: String,
    pub doctor_id: String,
    pub slot: TimeSlot,
    pub status: AppointmentStatus,
    /// Present once the doctor has recorded the outcome
    pub outcome: Option<Treatment>,
}

impl Appointment {
    /// Create a freshly requested appointment.
    #[must_use]
    pub fn request(id: u32, patient_id: &str, doctor_id: &str, slot: TimeSlot) -> Self {
        Self {
            id,
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            slot,
            status: AppointmentStatus::Requested,
            outcome: None,
        }
    }

    /// Calendar date of the appointment.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.slot.date()
    }

    /// Whether the appointment has ended before `now`.
    #[must_use]
    pub fn is_past(&self, now: NaiveDateTime) -> bool {
        self.slot.end < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 4).expect("valid date")
    }

    #[test]
    fn test_time_slot_requires_order() {
        let d = day();
        assert!(TimeSlot::new(d.and_time(at(10, 0)), d.and_time(at(9, 0))).is_err());
        assert!(TimeSlot::new(d.and_time(at(10, 0)), d.and_time(at(10, 0))).is_err());
        let slot = TimeSlot::new(d.and_time(at(9, 0)), d.and_time(at(9, 30))).expect("valid");
        assert_eq!(slot.to_string(), "2030-03-04 09:00 - 09:30");
    }

    #[test]
    fn test_split_drops_short_remainder() {
        let slots = split_into_slots(day(), at(9, 0), at(10, 45));
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start, day().and_time(at(9, 0)));
        assert_eq!(slots[2].end, day().and_time(at(10, 30)));
        assert!(slots.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn test_split_empty_range() {
        assert!(split_into_slots(day(), at(9, 0), at(9, 0)).is_empty());
        assert!(split_into_slots(day(), at(9, 0), at(9, 20)).is_empty());
    }

    #[test]
    fn test_status_parsing_accepts_legacy_spelling() {
        assert_eq!(
            "Scheduled".parse::<AppointmentStatus>().expect("Should parse"),
            AppointmentStatus::Confirmed
        );
        assert_eq!(
            "CANCELLED".parse::<AppointmentStatus>().expect("Should parse"),
            AppointmentStatus::Cancelled
        );
        assert!("lost".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_slot_holding_states() {
        assert!(AppointmentStatus::Requested.holds_slot());
        assert!(AppointmentStatus::Confirmed.holds_slot());
        assert!(!AppointmentStatus::Declined.holds_slot());
        assert!(!AppointmentStatus::Cancelled.holds_slot());
    }
}
