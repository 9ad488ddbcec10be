//! Doctor availability.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::appointment::TimeSlot;

/// Bookable slots of one doctor, keyed by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    availability: BTreeMap<NaiveDate, Vec<TimeSlot>>,
}

impl Schedule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slots offered on `date`.
    ///
    /// Slots are kept sorted and deduplicated. An empty list clears the date.
    pub fn set_availability(&mut self, date: NaiveDate, mut slots: Vec<TimeSlot>) {
        slots.sort();
        slots.dedup();
        if slots.is_empty() {
            self.availability.remove(&date);
        } else {
            self.availability.insert(date, slots);
        }
    }

    /// Slots offered on `date`.
    #[must_use]
    pub fn slots_on(&self, date: NaiveDate) -> &[TimeSlot] {
        self.availability
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate over `(date, slots)` in date order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &Vec<TimeSlot>)> {
        self.availability.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.availability.is_empty()
    }
}
