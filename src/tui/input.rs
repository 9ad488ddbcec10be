//! Parsing of typed form values.

use chrono::{NaiveDate, NaiveTime};

use crate::domain::Role;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

pub fn parse_date(label: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| format!("{label}: expected a date like 2024-11-02"))
}

pub fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|_| format!("'{}' is not a time like 09:30", value.trim()))
}

/// Parse `09:00-12:00, 14:00-16:30` into time ranges. Blank input is an
/// empty list.
pub fn parse_ranges(value: &str) -> Result<Vec<(NaiveTime, NaiveTime)>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|range| {
            let (from, to) = range
                .split_once('-')
                .ok_or_else(|| format!("'{range}' is not a range like 09:00-12:00"))?;
            Ok((parse_time(from)?, parse_time(to)?))
        })
        .collect()
}

pub fn parse_u32(label: &str, value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{label}: expected a whole number"))
}

pub fn parse_role(value: &str) -> Result<Role, String> {
    value.parse().map_err(|e: crate::domain::ValidationError| e.to_string())
}

/// `None` for a blank value.
pub fn optional(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranges() {
        let ranges = parse_ranges("09:00-12:00, 14:00 - 16:30,").expect("Should parse");
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].1, NaiveTime::from_hms_opt(16, 30, 0).expect("valid"));
        assert!(parse_ranges("").expect("Should parse").is_empty());
        assert!(parse_ranges("9-12").is_err());
        assert!(parse_ranges("09:00").is_err());
    }

    #[test]
    fn test_parse_scalars() {
        assert!(parse_date("Date", "2024-11-02").is_ok());
        assert!(parse_date("Date", "02/11/2024").is_err());
        assert_eq!(parse_u32("Quantity", " 40 "), Ok(40));
        assert!(parse_u32("Quantity", "-1").is_err());
        assert_eq!(parse_role("doctor"), Ok(Role::Doctor));
        assert_eq!(optional("  "), None);
        assert_eq!(optional(" PharmaCo "), Some("PharmaCo"));
    }
}
