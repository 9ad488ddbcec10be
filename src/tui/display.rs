//! Text rendering of domain values for list and view screens.

use crate::domain::{Appointment, Medication, ReplenishmentRequest, Schedule, Treatment, User};

pub fn appointment_line(a: &Appointment) -> String {
    format!(
        "#{:<4} {}  patient {:<8} doctor {:<8} [{}]",
        a.id, a.slot, a.patient_id, a.doctor_id, a.status
    )
}

pub fn outcome_lines(a: &Appointment) -> Vec<String> {
    let mut lines = vec![format!("Appointment #{} on {} ({} with {}):", a.id, a.slot, a.patient_id, a.doctor_id)];
    if let Some(t) = &a.outcome {
        lines.extend(treatment_lines(t));
    }
    lines.push(String::new());
    lines
}

pub fn treatment_lines(t: &Treatment) -> Vec<String> {
    let mut lines = vec![format!("  Service      : {}", t.service_type)];
    if t.prescriptions.is_empty() {
        lines.push("  Prescriptions: none".to_string());
    } else {
        for p in &t.prescriptions {
            lines.push(format!("  Prescription : {} | {}", p.medication_name, p.status));
        }
    }
    lines.push(format!("  Notes        : {}", t.comments));
    lines
}

pub fn medication_header() -> String {
    format!("{:<20} {:>8} {:>8}  {:<20}", "Medication", "Quantity", "Alert", "Supplier")
}

pub fn medication_line(m: &Medication) -> String {
    format!(
        "{:<20} {:>8} {:>8}  {:<20}{}",
        m.name,
        m.quantity,
        m.low_stock_alert,
        m.supplier.as_deref().unwrap_or("N/A"),
        if m.is_low_stock() { "  LOW STOCK" } else { "" }
    )
}

pub fn user_line(u: &User) -> String {
    format!(
        "{:<8} {:<24} {:<14} {:<8} {}",
        u.hospital_id,
        u.name,
        u.role,
        u.gender,
        u.date_of_birth.format("%Y-%m-%d")
    )
}

/// Account details shown by "View profile". Never includes the password hash.
pub fn profile_lines(u: &User) -> Vec<String> {
    vec![
        format!("Hospital ID   : {}", u.hospital_id),
        format!("Name          : {}", u.name),
        format!("Role          : {}", u.role),
        format!("Gender        : {}", u.gender),
        format!("Date of birth : {}", u.date_of_birth.format("%Y-%m-%d")),
    ]
}

pub fn request_line(r: &ReplenishmentRequest) -> String {
    r.to_string()
}

pub fn schedule_lines(schedule: &Schedule) -> Vec<String> {
    let mut lines = Vec::new();
    for (date, slots) in schedule.iter() {
        lines.push(format!("{}:", date.format("%Y-%m-%d (%A)")));
        for slot in slots {
            lines.push(format!(
                "  {} - {}",
                slot.start.format("%H:%M"),
                slot.end.format("%H:%M")
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{split_into_slots, Role};
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_low_stock_flag() {
        let low = Medication::new("Ibuprofen", 5, None, 10).expect("valid");
        assert!(medication_line(&low).ends_with("LOW STOCK"));
        let ok = Medication::new("Paracetamol", 50, Some("PharmaCo"), 10).expect("valid");
        assert!(!medication_line(&ok).contains("LOW STOCK"));
    }

    #[test]
    fn test_profile_lines() {
        let dob = NaiveDate::from_ymd_opt(1980, 3, 14).expect("valid date");
        let user = User::new("D001", "John Smith", dob, "Male", Role::Doctor).expect("valid");
        let lines = profile_lines(&user);
        assert_eq!(lines[0], "Hospital ID   : D001");
        assert_eq!(lines[2], "Role          : Doctor");
        assert_eq!(lines[4], "Date of birth : 1980-03-14");
        assert!(lines.iter().all(|l| !l.contains(&user.password_hash)));
    }

    #[test]
    fn test_schedule_lines_group_by_date() {
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).expect("valid date");
        let mut schedule = Schedule::new();
        schedule.set_availability(
            date,
            split_into_slots(
                date,
                NaiveTime::from_hms_opt(9, 0, 0).expect("valid"),
                NaiveTime::from_hms_opt(10, 0, 0).expect("valid"),
            ),
        );
        let lines = schedule_lines(&schedule);
        assert_eq!(lines[0], "2030-01-07 (Monday):");
        assert_eq!(lines[1], "  09:00 - 09:30");
        assert_eq!(lines.len(), 3);
    }
}
