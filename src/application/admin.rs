use chrono::NaiveDate;

use super::{HospitalService, Session};
use crate::adapters::StorageError;
use crate::domain::{
    Appointment, MedicalRecord, Medication, ReplenishmentRequest, ReplenishmentStatus, Role, User,
};
use crate::ports::{Notifier, Storage};
use crate::{Result, WardbookError};

impl<S, N> HospitalService<S, N>
where
    S: Storage,
    S::Error: Into<StorageError>,
    N: Notifier,
{
    /// Staff accounts in ID order, optionally limited to one role.
    ///
    /// # Errors
    /// Returns error unless the caller is an administrator.
    pub fn staff(&self, session: &Session, role: Option<Role>) -> Result<Vec<User>> {
        Self::require(session, Role::Administrator)?;
        let reg = self.registry()?;
        let mut staff: Vec<User> = reg
            .users
            .iter()
            .filter(|u| u.role.is_staff() && role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        staff.sort_by(|a, b| a.hospital_id.cmp(&b.hospital_id));
        Ok(staff)
    }

    /// Register a user on the default password. Patients also get an empty
    /// medical record.
    ///
    /// # Errors
    /// Returns error if the ID is taken or a field is invalid.
    pub fn add_user(
        &self,
        session: &Session,
        hospital_id: &str,
        name: &str,
        date_of_birth: NaiveDate,
        gender: &str,
        role: Role,
    ) -> Result<()> {
        Self::require(session, Role::Administrator)?;
        let user = User::new(hospital_id, name, date_of_birth, gender, role)?;

        let id = user.hospital_id.clone();
        self.commit(|reg| {
            if reg.user(&user.hospital_id).is_some() {
                return Err(WardbookError::Conflict(format!(
                    "Hospital ID {} is already in use",
                    user.hospital_id
                )));
            }
            if role == Role::Patient && reg.record(&user.hospital_id).is_err() {
                reg.records.push(MedicalRecord::for_patient(&user));
            }
            reg.users.push(user);
            Ok(())
        })?;
        tracing::info!("{} {} added by {}", role, id, session.hospital_id);
        Ok(())
    }

    /// Delete an account. A patient's medical record is kept; a doctor's
    /// availability is dropped.
    ///
    /// # Errors
    /// Returns error for an unknown ID or the caller's own account.
    pub fn remove_user(&self, session: &Session, hospital_id: &str) -> Result<()> {
        Self::require(session, Role::Administrator)?;
        let hospital_id = hospital_id.trim();
        if hospital_id.eq_ignore_ascii_case(&session.hospital_id) {
            return Err(WardbookError::Conflict(
                "You cannot remove your own account".into(),
            ));
        }

        let removed = self.commit(|reg| {
            let index = reg
                .users
                .iter()
                .position(|u| u.hospital_id.eq_ignore_ascii_case(hospital_id))
                .ok_or_else(|| WardbookError::not_found("User", hospital_id))?;
            let removed = reg.users.remove(index);
            if removed.role == Role::Doctor {
                reg.schedules.remove(&removed.hospital_id);
            }
            Ok(removed)
        })?;
        tracing::info!(
            "{} {} removed by {}",
            removed.role,
            removed.hospital_id,
            session.hospital_id
        );
        Ok(())
    }

    /// Every appointment, oldest first.
    ///
    /// # Errors
    /// Returns error unless the caller is an administrator.
    pub fn all_appointments(&self, session: &Session) -> Result<Vec<Appointment>> {
        Self::require(session, Role::Administrator)?;
        let mut list = self.registry()?.appointments.clone();
        list.sort_by_key(|a| (a.slot.start, a.id));
        Ok(list)
    }

    /// Add a medication to the inventory.
    ///
    /// # Errors
    /// Returns error if the name is taken (ignoring case) or invalid.
    pub fn add_medication(
        &self,
        session: &Session,
        name: &str,
        quantity: u32,
        supplier: Option<&str>,
        low_stock_alert: u32,
    ) -> Result<()> {
        Self::require(session, Role::Administrator)?;
        let medication = Medication::new(name, quantity, supplier, low_stock_alert)?;

        let name = medication.name.clone();
        self.commit(|reg| {
            if reg.medication_mut(&medication.name).is_ok() {
                return Err(WardbookError::Conflict(format!(
                    "Medication {} already exists",
                    medication.name
                )));
            }
            reg.medications.push(medication);
            Ok(())
        })?;
        tracing::info!("Medication {} added by {}", name, session.hospital_id);
        Ok(())
    }

    /// Increase a medication's stock. Returns the new quantity.
    ///
    /// # Errors
    /// Returns error for an unknown medication or an overflowing total.
    pub fn restock(&self, session: &Session, name: &str, quantity: u32) -> Result<u32> {
        Self::require(session, Role::Administrator)?;
        let total = self.commit(|reg| add_stock(reg.medication_mut(name)?, quantity))?;
        tracing::info!("Medication {} restocked to {}", name.trim(), total);
        Ok(total)
    }

    /// # Errors
    /// Returns error for an unknown medication.
    pub fn set_low_stock_alert(&self, session: &Session, name: &str, alert: u32) -> Result<()> {
        Self::require(session, Role::Administrator)?;
        self.commit(|reg| {
            reg.medication_mut(name)?.low_stock_alert = alert;
            Ok(())
        })?;
        tracing::info!("Low stock alert for {} set to {}", name.trim(), alert);
        Ok(())
    }

    /// # Errors
    /// Returns error for an unknown medication.
    pub fn remove_medication(&self, session: &Session, name: &str) -> Result<()> {
        Self::require(session, Role::Administrator)?;
        self.commit(|reg| {
            let before = reg.medications.len();
            reg.medications
                .retain(|m| !m.name.eq_ignore_ascii_case(name.trim()));
            if reg.medications.len() == before {
                return Err(WardbookError::not_found("Medication", name.trim()));
            }
            Ok(())
        })?;
        tracing::info!("Medication {} removed by {}", name.trim(), session.hospital_id);
        Ok(())
    }

    /// Every replenishment request in submission order.
    ///
    /// # Errors
    /// Returns error unless the caller is an administrator.
    pub fn replenishment_requests(&self, session: &Session) -> Result<Vec<ReplenishmentRequest>> {
        Self::require(session, Role::Administrator)?;
        Ok(self.registry()?.requests.clone())
    }

    /// Approve or reject a pending request. Approval adds the requested
    /// quantity to stock.
    ///
    /// # Errors
    /// Returns error if the request is not pending or its medication is gone.
    pub fn resolve_replenishment(
        &self,
        session: &Session,
        request_id: u32,
        approve: bool,
    ) -> Result<()> {
        Self::require(session, Role::Administrator)?;
        let status = self.commit(|reg| {
            let request = reg
                .requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| {
                    WardbookError::not_found("Replenishment request", request_id.to_string())
                })?;
            if request.status != ReplenishmentStatus::Pending {
                return Err(WardbookError::Conflict(format!(
                    "Request {request_id} is already {}",
                    request.status
                )));
            }
            request.status = if approve {
                ReplenishmentStatus::Approved
            } else {
                ReplenishmentStatus::Rejected
            };
            let (name, quantity, status) =
                (request.medication_name.clone(), request.quantity, request.status);

            if approve {
                add_stock(reg.medication_mut(&name)?, quantity)?;
            }
            Ok(status)
        })?;
        tracing::info!("Replenishment request {} {} by {}", request_id, status, session.hospital_id);
        Ok(())
    }
}

fn add_stock(medication: &mut Medication, quantity: u32) -> Result<u32> {
    medication.quantity = medication.quantity.checked_add(quantity).ok_or_else(|| {
        WardbookError::Conflict(format!("Stock of {} would overflow", medication.name))
    })?;
    Ok(medication.quantity)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{date, fixture, Fixture};
    use super::*;
    use crate::domain::DEFAULT_PASSWORD;

    fn admin(f: &Fixture) -> Session {
        f.service
            .authenticate(Role::Administrator, "A001", "admin-pass")
            .expect("Should log in")
    }

    #[test]
    fn test_staff_filter() {
        let f = fixture();
        let a = admin(&f);
        let all: Vec<String> = f
            .service
            .staff(&a, None)
            .expect("list")
            .into_iter()
            .map(|u| u.hospital_id)
            .collect();
        assert_eq!(all, vec!["A001", "D001", "D002", "PH001"]);
        assert_eq!(f.service.staff(&a, Some(Role::Doctor)).expect("list").len(), 2);
    }

    #[test]
    fn test_add_user_rejects_duplicates() {
        let f = fixture();
        let a = admin(&f);
        assert!(f
            .service
            .add_user(&a, "d001", "Other", date(1990, 1, 1), "Male", Role::Doctor)
            .is_err());

        f.service
            .add_user(&a, "P2001", "Cara Diaz", date(1990, 2, 3), "Female", Role::Patient)
            .expect("Should add");
        let session = f
            .service
            .authenticate(Role::Patient, "P2001", DEFAULT_PASSWORD)
            .expect("Should log in");
        assert!(f.service.must_change_password(&session).expect("Should check"));
        assert!(f.service.my_medical_record(&session).is_ok());
        assert!(f
            .storage
            .records
            .lock()
            .expect("lock")
            .iter()
            .any(|r| r.patient_id == "P2001"));
    }

    #[test]
    fn test_remove_user() {
        let f = fixture();
        let a = admin(&f);
        assert!(f.service.remove_user(&a, "a001").is_err());
        assert!(f.service.remove_user(&a, "X999").is_err());

        f.service.remove_user(&a, "P1002").expect("Should remove");
        assert!(f
            .service
            .authenticate(Role::Patient, "P1002", DEFAULT_PASSWORD)
            .is_err());
        assert!(f
            .storage
            .records
            .lock()
            .expect("lock")
            .iter()
            .any(|r| r.patient_id == "P1002"));
    }

    #[test]
    fn test_inventory_management() {
        let f = fixture();
        let a = admin(&f);
        assert!(f.service.add_medication(&a, "PARACETAMOL", 5, None, 1).is_err());
        f.service
            .add_medication(&a, "Amoxicillin", 30, Some("MedSupply"), 10)
            .expect("Should add");

        assert_eq!(f.service.restock(&a, "ibuprofen", 12).expect("restock"), 20);
        assert!(f.service.restock(&a, "Ibuprofen", u32::MAX).is_err());
        f.service
            .set_low_stock_alert(&a, "Amoxicillin", 40)
            .expect("Should set");
        let meds = f.service.medications(&a).expect("list");
        assert!(meds.iter().any(|m| m.name == "Amoxicillin" && m.is_low_stock()));

        f.service
            .remove_medication(&a, "amoxicillin")
            .expect("Should remove");
        assert!(f.service.remove_medication(&a, "Amoxicillin").is_err());
        assert_eq!(f.storage.medications.lock().expect("lock").len(), 2);
    }

    #[test]
    fn test_resolve_replenishment() {
        let f = fixture();
        let a = admin(&f);
        let pharmacist = f
            .service
            .authenticate(Role::Pharmacist, "PH001", DEFAULT_PASSWORD)
            .expect("Should log in");
        let approve = f
            .service
            .submit_replenishment_request(&pharmacist, "Ibuprofen", 40)
            .expect("Should submit");
        let reject = f
            .service
            .submit_replenishment_request(&pharmacist, "Paracetamol", 10)
            .expect("Should submit");

        f.service
            .resolve_replenishment(&a, approve, true)
            .expect("Should approve");
        f.service
            .resolve_replenishment(&a, reject, false)
            .expect("Should reject");
        assert!(f.service.resolve_replenishment(&a, approve, false).is_err());
        assert!(f.service.resolve_replenishment(&a, 99, true).is_err());

        let meds = f.service.medications(&a).expect("list");
        let stock = |name: &str| meds.iter().find(|m| m.name == name).map(|m| m.quantity);
        assert_eq!(stock("Ibuprofen"), Some(48));
        assert_eq!(stock("Paracetamol"), Some(100));

        let requests = f.service.replenishment_requests(&a).expect("list");
        assert_eq!(requests[0].status, ReplenishmentStatus::Approved);
        assert_eq!(requests[1].status, ReplenishmentStatus::Rejected);
    }
}
