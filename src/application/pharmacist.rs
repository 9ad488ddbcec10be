use super::{HospitalService, Session};
use crate::adapters::StorageError;
use crate::domain::{
    Appointment, AppointmentStatus, Medication, PrescriptionStatus, ReplenishmentRequest,
    ReplenishmentStatus, Role,
};
use crate::ports::{Notifier, Recipient, Storage};
use crate::{Result, WardbookError};

impl<S, N> HospitalService<S, N>
where
    S: Storage,
    S::Error: Into<StorageError>,
    N: Notifier,
{
    /// Every completed appointment with an outcome, oldest first.
    ///
    /// # Errors
    /// Returns error unless the caller is a pharmacist.
    pub fn outcome_records(&self, session: &Session) -> Result<Vec<Appointment>> {
        Self::require(session, Role::Pharmacist)?;
        let reg = self.registry()?;
        let mut list: Vec<Appointment> = reg
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed && a.outcome.is_some())
            .cloned()
            .collect();
        list.sort_by_key(|a| a.slot.start);
        Ok(list)
    }

    /// Set the status of one prescription in a patient's record.
    ///
    /// An appointment whose outcome is the same treatment is updated too.
    ///
    /// # Errors
    /// Returns error if either index is out of range.
    pub fn update_prescription_status(
        &self,
        session: &Session,
        patient_id: &str,
        treatment_index: usize,
        prescription_index: usize,
        status: PrescriptionStatus,
    ) -> Result<()> {
        Self::require(session, Role::Pharmacist)?;
        let medication = self.commit(|reg| {
            let record = reg.record_mut(patient_id)?;
            let before = record.treatments.get(treatment_index).cloned().ok_or_else(|| {
                WardbookError::not_found("Treatment", (treatment_index + 1).to_string())
            })?;
            let prescription = record
                .prescription_mut(treatment_index, prescription_index)
                .ok_or_else(|| {
                    WardbookError::not_found("Prescription", (prescription_index + 1).to_string())
                })?;
            prescription.status = status;
            let medication = prescription.medication_name.clone();
            let after = record.treatments[treatment_index].clone();

            if let Some(appointment) = reg
                .appointments
                .iter_mut()
                .filter(|a| a.patient_id.eq_ignore_ascii_case(patient_id))
                .find(|a| a.outcome.as_ref() == Some(&before))
            {
                appointment.outcome = Some(after);
            }
            Ok(medication)
        })?;
        tracing::info!(
            "Prescription {} for {} set to {} by {}",
            medication,
            patient_id,
            status,
            session.hospital_id
        );
        Ok(())
    }

    /// The medication inventory.
    ///
    /// # Errors
    /// Returns error unless the caller is a pharmacist or administrator.
    pub fn medications(&self, session: &Session) -> Result<Vec<Medication>> {
        if !matches!(session.role, Role::Pharmacist | Role::Administrator) {
            return Err(WardbookError::Unauthorized {
                required: Role::Pharmacist,
            });
        }
        Ok(self.registry()?.medications.clone())
    }

    /// Ask the administrator for more stock. Returns the request ID.
    ///
    /// # Errors
    /// Returns error if the medication is unknown or `quantity` is zero.
    pub fn submit_replenishment_request(
        &self,
        session: &Session,
        medication_name: &str,
        quantity: u32,
    ) -> Result<u32> {
        Self::require(session, Role::Pharmacist)?;
        if quantity == 0 {
            return Err(WardbookError::Conflict("Quantity must be positive".into()));
        }

        let today = self.today();
        let (id, message) = self.commit(|reg| {
            let name = reg.medication_mut(medication_name)?.name.clone();
            let id = reg.requests.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            let request = ReplenishmentRequest {
                id,
                medication_name: name,
                quantity,
                requested_by: format!("Pharmacist: {}", session.hospital_id),
                request_date: today,
                status: ReplenishmentStatus::Pending,
            };
            let message = request.to_string();
            reg.requests.push(request);
            Ok((id, message))
        })?;

        tracing::info!("Replenishment request {} submitted by {}", id, session.hospital_id);
        self.notify(Recipient::Administrator, &message);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{at, date, fixture, slot, Fixture};
    use super::*;
    use crate::domain::{Prescription, DEFAULT_PASSWORD};

    fn login(f: &Fixture, role: Role, id: &str) -> Session {
        f.service
            .authenticate(role, id, DEFAULT_PASSWORD)
            .expect("Should log in")
    }

    /// A completed D001 appointment for P1001 prescribing two medications.
    fn completed(f: &Fixture) -> u32 {
        let doctor = login(f, Role::Doctor, "D001");
        let patient = login(f, Role::Patient, "P1001");
        let day = date(2030, 1, 7);
        f.service
            .set_availability(&doctor, day, &[(at(9, 0), at(10, 0))])
            .expect("Should set availability");
        let id = f
            .service
            .request_appointment(&patient, "D001", slot(day, 9, 0))
            .expect("Should request");
        f.service
            .respond_to_request(&doctor, id, true)
            .expect("Should accept");
        f.clock.set(day.and_time(at(9, 30)));
        f.service
            .record_outcome(
                &doctor,
                id,
                "Consultation",
                Prescription::parse_list("Paracetamol, Ibuprofen").expect("valid"),
                "Fever",
            )
            .expect("Should record");
        id
    }

    #[test]
    fn test_prescription_update_reaches_outcome() {
        let f = fixture();
        completed(&f);
        let pharmacist = login(&f, Role::Pharmacist, "PH001");
        assert_eq!(f.service.outcome_records(&pharmacist).expect("list").len(), 1);

        f.service
            .update_prescription_status(&pharmacist, "P1001", 0, 1, PrescriptionStatus::Dispensed)
            .expect("Should update");
        assert!(f
            .service
            .update_prescription_status(&pharmacist, "P1001", 0, 5, PrescriptionStatus::Dispensed)
            .is_err());
        assert!(f
            .service
            .update_prescription_status(&pharmacist, "P1001", 3, 0, PrescriptionStatus::Dispensed)
            .is_err());

        let record = f.service.patient_record(&pharmacist, "P1001").expect("record");
        assert_eq!(
            record.treatments[0].prescriptions[1].status,
            PrescriptionStatus::Dispensed
        );
        let outcomes = f.service.outcome_records(&pharmacist).expect("list");
        let outcome = outcomes[0].outcome.as_ref().expect("outcome");
        assert_eq!(outcome.prescriptions[1].status, PrescriptionStatus::Dispensed);
        assert_eq!(outcome.prescriptions[0].status, PrescriptionStatus::Pending);
    }

    #[test]
    fn test_replenishment_request() {
        let f = fixture();
        let pharmacist = login(&f, Role::Pharmacist, "PH001");
        assert!(f
            .service
            .submit_replenishment_request(&pharmacist, "Aspirin", 10)
            .is_err());
        assert!(f
            .service
            .submit_replenishment_request(&pharmacist, "Ibuprofen", 0)
            .is_err());

        let id = f
            .service
            .submit_replenishment_request(&pharmacist, "ibuprofen", 50)
            .expect("Should submit");
        assert_eq!(id, 1);

        let stored = f.storage.requests.lock().expect("lock").clone();
        assert_eq!(stored[0].medication_name, "Ibuprofen");
        assert_eq!(stored[0].requested_by, "Pharmacist: PH001");
        assert_eq!(stored[0].request_date, date(2030, 1, 7));
        assert_eq!(stored[0].status, ReplenishmentStatus::Pending);

        let sent = f.notifier.messages_to(Recipient::Administrator);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Ibuprofen x50"));
    }

    #[test]
    fn test_inventory_visible_to_admin_not_patient() {
        let f = fixture();
        let pharmacist = login(&f, Role::Pharmacist, "PH001");
        assert_eq!(f.service.medications(&pharmacist).expect("list").len(), 2);

        let admin = f
            .service
            .authenticate(Role::Administrator, "A001", "admin-pass")
            .expect("Should log in");
        assert!(f.service.medications(&admin).is_ok());

        let patient = login(&f, Role::Patient, "P1001");
        assert!(f.service.medications(&patient).is_err());
    }
}
