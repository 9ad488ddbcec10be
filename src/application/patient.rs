use chrono::NaiveDate;

use super::{HospitalService, Session};
use crate::adapters::StorageError;
use crate::domain::{
    Appointment, AppointmentStatus, ContactInformation, MedicalRecord, Role, TimeSlot, User,
};
use crate::ports::{Notifier, Recipient, Storage};
use crate::{Result, WardbookError};

impl<S, N> HospitalService<S, N>
where
    S: Storage,
    S::Error: Into<StorageError>,
    N: Notifier,
{
    /// The caller's own medical record.
    ///
    /// # Errors
    /// Returns error unless the caller is a patient with a record.
    pub fn my_medical_record(&self, session: &Session) -> Result<MedicalRecord> {
        Self::require(session, Role::Patient)?;
        self.registry()?.record(&session.hospital_id).cloned()
    }

    /// Replace the caller's phone number and email address.
    ///
    /// # Errors
    /// Returns error if either value is malformed.
    pub fn update_contact_information(
        &self,
        session: &Session,
        phone_number: &str,
        email_address: &str,
    ) -> Result<()> {
        Self::require(session, Role::Patient)?;
        let contact = ContactInformation::new(phone_number, email_address)?;

        self.commit(|reg| {
            reg.record_mut(&session.hospital_id)?.contact = contact;
            Ok(())
        })?;
        tracing::info!("Contact information updated for {}", session.hospital_id);
        Ok(())
    }

    /// Every doctor, in ID order.
    ///
    /// # Errors
    /// Returns error if the registry is unavailable.
    pub fn list_doctors(&self) -> Result<Vec<User>> {
        let reg = self.registry()?;
        let mut doctors: Vec<User> = reg
            .users
            .iter()
            .filter(|u| u.role == Role::Doctor)
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.hospital_id.cmp(&b.hospital_id));
        Ok(doctors)
    }

    /// Bookable slots of `doctor_id` on `date`.
    ///
    /// # Errors
    /// Returns error if `doctor_id` is not a doctor.
    pub fn available_slots(&self, doctor_id: &str, date: NaiveDate) -> Result<Vec<TimeSlot>> {
        let reg = self.registry()?;
        let doctor = reg.doctor(doctor_id)?;
        Ok(reg.free_slots(&doctor.hospital_id, date, self.now()))
    }

    /// Request `slot` with `doctor_id`. Returns the new appointment ID.
    ///
    /// # Errors
    /// Returns [`WardbookError::Conflict`] if the slot is not available.
    pub fn request_appointment(
        &self,
        session: &Session,
        doctor_id: &str,
        slot: TimeSlot,
    ) -> Result<u32> {
        Self::require(session, Role::Patient)?;
        let now = self.now();
        let (id, doctor_id) = self.commit(|reg| {
            let doctor_id = reg.doctor(doctor_id)?.hospital_id.clone();
            if !reg.free_slots(&doctor_id, slot.date(), now).contains(&slot) {
                return Err(WardbookError::Conflict(format!(
                    "Slot {slot} is not available with {doctor_id}"
                )));
            }

            let id = reg.next_appointment_id();
            reg.appointments
                .push(Appointment::request(id, &session.hospital_id, &doctor_id, slot));
            Ok((id, doctor_id))
        })?;

        tracing::info!("Appointment {} requested by {} with {}", id, session.hospital_id, doctor_id);
        self.notify(
            Recipient::Doctor,
            &format!(
                "New appointment request {id} from {} for {doctor_id} at {slot}",
                session.hospital_id
            ),
        );
        Ok(id)
    }

    /// Move one of the caller's open appointments to `new_slot` with the
    /// same doctor. The appointment goes back to `Requested`.
    ///
    /// # Errors
    /// Returns error if the appointment is not the caller's, is closed, or
    /// the new slot is not available.
    pub fn reschedule_appointment(
        &self,
        session: &Session,
        appointment_id: u32,
        new_slot: TimeSlot,
    ) -> Result<()> {
        Self::require(session, Role::Patient)?;
        let now = self.now();
        let doctor_id = self.commit(|reg| {
            let doctor_id = own_open(reg.appointment_mut(appointment_id)?, session)?
                .doctor_id
                .clone();
            if !reg
                .free_slots(&doctor_id, new_slot.date(), now)
                .contains(&new_slot)
            {
                return Err(WardbookError::Conflict(format!(
                    "Slot {new_slot} is not available with {doctor_id}"
                )));
            }

            let appointment = reg.appointment_mut(appointment_id)?;
            appointment.slot = new_slot;
            appointment.status = AppointmentStatus::Requested;
            Ok(doctor_id)
        })?;

        tracing::info!("Appointment {} rescheduled to {}", appointment_id, new_slot);
        self.notify(
            Recipient::Doctor,
            &format!("Appointment {appointment_id} for {doctor_id} moved to {new_slot}"),
        );
        Ok(())
    }

    /// Cancel one of the caller's open appointments, freeing its slot.
    ///
    /// # Errors
    /// Returns error if the appointment is not the caller's or is closed.
    pub fn cancel_appointment(&self, session: &Session, appointment_id: u32) -> Result<()> {
        Self::require(session, Role::Patient)?;
        self.commit(|reg| {
            own_open(reg.appointment_mut(appointment_id)?, session)?.status =
                AppointmentStatus::Cancelled;
            Ok(())
        })?;
        tracing::info!("Appointment {} cancelled by {}", appointment_id, session.hospital_id);
        Ok(())
    }

    /// All of the caller's appointments, oldest first.
    ///
    /// # Errors
    /// Returns error unless the caller is a patient.
    pub fn my_appointments(&self, session: &Session) -> Result<Vec<Appointment>> {
        Self::require(session, Role::Patient)?;
        let reg = self.registry()?;
        let mut mine: Vec<Appointment> = reg
            .appointments
            .iter()
            .filter(|a| a.patient_id.eq_ignore_ascii_case(&session.hospital_id))
            .cloned()
            .collect();
        mine.sort_by_key(|a| a.slot.start);
        Ok(mine)
    }

    /// The caller's completed appointments that carry an outcome.
    ///
    /// # Errors
    /// Returns error unless the caller is a patient.
    pub fn my_outcome_records(&self, session: &Session) -> Result<Vec<Appointment>> {
        Ok(self
            .my_appointments(session)?
            .into_iter()
            .filter(|a| a.status == AppointmentStatus::Completed && a.outcome.is_some())
            .collect())
    }
}

fn own_open<'a>(appointment: &'a mut Appointment, session: &Session) -> Result<&'a mut Appointment> {
    if !appointment.patient_id.eq_ignore_ascii_case(&session.hospital_id) {
        return Err(WardbookError::not_found("Appointment", appointment.id.to_string()));
    }
    if !appointment.status.is_open() {
        return Err(WardbookError::Conflict(format!(
            "Appointment {} is {} and can no longer be changed",
            appointment.id, appointment.status
        )));
    }
    Ok(appointment)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{at, date, fixture, slot, Fixture};
    use super::*;
    use crate::domain::DEFAULT_PASSWORD;

    fn login(f: &Fixture, role: Role, id: &str) -> Session {
        f.service
            .authenticate(role, id, DEFAULT_PASSWORD)
            .expect("Should log in")
    }

    fn open_morning(f: &Fixture, doctor: &str) {
        let session = login(f, Role::Doctor, doctor);
        f.service
            .set_availability(&session, date(2030, 1, 7), &[(at(9, 0), at(11, 0))])
            .expect("Should set availability");
    }

    #[test]
    fn test_contact_update_is_validated_and_persisted() {
        let f = fixture();
        let patient = login(&f, Role::Patient, "P1001");
        assert!(f
            .service
            .update_contact_information(&patient, "9123 4567", "not-an-email")
            .is_err());

        f.service
            .update_contact_information(&patient, "+65 9123-4567", "alice@example.com")
            .expect("Should update");
        let record = f.service.my_medical_record(&patient).expect("record");
        assert_eq!(record.contact.email_address, "alice@example.com");

        let stored = f.storage.records.lock().expect("lock").clone();
        assert!(stored
            .iter()
            .any(|r| r.patient_id == "P1001" && r.contact.phone_number == "+65 9123-4567"));
    }

    #[test]
    fn test_request_holds_the_slot() {
        let f = fixture();
        open_morning(&f, "D001");
        let day = date(2030, 1, 7);
        assert_eq!(f.service.available_slots("D001", day).expect("slots").len(), 4);

        let alice = login(&f, Role::Patient, "P1001");
        let id = f
            .service
            .request_appointment(&alice, "d001", slot(day, 9, 30))
            .expect("Should request");
        assert_eq!(id, 1);

        let free = f.service.available_slots("D001", day).expect("slots");
        assert_eq!(free.len(), 3);
        assert!(!free.contains(&slot(day, 9, 30)));

        let bob = login(&f, Role::Patient, "P1002");
        let err = f
            .service
            .request_appointment(&bob, "D001", slot(day, 9, 30))
            .expect_err("Slot is taken");
        assert!(matches!(err, WardbookError::Conflict(_)));

        assert_eq!(f.notifier.messages_to(Recipient::Doctor).len(), 1);
    }

    #[test]
    fn test_started_slots_are_not_offered() {
        let f = fixture();
        open_morning(&f, "D001");
        f.clock.set(date(2030, 1, 7).and_time(at(9, 45)));
        let free = f
            .service
            .available_slots("D001", date(2030, 1, 7))
            .expect("slots");
        assert_eq!(free, vec![slot(date(2030, 1, 7), 10, 0), slot(date(2030, 1, 7), 10, 30)]);
    }

    #[test]
    fn test_unknown_doctor_and_wrong_role() {
        let f = fixture();
        assert!(f.service.available_slots("PH001", date(2030, 1, 7)).is_err());

        let doctor = login(&f, Role::Doctor, "D001");
        let err = f
            .service
            .request_appointment(&doctor, "D002", slot(date(2030, 1, 7), 9, 0))
            .expect_err("Doctors cannot book");
        assert!(matches!(err, WardbookError::Unauthorized { required: Role::Patient }));
    }

    #[test]
    fn test_reschedule_and_cancel() {
        let f = fixture();
        open_morning(&f, "D001");
        let day = date(2030, 1, 7);
        let alice = login(&f, Role::Patient, "P1001");
        let bob = login(&f, Role::Patient, "P1002");
        let id = f
            .service
            .request_appointment(&alice, "D001", slot(day, 9, 0))
            .expect("Should request");

        assert!(f.service.cancel_appointment(&bob, id).is_err());
        assert!(f
            .service
            .reschedule_appointment(&alice, id, slot(day, 9, 0))
            .is_err());

        f.service
            .reschedule_appointment(&alice, id, slot(day, 10, 30))
            .expect("Should reschedule");
        let free = f.service.available_slots("D001", day).expect("slots");
        assert!(free.contains(&slot(day, 9, 0)));
        assert!(!free.contains(&slot(day, 10, 30)));

        f.service.cancel_appointment(&alice, id).expect("Should cancel");
        let mine = f.service.my_appointments(&alice).expect("list");
        assert_eq!(mine[0].status, AppointmentStatus::Cancelled);
        assert_eq!(f.service.available_slots("D001", day).expect("slots").len(), 4);
        assert!(f.service.cancel_appointment(&alice, id).is_err());
    }

    #[test]
    fn test_list_doctors_sorted() {
        let f = fixture();
        let ids: Vec<String> = f
            .service
            .list_doctors()
            .expect("list")
            .into_iter()
            .map(|d| d.hospital_id)
            .collect();
        assert_eq!(ids, vec!["D001", "D002"]);
    }

    #[test]
    fn test_failed_save_leaves_no_appointment_behind() {
        let f = fixture();
        open_morning(&f, "D001");
        let alice = login(&f, Role::Patient, "P1001");
        let day = date(2030, 1, 7);

        f.storage.fail_saves("appointments");
        assert!(matches!(
            f.service.request_appointment(&alice, "D001", slot(day, 9, 0)),
            Err(WardbookError::Storage(_))
        ));
        assert!(f.service.my_appointments(&alice).expect("list").is_empty());
        assert!(f
            .service
            .available_slots("D001", day)
            .expect("slots")
            .contains(&slot(day, 9, 0)));
        assert!(f.notifier.messages_to(Recipient::Doctor).is_empty());

        f.storage.heal();
        f.service.save_all().expect("Should save");
        assert!(f.storage.appointments.lock().expect("lock").is_empty());
        let id = f
            .service
            .request_appointment(&alice, "D001", slot(day, 9, 0))
            .expect("Should request");
        assert_eq!(id, 1);
    }
}
