use chrono::{NaiveDate, NaiveTime};

use super::hospital::Registry;
use super::{HospitalService, Session};
use crate::adapters::StorageError;
use crate::domain::{
    split_into_slots, Appointment, AppointmentStatus, Diagnosis, MedicalRecord, Prescription,
    Role, Schedule, Treatment, ValidationError,
};
use crate::ports::{Notifier, Recipient, Storage};
use crate::{Result, WardbookError};

impl<S, N> HospitalService<S, N>
where
    S: Storage,
    S::Error: Into<StorageError>,
    N: Notifier,
{
    /// IDs of patients with a live or completed appointment with the caller.
    ///
    /// # Errors
    /// Returns error unless the caller is a doctor.
    pub fn patients_under_care(&self, session: &Session) -> Result<Vec<String>> {
        Self::require(session, Role::Doctor)?;
        Ok(self.registry()?.patients_of(&session.hospital_id))
    }

    /// Read a patient's record.
    ///
    /// Doctors may read records of patients under their care; pharmacists
    /// may read any record.
    ///
    /// # Errors
    /// Returns error for other roles, or a patient outside the doctor's care.
    pub fn patient_record(&self, session: &Session, patient_id: &str) -> Result<MedicalRecord> {
        let reg = self.registry()?;
        match session.role {
            Role::Pharmacist => {}
            Role::Doctor => ensure_under_care(&reg, session, patient_id)?,
            _ => return Err(WardbookError::Unauthorized { required: Role::Doctor }),
        }
        reg.record(patient_id).cloned()
    }

    /// Append a treatment to the record of a patient under the caller's care.
    ///
    /// # Errors
    /// Returns error if the patient is not under the caller's care.
    pub fn add_treatment(
        &self,
        session: &Session,
        patient_id: &str,
        mut treatment: Treatment,
    ) -> Result<()> {
        Self::require(session, Role::Doctor)?;
        treatment.doctor_id = Some(session.hospital_id.clone());
        self.commit(|reg| {
            ensure_under_care(reg, session, patient_id)?;
            reg.record_mut(patient_id)?.add_treatment(treatment);
            Ok(())
        })?;
        tracing::info!("Treatment added to {} by {}", patient_id, session.hospital_id);
        Ok(())
    }

    /// Append a diagnosis to the record of a patient under the caller's care.
    ///
    /// # Errors
    /// Returns error if the patient is not under the caller's care.
    pub fn add_diagnosis(
        &self,
        session: &Session,
        patient_id: &str,
        diagnosis: Diagnosis,
    ) -> Result<()> {
        Self::require(session, Role::Doctor)?;
        self.commit(|reg| {
            ensure_under_care(reg, session, patient_id)?;
            reg.record_mut(patient_id)?.add_diagnosis(diagnosis);
            Ok(())
        })?;
        tracing::info!("Diagnosis added to {} by {}", patient_id, session.hospital_id);
        Ok(())
    }

    /// The caller's availability.
    ///
    /// # Errors
    /// Returns error unless the caller is a doctor.
    pub fn my_schedule(&self, session: &Session) -> Result<Schedule> {
        Self::require(session, Role::Doctor)?;
        Ok(self
            .registry()?
            .schedules
            .get(&session.hospital_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Replace the caller's availability on `date` with `ranges`, cut into
    /// 30-minute slots. An empty list clears the date.
    ///
    /// # Errors
    /// Returns error if `date` is in the past or a range is empty or inverted.
    pub fn set_availability(
        &self,
        session: &Session,
        date: NaiveDate,
        ranges: &[(NaiveTime, NaiveTime)],
    ) -> Result<()> {
        Self::require(session, Role::Doctor)?;
        if date < self.today() {
            return Err(ValidationError::Invalid {
                field: "availability date",
                reason: "must not be in the past".to_string(),
            }
            .into());
        }

        let mut slots = Vec::new();
        for &(from, to) in ranges {
            if to <= from {
                return Err(ValidationError::Invalid {
                    field: "availability range",
                    reason: format!(
                        "{} - {}: end time must be after start time",
                        from.format("%H:%M"),
                        to.format("%H:%M")
                    ),
                }
                .into());
            }
            slots.extend(split_into_slots(date, from, to));
        }

        let count = self.commit(|reg| {
            let schedule = reg.schedules.entry(session.hospital_id.clone()).or_default();
            schedule.set_availability(date, slots);
            let count = schedule.slots_on(date).len();
            if schedule.is_empty() {
                reg.schedules.remove(&session.hospital_id);
            }
            Ok(count)
        })?;
        tracing::info!(
            "{} set {} slots on {}",
            session.hospital_id,
            count,
            date.format("%Y-%m-%d")
        );
        Ok(())
    }

    /// Requests awaiting the caller's answer, soonest first.
    ///
    /// # Errors
    /// Returns error unless the caller is a doctor.
    pub fn pending_requests(&self, session: &Session) -> Result<Vec<Appointment>> {
        self.doctor_appointments(session, |a| a.status == AppointmentStatus::Requested)
    }

    /// Accept or decline a pending request.
    ///
    /// # Errors
    /// Returns error if the appointment is not the caller's or not pending.
    pub fn respond_to_request(
        &self,
        session: &Session,
        appointment_id: u32,
        accept: bool,
    ) -> Result<()> {
        Self::require(session, Role::Doctor)?;
        let status = self.commit(|reg| {
            let appointment = reg.appointment_mut(appointment_id)?;
            if !appointment.doctor_id.eq_ignore_ascii_case(&session.hospital_id) {
                return Err(WardbookError::not_found("Appointment", appointment_id.to_string()));
            }
            if appointment.status != AppointmentStatus::Requested {
                return Err(WardbookError::Conflict(format!(
                    "Appointment {appointment_id} is {}, not Requested",
                    appointment.status
                )));
            }
            appointment.status = if accept {
                AppointmentStatus::Confirmed
            } else {
                AppointmentStatus::Declined
            };
            Ok(appointment.status)
        })?;
        tracing::info!("Appointment {} {} by {}", appointment_id, status, session.hospital_id);
        Ok(())
    }

    /// Confirmed appointments that have not started yet, soonest first.
    ///
    /// # Errors
    /// Returns error unless the caller is a doctor.
    pub fn upcoming_appointments(&self, session: &Session) -> Result<Vec<Appointment>> {
        let now = self.now();
        self.doctor_appointments(session, |a| {
            a.status == AppointmentStatus::Confirmed && a.slot.start > now
        })
    }

    /// Confirmed appointments that have started and still need an outcome.
    ///
    /// # Errors
    /// Returns error unless the caller is a doctor.
    pub fn outcome_candidates(&self, session: &Session) -> Result<Vec<Appointment>> {
        let now = self.now();
        self.doctor_appointments(session, |a| {
            a.status == AppointmentStatus::Confirmed && a.slot.start <= now
        })
    }

    /// Record what happened at an appointment.
    ///
    /// The treatment is appended to the patient's record and kept as the
    /// appointment outcome. The pharmacy is notified of pending prescriptions.
    ///
    /// # Errors
    /// Returns error if the appointment is not an outcome candidate or the
    /// treatment is invalid.
    pub fn record_outcome(
        &self,
        session: &Session,
        appointment_id: u32,
        service_type: &str,
        prescriptions: Vec<Prescription>,
        notes: &str,
    ) -> Result<()> {
        Self::require(session, Role::Doctor)?;
        let now = self.now();
        let (patient_id, pending) = self.commit(|reg| {
            let appointment = reg
                .appointments
                .iter()
                .find(|a| a.id == appointment_id)
                .filter(|a| a.doctor_id.eq_ignore_ascii_case(&session.hospital_id))
                .ok_or_else(|| {
                    WardbookError::not_found("Appointment", appointment_id.to_string())
                })?;
            if appointment.status != AppointmentStatus::Confirmed || appointment.slot.start > now {
                return Err(WardbookError::Conflict(format!(
                    "Appointment {appointment_id} is not awaiting an outcome"
                )));
            }
            let patient_id = appointment.patient_id.clone();

            let mut treatment =
                Treatment::new(service_type, appointment.date(), prescriptions, notes)?;
            treatment.doctor_id = Some(session.hospital_id.clone());
            let pending = treatment.has_pending_prescriptions();

            reg.record_mut(&patient_id)?.add_treatment(treatment.clone());
            let appointment = reg.appointment_mut(appointment_id)?;
            appointment.status = AppointmentStatus::Completed;
            appointment.outcome = Some(treatment);
            Ok((patient_id, pending))
        })?;

        tracing::info!("Outcome recorded for appointment {}", appointment_id);
        if pending {
            self.notify(
                Recipient::Pharmacist,
                &format!(
                    "Appointment {appointment_id} for {patient_id} has prescriptions to dispense"
                ),
            );
        }
        Ok(())
    }

    fn doctor_appointments<F>(&self, session: &Session, keep: F) -> Result<Vec<Appointment>>
    where
        F: Fn(&Appointment) -> bool,
    {
        Self::require(session, Role::Doctor)?;
        let reg = self.registry()?;
        let mut list: Vec<Appointment> = reg
            .appointments
            .iter()
            .filter(|a| a.doctor_id.eq_ignore_ascii_case(&session.hospital_id) && keep(a))
            .cloned()
            .collect();
        list.sort_by_key(|a| a.slot.start);
        Ok(list)
    }
}

fn ensure_under_care(reg: &Registry, session: &Session, patient_id: &str) -> Result<()> {
    let under_care = reg
        .patients_of(&session.hospital_id)
        .iter()
        .any(|p| p.eq_ignore_ascii_case(patient_id.trim()));
    if under_care {
        Ok(())
    } else {
        Err(WardbookError::Conflict(format!(
            "Patient {} is not under the care of {}",
            patient_id.trim(),
            session.hospital_id
        )))
    }
}
