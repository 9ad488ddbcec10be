//! Role menus.

use crate::domain::Role;

/// One entry of a role's main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    // Patient
    ViewMyRecord,
    UpdateContact,
    ViewAvailableSlots,
    ScheduleAppointment,
    RescheduleAppointment,
    CancelAppointment,
    ViewMyAppointments,
    ViewMyOutcomes,
    // Doctor
    ViewPatientRecords,
    AddDiagnosis,
    AddTreatment,
    ViewSchedule,
    SetAvailability,
    RespondToRequests,
    ViewUpcoming,
    RecordOutcome,
    // Pharmacist
    ViewOutcomeRecords,
    LookupPatientRecord,
    UpdatePrescriptionStatus,
    ViewInventory,
    SubmitReplenishment,
    // Administrator
    ViewStaff,
    AddUser,
    RemoveUser,
    ViewAllAppointments,
    AddMedication,
    Restock,
    SetLowStockAlert,
    RemoveMedication,
    ViewReplenishments,
    ResolveReplenishment,
    // Everyone
    ViewProfile,
    ChangePassword,
    Logout,
}

const PATIENT: &[MenuAction] = &[
    MenuAction::ViewMyRecord,
    MenuAction::UpdateContact,
    MenuAction::ViewAvailableSlots,
    MenuAction::ScheduleAppointment,
    MenuAction::RescheduleAppointment,
    MenuAction::CancelAppointment,
    MenuAction::ViewMyAppointments,
    MenuAction::ViewMyOutcomes,
    MenuAction::ViewProfile,
    MenuAction::ChangePassword,
    MenuAction::Logout,
];

const DOCTOR: &[MenuAction] = &[
    MenuAction::ViewPatientRecords,
    MenuAction::AddDiagnosis,
    MenuAction::AddTreatment,
    MenuAction::ViewSchedule,
    MenuAction::SetAvailability,
    MenuAction::RespondToRequests,
    MenuAction::ViewUpcoming,
    MenuAction::RecordOutcome,
    MenuAction::ViewProfile,
    MenuAction::ChangePassword,
    MenuAction::Logout,
];

const PHARMACIST: &[MenuAction] = &[
    MenuAction::ViewOutcomeRecords,
    MenuAction::LookupPatientRecord,
    MenuAction::UpdatePrescriptionStatus,
    MenuAction::ViewInventory,
    MenuAction::SubmitReplenishment,
    MenuAction::ViewProfile,
    MenuAction::ChangePassword,
    MenuAction::Logout,
];

const ADMINISTRATOR: &[MenuAction] = &[
    MenuAction::ViewStaff,
    MenuAction::AddUser,
    MenuAction::RemoveUser,
    MenuAction::ViewAllAppointments,
    MenuAction::ViewInventory,
    MenuAction::AddMedication,
    MenuAction::Restock,
    MenuAction::SetLowStockAlert,
    MenuAction::RemoveMedication,
    MenuAction::ViewReplenishments,
    MenuAction::ResolveReplenishment,
    MenuAction::ViewProfile,
    MenuAction::ChangePassword,
    MenuAction::Logout,
];

/// Menu entries for `role`, in display order.
#[must_use]
pub fn actions(role: Role) -> &'static [MenuAction] {
    match role {
        Role::Patient => PATIENT,
        Role::Doctor => DOCTOR,
        Role::Pharmacist => PHARMACIST,
        Role::Administrator => ADMINISTRATOR,
    }
}

impl MenuAction {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ViewMyRecord => "View medical record",
            Self::UpdateContact => "Update contact information",
            Self::ViewAvailableSlots => "View available appointment slots",
            Self::ScheduleAppointment => "Schedule an appointment",
            Self::RescheduleAppointment => "Reschedule an appointment",
            Self::CancelAppointment => "Cancel an appointment",
            Self::ViewMyAppointments => "View scheduled appointments",
            Self::ViewMyOutcomes => "View past appointment outcome records",
            Self::ViewPatientRecords => "View patient medical records",
            Self::AddDiagnosis => "Add a diagnosis to a patient record",
            Self::AddTreatment => "Add a treatment to a patient record",
            Self::ViewSchedule => "View personal schedule",
            Self::SetAvailability => "Set availability for appointments",
            Self::RespondToRequests => "Accept or decline appointment requests",
            Self::ViewUpcoming => "View upcoming appointments",
            Self::RecordOutcome => "Record appointment outcome",
            Self::ViewOutcomeRecords => "View appointment outcome records",
            Self::LookupPatientRecord => "View a patient medical record",
            Self::UpdatePrescriptionStatus => "Update prescription status",
            Self::ViewInventory => "View medication inventory",
            Self::SubmitReplenishment => "Submit replenishment request",
            Self::ViewStaff => "View hospital staff",
            Self::AddUser => "Add a user",
            Self::RemoveUser => "Remove a user",
            Self::ViewAllAppointments => "View appointment details",
            Self::AddMedication => "Add a medication",
            Self::Restock => "Restock a medication",
            Self::SetLowStockAlert => "Set low stock alert",
            Self::RemoveMedication => "Remove a medication",
            Self::ViewReplenishments => "View replenishment requests",
            Self::ResolveReplenishment => "Approve or reject replenishment requests",
            Self::ViewProfile => "View profile",
            Self::ChangePassword => "Change password",
            Self::Logout => "Logout",
        }
    }
}
