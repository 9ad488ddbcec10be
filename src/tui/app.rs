//! Main TUI application state machine.
//!
//! Handles:
//! - Login and forced password change
//! - Role menus and the multi-step flows behind each entry
//! - Service integration and status reporting

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use zeroize::Zeroize;

use crate::adapters::StorageError;
use crate::application::{HospitalService, Session};
use crate::domain::{
    AppointmentStatus, Diagnosis, Prescription, PrescriptionStatus, ReplenishmentStatus, Role,
    TimeSlot, Treatment,
};
use crate::ports::{Notifier, Storage};
use crate::WardbookError;

use super::display;
use super::input::{optional, parse_date, parse_ranges, parse_role, parse_u32, DATE_FORMAT};
use super::menu::{self, MenuAction};
use super::ui::{
    form::{render_form, FormField, FormState},
    login::{render_login, LoginFocus, LoginState},
    menu::render_menu,
    pick::{render_pick, PickState},
    render_header, render_status,
    view::{render_view, ViewState},
    Status,
};

/// Current screen/view in the application
#[derive(Debug, Clone)]
enum Screen {
    Login,
    ChangePassword { forced: bool },
    Menu,
    Form(FormStep),
    Pick(PickStep),
    View,
}

/// What a submitted form does.
#[derive(Debug, Clone)]
enum FormStep {
    UpdateContact,
    SlotDate { doctor_id: String, book: bool },
    RescheduleDate { appointment_id: u32, doctor_id: String },
    AddDiagnosis { patient_id: String },
    AddTreatment { patient_id: String },
    SetAvailability,
    RecordOutcome { appointment_id: u32 },
    PrescriptionPatient,
    PatientLookup,
    Replenish,
    AddUser,
    RemoveUser,
    AddMedication,
    Restock,
    SetLowStockAlert,
    RemoveMedication,
}

#[derive(Debug, Clone, Copy)]
enum PatientUse {
    ViewRecord,
    Diagnosis,
    Treatment,
}

/// What picking a list entry does.
#[derive(Debug, Clone)]
enum PickStep {
    Doctor { ids: Vec<String>, book: bool },
    BookSlot { doctor_id: String, slots: Vec<TimeSlot> },
    RescheduleWhich { appointments: Vec<(u32, String)> },
    RescheduleSlot { appointment_id: u32, slots: Vec<TimeSlot> },
    CancelWhich { ids: Vec<u32> },
    Patient { ids: Vec<String>, then: PatientUse },
    RespondWhich { ids: Vec<u32> },
    RespondDecision { appointment_id: u32 },
    OutcomeWhich { ids: Vec<u32> },
    Prescription { patient_id: String, positions: Vec<(usize, usize)> },
    PrescriptionStatus { patient_id: String, treatment: usize, prescription: usize },
    StaffFilter,
    ResolveWhich { ids: Vec<u32> },
    ResolveDecision { request_id: u32 },
}

const PRESCRIPTION_STATES: [PrescriptionStatus; 3] = [
    PrescriptionStatus::Pending,
    PrescriptionStatus::Dispensed,
    PrescriptionStatus::Cancelled,
];

const STAFF_FILTERS: [(&str, Option<Role>); 4] = [
    ("All staff", None),
    ("Doctors", Some(Role::Doctor)),
    ("Pharmacists", Some(Role::Pharmacist)),
    ("Administrators", Some(Role::Administrator)),
];

type Flow = std::result::Result<(), String>;

fn msg(e: WardbookError) -> String {
    e.to_string()
}

fn pick_at<T: Clone>(items: &[T], index: usize) -> std::result::Result<T, String> {
    items
        .get(index)
        .cloned()
        .ok_or_else(|| "Nothing selected".to_string())
}

/// Main application state
pub struct App<S, N>
where
    S: Storage,
    N: Notifier,
{
    service: HospitalService<S, N>,
    screen: Screen,
    should_quit: bool,
    session: Option<Session>,
    login: LoginState,
    menu_selected: usize,
    form: FormState,
    pick: PickState,
    view: ViewState,
    status: Option<Status>,
}

impl<S, N> App<S, N>
where
    S: Storage,
    S::Error: Into<StorageError>,
    N: Notifier,
{
    /// Create the application around a loaded service.
    #[must_use]
    pub fn new(service: HospitalService<S, N>) -> Self {
        Self {
            service,
            screen: Screen::Login,
            should_quit: false,
            session: None,
            login: LoginState::default(),
            menu_selected: 0,
            form: FormState::new("", Vec::new()),
            pick: PickState::new("", Vec::new()),
            view: ViewState::new("", Vec::new(), ""),
            status: None,
        }
    }

    /// Run the main application loop.
    ///
    /// # Errors
    /// Returns error if terminal operations fail.
    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        if let Err(e) = self.service.save_all() {
            tracing::error!("Final save failed: {}", e);
        }
        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }
        Ok(())
    }

    fn draw(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(f.area());

        let who = self
            .session
            .as_ref()
            .map(|s| format!("{} ({}) · {}", s.name, s.hospital_id, s.role));
        render_header(f, chunks[0], who.as_deref());

        match &self.screen {
            Screen::Login => render_login(f, chunks[1], &self.login),
            Screen::Menu => {
                if let Some(session) = &self.session {
                    render_menu(
                        f,
                        chunks[1],
                        &session.role.to_string(),
                        menu::actions(session.role),
                        self.menu_selected,
                    );
                }
            }
            Screen::ChangePassword { .. } | Screen::Form(_) => render_form(f, chunks[1], &self.form),
            Screen::Pick(_) => render_pick(f, chunks[1], &self.pick),
            Screen::View => render_view(f, chunks[1], &self.view),
        }

        render_status(f, chunks[2], self.status.as_ref());
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('q') {
            self.should_quit = true;
            return;
        }
        if ctrl && key.code == KeyCode::Char('s') {
            if self.session.is_some() {
                self.status = Some(match self.service.save_all() {
                    Ok(()) => Status::Success("All records saved".into()),
                    Err(e) => Status::Error(e.to_string()),
                });
            }
            return;
        }

        match self.screen {
            Screen::Login => self.handle_login_key(key.code),
            Screen::ChangePassword { forced } => self.handle_password_key(key.code, forced),
            Screen::Menu => self.handle_menu_key(key.code),
            Screen::Form(_) => self.handle_form_key(key.code),
            Screen::Pick(_) => self.handle_pick_key(key.code),
            Screen::View => self.handle_view_key(key.code),
        }
    }

    // === Login ===

    fn handle_login_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Left => self.login.prev_role(),
            KeyCode::Right => self.login.next_role(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.toggle_focus();
            }
            KeyCode::Backspace => self.login.delete_char(),
            KeyCode::Enter => {
                if self.login.focus == LoginFocus::HospitalId {
                    self.login.toggle_focus();
                } else {
                    self.submit_login();
                }
            }
            KeyCode::Char(c) => self.login.input_char(c),
            _ => {}
        }
    }

    fn submit_login(&mut self) {
        let role = self.login.role();
        let hospital_id = self.login.hospital_id.trim().to_string();
        let result = self
            .service
            .authenticate(role, &hospital_id, &self.login.password);
        self.login.clear_password();

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                self.status = Some(Status::Error(e.to_string()));
                return;
            }
        };

        let forced = match self.service.must_change_password(&session) {
            Ok(forced) => forced,
            Err(e) => {
                self.status = Some(Status::Error(e.to_string()));
                return;
            }
        };
        self.status = Some(Status::Success(format!("Welcome, {}", session.name)));
        self.session = Some(session);
        self.menu_selected = 0;
        if forced {
            self.open_password_form(true);
            self.status = Some(Status::Info(
                "You are still using the default password. Please set a new one.".into(),
            ));
        } else {
            self.screen = Screen::Menu;
        }
    }

    fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!("{} logged out", session.hospital_id);
        }
        self.login = LoginState::default();
        self.form.clear_sensitive();
        self.screen = Screen::Login;
        self.status = Some(Status::Info("Logged out".into()));
    }

    // === Password ===

    fn open_password_form(&mut self, forced: bool) {
        self.form = FormState::new(
            "Change password",
            vec![
                FormField::new("Current password", "").secret(),
                FormField::new("New password", "must differ from the default").secret(),
                FormField::new("Confirm new password", "").secret(),
            ],
        );
        self.screen = Screen::ChangePassword { forced };
    }

    fn handle_password_key(&mut self, key: KeyCode, forced: bool) {
        match key {
            KeyCode::Esc => {
                self.form.clear_sensitive();
                if forced {
                    self.logout();
                } else {
                    self.screen = Screen::Menu;
                }
            }
            KeyCode::Enter => self.submit_password(),
            other => self.edit_form(other),
        }
    }

    fn submit_password(&mut self) {
        let Some(session) = self.session.clone() else {
            self.logout();
            return;
        };
        let mut values = self.form.values();
        let result = if values[1] != values[2] {
            Err("New passwords do not match".to_string())
        } else {
            self.service
                .change_password(&session, &values[0], &values[1])
                .map_err(msg)
        };
        values.zeroize();
        self.form.clear_sensitive();

        match result {
            Ok(()) => {
                self.screen = Screen::Menu;
                self.status = Some(Status::Success("Password changed".into()));
            }
            Err(e) => self.status = Some(Status::Error(e)),
        }
    }

    // === Menu ===

    fn handle_menu_key(&mut self, key: KeyCode) {
        let Some(role) = self.session.as_ref().map(|s| s.role) else {
            self.screen = Screen::Login;
            return;
        };
        let actions = menu::actions(role);
        match key {
            KeyCode::Up => {
                self.menu_selected = (self.menu_selected + actions.len() - 1) % actions.len();
            }
            KeyCode::Down => self.menu_selected = (self.menu_selected + 1) % actions.len(),
            KeyCode::Esc => self.logout(),
            KeyCode::Enter => {
                if let Some(&action) = actions.get(self.menu_selected) {
                    if let Err(e) = self.start(action) {
                        self.status = Some(Status::Error(e));
                    }
                }
            }
            _ => {}
        }
    }

    fn session(&self) -> std::result::Result<Session, String> {
        self.session
            .clone()
            .ok_or_else(|| "Not logged in".to_string())
    }

    fn show(&mut self, title: impl Into<String>, lines: Vec<String>, empty: &str) {
        self.view = ViewState::new(title, lines, empty);
        self.screen = Screen::View;
    }

    fn open_form(&mut self, step: FormStep, title: impl Into<String>, fields: Vec<FormField>) {
        self.form = FormState::new(title, fields);
        self.screen = Screen::Form(step);
    }

    fn open_pick(&mut self, step: PickStep, title: impl Into<String>, items: Vec<String>) {
        self.pick = PickState::new(title, items);
        self.screen = Screen::Pick(step);
    }

    fn done(&mut self, message: impl Into<String>) {
        self.screen = Screen::Menu;
        self.status = Some(Status::Success(message.into()));
    }

    fn start(&mut self, action: MenuAction) -> Flow {
        let s = self.session()?;
        match action {
            // Patient
            MenuAction::ViewMyRecord => {
                let record = self.service.my_medical_record(&s).map_err(msg)?;
                self.show("Medical Record", record.summary_lines(), "");
            }
            MenuAction::UpdateContact => {
                let record = self.service.my_medical_record(&s).map_err(msg)?;
                self.open_form(
                    FormStep::UpdateContact,
                    "Update contact information",
                    vec![
                        FormField::new("Phone number", "digits, spaces and + - ( )")
                            .with_value(record.contact.phone_number),
                        FormField::new("Email address", "name@example.com")
                            .with_value(record.contact.email_address),
                    ],
                );
            }
            MenuAction::ViewAvailableSlots | MenuAction::ScheduleAppointment => {
                let doctors = self.service.list_doctors().map_err(msg)?;
                if doctors.is_empty() {
                    return Err("No doctors are registered".into());
                }
                let items = doctors
                    .iter()
                    .map(|d| format!("{:<8} Dr. {}", d.hospital_id, d.name))
                    .collect();
                let ids = doctors.into_iter().map(|d| d.hospital_id).collect();
                let book = action == MenuAction::ScheduleAppointment;
                self.open_pick(PickStep::Doctor { ids, book }, "Choose a doctor", items);
            }
            MenuAction::RescheduleAppointment | MenuAction::CancelAppointment => {
                let open: Vec<_> = self
                    .service
                    .my_appointments(&s)
                    .map_err(msg)?
                    .into_iter()
                    .filter(|a| a.status.is_open())
                    .collect();
                if open.is_empty() {
                    return Err("You have no open appointments".into());
                }
                let items = open.iter().map(display::appointment_line).collect();
                if action == MenuAction::CancelAppointment {
                    let ids = open.iter().map(|a| a.id).collect();
                    self.open_pick(PickStep::CancelWhich { ids }, "Cancel which appointment?", items);
                } else {
                    let appointments = open.into_iter().map(|a| (a.id, a.doctor_id)).collect();
                    self.open_pick(
                        PickStep::RescheduleWhich { appointments },
                        "Reschedule which appointment?",
                        items,
                    );
                }
            }
            MenuAction::ViewMyAppointments => {
                let lines = self
                    .service
                    .my_appointments(&s)
                    .map_err(msg)?
                    .iter()
                    .map(display::appointment_line)
                    .collect();
                self.show("My Appointments", lines, "No appointments.");
            }
            MenuAction::ViewMyOutcomes => {
                let lines = self
                    .service
                    .my_outcome_records(&s)
                    .map_err(msg)?
                    .iter()
                    .flat_map(display::outcome_lines)
                    .collect();
                self.show("Appointment Outcomes", lines, "No outcome records.");
            }

            // Doctor
            MenuAction::ViewPatientRecords | MenuAction::AddDiagnosis | MenuAction::AddTreatment => {
                let ids = self.service.patients_under_care(&s).map_err(msg)?;
                if ids.is_empty() {
                    return Err("No patients under your care".into());
                }
                let items = ids
                    .iter()
                    .map(|id| match self.service.patient_record(&s, id) {
                        Ok(record) => format!("{id:<8} {}", record.name),
                        Err(_) => id.clone(),
                    })
                    .collect();
                let then = match action {
                    MenuAction::AddDiagnosis => PatientUse::Diagnosis,
                    MenuAction::AddTreatment => PatientUse::Treatment,
                    _ => PatientUse::ViewRecord,
                };
                self.open_pick(PickStep::Patient { ids, then }, "Choose a patient", items);
            }
            MenuAction::ViewSchedule => {
                let schedule = self.service.my_schedule(&s).map_err(msg)?;
                self.show(
                    "Personal Schedule",
                    display::schedule_lines(&schedule),
                    "No availability set.",
                );
            }
            MenuAction::SetAvailability => {
                let today = self.service.today().format(DATE_FORMAT).to_string();
                self.open_form(
                    FormStep::SetAvailability,
                    "Set availability",
                    vec![
                        FormField::new("Date", "YYYY-MM-DD").with_value(today),
                        FormField::new("Time ranges", "09:00-12:00, 14:00-16:00 (blank clears)"),
                    ],
                );
            }
            MenuAction::RespondToRequests => {
                let pending = self.service.pending_requests(&s).map_err(msg)?;
                if pending.is_empty() {
                    return Err("No pending appointment requests".into());
                }
                let items = pending.iter().map(display::appointment_line).collect();
                let ids = pending.iter().map(|a| a.id).collect();
                self.open_pick(PickStep::RespondWhich { ids }, "Pending requests", items);
            }
            MenuAction::ViewUpcoming => {
                let lines = self
                    .service
                    .upcoming_appointments(&s)
                    .map_err(msg)?
                    .iter()
                    .map(display::appointment_line)
                    .collect();
                self.show("Upcoming Appointments", lines, "No upcoming appointments.");
            }
            MenuAction::RecordOutcome => {
                let candidates = self.service.outcome_candidates(&s).map_err(msg)?;
                if candidates.is_empty() {
                    return Err("No appointments are awaiting an outcome".into());
                }
                let items = candidates.iter().map(display::appointment_line).collect();
                let ids = candidates.iter().map(|a| a.id).collect();
                self.open_pick(PickStep::OutcomeWhich { ids }, "Record outcome for", items);
            }

            // Pharmacist
            MenuAction::ViewOutcomeRecords => {
                let lines = self
                    .service
                    .outcome_records(&s)
                    .map_err(msg)?
                    .iter()
                    .flat_map(display::outcome_lines)
                    .collect();
                self.show("Appointment Outcome Records", lines, "No outcome records.");
            }
            MenuAction::LookupPatientRecord => self.open_form(
                FormStep::PatientLookup,
                "View a patient medical record",
                vec![FormField::new("Patient ID", "e.g. P1001")],
            ),
            MenuAction::UpdatePrescriptionStatus => self.open_form(
                FormStep::PrescriptionPatient,
                "Update prescription status",
                vec![FormField::new("Patient ID", "e.g. P1001")],
            ),
            MenuAction::ViewInventory => {
                let meds = self.service.medications(&s).map_err(msg)?;
                let mut lines = vec![display::medication_header()];
                lines.extend(meds.iter().map(display::medication_line));
                self.show("Medication Inventory", lines, "");
            }
            MenuAction::SubmitReplenishment => self.open_form(
                FormStep::Replenish,
                "Submit replenishment request",
                vec![
                    FormField::new("Medication name", "as listed in the inventory"),
                    FormField::new("Quantity", "positive whole number"),
                ],
            ),

            // Administrator
            MenuAction::ViewStaff => {
                let items = STAFF_FILTERS.iter().map(|(label, _)| (*label).to_string()).collect();
                self.open_pick(PickStep::StaffFilter, "Show which staff?", items);
            }
            MenuAction::AddUser => self.open_form(
                FormStep::AddUser,
                "Add a user",
                vec![
                    FormField::new("Hospital ID", "unique, no spaces"),
                    FormField::new("Name", "full name"),
                    FormField::new("Date of birth", "YYYY-MM-DD"),
                    FormField::new("Gender", "e.g. Female"),
                    FormField::new("Role", "Administrator, Doctor, Pharmacist or Patient"),
                ],
            ),
            MenuAction::RemoveUser => self.open_form(
                FormStep::RemoveUser,
                "Remove a user",
                vec![FormField::new("Hospital ID", "")],
            ),
            MenuAction::ViewAllAppointments => {
                let lines = self
                    .service
                    .all_appointments(&s)
                    .map_err(msg)?
                    .iter()
                    .flat_map(|a| {
                        let mut lines = vec![display::appointment_line(a)];
                        if a.status == AppointmentStatus::Completed {
                            if let Some(t) = &a.outcome {
                                lines.extend(display::treatment_lines(t));
                            }
                        }
                        lines
                    })
                    .collect();
                self.show("All Appointments", lines, "No appointments.");
            }
            MenuAction::AddMedication => self.open_form(
                FormStep::AddMedication,
                "Add a medication",
                vec![
                    FormField::new("Name", "no ; , or :"),
                    FormField::new("Quantity", "initial stock"),
                    FormField::new("Supplier", "optional"),
                    FormField::new("Low stock alert", "flag at or below this level"),
                ],
            ),
            MenuAction::Restock => self.open_form(
                FormStep::Restock,
                "Restock a medication",
                vec![
                    FormField::new("Name", ""),
                    FormField::new("Quantity to add", ""),
                ],
            ),
            MenuAction::SetLowStockAlert => self.open_form(
                FormStep::SetLowStockAlert,
                "Set low stock alert",
                vec![
                    FormField::new("Name", ""),
                    FormField::new("Alert level", ""),
                ],
            ),
            MenuAction::RemoveMedication => self.open_form(
                FormStep::RemoveMedication,
                "Remove a medication",
                vec![FormField::new("Name", "")],
            ),
            MenuAction::ViewReplenishments => {
                let lines = self
                    .service
                    .replenishment_requests(&s)
                    .map_err(msg)?
                    .iter()
                    .map(display::request_line)
                    .collect();
                self.show("Replenishment Requests", lines, "No replenishment requests.");
            }
            MenuAction::ResolveReplenishment => {
                let pending: Vec<_> = self
                    .service
                    .replenishment_requests(&s)
                    .map_err(msg)?
                    .into_iter()
                    .filter(|r| r.status == ReplenishmentStatus::Pending)
                    .collect();
                if pending.is_empty() {
                    return Err("No pending replenishment requests".into());
                }
                let items = pending.iter().map(display::request_line).collect();
                let ids = pending.iter().map(|r| r.id).collect();
                self.open_pick(PickStep::ResolveWhich { ids }, "Pending requests", items);
            }

            MenuAction::ViewProfile => {
                let user = self.service.profile(&s).map_err(msg)?;
                self.show("Profile", display::profile_lines(&user), "");
            }
            MenuAction::ChangePassword => self.open_password_form(false),
            MenuAction::Logout => self.logout(),
        }
        Ok(())
    }

    // === Forms ===

    fn edit_form(&mut self, key: KeyCode) {
        match key {
            KeyCode::Tab | KeyCode::Down => self.form.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.form.prev_field(),
            KeyCode::Backspace => self.form.delete_char(),
            KeyCode::Delete => self.form.clear_field(),
            KeyCode::Char(c) => self.form.input_char(c),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.screen = Screen::Menu,
            KeyCode::Enter => {
                let Screen::Form(step) = std::mem::replace(&mut self.screen, Screen::Menu) else {
                    return;
                };
                let values = self.form.values();
                if let Err(e) = self.submit_form(step.clone(), &values) {
                    self.status = Some(Status::Error(e));
                    self.screen = Screen::Form(step);
                }
            }
            other => self.edit_form(other),
        }
    }

    fn date_or_today(&self, label: &str, value: &str) -> std::result::Result<chrono::NaiveDate, String> {
        match optional(value) {
            Some(v) => parse_date(label, v),
            None => Ok(self.service.today()),
        }
    }

    fn submit_form(&mut self, step: FormStep, v: &[String]) -> Flow {
        let s = self.session()?;
        match step {
            FormStep::UpdateContact => {
                self.service
                    .update_contact_information(&s, &v[0], &v[1])
                    .map_err(msg)?;
                self.done("Contact information updated");
            }
            FormStep::SlotDate { doctor_id, book } => {
                let date = parse_date("Date", &v[0])?;
                let slots = self.service.available_slots(&doctor_id, date).map_err(msg)?;
                let title = format!("{doctor_id} on {}", date.format(DATE_FORMAT));
                let items: Vec<String> = slots.iter().map(ToString::to_string).collect();
                if !book {
                    self.show(format!("Available slots: {title}"), items, "No available slots.");
                } else if slots.is_empty() {
                    return Err(format!("No available slots for {title}"));
                } else {
                    self.open_pick(PickStep::BookSlot { doctor_id, slots }, format!("Book with {title}"), items);
                }
            }
            FormStep::RescheduleDate {
                appointment_id,
                doctor_id,
            } => {
                let date = parse_date("New date", &v[0])?;
                let slots = self.service.available_slots(&doctor_id, date).map_err(msg)?;
                if slots.is_empty() {
                    return Err(format!(
                        "No available slots for {doctor_id} on {}",
                        date.format(DATE_FORMAT)
                    ));
                }
                let items = slots.iter().map(ToString::to_string).collect();
                self.open_pick(
                    PickStep::RescheduleSlot {
                        appointment_id,
                        slots,
                    },
                    format!("Move appointment #{appointment_id} to"),
                    items,
                );
            }
            FormStep::AddDiagnosis { patient_id } => {
                let date = self.date_or_today("Date", &v[1])?;
                let diagnosis = Diagnosis::new(&v[0], date)
                    .and_then(|d| d.with_comments(&v[2]))
                    .map_err(|e| e.to_string())?;
                self.service
                    .add_diagnosis(&s, &patient_id, diagnosis)
                    .map_err(msg)?;
                self.done(format!("Diagnosis added to {patient_id}"));
            }
            FormStep::AddTreatment { patient_id } => {
                let date = self.date_or_today("Date", &v[1])?;
                let prescriptions = Prescription::parse_list(&v[2]).map_err(|e| e.to_string())?;
                let treatment =
                    Treatment::new(&v[0], date, prescriptions, &v[3]).map_err(|e| e.to_string())?;
                self.service
                    .add_treatment(&s, &patient_id, treatment)
                    .map_err(msg)?;
                self.done(format!("Treatment added to {patient_id}"));
            }
            FormStep::SetAvailability => {
                let date = parse_date("Date", &v[0])?;
                let ranges = parse_ranges(&v[1])?;
                self.service
                    .set_availability(&s, date, &ranges)
                    .map_err(msg)?;
                self.done(format!("Availability updated for {}", date.format(DATE_FORMAT)));
            }
            FormStep::RecordOutcome { appointment_id } => {
                let prescriptions = Prescription::parse_list(&v[1]).map_err(|e| e.to_string())?;
                self.service
                    .record_outcome(&s, appointment_id, &v[0], prescriptions, &v[2])
                    .map_err(msg)?;
                self.done(format!("Outcome recorded for appointment #{appointment_id}"));
            }
            FormStep::PrescriptionPatient => {
                let patient_id = v[0].clone();
                let record = self.service.patient_record(&s, &patient_id).map_err(msg)?;
                let mut positions = Vec::new();
                let mut items = Vec::new();
                for (ti, t) in record.treatments.iter().enumerate() {
                    for (pi, p) in t.prescriptions.iter().enumerate() {
                        positions.push((ti, pi));
                        items.push(format!(
                            "Treatment {} ({}): {} [{}]",
                            ti + 1,
                            t.service_type,
                            p.medication_name,
                            p.status
                        ));
                    }
                }
                if positions.is_empty() {
                    return Err(format!("No prescriptions recorded for {patient_id}"));
                }
                self.open_pick(
                    PickStep::Prescription {
                        patient_id,
                        positions,
                    },
                    format!("Prescriptions of {}", record.name),
                    items,
                );
            }
            FormStep::PatientLookup => {
                let record = self.service.patient_record(&s, &v[0]).map_err(msg)?;
                self.show(format!("Medical Record: {}", record.patient_id), record.summary_lines(), "");
            }
            FormStep::Replenish => {
                let quantity = parse_u32("Quantity", &v[1])?;
                let id = self
                    .service
                    .submit_replenishment_request(&s, &v[0], quantity)
                    .map_err(msg)?;
                self.done(format!("Replenishment request #{id} submitted"));
            }
            FormStep::AddUser => {
                let dob = parse_date("Date of birth", &v[2])?;
                let role = parse_role(&v[4])?;
                self.service
                    .add_user(&s, &v[0], &v[1], dob, &v[3], role)
                    .map_err(msg)?;
                self.done(format!("{role} {} added with the default password", v[0]));
            }
            FormStep::RemoveUser => {
                self.service.remove_user(&s, &v[0]).map_err(msg)?;
                self.done(format!("User {} removed", v[0]));
            }
            FormStep::AddMedication => {
                let quantity = parse_u32("Quantity", &v[1])?;
                let alert = parse_u32("Low stock alert", &v[3])?;
                self.service
                    .add_medication(&s, &v[0], quantity, optional(&v[2]), alert)
                    .map_err(msg)?;
                self.done(format!("Medication {} added", v[0]));
            }
            FormStep::Restock => {
                let quantity = parse_u32("Quantity to add", &v[1])?;
                let total = self.service.restock(&s, &v[0], quantity).map_err(msg)?;
                self.done(format!("Stock of {} is now {total}", v[0]));
            }
            FormStep::SetLowStockAlert => {
                let alert = parse_u32("Alert level", &v[1])?;
                self.service
                    .set_low_stock_alert(&s, &v[0], alert)
                    .map_err(msg)?;
                self.done(format!("Low stock alert for {} set to {alert}", v[0]));
            }
            FormStep::RemoveMedication => {
                self.service.remove_medication(&s, &v[0]).map_err(msg)?;
                self.done(format!("Medication {} removed", v[0]));
            }
        }
        Ok(())
    }

    // === Picks ===

    fn handle_pick_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.screen = Screen::Menu,
            KeyCode::Up => self.pick.prev(),
            KeyCode::Down => self.pick.next(),
            KeyCode::Enter => {
                let Screen::Pick(step) = std::mem::replace(&mut self.screen, Screen::Menu) else {
                    return;
                };
                let index = self.pick.selected;
                if let Err(e) = self.submit_pick(step.clone(), index) {
                    self.status = Some(Status::Error(e));
                    self.screen = Screen::Pick(step);
                }
            }
            _ => {}
        }
    }

    fn submit_pick(&mut self, step: PickStep, index: usize) -> Flow {
        let s = self.session()?;
        match step {
            PickStep::Doctor { ids, book } => {
                let doctor_id = pick_at(&ids, index)?;
                let today = self.service.today().format(DATE_FORMAT).to_string();
                self.open_form(
                    FormStep::SlotDate {
                        doctor_id: doctor_id.clone(),
                        book,
                    },
                    format!("Slots with {doctor_id}"),
                    vec![FormField::new("Date", "YYYY-MM-DD").with_value(today)],
                );
            }
            PickStep::BookSlot { doctor_id, slots } => {
                let slot = pick_at(&slots, index)?;
                let id = self
                    .service
                    .request_appointment(&s, &doctor_id, slot)
                    .map_err(msg)?;
                self.done(format!("Appointment #{id} requested for {slot}"));
            }
            PickStep::RescheduleWhich { appointments } => {
                let (appointment_id, doctor_id) = pick_at(&appointments, index)?;
                self.open_form(
                    FormStep::RescheduleDate {
                        appointment_id,
                        doctor_id,
                    },
                    format!("Reschedule appointment #{appointment_id}"),
                    vec![FormField::new("New date", "YYYY-MM-DD")],
                );
            }
            PickStep::RescheduleSlot {
                appointment_id,
                slots,
            } => {
                let slot = pick_at(&slots, index)?;
                self.service
                    .reschedule_appointment(&s, appointment_id, slot)
                    .map_err(msg)?;
                self.done(format!("Appointment #{appointment_id} moved to {slot}"));
            }
            PickStep::CancelWhich { ids } => {
                let id = pick_at(&ids, index)?;
                self.service.cancel_appointment(&s, id).map_err(msg)?;
                self.done(format!("Appointment #{id} cancelled"));
            }
            PickStep::Patient { ids, then } => {
                let patient_id = pick_at(&ids, index)?;
                match then {
                    PatientUse::ViewRecord => {
                        let record = self.service.patient_record(&s, &patient_id).map_err(msg)?;
                        self.show(
                            format!("Medical Record: {patient_id}"),
                            record.summary_lines(),
                            "",
                        );
                    }
                    PatientUse::Diagnosis => self.open_form(
                        FormStep::AddDiagnosis {
                            patient_id: patient_id.clone(),
                        },
                        format!("New diagnosis for {patient_id}"),
                        vec![
                            FormField::new("Diagnosis", "no ; or ,"),
                            FormField::new("Date", "YYYY-MM-DD, blank for today"),
                            FormField::new("Comments", "optional"),
                        ],
                    ),
                    PatientUse::Treatment => self.open_form(
                        FormStep::AddTreatment {
                            patient_id: patient_id.clone(),
                        },
                        format!("New treatment for {patient_id}"),
                        vec![
                            FormField::new("Service type", "e.g. X-ray"),
                            FormField::new("Date", "YYYY-MM-DD, blank for today"),
                            FormField::new("Prescriptions", "name[:status], ... (optional)"),
                            FormField::new("Comments", "required"),
                        ],
                    ),
                }
            }
            PickStep::RespondWhich { ids } => {
                let appointment_id = pick_at(&ids, index)?;
                self.open_pick(
                    PickStep::RespondDecision { appointment_id },
                    format!("Appointment #{appointment_id}"),
                    vec!["Accept".into(), "Decline".into()],
                );
            }
            PickStep::RespondDecision { appointment_id } => {
                let accept = index == 0;
                self.service
                    .respond_to_request(&s, appointment_id, accept)
                    .map_err(msg)?;
                let verb = if accept { "accepted" } else { "declined" };
                self.done(format!("Appointment #{appointment_id} {verb}"));
            }
            PickStep::OutcomeWhich { ids } => {
                let appointment_id = pick_at(&ids, index)?;
                self.open_form(
                    FormStep::RecordOutcome { appointment_id },
                    format!("Outcome of appointment #{appointment_id}"),
                    vec![
                        FormField::new("Service type", "e.g. Consultation"),
                        FormField::new("Prescriptions", "name[:status], ... (optional)"),
                        FormField::new("Consultation notes", "required"),
                    ],
                );
            }
            PickStep::Prescription {
                patient_id,
                positions,
            } => {
                let (treatment, prescription) = pick_at(&positions, index)?;
                let items = PRESCRIPTION_STATES.iter().map(ToString::to_string).collect();
                self.open_pick(
                    PickStep::PrescriptionStatus {
                        patient_id,
                        treatment,
                        prescription,
                    },
                    "New status",
                    items,
                );
            }
            PickStep::PrescriptionStatus {
                patient_id,
                treatment,
                prescription,
            } => {
                let status = pick_at(&PRESCRIPTION_STATES, index)?;
                self.service
                    .update_prescription_status(&s, &patient_id, treatment, prescription, status)
                    .map_err(msg)?;
                self.done(format!("Prescription set to {status}"));
            }
            PickStep::StaffFilter => {
                let (label, role) = pick_at(&STAFF_FILTERS, index)?;
                let lines = self
                    .service
                    .staff(&s, role)
                    .map_err(msg)?
                    .iter()
                    .map(display::user_line)
                    .collect();
                self.show(label, lines, "No staff found.");
            }
            PickStep::ResolveWhich { ids } => {
                let request_id = pick_at(&ids, index)?;
                self.open_pick(
                    PickStep::ResolveDecision { request_id },
                    format!("Request #{request_id}"),
                    vec!["Approve".into(), "Reject".into()],
                );
            }
            PickStep::ResolveDecision { request_id } => {
                let approve = index == 0;
                self.service
                    .resolve_replenishment(&s, request_id, approve)
                    .map_err(msg)?;
                let verb = if approve { "approved" } else { "rejected" };
                self.done(format!("Request #{request_id} {verb}"));
            }
        }
        Ok(())
    }

    // === Views ===

    fn handle_view_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::Enter => self.screen = Screen::Menu,
            KeyCode::Down => self.view.scroll_down(1),
            KeyCode::Up => self.view.scroll_up(1),
            KeyCode::PageDown => self.view.scroll_down(10),
            KeyCode::PageUp => self.view.scroll_up(10),
            _ => {}
        }
    }
}
