use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::schedule::slot_key;
use crate::models::draft::MAX_SERVICE_PRICE;
use crate::models::search::{is_valid_email, is_valid_phone};
use crate::models::{Amount, Appointment, AppointmentDraft, DraftPatch, SelectedService, TimeSlotAvailability};
use crate::services::api::SpaApi;
use crate::services::lifecycle::AppointmentManager;
use crate::services::verification::VerificationGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    PetInfo = 1,
    ServiceAndTime = 2,
    ContactAndConfirm = 3,
    Payment = 4,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn next(self) -> Option<Self> {
        match self {
            WizardStep::PetInfo => Some(WizardStep::ServiceAndTime),
            WizardStep::ServiceAndTime => Some(WizardStep::ContactAndConfirm),
            WizardStep::ContactAndConfirm => Some(WizardStep::Payment),
            WizardStep::Payment => None,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            WizardStep::PetInfo => None,
            WizardStep::ServiceAndTime => Some(WizardStep::PetInfo),
            WizardStep::ContactAndConfirm => Some(WizardStep::ServiceAndTime),
            WizardStep::Payment => Some(WizardStep::ContactAndConfirm),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced { step: WizardStep },
    /// The contact email must be verified before the appointment is created.
    VerificationRequired { email: String },
}

#[derive(Debug, Serialize)]
pub struct VerificationView {
    pub code_sent: bool,
    pub resend_in_secs: u64,
    pub verified_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WizardView {
    pub id: Uuid,
    pub step: WizardStep,
    pub step_number: u8,
    pub draft: AppointmentDraft,
    pub total_amount: Amount,
    pub open_slots: Vec<String>,
    pub verification: VerificationView,
    pub appointment: Option<Appointment>,
}

/// One customer's booking session. Owns the draft until the appointment is
/// created; after that the draft is read-only and only payment remains.
#[derive(Debug)]
pub struct BookingWizard {
    id: Uuid,
    step: WizardStep,
    draft: AppointmentDraft,
    gate: VerificationGate,
    appointment: Option<Appointment>,
    availability: Option<(NaiveDate, TimeSlotAvailability)>,
}

impl BookingWizard {
    pub fn new(resend_cooldown: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            step: WizardStep::PetInfo,
            draft: AppointmentDraft::default(),
            gate: VerificationGate::new(resend_cooldown),
            appointment: None,
            availability: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &AppointmentDraft {
        &self.draft
    }

    pub fn appointment(&self) -> Option<&Appointment> {
        self.appointment.as_ref()
    }

    pub fn set_appointment(&mut self, appointment: Appointment) {
        self.appointment = Some(appointment);
    }

    pub fn view(&self) -> WizardView {
        let open_slots = match (&self.availability, self.draft.date) {
            (Some((date, slots)), Some(current)) if *date == current => {
                slots.open_slots().map(str::to_string).collect()
            }
            _ => Vec::new(),
        };
        WizardView {
            id: self.id,
            step: self.step,
            step_number: self.step.number(),
            draft: self.draft.clone(),
            total_amount: self.draft.services.total(),
            open_slots,
            verification: VerificationView {
                code_sent: self.gate.is_sent(),
                resend_in_secs: self.gate.cooldown_remaining().as_secs(),
                verified_email: self.gate.verified_email().map(str::to_string),
            },
            appointment: self.appointment.clone(),
        }
    }

    fn ensure_editable(&self) -> AppResult<()> {
        if self.appointment.is_some() {
            return Err(AppError::Conflict(
                "This booking has already been submitted".to_string(),
            ));
        }
        Ok(())
    }

    pub fn update_draft(&mut self, patch: DraftPatch) -> AppResult<()> {
        self.ensure_editable()?;
        patch.apply(&mut self.draft);
        Ok(())
    }

    /// Returns whether the service is selected afterwards.
    pub fn toggle_service(&mut self, service: SelectedService) -> AppResult<bool> {
        self.ensure_editable()?;
        if !(0..=MAX_SERVICE_PRICE).contains(&service.price) {
            return Err(AppError::Validation("Invalid service price".to_string()));
        }
        Ok(self.draft.services.toggle(service))
    }

    /// A new date invalidates the chosen slot and any slots already loaded.
    pub fn set_date(&mut self, date: NaiveDate) -> AppResult<()> {
        self.ensure_editable()?;
        if self.draft.date != Some(date) {
            self.draft.date = Some(date);
            self.draft.time_slot = None;
            self.availability = None;
        }
        Ok(())
    }

    /// Ignored when the draft's date moved on since the lookup was issued.
    pub fn set_availability(&mut self, date: NaiveDate, slots: TimeSlotAvailability) -> bool {
        if self.draft.date != Some(date) {
            tracing::debug!(wizard = %self.id, "ignoring availability for an old date");
            return false;
        }
        self.availability = Some((date, slots));
        true
    }

    pub fn select_time(&mut self, time: NaiveTime) -> AppResult<()> {
        self.ensure_editable()?;
        let date = self
            .draft
            .date
            .ok_or_else(|| AppError::Validation("Please choose a date first".to_string()))?;

        let open = match &self.availability {
            Some((loaded, slots)) if *loaded == date => slots.is_open(time),
            _ => false,
        };
        if !open {
            return Err(AppError::Validation(format!(
                "{} is not available",
                slot_key(time)
            )));
        }
        self.draft.time_slot = Some(time);
        Ok(())
    }

    /// Steps back one step. The draft is left as it is.
    pub fn back(&mut self) -> WizardStep {
        if let Some(prev) = self.step.previous() {
            self.step = prev;
        }
        self.step
    }

    fn check_step(&self) -> AppResult<()> {
        let draft = &self.draft;
        match self.step {
            WizardStep::PetInfo => {
                if draft.pet_name.trim().is_empty() {
                    return Err(AppError::Validation("Please enter your pet's name".to_string()));
                }
                if draft.breed.trim().is_empty() {
                    return Err(AppError::Validation("Please enter your pet's breed".to_string()));
                }
            }
            WizardStep::ServiceAndTime => {
                if draft.services.is_empty() {
                    return Err(AppError::Validation(
                        "Please select at least one service".to_string(),
                    ));
                }
                if draft.date.is_none() || draft.time_slot.is_none() {
                    return Err(AppError::Validation(
                        "Please choose a date and time slot".to_string(),
                    ));
                }
            }
            WizardStep::ContactAndConfirm => {
                if draft.contact_name.trim().is_empty() {
                    return Err(AppError::Validation("Please enter your name".to_string()));
                }
                if !is_valid_phone(draft.phone.trim()) {
                    return Err(AppError::Validation(
                        "Phone number must be 10 to 11 digits".to_string(),
                    ));
                }
                if !is_valid_email(draft.email.trim()) {
                    return Err(AppError::Validation(
                        "Please enter a valid email address".to_string(),
                    ));
                }
            }
            WizardStep::Payment => {
                return Err(AppError::Validation(
                    "Please complete the payment".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Moves forward one step if the current step's guard passes. Leaving
    /// step 3 needs a verified email and creates the appointment, once.
    pub async fn advance(&mut self, manager: &AppointmentManager) -> AppResult<AdvanceOutcome> {
        self.check_step()?;

        if self.step == WizardStep::ContactAndConfirm && self.appointment.is_none() {
            let email = self.draft.email.trim().to_string();
            if !self.gate.is_verified_for(&email) {
                return Ok(AdvanceOutcome::VerificationRequired { email });
            }

            let id = manager.create(&self.draft).await?;
            let appointment = manager
                .cached(&id)
                .or_else(|| Appointment::from_draft(id.clone(), &self.draft))
                .ok_or_else(|| AppError::Validation("Please choose a date and time slot".to_string()))?;
            self.appointment = Some(appointment);
        }

        if let Some(next) = self.step.next() {
            self.step = next;
        }
        tracing::info!(wizard = %self.id, step = self.step.number(), "wizard advanced");
        Ok(AdvanceOutcome::Advanced { step: self.step })
    }

    pub async fn request_code(&mut self, api: &dyn SpaApi) -> AppResult<()> {
        self.ensure_editable()?;
        let email = self.draft.email.clone();
        self.gate.request_code(api, &email).await
    }

    /// Verifies the code against the draft's email, then retries the step-3
    /// advance it was blocking.
    pub async fn verify_code(
        &mut self,
        api: &dyn SpaApi,
        manager: &AppointmentManager,
        code: &str,
    ) -> AppResult<AdvanceOutcome> {
        self.ensure_editable()?;
        let email = self.draft.email.clone();
        self.gate.verify_code(api, &email, code).await?;

        if self.step == WizardStep::ContactAndConfirm {
            return self.advance(manager).await;
        }
        Ok(AdvanceOutcome::Advanced { step: self.step })
    }
}
