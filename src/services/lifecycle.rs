use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::models::schedule::{api_date, api_time, slot_key};
use crate::models::wire::{parse_api_date, parse_api_time};
use crate::models::{Appointment, AppointmentDraft, AppointmentStatus, SearchCriteria};
use crate::services::api::{CreateAppointmentRequest, SpaApi};
use crate::services::availability::AvailabilityClient;

/// Marks one in-flight mutation of an appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTicket {
    id: String,
    generation: u64,
}

#[derive(Debug)]
struct Entry {
    appointment: Appointment,
    touched: Instant,
}

#[derive(Debug)]
struct Issued {
    generation: u64,
    at: Instant,
}

/// Last fetched state of the appointments this process has recently seen,
/// keyed by id. Mutation responses are applied only when they belong to the
/// newest request issued for that id.
#[derive(Debug, Default)]
pub struct AppointmentBook {
    entries: HashMap<String, Entry>,
    issued: HashMap<String, Issued>,
    next_generation: u64,
}

impl AppointmentBook {
    pub fn get(&self, id: &str) -> Option<&Appointment> {
        self.entries.get(id).map(|e| &e.appointment)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn upsert(&mut self, appointment: Appointment) {
        self.entries.insert(
            appointment.id.clone(),
            Entry {
                appointment,
                touched: Instant::now(),
            },
        );
    }

    pub fn begin(&mut self, id: &str) -> UpdateTicket {
        self.next_generation += 1;
        self.issued.insert(
            id.to_string(),
            Issued {
                generation: self.next_generation,
                at: Instant::now(),
            },
        );
        UpdateTicket {
            id: id.to_string(),
            generation: self.next_generation,
        }
    }

    pub fn is_latest(&self, ticket: &UpdateTicket) -> bool {
        self.issued.get(&ticket.id).map(|i| i.generation) == Some(ticket.generation)
    }

    /// Returns false when the ticket was superseded or the id is unknown.
    pub fn apply<F>(&mut self, ticket: &UpdateTicket, update: F) -> bool
    where
        F: FnOnce(&mut Appointment),
    {
        if !self.is_latest(ticket) {
            tracing::debug!(id = %ticket.id, "dropping stale appointment update");
            return false;
        }
        match self.entries.get_mut(&ticket.id) {
            Some(entry) => {
                update(&mut entry.appointment);
                entry.touched = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Replaces the entry with a refetched copy unless a newer mutation
    /// was issued meanwhile.
    pub fn refresh(&mut self, ticket: &UpdateTicket, appointment: Appointment) -> bool {
        if !self.is_latest(ticket) {
            return false;
        }
        self.upsert(appointment);
        true
    }

    /// Drops entries and tickets untouched for `max_idle`. Returns how many
    /// appointments were dropped.
    pub fn prune(&mut self, max_idle: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.touched.elapsed() < max_idle);
        self.issued.retain(|_, i| i.at.elapsed() < max_idle);
        before - self.entries.len()
    }
}

fn note_total_mismatch(appointment: &Appointment) {
    let line_items = appointment.line_item_total();
    if !appointment.services.is_empty() && line_items != appointment.total_amount {
        tracing::warn!(
            appointment_id = %appointment.id,
            total = appointment.total_amount,
            line_items,
            "appointment total differs from its line items"
        );
    }
}

/// Old and new slot side by side, for the customer to confirm.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReschedulePlan {
    pub appointment_id: String,
    pub current_date: NaiveDate,
    pub current_time: NaiveTime,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub seats_left: u32,
}

pub struct AppointmentManager {
    api: Arc<dyn SpaApi>,
    book: Mutex<AppointmentBook>,
}

fn normalize_date(raw: &str) -> AppResult<NaiveDate> {
    parse_api_date(raw)
        .ok_or_else(|| AppError::Validation(format!("Invalid date: {raw}")))
}

fn normalize_time(raw: &str) -> AppResult<NaiveTime> {
    parse_api_time(raw)
        .ok_or_else(|| AppError::Validation(format!("Invalid time: {raw}")))
}

impl AppointmentManager {
    pub fn new(api: Arc<dyn SpaApi>) -> Self {
        Self {
            api,
            book: Mutex::new(AppointmentBook::default()),
        }
    }

    pub fn cached(&self, id: &str) -> Option<Appointment> {
        self.book.lock().unwrap().get(id).cloned()
    }

    pub fn remember(&self, appointment: Appointment) {
        note_total_mismatch(&appointment);
        self.book.lock().unwrap().upsert(appointment);
    }

    pub fn prune(&self, max_idle: Duration) -> usize {
        self.book.lock().unwrap().prune(max_idle)
    }

    /// Submits the draft once. Returns the new appointment id.
    pub async fn create(&self, draft: &AppointmentDraft) -> AppResult<String> {
        let request = CreateAppointmentRequest::from_draft(draft).ok_or_else(|| {
            AppError::Validation("Please choose a date and time slot".to_string())
        })?;

        let id = self.api.create_appointment(&request).await?;
        tracing::info!(
            appointment_id = %id,
            date = %request.appointment_data.appointment_date,
            time = %request.appointment_data.appointment_time,
            total = request.appointment_data.total_amount,
            "appointment created"
        );

        if let Some(appt) = Appointment::from_draft(id.clone(), draft) {
            self.remember(appt);
        }
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> AppResult<Appointment> {
        let appt = self.api.get_appointment(id).await?;
        self.remember(appt.clone());
        Ok(appt)
    }

    /// Validates the criteria first; nothing is sent when they are malformed.
    pub async fn search(&self, criteria: &SearchCriteria) -> AppResult<Vec<Appointment>> {
        criteria.validate()?;
        let found = self.api.search(criteria).await?;
        tracing::info!(kind = criteria.kind.as_str(), count = found.len(), "appointment search");

        let mut book = self.book.lock().unwrap();
        for appt in &found {
            note_total_mismatch(appt);
            book.upsert(appt.clone());
        }
        Ok(found)
    }

    /// Client-side eligibility is advisory; the backend has the final say.
    pub async fn cancel(&self, id: &str) -> AppResult<Appointment> {
        if let Some(appt) = self.cached(id) {
            if !appt.capabilities().can_cancel {
                return Err(AppError::Validation(
                    "This appointment can no longer be cancelled".to_string(),
                ));
            }
        }

        let ticket = self.book.lock().unwrap().begin(id);
        let status = self
            .api
            .update_status(id, AppointmentStatus::Cancelled)
            .await?;
        tracing::info!(appointment_id = id, status = status.as_str(), "appointment cancelled");

        self.book
            .lock()
            .unwrap()
            .apply(&ticket, |a| a.status = status);
        self.settle(id, &ticket).await
    }

    /// Checks the requested slot against live availability and returns the
    /// plan to confirm. Does not modify anything.
    pub async fn plan_reschedule(
        &self,
        availability: &AvailabilityClient,
        id: &str,
        new_date: &str,
        new_time: &str,
    ) -> AppResult<ReschedulePlan> {
        let date = normalize_date(new_date)?;
        let time = normalize_time(new_time)?;

        let current = match self.cached(id) {
            Some(appt) => appt,
            None => self.get(id).await?,
        };
        if !current.capabilities().can_reschedule {
            return Err(AppError::Validation(
                "This appointment can no longer be rescheduled".to_string(),
            ));
        }

        let slots = availability.get_availability(date).await;
        let seats_left = slots
            .get(time)
            .filter(|c| c.is_open())
            .map(|c| c.available)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "{} on {} is not available",
                    slot_key(time),
                    api_date(date)
                ))
            })?;

        Ok(ReschedulePlan {
            appointment_id: current.id,
            current_date: current.appointment_date,
            current_time: current.appointment_time,
            new_date: date,
            new_time: time,
            seats_left,
        })
    }

    /// One update call. Accepts ISO datetimes for the date and `HH:MM` for
    /// the time; both are normalized before sending.
    pub async fn reschedule(&self, id: &str, new_date: &str, new_time: &str) -> AppResult<Appointment> {
        let date = api_date(normalize_date(new_date)?);
        let time = api_time(normalize_time(new_time)?);

        let ticket = self.book.lock().unwrap().begin(id);
        let result = self.api.reschedule(id, &date, &time).await?;
        tracing::info!(appointment_id = id, date = %date, time = %time, "appointment rescheduled");

        self.book.lock().unwrap().apply(&ticket, |a| {
            a.appointment_date = result.appointment_date;
            a.appointment_time = result.appointment_time;
            if let Some(status) = result.status {
                a.status = status;
            }
        });
        self.settle(id, &ticket).await
    }

    pub async fn restore(&self, id: &str) -> AppResult<Appointment> {
        let ticket = self.book.lock().unwrap().begin(id);
        self.api.restore(id).await?;
        tracing::info!(appointment_id = id, "appointment restored");

        self.book
            .lock()
            .unwrap()
            .apply(&ticket, |a| a.status = AppointmentStatus::Pending);
        self.settle(id, &ticket).await
    }

    /// Refetches after a mutation so every view sees the server's state.
    /// Falls back to the optimistic local copy if the refetch fails.
    async fn settle(&self, id: &str, ticket: &UpdateTicket) -> AppResult<Appointment> {
        match self.api.get_appointment(id).await {
            Ok(fresh) => {
                let mut book = self.book.lock().unwrap();
                book.refresh(ticket, fresh.clone());
                Ok(book.get(id).cloned().unwrap_or(fresh))
            }
            Err(e) => {
                tracing::warn!(appointment_id = id, error = %e, "refetch after update failed");
                self.cached(id).ok_or(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{PaymentMethod, PaymentStatus, SearchKind, SelectedService};
    use crate::services::testing::{appointment, FakeApi};

    fn setup() -> (Arc<FakeApi>, AppointmentManager) {
        let api = Arc::new(FakeApi::default());
        let manager = AppointmentManager::new(api.clone());
        (api, manager)
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let mut book = AppointmentBook::default();
        book.upsert(appointment("APT-0001", "2025-05-01", "09:00", 150000));

        let first = book.begin("APT-0001");
        let second = book.begin("APT-0001");

        assert!(book.apply(&second, |a| a.status = AppointmentStatus::Cancelled));
        assert!(!book.apply(&first, |a| a.status = AppointmentStatus::Rescheduled));
        assert_eq!(book.get("APT-0001").unwrap().status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn test_prune_drops_idle_entries_and_tickets() {
        let mut book = AppointmentBook::default();
        book.upsert(appointment("APT-0001", "2025-05-01", "09:00", 1));
        let ticket = book.begin("APT-0002");

        assert_eq!(book.prune(Duration::from_secs(3600)), 0);
        assert_eq!(book.len(), 1);
        assert!(book.is_latest(&ticket));

        assert_eq!(book.prune(Duration::ZERO), 1);
        assert!(book.is_empty());
        assert!(!book.is_latest(&ticket));
    }

    #[test]
    fn test_tickets_are_per_id() {
        let mut book = AppointmentBook::default();
        book.upsert(appointment("APT-0001", "2025-05-01", "09:00", 1));
        book.upsert(appointment("APT-0002", "2025-05-01", "10:00", 1));

        let a = book.begin("APT-0001");
        let _b = book.begin("APT-0002");
        assert!(book.is_latest(&a));
    }

    #[tokio::test]
    async fn test_create_once_from_draft() {
        let (api, manager) = setup();
        let mut draft = AppointmentDraft {
            pet_name: "Mimi".to_string(),
            breed: "Poodle".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 1),
            time_slot: NaiveTime::from_hms_opt(9, 0, 0),
            ..Default::default()
        };
        draft.services.toggle(SelectedService {
            service_id: "SPA-1".to_string(),
            name: "Tắm".to_string(),
            price: 150000,
        });

        let id = manager.create(&draft).await.unwrap();
        let created = manager.cached(&id).unwrap();
        assert_eq!(created.total_amount, 150000);
        assert_eq!(created.status, AppointmentStatus::Pending);
        assert_eq!(api.created().len(), 1);
    }

    #[tokio::test]
    async fn test_search_rejects_short_phone_without_network() {
        let (api, manager) = setup();
        let err = manager
            .search(&SearchCriteria::new(SearchKind::Phone, "12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(api.searches().is_empty());

        manager
            .search(&SearchCriteria::new(SearchKind::Phone, "0987654321"))
            .await
            .unwrap();
        assert_eq!(api.searches().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_clears_flags() {
        let (api, manager) = setup();
        api.insert(appointment("APT-0001", "2025-05-01", "09:00", 150000));
        manager.get("APT-0001").await.unwrap();

        let updated = manager.cancel("APT-0001").await.unwrap();
        assert_eq!(updated.status, AppointmentStatus::Cancelled);
        assert!(!updated.capabilities().can_cancel);
        assert!(!updated.capabilities().can_reschedule);
        assert_eq!(
            api.status_updates(),
            vec![("APT-0001".to_string(), AppointmentStatus::Cancelled)]
        );
    }

    #[tokio::test]
    async fn test_cancel_blocked_for_paid_online() {
        let (api, manager) = setup();
        let mut appt = appointment("APT-0003", "2025-05-01", "09:00", 150000);
        appt.payment_status = PaymentStatus::Paid;
        appt.payment_method = Some(PaymentMethod::Vnpay);
        api.insert(appt);
        manager.get("APT-0003").await.unwrap();

        assert!(manager.cancel("APT-0003").await.is_err());
        assert!(api.status_updates().is_empty());
    }

    #[tokio::test]
    async fn test_restore_reenables_actions() {
        let (api, manager) = setup();
        let mut appt = appointment("APT-0001", "2025-05-01", "09:00", 150000);
        appt.status = AppointmentStatus::Cancelled;
        api.insert(appt);
        manager.get("APT-0001").await.unwrap();

        let restored = manager.restore("APT-0001").await.unwrap();
        assert_eq!(restored.status, AppointmentStatus::Pending);
        assert!(restored.capabilities().can_cancel);
        assert!(restored.capabilities().can_reschedule);
    }

    #[tokio::test]
    async fn test_reschedule_updates_only_target() {
        let (api, manager) = setup();
        api.insert(appointment("APT-0001", "2025-05-01", "09:00", 150000));
        api.insert(appointment("APT-0002", "2025-05-02", "11:00", 90000));
        api.set_availability(
            NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            r#"{"10:00":{"available":2,"total":5}}"#,
        );
        manager
            .search(&SearchCriteria::new(SearchKind::Phone, "0987654321"))
            .await
            .unwrap();
        let availability = AvailabilityClient::new(api.clone(), Duration::ZERO);

        let plan = manager
            .plan_reschedule(&availability, "APT-0001", "2025-05-03", "10:00")
            .await
            .unwrap();
        assert_eq!(plan.current_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(plan.seats_left, 2);

        let updated = manager
            .reschedule("APT-0001", "2025-05-03T00:00:00.000Z", "10:00")
            .await
            .unwrap();
        assert_eq!(
            api.reschedules(),
            vec![(
                "APT-0001".to_string(),
                "2025-05-03".to_string(),
                "10:00:00".to_string()
            )]
        );
        assert_eq!(updated.appointment_date, NaiveDate::from_ymd_opt(2025, 5, 3).unwrap());

        let other = manager.cached("APT-0002").unwrap();
        assert_eq!(other.appointment_date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
        assert_eq!(other.appointment_time, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_plan_rejects_full_slot() {
        let (api, manager) = setup();
        api.insert(appointment("APT-0001", "2025-05-01", "09:00", 150000));
        api.set_availability(
            NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            r#"{"10:00":{"available":0,"total":5}}"#,
        );
        let availability = AvailabilityClient::new(api.clone(), Duration::ZERO);

        let err = manager
            .plan_reschedule(&availability, "APT-0001", "2025-05-03", "10:00")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_refetch_failure_keeps_optimistic_state() {
        let (api, manager) = setup();
        api.insert(appointment("APT-0001", "2025-05-01", "09:00", 150000));
        manager.get("APT-0001").await.unwrap();
        api.offline("get");

        let updated = manager.cancel("APT-0001").await.unwrap();
        assert_eq!(updated.status, AppointmentStatus::Cancelled);
    }
}
