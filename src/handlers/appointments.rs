use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::errors::AppResult;
use crate::handlers::payment::payment_response;
use crate::models::search::check_appointment_id;
use crate::models::{AppointmentView, CustomerIdentity, PaymentSummary, SearchCriteria, SearchKind};
use crate::services::lifecycle::ReschedulePlan;
use crate::services::payment::{PaymentOutcome, PaymentRequest};
use crate::state::AppState;
use crate::store::CUSTOMER_IDENTITY;

// GET /api/appointments/search?type=phone&value=0987654321&client=abc
#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub value: String,
    /// Browser session that remembers who searched.
    pub client: Option<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<AppointmentView>>> {
    let criteria = SearchCriteria::new(query.kind, query.value);
    let found = state.appointments.search(&criteria).await?;

    if let Some(client) = query.client.as_deref().filter(|c| !c.is_empty()) {
        let identity = CustomerIdentity {
            kind: criteria.kind,
            value: criteria.value.clone(),
            saved_at: Utc::now(),
        };
        if let Err(e) = state.store.set(client, &CUSTOMER_IDENTITY, &identity) {
            tracing::warn!(error = %e, "failed to remember customer identity");
        }
    }

    Ok(Json(found.iter().map(|a| a.view()).collect()))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentView>> {
    check_appointment_id(&id)?;
    let appointment = state.appointments.get(&id).await?;
    Ok(Json(appointment.view()))
}

// POST /api/appointments/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentView>> {
    check_appointment_id(&id)?;
    let appointment = state.appointments.cancel(&id).await?;
    Ok(Json(appointment.view()))
}

// POST /api/appointments/:id/restore
pub async fn restore(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentView>> {
    check_appointment_id(&id)?;
    let appointment = state.appointments.restore(&id).await?;
    Ok(Json(appointment.view()))
}

#[derive(Deserialize)]
pub struct RescheduleBody {
    pub date: String,
    pub time: String,
}

// POST /api/appointments/:id/reschedule/preview
pub async fn preview_reschedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> AppResult<Json<ReschedulePlan>> {
    check_appointment_id(&id)?;
    let plan = state
        .appointments
        .plan_reschedule(&state.availability, &id, &body.date, &body.time)
        .await?;
    Ok(Json(plan))
}

// POST /api/appointments/:id/reschedule
pub async fn reschedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> AppResult<Json<AppointmentView>> {
    check_appointment_id(&id)?;
    let appointment = state
        .appointments
        .reschedule(&id, &body.date, &body.time)
        .await?;
    Ok(Json(appointment.view()))
}

// GET /api/appointments/:id/payments
pub async fn payment_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<PaymentSummary>> {
    check_appointment_id(&id)?;
    let appointment = state.appointments.get(&id).await?;
    Ok(Json(state.payments.summary(&appointment).await))
}

// POST /api/appointments/:id/payment
pub async fn pay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> AppResult<Response> {
    check_appointment_id(&id)?;
    let appointment = state.appointments.get(&id).await?;
    let outcome = state.payments.pay(&appointment, &request).await?;
    if let PaymentOutcome::Recorded {
        appointment: Some(updated),
    } = &outcome
    {
        state.appointments.remember(updated.clone());
    }
    Ok(payment_response(outcome))
}
