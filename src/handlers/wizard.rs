use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::handlers::payment::payment_response;
use crate::models::wire::{parse_api_date, parse_api_time};
use crate::models::{DraftPatch, SelectedService, TimeSlotAvailability};
use crate::services::payment::{PaymentOutcome, PaymentRequest};
use crate::services::wizard::{AdvanceOutcome, WizardStep, WizardView};
use crate::state::AppState;

fn parse_date(raw: &str) -> AppResult<chrono::NaiveDate> {
    parse_api_date(raw).ok_or_else(|| AppError::Validation(format!("Invalid date: {raw}")))
}

// GET /api/availability?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<TimeSlotAvailability>> {
    let date = parse_date(&query.date)?;
    Ok(Json(state.availability.get_availability(date).await))
}

// POST /api/wizard
pub async fn start(State(state): State<Arc<AppState>>) -> Response {
    let (id, wizard) = state.start_wizard();
    tracing::info!(wizard = %id, "booking session started");
    let view = wizard.lock().await.view();
    (StatusCode::CREATED, Json(view)).into_response()
}

// GET /api/wizard/:id
pub async fn get_wizard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WizardView>> {
    let wizard = state.wizard(id)?;
    let view = wizard.lock().await.view();
    Ok(Json(view))
}

// DELETE /api/wizard/:id
pub async fn abandon(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> StatusCode {
    if state.abandon_wizard(id) {
        tracing::info!(wizard = %id, "booking session abandoned");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// PUT /api/wizard/:id/draft
pub async fn update_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<DraftPatch>,
) -> AppResult<Json<WizardView>> {
    let wizard = state.wizard(id)?;
    let mut wizard = wizard.lock().await;
    wizard.update_draft(patch)?;
    Ok(Json(wizard.view()))
}

// POST /api/wizard/:id/services
#[derive(Serialize)]
pub struct ToggleResponse {
    pub selected: bool,
    pub wizard: WizardView,
}

pub async fn toggle_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(service): Json<SelectedService>,
) -> AppResult<Json<ToggleResponse>> {
    let wizard = state.wizard(id)?;
    let mut wizard = wizard.lock().await;
    let selected = wizard.toggle_service(service)?;
    Ok(Json(ToggleResponse {
        selected,
        wizard: wizard.view(),
    }))
}

// POST /api/wizard/:id/date
#[derive(Deserialize)]
pub struct DateBody {
    pub date: String,
}

/// Sets the date, then looks up its slots after the debounce delay. A
/// lookup superseded by a later date change leaves the slots empty.
pub async fn set_date(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<DateBody>,
) -> AppResult<Json<WizardView>> {
    let date = parse_date(&body.date)?;
    let wizard = state.wizard(id)?;
    wizard.lock().await.set_date(date)?;

    if let Some(slots) = state.availability.lookup_debounced(&id.to_string(), date).await {
        wizard.lock().await.set_availability(date, slots);
    }

    let view = wizard.lock().await.view();
    Ok(Json(view))
}

// POST /api/wizard/:id/time
#[derive(Deserialize)]
pub struct TimeBody {
    pub time: String,
}

pub async fn select_time(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<TimeBody>,
) -> AppResult<Json<WizardView>> {
    let time = parse_api_time(&body.time)
        .ok_or_else(|| AppError::Validation(format!("Invalid time: {}", body.time)))?;
    let wizard = state.wizard(id)?;
    let mut wizard = wizard.lock().await;
    wizard.select_time(time)?;
    Ok(Json(wizard.view()))
}

// POST /api/wizard/:id/advance
#[derive(Serialize)]
pub struct AdvanceResponse {
    #[serde(flatten)]
    pub outcome: AdvanceOutcome,
    pub wizard: WizardView,
}

pub async fn advance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AdvanceResponse>> {
    let wizard = state.wizard(id)?;
    let mut wizard = wizard.lock().await;
    let outcome = wizard.advance(&state.appointments).await?;
    Ok(Json(AdvanceResponse {
        outcome,
        wizard: wizard.view(),
    }))
}

// POST /api/wizard/:id/back
pub async fn back(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WizardView>> {
    let wizard = state.wizard(id)?;
    let mut wizard = wizard.lock().await;
    wizard.back();
    Ok(Json(wizard.view()))
}

// POST /api/wizard/:id/verification/send
pub async fn send_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<WizardView>> {
    let wizard = state.wizard(id)?;
    let mut wizard = wizard.lock().await;
    wizard.request_code(state.api.as_ref()).await?;
    Ok(Json(wizard.view()))
}

// POST /api/wizard/:id/verification/verify
#[derive(Deserialize)]
pub struct VerifyBody {
    pub code: String,
}

pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<VerifyBody>,
) -> AppResult<Json<AdvanceResponse>> {
    let wizard = state.wizard(id)?;
    let mut wizard = wizard.lock().await;
    let outcome = wizard
        .verify_code(state.api.as_ref(), &state.appointments, &body.code)
        .await?;
    Ok(Json(AdvanceResponse {
        outcome,
        wizard: wizard.view(),
    }))
}

// POST /api/wizard/:id/payment
pub async fn pay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> AppResult<Response> {
    let wizard = state.wizard(id)?;
    let appointment = {
        let wizard = wizard.lock().await;
        if wizard.step() != WizardStep::Payment {
            return Err(AppError::Validation(
                "Please confirm your booking first".to_string(),
            ));
        }
        wizard
            .appointment()
            .cloned()
            .ok_or_else(|| AppError::Conflict("Booking has not been created".to_string()))?
    };

    let outcome = state.payments.pay(&appointment, &request).await?;
    if let PaymentOutcome::Recorded {
        appointment: Some(updated),
    } = &outcome
    {
        state.appointments.remember(updated.clone());
        wizard.lock().await.set_appointment(updated.clone());
    }
    Ok(payment_response(outcome))
}
