use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;

use crate::errors::{AppError, AppResult};
use crate::models::search::check_appointment_id;
use crate::models::PaymentSuccessMarker;
use crate::services::payment::{CallbackOutcome, GatewayReturn, PaymentOutcome};
use crate::state::AppState;

/// Online payments answer with a redirect to the gateway page, everything
/// else with JSON.
pub fn payment_response(outcome: PaymentOutcome) -> Response {
    match outcome {
        PaymentOutcome::Redirect { url } => Redirect::to(&url).into_response(),
        recorded => Json(recorded).into_response(),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><main><h1>{title}</h1>{body}</main></body></html>"
    )
}

// GET /payment/callback?vnp_ResponseCode=00&...
pub async fn gateway_return(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let ret = GatewayReturn::new(params);
    let reconciliation = state.payments.reconcile(&ret);

    match reconciliation.outcome {
        CallbackOutcome::Succeeded {
            appointment_id,
            transaction_no,
        } => {
            let mut body = String::from("<p>Your payment was received.</p>");
            if let Some(no) = &transaction_no {
                body.push_str(&format!("<p>Transaction number: {}</p>", escape_html(no)));
            }

            let refresh = appointment_id.as_deref().and_then(|id| {
                let delay = state.config.confirmation_delay.as_secs();
                HeaderValue::from_str(&format!("{delay}; url=/booking/confirmation/{id}")).ok()
            });
            if let (Some(id), Some(_)) = (&appointment_id, &refresh) {
                body.push_str(&format!(
                    "<p>Booking {}. Taking you to your confirmation...</p>",
                    escape_html(id)
                ));
            }

            let mut response = Html(page("Payment successful", &body)).into_response();
            if let Some(value) = refresh {
                response.headers_mut().insert(header::REFRESH, value);
            }
            response
        }
        CallbackOutcome::Failed { code } => {
            let notice = AppError::Gateway(code.unwrap_or_default()).user_message();
            Html(page(
                "Payment failed",
                &format!("<p>{}</p>", escape_html(&notice)),
            ))
            .into_response()
        }
    }
}

// GET /api/session/:client/payments/:id/marker
pub async fn get_marker(
    State(state): State<Arc<AppState>>,
    Path((client, id)): Path<(String, String)>,
) -> AppResult<Json<PaymentSuccessMarker>> {
    check_appointment_id(&id)?;
    state
        .payments
        .marker(&client, &id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no payment marker for {id}")))
}

// DELETE /api/session/:client/payments/:id/marker
pub async fn clear_marker(
    State(state): State<Arc<AppState>>,
    Path((client, id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    check_appointment_id(&id)?;
    state.payments.clear_marker(&client, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
