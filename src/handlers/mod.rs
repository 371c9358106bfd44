pub mod appointments;
pub mod health;
pub mod payment;
pub mod session;
pub mod wizard;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/availability", get(wizard::get_availability))
        // ── Booking wizard ──
        .route("/api/wizard", post(wizard::start))
        .route("/api/wizard/:id", get(wizard::get_wizard).delete(wizard::abandon))
        .route("/api/wizard/:id/draft", put(wizard::update_draft))
        .route("/api/wizard/:id/services", post(wizard::toggle_service))
        .route("/api/wizard/:id/date", post(wizard::set_date))
        .route("/api/wizard/:id/time", post(wizard::select_time))
        .route("/api/wizard/:id/advance", post(wizard::advance))
        .route("/api/wizard/:id/back", post(wizard::back))
        .route(
            "/api/wizard/:id/verification/send",
            post(wizard::send_code),
        )
        .route(
            "/api/wizard/:id/verification/verify",
            post(wizard::verify_code),
        )
        .route("/api/wizard/:id/payment", post(wizard::pay))
        // ── Appointment management ──
        .route("/api/appointments/search", get(appointments::search))
        .route("/api/appointments/:id", get(appointments::get_appointment))
        .route("/api/appointments/:id/cancel", post(appointments::cancel))
        .route(
            "/api/appointments/:id/reschedule/preview",
            post(appointments::preview_reschedule),
        )
        .route(
            "/api/appointments/:id/reschedule",
            post(appointments::reschedule),
        )
        .route("/api/appointments/:id/restore", post(appointments::restore))
        .route(
            "/api/appointments/:id/payments",
            get(appointments::payment_summary),
        )
        .route("/api/appointments/:id/payment", post(appointments::pay))
        // ── Payment return ──
        .route("/payment/callback", get(payment::gateway_return))
        // ── Customer session ──
        .route("/api/session/:client/identity", get(session::get_identity))
        .route(
            "/api/session/:client/payments/:id/marker",
            get(payment::get_marker).delete(payment::clear_marker),
        )
        .route("/api/session/:client", delete(session::logout))
        .with_state(state)
}
