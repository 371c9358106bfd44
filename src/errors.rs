use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type AppResult<T> = Result<T, AppError>;

const CONNECTIVITY_NOTICE: &str = "Cannot reach the server. Please try again.";
const BACKEND_FALLBACK: &str = "The request could not be completed. Please try again.";
const GATEWAY_NOTICE: &str = "Payment was not completed. Please try again.";
const DELIVERY_FALLBACK: &str = "Could not send the verification code. Please try again.";
const CODE_FALLBACK: &str = "The verification code is invalid or has expired.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("backend rejected request ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Backend { status: u16, message: Option<String> },

    #[error("cannot reach server: {0}")]
    Connectivity(String),

    #[error("payment gateway returned code {0}")]
    Gateway(String),

    #[error("verification code delivery failed: {}", .0.as_deref().unwrap_or("no message"))]
    DeliveryFailed(Option<String>),

    #[error("verification code rejected: {}", .0.as_deref().unwrap_or("no message"))]
    CodeRejected(Option<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn backend(status: u16, message: Option<String>) -> Self {
        AppError::Backend {
            status,
            message: message.filter(|m| !m.trim().is_empty()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Backend { .. } => "backend_rejection",
            AppError::Connectivity(_) => "connectivity",
            AppError::Gateway(_) => "gateway_failure",
            AppError::DeliveryFailed(_) => "delivery_failed",
            AppError::CodeRejected(_) => "invalid_or_expired_code",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) | AppError::Config(_) => "internal",
        }
    }

    /// Text shown to the customer as a notice.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            AppError::Backend { message, .. } => message
                .clone()
                .unwrap_or_else(|| BACKEND_FALLBACK.to_string()),
            AppError::Connectivity(_) => CONNECTIVITY_NOTICE.to_string(),
            AppError::Gateway(_) => GATEWAY_NOTICE.to_string(),
            AppError::DeliveryFailed(message) => message
                .clone()
                .unwrap_or_else(|| DELIVERY_FALLBACK.to_string()),
            AppError::CodeRejected(message) => {
                message.clone().unwrap_or_else(|| CODE_FALLBACK.to_string())
            }
            AppError::Database(_) | AppError::Config(_) => BACKEND_FALLBACK.to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::CodeRejected(_) => StatusCode::BAD_REQUEST,
            AppError::Backend { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::Connectivity(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gateway(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            // The server answered, but not with the shape we expect.
            return AppError::backend(e.status().map(|s| s.as_u16()).unwrap_or(502), None);
        }
        AppError::Connectivity(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = serde_json::json!({
            "error": self.user_message(),
            "kind": self.kind(),
        });
        (status, axum::Json(body)).into_response()
    }
}
