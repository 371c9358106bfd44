use std::time::{Duration, Instant};

use crate::errors::{AppError, AppResult};
use crate::models::search::is_valid_email;
use crate::services::api::SpaApi;

/// One-time-code check of the booking contact's email. Holds only whether
/// a code was sent, the resend countdown, and which email got verified.
#[derive(Debug)]
pub struct VerificationGate {
    cooldown: Duration,
    sent_at: Option<Instant>,
    verified_email: Option<String>,
}

impl VerificationGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            sent_at: None,
            verified_email: None,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    pub fn cooldown_remaining(&self) -> Duration {
        self.sent_at
            .map(|at| self.cooldown.saturating_sub(at.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn verified_email(&self) -> Option<&str> {
        self.verified_email.as_deref()
    }

    pub fn is_verified_for(&self, email: &str) -> bool {
        self.verified_email
            .as_deref()
            .map(|v| v.eq_ignore_ascii_case(email.trim()))
            .unwrap_or(false)
    }

    /// Sends (or resends) a code. Each successful send restarts the countdown.
    pub async fn request_code(&mut self, api: &dyn SpaApi, email: &str) -> AppResult<()> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AppError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }

        let remaining = self.cooldown_remaining();
        if !remaining.is_zero() {
            return Err(AppError::Validation(format!(
                "Please wait {}s before requesting a new code",
                remaining.as_secs().max(1)
            )));
        }

        api.send_verification_code(email).await.map_err(|e| match e {
            AppError::Backend { message, .. } => AppError::DeliveryFailed(message),
            AppError::Connectivity(_) => AppError::DeliveryFailed(None),
            other => other,
        })?;

        tracing::info!(email, "verification code sent");
        self.sent_at = Some(Instant::now());
        Ok(())
    }

    /// Returns the verified email on success.
    pub async fn verify_code(
        &mut self,
        api: &dyn SpaApi,
        email: &str,
        code: &str,
    ) -> AppResult<String> {
        let email = email.trim();
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::Validation(
                "Please enter the verification code".to_string(),
            ));
        }

        let outcome = api.verify_code(email, code).await.map_err(|e| match e {
            AppError::Backend { message, .. } => AppError::CodeRejected(message),
            other => other,
        })?;

        if !outcome.verified {
            tracing::info!(email, "verification code rejected");
            return Err(AppError::CodeRejected(outcome.message));
        }

        tracing::info!(email, "email verified");
        self.verified_email = Some(email.to_string());
        Ok(email.to_string())
    }
}
