use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

static PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10,11}$").unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());
static BOOKING_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]+-\d{4}$").unwrap());
static BOOKING_CODE_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]+-\d{4}\b").unwrap());
static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,20}$").unwrap());

pub fn is_valid_phone(value: &str) -> bool {
    PHONE.is_match(value.trim())
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

pub fn is_booking_code(value: &str) -> bool {
    BOOKING_CODE.is_match(value.trim())
}

/// Appointment ids are booking codes or the backend's plain numeric ids.
pub fn is_appointment_id(value: &str) -> bool {
    BOOKING_CODE.is_match(value) || NUMERIC_ID.is_match(value)
}

pub fn check_appointment_id(value: &str) -> AppResult<()> {
    if is_appointment_id(value) {
        return Ok(());
    }
    Err(AppError::Validation("Invalid appointment id".to_string()))
}

/// First booking code embedded in free text, e.g. a gateway order
/// description like "Thanh toan lich hen APT-0007".
pub fn find_booking_code(text: &str) -> Option<String> {
    BOOKING_CODE_IN_TEXT
        .find(text)
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SearchKind {
    #[serde(rename = "phone")]
    Phone,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "bookingId")]
    BookingId,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Phone => "phone",
            SearchKind::Email => "email",
            SearchKind::BookingId => "bookingId",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCriteria {
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub value: String,
}

impl SearchCriteria {
    pub fn new(kind: SearchKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        let ok = match self.kind {
            SearchKind::Phone => is_valid_phone(&self.value),
            SearchKind::Email => is_valid_email(&self.value),
            SearchKind::BookingId => is_booking_code(&self.value),
        };
        if ok {
            return Ok(());
        }
        let msg = match self.kind {
            SearchKind::Phone => "Phone number must have 10 or 11 digits",
            SearchKind::Email => "Please enter a valid email address",
            SearchKind::BookingId => "Booking code must look like APT-0001",
        };
        Err(AppError::Validation(msg.to_string()))
    }
}

/// Who the anonymous customer last identified as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerIdentity {
    pub kind: SearchKind,
    pub value: String,
    pub saved_at: DateTime<Utc>,
}
