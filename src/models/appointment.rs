use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::draft::AppointmentDraft;
use super::wire::{self, Amount};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "rescheduled" => Some(AppointmentStatus::Rescheduled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Pending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    #[serde(rename = "cash")]
    Cash,
    #[serde(rename = "vnpay", alias = "e-wallet")]
    Vnpay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Vnpay => "vnpay",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceLineItem {
    #[serde(deserialize_with = "wire::id", alias = "id")]
    pub service_id: String,
    #[serde(default, alias = "service_name")]
    pub name: String,
    #[serde(deserialize_with = "wire::amount")]
    pub price: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    #[serde(deserialize_with = "wire::id")]
    pub id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub pet_name: String,
    #[serde(default)]
    pub pet_type: Option<String>,
    #[serde(default)]
    pub pet_breed: Option<String>,
    #[serde(default)]
    pub pet_size: Option<String>,
    #[serde(default)]
    pub pet_notes: Option<String>,
    #[serde(deserialize_with = "wire::date")]
    pub appointment_date: NaiveDate,
    #[serde(deserialize_with = "wire::time")]
    pub appointment_time: NaiveTime,
    #[serde(default)]
    pub services: Vec<ServiceLineItem>,
    #[serde(deserialize_with = "wire::amount")]
    pub total_amount: Amount,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

impl Appointment {
    /// Client-side view of a freshly created appointment. The backend only
    /// returns the id, everything else is copied from the draft.
    pub fn from_draft(id: String, draft: &AppointmentDraft) -> Option<Self> {
        Some(Self {
            id,
            customer_name: Some(draft.contact_name.trim().to_string()),
            phone: Some(draft.phone.trim().to_string()),
            email: Some(draft.email.trim().to_string()),
            pet_name: draft.pet_name.trim().to_string(),
            pet_type: Some(draft.species.as_str().to_string()),
            pet_breed: Some(draft.breed.trim().to_string()),
            pet_size: Some(draft.size.as_str().to_string()),
            pet_notes: draft.care_notes.clone(),
            appointment_date: draft.date?,
            appointment_time: draft.time_slot?,
            services: draft.services.line_items(),
            total_amount: draft.services.total(),
            status: AppointmentStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
        })
    }

    pub fn line_item_total(&self) -> Amount {
        self.services
            .iter()
            .fold(0, |total: Amount, s| total.saturating_add(s.price))
    }

    pub fn capabilities(&self) -> Capabilities {
        derive_capabilities(self.status, self.payment_status, self.payment_method)
    }

    pub fn view(&self) -> AppointmentView {
        AppointmentView {
            appointment: self.clone(),
            capabilities: self.capabilities(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Capabilities {
    pub can_cancel: bool,
    pub can_reschedule: bool,
    pub can_review: bool,
}

/// The single place capability flags are computed. A paid appointment is
/// still cancellable when it was settled in cash at the counter.
pub fn derive_capabilities(
    status: AppointmentStatus,
    payment_status: PaymentStatus,
    payment_method: Option<PaymentMethod>,
) -> Capabilities {
    let paid = payment_status == PaymentStatus::Paid;
    Capabilities {
        can_cancel: status == AppointmentStatus::Pending
            && (!paid || payment_method == Some(PaymentMethod::Cash)),
        can_reschedule: matches!(
            status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        ),
        can_review: status == AppointmentStatus::Completed && paid,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}
