pub mod http;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::models::schedule::{api_date, api_time};
use crate::models::wire::{self, Amount};
use crate::models::{
    Appointment, AppointmentDraft, AppointmentStatus, PaymentMethod, PaymentRecord,
    PaymentRecordStatus, SearchCriteria, TimeSlotAvailability,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateAppointmentRequest {
    #[serde(rename = "appointmentData")]
    pub appointment_data: AppointmentData,
    pub services: Vec<ServiceLine>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentData {
    pub customer_name: String,
    pub phone: String,
    pub email: String,
    pub pet_name: String,
    pub pet_type: String,
    pub pet_breed: String,
    pub pet_size: String,
    pub pet_notes: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    pub total_amount: Amount,
    pub status: AppointmentStatus,
}

/// Service id plus the price the customer saw when booking.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceLine {
    pub service_id: String,
    pub price: Amount,
}

impl CreateAppointmentRequest {
    /// `None` while the draft has no date or time slot.
    pub fn from_draft(draft: &AppointmentDraft) -> Option<Self> {
        let date = draft.date?;
        let time = draft.time_slot?;
        Some(Self {
            appointment_data: AppointmentData {
                customer_name: draft.contact_name.trim().to_string(),
                phone: draft.phone.trim().to_string(),
                email: draft.email.trim().to_string(),
                pet_name: draft.pet_name.trim().to_string(),
                pet_type: draft.species.as_str().to_string(),
                pet_breed: draft.breed.trim().to_string(),
                pet_size: draft.size.as_str().to_string(),
                pet_notes: draft.care_notes.clone(),
                appointment_date: api_date(date),
                appointment_time: api_time(time),
                total_amount: draft.services.total(),
                status: AppointmentStatus::Pending,
            },
            services: draft
                .services
                .iter()
                .map(|s| ServiceLine {
                    service_id: s.service_id.clone(),
                    price: s.price,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleResult {
    #[serde(deserialize_with = "wire::date")]
    pub appointment_date: NaiveDate,
    #[serde(deserialize_with = "wire::time")]
    pub appointment_time: NaiveTime,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentUrlRequest {
    pub appointment_id: String,
    pub amount: Amount,
    pub redirect_url: String,
    #[serde(rename = "bankCode")]
    pub bank_code: String,
    #[serde(rename = "useIpnUrl")]
    pub use_ipn_url: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ManualPaymentRequest {
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    pub status: PaymentRecordStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentMethodChange {
    pub new_payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub verified: bool,
    pub message: Option<String>,
}

/// The remote spa backend. Every call maps onto one REST endpoint.
#[async_trait]
pub trait SpaApi: Send + Sync {
    async fn availability(&self, date: NaiveDate) -> AppResult<TimeSlotAvailability>;

    /// Returns the new appointment id.
    async fn create_appointment(&self, request: &CreateAppointmentRequest) -> AppResult<String>;

    async fn get_appointment(&self, id: &str) -> AppResult<Appointment>;

    async fn update_status(&self, id: &str, status: AppointmentStatus)
        -> AppResult<AppointmentStatus>;

    /// `date` is `YYYY-MM-DD`, `time` is `HH:MM:SS`.
    async fn reschedule(&self, id: &str, date: &str, time: &str) -> AppResult<RescheduleResult>;

    async fn restore(&self, id: &str) -> AppResult<()>;

    async fn search(&self, criteria: &SearchCriteria) -> AppResult<Vec<Appointment>>;

    async fn send_verification_code(&self, email: &str) -> AppResult<()>;

    async fn verify_code(&self, email: &str, code: &str) -> AppResult<VerifyOutcome>;

    /// Returns the gateway URL to send the customer to.
    async fn create_payment_url(&self, request: &PaymentUrlRequest) -> AppResult<String>;

    /// Forwards the gateway return parameters so the backend can settle.
    async fn confirm_gateway_payment(&self, params: &[(String, String)]) -> AppResult<()>;

    async fn create_payment(
        &self,
        id: &str,
        request: &ManualPaymentRequest,
    ) -> AppResult<Option<Appointment>>;

    async fn payment_history(&self, id: &str) -> AppResult<Vec<PaymentRecord>>;

    async fn change_payment_method(&self, id: &str, change: &PaymentMethodChange)
        -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectedService;

    #[test]
    fn test_create_request_wire_shape() {
        let mut draft = AppointmentDraft {
            pet_name: "Mimi".to_string(),
            breed: "Poodle".to_string(),
            contact_name: "Nguyen An".to_string(),
            phone: "0987654321".to_string(),
            email: "an@example.vn".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 1),
            time_slot: NaiveTime::from_hms_opt(9, 0, 0),
            ..Default::default()
        };
        draft.services.toggle(SelectedService {
            service_id: "SPA-1".to_string(),
            name: "Tắm".to_string(),
            price: 150000,
        });

        let request = CreateAppointmentRequest::from_draft(&draft).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["appointmentData"]["appointment_date"], "2025-05-01");
        assert_eq!(json["appointmentData"]["appointment_time"], "09:00:00");
        assert_eq!(json["appointmentData"]["total_amount"], 150000);
        assert_eq!(json["appointmentData"]["status"], "pending");
        assert_eq!(json["services"][0]["service_id"], "SPA-1");
        assert_eq!(json["services"][0]["price"], 150000);
    }

    #[test]
    fn test_create_request_needs_date_and_time() {
        let draft = AppointmentDraft::default();
        assert!(CreateAppointmentRequest::from_draft(&draft).is_none());
    }

    #[test]
    fn test_payment_url_request_field_names() {
        let json = serde_json::to_value(PaymentUrlRequest {
            appointment_id: "APT-0007".to_string(),
            amount: 150000,
            redirect_url: "http://localhost:3000/payment/callback".to_string(),
            bank_code: String::new(),
            use_ipn_url: true,
        })
        .unwrap();
        assert_eq!(json["bankCode"], "");
        assert_eq!(json["useIpnUrl"], true);
        assert_eq!(json["appointment_id"], "APT-0007");
    }
}
