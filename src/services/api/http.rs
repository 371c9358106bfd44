use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{
    CreateAppointmentRequest, ManualPaymentRequest, PaymentMethodChange, PaymentUrlRequest,
    RescheduleResult, SpaApi, VerifyOutcome,
};
use crate::errors::{AppError, AppResult};
use crate::models::schedule::api_date;
use crate::models::{
    Appointment, AppointmentStatus, PaymentRecord, RawSlot, SearchCriteria, TimeSlotAvailability,
};

pub struct HttpSpaApi {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpSpaApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> anyhow::Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Each segment lands as exactly one encoded path segment, so an id can
    /// never add segments, a query or a fragment to the backend URL.
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return Err(AppError::Validation("Invalid appointment id".to_string()));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("invalid API_BASE_URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("API_BASE_URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and unwraps the `{success, message}` convention.
    async fn send(&self, request: RequestBuilder) -> AppResult<Value> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request.send().await?;
        let status = resp.status();
        let url = resp.url().path().to_string();
        let body = resp.text().await?;

        let data: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::String(body))
        };

        tracing::debug!(path = %url, status = status.as_u16(), "backend response");

        if !status.is_success() || data.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(AppError::backend(status.as_u16(), message_of(&data)));
        }

        Ok(data)
    }
}

fn message_of(data: &Value) -> Option<String> {
    match data {
        Value::String(s) => Some(s.clone()),
        _ => data
            .get("message")
            .or_else(|| data.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, what, "unexpected backend payload");
        AppError::backend(502, None)
    })
}

fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `{data: X}` or a bare `X`.
fn payload(mut data: Value) -> Value {
    match data.get_mut("data") {
        Some(inner) => inner.take(),
        None => data,
    }
}

#[async_trait]
impl SpaApi for HttpSpaApi {
    async fn availability(&self, date: NaiveDate) -> AppResult<TimeSlotAvailability> {
        let req = self
            .client
            .get(self.endpoint(&["spa-time-slots", "availability"])?)
            .query(&[("date", api_date(date))]);
        let data = payload(self.send(req).await?);
        if data.is_null() {
            return Ok(TimeSlotAvailability::empty());
        }
        let raw: BTreeMap<String, RawSlot> = decode(data, "availability")?;
        Ok(TimeSlotAvailability::from_raw(raw))
    }

    async fn create_appointment(&self, request: &CreateAppointmentRequest) -> AppResult<String> {
        let req = self.client.post(self.endpoint(&["spa-appointments"])?).json(request);
        let data = self.send(req).await?;

        // The create endpoint double-wraps: {data: {data: {id}}}.
        data.pointer("/data/data/id")
            .or_else(|| data.pointer("/data/id"))
            .and_then(id_of)
            .ok_or_else(|| {
                tracing::warn!(response = %data, "create response carried no appointment id");
                AppError::backend(502, None)
            })
    }

    async fn get_appointment(&self, id: &str) -> AppResult<Appointment> {
        let req = self.client.get(self.endpoint(&["spa-appointments", id])?);
        decode(payload(self.send(req).await?), "appointment")
    }

    async fn update_status(
        &self,
        id: &str,
        status: AppointmentStatus,
    ) -> AppResult<AppointmentStatus> {
        let req = self
            .client
            .put(self.endpoint(&["spa-appointments", id, "status"])?)
            .json(&json!({ "status": status }));
        let data = self.send(req).await?;
        Ok(data
            .pointer("/data/status")
            .and_then(Value::as_str)
            .and_then(AppointmentStatus::parse)
            .unwrap_or(status))
    }

    async fn reschedule(&self, id: &str, date: &str, time: &str) -> AppResult<RescheduleResult> {
        let req = self
            .client
            .put(self.endpoint(&["spa-appointments", id, "reschedule"])?)
            .json(&json!({
                "appointment_date": date,
                "appointment_time": time,
            }));
        decode(payload(self.send(req).await?), "reschedule")
    }

    async fn restore(&self, id: &str) -> AppResult<()> {
        let req = self
            .client
            .put(self.endpoint(&["spa-appointments", id, "restore"])?);
        self.send(req).await?;
        Ok(())
    }

    async fn search(&self, criteria: &SearchCriteria) -> AppResult<Vec<Appointment>> {
        let req = self
            .client
            .get(self.endpoint(&["spa-appointments", "search"])?)
            .query(&[("type", criteria.kind.as_str()), ("value", criteria.value.as_str())]);
        let data = payload(self.send(req).await?);
        if data.is_null() {
            return Ok(vec![]);
        }
        decode(data, "search results")
    }

    async fn send_verification_code(&self, email: &str) -> AppResult<()> {
        let req = self
            .client
            .post(self.endpoint(&["verification", "send-code"])?)
            .json(&json!({ "email": email }));
        self.send(req).await?;
        Ok(())
    }

    async fn verify_code(&self, email: &str, code: &str) -> AppResult<VerifyOutcome> {
        let req = self
            .client
            .post(self.endpoint(&["verification", "verify-code"])?)
            .json(&json!({ "email": email, "code": code }));
        let data = self.send(req).await?;
        Ok(VerifyOutcome {
            verified: data.get("verified").and_then(Value::as_bool).unwrap_or(false),
            message: message_of(&data),
        })
    }

    async fn create_payment_url(&self, request: &PaymentUrlRequest) -> AppResult<String> {
        let req = self
            .client
            .post(self.endpoint(&["vnpay", "create-payment-url"])?)
            .json(request);
        let data = self.send(req).await?;
        data.get("paymentUrl")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::backend(502, message_of(&data)))
    }

    async fn confirm_gateway_payment(&self, params: &[(String, String)]) -> AppResult<()> {
        let req = self.client.get(self.endpoint(&["vnpay", "callback"])?).query(params);
        self.send(req).await?;
        Ok(())
    }

    async fn create_payment(
        &self,
        id: &str,
        request: &ManualPaymentRequest,
    ) -> AppResult<Option<Appointment>> {
        let req = self
            .client
            .post(self.endpoint(&["payments", "appointments", id, "payments"])?)
            .json(request);
        let data = self.send(req).await?;
        Ok(data
            .pointer("/data/appointment")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    async fn payment_history(&self, id: &str) -> AppResult<Vec<PaymentRecord>> {
        let req = self
            .client
            .get(self.endpoint(&["payments", "appointments", id, "payments"])?);
        let data = payload(self.send(req).await?);
        if data.is_null() {
            return Ok(vec![]);
        }
        decode(data, "payment history")
    }

    async fn change_payment_method(
        &self,
        id: &str,
        change: &PaymentMethodChange,
    ) -> AppResult<()> {
        let req = self
            .client
            .put(self.endpoint(&["payments", "appointments", id, "payment-method"])?)
            .json(change);
        self.send(req).await?;
        Ok(())
    }
}
