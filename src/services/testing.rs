//! In-memory backend for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::{AppError, AppResult};
use crate::models::wire::{parse_api_date, parse_api_time};
use crate::models::{
    Appointment, AppointmentStatus, PaymentRecord, PaymentStatus, RawSlot, SearchCriteria,
    SearchKind, ServiceLineItem, TimeSlotAvailability,
};
use crate::services::api::{
    CreateAppointmentRequest, ManualPaymentRequest, PaymentMethodChange, PaymentUrlRequest,
    RescheduleResult, SpaApi, VerifyOutcome,
};

#[derive(Default)]
struct State {
    availability: HashMap<NaiveDate, TimeSlotAvailability>,
    availability_calls: Vec<NaiveDate>,
    appointments: HashMap<String, Appointment>,
    created: Vec<CreateAppointmentRequest>,
    status_updates: Vec<(String, AppointmentStatus)>,
    reschedules: Vec<(String, String, String)>,
    restores: Vec<String>,
    searches: Vec<SearchCriteria>,
    codes_sent: Vec<String>,
    valid_code: Option<String>,
    payment_urls: Vec<PaymentUrlRequest>,
    confirmations: Vec<Vec<(String, String)>>,
    manual_payments: Vec<(String, ManualPaymentRequest)>,
    history: HashMap<String, Vec<PaymentRecord>>,
    method_changes: Vec<(String, PaymentMethodChange)>,
    reschedule_status: Option<AppointmentStatus>,
    offline: HashSet<&'static str>,
    rejected: HashMap<&'static str, (u16, Option<String>)>,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    fn check(&self, op: &'static str) -> AppResult<()> {
        let state = self.state.lock().unwrap();
        if state.offline.contains(op) {
            return Err(AppError::Connectivity(format!("{op}: connection refused")));
        }
        if let Some((status, message)) = state.rejected.get(op) {
            return Err(AppError::backend(*status, message.clone()));
        }
        Ok(())
    }

    pub fn offline(&self, op: &'static str) {
        self.state.lock().unwrap().offline.insert(op);
    }

    pub fn online(&self, op: &'static str) {
        self.state.lock().unwrap().offline.remove(op);
    }

    pub fn reject(&self, op: &'static str, status: u16, message: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .rejected
            .insert(op, (status, message.map(str::to_string)));
    }

    pub fn fail_availability(&self) {
        self.offline("availability");
    }

    pub fn set_availability(&self, date: NaiveDate, json: &str) {
        let raw: std::collections::BTreeMap<String, RawSlot> = serde_json::from_str(json).unwrap();
        self.state
            .lock()
            .unwrap()
            .availability
            .insert(date, TimeSlotAvailability::from_raw(raw));
    }

    pub fn set_valid_code(&self, code: &str) {
        self.state.lock().unwrap().valid_code = Some(code.to_string());
    }

    pub fn set_reschedule_status(&self, status: AppointmentStatus) {
        self.state.lock().unwrap().reschedule_status = Some(status);
    }

    pub fn insert(&self, appointment: Appointment) {
        self.state
            .lock()
            .unwrap()
            .appointments
            .insert(appointment.id.clone(), appointment);
    }

    pub fn set_history(&self, id: &str, records: Vec<PaymentRecord>) {
        self.state.lock().unwrap().history.insert(id.to_string(), records);
    }

    pub fn stored(&self, id: &str) -> Option<Appointment> {
        self.state.lock().unwrap().appointments.get(id).cloned()
    }

    pub fn availability_calls(&self) -> Vec<NaiveDate> {
        self.state.lock().unwrap().availability_calls.clone()
    }

    pub fn created(&self) -> Vec<CreateAppointmentRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn status_updates(&self) -> Vec<(String, AppointmentStatus)> {
        self.state.lock().unwrap().status_updates.clone()
    }

    pub fn reschedules(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().reschedules.clone()
    }

    pub fn restores(&self) -> Vec<String> {
        self.state.lock().unwrap().restores.clone()
    }

    pub fn searches(&self) -> Vec<SearchCriteria> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn codes_sent(&self) -> Vec<String> {
        self.state.lock().unwrap().codes_sent.clone()
    }

    pub fn payment_urls(&self) -> Vec<PaymentUrlRequest> {
        self.state.lock().unwrap().payment_urls.clone()
    }

    pub fn confirmations(&self) -> Vec<Vec<(String, String)>> {
        self.state.lock().unwrap().confirmations.clone()
    }

    pub fn manual_payments(&self) -> Vec<(String, ManualPaymentRequest)> {
        self.state.lock().unwrap().manual_payments.clone()
    }

    pub fn method_changes(&self) -> Vec<(String, PaymentMethodChange)> {
        self.state.lock().unwrap().method_changes.clone()
    }
}

pub fn appointment(id: &str, date: &str, time: &str, price: i64) -> Appointment {
    Appointment {
        id: id.to_string(),
        customer_name: Some("Nguyen An".to_string()),
        phone: Some("0987654321".to_string()),
        email: Some("an@example.vn".to_string()),
        pet_name: "Mimi".to_string(),
        pet_type: Some("dog".to_string()),
        pet_breed: Some("Poodle".to_string()),
        pet_size: Some("small".to_string()),
        pet_notes: None,
        appointment_date: parse_api_date(date).unwrap(),
        appointment_time: parse_api_time(time).unwrap(),
        services: vec![ServiceLineItem {
            service_id: "SPA-1".to_string(),
            name: "Tắm".to_string(),
            price,
        }],
        total_amount: price,
        status: AppointmentStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        payment_method: None,
    }
}

#[async_trait]
impl SpaApi for FakeApi {
    async fn availability(&self, date: NaiveDate) -> AppResult<TimeSlotAvailability> {
        self.state.lock().unwrap().availability_calls.push(date);
        self.check("availability")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .availability
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_appointment(&self, request: &CreateAppointmentRequest) -> AppResult<String> {
        self.check("create")?;
        let mut state = self.state.lock().unwrap();
        state.created.push(request.clone());
        let id = format!("APT-{:04}", state.created.len());
        let data = &request.appointment_data;
        let mut appt = appointment(
            &id,
            &data.appointment_date,
            &data.appointment_time,
            data.total_amount,
        );
        appt.services = request
            .services
            .iter()
            .map(|s| ServiceLineItem {
                service_id: s.service_id.clone(),
                name: s.service_id.clone(),
                price: s.price,
            })
            .collect();
        state.appointments.insert(id.clone(), appt);
        Ok(id)
    }

    async fn get_appointment(&self, id: &str) -> AppResult<Appointment> {
        self.check("get")?;
        self.stored(id)
            .ok_or_else(|| AppError::backend(404, Some("Appointment not found".to_string())))
    }

    async fn update_status(
        &self,
        id: &str,
        status: AppointmentStatus,
    ) -> AppResult<AppointmentStatus> {
        self.check("update_status")?;
        let mut state = self.state.lock().unwrap();
        state.status_updates.push((id.to_string(), status));
        if let Some(appt) = state.appointments.get_mut(id) {
            appt.status = status;
        }
        Ok(status)
    }

    async fn reschedule(&self, id: &str, date: &str, time: &str) -> AppResult<RescheduleResult> {
        self.check("reschedule")?;
        let mut state = self.state.lock().unwrap();
        state
            .reschedules
            .push((id.to_string(), date.to_string(), time.to_string()));
        let forced = state.reschedule_status;
        let appt = state
            .appointments
            .get_mut(id)
            .ok_or_else(|| AppError::backend(404, None))?;
        appt.appointment_date = parse_api_date(date).unwrap();
        appt.appointment_time = parse_api_time(time).unwrap();
        if let Some(status) = forced {
            appt.status = status;
        }
        Ok(RescheduleResult {
            appointment_date: appt.appointment_date,
            appointment_time: appt.appointment_time,
            status: Some(appt.status),
        })
    }

    async fn restore(&self, id: &str) -> AppResult<()> {
        self.check("restore")?;
        let mut state = self.state.lock().unwrap();
        state.restores.push(id.to_string());
        if let Some(appt) = state.appointments.get_mut(id) {
            appt.status = AppointmentStatus::Pending;
        }
        Ok(())
    }

    async fn search(&self, criteria: &SearchCriteria) -> AppResult<Vec<Appointment>> {
        self.state.lock().unwrap().searches.push(criteria.clone());
        self.check("search")?;
        let state = self.state.lock().unwrap();
        let mut found: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| match criteria.kind {
                SearchKind::Phone => a.phone.as_deref() == Some(criteria.value.as_str()),
                SearchKind::Email => a.email.as_deref() == Some(criteria.value.as_str()),
                SearchKind::BookingId => a.id == criteria.value,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn send_verification_code(&self, email: &str) -> AppResult<()> {
        self.check("send_code")?;
        self.state.lock().unwrap().codes_sent.push(email.to_string());
        Ok(())
    }

    async fn verify_code(&self, _email: &str, code: &str) -> AppResult<VerifyOutcome> {
        self.check("verify_code")?;
        let state = self.state.lock().unwrap();
        let verified = state.valid_code.as_deref() == Some(code);
        Ok(VerifyOutcome {
            verified,
            message: (!verified).then(|| "Mã xác thực không đúng".to_string()),
        })
    }

    async fn create_payment_url(&self, request: &PaymentUrlRequest) -> AppResult<String> {
        self.check("payment_url")?;
        self.state.lock().unwrap().payment_urls.push(request.clone());
        Ok(format!(
            "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?vnp_TxnRef={}&vnp_Amount={}",
            request.appointment_id,
            request.amount * 100
        ))
    }

    async fn confirm_gateway_payment(&self, params: &[(String, String)]) -> AppResult<()> {
        self.state.lock().unwrap().confirmations.push(params.to_vec());
        self.check("confirm")
    }

    async fn create_payment(
        &self,
        id: &str,
        request: &ManualPaymentRequest,
    ) -> AppResult<Option<Appointment>> {
        self.check("create_payment")?;
        let mut state = self.state.lock().unwrap();
        state.manual_payments.push((id.to_string(), request.clone()));
        Ok(state.appointments.get_mut(id).map(|a| {
            a.payment_method = Some(request.payment_method);
            a.payment_status = PaymentStatus::Pending;
            a.clone()
        }))
    }

    async fn payment_history(&self, id: &str) -> AppResult<Vec<PaymentRecord>> {
        self.check("history")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .history
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn change_payment_method(
        &self,
        id: &str,
        change: &PaymentMethodChange,
    ) -> AppResult<()> {
        self.check("change_method")?;
        let mut state = self.state.lock().unwrap();
        state.method_changes.push((id.to_string(), change.clone()));
        if let Some(appt) = state.appointments.get_mut(id) {
            appt.payment_method = Some(change.new_payment_method);
        }
        Ok(())
    }
}

