use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::errors::{AppError, AppResult};
use crate::models::search::{find_booking_code, is_appointment_id, is_booking_code};
use crate::models::{
    Amount, Appointment, PaymentMethod, PaymentRecordStatus, PaymentSuccessMarker, PaymentSummary,
};
use crate::services::api::{ManualPaymentRequest, PaymentMethodChange, PaymentUrlRequest, SpaApi};
use crate::store::{SessionStore, PAYMENT_SUCCESS};

pub const GATEWAY_SUCCESS_CODE: &str = "00";

/// Query parameter carrying the appointment id through the gateway round trip.
pub const CORRELATION_PARAM: &str = "appointment";

/// Query parameter carrying the paying browser's session through the round
/// trip. The success marker is only ever written into that session.
pub const CLIENT_PARAM: &str = "client";

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    /// Defaults to the remaining balance.
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub note: Option<String>,
    /// Browser session that receives the success marker.
    #[serde(default)]
    pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Cash: recorded as pending, settled in person.
    Recorded { appointment: Option<Appointment> },
    /// Online: the customer leaves for the gateway page.
    Redirect { url: String },
}

/// Parameters the gateway appends to the return URL.
#[derive(Debug, Clone, Default)]
pub struct GatewayReturn {
    params: Vec<(String, String)>,
}

impl GatewayReturn {
    pub fn new(params: Vec<(String, String)>) -> Self {
        Self { params }
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn response_code(&self) -> Option<&str> {
        self.param("vnp_ResponseCode")
    }

    pub fn transaction_no(&self) -> Option<&str> {
        self.param("vnp_TransactionNo")
    }

    pub fn client(&self) -> Option<&str> {
        self.param(CLIENT_PARAM)
    }

    pub fn is_success(&self) -> bool {
        self.response_code() == Some(GATEWAY_SUCCESS_CODE)
    }

    /// Our own correlation parameter first, then the merchant reference,
    /// and only then a booking code found in the order description.
    pub fn appointment_id(&self) -> Option<String> {
        if let Some(id) = self.param(CORRELATION_PARAM) {
            return Some(id.to_string()).filter(|id| is_appointment_id(id));
        }
        if let Some(txn_ref) = self.param("vnp_TxnRef").filter(|r| is_booking_code(r)) {
            return Some(txn_ref.to_string());
        }
        self.param("vnp_OrderInfo").and_then(find_booking_code)
    }

    /// Only the gateway's own parameters are forwarded to the backend.
    pub fn gateway_params(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter(|(k, _)| k.starts_with("vnp_"))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    Succeeded {
        appointment_id: Option<String>,
        transaction_no: Option<String>,
    },
    Failed {
        code: Option<String>,
    },
}

pub struct Reconciliation {
    pub outcome: CallbackOutcome,
    /// Backend confirmation running in the background. Nobody has to wait
    /// for it.
    pub notification: Option<JoinHandle<()>>,
}

pub struct PaymentOrchestrator {
    api: Arc<dyn SpaApi>,
    store: Arc<dyn SessionStore>,
    return_url: String,
    bank_code: String,
}

impl PaymentOrchestrator {
    pub fn new(
        api: Arc<dyn SpaApi>,
        store: Arc<dyn SessionStore>,
        public_origin: &str,
        bank_code: impl Into<String>,
    ) -> Self {
        Self {
            api,
            store,
            return_url: format!("{}/payment/callback", public_origin.trim_end_matches('/')),
            bank_code: bank_code.into(),
        }
    }

    pub fn return_url_for(&self, appointment_id: &str, client: Option<&str>) -> AppResult<String> {
        let mut url = reqwest::Url::parse(&self.return_url)
            .map_err(|e| AppError::Config(format!("invalid return url {}: {e}", self.return_url)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(CORRELATION_PARAM, appointment_id);
            if let Some(client) = client.map(str::trim).filter(|c| !c.is_empty()) {
                query.append_pair(CLIENT_PARAM, client);
            }
        }
        Ok(url.to_string())
    }

    /// Paid amount is summed from completed history records. If the history
    /// cannot be loaded nothing counts as paid.
    pub async fn summary(&self, appointment: &Appointment) -> PaymentSummary {
        let records = match self.api.payment_history(&appointment.id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(appointment_id = %appointment.id, error = %e, "payment history unavailable");
                Vec::new()
            }
        };
        PaymentSummary::new(appointment.total_amount, records)
    }

    pub fn validate_amount(amount: Amount, remaining: Amount) -> AppResult<()> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "Payment amount must be greater than zero".to_string(),
            ));
        }
        if amount > remaining {
            return Err(AppError::Validation(format!(
                "Payment amount cannot exceed the remaining balance of {remaining}"
            )));
        }
        Ok(())
    }

    pub async fn pay(
        &self,
        appointment: &Appointment,
        request: &PaymentRequest,
    ) -> AppResult<PaymentOutcome> {
        let summary = self.summary(appointment).await;
        match request.method {
            PaymentMethod::Cash => {
                let amount = request.amount.unwrap_or(summary.remaining);
                Self::validate_amount(amount, summary.remaining)?;
                self.pay_cash(appointment, amount, request.note.clone()).await
            }
            PaymentMethod::Vnpay => {
                let switching = appointment.payment_method == Some(PaymentMethod::Cash);
                let amount = if switching {
                    summary.remaining
                } else {
                    request.amount.unwrap_or(summary.remaining)
                };
                Self::validate_amount(amount, summary.remaining)?;
                if switching {
                    self.switch_to_online(appointment).await?;
                }
                self.pay_online(appointment, amount, request.client.as_deref())
                    .await
            }
        }
    }

    async fn pay_cash(
        &self,
        appointment: &Appointment,
        amount: Amount,
        note: Option<String>,
    ) -> AppResult<PaymentOutcome> {
        let request = ManualPaymentRequest {
            amount,
            payment_method: PaymentMethod::Cash,
            status: PaymentRecordStatus::Pending,
            notes: note,
        };
        let updated = self.api.create_payment(&appointment.id, &request).await?;
        tracing::info!(appointment_id = %appointment.id, amount, "cash payment recorded");
        Ok(PaymentOutcome::Recorded {
            appointment: updated,
        })
    }

    async fn switch_to_online(&self, appointment: &Appointment) -> AppResult<()> {
        let change = PaymentMethodChange {
            new_payment_method: PaymentMethod::Vnpay,
            transaction_id: None,
        };
        self.api
            .change_payment_method(&appointment.id, &change)
            .await?;
        tracing::info!(appointment_id = %appointment.id, "payment method switched from cash to vnpay");
        Ok(())
    }

    async fn pay_online(
        &self,
        appointment: &Appointment,
        amount: Amount,
        client: Option<&str>,
    ) -> AppResult<PaymentOutcome> {
        let request = PaymentUrlRequest {
            appointment_id: appointment.id.clone(),
            amount,
            redirect_url: self.return_url_for(&appointment.id, client)?,
            bank_code: self.bank_code.clone(),
            use_ipn_url: true,
        };
        let url = self.api.create_payment_url(&request).await?;
        tracing::info!(appointment_id = %appointment.id, amount, "redirecting to payment gateway");
        Ok(PaymentOutcome::Redirect { url })
    }

    /// Handles the customer's return from the gateway. On success the
    /// backend is notified without waiting and a success marker is stored
    /// in the returning client's session, if the return names one.
    pub fn reconcile(&self, ret: &GatewayReturn) -> Reconciliation {
        if !ret.is_success() {
            tracing::warn!(code = ?ret.response_code(), "gateway reported failed payment");
            return Reconciliation {
                outcome: CallbackOutcome::Failed {
                    code: ret.response_code().map(str::to_string),
                },
                notification: None,
            };
        }

        let appointment_id = ret.appointment_id();
        let transaction_no = ret.transaction_no().map(str::to_string);

        let api = self.api.clone();
        let params = ret.gateway_params();
        let notification = tokio::spawn(async move {
            if let Err(e) = api.confirm_gateway_payment(&params).await {
                tracing::warn!(error = %e, "failed to notify backend of gateway payment");
            }
        });

        match (&appointment_id, ret.client()) {
            (Some(id), Some(client)) => {
                let marker = PaymentSuccessMarker {
                    appointment_id: id.clone(),
                    paid_at: Utc::now(),
                    transaction_no: transaction_no.clone(),
                };
                if let Err(e) = self.store_marker(client, marker) {
                    tracing::warn!(appointment_id = %id, error = %e, "failed to store payment marker");
                }
                tracing::info!(appointment_id = %id, transaction_no = ?transaction_no, "gateway payment succeeded");
            }
            (Some(id), None) => {
                tracing::info!(appointment_id = %id, transaction_no = ?transaction_no, "gateway payment succeeded without a client session");
            }
            (None, _) => tracing::warn!("gateway payment succeeded but no appointment id could be found"),
        }

        Reconciliation {
            outcome: CallbackOutcome::Succeeded {
                appointment_id,
                transaction_no,
            },
            notification: Some(notification),
        }
    }

    fn markers(&self, client: &str) -> AppResult<BTreeMap<String, PaymentSuccessMarker>> {
        Ok(self.store.get(client, &PAYMENT_SUCCESS)?.unwrap_or_default())
    }

    fn store_marker(&self, client: &str, marker: PaymentSuccessMarker) -> AppResult<()> {
        let mut markers = self.markers(client)?;
        markers.insert(marker.appointment_id.clone(), marker);
        self.store.set(client, &PAYMENT_SUCCESS, &markers)
    }

    pub fn marker(&self, client: &str, appointment_id: &str) -> AppResult<Option<PaymentSuccessMarker>> {
        Ok(self.markers(client)?.remove(appointment_id))
    }

    pub fn clear_marker(&self, client: &str, appointment_id: &str) -> AppResult<bool> {
        let mut markers = self.markers(client)?;
        if markers.remove(appointment_id).is_none() {
            return Ok(false);
        }
        if markers.is_empty() {
            self.store.clear(client, &PAYMENT_SUCCESS)?;
        } else {
            self.store.set(client, &PAYMENT_SUCCESS, &markers)?;
        }
        Ok(true)
    }
}
