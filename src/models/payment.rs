use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::appointment::PaymentMethod;
use super::wire::{self, Amount};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Pending,
    Completed,
}

/// One entry of an appointment's payment history. Read-only on this side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(deserialize_with = "wire::amount")]
    pub amount: Amount,
    pub payment_method: PaymentMethod,
    #[serde(default, alias = "payment_date", alias = "created_at")]
    pub timestamp: Option<String>,
    pub status: PaymentRecordStatus,
    #[serde(default, alias = "notes")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentSummary {
    pub total_amount: Amount,
    pub paid_amount: Amount,
    pub remaining: Amount,
    pub records: Vec<PaymentRecord>,
}

impl PaymentSummary {
    /// Only completed records count towards the paid amount.
    pub fn new(total_amount: Amount, records: Vec<PaymentRecord>) -> Self {
        let paid_amount = records
            .iter()
            .filter(|r| r.status == PaymentRecordStatus::Completed)
            .fold(0, |paid: Amount, r| paid.saturating_add(r.amount.max(0)));
        Self {
            total_amount,
            paid_amount,
            remaining: total_amount.saturating_sub(paid_amount).max(0),
            records,
        }
    }
}

/// Left behind after a successful gateway return so other views can show
/// the paid state without refetching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentSuccessMarker {
    pub appointment_id: String,
    pub paid_at: DateTime<Utc>,
    pub transaction_no: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_completed_only() {
        let records: Vec<PaymentRecord> = serde_json::from_str(
            r#"[
                {"transaction_id":"T1","amount":"50000.00","payment_method":"cash","status":"completed","notes":"deposit"},
                {"transaction_id":null,"amount":100000,"payment_method":"vnpay","status":"pending"}
            ]"#,
        )
        .unwrap();
        let summary = PaymentSummary::new(150000, records);
        assert_eq!(summary.paid_amount, 50000);
        assert_eq!(summary.remaining, 100000);
        assert_eq!(summary.records[0].note.as_deref(), Some("deposit"));
    }

    #[test]
    fn test_overpaid_remaining_is_zero() {
        let record = PaymentRecord {
            transaction_id: None,
            amount: 200000,
            payment_method: PaymentMethod::Cash,
            timestamp: None,
            status: PaymentRecordStatus::Completed,
            note: None,
        };
        assert_eq!(PaymentSummary::new(150000, vec![record]).remaining, 0);
    }

    #[test]
    fn test_extreme_amounts_do_not_overflow() {
        let record = |amount| PaymentRecord {
            transaction_id: None,
            amount,
            payment_method: PaymentMethod::Vnpay,
            timestamp: None,
            status: PaymentRecordStatus::Completed,
            note: None,
        };
        let summary = PaymentSummary::new(150000, vec![record(Amount::MAX), record(Amount::MAX)]);
        assert_eq!(summary.paid_amount, Amount::MAX);
        assert_eq!(summary.remaining, 0);

        let summary = PaymentSummary::new(Amount::MAX, vec![record(-5)]);
        assert_eq!(summary.paid_amount, 0);
        assert_eq!(summary.remaining, Amount::MAX);
    }
}
