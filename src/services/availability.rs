use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::models::schedule::api_date;
use crate::models::TimeSlotAvailability;
use crate::services::api::SpaApi;
use crate::services::debounce::Debouncer;

/// Slot lookups for a date. Failures read as "no slots": a slot that might
/// not exist is never offered.
pub struct AvailabilityClient {
    api: Arc<dyn SpaApi>,
    debouncer: Debouncer,
}

impl AvailabilityClient {
    pub fn new(api: Arc<dyn SpaApi>, debounce: Duration) -> Self {
        Self {
            api,
            debouncer: Debouncer::new(debounce),
        }
    }

    async fn fetch(&self, date: NaiveDate) -> TimeSlotAvailability {
        match self.api.availability(date).await {
            Ok(slots) => slots,
            Err(e) => {
                tracing::warn!(date = %api_date(date), error = %e, "availability lookup failed, showing no slots");
                TimeSlotAvailability::empty()
            }
        }
    }

    pub async fn get_availability(&self, date: NaiveDate) -> TimeSlotAvailability {
        self.fetch(date).await
    }

    /// Debounced per `field`. `None` when a later lookup for the same field
    /// was issued before this one resolved.
    pub async fn lookup_debounced(
        &self,
        field: &str,
        date: NaiveDate,
    ) -> Option<TimeSlotAvailability> {
        self.debouncer.run(field, || self.fetch(date)).await
    }

    pub fn forget(&self, field: &str) {
        self.debouncer.forget(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeApi;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_failure_reads_as_empty() {
        let api = Arc::new(FakeApi::default());
        api.fail_availability();
        let client = AvailabilityClient::new(api, Duration::ZERO);

        let slots = client.get_availability(date(3)).await;
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn test_each_date_gets_its_own_slots() {
        let api = Arc::new(FakeApi::default());
        api.set_availability(date(3), r#"{"10:00":{"available":2,"total":5}}"#);
        api.set_availability(date(4), r#"{"14:00":{"available":1,"total":1}}"#);
        let client = AvailabilityClient::new(api, Duration::ZERO);

        client.get_availability(date(3)).await;
        let slots = client.get_availability(date(4)).await;

        assert_eq!(slots.open_slots().collect::<Vec<_>>(), vec!["14:00"]);
    }

    #[tokio::test]
    async fn test_debounced_lookup_keeps_last_date() {
        let api = Arc::new(FakeApi::default());
        api.set_availability(date(3), r#"{"10:00":{"available":2,"total":5}}"#);
        api.set_availability(date(5), r#"{"16:00":{"available":3,"total":3}}"#);
        let client = Arc::new(AvailabilityClient::new(api.clone(), Duration::from_millis(30)));

        let c1 = client.clone();
        let early = tokio::spawn(async move { c1.lookup_debounced("w1", date(3)).await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        let late = client.lookup_debounced("w1", date(5)).await;

        assert!(early.await.unwrap().is_none());
        assert!(late.unwrap().is_open(chrono::NaiveTime::from_hms_opt(16, 0, 0).unwrap()));
        assert_eq!(api.availability_calls(), vec![date(5)]);
    }
}
