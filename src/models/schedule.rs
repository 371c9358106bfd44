use chrono::{NaiveDate, NaiveTime};

/// `YYYY-MM-DD` from the calendar day itself. Never goes through UTC.
pub fn api_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `HH:MM:SS`, the precision the appointment endpoints require.
pub fn api_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// `HH:MM`, the key format of the availability map.
pub fn slot_key(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}
