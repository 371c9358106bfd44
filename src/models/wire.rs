//! Lenient decoders for backend JSON. The backend is not consistent about
//! numbers vs strings for ids and amounts, or about date/time precision.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};

/// Amounts are whole VND.
pub type Amount = i64;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

pub fn amount<'de, D>(deserializer: D) -> Result<Amount, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(n) => Ok(n),
        NumberOrString::Float(f) => Ok(f.round() as Amount),
        NumberOrString::Text(s) => parse_amount(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {s}"))),
    }
}

pub fn parse_amount(s: &str) -> Option<Amount> {
    let s = s.trim();
    s.parse::<Amount>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as Amount))
}

pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Int(n) => Ok(n.to_string()),
        NumberOrString::Float(f) => Ok(f.to_string()),
        NumberOrString::Text(s) => Ok(s),
    }
}

pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_api_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
}

pub fn time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_api_time(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time: {raw}")))
}

/// Accepts `YYYY-MM-DD` and drops any time-of-day component
/// (`2025-05-03T00:00:00.000Z`, `2025-05-03 08:00:00`).
pub fn parse_api_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_api_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
