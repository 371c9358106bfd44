use std::collections::BTreeMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use super::schedule::slot_key;
use super::wire::parse_api_time;

/// Slot capacity as reported by the backend, before sanitizing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSlot {
    pub available: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotCapacity {
    pub available: u32,
    pub total: u32,
}

impl SlotCapacity {
    /// Clamps into `0 <= available <= total`.
    pub fn sanitized(available: i64, total: i64) -> Self {
        let total = total.clamp(0, u32::MAX as i64) as u32;
        let available = available.clamp(0, total as i64) as u32;
        Self { available, total }
    }

    pub fn is_open(&self) -> bool {
        self.available > 0
    }
}

/// Open capacity per time of day for one date, keyed `HH:MM`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct TimeSlotAvailability {
    slots: BTreeMap<String, SlotCapacity>,
}

impl TimeSlotAvailability {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: BTreeMap<String, RawSlot>) -> Self {
        let mut slots = BTreeMap::new();
        for (key, slot) in raw {
            let Some(time) = parse_api_time(&key) else {
                tracing::warn!(slot = %key, "dropping slot with unparseable time");
                continue;
            };
            let capacity = SlotCapacity::sanitized(slot.available, slot.total);
            if capacity.available as i64 != slot.available || capacity.total as i64 != slot.total {
                tracing::warn!(
                    slot = %key,
                    available = slot.available,
                    total = slot.total,
                    "clamped inconsistent slot capacity"
                );
            }
            slots.insert(slot_key(time), capacity);
        }
        Self { slots }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, time: NaiveTime) -> Option<SlotCapacity> {
        self.slots.get(&slot_key(time)).copied()
    }

    pub fn is_open(&self, time: NaiveTime) -> bool {
        self.get(time).map(|c| c.is_open()).unwrap_or(false)
    }

    pub fn open_slots(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|(_, c)| c.is_open())
            .map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotCapacity)> {
        self.slots.iter().map(|(k, c)| (k.as_str(), c))
    }
}
