use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::appointment::ServiceLineItem;
use super::wire::Amount;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    #[default]
    Dog,
    Cat,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    #[default]
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeClass::Small => "small",
            SizeClass::Medium => "medium",
            SizeClass::Large => "large",
        }
    }
}

/// Highest unit price accepted for a single service, in VND.
pub const MAX_SERVICE_PRICE: Amount = 100_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedService {
    pub service_id: String,
    pub name: String,
    pub price: Amount,
}

/// Ordered set of services. Selecting an id that is already present
/// removes it instead of adding a duplicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ServiceSelection(Vec<SelectedService>);

impl ServiceSelection {
    /// Returns whether the service is selected after the toggle.
    pub fn toggle(&mut self, service: SelectedService) -> bool {
        match self.0.iter().position(|s| s.service_id == service.service_id) {
            Some(idx) => {
                self.0.remove(idx);
                false
            }
            None => {
                self.0.push(service);
                true
            }
        }
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.0.iter().any(|s| s.service_id == service_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedService> {
        self.0.iter()
    }

    pub fn total(&self) -> Amount {
        self.0
            .iter()
            .fold(0, |total: Amount, s| total.saturating_add(s.price))
    }

    pub fn line_items(&self) -> Vec<ServiceLineItem> {
        self.0
            .iter()
            .map(|s| ServiceLineItem {
                service_id: s.service_id.clone(),
                name: s.name.clone(),
                price: s.price,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppointmentDraft {
    pub pet_name: String,
    pub species: Species,
    pub breed: String,
    pub size: SizeClass,
    pub care_notes: Option<String>,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<NaiveTime>,
    pub services: ServiceSelection,
    pub contact_name: String,
    pub phone: String,
    pub email: String,
}

/// Partial update of the free-text and enum fields. Date, time slot and
/// services have their own operations because they carry extra rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftPatch {
    pub pet_name: Option<String>,
    pub species: Option<Species>,
    pub breed: Option<String>,
    pub size: Option<SizeClass>,
    pub care_notes: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl DraftPatch {
    pub fn apply(self, draft: &mut AppointmentDraft) {
        if let Some(v) = self.pet_name {
            draft.pet_name = v;
        }
        if let Some(v) = self.species {
            draft.species = v;
        }
        if let Some(v) = self.breed {
            draft.breed = v;
        }
        if let Some(v) = self.size {
            draft.size = v;
        }
        if let Some(v) = self.care_notes {
            draft.care_notes = Some(v).filter(|n| !n.trim().is_empty());
        }
        if let Some(v) = self.contact_name {
            draft.contact_name = v;
        }
        if let Some(v) = self.phone {
            draft.phone = v;
        }
        if let Some(v) = self.email {
            draft.email = v;
        }
    }
}
