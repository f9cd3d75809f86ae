use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::measurement::Measurement;
use super::record::Record;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Baby {
    pub id: i64,
    pub name: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub head_circumference: Option<f64>,
    #[serde(default)]
    pub caregivers: Vec<String>,
    pub owner: String,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

impl Baby {
    pub fn is_owner(&self, username: &str) -> bool {
        self.owner == username
    }

    pub fn is_caregiver(&self, username: &str) -> bool {
        self.caregivers.iter().any(|c| c == username)
    }

    /// Copy a measurement's readings onto the headline fields.
    pub fn apply_headline(&mut self, measurement: &Measurement) {
        self.weight = Some(measurement.weight);
        self.height = Some(measurement.height);
        self.head_circumference = Some(measurement.head_circumference);
    }
}

/// Put `owner` first in the caregiver list if it is missing.
pub fn ensure_owner_is_caregiver(owner: &str, caregivers: &mut Vec<String>) {
    if !caregivers.iter().any(|c| c == owner) {
        caregivers.insert(0, owner.to_string());
    }
}
