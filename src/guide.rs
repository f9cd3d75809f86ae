//! Developmental milestone reference content, keyed by age in months.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::models::baby::Baby;

const EMBEDDED_GUIDE: &str = include_str!("../assets/growth_guide.json");

/// Oldest age, in months, the guide covers.
pub const MAX_GUIDE_MONTH: u32 = 29;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrowthGuide {
    pub start_month: u32,
    pub end_month: u32,
    pub month_range: String,
    pub age_description: String,
    pub physical_development: Vec<String>,
    pub cognitive_social: Vec<String>,
    pub motor_skills: Vec<String>,
}

impl GrowthGuide {
    pub fn covers(&self, month: u32) -> bool {
        (self.start_month..=self.end_month).contains(&month)
    }
}

#[derive(Debug, Clone)]
pub struct GrowthGuideBook {
    entries: Vec<GrowthGuide>,
}

impl GrowthGuideBook {
    /// The guide shipped with the crate.
    pub fn embedded() -> ClientResult<Self> {
        Self::from_json(EMBEDDED_GUIDE)
    }

    /// Parse a guide. Ranges must be ordered, contiguous and span 0..=29.
    pub fn from_json(raw: &str) -> ClientResult<Self> {
        let mut entries: Vec<GrowthGuide> = serde_json::from_str(raw)?;
        entries.sort_by_key(|e| e.start_month);

        let mut next = 0;
        for entry in &entries {
            if entry.start_month != next || entry.end_month < entry.start_month {
                return Err(ClientError::Validation(format!(
                    "Growth guide range {} does not continue from month {}",
                    entry.month_range, next
                )));
            }
            next = entry.end_month + 1;
        }
        if next != MAX_GUIDE_MONTH + 1 {
            return Err(ClientError::Validation(format!(
                "Growth guide ends at month {} instead of {}",
                next.saturating_sub(1),
                MAX_GUIDE_MONTH
            )));
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[GrowthGuide] {
        &self.entries
    }

    pub fn for_month(&self, month: u32) -> Option<&GrowthGuide> {
        self.entries.iter().find(|e| e.covers(month))
    }

    pub fn for_baby(&self, baby: &Baby, today: NaiveDate) -> Option<&GrowthGuide> {
        age_in_months(baby.date_of_birth, today).and_then(|m| self.for_month(m))
    }
}

/// Whole calendar months between `date_of_birth` and `today`.
/// `None` for a birth date in the future.
pub fn age_in_months(date_of_birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if date_of_birth > today {
        return None;
    }
    let mut months = (today.year() - date_of_birth.year()) * 12 + today.month() as i32
        - date_of_birth.month() as i32;
    if today.day() < date_of_birth.day() {
        months -= 1;
    }
    u32::try_from(months).ok()
}
