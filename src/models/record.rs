use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordType {
    #[serde(rename = "feeding")]
    Feeding,
    #[serde(rename = "sleep")]
    Sleep,
    #[serde(rename = "diaper change")]
    DiaperChange,
    #[serde(rename = "others")]
    Others,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubType {
    Breastfeed,
    Bottle,
    #[serde(rename = "self")]
    SelfFeed,
    Wet,
    Solid,
}

impl RecordType {
    pub fn allowed_sub_types(&self) -> &'static [SubType] {
        match self {
            RecordType::Feeding => &[SubType::Breastfeed, SubType::Bottle, SubType::SelfFeed],
            RecordType::DiaperChange => &[SubType::Wet, SubType::Solid],
            RecordType::Sleep | RecordType::Others => &[],
        }
    }

    pub fn accepts(&self, sub_type: Option<SubType>) -> bool {
        match sub_type {
            Some(s) => self.allowed_sub_types().contains(&s),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default)]
    pub sub_type: Option<SubType>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
