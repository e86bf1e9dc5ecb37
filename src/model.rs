use crate::dates::deserialize_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One tracked event on a company timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    /// Raw date as supplied by the timeline owner; parsed on demand.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
}

impl Milestone {
    pub fn completed(date: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            is_completed: true,
        }
    }

    pub fn pending(date: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            is_completed: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub company_id: String,
    pub company_name: String,
    #[serde(default)]
    pub nda_received: Milestone,
    #[serde(default)]
    pub nda_signed: Milestone,
    #[serde(default)]
    pub rfi_sent: Milestone,
    #[serde(default)]
    pub rfi_due: Milestone,
    #[serde(default)]
    pub offer_received: Milestone,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub id: String,
    pub responder_name: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A logged message exchange as the store returns it, responses nested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Communication {
    pub id: String,
    pub company_id: String,
    pub subject: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub communication_responses: Vec<Response>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Response>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Response>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Email,
    Info,
    Warning,
    Overdue,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Email => "email",
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
            NotificationKind::Overdue => "overdue",
        }
    }
}

/// Identity of a notification. Two notifications with equal keys are
/// duplicates; only the first one in date order survives.
///
/// Milestone keys carry the raw date string rather than a normalized
/// timestamp, so `2024-03-01` and `2024-03-01T00:00:00Z` are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKey {
    Email { communication_id: String },
    Response { response_id: String },
    NdaReceived { company_id: String, raw_date: String },
    NdaSigned { company_id: String, raw_date: String },
    RfiSent { company_id: String, raw_date: String },
    RfiCompleted { company_id: String, raw_date: String },
    Offer { company_id: String, raw_date: String },
    Warning { company_id: String, days: i64 },
    Overdue { company_id: String, days: i64 },
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKey::Email { communication_id } => write!(f, "email-{communication_id}"),
            NotificationKey::Response { response_id } => write!(f, "response-{response_id}"),
            NotificationKey::NdaReceived {
                company_id,
                raw_date,
            } => write!(f, "nda-received-{company_id}-{raw_date}"),
            NotificationKey::NdaSigned {
                company_id,
                raw_date,
            } => write!(f, "nda-signed-{company_id}-{raw_date}"),
            NotificationKey::RfiSent {
                company_id,
                raw_date,
            } => write!(f, "rfi-sent-{company_id}-{raw_date}"),
            NotificationKey::RfiCompleted {
                company_id,
                raw_date,
            } => write!(f, "rfi-completed-{company_id}-{raw_date}"),
            NotificationKey::Offer {
                company_id,
                raw_date,
            } => write!(f, "offer-{company_id}-{raw_date}"),
            NotificationKey::Warning { company_id, days } => {
                write!(f, "warning-{company_id}-{days}")
            }
            NotificationKey::Overdue { company_id, days } => {
                write!(f, "overdue-{company_id}-{days}")
            }
        }
    }
}

impl Serialize for NotificationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Display-ready event derived from a communication or a timeline.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationKey,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub company_name: String,
    pub message: String,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}
