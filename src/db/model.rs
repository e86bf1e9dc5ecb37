//! Insert models for the communications tables.
//!
//! Rows read back are mapped straight into `crate::model::Communication`.

use chrono::{DateTime, Utc};

/// A communication to record. `id` and `created_at` default to a fresh
/// UUID and the current time.
#[derive(Debug, Clone, Default)]
pub struct NewCommunication {
    pub id: Option<String>,
    pub company_id: String,
    pub subject: String,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct NewResponse {
    pub id: Option<String>,
    pub responder_name: String,
    pub created_at: Option<DateTime<Utc>>,
}
