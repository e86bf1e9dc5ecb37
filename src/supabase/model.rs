use serde::Deserialize;
use serde_json::Value;

/// PostgREST returns an array; some proxies hand back `null` for no rows.
/// Rows stay untyped so one malformed row can be skipped on its own.
#[derive(Deserialize, Debug)]
#[serde(transparent)]
pub struct CommunicationsPayload(Option<Vec<Value>>);

impl CommunicationsPayload {
    pub fn into_rows(self) -> Vec<Value> {
        self.0.unwrap_or_default()
    }
}
