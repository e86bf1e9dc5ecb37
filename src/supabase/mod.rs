use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use tracing::{debug, instrument, warn};

use crate::model::Communication;
use crate::source::CommunicationSource;
use crate::supabase::model::CommunicationsPayload;

pub mod model;

const COMMUNICATIONS_PATH: &str = "rest/v1/communications";
const COMMUNICATIONS_SELECT: &str = "*,communication_responses(*)";

/// PostgREST client for a Supabase project.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    pub fn new(url: &str, api_key: String) -> Result<Self> {
        let http = Client::builder()
            .user_agent("dealflow-notify/0.1")
            .build()
            .context("failed to build HTTP client")?;
        Self::with_http(http, url, api_key)
    }

    pub fn with_http(http: Client, url: &str, api_key: String) -> Result<Self> {
        // A trailing slash keeps `join` from dropping the last path segment.
        let normalized = format!("{}/", url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).with_context(|| format!("invalid Supabase URL {url}"))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn build_recent_request(&self, limit: u32) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(COMMUNICATIONS_PATH)
            .context("invalid Supabase base URL")?;
        self.http
            .get(endpoint)
            .query(&[
                ("select", COMMUNICATIONS_SELECT.to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .build()
            .context("failed to build Supabase request")
    }

    #[instrument(skip(self))]
    pub async fn recent_communications(&self, limit: u32) -> Result<Vec<Communication>> {
        let request = self.build_recent_request(limit)?;
        debug!(url = %request.url(), "querying communications");

        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Supabase")?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("Rate limited by Supabase: {}", body);
            return Err(anyhow!("received 429 from Supabase: {}", body));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!("Supabase API error - Status: {}, Body: {}", status, body);
            return Err(anyhow!("supabase error {}: {}", status, body));
        }

        let body = res
            .text()
            .await
            .context("failed to read Supabase response")?;
        decode_communications(&body)
    }
}

/// Decode the response body, skipping rows that do not map onto a
/// `Communication`. Only a body that is not a JSON array (or `null`) fails.
pub(crate) fn decode_communications(body: &str) -> Result<Vec<Communication>> {
    let payload: CommunicationsPayload =
        serde_json::from_str(body).context("invalid Supabase response JSON")?;
    let rows = payload.into_rows();
    let total = rows.len();
    let comms: Vec<Communication> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let id = row.get("id").cloned();
            match serde_json::from_value::<Communication>(row) {
                Ok(comm) => Some(comm),
                Err(err) => {
                    warn!(index, ?id, %err, "skipping malformed communication row");
                    None
                }
            }
        })
        .collect();
    if comms.len() < total {
        debug!(kept = comms.len(), total, "decoded communications with skipped rows");
    }
    Ok(comms)
}

#[async_trait]
impl CommunicationSource for SupabaseClient {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Communication>> {
        self.recent_communications(limit).await
    }
}
