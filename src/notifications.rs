//! Builds the notification feed from recent communications and company timelines.
use crate::dates::{days_remaining, format_date, parse_date};
use crate::model::{
    Communication, Milestone, Notification, NotificationKey, NotificationKind, Timeline,
};
use crate::source::CommunicationSource;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Days a company has to answer an RFI. Only used in message text.
pub const RFI_RESPONSE_DAYS: u32 = 14;
/// How many communications are pulled per run.
pub const RECENT_COMMUNICATIONS: u32 = 10;
/// An open RFI due within this many days raises a warning.
const WARNING_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub recent_limit: u32,
    pub rfi_response_days: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            recent_limit: RECENT_COMMUNICATIONS,
            rfi_response_days: RFI_RESPONSE_DAYS,
        }
    }
}

pub struct NotificationGenerator {
    source: Box<dyn CommunicationSource>,
    settings: GeneratorSettings,
}

impl NotificationGenerator {
    pub fn new(source: Box<dyn CommunicationSource>, settings: GeneratorSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> GeneratorSettings {
        self.settings
    }

    pub async fn generate(&self, timelines: &[Timeline]) -> Vec<Notification> {
        self.generate_at(timelines, Utc::now()).await
    }

    pub async fn generate_at(
        &self,
        timelines: &[Timeline],
        now: DateTime<Utc>,
    ) -> Vec<Notification> {
        generate_with(self.source.as_ref(), self.settings, timelines, now).await
    }
}

/// Generate notifications with default settings against the current clock.
pub async fn generate_notifications(
    source: &dyn CommunicationSource,
    timelines: &[Timeline],
) -> Vec<Notification> {
    generate_with(source, GeneratorSettings::default(), timelines, Utc::now()).await
}

#[instrument(skip_all, fields(timelines = timelines.len()))]
pub async fn generate_with(
    source: &dyn CommunicationSource,
    settings: GeneratorSettings,
    timelines: &[Timeline],
    now: DateTime<Utc>,
) -> Vec<Notification> {
    // A failed read behaves like an empty one.
    let recent = match source.fetch_recent(settings.recent_limit).await {
        Ok(comms) => comms,
        Err(err) => {
            warn!(?err, "failed to fetch recent communications; continuing without them");
            Vec::new()
        }
    };
    debug!(communications = recent.len(), "fetched recent communications");

    let mut notifications = communication_notifications(&recent, timelines);
    for timeline in timelines {
        notifications.extend(timeline_notifications(timeline, &settings, now));
    }
    sort_and_dedup(notifications)
}

/// Email notifications for communications that belong to a tracked company.
pub fn communication_notifications(
    communications: &[Communication],
    timelines: &[Timeline],
) -> Vec<Notification> {
    let mut out = Vec::new();
    for comm in communications {
        let Some(timeline) = timelines.iter().find(|t| t.company_id == comm.company_id) else {
            debug!(id = %comm.id, company_id = %comm.company_id, "no timeline for communication");
            continue;
        };
        out.push(Notification {
            id: NotificationKey::Email {
                communication_id: comm.id.clone(),
            },
            kind: NotificationKind::Email,
            company_name: timeline.company_name.clone(),
            message: format!("New email communication: {}", comm.subject),
            date: comm.created_at,
            updated_by: comm.created_by.clone(),
        });
        for response in &comm.communication_responses {
            out.push(Notification {
                id: NotificationKey::Response {
                    response_id: response.id.clone(),
                },
                kind: NotificationKind::Email,
                company_name: timeline.company_name.clone(),
                message: format!("New response from {}", response.responder_name),
                date: response.created_at,
                updated_by: Some(response.responder_name.clone()),
            });
        }
    }
    out
}

/// Raw and parsed date when the milestone carries a usable date.
fn milestone_date(m: &Milestone) -> Option<(&str, DateTime<Utc>)> {
    let raw = m.date.as_deref()?;
    parse_date(raw).map(|parsed| (raw, parsed))
}

/// Milestone, warning and overdue notifications for one timeline.
pub fn timeline_notifications(
    timeline: &Timeline,
    settings: &GeneratorSettings,
    now: DateTime<Utc>,
) -> Vec<Notification> {
    let company_id = timeline.company_id.clone();
    let info = |id: NotificationKey, message: String, date: DateTime<Utc>| Notification {
        id,
        kind: NotificationKind::Info,
        company_name: timeline.company_name.clone(),
        message,
        date,
        updated_by: None,
    };
    let mut out = Vec::new();

    if let Some((raw, date)) = completed(&timeline.nda_received) {
        out.push(info(
            NotificationKey::NdaReceived {
                company_id: company_id.clone(),
                raw_date: raw.to_string(),
            },
            format!("NDA received on {}", format_date(date)),
            date,
        ));
    }

    if let Some((raw, date)) = completed(&timeline.nda_signed) {
        out.push(info(
            NotificationKey::NdaSigned {
                company_id: company_id.clone(),
                raw_date: raw.to_string(),
            },
            format!("NDA signed on {}", format_date(date)),
            date,
        ));
    }

    if let Some((raw, date)) = completed(&timeline.rfi_sent) {
        out.push(info(
            NotificationKey::RfiSent {
                company_id: company_id.clone(),
                raw_date: raw.to_string(),
            },
            format!(
                "RFI sent on {}. Response due in {} days.",
                format_date(date),
                settings.rfi_response_days
            ),
            date,
        ));
    }

    if let Some((raw, due)) = milestone_date(&timeline.rfi_due) {
        if timeline.rfi_due.is_completed {
            out.push(info(
                NotificationKey::RfiCompleted {
                    company_id: company_id.clone(),
                    raw_date: raw.to_string(),
                },
                format!("RFI response received on {}", format_date(due)),
                due,
            ));
        } else {
            let days = days_remaining(due, now);
            // Due today falls in neither bucket.
            if days > 0 && days <= WARNING_WINDOW_DAYS {
                out.push(Notification {
                    id: NotificationKey::Warning {
                        company_id: company_id.clone(),
                        days,
                    },
                    kind: NotificationKind::Warning,
                    company_name: timeline.company_name.clone(),
                    message: format!("RFI response due in {days} days"),
                    date: now,
                    updated_by: None,
                });
            } else if days < 0 {
                let overdue = days.abs();
                out.push(Notification {
                    id: NotificationKey::Overdue {
                        company_id: company_id.clone(),
                        days: overdue,
                    },
                    kind: NotificationKind::Overdue,
                    company_name: timeline.company_name.clone(),
                    message: format!("RFI response is {overdue} days overdue"),
                    date: now,
                    updated_by: None,
                });
            }
        }
    }

    if let Some((raw, date)) = completed(&timeline.offer_received) {
        out.push(info(
            NotificationKey::Offer {
                company_id,
                raw_date: raw.to_string(),
            },
            format!("Offer received on {}", format_date(date)),
            date,
        ));
    }

    out
}

fn completed(m: &Milestone) -> Option<(&str, DateTime<Utc>)> {
    if !m.is_completed {
        return None;
    }
    milestone_date(m)
}

/// Newest first; the first notification seen for a key wins.
pub fn sort_and_dedup(mut notifications: Vec<Notification>) -> Vec<Notification> {
    notifications.sort_by(|a, b| b.date.cmp(&a.date));
    let mut seen = HashSet::new();
    notifications.retain(|n| seen.insert(n.id.clone()));
    notifications
}
