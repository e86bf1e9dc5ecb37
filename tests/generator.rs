use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use dealflow_notify::model::Response;
use dealflow_notify::notifications::{generate_with, GeneratorSettings};
use dealflow_notify::{
    generate_notifications, Communication, CommunicationSource, Milestone, NotificationGenerator,
    NotificationKind, Timeline,
};

#[derive(Clone, Default)]
struct RecordingSource {
    responses: Arc<Mutex<VecDeque<Result<Vec<Communication>>>>>,
    limits: Arc<Mutex<Vec<u32>>>,
}

impl RecordingSource {
    fn with_responses(responses: Vec<Result<Vec<Communication>>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    async fn limits(&self) -> Vec<u32> {
        self.limits.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl CommunicationSource for RecordingSource {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Communication>> {
        self.limits.lock().await.push(limit);
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap()
}

fn day(days: i64) -> String {
    (now() + Duration::days(days)).format("%Y-%m-%d").to_string()
}

fn timeline(id: &str, name: &str) -> Timeline {
    Timeline {
        company_id: id.into(),
        company_name: name.into(),
        ..Default::default()
    }
}

fn comm(id: &str, company: &str, hours_ago: i64, responses: Vec<Response>) -> Communication {
    Communication {
        id: id.into(),
        company_id: company.into(),
        subject: format!("subject {id}"),
        created_at: now() - Duration::hours(hours_ago),
        created_by: Some("ana".into()),
        communication_responses: responses,
    }
}

fn response(id: &str, name: &str, hours_ago: i64) -> Response {
    Response {
        id: id.into(),
        responder_name: name.into(),
        created_at: now() - Duration::hours(hours_ago),
    }
}

fn assert_feed_invariants(feed: &[dealflow_notify::Notification]) {
    let ids: HashSet<String> = feed.iter().map(|n| n.id.to_string()).collect();
    assert_eq!(ids.len(), feed.len(), "duplicate ids in feed");
    assert!(
        feed.windows(2).all(|w| w[0].date >= w[1].date),
        "feed not sorted newest first"
    );
}

#[tokio::test]
async fn merges_communications_and_milestones() {
    let source = RecordingSource::with_responses(vec![Ok(vec![
        comm("m1", "c1", 2, vec![response("r1", "bob", 1)]),
        comm("m2", "c2", 30, vec![]),
    ])]);

    let mut acme = timeline("c1", "Acme");
    acme.nda_received = Milestone::completed(&day(-20));
    acme.nda_signed = Milestone::completed(&day(-15));
    acme.rfi_sent = Milestone::completed(&day(-12));
    acme.rfi_due = Milestone::pending(&day(2));
    let mut globex = timeline("c2", "Globex");
    globex.rfi_due = Milestone::completed(&day(-3));
    globex.offer_received = Milestone::completed(&day(-1));

    let feed = generate_with(&source, GeneratorSettings::default(), &[acme, globex], now()).await;
    assert_feed_invariants(&feed);

    let ids: Vec<String> = feed.iter().map(|n| n.id.to_string()).collect();
    assert_eq!(
        ids,
        vec![
            "warning-c1-2".to_string(),
            "response-r1".to_string(),
            "email-m1".to_string(),
            "email-m2".to_string(),
            format!("offer-c2-{}", day(-1)),
            format!("rfi-completed-c2-{}", day(-3)),
            format!("rfi-sent-c1-{}", day(-12)),
            format!("nda-signed-c1-{}", day(-15)),
            format!("nda-received-c1-{}", day(-20)),
        ]
    );

    let reply = &feed[1];
    assert_eq!(reply.kind, NotificationKind::Email);
    assert_eq!(reply.company_name, "Acme");
    assert_eq!(reply.message, "New response from bob");
    assert_eq!(reply.updated_by.as_deref(), Some("bob"));

    let email = &feed[3];
    assert_eq!(email.message, "New email communication: subject m2");
    assert_eq!(email.company_name, "Globex");
    assert_eq!(email.updated_by.as_deref(), Some("ana"));

    assert_eq!(source.limits().await, vec![10]);
}

#[tokio::test]
async fn warning_two_days_ahead() {
    let source = RecordingSource::default();
    let mut tl = timeline("c1", "Acme");
    tl.rfi_due = Milestone::pending(&day(2));

    let feed = generate_with(&source, GeneratorSettings::default(), &[tl], now()).await;
    let warnings: Vec<_> = feed
        .iter()
        .filter(|n| n.kind == NotificationKind::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("2 days"));
    assert_eq!(warnings[0].date, now());
}

#[tokio::test]
async fn overdue_five_days_back() {
    let source = RecordingSource::default();
    let mut tl = timeline("c1", "Acme");
    tl.rfi_due = Milestone::pending(&day(-5));

    let feed = generate_with(&source, GeneratorSettings::default(), &[tl], now()).await;
    let overdue: Vec<_> = feed
        .iter()
        .filter(|n| n.kind == NotificationKind::Overdue)
        .collect();
    assert_eq!(overdue.len(), 1);
    assert!(overdue[0].message.contains("5 days overdue"));
}

#[tokio::test]
async fn due_today_raises_nothing() {
    let source = RecordingSource::default();
    let mut tl = timeline("c1", "Acme");
    tl.rfi_due = Milestone::pending(&day(0));

    let feed = generate_with(&source, GeneratorSettings::default(), &[tl], now()).await;
    assert!(feed.is_empty());
}

#[tokio::test]
async fn duplicate_upstream_communication_kept_once() {
    let source = RecordingSource::with_responses(vec![Ok(vec![
        comm("m1", "c1", 5, vec![]),
        comm("m1", "c1", 1, vec![]),
    ])]);

    let feed = generate_with(
        &source,
        GeneratorSettings::default(),
        &[timeline("c1", "Acme")],
        now(),
    )
    .await;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id.to_string(), "email-m1");
    assert_eq!(feed[0].date, now() - Duration::hours(1));
}

#[tokio::test]
async fn unmatched_company_is_dropped_with_responses() {
    let source = RecordingSource::with_responses(vec![Ok(vec![comm(
        "m1",
        "unknown",
        1,
        vec![response("r1", "bob", 0)],
    )])]);

    let feed = generate_with(
        &source,
        GeneratorSettings::default(),
        &[timeline("c1", "Acme")],
        now(),
    )
    .await;
    assert!(feed.is_empty());
}

#[tokio::test]
async fn invalid_nda_date_is_ignored() {
    let source = RecordingSource::default();
    let mut tl = timeline("c1", "Acme");
    tl.nda_received = Milestone::completed("not-a-date");

    let feed = generate_with(&source, GeneratorSettings::default(), &[tl], now()).await;
    assert!(feed.is_empty());
}

#[tokio::test]
async fn fetch_failure_still_yields_timeline_notifications() {
    let source = RecordingSource::with_responses(vec![Err(anyhow!("store offline"))]);
    let mut tl = timeline("c1", "Acme");
    tl.offer_received = Milestone::completed("2024-03-01");

    let generator = NotificationGenerator::new(
        Box::new(source.clone()),
        GeneratorSettings {
            recent_limit: 25,
            ..Default::default()
        },
    );
    let feed = generator.generate_at(&[tl], now()).await;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].message, "Offer received on Mar 1, 2024");
    assert_eq!(source.limits().await, vec![25]);
}

#[tokio::test]
async fn raw_date_strings_distinguish_keys() {
    let source = RecordingSource::default();
    let mut a = timeline("c1", "Acme");
    a.nda_signed = Milestone::completed("2024-03-01");
    let mut b = timeline("c1", "Acme");
    b.nda_signed = Milestone::completed("2024-03-01T00:00:00Z");
    let c = a.clone();

    let feed = generate_with(&source, GeneratorSettings::default(), &[a, b, c], now()).await;
    assert_feed_invariants(&feed);
    assert_eq!(feed.len(), 2);
}

#[tokio::test]
async fn default_entry_point_uses_ten_recent() {
    let source = RecordingSource::default();
    let feed = generate_notifications(&source, &[timeline("c1", "Acme")]).await;
    assert!(feed.is_empty());
    assert_eq!(source.limits().await, vec![10]);
}

#[tokio::test]
async fn equal_dates_keep_generation_order() {
    // Email generated first, warning second; both dated `now`.
    let source = RecordingSource::with_responses(vec![Ok(vec![comm("m1", "c1", 0, vec![])])]);
    let mut acme = timeline("c1", "Acme");
    acme.rfi_due = Milestone::pending(&day(1));
    let mut globex = timeline("c2", "Globex");
    globex.rfi_due = Milestone::pending(&day(3));

    let feed = generate_with(&source, GeneratorSettings::default(), &[acme, globex], now()).await;
    assert!(feed.iter().all(|n| n.date == now()));
    let ids: Vec<String> = feed.iter().map(|n| n.id.to_string()).collect();
    assert_eq!(ids, vec!["email-m1", "warning-c1-1", "warning-c2-3"]);
}
