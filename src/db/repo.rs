use super::model::{NewCommunication, NewResponse};
use crate::model::{Communication, Response};
use crate::source::CommunicationSource;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {normalized}"))?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // Always create the file; sqlx refuses to open a missing one otherwise.
    let mut rebuilt = format!("sqlite://{expanded_path}");
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_communication(pool: &Pool, comm: &NewCommunication) -> Result<String> {
    let id = comm
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    sqlx::query(
        "INSERT INTO communications (id, company_id, subject, created_by, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&comm.company_id)
    .bind(&comm.subject)
    .bind(comm.created_by.as_deref())
    .bind(comm.created_at.unwrap_or_else(Utc::now))
    .execute(pool)
    .await
    .with_context(|| format!("failed to insert communication {id}"))?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn insert_response(
    pool: &Pool,
    communication_id: &str,
    response: &NewResponse,
) -> Result<String> {
    let mut tx = pool.begin().await?;
    let parent = sqlx::query_scalar::<_, String>("SELECT id FROM communications WHERE id = ?")
        .bind(communication_id)
        .fetch_optional(&mut *tx)
        .await?;
    if parent.is_none() {
        return Err(anyhow!("communication {} not found", communication_id));
    }

    let id = response
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    sqlx::query(
        "INSERT INTO communication_responses (id, communication_id, responder_name, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(communication_id)
    .bind(&response.responder_name)
    .bind(response.created_at.unwrap_or_else(Utc::now))
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(id)
}

/// Newest `limit` communications with their responses attached in
/// chronological order.
#[instrument(skip_all)]
pub async fn recent_communications(pool: &Pool, limit: u32) -> Result<Vec<Communication>> {
    let rows = sqlx::query(
        "SELECT id, company_id, subject, created_by, created_at FROM communications \
         ORDER BY datetime(created_at) DESC, created_at DESC LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    let mut out = rows
        .iter()
        .map(communication_from_row)
        .collect::<Result<Vec<_>>>()?;
    let mut responses = responses_for(pool, &out).await?;
    for comm in &mut out {
        comm.communication_responses = responses.remove(&comm.id).unwrap_or_default();
    }
    Ok(out)
}

/// Responses for all given communications in one query, grouped by parent
/// id and ordered oldest first within each group.
async fn responses_for(
    pool: &Pool,
    communications: &[Communication],
) -> Result<HashMap<String, Vec<Response>>> {
    let mut grouped: HashMap<String, Vec<Response>> = HashMap::new();
    if communications.is_empty() {
        return Ok(grouped);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT communication_id, id, responder_name, created_at FROM communication_responses \
         WHERE communication_id IN (",
    );
    let mut ids = qb.separated(", ");
    for comm in communications {
        ids.push_bind(comm.id.as_str());
    }
    ids.push_unseparated(") ORDER BY datetime(created_at) ASC, created_at ASC");

    let rows = qb.build().fetch_all(pool).await?;
    for row in rows {
        let parent: String = row.try_get("communication_id")?;
        grouped.entry(parent).or_default().push(Response {
            id: row.try_get("id")?,
            responder_name: row.try_get("responder_name")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        });
    }
    Ok(grouped)
}

fn communication_from_row(row: &SqliteRow) -> Result<Communication> {
    Ok(Communication {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        subject: row.try_get("subject")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        created_by: row
            .try_get::<Option<String>, _>("created_by")?
            .filter(|s| !s.trim().is_empty()),
        communication_responses: Vec::new(),
    })
}

/// `CommunicationSource` backed by the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommunicationSource for SqliteStore {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Communication>> {
        recent_communications(&self.pool, limit).await
    }
}
