use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use dealflow_notify::config;
use dealflow_notify::db::{self, NewCommunication, NewResponse};
use dealflow_notify::dates::parse_date;
use dealflow_notify::source;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Record a communication (and optional responses) in the local SQLite store"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Company the communication belongs to
    #[arg(long)]
    company: String,

    #[arg(long)]
    subject: String,

    /// Sender recorded as `created_by`
    #[arg(long)]
    created_by: Option<String>,

    /// Creation time (RFC 3339 or YYYY-MM-DD); defaults to now
    #[arg(long)]
    at: Option<String>,

    /// Responder name; repeat for several responses
    #[arg(long = "response")]
    responses: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let created_at = match args.at.as_deref() {
        Some(raw) => {
            Some(parse_date(raw).ok_or_else(|| anyhow::anyhow!("invalid --at value {raw}"))?)
        }
        None => None,
    };

    let pool = source::open_sqlite(&cfg).await?;
    let id = db::insert_communication(
        &pool,
        &NewCommunication {
            id: None,
            company_id: args.company.clone(),
            subject: args.subject.clone(),
            created_by: args.created_by.clone(),
            created_at,
        },
    )
    .await?;
    info!(%id, company = %args.company, "recorded communication");

    for name in &args.responses {
        let rid = db::insert_response(
            &pool,
            &id,
            &NewResponse {
                id: None,
                responder_name: name.clone(),
                created_at: None,
            },
        )
        .await?;
        info!(%rid, responder = %name, "recorded response");
    }

    println!("{id}");
    Ok(())
}
