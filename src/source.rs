use crate::config::{Config, Store};
use crate::db;
use crate::model::Communication;
use crate::supabase::SupabaseClient;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Read access to logged communications.
#[async_trait]
pub trait CommunicationSource: Send + Sync {
    /// Up to `limit` communications with their responses, newest first.
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Communication>>;
}

/// Build the source named by `store.backend`. A `DATABASE_URL` environment
/// variable overrides the configured SQLite location.
pub async fn open(cfg: &Config) -> Result<Box<dyn CommunicationSource>> {
    match &cfg.store {
        Store::Sqlite { .. } => {
            let pool = open_sqlite(cfg).await?;
            Ok(Box::new(db::SqliteStore::new(pool)))
        }
        Store::Supabase { url, api_key } => {
            info!(%url, "using supabase store");
            Ok(Box::new(SupabaseClient::new(url, api_key.clone())?))
        }
    }
}

/// Open and migrate the SQLite store. Errors for other backends.
pub async fn open_sqlite(cfg: &Config) -> Result<db::Pool> {
    let configured = cfg
        .database_url()
        .ok_or_else(|| anyhow::anyhow!("store.backend is not sqlite"))?;
    let database_url = std::env::var("DATABASE_URL").unwrap_or(configured);
    info!(%database_url, "using sqlite store");
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}
