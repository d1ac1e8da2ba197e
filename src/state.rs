use crate::auth::session::SessionRegistry;
use crate::config::AppConfig;
use crate::db;
use crate::expenses::{repo::SqlExpenseRepository, services::ExpenseService};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub sessions: SessionRegistry,
    pub expenses: ExpenseService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config.database_url, config.database_max_connections).await?;
        db::migrate(&db).await?;
        tracing::info!(url = %config.database_url, "database ready");
        Ok(Self::from_parts(db, config))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>) -> Self {
        // A session lives as long as its refresh token could.
        let ttl = Duration::from_secs((config.jwt.refresh_ttl_minutes.max(0) as u64) * 60);
        let expenses = ExpenseService::new(
            Arc::new(SqlExpenseRepository::new(db.clone())),
            config.categories.clone(),
        );
        Self {
            db,
            config,
            sessions: SessionRegistry::new(ttl),
            expenses,
        }
    }

    #[cfg(test)]
    pub async fn fake() -> Self {
        let db = db::in_memory().await.expect("in-memory db");
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            database_max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            categories: crate::config::CategoryConfig::default(),
        });
        Self::from_parts(db, config)
    }
}
