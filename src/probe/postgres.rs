//! PostgreSQL sessions backed by sqlx.

use super::{Database, ProbeError, Session};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::{Connection, Executor};
use std::time::Duration;
use tokio::time;
use tracing::debug;

/// Connection factory for one PostgreSQL target.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgDatabase {
    pub fn new(options: PgConnectOptions, connect_timeout: Duration) -> Self {
        Self {
            options,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn connect(&self) -> Result<Box<dyn Session>, ProbeError> {
        let conn = time::timeout(self.connect_timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| ProbeError::ConnectTimeout(self.connect_timeout))?
            .map_err(ProbeError::Connect)?;
        Ok(Box::new(PgSession { conn: Some(conn) }))
    }

    async fn connect_cached(&self) -> Result<Box<dyn Session>, ProbeError> {
        // A single-connection pool reconnects lazily after the link drops,
        // so the cached prober keeps one handle for the whole run.
        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(1)
            .acquire_timeout(self.connect_timeout)
            .connect_lazy_with(self.options.clone());
        Ok(Box::new(CachedSession { pool }))
    }
}

/// Exclusive connection used by one round worker.
struct PgSession {
    conn: Option<PgConnection>,
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&mut self, query: &str) -> Result<(), ProbeError> {
        let conn = self.conn.as_mut().ok_or(ProbeError::Closed)?;
        // Rows stream past and are dropped without buffering.
        Executor::execute(conn, query)
            .await
            .map_err(ProbeError::Query)?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(e) = conn.close().await
        {
            debug!(error = ?e, "Connection did not close cleanly");
        }
    }
}

/// Long-lived handle used by the cached prober.
struct CachedSession {
    pool: PgPool,
}

#[async_trait]
impl Session for CachedSession {
    async fn execute(&mut self, query: &str) -> Result<(), ProbeError> {
        if self.pool.is_closed() {
            return Err(ProbeError::Closed);
        }
        Executor::execute(&self.pool, query)
            .await
            .map_err(ProbeError::Query)?;
        Ok(())
    }

    async fn close(&mut self) {
        self.pool.close().await;
    }
}
