//! Probe execution primitive and the database seam it runs against.

pub mod postgres;

use crate::utils::fmt_duration;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

pub use postgres::PgDatabase;

/// Why a single probe attempt failed.
///
/// Every variant counts as one failed probe; the distinction only feeds logs.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to connect: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("connect timed out after {}", fmt_duration(*.0))]
    ConnectTimeout(Duration),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("session already closed")]
    Closed,
}

/// Result of one probe: elapsed execution time or the failure cause.
pub type ProbeOutcome = Result<Duration, ProbeError>;

/// An open handle that can run the probe statement.
#[async_trait]
pub trait Session: Send {
    /// Execute `query` and drain its result set, discarding every row.
    async fn execute(&mut self, query: &str) -> Result<(), ProbeError>;

    /// Release the underlying connection. Further `execute` calls fail.
    async fn close(&mut self);
}

/// Source of probe sessions for one target.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Open a fresh connection owned exclusively by the caller.
    async fn connect(&self) -> Result<Box<dyn Session>, ProbeError>;

    /// Open the long-lived handle reused by the cached prober.
    ///
    /// The handle must survive a dropped connection: a broken link surfaces
    /// as a failed `execute`, and the next call may succeed again.
    async fn connect_cached(&self) -> Result<Box<dyn Session>, ProbeError>;
}

/// Run the probe statement once and time it.
pub async fn execute(session: &mut dyn Session, query: &str) -> ProbeOutcome {
    let start = Instant::now();
    session.execute(query).await?;
    let elapsed = start.elapsed();
    debug!(duration = fmt_duration(elapsed), "Probe query completed");
    Ok(elapsed)
}

/// Open a fresh connection, probe once, and close it regardless of outcome.
pub async fn execute_once<D: Database + ?Sized>(db: &D, query: &str) -> ProbeOutcome {
    let mut session = db.connect().await?;
    let outcome = execute(session.as_mut(), query).await;
    session.close().await;
    outcome
}
