use crate::probe::{self, Database};
use crate::status::{Outcome, ProbeStatus};
use crate::utils::fmt_duration;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sequential heartbeat over one long-lived handle.
///
/// The handle is opened once and reused for every probe. A failure is
/// counted and logged, and the loop carries on with the same handle.
pub struct CachedProber<D: Database> {
    db: Arc<D>,
    status: Arc<ProbeStatus>,
    settle_delay: Duration,
}

impl<D: Database> CachedProber<D> {
    pub fn new(db: Arc<D>, status: Arc<ProbeStatus>, settle_delay: Duration) -> Self {
        Self {
            db,
            status,
            settle_delay,
        }
    }

    /// Runs until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let Some(mut session) = self.open(&cancel).await else {
            return;
        };
        info!("Cached connection prober started");

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = probe::execute(session.as_mut(), self.status.query()) => outcome,
            };

            self.status.record_heartbeat(Outcome::of(&outcome));
            match outcome {
                Ok(elapsed) => debug!(duration = fmt_duration(elapsed), "Cached connection passed"),
                Err(e) => warn!(error = %e, "Cached connection FAILED"),
            }

            if self.settle(&cancel).await {
                break;
            }
        }

        session.close().await;
        debug!("Cached connection prober stopped");
    }

    /// Open the cached handle, retrying after the settle delay.
    ///
    /// Each failed attempt counts as a failed probe so an unreachable
    /// database at startup is visible in the totals.
    async fn open(&self, cancel: &CancellationToken) -> Option<Box<dyn probe::Session>> {
        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return None,
                attempt = self.db.connect_cached() => attempt,
            };
            match attempt {
                Ok(session) => return Some(session),
                Err(e) => {
                    self.status.record_heartbeat(Outcome::Failed);
                    warn!(error = %e, "Cached connection could not be opened, retrying");
                }
            }
            if self.settle(cancel).await {
                return None;
            }
        }
    }

    /// Sleep for the settle delay. Returns true if cancelled meanwhile.
    async fn settle(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = time::sleep(self.settle_delay) => false,
        }
    }
}
