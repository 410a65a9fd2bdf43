use crate::probe::{self, Database};
use crate::report::log_round_summary;
use crate::status::{Outcome, ProbeStatus, Transition};
use crate::utils::fmt_duration;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

/// Tally of a single round, as seen by the round loop after the barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub passed: usize,
    pub failed: usize,
    /// Workers that panicked instead of reporting.
    pub lost: usize,
}

/// Fan-out prober: N fresh connections per round, joined before the next.
pub struct RoundProber<D: Database> {
    db: Arc<D>,
    status: Arc<ProbeStatus>,
    workers: NonZeroUsize,
    settle_delay: Duration,
}

impl<D: Database> RoundProber<D> {
    pub fn new(
        db: Arc<D>,
        status: Arc<ProbeStatus>,
        workers: NonZeroUsize,
        settle_delay: Duration,
    ) -> Self {
        Self {
            db,
            status,
            workers,
            settle_delay,
        }
    }

    /// Runs rounds back to back until `cancel` fires.
    ///
    /// Cancellation is only observed between rounds; a round in flight
    /// always runs to its barrier.
    pub async fn run(&self, cancel: CancellationToken) {
        self.status.mark_started();
        info!(workers = self.workers.get(), "Round prober started");

        let mut round: u64 = 0;
        while !cancel.is_cancelled() {
            round += 1;
            let report = self.run_round(round).await;
            debug!(
                round,
                passed = report.passed,
                failed = report.failed,
                "Round barrier reached"
            );
            log_round_summary(round, &self.status.snapshot());
        }
        debug!(rounds = round, "Round prober stopped");
    }

    /// Spawn one worker per slot and wait for all of them.
    pub async fn run_round(&self, round: u64) -> RoundReport {
        let mut set = JoinSet::new();
        for worker_id in 0..self.workers.get() {
            let db = self.db.clone();
            let status = self.status.clone();
            let settle_delay = self.settle_delay;
            let span = tracing::debug_span!("probe_worker", round, worker_id);
            set.spawn(probe_worker(db, status, settle_delay).instrument(span));
        }

        let mut report = RoundReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Outcome::Passed) => report.passed += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Err(e) => {
                    report.lost += 1;
                    error!(round, error = ?e, "Probe worker did not complete");
                }
            }
        }
        report
    }
}

/// One round worker: connect, probe, close, report, settle.
///
/// Connect failures count as ordinary failed probes.
async fn probe_worker<D: Database>(
    db: Arc<D>,
    status: Arc<ProbeStatus>,
    settle_delay: Duration,
) -> Outcome {
    let result = probe::execute_once(db.as_ref(), status.query()).await;
    let outcome = Outcome::of(&result);

    match status.record_round_outcome(outcome) {
        Transition::OutageStarted => warn!("Connections failing"),
        Transition::OutageEnded { duration } => {
            info!(outage = fmt_duration(duration), "Connections recovered")
        }
        Transition::None => {}
    }

    if let Err(e) = result {
        debug!(error = %e, "Probe failed");
    }

    time::sleep(settle_delay).await;
    outcome
}
