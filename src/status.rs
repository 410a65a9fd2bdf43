//! Shared probe status: pass/fail counters and outage tracking.
//!
//! Every mutation goes through one of the `record_*` methods, each of which
//! takes the internal lock exactly once. That keeps counter increments and
//! the outage edge check atomic with respect to concurrent workers.

use crate::config::Config;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of a single probe as seen by the status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
}

impl Outcome {
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }
}

/// Edge fired by a round outcome, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No state change, only a counter moved.
    None,
    /// First failure while up; an outage episode opened.
    OutageStarted,
    /// First success while down; the episode closed after `duration`.
    OutageEnded { duration: Duration },
}

/// One reading of both clocks.
///
/// Wall time is only displayed; spans are measured on the monotonic clock so
/// a clock step during an outage cannot skew its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub wall: DateTime<Utc>,
    pub mono: Instant,
}

impl Moment {
    pub fn now() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }
}

/// Immutable description of what is being probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub dbname: String,
    pub connect_timeout: Duration,
}

impl Target {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            dbname: config.dbname.clone(),
            connect_timeout: config.connect_timeout,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    passed: u64,
    failed: u64,
    is_outage: bool,
    outage_started_at: Option<DateTime<Utc>>,
    outage_since: Option<Instant>,
    last_recovered_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    outage_elapsed: Duration,
}

/// Point-in-time copy of the status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub passed: u64,
    pub failed: u64,
    pub is_outage: bool,
    pub outage_started_at: Option<DateTime<Utc>>,
    /// Monotonic start of the current episode, for measuring it.
    pub outage_since: Option<Instant>,
    pub last_recovered_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub outage_elapsed: Duration,
}

impl StatusSnapshot {
    pub fn attempts(&self) -> u64 {
        self.passed + self.failed
    }

    /// Running time of the episode still open at `now`, if any.
    pub fn open_outage(&self, now: Instant) -> Option<Duration> {
        match (self.is_outage, self.outage_since) {
            (true, Some(since)) => Some(now.saturating_duration_since(since)),
            _ => None,
        }
    }
}

/// Status shared by the cached prober, round workers, and reporters.
#[derive(Debug)]
pub struct ProbeStatus {
    target: Target,
    query: String,
    workers: usize,
    tally: Mutex<Tally>,
}

impl ProbeStatus {
    pub fn new(target: Target, query: impl Into<String>, workers: usize) -> Self {
        Self {
            target,
            query: query.into(),
            workers,
            tally: Mutex::new(Tally::default()),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn tally(&self) -> MutexGuard<'_, Tally> {
        // Counters stay meaningful even if a holder panicked mid-update.
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the start of round probing. Only the first call has an effect.
    ///
    /// Returns whether this call set the timestamp.
    pub fn mark_started(&self) -> bool {
        self.mark_started_at(Utc::now())
    }

    pub fn mark_started_at(&self, now: DateTime<Utc>) -> bool {
        let mut tally = self.tally();
        if tally.started_at.is_some() {
            return false;
        }
        tally.started_at = Some(now);
        true
    }

    /// Count a cached-connection outcome. Does not touch outage state.
    pub fn record_heartbeat(&self, outcome: Outcome) {
        let mut tally = self.tally();
        match outcome {
            Outcome::Passed => tally.passed += 1,
            Outcome::Failed => tally.failed += 1,
        }
    }

    /// Count a round worker outcome and advance the outage state machine.
    pub fn record_round_outcome(&self, outcome: Outcome) -> Transition {
        self.record_round_outcome_at(outcome, Moment::now())
    }

    pub fn record_round_outcome_at(&self, outcome: Outcome, now: Moment) -> Transition {
        let mut tally = self.tally();
        match outcome {
            Outcome::Passed => {
                tally.passed += 1;
                if !tally.is_outage {
                    return Transition::None;
                }
                tally.is_outage = false;
                tally.last_recovered_at = Some(now.wall);
                let duration = tally
                    .outage_since
                    .take()
                    .map(|since| now.mono.saturating_duration_since(since))
                    .unwrap_or_default();
                tally.outage_elapsed += duration;
                Transition::OutageEnded { duration }
            }
            Outcome::Failed => {
                tally.failed += 1;
                if tally.is_outage {
                    return Transition::None;
                }
                tally.is_outage = true;
                tally.outage_started_at = Some(now.wall);
                tally.outage_since = Some(now.mono);
                Transition::OutageStarted
            }
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let tally = self.tally();
        StatusSnapshot {
            passed: tally.passed,
            failed: tally.failed,
            is_outage: tally.is_outage,
            outage_started_at: tally.outage_started_at,
            outage_since: tally.outage_since,
            last_recovered_at: tally.last_recovered_at,
            started_at: tally.started_at,
            outage_elapsed: tally.outage_elapsed,
        }
    }
}
