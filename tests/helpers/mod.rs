//! Scripted in-memory database for driving the probers without PostgreSQL.

#![allow(dead_code)]

use async_trait::async_trait;
use pgprobe::probe::{Database, ProbeError, Session};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// What a scripted connection does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Pass,
    Fail,
    /// The connect call itself fails.
    Refuse,
}

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub kind: Kind,
    pub delay: Duration,
}

impl Step {
    pub fn pass() -> Self {
        Self {
            kind: Kind::Pass,
            delay: Duration::ZERO,
        }
    }

    pub fn fail() -> Self {
        Self {
            kind: Kind::Fail,
            delay: Duration::ZERO,
        }
    }

    pub fn refuse() -> Self {
        Self {
            kind: Kind::Refuse,
            delay: Duration::ZERO,
        }
    }

    /// Delay the query by `ms` milliseconds before resolving.
    pub fn after(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[derive(Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub cached_connects: AtomicUsize,
    pub cached_executes: AtomicUsize,
    pub closes: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Counters {
    pub fn get(field: &AtomicUsize) -> usize {
        field.load(Ordering::SeqCst)
    }
}

/// Database whose fresh connections follow a script; unscripted ones pass.
#[derive(Default)]
pub struct ScriptedDatabase {
    steps: Mutex<VecDeque<Step>>,
    cached_steps: Arc<Mutex<VecDeque<Kind>>>,
    gate: Option<Arc<Barrier>>,
    pub counters: Arc<Counters>,
}

impl ScriptedDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Outcomes for successive executes on the cached handle.
    pub fn with_cached(self, kinds: impl IntoIterator<Item = Kind>) -> Self {
        *self.cached_steps.lock().unwrap() = kinds.into_iter().collect();
        self
    }

    /// Require `parties` queries to be in flight together before any resolves.
    pub fn gated(mut self, parties: usize) -> Self {
        self.gate = Some(Arc::new(Barrier::new(parties)));
        self
    }

    fn next_step(&self) -> Step {
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Step::pass)
    }
}

fn scripted_failure() -> ProbeError {
    ProbeError::Query(sqlx::Error::Protocol("scripted failure".into()))
}

#[async_trait]
impl Database for ScriptedDatabase {
    async fn connect(&self) -> Result<Box<dyn Session>, ProbeError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();
        if step.kind == Kind::Refuse {
            return Err(ProbeError::ConnectTimeout(Duration::from_millis(10)));
        }

        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            step,
            gate: self.gate.clone(),
            counters: self.counters.clone(),
            open: true,
        }))
    }

    async fn connect_cached(&self) -> Result<Box<dyn Session>, ProbeError> {
        self.counters.cached_connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CachedScriptedSession {
            kinds: self.cached_steps.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct ScriptedSession {
    step: Step,
    gate: Option<Arc<Barrier>>,
    counters: Arc<Counters>,
    open: bool,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&mut self, _query: &str) -> Result<(), ProbeError> {
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        tokio::time::sleep(self.step.delay).await;
        match self.step.kind {
            Kind::Pass => Ok(()),
            Kind::Fail | Kind::Refuse => Err(scripted_failure()),
        }
    }

    async fn close(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct CachedScriptedSession {
    kinds: Arc<Mutex<VecDeque<Kind>>>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Session for CachedScriptedSession {
    async fn execute(&mut self, _query: &str) -> Result<(), ProbeError> {
        self.counters.cached_executes.fetch_add(1, Ordering::SeqCst);
        let kind = self.kinds.lock().unwrap().pop_front().unwrap_or(Kind::Pass);
        match kind {
            Kind::Pass => Ok(()),
            Kind::Fail | Kind::Refuse => Err(scripted_failure()),
        }
    }

    async fn close(&mut self) {}
}
