use crate::config::Config;
use crate::probe::{Database, PgDatabase};
use crate::prober::{CachedProber, RoundProber};
use crate::report::log_final_summary;
use crate::signals::shutdown_signal;
use crate::status::{ProbeStatus, StatusSnapshot, Target};
use crate::utils::fmt_duration;
use std::future::Future;
use std::num::NonZeroUsize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Exit status after an operator-requested shutdown.
pub const SHUTDOWN_EXIT_CODE: u8 = 1;

/// Main application struct wiring the probers to one shared status record.
pub struct App<D: Database = PgDatabase> {
    config: Config,
    db: Arc<D>,
    status: Arc<ProbeStatus>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl App<PgDatabase> {
    /// Create an App probing the PostgreSQL target described by `config`.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let options = config.connect_options()?;

        info!(
            host = %config.host,
            port = config.port,
            user = %config.user,
            dbname = %config.dbname,
            connect_timeout = fmt_duration(config.connect_timeout),
            sslmode = %config.sslmode,
            "Using connection details"
        );

        let db = PgDatabase::new(options, config.connect_timeout);
        Ok(Self::with_database(config, db))
    }
}

impl<D: Database> App<D> {
    pub fn with_database(config: Config, db: D) -> Self {
        let status = Arc::new(ProbeStatus::new(
            Target::from_config(&config),
            config.query.clone(),
            config.workers,
        ));
        Self {
            config,
            db: Arc::new(db),
            status,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn status(&self) -> Arc<ProbeStatus> {
        self.status.clone()
    }

    /// Spawn the cached prober, and the round prober when workers > 0.
    pub fn start_probers(&mut self) {
        let cached = CachedProber::new(
            self.db.clone(),
            self.status.clone(),
            self.config.settle_delay,
        );
        let cancel = self.cancel.clone();
        self.tasks
            .push(tokio::spawn(async move { cached.run(cancel).await }));

        match NonZeroUsize::new(self.config.workers) {
            Some(workers) => {
                let rounds = RoundProber::new(
                    self.db.clone(),
                    self.status.clone(),
                    workers,
                    self.config.settle_delay,
                );
                let cancel = self.cancel.clone();
                self.tasks
                    .push(tokio::spawn(async move { rounds.run(cancel).await }));
            }
            None => info!("Worker count is 0, running cached connection only"),
        }

        info!(
            workers = self.config.workers,
            settle_delay = fmt_duration(self.config.settle_delay),
            query = %self.config.query,
            "Probers started"
        );
    }

    /// Run until SIGINT/SIGTERM, then report and return the shutdown code.
    pub async fn run(self) -> ExitCode {
        self.run_until(async {
            let signal = shutdown_signal().await;
            info!(signal, "Shutdown signal received");
        })
        .await
    }

    /// Run until `shutdown` resolves, then report and return the shutdown code.
    ///
    /// In-flight probes are not drained; the summary reflects the state as
    /// last observed.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) -> ExitCode {
        shutdown.await;
        let snapshot = self.stop();
        log_final_summary(self.status.target(), &snapshot);
        ExitCode::from(SHUTDOWN_EXIT_CODE)
    }

    /// Signal every prober to stop and capture the final status.
    fn stop(&self) -> StatusSnapshot {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
        self.status.snapshot()
    }
}
