use clap::Parser;
use pgprobe::app::App;
use pgprobe::cli::Args;
use pgprobe::config::Config;
use pgprobe::logging::setup_logging;
use std::process::ExitCode;
use tracing::{error, info};

/// Exit status when configuration or startup fails before probing begins.
const STARTUP_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load config before anything else so logging honours the requested level
    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pgprobe: {e:#}");
            return ExitCode::from(STARTUP_FAILURE);
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting pgprobe"
    );

    let mut app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "Failed to initialize application");
            return ExitCode::from(STARTUP_FAILURE);
        }
    };

    app.start_probers();
    app.run().await
}
