//! Prober wiring and the shutdown path of the application.

mod helpers;

use helpers::{Counters, ScriptedDatabase};
use pgprobe::app::{App, SHUTDOWN_EXIT_CODE};
use pgprobe::config::Config;
use std::process::ExitCode;
use std::time::Duration;

fn config(workers: usize) -> Config {
    Config {
        workers,
        settle_delay: Duration::from_millis(1),
        ..Config::default()
    }
}

#[tokio::test]
async fn zero_workers_runs_cached_connection_only() {
    let db = ScriptedDatabase::new();
    let counters = db.counters.clone();
    let mut app = App::with_database(config(0), db);
    let status = app.status();

    app.start_probers();
    app.run_until(tokio::time::sleep(Duration::from_millis(30)))
        .await;

    let snap = status.snapshot();
    assert_eq!(Counters::get(&counters.connects), 0);
    assert_eq!(Counters::get(&counters.cached_connects), 1);
    assert!(snap.passed > 0);
    assert!(snap.started_at.is_none());
}

#[tokio::test]
async fn workers_run_alongside_cached_connection() {
    let db = ScriptedDatabase::new();
    let counters = db.counters.clone();
    let mut app = App::with_database(config(2), db);
    let status = app.status();
    assert_eq!(status.workers(), 2);

    app.start_probers();
    app.run_until(tokio::time::sleep(Duration::from_millis(30)))
        .await;

    let snap = status.snapshot();
    assert_eq!(Counters::get(&counters.cached_connects), 1);
    assert!(Counters::get(&counters.connects) >= 2);
    assert!(snap.started_at.is_some());
    assert_eq!(snap.failed, 0);
    assert!(snap.passed >= 2);
}

#[tokio::test]
async fn shutdown_summary_does_not_mutate_status() {
    let app = App::with_database(config(0), ScriptedDatabase::new());
    let status = app.status();
    let before = status.snapshot();

    app.run_until(async {}).await;

    assert_eq!(status.snapshot(), before);
}

#[tokio::test]
async fn shutdown_exits_with_code_one() {
    let mut app = App::with_database(config(1), ScriptedDatabase::new());
    app.start_probers();

    let code = app
        .run_until(tokio::time::sleep(Duration::from_millis(10)))
        .await;

    assert_eq!(SHUTDOWN_EXIT_CODE, 1);
    assert_eq!(code, ExitCode::from(1));
}
