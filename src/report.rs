//! Human-readable summary lines derived from a [`StatusSnapshot`].

use crate::status::{StatusSnapshot, Target};
use crate::utils::{fmt_duration, fmt_timestamp};
use std::time::Instant;
use tracing::info;

/// Log the line emitted after every completed round.
pub fn log_round_summary(round: u64, snapshot: &StatusSnapshot) {
    info!(
        round,
        passed = snapshot.passed,
        failed = snapshot.failed,
        started = %fmt_timestamp(snapshot.started_at),
        outage_started = %fmt_timestamp(snapshot.outage_started_at),
        recovered = %fmt_timestamp(snapshot.last_recovered_at),
        outage_total = fmt_duration(snapshot.outage_elapsed),
        is_down = snapshot.is_outage,
        "Round complete"
    );
}

/// Final report, one line per figure.
pub fn final_summary_lines(
    target: &Target,
    snapshot: &StatusSnapshot,
    now: Instant,
) -> Vec<String> {
    let mut lines = vec![
        format!("Test started:           [{}]", fmt_timestamp(snapshot.started_at)),
        format!("To database:            [{}/{}]", target.host, target.dbname),
        format!("Successful connections: [{}]", snapshot.passed),
        format!("Failed connections:     [{}]", snapshot.failed),
        format!(
            "Total outage time:      [{}]",
            fmt_duration(snapshot.outage_elapsed)
        ),
    ];
    if let Some(open) = snapshot.open_outage(now) {
        lines.push(format!("Ongoing outage:         [{}]", fmt_duration(open)));
    }
    lines
}

/// Log the report printed when the operator stops the probe.
pub fn log_final_summary(target: &Target, snapshot: &StatusSnapshot) {
    info!("Final results (user exited the program)");
    for line in final_summary_lines(target, snapshot, Instant::now()) {
        info!("    {line}");
    }
}
