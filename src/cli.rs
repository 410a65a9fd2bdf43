use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

/// Continuously probe a PostgreSQL endpoint and report availability.
///
/// Without `--count` a single cached connection runs the query once per settle
/// delay. With `--count N` the tool additionally opens N fresh connections per
/// round and tracks outage episodes across rounds.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None, disable_help_flag = true)]
pub struct Args {
    /// Print help (`-h` is reserved for the host)
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,

    #[command(flatten)]
    pub overrides: CliOverrides,

    /// Optional TOML file providing any of the settings below
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,
}

/// Settings given explicitly on the command line.
///
/// Every field is optional so that only flags the user actually passed take
/// precedence over the file and environment layers.
#[derive(clap::Args, Serialize, Debug, Default, Clone)]
pub struct CliOverrides {
    /// Database host
    #[arg(short = 'h', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Database port
    #[arg(short = 'P', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name
    #[arg(short = 'd', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,

    /// Username
    #[arg(short = 'u', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password
    #[arg(short = 'p', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Connect timeout, bare seconds or a duration such as `500ms`
    #[arg(short = 't', long = "timeout", value_name = "DURATION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<String>,

    /// Statement executed by every probe
    #[arg(short = 'q', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Concurrent connections per round, 0 runs the cached connection only
    #[arg(short = 'c', long = "count")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Pause after every probe attempt
    #[arg(long, value_name = "DURATION")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_delay: Option<String>,

    /// PostgreSQL ssl mode (disable, prefer, require, ...)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sslmode: Option<String>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable, single line per event
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flags_match_probe_conventions() {
        let args = Args::try_parse_from([
            "pgprobe", "-h", "10.0.0.5", "-d", "orders", "-u", "probe", "-p", "secret", "-t",
            "3", "-q", "SELECT 1", "-c", "4", "-l", "debug",
        ])
        .unwrap();

        let o = args.overrides;
        assert_eq!(o.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(o.dbname.as_deref(), Some("orders"));
        assert_eq!(o.user.as_deref(), Some("probe"));
        assert_eq!(o.password.as_deref(), Some("secret"));
        assert_eq!(o.connect_timeout.as_deref(), Some("3"));
        assert_eq!(o.query.as_deref(), Some("SELECT 1"));
        assert_eq!(o.workers, Some(4));
        assert_eq!(o.log_level.as_deref(), Some("debug"));
        assert_eq!(args.tracing, TracingFormat::Pretty);
    }

    #[test]
    fn unset_flags_stay_empty() {
        let args = Args::try_parse_from(["pgprobe"]).unwrap();
        assert!(args.overrides.host.is_none());
        assert!(args.overrides.workers.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn json_tracing_format() {
        let args = Args::try_parse_from(["pgprobe", "--tracing", "json"]).unwrap();
        assert_eq!(args.tracing, TracingFormat::Json);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
