//! Configuration module for the probe.
//!
//! Settings are layered with figment, lowest priority first: built-in
//! defaults, an optional TOML file, `PGPROBE_*` environment variables, and
//! flags passed explicitly on the command line.

use crate::cli::Args;
use anyhow::Context;
use custom_debug_derive::Debug;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Deserializer};
use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Prefix for environment variables read into [`Config`].
pub const ENV_PREFIX: &str = "PGPROBE_";

/// Main application configuration
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Database host or address
    #[serde(default = "default_host", deserialize_with = "deserialize_text")]
    pub host: String,
    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name
    #[serde(default = "default_dbname", deserialize_with = "deserialize_text")]
    pub dbname: String,
    /// Username
    #[serde(default = "default_user", deserialize_with = "deserialize_text")]
    pub user: String,
    /// Password, never rendered by `Debug`
    #[serde(default = "default_password", deserialize_with = "deserialize_text")]
    #[debug(skip)]
    pub password: String,
    /// Upper bound on establishing a connection
    ///
    /// Accepts bare seconds (`1`) or a duration string (`500ms`, `2s`).
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub connect_timeout: Duration,
    /// Statement executed by every probe
    #[serde(default = "default_query", deserialize_with = "deserialize_text")]
    pub query: String,
    /// Concurrent connections per round, 0 disables round probing
    #[serde(default)]
    pub workers: usize,
    /// Log level for the application
    ///
    /// Defaults to "info" if not specified.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Pause imposed after every probe attempt
    #[serde(
        default = "default_settle_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub settle_delay: Duration,
    /// PostgreSQL ssl mode
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
}

impl Config {
    /// Load configuration from every layer, with explicit flags winning.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = &args.config {
            figment = figment.merge(Toml::file_exact(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(&args.overrides))
            .extract()
            .context("Failed to load config")?;

        LevelFilter::from_str(&config.log_level)
            .with_context(|| format!("Invalid log level {:?}", config.log_level))
            .context("Failed to load config")?;

        Ok(config)
    }

    /// Build driver connection options for the configured target.
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        let ssl_mode = PgSslMode::from_str(&self.sslmode)
            .with_context(|| format!("Invalid sslmode {:?}", self.sslmode))?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
            .ssl_mode(ssl_mode)
            .application_name(env!("CARGO_PKG_NAME"))
            .log_statements(tracing::log::LevelFilter::Trace)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: default_password(),
            connect_timeout: default_connect_timeout(),
            query: default_query(),
            workers: 0,
            log_level: default_log_level(),
            settle_delay: default_settle_delay(),
            sslmode: default_sslmode(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "database_name".to_string()
}

fn default_user() -> String {
    "myuser".to_string()
}

fn default_password() -> String {
    "somepass".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_query() -> String {
    "SELECT id FROM account;".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_sslmode() -> String {
    "disable".to_string()
}

/// Deserialize a string setting that may arrive as a number or boolean.
///
/// Environment values are typed by figment, so `PGPROBE_PASSWORD=123456`
/// reaches us as an integer.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TextVisitor;

    impl Visitor<'_> for TextVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or a number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_owned())
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_char<E>(self, value: char) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u128<E>(self, value: u128) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i128<E>(self, value: i128) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(TextVisitor)
}

/// Duration parser configured for probe timing.
///
/// Bare numbers are seconds, and the usual suffixes (`ms`, `s`, `m`, `h`)
/// are accepted.
fn parse_duration(value: &str) -> Result<Duration, String> {
    fundu::parse_duration(value.trim()).map_err(|e| format!("Invalid duration {value:?}: {e}"))
}

/// Deserialize a duration from a number of seconds (integer or fractional)
/// or a duration string.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number of seconds or a duration string like '500ms'")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom(format!("duration cannot be negative: {value}")))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Duration::try_from_secs_f64(value)
                .map_err(|e| E::custom(format!("invalid duration {value}: {e}")))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_duration(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
