//! Pipeline configuration, loaded from environment variables.
//!
//! Malformed values are fatal at startup — configuration errors are
//! programmer/operator errors, not per-cycle conditions.

use std::time::Duration;

use crate::domain::aggregate::CandleInterval;

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds an unparseable value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The offending variable.
        key: &'static str,
        /// What went wrong.
        message: String,
    },
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Per-source extraction timeout.
    pub extract_timeout: Duration,
    /// Per-sink load timeout.
    pub sink_timeout: Duration,
    /// Records per parallel transform batch.
    pub batch_size: usize,
    /// VWAP window width in seconds.
    pub vwap_window_secs: u64,
    /// Ingestion cycle cadence.
    pub ingest_interval: Duration,
    /// Jitter added to each trigger firing.
    pub trigger_jitter: Duration,
    /// Candle intervals to build, each on its own cadence.
    pub candle_intervals: Vec<CandleInterval>,
    /// Prometheus exporter port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            extract_timeout: Duration::from_secs(15),
            sink_timeout: Duration::from_secs(30),
            batch_size: 100,
            vwap_window_secs: 5,
            ingest_interval: Duration::from_secs(5),
            trigger_jitter: Duration::from_millis(250),
            candle_intervals: CandleInterval::ALL.to_vec(),
            metrics_port: 9184,
        }
    }
}

impl PipelineSettings {
    /// Load settings from the environment, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a set variable holds an unparseable
    /// value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            extract_timeout: env_duration_secs("INGEST_EXTRACT_TIMEOUT_SECS")?
                .unwrap_or(defaults.extract_timeout),
            sink_timeout: env_duration_secs("INGEST_SINK_TIMEOUT_SECS")?
                .unwrap_or(defaults.sink_timeout),
            batch_size: env_parse("INGEST_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            vwap_window_secs: env_parse("INGEST_VWAP_WINDOW_SECS")?
                .unwrap_or(defaults.vwap_window_secs),
            ingest_interval: env_duration_secs("INGEST_INTERVAL_SECS")?
                .unwrap_or(defaults.ingest_interval),
            trigger_jitter: env_duration_millis("INGEST_TRIGGER_JITTER_MS")?
                .unwrap_or(defaults.trigger_jitter),
            candle_intervals: env_candle_intervals("INGEST_CANDLE_INTERVALS")?
                .unwrap_or(defaults.candle_intervals),
            metrics_port: env_parse("INGEST_METRICS_PORT")?.unwrap_or(defaults.metrics_port),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_duration_secs(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_secs))
}

fn env_duration_millis(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}

fn env_candle_intervals(key: &'static str) -> Result<Option<Vec<CandleInterval>>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| {
            CandleInterval::parse(label).ok_or(ConfigError::InvalidValue {
                key,
                message: format!("unknown candle interval '{label}'"),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
