//! Run configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Default server endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:10443/ws";

/// Interaction model under measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    /// The server streams events to every connected client.
    #[default]
    Push,
    /// The client sends requests and the server echoes them.
    #[serde(rename = "rtt")]
    RequestResponse,
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::RequestResponse => f.write_str("rtt"),
        }
    }
}

/// Configuration of a single measurement run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Endpoint URL (`ws://` or `wss://`).
    pub url: String,
    /// Interaction model.
    pub model: Model,
    /// Messages per second generated by the side that owns generation.
    pub rate: u32,
    /// Payload size in bytes.
    pub payload_size: usize,
    /// Run length; ignored in continuous mode.
    pub duration: Duration,
    /// Leading samples excluded from statistics.
    pub warmup: u64,
    /// Run until stopped externally.
    pub continuous: bool,
    /// Accept any server certificate.
    pub insecure: bool,
    /// Upper bound on connection establishment.
    pub connect_timeout: Duration,
    /// Upper bound on stopping the generator.
    pub stop_grace: Duration,
    /// Complete once this many samples have been retained.
    pub early_stop_samples: Option<u64>,
    /// Interval between progress log lines, if any.
    pub progress_interval: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            model: Model::Push,
            rate: 10,
            payload_size: 100,
            duration: Duration::from_secs(30),
            warmup: 100,
            continuous: false,
            insecure: false,
            connect_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(5),
            early_stop_samples: None,
            progress_interval: None,
        }
    }
}

impl RunConfig {
    /// Creates a config for `url` with default settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the interaction model.
    #[must_use]
    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the generation rate.
    #[must_use]
    pub fn rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the payload size.
    #[must_use]
    pub fn payload_size(mut self, size: usize) -> Self {
        self.payload_size = size;
        self
    }

    /// Sets the run duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the warm-up sample count.
    #[must_use]
    pub fn warmup(mut self, warmup: u64) -> Self {
        self.warmup = warmup;
        self
    }

    /// Enables or disables continuous mode.
    #[must_use]
    pub fn continuous(mut self, enabled: bool) -> Self {
        self.continuous = enabled;
        self
    }

    /// Enables or disables certificate verification bypass.
    #[must_use]
    pub fn insecure(mut self, enabled: bool) -> Self {
        self.insecure = enabled;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the generator stop grace period.
    #[must_use]
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Sets the early-stop sample threshold.
    #[must_use]
    pub fn early_stop_samples(mut self, samples: Option<u64>) -> Self {
        self.early_stop_samples = samples;
        self
    }

    /// Sets the progress log interval.
    #[must_use]
    pub fn progress_interval(mut self, interval: Option<Duration>) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Returns the validated rate.
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroRate` if the rate is zero.
    pub fn nonzero_rate(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.rate).ok_or(ConfigError::ZeroRate)
    }

    /// Checks the configuration before any connection is attempted.
    ///
    /// # Errors
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.nonzero_rate()?;
        if !self.continuous && self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        validate_url(&self.url)
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ConfigError::invalid_url(url, "missing scheme"));
    };
    if !matches!(scheme, "ws" | "wss") {
        return Err(ConfigError::invalid_url(
            url,
            format!("unsupported scheme {scheme:?}, expected ws or wss"),
        ));
    }
    let host = rest.split(['/', '?']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(ConfigError::invalid_url(url, "missing host"));
    }
    Ok(())
}
