//! Environment configuration for the daemon
//!
//! All configuration is read from `SAFEHOME_*` environment variables.
//! Unset variables fall back to the library defaults; set but unparsable
//! values are errors rather than silently replaced.

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use safehome_core::{
    HomeLocation, NotifierConfig, SafeHomeConfig, SamplingCadence, StateStoreConfig,
    ThresholdConfig, TrackerSettings,
};
use tracing::Level;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub state_store_type: String,
    pub state_store_path: Option<String>,
    pub notifier_type: String,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,
    pub home_label: String,
    pub thresholds: ThresholdConfig,
    pub cadence: SamplingCadence,
    pub dispatch_timeout_ms: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = SafeHomeConfig::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            state_store_type: var("SAFEHOME_STATE_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            state_store_path: var("SAFEHOME_STATE_STORE_PATH"),
            notifier_type: var("SAFEHOME_NOTIFIER_TYPE").unwrap_or_else(|| "log".to_string()),
            webhook_url: var("SAFEHOME_WEBHOOK_URL"),
            webhook_token: var("SAFEHOME_WEBHOOK_TOKEN"),
            home_latitude: parse_opt(&var, "SAFEHOME_HOME_LAT")?,
            home_longitude: parse_opt(&var, "SAFEHOME_HOME_LON")?,
            home_label: var("SAFEHOME_HOME_LABEL").unwrap_or_else(|| "Home".to_string()),
            thresholds: ThresholdConfig {
                exit_threshold_meters: parse_opt(&var, "SAFEHOME_EXIT_METERS")?
                    .unwrap_or(defaults.thresholds.exit_threshold_meters),
                entry_threshold_meters: parse_opt(&var, "SAFEHOME_ENTRY_METERS")?
                    .unwrap_or(defaults.thresholds.entry_threshold_meters),
                required_consecutive_readings: parse_opt(&var, "SAFEHOME_REQUIRED_READINGS")?
                    .unwrap_or(defaults.thresholds.required_consecutive_readings),
                notification_cooldown_secs: parse_opt(&var, "SAFEHOME_COOLDOWN_SECS")?
                    .unwrap_or(defaults.thresholds.notification_cooldown_secs),
            },
            cadence: SamplingCadence {
                interval_secs: parse_opt(&var, "SAFEHOME_INTERVAL_SECS")?
                    .unwrap_or(defaults.cadence.interval_secs),
                distance_meters: parse_opt(&var, "SAFEHOME_DISTANCE_METERS")?
                    .unwrap_or(defaults.cadence.distance_meters),
            },
            dispatch_timeout_ms: parse_opt(&var, "SAFEHOME_DISPATCH_TIMEOUT_MS")?
                .unwrap_or(defaults.tracker.dispatch_timeout_ms),
            log_level: var("SAFEHOME_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.state_store_type.as_str() {
            "file" => {
                let Some(path) = &self.state_store_path else {
                    anyhow::bail!(
                        "SAFEHOME_STATE_STORE_PATH is required when SAFEHOME_STATE_STORE_TYPE=file. \
                        Set it via: export SAFEHOME_STATE_STORE_PATH=/var/lib/safehome/state.json"
                    );
                };

                if let Some(parent) = std::path::Path::new(path).parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    anyhow::bail!(
                        "SAFEHOME_STATE_STORE_PATH parent directory does not exist: {}. \
                        Create it first: sudo mkdir -p {}",
                        parent.display(),
                        parent.display()
                    );
                }
            }
            "memory" => {
                eprintln!(
                    "WARNING: SAFEHOME_STATE_STORE_TYPE=memory keeps no state across restarts."
                );
            }
            other => anyhow::bail!(
                "SAFEHOME_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        }

        match self.notifier_type.as_str() {
            "log" => {}
            "webhook" => {
                if self.webhook_url.is_none() {
                    anyhow::bail!("SAFEHOME_WEBHOOK_URL is required when SAFEHOME_NOTIFIER_TYPE=webhook");
                }
                if !cfg!(feature = "webhook") {
                    anyhow::bail!("safehomed was built without the webhook feature");
                }
            }
            other => anyhow::bail!(
                "SAFEHOME_NOTIFIER_TYPE '{}' is not supported. \
                Supported types: log, webhook",
                other
            ),
        }

        if self.home_latitude.is_some() != self.home_longitude.is_some() {
            anyhow::bail!("SAFEHOME_HOME_LAT and SAFEHOME_HOME_LON must be set together");
        }
        if let Some(home) = self.home() {
            home.validate().context("Invalid home location")?;
        }

        self.log_level()?;

        self.core_config()
            .validate()
            .context("Invalid tracker configuration")?;

        Ok(())
    }

    /// Home location from the environment, if both coordinates are set
    pub fn home(&self) -> Option<HomeLocation> {
        match (self.home_latitude, self.home_longitude) {
            (Some(latitude), Some(longitude)) => {
                Some(HomeLocation::new(latitude, longitude, self.home_label.clone()))
            }
            _ => None,
        }
    }

    /// Library configuration built from the environment
    pub fn core_config(&self) -> SafeHomeConfig {
        SafeHomeConfig {
            thresholds: self.thresholds.clone(),
            cadence: self.cadence.clone(),
            state_store: match self.state_store_type.as_str() {
                "memory" => StateStoreConfig::Memory,
                _ => StateStoreConfig::File {
                    path: self.state_store_path.clone().unwrap_or_default(),
                },
            },
            notifier: match self.notifier_type.as_str() {
                "webhook" => NotifierConfig::Webhook {
                    url: self.webhook_url.clone().unwrap_or_default(),
                    api_token: self.webhook_token.clone(),
                },
                _ => NotifierConfig::Log,
            },
            tracker: TrackerSettings {
                dispatch_timeout_ms: self.dispatch_timeout_ms,
                ..TrackerSettings::default()
            },
        }
    }

    pub fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "SAFEHOME_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn parse_opt<T>(var: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value: {}", key, raw))
        })
        .transpose()
}
