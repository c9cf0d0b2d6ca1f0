//! Configuration System using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`HubConfig::default()`)
//! 2. `config/alshub.toml` (or the file given with `--config`)
//! 3. Environment variables prefixed with `ALSHUB_`; `__` separates nesting
//!    levels, e.g. `ALSHUB_SCHEDULE__ENDSTATION=8.3.2`
//!
//! # Example
//! ```no_run
//! use alshub::config::HubConfig;
//!
//! let config = HubConfig::load()?;
//! println!("Endstation: {}", config.schedule.endstation);
//! # Ok::<(), figment::Error>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reconcile::PollFailurePolicy;
use crate::schedule::{DEFAULT_API_KEY, DEFAULT_BASE_URL, DEFAULT_TZ_ID};
use crate::validation;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/alshub.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Scheduling service settings
    pub schedule: ScheduleConfig,
    /// Reconciliation service settings
    pub service: ServiceConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

/// Scheduling service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Base URL; the endstation is appended verbatim
    pub base_url: String,
    /// Endstation to query (e.g. "7.0.1.1")
    pub endstation: String,
    /// API key sent as `api-key`
    pub api_key: String,
    /// Time zone the service interprets `start`/`stop` in
    pub tz_id: String,
    /// Whether unscheduled beam time is reported
    pub include_unscheduled: bool,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Reconciliation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Time between automatic polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// What a failed poll does to the stored PI
    pub poll_failure_policy: PollFailurePolicy,
    /// Ask for the user email at startup instead of restoring it
    pub prompt_user_email: bool,
    /// Publish metadata snapshots to run-engine subscribers
    pub subscribe_run_engine: bool,
    /// Where the settings panel is persisted (None disables persistence)
    pub session_path: Option<PathBuf>,
    /// Capacity of the service command channel
    pub command_capacity: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "ALSHub".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endstation: "7.0.1.1".to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            tz_id: DEFAULT_TZ_ID.to_string(),
            include_unscheduled: false,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(600),
            poll_failure_policy: PollFailurePolicy::default(),
            prompt_user_email: true,
            subscribe_run_engine: true,
            session_path: default_session_path(),
            command_capacity: 32,
        }
    }
}

fn default_session_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("alshub").join("session.json"))
}

impl HubConfig {
    /// Load configuration from `config/alshub.toml` and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// The provider stack, exposed for callers that add their own layers
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(HubConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ALSHUB_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        validation::is_valid_base_url(&self.schedule.base_url)
            .map_err(|e| format!("schedule.base_url: {e}"))?;
        validation::is_valid_endstation(&self.schedule.endstation)
            .map_err(|e| format!("schedule.endstation: {e}"))?;
        validation::is_valid_time_zone(&self.schedule.tz_id)
            .map_err(|e| format!("schedule.tz_id: {e}"))?;

        if self.schedule.request_timeout.is_zero() {
            return Err("schedule.request_timeout must be greater than zero".to_string());
        }
        if self.service.poll_interval < Duration::from_secs(1) {
            return Err(format!(
                "service.poll_interval {:?} is too short. Must be at least 1s",
                self.service.poll_interval
            ));
        }
        if self.service.command_capacity == 0 {
            return Err("service.command_capacity must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
