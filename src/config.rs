//! Configuration management with validation and defaults
//!
//! Every tunable of the round engine lives here: timing, curve, crash-point
//! distribution, ledger and recorder sizes. Files are TOML; `CRASH_*`
//! environment variables override individual fields.

use crate::errors::{ConfigurationError, EngineResult};
use crate::games::types::LeaderboardEntry;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub round: RoundConfig,
    pub curve: CurveConfig,
    pub crash_point: CrashPointConfig,
    pub ledger: LedgerConfig,
    pub recorder: RecorderConfig,
    pub monitoring: MonitoringConfig,
}

/// Round lifecycle timing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoundConfig {
    /// Delay for crashed → waiting, and for the auto-start of the next round
    pub round_end_delay_ms: u64,
    /// Start rounds automatically; when false only an explicit start command begins a round
    pub auto_start: bool,
    /// Tick cadence of the driver; the multiplier itself depends only on elapsed time
    pub tick_interval_ms: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_end_delay_ms: 3000,
            auto_start: true,
            tick_interval_ms: 16, // ~60 frames/sec
        }
    }
}

/// Multiplier growth curve
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurveConfig {
    /// Compound growth per elapsed millisecond
    pub growth_base: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            growth_base: crate::games::multiplier::DEFAULT_GROWTH_BASE,
        }
    }
}

/// Crash-point distribution: `min + sample^skew_exponent * spread`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrashPointConfig {
    pub min: f64,
    pub spread: f64,
    /// Exponents above 1 push outcomes towards `min`
    pub skew_exponent: f64,
    /// Fixed RNG seed for reproducible sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for CrashPointConfig {
    fn default() -> Self {
        Self {
            min: crate::games::crash_point::MIN_CRASH_POINT,
            spread: 9.0,
            skew_exponent: 1.25,
            seed: None,
        }
    }
}

/// Player wallet and bet shortcuts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub starting_balance: f64,
    pub bet_presets: Vec<f64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 232_895.32,
            bet_presets: vec![20.0, 100.0, 200.0, 700.0, 2000.0, 10000.0],
        }
    }
}

/// Bounded history sizes
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecorderConfig {
    pub history_capacity: usize,
    pub leaderboard_capacity: usize,
    /// Crash multipliers shown before the first round, most recent first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seed_history: Vec<f64>,
    /// Winners shown before the first cash-out, most recent first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seed_leaderboard: Vec<LeaderboardEntry>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            history_capacity: crate::games::recorder::DEFAULT_HISTORY_CAPACITY,
            leaderboard_capacity: crate::games::recorder::DEFAULT_LEADERBOARD_CAPACITY,
            seed_history: Vec::new(),
            seed_leaderboard: Vec::new(),
        }
    }
}

/// Logging, stats and event feed settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    /// Seconds between stats log lines; 0 disables them
    pub stats_interval_secs: u64,
    /// Capacity of the broadcast event feed
    pub event_buffer: usize,
    /// Publish a `tick` event for every running tick
    pub publish_ticks: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_interval_secs: 5,
            event_buffer: 1024,
            publish_ticks: true,
        }
    }
}

impl EngineConfig {
    /// Short delays for tests and quick simulations
    pub fn fast_testing() -> Self {
        Self {
            round: RoundConfig {
                round_end_delay_ms: 50,
                auto_start: true,
                tick_interval_ms: 5,
            },
            ledger: LedgerConfig {
                starting_balance: 1000.0,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                stats_interval_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.round.tick_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "tick_interval_ms must be > 0".to_string(),
            ));
        }

        if !(self.curve.growth_base.is_finite() && self.curve.growth_base > 1.0) {
            return Err(ConfigValidationError::InvalidValue(
                "growth_base must be a finite value > 1".to_string(),
            ));
        }

        let cp = &self.crash_point;
        if !(cp.min.is_finite() && cp.min >= crate::games::crash_point::MIN_CRASH_POINT) {
            return Err(ConfigValidationError::InvalidValue(format!(
                "crash_point.min must be >= {}",
                crate::games::crash_point::MIN_CRASH_POINT
            )));
        }
        if !(cp.spread.is_finite() && cp.spread >= 0.0) {
            return Err(ConfigValidationError::InvalidValue(
                "crash_point.spread must be >= 0".to_string(),
            ));
        }
        if !(cp.skew_exponent.is_finite() && cp.skew_exponent > 0.0) {
            return Err(ConfigValidationError::InvalidValue(
                "crash_point.skew_exponent must be > 0".to_string(),
            ));
        }

        if !(self.ledger.starting_balance.is_finite() && self.ledger.starting_balance >= 0.0) {
            return Err(ConfigValidationError::InvalidValue(
                "starting_balance must be >= 0".to_string(),
            ));
        }
        if self
            .ledger
            .bet_presets
            .iter()
            .any(|amount| !(amount.is_finite() && *amount > 0.0))
        {
            return Err(ConfigValidationError::InvalidValue(
                "bet_presets must all be positive".to_string(),
            ));
        }

        if self
            .recorder
            .seed_history
            .iter()
            .any(|value| !(value.is_finite() && *value >= 1.0))
        {
            return Err(ConfigValidationError::InvalidValue(
                "recorder.seed_history values must be >= 1".to_string(),
            ));
        }

        if self.monitoring.event_buffer == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "event_buffer must be > 0".to_string(),
            ));
        }

        // Ticks slower than the round-end delay would make crashes visibly late
        if self.round.round_end_delay_ms > 0
            && self.round.tick_interval_ms > self.round.round_end_delay_ms
        {
            return Err(ConfigValidationError::LogicalInconsistency(
                "tick_interval_ms exceeds round_end_delay_ms".to_string(),
            ));
        }

        Ok(())
    }

    pub fn round_end_delay(&self) -> Duration {
        Duration::from_millis(self.round.round_end_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.round.tick_interval_ms)
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        match self.monitoring.stats_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidValue(String),
    LogicalInconsistency(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidValue(msg) => {
                write!(f, "Invalid configuration value: {}", msg)
            }
            ConfigValidationError::LogicalInconsistency(msg) => {
                write!(f, "Configuration logical inconsistency: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> EngineResult<EngineConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => EngineConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;

        config
            .validate()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> EngineResult<EngineConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into()
        })
    }

    fn apply_env_overrides(&self, config: &mut EngineConfig) -> EngineResult<()> {
        if let Some(delay) =
            env_override("CRASH_ROUND_END_DELAY_MS", "Invalid delay in milliseconds")?
        {
            config.round.round_end_delay_ms = delay;
        }
        if let Some(tick) =
            env_override("CRASH_TICK_INTERVAL_MS", "Invalid tick interval in milliseconds")?
        {
            config.round.tick_interval_ms = tick;
        }
        if let Some(auto_start) = env_override("CRASH_AUTO_START", "Invalid boolean value")?
        {
            config.round.auto_start = auto_start;
        }
        if let Some(balance) = env_override("CRASH_STARTING_BALANCE", "Invalid balance")?
        {
            config.ledger.starting_balance = balance;
        }
        if let Some(seed) = env_override("CRASH_SEED", "Invalid seed")? {
            config.crash_point.seed = Some(seed);
        }
        if let Ok(level) = env::var("CRASH_LOG_LEVEL") {
            config.monitoring.log_level = level;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &EngineConfig, path: &str) -> EngineResult<()> {
        let toml_string = toml::to_string_pretty(config).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into()
        })
    }
}

fn env_override<T: std::str::FromStr>(key: &str, reason: &str) -> EngineResult<Option<T>> {
    match env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| {
            ConfigurationError::InvalidValue {
                field: key.to_string(),
                value,
                reason: reason.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> EngineResult<()> {
    ConfigLoader::new().save(&EngineConfig::default(), path)
}
