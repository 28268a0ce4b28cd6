//! Error types for the crash round engine
//!
//! Command rejections (`BetError`, `CashOutError`, `RoundError`) are ordinary,
//! recoverable results. `EngineError` wraps them together with configuration
//! and driver failures for callers that want a single error type.

use crate::games::types::{BetError, CashOutError, RoundError};
use std::fmt;

/// Root error type for all engine operations
#[derive(Debug)]
pub enum EngineError {
    /// Configuration related errors
    Configuration(ConfigurationError),

    /// Rejected bet placement
    Bet(BetError),

    /// Rejected cash-out
    CashOut(CashOutError),

    /// Rejected round transition
    Round(RoundError),

    /// Engine task communication errors
    Driver(DriverError),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    ValidationFailed(String),
    InvalidValue { field: String, value: String, reason: String },
    LoadFailed(String),
    SaveFailed(String),
}

/// Failures talking to a running engine task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The engine task has stopped and no longer accepts commands
    Closed,
    /// The engine task dropped the reply channel
    NoReply,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Configuration(e) => write!(f, "Configuration error: {}", e),
            EngineError::Bet(e) => write!(f, "Bet rejected: {}", e),
            EngineError::CashOut(e) => write!(f, "Cash-out rejected: {}", e),
            EngineError::Round(e) => write!(f, "Round error: {}", e),
            EngineError::Driver(e) => write!(f, "Driver error: {}", e),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::ValidationFailed(msg) => write!(f, "Validation failed: {}", msg),
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::LoadFailed(msg) => {
                write!(f, "Failed to load configuration: {}", msg)
            }
            ConfigurationError::SaveFailed(msg) => {
                write!(f, "Failed to save configuration: {}", msg)
            }
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Closed => write!(f, "Engine task is not running"),
            DriverError::NoReply => write!(f, "Engine task dropped the reply"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Configuration(e) => Some(e),
            EngineError::Bet(e) => Some(e),
            EngineError::CashOut(e) => Some(e),
            EngineError::Round(e) => Some(e),
            EngineError::Driver(e) => Some(e),
        }
    }
}

impl std::error::Error for ConfigurationError {}
impl std::error::Error for DriverError {}

impl From<ConfigurationError> for EngineError {
    fn from(e: ConfigurationError) -> Self {
        EngineError::Configuration(e)
    }
}

impl From<BetError> for EngineError {
    fn from(e: BetError) -> Self {
        EngineError::Bet(e)
    }
}

impl From<CashOutError> for EngineError {
    fn from(e: CashOutError) -> Self {
        EngineError::CashOut(e)
    }
}

impl From<RoundError> for EngineError {
    fn from(e: RoundError) -> Self {
        EngineError::Round(e)
    }
}

impl From<DriverError> for EngineError {
    fn from(e: DriverError) -> Self {
        EngineError::Driver(e)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Configuration(ConfigurationError::SaveFailed(e.to_string()))
    }
}

// Convenience type alias for Results
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::GameState;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let error = EngineError::from(ConfigurationError::ValidationFailed("test".to_string()));
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("test"));
    }

    #[test]
    fn test_command_error_conversion() {
        let error: EngineError = CashOutError::NotRunning { state: GameState::Crashed }.into();
        match error {
            EngineError::CashOut(CashOutError::NotRunning { state }) => {
                assert_eq!(state, GameState::Crashed)
            }
            _ => panic!("Expected cash-out error"),
        }
    }

    #[test]
    fn test_error_source() {
        let error: EngineError = DriverError::Closed.into();
        assert!(error.source().is_some());
        assert!(error.to_string().contains("not running"));
    }
}
