//! Crash betting round engine
//!
//! A single-player crash game session: a multiplier grows from 1.00x until a
//! hidden crash point, and a bet placed before the round pays `bet × multiplier`
//! if it is cashed out first. The synchronous core lives in [`games`]; the
//! [`driver`] runs it on tokio with real timers and an event feed.

pub mod config;
pub mod driver;
pub mod errors;
pub mod games;
pub mod metrics;

pub use config::{ConfigLoader, EngineConfig};
pub use driver::{spawn, EngineCommand, EngineHandle};
pub use errors::{EngineError, EngineResult};
pub use games::{CrashEngine, EngineEvent, EngineSnapshot, GameState, RoundId};
pub use metrics::EngineMetrics;
