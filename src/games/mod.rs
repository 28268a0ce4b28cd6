pub mod crash_point;
pub mod engine;
pub mod ledger;
pub mod multiplier;
pub mod recorder;
pub mod round;
pub mod types;

pub use crash_point::{CrashPointSource, ScriptedCrashPoints, SkewedCrashPoints};
pub use engine::{CrashEngine, DelayKind, DelayOutcome, PendingDelay, TimerToken};
pub use ledger::BettingLedger;
pub use multiplier::{round_to_cents, MultiplierCurve};
pub use recorder::{BoundedLog, Recorder};
pub use round::{Round, RoundStateMachine};
pub use types::*;
