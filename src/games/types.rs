use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the live round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Waiting,
    Running,
    Crashed,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Waiting => write!(f, "waiting"),
            GameState::Running => write!(f, "running"),
            GameState::Crashed => write!(f, "crashed"),
        }
    }
}

/// Sequential round identifier, starting at 1 for the first round of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct RoundId(pub u64);

impl RoundId {
    pub fn next(self) -> Self {
        RoundId(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A stake placed for one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bet {
    pub bet_id: String,
    pub amount: f64,
    pub placed_in_round: RoundId,
    pub cashed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_out_multiplier: Option<f64>,
    pub placed_at: DateTime<Utc>,
}

impl Bet {
    /// Winnings at full precision, `None` while the bet is still riding
    pub fn winnings(&self) -> Option<f64> {
        self.cash_out_multiplier.map(|m| self.amount * m)
    }
}

/// Successful cash-out as seen by the leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub username: String,
    pub odds: f64,
    pub bet: f64,
    pub win: f64,
}

/// Result of a successful cash-out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashOutReceipt {
    pub round_id: RoundId,
    pub bet_amount: f64,
    pub multiplier: f64,
    pub winnings: f64,
    pub balance: f64,
}

/// Cash-out accepted by the engine, with the leaderboard entry it produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashedOut {
    pub receipt: CashOutReceipt,
    pub entry: LeaderboardEntry,
}

/// How a bet was retired when its round returned to waiting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RoundSettlement {
    Won { bet: Bet, winnings: f64 },
    Forfeited { bet: Bet },
}

impl RoundSettlement {
    pub fn bet(&self) -> &Bet {
        match self {
            RoundSettlement::Won { bet, .. } | RoundSettlement::Forfeited { bet } => bet,
        }
    }
}

/// Emitted when a round enters `Running`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundStarted {
    pub round_id: RoundId,
    pub has_bet: bool,
}

/// Result of advancing the clock of a running round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TickOutcome {
    Running {
        round_id: RoundId,
        multiplier: f64,
    },
    Crashed {
        round_id: RoundId,
        crash_point: f64,
        final_multiplier: f64,
    },
}

/// Read-only view of the session handed to presentation layers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSnapshot {
    pub game_state: GameState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_id: Option<RoundId>,
    /// Display value, rounded to two decimals
    pub multiplier: f64,
    /// Only revealed once the round has crashed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    pub balance: f64,
    pub has_placed_bet: bool,
    pub has_cashed_out: bool,
    pub win_amount: f64,
    pub history: Vec<f64>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub bet_presets: Vec<f64>,
}

/// Event feed published to subscribers of a running engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RoundStarted {
        round_id: RoundId,
        timestamp: i64,
    },
    Tick {
        round_id: RoundId,
        multiplier: f64,
    },
    RoundCrashed {
        round_id: RoundId,
        crash_point: f64,
        final_multiplier: f64,
        timestamp: i64,
    },
    RoundReset {
        next_round_id: RoundId,
        timestamp: i64,
    },
    BetPlaced {
        round_id: RoundId,
        amount: f64,
        balance: f64,
    },
    CashedOut {
        round_id: RoundId,
        entry: LeaderboardEntry,
        balance: f64,
    },
    BetForfeited {
        round_id: RoundId,
        amount: f64,
    },
}

/// Rejection reasons for `place_bet`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BetError {
    #[error("Bets are only accepted while waiting (round is {state})")]
    NotAccepting { state: GameState },

    #[error("A bet is already placed for round {round_id}")]
    AlreadyPlaced { round_id: RoundId },

    #[error("Bet amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("Insufficient balance: bet {amount} exceeds balance {balance}")]
    InsufficientBalance { amount: f64, balance: f64 },

    #[error("Unknown bet preset index {0}")]
    UnknownPreset(usize),
}

/// Rejection reasons for `cash_out`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CashOutError {
    #[error("No active bet to cash out")]
    NoActiveBet,

    #[error("Bet for round {round_id} was already cashed out")]
    AlreadyCashedOut { round_id: RoundId },

    #[error("Cash-out is only possible while running (round is {state})")]
    NotRunning { state: GameState },
}

/// Rejected round transitions
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoundError {
    #[error("Round can only start from waiting (round is {state})")]
    NotWaiting { state: GameState },

    #[error("Round is not running (round is {state})")]
    NotRunning { state: GameState },

    #[error("Round has not crashed (round is {state})")]
    NotCrashed { state: GameState },

    #[error("Unresolved bet from round {round_id} blocks a new round")]
    StaleBet { round_id: RoundId },

    #[error(
        "Invalid crash point {0} (expected a finite value >= {})",
        crate::games::crash_point::MIN_CRASH_POINT
    )]
    InvalidCrashPoint(f64),
}
