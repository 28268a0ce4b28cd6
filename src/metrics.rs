//! Engine metrics collection
//!
//! Counters are plain atomics shared between the engine task and whoever
//! holds the handle. `to_prometheus_format` renders them in the text
//! exposition format.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::info;

pub struct EngineMetrics {
    start_time: Instant,

    /// Round metrics
    pub rounds_started: AtomicU64,
    pub rounds_crashed: AtomicU64,
    pub start_failures: AtomicU64,
    pub ticks: AtomicU64,

    /// Betting metrics
    pub bets_placed: AtomicU64,
    pub bets_rejected: AtomicU64,
    pub cash_outs: AtomicU64,
    pub cash_outs_rejected: AtomicU64,
    pub bets_forfeited: AtomicU64,

    total_wagered: Mutex<f64>,
    total_paid_out: Mutex<f64>,
    last_crash_multiplier: Mutex<f64>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_started: AtomicU64::new(0),
            rounds_crashed: AtomicU64::new(0),
            start_failures: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            bets_placed: AtomicU64::new(0),
            bets_rejected: AtomicU64::new(0),
            cash_outs: AtomicU64::new(0),
            cash_outs_rejected: AtomicU64::new(0),
            bets_forfeited: AtomicU64::new(0),
            total_wagered: Mutex::new(0.0),
            total_paid_out: Mutex::new(0.0),
            last_crash_multiplier: Mutex::new(0.0),
        }
    }

    pub fn record_round_started(&self) {
        self.rounds_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crash(&self, final_multiplier: f64) {
        self.rounds_crashed.fetch_add(1, Ordering::SeqCst);
        set(&self.last_crash_multiplier, final_multiplier);
    }

    pub fn record_bet(&self, amount: f64) {
        self.bets_placed.fetch_add(1, Ordering::SeqCst);
        add(&self.total_wagered, amount);
    }

    pub fn record_bet_rejected(&self) {
        self.bets_rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_cash_out(&self, winnings: f64) {
        self.cash_outs.fetch_add(1, Ordering::SeqCst);
        add(&self.total_paid_out, winnings);
    }

    pub fn record_cash_out_rejected(&self) {
        self.cash_outs_rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_forfeit(&self) {
        self.bets_forfeited.fetch_add(1, Ordering::SeqCst);
    }

    /// Paid out / wagered, 0 until something was wagered
    pub fn return_to_player(&self) -> f64 {
        let wagered = get(&self.total_wagered);
        if wagered > 0.0 {
            get(&self.total_paid_out) / wagered
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            rounds_started: self.rounds_started.load(Ordering::SeqCst),
            rounds_crashed: self.rounds_crashed.load(Ordering::SeqCst),
            start_failures: self.start_failures.load(Ordering::SeqCst),
            ticks: self.ticks.load(Ordering::Relaxed),
            bets_placed: self.bets_placed.load(Ordering::SeqCst),
            bets_rejected: self.bets_rejected.load(Ordering::SeqCst),
            cash_outs: self.cash_outs.load(Ordering::SeqCst),
            cash_outs_rejected: self.cash_outs_rejected.load(Ordering::SeqCst),
            bets_forfeited: self.bets_forfeited.load(Ordering::SeqCst),
            total_wagered: get(&self.total_wagered),
            total_paid_out: get(&self.total_paid_out),
            return_to_player: self.return_to_player(),
            last_crash_multiplier: get(&self.last_crash_multiplier),
        }
    }

    pub fn to_prometheus_format(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        // Round metrics
        output.push_str(&format!(
            "# HELP crash_rounds_started_total Rounds that entered the running state\n\
             # TYPE crash_rounds_started_total counter\n\
             crash_rounds_started_total {}\n\n",
            snapshot.rounds_started
        ));

        output.push_str(&format!(
            "# HELP crash_rounds_crashed_total Rounds that reached their crash point\n\
             # TYPE crash_rounds_crashed_total counter\n\
             crash_rounds_crashed_total {}\n\n",
            snapshot.rounds_crashed
        ));

        output.push_str(&format!(
            "# HELP crash_round_start_failures_total Round starts refused\n\
             # TYPE crash_round_start_failures_total counter\n\
             crash_round_start_failures_total {}\n\n",
            snapshot.start_failures
        ));

        output.push_str(&format!(
            "# HELP crash_last_crash_multiplier Final multiplier of the latest round\n\
             # TYPE crash_last_crash_multiplier gauge\n\
             crash_last_crash_multiplier {}\n\n",
            snapshot.last_crash_multiplier
        ));

        // Betting metrics
        output.push_str(&format!(
            "# HELP crash_bets_total Bet commands by outcome\n\
             # TYPE crash_bets_total counter\n\
             crash_bets_total{{outcome=\"placed\"}} {}\n\
             crash_bets_total{{outcome=\"rejected\"}} {}\n\
             crash_bets_total{{outcome=\"forfeited\"}} {}\n\n",
            snapshot.bets_placed, snapshot.bets_rejected, snapshot.bets_forfeited
        ));

        output.push_str(&format!(
            "# HELP crash_cash_outs_total Cash-out commands by outcome\n\
             # TYPE crash_cash_outs_total counter\n\
             crash_cash_outs_total{{outcome=\"accepted\"}} {}\n\
             crash_cash_outs_total{{outcome=\"rejected\"}} {}\n\n",
            snapshot.cash_outs, snapshot.cash_outs_rejected
        ));

        output.push_str(&format!(
            "# HELP crash_wagered_total Total amount staked\n\
             # TYPE crash_wagered_total counter\n\
             crash_wagered_total {}\n\n",
            snapshot.total_wagered
        ));

        output.push_str(&format!(
            "# HELP crash_paid_out_total Total amount credited by cash-outs\n\
             # TYPE crash_paid_out_total counter\n\
             crash_paid_out_total {}\n",
            snapshot.total_paid_out
        ));

        output
    }

    /// One-line summary for the periodic stats log
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            "Stats: {} rounds, {} bets ({} rejected), {} cash-outs, {} forfeited, RTP {:.3}",
            snapshot.rounds_crashed,
            snapshot.bets_placed,
            snapshot.bets_rejected,
            snapshot.cash_outs,
            snapshot.bets_forfeited,
            snapshot.return_to_player
        );
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub rounds_started: u64,
    pub rounds_crashed: u64,
    pub start_failures: u64,
    pub ticks: u64,
    pub bets_placed: u64,
    pub bets_rejected: u64,
    pub cash_outs: u64,
    pub cash_outs_rejected: u64,
    pub bets_forfeited: u64,
    pub total_wagered: f64,
    pub total_paid_out: f64,
    pub return_to_player: f64,
    pub last_crash_multiplier: f64,
}

fn get(cell: &Mutex<f64>) -> f64 {
    cell.lock().map(|value| *value).unwrap_or(0.0)
}

fn set(cell: &Mutex<f64>, value: f64) {
    if let Ok(mut guard) = cell.lock() {
        *guard = value;
    }
}

fn add(cell: &Mutex<f64>, amount: f64) {
    if let Ok(mut guard) = cell.lock() {
        *guard += amount;
    }
}
