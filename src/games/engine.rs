//! Crash game session
//!
//! `CrashEngine` owns one round state machine, one betting ledger and one
//! recorder, and is the only thing that mutates them. It is synchronous and
//! clock-free: callers pass `now` into every time-dependent command, and the
//! engine reports which fixed delay (if any) it is waiting on through
//! `pending_delay()`. Each armed delay carries a `TimerToken`; a token that no
//! longer matches the armed one is ignored, so a timer that outlives the
//! transition it was armed for cannot mutate state.

use crate::config::EngineConfig;
use crate::games::crash_point::{CrashPointSource, SkewedCrashPoints};
use crate::games::ledger::BettingLedger;
use crate::games::multiplier::{round_to_cents, MultiplierCurve};
use crate::games::recorder::Recorder;
use crate::games::round::{Round, RoundStateMachine};
use crate::games::types::{
    Bet, BetError, CashOutError, CashedOut, EngineSnapshot, GameState, LeaderboardEntry,
    RoundError, RoundId, RoundSettlement, RoundStarted, TickOutcome,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Which fixed delay is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    /// Crashed → Waiting
    RoundEnd,
    /// Waiting → Running
    AutoStart,
}

/// Identifies one armed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    pub epoch: u64,
    pub kind: DelayKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDelay {
    pub token: TimerToken,
    pub duration: Duration,
}

/// What happened when an armed delay elapsed
#[derive(Debug, Clone, PartialEq)]
pub enum DelayOutcome {
    /// The token was cancelled or superseded; nothing changed
    Stale,
    RoundReset {
        next_round_id: RoundId,
        settlement: Option<RoundSettlement>,
    },
    RoundStarted(RoundStarted),
}

pub struct CrashEngine {
    config: EngineConfig,
    rounds: RoundStateMachine,
    ledger: BettingLedger,
    recorder: Recorder,
    rng: StdRng,
    epoch: u64,
    pending: Option<PendingDelay>,
}

impl CrashEngine {
    /// Engine drawing crash points from the configured skewed distribution
    pub fn new(config: EngineConfig) -> Self {
        let source = SkewedCrashPoints::from_config(&config.crash_point);
        Self::with_source(config, Box::new(source))
    }

    /// Engine with a custom crash-point source
    pub fn with_source(config: EngineConfig, source: Box<dyn CrashPointSource>) -> Self {
        let rng = match config.crash_point.seed {
            // Offset so usernames don't mirror the crash-point stream
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        let mut engine = Self {
            rounds: RoundStateMachine::new(MultiplierCurve::from_config(&config.curve), source),
            ledger: BettingLedger::new(config.ledger.starting_balance),
            recorder: Recorder::from_config(&config.recorder),
            config,
            rng,
            epoch: 0,
            pending: None,
        };
        // The first round auto-starts one delay after the session begins
        engine.arm_auto_start();
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.rounds.state()
    }

    /// Full-precision multiplier used for settlement
    pub fn multiplier(&self) -> f64 {
        self.rounds.multiplier()
    }

    pub fn round(&self) -> Option<&Round> {
        self.rounds.round()
    }

    pub fn upcoming_round_id(&self) -> RoundId {
        self.rounds.upcoming_round_id()
    }

    pub fn curve(&self) -> &MultiplierCurve {
        self.rounds.curve()
    }

    pub fn ledger(&self) -> &BettingLedger {
        &self.ledger
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// The delay the engine currently expects to be woken for
    pub fn pending_delay(&self) -> Option<PendingDelay> {
        self.pending
    }

    pub fn place_bet(&mut self, amount: f64) -> Result<Bet, BetError> {
        let round_id = self.rounds.upcoming_round_id();
        self.ledger
            .place_bet(amount, self.rounds.state(), round_id)
            .map_err(|e| {
                debug!("Bet of {} rejected: {}", amount, e);
                e
            })
    }

    /// Bet one of the configured preset amounts
    pub fn place_preset_bet(&mut self, index: usize) -> Result<Bet, BetError> {
        let amount = *self
            .config
            .ledger
            .bet_presets
            .get(index)
            .ok_or(BetError::UnknownPreset(index))?;
        self.place_bet(amount)
    }

    pub fn cash_out(&mut self) -> Result<CashedOut, CashOutError> {
        let receipt = self
            .ledger
            .cash_out(self.rounds.state(), self.rounds.multiplier())
            .map_err(|e| {
                debug!("Cash-out rejected: {}", e);
                e
            })?;

        let entry = LeaderboardEntry {
            username: self.masked_username(),
            odds: round_to_cents(receipt.multiplier),
            bet: receipt.bet_amount,
            win: round_to_cents(receipt.winnings),
        };
        self.recorder.record_winner(entry.clone());
        info!(
            "Cashed out {} at {:.2}x for {:.2} in round {}",
            receipt.bet_amount, receipt.multiplier, receipt.winnings, receipt.round_id
        );

        Ok(CashedOut { receipt, entry })
    }

    /// Waiting → Running. Preempts a pending auto-start.
    pub fn start_round(&mut self, now: Instant) -> Result<RoundStarted, RoundError> {
        let state = self.rounds.state();
        if state != GameState::Waiting {
            return Err(RoundError::NotWaiting { state });
        }
        let upcoming = self.rounds.upcoming_round_id();
        if let Some(bet) = self.ledger.stale_bet(upcoming) {
            return Err(RoundError::StaleBet {
                round_id: bet.placed_in_round,
            });
        }

        let round_id = self.rounds.start(now)?;
        self.cancel_timers();
        self.ledger.begin_round();

        Ok(RoundStarted {
            round_id,
            has_bet: self.ledger.has_placed_bet(),
        })
    }

    /// Advance the running round to `now`. On crash the final multiplier goes
    /// into history and the round-end delay is armed.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, RoundError> {
        let outcome = self.rounds.tick(now)?;

        if let TickOutcome::Crashed {
            round_id,
            final_multiplier,
            ..
        } = outcome
        {
            self.recorder.record_round(round_to_cents(final_multiplier));
            if let Some(bet) = self.ledger.current_bet().filter(|bet| !bet.cashed_out) {
                info!("Bet of {} lost in round {}", bet.amount, round_id);
            }
            self.arm(DelayKind::RoundEnd);
        }

        Ok(outcome)
    }

    /// Handle an elapsed delay previously announced through `pending_delay()`
    pub fn delay_elapsed(
        &mut self,
        token: TimerToken,
        now: Instant,
    ) -> Result<DelayOutcome, RoundError> {
        if self.pending.map(|pending| pending.token) != Some(token) {
            warn!("Ignoring stale {:?} timer (epoch {})", token.kind, token.epoch);
            return Ok(DelayOutcome::Stale);
        }
        self.pending = None;

        match token.kind {
            DelayKind::RoundEnd => {
                let next_round_id = self.rounds.reset()?;
                let settlement = self.ledger.settle_round();
                info!("Waiting for round {}", next_round_id);
                self.arm_auto_start();
                Ok(DelayOutcome::RoundReset {
                    next_round_id,
                    settlement,
                })
            }
            DelayKind::AutoStart => match self.start_round(now) {
                Ok(started) => Ok(DelayOutcome::RoundStarted(started)),
                Err(e) => {
                    // Try again after another delay rather than stalling the session
                    self.arm_auto_start();
                    Err(e)
                }
            },
        }
    }

    /// Switch the auto-start policy at runtime
    pub fn set_auto_start(&mut self, enabled: bool) {
        self.config.round.auto_start = enabled;
        match (enabled, self.pending) {
            (false, Some(pending)) if pending.token.kind == DelayKind::AutoStart => {
                self.cancel_timers()
            }
            (true, None) => self.arm_auto_start(),
            _ => {}
        }
    }

    /// Drop any armed delay; its token becomes stale
    pub fn cancel_timers(&mut self) {
        self.epoch += 1;
        self.pending = None;
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.rounds.state();
        let round = self.rounds.round();
        EngineSnapshot {
            game_state: state,
            round_id: round.map(|r| r.id),
            multiplier: round_to_cents(self.rounds.multiplier()),
            crash_point: round
                .filter(|_| state == GameState::Crashed)
                .map(|r| r.crash_point),
            balance: self.ledger.balance(),
            has_placed_bet: self.ledger.has_placed_bet(),
            has_cashed_out: self.ledger.has_cashed_out(),
            win_amount: self.ledger.win_amount(),
            history: self.recorder.history().to_vec(),
            leaderboard: self.recorder.leaderboard().to_vec(),
            bet_presets: self.config.ledger.bet_presets.clone(),
        }
    }

    fn arm(&mut self, kind: DelayKind) {
        self.epoch += 1;
        self.pending = Some(PendingDelay {
            token: TimerToken {
                epoch: self.epoch,
                kind,
            },
            duration: self.config.round_end_delay(),
        });
    }

    fn arm_auto_start(&mut self) {
        let upcoming = self.rounds.upcoming_round_id();
        if self.config.round.auto_start
            && self.rounds.state() == GameState::Waiting
            && self.ledger.stale_bet(upcoming).is_none()
        {
            self.arm(DelayKind::AutoStart);
        }
    }

    fn masked_username(&mut self) -> String {
        format!("******{}", self.rng.gen_range(0..100))
    }
}
