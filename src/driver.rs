//! Async driver for a `CrashEngine`
//!
//! The engine runs inside a single tokio task. Commands arrive over an mpsc
//! channel with a oneshot reply, so they are applied one at a time and never
//! interleave with a tick or a delay transition. Ticks are fired by an
//! interval while a round runs, and the fixed delays the engine announces are
//! awaited as a single `Sleep` that is dropped whenever the engine re-arms or
//! cancels.

use crate::errors::{DriverError, EngineResult};
use crate::games::engine::{CrashEngine, DelayOutcome, TimerToken};
use crate::games::types::{
    Bet, BetError, CashOutError, CashedOut, EngineEvent, EngineSnapshot, RoundError,
    RoundSettlement, RoundStarted, TickOutcome,
};
use crate::metrics::EngineMetrics;
use chrono::Utc;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;

/// Commands accepted by the engine task
#[derive(Debug)]
pub enum EngineCommand {
    PlaceBet {
        amount: f64,
        reply: oneshot::Sender<Result<Bet, BetError>>,
    },
    PlacePresetBet {
        index: usize,
        reply: oneshot::Sender<Result<Bet, BetError>>,
    },
    CashOut {
        reply: oneshot::Sender<Result<CashedOut, CashOutError>>,
    },
    StartRound {
        reply: oneshot::Sender<Result<RoundStarted, RoundError>>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    SetAutoStart {
        enabled: bool,
    },
    Shutdown,
}

/// Cloneable handle to a running engine task
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    events: broadcast::Sender<EngineEvent>,
    metrics: Arc<EngineMetrics>,
}

impl EngineHandle {
    /// Subscribe to the event feed. Only events published after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    pub async fn place_bet(&self, amount: f64) -> EngineResult<Bet> {
        let result = self
            .request(|reply| EngineCommand::PlaceBet { amount, reply })
            .await?;
        Ok(result?)
    }

    pub async fn place_preset_bet(&self, index: usize) -> EngineResult<Bet> {
        let result = self
            .request(|reply| EngineCommand::PlacePresetBet { index, reply })
            .await?;
        Ok(result?)
    }

    pub async fn cash_out(&self) -> EngineResult<CashedOut> {
        let result = self.request(|reply| EngineCommand::CashOut { reply }).await?;
        Ok(result?)
    }

    pub async fn start_round(&self) -> EngineResult<RoundStarted> {
        let result = self
            .request(|reply| EngineCommand::StartRound { reply })
            .await?;
        Ok(result?)
    }

    pub async fn snapshot(&self) -> EngineResult<EngineSnapshot> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    pub async fn set_auto_start(&self, enabled: bool) -> EngineResult<()> {
        self.send(EngineCommand::SetAutoStart { enabled }).await
    }

    /// Stop the engine task. Pending timers are dropped with it.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.send(EngineCommand::Shutdown).await
    }

    async fn send(&self, command: EngineCommand) -> EngineResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DriverError::Closed.into())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> EngineResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx)).await?;
        rx.await.map_err(|_| DriverError::NoReply.into())
    }
}

/// Spawn the engine onto the current tokio runtime
pub fn spawn(engine: CrashEngine) -> (EngineHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (events, _) = broadcast::channel(engine.config().monitoring.event_buffer.max(1));
    let metrics = Arc::new(EngineMetrics::new());

    let handle = EngineHandle {
        commands: command_tx,
        events: events.clone(),
        metrics: metrics.clone(),
    };
    let driver = EngineDriver {
        engine,
        commands: command_rx,
        events,
        metrics,
        ticker: None,
        delay: None,
    };

    (handle, tokio::spawn(driver.run()))
}

struct EngineDriver {
    engine: CrashEngine,
    commands: mpsc::Receiver<EngineCommand>,
    events: broadcast::Sender<EngineEvent>,
    metrics: Arc<EngineMetrics>,
    ticker: Option<Interval>,
    delay: Option<(TimerToken, Pin<Box<Sleep>>)>,
}

impl EngineDriver {
    async fn run(mut self) {
        let mut stats = self.engine.config().stats_interval().map(|period| {
            let mut stats = interval_at(Instant::now() + period, period);
            stats.set_missed_tick_behavior(MissedTickBehavior::Delay);
            stats
        });
        info!(
            "Crash engine started (auto-start: {})",
            self.engine.config().round.auto_start
        );

        loop {
            self.sync_delay();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                _ = next_tick(&mut self.ticker) => self.on_tick(),
                token = wait_delay(&mut self.delay) => {
                    self.delay = None;
                    self.on_delay(token);
                }
                _ = next_tick(&mut stats) => self.metrics.log_summary(),
            }
        }

        self.engine.cancel_timers();
        info!("Crash engine stopped");
    }

    /// Follow the delay the engine currently expects, replacing a superseded sleep
    fn sync_delay(&mut self) {
        let wanted = self.engine.pending_delay();
        let current = self.delay.as_ref().map(|(token, _)| *token);
        if wanted.map(|pending| pending.token) != current {
            self.delay = wanted.map(|pending| (pending.token, Box::pin(sleep(pending.duration))));
        }
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::PlaceBet { amount, reply } => {
                let result = self.engine.place_bet(amount);
                self.on_bet(&result);
                let _ = reply.send(result);
            }
            EngineCommand::PlacePresetBet { index, reply } => {
                let result = self.engine.place_preset_bet(index);
                self.on_bet(&result);
                let _ = reply.send(result);
            }
            EngineCommand::CashOut { reply } => {
                let result = self.engine.cash_out();
                match &result {
                    Ok(cashed) => {
                        self.metrics.record_cash_out(cashed.receipt.winnings);
                        self.publish(EngineEvent::CashedOut {
                            round_id: cashed.receipt.round_id,
                            entry: cashed.entry.clone(),
                            balance: cashed.receipt.balance,
                        });
                    }
                    Err(_) => self.metrics.record_cash_out_rejected(),
                }
                let _ = reply.send(result);
            }
            EngineCommand::StartRound { reply } => {
                let result = self.engine.start_round(Instant::now());
                match &result {
                    Ok(started) => self.on_round_started(started),
                    Err(e) => {
                        self.metrics.record_start_failure();
                        debug!("Manual start rejected: {}", e);
                    }
                }
                let _ = reply.send(result);
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
            EngineCommand::SetAutoStart { enabled } => self.engine.set_auto_start(enabled),
            EngineCommand::Shutdown => {}
        }
    }

    fn on_bet(&self, result: &Result<Bet, BetError>) {
        match result {
            Ok(bet) => {
                self.metrics.record_bet(bet.amount);
                self.publish(EngineEvent::BetPlaced {
                    round_id: bet.placed_in_round,
                    amount: bet.amount,
                    balance: self.engine.ledger().balance(),
                });
            }
            Err(_) => self.metrics.record_bet_rejected(),
        }
    }

    fn on_round_started(&mut self, started: &RoundStarted) {
        self.metrics.record_round_started();
        let period = self.engine.config().tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.publish(EngineEvent::RoundStarted {
            round_id: started.round_id,
            timestamp: Utc::now().timestamp_millis(),
        });
    }

    fn on_tick(&mut self) {
        match self.engine.tick(Instant::now()) {
            Ok(TickOutcome::Running {
                round_id,
                multiplier,
            }) => {
                self.metrics.record_tick();
                debug!("Round {} at {:.2}x", round_id, multiplier);
                if self.engine.config().monitoring.publish_ticks {
                    self.publish(EngineEvent::Tick {
                        round_id,
                        multiplier,
                    });
                }
            }
            Ok(TickOutcome::Crashed {
                round_id,
                crash_point,
                final_multiplier,
            }) => {
                self.ticker = None;
                self.metrics.record_crash(final_multiplier);
                self.publish(EngineEvent::RoundCrashed {
                    round_id,
                    crash_point,
                    final_multiplier,
                    timestamp: Utc::now().timestamp_millis(),
                });
            }
            Err(e) => {
                // A tick that lost the race with a crash
                self.ticker = None;
                debug!("Dropping tick: {}", e);
            }
        }
    }

    fn on_delay(&mut self, token: TimerToken) {
        match self.engine.delay_elapsed(token, Instant::now()) {
            Ok(DelayOutcome::RoundReset {
                next_round_id,
                settlement,
            }) => {
                if let Some(RoundSettlement::Forfeited { bet }) = settlement {
                    self.metrics.record_forfeit();
                    self.publish(EngineEvent::BetForfeited {
                        round_id: bet.placed_in_round,
                        amount: bet.amount,
                    });
                }
                self.publish(EngineEvent::RoundReset {
                    next_round_id,
                    timestamp: Utc::now().timestamp_millis(),
                });
            }
            Ok(DelayOutcome::RoundStarted(started)) => self.on_round_started(&started),
            Ok(DelayOutcome::Stale) => {}
            Err(e) => {
                self.metrics.record_start_failure();
                warn!("Auto-start failed: {}", e);
            }
        }
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn wait_delay(delay: &mut Option<(TimerToken, Pin<Box<Sleep>>)>) -> TimerToken {
    match delay {
        Some((token, sleep)) => {
            sleep.as_mut().await;
            *token
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::games::crash_point::ScriptedCrashPoints;
    use crate::games::types::GameState;

    fn manual_engine(points: Vec<f64>) -> CrashEngine {
        let mut config = EngineConfig::fast_testing();
        config.round.auto_start = false;
        CrashEngine::with_source(config, Box::new(ScriptedCrashPoints::new(points)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_round_trip() {
        let (handle, task) = spawn(manual_engine(vec![2.0]));

        let bet = handle.place_bet(100.0).await.unwrap();
        assert_eq!(bet.amount, 100.0);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.balance, 900.0);
        assert_eq!(snapshot.game_state, GameState::Waiting);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(
            handle.snapshot().await,
            Err(crate::errors::EngineError::Driver(DriverError::Closed))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_are_counted() {
        let (handle, _task) = spawn(manual_engine(vec![2.0]));
        assert!(handle.cash_out().await.is_err());
        assert!(handle.place_bet(-5.0).await.is_err());

        let metrics = handle.metrics().snapshot();
        assert_eq!(metrics.cash_outs_rejected, 1);
        assert_eq!(metrics.bets_rejected, 1);
    }
}
