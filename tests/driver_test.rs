//! Engine task tests on a paused tokio clock

use crash_engine::config::EngineConfig;
use crash_engine::errors::{DriverError, EngineError};
use crash_engine::games::{CrashEngine, GameState, RoundId, ScriptedCrashPoints};
use crash_engine::{spawn, EngineEvent};
use std::time::Duration;
use tokio::sync::broadcast;

fn engine(points: Vec<f64>, auto_start: bool) -> CrashEngine {
    let mut config = EngineConfig::fast_testing();
    config.round.auto_start = auto_start;
    config.crash_point.seed = Some(11);
    CrashEngine::with_source(config, Box::new(ScriptedCrashPoints::new(points)))
}

/// Receive events, skipping ticks, until `stop` matches
async fn collect_until(
    events: &mut broadcast::Receiver<EngineEvent>,
    stop: impl Fn(&EngineEvent) -> bool,
) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    loop {
        let event = events.recv().await.expect("event feed closed");
        let done = stop(&event);
        if !matches!(event, EngineEvent::Tick { .. }) {
            seen.push(event);
        }
        if done {
            return seen;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_auto_start_cycle() {
    let (handle, _task) = spawn(engine(vec![1.5, 1.5], true));
    let mut events = handle.subscribe();

    let seen = collect_until(&mut events, |e| {
        matches!(e, EngineEvent::RoundStarted { round_id: RoundId(2), .. })
    })
    .await;

    let kinds: Vec<&str> = seen
        .iter()
        .map(|e| match e {
            EngineEvent::RoundStarted { .. } => "started",
            EngineEvent::RoundCrashed { .. } => "crashed",
            EngineEvent::RoundReset { .. } => "reset",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["started", "crashed", "reset", "started"]);

    match &seen[1] {
        EngineEvent::RoundCrashed {
            crash_point,
            final_multiplier,
            ..
        } => {
            assert_eq!(*crash_point, 1.5);
            assert!(*final_multiplier >= 1.5);
        }
        other => panic!("Expected crash, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_ticks_report_increasing_multiplier() {
    let (handle, _task) = spawn(engine(vec![3.0], false));
    let mut events = handle.subscribe();
    handle.start_round().await.unwrap();

    let mut previous = 1.0;
    let mut ticks = 0;
    loop {
        match events.recv().await.unwrap() {
            EngineEvent::Tick { multiplier, .. } => {
                assert!(multiplier >= previous);
                previous = multiplier;
                ticks += 1;
            }
            EngineEvent::RoundCrashed { .. } => break,
            _ => {}
        }
    }
    assert!(ticks > 10);
    assert_eq!(handle.snapshot().await.unwrap().game_state, GameState::Crashed);
}

#[tokio::test(start_paused = true)]
async fn test_cash_out_through_handle() {
    let (handle, _task) = spawn(engine(vec![5.0], false));
    let mut events = handle.subscribe();

    handle.place_bet(100.0).await.unwrap();
    handle.start_round().await.unwrap();

    let tick_multiplier = loop {
        if let EngineEvent::Tick { multiplier, .. } = events.recv().await.unwrap() {
            if multiplier >= 1.2 {
                break multiplier;
            }
        }
    };

    let cashed = handle.cash_out().await.unwrap();
    assert!(cashed.receipt.multiplier >= tick_multiplier);
    assert_eq!(cashed.receipt.winnings, 100.0 * cashed.receipt.multiplier);
    assert_eq!(cashed.receipt.balance, 900.0 + cashed.receipt.winnings);

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.has_cashed_out);
    assert_eq!(snapshot.leaderboard.len(), 1);
    assert!(matches!(
        handle.cash_out().await,
        Err(EngineError::CashOut(_))
    ));

    let metrics = handle.metrics().snapshot();
    assert_eq!(metrics.cash_outs, 1);
    assert_eq!(metrics.cash_outs_rejected, 1);
}

#[tokio::test(start_paused = true)]
async fn test_forfeit_is_published_on_reset() {
    let (handle, _task) = spawn(engine(vec![1.3], true));
    let mut events = handle.subscribe();
    handle.place_bet(100.0).await.unwrap();

    let seen = collect_until(&mut events, |e| matches!(e, EngineEvent::RoundReset { .. })).await;
    assert!(seen.iter().any(|e| matches!(
        e,
        EngineEvent::BetForfeited { amount, .. } if *amount == 100.0
    )));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.game_state, GameState::Waiting);
    assert_eq!(snapshot.balance, 900.0);
    assert!(!snapshot.has_placed_bet);
    assert_eq!(handle.metrics().snapshot().bets_forfeited, 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_start_preempts_auto_start() {
    let (handle, _task) = spawn(engine(vec![2.0, 2.0], true));
    let mut events = handle.subscribe();

    let started = handle.start_round().await.unwrap();
    assert_eq!(started.round_id, RoundId(1));

    let seen = collect_until(&mut events, |e| matches!(e, EngineEvent::RoundCrashed { .. })).await;
    let starts = seen
        .iter()
        .filter(|e| matches!(e, EngineEvent::RoundStarted { .. }))
        .count();
    assert_eq!(starts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabling_auto_start_keeps_waiting() {
    let (handle, _task) = spawn(engine(vec![2.0], true));
    handle.set_auto_start(false).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.game_state, GameState::Waiting);
    assert!(snapshot.round_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_preset_bet_through_handle() {
    let (handle, _task) = spawn(engine(vec![2.0], false));
    let bet = handle.place_preset_bet(0).await.unwrap();
    assert_eq!(bet.amount, 20.0);
    assert!(matches!(
        handle.place_preset_bet(99).await,
        Err(EngineError::Bet(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_handle() {
    let (handle, task) = spawn(engine(vec![2.0], true));
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(matches!(
        handle.place_bet(10.0).await,
        Err(EngineError::Driver(DriverError::Closed))
    ));
}
