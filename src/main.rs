//! Crash round simulator
//!
//! Runs an engine session on tokio, prints the event feed as JSON lines and
//! optionally plays a simple strategy: bet a fixed amount every round and cash
//! out at a target multiplier.

use clap::{Parser, Subcommand};
use crash_engine::{
    config::generate_sample_config,
    games::{CrashEngine, ScriptedCrashPoints},
    spawn, ConfigLoader, EngineConfig, EngineEvent, EngineHandle, EngineResult,
};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Crash round simulator
#[derive(Parser)]
#[command(name = "crash-sim")]
#[command(about = "Single-player crash betting round engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session and print its event feed
    Run {
        /// Stop after this many rounds have crashed
        #[arg(short, long, default_value = "5")]
        rounds: u64,

        /// Bet this amount before every round
        #[arg(short, long)]
        bet: Option<f64>,

        /// Cash out once the multiplier reaches this value
        #[arg(long)]
        cash_out_at: Option<f64>,

        /// Seed for the crash point generator
        #[arg(long)]
        seed: Option<u64>,

        /// Replay these crash points instead of drawing them
        #[arg(long, value_delimiter = ',')]
        crash_points: Vec<f64>,

        /// Do not print tick events
        #[arg(short, long)]
        quiet_ticks: bool,
    },

    /// Write a configuration file with default values
    InitConfig {
        #[arg(default_value = "crash.toml")]
        path: PathBuf,
    },
}

struct Strategy {
    bet: Option<f64>,
    cash_out_at: Option<f64>,
    quiet_ticks: bool,
}

/// Follows our own bet through the event feed
#[derive(Debug, Default)]
struct BetTracker {
    riding: bool,
}

impl BetTracker {
    fn observe(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::BetPlaced { .. } => self.riding = true,
            EngineEvent::CashedOut { .. }
            | EngineEvent::BetForfeited { .. }
            | EngineEvent::RoundReset { .. } => self.riding = false,
            _ => {}
        }
    }

    /// True once per riding bet, the first time `multiplier` reaches `target`
    fn should_cash_out(&mut self, target: Option<f64>, multiplier: f64) -> bool {
        let hit = self.riding && target.map_or(false, |target| multiplier >= target);
        if hit {
            self.riding = false;
        }
        hit
    }
}

#[tokio::main]
async fn main() -> EngineResult<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.monitoring.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            rounds,
            bet,
            cash_out_at,
            seed,
            crash_points,
            quiet_ticks,
        } => {
            apply_run_overrides(&mut config, seed, cash_out_at);
            let engine = if crash_points.is_empty() {
                CrashEngine::new(config)
            } else {
                CrashEngine::with_source(config, Box::new(ScriptedCrashPoints::new(crash_points)))
            };
            let strategy = Strategy {
                bet,
                cash_out_at,
                quiet_ticks,
            };
            run_session(engine, rounds, strategy).await
        }
        Commands::InitConfig { path } => {
            generate_sample_config(&path.to_string_lossy())?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

/// Command-line overrides for a `run` session
fn apply_run_overrides(config: &mut EngineConfig, seed: Option<u64>, cash_out_at: Option<f64>) {
    if seed.is_some() {
        config.crash_point.seed = seed;
    }
    // The cash-out strategy reacts to tick events
    if cash_out_at.is_some() && !config.monitoring.publish_ticks {
        warn!("--cash-out-at needs tick events; enabling monitoring.publish_ticks");
        config.monitoring.publish_ticks = true;
    }
}

async fn run_session(engine: CrashEngine, rounds: u64, strategy: Strategy) -> EngineResult<()> {
    let (handle, task) = spawn(engine);
    let mut events = handle.subscribe();
    let mut betting = strategy.bet.is_some();
    let mut crashed = 0u64;

    if betting {
        betting = place_bet(&handle, &strategy).await;
    }

    let mut tracker = BetTracker::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event feed lagged; skipped {} events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let is_tick = matches!(event, EngineEvent::Tick { .. });
        if !(is_tick && strategy.quiet_ticks) {
            println!("{}", serde_json::to_string(&event)?);
        }
        tracker.observe(&event);

        match event {
            EngineEvent::Tick { multiplier, .. } => {
                if tracker.should_cash_out(strategy.cash_out_at, multiplier) {
                    if let Err(e) = handle.cash_out().await {
                        warn!("Cash-out failed: {}", e);
                    }
                }
            }
            EngineEvent::RoundCrashed { .. } => {
                crashed += 1;
                if crashed >= rounds {
                    break;
                }
            }
            EngineEvent::RoundReset { .. } if betting => {
                betting = place_bet(&handle, &strategy).await;
            }
            _ => {}
        }
    }

    let snapshot = handle.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    print!("{}", handle.metrics().to_prometheus_format());

    handle.shutdown().await?;
    if let Err(e) = task.await {
        warn!("Engine task ended abnormally: {}", e);
    }
    Ok(())
}

/// Returns whether the strategy should keep betting
async fn place_bet(handle: &EngineHandle, strategy: &Strategy) -> bool {
    let Some(amount) = strategy.bet else {
        return false;
    };
    match handle.place_bet(amount).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Stopping bets: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crash_engine::RoundId;

    fn bet_placed() -> EngineEvent {
        EngineEvent::BetPlaced {
            round_id: RoundId(1),
            amount: 100.0,
            balance: 900.0,
        }
    }

    #[test]
    fn test_tracker_cashes_out_once_per_bet() {
        let mut tracker = BetTracker::default();
        assert!(!tracker.should_cash_out(Some(1.5), 2.0));

        tracker.observe(&bet_placed());
        assert!(!tracker.should_cash_out(Some(1.5), 1.2));
        assert!(!tracker.should_cash_out(None, 3.0));
        assert!(tracker.should_cash_out(Some(1.5), 1.5));
        assert!(!tracker.should_cash_out(Some(1.5), 1.8));
    }

    #[test]
    fn test_cash_out_target_enables_ticks() {
        let mut config = EngineConfig::default();
        config.monitoring.publish_ticks = false;
        apply_run_overrides(&mut config, Some(3), Some(2.0));
        assert!(config.monitoring.publish_ticks);
        assert_eq!(config.crash_point.seed, Some(3));

        let mut config = EngineConfig::default();
        config.monitoring.publish_ticks = false;
        apply_run_overrides(&mut config, None, None);
        assert!(!config.monitoring.publish_ticks);
        assert_eq!(config.crash_point.seed, None);
    }

    #[test]
    fn test_tracker_clears_on_round_reset() {
        let mut tracker = BetTracker::default();
        tracker.observe(&bet_placed());
        tracker.observe(&EngineEvent::RoundReset {
            next_round_id: RoundId(2),
            timestamp: 0,
        });
        assert!(!tracker.should_cash_out(Some(1.1), 5.0));
    }
}
