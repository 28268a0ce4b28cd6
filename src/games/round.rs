//! Round state machine: Waiting → Running → Crashed → Waiting
//!
//! Time is injected by the caller (`now`), so the machine itself never reads a
//! clock. The multiplier depends only on `now - start_time`, never on how many
//! ticks were delivered.

use crate::games::crash_point::{validate_crash_point, CrashPointSource};
use crate::games::multiplier::MultiplierCurve;
use crate::games::types::{GameState, RoundError, RoundId, TickOutcome};
use tokio::time::Instant;
use tracing::{error, info};

/// The live round
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub id: RoundId,
    pub state: GameState,
    pub multiplier: f64,
    pub crash_point: f64,
    pub start_time: Option<Instant>,
}

pub struct RoundStateMachine {
    curve: MultiplierCurve,
    source: Box<dyn CrashPointSource>,
    state: GameState,
    round: Option<Round>,
    next_id: RoundId,
}

impl RoundStateMachine {
    pub fn new(curve: MultiplierCurve, source: Box<dyn CrashPointSource>) -> Self {
        Self {
            curve,
            source,
            state: GameState::Waiting,
            round: None,
            next_id: RoundId(1),
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    /// Current (or most recent) round
    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// Id the next started round will carry
    pub fn upcoming_round_id(&self) -> RoundId {
        self.next_id
    }

    /// Full-precision multiplier of the live round, 1.0 while waiting
    pub fn multiplier(&self) -> f64 {
        match (&self.round, self.state) {
            (Some(round), GameState::Running | GameState::Crashed) => round.multiplier,
            _ => 1.0,
        }
    }

    pub fn curve(&self) -> &MultiplierCurve {
        &self.curve
    }

    /// Waiting → Running. Draws the crash point and stamps the start time.
    pub fn start(&mut self, now: Instant) -> Result<RoundId, RoundError> {
        if self.state != GameState::Waiting {
            return Err(RoundError::NotWaiting { state: self.state });
        }

        let drawn = self.source.next_crash_point();
        let crash_point = validate_crash_point(drawn).map_err(|e| {
            error!("Crash point generator produced {}, refusing to start round", drawn);
            e
        })?;

        let id = self.next_id;
        self.next_id = id.next();
        self.state = GameState::Running;
        self.round = Some(Round {
            id,
            state: GameState::Running,
            multiplier: 1.0,
            crash_point,
            start_time: Some(now),
        });

        info!("Round {} started", id);
        Ok(id)
    }

    /// Advance a running round to `now`, crashing it once the multiplier
    /// reaches the crash point (a tie counts as a crash).
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, RoundError> {
        let state = self.state;
        let round = match (&mut self.round, state) {
            (Some(round), GameState::Running) => round,
            _ => return Err(RoundError::NotRunning { state }),
        };

        let elapsed_ms = round
            .start_time
            .map(|start| now.saturating_duration_since(start).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        // Never step backwards if ticks arrive out of order
        let multiplier = self.curve.multiplier_at(elapsed_ms).max(round.multiplier);
        round.multiplier = multiplier;

        if multiplier >= round.crash_point {
            round.state = GameState::Crashed;
            self.state = GameState::Crashed;
            info!(
                "Round {} crashed at {:.2}x (crash point {:.2}x)",
                round.id, multiplier, round.crash_point
            );
            return Ok(TickOutcome::Crashed {
                round_id: round.id,
                crash_point: round.crash_point,
                final_multiplier: multiplier,
            });
        }

        Ok(TickOutcome::Running {
            round_id: round.id,
            multiplier,
        })
    }

    /// Crashed → Waiting
    pub fn reset(&mut self) -> Result<RoundId, RoundError> {
        if self.state != GameState::Crashed {
            return Err(RoundError::NotCrashed { state: self.state });
        }
        self.state = GameState::Waiting;
        Ok(self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::crash_point::ScriptedCrashPoints;
    use std::time::Duration;

    fn machine(points: Vec<f64>) -> RoundStateMachine {
        RoundStateMachine::new(
            MultiplierCurve::default(),
            Box::new(ScriptedCrashPoints::new(points)),
        )
    }

    #[test]
    fn test_start_requires_waiting() {
        let mut rounds = machine(vec![2.0]);
        let t0 = Instant::now();
        assert_eq!(rounds.start(t0), Ok(RoundId(1)));
        assert_eq!(rounds.state(), GameState::Running);
        assert_eq!(rounds.multiplier(), 1.0);
        assert_eq!(
            rounds.start(t0),
            Err(RoundError::NotWaiting { state: GameState::Running })
        );
    }

    #[test]
    fn test_invalid_crash_point_refuses_start() {
        let mut rounds = machine(vec![0.5]);
        assert_eq!(
            rounds.start(Instant::now()),
            Err(RoundError::InvalidCrashPoint(0.5))
        );
        assert_eq!(rounds.state(), GameState::Waiting);
        assert!(rounds.round().is_none());
        assert_eq!(rounds.upcoming_round_id(), RoundId(1));
    }

    #[test]
    fn test_tick_follows_elapsed_time() {
        let mut rounds = machine(vec![5.0]);
        let t0 = Instant::now();
        rounds.start(t0).unwrap();

        let outcome = rounds.tick(t0 + Duration::from_millis(200)).unwrap();
        let expected = rounds.curve().multiplier_at(200.0);
        assert_eq!(
            outcome,
            TickOutcome::Running {
                round_id: RoundId(1),
                multiplier: expected
            }
        );
    }

    #[test]
    fn test_crash_when_reaching_crash_point() {
        let mut rounds = machine(vec![2.0]);
        let t0 = Instant::now();
        rounds.start(t0).unwrap();

        assert!(matches!(
            rounds.tick(t0 + Duration::from_millis(400)),
            Ok(TickOutcome::Running { .. })
        ));
        let outcome = rounds.tick(t0 + Duration::from_millis(463)).unwrap();
        match outcome {
            TickOutcome::Crashed {
                crash_point,
                final_multiplier,
                ..
            } => {
                assert_eq!(crash_point, 2.0);
                assert!(final_multiplier >= 2.0);
            }
            other => panic!("Expected crash, got {:?}", other),
        }
        assert_eq!(rounds.state(), GameState::Crashed);
        assert!(rounds.tick(t0 + Duration::from_millis(500)).is_err());
    }

    #[test]
    fn test_exact_crash_point_crashes() {
        let crash_point = MultiplierCurve::default().multiplier_at(500.0);
        let mut rounds = machine(vec![crash_point]);
        let t0 = Instant::now();
        rounds.start(t0).unwrap();

        assert!(matches!(
            rounds.tick(t0 + Duration::from_millis(499)),
            Ok(TickOutcome::Running { .. })
        ));
        assert_eq!(
            rounds.tick(t0 + Duration::from_millis(500)),
            Ok(TickOutcome::Crashed {
                round_id: RoundId(1),
                crash_point,
                final_multiplier: crash_point,
            })
        );
        assert_eq!(rounds.state(), GameState::Crashed);
    }

    #[test]
    fn test_out_of_order_ticks_never_decrease() {
        let mut rounds = machine(vec![9.0]);
        let t0 = Instant::now();
        rounds.start(t0).unwrap();
        rounds.tick(t0 + Duration::from_millis(300)).unwrap();
        let high = rounds.multiplier();
        rounds.tick(t0 + Duration::from_millis(100)).unwrap();
        assert_eq!(rounds.multiplier(), high);
    }

    #[test]
    fn test_reset_only_from_crashed() {
        let mut rounds = machine(vec![1.01]);
        let t0 = Instant::now();
        assert_eq!(
            rounds.reset(),
            Err(RoundError::NotCrashed { state: GameState::Waiting })
        );
        rounds.start(t0).unwrap();
        rounds.tick(t0 + Duration::from_millis(50)).unwrap();
        assert_eq!(rounds.state(), GameState::Crashed);
        assert_eq!(rounds.reset(), Ok(RoundId(2)));
        assert_eq!(rounds.state(), GameState::Waiting);
        assert_eq!(rounds.multiplier(), 1.0);
    }
}
