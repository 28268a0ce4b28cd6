//! Crash-point generation
//!
//! A round's crash point is drawn once, before the round starts, by a
//! `CrashPointSource`. The default source skews a uniform sample with a power
//! curve and scales it into `[min, min + spread)`.

use crate::config::CrashPointConfig;
use crate::games::types::RoundError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;

/// Lowest crash point a round may use
pub const MIN_CRASH_POINT: f64 = 1.01;

/// Anything that can hand out crash points, one per round
pub trait CrashPointSource: Send {
    fn next_crash_point(&mut self) -> f64;
}

/// Check a drawn crash point before a round is allowed to use it
pub fn validate_crash_point(value: f64) -> Result<f64, RoundError> {
    if value.is_finite() && value >= MIN_CRASH_POINT {
        Ok(value)
    } else {
        Err(RoundError::InvalidCrashPoint(value))
    }
}

/// Map a uniform `[0, 1)` sample onto the crash-point range
pub fn skew_sample(sample: f64, min: f64, spread: f64, exponent: f64) -> f64 {
    min + sample.powf(exponent) * spread
}

/// Pseudo-random source with a power-curve skew
pub struct SkewedCrashPoints {
    rng: StdRng,
    min: f64,
    spread: f64,
    exponent: f64,
}

impl SkewedCrashPoints {
    pub fn new(rng: StdRng, min: f64, spread: f64, exponent: f64) -> Self {
        Self {
            rng,
            min,
            spread,
            exponent,
        }
    }

    /// Build from configuration; a configured seed makes the sequence reproducible
    pub fn from_config(config: &CrashPointConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(rng, config.min, config.spread, config.skew_exponent)
    }
}

impl CrashPointSource for SkewedCrashPoints {
    fn next_crash_point(&mut self) -> f64 {
        let sample: f64 = self.rng.gen();
        skew_sample(sample, self.min, self.spread, self.exponent)
    }
}

/// Replays a fixed list of crash points, then keeps repeating the last one
pub struct ScriptedCrashPoints {
    queue: VecDeque<f64>,
    last: f64,
}

impl ScriptedCrashPoints {
    pub fn new(points: impl IntoIterator<Item = f64>) -> Self {
        let queue: VecDeque<f64> = points.into_iter().collect();
        let last = queue.back().copied().unwrap_or(MIN_CRASH_POINT);
        Self { queue, last }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl CrashPointSource for ScriptedCrashPoints {
    fn next_crash_point(&mut self) -> f64 {
        self.queue.pop_front().unwrap_or(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(exponent: f64) -> SkewedCrashPoints {
        SkewedCrashPoints::new(StdRng::seed_from_u64(42), MIN_CRASH_POINT, 9.0, exponent)
    }

    #[test]
    fn test_crash_points_within_range() {
        let mut source = seeded(1.25);
        for _ in 0..10_000 {
            let point = source.next_crash_point();
            assert!(point >= MIN_CRASH_POINT);
            assert!(point < MIN_CRASH_POINT + 9.0);
            assert!(validate_crash_point(point).is_ok());
        }
    }

    #[test]
    fn test_mean_skews_low() {
        let mut source = seeded(1.25);
        let samples = 20_000;
        let total: f64 = (0..samples).map(|_| source.next_crash_point()).sum();
        let mean = total / samples as f64;
        let midpoint = MIN_CRASH_POINT + 9.0 / 2.0;
        assert!(mean < midpoint, "mean {} should sit below {}", mean, midpoint);
        assert!(mean > MIN_CRASH_POINT);
    }

    #[test]
    fn test_higher_exponent_lowers_mean() {
        let mean = |exponent: f64| {
            let mut source = seeded(exponent);
            (0..5_000).map(|_| source.next_crash_point()).sum::<f64>() / 5_000.0
        };
        assert!(mean(2.0) < mean(1.25));
        assert!(mean(1.25) < mean(0.8));
    }

    #[test]
    fn test_seeded_sources_repeat() {
        let mut a = seeded(1.25);
        let mut b = seeded(1.25);
        for _ in 0..10 {
            assert_eq!(a.next_crash_point(), b.next_crash_point());
        }
    }

    #[test]
    fn test_skew_sample_bounds() {
        assert_eq!(skew_sample(0.0, 1.01, 9.0, 0.8), 1.01);
        assert!((skew_sample(1.0, 1.01, 9.0, 0.8) - 10.01).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_points() {
        assert!(validate_crash_point(0.5).is_err());
        assert!(validate_crash_point(1.0).is_err());
        assert!(validate_crash_point(f64::NAN).is_err());
        assert!(validate_crash_point(f64::INFINITY).is_err());
        assert_eq!(validate_crash_point(2.0), Ok(2.0));
    }

    #[test]
    fn test_scripted_source_repeats_last() {
        let mut source = ScriptedCrashPoints::new(vec![2.0, 3.5]);
        assert_eq!(source.next_crash_point(), 2.0);
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.next_crash_point(), 3.5);
        assert_eq!(source.next_crash_point(), 3.5);
    }
}
