use crate::config::CurveConfig;

/// Compound growth per millisecond used by the reference curve
pub const DEFAULT_GROWTH_BASE: f64 = 1.0015;

/// Exponential multiplier curve: `growth_base ^ elapsed_ms`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplierCurve {
    growth_base: f64,
}

impl MultiplierCurve {
    pub fn new(growth_base: f64) -> Self {
        Self { growth_base }
    }

    pub fn from_config(config: &CurveConfig) -> Self {
        Self::new(config.growth_base)
    }

    pub fn growth_base(&self) -> f64 {
        self.growth_base
    }

    /// Multiplier after `elapsed_ms` milliseconds, at full precision.
    /// Negative or NaN elapsed time is treated as zero.
    pub fn multiplier_at(&self, elapsed_ms: f64) -> f64 {
        let elapsed = if elapsed_ms > 0.0 { elapsed_ms } else { 0.0 };
        self.growth_base.powf(elapsed).max(1.0)
    }

    /// Milliseconds needed to reach `multiplier`
    pub fn elapsed_for(&self, multiplier: f64) -> f64 {
        if multiplier <= 1.0 {
            return 0.0;
        }
        multiplier.ln() / self.growth_base.ln()
    }
}

impl Default for MultiplierCurve {
    fn default() -> Self {
        Self::new(DEFAULT_GROWTH_BASE)
    }
}

/// Two-decimal rounding used for display, history and leaderboard values
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
