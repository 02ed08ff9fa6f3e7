// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// Linear warm-up multiplied by polynomial decay, over the whole
// run (the two are composed, not run as separate phases):
//
//   pct   = pct_now + 1 / total_steps
//   decay = (lr_max - end_lr) * (1 - pct)^power + end_lr
//   warm  = min(1, pct / warmup_pct)
//   lr    = decay * warm
//
// `pct_now` is the fraction of steps completed BEFORE this step,
// so the first step sees pct_now = 0. Adding 1/total_steps lines
// it up with a global step counter that is incremented before
// the optimizer update.
//
// Reference: TF polynomial_decay; ELECTRA model/optimization.py

use serde::{Deserialize, Serialize};

use crate::domain::error::{ElectraError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupDecayConfig {
    pub lr_max:       f64,
    pub end_lr:       f64,
    pub decay_power:  f64,
    pub total_steps:  usize,
    pub warmup_pct:   Option<f64>,
    /// Takes precedence over `warmup_pct` when both are set
    pub warmup_steps: Option<usize>,
}

impl WarmupDecayConfig {
    /// end_lr 0 and linear decay; warm-up must still be chosen.
    pub fn new(lr_max: f64, total_steps: usize) -> Self {
        Self {
            lr_max,
            end_lr:       0.0,
            decay_power:  1.0,
            total_steps,
            warmup_pct:   None,
            warmup_steps: None,
        }
    }

    pub fn with_end_lr(mut self, end_lr: f64) -> Self {
        self.end_lr = end_lr;
        self
    }

    pub fn with_decay_power(mut self, decay_power: f64) -> Self {
        self.decay_power = decay_power;
        self
    }

    pub fn with_warmup_pct(mut self, warmup_pct: f64) -> Self {
        self.warmup_pct = Some(warmup_pct);
        self
    }

    pub fn with_warmup_steps(mut self, warmup_steps: usize) -> Self {
        self.warmup_steps = Some(warmup_steps);
        self
    }

    /// The warm-up length as a fraction of the run.
    pub fn resolved_warmup_pct(&self) -> Result<f64> {
        if self.total_steps == 0 {
            return Err(ElectraError::InvalidSchedule("total_steps must be positive".into()));
        }
        let pct = match (self.warmup_steps, self.warmup_pct) {
            (Some(steps), _) => steps as f64 / self.total_steps as f64,
            (None, Some(pct)) => pct,
            (None, None) => return Err(ElectraError::MissingWarmup),
        };
        if !(pct > 0.0 && pct.is_finite()) {
            return Err(ElectraError::InvalidSchedule(format!("warm-up fraction must be positive, got {pct}")));
        }
        Ok(pct)
    }
}

/// Learning rate for a step that starts with `pct_now` of the run done.
pub fn linear_warmup_and_decay(pct_now: f64, config: &WarmupDecayConfig) -> Result<f64> {
    let warmup_pct = config.resolved_warmup_pct()?;
    Ok(warmup_and_decay(pct_now, config, warmup_pct))
}

fn warmup_and_decay(pct_now: f64, config: &WarmupDecayConfig, warmup_pct: f64) -> f64 {
    let pct = pct_now + 1.0 / config.total_steps as f64;
    let decayed = (config.lr_max - config.end_lr) * (1.0 - pct).powf(config.decay_power) + config.end_lr;
    let warm = (pct / warmup_pct).min(1.0);
    decayed * warm
}

// ─── WarmupDecaySchedule ──────────────────────────────────────────────────────
/// Stateful wrapper for the training loop: one `step()` per
/// optimizer update, nothing skipped, nothing repeated.
#[derive(Debug, Clone)]
pub struct WarmupDecaySchedule {
    config:     WarmupDecayConfig,
    warmup_pct: f64,
    step:       usize,
}

impl WarmupDecaySchedule {
    pub fn new(config: WarmupDecayConfig) -> Result<Self> {
        let warmup_pct = config.resolved_warmup_pct()?;
        Ok(Self { config, warmup_pct, step: 0 })
    }

    /// Learning rate at an arbitrary progress fraction.
    pub fn lr_at(&self, pct_now: f64) -> f64 {
        warmup_and_decay(pct_now, &self.config, self.warmup_pct)
    }

    /// Learning rate for the current step, then advance the counter.
    pub fn step(&mut self) -> f64 {
        let lr = self.lr_at(self.progress());
        self.step += 1;
        lr
    }

    /// Fraction of the run completed before the current step
    pub fn progress(&self) -> f64 {
        self.step as f64 / self.config.total_steps as f64
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.config.total_steps
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn electra_small() -> WarmupDecayConfig {
        WarmupDecayConfig::new(5e-4, 1_000_000).with_warmup_steps(10_000)
    }

    #[test]
    fn test_first_step_is_not_zero() {
        let cfg = WarmupDecayConfig::new(1e-3, 1000).with_warmup_pct(0.1);
        let lr = linear_warmup_and_decay(0.0, &cfg).unwrap();
        // decay factor (1 - 1/1000) is also applied
        let expected = 1e-3 * (1.0 - 1e-3) * (1e-3 / 0.1);
        assert_relative_eq!(lr, expected, max_relative = 1e-12);
        assert!(lr > 0.0);
    }

    #[test]
    fn test_first_step_electra_small() {
        let lr = linear_warmup_and_decay(0.0, &electra_small()).unwrap();
        // ≈ lr_max * (1/total) / warmup_pct
        assert_relative_eq!(lr, 5e-4 / 10_000.0, max_relative = 1e-5);
    }

    #[test]
    fn test_peak_at_end_of_warmup() {
        let cfg = electra_small();
        // pct_now such that the corrected pct is exactly the warm-up fraction
        let pct_now = 0.01 - 1.0 / 1_000_000.0;
        let lr = linear_warmup_and_decay(pct_now, &cfg).unwrap();
        assert_relative_eq!(lr, 5e-4 * 0.99, max_relative = 1e-9);
    }

    #[test]
    fn test_decays_to_zero() {
        let cfg = WarmupDecayConfig::new(1e-3, 100).with_warmup_pct(0.1);
        let last = linear_warmup_and_decay(0.99, &cfg).unwrap();
        assert!(last.abs() < 1e-15);
        let near_end = linear_warmup_and_decay(0.95, &cfg).unwrap();
        assert!(near_end > 0.0 && near_end < 1e-4);
    }

    #[test]
    fn test_end_lr_floor() {
        let cfg = WarmupDecayConfig::new(1e-3, 100).with_warmup_pct(0.1).with_end_lr(1e-5);
        let last = linear_warmup_and_decay(0.99, &cfg).unwrap();
        assert_relative_eq!(last, 1e-5, max_relative = 1e-9);
    }

    #[test]
    fn test_missing_warmup_is_an_error() {
        let cfg = WarmupDecayConfig::new(1e-3, 100);
        assert_eq!(linear_warmup_and_decay(0.0, &cfg), Err(ElectraError::MissingWarmup));
        assert!(WarmupDecaySchedule::new(cfg).is_err());
    }

    #[test]
    fn test_warmup_steps_win_over_pct() {
        let cfg = WarmupDecayConfig::new(1.0, 100).with_warmup_pct(0.5).with_warmup_steps(10);
        assert_relative_eq!(cfg.resolved_warmup_pct().unwrap(), 0.1);
    }

    #[test]
    fn test_zero_total_steps_rejected() {
        let cfg = WarmupDecayConfig::new(1.0, 0).with_warmup_steps(10);
        assert!(matches!(cfg.resolved_warmup_pct(), Err(ElectraError::InvalidSchedule(_))));
    }

    #[test]
    fn test_schedule_advances_once_per_step() {
        let cfg = WarmupDecayConfig::new(1e-3, 10).with_warmup_steps(2);
        let mut sched = WarmupDecaySchedule::new(cfg.clone()).unwrap();
        for step in 0..10 {
            assert_eq!(sched.current_step(), step);
            let expected = linear_warmup_and_decay(step as f64 / 10.0, &cfg).unwrap();
            assert_relative_eq!(sched.step(), expected, max_relative = 1e-12);
        }
        assert!(sched.is_finished());
    }

    #[test]
    fn test_warmup_then_monotone_decay() {
        let cfg = WarmupDecayConfig::new(1e-3, 1000).with_warmup_steps(100);
        let mut sched = WarmupDecaySchedule::new(cfg).unwrap();
        let lrs: Vec<f64> = (0..1000).map(|_| sched.step()).collect();
        assert!(lrs[..99].windows(2).all(|w| w[1] > w[0]));
        assert!(lrs[99..].windows(2).all(|w| w[1] < w[0]));
    }
}
