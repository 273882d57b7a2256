//! Learning-rate schedules
//!
//! A schedule is a pure function from a 0-based epoch index to the rate used
//! for that whole epoch. The trainer injects the value into the optimizer at
//! each epoch boundary.

use serde::{Deserialize, Serialize};

/// Epoch-indexed learning rate
pub trait LearningRateSchedule: Send + Sync {
    /// Rate for `epoch` (0-based)
    fn learning_rate(&self, epoch: usize) -> f64;

    /// Rates for epochs `0..epochs`
    fn rates(&self, epochs: usize) -> Vec<f64> {
        (0..epochs).map(|e| self.learning_rate(e)).collect()
    }
}

/// One-time division of the rate at `floor(fraction * total_epochs)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepDown {
    pub fraction: f64,
    pub divisor: f64,
}

impl StepDown {
    pub fn new(fraction: f64, divisor: f64) -> Self {
        Self { fraction, divisor }
    }

    /// Epoch at which the division happens
    pub fn epoch(&self, total_epochs: usize) -> usize {
        (self.fraction * total_epochs as f64) as usize
    }
}

/// Cumulative inverse-time decay with one-time step-downs
///
/// `lr_e = lr_{e-1} / (1 + decay * e)`, starting from `lr_{-1} = initial_rate`,
/// further divided by each [`StepDown`] whose epoch is `e`. Divisions compound:
/// once applied they stay applied.
#[derive(Debug, Clone, PartialEq)]
pub struct InverseTimeDecay {
    pub initial_rate: f64,
    pub decay: f64,
    pub total_epochs: usize,
    pub step_downs: Vec<StepDown>,
}

impl InverseTimeDecay {
    /// ÷10 at half-time and a further ÷100 at three quarters
    pub fn new(initial_rate: f64, decay: f64, total_epochs: usize) -> Self {
        Self {
            initial_rate,
            decay,
            total_epochs,
            step_downs: vec![StepDown::new(0.5, 10.0), StepDown::new(0.75, 100.0)],
        }
    }

    pub fn with_step_downs(mut self, step_downs: Vec<StepDown>) -> Self {
        self.step_downs = step_downs;
        self
    }

    /// Epochs at which a step-down fires
    pub fn step_epochs(&self) -> Vec<usize> {
        self.step_downs.iter().map(|s| s.epoch(self.total_epochs)).collect()
    }
}

impl LearningRateSchedule for InverseTimeDecay {
    fn learning_rate(&self, epoch: usize) -> f64 {
        let mut lr = self.initial_rate;
        for e in 0..=epoch {
            lr /= 1.0 + self.decay * e as f64;
            for step in &self.step_downs {
                if step.epoch(self.total_epochs) == e {
                    lr /= step.divisor;
                }
            }
        }
        lr
    }
}

/// Same rate for every epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRate(pub f64);

impl LearningRateSchedule for ConstantRate {
    fn learning_rate(&self, _epoch: usize) -> f64 {
        self.0
    }
}
