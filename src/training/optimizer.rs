//! Optimization Algorithms
//!
//! Stochastic gradient descent with (Nesterov) momentum, applied to the
//! parameter slots a model exposes through [`Trainable`](crate::nn::Trainable).

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{DenseNetError, Result};
use crate::nn::ParamSlot;

/// Serializable snapshot of an optimizer's hyperparameters
///
/// Fields are declared in alphabetical order so the JSON log comes out with
/// sorted keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub decay: f64,
    pub lr: f64,
    pub momentum: f64,
    pub nesterov: bool,
}

/// Optimizer trait for parameter updates
pub trait Optimizer: Send + Sync {
    /// Apply one update from the gradients currently held in `params`
    ///
    /// `params` must arrive in the same order and with the same shapes on
    /// every call.
    fn step(&mut self, params: Vec<ParamSlot<'_>>) -> Result<()>;

    /// Current base learning rate
    fn learning_rate(&self) -> f64;

    /// Replace the base learning rate
    fn set_learning_rate(&mut self, lr: f64);

    /// Hyperparameters for logging
    fn config(&self) -> OptimizerConfig;

    /// Reset optimizer state (for new training run)
    fn reset(&mut self);
}

/// Stochastic Gradient Descent with optional (Nesterov) momentum
///
/// With `v = momentum · v − lr · g` the update is `w += v`, or
/// `w += momentum · v − lr · g` with Nesterov. `decay` shrinks the rate per
/// update as `lr / (1 + decay · iterations)`.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub nesterov: bool,
    pub decay: f64,
    iterations: u64,
    velocities: Vec<Option<ArrayD<f32>>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            momentum: 0.0,
            nesterov: false,
            decay: 0.0,
            iterations: 0,
            velocities: Vec::new(),
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// Number of updates applied so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    fn effective_rate(&self) -> f64 {
        self.learning_rate / (1.0 + self.decay * self.iterations as f64)
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<ParamSlot<'_>>) -> Result<()> {
        let lr = self.effective_rate() as f32;
        let momentum = self.momentum as f32;

        if self.velocities.len() < params.len() {
            self.velocities.resize(params.len(), None);
        }

        for (i, slot) in params.into_iter().enumerate() {
            let ParamSlot { mut value, grad } = slot;

            if momentum == 0.0 {
                value.scaled_add(-lr, &grad);
                continue;
            }

            let v = self.velocities[i].get_or_insert_with(|| ArrayD::zeros(value.raw_dim()));
            if v.shape() != value.shape() {
                return Err(DenseNetError::shape_mismatch(v.shape(), value.shape()));
            }

            v.zip_mut_with(&grad, |v, &g| *v = momentum * *v - lr * g);
            if self.nesterov {
                value.scaled_add(momentum, v);
                value.scaled_add(-lr, &grad);
            } else {
                value += &*v;
            }
        }

        self.iterations += 1;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }

    fn config(&self) -> OptimizerConfig {
        OptimizerConfig {
            decay: self.decay,
            lr: self.learning_rate,
            momentum: self.momentum,
            nesterov: self.nesterov,
        }
    }

    fn reset(&mut self) {
        self.iterations = 0;
        self.velocities.clear();
    }
}
