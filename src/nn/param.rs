//! Trainable Parameters
//!
//! A parameter owns its value and the gradient accumulated by the last
//! backward pass. Optimizers see parameters through [`ParamSlot`] views so
//! they can update any layer without knowing its array dimensionality.

use ndarray::{Array, ArrayViewMutD, Dimension};

/// A learnable tensor with its gradient buffer
#[derive(Debug, Clone)]
pub struct Param<D: Dimension> {
    /// Current value
    pub value: Array<f32, D>,

    /// Gradient of the loss with respect to `value`
    pub grad: Array<f32, D>,
}

impl<D: Dimension> Param<D> {
    /// Wrap an initial value with a zeroed gradient
    pub fn new(value: Array<f32, D>) -> Self {
        let grad = Array::zeros(value.raw_dim());
        Self { value, grad }
    }

    /// Reset the gradient buffer
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    /// Number of scalar entries
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Whether the parameter has no entries
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Sum of squared entries, used for the L2 penalty
    pub fn squared_norm(&self) -> f32 {
        self.value.iter().map(|v| v * v).sum()
    }

    /// Dimension-erased mutable view for optimizers
    pub fn slot(&mut self) -> ParamSlot<'_> {
        ParamSlot {
            value: self.value.view_mut().into_dyn(),
            grad: self.grad.view_mut().into_dyn(),
        }
    }
}

/// Mutable view of one parameter and its gradient
pub struct ParamSlot<'a> {
    pub value: ArrayViewMutD<'a, f32>,
    pub grad: ArrayViewMutD<'a, f32>,
}

/// Anything that owns trainable parameters
pub trait Trainable {
    /// All parameters in a stable order
    fn parameters(&mut self) -> Vec<ParamSlot<'_>>;

    /// Total number of trainable scalars
    fn num_parameters(&self) -> usize;

    /// Sum of squared parameter values
    fn squared_norm(&self) -> f32;

    /// Clear every gradient buffer
    fn zero_grad(&mut self) {
        for mut slot in self.parameters() {
            slot.grad.fill(0.0);
        }
    }
}
