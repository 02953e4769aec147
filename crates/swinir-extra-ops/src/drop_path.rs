//! # DropPath (stochastic depth)
//!
//! Randomly zeroes an entire residual branch per batch element during
//! training. Surviving branches are rescaled by `1 / (1 - drop_prob)` so the
//! expected magnitude of the output is unchanged.

use burn::{prelude::*, tensor::Distribution};

/// Configuration for the [`DropPath`] module.
#[derive(Config, Debug)]
pub struct DropPathConfig {
    /// The probability of dropping the branch for a batch element.
    #[config(default = "0.0")]
    pub drop_prob: f64,
    /// Whether the module is in training mode. In evaluation mode the
    /// module is exactly the identity function.
    #[config(default = "false")]
    pub training: bool,
}

impl DropPathConfig {
    /// Initializes a new [`DropPath`] module.
    pub const fn init<B: Backend>(&self) -> DropPath<B> {
        DropPath {
            drop_prob: self.drop_prob,
            training: self.training,
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Per-example residual branch dropout.
#[derive(Module, Debug)]
pub struct DropPath<B: Backend> {
    drop_prob: f64,
    training: bool,
    _phantom: std::marker::PhantomData<B>,
}

impl<B: Backend> DropPath<B> {
    /// Applies stochastic depth to the input tensor.
    ///
    /// The Bernoulli mask is sampled per batch element (first dimension) and
    /// broadcast over all remaining dimensions.
    ///
    /// # Shapes
    /// - input: `[batch_size, ...]`
    /// - output: `[batch_size, ...]`
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        if !self.training || self.drop_prob == 0.0 {
            return x;
        }
        let keep_prob = 1.0 - self.drop_prob;

        let mut mask_shape = [1; D];
        mask_shape[0] = x.dims()[0];
        let mask = Tensor::random(mask_shape, Distribution::Bernoulli(keep_prob), &x.device());

        x * mask / keep_prob
    }
}
