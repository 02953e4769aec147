//! # Truncated normal initialization
//!
//! Draws values from a normal distribution with the given mean and standard
//! deviation, truncated to `[a, b]`. Used for attention bias tables and
//! position embeddings.

use burn::{prelude::*, tensor::Distribution};

use crate::erfinv::Erfinv;

/// Fills a tensor with values from a truncated normal distribution.
///
/// Uses the inverse-CDF method: sample uniformly in the CDF image of
/// `[a, b]`, then map back through `erfinv`.
///
/// # Arguments
///
/// * `x` - Template tensor; its shape and device determine the output.
/// * `mean` - Mean of the underlying normal distribution.
/// * `std` - Standard deviation of the underlying normal distribution.
/// * `a` - Lower truncation bound.
/// * `b` - Upper truncation bound.
pub fn trunc_normal<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    mean: f64,
    std: f64,
    a: f64,
    b: f64,
) -> Tensor<B, D> {
    fn norm_cdf(x: f64) -> f64 {
        (1.0 + libm::erf(x / 2.0_f64.sqrt())) / 2.0
    }

    let l = norm_cdf((a - mean) / std);
    let u = norm_cdf((b - mean) / std);

    let x = x.random_like(Distribution::Uniform(2.0 * l - 1.0, 2.0 * u - 1.0));
    let x = x.erfinv();
    let x = x.mul_scalar(std * 2.0_f64.sqrt()).add_scalar(mean);

    x.clamp(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn preserves_shape() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2>::zeros([9, 4], &device);
        let result = trunc_normal(tensor, 0.0, 0.02, -2.0, 2.0);
        assert_eq!(result.dims(), [9, 4]);
    }

    #[test]
    fn respects_truncation_bounds() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2>::zeros([64, 64], &device);
        let result = trunc_normal(tensor, 0.0, 1.0, -0.5, 0.5);
        let data = result.to_data();
        for v in data.as_slice::<f32>().unwrap() {
            assert!((-0.5..=0.5).contains(v), "value {v} outside bounds");
        }
    }
}
