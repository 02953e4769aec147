//! # Inverse error function
//!
//! Element-wise `erfinv`, required by the truncated-normal initializer.
//!
//! Rational approximation following Gary L. Pavlis' MATLAB `erfinv` v2.0:
//! an initial guess from a rational polynomial, refined with two steps of
//! Newton's method.

use burn::prelude::*;
use core::f64::consts::PI;

const CENTRAL_RANGE: f64 = 0.7;
const A: [f64; 4] = [0.886226899, -1.645349621, 0.914624893, -0.140543331];
const B_COEFF: [f64; 4] = [-2.118377725, 1.442710462, -0.329097515, 0.012229801];
const C: [f64; 4] = [-1.970840454, -1.624906493, 3.429567803, 1.641345311];
const D_COEFF: [f64; 2] = [3.543889200, 1.637067800];

/// A trait for calculating the inverse error function on a tensor.
pub trait Erfinv {
    /// Calculates the inverse error function element-wise.
    fn erfinv(self) -> Self;
}

impl<B: Backend, const D: usize> Erfinv for Tensor<B, D> {
    fn erfinv(self) -> Self {
        let y = self;
        let y_abs = y.clone().abs();
        let mut result = y.zeros_like();

        // |y| >= 1 has no finite inverse.
        result = result.mask_fill(y_abs.clone().greater_equal_elem(1.0), f64::INFINITY);

        let lt_one = y_abs.clone().lower_elem(1.0);

        let central = y_abs
            .clone()
            .lower_equal_elem(CENTRAL_RANGE)
            .equal(lt_one.clone());
        result = result.mask_where(central, central_range(y.clone()));

        let outer = y_abs.clone().greater_elem(CENTRAL_RANGE).equal(lt_one);
        result = result.mask_where(outer, outer_range(y.clone()));

        // Two Newton-Raphson steps refine the guess wherever it is finite.
        let finite = y_abs.lower_elem(1.0);
        let refined = newton_raphson(result.clone(), y.clone());
        result = result.mask_where(finite, refined);

        result * y.sign()
    }
}

/// `|y| <= 0.7`: rational polynomial in `y^2`.
fn central_range<B: Backend, const D: usize>(y: Tensor<B, D>) -> Tensor<B, D> {
    let z = y.clone().powf_scalar(2.0);
    let num = ((z.clone() * A[3] + A[2]) * z.clone() + A[1]) * z.clone() + A[0];
    let dem =
        (((z.clone() * B_COEFF[3] + B_COEFF[2]) * z.clone() + B_COEFF[1]) * z.clone() + B_COEFF[0])
            * z
            + 1.0;
    y * num / dem
}

/// `0.7 < |y| < 1`: rational polynomial in `sqrt(-log((1 - |y|) / 2))`.
fn outer_range<B: Backend, const D: usize>(y: Tensor<B, D>) -> Tensor<B, D> {
    let y_abs = y.clone().abs();
    let z = ((1.0_f64 - y_abs) / 2.0_f64).log().neg().sqrt();
    let num = ((z.clone() * C[3] + C[2]) * z.clone() + C[1]) * z.clone() + C[0];
    let dem = (z.clone() * D_COEFF[1] + D_COEFF[0]) * z + 1.0;
    y.sign() * num / dem
}

fn newton_raphson<B: Backend, const D: usize>(
    mut result: Tensor<B, D>,
    y: Tensor<B, D>,
) -> Tensor<B, D> {
    let two_over_sqrt_pi = 2.0 / PI.sqrt();
    for _ in 0..2 {
        let correction = (result.clone().erf() - y.clone())
            / ((-result.clone().powf_scalar(2.0)).exp() * two_over_sqrt_pi);
        result = result - correction;
    }
    result
}

/// Convenience free-function form of [`Erfinv::erfinv`].
pub fn erfinv<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.erfinv()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn erfinv_matches_reference_values() {
        let device = Default::default();

        // torch.special.erfinv([0.0, 0.5, 0.9]) = [0.0000, 0.4769, 1.1631]
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 0.5, 0.9], &device);
        let result = erfinv(x);
        let data = result.to_data();
        let values = data.as_slice::<f32>().unwrap();

        assert!(values[0].abs() < 1e-6);
        assert!((values[1] - 0.4769).abs() < 1e-3);
        assert!((values[2] - 1.1631).abs() < 1e-2);
    }

    #[test]
    fn erfinv_is_odd() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([0.3, -0.3], &device);
        let data = erfinv(x).to_data();
        let values = data.as_slice::<f32>().unwrap();
        assert!((values[0] + values[1]).abs() < 1e-6);
    }
}
