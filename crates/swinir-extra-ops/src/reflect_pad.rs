//! # Reflection padding
//!
//! Bottom/right reflection padding for NCHW tensors. Burn's `Tensor::pad`
//! only supports constant values, so the padded axes are materialized with
//! an index gather instead.

use burn::{prelude::*, tensor::TensorData};

/// Pads the bottom and right edges of a `[B, C, H, W]` tensor by mirroring
/// interior rows/columns (the edge itself is not repeated).
///
/// When an axis is shorter than the requested pad, the reflection bounces
/// between both ends of the axis; a 1-pixel axis degenerates to edge
/// replication. This keeps the operation total for any `H, W >= 1`.
pub fn reflect_pad_2d<B: Backend>(
    x: Tensor<B, 4>,
    pad_bottom: usize,
    pad_right: usize,
) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    let device = x.device();

    let x = if pad_bottom > 0 {
        x.select(2, reflect_indices::<B>(h, pad_bottom, &device))
    } else {
        x
    };
    if pad_right > 0 {
        x.select(3, reflect_indices::<B>(w, pad_right, &device))
    } else {
        x
    }
}

/// Index vector `[0, 1, .., len-1, len-2, len-3, ..]` implementing a
/// triangle wave that bounces at both axis ends.
fn reflect_indices<B: Backend>(len: usize, pad: usize, device: &Device<B>) -> Tensor<B, 1, Int> {
    let total = len + pad;
    let indices: Vec<i64> = if len == 1 {
        vec![0; total]
    } else {
        let period = 2 * (len - 1);
        (0..total)
            .map(|i| {
                let j = i % period;
                if j < len { j as i64 } else { (period - j) as i64 }
            })
            .collect()
    };

    Tensor::from_data(TensorData::new(indices, [total]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn mirrors_interior_rows_and_columns() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1, Int>::arange(0..4, &device)
            .float()
            .reshape([1, 1, 1, 4]);

        let padded = reflect_pad_2d(input, 0, 2);
        padded
            .to_data()
            .assert_eq(&TensorData::from([[[[0.0, 1.0, 2.0, 3.0, 2.0, 1.0]]]]), false);
    }

    #[test]
    fn pads_both_axes() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 1, Int>::arange(0..6, &device)
            .float()
            .reshape([1, 1, 2, 3]);

        let padded = reflect_pad_2d(input, 1, 1);
        assert_eq!(padded.dims(), [1, 1, 3, 4]);
        // Row 2 mirrors row 0, column 3 mirrors column 1.
        padded.to_data().assert_eq(
            &TensorData::from([[[
                [0.0, 1.0, 2.0, 1.0],
                [3.0, 4.0, 5.0, 4.0],
                [0.0, 1.0, 2.0, 1.0],
            ]]]),
            false,
        );
    }

    #[test]
    fn single_pixel_axis_replicates() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 1, 1], &device);
        let padded = reflect_pad_2d(input, 3, 3);
        assert_eq!(padded.dims(), [1, 3, 4, 4]);
        let data = padded.to_data();
        for v in data.as_slice::<f32>().unwrap() {
            assert_eq!(*v, 1.0);
        }
    }
}
