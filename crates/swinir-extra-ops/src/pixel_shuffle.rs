//! # Pixel shuffle (depth-to-space)
//!
//! Rearranges channel depth into spatial resolution, the core of sub-pixel
//! convolution upsampling (Shi et al., 2016).

use burn::prelude::*;

/// Rearranges a `[B, C·r², H, W]` tensor into `[B, C, H·r, W·r]`.
///
/// Channel `c·r² + i·r + j` contributes the output pixel at
/// `(h·r + i, w·r + j)`, matching the PyTorch / TensorFlow depth-to-space
/// convention.
///
/// # Panics
/// Panics if the channel count is not divisible by `upscale_factor²`.
pub fn pixel_shuffle<B: Backend>(x: Tensor<B, 4>, upscale_factor: usize) -> Tensor<B, 4> {
    let [b, c, h, w] = x.dims();
    let r = upscale_factor;
    assert_eq!(
        c % (r * r),
        0,
        "pixel_shuffle: channel count {c} is not divisible by {}",
        r * r
    );
    let c_out = c / (r * r);

    x.reshape([b, c_out, r, r, h, w])
        .permute([0, 1, 4, 2, 5, 3])
        .reshape([b, c_out, h * r, w * r])
}
