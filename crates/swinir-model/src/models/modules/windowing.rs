//! Window partition/reverse transforms.
//!
//! Attention in SwinIR is computed inside non-overlapping
//! `window_size x window_size` tiles; these two functions move between the
//! spatial feature map and the stacked-window layout.

use burn::prelude::*;

/// Partitions a feature map into non-overlapping windows.
///
/// Windows are emitted in row-major order: the outer loop runs over
/// height-blocks, the inner over width-blocks.
///
/// # Shapes
/// - input: `[batch_size, height, width, channels]`, with `height` and
///   `width` divisible by `window_size`
/// - output: `[batch_size * height/ws * width/ws, window_size, window_size, channels]`
pub fn window_partition<B: Backend>(x: Tensor<B, 4>, window_size: usize) -> Tensor<B, 4> {
    let [b, h, w, c] = x.dims();
    let x = x.reshape([
        b,
        h / window_size,
        window_size,
        w / window_size,
        window_size,
        c,
    ]);

    x.permute([0, 1, 3, 2, 4, 5]).reshape([
        b * (h / window_size) * (w / window_size),
        window_size,
        window_size,
        c,
    ])
}

/// Reassembles windows into a feature map; the exact inverse of
/// [`window_partition`] for the same `(h, w)`.
///
/// # Shapes
/// - input: `[num_windows * batch_size, window_size, window_size, channels]`
/// - output: `[batch_size, height, width, channels]`
pub fn window_reverse<B: Backend>(
    windows: Tensor<B, 4>,
    window_size: usize,
    h: usize,
    w: usize,
) -> Tensor<B, 4> {
    let [total_windows, _, _, c] = windows.dims();
    let b = total_windows / (h * w / window_size / window_size);
    let x = windows.reshape([
        b,
        h / window_size,
        w / window_size,
        window_size,
        window_size,
        c,
    ]);

    x.permute([0, 1, 3, 2, 4, 5]).reshape([b, h, w, c])
}
