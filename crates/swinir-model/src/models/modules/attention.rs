//! Window-based multi-head self-attention with relative position bias, and
//! the additive attention mask used by shifted windows.

use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};
use swinir_extra_ops::trunc_normal;

use super::windowing::window_partition;
use crate::error::{SwinIrError, SwinIrResult};

/// Additive sentinel marking cross-region pairs in the shifted-window mask.
const MASK_SENTINEL: f64 = -100.0;

/// Integer coordinate grid of shape `[2, height, width]`; index 0 holds the
/// row coordinate of each position, index 1 the column coordinate.
fn coordinate_grid<B: Backend>(
    height: usize,
    width: usize,
    device: &Device<B>,
) -> Tensor<B, 3, Int> {
    let rows = Tensor::<B, 1, Int>::arange(0..height as i64, device)
        .reshape([height, 1])
        .repeat_dim(1, width);
    let cols = Tensor::<B, 1, Int>::arange(0..width as i64, device)
        .reshape([1, width])
        .repeat_dim(0, height);

    Tensor::stack(vec![rows, cols], 0)
}

/// Precomputes the relative-position index table for a window geometry.
///
/// For every ordered pair of intra-window positions, the pairwise coordinate
/// difference is shifted to be non-negative and collapsed into a single
/// integer in `[0, (2*wh - 1) * (2*ww - 1))`, indexing the learned bias
/// table. Geometry-only: no learned values.
pub(crate) fn relative_position_index<B: Backend>(
    window_size: [usize; 2],
    device: &Device<B>,
) -> Tensor<B, 2, Int> {
    let [wh, ww] = window_size;
    let n = wh * ww;

    let coords = coordinate_grid::<B>(wh, ww, device);
    let coords_flatten: Tensor<B, 2, Int> = coords.flatten(1, 2);

    // Pairwise differences, [2, N, N].
    let relative_coords: Tensor<B, 3, Int> =
        coords_flatten.clone().unsqueeze_dim(2) - coords_flatten.unsqueeze_dim(1);

    let rows = relative_coords
        .clone()
        .slice([0..1, 0..n, 0..n])
        .reshape([n, n])
        .add_scalar(wh as i64 - 1)
        .mul_scalar(2 * ww as i64 - 1);
    let cols = relative_coords
        .slice([1..2, 0..n, 0..n])
        .reshape([n, n])
        .add_scalar(ww as i64 - 1);

    rows + cols
}

/// Builds the additive attention mask for a shifted-window configuration.
///
/// The image is partitioned into up to nine labeled regions using the slice
/// triples `[0, -ws)`, `[-ws, -shift)`, `[-shift, end)` per axis; after
/// window-partitioning the label map, a pair of positions is masked with
/// [`MASK_SENTINEL`] when the labels differ and 0 otherwise.
///
/// # Shapes
/// - output: `[num_windows, window_size^2, window_size^2]`
pub fn calculate_mask<B: Backend>(
    x_size: (usize, usize),
    window_size: usize,
    shift_size: usize,
    device: &Device<B>,
) -> Tensor<B, 3> {
    let (h, w) = x_size;
    let mut img_mask: Tensor<B, 4> = Tensor::zeros([1, h, w, 1], device);

    let h_slices = [
        0..-(window_size as isize),
        -(window_size as isize)..-(shift_size as isize),
        -(shift_size as isize)..h as isize,
    ];
    let w_slices = [
        0..-(window_size as isize),
        -(window_size as isize)..-(shift_size as isize),
        -(shift_size as isize)..w as isize,
    ];

    let mut region = 0;
    for h_slice in h_slices {
        for w_slice in w_slices.clone() {
            img_mask = img_mask.slice_fill(
                s![.., h_slice.clone(), w_slice, ..],
                B::FloatElem::from_elem(f64::from(region)),
            );
            region += 1;
        }
    }

    let mask_windows = window_partition(img_mask, window_size);
    let num_windows = mask_windows.dims()[0];
    let mask_windows = mask_windows.reshape([num_windows, window_size * window_size]);

    let attn_mask: Tensor<B, 3> =
        mask_windows.clone().unsqueeze_dim(1) - mask_windows.unsqueeze_dim(2);

    attn_mask
        .clone()
        .mask_fill(attn_mask.not_equal_elem(0.0), MASK_SENTINEL)
}

/// Configuration for [`WindowAttention`].
///
/// # Arguments
/// - `emb_size`: embedding width; must be divisible by `num_heads`.
/// - `window_size`: attention window height and width.
/// - `num_heads`: number of attention heads.
/// - `qkv_bias`: add a learnable bias to the Q/K/V projections.
/// - `attn_drop`: dropout on the attention weights.
/// - `proj_drop`: dropout on the output projection.
#[derive(Config, Debug)]
pub struct WindowAttentionConfig {
    emb_size: usize,
    window_size: [usize; 2],
    num_heads: usize,
    #[config(default = "true")]
    qkv_bias: bool,
    #[config(default = "0.0")]
    attn_drop: f64,
    #[config(default = "0.0")]
    proj_drop: f64,
}

impl WindowAttentionConfig {
    /// Initializes the attention module.
    ///
    /// # Errors
    /// Returns [`SwinIrError::InvalidConfiguration`] when `emb_size` is not
    /// divisible by `num_heads`.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinIrResult<WindowAttention<B>> {
        if self.emb_size % self.num_heads != 0 {
            return Err(SwinIrError::InvalidConfiguration {
                reason: format!(
                    "embedding width {} is not divisible by head count {}",
                    self.emb_size, self.num_heads
                ),
            });
        }
        let head_dim = self.emb_size / self.num_heads;
        let num_window_elements = (2 * self.window_size[0] - 1) * (2 * self.window_size[1] - 1);

        let relative_position_bias_table = Param::from_tensor(trunc_normal(
            Tensor::zeros([num_window_elements, self.num_heads], device),
            0.0,
            0.02,
            -2.0,
            2.0,
        ));

        let projection = |bias: bool| {
            LinearConfig::new(self.emb_size, self.emb_size)
                .with_bias(bias)
                .init(device)
        };

        Ok(WindowAttention {
            window_size: self.window_size,
            num_heads: self.num_heads,
            scale: (head_dim as f64).powf(-0.5),
            relative_position_bias_table,
            relative_position_index: relative_position_index::<B>(self.window_size, device),
            q: projection(self.qkv_bias),
            k: projection(self.qkv_bias),
            v: projection(self.qkv_bias),
            attn_drop: DropoutConfig::new(self.attn_drop).init(),
            proj: projection(true),
            proj_drop: DropoutConfig::new(self.proj_drop).init(),
        })
    }
}

/// Multi-head self-attention restricted to one window, with a learned
/// relative positional bias added to the logits.
///
/// The relative-position index is derived state: recomputed from the window
/// geometry at construction and never trained.
#[derive(Module, Debug)]
pub struct WindowAttention<B: Backend> {
    window_size: [usize; 2],
    num_heads: usize,
    scale: f64,
    relative_position_bias_table: Param<Tensor<B, 2>>,
    relative_position_index: Tensor<B, 2, Int>,
    q: Linear<B>,
    k: Linear<B>,
    v: Linear<B>,
    attn_drop: Dropout,
    proj: Linear<B>,
    proj_drop: Dropout,
}

impl<B: Backend> WindowAttention<B> {
    /// Self-attention over stacked windows.
    ///
    /// # Arguments
    /// - `x`: `[num_windows * batch_size, window_size^2, emb_size]`
    /// - `mask`: optional additive mask
    ///   `[num_windows, window_size^2, window_size^2]`, broadcast over heads
    ///   and batch.
    ///
    /// # Returns
    /// The attended tokens (same shape as `x`) and the post-softmax
    /// attention weights `[num_windows * batch_size, num_heads, N, N]`.
    pub fn forward(
        &self,
        x: Tensor<B, 3>,
        mask: Option<Tensor<B, 3>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [b, n, c] = x.dims();
        let head_dim = c / self.num_heads;

        let q = self
            .q
            .forward(x.clone())
            .reshape([b, n, self.num_heads, head_dim])
            .swap_dims(1, 2);
        let k = self
            .k
            .forward(x.clone())
            .reshape([b, n, self.num_heads, head_dim])
            .swap_dims(1, 2);
        let v = self
            .v
            .forward(x)
            .reshape([b, n, self.num_heads, head_dim])
            .swap_dims(1, 2);

        let q = q * self.scale;
        let attn = q.matmul(k.swap_dims(2, 3));

        let relative_position_bias = self
            .relative_position_bias_table
            .val()
            .select(0, self.relative_position_index.clone().reshape([n * n]))
            .reshape([n, n, self.num_heads])
            .permute([2, 0, 1]);
        let attn = attn + relative_position_bias.reshape([1, self.num_heads, n, n]);

        let attn = match mask {
            Some(mask) => {
                let [num_windows, _, _] = mask.dims();
                let attn = attn.reshape([b / num_windows, num_windows, self.num_heads, n, n])
                    + mask.reshape([1, num_windows, 1, n, n]);
                attn.reshape([b, self.num_heads, n, n])
            }
            None => attn,
        };

        let attn = softmax(attn, 3);
        let attn = self.attn_drop.forward(attn);

        let x = attn.clone().matmul(v).swap_dims(1, 2).reshape([b, n, c]);
        let x = self.proj.forward(x);

        (self.proj_drop.forward(x), attn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::tensor::{Distribution, TensorData};
    use rstest::rstest;

    #[test]
    fn relative_position_index_for_2x2_window() {
        let device = Default::default();
        let index = relative_position_index::<TestBackend>([2, 2], &device);

        // Offsets (dh, dw) in [-1, 1] map to (dh + 1) * 3 + (dw + 1).
        index.to_data().assert_eq(
            &TensorData::from([
                [4_i64, 3, 1, 0],
                [5, 4, 2, 1],
                [7, 6, 4, 3],
                [8, 7, 5, 4],
            ]),
            false,
        );
    }

    #[rstest]
    #[case([4, 4])]
    #[case([7, 7])]
    #[case([8, 4])]
    fn relative_position_index_is_deterministic_and_bounded(#[case] window_size: [usize; 2]) {
        let device = Default::default();
        let a = relative_position_index::<TestBackend>(window_size, &device);
        let b = relative_position_index::<TestBackend>(window_size, &device);
        a.to_data().assert_eq(&b.to_data(), false);

        let bound = ((2 * window_size[0] - 1) * (2 * window_size[1] - 1)) as i64;
        let data = a.to_data();
        for v in data.as_slice::<i64>().unwrap() {
            assert!((0..bound).contains(v), "index {v} outside [0, {bound})");
        }
    }

    #[test]
    fn mirrored_pairs_use_mirrored_offsets() {
        let device = Default::default();
        let index = relative_position_index::<TestBackend>([3, 3], &device);
        let data = index.to_data();
        let values = data.as_slice::<i64>().unwrap();
        let n = 9;

        // index[p][q] + index[q][p] is constant: offsets are negatives of
        // each other, so their encodings sum to twice the center code.
        let center = values[0];
        for p in 0..n {
            for q in 0..n {
                assert_eq!(values[p * n + q] + values[q * n + p], 2 * center);
            }
        }
    }

    #[test]
    fn mask_is_symmetric_with_zero_diagonal() {
        let device = Default::default();
        let mask = calculate_mask::<TestBackend>((8, 8), 4, 2, &device);
        assert_eq!(mask.dims(), [4, 16, 16]);

        let transposed = mask.clone().swap_dims(1, 2);
        mask.to_data().assert_eq(&transposed.to_data(), false);

        let data = mask.to_data();
        let values = data.as_slice::<f32>().unwrap();
        for w in 0..4 {
            for i in 0..16 {
                assert_eq!(values[w * 256 + i * 16 + i], 0.0);
            }
        }
    }

    #[test]
    fn mask_separates_shifted_regions() {
        let device = Default::default();
        // 8x8 map, window 4, shift 2: windows tile row-major. The top-left
        // window lies entirely in the unshifted body; the bottom-right
        // window spans four wrapped regions.
        let mask = calculate_mask::<TestBackend>((8, 8), 4, 2, &device);
        let data = mask.to_data();
        let values = data.as_slice::<f32>().unwrap();

        // Window 0: a single region, no pair masked.
        for v in &values[..256] {
            assert_eq!(*v, 0.0);
        }

        // Window 3 (rows 4-7, cols 4-7): token 0 = (4, 4) in the body
        // remainder, token 2 = (4, 6) in the wrapped column strip.
        let w3 = &values[3 * 256..4 * 256];
        assert_eq!(w3[2], -100.0);
        // Token 1 = (4, 5) shares the region of token 0.
        assert_eq!(w3[1], 0.0);
        // Token 8 = (6, 4) lives in the wrapped row strip.
        assert_eq!(w3[8 * 16], -100.0);

        // Every masked pair uses the exact sentinel.
        for v in values {
            assert!(*v == 0.0 || *v == -100.0);
        }
    }

    #[rstest]
    #[case(32, [4, 4], 4, 4)]
    #[case(24, [7, 7], 3, 2)]
    #[case(16, [2, 4], 2, 6)]
    fn attention_preserves_window_token_shape(
        #[case] emb_size: usize,
        #[case] window_size: [usize; 2],
        #[case] num_heads: usize,
        #[case] num_windows: usize,
    ) {
        let device = Default::default();
        let attention = WindowAttentionConfig::new(emb_size, window_size, num_heads)
            .init::<TestBackend>(&device)
            .unwrap();

        let n = window_size[0] * window_size[1];
        let input = Tensor::<TestBackend, 3>::random(
            [num_windows, n, emb_size],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let (output, weights) = attention.forward(input, None);
        assert_eq!(output.dims(), [num_windows, n, emb_size]);
        assert_eq!(weights.dims(), [num_windows, num_heads, n, n]);
    }

    #[test]
    fn attention_weights_are_normalized() {
        let device = Default::default();
        let attention = WindowAttentionConfig::new(16, [4, 4], 2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input =
            Tensor::<TestBackend, 3>::random([2, 16, 16], Distribution::Default, &device);
        let (_, weights) = attention.forward(input, None);

        let sums = weights.sum_dim(3).to_data();
        for v in sums.as_slice::<f32>().unwrap() {
            assert!((v - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn indivisible_head_count_is_rejected() {
        let device = Default::default();
        let result = WindowAttentionConfig::new(30, [4, 4], 4).init::<TestBackend>(&device);
        assert!(matches!(
            result,
            Err(SwinIrError::InvalidConfiguration { .. })
        ));
    }
}
