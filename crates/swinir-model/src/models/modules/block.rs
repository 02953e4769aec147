//! The residual Swin transformer unit: (shifted-)window attention followed
//! by a feed-forward network, each with drop-path and post-normalization.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use burn::{
    module::Ignored,
    nn::{LayerNorm, LayerNormConfig},
    prelude::*,
};
use swinir_extra_ops::{DropPath, DropPathConfig};

use super::{
    attention::{calculate_mask, WindowAttention, WindowAttentionConfig},
    mlp::{Mlp, MlpConfig},
    windowing::{window_partition, window_reverse},
};
use crate::error::{SwinIrError, SwinIrResult};

/// Epsilon used by every layer norm in the network.
pub(crate) const NORM_EPSILON: f64 = 1e-7;

/// Maximum number of resolutions whose masks are retained. Inference runs
/// see only a handful of distinct sizes; past the bound, masks are computed
/// per call without insertion so the cache never evicts and never grows.
const MASK_CACHE_CAPACITY: usize = 8;

/// Shifted-window attention masks keyed by feature-map resolution.
///
/// Shared mutable state only across forward calls of one block; entries are
/// immutable once inserted, so concurrent forwards at the same resolution
/// observe identical masks.
#[derive(Clone, Debug)]
pub(crate) struct MaskCache<B: Backend> {
    entries: Arc<Mutex<HashMap<(usize, usize), Tensor<B, 3>>>>,
}

impl<B: Backend> MaskCache<B> {
    fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn get_or_compute(
        &self,
        x_size: (usize, usize),
        window_size: usize,
        shift_size: usize,
        device: &Device<B>,
    ) -> Tensor<B, 3> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(mask) = entries.get(&x_size) {
            return mask.clone();
        }

        let mask = calculate_mask::<B>(x_size, window_size, shift_size, device);
        if entries.len() < MASK_CACHE_CAPACITY {
            entries.insert(x_size, mask.clone());
        }
        mask
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Configuration for [`SwinTransformerBlock`].
///
/// # Arguments
/// - `emb_size`: embedding width.
/// - `input_resolution`: feature-map resolution the block is built for.
/// - `num_heads`: number of attention heads.
/// - `window_size`: attention window size (clamped to `min(input_resolution)`
///   when the configured value exceeds it).
/// - `shift_size`: cyclic shift; `0` for W-MSA, `window_size / 2` for SW-MSA.
/// - `mlp_ratio`: hidden width of the MLP relative to `emb_size`.
/// - `dropout` / `attn_drop` / `drop_path`: regularization rates.
/// - `training`: whether stochastic depth is active.
#[derive(Config, Debug)]
pub struct SwinTransformerBlockConfig {
    emb_size: usize,
    input_resolution: [usize; 2],
    num_heads: usize,
    #[config(default = "7")]
    window_size: usize,
    #[config(default = "0")]
    shift_size: usize,
    #[config(default = "4.0")]
    mlp_ratio: f64,
    #[config(default = "true")]
    qkv_bias: bool,
    #[config(default = "0.0")]
    dropout: f64,
    #[config(default = "0.0")]
    attn_drop: f64,
    #[config(default = "0.0")]
    drop_path: f64,
    #[config(default = "false")]
    training: bool,
}

impl SwinTransformerBlockConfig {
    /// Initializes the block.
    ///
    /// When the configured window does not fit the input resolution, the
    /// window is clamped to `min(input_resolution)` and the shift collapses
    /// to zero (a single window covers the whole map).
    ///
    /// # Errors
    /// Returns [`SwinIrError::InvalidConfiguration`] when
    /// `shift_size >= window_size` after clamping, or when `emb_size` is not
    /// divisible by `num_heads`.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinIrResult<SwinTransformerBlock<B>> {
        let min_resolution = self.input_resolution[0].min(self.input_resolution[1]);
        let (window_size, shift_size) = if min_resolution <= self.window_size {
            (min_resolution, 0)
        } else {
            (self.window_size, self.shift_size)
        };

        if shift_size >= window_size {
            return Err(SwinIrError::InvalidConfiguration {
                reason: format!(
                    "shift_size {shift_size} must lie in [0, window_size {window_size})"
                ),
            });
        }

        let attn = WindowAttentionConfig::new(
            self.emb_size,
            [window_size, window_size],
            self.num_heads,
        )
        .with_qkv_bias(self.qkv_bias)
        .with_attn_drop(self.attn_drop)
        .with_proj_drop(self.dropout)
        .init(device)?;

        let mask_cache = MaskCache::new();
        if shift_size > 0 {
            // Warm the cache with the construction-time resolution.
            let resolution = (self.input_resolution[0], self.input_resolution[1]);
            mask_cache.get_or_compute(resolution, window_size, shift_size, device);
        }

        let mlp_hidden = (self.emb_size as f64 * self.mlp_ratio) as usize;

        Ok(SwinTransformerBlock {
            window_size,
            shift_size,
            norm1: LayerNormConfig::new(self.emb_size)
                .with_epsilon(NORM_EPSILON)
                .init(device),
            attn,
            drop_path: DropPathConfig::new()
                .with_drop_prob(self.drop_path)
                .with_training(self.training)
                .init(),
            norm2: LayerNormConfig::new(self.emb_size)
                .with_epsilon(NORM_EPSILON)
                .init(device),
            mlp: MlpConfig::new(self.emb_size, mlp_hidden)
                .with_dropout(self.dropout)
                .init(device),
            mask_cache: Ignored(mask_cache),
        })
    }
}

/// One Swin transformer unit.
///
/// Per forward pass: tokens are reshaped to the spatial map, cyclically
/// rolled when shifted, window-partitioned and attended (with the mask for
/// the *current* resolution), reassembled, then residually combined with the
/// input; a second residual applies the MLP. Both residual sums are
/// normalized after the add.
#[derive(Module, Debug)]
pub struct SwinTransformerBlock<B: Backend> {
    window_size: usize,
    shift_size: usize,
    norm1: LayerNorm<B>,
    attn: WindowAttention<B>,
    norm2: LayerNorm<B>,
    mlp: Mlp<B>,
    drop_path: DropPath<B>,
    mask_cache: Ignored<MaskCache<B>>,
}

impl<B: Backend> SwinTransformerBlock<B> {
    /// Effective cyclic shift after construction-time clamping.
    pub fn shift_size(&self) -> usize {
        self.shift_size
    }

    /// Effective window size after construction-time clamping.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// # Shapes
    /// - `x`: `[batch_size, h * w, emb_size]` with `(h, w) = x_size`, both
    ///   multiples of the window size
    /// - output: same as `x`
    pub fn forward(&self, x: Tensor<B, 3>, x_size: (usize, usize)) -> Tensor<B, 3> {
        let (h, w) = x_size;
        let [b, _, c] = x.dims();

        let shortcut = x.clone();
        let x = x.reshape([b, h, w, c]);

        let shifted_x = if self.shift_size > 0 {
            x.roll(
                &[-(self.shift_size as i64), -(self.shift_size as i64)],
                &[1, 2],
            )
        } else {
            x
        };

        let x_windows = window_partition(shifted_x, self.window_size);
        let num_windows = x_windows.dims()[0];
        let x_windows = x_windows.reshape([num_windows, self.window_size * self.window_size, c]);

        let mask = (self.shift_size > 0).then(|| {
            self.mask_cache.0.get_or_compute(
                x_size,
                self.window_size,
                self.shift_size,
                &x_windows.device(),
            )
        });
        let (attn_windows, _attn_weights) = self.attn.forward(x_windows, mask);

        let attn_windows =
            attn_windows.reshape([num_windows, self.window_size, self.window_size, c]);
        let shifted_x = window_reverse(attn_windows, self.window_size, h, w);

        let x = if self.shift_size > 0 {
            shifted_x.roll(&[self.shift_size as i64, self.shift_size as i64], &[1, 2])
        } else {
            shifted_x
        };
        let x = x.reshape([b, h * w, c]);

        let x = self.norm1.forward(shortcut + self.drop_path.forward(x));

        self.norm2
            .forward(x.clone() + self.drop_path.forward(self.mlp.forward(x)))
    }
}
