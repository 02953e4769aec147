//! Stage composition: a stack of alternating regular/shifted blocks
//! (`BasicLayer`) and the residual Swin transformer group (`Rstb`) that
//! wraps it with a convolutional refinement.

use burn::prelude::*;

use super::{
    block::{SwinTransformerBlock, SwinTransformerBlockConfig},
    conv::{ResidualConv, ResidualConvConfig},
    embed::{PatchEmbed, PatchEmbedConfig, PatchUnEmbed, PatchUnEmbedConfig},
};
use crate::{config::ResiConnection, error::SwinIrResult};

/// Configuration for [`BasicLayer`].
#[derive(Config, Debug)]
pub struct BasicLayerConfig {
    emb_size: usize,
    input_resolution: [usize; 2],
    depth: usize,
    num_heads: usize,
    window_size: usize,
    #[config(default = "4.0")]
    mlp_ratio: f64,
    #[config(default = "true")]
    qkv_bias: bool,
    #[config(default = "0.0")]
    dropout: f64,
    #[config(default = "0.0")]
    attn_drop: f64,
    /// Per-block stochastic depth rates; must hold `depth` entries.
    #[config(default = "Vec::new()")]
    drop_path: Vec<f64>,
    #[config(default = "false")]
    training: bool,
}

impl BasicLayerConfig {
    /// Initializes the stage.
    ///
    /// Blocks alternate between regular attention (even index, shift 0) and
    /// shifted attention (odd index, shift `window_size / 2`).
    ///
    /// # Errors
    /// Propagates block construction failures.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinIrResult<BasicLayer<B>> {
        let blocks = (0..self.depth)
            .map(|i| {
                SwinTransformerBlockConfig::new(
                    self.emb_size,
                    self.input_resolution,
                    self.num_heads,
                )
                .with_window_size(self.window_size)
                .with_shift_size(if i % 2 == 0 { 0 } else { self.window_size / 2 })
                .with_mlp_ratio(self.mlp_ratio)
                .with_qkv_bias(self.qkv_bias)
                .with_dropout(self.dropout)
                .with_attn_drop(self.attn_drop)
                .with_drop_path(self.drop_path.get(i).copied().unwrap_or(0.0))
                .with_training(self.training)
                .init(device)
            })
            .collect::<SwinIrResult<Vec<_>>>()?;

        Ok(BasicLayer { blocks })
    }
}

/// A fixed-length sequence of Swin transformer blocks at one resolution.
#[derive(Module, Debug)]
pub struct BasicLayer<B: Backend> {
    blocks: Vec<SwinTransformerBlock<B>>,
}

impl<B: Backend> BasicLayer<B> {
    /// # Shapes
    /// - `x`: `[batch_size, h * w, emb_size]` with `(h, w) = x_size`
    /// - output: same as `x`
    pub fn forward(&self, x: Tensor<B, 3>, x_size: (usize, usize)) -> Tensor<B, 3> {
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x, x_size);
        }
        x
    }
}

/// Configuration for [`Rstb`].
#[derive(Config, Debug)]
pub struct RstbConfig {
    emb_size: usize,
    input_resolution: [usize; 2],
    depth: usize,
    num_heads: usize,
    window_size: usize,
    #[config(default = "4.0")]
    mlp_ratio: f64,
    #[config(default = "true")]
    qkv_bias: bool,
    #[config(default = "0.0")]
    dropout: f64,
    #[config(default = "0.0")]
    attn_drop: f64,
    #[config(default = "Vec::new()")]
    drop_path: Vec<f64>,
    #[config(default = "ResiConnection::ThreeConv")]
    resi_connection: ResiConnection,
    #[config(default = "false")]
    training: bool,
}

impl RstbConfig {
    /// Initializes the residual group.
    ///
    /// # Errors
    /// Propagates block construction failures.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinIrResult<Rstb<B>> {
        let residual_group = BasicLayerConfig::new(
            self.emb_size,
            self.input_resolution,
            self.depth,
            self.num_heads,
            self.window_size,
        )
        .with_mlp_ratio(self.mlp_ratio)
        .with_qkv_bias(self.qkv_bias)
        .with_dropout(self.dropout)
        .with_attn_drop(self.attn_drop)
        .with_drop_path(self.drop_path.clone())
        .with_training(self.training)
        .init(device)?;

        Ok(Rstb {
            residual_group,
            conv: ResidualConvConfig::new(self.emb_size, self.resi_connection.clone())
                .init(device),
            patch_embed: PatchEmbedConfig::new(self.emb_size).init(device),
            patch_unembed: PatchUnEmbedConfig::new(self.emb_size).init(),
        })
    }
}

/// Residual Swin Transformer Block: an attention stage sandwiched between
/// patch reshapes and a spatial convolution, residually connected to its
/// input.
#[derive(Module, Debug)]
pub struct Rstb<B: Backend> {
    residual_group: BasicLayer<B>,
    conv: ResidualConv<B>,
    patch_embed: PatchEmbed<B>,
    patch_unembed: PatchUnEmbed<B>,
}

impl<B: Backend> Rstb<B> {
    /// # Shapes
    /// - `x`: `[batch_size, h * w, emb_size]` with `(h, w) = x_size`
    /// - output: same as `x`
    pub fn forward(&self, x: Tensor<B, 3>, x_size: (usize, usize)) -> Tensor<B, 3> {
        let res = self.residual_group.forward(x.clone(), x_size);
        let res = self.patch_unembed.forward(res, x_size);
        let res = self.conv.forward(res);

        self.patch_embed.forward(res) + x
    }
}
