//! The SwinIR super-resolution network.
//!
//! Shallow features from a convolutional stem flow through a stack of
//! residual Swin transformer groups, a global residual connection, and a
//! sub-pixel convolution upsampler. Input images of arbitrary size are
//! reflection-padded to the next window-size multiple and the output is
//! cropped back to `(H * upscale, W * upscale)`.

use burn::{
    module::Param,
    nn::{
        conv::Conv2d, Dropout, DropoutConfig, LayerNorm, LayerNormConfig, LeakyRelu,
        LeakyReluConfig,
    },
    prelude::*,
};
use swinir_extra_ops::{reflect_pad_2d, trunc_normal};

use super::modules::{
    conv3x3, PatchEmbed, PatchEmbedConfig, PatchUnEmbed, PatchUnEmbedConfig, ResidualConv,
    ResidualConvConfig, Rstb, RstbConfig, Upsample, UpsampleConfig, LEAKY_RELU_SLOPE,
    NORM_EPSILON,
};
use crate::{
    config::ResiConnection,
    error::{SwinIrError, SwinIrResult},
};

/// Channel width of the reconstruction head.
const NUM_FEAT: usize = 64;

/// Fixed per-channel mean of the DIV2K training distribution, subtracted
/// before the body and restored afterwards.
const RGB_MEAN: [f64; 3] = [0.4488, 0.4371, 0.4040];

/// Configuration for the [`SwinIr`] model.
///
/// # Arguments
/// - `img_size` / `patch_size`: training-time geometry; determines the
///   resolution the attention masks are precomputed for and the size of the
///   optional absolute position embedding.
/// - `in_chans`: input/output image channels.
/// - `emb_size`: embedding width of the transformer body.
/// - `depths`: number of blocks per RSTB stage.
/// - `num_heads`: attention heads per stage; same length as `depths`.
/// - `window_size`: attention window size.
/// - `mlp_ratio`: MLP expansion ratio.
/// - `qkv_bias`: bias on the Q/K/V projections.
/// - `drop_rate` / `attn_drop_rate` / `drop_path_rate`: regularization.
/// - `ape`: learn an absolute position embedding over the patch grid.
/// - `patch_norm`: layer-normalize tokens after patch embedding.
/// - `upscale`: output magnification; a power of two or 3 (1 selects the
///   direct refinement head).
/// - `img_range`: intensity range of the input (1.0 or 255.0).
/// - `resi_connection`: convolution style of the residual paths.
/// - `training`: enable stochastic depth.
#[derive(Config, Debug)]
pub struct SwinIrConfig {
    #[config(default = "64")]
    pub img_size: usize,
    #[config(default = "1")]
    pub patch_size: usize,
    #[config(default = "3")]
    pub in_chans: usize,
    #[config(default = "96")]
    pub emb_size: usize,
    #[config(default = "vec![6, 6, 6, 6]")]
    pub depths: Vec<usize>,
    #[config(default = "vec![6, 6, 6, 6]")]
    pub num_heads: Vec<usize>,
    #[config(default = "7")]
    pub window_size: usize,
    #[config(default = "4.0")]
    pub mlp_ratio: f64,
    #[config(default = "true")]
    pub qkv_bias: bool,
    #[config(default = "0.0")]
    pub drop_rate: f64,
    #[config(default = "0.0")]
    pub attn_drop_rate: f64,
    #[config(default = "0.1")]
    pub drop_path_rate: f64,
    #[config(default = "false")]
    pub ape: bool,
    #[config(default = "true")]
    pub patch_norm: bool,
    #[config(default = "2")]
    pub upscale: usize,
    #[config(default = "1.0")]
    pub img_range: f64,
    #[config(default = "ResiConnection::ThreeConv")]
    pub resi_connection: ResiConnection,
    #[config(default = "false")]
    pub training: bool,
}

fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step_size = (end - start) / (steps as f64 - 1.0);
            (0..steps).map(|i| i as f64 * step_size + start).collect()
        }
    }
}

impl SwinIrConfig {
    /// Initializes a [`SwinIr`] model on the given device.
    ///
    /// # Errors
    /// Returns [`SwinIrError::InvalidConfiguration`] for inconsistent stage
    /// parameters and [`SwinIrError::UnsupportedScale`] when `upscale` is
    /// neither a power of two nor 3.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinIrResult<SwinIr<B>> {
        if self.depths.is_empty() {
            return Err(SwinIrError::InvalidConfiguration {
                reason: "depths must contain at least one stage".to_owned(),
            });
        }
        if self.depths.len() != self.num_heads.len() {
            return Err(SwinIrError::InvalidConfiguration {
                reason: format!(
                    "depths ({}) and num_heads ({}) must have the same length",
                    self.depths.len(),
                    self.num_heads.len()
                ),
            });
        }
        if self.upscale == 0 {
            return Err(SwinIrError::InvalidConfiguration {
                reason: "upscale must be at least 1".to_owned(),
            });
        }

        let mean = if self.in_chans == 3 {
            Tensor::<B, 1>::from_floats(RGB_MEAN, device).reshape([1, 3, 1, 1])
        } else {
            Tensor::zeros([1, 1, 1, 1], device)
        };

        let patches_resolution = [
            self.img_size / self.patch_size,
            self.img_size / self.patch_size,
        ];

        let absolute_pos_embed = if self.ape {
            let num_patches = patches_resolution[0] * patches_resolution[1];
            Some(Param::from_tensor(trunc_normal(
                Tensor::zeros([1, num_patches, self.emb_size], device),
                0.0,
                0.02,
                -2.0,
                2.0,
            )))
        } else {
            None
        };

        let dpr = linspace(0.0, self.drop_path_rate, self.depths.iter().sum());

        let mut layers = Vec::with_capacity(self.depths.len());
        for (i, (&depth, &heads)) in self.depths.iter().zip(self.num_heads.iter()).enumerate() {
            let start: usize = self.depths[..i].iter().sum();
            let layer = RstbConfig::new(
                self.emb_size,
                patches_resolution,
                depth,
                heads,
                self.window_size,
            )
            .with_mlp_ratio(self.mlp_ratio)
            .with_qkv_bias(self.qkv_bias)
            .with_dropout(self.drop_rate)
            .with_attn_drop(self.attn_drop_rate)
            .with_drop_path(dpr[start..start + depth].to_vec())
            .with_resi_connection(self.resi_connection.clone())
            .with_training(self.training)
            .init(device)?;
            layers.push(layer);
        }

        let act = LeakyReluConfig::new()
            .with_negative_slope(LEAKY_RELU_SLOPE)
            .init();
        let head = if self.upscale > 1 {
            ReconstructionHead::Upscale(UpscaleHead {
                conv_before_upsample: conv3x3(self.emb_size, NUM_FEAT, device),
                act,
                upsample: UpsampleConfig::new(self.upscale, NUM_FEAT).init(device)?,
                conv_last: conv3x3(NUM_FEAT, self.in_chans, device),
            })
        } else {
            ReconstructionHead::Direct(DirectHead {
                conv_hr: conv3x3(self.emb_size, NUM_FEAT, device),
                act,
                conv_last: conv3x3(NUM_FEAT, self.in_chans, device),
            })
        };

        Ok(SwinIr {
            img_range: self.img_range,
            upscale: self.upscale,
            window_size: self.window_size,
            mean,
            conv_first: conv3x3(self.in_chans, self.emb_size, device),
            patch_embed: PatchEmbedConfig::new(self.emb_size)
                .with_patch_norm(self.patch_norm)
                .init(device),
            patch_unembed: PatchUnEmbedConfig::new(self.emb_size).init(),
            absolute_pos_embed,
            pos_drop: DropoutConfig::new(self.drop_rate).init(),
            layers,
            norm: LayerNormConfig::new(self.emb_size)
                .with_epsilon(NORM_EPSILON)
                .init(device),
            conv_after_body: ResidualConvConfig::new(
                self.emb_size,
                self.resi_connection.clone(),
            )
            .init(device),
            head,
        })
    }
}

/// Reconstruction tail for magnifying models: pre-upsample convolution,
/// sub-pixel upsampling, final projection.
#[derive(Module, Debug)]
pub struct UpscaleHead<B: Backend> {
    conv_before_upsample: Conv2d<B>,
    act: LeakyRelu,
    upsample: Upsample<B>,
    conv_last: Conv2d<B>,
}

/// Reconstruction tail for `upscale == 1`: a two-convolution refinement
/// residually added to the network input.
#[derive(Module, Debug)]
pub struct DirectHead<B: Backend> {
    conv_hr: Conv2d<B>,
    act: LeakyRelu,
    conv_last: Conv2d<B>,
}

#[derive(Module, Debug)]
pub enum ReconstructionHead<B: Backend> {
    Upscale(UpscaleHead<B>),
    Direct(DirectHead<B>),
}

/// The SwinIR model.
///
/// The ownership tree is strict containment: the model owns the RSTB list,
/// each RSTB owns one [`super::modules::BasicLayer`] plus its convolution
/// and patch reshapes, and each block owns one attention and one MLP module.
#[derive(Module, Debug)]
pub struct SwinIr<B: Backend> {
    img_range: f64,
    upscale: usize,
    window_size: usize,
    mean: Tensor<B, 4>,
    conv_first: Conv2d<B>,
    patch_embed: PatchEmbed<B>,
    patch_unembed: PatchUnEmbed<B>,
    absolute_pos_embed: Option<Param<Tensor<B, 3>>>,
    pos_drop: Dropout,
    layers: Vec<Rstb<B>>,
    norm: LayerNorm<B>,
    conv_after_body: ResidualConv<B>,
    head: ReconstructionHead<B>,
}

impl<B: Backend> SwinIr<B> {
    /// Output magnification factor.
    pub fn upscale(&self) -> usize {
        self.upscale
    }

    /// Runs the transformer body on stem features.
    fn forward_features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let x_size = (h, w);

        let x = self.patch_embed.forward(x);
        let x = match &self.absolute_pos_embed {
            Some(pos_embed) => x + pos_embed.val(),
            None => x,
        };
        let mut x = self.pos_drop.forward(x);

        for layer in &self.layers {
            x = layer.forward(x, x_size);
        }
        let x = self.norm.forward(x);

        self.patch_unembed.forward(x, x_size)
    }

    /// Maps a low-resolution image to a higher-resolution one.
    ///
    /// # Shapes
    /// - input: `[batch_size, in_chans, height, width]`, any `height`,
    ///   `width >= 1`
    /// - output: `[batch_size, in_chans, height * upscale, width * upscale]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let x = self.pad_to_window_multiple(x);
        let x = (x - self.mean.clone()).mul_scalar(self.img_range);

        let x = match &self.head {
            ReconstructionHead::Upscale(head) => {
                let x = self.conv_first.forward(x);
                let x = self.conv_after_body.forward(self.forward_features(x.clone())) + x;
                let x = head.act.forward(head.conv_before_upsample.forward(x));
                head.conv_last.forward(head.upsample.forward(x))
            }
            ReconstructionHead::Direct(head) => {
                let first = self.conv_first.forward(x.clone());
                let res =
                    self.conv_after_body.forward(self.forward_features(first.clone())) + first;
                x + head.conv_last.forward(head.act.forward(head.conv_hr.forward(res)))
            }
        };

        let x = x.div_scalar(self.img_range) + self.mean.clone();

        let [b, c, _, _] = x.dims();
        x.slice([0..b, 0..c, 0..h * self.upscale, 0..w * self.upscale])
    }

    fn pad_to_window_multiple(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = x.dims();
        let pad_bottom = (self.window_size - h % self.window_size) % self.window_size;
        let pad_right = (self.window_size - w % self.window_size) % self.window_size;

        reflect_pad_2d(x, pad_bottom, pad_right)
    }
}

/// SwinIR for classical super-resolution: embedding width 180, four
/// six-block stages, `3conv` residual paths, intensity range 255.
///
/// # Errors
/// Returns an error for unsupported `upscale` factors.
pub fn swinir_classical_sr<B: Backend>(
    upscale: usize,
    device: &Device<B>,
) -> SwinIrResult<SwinIr<B>> {
    SwinIrConfig::new()
        .with_img_size(256)
        .with_emb_size(180)
        .with_depths(vec![6, 6, 6, 6])
        .with_num_heads(vec![6, 6, 6, 6])
        .with_window_size(4)
        .with_img_range(255.0)
        .with_resi_connection(ResiConnection::ThreeConv)
        .with_upscale(upscale)
        .init(device)
}

/// Lightweight SwinIR: embedding width 60, `1conv` residual paths.
///
/// # Errors
/// Returns an error for unsupported `upscale` factors.
pub fn swinir_lightweight_sr<B: Backend>(
    upscale: usize,
    device: &Device<B>,
) -> SwinIrResult<SwinIr<B>> {
    SwinIrConfig::new()
        .with_emb_size(60)
        .with_depths(vec![6, 6, 6, 6])
        .with_num_heads(vec![6, 6, 6, 6])
        .with_window_size(8)
        .with_resi_connection(ResiConnection::OneConv)
        .with_upscale(upscale)
        .init(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::tensor::Distribution;
    use rstest::rstest;

    fn tiny_config() -> SwinIrConfig {
        SwinIrConfig::new()
            .with_img_size(8)
            .with_emb_size(12)
            .with_depths(vec![2])
            .with_num_heads(vec![2])
            .with_window_size(4)
            .with_mlp_ratio(2.0)
            .with_resi_connection(ResiConnection::OneConv)
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(4)]
    fn output_has_upscaled_shape(#[case] upscale: usize) {
        let device = Default::default();
        let model = tiny_config()
            .with_upscale(upscale)
            .init::<TestBackend>(&device)
            .unwrap();

        // 10x7 is not a window multiple: exercises padding and cropping.
        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 10, 7],
            Distribution::Default,
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [1, 3, 10 * upscale, 7 * upscale]);
    }

    #[test]
    fn degenerate_one_pixel_input_upscales() {
        let device = Default::default();
        let model = tiny_config()
            .with_upscale(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 1, 1],
            Distribution::Default,
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [1, 3, 2, 2]);
    }

    #[test]
    fn grayscale_channels_are_supported() {
        let device = Default::default();
        let model = tiny_config()
            .with_in_chans(1)
            .with_upscale(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 1, 6, 6],
            Distribution::Default,
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 1, 12, 12]);
    }

    #[test]
    fn absolute_position_embedding_is_applied_at_native_size() {
        let device = Default::default();
        let model = tiny_config()
            .with_ape(true)
            .with_upscale(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 8, 8],
            Distribution::Default,
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [1, 3, 16, 16]);
    }

    #[test]
    fn evaluation_forward_is_deterministic() {
        let device = Default::default();
        let model = tiny_config()
            .with_upscale(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 9, 5],
            Distribution::Default,
            &device,
        );
        let a = model.forward(input.clone());
        let b = model.forward(input);
        a.to_data().assert_eq(&b.to_data(), false);
    }

    #[test]
    fn mismatched_stage_parameters_are_rejected() {
        let device = Default::default();
        let result = tiny_config()
            .with_depths(vec![2, 2])
            .with_num_heads(vec![2])
            .init::<TestBackend>(&device);
        assert!(matches!(
            result,
            Err(SwinIrError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn unsupported_upscale_is_rejected() {
        let device = Default::default();
        let result = tiny_config().with_upscale(5).init::<TestBackend>(&device);
        assert!(matches!(result, Err(SwinIrError::UnsupportedScale { scale: 5 })));
    }

    #[test]
    fn img_range_normalization_round_trips() {
        let device = Default::default();
        let model = tiny_config()
            .with_img_range(255.0)
            .with_upscale(2)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 8, 8],
            Distribution::Uniform(0.0, 255.0),
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [1, 3, 16, 16]);
        // Finite output: the de-normalization restored the working range.
        assert!(output.abs().max().into_scalar().is_finite());
    }
}
