//! Reshaping between the spatial feature map and the flattened token
//! sequence the attention stages operate on.

use burn::{
    nn::{LayerNorm, LayerNormConfig},
    prelude::*,
};

use super::block::NORM_EPSILON;

/// Configuration for [`PatchEmbed`].
#[derive(Config, Debug)]
pub struct PatchEmbedConfig {
    emb_size: usize,
    /// Apply layer normalization to the flattened tokens.
    #[config(default = "false")]
    patch_norm: bool,
}

impl PatchEmbedConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PatchEmbed<B> {
        PatchEmbed {
            norm: self.patch_norm.then(|| {
                LayerNormConfig::new(self.emb_size)
                    .with_epsilon(NORM_EPSILON)
                    .init(device)
            }),
        }
    }
}

/// Flattens a spatial feature map into a token sequence, optionally
/// normalizing the result.
#[derive(Module, Debug)]
pub struct PatchEmbed<B: Backend> {
    norm: Option<LayerNorm<B>>,
}

impl<B: Backend> PatchEmbed<B> {
    /// # Shapes
    /// - input: `[batch_size, emb_size, height, width]`
    /// - output: `[batch_size, height * width, emb_size]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let x: Tensor<B, 3> = x.flatten(2, 3);
        let x = x.swap_dims(1, 2);

        match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        }
    }
}

/// Configuration for [`PatchUnEmbed`].
#[derive(Config, Debug)]
pub struct PatchUnEmbedConfig {
    emb_size: usize,
}

impl PatchUnEmbedConfig {
    pub fn init<B: Backend>(&self) -> PatchUnEmbed<B> {
        PatchUnEmbed {
            emb_size: self.emb_size,
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Restores the spatial feature map from a token sequence.
#[derive(Module, Debug)]
pub struct PatchUnEmbed<B: Backend> {
    emb_size: usize,
    _phantom: std::marker::PhantomData<B>,
}

impl<B: Backend> PatchUnEmbed<B> {
    /// # Shapes
    /// - input: `[batch_size, h * w, emb_size]` with `(h, w) = x_size`
    /// - output: `[batch_size, emb_size, h, w]`
    pub fn forward(&self, x: Tensor<B, 3>, x_size: (usize, usize)) -> Tensor<B, 4> {
        let [b, _, _] = x.dims();
        x.swap_dims(1, 2)
            .reshape([b, self.emb_size, x_size.0, x_size.1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::tensor::Distribution;

    #[test]
    fn embed_then_unembed_is_identity() {
        let device = Default::default();
        let embed = PatchEmbedConfig::new(12).init::<TestBackend>(&device);
        let unembed = PatchUnEmbedConfig::new(12).init::<TestBackend>();

        let input = Tensor::<TestBackend, 4>::random(
            [2, 12, 5, 7],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let tokens = embed.forward(input.clone());
        assert_eq!(tokens.dims(), [2, 35, 12]);

        let restored = unembed.forward(tokens, (5, 7));
        restored.to_data().assert_eq(&input.to_data(), false);
    }

    #[test]
    fn patch_norm_normalizes_tokens() {
        let device = Default::default();
        let embed = PatchEmbedConfig::new(8)
            .with_patch_norm(true)
            .init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::random(
            [1, 8, 4, 4],
            Distribution::Normal(3.0, 2.0),
            &device,
        );
        let tokens = embed.forward(input);
        assert_eq!(tokens.dims(), [1, 16, 8]);

        // Freshly initialized layer norm leaves tokens zero-mean.
        let means = tokens.mean_dim(2).to_data();
        for v in means.as_slice::<f32>().unwrap() {
            assert!(v.abs() < 1e-4);
        }
    }
}
