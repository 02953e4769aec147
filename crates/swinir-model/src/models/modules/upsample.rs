//! Sub-pixel convolution upsampling.

use burn::{nn::conv::Conv2d, prelude::*};
use swinir_extra_ops::pixel_shuffle;

use super::conv::conv3x3;
use crate::error::{SwinIrError, SwinIrResult};

/// Configuration for [`Upsample`].
#[derive(Config, Debug)]
pub struct UpsampleConfig {
    scale: usize,
    num_feat: usize,
}

impl UpsampleConfig {
    /// Initializes the upsampler.
    ///
    /// Power-of-two scales use `log2(scale)` rounds of
    /// {channel-expanding convolution, depth-to-space by 2}; scale 3 uses a
    /// single x9 expansion with depth-to-space by 3.
    ///
    /// # Errors
    /// Returns [`SwinIrError::UnsupportedScale`] for any other scale.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SwinIrResult<Upsample<B>> {
        if self.scale.is_power_of_two() {
            let convs = (0..self.scale.trailing_zeros())
                .map(|_| conv3x3(self.num_feat, 4 * self.num_feat, device))
                .collect();
            Ok(Upsample { convs, factor: 2 })
        } else if self.scale == 3 {
            Ok(Upsample {
                convs: vec![conv3x3(self.num_feat, 9 * self.num_feat, device)],
                factor: 3,
            })
        } else {
            Err(SwinIrError::UnsupportedScale { scale: self.scale })
        }
    }
}

/// Sub-pixel convolution ladder: each round expands channels by `factor^2`
/// and rearranges them into space.
#[derive(Module, Debug)]
pub struct Upsample<B: Backend> {
    convs: Vec<Conv2d<B>>,
    factor: usize,
}

impl<B: Backend> Upsample<B> {
    /// # Shapes
    /// - input: `[batch_size, num_feat, height, width]`
    /// - output: `[batch_size, num_feat, height * scale, width * scale]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        for conv in &self.convs {
            x = pixel_shuffle(conv.forward(x), self.factor);
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::tensor::Distribution;
    use rstest::rstest;

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(4)]
    #[case(8)]
    fn upsamples_by_scale(#[case] scale: usize) {
        let device = Default::default();
        let upsample = UpsampleConfig::new(scale, 8)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [1, 8, 6, 5],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = upsample.forward(input);
        assert_eq!(output.dims(), [1, 8, 6 * scale, 5 * scale]);
    }

    #[rstest]
    #[case(5)]
    #[case(6)]
    #[case(12)]
    fn rejects_unsupported_scales(#[case] scale: usize) {
        let device = Default::default();
        let result = UpsampleConfig::new(scale, 8).init::<TestBackend>(&device);
        assert!(matches!(
            result,
            Err(SwinIrError::UnsupportedScale { scale: s }) if s == scale
        ));
    }
}
