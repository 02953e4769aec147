//! Convolutional residual refinement used inside each RSTB and after the
//! network body.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        LeakyRelu, LeakyReluConfig, PaddingConfig2d,
    },
    prelude::*,
};

use crate::config::ResiConnection;

/// Negative slope of every leaky-ReLU in the network.
pub(crate) const LEAKY_RELU_SLOPE: f64 = 0.2;

pub(crate) fn conv3x3<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    device: &Device<B>,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_padding(PaddingConfig2d::Same)
        .init(device)
}

/// Configuration for [`ResidualConv`].
#[derive(Config, Debug)]
pub struct ResidualConvConfig {
    emb_size: usize,
    style: ResiConnection,
}

impl ResidualConvConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ResidualConv<B> {
        match self.style {
            ResiConnection::OneConv => ResidualConv::Single(conv3x3(self.emb_size, self.emb_size, device)),
            ResiConnection::ThreeConv => ResidualConv::Bottleneck(ConvBottleneck {
                reduce: conv3x3(self.emb_size, self.emb_size / 4, device),
                refine: conv3x3(self.emb_size / 4, self.emb_size / 4, device),
                expand: conv3x3(self.emb_size / 4, self.emb_size, device),
                act: LeakyReluConfig::new()
                    .with_negative_slope(LEAKY_RELU_SLOPE)
                    .init(),
            }),
        }
    }
}

/// Either a single 3x3 convolution or a leaky-ReLU bottleneck; the choice
/// trades capacity against parameter count with no semantic difference.
#[derive(Module, Debug)]
pub enum ResidualConv<B: Backend> {
    Single(Conv2d<B>),
    Bottleneck(ConvBottleneck<B>),
}

/// `C -> C/4 -> C/4 -> C` with leaky-ReLU between the convolutions.
#[derive(Module, Debug)]
pub struct ConvBottleneck<B: Backend> {
    reduce: Conv2d<B>,
    refine: Conv2d<B>,
    expand: Conv2d<B>,
    act: LeakyRelu,
}

impl<B: Backend> ResidualConv<B> {
    /// # Shapes
    /// - input: `[batch_size, emb_size, height, width]`
    /// - output: same as input
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Single(conv) => conv.forward(x),
            Self::Bottleneck(b) => {
                let x = b.act.forward(b.reduce.forward(x));
                let x = b.act.forward(b.refine.forward(x));
                b.expand.forward(x)
            }
        }
    }
}
