//! Feed-forward network of a Swin transformer block.

use burn::{
    nn::{Dropout, DropoutConfig, Gelu, Linear, LinearConfig},
    prelude::*,
};

/// Configuration for the transformer feed-forward network.
///
/// Two linear layers around a GELU, with dropout after each projection.
#[derive(Config, Debug)]
pub struct MlpConfig {
    emb_size: usize,
    hidden_size: usize,
    #[config(default = "0.0")]
    dropout: f64,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Mlp<B> {
        Mlp {
            fc1: LinearConfig::new(self.emb_size, self.hidden_size).init(device),
            act: Gelu::new(),
            fc2: LinearConfig::new(self.hidden_size, self.emb_size).init(device),
            drop: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// `Linear -> GELU -> Dropout -> Linear -> Dropout`.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    fc1: Linear<B>,
    act: Gelu,
    fc2: Linear<B>,
    drop: Dropout,
}

impl<B: Backend> Mlp<B> {
    /// # Shapes
    /// - input: `[batch_size, tokens, emb_size]`
    /// - output: `[batch_size, tokens, emb_size]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.fc1.forward(x);
        let x = self.act.forward(x);
        let x = self.drop.forward(x);
        let x = self.fc2.forward(x);

        self.drop.forward(x)
    }
}
