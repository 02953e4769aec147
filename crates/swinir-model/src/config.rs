//! Shared configuration enums for the SwinIR model.

use burn::prelude::*;

/// Convolution style of the residual connection inside each RSTB and after
/// the network body.
///
/// The two variants differ only in capacity/depth, not in semantics.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ResiConnection {
    /// A single 3x3 convolution.
    OneConv,
    /// A three-layer bottleneck (`C -> C/4 -> C/4 -> C`) with leaky-ReLU
    /// activations between the convolutions.
    ThreeConv,
}
