//! Building blocks of the SwinIR network.

mod attention;
mod block;
mod conv;
mod embed;
mod layer;
mod mlp;
mod upsample;
mod windowing;

pub use attention::{calculate_mask, WindowAttention, WindowAttentionConfig};
pub use block::{SwinTransformerBlock, SwinTransformerBlockConfig};
pub use conv::{ResidualConv, ResidualConvConfig};
pub use embed::{PatchEmbed, PatchEmbedConfig, PatchUnEmbed, PatchUnEmbedConfig};
pub use layer::{BasicLayer, BasicLayerConfig, Rstb, RstbConfig};
pub use mlp::{Mlp, MlpConfig};
pub use upsample::{Upsample, UpsampleConfig};
pub use windowing::{window_partition, window_reverse};

pub(crate) use block::NORM_EPSILON;
pub(crate) use conv::{conv3x3, LEAKY_RELU_SLOPE};
