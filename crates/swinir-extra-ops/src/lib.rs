//! Tensor operations used by SwinIR that are not part of the core Burn
//! framework: stochastic depth, sub-pixel convolution (pixel shuffle),
//! reflection padding, and truncated-normal weight initialization.

mod drop_path;
mod erfinv;
mod pixel_shuffle;
mod reflect_pad;
mod trunc_normal;

pub use drop_path::{DropPath, DropPathConfig};
pub use erfinv::{erfinv, Erfinv};
pub use pixel_shuffle::pixel_shuffle;
pub use reflect_pad::reflect_pad_2d;
pub use trunc_normal::trunc_normal;

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}
