//! # SwinIR-Burn
//!
//! A Rust implementation of the SwinIR image super-resolution network built
//! on the Burn deep learning framework.
//!
//! SwinIR maps a low-resolution image to a higher-resolution one by
//! extracting shallow features with a convolutional stem, refining them
//! through stacked shifted-window attention groups (RSTBs), and upsampling
//! with sub-pixel convolution.
//!
//! ## Modules
//!
//! - `config`: shared configuration enums.
//! - `error`: the crate's error types.
//! - `models`: the network and all of its sub-modules (windowing,
//!   window attention, Swin blocks, residual groups, upsampler).
//!
//! ## Key components
//!
//! - [`SwinIr`]: the top-level model.
//! - [`SwinIrConfig`]: configuration struct driving model construction.
//! - [`SwinIrError`]: the enum for all construction-time contract violations.

mod config;
mod error;
mod models;

#[doc(inline)]
pub use config::ResiConnection;
#[doc(inline)]
pub use error::{SwinIrError, SwinIrResult};
#[doc(inline)]
pub use models::{
    swinir_classical_sr, swinir_lightweight_sr, SwinIr, SwinIrConfig, SwinIrRecord,
};
pub use models::modules;

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}
