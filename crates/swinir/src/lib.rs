//! User-facing SwinIR crate: backend selection and the inference pipeline.

pub mod backend;
pub mod inference;

pub use inference::{run_inference, InferenceConfig, ModelSize};
