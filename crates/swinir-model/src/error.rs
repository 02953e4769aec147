use thiserror::Error;

/// The error type for SwinIR model construction.
///
/// Every validated condition is a construction-time contract check; there is
/// no recoverable forward-time error. A violation aborts model construction
/// before any forward pass can execute.
#[derive(Error, Debug)]
pub enum SwinIrError {
    /// The configuration parameters are logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// The upsampler only supports power-of-two and factor-3 scales.
    #[error("Unsupported upscale factor: {scale}. Supported scales: 2^n and 3.")]
    UnsupportedScale {
        /// The rejected scale factor.
        scale: usize,
    },
}

/// Result type alias for SwinIR operations.
pub type SwinIrResult<T> = Result<T, SwinIrError>;
