//! Image processing utilities for SwinIR inference.

mod image_ops;

pub use image_ops::{
    dynamic_image_to_tensor, is_supported_image_format, load_image, save_image,
    tensor_to_dynamic_image, ImageError, ImageResult,
};

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}
