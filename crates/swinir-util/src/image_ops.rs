//! Conversions between image files and the `[1, 3, H, W]` tensors the model
//! consumes, with values in `[0, 1]`.

use std::path::Path;

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{DynamicImage, ImageBuffer, Rgb};
use thiserror::Error;

/// Errors for image loading, conversion, and saving.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to open image at '{path}': {source}")]
    ImageLoadFailed {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to save image to '{path}': {source}")]
    ImageSaveFailed {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to convert tensor to data: {reason}")]
    TensorConversionFailed { reason: String },

    #[error("batch size mismatch: expected 1, got {actual}")]
    InvalidBatchSize { actual: usize },

    #[error("invalid channel count: expected 3, got {actual}")]
    InvalidChannelCount { actual: usize },

    #[error("failed to create image buffer from {width}x{height} tensor data")]
    BufferCreationFailed { width: usize, height: usize },
}

/// Result type alias for image operations.
pub type ImageResult<T> = Result<T, ImageError>;

/// Returns whether the file extension names a format the pipeline reads.
pub fn is_supported_image_format(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "png" | "jpg" | "jpeg" | "bmp"
            )
        })
}

/// Loads an image file into a `[1, 3, height, width]` tensor in `[0, 1]`.
///
/// # Errors
/// Returns [`ImageError::ImageLoadFailed`] when the file cannot be opened or
/// decoded.
pub fn load_image<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> ImageResult<Tensor<B, 4>> {
    let path_str = path.as_ref().display().to_string();
    let img = image::open(&path).map_err(|source| ImageError::ImageLoadFailed {
        path: path_str,
        source,
    })?;

    Ok(dynamic_image_to_tensor(img, device))
}

/// Converts a decoded image into a `[1, 3, height, width]` tensor in `[0, 1]`.
pub fn dynamic_image_to_tensor<B: Backend>(
    img: DynamicImage,
    device: &B::Device,
) -> Tensor<B, 4> {
    let rgb = img.into_rgb32f();
    let (width, height) = rgb.dimensions();
    let buf = rgb.into_raw();

    let data = TensorData::new(buf, [height as usize, width as usize, 3]);
    Tensor::<B, 3>::from_data(data, device)
        .permute([2, 0, 1])
        .unsqueeze::<4>()
}

/// Converts a `[1, 3, height, width]` tensor into an 8-bit RGB image,
/// clamping values to `[0, 1]`.
///
/// # Errors
/// Returns an error when the tensor is not a single 3-channel image or its
/// data cannot be read back from the backend.
pub fn tensor_to_dynamic_image<B: Backend>(tensor: Tensor<B, 4>) -> ImageResult<DynamicImage> {
    let [batch, channels, height, width] = tensor.dims();
    if batch != 1 {
        return Err(ImageError::InvalidBatchSize { actual: batch });
    }
    if channels != 3 {
        return Err(ImageError::InvalidChannelCount { actual: channels });
    }

    let hwc = tensor.clamp(0.0, 1.0).permute([0, 2, 3, 1]);
    let values = hwc
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ImageError::TensorConversionFailed {
            reason: format!("{e:?}"),
        })?;

    let buffer = ImageBuffer::<Rgb<f32>, _>::from_raw(width as u32, height as u32, values)
        .ok_or(ImageError::BufferCreationFailed { width, height })?;

    Ok(DynamicImage::ImageRgb32F(buffer).to_rgb8().into())
}

/// Saves a `[1, 3, height, width]` tensor as an image file.
///
/// # Errors
/// Propagates conversion failures and encoding errors.
pub fn save_image<B: Backend, P: AsRef<Path>>(tensor: Tensor<B, 4>, path: P) -> ImageResult<()> {
    let img = tensor_to_dynamic_image(tensor)?;
    let path_str = path.as_ref().display().to_string();
    img.save(&path).map_err(|source| ImageError::ImageSaveFailed {
        path: path_str,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn image_to_tensor_round_trip_preserves_pixels() {
        let device = Default::default();
        let mut img = image::RgbImage::new(4, 2);
        for (i, pixel) in img.pixels_mut().enumerate() {
            *pixel = Rgb([(i * 8) as u8, 255 - (i * 8) as u8, 128]);
        }
        let img = DynamicImage::ImageRgb8(img);

        let tensor = dynamic_image_to_tensor::<TestBackend>(img.clone(), &device);
        assert_eq!(tensor.dims(), [1, 3, 2, 4]);

        let restored = tensor_to_dynamic_image(tensor).unwrap();
        assert_eq!(restored.to_rgb8().as_raw(), img.to_rgb8().as_raw());
    }

    #[test]
    fn rejects_batched_tensors() {
        let device = Default::default();
        let tensor = burn::tensor::Tensor::<TestBackend, 4>::zeros([2, 3, 4, 4], &device);
        assert!(matches!(
            tensor_to_dynamic_image(tensor),
            Err(ImageError::InvalidBatchSize { actual: 2 })
        ));
    }

    #[test]
    fn recognizes_supported_extensions() {
        assert!(is_supported_image_format(Path::new("photo.PNG")));
        assert!(is_supported_image_format(Path::new("photo.jpeg")));
        assert!(!is_supported_image_format(Path::new("notes.txt")));
        assert!(!is_supported_image_format(Path::new("no_extension")));
    }
}
