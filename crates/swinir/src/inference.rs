//! Runs SwinIR super-resolution over image files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use swinir_model::{swinir_classical_sr, swinir_lightweight_sr, SwinIr};
use swinir_util::{is_supported_image_format, load_image, save_image};

use crate::backend::{SelectedBackend, SelectedDevice};

/// Which preset to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSize {
    /// Classical SwinIR (embedding width 180).
    Classical,
    /// Lightweight SwinIR (embedding width 60).
    Lightweight,
}

/// Inference configuration.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Input path (file or directory).
    pub input_path: PathBuf,
    /// Output directory.
    pub output_path: PathBuf,
    /// Output magnification; a power of two or 3.
    pub upscale: usize,
    /// Model preset.
    pub model_size: ModelSize,
    /// Optional Burn record with trained weights. Without it the model runs
    /// with freshly initialized parameters.
    pub weights: Option<PathBuf>,
}

/// Runs super-resolution on an image or a directory of images.
///
/// Each input is loaded to a `[1, 3, H, W]` tensor, mapped through the
/// network, and written to the output directory with an `_x{scale}` suffix.
///
/// # Errors
///
/// Returns an error if model construction or weight loading fails, the
/// input path does not exist, or an image fails to process.
pub fn run_inference(config: &InferenceConfig, device: &SelectedDevice) -> Result<()> {
    tracing::info!(
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        upscale = config.upscale,
        "running super-resolution",
    );

    let model = match config.model_size {
        ModelSize::Classical => swinir_classical_sr::<SelectedBackend>(config.upscale, device)?,
        ModelSize::Lightweight => {
            swinir_lightweight_sr::<SelectedBackend>(config.upscale, device)?
        }
    };

    let model = match &config.weights {
        Some(weights) => {
            tracing::info!(path = %weights.display(), "loading weights");
            let record = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
                .load(weights.clone(), device)?;
            model.load_record(record)
        }
        None => {
            tracing::warn!("no weights supplied; using randomly initialized parameters");
            model
        }
    };

    fs::create_dir_all(&config.output_path)?;

    if config.input_path.is_file() {
        process_image(&model, &config.input_path, &config.output_path, device)?;
    } else if config.input_path.is_dir() {
        process_directory(&model, &config.input_path, &config.output_path, device)?;
    } else {
        anyhow::bail!("input path does not exist: {}", config.input_path.display());
    }

    tracing::info!("super-resolution completed");
    Ok(())
}

fn process_directory(
    model: &SwinIr<SelectedBackend>,
    input_dir: &Path,
    output_dir: &Path,
    device: &SelectedDevice,
) -> Result<()> {
    let mut processed = 0_usize;
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image_format(&path) {
            process_image(model, &path, output_dir, device)?;
            processed += 1;
        }
    }

    if processed == 0 {
        anyhow::bail!("no supported images found in {}", input_dir.display());
    }
    tracing::info!(count = processed, "directory processed");
    Ok(())
}

fn process_image(
    model: &SwinIr<SelectedBackend>,
    input_path: &Path,
    output_dir: &Path,
    device: &SelectedDevice,
) -> Result<()> {
    tracing::info!(path = %input_path.display(), "processing image");

    let input = load_image::<SelectedBackend, _>(input_path, device)?;
    let output = model.forward(input);

    let output_path = output_dir.join(output_file_name(input_path, model.upscale()));
    save_image(output, &output_path)?;

    tracing::info!(path = %output_path.display(), "image written");
    Ok(())
}

/// `photo.png` upscaled by 4 becomes `photo_x4.png`.
fn output_file_name(input_path: &Path, upscale: usize) -> String {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    format!("{stem}_x{upscale}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_carries_scale_suffix() {
        assert_eq!(output_file_name(Path::new("dir/photo.png"), 4), "photo_x4.png");
        assert_eq!(output_file_name(Path::new("img.jpeg"), 2), "img_x2.png");
    }
}
