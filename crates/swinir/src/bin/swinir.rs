use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use swinir::{
    backend::{backend_name, create_device},
    inference::{run_inference, InferenceConfig, ModelSize},
};

#[derive(Parser)]
#[command(name = "swinir")]
#[command(about = "SwinIR: image super-resolution using shifted-window attention")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upscale an image or a directory of images
    Upscale {
        /// Input image path or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for results
        #[arg(short, long)]
        output: PathBuf,

        /// Upscale factor (a power of two, or 3)
        #[arg(short, long, default_value_t = 4)]
        scale: usize,

        /// Use the lightweight model preset
        #[arg(long)]
        lightweight: bool,

        /// Path to a Burn record with trained weights
        #[arg(short, long)]
        weights: Option<PathBuf>,
    },

    /// Show backend information
    Info,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let device = create_device();

    match cli.command {
        Commands::Upscale {
            input,
            output,
            scale,
            lightweight,
            weights,
        } => {
            let config = InferenceConfig {
                input_path: input,
                output_path: output,
                upscale: scale,
                model_size: if lightweight {
                    ModelSize::Lightweight
                } else {
                    ModelSize::Classical
                },
                weights,
            };
            run_inference(&config, &device)
        }
        Commands::Info => {
            println!("Backend: {}", backend_name());
            Ok(())
        }
    }
}
