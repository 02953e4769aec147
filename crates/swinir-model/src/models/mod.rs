pub mod modules;
mod swinir;

pub use swinir::{
    swinir_classical_sr, swinir_lightweight_sr, SwinIr, SwinIrConfig, SwinIrRecord,
};
