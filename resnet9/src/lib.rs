//! ResNet9 for small-resolution image classification, built on `tch`.
//!
//! The network picks one of three layer topologies from the input resolution
//! (8x8, 16x16 or 32x32) and exposes the step helpers an external training loop
//! drives: training loss, validation loss/accuracy and epoch aggregation.

mod activations;
mod blocks;
pub mod config;
mod error;
mod network;
pub mod prelude;
mod recorder;
mod steps;
mod utils;

pub use crate::activations::{mish, Mish};
pub use crate::blocks::conv_block;
pub use crate::config::{ImSize, ResNet9Config};
pub use crate::error::{Error, Result};
pub use crate::network::{ResNet9, EMBEDDING_DIM};
pub use crate::recorder::EmbeddingRecorder;
pub use crate::steps::{
    accuracy, cross_entropy, format_epoch, Batch, EpochResult, ImageClassification,
    ValidationResult, ValidationStep,
};
pub use crate::utils::{git_hash, git_hash_at, save, save_str, train_dir};
