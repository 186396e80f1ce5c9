pub use crate::config::{ImSize, ResNet9Config};
pub use crate::network::ResNet9;
pub use crate::steps::{Batch, EpochResult, ImageClassification, ValidationResult, ValidationStep};
pub use crate::utils::{git_hash, save, save_str, train_dir};
