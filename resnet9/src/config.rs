use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Input resolutions the network has a topology for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(i64, i64)", into = "(i64, i64)")]
pub enum ImSize {
    S32,
    S16,
    S8,
}

impl ImSize {
    pub fn side(&self) -> i64 {
        match self {
            Self::S32 => 32,
            Self::S16 => 16,
            Self::S8 => 8,
        }
    }

    pub fn dims(&self) -> (i64, i64) {
        (self.side(), self.side())
    }
}

impl TryFrom<(i64, i64)> for ImSize {
    type Error = Error;

    fn try_from((h, w): (i64, i64)) -> Result<Self> {
        match (h, w) {
            (32, 32) => Ok(Self::S32),
            (16, 16) => Ok(Self::S16),
            (8, 8) => Ok(Self::S8),
            _ => Err(Error::UnsupportedImageSize(h, w)),
        }
    }
}

impl From<ImSize> for (i64, i64) {
    fn from(im_size: ImSize) -> Self {
        im_size.dims()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResNet9Config {
    pub in_channels: i64,
    pub num_classes: i64,
    pub im_size: ImSize,
    // keep a detached copy of the last embedding
    pub record_embedding: bool,
    // run everything before the classifier without gradient tracking
    pub no_grad: bool,
}

impl Default for ResNet9Config {
    fn default() -> Self {
        Self {
            in_channels: 3,
            num_classes: 10,
            im_size: ImSize::S32,
            record_embedding: false,
            no_grad: false,
        }
    }
}

impl ResNet9Config {
    pub fn new(in_channels: i64, num_classes: i64, im_size: (i64, i64)) -> Result<Self> {
        let cfg = Self {
            in_channels,
            num_classes,
            im_size: ImSize::try_from(im_size)?,
            ..Default::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_record_embedding(mut self, record_embedding: bool) -> Self {
        self.record_embedding = record_embedding;
        self
    }

    pub fn with_no_grad(mut self, no_grad: bool) -> Self {
        self.no_grad = no_grad;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.in_channels < 1 {
            return Err(Error::InvalidConfig(format!(
                "in_channels must be positive, got {}",
                self.in_channels
            )));
        }
        if self.num_classes < 1 {
            return Err(Error::InvalidConfig(format!(
                "num_classes must be positive, got {}",
                self.num_classes
            )));
        }
        Ok(())
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
