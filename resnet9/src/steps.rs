use crate::error::{shape, Error, Result};
use crate::network::ResNet9;
use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};
use tracing::trace;

/// Images `(N, C, H, W)` with their integer class labels `(N)`.
#[derive(Debug)]
pub struct Batch {
    images: Tensor,
    labels: Tensor,
}

impl Batch {
    pub fn new(images: Tensor, labels: Tensor) -> Result<Self> {
        let n = images.size().first().copied().unwrap_or(0);
        if labels.size() != [n] {
            return Err(shape(format!(
                "expected {} labels, got shape {:?}",
                n,
                labels.size()
            )));
        }
        Ok(Self {
            images: images.to_kind(Kind::Float),
            labels: labels.to_kind(Kind::Int64),
        })
    }

    pub fn images(&self) -> &Tensor {
        &self.images
    }

    pub fn labels(&self) -> &Tensor {
        &self.labels
    }

    pub fn len(&self) -> i64 {
        self.labels.size().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_device(&self, device: Device) -> (Tensor, Tensor) {
        (self.images.to_device(device), self.labels.to_device(device))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationStep {
    pub val_loss: f64,
    pub val_acc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub val_loss: f64,
    pub val_acc: f64,
}

impl ValidationResult {
    /// Unweighted mean over batches.
    pub fn mean(outputs: &[ValidationStep]) -> Result<Self> {
        if outputs.is_empty() {
            return Err(Error::EmptyEpoch);
        }
        let n = outputs.len() as f64;
        Ok(Self {
            val_loss: outputs.iter().map(|o| o.val_loss).sum::<f64>() / n,
            val_acc: outputs.iter().map(|o| o.val_acc).sum::<f64>() / n,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochResult {
    pub lrs: Vec<f64>,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_acc: f64,
}

impl EpochResult {
    pub fn new(lrs: Vec<f64>, train_loss: f64, validation: ValidationResult) -> Self {
        Self {
            lrs,
            train_loss,
            val_loss: validation.val_loss,
            val_acc: validation.val_acc,
        }
    }
}

/// Fraction of rows whose highest logit is the label.
pub fn accuracy(logits: &Tensor, labels: &Tensor) -> Result<f64> {
    let n = labels.size();
    if n.len() != 1 || n[0] == 0 || logits.size().first() != n.first() {
        return Err(shape(format!(
            "cannot score logits {:?} against labels {:?}",
            logits.size(),
            n
        )));
    }
    Ok(logits.accuracy_for_logits(labels).f_double_value(&[])?)
}

/// Mean cross entropy of `(N, classes)` logits against labels in `0..classes`.
pub fn cross_entropy(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let (size, n) = (logits.size(), labels.size());
    let classes = match (size.as_slice(), n.as_slice()) {
        (&[rows, classes], &[len]) if rows == len && len > 0 => classes,
        _ => {
            return Err(shape(format!(
                "cannot score logits {:?} against labels {:?}",
                size, n
            )))
        }
    };
    let lo = labels.f_min()?.f_int64_value(&[])?;
    let hi = labels.f_max()?.f_int64_value(&[])?;
    if lo < 0 || hi >= classes {
        return Err(shape(format!(
            "labels must lie in 0..{}, got range {}..={}",
            classes, lo, hi
        )));
    }
    Ok(logits.cross_entropy_for_logits(labels))
}

pub fn format_epoch(epoch: usize, result: &EpochResult) -> Result<String> {
    let last_lr = result.lrs.last().ok_or(Error::MissingLearningRate)?;
    Ok(format!(
        "Epoch [{}], last_lr: {:.5}, train_loss: {:.4}, val_loss: {:.4}, val_acc: {:.4}",
        epoch, last_lr, result.train_loss, result.val_loss, result.val_acc
    ))
}

/// Step helpers an external training loop drives.
pub trait ImageClassification {
    fn device(&self) -> Device;
    fn forward_with_embedding(&self, xs: &Tensor, train: bool) -> Result<(Tensor, Tensor)>;

    /// Mean cross entropy in train mode, still attached to the graph.
    fn training_step(&self, batch: &Batch) -> Result<Tensor> {
        let (images, labels) = batch.to_device(self.device());
        let (logits, _) = self.forward_with_embedding(&images, true)?;
        let loss = cross_entropy(&logits, &labels)?;
        trace!("training step over {} images", batch.len());
        Ok(loss)
    }

    fn embedding(&self, batch: &Batch) -> Result<Tensor> {
        let (images, _) = batch.to_device(self.device());
        let (_, embedding) = tch::no_grad(|| self.forward_with_embedding(&images, false))?;
        Ok(embedding)
    }

    fn validation_step(&self, batch: &Batch) -> Result<ValidationStep> {
        let (images, labels) = batch.to_device(self.device());
        let (logits, _) = tch::no_grad(|| self.forward_with_embedding(&images, false))?;
        let val_loss = cross_entropy(&logits, &labels)?
            .detach()
            .f_double_value(&[])?;
        let val_acc = accuracy(&logits, &labels)?;
        trace!(val_loss, val_acc, "validation step");
        Ok(ValidationStep { val_loss, val_acc })
    }

    fn validation_epoch_end(&self, outputs: &[ValidationStep]) -> Result<ValidationResult> {
        ValidationResult::mean(outputs)
    }

    fn epoch_end(&self, epoch: usize, result: &EpochResult) -> Result<()> {
        println!("{}", format_epoch(epoch, result)?);
        Ok(())
    }
}

impl ImageClassification for ResNet9 {
    fn device(&self) -> Device {
        ResNet9::device(self)
    }

    fn forward_with_embedding(&self, xs: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        ResNet9::forward_with_embedding(self, xs, train)
    }
}
