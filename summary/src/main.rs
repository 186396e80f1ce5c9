mod config;

use crate::config::SummaryConfig;
use indicatif::{ProgressBar, ProgressStyle};
use resnet9::prelude::*;
use serde::Serialize;
use std::env;
use tch::{nn::VarStore, Device, Kind, Tensor};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct Summary {
    im_size: (i64, i64),
    num_parameters: i64,
    variables: Vec<(String, Vec<i64>)>,
    train_loss: f64,
    validation: ValidationResult,
}

fn synthetic_batch(cfg: &SummaryConfig, device: Device) -> resnet9::Result<Batch> {
    let (h, w) = cfg.model.im_size.dims();
    let dims = [cfg.batch_size, cfg.model.in_channels, h, w];
    let images = Tensor::randn(&dims, (Kind::Float, device));
    let labels = Tensor::randint(cfg.model.num_classes, &[cfg.batch_size], (Kind::Int64, device));
    Batch::new(images, labels)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let cfg = match args.get(1) {
        Some(path) => SummaryConfig::load(path)?,
        None => SummaryConfig::default(),
    };

    tch::manual_seed(cfg.seed as i64);
    let device = if cfg.cuda {
        Device::cuda_if_available()
    } else {
        Device::Cpu
    };

    let logs = train_dir(&cfg.logs, "resnet9")?;
    save(&logs, "cfg.json", &cfg)?;
    match git_hash() {
        Ok(hash) => save_str(&logs, "git_hash", &hash)?,
        Err(err) => warn!("could not read git hash: {}", err),
    }

    let vs = VarStore::new(device);
    let net = ResNet9::new(&vs.root(), &cfg.model);

    let mut variables: Vec<(String, Vec<i64>)> = vs
        .variables()
        .into_iter()
        .map(|(name, t)| (name, t.size()))
        .collect();
    variables.sort();
    let num_parameters = vs
        .trainable_variables()
        .iter()
        .map(|t| t.size().iter().product::<i64>())
        .sum::<i64>();
    for (name, size) in &variables {
        println!("{:<24} {:?}", name, size);
    }
    info!(num_parameters, ?device, "built resnet9");

    let bar = ProgressBar::new(cfg.num_batches as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {percent}% {pos}/{len} {per_sec} {elapsed_precise}")
            .progress_chars("|| "),
    );
    let mut train_loss = 0.0;
    let mut steps = Vec::with_capacity(cfg.num_batches);
    for _ in 0..cfg.num_batches {
        let batch = synthetic_batch(&cfg, device)?;
        train_loss += f64::from(&net.training_step(&batch)?.detach());
        steps.push(net.validation_step(&batch)?);
        bar.inc(1);
    }
    bar.finish();
    train_loss /= cfg.num_batches as f64;

    let validation = net.validation_epoch_end(&steps)?;
    println!(
        "train_loss: {:.4}, val_loss: {:.4}, val_acc: {:.4}",
        train_loss, validation.val_loss, validation.val_acc
    );

    save(
        &logs,
        "summary.json",
        &Summary {
            im_size: cfg.model.im_size.dims(),
            num_parameters,
            variables,
            train_loss,
            validation,
        },
    )?;
    info!("wrote {}", logs.display());
    Ok(())
}
