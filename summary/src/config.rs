use resnet9::ResNet9Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub seed: u64,
    pub logs: PathBuf,
    pub cuda: bool,

    // synthetic batches pushed through the network
    pub batch_size: i64,
    pub num_batches: usize,

    pub model: ResNet9Config,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            logs: PathBuf::from("./_logs"),
            cuda: false,
            batch_size: 32,
            num_batches: 8,
            model: ResNet9Config::default(),
        }
    }
}

impl SummaryConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&text)?;
        cfg.model.validate()?;
        if cfg.batch_size < 1 || cfg.num_batches == 0 {
            return Err("batch_size and num_batches must be positive".into());
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resnet9::ImSize;

    #[test]
    fn test_load_partial_config() {
        let path = std::env::temp_dir().join(format!("summary-cfg-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"num_batches": 2, "model": {"in_channels": 1, "im_size": [16, 16]}}"#).unwrap();
        let cfg = SummaryConfig::load(&path).unwrap();
        assert_eq!(cfg.num_batches, 2);
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.model.in_channels, 1);
        assert_eq!(cfg.model.im_size, ImSize::S16);

        std::fs::write(&path, r#"{"batch_size": 0}"#).unwrap();
        assert!(SummaryConfig::load(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
