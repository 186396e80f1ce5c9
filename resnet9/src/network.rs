use crate::blocks::conv_block;
use crate::config::{ImSize, ResNet9Config};
use crate::error::{shape, Result};
use crate::recorder::EmbeddingRecorder;
use tch::{
    nn::{self, ModuleT},
    Device, Tensor,
};
use tracing::debug;

/// Width of the pooled feature vector fed to the classifier.
pub const EMBEDDING_DIM: i64 = 256;

/// Nine-layer residual network for 8x8, 16x16 and 32x32 inputs.
///
/// Every branch brings the feature map down to 256x4x4 before the 4x4 average
/// pool, so the classifier always sees a 256 wide embedding.
#[derive(Debug)]
pub struct ResNet9 {
    conv_1: nn::SequentialT,
    conv_2: nn::SequentialT,
    res_1: nn::SequentialT,
    conv_3: nn::SequentialT,
    conv_4: nn::SequentialT,
    res_2: nn::SequentialT,
    fc: nn::Linear,
    embedding_recorder: EmbeddingRecorder,
    cfg: ResNet9Config,
    device: Device,
}

impl ResNet9 {
    pub fn new(vs: &nn::Path, cfg: &ResNet9Config) -> Self {
        let (conv_3_pool, conv_4_pool) = match cfg.im_size {
            ImSize::S32 => (Some(2), Some(2)),
            ImSize::S16 => (None, Some(2)),
            ImSize::S8 => (None, None),
        };
        debug!(
            "building resnet9 for {:?}: in_channels={} num_classes={}",
            cfg.im_size, cfg.in_channels, cfg.num_classes
        );

        Self {
            conv_1: conv_block(&(vs / "conv_1"), cfg.in_channels, 64, None),
            conv_2: conv_block(&(vs / "conv_2"), 64, 128, Some(2)),
            res_1: residual(&(vs / "res_1"), 128),
            conv_3: conv_block(&(vs / "conv_3"), 128, 256, conv_3_pool),
            conv_4: conv_block(&(vs / "conv_4"), 256, 256, conv_4_pool),
            res_2: residual(&(vs / "res_2"), 256),
            fc: nn::linear(vs / "fc", EMBEDDING_DIM, cfg.num_classes, Default::default()),
            embedding_recorder: EmbeddingRecorder::new(cfg.record_embedding),
            cfg: cfg.clone(),
            device: vs.device(),
        }
    }

    pub fn config(&self) -> &ResNet9Config {
        &self.cfg
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn im_size(&self) -> ImSize {
        self.cfg.im_size
    }

    pub fn num_classes(&self) -> i64 {
        self.cfg.num_classes
    }

    pub fn embedding_dim(&self) -> i64 {
        EMBEDDING_DIM
    }

    pub fn last_layer(&self) -> &nn::Linear {
        &self.fc
    }

    pub fn recorder(&self) -> &EmbeddingRecorder {
        &self.embedding_recorder
    }

    /// Inputs must be `(N, in_channels, h, w)` with `(h, w)` the configured size.
    pub fn check_input(&self, xs: &Tensor) -> Result<()> {
        let size = xs.size();
        let (h, w) = self.cfg.im_size.dims();
        match size.as_slice() {
            &[_, c, xh, xw] if c == self.cfg.in_channels && xh == h && xw == w => Ok(()),
            _ => Err(shape(format!(
                "expected input of shape [N, {}, {}, {}], got {:?}",
                self.cfg.in_channels, h, w, size
            ))),
        }
    }

    fn features(&self, xs: &Tensor, train: bool) -> Tensor {
        let out = xs.apply_t(&self.conv_1, train).apply_t(&self.conv_2, train);
        let out = out.apply_t(&self.res_1, train) + &out;
        let out = out.apply_t(&self.conv_3, train).apply_t(&self.conv_4, train);
        let out = out.apply_t(&self.res_2, train) + &out;
        out.avg_pool2d_default(4).flat_view()
    }

    fn run(&self, xs: &Tensor, train: bool) -> (Tensor, Tensor) {
        let features = if self.cfg.no_grad {
            tch::no_grad(|| self.features(xs, train))
        } else {
            self.features(xs, train)
        };
        let embedding = self.embedding_recorder.record(&features);
        (embedding.apply(&self.fc), embedding)
    }

    /// Returns `(logits, embedding)`; the embedding also goes through the recorder.
    pub fn forward_with_embedding(&self, xs: &Tensor, train: bool) -> Result<(Tensor, Tensor)> {
        self.check_input(xs)?;
        Ok(self.run(xs, train))
    }
}

impl ModuleT for ResNet9 {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.run(xs, train).0
    }
}

fn residual(vs: &nn::Path, channels: i64) -> nn::SequentialT {
    nn::seq_t()
        .add(conv_block(&(vs / "0"), channels, channels, None))
        .add(conv_block(&(vs / "1"), channels, channels, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    fn build(cfg: &ResNet9Config) -> (nn::VarStore, ResNet9) {
        tch::manual_seed(0);
        let vs = nn::VarStore::new(Device::Cpu);
        let net = ResNet9::new(&vs.root(), cfg);
        (vs, net)
    }

    fn images(n: i64, c: i64, side: i64) -> Tensor {
        Tensor::randn(&[n, c, side, side], tch::kind::FLOAT_CPU)
    }

    #[test]
    fn test_forward_shapes_per_resolution() {
        for &(side, im_size) in &[(32, ImSize::S32), (16, ImSize::S16), (8, ImSize::S8)] {
            let cfg = ResNet9Config::new(3, 10, (side, side)).unwrap();
            let (_vs, net) = build(&cfg);
            assert_eq!(net.im_size(), im_size);
            let xs = images(2, 3, side);
            let (logits, embedding) = net.forward_with_embedding(&xs, false).unwrap();
            assert_eq!(logits.size(), vec![2, 10]);
            assert_eq!(embedding.size(), vec![2, EMBEDDING_DIM]);
            assert_eq!(net.forward_t(&xs, true).size(), vec![2, 10]);
        }
    }

    #[test]
    fn test_topology_variables() {
        let cfg = ResNet9Config::new(1, 7, (8, 8)).unwrap();
        let (vs, net) = build(&cfg);
        let variables = vs.variables();
        assert_eq!(variables["conv_1.conv.weight"].size(), vec![64, 1, 3, 3]);
        assert_eq!(variables["conv_2.conv.weight"].size(), vec![128, 64, 3, 3]);
        assert_eq!(variables["res_1.1.conv.weight"].size(), vec![128, 128, 3, 3]);
        assert_eq!(variables["conv_3.conv.weight"].size(), vec![256, 128, 3, 3]);
        assert_eq!(variables["res_2.0.bn.weight"].size(), vec![256]);
        assert_eq!(variables["fc.weight"].size(), vec![7, EMBEDDING_DIM]);
        assert_eq!(net.last_layer().ws.size(), vec![7, EMBEDDING_DIM]);
        assert_eq!(net.embedding_dim(), EMBEDDING_DIM);
        assert_eq!(net.num_classes(), 7);
    }

    #[test]
    fn test_rejects_mismatched_input() {
        let cfg = ResNet9Config::new(3, 10, (16, 16)).unwrap();
        let (_vs, net) = build(&cfg);
        assert!(net.check_input(&images(1, 3, 16)).is_ok());
        assert!(net.forward_with_embedding(&images(1, 3, 32), false).is_err());
        assert!(net.forward_with_embedding(&images(1, 1, 16), false).is_err());
        let flat = Tensor::randn(&[3, 16, 16], tch::kind::FLOAT_CPU);
        assert!(net.check_input(&flat).is_err());
    }

    #[test]
    fn test_records_embedding() {
        let cfg = ResNet9Config::new(3, 4, (8, 8))
            .unwrap()
            .with_record_embedding(true);
        let (_vs, net) = build(&cfg);
        assert!(net.recorder().embedding().is_none());
        let (_, embedding) = net.forward_with_embedding(&images(3, 3, 8), false).unwrap();
        let recorded = net.recorder().embedding().expect("recorded");
        assert_eq!(recorded.size(), vec![3, EMBEDDING_DIM]);
        let diff = f64::from(&(recorded - embedding.detach()).abs().max());
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_no_grad_only_trains_classifier() {
        let xs = images(2, 3, 16);

        let cfg = ResNet9Config::new(3, 5, (16, 16)).unwrap().with_no_grad(true);
        let (_vs, net) = build(&cfg);
        let (logits, embedding) = net.forward_with_embedding(&xs, true).unwrap();
        assert!(!embedding.requires_grad());
        assert!(logits.requires_grad());

        let cfg = ResNet9Config::new(3, 5, (16, 16)).unwrap();
        let (_vs, net) = build(&cfg);
        let (_, embedding) = net.forward_with_embedding(&xs, true).unwrap();
        assert!(embedding.requires_grad());
    }

    #[test]
    fn test_eval_mode_is_deterministic() {
        let cfg = ResNet9Config::new(3, 10, (8, 8)).unwrap();
        let (_vs, net) = build(&cfg);
        let xs = images(2, 3, 8);
        let a = net.forward_t(&xs, false);
        let b = net.forward_t(&xs, false);
        assert_eq!(a.kind(), Kind::Float);
        let diff = f64::from(&(a - b).abs().max());
        assert_eq!(diff, 0.0);
    }
}
