use tch::{nn, Tensor};

/// Scalar mish, `x * tanh(softplus(x))`.
pub fn mish(x: f32) -> f32 {
    x * softplus(x).tanh()
}

fn softplus(x: f32) -> f32 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Mish activation as a module: `x * tanh(ln(1 + e^x))`.
///
/// Softplus is evaluated as `relu(x) + ln(1 + e^-|x|)` so large inputs stay finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mish;

impl nn::Module for Mish {
    fn forward(&self, xs: &Tensor) -> Tensor {
        let softplus = xs.relu() + xs.abs().neg().exp().log1p();
        xs * softplus.tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::Module;
    use tch::Kind;

    #[test]
    fn test_mish_scalar() {
        assert_eq!(mish(0.0), 0.0);
        assert!((mish(1.0) - 0.865_098_4).abs() < 1e-6);
        assert!((mish(-1.0) + 0.303_401_4).abs() < 1e-6);
        assert_eq!(mish(100.0), 100.0);
        assert!(mish(-100.0) <= 0.0 && mish(-100.0) > -1e-6);
    }

    #[test]
    fn test_mish_module_matches_scalar() {
        let xs = [-20.0f32, -3.0, -1.0, -0.5, 0.0, 0.5, 1.0, 3.0, 20.0];
        let ys = Mish.forward(&Tensor::of_slice(&xs));
        assert_eq!(ys.size(), vec![xs.len() as i64]);
        let ys = Vec::<f32>::from(&ys);
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((mish(*x) - y).abs() < 1e-5, "mish({}) = {}", x, y);
        }
    }

    #[test]
    fn test_mish_stays_finite() {
        let xs = Tensor::of_slice(&[-1e4f32, -90.0, 90.0, 1e4]);
        let ys = Mish.forward(&xs);
        assert_eq!(ys.kind(), Kind::Float);
        let ys = Vec::<f32>::from(&ys);
        assert!(ys.iter().all(|y| y.is_finite()));
        assert_eq!(ys[3], 1e4);
    }

    #[test]
    fn test_mish_preserves_shape() {
        tch::manual_seed(0);
        let xs = Tensor::randn(&[2, 3, 4, 4], tch::kind::FLOAT_CPU);
        assert_eq!(Mish.forward(&xs).size(), vec![2, 3, 4, 4]);
    }
}
