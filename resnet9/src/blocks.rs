use crate::activations::Mish;
use tch::nn;

/// Conv 3x3 (padding 1) -> batch norm -> mish, optionally followed by a
/// `k`x`k` max pool.
///
/// Variables live under `vs/conv` and `vs/bn`.
pub fn conv_block(
    vs: &nn::Path,
    in_channels: i64,
    out_channels: i64,
    pool: Option<i64>,
) -> nn::SequentialT {
    let conv_cfg = nn::ConvConfig {
        padding: 1,
        ..Default::default()
    };
    let block = nn::seq_t()
        .add(nn::conv2d(vs / "conv", in_channels, out_channels, 3, conv_cfg))
        .add(nn::batch_norm2d(vs / "bn", out_channels, Default::default()))
        .add(Mish);
    match pool {
        Some(k) => block.add_fn(move |xs| xs.max_pool2d_default(k)),
        None => block,
    }
}
