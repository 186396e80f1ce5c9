use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported image size {0}x{1}, expected 32x32, 16x16 or 8x8")]
    UnsupportedImageSize(i64, i64),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("shape error: {0}")]
    Shape(String),
    #[error("no validation steps to aggregate")]
    EmptyEpoch,
    #[error("epoch result has no learning rates")]
    MissingLearningRate,
    #[error(transparent)]
    Torch(#[from] tch::TchError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub(crate) fn shape<S: Into<String>>(msg: S) -> Error {
    Error::Shape(msg.into())
}
