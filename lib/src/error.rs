use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a training or data preparation run.
#[derive(Debug, Error)]
pub enum Error {
  /// A dimension, count or hyperparameter outside its valid range.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),
  /// Cost or gradients stopped being finite.
  #[error("numerical instability: {0}")]
  NumericalInstability(String),
  /// Features and labels (or parameters) disagree in shape.
  #[error("data mismatch: {0}")]
  DataMismatch(String),
  /// The file is not a well formed IDX file.
  #[error("malformed idx file {path}: {reason}")]
  Format { path: PathBuf, reason: String },
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
