use std::time::Duration;

use ndarray::Array1;
use serde::Serialize;

use crate::{Error, Result};

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
  pub epochs: usize,
  pub batch_size: usize,
  pub learning_rate: f64,
  /// L2 regularization strength.
  pub lambda: f64,
  /// Seeds the per-epoch reshuffle.
  pub seed: u64,
  /// A progress line is logged on every epoch divisible by this.
  pub log_every: usize,
}

impl Default for TrainingParams {
  fn default() -> Self {
    Self {
      epochs: 400,
      batch_size: 32,
      learning_rate: 0.001,
      lambda: 0.01,
      seed: 1,
      log_every: 20,
    }
  }
}

impl TrainingParams {
  pub fn validate(&self) -> Result<()> {
    let positive = [
      ("epochs", self.epochs),
      ("batch size", self.batch_size),
      ("log interval", self.log_every),
    ];
    if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
      return Err(Error::InvalidArgument(format!("{name} must be positive")));
    }
    let rates = [("learning rate", self.learning_rate), ("lambda", self.lambda)];
    if let Some((name, value)) = rates
      .iter()
      .find(|(_, value)| !value.is_finite() || *value < 0.0)
    {
      return Err(Error::InvalidArgument(format!(
        "{name} must be finite and non-negative, got {value}"
      )));
    }
    Ok(())
  }
}

/// What a call to `fit` did.
#[derive(Debug, Clone)]
pub struct FitReport {
  pub epochs: usize,
  pub iterations: usize,
  /// Cost of the last batch of the last epoch.
  pub final_cost: f64,
  pub elapsed: Duration,
}

/// Output of `predict`.
#[derive(Debug, Clone)]
pub struct Evaluation {
  /// 0.0 / 1.0 per example.
  pub predictions: Array1<f64>,
  pub correct: usize,
  pub total: usize,
  /// `correct / total`, in [0, 1].
  pub accuracy: f64,
}

/// Trained parameters in the form they are written out.
#[derive(Debug, Clone, Serialize)]
pub struct SavedWeights {
  pub target: u8,
  pub weights: Vec<f64>,
  pub bias: f64,
  pub accuracy: f64,
}
