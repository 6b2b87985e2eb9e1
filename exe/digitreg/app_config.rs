use std::{error::Error, path::Path};

use digitreg::subcommands::TrainSettings;
use serde::Deserialize;

/// Training settings that can come from a config file or the command line.
/// Also defines the config file format (every field can be omitted).
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
  /// Digit treated as the positive class
  pub target: Option<u8>,
  /// Number of leading training examples to load
  pub train_limit: Option<usize>,
  /// Number of leading test examples to load
  pub test_limit: Option<usize>,
  pub epochs: Option<usize>,
  pub batch_size: Option<usize>,
  pub learning_rate: Option<f64>,
  /// L2 regularization strength
  pub lambda: Option<f64>,
  pub seed: Option<u64>,
  /// Log the cost every this many epochs
  pub log_every: Option<usize>,
}

impl AppConfig {
  pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(&content)?)
  }

  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      target: other.target.or(self.target),
      train_limit: other.train_limit.or(self.train_limit),
      test_limit: other.test_limit.or(self.test_limit),
      epochs: other.epochs.or(self.epochs),
      batch_size: other.batch_size.or(self.batch_size),
      learning_rate: other.learning_rate.or(self.learning_rate),
      lambda: other.lambda.or(self.lambda),
      seed: other.seed.or(self.seed),
      log_every: other.log_every.or(self.log_every),
    }
  }

  /// Overrides whatever is set here on top of `settings`.
  pub fn apply(self, settings: TrainSettings) -> TrainSettings {
    let training = settings.training;
    TrainSettings {
      target: self.target.unwrap_or(settings.target),
      train_limit: self.train_limit.or(settings.train_limit),
      test_limit: self.test_limit.or(settings.test_limit),
      training: digitreg::model::TrainingParams {
        epochs: self.epochs.unwrap_or(training.epochs),
        batch_size: self.batch_size.unwrap_or(training.batch_size),
        learning_rate: self.learning_rate.unwrap_or(training.learning_rate),
        lambda: self.lambda.unwrap_or(training.lambda),
        seed: self.seed.unwrap_or(training.seed),
        log_every: self.log_every.unwrap_or(training.log_every),
      },
    }
  }
}
