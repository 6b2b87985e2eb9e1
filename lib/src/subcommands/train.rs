use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::{
  dataset::{read_idx_images, read_idx_labels, Dataset},
  model::{Evaluation, FitReport, LogisticRegression, SavedWeights, TrainingParams},
  Result,
};

/// Image and label files of the training and test splits.
#[derive(Debug, Clone)]
pub struct DataPaths {
  pub train_images: PathBuf,
  pub train_labels: PathBuf,
  pub test_images: PathBuf,
  pub test_labels: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainSettings {
  /// The digit that counts as the positive class.
  pub target: u8,
  /// Only the first `train_limit` training examples are loaded.
  pub train_limit: Option<usize>,
  pub test_limit: Option<usize>,
  pub training: TrainingParams,
}

impl Default for TrainSettings {
  fn default() -> Self {
    Self {
      target: 2,
      train_limit: Some(2000),
      test_limit: Some(200),
      training: TrainingParams::default(),
    }
  }
}

#[derive(Debug)]
pub struct TrainOutcome {
  pub report: FitReport,
  pub evaluation: Evaluation,
}

/// Trains a one-vs-rest classifier for one digit and scores it on the test split.
pub struct Train {
  paths: DataPaths,
  settings: TrainSettings,
  weights_output_path: Option<PathBuf>,
}

impl Train {
  pub fn new(paths: DataPaths, settings: TrainSettings, weights_output_path: Option<&Path>) -> Self {
    Self {
      paths,
      settings,
      weights_output_path: weights_output_path.map(PathBuf::from),
    }
  }

  #[instrument(level = "debug", skip(self), fields(target = self.settings.target))]
  pub fn run(self) -> Result<TrainOutcome> {
    let target = self.settings.target;
    let train = load_split(
      &self.paths.train_images,
      &self.paths.train_labels,
      self.settings.train_limit,
      target,
    )?;
    let test = load_split(
      &self.paths.test_images,
      &self.paths.test_labels,
      self.settings.test_limit,
      target,
    )?;
    info!(
      "{} training examples ({} positive), {} test examples, {} features",
      train.len(),
      train.positives(),
      test.len(),
      train.feature_dim()
    );

    let mut model = LogisticRegression::new(train.feature_dim(), self.settings.training)?;
    let report = model.fit(&train)?;
    let evaluation = model.predict(&test)?;
    println!(
      "Logistic Regression on Category {} Accuracy: {:.6} %",
      target,
      evaluation.accuracy * 100.0
    );

    if let Some(path) = &self.weights_output_path {
      let saved = SavedWeights {
        target,
        weights: model.parameters().weights().to_vec(),
        bias: model.parameters().bias(),
        accuracy: evaluation.accuracy,
      };
      crate::utils::serialize_to_file(path, &saved)?;
      info!("weights written to {:?}", path);
    }

    Ok(TrainOutcome { report, evaluation })
  }
}

fn load_split(images: &Path, labels: &Path, limit: Option<usize>, target: u8) -> Result<Dataset> {
  let images = read_idx_images(images, limit)?;
  let labels = read_idx_labels(labels, limit)?;
  Dataset::one_vs_rest(&images, &labels, target)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{dataset::idx::fixtures::*, Error};

  fn write_split(dir: &Path, name: &str, images: &[Vec<u8>], labels: &[u8]) -> (PathBuf, PathBuf) {
    let images_path = dir.join(format!("{name}-images.idx3-ubyte"));
    let labels_path = dir.join(format!("{name}-labels.idx1-ubyte"));
    std::fs::write(&images_path, idx3_bytes(2, 2, images)).unwrap();
    std::fs::write(&labels_path, idx1_bytes(labels)).unwrap();
    (images_path, labels_path)
  }

  fn fixture(dir: &Path) -> DataPaths {
    let mut images = Vec::new();
    let mut labels = Vec::new();
    for i in 0..8u8 {
      if i % 2 == 0 {
        images.push(vec![255, 10, 0, 0]);
        labels.push(1);
      } else {
        images.push(vec![0, 10, 0, 255]);
        labels.push(5 + i % 3);
      }
    }
    let (train_images, train_labels) = write_split(dir, "train", &images, &labels);
    let (test_images, test_labels) = write_split(dir, "t10k", &images[..4], &labels[..4]);
    DataPaths {
      train_images,
      train_labels,
      test_images,
      test_labels,
    }
  }

  fn settings() -> TrainSettings {
    TrainSettings {
      target: 1,
      train_limit: None,
      test_limit: None,
      training: TrainingParams {
        epochs: 50,
        batch_size: 4,
        learning_rate: 1.0,
        lambda: 0.0,
        seed: 5,
        log_every: 10,
      },
    }
  }

  #[test]
  fn trains_scores_and_saves() {
    let scope = crate::utils::init_logging_tests();
    let dir = tempfile::tempdir().unwrap();
    let paths = fixture(dir.path());
    let weights_path = dir.path().join("weights.json");

    let outcome = Train::new(paths, settings(), Some(&weights_path)).run().unwrap();
    assert_eq!(outcome.report.iterations, 50 * 2);
    assert_eq!(outcome.evaluation.total, 4);
    assert_eq!(outcome.evaluation.accuracy, 1.0);

    let saved: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&weights_path).unwrap()).unwrap();
    assert_eq!(saved["target"], 1);
    assert_eq!(saved["weights"].as_array().unwrap().len(), 4);
    assert!(saved["weights"][0].as_f64().unwrap() > 0.0);
    drop(scope);
  }

  #[test]
  fn limits_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let paths = fixture(dir.path());
    let outcome = Train::new(
      paths,
      TrainSettings {
        train_limit: Some(4),
        test_limit: Some(2),
        ..settings()
      },
      None,
    )
    .run()
    .unwrap();
    assert_eq!(outcome.report.iterations, 50);
    assert_eq!(outcome.evaluation.total, 2);
  }

  #[test]
  fn missing_files_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = fixture(dir.path());
    paths.test_labels = dir.path().join("absent");
    let err = Train::new(paths, settings(), None).run().unwrap_err();
    assert!(matches!(err, Error::Io(_)));
  }
}
