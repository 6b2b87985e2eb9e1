use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, instrument};

use super::{forward, optimize, Evaluation, FitReport, Parameters, TrainingParams};
use crate::{dataset::Dataset, Error, Result};

/// Binary logistic regression trained with mini-batch gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
  params: TrainingParams,
  parameters: Parameters,
  rng: StdRng,
  /// Latest batch cost, `None` until the first step.
  cost: Option<f64>,
}

impl LogisticRegression {
  pub fn new(n_feature: usize, params: TrainingParams) -> Result<Self> {
    params.validate()?;
    Ok(Self {
      parameters: Parameters::init(n_feature, 1)?,
      rng: StdRng::seed_from_u64(params.seed),
      params,
      cost: None,
    })
  }

  /// Starts from given parameters instead of zeros.
  pub fn with_parameters(parameters: Parameters, params: TrainingParams) -> Result<Self> {
    params.validate()?;
    Ok(Self {
      parameters,
      rng: StdRng::seed_from_u64(params.seed),
      params,
      cost: None,
    })
  }

  pub fn parameters(&self) -> &Parameters {
    &self.parameters
  }

  pub fn training_params(&self) -> &TrainingParams {
    &self.params
  }

  pub fn cost(&self) -> Option<f64> {
    self.cost
  }

  fn check_dims(&self, data: &Dataset) -> Result<()> {
    if data.is_empty() {
      return Err(Error::InvalidArgument("dataset is empty".to_string()));
    }
    if data.feature_dim() != self.parameters.feature_dim() {
      return Err(Error::DataMismatch(format!(
        "dataset has {} features, model has {}",
        data.feature_dim(),
        self.parameters.feature_dim()
      )));
    }
    Ok(())
  }

  /// Runs `epochs` passes over `data`, reshuffling it into batches before each one.
  #[instrument(level = "debug", skip_all, fields(examples = data.len()))]
  pub fn fit(&mut self, data: &Dataset) -> Result<FitReport> {
    self.check_dims(data)?;
    let TrainingParams {
      epochs,
      batch_size,
      learning_rate,
      lambda,
      log_every,
      ..
    } = self.params;

    let start = Instant::now();
    let mut iter = 0;
    for epoch in 0..epochs {
      for batch in data.batches(batch_size, &mut self.rng)? {
        let cost = optimize(
          batch.features.view(),
          batch.labels.view(),
          &mut self.parameters,
          learning_rate,
          lambda,
        )?;
        self.cost = Some(cost);
        iter += 1;
      }
      let cost = self.cost.unwrap_or_default();
      if epoch % log_every == 0 {
        println!("{}", progress_line(epoch, cost));
      }
      debug!(epoch, cost, "epoch done");
    }

    let elapsed = start.elapsed();
    info!(
      "Finished {iter} iterations in {:.2}s, {:.2}µs / iter",
      elapsed.as_secs_f32(),
      elapsed.as_micros() as f64 / iter.max(1) as f64
    );
    Ok(FitReport {
      epochs,
      iterations: iter,
      final_cost: self.cost.unwrap_or_default(),
      elapsed,
    })
  }

  /// Thresholds `sigmoid(w·x + b)` at 0.5 and scores the predictions against the labels.
  pub fn predict(&self, data: &Dataset) -> Result<Evaluation> {
    self.check_dims(data)?;
    let probabilities = forward(data.features(), &self.parameters)?;
    let predictions = probabilities.mapv(|a| if a > 0.5 { 1.0 } else { 0.0 });
    let correct = predictions
      .iter()
      .zip(data.labels().iter())
      .filter(|(p, y)| p == y)
      .count();
    let total = data.len();
    Ok(Evaluation {
      predictions,
      correct,
      total,
      accuracy: correct as f64 / total as f64,
    })
  }
}

/// The periodic progress line printed by [`LogisticRegression::fit`].
pub fn progress_line(epoch: usize, cost: f64) -> String {
  format!("{epoch} epoches cost: {cost:.6}")
}
