use ndarray::{Array1, ArrayView1};

use super::Gradients;
use crate::{Error, Result};

/// Weights and bias of the linear score `w·x + b`.
///
/// The weight length is fixed at construction; every update checks it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
  weights: Array1<f64>,
  bias: f64,
}

impl Parameters {
  /// Zero weights and bias for `n_feature` inputs. Only a single output is supported.
  pub fn init(n_feature: usize, n_output: usize) -> Result<Self> {
    if n_feature == 0 {
      return Err(Error::InvalidArgument(
        "feature dimension must be positive".to_string(),
      ));
    }
    if n_output != 1 {
      return Err(Error::InvalidArgument(format!(
        "binary logistic regression has one output, got {n_output}"
      )));
    }
    Ok(Self {
      weights: Array1::zeros(n_feature),
      bias: 0.0,
    })
  }

  pub fn from_parts(weights: Array1<f64>, bias: f64) -> Result<Self> {
    if weights.is_empty() {
      return Err(Error::InvalidArgument(
        "feature dimension must be positive".to_string(),
      ));
    }
    Ok(Self { weights, bias })
  }

  pub fn weights(&self) -> ArrayView1<'_, f64> {
    self.weights.view()
  }

  pub fn bias(&self) -> f64 {
    self.bias
  }

  pub fn feature_dim(&self) -> usize {
    self.weights.len()
  }

  /// One gradient descent step: `w -= lr * dw`, `b -= lr * db`.
  pub fn descend(&mut self, grads: &Gradients, learning_rate: f64) -> Result<()> {
    if grads.dw.len() != self.weights.len() {
      return Err(Error::DataMismatch(format!(
        "gradient has {} entries, weights have {}",
        grads.dw.len(),
        self.weights.len()
      )));
    }
    self.weights.scaled_add(-learning_rate, &grads.dw);
    self.bias -= learning_rate * grads.db;
    Ok(())
  }
}
