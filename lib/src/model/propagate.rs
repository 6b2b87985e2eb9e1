use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::trace;

use super::Parameters;
use crate::{Error, Result};

/// Probabilities are clamped to [EPSILON, 1 - EPSILON] before taking logarithms.
pub const PROB_EPSILON: f64 = 1e-12;

/// Logistic function, evaluated so that neither branch overflows.
pub fn sigmoid(z: f64) -> f64 {
  if z >= 0.0 {
    1.0 / (1.0 + (-z).exp())
  } else {
    let e = z.exp();
    e / (1.0 + e)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
  pub dw: Array1<f64>,
  pub db: f64,
}

/// `sigmoid(w·x + b)` for every column of `x`.
pub fn forward(x: ArrayView2<'_, f64>, params: &Parameters) -> Result<Array1<f64>> {
  if x.nrows() != params.feature_dim() {
    return Err(Error::DataMismatch(format!(
      "examples have {} features, weights expect {}",
      x.nrows(),
      params.feature_dim()
    )));
  }
  let z = params.weights().dot(&x) + params.bias();
  Ok(z.mapv(sigmoid))
}

///
/// Cross-entropy cost of a batch plus its gradients.
///
/// `x` is feature_dim x m, `y` holds the m labels. The cost is
///   -1/m * sum(y ln a + (1 - y) ln(1 - a)) + lambda * |w|^2 / m
/// and the gradients are
///   dw = x (a - y) / m + 2 lambda w / m
///   db = mean(a - y)
///
pub fn propagate(
  x: ArrayView2<'_, f64>,
  y: ArrayView1<'_, f64>,
  params: &Parameters,
  lambda: f64,
) -> Result<(Gradients, f64)> {
  if !lambda.is_finite() || lambda < 0.0 {
    return Err(Error::InvalidArgument(format!(
      "lambda must be finite and non-negative, got {lambda}"
    )));
  }
  if y.is_empty() {
    return Err(Error::InvalidArgument("empty batch".to_string()));
  }
  if x.ncols() != y.len() {
    return Err(Error::DataMismatch(format!(
      "{} examples but {} labels",
      x.ncols(),
      y.len()
    )));
  }
  let m = y.len() as f64;
  let a = forward(x, params)?;

  let log_likelihood: f64 = a
    .iter()
    .zip(y.iter())
    .map(|(&a, &y)| {
      let a = a.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
      y * a.ln() + (1.0 - y) * (1.0 - a).ln()
    })
    .sum();
  let w = params.weights();
  let cost = -log_likelihood / m + lambda * w.dot(&w) / m;

  let residual = &a - &y;
  let dw = x.dot(&residual) / m + &w * (2.0 * lambda / m);
  let db = residual.sum() / m;

  if !cost.is_finite() {
    return Err(Error::NumericalInstability(format!("cost evaluated to {cost}")));
  }
  if !db.is_finite() || dw.iter().any(|g| !g.is_finite()) {
    return Err(Error::NumericalInstability(
      "gradient has non-finite entries".to_string(),
    ));
  }
  trace!(cost, db, "propagated batch of {}", y.len());
  Ok((Gradients { dw, db }, cost))
}

/// Runs [`propagate`] and applies one gradient descent step. Returns the batch cost.
///
/// On error the parameters are left as they were.
pub fn optimize(
  x: ArrayView2<'_, f64>,
  y: ArrayView1<'_, f64>,
  params: &mut Parameters,
  learning_rate: f64,
  lambda: f64,
) -> Result<f64> {
  let (grads, cost) = propagate(x, y, params, lambda)?;
  params.descend(&grads, learning_rate)?;
  Ok(cost)
}

#[cfg(test)]
mod tests {
  use ndarray::{array, Array2};
  use proptest::collection::vec;
  use proptest::prelude::*;

  use super::*;
  use crate::dataset::Dataset;

  fn synthetic() -> (Array2<f64>, Array1<f64>, Parameters) {
    let x = array![
      [0.5, -1.0, 2.0, 0.1],
      [1.5, 0.3, -0.7, 0.0],
      [-0.2, 0.8, 0.4, 1.1]
    ];
    let y = array![1.0, 0.0, 1.0, 0.0];
    let params = Parameters::from_parts(array![0.3, -0.2, 0.1], 0.05).unwrap();
    (x, y, params)
  }

  #[test]
  fn sigmoid_is_stable_at_extremes() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert_eq!(sigmoid(1000.0), 1.0);
    assert_eq!(sigmoid(-1000.0), 0.0);
    assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-15);
  }

  #[test]
  fn analytic_gradient_matches_finite_differences() {
    let (x, y, params) = synthetic();
    let lambda = 0.1;
    let h = 1e-6;
    let (grads, _) = propagate(x.view(), y.view(), &params, lambda).unwrap();
    let cost_at = |p: &Parameters| propagate(x.view(), y.view(), p, lambda).unwrap().1;

    for i in 0..params.feature_dim() {
      let mut plus = params.weights().to_owned();
      let mut minus = params.weights().to_owned();
      plus[i] += h;
      minus[i] -= h;
      let numeric = (cost_at(&Parameters::from_parts(plus, params.bias()).unwrap())
        - cost_at(&Parameters::from_parts(minus, params.bias()).unwrap()))
        / (2.0 * h);
      assert!(
        (numeric - grads.dw[i]).abs() < 1e-4,
        "dw[{i}]: numeric {numeric} analytic {}",
        grads.dw[i]
      );
    }

    let w = params.weights().to_owned();
    let numeric = (cost_at(&Parameters::from_parts(w.clone(), params.bias() + h).unwrap())
      - cost_at(&Parameters::from_parts(w, params.bias() - h).unwrap()))
      / (2.0 * h);
    assert!((numeric - grads.db).abs() < 1e-4, "db: numeric {numeric} analytic {}", grads.db);
  }

  #[test]
  fn zero_weights_cost_ln_two() {
    let (x, y, _) = synthetic();
    let params = Parameters::init(3, 1).unwrap();
    let (grads, cost) = propagate(x.view(), y.view(), &params, 0.5).unwrap();
    assert!((cost - std::f64::consts::LN_2).abs() < 1e-12);
    assert_eq!(grads.db, 0.0);
  }

  #[test]
  fn saturated_probabilities_stay_finite() {
    let x = array![[1000.0, -1000.0]];
    let y = array![0.0, 1.0];
    let params = Parameters::from_parts(array![1.0], 0.0).unwrap();
    let (grads, cost) = propagate(x.view(), y.view(), &params, 0.0).unwrap();
    assert!(cost.is_finite());
    assert!((cost + PROB_EPSILON.ln()).abs() < 1e-3);
    assert!(grads.dw.iter().all(|g| g.is_finite()));
  }

  #[test]
  fn non_finite_inputs_are_reported() {
    let x = array![[f64::INFINITY, 0.0]];
    let y = array![1.0, 0.0];
    let params = Parameters::from_parts(array![0.0], 0.0).unwrap();
    let err = propagate(x.view(), y.view(), &params, 0.0).unwrap_err();
    assert!(matches!(err, Error::NumericalInstability(_)), "{err}");
  }

  #[test]
  fn rejects_mismatched_shapes() {
    let (x, _, params) = synthetic();
    let err = propagate(x.view(), array![1.0, 0.0].view(), &params, 0.0).unwrap_err();
    assert!(matches!(err, Error::DataMismatch(_)));

    let short = Parameters::init(2, 1).unwrap();
    let err = propagate(x.view(), array![1.0, 0.0, 1.0, 0.0].view(), &short, 0.0).unwrap_err();
    assert!(matches!(err, Error::DataMismatch(_)));

    let err = propagate(x.view(), array![1.0, 0.0, 1.0, 0.0].view(), &short, -1.0).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let empty_x = Array2::<f64>::zeros((3, 0));
    let empty_y = Array1::<f64>::zeros(0);
    let err = propagate(empty_x.view(), empty_y.view(), &params, 0.0).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
  }

  #[test]
  fn optimize_leaves_parameters_alone_on_error() {
    let (x, _, mut params) = synthetic();
    let before = params.clone();
    let bad_labels = array![1.0];
    assert!(optimize(x.view(), bad_labels.view(), &mut params, 0.1, 0.0).is_err());
    assert_eq!(params, before);
  }

  #[test]
  fn optimize_lowers_the_cost() {
    let (x, y, mut params) = synthetic();
    let first = optimize(x.view(), y.view(), &mut params, 0.5, 0.0).unwrap();
    let (_, second) = propagate(x.view(), y.view(), &params, 0.0).unwrap();
    assert!(second < first, "{second} >= {first}");
  }

  fn batches() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<bool>)> {
    (1usize..8).prop_flat_map(|m| (vec(vec(-5.0..5.0f64, 3), m), vec(any::<bool>(), m)))
  }

  proptest! {

    #[test]
    fn cost_is_non_negative(
      (rows, labels) in batches(),
      w in vec(-2.0..2.0f64, 3),
      b in -1.0..1.0f64,
      lambda in 0.0..1.0f64
    ) {
      let scope = crate::utils::init_logging_tests();
      let labels: Vec<f64> = labels.into_iter().map(|l| if l { 1.0 } else { 0.0 }).collect();
      let ds = Dataset::from_rows(&rows, &labels).unwrap();
      let params = Parameters::from_parts(Array1::from(w), b).unwrap();
      let (grads, cost) = propagate(ds.features(), ds.labels(), &params, lambda).unwrap();
      prop_assert!(cost >= 0.0 && cost.is_finite(), "cost {}", cost);
      prop_assert_eq!(grads.dw.len(), 3);
      drop(scope);
    }
  }
}
