//!
//! Character tagger: embedding, a single layer LSTM and a linear head producing log-probabilities
//! over the tag set for every position of a sequence.
//!
//! Gate equations, with `x` the embedded input and `h`, `c` the previous hidden and cell state:
//!   f = sigmoid(Wf x + Uf h + bf)      i = sigmoid(Wi x + Ui h + bi)
//!   o = sigmoid(Wo x + Uo h + bo)      g = tanh(Wg x + Ug h + bg)
//!   c' = f * c + i * g                 h' = o * tanh(c')
//!

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{distributions::Uniform, Rng};
use tracing::{debug, instrument};

use super::sigmoid;
use crate::{
  text::{encode, N_LETTERS},
  Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggerConfig {
  pub embedding_dim: usize,
  pub hidden_dim: usize,
  pub vocab_size: usize,
  pub tagset_size: usize,
}

impl TaggerConfig {
  /// Printable characters in, printable characters out.
  pub fn characters(embedding_dim: usize, hidden_dim: usize) -> Self {
    Self {
      embedding_dim,
      hidden_dim,
      vocab_size: N_LETTERS,
      tagset_size: N_LETTERS,
    }
  }

  pub fn validate(&self) -> Result<()> {
    let dims = [
      ("embedding dimension", self.embedding_dim),
      ("hidden dimension", self.hidden_dim),
      ("vocabulary size", self.vocab_size),
      ("tag set size", self.tagset_size),
    ];
    if let Some((name, _)) = dims.iter().find(|(_, value)| *value == 0) {
      return Err(Error::InvalidArgument(format!("{name} must be positive")));
    }
    Ok(())
  }
}

/// `weight · x + bias`, with `weight` stored as out x in.
#[derive(Debug, Clone, PartialEq)]
struct Linear {
  weight: Array2<f64>,
  bias: Array1<f64>,
}

impl Linear {
  /// Uniform in [-1/sqrt(d_in), 1/sqrt(d_in)].
  fn new<R: Rng + ?Sized>(d_in: usize, d_out: usize, rng: &mut R) -> Self {
    let bound = 1.0 / (d_in as f64).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    Self {
      weight: Array2::from_shape_simple_fn((d_out, d_in), || rng.sample(&dist)),
      bias: Array1::from_shape_simple_fn(d_out, || rng.sample(&dist)),
    }
  }

  fn forward(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
    self.weight.dot(&x) + &self.bias
  }
}

#[derive(Debug, Clone, PartialEq)]
struct Gate {
  input: Linear,
  hidden: Linear,
}

impl Gate {
  fn new<R: Rng + ?Sized>(d_input: usize, d_hidden: usize, rng: &mut R) -> Self {
    Self {
      input: Linear::new(d_input, d_hidden, rng),
      hidden: Linear::new(d_hidden, d_hidden, rng),
    }
  }

  fn product(&self, x: ArrayView1<'_, f64>, h: ArrayView1<'_, f64>) -> Array1<f64> {
    self.input.forward(x) + self.hidden.forward(h)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LstmState {
  pub cell: Array1<f64>,
  pub hidden: Array1<f64>,
}

impl LstmState {
  pub fn zeros(hidden_dim: usize) -> Self {
    Self {
      cell: Array1::zeros(hidden_dim),
      hidden: Array1::zeros(hidden_dim),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
struct Lstm {
  forget: Gate,
  input: Gate,
  output: Gate,
  cell: Gate,
}

impl Lstm {
  fn new<R: Rng + ?Sized>(d_input: usize, d_hidden: usize, rng: &mut R) -> Self {
    Self {
      forget: Gate::new(d_input, d_hidden, rng),
      input: Gate::new(d_input, d_hidden, rng),
      output: Gate::new(d_input, d_hidden, rng),
      cell: Gate::new(d_input, d_hidden, rng),
    }
  }

  fn step(&self, x: ArrayView1<'_, f64>, state: &LstmState) -> LstmState {
    let h = state.hidden.view();
    let f = self.forget.product(x, h).mapv(sigmoid);
    let i = self.input.product(x, h).mapv(sigmoid);
    let o = self.output.product(x, h).mapv(sigmoid);
    let g = self.cell.product(x, h).mapv(f64::tanh);
    let cell = f * &state.cell + i * g;
    let hidden = o * cell.mapv(f64::tanh);
    LstmState { cell, hidden }
  }
}

/// Row-wise `z - ln(sum(exp(z)))`, shifted by the row maximum.
pub fn log_softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
  let mut out = scores.clone();
  for mut row in out.axis_iter_mut(Axis(0)) {
    let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    let log_sum = row.iter().map(|v| (v - max).exp()).sum::<f64>().ln() + max;
    row.mapv_inplace(|v| v - log_sum);
  }
  out
}

/// Embedding, LSTM and a linear tag head. The recurrent state carries over between calls to
/// [`LstmTagger::forward`] until [`LstmTagger::init_hidden`] resets it.
#[derive(Debug, Clone)]
pub struct LstmTagger {
  config: TaggerConfig,
  /// vocab_size x embedding_dim
  embeddings: Array2<f64>,
  lstm: Lstm,
  hidden2tag: Linear,
  state: LstmState,
}

impl LstmTagger {
  pub fn new<R: Rng + ?Sized>(config: TaggerConfig, rng: &mut R) -> Result<Self> {
    config.validate()?;
    let dist = Uniform::new_inclusive(-1.0, 1.0);
    let embeddings =
      Array2::from_shape_simple_fn((config.vocab_size, config.embedding_dim), || rng.sample(&dist));
    Ok(Self {
      embeddings,
      lstm: Lstm::new(config.embedding_dim, config.hidden_dim, rng),
      hidden2tag: Linear::new(config.hidden_dim, config.tagset_size, rng),
      state: LstmState::zeros(config.hidden_dim),
      config,
    })
  }

  pub fn config(&self) -> &TaggerConfig {
    &self.config
  }

  pub fn state(&self) -> &LstmState {
    &self.state
  }

  pub fn init_hidden(&mut self) {
    self.state = LstmState::zeros(self.config.hidden_dim);
  }

  /// Log-probabilities over the tag set, one row per element of `sequence`.
  #[instrument(level = "trace", skip_all, fields(len = sequence.len()))]
  pub fn forward(&mut self, sequence: &[usize]) -> Result<Array2<f64>> {
    if sequence.is_empty() {
      return Err(Error::InvalidArgument("empty sequence".to_string()));
    }
    if let Some(&bad) = sequence.iter().find(|&&idx| idx >= self.config.vocab_size) {
      return Err(Error::InvalidArgument(format!(
        "index {bad} outside a vocabulary of {}",
        self.config.vocab_size
      )));
    }

    let mut scores = Array2::<f64>::zeros((sequence.len(), self.config.tagset_size));
    let mut state = self.state.clone();
    for (t, &idx) in sequence.iter().enumerate() {
      state = self.lstm.step(self.embeddings.row(idx), &state);
      scores
        .row_mut(t)
        .assign(&self.hidden2tag.forward(state.hidden.view()));
    }
    if scores.iter().any(|v| !v.is_finite()) {
      return Err(Error::NumericalInstability(
        "tag scores have non-finite entries".to_string(),
      ));
    }
    self.state = state;
    Ok(log_softmax_rows(&scores))
  }

  /// Encodes `text` over the printable alphabet and tags it.
  pub fn tag_text(&mut self, text: &str) -> Result<Array2<f64>> {
    let sequence = encode(text)?;
    self.forward(&sequence)
  }

  ///
  /// Mean negative log-likelihood of each character of `text` given the characters before it,
  /// starting from a zeroed state. Needs the tag set to be the alphabet itself.
  ///
  pub fn next_char_loss(&mut self, text: &str) -> Result<f64> {
    let sequence = encode(text)?;
    if sequence.len() < 2 {
      return Err(Error::InvalidArgument(format!(
        "need at least two characters, got {}",
        sequence.len()
      )));
    }
    if self.config.tagset_size != self.config.vocab_size {
      return Err(Error::DataMismatch(format!(
        "{} tags cannot score a vocabulary of {}",
        self.config.tagset_size, self.config.vocab_size
      )));
    }
    self.init_hidden();
    let log_probs = self.forward(&sequence[..sequence.len() - 1])?;
    let total: f64 = sequence[1..]
      .iter()
      .enumerate()
      .map(|(t, &next)| -log_probs[[t, next]])
      .sum();
    let loss = total / (sequence.len() - 1) as f64;
    debug!(loss, "scored {} characters", sequence.len());
    Ok(loss)
  }
}
