//!
//! Character level text data: the printable alphabet and fixed-size chunks of a text split into
//! training and validation sets.
//!

use std::{collections::HashMap, path::Path, sync::OnceLock};

use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};
use tracing::{debug, instrument};

use crate::{Error, Result};

/// Digits, ASCII letters, punctuation and whitespace, in that order.
pub const ALPHABET: &str = concat!(
  "0123456789",
  "abcdefghijklmnopqrstuvwxyz",
  "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
  "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~",
  " \t\n\r\x0b\x0c"
);

pub const N_LETTERS: usize = 100;

fn alphabet_index() -> &'static HashMap<char, usize> {
  static INDEX: OnceLock<HashMap<char, usize>> = OnceLock::new();
  INDEX.get_or_init(|| ALPHABET.chars().enumerate().map(|(i, c)| (c, i)).collect())
}

/// Position of `c` in [`ALPHABET`].
pub fn letter_index(c: char) -> Option<usize> {
  alphabet_index().get(&c).copied()
}

pub fn encode(text: &str) -> Result<Vec<usize>> {
  text
    .chars()
    .map(|c| {
      letter_index(c)
        .ok_or_else(|| Error::InvalidArgument(format!("{c:?} is not a printable character")))
    })
    .collect()
}

/// A text cut into chunks of `chunk_size` characters, partitioned into training and validation chunks.
#[derive(Debug, Clone)]
pub struct TextChunks {
  chunk_size: usize,
  val_ratio: f64,
  chunks: Vec<String>,
  train: Vec<String>,
  val: Vec<String>,
}

impl TextChunks {
  /// Characters past the last full chunk are dropped.
  pub fn new<R: Rng + ?Sized>(
    text: &str,
    chunk_size: usize,
    val_ratio: f64,
    rng: &mut R,
  ) -> Result<Self> {
    if chunk_size == 0 {
      return Err(Error::InvalidArgument(
        "chunk size must be positive".to_string(),
      ));
    }
    if !(0.0..1.0).contains(&val_ratio) {
      return Err(Error::InvalidArgument(format!(
        "validation ratio must be in [0, 1), got {val_ratio}"
      )));
    }
    let chars = text.chars().collect_vec();
    let chunks = chars
      .chunks_exact(chunk_size)
      .map(|chunk| chunk.iter().collect::<String>())
      .collect_vec();
    let mut out = Self {
      chunk_size,
      val_ratio,
      chunks,
      train: Vec::new(),
      val: Vec::new(),
    };
    out.reshuffle(rng);
    Ok(out)
  }

  #[instrument(level = "debug", skip(rng))]
  pub fn from_file<R: Rng + ?Sized>(
    path: &Path,
    chunk_size: usize,
    val_ratio: f64,
    rng: &mut R,
  ) -> Result<Self> {
    let text = std::fs::read_to_string(path)?;
    Self::new(&text, chunk_size, val_ratio, rng)
  }

  /// Draws a new random train/validation partition of the same chunks.
  pub fn reshuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
    let n_val = (self.chunks.len() as f64 * self.val_ratio) as usize;
    let mut perm = (0..self.chunks.len()).collect_vec();
    perm.shuffle(rng);
    let (val, train) = perm.split_at(n_val);
    self.val = val.iter().map(|&i| self.chunks[i].clone()).collect();
    self.train = train.iter().map(|&i| self.chunks[i].clone()).collect();
    debug!(
      "{} chunks of {}: {} train, {} validation",
      self.chunks.len(),
      self.chunk_size,
      self.train.len(),
      self.val.len()
    );
  }

  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  pub fn chunks(&self) -> &[String] {
    &self.chunks
  }

  pub fn train(&self) -> &[String] {
    &self.train
  }

  pub fn val(&self) -> &[String] {
    &self.val
  }
}
