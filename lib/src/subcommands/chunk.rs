use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

use crate::{
  text::{encode, TextChunks},
  Result,
};

/// Cuts a text file into fixed-size character chunks and splits them into training and validation sets.
pub struct Chunk {
  text_path: PathBuf,
  chunk_size: usize,
  val_ratio: f64,
  seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
  pub chunks: usize,
  pub train: usize,
  pub val: usize,
  /// Training chunks made only of printable characters.
  pub encodable: usize,
}

impl Chunk {
  pub fn new(text_path: &Path, chunk_size: usize, val_ratio: f64, seed: u64) -> Self {
    Self {
      text_path: PathBuf::from(text_path),
      chunk_size,
      val_ratio,
      seed,
    }
  }

  pub fn run(self) -> Result<ChunkSummary> {
    let mut rng = StdRng::seed_from_u64(self.seed);
    let chunks = TextChunks::from_file(&self.text_path, self.chunk_size, self.val_ratio, &mut rng)?;
    let encodable = chunks.train().iter().filter(|c| encode(c).is_ok()).count();
    let summary = ChunkSummary {
      chunks: chunks.chunks().len(),
      train: chunks.train().len(),
      val: chunks.val().len(),
      encodable,
    };
    if encodable < summary.train {
      info!(
        "{} training chunks contain characters outside the alphabet",
        summary.train - encodable
      );
    }
    println!(
      "{} chunks of {} characters: {} train, {} validation",
      summary.chunks, self.chunk_size, summary.train, summary.val
    );
    Ok(summary)
  }
}
