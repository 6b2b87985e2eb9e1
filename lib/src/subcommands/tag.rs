use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, instrument};

use crate::{
  model::{LstmTagger, TaggerConfig},
  text::{encode, TextChunks},
  Error, Result,
};

/// Runs an LSTM character tagger over the validation chunks of a text and scores how well it
/// predicts each next character.
pub struct Tag {
  text_path: PathBuf,
  chunk_size: usize,
  val_ratio: f64,
  embedding_dim: usize,
  hidden_dim: usize,
  seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagSummary {
  /// Validation chunks made only of printable characters.
  pub scored: usize,
  pub skipped: usize,
  /// Mean next character negative log-likelihood over the scored chunks.
  pub loss: f64,
}

impl Tag {
  pub fn new(
    text_path: &Path,
    chunk_size: usize,
    val_ratio: f64,
    embedding_dim: usize,
    hidden_dim: usize,
    seed: u64,
  ) -> Self {
    Self {
      text_path: PathBuf::from(text_path),
      chunk_size,
      val_ratio,
      embedding_dim,
      hidden_dim,
      seed,
    }
  }

  #[instrument(level = "debug", skip(self), fields(text = ?self.text_path))]
  pub fn run(self) -> Result<TagSummary> {
    if self.chunk_size < 2 {
      return Err(Error::InvalidArgument(format!(
        "chunks of {} characters leave nothing to predict",
        self.chunk_size
      )));
    }
    let mut rng = StdRng::seed_from_u64(self.seed);
    let chunks = TextChunks::from_file(&self.text_path, self.chunk_size, self.val_ratio, &mut rng)?;
    let mut tagger = LstmTagger::new(
      TaggerConfig::characters(self.embedding_dim, self.hidden_dim),
      &mut rng,
    )?;

    let (encodable, skipped): (Vec<&String>, Vec<&String>) =
      chunks.val().iter().partition(|chunk| encode(chunk).is_ok());
    if encodable.is_empty() {
      return Err(Error::InvalidArgument(format!(
        "no scorable validation chunks among {}",
        chunks.val().len()
      )));
    }
    if !skipped.is_empty() {
      info!(
        "{} validation chunks contain characters outside the alphabet",
        skipped.len()
      );
    }

    let mut total = 0.0;
    for chunk in &encodable {
      total += tagger.next_char_loss(chunk)?;
    }
    let summary = TagSummary {
      scored: encodable.len(),
      skipped: skipped.len(),
      loss: total / encodable.len() as f64,
    };
    println!(
      "LSTM tagger on {} validation chunks Loss: {:.6}",
      summary.scored, summary.loss
    );
    Ok(summary)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::text::N_LETTERS;

  fn write_corpus(dir: &Path) -> PathBuf {
    let path = dir.join("corpus.txt");
    std::fs::write(&path, "It was the best of times, it was the worst of times.\n".repeat(4)).unwrap();
    path
  }

  #[test]
  fn scores_validation_chunks() {
    let scope = crate::utils::init_logging_tests();
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());

    let summary = Tag::new(&path, 10, 0.25, 8, 8, 3).run().unwrap();
    assert_eq!(summary.scored, 5);
    assert_eq!(summary.skipped, 0);
    assert!(summary.loss.is_finite());
    assert!((summary.loss - (N_LETTERS as f64).ln()).abs() < 1.5);
    assert_eq!(summary, Tag::new(&path, 10, 0.25, 8, 8, 3).run().unwrap());
    drop(scope);
  }

  #[test]
  fn rejects_unusable_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_corpus(dir.path());
    assert!(matches!(
      Tag::new(&path, 1, 0.25, 8, 8, 3).run(),
      Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
      Tag::new(&path, 10, 0.0, 8, 8, 3).run(),
      Err(Error::InvalidArgument(_))
    ));
    assert!(Tag::new(&path, 10, 0.25, 0, 8, 3).run().is_err());
    assert!(matches!(
      Tag::new(&dir.path().join("missing"), 10, 0.25, 8, 8, 3).run(),
      Err(Error::Io(_))
    ));
  }
}
