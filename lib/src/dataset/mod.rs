pub mod idx;

pub use idx::*;

use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{seq::SliceRandom, Rng};
use tracing::debug;

use crate::{Error, Result};

/// Pixel bytes are scaled into [0, 1] by this factor.
pub const PIXEL_SCALE: f64 = 255.0;
pub const DIGIT_CLASSES: u8 = 10;

fn check_target(target: u8) -> Result<()> {
  if target >= DIGIT_CLASSES {
    return Err(Error::InvalidArgument(format!(
      "target digit must be below {DIGIT_CLASSES}, got {target}"
    )));
  }
  Ok(())
}

/// 1.0 where the label equals `target`, 0.0 elsewhere.
pub fn extract_target_label(labels: &[u8], target: u8) -> Array1<f64> {
  labels
    .iter()
    .map(|&label| if label == target { 1.0 } else { 0.0 })
    .collect()
}

/// Keeps only the images (and their labels) of class `target`.
pub fn extract_target_samples(
  images: &DigitImages,
  labels: &[u8],
  target: u8,
) -> Result<(DigitImages, Vec<u8>)> {
  check_target(target)?;
  if images.len() != labels.len() {
    return Err(Error::DataMismatch(format!(
      "{} images but {} labels",
      images.len(),
      labels.len()
    )));
  }
  let keep = labels.iter().positions(|&label| label == target).collect_vec();
  let pixels = keep
    .iter()
    .flat_map(|&i| images.image(i).iter().copied())
    .collect();
  let kept = DigitImages::new(images.rows, images.cols, pixels)?;
  Ok((kept, vec![target; keep.len()]))
}

/// Feature matrix with one column per example, and its 0/1 labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
  features: Array2<f64>,
  labels: Array1<f64>,
}

impl Dataset {
  /// `features` is feature_dim x m, `labels` has length m.
  pub fn new(features: Array2<f64>, labels: Array1<f64>) -> Result<Self> {
    if features.nrows() == 0 {
      return Err(Error::InvalidArgument(
        "feature dimension must be positive".to_string(),
      ));
    }
    if features.ncols() != labels.len() {
      return Err(Error::DataMismatch(format!(
        "{} feature columns but {} labels",
        features.ncols(),
        labels.len()
      )));
    }
    if let Some(bad) = labels.iter().find(|&&y| y != 0.0 && y != 1.0) {
      return Err(Error::InvalidArgument(format!(
        "labels must be 0 or 1, found {bad}"
      )));
    }
    Ok(Self { features, labels })
  }

  /// Builds a dataset from per-example rows.
  pub fn from_rows(rows: &[Vec<f64>], labels: &[f64]) -> Result<Self> {
    let dim = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().find_position(|row| row.len() != dim) {
      return Err(Error::DataMismatch(format!(
        "row {i} has {} features, expected {dim}",
        row.len()
      )));
    }
    let flat = rows.iter().flatten().copied().collect_vec();
    let features = Array2::from_shape_vec((rows.len(), dim), flat)
      .map_err(|e| Error::DataMismatch(e.to_string()))?
      .reversed_axes();
    Self::new(features, Array1::from(labels.to_vec()))
  }

  /// Flattens the images, scales pixels into [0, 1] and labels `target` as 1, every other digit as 0.
  pub fn one_vs_rest(images: &DigitImages, labels: &[u8], target: u8) -> Result<Self> {
    check_target(target)?;
    if images.len() != labels.len() {
      return Err(Error::DataMismatch(format!(
        "{} images but {} labels",
        images.len(),
        labels.len()
      )));
    }
    let scaled = images
      .pixels
      .iter()
      .map(|&p| p as f64 / PIXEL_SCALE)
      .collect_vec();
    let features = Array2::from_shape_vec((images.len(), images.pixels_per_image()), scaled)
      .map_err(|e| Error::DataMismatch(e.to_string()))?
      .reversed_axes();
    let dataset = Self::new(features, extract_target_label(labels, target))?;
    debug!(
      "one-vs-rest dataset for digit {target}: {} examples, {} positive",
      dataset.len(),
      dataset.positives()
    );
    Ok(dataset)
  }

  pub fn features(&self) -> ArrayView2<'_, f64> {
    self.features.view()
  }

  pub fn labels(&self) -> ArrayView1<'_, f64> {
    self.labels.view()
  }

  pub fn feature_dim(&self) -> usize {
    self.features.nrows()
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn positives(&self) -> usize {
    self.labels.iter().filter(|&&y| y == 1.0).count()
  }

  /// Shuffles the examples and cuts them into batches of `batch_size`; the last batch may be short.
  pub fn batches<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<Batch>> {
    if batch_size == 0 {
      return Err(Error::InvalidArgument(
        "batch size must be positive".to_string(),
      ));
    }
    let mut order = (0..self.len()).collect_vec();
    order.shuffle(rng);
    Ok(
      order
        .chunks(batch_size)
        .map(|idx| Batch {
          features: self.features.select(Axis(1), idx),
          labels: self.labels.select(Axis(0), idx),
        })
        .collect(),
    )
  }
}

/// A shuffled slice of a [`Dataset`], laid out the same way.
#[derive(Debug, Clone)]
pub struct Batch {
  pub features: Array2<f64>,
  pub labels: Array1<f64>,
}

impl Batch {
  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}
