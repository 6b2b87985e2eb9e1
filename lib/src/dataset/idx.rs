//!
//! Readers for the IDX files MNIST is distributed in.
//!
//! Both flavours start with a big-endian u32 magic number followed by big-endian u32 dimensions:
//!   images (idx3): magic 2051, count, rows, cols, then count * rows * cols pixel bytes
//!   labels (idx1): magic 2049, count, then count label bytes
//!

use std::path::Path;

use tracing::{debug, instrument};

use crate::{Error, Result};

pub const IMAGES_MAGIC: u32 = 2051;
pub const LABELS_MAGIC: u32 = 2049;

/// Raw images as stored in an idx3 file: one byte per pixel, row major, image after image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitImages {
  pub rows: usize,
  pub cols: usize,
  pub pixels: Vec<u8>,
}

impl DigitImages {
  pub fn new(rows: usize, cols: usize, pixels: Vec<u8>) -> Result<Self> {
    if rows == 0 || cols == 0 {
      return Err(Error::InvalidArgument(format!(
        "image dimensions must be positive, got {rows}x{cols}"
      )));
    }
    if pixels.len() % (rows * cols) != 0 {
      return Err(Error::DataMismatch(format!(
        "{} pixel bytes do not split into {rows}x{cols} images",
        pixels.len()
      )));
    }
    Ok(Self { rows, cols, pixels })
  }

  pub fn pixels_per_image(&self) -> usize {
    self.rows * self.cols
  }

  pub fn len(&self) -> usize {
    self.pixels.len() / self.pixels_per_image()
  }

  pub fn is_empty(&self) -> bool {
    self.pixels.is_empty()
  }

  /// Panics if `idx >= len`.
  pub fn image(&self, idx: usize) -> &[u8] {
    let size = self.pixels_per_image();
    &self.pixels[idx * size..(idx + 1) * size]
  }
}

struct Reader<'a> {
  bytes: &'a [u8],
  pos: usize,
  origin: &'a Path,
}

impl<'a> Reader<'a> {
  fn new(bytes: &'a [u8], origin: &'a Path) -> Self {
    Self {
      bytes,
      pos: 0,
      origin,
    }
  }

  fn take(&mut self, n: usize) -> Result<&'a [u8]> {
    let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
    match end {
      Some(end) => {
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
      }
      None => Err(format_error(
        self.origin,
        format!(
          "truncated: wanted {n} bytes at offset {}, file has {}",
          self.pos,
          self.bytes.len()
        ),
      )),
    }
  }

  fn u32(&mut self) -> Result<u32> {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(self.take(4)?);
    Ok(u32::from_be_bytes(buf))
  }

  fn magic(&mut self, expected: u32) -> Result<()> {
    let magic = self.u32()?;
    if magic != expected {
      return Err(format_error(
        self.origin,
        format!("magic number {magic}, expected {expected}"),
      ));
    }
    Ok(())
  }
}

fn format_error(origin: &Path, reason: String) -> Error {
  Error::Format {
    path: origin.to_path_buf(),
    reason,
  }
}

fn clip(count: usize, limit: Option<usize>) -> usize {
  limit.map_or(count, |limit| limit.min(count))
}

/// Parses an idx3 image file held in memory, keeping at most `limit` leading images.
pub fn parse_idx_images(bytes: &[u8], limit: Option<usize>, origin: &Path) -> Result<DigitImages> {
  let mut reader = Reader::new(bytes, origin);
  reader.magic(IMAGES_MAGIC)?;
  let count = reader.u32()? as usize;
  let rows = reader.u32()? as usize;
  let cols = reader.u32()? as usize;
  if rows == 0 || cols == 0 {
    return Err(format_error(origin, format!("zero sized images {rows}x{cols}")));
  }
  let kept = clip(count, limit);
  let size = kept
    .checked_mul(rows * cols)
    .ok_or_else(|| format_error(origin, format!("{kept} images of {rows}x{cols} overflow")))?;
  let pixels = reader.take(size)?.to_vec();
  debug!("{:?}: {kept} of {count} images, {rows}x{cols}", origin);
  DigitImages::new(rows, cols, pixels)
}

/// Parses an idx1 label file held in memory, keeping at most `limit` leading labels.
pub fn parse_idx_labels(bytes: &[u8], limit: Option<usize>, origin: &Path) -> Result<Vec<u8>> {
  let mut reader = Reader::new(bytes, origin);
  reader.magic(LABELS_MAGIC)?;
  let count = reader.u32()? as usize;
  let kept = clip(count, limit);
  let labels = reader.take(kept)?.to_vec();
  debug!("{:?}: {kept} of {count} labels", origin);
  Ok(labels)
}

#[instrument(level = "debug")]
pub fn read_idx_images(path: &Path, limit: Option<usize>) -> Result<DigitImages> {
  let bytes = std::fs::read(path)?;
  parse_idx_images(&bytes, limit, path)
}

#[instrument(level = "debug")]
pub fn read_idx_labels(path: &Path, limit: Option<usize>) -> Result<Vec<u8>> {
  let bytes = std::fs::read(path)?;
  parse_idx_labels(&bytes, limit, path)
}

/// Encoders used to write small idx fixtures in tests.
#[cfg(test)]
pub(crate) mod fixtures {
  use super::{IMAGES_MAGIC, LABELS_MAGIC};

  pub fn idx3_bytes(rows: u32, cols: u32, images: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
    out.extend_from_slice(&(images.len() as u32).to_be_bytes());
    out.extend_from_slice(&rows.to_be_bytes());
    out.extend_from_slice(&cols.to_be_bytes());
    for image in images {
      out.extend_from_slice(image);
    }
    out
  }

  pub fn idx1_bytes(labels: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
    out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    out.extend_from_slice(labels);
    out
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::fixtures::{idx1_bytes, idx3_bytes};
  use super::*;

  #[test]
  fn parses_images_and_respects_limit() {
    let images = vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9, 10, 11]];
    let bytes = idx3_bytes(2, 2, &images);

    let all = parse_idx_images(&bytes, None, Path::new("mem")).unwrap();
    assert_eq!((all.rows, all.cols, all.len()), (2, 2, 3));
    assert_eq!(all.image(2), &[8, 9, 10, 11]);

    let two = parse_idx_images(&bytes, Some(2), Path::new("mem")).unwrap();
    assert_eq!(two.len(), 2);
    assert_eq!(two.image(1), &[4, 5, 6, 7]);

    let more = parse_idx_images(&bytes, Some(100), Path::new("mem")).unwrap();
    assert_eq!(more.len(), 3);
  }

  #[test]
  fn parses_labels() {
    let bytes = idx1_bytes(&[7, 2, 1, 0]);
    let labels = parse_idx_labels(&bytes, Some(3), Path::new("mem")).unwrap();
    assert_eq!(labels, vec![7, 2, 1]);
  }

  #[test]
  fn rejects_wrong_magic() {
    let bytes = idx1_bytes(&[1, 2]);
    let err = parse_idx_images(&bytes, None, Path::new("labels.idx1")).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
  }

  #[test]
  fn rejects_truncated_payload() {
    let mut bytes = idx3_bytes(2, 2, &[vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
    bytes.truncate(bytes.len() - 1);
    let err = parse_idx_images(&bytes, None, Path::new("short")).unwrap_err();
    assert!(err.to_string().contains("truncated"), "{err}");

    let err = parse_idx_labels(&[0, 0, 8], None, Path::new("tiny")).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
  }

  #[test]
  fn reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train-labels.idx1-ubyte");
    std::fs::write(&path, idx1_bytes(&[3, 3, 9])).unwrap();
    assert_eq!(read_idx_labels(&path, None).unwrap(), vec![3, 3, 9]);

    let missing = read_idx_labels(&dir.path().join("nope"), None).unwrap_err();
    assert!(matches!(missing, Error::Io(_)));
  }
}
