//! Error type for grid and visibility file handling.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::grid::GridType;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PvsError>;

/// Recoverable failures: configuration and file-format problems.
///
/// Index and range violations are contract errors and panic instead.
#[derive(Debug, Error)]
pub enum PvsError {
  #[error("I/O error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("unknown grid type tag `{0}`")]
  UnknownGridType(String),

  #[error("grid file describes a `{found}` grid, expected `{expected}`")]
  GridTypeMismatch { expected: GridType, found: GridType },

  #[error("malformed grid file at line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error("visibility data is {found} bytes, grid layout requires {expected}")]
  VisibilitySize { expected: usize, found: usize },

  #[error("operation requires an octree grid, got `{0}`")]
  UnsupportedGrid(GridType),
}

impl PvsError {
  pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
    Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
    Self::Parse {
      line,
      message: message.into(),
    }
  }
}
