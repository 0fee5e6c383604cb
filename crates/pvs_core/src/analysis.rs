//! Occlusion statistics over a finished grid.
//!
//! Occlusion of a cell is the fraction of all LOD nodes it does *not* see.
//! The report is a diagnostic artifact and plays no part in runtime queries.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{PvsError, Result};
use crate::grid::PvsGrid;

/// Visible node count of one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellOcclusion {
  pub visible: u64,
  pub total: u64,
}

impl CellOcclusion {
  /// Fraction of nodes hidden from the cell. A grid without nodes hides nothing.
  pub fn occlusion(&self) -> f64 {
    if self.total == 0 {
      return 0.0;
    }
    1.0 - self.visible as f64 / self.total as f64
  }
}

/// Per-cell and aggregate occlusion of a grid.
#[derive(Clone, Debug, PartialEq)]
pub struct OcclusionReport {
  pub cells: Vec<CellOcclusion>,
  pub average_occlusion: f64,
  pub min_occlusion: f64,
  pub max_occlusion: f64,
  /// Cell counts per occlusion bucket of equal width over `[0, 1]`.
  /// Full occlusion falls into the last bucket.
  pub histogram: Vec<usize>,
}

impl OcclusionReport {
  pub const DEFAULT_BUCKETS: usize = 10;

  pub fn compute<G: PvsGrid + ?Sized>(grid: &G) -> Self {
    Self::compute_with_buckets(grid, Self::DEFAULT_BUCKETS)
  }

  /// # Panics
  /// Panics if `buckets` is zero.
  pub fn compute_with_buckets<G: PvsGrid + ?Sized>(grid: &G, buckets: usize) -> Self {
    assert!(buckets > 0, "occlusion histogram needs at least one bucket");

    let total = grid.total_node_count();
    let cells: Vec<CellOcclusion> = (0..grid.get_cell_count())
      .map(|index| CellOcclusion {
        visible: grid.count_cell_visible(index) as u64,
        total,
      })
      .collect();

    let mut histogram = vec![0; buckets];
    let mut sum = 0.0;
    let mut min_occlusion = f64::INFINITY;
    let mut max_occlusion = f64::NEG_INFINITY;
    for cell in &cells {
      let occlusion = cell.occlusion();
      sum += occlusion;
      min_occlusion = min_occlusion.min(occlusion);
      max_occlusion = max_occlusion.max(occlusion);
      let bucket = ((occlusion * buckets as f64).floor() as usize).min(buckets - 1);
      histogram[bucket] += 1;
    }

    if cells.is_empty() {
      min_occlusion = 0.0;
      max_occlusion = 0.0;
    }
    let average_occlusion = if cells.is_empty() {
      0.0
    } else {
      sum / cells.len() as f64
    };

    Self {
      cells,
      average_occlusion,
      min_occlusion,
      max_occlusion,
      histogram,
    }
  }

  /// Write the human-readable report.
  pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
    let buckets = self.histogram.len();
    writeln!(writer, "PVS occlusion report")?;
    writeln!(writer, "cells: {}", self.cells.len())?;
    if let Some(cell) = self.cells.first() {
      writeln!(writer, "nodes per cell: {}", cell.total)?;
    }
    writeln!(
      writer,
      "occlusion: average {:.2}% min {:.2}% max {:.2}%",
      self.average_occlusion * 100.0,
      self.min_occlusion * 100.0,
      self.max_occlusion * 100.0
    )?;

    writeln!(writer)?;
    writeln!(writer, "histogram:")?;
    for (bucket, count) in self.histogram.iter().enumerate() {
      let low = bucket as f64 * 100.0 / buckets as f64;
      let high = (bucket + 1) as f64 * 100.0 / buckets as f64;
      let close = if bucket + 1 == buckets { ']' } else { ')' };
      writeln!(writer, "  [{low:5.1}%, {high:5.1}%{close} {count}")?;
    }

    writeln!(writer)?;
    writeln!(writer, "per cell:")?;
    for (index, cell) in self.cells.iter().enumerate() {
      writeln!(
        writer,
        "  cell {index}: {}/{} visible ({:.2}% occluded)",
        cell.visible,
        cell.total,
        cell.occlusion() * 100.0
      )?;
    }
    Ok(())
  }

  pub fn save_to_file(&self, path: &Path) -> Result<()> {
    let io = |err| PvsError::io(path, err);
    let mut writer = BufWriter::new(File::create(path).map_err(io)?);
    self.write_to(&mut writer).map_err(io)?;
    writer.flush().map_err(io)?;
    info!(path = %path.display(), cells = self.cells.len(), "wrote occlusion report");
    Ok(())
  }
}
