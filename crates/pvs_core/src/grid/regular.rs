//! RegularGrid - `N x N x N` uniform cells over a cubic bound.
//!
//! Cells are stored row-major: `index = z * N * N + y * N + x`.

use glam::DVec3;

use super::{expect_grid_type, GridType, PvsGrid};
use crate::bounds::Aabb3d;
use crate::error::{PvsError, Result};
use crate::store::GridFile;
use crate::types::NodeCount;
use crate::view_cell::ViewCell;

/// Uniform grid of cubic view cells.
#[derive(Clone, Debug, PartialEq)]
pub struct RegularGrid {
  cells_per_axis: usize,
  cell_size: f64,
  center: DVec3,
  cells: Vec<ViewCell>,
  ids: Vec<NodeCount>,
}

impl RegularGrid {
  /// Largest cell count accepted from a grid file (256 cells per axis).
  pub const MAX_CELL_COUNT: usize = 1 << 24;

  /// Create a grid of `cells_per_axis³` cells of edge `cell_size`, centered
  /// at `center`.
  ///
  /// # Panics
  /// Panics if `cells_per_axis` is zero or `cell_size` is not positive.
  pub fn new(cells_per_axis: usize, cell_size: f64, center: DVec3, ids: Vec<NodeCount>) -> Self {
    assert!(cells_per_axis > 0, "regular grid needs at least one cell per axis");
    assert!(cell_size > 0.0, "cell size must be positive, got {cell_size}");

    let min = center - DVec3::splat(cells_per_axis as f64 * cell_size * 0.5);
    let size = DVec3::splat(cell_size);
    let cell_count = cells_per_axis
      .checked_pow(3)
      .unwrap_or_else(|| panic!("{cells_per_axis} cells per axis overflows the cell count"));
    let mut cells = Vec::with_capacity(cell_count);
    for z in 0..cells_per_axis {
      for y in 0..cells_per_axis {
        for x in 0..cells_per_axis {
          let offset = DVec3::new(x as f64, y as f64, z as f64) + 0.5;
          cells.push(ViewCell::new(min + offset * cell_size, size));
        }
      }
    }

    Self {
      cells_per_axis,
      cell_size,
      center,
      cells,
      ids,
    }
  }

  #[inline]
  pub fn cells_per_axis(&self) -> usize {
    self.cells_per_axis
  }

  #[inline]
  pub fn cell_size(&self) -> f64 {
    self.cell_size
  }

  #[inline]
  pub fn center(&self) -> DVec3 {
    self.center
  }

  /// Linear index of grid coordinates.
  #[inline]
  pub fn cell_index(&self, x: usize, y: usize, z: usize) -> usize {
    let n = self.cells_per_axis;
    debug_assert!(x < n && y < n && z < n, "grid coordinate out of range");
    z * n * n + y * n + x
  }

  /// Grid coordinates of a linear index.
  #[inline]
  pub fn cell_coords(&self, index: usize) -> [usize; 3] {
    let n = self.cells_per_axis;
    [index % n, (index / n) % n, index / (n * n)]
  }
}

impl PvsGrid for RegularGrid {
  fn grid_type(&self) -> GridType {
    GridType::Regular
  }

  fn get_cell_count(&self) -> usize {
    self.cells.len()
  }

  fn get_cell_at_index(&self, index: usize) -> &ViewCell {
    &self.cells[index]
  }

  fn get_cell_at_index_mut(&mut self, index: usize) -> &mut ViewCell {
    &mut self.cells[index]
  }

  fn get_cell_index_at_position(&self, position: DVec3) -> Option<usize> {
    let bounds = self.bounds();
    if !bounds.contains_point(position) {
      return None;
    }

    // A point on the outer max face belongs to the last cell on that axis.
    let last = self.cells_per_axis - 1;
    let relative = (position - bounds.min) / self.cell_size;
    let axis = |value: f64| (value.floor() as usize).min(last);
    Some(self.cell_index(axis(relative.x), axis(relative.y), axis(relative.z)))
  }

  fn bounds(&self) -> Aabb3d {
    let half = self.cells_per_axis as f64 * self.cell_size * 0.5;
    Aabb3d::from_center_half_extents(self.center, DVec3::splat(half))
  }

  fn ids(&self) -> &[NodeCount] {
    &self.ids
  }

  fn cells_mut(&mut self) -> Vec<&mut ViewCell> {
    self.cells.iter_mut().collect()
  }

  fn storage_cells(&self) -> Vec<&ViewCell> {
    self.cells.iter().collect()
  }

  fn storage_cells_mut(&mut self) -> Vec<&mut ViewCell> {
    self.cells.iter_mut().collect()
  }

  fn to_grid_file(&self) -> GridFile {
    GridFile {
      grid_type: GridType::Regular,
      resolution: self.cells_per_axis as u32,
      cell_size: self.cell_size,
      center: self.center,
      splits: Vec::new(),
      ids: self.ids.clone(),
    }
  }

  fn from_grid_file(file: GridFile) -> Result<Self> {
    expect_grid_type(&file, GridType::Regular)?;
    if file.resolution == 0 || !(file.cell_size.is_finite() && file.cell_size > 0.0) {
      return Err(PvsError::parse(
        2,
        format!(
          "regular grid needs positive dimensions, got {} cells of size {}",
          file.resolution, file.cell_size
        ),
      ));
    }
    let cell_count = file.storage_cell_count()?;
    if cell_count > Self::MAX_CELL_COUNT {
      return Err(PvsError::parse(
        2,
        format!(
          "regular grid of {cell_count} cells exceeds the limit of {}",
          Self::MAX_CELL_COUNT
        ),
      ));
    }
    Ok(Self::new(
      file.resolution as usize,
      file.cell_size,
      file.center,
      file.ids,
    ))
  }
}

#[cfg(test)]
#[path = "regular_test.rs"]
mod regular_test;
