//! Runtime PVS database.
//!
//! One instance is created by the application and shared as
//! `Arc<PvsDatabase>` between render and streaming threads. All state sits
//! behind a single reader-writer lock.
//!
//! Queries fail open: while the database is deactivated, has no grid, or the
//! viewer is outside the grid, every node is reported visible.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::DVec3;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::grid::{Grid, GridType, PvsGrid};
use crate::types::{ModelId, NodeId};

#[derive(Debug)]
struct DatabaseState {
  grid: Option<Grid>,
  viewer_position: Option<DVec3>,
  current_cell: Option<usize>,
  activated: bool,
}

impl DatabaseState {
  fn resolve_cell(&mut self) {
    self.current_cell = match (&self.grid, self.viewer_position) {
      (Some(grid), Some(position)) => grid.get_cell_index_at_position(position),
      _ => None,
    };
  }
}

/// Thread-safe store of the active PVS.
#[derive(Debug)]
pub struct PvsDatabase {
  state: RwLock<DatabaseState>,
}

impl Default for PvsDatabase {
  fn default() -> Self {
    Self::new()
  }
}

impl PvsDatabase {
  /// Empty, activated database. Answers `true` until a grid is loaded.
  pub fn new() -> Self {
    Self {
      state: RwLock::new(DatabaseState {
        grid: None,
        viewer_position: None,
        current_cell: None,
        activated: true,
      }),
    }
  }

  /// Empty database behind a shared handle.
  pub fn shared() -> Arc<Self> {
    Arc::new(Self::new())
  }

  fn read(&self) -> RwLockReadGuard<'_, DatabaseState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, DatabaseState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Load a grid file and its visibility file, replacing the current grid.
  ///
  /// Parsing happens before the lock is taken; on failure the previously
  /// loaded grid stays in place.
  #[tracing::instrument(skip_all, name = "database::load")]
  pub fn load_pvs_from_file(&self, grid_path: &Path, pvs_path: &Path) -> Result<bool> {
    let grid = match Grid::load(grid_path, pvs_path) {
      Ok(grid) => grid,
      Err(err) => {
        warn!(
          grid = %grid_path.display(),
          pvs = %pvs_path.display(),
          error = %err,
          "failed to load PVS, keeping previous state"
        );
        return Err(err);
      }
    };

    info!(
      grid_type = %grid.grid_type(),
      cells = grid.get_cell_count(),
      models = grid.get_num_models(),
      "loaded PVS"
    );
    self.replace_grid(Some(grid));
    Ok(true)
  }

  /// Install an in-memory grid, e.g. straight from the sampler.
  pub fn set_grid(&self, grid: Grid) {
    self.replace_grid(Some(grid));
  }

  /// Drop the current grid. Queries answer `true` afterwards.
  pub fn unload(&self) {
    self.replace_grid(None);
  }

  fn replace_grid(&self, grid: Option<Grid>) {
    let mut state = self.write();
    state.grid = grid;
    state.resolve_cell();
  }

  /// Move the viewer. Repeating the last position is a no-op.
  pub fn set_viewer_position(&self, position: DVec3) {
    if self.read().viewer_position == Some(position) {
      return;
    }
    let mut state = self.write();
    if state.viewer_position == Some(position) {
      return;
    }
    state.viewer_position = Some(position);
    state.resolve_cell();
    debug!(%position, cell = ?state.current_cell, "viewer moved");
  }

  /// Whether `(model, node)` may be visible from the viewer's cell.
  pub fn get_viewer_visibility(&self, model: ModelId, node: NodeId) -> bool {
    let state = self.read();
    if !state.activated {
      return true;
    }
    match (&state.grid, state.current_cell) {
      (Some(grid), Some(cell)) => grid.get_cell_visibility(cell, model, node),
      _ => true,
    }
  }

  pub fn activate(&self, activated: bool) {
    self.write().activated = activated;
  }

  pub fn is_activated(&self) -> bool {
    self.read().activated
  }

  pub fn has_grid(&self) -> bool {
    self.read().grid.is_some()
  }

  /// Variant of the loaded grid, if any.
  pub fn grid_type(&self) -> Option<GridType> {
    self.read().grid.as_ref().map(PvsGrid::grid_type)
  }

  /// Cell the viewer currently resolves to.
  pub fn current_cell_index(&self) -> Option<usize> {
    self.read().current_cell
  }

  pub fn viewer_position(&self) -> Option<DVec3> {
    self.read().viewer_position
  }
}

#[cfg(test)]
#[path = "database_test.rs"]
mod database_test;
