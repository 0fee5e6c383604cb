use std::sync::Arc;

use glam::DVec3;

use super::*;
use crate::error::PvsError;
use crate::grid::{HierarchicalOctreeGrid, RegularGrid};

/// Regular 2x2x2 grid over [-10, 10]^3 with model 0 node 3 visible in cell 0.
fn sample_grid() -> Grid {
  let mut grid = RegularGrid::new(2, 10.0, DVec3::ZERO, vec![16]);
  grid.set_cell_visibility(0, 0, 3, true);
  Grid::from(grid)
}

const CELL_0: DVec3 = DVec3::new(-5.0, -5.0, -5.0);
const CELL_7: DVec3 = DVec3::new(5.0, 5.0, 5.0);

// =========================================================================
// Fail-open
// =========================================================================

#[test]
fn test_fresh_database_answers_true() {
  let database = PvsDatabase::new();
  assert!(database.is_activated());
  assert!(!database.has_grid());
  for model in 0..4 {
    for node in 0..64 {
      assert!(database.get_viewer_visibility(model, node));
    }
  }
}

#[test]
fn test_deactivated_answers_true_despite_grid() {
  let database = PvsDatabase::new();
  database.set_grid(sample_grid());
  database.set_viewer_position(CELL_7);
  assert!(!database.get_viewer_visibility(0, 3));

  database.activate(false);
  assert!(!database.is_activated());
  assert!(database.get_viewer_visibility(0, 3));

  database.activate(true);
  assert!(!database.get_viewer_visibility(0, 3));
}

#[test]
fn test_viewer_outside_grid_answers_true() {
  let database = PvsDatabase::new();
  database.set_grid(sample_grid());
  database.set_viewer_position(DVec3::splat(50.0));
  assert_eq!(database.current_cell_index(), None);
  assert!(database.get_viewer_visibility(0, 9));
}

#[test]
fn test_unload_returns_to_fail_open() {
  let database = PvsDatabase::new();
  database.set_grid(sample_grid());
  database.set_viewer_position(CELL_7);
  assert!(!database.get_viewer_visibility(0, 3));

  database.unload();
  assert!(database.get_viewer_visibility(0, 3));
  assert_eq!(database.current_cell_index(), None);
}

// =========================================================================
// Queries
// =========================================================================

#[test]
fn test_queries_follow_viewer_cell() {
  let database = PvsDatabase::new();
  database.set_grid(sample_grid());

  database.set_viewer_position(CELL_0);
  assert_eq!(database.current_cell_index(), Some(0));
  assert!(database.get_viewer_visibility(0, 3));
  assert!(!database.get_viewer_visibility(0, 4));

  database.set_viewer_position(CELL_7);
  assert_eq!(database.current_cell_index(), Some(7));
  assert!(!database.get_viewer_visibility(0, 3));
  assert_eq!(database.viewer_position(), Some(CELL_7));
}

/// Position set before any grid is loaded is resolved on load.
#[test]
fn test_position_before_load_is_resolved() {
  let database = PvsDatabase::new();
  database.set_viewer_position(CELL_0);
  assert_eq!(database.current_cell_index(), None);

  database.set_grid(sample_grid());
  assert_eq!(database.current_cell_index(), Some(0));
  assert!(!database.get_viewer_visibility(0, 5));
}

#[test]
fn test_hierarchical_queries_walk_ancestors() {
  let mut grid = HierarchicalOctreeGrid::new(2, 20.0, DVec3::ZERO, vec![8]);
  for index in 0..8 {
    grid.set_cell_visibility(index, 0, 2, true);
  }
  grid.combine_visibility(0);

  let database = PvsDatabase::new();
  database.set_grid(Grid::from(grid));
  database.set_viewer_position(CELL_0);
  assert!(database.get_viewer_visibility(0, 2));
  assert!(!database.get_viewer_visibility(0, 1));
}

// =========================================================================
// Loading
// =========================================================================

#[test]
fn test_load_from_files() {
  let dir = tempfile::tempdir().expect("tempdir");
  let grid_path = dir.path().join("scene.grid");
  let pvs_path = dir.path().join("scene.pvs");
  sample_grid().save(&grid_path, &pvs_path).expect("save");

  let database = PvsDatabase::shared();
  database.set_viewer_position(CELL_0);
  assert!(database.load_pvs_from_file(&grid_path, &pvs_path).expect("load"));

  assert_eq!(database.grid_type(), Some(GridType::Regular));
  assert!(database.get_viewer_visibility(0, 3));
  assert!(!database.get_viewer_visibility(0, 15));
}

#[test]
fn test_failed_load_keeps_previous_grid() {
  let dir = tempfile::tempdir().expect("tempdir");
  let grid_path = dir.path().join("broken.grid");
  let pvs_path = dir.path().join("broken.pvs");
  std::fs::write(&grid_path, "voronoi\n1 1 0 0 0\n0\n").expect("write");

  let database = PvsDatabase::new();
  database.set_grid(sample_grid());
  database.set_viewer_position(CELL_7);

  let err = database.load_pvs_from_file(&grid_path, &pvs_path).unwrap_err();
  assert!(matches!(err, PvsError::UnknownGridType(_)));
  assert!(database.has_grid());
  assert_eq!(database.current_cell_index(), Some(7));
  assert!(!database.get_viewer_visibility(0, 3));

  let missing = dir.path().join("missing.grid");
  assert!(database.load_pvs_from_file(&missing, &pvs_path).is_err());
  assert!(database.has_grid());
}

/// Corrupt resolutions fail the load instead of overflowing or allocating.
#[test]
fn test_oversized_regular_grid_is_rejected() {
  let dir = tempfile::tempdir().expect("tempdir");
  let grid_path = dir.path().join("huge.grid");
  let pvs_path = dir.path().join("huge.pvs");
  std::fs::write(&pvs_path, b"").expect("write");

  let database = PvsDatabase::new();
  database.set_grid(sample_grid());

  // 3000000^3 does not fit in a cell count.
  std::fs::write(&grid_path, "regular\n3000000 1 0 0 0\n1\n8\n").expect("write");
  let err = database.load_pvs_from_file(&grid_path, &pvs_path).unwrap_err();
  assert!(matches!(err, PvsError::Parse { line: 2, .. }));

  // Fits, but the visibility file is far too short for it.
  std::fs::write(&grid_path, "regular\n2000 1 0 0 0\n1\n8\n").expect("write");
  let err = database.load_pvs_from_file(&grid_path, &pvs_path).unwrap_err();
  assert!(matches!(err, PvsError::VisibilitySize { found: 0, .. }));

  // No models, so no visibility bytes to compare against.
  std::fs::write(&grid_path, "regular\n2000 1 0 0 0\n0\n").expect("write");
  let err = database.load_pvs_from_file(&grid_path, &pvs_path).unwrap_err();
  assert!(matches!(err, PvsError::Parse { line: 2, .. }));

  assert!(database.has_grid());
  assert_eq!(database.grid_type(), Some(GridType::Regular));
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn test_concurrent_readers_and_writer() {
  let database = PvsDatabase::shared();
  database.set_grid(sample_grid());
  database.set_viewer_position(CELL_0);

  std::thread::scope(|scope| {
    for _ in 0..4 {
      let database = Arc::clone(&database);
      scope.spawn(move || {
        for _ in 0..1000 {
          // Either cell 0 (visible) or cell 7 (not visible); never a panic.
          let _ = database.get_viewer_visibility(0, 3);
          assert!(!database.get_viewer_visibility(0, 9));
        }
      });
    }
    scope.spawn(|| {
      for step in 0..1000 {
        let position = if step % 2 == 0 { CELL_7 } else { CELL_0 };
        database.set_viewer_position(position);
      }
    });
  });

  assert_eq!(database.current_cell_index(), Some(0));
}
