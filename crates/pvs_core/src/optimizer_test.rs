use glam::DVec3;

use super::*;
use crate::grid::{HierarchicalOctreeGrid, RegularGrid};
use crate::types::NodeId;

fn mark(grid: &mut OctreeGrid, index: usize, nodes: impl IntoIterator<Item = NodeId>) {
  for node in nodes {
    grid.set_cell_visibility(index, 0, node, true);
  }
}

/// Depth-2 octree where every leaf sees 60 of 100 nodes, union = all 100.
fn sixty_percent_grid() -> OctreeGrid {
  let mut grid = OctreeGrid::new(2, 20.0, DVec3::ZERO, vec![100]);
  for index in 0..7 {
    mark(&mut grid, index, 0..60);
  }
  mark(&mut grid, 7, 40..100);
  grid
}

// =========================================================================
// Threshold
// =========================================================================

#[test]
fn test_exact_threshold_collapses() {
  let mut grid = sixty_percent_grid();
  let stats = GridOptimizer::default().optimize_octree(&mut grid);

  assert_eq!(
    stats,
    OptimizerStats {
      collapses: 1,
      cells_before: 8,
      cells_after: 1,
    }
  );
  assert!(grid.root().is_leaf());
  assert_eq!(grid.get_cell_at_index(0).count_visible(), 100);
  assert_eq!(grid.get_cell_at_index(0).get_size(), DVec3::splat(20.0));
}

/// One child at 0.59 blocks the whole collapse.
#[test]
fn test_single_child_below_threshold_blocks() {
  let mut grid = sixty_percent_grid();
  grid.set_cell_visibility(3, 0, 59, false);
  let before = grid.clone();

  let stats = GridOptimizer::default().optimize_octree(&mut grid);

  assert_eq!(stats.collapses, 0);
  assert_eq!(stats.cells_after, 8);
  assert_eq!(grid, before);
}

#[test]
fn test_custom_threshold() {
  let mut grid = sixty_percent_grid();
  grid.set_cell_visibility(3, 0, 59, false);

  let optimizer = GridOptimizer::new(OptimizerConfig {
    collapse_threshold: 0.5,
  });
  assert_eq!(optimizer.config().collapse_threshold, 0.5);
  assert_eq!(optimizer.optimize_octree(&mut grid).collapses, 1);
}

#[test]
fn test_default_threshold_constant() {
  assert_eq!(OptimizerConfig::default().collapse_threshold, 0.6);
  assert_eq!(OptimizerConfig::DEFAULT_COLLAPSE_THRESHOLD, 0.6);
}

// =========================================================================
// Structure
// =========================================================================

#[test]
fn test_empty_children_collapse() {
  let mut grid = OctreeGrid::new(2, 20.0, DVec3::ZERO, vec![4]);
  let stats = GridOptimizer::default().optimize_octree(&mut grid);
  assert_eq!(stats.collapses, 1);
  assert_eq!(grid.get_cell_count(), 1);
  assert!(!grid.get_cell_at_index(0).contains_visibility_data());
}

/// Collapses cascade upward once all siblings have become leaves.
#[test]
fn test_collapse_cascades_to_root() {
  let mut grid = OctreeGrid::new(3, 8.0, DVec3::ZERO, vec![4]);
  for index in 0..grid.get_cell_count() {
    mark(&mut grid, index, [1, 2]);
  }

  let stats = GridOptimizer::default().optimize_octree(&mut grid);

  assert_eq!(stats.collapses, 9);
  assert_eq!(stats.cells_before, 64);
  assert_eq!(stats.cells_after, 1);
  assert_eq!(grid.get_cell_at_index(0).visible_nodes_of_model(0), vec![1, 2]);
}

/// Only disagreeing subtrees survive; indices are rebuilt afterwards.
#[test]
fn test_partial_collapse_recomputes_indices() {
  let mut grid = OctreeGrid::new(3, 8.0, DVec3::ZERO, vec![8]);
  for index in 0..grid.get_cell_count() {
    mark(&mut grid, index, [0]);
  }
  // First subtree (leaves 0..8): one leaf sees far more than the others.
  mark(&mut grid, 0, 1..8);

  let stats = GridOptimizer::default().optimize_octree(&mut grid);

  // Seven depth-two subtrees collapse; the root keeps mixed children.
  assert_eq!(stats.collapses, 7);
  assert_eq!(grid.get_cell_count(), 8 + 7);
  assert!(!grid.root().is_leaf());
  for index in 0..grid.get_cell_count() {
    let center = grid.get_cell_at_index(index).get_position_center();
    assert_eq!(grid.get_cell_index_at_position(center), Some(index));
  }
  assert_eq!(grid.get_cell_at_index(0).count_visible(), 8);
}

#[test]
fn test_non_octree_grids_rejected() {
  let optimizer = GridOptimizer::default();

  let mut regular = Grid::from(RegularGrid::new(2, 1.0, DVec3::ZERO, vec![1]));
  assert!(matches!(
    optimizer.optimize_grid(&mut regular),
    Err(PvsError::UnsupportedGrid(crate::grid::GridType::Regular))
  ));

  let mut hierarchical = Grid::from(HierarchicalOctreeGrid::new(2, 1.0, DVec3::ZERO, vec![1]));
  assert!(optimizer.optimize_grid(&mut hierarchical).is_err());

  let mut octree = Grid::from(OctreeGrid::new(2, 1.0, DVec3::ZERO, vec![1]));
  assert_eq!(optimizer.optimize_grid(&mut octree).expect("octree").collapses, 1);
}
