use glam::DVec3;

use super::*;
use crate::bounds::Aabb3d;
use crate::grid::RegularGrid;
use crate::lod::{CompleteLodTree, LodModel};
use crate::sampler::test_utils::TableLod;

fn cell() -> ViewCell {
  ViewCell::new(DVec3::ZERO, DVec3::ONE)
}

/// Node set holding `nodes` of model 0.
fn recorded(nodes: &[NodeId]) -> ViewCell {
  let mut set = ViewCell::default();
  for &node in nodes {
    set.set_visibility(0, node, true);
  }
  set
}

#[test]
fn test_up_and_down_from_single_node() {
  let lod = TableLod::binary16();
  let mut cell = cell();
  cell.set_visibility(0, 3, true);

  let marked = propagate_cell(&mut cell, &recorded(&[3]), &lod);

  assert_eq!(marked, 3);
  assert_eq!(cell.visible_nodes_of_model(0), vec![1, 3, 6, 7]);
}

#[test]
fn test_leaf_only_walks_up() {
  let lod = TableLod::binary16();
  let mut cell = cell();
  cell.set_visibility(0, 5, true);

  propagate_cell(&mut cell, &recorded(&[5]), &lod);
  assert_eq!(cell.visible_nodes_of_model(0), vec![1, 2, 5]);
}

/// The up walk stops at an already visible ancestor.
#[test]
fn test_up_walk_stops_at_visible_ancestor() {
  let lod = TableLod::binary16();
  let mut cell = cell();
  cell.set_visibility(0, 4, true);
  cell.set_visibility(0, 2, true);

  let marked = propagate_cell(&mut cell, &recorded(&[2, 4]), &lod);

  // Node 2: up marks 1; down marks 5 (4 already visible). Node 4: stops at 2.
  assert_eq!(marked, 2);
  assert_eq!(cell.visible_nodes_of_model(0), vec![1, 2, 4, 5]);
}

#[test]
fn test_root_expands_whole_tree() {
  let lod = CompleteLodTree::new(vec![LodModel::subdivided(
    3,
    3,
    Aabb3d::new(DVec3::ZERO, DVec3::ONE),
  )]);
  let mut cell = cell();
  cell.set_visibility(0, 0, true);

  let marked = propagate_cell(&mut cell, &recorded(&[0]), &lod);

  assert_eq!(marked, 39);
  assert_eq!(cell.count_visible(), 40);
}

#[test]
fn test_propagation_is_idempotent() {
  let lod = TableLod::binary16();
  let mut cell = cell();
  cell.set_visibility(0, 3, true);

  propagate_cell(&mut cell, &recorded(&[3]), &lod);
  let once = cell.clone();
  assert_eq!(propagate_cell(&mut cell, &recorded(&[3]), &lod), 0);
  assert_eq!(cell, once);
  assert_eq!(propagate_cell(&mut cell, &recorded(&[]), &lod), 0);
  assert_eq!(cell, once);
}

/// Ancestors marked by an earlier up walk are not expanded downward.
#[test]
fn test_marked_ancestors_are_not_expanded() {
  let lod = TableLod::binary16();
  let mut cell = cell();
  cell.set_visibility(0, 3, true);
  propagate_cell(&mut cell, &recorded(&[3]), &lod);
  assert_eq!(cell.visible_nodes_of_model(0), vec![1, 3, 6, 7]);

  // A later run records node 7 only.
  let marked = propagate_cell(&mut cell, &recorded(&[7]), &lod);

  assert_eq!(marked, 0);
  assert_eq!(cell.visible_nodes_of_model(0), vec![1, 3, 6, 7]);
}

#[test]
fn test_recorded_nodes_are_marked_in_cell() {
  let lod = TableLod::binary16();
  let mut cell = cell();

  let marked = propagate_cell(&mut cell, &recorded(&[5]), &lod);

  assert_eq!(marked, 3);
  assert_eq!(cell.visible_nodes_of_model(0), vec![1, 2, 5]);
}
#[test]
fn test_unknown_models_are_skipped() {
  let lod = TableLod::binary16();
  let mut cell = cell();
  cell.set_visibility(4, 3, true);
  let mut unknown = ViewCell::default();
  unknown.set_visibility(4, 3, true);

  assert_eq!(propagate_cell(&mut cell, &unknown, &lod), 0);
  assert_eq!(cell.count_visible(), 1);
}

#[test]
fn test_grid_pass_keeps_cells_independent() {
  let lod = TableLod::binary16();
  let mut grid = RegularGrid::new(2, 1.0, DVec3::ZERO, vec![16]);
  grid.set_cell_visibility(0, 0, 3, true);
  grid.set_cell_visibility(5, 0, 4, true);
  let mut sets = vec![ViewCell::default(); 8];
  sets[0] = recorded(&[3]);
  sets[5] = recorded(&[4]);

  let marked = propagate_grid(&mut grid, &sets, &lod);

  assert_eq!(marked, 3 + 2);
  assert_eq!(grid.get_cell_at_index(0).visible_nodes_of_model(0), vec![1, 3, 6, 7]);
  assert_eq!(grid.get_cell_at_index(5).visible_nodes_of_model(0), vec![1, 2, 4]);
  for index in [1, 2, 3, 4, 6, 7] {
    assert!(!grid.get_cell_at_index(index).contains_visibility_data());
  }
}

#[test]
#[should_panic(expected = "do not match")]
fn test_grid_pass_needs_one_set_per_cell() {
  let lod = TableLod::binary16();
  let mut grid = RegularGrid::new(2, 1.0, DVec3::ZERO, vec![16]);
  propagate_grid(&mut grid, &[], &lod);
}
