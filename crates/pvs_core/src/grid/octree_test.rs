use glam::DVec3;

use super::*;

fn depth_two() -> OctreeGrid {
  OctreeGrid::new(2, 20.0, DVec3::ZERO, vec![16])
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_depth_one_is_root_only() {
  let grid = OctreeGrid::new(1, 8.0, DVec3::ONE, vec![]);
  assert_eq!(grid.get_cell_count(), 1);
  assert!(grid.root().is_leaf());
  assert_eq!(grid.get_cell_at_index(0).get_position_center(), DVec3::ONE);
}

#[test]
fn test_depth_two_has_eight_leaves() {
  let grid = depth_two();
  assert_eq!(grid.get_cell_count(), 8);
  assert_eq!(grid.root().node_count(), 9);
  assert!(grid.root().has_only_leaf_children());
}

#[test]
fn test_depth_three_has_sixty_four_leaves() {
  let grid = OctreeGrid::new(3, 8.0, DVec3::ZERO, vec![]);
  assert_eq!(grid.get_cell_count(), 64);
  for index in 0..grid.get_cell_count() {
    assert_eq!(grid.get_cell_at_index(index).get_size(), DVec3::splat(2.0));
    assert_eq!(grid.path_nodes(index).len(), 3);
    assert_eq!(grid.path_nodes(index)[2].depth(), 3);
  }
}

/// Children sit at +/- a quarter of the parent size, octant bits X, Y, Z.
#[test]
fn test_child_centers_follow_octant_bits() {
  let grid = depth_two();
  let children = grid.root().children().expect("root is split");

  for (octant, child) in children.iter().enumerate() {
    let expected = octant_sign(octant as u8) * 5.0;
    assert_eq!(child.cell().get_position_center(), expected, "octant {octant}");
    assert_eq!(child.cell().get_size(), DVec3::splat(10.0));
    assert_eq!(child.depth(), 2);
    assert_eq!(child.leaf_index(), Some(octant));
  }
  assert_eq!(octant_sign(0), DVec3::splat(-1.0));
  assert_eq!(octant_sign(5), DVec3::new(1.0, -1.0, 1.0));
}

#[test]
fn test_octant_of() {
  let grid = depth_two();
  let root = grid.root();
  assert_eq!(root.octant_of(DVec3::new(-1.0, -1.0, -1.0)), 0);
  assert_eq!(root.octant_of(DVec3::new(1.0, -1.0, -1.0)), 1);
  assert_eq!(root.octant_of(DVec3::new(-1.0, 1.0, 1.0)), 6);
  assert_eq!(root.octant_of(DVec3::ZERO), 7);
}

// =========================================================================
// Position lookup
// =========================================================================

#[test]
fn test_position_lookup_returns_leaf() {
  let grid = OctreeGrid::new(3, 8.0, DVec3::ZERO, vec![]);
  let position = DVec3::new(3.0, -1.0, 0.5);
  let index = grid.get_cell_index_at_position(position).expect("inside");

  let cell = grid.get_cell_at_index(index);
  assert!(cell.bounds().contains_point(position));
  assert_eq!(cell.get_position_center(), DVec3::new(3.0, -1.0, 1.0));
  assert_eq!(grid.get_cell_at_position(position), Some(cell));
}

#[test]
fn test_position_outside_root_is_none() {
  let grid = depth_two();
  assert!(grid.get_cell_at_position(DVec3::new(50.0, 50.0, 50.0)).is_none());
  assert!(grid.get_cell_index_at_position(DVec3::new(0.0, 10.01, 0.0)).is_none());
}

/// Boundary points resolve deterministically to a containing leaf.
#[test]
fn test_boundary_points_resolve() {
  let grid = depth_two();
  for position in [
    DVec3::ZERO,
    DVec3::splat(10.0),
    DVec3::splat(-10.0),
    DVec3::new(0.0, -10.0, 10.0),
  ] {
    let index = grid
      .get_cell_index_at_position(position)
      .unwrap_or_else(|| panic!("{position} lies on the root bounds"));
    assert!(grid.get_cell_at_index(index).bounds().contains_point(position));
  }
}

#[test]
fn test_every_leaf_center_maps_to_itself() {
  let grid = OctreeGrid::new(4, 16.0, DVec3::new(100.0, 0.0, -40.0), vec![]);
  for index in 0..grid.get_cell_count() {
    let center = grid.get_cell_at_index(index).get_position_center();
    assert_eq!(grid.get_cell_index_at_position(center), Some(index));
  }
}

// =========================================================================
// Topology persistence
// =========================================================================

#[test]
fn test_split_bits_breadth_first() {
  let grid = depth_two();
  let mut expected = vec![true];
  expected.extend([false; 8]);
  assert_eq!(grid.split_bits(), expected);
}

/// Depth-2 octree survives a grid-file round trip with identical leaves.
#[test]
fn test_grid_file_roundtrip_preserves_leaves() {
  let grid = depth_two();
  let reloaded = OctreeGrid::from_grid_file(grid.to_grid_file()).expect("valid layout");

  assert_eq!(reloaded.get_cell_count(), 8);
  for index in 0..8 {
    let a = grid.get_cell_at_index(index);
    let b = reloaded.get_cell_at_index(index);
    assert_eq!(a.get_position_center(), b.get_position_center());
    assert_eq!(a.get_size(), b.get_size());
  }
  assert_eq!(reloaded.ids(), &[16]);
}

/// An uneven topology replays to the same shape.
#[test]
fn test_uneven_topology_roundtrip() {
  let mut grid = depth_two();
  grid.node_at_path_mut(&[3]).split();
  grid.node_at_path_mut(&[3, 6]).split();
  grid.compute_index_access();
  assert_eq!(grid.get_cell_count(), 7 + 7 + 8);
  assert_eq!(grid.max_depth(), 4);

  let reloaded = OctreeGrid::from_grid_file(grid.to_grid_file()).expect("valid layout");
  assert_eq!(reloaded.split_bits(), grid.split_bits());
  assert_eq!(reloaded.get_cell_count(), grid.get_cell_count());
  for index in 0..grid.get_cell_count() {
    assert_eq!(reloaded.leaf_path(index), grid.leaf_path(index));
    assert_eq!(
      reloaded.get_cell_at_index(index).get_position_center(),
      grid.get_cell_at_index(index).get_position_center()
    );
  }
}

#[test]
fn test_truncated_split_bits_rejected() {
  let mut file = depth_two().to_grid_file();
  file.splits.truncate(5);
  let err = OctreeGrid::from_grid_file(file).unwrap_err();
  assert!(matches!(err, PvsError::Parse { line: 3, .. }));
}

#[test]
fn test_trailing_split_bits_rejected() {
  let mut file = depth_two().to_grid_file();
  file.splits.push(false);
  assert!(OctreeGrid::from_grid_file(file).is_err());
}

/// A header depth shallower than the replayed topology is rejected.
#[test]
fn test_splits_past_max_depth_rejected() {
  let mut file = depth_two().to_grid_file();
  file.resolution = 1;
  let err = OctreeGrid::from_grid_file(file).unwrap_err();
  assert!(matches!(err, PvsError::Parse { line: 3, .. }));
}

/// Collapsed subtrees leave leaves above the header depth, which is fine.
#[test]
fn test_leaves_above_max_depth_accepted() {
  let mut file = depth_two().to_grid_file();
  file.resolution = 5;
  let grid = OctreeGrid::from_grid_file(file).expect("shallower tree is valid");
  assert_eq!(grid.max_depth(), 5);
  assert_eq!(grid.get_cell_count(), 8);
}

#[test]
fn test_hierarchical_tag_rejected_by_octree() {
  let mut file = depth_two().to_grid_file();
  file.grid_type = GridType::HierarchicalOctree;
  assert!(matches!(
    OctreeGrid::from_grid_file(file),
    Err(PvsError::GridTypeMismatch { .. })
  ));
}

// =========================================================================
// Cell access
// =========================================================================

#[test]
fn test_cells_mut_follow_index_order() {
  let mut grid = OctreeGrid::new(3, 8.0, DVec3::ZERO, vec![4]);
  for (index, cell) in grid.cells_mut().into_iter().enumerate() {
    cell.set_visibility(0, (index % 4) as u32, true);
  }
  for index in 0..grid.get_cell_count() {
    assert!(grid.get_cell_visibility(index, 0, (index % 4) as u32));
  }
}

#[test]
fn test_breadth_first_cells_cover_all_nodes() {
  let mut grid = OctreeGrid::new(3, 8.0, DVec3::ZERO, vec![]);
  assert_eq!(grid.nodes_breadth_first().len(), 73);
  assert_eq!(grid.cells_breadth_first_mut().len(), 73);
  assert_eq!(grid.storage_cells().len(), 64);
}

#[test]
fn test_collapse_turns_node_into_leaf() {
  let mut grid = OctreeGrid::new(3, 8.0, DVec3::ZERO, vec![]);
  let removed = grid.node_at_path_mut(&[0]).collapse();
  assert!(removed.is_some());
  grid.compute_index_access();
  assert_eq!(grid.get_cell_count(), 57);
  assert_eq!(grid.get_cell_at_index(0).get_size(), DVec3::splat(4.0));
}
