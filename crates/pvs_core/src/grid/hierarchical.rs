//! HierarchicalOctreeGrid - octree whose internal nodes may hold visibility.
//!
//! During sampling only leaves carry data. [`HierarchicalOctreeGrid::combine_visibility`]
//! then promotes nodes visible in (almost) all 8 siblings to their parent
//! and removes them from the children, so an answer for a leaf may live on
//! any node along its root path. Queries therefore walk the path.
//!
//! Visibility files of this variant store every node (internal ones
//! included) in breadth-first order, matching the split bitstream.

use glam::DVec3;
use tracing::info;

use super::octree::{OctreeGrid, OctreeNode};
use super::{expect_grid_type, GridType, PvsGrid};
use crate::bounds::Aabb3d;
use crate::error::Result;
use crate::store::GridFile;
use crate::types::{ModelId, NodeCount, NodeId};
use crate::view_cell::ViewCell;

/// Octree with visibility aggregation across siblings.
#[derive(Clone, Debug, PartialEq)]
pub struct HierarchicalOctreeGrid {
  octree: OctreeGrid,
}

impl HierarchicalOctreeGrid {
  /// Build with all leaves at `max_depth` (root = depth 1).
  pub fn new(max_depth: u32, size: f64, center: DVec3, ids: Vec<NodeCount>) -> Self {
    Self {
      octree: OctreeGrid::new(max_depth, size, center, ids),
    }
  }

  /// Wrap an existing octree, keeping its topology and leaf data.
  pub fn from_octree(octree: OctreeGrid) -> Self {
    Self { octree }
  }

  #[inline]
  pub fn octree(&self) -> &OctreeGrid {
    &self.octree
  }

  #[inline]
  pub fn octree_mut(&mut self) -> &mut OctreeGrid {
    &mut self.octree
  }

  pub fn into_octree(self) -> OctreeGrid {
    self.octree
  }

  /// Bottom-up merge of sibling visibility.
  ///
  /// A node visible in at least `8 - num_allowed_unequal_elements` of the 8
  /// children (and in at least one) is marked on the parent and cleared
  /// from all 8 children. With `0` only nodes visible in every child move.
  ///
  /// Returns the number of promoted `(model, node)` entries.
  #[tracing::instrument(skip_all, name = "grid::combine_visibility")]
  pub fn combine_visibility(&mut self, num_allowed_unequal_elements: u8) -> usize {
    let ids = self.octree.ids().to_vec();
    let promoted = combine_node(
      self.octree.root_mut(),
      &ids,
      num_allowed_unequal_elements as usize,
    );
    info!(
      promoted,
      num_allowed_unequal_elements, "combined sibling visibility"
    );
    promoted
  }

  /// Visibility of a leaf with its ancestors merged in.
  pub fn effective_cell(&self, index: usize) -> ViewCell {
    let nodes = self.octree.path_nodes(index);
    let leaf = nodes[nodes.len() - 1].cell();
    let mut merged = ViewCell::new(leaf.get_position_center(), leaf.get_size());
    for node in nodes {
      merged.union_with(node.cell());
    }
    merged
  }
}

fn combine_node(node: &mut OctreeNode, ids: &[NodeCount], allowed_unequal: usize) -> usize {
  let Some(children) = node.children_mut() else {
    return 0;
  };
  let mut promoted: usize = children
    .iter_mut()
    .map(|child| combine_node(child, ids, allowed_unequal))
    .sum();

  // Only nodes seen by at least one child can be promoted.
  let mut candidates = ViewCell::default();
  for child in children.iter() {
    candidates.union_with(child.cell());
  }

  let mut promotions: Vec<(ModelId, NodeId)> = Vec::new();
  for (model, nodes) in candidates.get_visible_indices() {
    let Some(&node_count) = ids.get(model as usize) else {
      continue;
    };
    for node_id in nodes.into_iter().take_while(|&id| id < node_count) {
      let witnesses = children
        .iter()
        .filter(|child| child.cell().get_visibility(model, node_id))
        .count();
      if 8 - witnesses <= allowed_unequal {
        promotions.push((model, node_id));
      }
    }
  }

  for &(model, node_id) in &promotions {
    for child in children.iter_mut() {
      if child.cell().get_visibility(model, node_id) {
        child.cell_mut().set_visibility(model, node_id, false);
      }
    }
  }
  for child in children.iter_mut() {
    if !child.cell().contains_visibility_data() {
      child.cell_mut().clear_visibility_data();
    }
  }

  let cell = node.cell_mut();
  for &(model, node_id) in &promotions {
    cell.set_visibility(model, node_id, true);
  }
  promoted += promotions.len();
  promoted
}

impl PvsGrid for HierarchicalOctreeGrid {
  fn grid_type(&self) -> GridType {
    GridType::HierarchicalOctree
  }

  fn get_cell_count(&self) -> usize {
    self.octree.get_cell_count()
  }

  fn get_cell_at_index(&self, index: usize) -> &ViewCell {
    self.octree.get_cell_at_index(index)
  }

  fn get_cell_at_index_mut(&mut self, index: usize) -> &mut ViewCell {
    self.octree.get_cell_at_index_mut(index)
  }

  fn get_cell_index_at_position(&self, position: DVec3) -> Option<usize> {
    self.octree.get_cell_index_at_position(position)
  }

  fn bounds(&self) -> Aabb3d {
    self.octree.bounds()
  }

  fn ids(&self) -> &[NodeCount] {
    self.octree.ids()
  }

  fn cells_mut(&mut self) -> Vec<&mut ViewCell> {
    self.octree.cells_mut()
  }

  fn storage_cells(&self) -> Vec<&ViewCell> {
    self
      .octree
      .nodes_breadth_first()
      .into_iter()
      .map(OctreeNode::cell)
      .collect()
  }

  fn storage_cells_mut(&mut self) -> Vec<&mut ViewCell> {
    self.octree.cells_breadth_first_mut()
  }

  fn to_grid_file(&self) -> GridFile {
    self.octree.layout_file(GridType::HierarchicalOctree)
  }

  fn from_grid_file(file: GridFile) -> Result<Self> {
    expect_grid_type(&file, GridType::HierarchicalOctree)?;
    Ok(Self {
      octree: OctreeGrid::from_file_layout(file)?,
    })
  }

  /// Walks from the root to the leaf, so promoted answers are found.
  fn get_cell_visibility(&self, index: usize, model: ModelId, node: NodeId) -> bool {
    self
      .octree
      .path_nodes(index)
      .iter()
      .any(|path_node| path_node.cell().get_visibility(model, node))
  }

  fn count_cell_visible(&self, index: usize) -> usize {
    self.effective_cell(index).count_visible()
  }
}

#[cfg(test)]
#[path = "hierarchical_test.rs"]
mod hierarchical_test;
