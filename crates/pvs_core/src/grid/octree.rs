//! OctreeGrid - view cells as the leaves of an explicit octree.
//!
//! Every split produces exactly 8 children at half the parent's size, each
//! offset by a quarter of the parent's size along every axis.
//!
//! # Octant Convention
//!
//! Octant: 0-7 where bits represent the upper half along each axis:
//! - bit 0: +X
//! - bit 1: +Y
//! - bit 2: +Z
//!
//! # Addressing
//!
//! Leaves are numbered depth-first, children visited in octant order. The
//! numbering is rebuilt by [`OctreeGrid::compute_index_access`], which must
//! run after any structural change.
//!
//! # Persistence
//!
//! Topology is stored as a breadth-first split bitstream (`1` = has
//! children). Replaying it through a FIFO queue rebuilds the same shape.

use std::collections::VecDeque;

use glam::DVec3;
use smallvec::SmallVec;

use super::{expect_grid_type, GridType, PvsGrid};
use crate::bounds::Aabb3d;
use crate::error::{PvsError, Result};
use crate::store::GridFile;
use crate::types::NodeCount;
use crate::view_cell::ViewCell;

/// Octant path from the root to a node.
pub type OctantPath = SmallVec<[u8; 16]>;

/// Children of an octree node: none, or all eight.
#[derive(Clone, Debug, PartialEq)]
pub enum OctreeChildren {
  Leaf,
  Internal(Box<[OctreeNode; 8]>),
}

/// Octree node - a view cell plus optional children.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeNode {
  cell: ViewCell,
  /// Root is depth 1.
  depth: u32,
  /// Cell index; only meaningful for leaves.
  leaf_index: usize,
  children: OctreeChildren,
}

/// Sign pattern of an octant: -1 or +1 per axis.
#[inline]
pub fn octant_sign(octant: u8) -> DVec3 {
  let sign = |bit: u8| if octant & bit != 0 { 1.0 } else { -1.0 };
  DVec3::new(sign(1), sign(2), sign(4))
}

impl OctreeNode {
  /// Create a leaf node.
  pub fn new(center: DVec3, size: DVec3, depth: u32) -> Self {
    Self {
      cell: ViewCell::new(center, size),
      depth,
      leaf_index: 0,
      children: OctreeChildren::Leaf,
    }
  }

  #[inline]
  pub fn cell(&self) -> &ViewCell {
    &self.cell
  }

  #[inline]
  pub fn cell_mut(&mut self) -> &mut ViewCell {
    &mut self.cell
  }

  #[inline]
  pub fn depth(&self) -> u32 {
    self.depth
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    matches!(self.children, OctreeChildren::Leaf)
  }

  /// Cell index of a leaf, `None` for internal nodes.
  #[inline]
  pub fn leaf_index(&self) -> Option<usize> {
    self.is_leaf().then_some(self.leaf_index)
  }

  pub fn children(&self) -> Option<&[OctreeNode; 8]> {
    match &self.children {
      OctreeChildren::Leaf => None,
      OctreeChildren::Internal(children) => Some(&**children),
    }
  }

  pub fn children_mut(&mut self) -> Option<&mut [OctreeNode; 8]> {
    match &mut self.children {
      OctreeChildren::Leaf => None,
      OctreeChildren::Internal(children) => Some(&mut **children),
    }
  }

  /// Split into 8 children. No-op if already split.
  pub fn split(&mut self) {
    if !self.is_leaf() {
      return;
    }
    let center = self.cell.get_position_center();
    let size = self.cell.get_size();
    let quarter = size * 0.25;
    let depth = self.depth + 1;
    let children = std::array::from_fn(|octant| {
      OctreeNode::new(center + octant_sign(octant as u8) * quarter, size * 0.5, depth)
    });
    self.children = OctreeChildren::Internal(Box::new(children));
  }

  /// Remove the children, turning this node back into a leaf.
  pub fn collapse(&mut self) -> Option<Box<[OctreeNode; 8]>> {
    match std::mem::replace(&mut self.children, OctreeChildren::Leaf) {
      OctreeChildren::Leaf => None,
      OctreeChildren::Internal(children) => Some(children),
    }
  }

  /// Octant of `position` relative to this node's center.
  ///
  /// Points on a center plane go to the upper half.
  #[inline]
  pub fn octant_of(&self, position: DVec3) -> u8 {
    let center = self.cell.get_position_center();
    (position.x >= center.x) as u8
      | ((position.y >= center.y) as u8) << 1
      | ((position.z >= center.z) as u8) << 2
  }

  /// Number of nodes in this subtree, including this one.
  pub fn node_count(&self) -> usize {
    1 + self
      .children()
      .map_or(0, |children| children.iter().map(OctreeNode::node_count).sum())
  }

  /// Number of leaves in this subtree.
  pub fn leaf_count(&self) -> usize {
    self.children().map_or(1, |children| {
      children.iter().map(OctreeNode::leaf_count).sum()
    })
  }

  /// True if every child is a leaf. False for leaves.
  pub fn has_only_leaf_children(&self) -> bool {
    self
      .children()
      .is_some_and(|children| children.iter().all(OctreeNode::is_leaf))
  }

  fn split_to_depth(&mut self, max_depth: u32) {
    if self.depth >= max_depth {
      return;
    }
    self.split();
    if let Some(children) = self.children_mut() {
      for child in children.iter_mut() {
        child.split_to_depth(max_depth);
      }
    }
  }
}

/// Fixed-depth octree of view cells.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeGrid {
  max_depth: u32,
  root: OctreeNode,
  leaf_paths: Vec<OctantPath>,
  ids: Vec<NodeCount>,
}

impl OctreeGrid {
  /// Build an octree with all leaves at `max_depth` (root = depth 1).
  ///
  /// # Panics
  /// Panics if `max_depth` is zero or `size` is not positive.
  pub fn new(max_depth: u32, size: f64, center: DVec3, ids: Vec<NodeCount>) -> Self {
    assert!(max_depth >= 1, "octree depth starts at 1 (root only)");
    assert!(size > 0.0, "octree size must be positive, got {size}");

    let mut root = OctreeNode::new(center, DVec3::splat(size), 1);
    root.split_to_depth(max_depth);

    let mut grid = Self {
      max_depth,
      root,
      leaf_paths: Vec::new(),
      ids,
    };
    grid.compute_index_access();
    grid
  }

  #[inline]
  pub fn max_depth(&self) -> u32 {
    self.max_depth
  }

  #[inline]
  pub fn root(&self) -> &OctreeNode {
    &self.root
  }

  /// Mutable root. Callers changing the topology must call
  /// [`Self::compute_index_access`] afterwards.
  #[inline]
  pub fn root_mut(&mut self) -> &mut OctreeNode {
    &mut self.root
  }

  /// Rebuild the leaf numbering after a structural change.
  ///
  /// `max_depth` grows to cover leaves split below it.
  pub fn compute_index_access(&mut self) {
    fn assign(node: &mut OctreeNode, path: &mut OctantPath, paths: &mut Vec<OctantPath>) {
      match &mut node.children {
        OctreeChildren::Leaf => {
          node.leaf_index = paths.len();
          paths.push(path.clone());
        }
        OctreeChildren::Internal(children) => {
          for (octant, child) in children.iter_mut().enumerate() {
            path.push(octant as u8);
            assign(child, path, paths);
            path.pop();
          }
        }
      }
    }

    let mut paths = Vec::with_capacity(self.leaf_paths.len());
    assign(&mut self.root, &mut OctantPath::new(), &mut paths);
    let deepest = paths.iter().map(|path| path.len() as u32 + 1).max().unwrap_or(1);
    self.max_depth = self.max_depth.max(deepest);
    self.leaf_paths = paths;
  }

  /// Octant path of a leaf.
  pub fn leaf_path(&self, index: usize) -> &[u8] {
    &self.leaf_paths[index]
  }

  /// Node reached by following `path` from the root.
  ///
  /// # Panics
  /// Panics if the path descends past a leaf.
  pub fn node_at_path(&self, path: &[u8]) -> &OctreeNode {
    let mut node = &self.root;
    for &octant in path {
      node = match &node.children {
        OctreeChildren::Internal(children) => &children[octant as usize],
        OctreeChildren::Leaf => panic!("octant path descends past a leaf"),
      };
    }
    node
  }

  /// Mutable variant of [`Self::node_at_path`].
  pub fn node_at_path_mut(&mut self, path: &[u8]) -> &mut OctreeNode {
    let mut node = &mut self.root;
    for &octant in path {
      node = match &mut node.children {
        OctreeChildren::Internal(children) => &mut children[octant as usize],
        OctreeChildren::Leaf => panic!("octant path descends past a leaf"),
      };
    }
    node
  }

  /// Nodes from the root down to the leaf with the given cell index.
  pub fn path_nodes(&self, index: usize) -> SmallVec<[&OctreeNode; 16]> {
    let mut nodes = SmallVec::new();
    let mut node = &self.root;
    nodes.push(node);
    for &octant in self.leaf_paths[index].iter() {
      node = match &node.children {
        OctreeChildren::Internal(children) => &children[octant as usize],
        OctreeChildren::Leaf => panic!("octant path descends past a leaf"),
      };
      nodes.push(node);
    }
    nodes
  }

  /// Leaf containing `position`, `None` outside the root.
  ///
  /// A point on a boundary plane between children goes to the first child
  /// (in octant order) that contains it. If numerical error leaves no
  /// child containing the point, the child with the nearest center is used
  /// and the point is clamped into it.
  pub fn leaf_at_position(&self, position: DVec3) -> Option<&OctreeNode> {
    if !self.root.cell.bounds().contains_point(position) {
      return None;
    }

    let mut node = &self.root;
    let mut position = position;
    while let Some(children) = node.children() {
      let guess = node.octant_of(position) as usize;
      let octant = if children[guess].cell.bounds().contains_point(position) {
        guess
      } else {
        match children
          .iter()
          .position(|child| child.cell.bounds().contains_point(position))
        {
          Some(octant) => octant,
          None => {
            let octant = nearest_child(children, position);
            position = children[octant].cell.bounds().clamp_point(position);
            octant
          }
        }
      };
      node = &children[octant];
    }
    Some(node)
  }

  /// Breadth-first list of all nodes.
  pub fn nodes_breadth_first(&self) -> Vec<&OctreeNode> {
    let mut nodes = Vec::with_capacity(self.root.node_count());
    let mut queue = VecDeque::from([&self.root]);
    while let Some(node) = queue.pop_front() {
      nodes.push(node);
      if let Some(children) = node.children() {
        queue.extend(children.iter());
      }
    }
    nodes
  }

  /// Breadth-first list of all cells, mutably.
  pub fn cells_breadth_first_mut(&mut self) -> Vec<&mut ViewCell> {
    let mut cells = Vec::new();
    let mut queue = VecDeque::from([&mut self.root]);
    while let Some(node) = queue.pop_front() {
      let OctreeNode { cell, children, .. } = node;
      cells.push(cell);
      if let OctreeChildren::Internal(children) = children {
        queue.extend(children.iter_mut());
      }
    }
    cells
  }

  /// Breadth-first split bitstream, one entry per node.
  pub fn split_bits(&self) -> Vec<bool> {
    self
      .nodes_breadth_first()
      .into_iter()
      .map(|node| !node.is_leaf())
      .collect()
  }

  /// Build from a grid file, whatever its octree tag.
  pub(crate) fn from_file_layout(file: GridFile) -> Result<Self> {
    if file.resolution == 0 || !(file.cell_size.is_finite() && file.cell_size > 0.0) {
      return Err(PvsError::parse(
        2,
        format!(
          "octree needs depth >= 1 and a positive size, got depth {} size {}",
          file.resolution, file.cell_size
        ),
      ));
    }

    let mut root = OctreeNode::new(file.center, DVec3::splat(file.cell_size), 1);
    replay_splits(&mut root, &file.splits, file.resolution)?;

    let mut grid = Self {
      max_depth: file.resolution,
      root,
      leaf_paths: Vec::new(),
      ids: file.ids,
    };
    grid.compute_index_access();
    Ok(grid)
  }

  pub(crate) fn layout_file(&self, grid_type: GridType) -> GridFile {
    GridFile {
      grid_type,
      resolution: self.max_depth,
      cell_size: self.root.cell.get_size().x,
      center: self.root.cell.get_position_center(),
      splits: self.split_bits(),
      ids: self.ids.clone(),
    }
  }
}

fn nearest_child(children: &[OctreeNode; 8], position: DVec3) -> usize {
  let mut best = 0;
  let mut best_distance = f64::INFINITY;
  for (octant, child) in children.iter().enumerate() {
    let distance = child.cell.get_position_center().distance_squared(position);
    if distance < best_distance {
      best = octant;
      best_distance = distance;
    }
  }
  best
}

/// Rebuild a topology from its breadth-first split bitstream.
///
/// Leaves may sit above `max_depth` after collapsing, never below it.
fn replay_splits(root: &mut OctreeNode, splits: &[bool], max_depth: u32) -> Result<()> {
  let mut bits = splits.iter().copied();
  let mut queue = VecDeque::from([root]);
  while let Some(node) = queue.pop_front() {
    let split = bits
      .next()
      .ok_or_else(|| PvsError::parse(3, "split bitstream ends before the tree is complete"))?;
    if split {
      if node.depth >= max_depth {
        return Err(PvsError::parse(
          3,
          format!("split bitstream splits past the maximum depth {max_depth}"),
        ));
      }
      node.split();
      if let OctreeChildren::Internal(children) = &mut node.children {
        queue.extend(children.iter_mut());
      }
    }
  }
  if bits.next().is_some() {
    return Err(PvsError::parse(3, "split bitstream has trailing bits"));
  }
  Ok(())
}

fn collect_leaf_cells<'a>(node: &'a mut OctreeNode, out: &mut Vec<&'a mut ViewCell>) {
  let OctreeNode { cell, children, .. } = node;
  match children {
    OctreeChildren::Leaf => out.push(cell),
    OctreeChildren::Internal(children) => {
      for child in children.iter_mut() {
        collect_leaf_cells(child, out);
      }
    }
  }
}

fn collect_leaf_cells_ref<'a>(node: &'a OctreeNode, out: &mut Vec<&'a ViewCell>) {
  match node.children() {
    None => out.push(&node.cell),
    Some(children) => {
      for child in children {
        collect_leaf_cells_ref(child, out);
      }
    }
  }
}

impl PvsGrid for OctreeGrid {
  fn grid_type(&self) -> GridType {
    GridType::Octree
  }

  fn get_cell_count(&self) -> usize {
    self.leaf_paths.len()
  }

  fn get_cell_at_index(&self, index: usize) -> &ViewCell {
    &self.node_at_path(&self.leaf_paths[index]).cell
  }

  fn get_cell_at_index_mut(&mut self, index: usize) -> &mut ViewCell {
    let path = self.leaf_paths[index].clone();
    &mut self.node_at_path_mut(&path).cell
  }

  fn get_cell_index_at_position(&self, position: DVec3) -> Option<usize> {
    self.leaf_at_position(position).map(|leaf| leaf.leaf_index)
  }

  fn get_cell_at_position(&self, position: DVec3) -> Option<&ViewCell> {
    self.leaf_at_position(position).map(|leaf| &leaf.cell)
  }

  fn bounds(&self) -> Aabb3d {
    self.root.cell.bounds()
  }

  fn ids(&self) -> &[NodeCount] {
    &self.ids
  }

  fn cells_mut(&mut self) -> Vec<&mut ViewCell> {
    let mut cells = Vec::with_capacity(self.leaf_paths.len());
    collect_leaf_cells(&mut self.root, &mut cells);
    cells
  }

  fn storage_cells(&self) -> Vec<&ViewCell> {
    let mut cells = Vec::with_capacity(self.leaf_paths.len());
    collect_leaf_cells_ref(&self.root, &mut cells);
    cells
  }

  fn storage_cells_mut(&mut self) -> Vec<&mut ViewCell> {
    self.cells_mut()
  }

  fn to_grid_file(&self) -> GridFile {
    self.layout_file(GridType::Octree)
  }

  fn from_grid_file(file: GridFile) -> Result<Self> {
    expect_grid_type(&file, GridType::Octree)?;
    Self::from_file_layout(file)
  }
}

#[cfg(test)]
#[path = "octree_test.rs"]
mod octree_test;
