//! Grids - collections of view cells addressable by index or position.
//!
//! Three variants exist, all sharing the [`PvsGrid`] contract:
//!
//! - [`RegularGrid`]: `N x N x N` uniform cells over a cubic bound
//! - [`OctreeGrid`]: fixed-depth octree, leaves are the cells
//! - [`HierarchicalOctreeGrid`]: octree whose internal nodes may hold
//!   visibility promoted from their children
//!
//! [`Grid`] is the closed sum of the three, used wherever the concrete
//! variant is only known at runtime (e.g. when loading from disk).

pub mod hierarchical;
pub mod octree;
pub mod regular;

use std::fmt;
use std::path::Path;

use glam::DVec3;

pub use hierarchical::HierarchicalOctreeGrid;
pub use octree::{OctreeChildren, OctreeGrid, OctreeNode};
pub use regular::RegularGrid;

use crate::bounds::Aabb3d;
use crate::error::{PvsError, Result};
use crate::store::{self, GridFile};
use crate::types::{ModelId, NodeCount, NodeId};
use crate::view_cell::ViewCell;

/// Grid variant tag, as written in grid files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridType {
  Regular,
  Octree,
  HierarchicalOctree,
}

impl GridType {
  pub const ALL: [GridType; 3] = [
    GridType::Regular,
    GridType::Octree,
    GridType::HierarchicalOctree,
  ];

  /// File tag of this variant.
  pub fn tag(self) -> &'static str {
    match self {
      GridType::Regular => "regular",
      GridType::Octree => "octree",
      GridType::HierarchicalOctree => "octree_hierarchical",
    }
  }

  /// Parse a file tag. Unknown tags yield `None`.
  pub fn from_tag(tag: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|grid_type| grid_type.tag() == tag)
  }

  /// True for the variants whose topology carries a split bitstream.
  pub fn is_octree(self) -> bool {
    !matches!(self, GridType::Regular)
  }
}

impl fmt::Display for GridType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

/// Contract shared by every grid variant.
///
/// Cell indices run over `0..get_cell_count()`. Passing an index outside
/// that range, or a model id outside `0..get_num_models()` where a node
/// count is needed, is a contract violation and panics.
pub trait PvsGrid {
  fn grid_type(&self) -> GridType;

  fn get_cell_count(&self) -> usize;

  fn get_cell_at_index(&self, index: usize) -> &ViewCell;

  fn get_cell_at_index_mut(&mut self, index: usize) -> &mut ViewCell;

  /// Index of the cell containing `position`, `None` outside the grid.
  fn get_cell_index_at_position(&self, position: DVec3) -> Option<usize>;

  /// Outer bounding volume of the grid.
  fn bounds(&self) -> Aabb3d;

  /// Node count per model.
  fn ids(&self) -> &[NodeCount];

  /// All cells in index order, mutably. Used for per-cell fan-out.
  fn cells_mut(&mut self) -> Vec<&mut ViewCell>;

  /// Cells in visibility-file order.
  fn storage_cells(&self) -> Vec<&ViewCell>;

  /// Cells in visibility-file order, mutably.
  fn storage_cells_mut(&mut self) -> Vec<&mut ViewCell>;

  /// Topology and node counts, as persisted in the grid file.
  fn to_grid_file(&self) -> GridFile;

  /// Build a grid of this variant from a parsed grid file.
  fn from_grid_file(file: GridFile) -> Result<Self>
  where
    Self: Sized;

  fn get_cell_at_position(&self, position: DVec3) -> Option<&ViewCell> {
    self
      .get_cell_index_at_position(position)
      .map(|index| self.get_cell_at_index(index))
  }

  /// Answer for a cell. Variants that store data above the leaves override
  /// this to consult it.
  fn get_cell_visibility(&self, index: usize, model: ModelId, node: NodeId) -> bool {
    self.get_cell_at_index(index).get_visibility(model, node)
  }

  /// Number of nodes visible from a cell, across models.
  fn count_cell_visible(&self, index: usize) -> usize {
    self.get_cell_at_index(index).count_visible()
  }

  /// # Panics
  /// Panics if `model` or `node` is outside the grid's node ranges.
  fn set_cell_visibility(&mut self, index: usize, model: ModelId, node: NodeId, visible: bool) {
    let ids = self.ids();
    assert!(
      (model as usize) < ids.len(),
      "model {model} out of range, grid has {} models",
      ids.len()
    );
    let node_count = ids[model as usize];
    assert!(
      node < node_count,
      "node {node} out of range, model {model} has {node_count} nodes"
    );
    self
      .get_cell_at_index_mut(index)
      .set_visibility(model, node, visible);
  }

  fn get_num_models(&self) -> ModelId {
    self.ids().len() as ModelId
  }

  fn get_num_nodes(&self, model: ModelId) -> NodeCount {
    self.ids()[model as usize]
  }

  /// Total node count over all models.
  fn total_node_count(&self) -> u64 {
    self.ids().iter().map(|&count| count as u64).sum()
  }

  fn save_grid_to_file(&self, path: &Path) -> Result<()> {
    store::write_grid_file(path, &self.to_grid_file())
  }

  /// Replace this grid with the one stored at `path`.
  ///
  /// On failure the grid is left untouched.
  fn load_grid_from_file(&mut self, path: &Path) -> Result<()>
  where
    Self: Sized,
  {
    let file = store::read_grid_file(path)?;
    *self = Self::from_grid_file(file)?;
    Ok(())
  }

  fn save_visibility_to_file(&self, path: &Path) -> Result<()> {
    store::write_visibility_file(path, &self.storage_cells(), self.ids())
  }

  /// Load visibility bits. The grid topology must already match the file.
  ///
  /// On failure no cell is modified.
  fn load_visibility_from_file(&mut self, path: &Path) -> Result<()> {
    let ids = self.ids().to_vec();
    store::read_visibility_file(path, self.storage_cells_mut(), &ids)
  }
}

/// Any grid variant.
#[derive(Clone, Debug)]
pub enum Grid {
  Regular(RegularGrid),
  Octree(OctreeGrid),
  HierarchicalOctree(HierarchicalOctreeGrid),
}

macro_rules! dispatch {
  ($self:expr, $grid:ident => $body:expr) => {
    match $self {
      Grid::Regular($grid) => $body,
      Grid::Octree($grid) => $body,
      Grid::HierarchicalOctree($grid) => $body,
    }
  };
}

impl Grid {
  /// Read a grid file and its visibility file into the matching variant.
  pub fn load(grid_path: &Path, visibility_path: &Path) -> Result<Self> {
    let file = store::read_grid_file(grid_path)?;
    store::check_visibility_len(visibility_path, file.storage_cell_count()?, &file.ids)?;
    let mut grid = Self::from_grid_file(file)?;
    grid.load_visibility_from_file(visibility_path)?;
    Ok(grid)
  }

  /// Write both the grid file and the visibility file.
  pub fn save(&self, grid_path: &Path, visibility_path: &Path) -> Result<()> {
    self.save_grid_to_file(grid_path)?;
    self.save_visibility_to_file(visibility_path)
  }

  /// The octree behind octree-based variants.
  pub fn as_octree(&self) -> Option<&OctreeGrid> {
    match self {
      Grid::Regular(_) => None,
      Grid::Octree(octree) => Some(octree),
      Grid::HierarchicalOctree(hierarchical) => Some(hierarchical.octree()),
    }
  }
}

impl PvsGrid for Grid {
  fn grid_type(&self) -> GridType {
    dispatch!(self, g => g.grid_type())
  }

  fn get_cell_count(&self) -> usize {
    dispatch!(self, g => g.get_cell_count())
  }

  fn get_cell_at_index(&self, index: usize) -> &ViewCell {
    dispatch!(self, g => g.get_cell_at_index(index))
  }

  fn get_cell_at_index_mut(&mut self, index: usize) -> &mut ViewCell {
    dispatch!(self, g => g.get_cell_at_index_mut(index))
  }

  fn get_cell_index_at_position(&self, position: DVec3) -> Option<usize> {
    dispatch!(self, g => g.get_cell_index_at_position(position))
  }

  fn bounds(&self) -> Aabb3d {
    dispatch!(self, g => g.bounds())
  }

  fn ids(&self) -> &[NodeCount] {
    dispatch!(self, g => g.ids())
  }

  fn cells_mut(&mut self) -> Vec<&mut ViewCell> {
    dispatch!(self, g => g.cells_mut())
  }

  fn storage_cells(&self) -> Vec<&ViewCell> {
    dispatch!(self, g => g.storage_cells())
  }

  fn storage_cells_mut(&mut self) -> Vec<&mut ViewCell> {
    dispatch!(self, g => g.storage_cells_mut())
  }

  fn to_grid_file(&self) -> GridFile {
    dispatch!(self, g => g.to_grid_file())
  }

  fn from_grid_file(file: GridFile) -> Result<Self> {
    Ok(match file.grid_type {
      GridType::Regular => Grid::Regular(RegularGrid::from_grid_file(file)?),
      GridType::Octree => Grid::Octree(OctreeGrid::from_grid_file(file)?),
      GridType::HierarchicalOctree => {
        Grid::HierarchicalOctree(HierarchicalOctreeGrid::from_grid_file(file)?)
      }
    })
  }

  fn get_cell_visibility(&self, index: usize, model: ModelId, node: NodeId) -> bool {
    dispatch!(self, g => g.get_cell_visibility(index, model, node))
  }

  fn count_cell_visible(&self, index: usize) -> usize {
    dispatch!(self, g => g.count_cell_visible(index))
  }
}

impl From<RegularGrid> for Grid {
  fn from(grid: RegularGrid) -> Self {
    Grid::Regular(grid)
  }
}

impl From<OctreeGrid> for Grid {
  fn from(grid: OctreeGrid) -> Self {
    Grid::Octree(grid)
  }
}

impl From<HierarchicalOctreeGrid> for Grid {
  fn from(grid: HierarchicalOctreeGrid) -> Self {
    Grid::HierarchicalOctree(grid)
  }
}

/// Reject a grid file whose tag does not match the variant being built.
pub(crate) fn expect_grid_type(file: &GridFile, expected: GridType) -> Result<()> {
  if file.grid_type == expected {
    Ok(())
  } else {
    Err(PvsError::GridTypeMismatch {
      expected,
      found: file.grid_type,
    })
  }
}
