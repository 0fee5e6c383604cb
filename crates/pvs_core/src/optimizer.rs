//! Grid optimizer - collapses octree subtrees whose leaves agree.
//!
//! A node whose 8 children are all leaves is replaced by a single leaf
//! holding the union of their visibility when every child already sees at
//! least `collapse_threshold` of that union. Collapsing is lossy: cells that
//! saw less now report the union.
//!
//! Subtrees are processed post-order, so a parent is examined once its
//! children have reached their final shape. This reaches the same fixpoint
//! as rescanning from the root after every collapse.

use tracing::{debug, info};

use crate::error::{PvsError, Result};
use crate::grid::{Grid, OctreeGrid, OctreeNode, PvsGrid};
use crate::view_cell::ViewCell;

/// Collapse tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OptimizerConfig {
  /// Minimum `|child| / |union|` every child must reach.
  pub collapse_threshold: f64,
}

impl OptimizerConfig {
  pub const DEFAULT_COLLAPSE_THRESHOLD: f64 = 0.6;

  pub const DEFAULT: Self = Self {
    collapse_threshold: Self::DEFAULT_COLLAPSE_THRESHOLD,
  };
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Statistics from one optimization pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizerStats {
  /// Internal nodes turned into leaves.
  pub collapses: usize,
  /// Leaf count before the pass.
  pub cells_before: usize,
  /// Leaf count after the pass.
  pub cells_after: usize,
}

#[derive(Clone, Debug, Default)]
pub struct GridOptimizer {
  config: OptimizerConfig,
}

impl GridOptimizer {
  pub fn new(config: OptimizerConfig) -> Self {
    Self { config }
  }

  #[inline]
  pub fn config(&self) -> &OptimizerConfig {
    &self.config
  }

  /// Optimize a grid in place. Only plain octree grids are supported.
  pub fn optimize_grid(&self, grid: &mut Grid) -> Result<OptimizerStats> {
    match grid {
      Grid::Octree(octree) => Ok(self.optimize_octree(octree)),
      other => Err(PvsError::UnsupportedGrid(other.grid_type())),
    }
  }

  /// Collapse agreeing subtrees and rebuild the leaf numbering.
  #[tracing::instrument(skip_all, name = "optimizer::optimize")]
  pub fn optimize_octree(&self, octree: &mut OctreeGrid) -> OptimizerStats {
    let cells_before = octree.get_cell_count();
    let collapses = self.optimize_node(octree.root_mut());
    octree.compute_index_access();

    let stats = OptimizerStats {
      collapses,
      cells_before,
      cells_after: octree.get_cell_count(),
    };
    info!(
      collapses = stats.collapses,
      cells_before = stats.cells_before,
      cells_after = stats.cells_after,
      threshold = self.config.collapse_threshold,
      "optimized octree"
    );
    stats
  }

  fn optimize_node(&self, node: &mut OctreeNode) -> usize {
    let Some(children) = node.children_mut() else {
      return 0;
    };
    let mut collapses: usize = children
      .iter_mut()
      .map(|child| self.optimize_node(child))
      .sum();
    if node.has_only_leaf_children() && self.try_collapse_node(node) {
      collapses += 1;
    }
    collapses
  }

  /// Collapse `node` if all of its leaf children agree closely enough.
  ///
  /// Returns `false` and leaves the node untouched otherwise.
  pub fn try_collapse_node(&self, node: &mut OctreeNode) -> bool {
    let Some(children) = node.children() else {
      return false;
    };
    if !children.iter().all(OctreeNode::is_leaf) {
      return false;
    }

    let mut merged = ViewCell::default();
    for child in children.iter() {
      merged.union_with(child.cell());
    }
    let merged_count = merged.count_visible();

    // Nothing seen anywhere: the children carry no information.
    if merged_count > 0 {
      let agrees = children.iter().all(|child| {
        child.cell().count_visible() as f64 / merged_count as f64 >= self.config.collapse_threshold
      });
      if !agrees {
        return false;
      }
    }

    node.collapse();
    node.cell_mut().union_with(&merged);
    debug!(
      depth = node.depth(),
      visible = merged_count,
      "collapsed octree node"
    );
    true
  }
}

#[cfg(test)]
#[path = "optimizer_test.rs"]
mod optimizer_test;
