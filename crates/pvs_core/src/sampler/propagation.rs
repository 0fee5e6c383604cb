//! Visibility propagation through the LOD hierarchy.
//!
//! A sample only sees one LOD level. For every node recorded in a cell
//! during the current run:
//!
//! - **Up**: ancestors become visible. The walk stops at the first ancestor
//!   that is already visible, since everything above it was handled then.
//! - **Down**: all descendants become visible. Refinements of a visible
//!   node are visible from the same viewpoint.
//!
//! Only recorded nodes are expanded downward. Ancestors marked by an earlier
//! up walk stay marked but are never expanded, so running the pass again
//! over an already propagated cell changes nothing.
//!
//! Cells are independent, so the grid pass fans out one rayon task per cell.

use bitvec::prelude::*;
use rayon::prelude::*;

use crate::grid::PvsGrid;
use crate::lod::LodHierarchy;
use crate::types::{ModelId, NodeId};
use crate::view_cell::ViewCell;

/// Propagate the nodes of `recorded` into `cell`. Returns newly marked nodes.
///
/// `recorded` holds the nodes observed for this cell in the current run.
/// They are marked in `cell` as well if they are not already.
pub fn propagate_cell<L: LodHierarchy + ?Sized>(
  cell: &mut ViewCell,
  recorded: &ViewCell,
  lod: &L,
) -> usize {
  let mut marked = 0;
  for (model, recorded) in recorded.get_visible_indices() {
    if model >= lod.get_num_models() {
      continue;
    }
    let num_nodes = lod.get_num_nodes(model);
    let recorded: Vec<NodeId> = recorded.into_iter().filter(|&node| node < num_nodes).collect();
    for &node in &recorded {
      if !cell.get_visibility(model, node) {
        cell.set_visibility(model, node, true);
        marked += 1;
      }
    }
    marked += propagate_up(cell, lod, model, &recorded);
    marked += propagate_down(cell, lod, model, &recorded);
  }
  marked
}

fn propagate_up<L: LodHierarchy + ?Sized>(
  cell: &mut ViewCell,
  lod: &L,
  model: ModelId,
  recorded: &[NodeId],
) -> usize {
  let mut marked = 0;
  for &node in recorded {
    let mut current = node;
    while let Some(parent) = lod.get_parent_id(model, current) {
      if cell.get_visibility(model, parent) {
        break;
      }
      cell.set_visibility(model, parent, true);
      marked += 1;
      current = parent;
    }
  }
  marked
}

fn propagate_down<L: LodHierarchy + ?Sized>(
  cell: &mut ViewCell,
  lod: &L,
  model: ModelId,
  recorded: &[NodeId],
) -> usize {
  let num_nodes = lod.get_num_nodes(model);
  let fan_factor = lod.get_fan_factor(model);
  let mut expanded: BitVec = bitvec![0; num_nodes as usize];
  let mut stack: Vec<NodeId> = Vec::new();
  let mut marked = 0;

  for &root in recorded {
    stack.push(root);
    while let Some(node) = stack.pop() {
      if expanded.replace(node as usize, true) {
        continue;
      }
      for slot in 0..fan_factor {
        let child = lod.get_child_id(model, node, slot);
        if child >= num_nodes {
          continue;
        }
        if !cell.get_visibility(model, child) {
          cell.set_visibility(model, child, true);
          marked += 1;
        }
        stack.push(child);
      }
    }
  }
  marked
}

/// Propagate every cell of `grid` in parallel. Returns newly marked nodes.
///
/// `recorded[i]` holds the nodes recorded for cell `i` in the current run.
///
/// # Panics
/// Panics if `recorded` does not have one entry per cell.
#[tracing::instrument(skip_all, name = "sampler::propagate")]
pub fn propagate_grid<G, L>(grid: &mut G, recorded: &[ViewCell], lod: &L) -> usize
where
  G: PvsGrid + ?Sized,
  L: LodHierarchy + ?Sized,
{
  assert_eq!(
    recorded.len(),
    grid.get_cell_count(),
    "recorded node sets do not match the grid's cell count"
  );
  grid
    .cells_mut()
    .into_par_iter()
    .zip(recorded.par_iter())
    .map(|(cell, recorded)| propagate_cell(cell, recorded, lod))
    .sum()
}

#[cfg(test)]
#[path = "propagation_test.rs"]
mod propagation_test;
