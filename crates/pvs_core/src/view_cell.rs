//! ViewCell - a region of space with per-model node visibility bits.
//!
//! Visibility is closed-world: a `(model, node)` pair without a set bit is
//! not visible. Bit vectors grow lazily, so a cell only pays for the highest
//! node id it has seen per model.
//!
//! The bit order matches the on-disk packing used by [`crate::store`]:
//! bit `k` of byte `b` is node `8 * b + k`.

use std::collections::{BTreeMap, BTreeSet};

use bitvec::prelude::*;
use glam::DVec3;

use crate::bounds::Aabb3d;
use crate::types::{packed_len, ModelId, NodeCount, NodeId};

/// Growable per-model visibility bits.
pub type VisibilityBits = BitVec<u8, Lsb0>;

/// Visible node ids per model, in ascending order.
pub type VisibleIndices = BTreeMap<ModelId, BTreeSet<NodeId>>;

/// A positioned, sized view cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewCell {
  center: DVec3,
  size: DVec3,
  /// Indexed by model id. Missing models hold no visible nodes.
  visibility: Vec<VisibilityBits>,
}

impl ViewCell {
  /// Create an empty cell.
  pub fn new(center: DVec3, size: DVec3) -> Self {
    Self {
      center,
      size,
      visibility: Vec::new(),
    }
  }

  /// Per-axis extent.
  #[inline]
  pub fn get_size(&self) -> DVec3 {
    self.size
  }

  #[inline]
  pub fn get_position_center(&self) -> DVec3 {
    self.center
  }

  /// World-space bounds of the cell.
  #[inline]
  pub fn bounds(&self) -> Aabb3d {
    Aabb3d::from_center_size(self.center, self.size)
  }

  /// Set the visibility of one node, growing the model's bits on demand.
  ///
  /// Setting `false` on the highest node index of a model reserves the full
  /// bit range up front.
  pub fn set_visibility(&mut self, model: ModelId, node: NodeId, visible: bool) {
    let model = model as usize;
    let node = node as usize;
    if self.visibility.len() <= model {
      self.visibility.resize_with(model + 1, VisibilityBits::new);
    }
    let bits = &mut self.visibility[model];
    if bits.len() <= node {
      bits.resize(node + 1, false);
    }
    bits.set(node, visible);
  }

  /// Visibility of one node. Unknown models and nodes are not visible.
  #[inline]
  pub fn get_visibility(&self, model: ModelId, node: NodeId) -> bool {
    self
      .visibility
      .get(model as usize)
      .and_then(|bits| bits.get(node as usize).map(|bit| *bit))
      .unwrap_or(false)
  }

  /// All visible nodes, grouped per model in ascending id order.
  ///
  /// Models without any visible node are omitted.
  pub fn get_visible_indices(&self) -> VisibleIndices {
    self
      .visibility
      .iter()
      .enumerate()
      .filter(|(_, bits)| bits.any())
      .map(|(model, bits)| {
        let nodes = bits.iter_ones().map(|node| node as NodeId).collect();
        (model as ModelId, nodes)
      })
      .collect()
  }

  /// Visible node ids of a single model, ascending.
  pub fn visible_nodes_of_model(&self, model: ModelId) -> Vec<NodeId> {
    self
      .visibility
      .get(model as usize)
      .map(|bits| bits.iter_ones().map(|node| node as NodeId).collect())
      .unwrap_or_default()
  }

  /// Drop all visibility bits.
  pub fn clear_visibility_data(&mut self) {
    self.visibility.clear();
  }

  /// True if any node of any model is visible.
  pub fn contains_visibility_data(&self) -> bool {
    self.visibility.iter().any(|bits| bits.any())
  }

  /// Number of visible nodes across all models.
  pub fn count_visible(&self) -> usize {
    self.visibility.iter().map(|bits| bits.count_ones()).sum()
  }

  /// Number of visible nodes of one model.
  pub fn count_visible_of_model(&self, model: ModelId) -> usize {
    self
      .visibility
      .get(model as usize)
      .map_or(0, |bits| bits.count_ones())
  }

  /// Mark every node visible in `other` as visible here.
  pub fn union_with(&mut self, other: &ViewCell) {
    for (model, bits) in other.visibility.iter().enumerate() {
      for node in bits.iter_ones() {
        self.set_visibility(model as ModelId, node as NodeId, true);
      }
    }
  }

  /// Packed visibility run of one model, `ceil(node_count / 8)` bytes.
  ///
  /// Bits at or beyond `node_count` are never written.
  pub fn visibility_bytes(&self, model: ModelId, node_count: NodeCount) -> Vec<u8> {
    let mut bytes = vec![0u8; packed_len(node_count)];
    if let Some(bits) = self.visibility.get(model as usize) {
      for node in bits.iter_ones().take_while(|&node| node < node_count as usize) {
        bytes[node / 8] |= 1 << (node % 8);
      }
    }
    bytes
  }

  /// Replace one model's visibility with a packed run.
  ///
  /// # Panics
  /// Panics if `bytes` is shorter than `ceil(node_count / 8)`.
  pub fn load_visibility_bytes(&mut self, model: ModelId, node_count: NodeCount, bytes: &[u8]) {
    let len = packed_len(node_count);
    assert!(
      bytes.len() >= len,
      "packed run of {} bytes is too short for {} nodes",
      bytes.len(),
      node_count
    );

    let mut bits = VisibilityBits::from_vec(bytes[..len].to_vec());
    bits.truncate(node_count as usize);

    let model = model as usize;
    if bits.not_any() {
      if let Some(existing) = self.visibility.get_mut(model) {
        existing.clear();
      }
      return;
    }
    if self.visibility.len() <= model {
      self.visibility.resize_with(model + 1, VisibilityBits::new);
    }
    self.visibility[model] = bits;
  }
}

#[cfg(test)]
#[path = "view_cell_test.rs"]
mod view_cell_test;
