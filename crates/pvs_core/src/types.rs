//! Identifier types shared by grids, cells and the LOD collaborator.

/// Index of a model (one LOD hierarchy) in the scene.
pub type ModelId = u32;

/// Index of a node inside a model's LOD hierarchy.
pub type NodeId = u32;

/// Number of nodes in a model's LOD hierarchy.
pub type NodeCount = u32;

/// A `(model, node)` pair, as carried by id-rendered pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
  pub model: ModelId,
  pub node: NodeId,
}

impl NodeKey {
  #[inline]
  pub fn new(model: ModelId, node: NodeId) -> Self {
    Self { model, node }
  }
}

/// Number of bytes a packed visibility run of `node_count` bits occupies.
#[inline]
pub fn packed_len(node_count: NodeCount) -> usize {
  (node_count as usize).div_ceil(8)
}
