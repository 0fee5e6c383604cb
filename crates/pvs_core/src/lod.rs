//! LOD hierarchy collaborator.
//!
//! The sampler only needs topology queries (parent, children, depth) and
//! per-node bounds. Streaming and cut updates live elsewhere.

use crate::bounds::Aabb3d;
use crate::types::{ModelId, NodeCount, NodeId};

/// Read-only view of every model's LOD tree.
///
/// Depth 0 is the root level. A child id `>= get_num_nodes(model)` means the
/// node has no child in that slot.
pub trait LodHierarchy: Sync {
  fn get_num_models(&self) -> ModelId;

  fn get_num_nodes(&self, model: ModelId) -> NodeCount;

  /// Children per internal node.
  fn get_fan_factor(&self, model: ModelId) -> u32;

  /// Parent of `node`, `None` for the root.
  fn get_parent_id(&self, model: ModelId, node: NodeId) -> Option<NodeId>;

  /// Child `child` in `0..get_fan_factor(model)` of `node`.
  fn get_child_id(&self, model: ModelId, node: NodeId, child: u32) -> NodeId;

  fn get_depth_of_node(&self, model: ModelId, node: NodeId) -> u32;

  /// Deepest level of the model.
  fn get_depth(&self, model: ModelId) -> u32;

  fn get_first_node_id_of_depth(&self, model: ModelId, depth: u32) -> NodeId;

  /// Number of nodes on one level.
  fn get_length_of_depth(&self, model: ModelId, depth: u32) -> NodeCount;

  fn get_bounding_box(&self, model: ModelId, node: NodeId) -> Aabb3d;

  /// Node count of every model, in model order. This is a grid's `ids`.
  fn node_counts(&self) -> Vec<NodeCount> {
    (0..self.get_num_models())
      .map(|model| self.get_num_nodes(model))
      .collect()
  }
}

/// One implicit complete k-ary tree.
#[derive(Clone, Debug, PartialEq)]
pub struct LodModel {
  fan_factor: u32,
  depth: u32,
  bounds: Vec<Aabb3d>,
}

impl LodModel {
  /// Complete tree with `depth + 1` levels, subdividing `root` per level.
  ///
  /// Each node's box is cut into `fan_factor` equal slabs along its longest
  /// axis.
  ///
  /// # Panics
  /// Panics if `fan_factor < 2`.
  pub fn subdivided(fan_factor: u32, depth: u32, root: Aabb3d) -> Self {
    assert!(fan_factor >= 2, "fan factor must be at least 2, got {fan_factor}");
    let total = complete_node_count(fan_factor, depth) as usize;
    let mut bounds = Vec::with_capacity(total);
    bounds.push(root);

    let mut id = 0;
    while bounds.len() < total {
      let parent = bounds[id];
      let size = parent.size();
      let axis = if size.x >= size.y && size.x >= size.z {
        0
      } else if size.y >= size.z {
        1
      } else {
        2
      };
      let step = size[axis] / fan_factor as f64;
      for slab in 0..fan_factor {
        let mut min = parent.min;
        let mut max = parent.max;
        min[axis] = parent.min[axis] + step * slab as f64;
        max[axis] = if slab + 1 == fan_factor {
          parent.max[axis]
        } else {
          parent.min[axis] + step * (slab + 1) as f64
        };
        bounds.push(Aabb3d::new(min, max));
      }
      id += 1;
    }

    Self {
      fan_factor,
      depth,
      bounds,
    }
  }

  /// Complete tree with explicit per-node bounds in id order.
  ///
  /// # Panics
  /// Panics if the bound count is not a complete tree size.
  pub fn from_bounds(fan_factor: u32, depth: u32, bounds: Vec<Aabb3d>) -> Self {
    assert!(fan_factor >= 2, "fan factor must be at least 2, got {fan_factor}");
    assert_eq!(
      bounds.len(),
      complete_node_count(fan_factor, depth) as usize,
      "bounds do not describe a complete tree"
    );
    Self {
      fan_factor,
      depth,
      bounds,
    }
  }

  #[inline]
  pub fn num_nodes(&self) -> NodeCount {
    self.bounds.len() as NodeCount
  }

  fn first_of_depth(&self, depth: u32) -> NodeId {
    (self.fan_factor.pow(depth) - 1) / (self.fan_factor - 1)
  }
}

/// Nodes in a complete tree with levels `0..=depth`.
fn complete_node_count(fan_factor: u32, depth: u32) -> NodeCount {
  (fan_factor.pow(depth + 1) - 1) / (fan_factor - 1)
}

/// Implicit complete k-ary hierarchies, one per model.
///
/// Node ids are level order: parent `(id - 1) / k`, children `id * k + 1 + j`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompleteLodTree {
  models: Vec<LodModel>,
}

impl CompleteLodTree {
  pub fn new(models: Vec<LodModel>) -> Self {
    Self { models }
  }

  pub fn push(&mut self, model: LodModel) -> ModelId {
    self.models.push(model);
    (self.models.len() - 1) as ModelId
  }

  #[inline]
  pub fn model(&self, model: ModelId) -> &LodModel {
    &self.models[model as usize]
  }
}

impl LodHierarchy for CompleteLodTree {
  fn get_num_models(&self) -> ModelId {
    self.models.len() as ModelId
  }

  fn get_num_nodes(&self, model: ModelId) -> NodeCount {
    self.model(model).num_nodes()
  }

  fn get_fan_factor(&self, model: ModelId) -> u32 {
    self.model(model).fan_factor
  }

  fn get_parent_id(&self, model: ModelId, node: NodeId) -> Option<NodeId> {
    (node != 0).then(|| (node - 1) / self.model(model).fan_factor)
  }

  fn get_child_id(&self, model: ModelId, node: NodeId, child: u32) -> NodeId {
    let fan_factor = self.model(model).fan_factor;
    // Saturates past the id range, which reads as "no child".
    node
      .saturating_mul(fan_factor)
      .saturating_add(1 + child)
  }

  fn get_depth_of_node(&self, model: ModelId, node: NodeId) -> u32 {
    let lod = self.model(model);
    let mut depth = 0;
    while depth < lod.depth && lod.first_of_depth(depth + 1) <= node {
      depth += 1;
    }
    depth
  }

  fn get_depth(&self, model: ModelId) -> u32 {
    self.model(model).depth
  }

  fn get_first_node_id_of_depth(&self, model: ModelId, depth: u32) -> NodeId {
    self.model(model).first_of_depth(depth)
  }

  fn get_length_of_depth(&self, model: ModelId, depth: u32) -> NodeCount {
    self.model(model).fan_factor.pow(depth)
  }

  fn get_bounding_box(&self, model: ModelId, node: NodeId) -> Aabb3d {
    self.model(model).bounds[node as usize]
  }
}
