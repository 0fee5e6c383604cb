//! Test utilities for sampler tests.
//!
//! Provides a table-driven LOD hierarchy and a scripted id renderer so the
//! sampling pipeline can be tested without real geometry.

use glam::DVec3;

use crate::bounds::Aabb3d;
use crate::lod::LodHierarchy;
use crate::renderer::{IdFrame, IdRenderer, SampleView};
use crate::types::{ModelId, NodeCount, NodeId, NodeKey};

// =============================================================================
// Mock LOD hierarchy
// =============================================================================

/// Single-model hierarchy given by explicit parent and child tables.
pub struct TableLod {
  pub parents: Vec<Option<NodeId>>,
  /// Child slots per node; unused slots hold `num_nodes`.
  pub children: Vec<Vec<NodeId>>,
  pub depths: Vec<u32>,
  pub fan_factor: u32,
  pub bounds: Vec<Aabb3d>,
}

impl TableLod {
  /// 16 nodes, binary. Node 1 is the root of `1 -> {2, 3}`, `2 -> {4, 5}`,
  /// `3 -> {6, 7}`; nodes 4..=7 are leaves and the remaining ids are
  /// detached. All bounds lie far outside any test grid.
  pub fn binary16() -> Self {
    let num_nodes = 16;
    let mut parents = vec![None; num_nodes];
    let mut children = vec![vec![num_nodes as NodeId; 2]; num_nodes];
    let mut depths = vec![0; num_nodes];
    for node in 1..=3 {
      children[node] = vec![2 * node as NodeId, 2 * node as NodeId + 1];
    }
    for node in 2..=7 {
      parents[node] = Some((node / 2) as NodeId);
      depths[node] = if node < 4 { 1 } else { 2 };
    }
    let far = Aabb3d::from_center_size(DVec3::splat(1.0e4), DVec3::ONE);
    Self {
      parents,
      children,
      depths,
      fan_factor: 2,
      bounds: vec![far; num_nodes],
    }
  }
}

impl LodHierarchy for TableLod {
  fn get_num_models(&self) -> ModelId {
    1
  }

  fn get_num_nodes(&self, _model: ModelId) -> NodeCount {
    self.parents.len() as NodeCount
  }

  fn get_fan_factor(&self, _model: ModelId) -> u32 {
    self.fan_factor
  }

  fn get_parent_id(&self, _model: ModelId, node: NodeId) -> Option<NodeId> {
    self.parents[node as usize]
  }

  fn get_child_id(&self, _model: ModelId, node: NodeId, child: u32) -> NodeId {
    self.children[node as usize][child as usize]
  }

  fn get_depth_of_node(&self, _model: ModelId, node: NodeId) -> u32 {
    self.depths[node as usize]
  }

  fn get_depth(&self, _model: ModelId) -> u32 {
    self.depths.iter().copied().max().unwrap_or(0)
  }

  fn get_first_node_id_of_depth(&self, _model: ModelId, depth: u32) -> NodeId {
    1 << depth
  }

  fn get_length_of_depth(&self, _model: ModelId, depth: u32) -> NodeCount {
    1 << depth
  }

  fn get_bounding_box(&self, _model: ModelId, node: NodeId) -> Aabb3d {
    self.bounds[node as usize]
  }
}

// =============================================================================
// Mock renderer
// =============================================================================

/// Fills a fraction of the frame with a fixed node whenever the camera is
/// inside a region. Later rules paint over earlier ones.
pub struct ScriptedRenderer {
  pub rules: Vec<RenderRule>,
  /// Every view rendered, in order.
  pub views: Vec<SampleView>,
}

pub struct RenderRule {
  pub region: Aabb3d,
  pub key: NodeKey,
  /// Leading pixels painted, as a fraction of the frame.
  pub coverage: f64,
}

impl ScriptedRenderer {
  pub fn new(rules: Vec<RenderRule>) -> Self {
    Self {
      rules,
      views: Vec::new(),
    }
  }

  /// Renders background everywhere.
  pub fn empty() -> Self {
    Self::new(Vec::new())
  }

  /// One rule covering the whole frame.
  pub fn single(region: Aabb3d, key: NodeKey) -> Self {
    Self::new(vec![RenderRule {
      region,
      key,
      coverage: 1.0,
    }])
  }
}

impl IdRenderer for ScriptedRenderer {
  fn render_ids(&mut self, view: &SampleView, frame: &mut IdFrame) {
    frame.clear();
    let total = frame.pixel_count();
    for rule in &self.rules {
      if !rule.region.contains_point(view.position) {
        continue;
      }
      let painted = ((total as f64) * rule.coverage).round() as usize;
      for pixel in &mut frame.pixels_mut()[..painted.min(total)] {
        *pixel = Some(rule.key);
      }
    }
    self.views.push(*view);
  }
}
