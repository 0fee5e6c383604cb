//! Id renderer collaborator.
//!
//! The sampler asks for frames whose pixels name the `(model, node)` they
//! show. How the frame is produced (GPU, software) is up to the renderer.
//! [`BoxRenderer`] is a CPU reference implementation that ray casts LOD node
//! bounds and is enough for tests, benchmarks and small scenes.

use glam::DVec3;

use crate::bounds::Aabb3d;
use crate::lod::LodHierarchy;
use crate::types::{ModelId, NodeId, NodeKey};

/// Camera for one id sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleView {
  pub position: DVec3,
  /// Unit view direction.
  pub direction: DVec3,
  /// Unit up vector, orthogonal to `direction`.
  pub up: DVec3,
  /// Vertical field of view in radians.
  pub fov_y: f64,
  /// Width over height.
  pub aspect: f64,
  /// Distance to the near plane. Geometry closer than this is clipped.
  pub near_plane: f64,
}

impl SampleView {
  /// World-space direction through the center of pixel `(x, y)`.
  ///
  /// Row 0 is the top of the frame.
  pub fn pixel_direction(&self, x: u32, y: u32, width: u32, height: u32) -> DVec3 {
    let right = self.direction.cross(self.up).normalize();
    let tan_half = (self.fov_y * 0.5).tan();
    let ndc_x = ((x as f64 + 0.5) / width as f64) * 2.0 - 1.0;
    let ndc_y = 1.0 - ((y as f64 + 0.5) / height as f64) * 2.0;
    (self.direction + right * (ndc_x * tan_half * self.aspect) + self.up * (ndc_y * tan_half))
      .normalize()
  }
}

/// Per-pixel node ids. `None` is background.
#[derive(Clone, Debug, PartialEq)]
pub struct IdFrame {
  width: u32,
  height: u32,
  pixels: Vec<Option<NodeKey>>,
}

impl IdFrame {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      pixels: vec![None; width as usize * height as usize],
    }
  }

  #[inline]
  pub fn width(&self) -> u32 {
    self.width
  }

  #[inline]
  pub fn height(&self) -> u32 {
    self.height
  }

  #[inline]
  pub fn pixel_count(&self) -> usize {
    self.pixels.len()
  }

  #[inline]
  pub fn pixels(&self) -> &[Option<NodeKey>] {
    &self.pixels
  }

  #[inline]
  pub fn pixels_mut(&mut self) -> &mut [Option<NodeKey>] {
    &mut self.pixels
  }

  #[inline]
  pub fn set(&mut self, x: u32, y: u32, key: Option<NodeKey>) {
    let index = y as usize * self.width as usize + x as usize;
    self.pixels[index] = key;
  }

  /// Reset every pixel to background.
  pub fn clear(&mut self) {
    self.pixels.fill(None);
  }
}

/// Produces id frames for the sampler.
///
/// Implementations overwrite every pixel of `frame`.
pub trait IdRenderer {
  fn render_ids(&mut self, view: &SampleView, frame: &mut IdFrame);
}

/// Ray casts the bounding boxes of one LOD level per model.
pub struct BoxRenderer<'a, L: LodHierarchy> {
  lod: &'a L,
  /// Rendered depth per model.
  depths: Vec<u32>,
}

impl<'a, L: LodHierarchy> BoxRenderer<'a, L> {
  /// Render every model at its deepest level.
  pub fn new(lod: &'a L) -> Self {
    let depths = (0..lod.get_num_models())
      .map(|model| lod.get_depth(model))
      .collect();
    Self { lod, depths }
  }

  /// Render every model at `depth`, clamped to the model's deepest level.
  pub fn at_depth(lod: &'a L, depth: u32) -> Self {
    let depths = (0..lod.get_num_models())
      .map(|model| depth.min(lod.get_depth(model)))
      .collect();
    Self { lod, depths }
  }

  /// Nodes drawn for a model.
  fn drawn_nodes(&self, model: ModelId) -> impl Iterator<Item = (NodeId, Aabb3d)> + '_ {
    let depth = self.depths[model as usize];
    let first = self.lod.get_first_node_id_of_depth(model, depth);
    let end = (first + self.lod.get_length_of_depth(model, depth))
      .min(self.lod.get_num_nodes(model));
    (first..end).map(move |node| (node, self.lod.get_bounding_box(model, node)))
  }
}

impl<L: LodHierarchy> IdRenderer for BoxRenderer<'_, L> {
  fn render_ids(&mut self, view: &SampleView, frame: &mut IdFrame) {
    let this = &*self;
    let boxes: Vec<(NodeKey, Aabb3d)> = (0..this.lod.get_num_models())
      .flat_map(|model| {
        this
          .drawn_nodes(model)
          .map(move |(node, bounds)| (NodeKey::new(model, node), bounds))
      })
      .collect();

    let (width, height) = (frame.width(), frame.height());
    for y in 0..height {
      for x in 0..width {
        let direction = view.pixel_direction(x, y, width, height);
        let inv_dir = direction.recip();
        let mut nearest: Option<(f64, NodeKey)> = None;
        // Near plane distance along this ray.
        let near = view.near_plane / direction.dot(view.direction);
        for &(key, bounds) in &boxes {
          let Some((enter, exit)) = bounds.ray_interval(view.position, inv_dir) else {
            continue;
          };
          if exit < near {
            continue;
          }
          // A box cut by the near plane is drawn from the plane onward.
          let distance = enter.max(near);
          if nearest.is_none_or(|(best, _)| distance < best) {
            nearest = Some((distance, key));
          }
        }
        frame.set(x, y, nearest.map(|(_, key)| key));
      }
    }
  }
}
