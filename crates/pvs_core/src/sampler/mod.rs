//! Visibility sampler - offline PVS precomputation.
//!
//! For each sample the renderer produces an id frame from a cell, the frame
//! is reduced to a node histogram, and every node above the visibility
//! threshold is recorded in the cell. Two policies choose the samples:
//!
//! - **Sweep**: every cell center, six axis directions each
//! - **Randomized**: random cell, random point inside it, six directions,
//!   repeated until a wall-clock budget is spent
//!
//! After sampling, two passes complete the PVS:
//!
//! 1. **Node bounds**: nodes whose bounds at the model's average rendered
//!    depth overlap the cell are marked, covering geometry inside the cell
//!    that never dominated a frame.
//! 2. **Propagation**: see [`propagation`]. Runs in parallel per cell and
//!    joins before returning.
//!
//! Rendering needs the stateful renderer and therefore runs on the calling
//! thread.

pub mod camera;
pub mod histogram;
pub mod propagation;

#[cfg(test)]
pub(crate) mod test_utils;

use std::time::Duration;

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use web_time::Instant;

pub use camera::{sample_view, SampleDirection};
pub use histogram::NodeHistogram;
pub use propagation::{propagate_cell, propagate_grid};

use crate::grid::PvsGrid;
use crate::lod::LodHierarchy;
use crate::renderer::{IdFrame, IdRenderer};
use crate::types::{ModelId, NodeCount};
use crate::view_cell::ViewCell;

/// How samples are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingMode {
  /// All cells in index order, each from its center.
  Sweep,
  /// Random cells and positions until the budget is spent.
  Randomized { time_budget: Duration },
}

/// Sampler configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerConfig {
  /// Fraction of the frame a node must exceed to count as visible.
  pub visibility_threshold: f64,
  pub mode: SamplingMode,
  /// Frame width in pixels. Height follows from `aspect`.
  pub resolution: u32,
  /// Vertical field of view in radians.
  pub fov_y: f64,
  pub aspect: f64,
  /// Seed for randomized mode. `None` seeds from the OS.
  pub seed: Option<u64>,
  /// Run ancestor/descendant propagation after sampling.
  pub propagate: bool,
  /// Run the node-bounds pass after sampling.
  pub check_node_bounds: bool,
}

impl SamplerConfig {
  pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 1e-4;
  pub const DEFAULT_RESOLUTION: u32 = 512;
  pub const DEFAULT_FOV_Y: f64 = std::f64::consts::FRAC_PI_2;

  pub const DEFAULT: Self = Self {
    visibility_threshold: Self::DEFAULT_VISIBILITY_THRESHOLD,
    mode: SamplingMode::Sweep,
    resolution: Self::DEFAULT_RESOLUTION,
    fov_y: Self::DEFAULT_FOV_Y,
    aspect: 1.0,
    seed: None,
    propagate: true,
    check_node_bounds: true,
  };

  /// Frame height for `resolution` and `aspect`.
  pub fn frame_height(&self) -> u32 {
    ((self.resolution as f64 / self.aspect).round() as u32).max(1)
  }
}

impl Default for SamplerConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Statistics from one sampling run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SamplingStats {
  /// Frames rendered.
  pub samples: usize,
  /// Frames without any node above the threshold.
  pub empty_samples: usize,
  /// Direction cycles (one position, six frames).
  pub cycles: usize,
  /// Bits newly set from histograms.
  pub recorded: usize,
  /// Bits newly set by the node-bounds pass.
  pub bounds_marked: usize,
  /// Bits newly set by propagation.
  pub propagated: usize,
  /// Rendered ids outside the grid's node ranges.
  pub dropped_ids: usize,
  pub elapsed: Duration,
}

/// Running depth average of the nodes recorded for one model in one cell.
#[derive(Clone, Copy, Debug, Default)]
struct DepthAccumulator {
  sum: u64,
  count: u64,
}

impl DepthAccumulator {
  #[inline]
  fn add(&mut self, depth: u32) {
    self.sum += depth as u64;
    self.count += 1;
  }

  /// Rounded average, `None` if nothing was recorded.
  fn average(&self) -> Option<u32> {
    (self.count > 0).then(|| (self.sum as f64 / self.count as f64).round() as u32)
  }
}

/// Per-run bookkeeping shared by the sampling policies.
struct RunState<'s> {
  ids: &'s [NodeCount],
  depths: &'s mut [Vec<DepthAccumulator>],
  recorded: &'s mut [ViewCell],
  stats: &'s mut SamplingStats,
}

/// Drives the renderer over a grid and fills its cells.
pub struct PvsSampler<'a, R: IdRenderer, L: LodHierarchy> {
  renderer: R,
  lod: &'a L,
  config: SamplerConfig,
  frame: IdFrame,
}

impl<'a, R: IdRenderer, L: LodHierarchy> PvsSampler<'a, R, L> {
  pub fn new(renderer: R, lod: &'a L, config: SamplerConfig) -> Self {
    let frame = IdFrame::new(config.resolution.max(1), config.frame_height());
    Self {
      renderer,
      lod,
      config,
      frame,
    }
  }

  #[inline]
  pub fn config(&self) -> &SamplerConfig {
    &self.config
  }

  #[inline]
  pub fn renderer(&self) -> &R {
    &self.renderer
  }

  pub fn into_renderer(self) -> R {
    self.renderer
  }

  /// Sample `grid`, then run the configured post passes.
  ///
  /// # Panics
  /// Panics if the grid's node counts differ from the LOD hierarchy's.
  #[tracing::instrument(skip_all, name = "sampler::run")]
  pub fn run<G: PvsGrid + ?Sized>(&mut self, grid: &mut G) -> SamplingStats {
    let ids = grid.ids().to_vec();
    assert_eq!(
      ids,
      self.lod.node_counts(),
      "grid node counts do not match the LOD hierarchy"
    );

    let start = Instant::now();
    let mut stats = SamplingStats::default();
    let cell_count = grid.get_cell_count();
    let mut depths = vec![vec![DepthAccumulator::default(); ids.len()]; cell_count];
    // Nodes observed per cell in this run; only these seed propagation.
    let mut recorded = vec![ViewCell::default(); cell_count];

    let mut state = RunState {
      ids: &ids,
      depths: &mut depths,
      recorded: &mut recorded,
      stats: &mut stats,
    };
    match self.config.mode {
      SamplingMode::Sweep => self.sweep(grid, &mut state),
      SamplingMode::Randomized { time_budget } => self.randomized(grid, &mut state, time_budget),
    }

    if self.config.check_node_bounds {
      stats.bounds_marked = self.mark_node_bounds(grid, &depths, &mut recorded);
    }
    if self.config.propagate {
      stats.propagated = propagate_grid(grid, &recorded, self.lod);
    }

    stats.elapsed = start.elapsed();
    info!(
      samples = stats.samples,
      empty = stats.empty_samples,
      recorded = stats.recorded,
      bounds_marked = stats.bounds_marked,
      propagated = stats.propagated,
      dropped_ids = stats.dropped_ids,
      elapsed_ms = stats.elapsed.as_millis() as u64,
      "sampling finished"
    );
    stats
  }

  fn sweep<G: PvsGrid + ?Sized>(&mut self, grid: &mut G, state: &mut RunState<'_>) {
    for index in 0..grid.get_cell_count() {
      let position = grid.get_cell_at_index(index).get_position_center();
      self.sample_cycle(grid, index, position, state);
      debug!(cell = index, "sampled cell");
    }
  }

  fn randomized<G: PvsGrid + ?Sized>(
    &mut self,
    grid: &mut G,
    state: &mut RunState<'_>,
    time_budget: Duration,
  ) {
    let cell_count = grid.get_cell_count();
    if cell_count == 0 {
      return;
    }
    let mut rng = match self.config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };

    let mut remaining = time_budget;
    let mut checkpoint = Instant::now();
    while !remaining.is_zero() {
      let index = rng.random_range(0..cell_count);
      let cell = grid.get_cell_at_index(index);
      let jitter = DVec3::new(
        rng.random_range(-0.5..0.5),
        rng.random_range(-0.5..0.5),
        rng.random_range(-0.5..0.5),
      );
      let position = cell.get_position_center() + jitter * cell.get_size();
      self.sample_cycle(grid, index, position, state);

      // Checked once per cycle; an in-flight cycle always completes.
      let now = Instant::now();
      remaining = remaining.saturating_sub(now.duration_since(checkpoint));
      checkpoint = now;
    }
  }

  /// Render the six directions from `position` into cell `index`.
  fn sample_cycle<G: PvsGrid + ?Sized>(
    &mut self,
    grid: &mut G,
    index: usize,
    position: DVec3,
    state: &mut RunState<'_>,
  ) {
    let ids: &[NodeCount] = state.ids;
    let depths = &mut state.depths[index];
    let recorded = &mut state.recorded[index];
    let stats = &mut *state.stats;
    let cell_size = grid.get_cell_at_index(index).get_size();
    for direction in SampleDirection::ALL {
      let view = sample_view(
        position,
        cell_size,
        direction,
        self.config.fov_y,
        self.config.aspect,
      );
      self.renderer.render_ids(&view, &mut self.frame);

      let mut histogram = NodeHistogram::from_frame(&self.frame);
      let dropped = histogram.retain_valid(ids);
      if dropped > 0 {
        if stats.dropped_ids == 0 {
          warn!(
            dropped,
            "renderer produced ids outside the grid's node ranges, skipping them"
          );
        }
        stats.dropped_ids += dropped;
      }

      stats.samples += 1;
      let cell = grid.get_cell_at_index_mut(index);
      let mut any = false;
      for key in histogram.visible(self.config.visibility_threshold) {
        any = true;
        recorded.set_visibility(key.model, key.node, true);
        depths[key.model as usize].add(self.lod.get_depth_of_node(key.model, key.node));
        if !cell.get_visibility(key.model, key.node) {
          cell.set_visibility(key.model, key.node, true);
          stats.recorded += 1;
        }
      }
      if !any {
        stats.empty_samples += 1;
      }
    }
    stats.cycles += 1;
  }

  /// Mark nodes at each model's average rendered depth that overlap a cell.
  fn mark_node_bounds<G: PvsGrid + ?Sized>(
    &self,
    grid: &mut G,
    depths: &[Vec<DepthAccumulator>],
    recorded: &mut [ViewCell],
  ) -> usize {
    let lod = self.lod;
    grid
      .cells_mut()
      .into_par_iter()
      .zip(depths.par_iter())
      .zip(recorded.par_iter_mut())
      .map(|((cell, cell_depths), recorded)| {
        mark_cell_node_bounds(cell, cell_depths, recorded, lod)
      })
      .sum()
  }
}

fn mark_cell_node_bounds<L: LodHierarchy>(
  cell: &mut ViewCell,
  depths: &[DepthAccumulator],
  recorded: &mut ViewCell,
  lod: &L,
) -> usize {
  let bounds = cell.bounds();
  let mut marked = 0;
  for (model, accumulator) in depths.iter().enumerate() {
    let model = model as ModelId;
    let Some(depth) = accumulator.average() else {
      continue;
    };
    let depth = depth.min(lod.get_depth(model));
    let num_nodes = lod.get_num_nodes(model);
    let first = lod.get_first_node_id_of_depth(model, depth);
    let end = first
      .saturating_add(lod.get_length_of_depth(model, depth))
      .min(num_nodes);
    for node in first..end {
      if !lod.get_bounding_box(model, node).overlaps(&bounds) {
        continue;
      }
      recorded.set_visibility(model, node, true);
      if !cell.get_visibility(model, node) {
        cell.set_visibility(model, node, true);
        marked += 1;
      }
    }
  }
  marked
}
