//! Node histogram of one id frame.

use std::collections::BTreeMap;

use crate::renderer::IdFrame;
use crate::types::{NodeCount, NodeKey};

/// Pixel count per rendered node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeHistogram {
  counts: BTreeMap<NodeKey, u32>,
  total_pixels: usize,
}

impl NodeHistogram {
  /// Count the non-background pixels of `frame`.
  pub fn from_frame(frame: &IdFrame) -> Self {
    let mut counts = BTreeMap::new();
    for key in frame.pixels().iter().flatten() {
      *counts.entry(*key).or_insert(0) += 1;
    }
    Self {
      counts,
      total_pixels: frame.pixel_count(),
    }
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  /// Distinct nodes present.
  #[inline]
  pub fn len(&self) -> usize {
    self.counts.len()
  }

  #[inline]
  pub fn total_pixels(&self) -> usize {
    self.total_pixels
  }

  pub fn count(&self, key: NodeKey) -> u32 {
    self.counts.get(&key).copied().unwrap_or(0)
  }

  /// Drop entries whose model or node is outside `ids`.
  ///
  /// Returns the number of distinct entries removed.
  pub fn retain_valid(&mut self, ids: &[NodeCount]) -> usize {
    let before = self.counts.len();
    self.counts.retain(|key, _| {
      ids
        .get(key.model as usize)
        .is_some_and(|&count| key.node < count)
    });
    before - self.counts.len()
  }

  /// Nodes covering strictly more than `threshold` of the frame, ascending.
  pub fn visible(&self, threshold: f64) -> impl Iterator<Item = NodeKey> + '_ {
    let total = self.total_pixels.max(1) as f64;
    self
      .counts
      .iter()
      .filter(move |(_, count)| **count as f64 / total > threshold)
      .map(|(key, _)| *key)
  }
}
