//! Sample cameras - the six axis-aligned views taken from a cell.

use glam::DVec3;

use crate::renderer::SampleView;

/// Canonical view direction, in sampling order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleDirection {
  PosX,
  NegX,
  PosY,
  NegY,
  PosZ,
  NegZ,
}

impl SampleDirection {
  pub const ALL: [SampleDirection; 6] = [
    SampleDirection::PosX,
    SampleDirection::NegX,
    SampleDirection::PosY,
    SampleDirection::NegY,
    SampleDirection::PosZ,
    SampleDirection::NegZ,
  ];

  /// Axis index (0 = X, 1 = Y, 2 = Z).
  #[inline]
  pub fn axis(self) -> usize {
    match self {
      SampleDirection::PosX | SampleDirection::NegX => 0,
      SampleDirection::PosY | SampleDirection::NegY => 1,
      SampleDirection::PosZ | SampleDirection::NegZ => 2,
    }
  }

  #[inline]
  pub fn forward(self) -> DVec3 {
    match self {
      SampleDirection::PosX => DVec3::X,
      SampleDirection::NegX => DVec3::NEG_X,
      SampleDirection::PosY => DVec3::Y,
      SampleDirection::NegY => DVec3::NEG_Y,
      SampleDirection::PosZ => DVec3::Z,
      SampleDirection::NegZ => DVec3::NEG_Z,
    }
  }

  /// +Y, except when looking along Y where +Z is used.
  #[inline]
  pub fn up(self) -> DVec3 {
    match self {
      SampleDirection::PosY | SampleDirection::NegY => DVec3::Z,
      _ => DVec3::Y,
    }
  }
}

/// Camera at `position` looking along `direction`.
///
/// The near plane sits half the cell's extent along the view axis away, so
/// geometry inside the cell itself is not rendered.
pub fn sample_view(
  position: DVec3,
  cell_size: DVec3,
  direction: SampleDirection,
  fov_y: f64,
  aspect: f64,
) -> SampleView {
  SampleView {
    position,
    direction: direction.forward(),
    up: direction.up(),
    fov_y,
    aspect,
    near_plane: cell_size[direction.axis()] * 0.5,
  }
}
