//! Axis-aligned bounding box with double precision for large scenes.

use glam::DVec3;

/// Double-precision axis-aligned bounding box.
///
/// Used for view-cell extents, grid outer bounds and LOD node bounds.
/// Both corners are inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb3d {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl Aabb3d {
	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create a new AABB from center and half-extents.
	pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Create a new AABB from center and full per-axis size.
	pub fn from_center_size(center: DVec3, size: DVec3) -> Self {
		Self::from_center_half_extents(center, size * 0.5)
	}

	/// Check if this AABB overlaps with another.
	///
	/// Two AABBs overlap if they share any interior or boundary points.
	#[inline]
	pub fn overlaps(&self, other: &Aabb3d) -> bool {
		self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
	}

	/// Check if this AABB contains a point.
	///
	/// NaN coordinates are never contained.
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}

	/// Closest point inside the box.
	#[inline]
	pub fn clamp_point(&self, point: DVec3) -> DVec3 {
		point.clamp(self.min, self.max)
	}

	/// Smallest box enclosing both boxes.
	#[inline]
	pub fn union(&self, other: &Aabb3d) -> Aabb3d {
		Self {
			min: self.min.min(other.min),
			max: self.max.max(other.max),
		}
	}

	/// Distance along a ray to the box entry point (slab test).
	///
	/// `inv_dir` is the per-axis reciprocal of the ray direction. Returns 0
	/// when the origin is inside, `None` when the box is missed or behind.
	#[inline]
	pub fn ray_distance(&self, origin: DVec3, inv_dir: DVec3) -> Option<f64> {
		self.ray_interval(origin, inv_dir).map(|(enter, _)| enter)
	}

	/// Entry and exit distances along a ray, entry clamped to 0.
	///
	/// `None` when the box is missed or entirely behind the origin.
	#[inline]
	pub fn ray_interval(&self, origin: DVec3, inv_dir: DVec3) -> Option<(f64, f64)> {
		let t1 = (self.min - origin) * inv_dir;
		let t2 = (self.max - origin) * inv_dir;
		let t_enter = t1.min(t2).max_element();
		let t_exit = t1.max(t2).min_element();
		(t_exit >= t_enter && t_exit >= 0.0).then_some((t_enter.max(0.0), t_exit))
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}
}
