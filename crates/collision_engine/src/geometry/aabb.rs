//! Axis-aligned bounding boxes

use std::ops::{Add, AddAssign};

use crate::foundation::math::Vec3;

/// Axis-Aligned Bounding Box for spatial queries
///
/// A non-degenerate box satisfies `min.x <= max.x` (and likewise for y/z).
/// Degenerate boxes (`min == max`) are permitted and treated as zero-volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::zeros(),
            max: Vec3::zeros(),
        }
    }
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents (half-size)
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Create the smallest AABB enclosing a set of points
    ///
    /// Returns a degenerate box at the origin for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };

        let mut bounds = Self::new(*first, *first);
        for point in &points[1..] {
            bounds.min.x = bounds.min.x.min(point.x);
            bounds.min.y = bounds.min.y.min(point.y);
            bounds.min.z = bounds.min.z.min(point.z);

            bounds.max.x = bounds.max.x.max(point.x);
            bounds.max.y = bounds.max.y.max(point.y);
            bounds.max.z = bounds.max.z.max(point.z);
        }
        bounds
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Surface area of the box (0.0 for degenerate boxes)
    ///
    /// Used by the SAH cost model when choosing BVH split planes.
    pub fn surface_area(&self) -> f32 {
        let size = self.max - self.min;
        if size.x <= 0.0 || size.y <= 0.0 || size.z <= 0.0 {
            return 0.0;
        }
        2.0 * (size.x * size.y + size.y * size.z + size.z * size.x)
    }

    /// Get one of the 8 corner vertices by bit index
    ///
    /// Bit 0 selects the X coordinate (0 = min, 1 = max), bit 1 selects Y,
    /// bit 2 selects Z. Indices are taken modulo 8.
    pub fn corner(&self, index: u32) -> Vec3 {
        let index = index % 8;
        Vec3::new(
            if index & 1 == 0 { self.min.x } else { self.max.x },
            if index & (1 << 1) == 0 { self.min.y } else { self.max.y },
            if index & (1 << 2) == 0 { self.min.z } else { self.max.z },
        )
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Union of this box with another
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }
}

impl Add for Aabb {
    type Output = Aabb;

    fn add(self, other: Aabb) -> Aabb {
        self.union(&other)
    }
}

impl AddAssign for Aabb {
    fn add_assign(&mut self, other: Aabb) {
        *self = self.union(&other);
    }
}
