//! Oriented bounding boxes

use crate::foundation::math::{Transform, Vec3};
use super::aabb::Aabb;

/// Oriented Bounding Box (arbitrary rotation)
///
/// Defined by a center, three orthonormal axes, and half-size extents along
/// each axis. Derived from a local-space AABB plus a world transform; the
/// derivation is recomputed for every query rather than cached here.
#[derive(Debug, Clone, Copy)]
pub struct Obb {
    /// Center position in world space
    pub center: Vec3,
    /// Orthonormal basis axes in world space
    pub axes: [Vec3; 3],
    /// Half-size along each axis
    pub extents: Vec3,
}

impl Obb {
    /// Create an OBB directly from its parts
    pub fn new(center: Vec3, axes: [Vec3; 3], extents: Vec3) -> Self {
        Self { center, axes, extents }
    }

    /// Derive a world-space OBB from a local-space AABB and a world transform
    ///
    /// The axes are the rotated unit basis vectors, the extents are the local
    /// half-extents scaled by the transform's (absolute) scale, and the
    /// center is the fully transformed local center.
    pub fn from_aabb_transform(local: &Aabb, transform: &Transform) -> Self {
        let scale = transform.scale.abs();
        Self {
            center: transform.transform_point(local.center()),
            axes: [
                transform.rotation * Vec3::x(),
                transform.rotation * Vec3::y(),
                transform.rotation * Vec3::z(),
            ],
            extents: local.extents().component_mul(&scale),
        }
    }

    /// Get one of the 8 corner vertices by bit index
    ///
    /// Bit 0 selects the sign along the first axis, bit 1 along the second,
    /// bit 2 along the third. Indices are taken modulo 8.
    pub fn corner(&self, index: u32) -> Vec3 {
        let index = index % 8;
        let mut vertex = self.center;
        vertex += if index & 1 == 0 {
            self.axes[0] * self.extents.x
        } else {
            -self.axes[0] * self.extents.x
        };
        vertex += if index & (1 << 1) == 0 {
            self.axes[1] * self.extents.y
        } else {
            -self.axes[1] * self.extents.y
        };
        vertex += if index & (1 << 2) == 0 {
            self.axes[2] * self.extents.z
        } else {
            -self.axes[2] * self.extents.z
        };
        vertex
    }

    /// Smallest AABB enclosing this OBB
    pub fn enclosing_aabb(&self) -> Aabb {
        let reach = self.axes[0].abs() * self.extents.x
            + self.axes[1].abs() * self.extents.y
            + self.axes[2].abs() * self.extents.z;
        Aabb::from_center_extents(self.center, reach)
    }
}
