//! Rays for picking and spatial queries

use crate::foundation::math::Vec3;

/// Components with absolute value below this are treated as zero when
/// inverting a ray direction.
const DIRECTION_EPSILON: f32 = 1e-6;

/// A ray for ray casting and picking
///
/// The direction is stored as given; callers are not required to normalize
/// it, so reported distances are in units of the direction's length.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Ray with precomputed reciprocal direction for branchless slab tests
///
/// Near-zero direction components are replaced by ±1e30 in the reciprocal so
/// the slab test never divides by zero and never produces NaN. The `sign`
/// table records which slab plane is the near plane per axis, replacing the
/// min/max branches of the naive test with an index lookup.
#[derive(Debug, Clone, Copy)]
pub struct OptimizedRay {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray
    pub direction: Vec3,
    /// Componentwise reciprocal of the direction
    pub inv_direction: Vec3,
    /// 1 where the reciprocal direction is negative, 0 otherwise
    pub sign: [usize; 3],
}

impl OptimizedRay {
    /// Creates an optimized ray, precomputing the reciprocal direction and
    /// the per-axis sign table
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let invert = |component: f32| {
            if component.abs() < DIRECTION_EPSILON {
                if component < 0.0 { -1e30 } else { 1e30 }
            } else {
                1.0 / component
            }
        };

        let inv_direction = Vec3::new(
            invert(direction.x),
            invert(direction.y),
            invert(direction.z),
        );

        let sign = [
            usize::from(inv_direction.x < 0.0),
            usize::from(inv_direction.y < 0.0),
            usize::from(inv_direction.z < 0.0),
        ];

        Self {
            origin,
            direction,
            inv_direction,
            sign,
        }
    }
}

impl From<&Ray> for OptimizedRay {
    fn from(ray: &Ray) -> Self {
        Self::new(ray.origin, ray.direction)
    }
}
