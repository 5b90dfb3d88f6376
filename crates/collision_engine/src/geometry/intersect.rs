//! Free-function intersection predicates
//!
//! Slab-method ray/box tests (naive and branchless precomputed variants),
//! Möller-Trumbore ray/triangle intersection, and a 15-axis separating-axis
//! test for OBB/AABB overlap.
//!
//! Every function here is a total function over arbitrary finite inputs:
//! none panic, and degenerate geometry deterministically resolves to
//! "no hit" / "no separation".

use crate::foundation::math::Vec3;
use super::aabb::Aabb;
use super::obb::Obb;
use super::ray::{OptimizedRay, Ray};

const EPSILON: f32 = 1e-6;

/// A ray whose direction is near zero on every axis cannot hit anything
fn is_zero_direction(direction: Vec3) -> bool {
    direction.x.abs() < EPSILON && direction.y.abs() < EPSILON && direction.z.abs() < EPSILON
}

/// Ray-AABB intersection using the classic slab method
///
/// Returns the entry distance clamped to >= 0 (a ray starting inside the box
/// reports 0). Axes where the direction is near zero fall back to a
/// containment check instead of dividing.
pub fn intersect_ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    if is_zero_direction(ray.direction) {
        return None;
    }

    let mut tmin = f32::MIN;
    let mut tmax = f32::MAX;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];
        let slab_min = aabb.min[axis];
        let slab_max = aabb.max[axis];

        if dir.abs() < EPSILON {
            // Parallel to the slab: miss unless the origin lies within it
            if origin < slab_min || origin > slab_max {
                return None;
            }
        } else {
            let inv = 1.0 / dir;
            let mut t1 = (slab_min - origin) * inv;
            let mut t2 = (slab_max - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            tmin = tmin.max(t1);
            tmax = tmax.min(t2);
            if tmin > tmax {
                return None;
            }
        }
    }

    if tmax < 0.0 {
        return None;
    }
    Some(tmin.max(0.0))
}

/// Ray-AABB intersection using the branchless slab method
///
/// Selects the near/far plane per axis via the ray's precomputed sign table
/// instead of min/max branches, then progressively tightens `[tmin, tmax]`.
/// Hit iff `tmax >= tmin && tmax >= 0`; returns the entry distance clamped
/// to >= 0.
pub fn intersect_opt_ray_aabb(ray: &OptimizedRay, aabb: &Aabb) -> Option<f32> {
    if is_zero_direction(ray.direction) {
        return None;
    }

    let bounds = [aabb.min, aabb.max];

    let mut tmin = (bounds[ray.sign[0]].x - ray.origin.x) * ray.inv_direction.x;
    let mut tmax = (bounds[1 - ray.sign[0]].x - ray.origin.x) * ray.inv_direction.x;

    let tymin = (bounds[ray.sign[1]].y - ray.origin.y) * ray.inv_direction.y;
    let tymax = (bounds[1 - ray.sign[1]].y - ray.origin.y) * ray.inv_direction.y;

    if tmin > tymax || tymin > tmax {
        return None;
    }
    tmin = tmin.max(tymin);
    tmax = tmax.min(tymax);

    let tzmin = (bounds[ray.sign[2]].z - ray.origin.z) * ray.inv_direction.z;
    let tzmax = (bounds[1 - ray.sign[2]].z - ray.origin.z) * ray.inv_direction.z;

    if tmin > tzmax || tzmin > tmax {
        return None;
    }
    tmin = tmin.max(tzmin);
    tmax = tmax.min(tzmax);

    if tmax >= tmin && tmax >= 0.0 {
        Some(tmin.max(0.0))
    } else {
        None
    }
}

/// Möller-Trumbore ray-triangle intersection
///
/// Returns the smallest positive distance along the ray, or `None` when the
/// ray is parallel to the triangle plane, the hit lies outside the
/// barycentric bounds, or the triangle is behind the origin.
///
/// See: "Fast, Minimum Storage Ray/Triangle Intersection" by Möller & Trumbore
pub fn intersect_ray_triangle(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;

    let perpendicular = ray.direction.cross(&edge2);
    let determinant = edge1.dot(&perpendicular);

    // Ray parallel to triangle?
    if determinant > -EPSILON && determinant < EPSILON {
        return None;
    }

    let inv_determinant = 1.0 / determinant;
    let origin_to_a = ray.origin - a;
    let u = inv_determinant * origin_to_a.dot(&perpendicular);
    if u < -EPSILON || u > 1.0 + EPSILON {
        return None;
    }

    let q = origin_to_a.cross(&edge1);
    let v = inv_determinant * ray.direction.dot(&q);
    if v < -EPSILON || u + v > 1.0 + EPSILON {
        return None;
    }

    let distance = inv_determinant * edge2.dot(&q);
    if distance > EPSILON {
        Some(distance)
    } else {
        None
    }
}

/// OBB-AABB overlap via the Separating Axis Theorem
///
/// Tests 15 candidate axes: the 3 world axes, the 3 OBB axes, and the 9
/// pairwise cross products. Near-zero-length axes (parallel edge pairs) are
/// skipped. A separating axis on any candidate means no collision.
pub fn intersect_obb_aabb(obb: &Obb, aabb: &Aabb) -> bool {
    let world_axes = [Vec3::x(), Vec3::y(), Vec3::z()];

    for axis in world_axes {
        if is_separating_axis(&axis, obb, aabb) {
            return false;
        }
    }

    for axis in obb.axes {
        if is_separating_axis(&axis, obb, aabb) {
            return false;
        }
    }

    for obb_axis in obb.axes {
        for world_axis in world_axes {
            let axis = obb_axis.cross(&world_axis);
            if is_separating_axis(&axis, obb, aabb) {
                return false;
            }
        }
    }

    true
}

/// Check whether `axis` separates the two boxes' projected intervals
///
/// The AABB projects via its two sign-selected corners; the OBB projects via
/// all 8 corners. Degenerate axes never separate.
fn is_separating_axis(axis: &Vec3, obb: &Obb, aabb: &Aabb) -> bool {
    if axis.magnitude_squared() < EPSILON {
        return false;
    }

    // AABB extreme corners along the axis, selected per component sign
    let mut near = aabb.min;
    let mut far = aabb.max;
    if axis.x < 0.0 {
        std::mem::swap(&mut near.x, &mut far.x);
    }
    if axis.y < 0.0 {
        std::mem::swap(&mut near.y, &mut far.y);
    }
    if axis.z < 0.0 {
        std::mem::swap(&mut near.z, &mut far.z);
    }
    let aabb_min = axis.dot(&near);
    let aabb_max = axis.dot(&far);

    let mut obb_min = f32::MAX;
    let mut obb_max = f32::MIN;
    for index in 0..8 {
        let projection = axis.dot(&obb.corner(index));
        obb_min = obb_min.min(projection);
        obb_max = obb_max.max(projection);
    }

    obb_max < aabb_min || obb_min > aabb_max
}
