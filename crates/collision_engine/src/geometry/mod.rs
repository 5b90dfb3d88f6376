//! Geometric value types and intersection predicates
//!
//! Provides the bounding volumes and ray types used by the spatial indexes,
//! plus the exact intersection tests that back both ray picking and overlap
//! detection.
//!
//! # Module Organization
//!
//! - [`aabb`] - Axis-aligned bounding boxes
//! - [`obb`] - Oriented bounding boxes
//! - [`ray`] - Rays, including the precomputed variant for branchless slab tests
//! - [`intersect`] - Free-function intersection predicates
//!
//! All predicates are total functions over arbitrary finite inputs: degenerate
//! geometry (zero-length rays, zero-extent boxes) resolves to "no hit" rather
//! than panicking.

pub mod aabb;
pub mod obb;
pub mod ray;
pub mod intersect;

pub use aabb::Aabb;
pub use obb::Obb;
pub use ray::{Ray, OptimizedRay};
pub use intersect::{
    intersect_ray_aabb,
    intersect_opt_ray_aabb,
    intersect_ray_triangle,
    intersect_obb_aabb,
};
