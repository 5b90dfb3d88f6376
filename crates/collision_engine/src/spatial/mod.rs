//! Spatial partitioning structures
//!
//! Two bounding volume hierarchies with deliberately different build
//! strategies:
//!
//! - [`StaticBvh`] invests in SAH-quality partitioning because it is built
//!   once per scene change and queried very frequently (every pick).
//! - [`BroadphaseBvh`] uses a cheap median split because dynamic shapes move
//!   continuously and the tree may be rebuilt every frame.

pub mod static_bvh;
pub mod broadphase;

pub use static_bvh::{BvhNode, BvhPrimitive, RayHit, StaticBvh};
pub use broadphase::{BroadNode, BroadphaseBvh};
