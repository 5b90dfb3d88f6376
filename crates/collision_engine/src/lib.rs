//! # Collision Engine
//!
//! Spatial indexing and collision queries for scene editors and gameplay:
//! a static SAH-partitioned BVH for nearest-hit ray picking, a lazily
//! rebuilt broadphase BVH for dynamic shape overlap queries, and the
//! overlap-diffing manager that turns broadphase results into begin/end
//! overlap events.
//!
//! ## Features
//!
//! - **Ray Picking**: SAH-quality BVH built per scene snapshot, nearest-hit
//!   traversal with near-child-first ordering and distance pruning
//! - **Broadphase**: median-split BVH with O(1) upsert/remove and a dirty
//!   flag that batches rebuilds
//! - **Overlap Events**: budgeted per-frame processing with symmetric
//!   begin/end notifications and layer filtering
//! - **Exact Predicates**: slab ray/box tests, Möller-Trumbore, and
//!   separating-axis box overlap, all total over degenerate input
//!
//! ## Quick Start
//!
//! ```rust
//! use collision_engine::prelude::*;
//!
//! let mut manager = CollisionManager::new();
//! let mut events = EventCollector::new();
//!
//! let actor = Entity::new(1);
//! let key = manager.register(actor, Box::new(SphereShape::new(1.0)));
//!
//! manager.set_transform(key, &Transform::from_position(Vec3::new(2.0, 0.0, 0.0)));
//! manager.update(0.016, &mut events);
//!
//! assert!(manager.overlaps_of(key).unwrap().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod geometry;
pub mod spatial;
pub mod physics;

mod entity;

pub use entity::Entity;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Entity,
        config::{CollisionConfig, Config, ConfigError},
        foundation::math::{Mat4, Quat, Transform, Vec3},
        geometry::{Aabb, Obb, OptimizedRay, Ray},
        spatial::{BroadphaseBvh, BvhPrimitive, RayHit, StaticBvh},
        physics::{
            BoxShape, CapsuleShape, CollisionLayers, CollisionManager, CollisionShape, Contact,
            EventCollector, OverlapEvent, OverlapInfo, OverlapSink, ShapeFlags, ShapeKey,
            SphereShape, Volume,
        },
    };
}
