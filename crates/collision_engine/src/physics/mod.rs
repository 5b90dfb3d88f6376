//! Collision detection and overlap-event orchestration
//!
//! Provides the dynamic-shape side of the engine: concrete collision shapes
//! behind a capability trait, exact narrowphase overlap tests, layer-based
//! filtering, and the per-frame [`CollisionManager`] that diffs broadphase
//! results into begin/end overlap events.
//!
//! # Module Organization
//!
//! - [`shapes`] - Shape handles, flags, and the [`CollisionShape`] trait
//! - [`narrowphase`] - Exact volume-pair overlap tests
//! - [`events`] - Overlap bookkeeping and the event sink surface
//! - [`collision_layers`] - Layer/mask collision filtering
//! - [`collision_manager`] - The per-frame orchestrator

pub mod shapes;
pub mod narrowphase;
pub mod events;
pub mod collision_layers;
pub mod collision_manager;

pub use shapes::{BoxShape, CapsuleShape, CollisionShape, ShapeFlags, ShapeKey, SphereShape, Volume};
pub use narrowphase::Contact;
pub use events::{EventCollector, OverlapEvent, OverlapInfo, OverlapSink};
pub use collision_layers::CollisionLayers;
pub use collision_manager::CollisionManager;
