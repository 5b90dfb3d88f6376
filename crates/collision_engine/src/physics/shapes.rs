//! Collision shapes behind a capability trait
//!
//! Shapes store local geometry plus their world transform and expose the
//! derived world-space data the engine needs: a bounding box for the
//! broadphase and a geometric [`Volume`] snapshot for the narrowphase.
//! The [`CollisionManager`](super::collision_manager::CollisionManager)
//! invokes [`CollisionShape::overlaps`] polymorphically and has no knowledge
//! of concrete shape kinds.

use crate::foundation::math::{Transform, Vec3};
use crate::geometry::{Aabb, Obb};
use super::narrowphase::{self, Contact};

slotmap::new_key_type! {
    /// Stable handle assigned to a shape at registration time
    ///
    /// Used as the side-table key and broadphase identity instead of a raw
    /// pointer, so a shape freed without unregistering cannot dangle.
    pub struct ShapeKey;
}

bitflags::bitflags! {
    /// Per-shape behavior flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShapeFlags: u32 {
        /// Shape participates in collision queries
        const COLLISION_ENABLED = 1 << 0;
        /// Shape generates begin/end overlap events
        const GENERATE_OVERLAP_EVENTS = 1 << 1;
        /// Shape is drawn by debug overlays
        const DEBUG_DRAW = 1 << 2;
    }
}

impl Default for ShapeFlags {
    fn default() -> Self {
        Self::COLLISION_ENABLED | Self::GENERATE_OVERLAP_EVENTS
    }
}

/// World-space geometric snapshot of a shape, recomputed per query
#[derive(Debug, Clone, Copy)]
pub enum Volume {
    /// Sphere with world-space center and scaled radius
    Sphere {
        /// Center position
        center: Vec3,
        /// World-space radius
        radius: f32,
    },
    /// Oriented box
    Obb(Obb),
    /// Capsule as a segment with a radius
    Capsule {
        /// One end of the core segment
        start: Vec3,
        /// Other end of the core segment
        end: Vec3,
        /// World-space radius
        radius: f32,
    },
}

/// Capability trait implemented by each concrete shape kind
///
/// Exact overlap testing dispatches through [`Self::volume`], so the calling
/// code never matches on concrete types.
pub trait CollisionShape {
    /// Move the shape to a new world transform
    fn set_transform(&mut self, transform: &Transform);

    /// Current world transform
    fn transform(&self) -> &Transform;

    /// World-space bounding box for broadphase insertion
    fn world_aabb(&self) -> Aabb;

    /// World-space geometric snapshot for exact tests
    fn volume(&self) -> Volume;

    /// Exact overlap test against another shape
    ///
    /// Returns a contact (normal oriented from `self` toward `other`) when
    /// the shapes overlap.
    fn overlaps(&self, other: &dyn CollisionShape) -> Option<Contact> {
        narrowphase::intersect_volumes(&self.volume(), &other.volume())
    }
}

/// Sphere collision shape
///
/// The radius scales by the largest absolute transform scale component,
/// keeping the volume spherical under non-uniform scale.
#[derive(Debug, Clone)]
pub struct SphereShape {
    /// Unscaled local radius
    pub radius: f32,
    transform: Transform,
}

impl SphereShape {
    /// Create a sphere with the given local radius at the identity transform
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            transform: Transform::identity(),
        }
    }

    /// Radius after applying the transform scale
    pub fn scaled_radius(&self) -> f32 {
        let scale = self.transform.scale.abs();
        self.radius * scale.x.max(scale.y).max(scale.z)
    }
}

impl CollisionShape for SphereShape {
    fn set_transform(&mut self, transform: &Transform) {
        self.transform = transform.clone();
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn world_aabb(&self) -> Aabb {
        let radius = self.scaled_radius();
        Aabb::from_center_extents(self.transform.position, Vec3::new(radius, radius, radius))
    }

    fn volume(&self) -> Volume {
        Volume::Sphere {
            center: self.transform.position,
            radius: self.scaled_radius(),
        }
    }
}

/// Box collision shape with local half-extents
#[derive(Debug, Clone)]
pub struct BoxShape {
    /// Local half-size along each local axis
    pub half_extents: Vec3,
    transform: Transform,
}

impl BoxShape {
    /// Create a box with the given local half-extents at the identity transform
    pub fn new(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            transform: Transform::identity(),
        }
    }

    fn world_obb(&self) -> Obb {
        Obb::from_aabb_transform(
            &Aabb::from_center_extents(Vec3::zeros(), self.half_extents),
            &self.transform,
        )
    }
}

impl CollisionShape for BoxShape {
    fn set_transform(&mut self, transform: &Transform) {
        self.transform = transform.clone();
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn world_aabb(&self) -> Aabb {
        self.world_obb().enclosing_aabb()
    }

    fn volume(&self) -> Volume {
        Volume::Obb(self.world_obb())
    }
}

/// Capsule collision shape aligned to the local Z axis
#[derive(Debug, Clone)]
pub struct CapsuleShape {
    /// Distance from the center to each hemisphere center
    pub half_height: f32,
    /// Unscaled local radius
    pub radius: f32,
    transform: Transform,
}

impl CapsuleShape {
    /// Create a capsule with the given core half-height and radius
    pub fn new(half_height: f32, radius: f32) -> Self {
        Self {
            half_height,
            radius,
            transform: Transform::identity(),
        }
    }

    /// Radius after applying the lateral transform scale
    pub fn scaled_radius(&self) -> f32 {
        let scale = self.transform.scale.abs();
        self.radius * scale.x.max(scale.y)
    }

    /// World-space endpoints of the core segment
    pub fn segment(&self) -> (Vec3, Vec3) {
        let axis = self.transform.rotation * Vec3::z();
        let reach = axis * (self.half_height * self.transform.scale.z.abs());
        (
            self.transform.position - reach,
            self.transform.position + reach,
        )
    }
}

impl CollisionShape for CapsuleShape {
    fn set_transform(&mut self, transform: &Transform) {
        self.transform = transform.clone();
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn world_aabb(&self) -> Aabb {
        let (start, end) = self.segment();
        let radius = self.scaled_radius();
        let core = Aabb::from_points(&[start, end]);
        Aabb::new(
            core.min - Vec3::new(radius, radius, radius),
            core.max + Vec3::new(radius, radius, radius),
        )
    }

    fn volume(&self) -> Volume {
        let (start, end) = self.segment();
        Volume::Capsule {
            start,
            end,
            radius: self.scaled_radius(),
        }
    }
}
