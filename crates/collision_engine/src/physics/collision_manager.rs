//! Per-frame collision orchestration
//!
//! The [`CollisionManager`] owns the registry of active shapes, the
//! broadphase BVH, and a FIFO dirty queue. Each update it drains a bounded
//! number of dirty shapes, refreshes their broadphase bounds, runs exact
//! overlap tests against broadphase candidates, and diffs the results
//! against each shape's cached overlap list, firing begin/end notifications
//! for every transition.
//!
//! Everything here is single-threaded and synchronous: all mutation and all
//! queries happen inside the owning world's tick, and every operation is a
//! bounded computation with no suspension point.

use std::collections::{HashSet, VecDeque};

use log::debug;
use slotmap::SlotMap;

use crate::config::CollisionConfig;
use crate::entity::Entity;
use crate::foundation::math::Transform;
use crate::geometry::Aabb;
use crate::spatial::BroadphaseBvh;
use super::collision_layers::CollisionLayers;
use super::events::{OverlapEvent, OverlapInfo, OverlapSink};
use super::narrowphase::Contact;
use super::shapes::{CollisionShape, ShapeFlags, ShapeKey};

/// Registry entry for one tracked shape
struct TrackedShape {
    shape: Box<dyn CollisionShape>,
    actor: Entity,
    flags: ShapeFlags,
    layer: u32,
    mask: u32,
    /// World bounds captured the last time this shape was processed
    bounds: Aabb,
    /// Shapes currently overlapping this one, mirrored on the other side
    overlaps: Vec<OverlapInfo>,
}

/// Stateful orchestrator turning broadphase results into overlap events
///
/// Shapes move through `register -> (mark_dirty / update)* -> unregister`.
/// Dirty shapes are processed in FIFO order, at most once per update call
/// and at most `dirty_budget` per call.
pub struct CollisionManager {
    shapes: SlotMap<ShapeKey, TrackedShape>,
    broadphase: BroadphaseBvh,
    dirty_queue: VecDeque<ShapeKey>,
    dirty_set: HashSet<ShapeKey>,
    config: CollisionConfig,
}

impl Default for CollisionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionManager {
    /// Create a manager with default configuration
    pub fn new() -> Self {
        Self::with_config(CollisionConfig::default())
    }

    /// Create a manager with explicit configuration
    pub fn with_config(config: CollisionConfig) -> Self {
        Self {
            shapes: SlotMap::with_key(),
            broadphase: BroadphaseBvh::new(),
            dirty_queue: VecDeque::new(),
            dirty_set: HashSet::new(),
            config: config.sanitized(),
        }
    }

    /// Register a shape for an actor and return its stable handle
    ///
    /// The shape joins the active set, enters the broadphase, and is queued
    /// for processing on the next update. Default flags enable collision and
    /// overlap events on the default layer against all layers.
    pub fn register(&mut self, actor: Entity, shape: Box<dyn CollisionShape>) -> ShapeKey {
        let bounds = shape.world_aabb();
        let key = self.shapes.insert(TrackedShape {
            shape,
            actor,
            flags: ShapeFlags::default(),
            layer: CollisionLayers::DEFAULT,
            mask: CollisionLayers::ALL,
            bounds,
            overlaps: Vec::new(),
        });

        self.broadphase.insert(key, bounds);
        self.mark_dirty(key);
        key
    }

    /// Remove a shape from the active set; unknown keys are ignored
    ///
    /// The shape leaves the broadphase, its counterpart overlap entries are
    /// excised, and any stale dirty-queue entry becomes a no-op. No end
    /// events fire for the silently removed pairs.
    pub fn unregister(&mut self, key: ShapeKey) {
        let Some(removed) = self.shapes.remove(key) else {
            return;
        };

        self.broadphase.remove(key);
        self.dirty_set.remove(&key);

        for info in removed.overlaps {
            if let Some(other) = self.shapes.get_mut(info.shape) {
                other.overlaps.retain(|entry| entry.shape != key);
            }
        }
    }

    /// Queue a shape for reprocessing on the next update
    ///
    /// Idempotent: a shape already pending is not enqueued again. Unknown
    /// keys are ignored.
    pub fn mark_dirty(&mut self, key: ShapeKey) {
        if self.shapes.contains_key(key) && self.dirty_set.insert(key) {
            self.dirty_queue.push_back(key);
        }
    }

    /// Move a shape and queue it for reprocessing
    pub fn set_transform(&mut self, key: ShapeKey, transform: &Transform) {
        if let Some(tracked) = self.shapes.get_mut(key) {
            tracked.shape.set_transform(transform);
        }
        self.mark_dirty(key);
    }

    /// Replace a shape's behavior flags and queue it for reprocessing
    pub fn set_flags(&mut self, key: ShapeKey, flags: ShapeFlags) {
        if let Some(tracked) = self.shapes.get_mut(key) {
            tracked.flags = flags;
        }
        self.mark_dirty(key);
    }

    /// Replace a shape's collision layer and mask and queue it for reprocessing
    pub fn set_layers(&mut self, key: ShapeKey, layer: u32, mask: u32) {
        if let Some(tracked) = self.shapes.get_mut(key) {
            tracked.layer = layer;
            tracked.mask = mask;
        }
        self.mark_dirty(key);
    }

    /// Process dirty shapes using the configured per-frame budget
    pub fn update(&mut self, delta_time: f32, sink: &mut dyn OverlapSink) {
        self.update_with_budget(delta_time, self.config.dirty_budget, sink);
    }

    /// Process up to `budget` dirty shapes in FIFO order
    ///
    /// Disabled shapes (collision off or overlap generation off) have their
    /// overlap lists force-cleared with end events and skip requerying.
    /// Enabled shapes refresh their broadphase bounds first; the broadphase
    /// then rebuilds once before this frame's candidate queries run.
    pub fn update_with_budget(&mut self, _delta_time: f32, budget: usize, sink: &mut dyn OverlapSink) {
        let mut processed = Vec::new();
        while processed.len() < budget {
            let Some(key) = self.dirty_queue.pop_front() else {
                break;
            };
            // Entries whose dirty-set membership was cleared (unregistered
            // or already handled) are stale and cost nothing
            if !self.dirty_set.remove(&key) {
                continue;
            }
            if !self.shapes.contains_key(key) {
                continue;
            }
            processed.push(key);
        }

        if processed.is_empty() {
            return;
        }

        // Re-insert current bounds for every enabled shape being processed,
        // batching the tree rebuild below
        for &key in &processed {
            let Some(tracked) = self.shapes.get_mut(key) else {
                continue;
            };
            if !tracked.flags.contains(ShapeFlags::COLLISION_ENABLED)
                || !tracked.flags.contains(ShapeFlags::GENERATE_OVERLAP_EVENTS)
            {
                continue;
            }
            let bounds = tracked.shape.world_aabb();
            tracked.bounds = bounds;
            self.broadphase.update(key, bounds);
        }

        // One rebuild serves every query this frame
        self.broadphase.flush_rebuild();

        for &key in &processed {
            let Some(tracked) = self.shapes.get(key) else {
                continue;
            };
            if !tracked.flags.contains(ShapeFlags::COLLISION_ENABLED)
                || !tracked.flags.contains(ShapeFlags::GENERATE_OVERLAP_EVENTS)
            {
                self.force_clear_overlaps(key, sink);
                continue;
            }
            self.process_shape(key, sink);
        }

        debug!("collision update processed {} dirty shapes", processed.len());
    }

    /// Broadphase-only candidate query
    ///
    /// Falls back to a linear scan of the active set when no broadphase tree
    /// exists.
    pub fn query_aabb(&mut self, bounds: &Aabb) -> Vec<ShapeKey> {
        if self.broadphase.is_empty() {
            return self
                .shapes
                .iter()
                .filter(|(_, tracked)| tracked.shape.world_aabb().intersects(bounds))
                .map(|(key, _)| key)
                .collect();
        }
        self.broadphase.query(bounds)
    }

    /// Actor owning a shape
    pub fn actor_of(&self, key: ShapeKey) -> Option<Entity> {
        self.shapes.get(key).map(|tracked| tracked.actor)
    }

    /// Current overlap list of a shape
    pub fn overlaps_of(&self, key: ShapeKey) -> Option<&[OverlapInfo]> {
        self.shapes.get(key).map(|tracked| tracked.overlaps.as_slice())
    }

    /// Shape access for callers that need the geometry back
    pub fn shape(&self, key: ShapeKey) -> Option<&dyn CollisionShape> {
        self.shapes.get(key).map(|tracked| tracked.shape.as_ref())
    }

    /// Behavior flags of a shape
    pub fn flags_of(&self, key: ShapeKey) -> Option<ShapeFlags> {
        self.shapes.get(key).map(|tracked| tracked.flags)
    }

    /// Number of registered shapes
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Number of shapes currently awaiting processing
    pub fn dirty_count(&self) -> usize {
        self.dirty_set.len()
    }

    /// Whether a key refers to a registered shape
    pub fn contains(&self, key: ShapeKey) -> bool {
        self.shapes.contains_key(key)
    }

    /// Requery one enabled shape and diff the result against its cached
    /// overlap list
    fn process_shape(&mut self, key: ShapeKey, sink: &mut dyn OverlapSink) {
        let (bounds, layer, mask, actor) = {
            let Some(tracked) = self.shapes.get(key) else {
                return;
            };
            (tracked.bounds, tracked.layer, tracked.mask, tracked.actor)
        };

        let candidates = self.broadphase.query(&bounds);

        // Exact tests against candidates that are themselves eligible
        let mut found: Vec<(ShapeKey, Contact)> = Vec::new();
        for candidate in candidates {
            if candidate == key {
                continue;
            }
            let Some(other) = self.shapes.get(candidate) else {
                continue;
            };
            if !other.flags.contains(ShapeFlags::COLLISION_ENABLED)
                || !other.flags.contains(ShapeFlags::GENERATE_OVERLAP_EVENTS)
            {
                continue;
            }
            if !CollisionLayers::should_collide(layer, mask, other.layer, other.mask) {
                continue;
            }

            let Some(tracked) = self.shapes.get(key) else {
                return;
            };
            if let Some(contact) = tracked.shape.overlaps(other.shape.as_ref()) {
                found.push((candidate, contact));
            }
        }

        let previous: Vec<OverlapInfo> = match self.shapes.get(key) {
            Some(tracked) => tracked.overlaps.clone(),
            None => return,
        };

        // Begin: in the new set but not the old one
        for (candidate, contact) in &found {
            if previous.iter().any(|info| info.shape == *candidate) {
                continue;
            }
            let Some(other_actor) = self.actor_of(*candidate) else {
                continue;
            };

            if let Some(tracked) = self.shapes.get_mut(key) {
                if !tracked.overlaps.iter().any(|info| info.shape == *candidate) {
                    tracked.overlaps.push(OverlapInfo {
                        actor: other_actor,
                        shape: *candidate,
                    });
                }
            }
            if let Some(other) = self.shapes.get_mut(*candidate) {
                if !other.overlaps.iter().any(|info| info.shape == key) {
                    other.overlaps.push(OverlapInfo { actor, shape: key });
                }
            }

            sink.begin_overlap(&OverlapEvent {
                shape: key,
                actor,
                other_shape: *candidate,
                other_actor,
                contact: *contact,
            });
            sink.begin_overlap(&OverlapEvent {
                shape: *candidate,
                actor: other_actor,
                other_shape: key,
                other_actor: actor,
                contact: contact.reversed(),
            });
        }

        // End: in the old set but not the new one
        for info in &previous {
            if found.iter().any(|(candidate, _)| *candidate == info.shape) {
                continue;
            }

            if let Some(tracked) = self.shapes.get_mut(key) {
                tracked.overlaps.retain(|entry| entry.shape != info.shape);
            }
            let other_actor = match self.shapes.get_mut(info.shape) {
                Some(other) => {
                    other.overlaps.retain(|entry| entry.shape != key);
                    other.actor
                }
                None => info.actor,
            };

            sink.end_overlap(&OverlapEvent {
                shape: key,
                actor,
                other_shape: info.shape,
                other_actor,
                contact: Contact::empty(),
            });
            sink.end_overlap(&OverlapEvent {
                shape: info.shape,
                actor: other_actor,
                other_shape: key,
                other_actor: actor,
                contact: Contact::empty(),
            });
        }
    }

    /// Drop every overlap of a disabled shape, firing end events with empty
    /// contacts on both sides
    fn force_clear_overlaps(&mut self, key: ShapeKey, sink: &mut dyn OverlapSink) {
        let (actor, previous) = {
            let Some(tracked) = self.shapes.get_mut(key) else {
                return;
            };
            (tracked.actor, std::mem::take(&mut tracked.overlaps))
        };

        for info in previous {
            let other_actor = match self.shapes.get_mut(info.shape) {
                Some(other) => {
                    other.overlaps.retain(|entry| entry.shape != key);
                    other.actor
                }
                None => info.actor,
            };

            sink.end_overlap(&OverlapEvent {
                shape: key,
                actor,
                other_shape: info.shape,
                other_actor,
                contact: Contact::empty(),
            });
            sink.end_overlap(&OverlapEvent {
                shape: info.shape,
                actor: other_actor,
                other_shape: key,
                other_actor: actor,
                contact: Contact::empty(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::physics::events::EventCollector;
    use crate::physics::shapes::SphereShape;
    use approx::assert_relative_eq;

    fn sphere_at(position: Vec3, radius: f32) -> Box<dyn CollisionShape> {
        let mut sphere = SphereShape::new(radius);
        sphere.set_transform(&Transform::from_position(position));
        Box::new(sphere)
    }

    fn assert_symmetry(manager: &CollisionManager, keys: &[ShapeKey]) {
        for &key in keys {
            let Some(overlaps) = manager.overlaps_of(key) else {
                continue;
            };
            for info in overlaps {
                let other = manager
                    .overlaps_of(info.shape)
                    .expect("overlap entry must reference a live shape");
                assert!(
                    other.iter().any(|entry| entry.shape == key),
                    "overlap lists must be symmetric"
                );
            }
        }
    }

    #[test]
    fn test_two_sphere_approach_scenario() {
        let mut manager = CollisionManager::new();
        let mut events = EventCollector::new();

        // Two spheres 100 units apart: no overlap
        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let b = manager.register(Entity::new(2), sphere_at(Vec3::new(100.0, 0.0, 0.0), 1.0));

        manager.update(0.016, &mut events);
        assert!(events.begun.is_empty());
        assert!(manager.overlaps_of(a).unwrap().is_empty());

        // One moves into the other
        manager.set_transform(b, &Transform::from_position(Vec3::new(1.5, 0.0, 0.0)));
        manager.update(0.016, &mut events);

        // Exactly one begin pair, one entry on each side
        assert_eq!(events.begun.len(), 2);
        assert!(events.ended.is_empty());
        assert_eq!(manager.overlaps_of(a).unwrap().len(), 1);
        assert_eq!(manager.overlaps_of(b).unwrap().len(), 1);
        assert_eq!(manager.overlaps_of(a).unwrap()[0].shape, b);
        assert_eq!(manager.overlaps_of(a).unwrap()[0].actor, Entity::new(2));
        assert_symmetry(&manager, &[a, b]);

        // Further updates with nothing dirty change nothing
        manager.update(0.016, &mut events);
        assert_eq!(events.begun.len(), 2);
    }

    #[test]
    fn test_begin_event_normals_are_mirrored() {
        let mut manager = CollisionManager::new();
        let mut events = EventCollector::new();

        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let _b = manager.register(Entity::new(2), sphere_at(Vec3::new(1.5, 0.0, 0.0), 1.0));
        manager.update(0.016, &mut events);

        assert_eq!(events.begun.len(), 2);
        let first = &events.begun[0];
        let second = &events.begun[1];
        assert_eq!(first.other_shape, second.shape);
        assert_relative_eq!(first.contact.normal, -second.contact.normal);

        // Normal points away from the shape receiving the event
        let toward_other = if first.shape == a { Vec3::x() } else { -Vec3::x() };
        assert_relative_eq!(first.contact.normal, toward_other, epsilon = 1e-5);
    }

    #[test]
    fn test_end_overlap_pairing() {
        let mut manager = CollisionManager::new();
        let mut events = EventCollector::new();

        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let b = manager.register(Entity::new(2), sphere_at(Vec3::new(1.0, 0.0, 0.0), 1.0));
        manager.update(0.016, &mut events);
        assert_eq!(events.begun.len(), 2);

        events.clear();
        manager.set_transform(b, &Transform::from_position(Vec3::new(50.0, 0.0, 0.0)));
        manager.update(0.016, &mut events);

        // Exactly one end per side, no begins, and empty contacts
        assert!(events.begun.is_empty());
        assert_eq!(events.ended.len(), 2);
        for event in &events.ended {
            assert_relative_eq!(event.contact.normal, Vec3::zeros());
        }
        assert!(manager.overlaps_of(a).unwrap().is_empty());
        assert!(manager.overlaps_of(b).unwrap().is_empty());
    }

    #[test]
    fn test_mark_dirty_is_idempotent() {
        let mut manager = CollisionManager::new();
        let key = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));

        // Registration already queued it once
        assert_eq!(manager.dirty_count(), 1);
        manager.mark_dirty(key);
        manager.mark_dirty(key);
        assert_eq!(manager.dirty_count(), 1);

        manager.update(0.016, &mut ());
        assert_eq!(manager.dirty_count(), 0);
    }

    #[test]
    fn test_budget_processes_fifo_order() {
        let mut manager = CollisionManager::new();
        let mut events = EventCollector::new();

        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let b = manager.register(Entity::new(2), sphere_at(Vec3::new(0.5, 0.0, 0.0), 1.0));

        // Budget 1: only the first registered shape is processed, but its
        // diff already records the pair on both sides
        manager.update_with_budget(0.016, 1, &mut events);
        assert_eq!(manager.dirty_count(), 1);
        assert_eq!(events.begun.len(), 2);
        assert_symmetry(&manager, &[a, b]);

        // Second frame drains the remaining shape without duplicating events
        manager.update_with_budget(0.016, 1, &mut events);
        assert_eq!(manager.dirty_count(), 0);
        assert_eq!(events.begun.len(), 2);
    }

    #[test]
    fn test_disabled_shape_force_clears_overlaps() {
        let mut manager = CollisionManager::new();
        let mut events = EventCollector::new();

        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let b = manager.register(Entity::new(2), sphere_at(Vec3::new(1.0, 0.0, 0.0), 1.0));
        manager.update(0.016, &mut events);
        assert_eq!(events.begun.len(), 2);

        events.clear();
        manager.set_flags(a, ShapeFlags::GENERATE_OVERLAP_EVENTS);
        manager.update(0.016, &mut events);

        assert_eq!(events.ended.len(), 2);
        assert!(manager.overlaps_of(a).unwrap().is_empty());
        assert!(manager.overlaps_of(b).unwrap().is_empty());

        // Re-enabling brings the pair back
        events.clear();
        manager.set_flags(a, ShapeFlags::default());
        manager.update(0.016, &mut events);
        assert_eq!(events.begun.len(), 2);
        assert_symmetry(&manager, &[a, b]);
    }

    #[test]
    fn test_unregister_cleans_counterpart_lists() {
        let mut manager = CollisionManager::new();
        let mut events = EventCollector::new();

        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let b = manager.register(Entity::new(2), sphere_at(Vec3::new(1.0, 0.0, 0.0), 1.0));
        manager.update(0.016, &mut events);
        assert_eq!(manager.overlaps_of(b).unwrap().len(), 1);

        // Queue a, then unregister it: the stale queue entry must be a no-op
        manager.mark_dirty(a);
        manager.unregister(a);
        assert!(manager.overlaps_of(b).unwrap().is_empty());
        assert!(!manager.contains(a));

        events.clear();
        manager.update(0.016, &mut events);
        assert!(events.begun.is_empty());
        assert!(events.ended.is_empty());

        // Unregistering twice is a no-op
        manager.unregister(a);
        assert_eq!(manager.shape_count(), 1);
    }

    #[test]
    fn test_layer_filtering_blocks_overlap() {
        let mut manager = CollisionManager::new();
        let mut events = EventCollector::new();

        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let b = manager.register(Entity::new(2), sphere_at(Vec3::new(1.0, 0.0, 0.0), 1.0));

        manager.set_layers(a, CollisionLayers::PAWN, CollisionLayers::WORLD_STATIC);
        manager.set_layers(b, CollisionLayers::TRIGGER, CollisionLayers::ALL);

        manager.update(0.016, &mut events);
        assert!(events.begun.is_empty());
        assert!(manager.overlaps_of(a).unwrap().is_empty());
        assert!(manager.overlaps_of(b).unwrap().is_empty());
    }

    #[test]
    fn test_query_aabb_passthrough_and_fallback() {
        let mut manager = CollisionManager::new();

        // Empty manager: fallback path returns nothing
        let probe = Aabb::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        assert!(manager.query_aabb(&probe).is_empty());

        let a = manager.register(Entity::new(1), sphere_at(Vec3::zeros(), 1.0));
        let _far = manager.register(Entity::new(2), sphere_at(Vec3::new(50.0, 0.0, 0.0), 1.0));

        let near = manager.query_aabb(&probe);
        assert_eq!(near, vec![a]);
    }

    #[test]
    fn test_overlap_symmetry_over_mutation_sequence() {
        let mut manager = CollisionManager::new();
        let mut keys = Vec::new();

        // A row of spheres, each overlapping its neighbors
        for index in 0..6u32 {
            keys.push(manager.register(
                Entity::new(index),
                sphere_at(Vec3::new(index as f32 * 1.5, 0.0, 0.0), 1.0),
            ));
        }
        manager.update(0.016, &mut ());
        assert_symmetry(&manager, &keys);

        // Shuffle some shapes around and re-check after every frame
        manager.set_transform(keys[2], &Transform::from_position(Vec3::new(20.0, 0.0, 0.0)));
        manager.update(0.016, &mut ());
        assert_symmetry(&manager, &keys);

        manager.set_transform(keys[0], &Transform::from_position(Vec3::new(19.0, 0.0, 0.0)));
        manager.set_transform(keys[5], &Transform::from_position(Vec3::new(21.0, 0.0, 0.0)));
        manager.update(0.016, &mut ());
        assert_symmetry(&manager, &keys);

        manager.unregister(keys[2]);
        manager.update(0.016, &mut ());
        assert_symmetry(&manager, &keys);

        // The relocated neighbors now overlap each other
        let zero_overlaps = manager.overlaps_of(keys[0]).unwrap();
        assert!(zero_overlaps.iter().any(|info| info.shape == keys[5]));
    }
}
