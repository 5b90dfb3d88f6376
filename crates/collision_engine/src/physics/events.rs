//! Overlap bookkeeping and the event sink surface
//!
//! The collision manager records which pairs of shapes currently overlap and
//! notifies an [`OverlapSink`] whenever a pair starts or stops overlapping.
//! Consumers that prefer polling over callbacks can plug in the Vec-backed
//! [`EventCollector`] and drain it after each update.

use crate::entity::Entity;
use super::narrowphase::Contact;
use super::shapes::ShapeKey;

/// One entry in a shape's current-overlap list
///
/// Two shapes are overlapping iff each one's list contains an entry
/// referencing the other. That symmetry is maintained by the collision
/// manager; shapes never edit their own lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapInfo {
    /// Actor owning the other shape
    pub actor: Entity,
    /// The other shape
    pub shape: ShapeKey,
}

/// Payload delivered for a begin- or end-overlap notification
///
/// Each transition is reported twice, once from each side; the mirrored
/// event carries the negated contact normal. End events carry an empty
/// contact since no geometry is meaningful for a pair that just separated.
#[derive(Debug, Clone, Copy)]
pub struct OverlapEvent {
    /// Shape receiving the notification
    pub shape: ShapeKey,
    /// Actor owning the receiving shape
    pub actor: Entity,
    /// The counterpart shape
    pub other_shape: ShapeKey,
    /// Actor owning the counterpart shape
    pub other_actor: Entity,
    /// Contact seen from the receiving shape
    pub contact: Contact,
}

/// Receiver for overlap notifications fired during
/// [`CollisionManager::update`](super::collision_manager::CollisionManager::update)
pub trait OverlapSink {
    /// A pair of shapes started overlapping
    fn begin_overlap(&mut self, event: &OverlapEvent);

    /// A pair of shapes stopped overlapping
    fn end_overlap(&mut self, event: &OverlapEvent);
}

/// Sink that ignores every notification
impl OverlapSink for () {
    fn begin_overlap(&mut self, _event: &OverlapEvent) {}
    fn end_overlap(&mut self, _event: &OverlapEvent) {}
}

/// Vec-backed sink for polling consumers and tests
#[derive(Debug, Default)]
pub struct EventCollector {
    /// Begin events in firing order
    pub begun: Vec<OverlapEvent>,
    /// End events in firing order
    pub ended: Vec<OverlapEvent>,
}

impl EventCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all recorded events
    pub fn clear(&mut self) {
        self.begun.clear();
        self.ended.clear();
    }
}

impl OverlapSink for EventCollector {
    fn begin_overlap(&mut self, event: &OverlapEvent) {
        self.begun.push(*event);
    }

    fn end_overlap(&mut self, event: &OverlapEvent) {
        self.ended.push(*event);
    }
}
