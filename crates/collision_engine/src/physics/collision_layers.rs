//! Collision layer system for filtering overlap detection
//!
//! Shapes carry a layer (what they are) and a mask (what they test against);
//! a pair only reaches the narrowphase when each side's layer is present in
//! the other's mask.

/// Collision layer definitions using bit masks for efficient filtering
pub struct CollisionLayers;

impl CollisionLayers {
    /// No collision layer
    pub const NONE: u32 = 0;

    /// All collision layers
    pub const ALL: u32 = 0xFFFF_FFFF;

    /// Default layer for unclassified shapes
    pub const DEFAULT: u32 = 1 << 0;

    /// Non-moving level geometry
    pub const WORLD_STATIC: u32 = 1 << 1;

    /// Moving level geometry (platforms, doors)
    pub const WORLD_DYNAMIC: u32 = 1 << 2;

    /// Player- or AI-controlled characters
    pub const PAWN: u32 = 1 << 3;

    /// Trigger volumes (overlap events only, no physical response)
    pub const TRIGGER: u32 = 1 << 4;

    /// Check if two shapes should test against each other
    ///
    /// Each side's layer must be present in the other side's mask.
    pub fn should_collide(layer_a: u32, mask_a: u32, layer_b: u32, mask_b: u32) -> bool {
        (layer_a & mask_b) != 0 && (layer_b & mask_a) != 0
    }

    /// Helper to build a mask from multiple layers
    pub fn mask(layers: &[u32]) -> u32 {
        layers.iter().fold(0, |acc, &layer| acc | layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_collide_mutual() {
        assert!(CollisionLayers::should_collide(
            CollisionLayers::PAWN,
            CollisionLayers::TRIGGER,
            CollisionLayers::TRIGGER,
            CollisionLayers::PAWN,
        ));
    }

    #[test]
    fn test_should_not_collide_one_way() {
        // The pawn wants triggers, but this trigger only wants world geometry
        assert!(!CollisionLayers::should_collide(
            CollisionLayers::PAWN,
            CollisionLayers::TRIGGER,
            CollisionLayers::TRIGGER,
            CollisionLayers::WORLD_STATIC,
        ));
    }

    #[test]
    fn test_mask_creation() {
        let mask = CollisionLayers::mask(&[
            CollisionLayers::PAWN,
            CollisionLayers::WORLD_DYNAMIC,
        ]);
        assert_eq!(mask, CollisionLayers::PAWN | CollisionLayers::WORLD_DYNAMIC);
    }
}
