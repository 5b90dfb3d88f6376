//! Static SAH-partitioned bounding volume hierarchy
//!
//! Built once over a snapshot of scene primitives and queried many times for
//! nearest-hit ray picking and OBB range queries. The tree is never mutated
//! incrementally: a scene change rebuilds it wholesale via [`StaticBvh::build`].
//!
//! Split planes are chosen with the Surface Area Heuristic: the primitive
//! index range is sorted by centroid along the widest centroid axis, prefix
//! and suffix bounds are swept across the sorted range, and the exact SAH
//! cost is evaluated at every split point.

use log::debug;

use crate::config::CollisionConfig;
use crate::entity::Entity;
use crate::foundation::math::Vec3;
use crate::geometry::{
    intersect_obb_aabb, intersect_opt_ray_aabb, Aabb, Obb, OptimizedRay,
};

/// Default maximum primitives per leaf
pub const DEFAULT_MAX_LEAF_SIZE: usize = 8;

/// Default maximum tree depth
pub const DEFAULT_MAX_DEPTH: usize = 24;

/// Centroid ranges narrower than this force a positional median split
const CENTROID_EPSILON: f32 = 1e-4;

/// A scene primitive handed to [`StaticBvh::build`]
///
/// Bounds are world-space; hidden or culled primitives must be filtered out
/// by the caller before building.
#[derive(Debug, Clone, Copy)]
pub struct BvhPrimitive {
    /// Owning entity in the caller's scene model
    pub entity: Entity,
    /// World-space bounding box
    pub bounds: Aabb,
}

/// Primitive snapshot with its precomputed centroid
#[derive(Debug, Clone, Copy)]
struct PrimitiveRecord {
    entity: Entity,
    bounds: Aabb,
    center: Vec3,
}

/// Single node of the hierarchy
///
/// A node is a leaf iff `first_primitive >= 0 && primitive_count > 0`;
/// otherwise it is internal and both children are valid node indices. Leaves
/// own the contiguous index range
/// `[first_primitive, first_primitive + primitive_count)`.
#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    /// Bounding box enclosing every primitive under this node
    pub bounds: Aabb,
    /// Start of the leaf's index range, -1 for internal nodes
    pub first_primitive: i32,
    /// Length of the leaf's index range, 0 for internal nodes
    pub primitive_count: i32,
    /// Left child node index, -1 when absent
    pub left_child: i32,
    /// Right child node index, -1 when absent
    pub right_child: i32,
}

impl BvhNode {
    /// Check whether this node stores primitives directly
    pub fn is_leaf(&self) -> bool {
        self.first_primitive >= 0 && self.primitive_count > 0
    }
}

/// Result of a nearest-hit ray query
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// The entity owning the closest primitive hit
    pub entity: Entity,
    /// Distance from the ray origin to the hit, in direction-length units
    pub distance: f32,
}

/// Split decision for one index range
enum SplitPlan {
    /// Centroids are (near) coincident on the widest axis; split positionally
    /// at the range midpoint
    Median,
    /// SAH-selected split on `axis` at absolute index `index`, partitioning
    /// by centroid against `position`
    Sah {
        axis: usize,
        index: usize,
        position: f32,
    },
}

/// Static bounding volume hierarchy over scene primitives
///
/// `build()` discards any previous tree; nodes are immutable afterwards and
/// owned by this structure until `clear()` or the next `build()`.
pub struct StaticBvh {
    nodes: Vec<BvhNode>,
    primitives: Vec<PrimitiveRecord>,
    /// Permutation of primitive indices, physically reordered during build so
    /// every leaf owns a contiguous range
    indices: Vec<u32>,
    max_leaf_size: usize,
    max_depth: usize,
    reached_depth: usize,
}

impl Default for StaticBvh {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticBvh {
    /// Create an empty hierarchy with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_LEAF_SIZE, DEFAULT_MAX_DEPTH)
    }

    /// Create an empty hierarchy with explicit leaf-size and depth limits
    ///
    /// Both limits are clamped to at least 1.
    pub fn with_limits(max_leaf_size: usize, max_depth: usize) -> Self {
        Self {
            nodes: Vec::new(),
            primitives: Vec::new(),
            indices: Vec::new(),
            max_leaf_size: max_leaf_size.max(1),
            max_depth: max_depth.max(1),
            reached_depth: 0,
        }
    }

    /// Create an empty hierarchy using the limits from a [`CollisionConfig`]
    pub fn from_config(config: &CollisionConfig) -> Self {
        Self::with_limits(config.bvh_max_leaf_size, config.bvh_max_depth)
    }

    /// Build the hierarchy over a snapshot of primitives
    ///
    /// Any previous tree is discarded. An empty snapshot produces an empty
    /// tree (`is_built()` stays false) and subsequent queries are no-ops.
    pub fn build(&mut self, primitives: &[BvhPrimitive]) {
        self.clear();

        if primitives.is_empty() {
            return;
        }

        self.primitives = primitives
            .iter()
            .map(|primitive| PrimitiveRecord {
                entity: primitive.entity,
                bounds: primitive.bounds,
                center: primitive.bounds.center(),
            })
            .collect();
        self.indices = (0..self.primitives.len() as u32).collect();

        // Worst case is 2N-1 nodes for N primitives
        self.nodes.reserve(self.primitives.len() * 2);
        self.build_recursive(0, self.primitives.len(), 0);

        debug!(
            "static BVH built: {} primitives, {} nodes, depth {}",
            self.primitives.len(),
            self.nodes.len(),
            self.reached_depth
        );
    }

    /// Discard the tree and all primitive snapshots
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.primitives.clear();
        self.indices.clear();
        self.reached_depth = 0;
    }

    /// Whether a non-empty tree is present
    pub fn is_built(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Read-only node view for debug visualization
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest level produced by the last build (root = 0)
    pub fn max_reached_depth(&self) -> usize {
        self.reached_depth
    }

    /// Nearest-hit ray query
    ///
    /// Returns the primitive whose bounding box the ray enters first, or
    /// `None` when the tree is empty or nothing is hit. The direction need
    /// not be normalized; distances are in units of its length.
    pub fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        if self.nodes.is_empty() {
            return None;
        }

        let ray = OptimizedRay::new(origin, direction);
        let mut closest = f32::MAX;
        let mut hit = None;
        self.intersect_node(0, &ray, &mut closest, &mut hit);

        hit.map(|entity| RayHit {
            entity,
            distance: closest,
        })
    }

    /// Collect every primitive whose box overlaps the given OBB
    ///
    /// Subtrees are pruned with the SAT test against node bounds before leaf
    /// primitives are tested exactly.
    pub fn query_obb(&self, obb: &Obb) -> Vec<Entity> {
        let mut hits = Vec::new();
        if !self.nodes.is_empty() {
            self.query_obb_recursive(obb, 0, &mut hits);
        }
        hits
    }

    fn build_recursive(&mut self, first: usize, count: usize, depth: usize) -> i32 {
        self.reached_depth = self.reached_depth.max(depth);

        let node_index = self.nodes.len();
        let bounds = self.calculate_bounds(first, count);
        self.nodes.push(BvhNode {
            bounds,
            first_primitive: -1,
            primitive_count: 0,
            left_child: -1,
            right_child: -1,
        });

        if count <= self.max_leaf_size || depth >= self.max_depth {
            return self.make_leaf(node_index, first, count);
        }

        let split = match self.find_best_split(first, count) {
            SplitPlan::Median => first + count / 2,
            SplitPlan::Sah { axis, index, position } => {
                // A split collapsing onto the range boundary cannot make
                // progress; stop here instead of recursing forever.
                if index == first || index == first + count {
                    return self.make_leaf(node_index, first, count);
                }

                let boundary = self.partition(first, count, axis, position);
                let left_count = boundary - first;
                if left_count == 0 || left_count == count {
                    return self.make_leaf(node_index, first, count);
                }
                boundary
            }
        };

        let left_count = split - first;
        let right_count = count - left_count;

        let left_child = self.build_recursive(first, left_count, depth + 1);
        let right_child = self.build_recursive(split, right_count, depth + 1);

        let node = &mut self.nodes[node_index];
        node.left_child = left_child;
        node.right_child = right_child;
        node_index as i32
    }

    fn make_leaf(&mut self, node_index: usize, first: usize, count: usize) -> i32 {
        let node = &mut self.nodes[node_index];
        node.first_primitive = first as i32;
        node.primitive_count = count as i32;
        node_index as i32
    }

    /// Union of the primitive bounds over an index range
    fn calculate_bounds(&self, first: usize, count: usize) -> Aabb {
        let mut bounds = self.bounds_at(first);
        for slot in first + 1..first + count {
            bounds += self.bounds_at(slot);
        }
        bounds
    }

    /// Smallest box enclosing the primitive centroids of an index range
    fn calculate_centroid_bounds(&self, first: usize, count: usize) -> Aabb {
        let first_center = self.record_at(first).center;
        let mut bounds = Aabb::new(first_center, first_center);
        for slot in first + 1..first + count {
            let center = self.record_at(slot).center;
            bounds += Aabb::new(center, center);
        }
        bounds
    }

    fn record_at(&self, slot: usize) -> &PrimitiveRecord {
        &self.primitives[self.indices[slot] as usize]
    }

    fn bounds_at(&self, slot: usize) -> Aabb {
        self.record_at(slot).bounds
    }

    /// Choose the SAH-optimal split for an index range
    ///
    /// Sorts the range by centroid along the widest centroid axis, then
    /// sweeps prefix/suffix bounds and evaluates the SAH cost at every split
    /// point, keeping the minimum.
    fn find_best_split(&mut self, first: usize, count: usize) -> SplitPlan {
        let centroid_bounds = self.calculate_centroid_bounds(first, count);
        let parent_bounds = self.calculate_bounds(first, count);

        let extent = centroid_bounds.max - centroid_bounds.min;
        let mut axis = 0;
        if extent.y > extent.x {
            axis = 1;
        }
        if extent.z > extent[axis] {
            axis = 2;
        }

        if extent[axis] < CENTROID_EPSILON {
            return SplitPlan::Median;
        }

        {
            let records = &self.primitives;
            let range = &mut self.indices[first..first + count];
            range.sort_by(|&a, &b| {
                records[a as usize].center[axis]
                    .partial_cmp(&records[b as usize].center[axis])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        // Prefix/suffix cumulative bounds across the sorted range
        let mut prefix = vec![Aabb::default(); count];
        let mut suffix = vec![Aabb::default(); count];

        prefix[0] = self.bounds_at(first);
        for offset in 1..count {
            prefix[offset] = prefix[offset - 1] + self.bounds_at(first + offset);
        }
        suffix[count - 1] = self.bounds_at(first + count - 1);
        for offset in (0..count - 1).rev() {
            suffix[offset] = suffix[offset + 1] + self.bounds_at(first + offset);
        }

        let parent_area = parent_bounds.surface_area() + 1e-6;
        let mut best_cost = f32::MAX;
        let mut best_index = first + count / 2;
        let mut position = self.record_at(best_index).center[axis];

        for offset in 0..count - 1 {
            let left_count = offset + 1;
            let right_count = count - left_count;

            let cost = 1.0
                + (prefix[offset].surface_area() / parent_area) * left_count as f32
                + (suffix[offset + 1].surface_area() / parent_area) * right_count as f32;

            if cost < best_cost {
                best_cost = cost;
                best_index = first + left_count;
                position = self.record_at(best_index).center[axis];
            }
        }

        SplitPlan::Sah {
            axis,
            index: best_index,
            position,
        }
    }

    /// Two-pointer in-place partition of the index range by
    /// `centroid[axis] < position`, swapping permutation entries
    ///
    /// Returns the first index of the right-hand side.
    fn partition(&mut self, first: usize, count: usize, axis: usize, position: f32) -> usize {
        let mut left = first;
        let mut right = first + count;

        while left < right {
            if self.record_at(left).center[axis] < position {
                left += 1;
            } else {
                right -= 1;
                self.indices.swap(left, right);
            }
        }

        left
    }

    fn intersect_node(
        &self,
        node_index: usize,
        ray: &OptimizedRay,
        closest: &mut f32,
        hit: &mut Option<Entity>,
    ) {
        let node = &self.nodes[node_index];

        let Some(entry) = intersect_opt_ray_aabb(ray, &node.bounds) else {
            return;
        };
        if entry >= *closest {
            return;
        }

        if node.is_leaf() {
            let first = node.first_primitive as usize;
            for offset in 0..node.primitive_count as usize {
                let record = self.record_at(first + offset);
                if let Some(distance) = intersect_opt_ray_aabb(ray, &record.bounds) {
                    if distance < *closest {
                        *closest = distance;
                        *hit = Some(record.entity);
                    }
                }
            }
            return;
        }

        let child_entry = |child: i32| {
            if child < 0 {
                return None;
            }
            intersect_opt_ray_aabb(ray, &self.nodes[child as usize].bounds)
                .map(|distance| (child as usize, distance))
        };

        match (child_entry(node.left_child), child_entry(node.right_child)) {
            (Some(left), Some(right)) => {
                // Visit the nearer child first; the farther child is only
                // worth visiting while it can still beat the current best.
                let (near, far) = if left.1 < right.1 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.intersect_node(near.0, ray, closest, hit);
                if far.1 < *closest {
                    self.intersect_node(far.0, ray, closest, hit);
                }
            }
            (Some(left), None) => self.intersect_node(left.0, ray, closest, hit),
            (None, Some(right)) => self.intersect_node(right.0, ray, closest, hit),
            (None, None) => {}
        }
    }

    fn query_obb_recursive(&self, obb: &Obb, node_index: usize, hits: &mut Vec<Entity>) {
        let node = &self.nodes[node_index];

        if !intersect_obb_aabb(obb, &node.bounds) {
            return;
        }

        if node.is_leaf() {
            let first = node.first_primitive as usize;
            for offset in 0..node.primitive_count as usize {
                let record = self.record_at(first + offset);
                if intersect_obb_aabb(obb, &record.bounds) {
                    hits.push(record.entity);
                }
            }
        } else {
            if node.left_child >= 0 {
                self.query_obb_recursive(obb, node.left_child as usize, hits);
            }
            if node.right_child >= 0 {
                self.query_obb_recursive(obb, node.right_child as usize, hits);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Transform};
    use nalgebra::UnitQuaternion;
    use std::collections::HashSet;

    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 33) as f32) / ((1u64 << 31) as f32)
        }

        fn range(&mut self, min: f32, max: f32) -> f32 {
            min + (max - min) * self.next_f32()
        }

        fn index(&mut self, bound: usize) -> usize {
            (self.next_f32() * bound as f32) as usize % bound
        }
    }

    fn unit_cube(id: u32, center: Vec3) -> BvhPrimitive {
        BvhPrimitive {
            entity: Entity::new(id),
            bounds: Aabb::from_center_extents(center, Vec3::new(0.5, 0.5, 0.5)),
        }
    }

    fn random_primitives(rng: &mut Lcg, count: usize) -> Vec<BvhPrimitive> {
        (0..count)
            .map(|id| {
                let center = Vec3::new(
                    rng.range(-50.0, 50.0),
                    rng.range(-50.0, 50.0),
                    rng.range(-50.0, 50.0),
                );
                let extents = Vec3::new(
                    rng.range(0.1, 3.0),
                    rng.range(0.1, 3.0),
                    rng.range(0.1, 3.0),
                );
                BvhPrimitive {
                    entity: Entity::new(id as u32),
                    bounds: Aabb::from_center_extents(center, extents),
                }
            })
            .collect()
    }

    /// Every leaf range must tile the index permutation exactly once
    fn assert_leaf_coverage(bvh: &StaticBvh, primitive_count: usize) {
        let mut covered = vec![0u32; primitive_count];
        for node in bvh.nodes() {
            if node.is_leaf() {
                let first = node.first_primitive as usize;
                for slot in first..first + node.primitive_count as usize {
                    covered[slot] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&hits| hits == 1), "leaf ranges must tile the range");

        let entities: HashSet<u32> = (0..bvh.indices.len())
            .map(|slot| bvh.record_at(slot).entity.id())
            .collect();
        assert_eq!(entities.len(), primitive_count, "permutation lost primitives");
    }

    #[test]
    fn test_empty_build() {
        let mut bvh = StaticBvh::new();
        bvh.build(&[]);

        assert!(!bvh.is_built());
        assert!(bvh.intersect(Vec3::zeros(), Vec3::x()).is_none());

        let obb = Obb::from_aabb_transform(
            &Aabb::from_center_extents(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)),
            &Transform::identity(),
        );
        assert!(bvh.query_obb(&obb).is_empty());
    }

    #[test]
    fn test_node_count_bound_and_coverage() {
        let mut rng = Lcg(42);
        for &count in &[1usize, 2, 3, 7, 8, 9, 33, 100, 257] {
            let primitives = random_primitives(&mut rng, count);
            let mut bvh = StaticBvh::new();
            bvh.build(&primitives);

            assert!(bvh.is_built());
            assert!(bvh.node_count() >= 1);
            assert!(
                bvh.node_count() <= 2 * count - 1,
                "node count {} exceeds bound for {} primitives",
                bvh.node_count(),
                count
            );
            assert_leaf_coverage(&bvh, count);
        }
    }

    #[test]
    fn test_coincident_centroids_terminate() {
        // All centroids identical: the widest centroid axis is degenerate and
        // the build must fall back to median splits without recursing forever.
        let primitives: Vec<BvhPrimitive> = (0..40)
            .map(|id| unit_cube(id, Vec3::new(1.0, 2.0, 3.0)))
            .collect();

        let mut bvh = StaticBvh::with_limits(2, 24);
        bvh.build(&primitives);

        assert!(bvh.is_built());
        assert_leaf_coverage(&bvh, primitives.len());
    }

    #[test]
    fn test_three_cube_pick_scenario() {
        let primitives = vec![
            unit_cube(0, Vec3::zeros()),
            unit_cube(1, Vec3::new(10.0, 0.0, 0.0)),
            unit_cube(2, Vec3::new(20.0, 0.0, 0.0)),
        ];

        let mut bvh = StaticBvh::new();
        bvh.build(&primitives);

        let hit = bvh
            .intersect(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))
            .expect("ray down the row must hit");

        assert_eq!(hit.entity, Entity::new(0));
        assert!((hit.distance - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_nearest_hit_matches_brute_force() {
        let mut rng = Lcg(0xBEEF);

        for _ in 0..100 {
            // Disjoint unit cubes at distinct depths along the ray's path
            let count = 3 + rng.index(10);
            let mut primitives: Vec<BvhPrimitive> = (0..count)
                .map(|id| {
                    let depth = 2.0 + id as f32 * 3.0 + rng.range(0.0, 1.0);
                    let lateral = rng.range(-0.3, 0.3);
                    unit_cube(id as u32, Vec3::new(depth, lateral, 0.0))
                })
                .collect();

            // Shuffle so build order is unrelated to depth order
            for slot in (1..primitives.len()).rev() {
                let other = rng.index(slot + 1);
                primitives.swap(slot, other);
            }

            let mut bvh = StaticBvh::new();
            bvh.build(&primitives);

            let origin = Vec3::new(-5.0, 0.0, 0.0);
            let direction = Vec3::new(1.0, 0.0, 0.0);

            let brute = primitives
                .iter()
                .filter_map(|primitive| {
                    let ray = crate::geometry::Ray::new(origin, direction);
                    crate::geometry::intersect_ray_aabb(&ray, &primitive.bounds)
                        .map(|distance| (primitive.entity, distance))
                })
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            let hit = bvh.intersect(origin, direction);

            match (brute, hit) {
                (Some((entity, distance)), Some(result)) => {
                    assert_eq!(result.entity, entity);
                    assert!((result.distance - distance).abs() < 1e-4);
                }
                (None, None) => {}
                other => panic!("brute force and BVH disagree: {other:?}"),
            }
        }
    }

    #[test]
    fn test_query_obb_collects_overlapping_primitives() {
        let primitives = vec![
            unit_cube(0, Vec3::zeros()),
            unit_cube(1, Vec3::new(3.0, 3.0, 0.0)),
            unit_cube(2, Vec3::new(3.0, 0.0, 0.0)),
            unit_cube(3, Vec3::new(40.0, 40.0, 40.0)),
        ];

        let mut bvh = StaticBvh::new();
        bvh.build(&primitives);

        // A long thin box lying along the XY diagonal covers the two cubes
        // sitting on that diagonal but not the off-diagonal or far ones.
        let rotation: Quat =
            UnitQuaternion::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);
        let obb = Obb::from_aabb_transform(
            &Aabb::from_center_extents(Vec3::zeros(), Vec3::new(4.0, 0.2, 0.2)),
            &Transform {
                position: Vec3::new(1.5, 1.5, 0.0),
                rotation,
                scale: Vec3::new(1.0, 1.0, 1.0),
            },
        );

        let mut hits: Vec<u32> = bvh.query_obb(&obb).iter().map(Entity::id).collect();
        hits.sort_unstable();

        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_clear_discards_tree() {
        let mut bvh = StaticBvh::new();
        bvh.build(&[unit_cube(0, Vec3::zeros())]);
        assert!(bvh.is_built());

        bvh.clear();
        assert!(!bvh.is_built());
        assert_eq!(bvh.node_count(), 0);
        assert!(bvh.intersect(Vec3::new(-5.0, 0.0, 0.0), Vec3::x()).is_none());
    }

    #[test]
    fn test_limits_from_config() {
        let config = crate::config::CollisionConfig {
            dirty_budget: 16,
            bvh_max_leaf_size: 1,
            bvh_max_depth: 2,
        };

        let mut rng = Lcg(11);
        let primitives = random_primitives(&mut rng, 32);

        let mut bvh = StaticBvh::from_config(&config);
        bvh.build(&primitives);

        assert!(bvh.max_reached_depth() <= 2);
        assert_leaf_coverage(&bvh, primitives.len());
    }

    #[test]
    fn test_depth_limit_forces_leaves() {
        let mut rng = Lcg(7);
        let primitives = random_primitives(&mut rng, 64);

        let mut bvh = StaticBvh::with_limits(1, 3);
        bvh.build(&primitives);

        assert!(bvh.max_reached_depth() <= 3);
        assert_leaf_coverage(&bvh, primitives.len());
    }
}
