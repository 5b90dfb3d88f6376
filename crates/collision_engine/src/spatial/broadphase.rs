//! Broadphase bounding volume hierarchy over dynamic collision shapes
//!
//! Supports incremental insert/update/remove with a dirty flag that defers
//! the full rebuild until the next query (or an explicit
//! [`BroadphaseBvh::flush_rebuild`]), trading perfect balance for cheap
//! mutation. The build is a plain median split; there is no SAH step here.

use log::trace;
use slotmap::SecondaryMap;

use crate::geometry::Aabb;
use crate::physics::shapes::ShapeKey;

/// Entry in the dense shape array
#[derive(Debug, Clone, Copy)]
struct Entry {
    shape: ShapeKey,
    bounds: Aabb,
}

/// Single node of the broadphase hierarchy
///
/// A leaf holds its entry index directly (one entry per leaf, not a range)
/// since this tree is rebuilt from scratch rather than partitioned in place.
/// Parent indices are recorded but not required by queries.
#[derive(Debug, Clone, Copy)]
pub struct BroadNode {
    /// Bounding box enclosing everything under this node
    pub bounds: Aabb,
    /// Left child node index, -1 when absent
    pub left: i32,
    /// Right child node index, -1 when absent
    pub right: i32,
    /// Parent node index, -1 for the root
    pub parent: i32,
    /// Dense-array entry index for leaves, -1 for internal nodes
    pub entry: i32,
}

impl BroadNode {
    /// Check whether this node references an entry directly
    pub fn is_leaf(&self) -> bool {
        self.entry >= 0
    }
}

/// Median-split BVH over dynamic shape bounds
///
/// Entries live in a dense array with a side table from shape key to array
/// index, so update and remove are O(1) via swap-with-last. Any mutation
/// marks the tree dirty; the node array is scratch state rebuilt lazily.
pub struct BroadphaseBvh {
    entries: Vec<Entry>,
    entry_lookup: SecondaryMap<ShapeKey, usize>,
    nodes: Vec<BroadNode>,
    dirty: bool,
}

impl Default for BroadphaseBvh {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadphaseBvh {
    /// Create an empty broadphase
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            entry_lookup: SecondaryMap::new(),
            nodes: Vec::new(),
            dirty: false,
        }
    }

    /// Insert a shape with its current bounds
    ///
    /// Shares the upsert path with [`Self::update`].
    pub fn insert(&mut self, shape: ShapeKey, bounds: Aabb) {
        self.update(shape, bounds);
    }

    /// Upsert a shape's bounds and mark the tree dirty
    pub fn update(&mut self, shape: ShapeKey, bounds: Aabb) {
        if let Some(&index) = self.entry_lookup.get(shape) {
            self.entries[index].bounds = bounds;
        } else {
            self.entry_lookup.insert(shape, self.entries.len());
            self.entries.push(Entry { shape, bounds });
        }
        self.dirty = true;
    }

    /// Remove a shape; unknown keys are ignored
    ///
    /// The dense array removes via swap-with-last, so only the moved entry's
    /// side-table slot needs fixing up.
    pub fn remove(&mut self, shape: ShapeKey) {
        let Some(index) = self.entry_lookup.remove(shape) else {
            return;
        };

        self.entries.swap_remove(index);
        if index < self.entries.len() {
            self.entry_lookup.insert(self.entries[index].shape, index);
        }
        self.dirty = true;
    }

    /// Number of tracked shapes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no shapes are tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only node view for debug visualization
    pub fn nodes(&self) -> &[BroadNode] {
        &self.nodes
    }

    /// Force the lazy rebuild without performing a query
    ///
    /// Called once per frame by the owning manager before that frame's
    /// queries so multiple mutations amortize into a single rebuild.
    pub fn flush_rebuild(&mut self) {
        if self.dirty {
            self.rebuild();
            self.dirty = false;
        }
    }

    /// Collect every shape whose bounds intersect the query box
    ///
    /// Rebuilds first when dirty, then walks the tree with an explicit stack.
    pub fn query(&mut self, bounds: &Aabb) -> Vec<ShapeKey> {
        self.flush_rebuild();

        let mut result = Vec::new();
        if self.nodes.is_empty() {
            return result;
        }
        if !self.nodes[0].bounds.intersects(bounds) {
            return result;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];

            if node.is_leaf() {
                let entry = &self.entries[node.entry as usize];
                if entry.bounds.intersects(bounds) {
                    result.push(entry.shape);
                }
                continue;
            }

            if node.left >= 0 && self.nodes[node.left as usize].bounds.intersects(bounds) {
                stack.push(node.left as usize);
            }
            if node.right >= 0 && self.nodes[node.right as usize].bounds.intersects(bounds) {
                stack.push(node.right as usize);
            }
        }

        result
    }

    /// Rebuild the node array from scratch over the current entries
    fn rebuild(&mut self) {
        self.nodes.clear();

        let count = self.entries.len();
        if count == 0 {
            return;
        }

        let mut order: Vec<u32> = (0..count as u32).collect();
        self.nodes.reserve(count * 2);
        self.build_range(&mut order, 0, count, -1);

        trace!("broadphase rebuilt: {} shapes, {} nodes", count, self.nodes.len());
    }

    /// Recursive median split over `order[start..end)`
    fn build_range(&mut self, order: &mut [u32], start: usize, end: usize, parent: i32) -> i32 {
        let node_index = self.nodes.len() as i32;

        if end - start == 1 {
            let entry_index = order[start] as usize;
            self.nodes.push(BroadNode {
                bounds: self.entries[entry_index].bounds,
                left: -1,
                right: -1,
                parent,
                entry: entry_index as i32,
            });
            return node_index;
        }

        let mut bounds = self.entries[order[start] as usize].bounds;
        for &entry in &order[start + 1..end] {
            bounds += self.entries[entry as usize].bounds;
        }

        // Split along the widest side of the union box
        let extent = bounds.extents();
        let mut axis = 0;
        if extent.y > extent.x {
            axis = 1;
        }
        if extent.z > extent[axis] {
            axis = 2;
        }

        {
            let entries = &self.entries;
            order[start..end].sort_by(|&a, &b| {
                entries[a as usize].bounds.center()[axis]
                    .partial_cmp(&entries[b as usize].bounds.center()[axis])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        self.nodes.push(BroadNode {
            bounds,
            left: -1,
            right: -1,
            parent,
            entry: -1,
        });

        let mid = (start + end) / 2;
        let left = self.build_range(order, start, mid, node_index);
        let right = self.build_range(order, mid, end, node_index);

        let node = &mut self.nodes[node_index as usize];
        node.left = left;
        node.right = right;
        node_index
    }
}
