//! SAH-guided partition builder.
//!
//! Turns an unordered list of primitive leaves into a full binary tree.
//! Each split picks the axis of the single most elongated input box,
//! evaluates equally spaced candidate planes across that box with a
//! centroid-vs-plane surface area heuristic, and falls back to an
//! even/odd index split when no plane separates the set.

use std::collections::HashSet;
use std::fmt;

use super::aabb::BoundingBox;
use super::node::{Bvh, Node, NodeId, Primitive, MAX_PRIMITIVE_ID};
use crate::util::{BuildSettings, Error, Result, DEFAULT_BINS};

/// Counters collected during a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Input primitive count (= leaf count).
    pub primitives: usize,
    /// Total node count.
    pub nodes: usize,
    /// Longest root-to-leaf path in nodes.
    pub depth: usize,
    /// Splits decided by a candidate plane.
    pub sah_splits: usize,
    /// Splits that fell back to index parity.
    pub fallback_splits: usize,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "primitives:      {}", self.primitives)?;
        writeln!(f, "nodes:           {}", self.nodes)?;
        writeln!(f, "depth:           {}", self.depth)?;
        writeln!(f, "sah splits:      {}", self.sah_splits)?;
        write!(f, "fallback splits: {}", self.fallback_splits)
    }
}

/// How a node's items are divided between its two children.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Split {
    /// Centroid on `axis` below `position` goes left, everything else right.
    Plane { axis: usize, position: f32 },
    /// Even indices left, odd indices right.
    Parity,
}

/// Pending internal node: the arena slot to fill and the items below it.
struct Task {
    slot: NodeId,
    items: Vec<NodeId>,
}

/// Recursive SAH partitioner, driven by an explicit work-list.
#[derive(Debug, Clone, Copy)]
pub struct PartitionBuilder {
    bins: usize,
}

impl Default for PartitionBuilder {
    fn default() -> Self {
        Self { bins: DEFAULT_BINS }
    }
}

impl PartitionBuilder {
    /// Builder evaluating `bins` candidate planes per split.
    pub fn new(bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(Error::InvalidSettings("bins must be at least 1".into()));
        }
        Ok(Self { bins })
    }

    pub fn from_settings(settings: &BuildSettings) -> Result<Self> {
        settings.validate()?;
        Self::new(settings.bins)
    }

    /// Build a tree whose leaves are the given primitives.
    ///
    /// Leaf `i` of the result is arena slot `NodeId(i)`, i.e. the leaf for
    /// `primitives[i]`. Zero primitives give an empty tree.
    #[tracing::instrument(skip_all, fields(prim_count = primitives.len(), bins = self.bins))]
    pub fn build(&self, primitives: &[Primitive]) -> Result<Bvh> {
        validate(primitives)?;
        let n = primitives.len();
        if n == 0 {
            tracing::debug!("no primitives, returning empty tree");
            return Ok(Bvh::empty());
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(2 * n - 1);
        nodes.extend(primitives.iter().map(Node::leaf));

        let mut stats = BuildStats {
            primitives: n,
            ..BuildStats::default()
        };
        let mut stack: Vec<Task> = Vec::new();

        let leaves: Vec<NodeId> = (0..n as u32).map(NodeId).collect();
        let root = place(&mut nodes, &mut stack, leaves);

        while let Some(task) = stack.pop() {
            let split = self.choose_split(&nodes, &task.items, nodes[task.slot.index()].bbox);
            let (left_items, right_items) = partition(&nodes, &task.items, split);

            match split {
                Split::Plane { axis, position } => {
                    stats.sah_splits += 1;
                    tracing::trace!(
                        axis,
                        position,
                        left = left_items.len(),
                        right = right_items.len(),
                        "plane split"
                    );
                }
                Split::Parity => {
                    stats.fallback_splits += 1;
                    tracing::debug!(items = task.items.len(), "no separating plane, parity split");
                }
            }

            let left = place(&mut nodes, &mut stack, left_items);
            let right = place(&mut nodes, &mut stack, right_items);
            let node = &mut nodes[task.slot.index()];
            node.left = Some(left);
            node.right = Some(right);
        }

        let mut bvh = Bvh {
            nodes,
            root: Some(root),
            stats,
        };
        bvh.stats.nodes = bvh.nodes.len();
        bvh.stats.depth = bvh.depth();

        tracing::debug!(
            nodes = bvh.stats.nodes,
            depth = bvh.stats.depth,
            sah_splits = bvh.stats.sah_splits,
            fallback_splits = bvh.stats.fallback_splits,
            "BVH built"
        );
        Ok(bvh)
    }

    /// Pick the split rule for a node holding more than two items.
    ///
    /// `total` is the union of the items' boxes.
    fn choose_split(&self, nodes: &[Node], items: &[NodeId], total: BoundingBox) -> Split {
        // Axis and range come from the single box with the largest extent,
        // not from the aggregate bounds.
        let mut axis = 0;
        let mut max_extent = 0.0f32;
        let mut range = None;
        for id in items {
            let b = &nodes[id.index()].bbox;
            for i in 0..3 {
                let extent = (b.max[i] - b.min[i]).abs();
                if extent > max_extent {
                    max_extent = extent;
                    range = Some((b.min[i], b.max[i]));
                    axis = i;
                }
            }
        }

        // Every box is a point: no plane can separate anything.
        let Some((lo, hi)) = range else {
            return Split::Parity;
        };

        let total_area = total.surface_area();
        let step = (hi - lo) / self.bins as f32;
        let mut best: Option<(f32, f32)> = None;
        for i in 0..self.bins {
            let position = step * i as f32 + lo;
            let cost = split_cost(nodes, items, axis, position, total_area);
            // NaN and infinity never beat a finite cost.
            if best.map_or(cost < f32::INFINITY, |(c, _)| cost < c) {
                best = Some((cost, position));
            }
        }

        match best {
            Some((_, position)) => Split::Plane { axis, position },
            None => Split::Parity,
        }
    }
}

impl Bvh {
    /// Build with the default settings (10 candidate planes).
    pub fn build(primitives: &[Primitive]) -> Result<Self> {
        PartitionBuilder::default().build(primitives)
    }

    /// Build with explicit settings.
    pub fn build_with(primitives: &[Primitive], settings: &BuildSettings) -> Result<Self> {
        PartitionBuilder::from_settings(settings)?.build(primitives)
    }
}

/// Reject inputs the serialized layout cannot represent.
fn validate(primitives: &[Primitive]) -> Result<()> {
    let count = primitives.len();
    // 3 records per node, 2P - 1 nodes; every index must fit in i32.
    let records = count
        .checked_mul(2)
        .and_then(|c| c.checked_mul(3))
        .ok_or(Error::TooManyPrimitives { count })?;
    if records > i32::MAX as usize {
        return Err(Error::TooManyPrimitives { count });
    }

    let mut seen = HashSet::with_capacity(count);
    for p in primitives {
        if p.id > MAX_PRIMITIVE_ID {
            return Err(Error::PrimitiveIdOutOfRange(p.id));
        }
        if !seen.insert(p.id) {
            return Err(Error::DuplicatePrimitiveId(p.id));
        }
        BoundingBox::try_new(p.bbox.min, p.bbox.max)?;
    }
    Ok(())
}

/// Turn a non-empty item list into a subtree root.
///
/// One item is already a subtree. Two items get an internal node directly.
/// Larger lists get a slot now and a task for the split search.
fn place(nodes: &mut Vec<Node>, stack: &mut Vec<Task>, items: Vec<NodeId>) -> NodeId {
    debug_assert!(!items.is_empty(), "partition produced an empty side");
    if let &[only] = items.as_slice() {
        return only;
    }

    let bbox = items
        .iter()
        .fold(BoundingBox::EMPTY, |acc, id| acc.union(&nodes[id.index()].bbox));
    let slot = NodeId(nodes.len() as u32);

    if let &[a, b] = items.as_slice() {
        nodes.push(Node::internal(bbox, a, b));
    } else {
        nodes.push(Node {
            bbox,
            primitive_id: None,
            left: None,
            right: None,
        });
        stack.push(Task { slot, items });
    }
    slot
}

#[inline]
fn centroid_on(nodes: &[Node], id: NodeId, axis: usize) -> f32 {
    let b = &nodes[id.index()].bbox;
    (b.min[axis] + b.max[axis]) / 2.0
}

/// SAH cost of splitting at `position` on `axis`; infinite if a side is empty.
fn split_cost(
    nodes: &[Node],
    items: &[NodeId],
    axis: usize,
    position: f32,
    total_area: f32,
) -> f32 {
    let mut left = BoundingBox::EMPTY;
    let mut right = BoundingBox::EMPTY;
    let mut n_left = 0usize;
    let mut n_right = 0usize;

    for &id in items {
        if centroid_on(nodes, id, axis) < position {
            n_left += 1;
            left.grow(&nodes[id.index()].bbox);
        } else {
            n_right += 1;
            right.grow(&nodes[id.index()].bbox);
        }
    }

    if n_left == 0 || n_right == 0 {
        return f32::INFINITY;
    }

    1.0 + (n_left as f32 * left.surface_area() + n_right as f32 * right.surface_area()) / total_area
}

/// Divide items by the chosen rule, keeping input order on each side.
fn partition(nodes: &[Node], items: &[NodeId], split: Split) -> (Vec<NodeId>, Vec<NodeId>) {
    match split {
        Split::Plane { axis, position } => items
            .iter()
            .copied()
            .partition(|&id| centroid_on(nodes, id, axis) < position),
        Split::Parity => {
            let mut left = Vec::with_capacity(items.len().div_ceil(2));
            let mut right = Vec::with_capacity(items.len() / 2);
            for (i, &id) in items.iter().enumerate() {
                if i % 2 == 0 {
                    left.push(id);
                } else {
                    right.push(id);
                }
            }
            (left, right)
        }
    }
}
