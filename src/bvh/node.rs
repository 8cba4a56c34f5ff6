//! Index-addressed node arena.
//!
//! Nodes refer to their children by [`NodeId`] into a single `Vec`, so the
//! whole tree is released at once when the [`Bvh`] is dropped.

use std::fmt;

use super::aabb::BoundingBox;
use super::build::BuildStats;
use crate::util::{Error, Result};

/// Largest primitive id that still fits the int32 header slot.
pub const MAX_PRIMITIVE_ID: u32 = i32::MAX as u32;

/// Input primitive: a box and the caller's id for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub bbox: BoundingBox,
    pub id: u32,
}

impl Primitive {
    pub fn new(bbox: BoundingBox, id: u32) -> Self {
        Self { bbox, id }
    }
}

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Slot `index` of an arena, for trees assembled by hand.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Tree node.
///
/// Leaf iff both children are absent. `primitive_id` is only set on leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub bbox: BoundingBox,
    pub primitive_id: Option<u32>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
}

impl Node {
    /// Leaf for a single primitive.
    pub fn leaf(primitive: &Primitive) -> Self {
        Self {
            bbox: primitive.bbox,
            primitive_id: Some(primitive.id),
            left: None,
            right: None,
        }
    }

    /// Internal node over two children.
    pub fn internal(bbox: BoundingBox, left: NodeId, right: NodeId) -> Self {
        Self {
            bbox,
            primitive_id: None,
            left: Some(left),
            right: Some(right),
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Id as written to the header slot: the primitive id, or `-1`.
    #[inline]
    pub fn header_id(&self) -> i32 {
        match self.primitive_id {
            // ids are range-checked before they enter an arena
            Some(id) => id as i32,
            None => -1,
        }
    }
}

/// Built hierarchy: node arena plus root.
///
/// `root == None` is the empty result for zero primitives.
#[derive(Debug, Clone)]
pub struct Bvh {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: Option<NodeId>,
    pub(crate) stats: BuildStats,
}

impl Bvh {
    /// Tree with no nodes.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            stats: BuildStats::default(),
        }
    }

    /// Wrap a hand-assembled arena.
    ///
    /// Checks that every child index is in range, that each node is reachable
    /// from `root` at most once (no sharing, no cycles), and that primitive
    /// ids sit on leaves only and fit the header slot. Unreachable nodes are
    /// allowed but ignored.
    pub fn from_nodes(nodes: Vec<Node>, root: NodeId) -> Result<Self> {
        let n = nodes.len();
        if root.index() >= n {
            return Err(Error::other(format!("root {} out of range ({n} nodes)", root.0)));
        }
        let mut seen = vec![false; n];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if seen[id.index()] {
                return Err(Error::other(format!("node {} is reachable twice", id.0)));
            }
            seen[id.index()] = true;
            let node = &nodes[id.index()];
            if let Some(pid) = node.primitive_id {
                if pid > MAX_PRIMITIVE_ID {
                    return Err(Error::PrimitiveIdOutOfRange(pid));
                }
                if !node.is_leaf() {
                    return Err(Error::other(format!(
                        "internal node {} carries primitive {pid}",
                        id.0
                    )));
                }
            }
            for child in [node.left, node.right].into_iter().flatten() {
                if child.index() >= n {
                    return Err(Error::other(format!(
                        "node {} has child {} out of range ({n} nodes)",
                        id.0, child.0
                    )));
                }
                stack.push(child);
            }
        }
        let mut bvh = Self {
            nodes,
            root: Some(root),
            stats: BuildStats::default(),
        };
        bvh.stats.nodes = bvh.node_count();
        bvh.stats.primitives = bvh.leaf_count();
        bvh.stats.depth = bvh.depth();
        Ok(bvh)
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Arena slots, including any not reachable from the root.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Statistics recorded while building.
    #[inline]
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Nodes reachable from the root, in preorder (node, left, right).
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            bvh: self,
            stack: self.root.into_iter().collect(),
        }
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.preorder().count()
    }

    /// Number of leaves reachable from the root.
    pub fn leaf_count(&self) -> usize {
        self.preorder().filter(|&id| self.node(id).is_leaf()).count()
    }

    /// Longest root-to-leaf path, counted in nodes. `0` for an empty tree.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, d)) = stack.pop() {
            max = max.max(d);
            let node = self.node(id);
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, d + 1));
            }
        }
        max
    }

    /// Node count of the subtree below each arena slot (indexed by slot).
    ///
    /// Slots unreachable from the root stay at `0`.
    pub fn subtree_sizes(&self) -> Vec<usize> {
        let order: Vec<NodeId> = self.preorder().collect();
        let mut sizes = vec![0usize; self.nodes.len()];
        // Reverse preorder visits children before their parent.
        for &id in order.iter().rev() {
            let node = self.node(id);
            let below: usize = [node.left, node.right]
                .into_iter()
                .flatten()
                .map(|c| sizes[c.index()])
                .sum();
            sizes[id.index()] = 1 + below;
        }
        sizes
    }

    /// Primitive ids of all reachable leaves, in preorder.
    pub fn primitive_ids(&self) -> Vec<u32> {
        self.preorder()
            .filter_map(|id| self.node(id).primitive_id)
            .collect()
    }
}

/// Preorder iterator over reachable nodes.
pub struct Preorder<'a> {
    bvh: &'a Bvh,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let node = self.bvh.node(id);
        if let Some(r) = node.right {
            self.stack.push(r);
        }
        if let Some(l) = node.left {
            self.stack.push(l);
        }
        Some(id)
    }
}

/// Indented tree dump, one node per line.
impl fmt::Display for Bvh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 0)).into_iter().collect();
        while let Some((id, indent)) = stack.pop() {
            let node = self.node(id);
            writeln!(
                f,
                "{}BVH [{}]: {}",
                "\t".repeat(indent),
                node.header_id(),
                node.bbox
            )?;
            if let Some(r) = node.right {
                stack.push((r, indent + 1));
            }
            if let Some(l) = node.left {
                stack.push((l, indent + 1));
            }
        }
        Ok(())
    }
}
