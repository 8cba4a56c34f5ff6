//! Preorder flattening with stackless hit/miss links.
//!
//! Each node becomes a header plus its box. `hit` is where traversal goes
//! after the node's box is hit, `miss` where it goes after a miss; both are
//! absolute record indices or [`TERMINATE`]. A consumer needs only those two
//! links and a box test to walk the tree without a stack.

use super::node::{Bvh, Primitive};
use super::record::{RecordBuffer, RecordHeader, RECORDS_PER_NODE, TERMINATE};
use crate::util::{BuildSettings, Error, Result};

impl Bvh {
    /// Flatten into a fresh buffer; a miss at the root terminates.
    pub fn serialize(&self) -> Result<RecordBuffer> {
        let mut buffer = RecordBuffer::with_capacity(self.node_count());
        self.serialize_into(&mut buffer, TERMINATE)?;
        Ok(buffer)
    }

    /// Append this tree to `buffer`.
    ///
    /// `miss` is where traversal resumes once the whole tree has been
    /// rejected or exhausted; pass [`TERMINATE`] for a standalone tree or the
    /// start of the next tree when chaining several into one buffer. Indices
    /// are absolute within `buffer`.
    #[tracing::instrument(
        skip_all,
        fields(nodes = self.stats.nodes, offset = buffer.len(), miss = miss)
    )]
    pub fn serialize_into(&self, buffer: &mut RecordBuffer, miss: i32) -> Result<()> {
        let root = self.root.ok_or(Error::EmptyTree)?;
        let sizes = self.subtree_sizes();

        let end = buffer.len() + RECORDS_PER_NODE * sizes[root.index()];
        if end > i32::MAX as usize {
            return Err(Error::TooManyPrimitives {
                count: self.leaf_count(),
            });
        }

        let mut stack = vec![(root, miss)];
        while let Some((id, miss)) = stack.pop() {
            let node = self.node(id);

            let after = buffer.len() + RECORDS_PER_NODE;
            let left_index = node.left.map_or(TERMINATE, |_| after as i32);
            let left_records = node
                .left
                .map_or(0, |l| RECORDS_PER_NODE * sizes[l.index()]);
            let right_index = node
                .right
                .map_or(TERMINATE, |_| (after + left_records) as i32);

            // Leaves fall through to wherever a miss would go.
            let hit = if node.is_leaf() { miss } else { left_index };
            let miss_for_left = if node.right.is_some() { right_index } else { miss };

            buffer.push_node(
                RecordHeader {
                    primitive_id: node.header_id(),
                    hit,
                    miss,
                },
                &node.bbox,
            );

            // Right is pushed first so the left subtree is emitted first.
            if let Some(r) = node.right {
                stack.push((r, miss));
            }
            if let Some(l) = node.left {
                stack.push((l, miss_for_left));
            }
        }

        tracing::debug!(records = buffer.len(), "BVH serialized");
        Ok(())
    }
}

/// Build and flatten in one step, dropping the tree afterwards.
///
/// Returns `None` for zero primitives: there is nothing to upload, and an
/// empty buffer must not stand in for a valid tree.
pub fn flatten(primitives: &[Primitive], settings: &BuildSettings) -> Result<Option<RecordBuffer>> {
    let bvh = Bvh::build_with(primitives, settings)?;
    if bvh.is_empty() {
        return Ok(None);
    }
    bvh.serialize().map(Some)
}
