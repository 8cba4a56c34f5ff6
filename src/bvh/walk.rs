//! Consumer-side walk over a record buffer.
//!
//! Mirrors what the GPU kernel does with the buffer: test the current box,
//! jump to `hit` or `miss`, stop at [`TERMINATE`]. No stack is kept.

use super::aabb::BoundingBox;
use super::record::{RecordBuffer, TERMINATE};

/// Iterator over the primitive ids of leaves whose boxes pass `test`.
pub struct StacklessWalk<'a, F> {
    buffer: &'a RecordBuffer,
    next: i32,
    steps: usize,
    test: F,
}

impl<'a, F> StacklessWalk<'a, F>
where
    F: FnMut(&BoundingBox) -> bool,
{
    /// Walk starting at record index `start`.
    pub fn new(buffer: &'a RecordBuffer, start: i32, test: F) -> Self {
        Self {
            buffer,
            next: start,
            steps: 0,
            test,
        }
    }

    /// Number of box tests performed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Record index the walk will read next, or [`TERMINATE`].
    pub fn position(&self) -> i32 {
        self.next
    }
}

impl<F> Iterator for StacklessWalk<'_, F>
where
    F: FnMut(&BoundingBox) -> bool,
{
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            // A well-formed buffer visits each node at most once.
            if self.next < 0 || self.steps >= self.buffer.node_count() {
                self.next = TERMINATE;
                return None;
            }
            let index = self.next as usize;
            let (Some(header), Some(bbox)) = (self.buffer.header(index), self.buffer.bounds(index))
            else {
                tracing::warn!(index, "walk reached a non-header record, stopping");
                self.next = TERMINATE;
                return None;
            };
            self.steps += 1;

            if (self.test)(&bbox) {
                self.next = header.hit;
                if header.is_leaf() {
                    return Some(header.primitive_id as u32);
                }
            } else {
                self.next = header.miss;
            }
        }
    }
}

impl RecordBuffer {
    /// Walk from the first record, yielding leaves whose boxes pass `test`.
    pub fn walk<F>(&self, test: F) -> StacklessWalk<'_, F>
    where
        F: FnMut(&BoundingBox) -> bool,
    {
        StacklessWalk::new(self, 0, test)
    }
}

#[cfg(test)]
mod tests {
    use crate::bvh::{BoundingBox, Bvh, Primitive, RecordBuffer, RecordHeader, TERMINATE};
    use glam::Vec3;

    fn row(n: u32) -> Vec<Primitive> {
        (0..n)
            .map(|i| {
                let x = i as f32 * 2.0;
                Primitive::new(
                    BoundingBox::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0)),
                    i,
                )
            })
            .collect()
    }

    #[test]
    fn test_accept_all_visits_every_leaf_once() {
        let buf = Bvh::build(&row(17)).unwrap().serialize().unwrap();
        let mut walk = buf.walk(|_| true);
        let mut ids: Vec<u32> = walk.by_ref().collect();
        assert_eq!(walk.steps(), buf.node_count());
        ids.sort_unstable();
        assert_eq!(ids, (0..17).collect::<Vec<_>>());
    }

    #[test]
    fn test_root_miss_stops_immediately() {
        let buf = Bvh::build(&row(8)).unwrap().serialize().unwrap();
        let mut walk = buf.walk(|_| false);
        assert_eq!(walk.next(), None);
        assert_eq!(walk.steps(), 1);
        assert_eq!(buf.header(0).unwrap().miss, -1);
    }

    #[test]
    fn test_point_query_prunes() {
        let buf = Bvh::build(&row(32)).unwrap().serialize().unwrap();
        let p = Vec3::new(10.5, 0.5, 0.5);
        let mut walk = buf.walk(|b| b.contains_point(p));
        let ids: Vec<u32> = walk.by_ref().collect();
        assert_eq!(ids, vec![5]);
        assert!(walk.steps() < buf.node_count());
    }

    #[test]
    fn test_any_negative_link_stops() {
        let unit = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let mut buf = RecordBuffer::new();
        buf.push_node(
            RecordHeader {
                primitive_id: 3,
                hit: -7,
                miss: -7,
            },
            &unit,
        );
        buf.push_node(
            RecordHeader {
                primitive_id: 4,
                hit: TERMINATE,
                miss: TERMINATE,
            },
            &unit,
        );
        let mut walk = buf.walk(|_| true);
        assert_eq!(walk.by_ref().collect::<Vec<_>>(), vec![3]);
        assert_eq!(walk.steps(), 1);
        assert_eq!(walk.position(), TERMINATE);
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let buf = RecordBuffer::new();
        assert_eq!(buf.walk(|_| true).count(), 0);
    }
}
