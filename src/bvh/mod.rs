//! Bounding volume hierarchy: build, flatten, walk.
//!
//! ## Pipeline
//! ```text
//! primitives (box + id) → PartitionBuilder (SAH) → Bvh arena
//!     → serialize → RecordBuffer → GPU
//! ```

pub mod aabb;
pub mod build;
pub mod node;
pub mod record;
pub mod serialize;
pub mod walk;

pub use aabb::BoundingBox;
pub use build::{BuildStats, PartitionBuilder};
pub use node::{Bvh, Node, NodeId, Primitive, MAX_PRIMITIVE_ID};
pub use record::{
    GpuRecord, Record, RecordBuffer, RecordHeader, RecordLayout, RECORDS_PER_NODE, TERMINATE,
};
pub use serialize::flatten;
pub use walk::StacklessWalk;
