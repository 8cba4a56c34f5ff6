//! # flatbvh
//!
//! Bounding volume hierarchy builder for GPU ray traversal.
//!
//! Primitive boxes are partitioned with a surface-area-heuristic split into a
//! full binary tree, which is then flattened into a pointer-free record
//! buffer. Every node carries precomputed `hit`/`miss` jump indices, so a
//! massively parallel consumer can walk it without a per-thread stack.
//!
//! ## Modules
//!
//! - [`util`] - Errors and build settings
//! - [`bvh`] - Bounding boxes, builder, serializer, record layout, walk
//! - [`mesh`] - Triangle mesh producing primitives and vertex/index buffers
//! - [`scene`] - JSON scene description
//!
//! ## Example
//!
//! ```
//! use flatbvh::prelude::*;
//! use glam::Vec3;
//!
//! let prims = vec![
//!     Primitive::new(BoundingBox::new(Vec3::ZERO, Vec3::ONE), 0),
//!     Primitive::new(BoundingBox::new(Vec3::splat(2.0), Vec3::splat(3.0)), 1),
//! ];
//! let bvh = Bvh::build(&prims)?;
//! let records = bvh.serialize()?;
//! assert_eq!(records.len(), 9);
//! let bytes = records.to_bytes(RecordLayout::Padded);
//! assert_eq!(bytes.len(), 9 * 16);
//! # Ok::<(), flatbvh::Error>(())
//! ```

pub mod util;
pub mod bvh;
pub mod mesh;
pub mod scene;

pub use util::{BuildSettings, Error, Result};
pub use bvh::{flatten, BoundingBox, Bvh, Primitive, RecordBuffer, RecordLayout};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{BuildSettings, Error, Result};
    pub use crate::bvh::{
        flatten, BoundingBox, BuildStats, Bvh, GpuRecord, Node, NodeId, PartitionBuilder,
        Primitive, Record, RecordBuffer, RecordHeader, RecordLayout, TERMINATE,
    };
    pub use crate::mesh::{Mesh, Triangle};
    pub use crate::scene::SceneFile;
}
