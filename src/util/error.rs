//! Error types for BVH construction and serialization.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for flatbvh operations.
///
/// Degenerate splits are never reported here: the builder resolves them by
/// policy. Only caller contract violations and I/O surface as errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Bounding box with `min > max` on some axis or non-finite components
    #[error("Invalid bounds: min {min:?} max {max:?}")]
    InvalidBounds { min: [f32; 3], max: [f32; 3] },

    /// Primitive id does not fit the int32 header slot
    #[error("Primitive id {0} exceeds i32::MAX")]
    PrimitiveIdOutOfRange(u32),

    /// Same primitive id used twice in one batch
    #[error("Duplicate primitive id: {0}")]
    DuplicatePrimitiveId(u32),

    /// Record indices would overflow the int32 hit/miss slots
    #[error("Too many primitives: {count} (record indices must fit in i32)")]
    TooManyPrimitives { count: usize },

    /// Serialization requested for a tree without a root
    #[error("Cannot serialize an empty tree")]
    EmptyTree,

    /// Record buffer does not follow the header/min/max stride
    #[error("Malformed record buffer: {0}")]
    MalformedBuffer(String),

    /// Triangle references a vertex past the end of the vertex list
    #[error("Triangle {triangle} references vertex {vertex} (count: {count})")]
    VertexOutOfRange { triangle: usize, vertex: u32, count: usize },

    /// Triangle index past the end of the triangle list
    #[error("Triangle {triangle} out of range (count: {count})")]
    TriangleOutOfRange { triangle: usize, count: usize },

    /// Vertex indices would no longer fit in u32
    #[error("Too many vertices: {count} (indices must fit in u32)")]
    TooManyVertices { count: usize },

    /// Build settings failed validation
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON scene or settings could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a malformed buffer error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedBuffer(msg.into())
    }
}

/// Result type alias for flatbvh operations.
pub type Result<T> = std::result::Result<T, Error>;
