//! Indexed triangle mesh: the usual producer of BVH primitives.
//!
//! Besides the primitive list, a mesh serializes its own vertex and index
//! buffers in the 16-byte-aligned form the traversal kernel reads next to
//! the BVH records.

use glam::Vec3;

use crate::bvh::{BoundingBox, Primitive};
use crate::util::{Error, Result};

/// Triangle referencing three mesh vertices, with a shading tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub indices: [u32; 3],
    pub shade: u32,
}

impl Triangle {
    pub fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self {
            indices: [v0, v1, v2],
            shade: 0,
        }
    }

    pub fn with_shade(mut self, shade: u32) -> Self {
        self.shade = shade;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another mesh, rebasing its triangle indices.
    ///
    /// Fails without modifying `self` if a rebased index would overflow u32.
    pub fn add(&mut self, other: &Mesh) -> Result<()> {
        let count = self.vertices.len().saturating_add(other.vertices.len());
        let base =
            u32::try_from(self.vertices.len()).map_err(|_| Error::TooManyVertices { count })?;
        let triangles = other
            .triangles
            .iter()
            .map(|t| -> Result<Triangle> {
                let mut indices = [0u32; 3];
                for (dst, &i) in indices.iter_mut().zip(&t.indices) {
                    *dst = i
                        .checked_add(base)
                        .ok_or(Error::TooManyVertices { count })?;
                }
                Ok(Triangle {
                    indices,
                    shade: t.shade,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.vertices.extend_from_slice(&other.vertices);
        self.triangles.extend(triangles);
        Ok(())
    }

    /// Bounds of one triangle.
    pub fn triangle_bounds(&self, triangle: usize) -> Result<BoundingBox> {
        let t = self
            .triangles
            .get(triangle)
            .ok_or(Error::TriangleOutOfRange {
                triangle,
                count: self.triangles.len(),
            })?;
        let count = self.vertices.len();
        let mut corners = [Vec3::ZERO; 3];
        for (corner, &vertex) in corners.iter_mut().zip(&t.indices) {
            *corner = *self
                .vertices
                .get(vertex as usize)
                .ok_or(Error::VertexOutOfRange {
                    triangle,
                    vertex,
                    count,
                })?;
        }
        let [a, b, c] = corners;
        Ok(BoundingBox::new(a.min(b).min(c), a.max(b).max(c)))
    }

    /// One primitive per triangle; the id is the triangle index.
    #[tracing::instrument(skip_all, fields(tri_count = self.triangles.len()))]
    pub fn primitives(&self) -> Result<Vec<Primitive>> {
        (0..self.triangles.len())
            .map(|i| self.triangle_bounds(i).map(|bbox| Primitive::new(bbox, i as u32)))
            .collect()
    }

    /// Vertex positions as `vec4` (w = 0).
    pub fn vertex_records(&self) -> Vec<[f32; 4]> {
        self.vertices.iter().map(|v| v.extend(0.0).to_array()).collect()
    }

    /// Triangles as `uvec4`: three vertex indices and the shade tag.
    pub fn index_records(&self) -> Vec<[u32; 4]> {
        self.triangles
            .iter()
            .map(|t| [t.indices[0], t.indices[1], t.indices[2], t.shade])
            .collect()
    }

    /// Vertex buffer bytes for upload.
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.vertex_records()).to_vec()
    }

    /// Index buffer bytes for upload.
    pub fn index_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.index_records()).to_vec()
    }
}
