//! JSON scene description: explicit boxes and/or a triangle mesh.
//!
//! ```json
//! {
//!   "boxes": [ { "id": 0, "min": [0, 0, 0], "max": [1, 1, 1] } ],
//!   "mesh": {
//!     "vertices": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
//!     "triangles": [[0, 1, 2]],
//!     "shades": [3]
//!   }
//! }
//! ```
//!
//! Mesh triangles take ids `0..T`. Explicit box ids are shifted by `T` when a
//! mesh is present so the two never collide.

use serde::{Deserialize, Serialize};
use std::path::Path;

use glam::Vec3;

use crate::bvh::{BoundingBox, Primitive};
use crate::mesh::{Mesh, Triangle};
use crate::util::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxEntry {
    pub id: u32,
    pub min: [f32; 3],
    pub max: [f32; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshEntry {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
    #[serde(default)]
    pub shades: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub boxes: Vec<BoxEntry>,
    pub mesh: Option<MeshEntry>,
}

impl SceneFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Mesh part, if any, as a [`Mesh`].
    pub fn mesh(&self) -> Result<Option<Mesh>> {
        let Some(entry) = &self.mesh else {
            return Ok(None);
        };
        if !entry.shades.is_empty() && entry.shades.len() != entry.triangles.len() {
            return Err(Error::other(format!(
                "{} shades for {} triangles",
                entry.shades.len(),
                entry.triangles.len()
            )));
        }
        let triangles = entry
            .triangles
            .iter()
            .enumerate()
            .map(|(i, t)| Triangle {
                indices: *t,
                shade: entry.shades.get(i).copied().unwrap_or(0),
            })
            .collect();
        Ok(Some(Mesh {
            vertices: entry.vertices.iter().map(|&v| Vec3::from(v)).collect(),
            triangles,
        }))
    }

    /// All primitives: mesh triangles first, then explicit boxes.
    pub fn primitives(&self) -> Result<Vec<Primitive>> {
        let mut prims = match self.mesh()? {
            Some(mesh) => mesh.primitives()?,
            None => Vec::new(),
        };
        let offset = u32::try_from(prims.len())
            .map_err(|_| Error::TooManyPrimitives { count: prims.len() })?;
        for entry in &self.boxes {
            let bbox = BoundingBox::try_new(Vec3::from(entry.min), Vec3::from(entry.max))?;
            let id = entry
                .id
                .checked_add(offset)
                .ok_or(Error::PrimitiveIdOutOfRange(entry.id))?;
            prims.push(Primitive::new(bbox, id));
        }
        Ok(prims)
    }
}
