//! Mesh import contract and the OBJ importer.
//!
//! An importer turns a file path into an [`ImportedAsset`]: a node tree whose
//! nodes carry local transforms and reference meshes by index. The compiler
//! walks the tree and flattens it; importers do no flattening themselves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use prism_math::{Mat4, Vec2, Vec3};
use thiserror::Error;

/// Errors produced while importing or validating an asset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Failed to import {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Malformed asset {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

pub type ImportResult<T> = Result<T, ImportError>;

/// Polygon mesh as handed over by an importer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedMesh {
    /// Mesh name (for diagnostics)
    pub name: String,

    /// Vertex positions in node-local space
    pub positions: Vec<Vec3>,

    /// Per-vertex texture coordinates, same length as `positions` when present
    pub uvs: Option<Vec<Vec2>>,

    /// Number of vertices per face
    pub face_vertex_counts: Vec<u32>,

    /// Flattened vertex indices for all faces
    pub face_vertex_indices: Vec<u32>,

    /// Diffuse texture paths referenced by the mesh's material
    pub textures: Vec<PathBuf>,
}

impl ImportedMesh {
    /// Triangle mesh from an index list.
    pub fn triangles(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let face_count = indices.len() / 3;
        Self {
            name: name.into(),
            positions,
            uvs: None,
            face_vertex_counts: vec![3; face_count],
            face_vertex_indices: indices,
            textures: Vec::new(),
        }
    }

    /// Fan-triangulate the faces. Faces with fewer than 3 vertices are
    /// skipped. Callers validate the counts first.
    pub fn triangulate(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        let mut offset = 0usize;

        for &count in &self.face_vertex_counts {
            let count = count as usize;
            if count >= 3 {
                // (0,1,2), (0,2,3), ... (0,n-2,n-1)
                let face = &self.face_vertex_indices[offset..offset + count];
                for i in 1..count - 1 {
                    indices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            offset += count;
        }

        indices
    }
}

/// Node in an imported hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportNode {
    pub name: String,

    /// Transform relative to the parent node
    pub transform: Mat4,

    /// Indices into [`ImportedAsset::meshes`]
    pub meshes: Vec<usize>,

    /// Indices into [`ImportedAsset::nodes`]
    pub children: Vec<usize>,
}

impl ImportNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// An imported node tree. Node 0 is the root.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedAsset {
    /// File the asset came from
    pub source: PathBuf,
    pub nodes: Vec<ImportNode>,
    pub meshes: Vec<ImportedMesh>,
}

impl ImportedAsset {
    /// Single-node asset holding the given meshes.
    pub fn from_meshes(source: impl Into<PathBuf>, meshes: Vec<ImportedMesh>) -> Self {
        let mut root = ImportNode::new("root");
        root.meshes = (0..meshes.len()).collect();
        Self {
            source: source.into(),
            nodes: vec![root],
            meshes,
        }
    }
}

/// Path → node tree.
pub trait AssetImporter {
    fn import(&self, path: &Path) -> ImportResult<ImportedAsset>;
}

/// Wavefront OBJ importer backed by `tobj`.
///
/// Each OBJ object becomes a child node of an identity root. Faces are
/// triangulated on load, texture `v` is flipped so row 0 is the top of the
/// image, and the diffuse texture is resolved relative to the OBJ file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjImporter;

impl AssetImporter for ObjImporter {
    fn import(&self, path: &Path) -> ImportResult<ImportedAsset> {
        let load_error = |message: String| ImportError::Load {
            path: path.to_path_buf(),
            message,
        };

        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )
        .map_err(|e| load_error(e.to_string()))?;

        if models.is_empty() {
            return Err(load_error("no objects found".into()));
        }

        let materials = materials.unwrap_or_else(|e| {
            log::warn!("Could not load materials for {}: {}", path.display(), e);
            Vec::new()
        });
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

        let mut nodes = vec![ImportNode::new("root")];
        let mut meshes = Vec::with_capacity(models.len());

        for model in models {
            let mesh = model.mesh;

            let positions: Vec<Vec3> = mesh
                .positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2]))
                .collect();

            let uvs = (!mesh.texcoords.is_empty()).then(|| {
                mesh.texcoords
                    .chunks_exact(2)
                    .map(|t| Vec2::new(t[0], 1.0 - t[1]))
                    .collect::<Vec<_>>()
            });

            let textures = mesh
                .material_id
                .and_then(|id| materials.get(id))
                .and_then(|m| m.diffuse_texture.as_deref())
                .filter(|t| !t.is_empty())
                .map(|t| vec![base_dir.join(t)])
                .unwrap_or_default();

            let mut imported = ImportedMesh::triangles(model.name.clone(), positions, mesh.indices);
            imported.uvs = uvs;
            imported.textures = textures;

            log::debug!(
                "OBJ object '{}': {} vertices, {} triangles",
                imported.name,
                imported.positions.len(),
                imported.face_vertex_counts.len()
            );

            let mut node = ImportNode::new(model.name);
            node.meshes.push(meshes.len());
            let child = nodes.len();
            nodes[0].children.push(child);
            nodes.push(node);
            meshes.push(imported);
        }

        Ok(ImportedAsset {
            source: path.to_path_buf(),
            nodes,
            meshes,
        })
    }
}

/// Importer serving assets registered in memory, keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryImporter {
    assets: HashMap<PathBuf, ImportedAsset>,
}

impl MemoryImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, asset: ImportedAsset) {
        self.assets.insert(path.into(), asset);
    }
}

impl AssetImporter for MemoryImporter {
    fn import(&self, path: &Path) -> ImportResult<ImportedAsset> {
        self.assets.get(path).cloned().ok_or_else(|| ImportError::Load {
            path: path.to_path_buf(),
            message: "no such asset".into(),
        })
    }
}
