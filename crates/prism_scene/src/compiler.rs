//! Geometry/material compiler.
//!
//! Accumulates primitives and imported assets into the flat arrays the
//! trace kernel reads. Cross references between arrays are plain indices
//! ("anchors") taken from the array lengths at the time a record is added,
//! so anchors are monotonically non-decreasing and runs never overlap.
//!
//! Every `add_*`/`load_*` call validates its input completely before
//! appending anything: a failed call leaves the compiler untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use prism_math::{Mat4, Vec3};
use thiserror::Error;

use crate::import::{AssetImporter, ImportError, ImportedAsset, ImportedMesh};
use crate::types::*;

/// Reference and import errors raised while compiling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Material {id} does not exist ({count} materials defined)")]
    MissingMaterial { id: u32, count: usize },

    #[error("Lens radii ({r1}, {r2}) must be at least the aperture height {aperture_height}")]
    LensAperture {
        r1: f32,
        r2: f32,
        aperture_height: f32,
    },

    #[error("Mesh '{mesh}' in {path} has no texture but uses a textured material")]
    MissingTexture { path: PathBuf, mesh: String },

    #[error("Mesh '{mesh}' in {path} has {count} textures, textured materials need exactly one")]
    MultipleTextures {
        path: PathBuf,
        mesh: String,
        count: usize,
    },

    #[error("{0} array exceeds the 32-bit index range")]
    Overflow(&'static str),

    #[error(transparent)]
    Import(#[from] ImportError),
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Finished scene arrays, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledScene {
    materials: Vec<Material>,
    spheres: Vec<Sphere>,
    planes: Vec<Plane>,
    lenses: Vec<Lens>,
    vertices: Vec<Vertex>,
    uvs: Vec<TexCoord>,
    indices: Vec<u32>,
    meshes: Vec<Mesh>,
    models: Vec<Model>,
    texture_paths: Vec<PathBuf>,
}

impl CompiledScene {
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn lenses(&self) -> &[Lens] {
        &self.lenses
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// One entry per vertex; zero for meshes imported without UVs
    pub fn uvs(&self) -> &[TexCoord] {
        &self.uvs
    }

    /// Triangle indices, local to the owning mesh
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Texture paths in atlas-layer order
    pub fn texture_paths(&self) -> &[PathBuf] {
        &self.texture_paths
    }

    pub fn object_counter(&self) -> ObjectCounter {
        ObjectCounter {
            sphere_count: self.spheres.len() as u32,
            plane_count: self.planes.len() as u32,
            lens_count: self.lenses.len() as u32,
            model_count: self.models.len() as u32,
        }
    }

    /// Total triangle count over all meshes
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.face_count as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
            && self.spheres.is_empty()
            && self.planes.is_empty()
            && self.lenses.is_empty()
            && self.models.is_empty()
    }
}

/// One mesh ready to be appended, produced by validation.
struct PendingMesh<'a> {
    source: &'a ImportedMesh,
    world: Mat4,
    triangles: Vec<u32>,
    texture: Option<&'a Path>,
}

/// Builds a [`CompiledScene`] incrementally.
#[derive(Debug, Default)]
pub struct SceneCompiler {
    scene: CompiledScene,
    texture_ids: HashMap<PathBuf, u32>,
}

impl SceneCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrays compiled so far
    pub fn scene(&self) -> &CompiledScene {
        &self.scene
    }

    pub fn finish(self) -> CompiledScene {
        let scene = &self.scene;
        log::info!(
            "Compiled scene: {} materials, {} spheres, {} planes, {} lenses, {} models ({} meshes, {} triangles), {} textures",
            scene.materials.len(),
            scene.spheres.len(),
            scene.planes.len(),
            scene.lenses.len(),
            scene.models.len(),
            scene.meshes.len(),
            scene.triangle_count(),
            scene.texture_paths.len()
        );
        self.scene
    }

    /// Returns the new material's id.
    pub fn add_material(&mut self, kind: MaterialKind, color: Vec3, extra_data: f32) -> u32 {
        let id = self.scene.materials.len() as u32;
        self.scene.materials.push(Material::new(kind, color, extra_data));
        log::debug!("Material {}: {} {:?} {}", id, kind.name(), color, extra_data);
        id
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, material_id: u32) -> CompileResult<()> {
        self.check_material(material_id)?;
        self.scene.spheres.push(Sphere {
            center: center.to_array(),
            radius,
            material_id,
            _pad: [0; 3],
        });
        Ok(())
    }

    pub fn add_plane(&mut self, point: Vec3, normal: Vec3, material_id: u32) -> CompileResult<()> {
        self.check_material(material_id)?;
        self.scene.planes.push(Plane {
            point: point.to_array(),
            material_id,
            normal: normal.to_array(),
            _pad: 0,
        });
        Ok(())
    }

    /// Add a biconvex lens. The sphere centres sit on the principal axis,
    /// `sqrt(r^2 - h^2)` from `center` on either side.
    pub fn add_lens(
        &mut self,
        center: Vec3,
        axis: Vec3,
        r1: f32,
        r2: f32,
        aperture_height: f32,
        material_id: u32,
    ) -> CompileResult<()> {
        self.check_material(material_id)?;
        // Negated comparisons so NaN inputs are rejected too
        if !(aperture_height >= 0.0 && r1 >= aperture_height && r2 >= aperture_height) {
            return Err(CompileError::LensAperture {
                r1,
                r2,
                aperture_height,
            });
        }

        let h2 = aperture_height * aperture_height;
        let p1 = center + axis * (r1 * r1 - h2).max(0.0).sqrt();
        let p2 = center - axis * (r2 * r2 - h2).max(0.0).sqrt();

        self.scene.lenses.push(Lens {
            center: center.to_array(),
            r1,
            p1: p1.to_array(),
            r2,
            p2: p2.to_array(),
            material_id,
            axis: axis.to_array(),
            _pad: 0.0,
        });
        Ok(())
    }

    /// Import `path` and compile it as one model.
    pub fn load_model_from(
        &mut self,
        importer: &dyn AssetImporter,
        path: &Path,
        material_id: u32,
        transform: Mat4,
    ) -> CompileResult<()> {
        self.check_material(material_id)?;
        let asset = importer.import(path)?;
        self.load_model(&asset, material_id, transform)
    }

    /// Flatten `asset` under `transform` and record one [`Model`] spanning
    /// the meshes it produced.
    pub fn load_model(
        &mut self,
        asset: &ImportedAsset,
        material_id: u32,
        transform: Mat4,
    ) -> CompileResult<()> {
        self.check_material(material_id)?;
        let textured = self.scene.materials[material_id as usize].kind()
            == Some(MaterialKind::Textured);

        let pending = collect_meshes(asset, transform, textured)?;
        self.check_capacity(&pending)?;

        let mesh_anchor = self.scene.meshes.len() as u32;
        for mesh in &pending {
            self.emit_mesh(mesh);
        }

        self.scene.models.push(Model {
            mesh_anchor,
            mesh_count: pending.len() as u32,
            material_id,
            _pad: 0,
        });

        log::debug!(
            "Model {} from {}: meshes {}..{}",
            self.scene.models.len() - 1,
            asset.source.display(),
            mesh_anchor,
            mesh_anchor as usize + pending.len()
        );
        Ok(())
    }

    fn check_material(&self, id: u32) -> CompileResult<()> {
        let count = self.scene.materials.len();
        if id as usize >= count {
            return Err(CompileError::MissingMaterial { id, count });
        }
        Ok(())
    }

    /// Anchors are u32 on the device.
    fn check_capacity(&self, pending: &[PendingMesh]) -> CompileResult<()> {
        let vertices: usize = pending.iter().map(|m| m.source.positions.len()).sum();
        let indices: usize = pending.iter().map(|m| m.triangles.len()).sum();
        let limit = u32::MAX as usize;

        if self.scene.vertices.len() + vertices > limit {
            return Err(CompileError::Overflow("vertex"));
        }
        if self.scene.indices.len() + indices > limit {
            return Err(CompileError::Overflow("index"));
        }
        if self.scene.meshes.len() + pending.len() > limit {
            return Err(CompileError::Overflow("mesh"));
        }
        Ok(())
    }

    fn emit_mesh(&mut self, mesh: &PendingMesh) {
        let vertex_anchor = self.scene.vertices.len() as u32;
        let index_anchor = self.scene.indices.len() as u32;

        self.scene.vertices.extend(
            mesh.source
                .positions
                .iter()
                .map(|&p| Vertex::new(mesh.world.transform_point3(p))),
        );

        match &mesh.source.uvs {
            Some(uvs) => self.scene.uvs.extend(uvs.iter().map(|uv| uv.to_array())),
            None => self
                .scene
                .uvs
                .extend(std::iter::repeat([0.0; 2]).take(mesh.source.positions.len())),
        }

        self.scene.indices.extend_from_slice(&mesh.triangles);

        let texture = mesh.texture.map(|path| self.texture_id(path));
        self.scene.meshes.push(Mesh::new(
            vertex_anchor,
            index_anchor,
            (mesh.triangles.len() / 3) as u32,
            texture,
        ));
    }

    /// First occurrence of a path wins the id.
    fn texture_id(&mut self, path: &Path) -> u32 {
        if let Some(&id) = self.texture_ids.get(path) {
            return id;
        }
        let id = self.scene.texture_paths.len() as u32;
        self.scene.texture_paths.push(path.to_path_buf());
        self.texture_ids.insert(path.to_path_buf(), id);
        id
    }
}

/// Walk the node tree pre-order with an explicit stack, validating every
/// reachable mesh.
fn collect_meshes(
    asset: &ImportedAsset,
    transform: Mat4,
    textured: bool,
) -> CompileResult<Vec<PendingMesh<'_>>> {
    let malformed = |reason: String| {
        CompileError::Import(ImportError::Malformed {
            path: asset.source.clone(),
            reason,
        })
    };

    if asset.nodes.is_empty() {
        return Err(malformed("asset has no root node".into()));
    }

    let mut visited = vec![false; asset.nodes.len()];
    let mut stack = vec![(0usize, transform)];
    let mut pending = Vec::new();

    while let Some((index, parent)) = stack.pop() {
        if std::mem::replace(&mut visited[index], true) {
            return Err(malformed(format!("node {index} is reachable more than once")));
        }

        let node = &asset.nodes[index];
        let world = parent * node.transform;

        for &mesh_index in &node.meshes {
            let mesh = asset.meshes.get(mesh_index).ok_or_else(|| {
                malformed(format!(
                    "node '{}' references mesh {mesh_index} of {}",
                    node.name,
                    asset.meshes.len()
                ))
            })?;
            let triangles = validate_mesh(mesh).map_err(&malformed)?;
            let texture = if textured {
                Some(single_texture(asset, mesh)?)
            } else {
                None
            };
            pending.push(PendingMesh {
                source: mesh,
                world,
                triangles,
                texture,
            });
        }

        for &child in node.children.iter().rev() {
            if child >= asset.nodes.len() {
                return Err(malformed(format!(
                    "node '{}' references child {child} of {}",
                    node.name,
                    asset.nodes.len()
                )));
            }
            stack.push((child, world));
        }
    }

    Ok(pending)
}

/// Check face data against the vertex count and return the triangle list.
fn validate_mesh(mesh: &ImportedMesh) -> Result<Vec<u32>, String> {
    let vertex_count = mesh.positions.len();

    if let Some(uvs) = &mesh.uvs {
        if uvs.len() != vertex_count {
            return Err(format!(
                "mesh '{}' has {} UVs for {} vertices",
                mesh.name,
                uvs.len(),
                vertex_count
            ));
        }
    }

    let declared: usize = mesh.face_vertex_counts.iter().map(|&c| c as usize).sum();
    if declared != mesh.face_vertex_indices.len() {
        return Err(format!(
            "mesh '{}' face counts sum to {} but has {} indices",
            mesh.name,
            declared,
            mesh.face_vertex_indices.len()
        ));
    }

    if let Some(&bad) = mesh
        .face_vertex_indices
        .iter()
        .find(|&&i| i as usize >= vertex_count)
    {
        return Err(format!(
            "mesh '{}' index {} is out of range for {} vertices",
            mesh.name, bad, vertex_count
        ));
    }

    Ok(mesh.triangulate())
}

fn single_texture<'a>(asset: &ImportedAsset, mesh: &'a ImportedMesh) -> CompileResult<&'a Path> {
    match mesh.textures.as_slice() {
        [path] => Ok(path.as_path()),
        [] => Err(CompileError::MissingTexture {
            path: asset.source.clone(),
            mesh: mesh.name.clone(),
        }),
        many => Err(CompileError::MultipleTextures {
            path: asset.source.clone(),
            mesh: mesh.name.clone(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{ImportNode, MemoryImporter};
    use prism_math::Vec2;

    fn uv(u: f32, v: f32) -> Vec2 {
        Vec2::new(u, v)
    }

    fn triangle(name: &str) -> ImportedMesh {
        ImportedMesh::triangles(
            name,
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
        )
    }

    fn quad(name: &str) -> ImportedMesh {
        ImportedMesh {
            name: name.into(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            uvs: Some(vec![uv(0.0, 0.0), uv(1.0, 0.0), uv(1.0, 1.0), uv(0.0, 1.0)]),
            face_vertex_counts: vec![4],
            face_vertex_indices: vec![0, 1, 2, 3],
            textures: Vec::new(),
        }
    }

    fn textured(mut mesh: ImportedMesh, path: &str) -> ImportedMesh {
        mesh.textures = vec![PathBuf::from(path)];
        mesh
    }

    fn assert_anchor_invariants(scene: &CompiledScene) {
        let meshes = scene.meshes();
        for pair in meshes.windows(2) {
            assert!(pair[0].vertex_anchor <= pair[1].vertex_anchor);
            assert!(pair[0].index_anchor + pair[0].face_count * 3 <= pair[1].index_anchor);
        }
        assert_eq!(scene.triangle_count() * 3, scene.indices().len());
        assert_eq!(scene.uvs().len(), scene.vertices().len());

        let mut next = 0;
        for model in scene.models() {
            assert_eq!(model.mesh_anchor, next);
            next += model.mesh_count;
        }
        assert_eq!(next as usize, meshes.len());
    }

    #[test]
    fn test_empty_compiler() {
        let scene = SceneCompiler::new().finish();
        assert!(scene.is_empty());
        assert_eq!(scene.object_counter(), ObjectCounter::default());
        assert!(scene.indices().is_empty());
    }

    #[test]
    fn test_primitives_and_counter() {
        let mut c = SceneCompiler::new();
        let red = c.add_material(MaterialKind::Diffuse, Vec3::X, 0.5);
        c.add_sphere(Vec3::new(0.0, 0.0, 3.0), 1.5, red).unwrap();
        c.add_plane(Vec3::ZERO, Vec3::Y, red).unwrap();
        c.add_plane(Vec3::ONE, Vec3::X, red).unwrap();

        let scene = c.finish();
        assert_eq!(scene.materials()[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(scene.spheres()[0].center, [0.0, 0.0, 3.0]);
        assert_eq!(scene.spheres()[0].radius, 1.5);
        assert_eq!(
            scene.object_counter(),
            ObjectCounter {
                sphere_count: 1,
                plane_count: 2,
                lens_count: 0,
                model_count: 0
            }
        );
    }

    #[test]
    fn test_missing_material() {
        let mut c = SceneCompiler::new();
        let err = c.add_sphere(Vec3::ZERO, 1.0, 0).unwrap_err();
        assert_eq!(err, CompileError::MissingMaterial { id: 0, count: 0 });
        assert!(c.scene().spheres().is_empty());
    }

    #[test]
    fn test_lens_at_aperture_limit() {
        let mut c = SceneCompiler::new();
        let glass = c.add_material(MaterialKind::Refractive, Vec3::ONE, 1.5);
        let center = Vec3::new(1.0, 2.0, 3.0);
        c.add_lens(center, Vec3::Z, 1.0, 1.0, 1.0, glass).unwrap();

        let lens = c.scene().lenses()[0];
        assert_eq!(lens.p1, center.to_array());
        assert_eq!(lens.p2, center.to_array());
    }

    #[test]
    fn test_lens_surface_points() {
        let mut c = SceneCompiler::new();
        let glass = c.add_material(MaterialKind::Dielectric, Vec3::ONE, 1.5);
        c.add_lens(Vec3::ZERO, Vec3::Z, 13.0, 15.0, 12.0, glass).unwrap();

        let lens = c.scene().lenses()[0];
        assert_eq!(lens.p1, [0.0, 0.0, 5.0]);
        assert_eq!(lens.p2, [0.0, 0.0, -9.0]);
        assert_eq!((lens.r1, lens.r2), (13.0, 15.0));
    }

    #[test]
    fn test_lens_aperture_too_large() {
        let mut c = SceneCompiler::new();
        let glass = c.add_material(MaterialKind::Refractive, Vec3::ONE, 1.5);
        let err = c.add_lens(Vec3::ZERO, Vec3::Z, 1.0, 2.0, 1.5, glass).unwrap_err();
        assert!(matches!(err, CompileError::LensAperture { .. }));
        assert!(c.scene().lenses().is_empty());
    }

    #[test]
    fn test_model_anchors_across_loads() {
        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);

        let first = ImportedAsset::from_meshes("a.obj", vec![triangle("a0"), quad("a1")]);
        let second = ImportedAsset::from_meshes("b.obj", vec![quad("b0")]);
        c.load_model(&first, m, Mat4::IDENTITY).unwrap();
        c.load_model(&second, m, Mat4::IDENTITY).unwrap();

        let scene = c.finish();
        assert_eq!(scene.models().len(), 2);
        assert_eq!(scene.models()[0].mesh_anchor, 0);
        assert_eq!(scene.models()[0].mesh_count, 2);
        assert_eq!(scene.models()[1].mesh_anchor, 2);
        assert_eq!(scene.models()[1].mesh_count, 1);

        // quad is fan-triangulated into two faces
        assert_eq!(scene.meshes()[1].face_count, 2);
        assert_eq!(scene.meshes()[2].vertex_anchor, 7);
        assert_eq!(scene.meshes()[2].index_anchor, 9);
        assert_anchor_invariants(&scene);
    }

    #[test]
    fn test_anchor_counter_is_per_compiler() {
        let asset = ImportedAsset::from_meshes("a.obj", vec![triangle("t")]);
        for _ in 0..2 {
            let mut c = SceneCompiler::new();
            let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
            c.load_model(&asset, m, Mat4::IDENTITY).unwrap();
            assert_eq!(c.scene().models()[0].mesh_anchor, 0);
        }
    }

    #[test]
    fn test_indices_stay_local() {
        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        let asset = ImportedAsset::from_meshes("a.obj", vec![triangle("t0"), triangle("t1")]);
        c.load_model(&asset, m, Mat4::IDENTITY).unwrap();

        assert_eq!(c.scene().indices(), &[0, 1, 2, 0, 1, 2]);
        assert_eq!(c.scene().meshes()[1].vertex_anchor, 3);
    }

    #[test]
    fn test_uvs_stay_vertex_aligned() {
        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        let asset = ImportedAsset::from_meshes("a.obj", vec![triangle("plain"), quad("mapped")]);
        c.load_model(&asset, m, Mat4::IDENTITY).unwrap();

        let scene = c.scene();
        assert_eq!(scene.uvs().len(), 7);
        assert_eq!(scene.uvs()[0..3], [[0.0, 0.0]; 3]);
        assert_eq!(scene.uvs()[5], [1.0, 1.0]);
    }

    #[test]
    fn test_node_transforms_accumulate() {
        let mut root = ImportNode::new("root");
        root.transform = Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0));
        root.children = vec![1];
        let mut child = ImportNode::new("child");
        child.transform = Mat4::from_scale(Vec3::splat(2.0));
        child.meshes = vec![0];

        let asset = ImportedAsset {
            source: "tree.obj".into(),
            nodes: vec![root, child],
            meshes: vec![triangle("t")],
        };

        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        let model = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        c.load_model(&asset, m, model).unwrap();

        // model * root * child applied to (1,0,0)
        assert_eq!(c.scene().vertices()[1].position, [7.0, 10.0, 0.0]);
    }

    #[test]
    fn test_preorder_traversal() {
        let mut root = ImportNode::new("root");
        root.children = vec![1, 3];
        root.meshes = vec![0];
        let mut a = ImportNode::new("a");
        a.children = vec![2];
        a.meshes = vec![1];
        let mut a_child = ImportNode::new("a_child");
        a_child.meshes = vec![2];
        let mut b = ImportNode::new("b");
        b.meshes = vec![3];

        let meshes = (0..4)
            .map(|i| ImportedMesh::triangles(format!("m{i}"), vec![Vec3::splat(i as f32); 3], vec![0, 1, 2]))
            .collect();
        let asset = ImportedAsset {
            source: "tree.obj".into(),
            nodes: vec![root, a, a_child, b],
            meshes,
        };

        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        c.load_model(&asset, m, Mat4::IDENTITY).unwrap();

        let firsts: Vec<f32> = c
            .scene()
            .meshes()
            .iter()
            .map(|mesh| c.scene().vertices()[mesh.vertex_anchor as usize].position[0])
            .collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut root = ImportNode::new("root");
        root.children = vec![1];
        let mut child = ImportNode::new("child");
        child.children = vec![0];
        child.meshes = vec![0];
        let asset = ImportedAsset {
            source: "loop.obj".into(),
            nodes: vec![root, child],
            meshes: vec![triangle("t")],
        };

        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        let err = c.load_model(&asset, m, Mat4::IDENTITY).unwrap_err();
        assert!(matches!(err, CompileError::Import(ImportError::Malformed { .. })));
        assert!(c.scene().meshes().is_empty());
        assert!(c.scene().models().is_empty());
    }

    #[test]
    fn test_bad_mesh_leaves_compiler_untouched() {
        let mut broken = triangle("broken");
        broken.face_vertex_indices = vec![0, 1, 7];

        let asset = ImportedAsset::from_meshes("a.obj", vec![triangle("ok"), broken]);
        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        assert!(c.load_model(&asset, m, Mat4::IDENTITY).is_err());
        assert!(c.scene().vertices().is_empty());

        let mut short_uvs = quad("short");
        short_uvs.uvs = Some(vec![uv(0.0, 0.0)]);
        let asset = ImportedAsset::from_meshes("b.obj", vec![short_uvs]);
        assert!(c.load_model(&asset, m, Mat4::IDENTITY).is_err());

        let mut miscounted = triangle("miscounted");
        miscounted.face_vertex_counts = vec![4];
        let asset = ImportedAsset::from_meshes("c.obj", vec![miscounted]);
        assert!(c.load_model(&asset, m, Mat4::IDENTITY).is_err());
    }

    #[test]
    fn test_texture_deduplication() {
        let mut c = SceneCompiler::new();
        let tex = c.add_material(MaterialKind::Textured, Vec3::ONE, 0.0);
        let asset = ImportedAsset::from_meshes(
            "a.obj",
            vec![
                textured(quad("q0"), "wood.png"),
                textured(quad("q1"), "stone.png"),
                textured(quad("q2"), "wood.png"),
            ],
        );
        c.load_model(&asset, tex, Mat4::IDENTITY).unwrap();

        let scene = c.finish();
        let ids: Vec<_> = scene.meshes().iter().map(|m| m.texture()).collect();
        assert_eq!(ids, vec![Some(0), Some(1), Some(0)]);
        assert_eq!(
            scene.texture_paths(),
            &[PathBuf::from("wood.png"), PathBuf::from("stone.png")]
        );
    }

    #[test]
    fn test_untextured_material_ignores_textures() {
        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        let asset = ImportedAsset::from_meshes("a.obj", vec![textured(quad("q"), "wood.png")]);
        c.load_model(&asset, m, Mat4::IDENTITY).unwrap();

        assert_eq!(c.scene().meshes()[0].texture(), None);
        assert!(c.scene().texture_paths().is_empty());
    }

    #[test]
    fn test_textured_mesh_needs_one_texture() {
        let mut c = SceneCompiler::new();
        let tex = c.add_material(MaterialKind::Textured, Vec3::ONE, 0.0);

        let bare = ImportedAsset::from_meshes("a.obj", vec![quad("bare")]);
        assert!(matches!(
            c.load_model(&bare, tex, Mat4::IDENTITY),
            Err(CompileError::MissingTexture { .. })
        ));

        let mut doubled = quad("doubled");
        doubled.textures = vec!["a.png".into(), "b.png".into()];
        let doubled = ImportedAsset::from_meshes("b.obj", vec![doubled]);
        assert!(matches!(
            c.load_model(&doubled, tex, Mat4::IDENTITY),
            Err(CompileError::MultipleTextures { count: 2, .. })
        ));
        assert!(c.scene().texture_paths().is_empty());
    }

    #[test]
    fn test_load_model_from_importer() {
        let mut importer = MemoryImporter::new();
        importer.insert("tri.obj", ImportedAsset::from_meshes("tri.obj", vec![triangle("t")]));

        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        c.load_model_from(&importer, Path::new("tri.obj"), m, Mat4::IDENTITY).unwrap();
        assert_eq!(c.scene().models().len(), 1);

        let err = c
            .load_model_from(&importer, Path::new("none.obj"), m, Mat4::IDENTITY)
            .unwrap_err();
        assert!(matches!(err, CompileError::Import(ImportError::Load { .. })));
    }
}
