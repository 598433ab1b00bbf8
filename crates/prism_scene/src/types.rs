//! Flat scene records in the layout the trace kernel reads.
//!
//! Every record is `#[repr(C)]` and padded to WGSL storage-buffer alignment
//! (vec3 fields occupy 16 bytes), so a `&[T]` can be uploaded with
//! `bytemuck::cast_slice` unchanged.

use bytemuck::{Pod, Zeroable};
use prism_math::Vec3;

/// Surface model selector. Discriminants are what the kernel switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MaterialKind {
    /// Glass-like, `extra_data` is the refractive index
    Refractive = 0,
    /// Mirror, `extra_data` is the roughness
    Reflective = 1,
    /// Fresnel mix of reflection and refraction
    Dielectric = 2,
    Diffuse = 3,
    /// Diffuse with the colour taken from the mesh's atlas layer
    Textured = 4,
    /// Emitter, `color` is the radiance
    Light = 5,
}

impl MaterialKind {
    /// Parse the keyword used in scene files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "refractive" => Some(MaterialKind::Refractive),
            "reflective" => Some(MaterialKind::Reflective),
            "dielectric" => Some(MaterialKind::Dielectric),
            "diffuse" => Some(MaterialKind::Diffuse),
            "textured" => Some(MaterialKind::Textured),
            "light" => Some(MaterialKind::Light),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MaterialKind::Refractive => "refractive",
            MaterialKind::Reflective => "reflective",
            MaterialKind::Dielectric => "dielectric",
            MaterialKind::Diffuse => "diffuse",
            MaterialKind::Textured => "textured",
            MaterialKind::Light => "light",
        }
    }
}

impl TryFrom<u32> for MaterialKind {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, u32> {
        match value {
            0 => Ok(MaterialKind::Refractive),
            1 => Ok(MaterialKind::Reflective),
            2 => Ok(MaterialKind::Dielectric),
            3 => Ok(MaterialKind::Diffuse),
            4 => Ok(MaterialKind::Textured),
            5 => Ok(MaterialKind::Light),
            other => Err(other),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub color: [f32; 3],
    /// Meaning depends on `kind` (refractive index, roughness, ...)
    pub extra_data: f32,
    pub kind: u32,
    pub _pad: [u32; 3],
}

impl Material {
    pub fn new(kind: MaterialKind, color: Vec3, extra_data: f32) -> Self {
        Self {
            color: color.to_array(),
            extra_data,
            kind: kind as u32,
            _pad: [0; 3],
        }
    }

    /// Decoded kind. Records built through [`Material::new`] always decode.
    pub fn kind(&self) -> Option<MaterialKind> {
        MaterialKind::try_from(self.kind).ok()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Sphere {
    pub center: [f32; 3],
    pub radius: f32,
    pub material_id: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Plane {
    pub point: [f32; 3],
    pub material_id: u32,
    /// Expected to be unit length; not renormalized
    pub normal: [f32; 3],
    pub _pad: u32,
}

/// Biconvex lens: the intersection of two spheres of radius `r1` and `r2`
/// centred at `p1` and `p2` on opposite sides of `center`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Lens {
    pub center: [f32; 3],
    pub r1: f32,
    pub p1: [f32; 3],
    pub r2: f32,
    pub p2: [f32; 3],
    pub material_id: u32,
    pub axis: [f32; 3],
    pub _pad: f32,
}

/// World-space vertex position, padded to 16 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub _pad: f32,
}

impl Vertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            _pad: 0.0,
        }
    }
}

/// Texture coordinate, aligned with the vertex array
pub type TexCoord = [f32; 2];

/// Sentinel written to [`Mesh::texture_id`] for untextured meshes
pub const NO_TEXTURE: u32 = u32::MAX;

/// A run of triangles in the shared vertex/index arrays.
///
/// Indices are local to the mesh: vertex `i` of the mesh lives at
/// `vertex_anchor + i` in both the vertex and UV arrays.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Mesh {
    pub vertex_anchor: u32,
    pub index_anchor: u32,
    pub face_count: u32,
    pub texture_id: u32,
}

impl Mesh {
    pub fn new(vertex_anchor: u32, index_anchor: u32, face_count: u32, texture: Option<u32>) -> Self {
        Self {
            vertex_anchor,
            index_anchor,
            face_count,
            texture_id: texture.unwrap_or(NO_TEXTURE),
        }
    }

    /// Atlas layer, or `None` when the mesh is untextured
    pub fn texture(&self) -> Option<u32> {
        (self.texture_id != NO_TEXTURE).then_some(self.texture_id)
    }
}

/// A loaded model: a contiguous run of meshes sharing one material
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Model {
    pub mesh_anchor: u32,
    pub mesh_count: u32,
    pub material_id: u32,
    pub _pad: u32,
}

/// Per-category object counts passed alongside the buffers
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ObjectCounter {
    pub sphere_count: u32,
    pub plane_count: u32,
    pub lens_count: u32,
    pub model_count: u32,
}
