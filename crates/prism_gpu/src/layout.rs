//! Kernel binding contract.
//!
//! Group 0 (scene, rebuilt on every scene bind):
//!
//! | binding | resource |
//! |---|---|
//! | 0 | scene output, storage read_write |
//! | 1..=9 | materials, spheres, planes, lenses, vertices, UVs, indices, meshes, models |
//! | 10 | texture atlas, `texture_2d_array<f32>` (Rgba32Float) |
//! | 11 | `ObjectCounter` uniform |
//!
//! Group 1 (frame): 0 camera uniform, 1 frame uniform, 2 accumulation image.

use bytemuck::{Pod, Zeroable};
use prism_math::CameraUniform;
use prism_scene::types::*;

pub const SCENE_GROUP: u32 = 0;
pub const FRAME_GROUP: u32 = 1;

pub const SCENE_OUTPUT_BINDING: u32 = 0;
pub const ATLAS_BINDING: u32 = 10;
pub const COUNTER_BINDING: u32 = 11;

pub const CAMERA_BINDING: u32 = 0;
pub const FRAME_BINDING: u32 = 1;
pub const ACCUMULATION_BINDING: u32 = 2;

/// Bytes reserved for kernel-owned scene data
pub const SCENE_OUTPUT_SIZE: u64 = 64;

/// Storage buffers visible to one compute stage: scene output, the nine
/// scene categories and the accumulation image.
pub const STORAGE_BUFFERS_PER_STAGE: u32 = 11;

/// Workgroup edge (must match @workgroup_size in the kernel)
pub const WG_SIZE: u32 = 8;

/// Scene array categories in binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneSlot {
    Materials,
    Spheres,
    Planes,
    Lenses,
    Vertices,
    Uvs,
    Indices,
    Meshes,
    Models,
}

impl SceneSlot {
    pub const ALL: [SceneSlot; 9] = [
        SceneSlot::Materials,
        SceneSlot::Spheres,
        SceneSlot::Planes,
        SceneSlot::Lenses,
        SceneSlot::Vertices,
        SceneSlot::Uvs,
        SceneSlot::Indices,
        SceneSlot::Meshes,
        SceneSlot::Models,
    ];

    pub fn binding(self) -> u32 {
        match self {
            SceneSlot::Materials => 1,
            SceneSlot::Spheres => 2,
            SceneSlot::Planes => 3,
            SceneSlot::Lenses => 4,
            SceneSlot::Vertices => 5,
            SceneSlot::Uvs => 6,
            SceneSlot::Indices => 7,
            SceneSlot::Meshes => 8,
            SceneSlot::Models => 9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SceneSlot::Materials => "prism_materials",
            SceneSlot::Spheres => "prism_spheres",
            SceneSlot::Planes => "prism_planes",
            SceneSlot::Lenses => "prism_lenses",
            SceneSlot::Vertices => "prism_vertices",
            SceneSlot::Uvs => "prism_uvs",
            SceneSlot::Indices => "prism_indices",
            SceneSlot::Meshes => "prism_meshes",
            SceneSlot::Models => "prism_models",
        }
    }

    /// Size of one element; also the size of an empty category's placeholder.
    pub fn element_size(self) -> u64 {
        let size = match self {
            SceneSlot::Materials => std::mem::size_of::<Material>(),
            SceneSlot::Spheres => std::mem::size_of::<Sphere>(),
            SceneSlot::Planes => std::mem::size_of::<Plane>(),
            SceneSlot::Lenses => std::mem::size_of::<Lens>(),
            SceneSlot::Vertices => std::mem::size_of::<Vertex>(),
            SceneSlot::Uvs => std::mem::size_of::<TexCoord>(),
            SceneSlot::Indices => std::mem::size_of::<u32>(),
            SceneSlot::Meshes => std::mem::size_of::<Mesh>(),
            SceneSlot::Models => std::mem::size_of::<Model>(),
        };
        size as u64
    }
}

/// Per-dispatch parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FrameUniform {
    pub width: u32,
    pub height: u32,
    /// Samples already blended into the image; the accumulate pass weights
    /// the new sample by `1 / (sample_count + 1)`
    pub sample_count: u32,
    pub seed: u32,
}

/// Kernel entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelPass {
    /// One invocation after each scene bind
    PrepareScene,
    /// First sample, overwrites the accumulation image
    Primary,
    /// Blends one more sample into the accumulation image
    Accumulate,
}

impl KernelPass {
    pub fn entry_point(self) -> &'static str {
        match self {
            KernelPass::PrepareScene => "prepare_scene",
            KernelPass::Primary => "trace",
            KernelPass::Accumulate => "accumulate",
        }
    }

    /// Workgroup counts for an image of `width` x `height`.
    pub fn workgroups(self, width: u32, height: u32) -> (u32, u32, u32) {
        match self {
            KernelPass::PrepareScene => (1, 1, 1),
            KernelPass::Primary | KernelPass::Accumulate => {
                (width.div_ceil(WG_SIZE), height.div_ceil(WG_SIZE), 1)
            }
        }
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}

/// Layout entries for group 0, in binding order.
pub fn scene_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = vec![storage_entry(SCENE_OUTPUT_BINDING, false)];
    entries.extend(SceneSlot::ALL.iter().map(|slot| storage_entry(slot.binding(), true)));
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: ATLAS_BINDING,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2Array,
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    });
    entries.push(uniform_entry(
        COUNTER_BINDING,
        std::mem::size_of::<ObjectCounter>() as u64,
    ));
    entries
}

/// Layout entries for group 1, in binding order.
pub fn frame_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    vec![
        uniform_entry(CAMERA_BINDING, std::mem::size_of::<CameraUniform>() as u64),
        uniform_entry(FRAME_BINDING, std::mem::size_of::<FrameUniform>() as u64),
        storage_entry(ACCUMULATION_BINDING, false),
    ]
}

pub fn create_scene_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("prism_scene_layout"),
        entries: &scene_layout_entries(),
    })
}

pub fn create_frame_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("prism_frame_layout"),
        entries: &frame_layout_entries(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_bindings_are_contiguous() {
        let bindings: Vec<u32> = scene_layout_entries().iter().map(|e| e.binding).collect();
        assert_eq!(bindings, (0..=11).collect::<Vec<_>>());
    }

    #[test]
    fn test_storage_buffer_budget() {
        let count = scene_layout_entries()
            .iter()
            .chain(frame_layout_entries().iter())
            .filter(|e| {
                matches!(
                    e.ty,
                    wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(count as u32, STORAGE_BUFFERS_PER_STAGE);
    }

    #[test]
    fn test_only_scene_output_is_writable() {
        for entry in scene_layout_entries() {
            if let wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                ..
            } = entry.ty
            {
                assert_eq!(read_only, entry.binding != SCENE_OUTPUT_BINDING);
            }
        }
    }

    #[test]
    fn test_slot_order_matches_bindings() {
        for (i, slot) in SceneSlot::ALL.iter().enumerate() {
            assert_eq!(slot.binding(), i as u32 + 1);
        }
        assert_eq!(SceneSlot::Lenses.element_size(), 64);
        assert_eq!(SceneSlot::Uvs.element_size(), 8);
    }

    #[test]
    fn test_workgroups_round_up() {
        assert_eq!(KernelPass::Primary.workgroups(17, 8), (3, 1, 1));
        assert_eq!(KernelPass::Accumulate.workgroups(16, 16), (2, 2, 1));
        assert_eq!(KernelPass::PrepareScene.workgroups(1920, 1080), (1, 1, 1));
    }

    #[test]
    fn test_frame_uniform_size() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 16);
    }
}
