//! Buffer synchronizer.
//!
//! Turns a compiled scene and its texture atlas into device buffers bound
//! in the kernel's fixed order. A sync builds a complete new
//! [`SceneBindings`]; the caller swaps it in only once every allocation and
//! upload has succeeded, so a failed sync leaves the previous bindings live.

use prism_scene::{CompiledScene, ObjectCounter, TextureAtlas};
use wgpu::util::DeviceExt;

use crate::error::ResourceError;
use crate::layout::{SceneSlot, ATLAS_BINDING, COUNTER_BINDING, SCENE_OUTPUT_BINDING, SCENE_OUTPUT_SIZE};

/// One category's upload: the array bytes, or a zeroed placeholder when
/// the array is empty (wgpu rejects zero-sized bindings).
#[derive(Debug, Clone, PartialEq)]
pub struct SlotUpload<'a> {
    pub slot: SceneSlot,
    pub bytes: &'a [u8],
}

impl SlotUpload<'_> {
    pub fn is_placeholder(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Size of the device buffer
    pub fn size(&self) -> u64 {
        if self.bytes.is_empty() {
            self.slot.element_size()
        } else {
            self.bytes.len() as u64
        }
    }
}

/// Byte views of every category, in binding order.
pub fn upload_plan(scene: &CompiledScene) -> Vec<SlotUpload<'_>> {
    SceneSlot::ALL
        .iter()
        .map(|&slot| {
            let bytes: &[u8] = match slot {
                SceneSlot::Materials => bytemuck::cast_slice(scene.materials()),
                SceneSlot::Spheres => bytemuck::cast_slice(scene.spheres()),
                SceneSlot::Planes => bytemuck::cast_slice(scene.planes()),
                SceneSlot::Lenses => bytemuck::cast_slice(scene.lenses()),
                SceneSlot::Vertices => bytemuck::cast_slice(scene.vertices()),
                SceneSlot::Uvs => bytemuck::cast_slice(scene.uvs()),
                SceneSlot::Indices => bytemuck::cast_slice(scene.indices()),
                SceneSlot::Meshes => bytemuck::cast_slice(scene.meshes()),
                SceneSlot::Models => bytemuck::cast_slice(scene.models()),
            };
            SlotUpload { slot, bytes }
        })
        .collect()
}

/// Check every planned buffer against the device's binding size limit.
pub fn check_plan(plan: &[SlotUpload], limits: &wgpu::Limits) -> Result<(), ResourceError> {
    let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    for upload in plan {
        if upload.size() > max {
            return Err(ResourceError::BufferTooLarge {
                label: upload.slot.label(),
                size: upload.size(),
                max,
            });
        }
    }
    Ok(())
}

/// Check the atlas against texture limits.
pub fn check_atlas(atlas: &TextureAtlas, limits: &wgpu::Limits) -> Result<(), ResourceError> {
    if atlas.width > limits.max_texture_dimension_2d
        || atlas.height > limits.max_texture_dimension_2d
        || atlas.layers > limits.max_texture_array_layers
    {
        return Err(ResourceError::AtlasTooLarge {
            width: atlas.width,
            height: atlas.height,
            layers: atlas.layers,
        });
    }
    Ok(())
}

/// Device resources for one compiled scene (bind group 0).
pub struct SceneBindings {
    pub bind_group: wgpu::BindGroup,
    pub counter: ObjectCounter,
    pub scene_output: wgpu::Buffer,
    pub buffers: Vec<wgpu::Buffer>,
    pub counter_buffer: wgpu::Buffer,
    pub atlas: wgpu::Texture,
}

/// Uploads compiled scenes for one bind group layout.
pub struct BufferSynchronizer {
    layout: wgpu::BindGroupLayout,
}

impl BufferSynchronizer {
    pub fn new(layout: wgpu::BindGroupLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    /// Allocate, upload and bind everything for `scene`.
    pub fn sync(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &CompiledScene,
        atlas: &TextureAtlas,
    ) -> Result<SceneBindings, ResourceError> {
        let plan = upload_plan(scene);
        let limits = device.limits();
        check_plan(&plan, &limits)?;
        check_atlas(atlas, &limits)?;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let scene_output = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prism_scene_output"),
            size: SCENE_OUTPUT_SIZE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let buffers: Vec<wgpu::Buffer> = plan
            .iter()
            .map(|upload| {
                let placeholder;
                let contents = if upload.is_placeholder() {
                    placeholder = vec![0u8; upload.size() as usize];
                    placeholder.as_slice()
                } else {
                    upload.bytes
                };
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(upload.slot.label()),
                    contents,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();

        let counter = scene.object_counter();
        let counter_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("prism_object_counter"),
            contents: bytemuck::bytes_of(&counter),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let atlas_texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("prism_texture_atlas"),
                size: wgpu::Extent3d {
                    width: atlas.width,
                    height: atlas.height,
                    depth_or_array_layers: atlas.layers,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba32Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&atlas.texels),
        );
        let atlas_view = atlas_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("prism_texture_atlas_view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: SCENE_OUTPUT_BINDING,
            resource: scene_output.as_entire_binding(),
        }];
        entries.extend(
            plan.iter()
                .zip(&buffers)
                .map(|(upload, buffer)| wgpu::BindGroupEntry {
                    binding: upload.slot.binding(),
                    resource: buffer.as_entire_binding(),
                }),
        );
        entries.push(wgpu::BindGroupEntry {
            binding: ATLAS_BINDING,
            resource: wgpu::BindingResource::TextureView(&atlas_view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: COUNTER_BINDING,
            resource: counter_buffer.as_entire_binding(),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prism_scene_bind_group"),
            layout: &self.layout,
            entries: &entries,
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(error) = out_of_memory.or(validation) {
            return Err(ResourceError::Device {
                context: "scene upload",
                message: error.to_string(),
            });
        }

        let uploaded: u64 = plan.iter().map(SlotUpload::size).sum();
        log::info!(
            "Uploaded scene: {:.1} KB in {} buffers ({} placeholders), atlas {}x{}x{}",
            uploaded as f32 / 1024.0,
            plan.len(),
            plan.iter().filter(|u| u.is_placeholder()).count(),
            atlas.width,
            atlas.height,
            atlas.layers
        );

        Ok(SceneBindings {
            bind_group,
            counter,
            scene_output,
            buffers,
            counter_buffer,
            atlas: atlas_texture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_math::{Mat4, Vec3};
    use prism_scene::{ImportedAsset, ImportedMesh, MaterialKind, SceneCompiler};

    fn small_scene() -> CompiledScene {
        let mut c = SceneCompiler::new();
        let m = c.add_material(MaterialKind::Diffuse, Vec3::ONE, 0.0);
        c.add_sphere(Vec3::ZERO, 1.0, m).unwrap();
        c.add_sphere(Vec3::X, 1.0, m).unwrap();
        let tri = ImportedMesh::triangles("t", vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2]);
        c.load_model(&ImportedAsset::from_meshes("t.obj", vec![tri]), m, Mat4::IDENTITY)
            .unwrap();
        c.finish()
    }

    #[test]
    fn test_plan_order_and_sizes() {
        let scene = small_scene();
        let plan = upload_plan(&scene);

        let slots: Vec<SceneSlot> = plan.iter().map(|u| u.slot).collect();
        assert_eq!(slots, SceneSlot::ALL.to_vec());

        let sizes: Vec<u64> = plan.iter().map(SlotUpload::size).collect();
        assert_eq!(sizes, vec![32, 64, 32, 64, 48, 24, 12, 16, 16]);
    }

    #[test]
    fn test_empty_categories_get_placeholders() {
        let scene = small_scene();
        let plan = upload_plan(&scene);

        let placeholders: Vec<SceneSlot> = plan
            .iter()
            .filter(|u| u.is_placeholder())
            .map(|u| u.slot)
            .collect();
        assert_eq!(placeholders, vec![SceneSlot::Planes, SceneSlot::Lenses]);
    }

    #[test]
    fn test_empty_scene_is_all_placeholders() {
        let scene = CompiledScene::default();
        let plan = upload_plan(&scene);
        assert!(plan.iter().all(|u| u.is_placeholder() && u.size() > 0));
    }

    #[test]
    fn test_plan_bytes_match_records() {
        let scene = small_scene();
        let plan = upload_plan(&scene);
        let spheres: &[prism_scene::Sphere] = bytemuck::cast_slice(plan[1].bytes);
        assert_eq!(spheres, scene.spheres());
    }

    #[test]
    fn test_check_plan_limits() {
        let scene = small_scene();
        let plan = upload_plan(&scene);

        let roomy = wgpu::Limits::default();
        assert!(check_plan(&plan, &roomy).is_ok());

        let tight = wgpu::Limits {
            max_storage_buffer_binding_size: 40,
            ..wgpu::Limits::default()
        };
        let err = check_plan(&plan, &tight).unwrap_err();
        assert_eq!(
            err,
            ResourceError::BufferTooLarge {
                label: "prism_spheres",
                size: 64,
                max: 40
            }
        );
    }

    #[test]
    fn test_check_atlas_limits() {
        let limits = wgpu::Limits {
            max_texture_array_layers: 2,
            ..wgpu::Limits::default()
        };
        assert!(check_atlas(&TextureAtlas::placeholder(), &limits).is_ok());

        let atlas = TextureAtlas {
            width: 1,
            height: 1,
            layers: 3,
            texels: vec![[0.0; 4]; 3],
        };
        assert!(matches!(
            check_atlas(&atlas, &limits),
            Err(ResourceError::AtlasTooLarge { layers: 3, .. })
        ));
    }
}
