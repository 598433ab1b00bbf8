//! wgpu implementation of [`FrameDevice`].

use std::sync::mpsc;

use prism_math::CameraUniform;
use prism_scene::{CompiledScene, TextureAtlas};

use crate::context::GpuContext;
use crate::error::ResourceError;
use crate::layout::{
    create_frame_layout, create_scene_layout, FrameUniform, KernelPass, ACCUMULATION_BINDING,
    CAMERA_BINDING, FRAME_BINDING, FRAME_GROUP, SCENE_GROUP,
};
use crate::scheduler::FrameDevice;
use crate::sync::{BufferSynchronizer, SceneBindings};

/// Reference trace kernel shipped with the crate.
pub const DEFAULT_KERNEL: &str = include_str!("kernels/trace.wgsl");

/// Bytes per accumulation texel (RGBA f32)
const TEXEL_SIZE: u64 = 16;

struct Pipelines {
    prepare_scene: wgpu::ComputePipeline,
    primary: wgpu::ComputePipeline,
    accumulate: wgpu::ComputePipeline,
}

impl Pipelines {
    fn get(&self, pass: KernelPass) -> &wgpu::ComputePipeline {
        match pass {
            KernelPass::PrepareScene => &self.prepare_scene,
            KernelPass::Primary => &self.primary,
            KernelPass::Accumulate => &self.accumulate,
        }
    }
}

/// Compute pipelines, frame resources and the current scene bindings.
pub struct WgpuFrameDevice {
    context: GpuContext,
    pipelines: Pipelines,
    synchronizer: BufferSynchronizer,
    frame_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    frame_buffer: wgpu::Buffer,
    accumulation: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    scene: Option<SceneBindings>,
    width: u32,
    height: u32,
    acquired: bool,
}

impl WgpuFrameDevice {
    /// Compile `kernel_source` (WGSL) and allocate a `width` x `height`
    /// accumulation image.
    pub fn new(
        context: GpuContext,
        kernel_source: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, ResourceError> {
        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("prism_trace_kernel"),
            source: wgpu::ShaderSource::Wgsl(kernel_source.into()),
        });

        let scene_layout = create_scene_layout(device);
        let frame_layout = create_frame_layout(device);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("prism_trace_pipeline_layout"),
            bind_group_layouts: &[&scene_layout, &frame_layout],
            push_constant_ranges: &[],
        });

        let create = |pass: KernelPass| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(pass.entry_point()),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: pass.entry_point(),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let pipelines = Pipelines {
            prepare_scene: create(KernelPass::PrepareScene),
            primary: create(KernelPass::Primary),
            accumulate: create(KernelPass::Accumulate),
        };

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ResourceError::Device {
                context: "kernel compilation",
                message: error.to_string(),
            });
        }

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prism_camera"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prism_frame"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let accumulation = create_accumulation(device, width, height)?;
        let frame_bind_group = create_frame_bind_group(
            device,
            &frame_layout,
            &camera_buffer,
            &frame_buffer,
            &accumulation,
        );

        log::info!("Trace kernel ready, accumulation image {}x{}", width, height);

        Ok(Self {
            synchronizer: BufferSynchronizer::new(scene_layout),
            context,
            pipelines,
            frame_layout,
            camera_buffer,
            frame_buffer,
            accumulation,
            frame_bind_group,
            scene: None,
            width,
            height,
            acquired: false,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Bindings of the current scene, if one is bound
    pub fn scene_bindings(&self) -> Option<&SceneBindings> {
        self.scene.as_ref()
    }

    /// Copy the accumulation image back to the host, row-major RGBA.
    pub fn read_accumulation(&self) -> Result<Vec<[f32; 4]>, ResourceError> {
        if self.acquired {
            return Err(ResourceError::ImageState("held by a dispatch"));
        }

        let device = &self.context.device;
        let size = self.accumulation.size();

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prism_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("prism_readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.accumulation, 0, &staging, 0, size);
        self.context.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|e| ResourceError::Device {
                context: "readback",
                message: e.to_string(),
            })?
            .map_err(|e| ResourceError::Device {
                context: "readback",
                message: e.to_string(),
            })?;

        let texels = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, [f32; 4]>(&view).to_vec()
        };
        staging.unmap();
        Ok(texels)
    }

    fn submit_pass(
        &self,
        pass: KernelPass,
        scene: &SceneBindings,
        frame: &FrameUniform,
    ) -> Result<(), ResourceError> {
        let device = &self.context.device;
        self.context
            .queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(frame));

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("prism_trace_encoder"),
        });
        {
            let mut compute = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(pass.entry_point()),
                timestamp_writes: None,
            });
            compute.set_pipeline(self.pipelines.get(pass));
            compute.set_bind_group(SCENE_GROUP, &scene.bind_group, &[]);
            compute.set_bind_group(FRAME_GROUP, &self.frame_bind_group, &[]);
            let (x, y, z) = pass.workgroups(frame.width, frame.height);
            compute.dispatch_workgroups(x, y, z);
        }
        self.context.queue.submit(Some(encoder.finish()));

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ResourceError::Device {
                context: "dispatch",
                message: error.to_string(),
            });
        }
        Ok(())
    }

    fn frame_uniform(&self, sample_count: u32, seed: u32) -> FrameUniform {
        FrameUniform {
            width: self.width,
            height: self.height,
            sample_count,
            seed,
        }
    }
}

impl FrameDevice for WgpuFrameDevice {
    fn acquire_image(&mut self) -> Result<(), ResourceError> {
        if self.acquired {
            return Err(ResourceError::ImageState("already acquired"));
        }
        self.acquired = true;
        Ok(())
    }

    fn write_camera(&mut self, camera: &CameraUniform) -> Result<(), ResourceError> {
        self.context
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));
        Ok(())
    }

    fn dispatch(&mut self, pass: KernelPass, frame: &FrameUniform) -> Result<(), ResourceError> {
        let scene = self.scene.as_ref().ok_or(ResourceError::NoScene)?;
        self.submit_pass(pass, scene, frame)
    }

    fn release_image(&mut self) -> Result<(), ResourceError> {
        if !self.acquired {
            return Err(ResourceError::ImageState("not acquired"));
        }
        self.acquired = false;
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<(), ResourceError> {
        self.context.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), ResourceError> {
        if self.acquired {
            return Err(ResourceError::ImageState("held by a dispatch"));
        }
        let device = &self.context.device;
        let accumulation = create_accumulation(device, width, height)?;
        self.frame_bind_group = create_frame_bind_group(
            device,
            &self.frame_layout,
            &self.camera_buffer,
            &self.frame_buffer,
            &accumulation,
        );
        self.accumulation = accumulation;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn bind_scene(&mut self, scene: &CompiledScene, atlas: &TextureAtlas) -> Result<(), ResourceError> {
        if self.acquired {
            return Err(ResourceError::ImageState("held by a dispatch"));
        }

        let bindings =
            self.synchronizer
                .sync(&self.context.device, &self.context.queue, scene, atlas)?;

        // Scene preparation runs on the new bindings before they go live
        let frame = self.frame_uniform(0, 0);
        self.submit_pass(KernelPass::PrepareScene, &bindings, &frame)?;
        self.context.device.poll(wgpu::Maintain::Wait);

        self.scene = Some(bindings);
        Ok(())
    }
}

fn create_accumulation(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> Result<wgpu::Buffer, ResourceError> {
    let size = width as u64 * height as u64 * TEXEL_SIZE;
    let max = (device.limits().max_storage_buffer_binding_size as u64)
        .min(device.limits().max_buffer_size);
    if size > max {
        return Err(ResourceError::BufferTooLarge {
            label: "prism_accumulation",
            size,
            max,
        });
    }

    Ok(device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("prism_accumulation"),
        size: size.max(TEXEL_SIZE),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    }))
}

fn create_frame_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    camera: &wgpu::Buffer,
    frame: &wgpu::Buffer,
    accumulation: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("prism_frame_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: CAMERA_BINDING,
                resource: camera.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: FRAME_BINDING,
                resource: frame.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: ACCUMULATION_BINDING,
                resource: accumulation.as_entire_binding(),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{frame_layout_entries, scene_layout_entries, SCENE_OUTPUT_SIZE, WG_SIZE};
    use prism_scene::types::*;

    fn parse_kernel() -> naga::Module {
        let module = naga::front::wgsl::parse_str(DEFAULT_KERNEL).unwrap();
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .unwrap();
        module
    }

    fn struct_size(module: &naga::Module, layouter: &naga::proc::Layouter, name: &str) -> u64 {
        let (handle, _) = module
            .types
            .iter()
            .find(|(_, ty)| ty.name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("kernel has no struct {name}"));
        layouter[handle].size as u64
    }

    #[test]
    fn test_default_kernel_validates() {
        parse_kernel();
    }

    #[test]
    fn test_kernel_entry_points() {
        let module = parse_kernel();
        for pass in [KernelPass::PrepareScene, KernelPass::Primary, KernelPass::Accumulate] {
            let entry = module
                .entry_points
                .iter()
                .find(|e| e.name == pass.entry_point())
                .unwrap_or_else(|| panic!("missing entry point {}", pass.entry_point()));
            assert_eq!(entry.stage, naga::ShaderStage::Compute);

            let expected = match pass {
                KernelPass::PrepareScene => [1, 1, 1],
                _ => [WG_SIZE, WG_SIZE, 1],
            };
            assert_eq!(entry.workgroup_size, expected);
        }
    }

    #[test]
    fn test_kernel_bindings_match_layouts() {
        let module = parse_kernel();
        let mut bound: Vec<(u32, u32)> = module
            .global_variables
            .iter()
            .filter_map(|(_, var)| var.binding.as_ref())
            .map(|b| (b.group, b.binding))
            .collect();
        bound.sort_unstable();

        let mut expected: Vec<(u32, u32)> = scene_layout_entries()
            .iter()
            .map(|e| (SCENE_GROUP, e.binding))
            .chain(frame_layout_entries().iter().map(|e| (FRAME_GROUP, e.binding)))
            .collect();
        expected.sort_unstable();

        assert_eq!(bound, expected);
    }

    #[test]
    fn test_kernel_structs_match_records() {
        let module = parse_kernel();
        let mut layouter = naga::proc::Layouter::default();
        layouter.update(module.to_ctx()).unwrap();

        let size = |name| struct_size(&module, &layouter, name);
        assert_eq!(size("Material"), std::mem::size_of::<Material>() as u64);
        assert_eq!(size("Sphere"), std::mem::size_of::<Sphere>() as u64);
        assert_eq!(size("Plane"), std::mem::size_of::<Plane>() as u64);
        assert_eq!(size("Lens"), std::mem::size_of::<Lens>() as u64);
        assert_eq!(size("Vertex"), std::mem::size_of::<Vertex>() as u64);
        assert_eq!(size("Mesh"), std::mem::size_of::<Mesh>() as u64);
        assert_eq!(size("Model"), std::mem::size_of::<Model>() as u64);
        assert_eq!(size("ObjectCounter"), std::mem::size_of::<ObjectCounter>() as u64);
        assert_eq!(size("Camera"), std::mem::size_of::<CameraUniform>() as u64);
        assert_eq!(size("Frame"), std::mem::size_of::<FrameUniform>() as u64);
        assert!(size("SceneInfo") <= SCENE_OUTPUT_SIZE);
    }
}
