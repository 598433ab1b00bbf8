use crate::error::ResourceError;
use crate::layout::STORAGE_BUFFERS_PER_STAGE;

/// Headless wgpu device and queue
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Pick a high-performance adapter and open a device with the limits the
    /// trace kernel needs.
    pub async fn new() -> Result<Self, ResourceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ResourceError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        let required_limits = required_limits(&adapter.limits())?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Prism Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| ResourceError::RequestDevice(e.to_string()))?;

        log::info!(
            "Using GPU adapter: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Blocking wrapper around [`GpuContext::new`].
    pub fn new_blocking() -> Result<Self, ResourceError> {
        pollster::block_on(Self::new())
    }
}

/// Default limits raised to what the binding layout needs, with buffer
/// sizes opened up to whatever the adapter offers.
pub fn required_limits(adapter: &wgpu::Limits) -> Result<wgpu::Limits, ResourceError> {
    if adapter.max_storage_buffers_per_shader_stage < STORAGE_BUFFERS_PER_STAGE {
        return Err(ResourceError::Limit {
            limit: "max_storage_buffers_per_shader_stage",
            required: STORAGE_BUFFERS_PER_STAGE as u64,
            available: adapter.max_storage_buffers_per_shader_stage as u64,
        });
    }

    Ok(wgpu::Limits {
        max_storage_buffers_per_shader_stage: STORAGE_BUFFERS_PER_STAGE,
        max_storage_buffer_binding_size: adapter.max_storage_buffer_binding_size,
        max_buffer_size: adapter.max_buffer_size,
        max_texture_dimension_2d: adapter.max_texture_dimension_2d,
        max_texture_array_layers: adapter.max_texture_array_layers,
        ..wgpu::Limits::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_limits_raise_storage_buffers() {
        let adapter = wgpu::Limits {
            max_storage_buffers_per_shader_stage: 16,
            max_buffer_size: 1 << 32,
            ..wgpu::Limits::default()
        };
        let limits = required_limits(&adapter).unwrap();
        assert_eq!(limits.max_storage_buffers_per_shader_stage, 11);
        assert_eq!(limits.max_buffer_size, 1 << 32);
    }

    #[test]
    fn test_required_limits_reject_small_adapters() {
        let adapter = wgpu::Limits::downlevel_defaults();
        let err = required_limits(&adapter).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::Limit {
                required: 11,
                available: 4,
                ..
            }
        ));
    }
}
