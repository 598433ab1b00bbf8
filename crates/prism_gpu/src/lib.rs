//! Prism GPU - device buffers and progressive dispatch for the trace kernel.
//!
//! - [`BufferSynchronizer`] uploads a [`prism_scene::CompiledScene`] and its
//!   texture atlas into the kernel's fixed binding slots
//! - [`ProgressiveRenderer`] drives the render / render-again state machine
//!   over any [`FrameDevice`]
//! - [`WgpuFrameDevice`] is the wgpu implementation of that device

pub mod context;
pub mod error;
pub mod kernel;
pub mod layout;
pub mod scheduler;
pub mod sync;

pub use context::{required_limits, GpuContext};
pub use error::{RenderError, RenderResult, ResourceError};
pub use kernel::{WgpuFrameDevice, DEFAULT_KERNEL};
pub use layout::{FrameUniform, KernelPass, SceneSlot};
pub use scheduler::{FrameDevice, FrameInfo, ProgressiveRenderer, RenderState};
pub use sync::{upload_plan, BufferSynchronizer, SceneBindings, SlotUpload};
