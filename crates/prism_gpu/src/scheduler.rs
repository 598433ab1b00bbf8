//! Progressive render scheduler.
//!
//! Drives one synchronous dispatch per frame and tracks how many samples
//! the accumulation image holds. The first frame after any invalidation
//! (camera move, resize, scene reload) overwrites the image; every later
//! frame with an unchanged camera blends one more sample in.
//!
//! Frame sequence: acquire image, upload camera, dispatch, release image,
//! wait for the device. Dispatches never overlap.

use prism_math::CameraUniform;
use prism_scene::{CompiledScene, TextureAtlas};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{RenderError, RenderResult, ResourceError};
use crate::layout::{FrameUniform, KernelPass};

/// Device operations the scheduler needs.
pub trait FrameDevice {
    /// Take ownership of the shared accumulation image.
    fn acquire_image(&mut self) -> Result<(), ResourceError>;

    fn write_camera(&mut self, camera: &CameraUniform) -> Result<(), ResourceError>;

    fn dispatch(&mut self, pass: KernelPass, frame: &FrameUniform) -> Result<(), ResourceError>;

    /// Hand the image back to the display side.
    fn release_image(&mut self) -> Result<(), ResourceError>;

    /// Block until all submitted work has finished.
    fn wait_idle(&mut self) -> Result<(), ResourceError>;

    /// Reallocate the accumulation image.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), ResourceError>;

    /// Replace the scene bindings. Runs the scene preparation pass.
    fn bind_scene(&mut self, scene: &CompiledScene, atlas: &TextureAtlas) -> Result<(), ResourceError>;
}

/// Accumulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Next frame must be a primary frame
    Idle,
    /// The image holds `samples + 1` blended samples
    Accumulating { samples: u32 },
}

/// What a call to the scheduler dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub pass: KernelPass,
    pub sample_count: u32,
}

pub struct ProgressiveRenderer<D: FrameDevice> {
    device: D,
    state: RenderState,
    width: u32,
    height: u32,
    last_camera: Option<CameraUniform>,
    scene_bound: bool,
    rng: StdRng,
}

impl<D: FrameDevice> ProgressiveRenderer<D> {
    /// Wrap a device already sized to `width` x `height`.
    pub fn new(device: D, width: u32, height: u32) -> Self {
        Self {
            device,
            state: RenderState::Idle,
            width,
            height,
            last_camera: None,
            scene_bound: false,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Samples blended so far, or `None` when idle
    pub fn sample_count(&self) -> Option<u32> {
        match self.state {
            RenderState::Idle => None,
            RenderState::Accumulating { samples } => Some(samples),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Force the next frame to restart accumulation.
    pub fn invalidate(&mut self) {
        if self.state != RenderState::Idle {
            log::debug!("Accumulation invalidated");
        }
        self.state = RenderState::Idle;
    }

    /// Upload a new scene. Must not be called while a frame is in flight,
    /// which the synchronous frame sequence guarantees.
    pub fn reload_scene(&mut self, scene: &CompiledScene, atlas: &TextureAtlas) -> RenderResult<()> {
        self.invalidate();
        match self.device.bind_scene(scene, atlas) {
            Ok(()) => {
                self.scene_bound = true;
                Ok(())
            }
            Err(e) => {
                log::error!("Scene upload failed: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        self.invalidate();
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.device.resize(width, height)?;
        self.width = width;
        self.height = height;
        log::debug!("Resized accumulation image to {}x{}", width, height);
        Ok(())
    }

    /// Restart accumulation with a fresh sample.
    pub fn render(&mut self, camera: &CameraUniform) -> RenderResult<FrameInfo> {
        self.run_frame(KernelPass::Primary, 0, camera)
    }

    /// Blend one more sample into the current image.
    pub fn render_again(&mut self, camera: &CameraUniform) -> RenderResult<FrameInfo> {
        let RenderState::Accumulating { samples } = self.state else {
            return Err(RenderError::NotAccumulating);
        };
        if self.last_camera.as_ref() != Some(camera) {
            return Err(RenderError::CameraChanged);
        }
        self.run_frame(KernelPass::Accumulate, samples + 1, camera)
    }

    /// `render_again` when the camera is unchanged and accumulation is
    /// live, `render` otherwise.
    pub fn render_frame(&mut self, camera: &CameraUniform) -> RenderResult<FrameInfo> {
        let unchanged = self.last_camera.as_ref() == Some(camera);
        match self.state {
            RenderState::Accumulating { .. } if unchanged => self.render_again(camera),
            _ => self.render(camera),
        }
    }

    fn run_frame(
        &mut self,
        pass: KernelPass,
        sample_count: u32,
        camera: &CameraUniform,
    ) -> RenderResult<FrameInfo> {
        if !self.scene_bound {
            return Err(ResourceError::NoScene.into());
        }

        let frame = FrameUniform {
            width: self.width,
            height: self.height,
            sample_count,
            seed: self.rng.gen(),
        };

        // Any device failure drops accumulation; no retry
        self.state = RenderState::Idle;
        self.submit(pass, &frame, camera)?;

        self.state = RenderState::Accumulating {
            samples: sample_count,
        };
        self.last_camera = Some(*camera);
        Ok(FrameInfo { pass, sample_count })
    }

    fn submit(
        &mut self,
        pass: KernelPass,
        frame: &FrameUniform,
        camera: &CameraUniform,
    ) -> Result<(), ResourceError> {
        self.device.acquire_image()?;

        let dispatched = self
            .device
            .write_camera(camera)
            .and_then(|()| self.device.dispatch(pass, frame));

        // Always hand the image back, even after a failed dispatch
        let released = self.device.release_image();
        if let (Err(_), Err(release_error)) = (&dispatched, &released) {
            log::warn!("Releasing shared image after failed dispatch: {}", release_error);
        }
        dispatched?;
        released?;

        self.device.wait_idle()
    }
}
