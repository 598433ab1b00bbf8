use bytemuck::{Pod, Zeroable};
use glam::Vec3;

const SPEED_SLOW: f32 = 0.3;
const SPEED_NORMAL: f32 = 1.0;
const SPEED_FAST: f32 = 5.0;
const MOUSE_SENSITIVITY: f32 = 0.2;
const FOV_MIN: f32 = 10.0;
const FOV_MAX: f32 = 90.0;
const ZOOM_SPEED: f32 = 0.5;
const PITCH_LIMIT: f32 = 89.0;

/// World up used to build the camera basis. Image rows grow downward in the
/// accumulation buffer, so "up" points along -Y.
const WORLD_UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Direction for keyboard-style camera movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Back,
    Left,
    Right,
}

/// Movement speed preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSpeed {
    Slow,
    Normal,
    Fast,
}

impl CameraSpeed {
    fn units_per_second(self) -> f32 {
        match self {
            CameraSpeed::Slow => SPEED_SLOW,
            CameraSpeed::Normal => SPEED_NORMAL,
            CameraSpeed::Fast => SPEED_FAST,
        }
    }
}

/// Camera parameters as the trace kernel reads them.
///
/// `lower_left_corner`, `horizontal` and `vertical` span the image plane one
/// unit in front of `position`; a primary ray through pixel `(s, t)` has
/// direction `lower_left_corner + s * horizontal + t * vertical`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub position: [f32; 4],
    pub lower_left_corner: [f32; 4],
    pub horizontal: [f32; 4],
    pub vertical: [f32; 4],
}

/// Yaw/pitch fly camera for progressive rendering
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Degrees, wrapped into (-360, 360)
    yaw: f32,
    /// Degrees, clamped to +-89
    pitch: f32,
    /// Vertical field of view in degrees
    fov: f32,
    aspect: f32,
    speed: CameraSpeed,
}

impl Camera {
    /// Create a camera looking along +Z when yaw and pitch are zero
    pub fn new(fov_degrees: f32, aspect: f32, position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw: yaw % 360.0,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            fov: fov_degrees.clamp(FOV_MIN, FOV_MAX),
            aspect,
            speed: CameraSpeed::Slow,
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn speed(&self) -> CameraSpeed {
        self.speed
    }

    /// Unit view direction
    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(pitch.cos() * yaw.sin(), pitch.sin(), pitch.cos() * yaw.cos()).normalize()
    }

    /// Orthonormal basis (right, up, forward)
    fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let w = self.forward();
        let u = w.cross(WORLD_UP).normalize();
        let v = u.cross(w);
        (u, v, w)
    }

    /// Move along the view basis; distance is `speed * dt`
    pub fn move_in(&mut self, direction: MoveDirection, dt: f32) {
        let ds = self.speed.units_per_second() * dt;
        let (u, _, w) = self.basis();
        match direction {
            MoveDirection::Forward => self.position += w * ds,
            MoveDirection::Back => self.position -= w * ds,
            MoveDirection::Left => self.position -= u * ds,
            MoveDirection::Right => self.position += u * ds,
        }
    }

    /// Mouse-look. Sensitivity scales with the field of view so a zoomed-in
    /// camera turns slower.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let scale = MOUSE_SENSITIVITY * self.fov / FOV_MIN;
        self.yaw = (self.yaw + dx * scale) % 360.0;
        self.pitch = (self.pitch + dy * scale).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Scroll zoom, clamped to the allowed field of view range
    pub fn zoom(&mut self, scroll: f32) {
        self.fov = (self.fov + scroll * ZOOM_SPEED).clamp(FOV_MIN, FOV_MAX);
    }

    /// Update aspect ratio (e.g., on resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Hold-to-speed-up modifier
    pub fn set_faster_speed(&mut self, speed_up: bool) {
        self.speed = if speed_up { CameraSpeed::Fast } else { CameraSpeed::Normal };
    }

    /// Hold-to-slow-down modifier
    pub fn set_slower_speed(&mut self, slow_down: bool) {
        self.speed = if slow_down { CameraSpeed::Slow } else { CameraSpeed::Normal };
    }

    /// Snapshot of the image plane for upload
    pub fn uniform(&self) -> CameraUniform {
        let half_height = (self.fov.to_radians() * 0.5).tan();
        let half_width = self.aspect * half_height;
        let (u, v, w) = self.basis();

        let lower_left_corner = w - (half_width * u + half_height * v);
        let horizontal = 2.0 * half_width * u;
        let vertical = 2.0 * half_height * v;

        CameraUniform {
            position: self.position.extend(0.0).to_array(),
            lower_left_corner: lower_left_corner.extend(0.0).to_array(),
            horizontal: horizontal.extend(0.0).to_array(),
            vertical: vertical.extend(0.0).to_array(),
        }
    }
}
