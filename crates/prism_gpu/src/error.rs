use thiserror::Error;

/// Device-side failures: adapter selection, allocation, validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    RequestDevice(String),

    #[error("Adapter limit {limit} is {available}, need at least {required}")]
    Limit {
        limit: &'static str,
        required: u64,
        available: u64,
    },

    #[error("Buffer '{label}' needs {size} bytes, device allows {max}")]
    BufferTooLarge {
        label: &'static str,
        size: u64,
        max: u64,
    },

    #[error("Texture atlas {width}x{height}x{layers} exceeds device limits")]
    AtlasTooLarge { width: u32, height: u32, layers: u32 },

    #[error("GPU error during {context}: {message}")]
    Device {
        context: &'static str,
        message: String,
    },

    #[error("Shared image is {0}")]
    ImageState(&'static str),

    #[error("No scene is bound")]
    NoScene,
}

/// Scheduler failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("render_again requires an accumulating frame; call render first")]
    NotAccumulating,

    #[error("Camera changed since the last frame; call render to restart accumulation")]
    CameraChanged,

    #[error("Render size must be non-zero, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

pub type RenderResult<T> = Result<T, RenderError>;
