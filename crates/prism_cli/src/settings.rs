use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use prism_math::{Camera, Vec3};
use serde::{Deserialize, Serialize};

/// Settings file contents. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    /// WGSL kernel to load instead of the built-in one
    pub kernel: Option<PathBuf>,
    pub camera: CameraSettings,
    pub output: PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            samples: 64,
            kernel: None,
            camera: CameraSettings::default(),
            output: PathBuf::from("render.png"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            yaw: 0.0,
            pitch: 0.0,
            fov: 60.0,
        }
    }
}

impl RenderSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("Image size must be non-zero, got {}x{}", self.width, self.height);
        }
        if self.samples == 0 {
            bail!("Sample count must be at least 1");
        }
        Ok(())
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn camera(&self) -> Camera {
        Camera::new(
            self.camera.fov,
            self.aspect(),
            Vec3::from(self.camera.position),
            self.camera.yaw,
            self.camera.pitch,
        )
    }
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args {
    pub scene: PathBuf,
    pub config: Option<PathBuf>,
    pub samples: Option<u32>,
    pub output: Option<PathBuf>,
    pub check: bool,
}

impl Args {
    /// Parse everything after the program name.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut scene = None;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--check" => parsed.check = true,
                "--config" => parsed.config = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--output" | "-o" => parsed.output = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--samples" | "-n" => {
                    let raw = value(&mut args, &arg)?;
                    let samples = raw
                        .parse()
                        .with_context(|| format!("Invalid sample count '{}'", raw))?;
                    parsed.samples = Some(samples);
                }
                flag if flag.starts_with('-') => bail!("Unknown option '{}'", flag),
                _ if scene.is_some() => bail!("Unexpected argument '{}'", arg),
                _ => scene = Some(PathBuf::from(arg)),
            }
        }

        parsed.scene = scene.context("Missing scene file")?;
        Ok(parsed)
    }

    /// Settings file (or defaults) with command-line overrides applied.
    pub fn settings(&self) -> Result<RenderSettings> {
        let mut settings = match &self.config {
            Some(path) => RenderSettings::load(path)?,
            None => RenderSettings::default(),
        };
        if let Some(samples) = self.samples {
            settings.samples = samples;
        }
        if let Some(output) = &self.output {
            settings.output = output.clone();
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .with_context(|| format!("Option '{}' needs a value", flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        Args::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_empty_settings_file_uses_defaults() {
        let settings: RenderSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn test_partial_settings() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{"width": 320, "camera": {"fov": 45.0}}"#).unwrap();
        assert_eq!(settings.width, 320);
        assert_eq!(settings.height, 800);
        assert_eq!(settings.camera.fov, 45.0);
        assert_eq!(settings.camera.position, [0.0; 3]);
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let settings = RenderSettings {
            height: 0,
            ..RenderSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_camera_from_settings() {
        let settings = RenderSettings {
            width: 400,
            height: 200,
            ..RenderSettings::default()
        };
        let camera = settings.camera();
        assert_eq!(camera.aspect(), 2.0);
        assert_eq!(camera.fov(), 60.0);
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["room.scene", "--samples", "16", "-o", "out.png", "--check"]).unwrap();
        assert_eq!(parsed.scene, PathBuf::from("room.scene"));
        assert_eq!(parsed.samples, Some(16));
        assert_eq!(parsed.output, Some(PathBuf::from("out.png")));
        assert!(parsed.check);
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.scene", "b.scene"]).is_err());
        assert!(args(&["a.scene", "--samples"]).is_err());
        assert!(args(&["a.scene", "--samples", "many"]).is_err());
        assert!(args(&["a.scene", "--fast"]).is_err());
    }

    #[test]
    fn test_overrides_apply_over_defaults() {
        let parsed = args(&["a.scene", "--samples", "3", "--output", "x.png"]).unwrap();
        let settings = parsed.settings().unwrap();
        assert_eq!(settings.samples, 3);
        assert_eq!(settings.output, PathBuf::from("x.png"));
        assert_eq!(settings.width, 1200);
    }

    #[test]
    fn test_zero_samples_override_rejected() {
        let parsed = args(&["a.scene", "--samples", "0"]).unwrap();
        assert!(parsed.settings().is_err());
    }
}
