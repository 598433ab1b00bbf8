mod output;
mod settings;

use std::env;
use std::time::Instant;

use anyhow::{Context, Result};
use prism_gpu::{GpuContext, ProgressiveRenderer, WgpuFrameDevice, DEFAULT_KERNEL};
use prism_scene::{load_scene, ImageTextureLoader, LoadedScene, ObjImporter};

use settings::{Args, RenderSettings};

const USAGE: &str = "\
Usage: prism <scene-file> [options]

Options:
  --config FILE     JSON render settings
  --samples N, -n   samples to accumulate
  --output FILE, -o PNG to write
  --check           compile the scene and print statistics only";

fn print_stats(loaded: &LoadedScene) {
    let scene = &loaded.scene;
    println!("Materials: {}", scene.materials().len());
    println!("Spheres:   {}", scene.spheres().len());
    println!("Planes:    {}", scene.planes().len());
    println!("Lenses:    {}", scene.lenses().len());
    println!(
        "Models:    {} ({} meshes, {} vertices, {} triangles)",
        scene.models().len(),
        scene.meshes().len(),
        scene.vertices().len(),
        scene.triangle_count()
    );
    if loaded.atlas.is_placeholder() {
        println!("Textures:  none");
    } else {
        println!(
            "Textures:  {} layers of {}x{} ({:.1} MB)",
            loaded.atlas.layers,
            loaded.atlas.width,
            loaded.atlas.height,
            loaded.atlas.size_bytes() as f32 / (1024.0 * 1024.0)
        );
    }
}

fn render(loaded: &LoadedScene, settings: &RenderSettings) -> Result<()> {
    let kernel = match &settings.kernel {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read kernel {}", path.display()))?,
        None => DEFAULT_KERNEL.to_string(),
    };

    let context = GpuContext::new_blocking()?;
    let device = WgpuFrameDevice::new(context, &kernel, settings.width, settings.height)?;
    let mut renderer = ProgressiveRenderer::new(device, settings.width, settings.height);
    renderer.reload_scene(&loaded.scene, &loaded.atlas)?;

    let camera = settings.camera().uniform();
    let start = Instant::now();
    for _ in 0..settings.samples {
        renderer.render_frame(&camera)?;
    }
    log::info!(
        "Rendered {} samples at {}x{} in {:.2}s",
        settings.samples,
        settings.width,
        settings.height,
        start.elapsed().as_secs_f32()
    );

    let texels = renderer.device().read_accumulation()?;
    output::save_png(&settings.output, settings.width, settings.height, &texels)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let raw: Vec<String> = env::args().skip(1).collect();
    if raw.is_empty() || raw.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let args = Args::parse(raw)?;
    let settings = args.settings()?;

    let loaded = load_scene(&args.scene, &ObjImporter, &ImageTextureLoader)
        .with_context(|| format!("Failed to load {}", args.scene.display()))?;

    if args.check {
        print_stats(&loaded);
        return Ok(());
    }

    render(&loaded, &settings)
}
