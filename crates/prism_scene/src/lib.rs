//! Prism Scene - scene description compiler for the progressive ray tracer.
//!
//! This crate provides:
//!
//! - **Scene documents**: line-oriented scene files parsed into typed records
//! - **Compiler**: flattens primitives and imported meshes into GPU-ready arrays
//! - **Import**: the mesh-import contract and an OBJ importer
//! - **Textures**: image loading and the layered texture atlas
//!
//! # Example
//!
//! ```ignore
//! use prism_scene::{load_scene, ObjImporter, ImageTextureLoader};
//!
//! let loaded = load_scene("scenes/room.scene", &ObjImporter, &ImageTextureLoader)?;
//! println!("{} spheres, {} triangles",
//!     loaded.scene.spheres().len(),
//!     loaded.scene.triangle_count());
//! ```

use std::path::{Path, PathBuf};

use prism_math::ModelTransform;
use thiserror::Error;

pub mod compiler;
pub mod document;
pub mod import;
pub mod texture;
pub mod types;

// Re-export commonly used types
pub use compiler::{CompileError, CompileResult, CompiledScene, SceneCompiler};
pub use document::{ParseError, ParseResult, Record, SceneDocument, Section, Statement};
pub use import::{
    AssetImporter, ImportError, ImportNode, ImportedAsset, ImportedMesh, MemoryImporter,
    ObjImporter,
};
pub use texture::{
    ImageTextureLoader, MemoryTextures, TextureAtlas, TextureError, TextureImage, TextureSource,
};
pub use types::*;

/// Any failure while turning a scene file into compiled arrays.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Failed to read scene {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(
        "line {line}{}: {source}",
        .field.map(|f| format!(", field {f}")).unwrap_or_default()
    )]
    Record {
        line: usize,
        /// 1-based field the error refers to, when it names one
        field: Option<usize>,
        #[source]
        source: CompileError,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Texture(#[from] TextureError),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Compiled arrays together with the atlas built from their textures.
#[derive(Debug, Clone)]
pub struct LoadedScene {
    pub scene: CompiledScene,
    pub atlas: TextureAtlas,
}

/// Apply a parsed document to `compiler` in file order.
///
/// `load:` paths are resolved relative to `base_dir`. Model operations
/// accumulate into one transform that each `load` consumes.
pub fn compile_document(
    compiler: &mut SceneCompiler,
    document: &SceneDocument,
    base_dir: &Path,
    importer: &dyn AssetImporter,
) -> SceneResult<()> {
    let mut transform = ModelTransform::new();

    for record in &document.records {
        let result = match &record.statement {
            Statement::Material {
                kind,
                color,
                extra_data,
            } => {
                compiler.add_material(*kind, *color, *extra_data);
                Ok(())
            }
            Statement::Sphere {
                center,
                radius,
                material_id,
            } => compiler.add_sphere(*center, *radius, *material_id),
            Statement::Plane {
                point,
                normal,
                material_id,
            } => compiler.add_plane(*point, *normal, *material_id),
            Statement::Lens {
                center,
                axis,
                r1,
                r2,
                aperture_height,
                material_id,
            } => compiler.add_lens(*center, *axis, *r1, *r2, *aperture_height, *material_id),
            Statement::Translate(offset) => {
                transform.translate(*offset);
                Ok(())
            }
            Statement::Rotate { degrees, axis } => {
                transform.rotate(*degrees, *axis);
                Ok(())
            }
            Statement::Scale(factors) => {
                transform.scale(*factors);
                Ok(())
            }
            Statement::Load { path, material_id } => {
                let path = resolve_path(base_dir, path);
                compiler.load_model_from(importer, &path, *material_id, transform.take())
            }
        };

        result.map_err(|source| SceneError::Record {
            line: record.line,
            field: failing_field(&record.statement, &source),
            source,
        })?;
    }

    Ok(())
}

/// Parse and compile scene text. Textures are not loaded.
pub fn compile_str(
    content: &str,
    base_dir: &Path,
    importer: &dyn AssetImporter,
) -> SceneResult<CompiledScene> {
    let document = SceneDocument::parse(content)?;
    let mut compiler = SceneCompiler::new();
    compile_document(&mut compiler, &document, base_dir, importer)?;
    Ok(compiler.finish())
}

/// Read, compile and build the texture atlas for a scene file.
pub fn load_scene(
    path: impl AsRef<Path>,
    importer: &dyn AssetImporter,
    textures: &dyn TextureSource,
) -> SceneResult<LoadedScene> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Loading scene: {}", path.display());
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let scene = compile_str(&content, base_dir, importer)?;
    let atlas = TextureAtlas::build(scene.texture_paths(), textures)?;

    Ok(LoadedScene { scene, atlas })
}

/// Field of `statement` that caused a compile error.
fn failing_field(statement: &Statement, error: &CompileError) -> Option<usize> {
    match (statement, error) {
        (Statement::Sphere { .. } | Statement::Plane { .. }, CompileError::MissingMaterial { .. }) => {
            Some(3)
        }
        (Statement::Lens { .. }, CompileError::MissingMaterial { .. }) => Some(6),
        (
            Statement::Lens { .. },
            CompileError::LensAperture {
                r1,
                r2,
                aperture_height,
            },
        ) => {
            if *aperture_height < 0.0 {
                Some(5)
            } else if r1 < aperture_height {
                Some(3)
            } else if r2 < aperture_height {
                Some(4)
            } else {
                Some(5)
            }
        }
        (Statement::Load { .. }, CompileError::MissingMaterial { .. }) => Some(2),
        (Statement::Load { .. }, CompileError::Overflow(_)) => None,
        (Statement::Load { .. }, _) => Some(1),
        _ => None,
    }
}

/// Resolve a path relative to the base directory.
fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
