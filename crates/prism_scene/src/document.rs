//! Scene document parser.
//!
//! Scene files are line oriented. `#` starts a comment, blank lines are
//! ignored, and a header line (`MATERIALS:`, `SPHERES:`, `PLANES:`,
//! `LENSES:`, `MODELS:`) switches the current section.
//!
//! # Records
//!
//! ```text
//! MATERIALS:
//!     diffuse, (1, 0, 0), 0.5          # kind, colour, extra data
//! SPHERES:
//!     (0, 0, 3), 1.5, 0                # centre, radius, material
//! PLANES:
//!     (0, 1, 0), (0, -1, 0), 0         # point, normal, material
//! LENSES:
//!     (0, 0, 5), (0, 0, 1), 2, 2, 1, 0 # centre, axis, r1, r2, aperture height, material
//! MODELS:
//!     translate: (0, 0, 10)
//!     rotate: 90, (0, 1, 0)
//!     scale: (2, 2, 2)
//!     load: "models/teapot.obj", 0
//! ```
//!
//! Fields are separated by commas, except commas inside a vector literal or
//! a quoted path.

use std::path::PathBuf;

use prism_math::Vec3;
use thiserror::Error;

use crate::types::MaterialKind;

/// Errors raised while tokenizing a scene document.
///
/// Lines and fields are 1-based.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}, field {field}: {message}")]
    Field {
        line: usize,
        field: usize,
        message: String,
    },

    #[error("line {line}: expected {expected} fields, found {found}")]
    Arity {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: {message}")]
    Line { line: usize, message: String },
}

impl ParseError {
    /// Line the error points at.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Field { line, .. }
            | ParseError::Arity { line, .. }
            | ParseError::Line { line, .. } => *line,
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Section headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Materials,
    Spheres,
    Planes,
    Lenses,
    Models,
}

impl Section {
    fn from_header(name: &str) -> Option<Self> {
        match name {
            "MATERIALS" => Some(Section::Materials),
            "SPHERES" => Some(Section::Spheres),
            "PLANES" => Some(Section::Planes),
            "LENSES" => Some(Section::Lenses),
            "MODELS" => Some(Section::Models),
            _ => None,
        }
    }
}

/// One typed scene statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Material {
        kind: MaterialKind,
        color: Vec3,
        extra_data: f32,
    },
    Sphere {
        center: Vec3,
        radius: f32,
        material_id: u32,
    },
    Plane {
        point: Vec3,
        normal: Vec3,
        material_id: u32,
    },
    Lens {
        center: Vec3,
        axis: Vec3,
        r1: f32,
        r2: f32,
        aperture_height: f32,
        material_id: u32,
    },
    Translate(Vec3),
    Rotate { degrees: f32, axis: Vec3 },
    Scale(Vec3),
    Load { path: PathBuf, material_id: u32 },
}

/// A statement together with the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub line: usize,
    pub statement: Statement,
}

/// Parsed scene document, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDocument {
    pub records: Vec<Record>,
}

impl SceneDocument {
    /// Parse a whole document.
    pub fn parse(content: &str) -> ParseResult<Self> {
        let mut records = Vec::new();
        let mut section: Option<Section> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = index + 1;
            let text = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            if text.trim().is_empty() {
                continue;
            }

            if let Some((key, rest)) = split_key(text) {
                if let Some(next) = Section::from_header(key) {
                    if !rest.trim().is_empty() {
                        return Err(ParseError::Line {
                            line,
                            message: format!("unexpected text after section header {key}"),
                        });
                    }
                    section = Some(next);
                    continue;
                }

                if section != Some(Section::Models) {
                    return Err(ParseError::Line {
                        line,
                        message: format!("operation '{key}' does not exist"),
                    });
                }

                let fields = split_fields(rest);
                let statement = parse_operation(line, key, &fields)?;
                records.push(Record { line, statement });
                continue;
            }

            let fields = split_fields(text);
            let statement = match section {
                Some(Section::Materials) => parse_material(line, &fields)?,
                Some(Section::Spheres) => parse_sphere(line, &fields)?,
                Some(Section::Planes) => parse_plane(line, &fields)?,
                Some(Section::Lenses) => parse_lens(line, &fields)?,
                Some(Section::Models) => {
                    return Err(ParseError::Line {
                        line,
                        message: "expected 'translate:', 'rotate:', 'scale:' or 'load:'".into(),
                    })
                }
                None => {
                    return Err(ParseError::Line {
                        line,
                        message: "record appears before any section header".into(),
                    })
                }
            };
            records.push(Record { line, statement });
        }

        log::debug!("Parsed scene document: {} records", records.len());
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split `key: rest` when the colon comes before any literal.
fn split_key(text: &str) -> Option<(&str, &str)> {
    let pos = text.find(':')?;
    let key = &text[..pos];
    if key.contains(['(', '"']) {
        return None;
    }
    Some((key.trim(), &text[pos + 1..]))
}

/// Split on commas that are outside parentheses and quotes.
fn split_fields(text: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                fields.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(text[start..].trim());
    fields
}

fn expect_arity(line: usize, fields: &[&str], expected: usize) -> ParseResult<()> {
    if fields.len() != expected {
        return Err(ParseError::Arity {
            line,
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn parse_material(line: usize, fields: &[&str]) -> ParseResult<Statement> {
    expect_arity(line, fields, 3)?;
    let kind = MaterialKind::from_name(fields[0]).ok_or_else(|| ParseError::Field {
        line,
        field: 1,
        message: format!("material '{}' does not exist", fields[0]),
    })?;
    Ok(Statement::Material {
        kind,
        color: field(line, 2, fields[1], parse_vec3)?,
        extra_data: field(line, 3, fields[2], parse_float)?,
    })
}

fn parse_sphere(line: usize, fields: &[&str]) -> ParseResult<Statement> {
    expect_arity(line, fields, 3)?;
    Ok(Statement::Sphere {
        center: field(line, 1, fields[0], parse_vec3)?,
        radius: field(line, 2, fields[1], parse_float)?,
        material_id: field(line, 3, fields[2], parse_uint)?,
    })
}

fn parse_plane(line: usize, fields: &[&str]) -> ParseResult<Statement> {
    expect_arity(line, fields, 3)?;
    Ok(Statement::Plane {
        point: field(line, 1, fields[0], parse_vec3)?,
        normal: field(line, 2, fields[1], parse_vec3)?,
        material_id: field(line, 3, fields[2], parse_uint)?,
    })
}

fn parse_lens(line: usize, fields: &[&str]) -> ParseResult<Statement> {
    expect_arity(line, fields, 6)?;
    Ok(Statement::Lens {
        center: field(line, 1, fields[0], parse_vec3)?,
        axis: field(line, 2, fields[1], parse_vec3)?,
        r1: field(line, 3, fields[2], parse_float)?,
        r2: field(line, 4, fields[3], parse_float)?,
        aperture_height: field(line, 5, fields[4], parse_float)?,
        material_id: field(line, 6, fields[5], parse_uint)?,
    })
}

fn parse_operation(line: usize, key: &str, fields: &[&str]) -> ParseResult<Statement> {
    match key {
        "translate" => {
            expect_arity(line, fields, 1)?;
            Ok(Statement::Translate(field(line, 1, fields[0], parse_vec3)?))
        }
        "rotate" => {
            expect_arity(line, fields, 2)?;
            let degrees = field(line, 1, fields[0], parse_float)?;
            let axis = field(line, 2, fields[1], parse_vec3)?;
            if axis == Vec3::ZERO {
                return Err(ParseError::Field {
                    line,
                    field: 2,
                    message: "rotation axis must not be zero".into(),
                });
            }
            Ok(Statement::Rotate { degrees, axis })
        }
        "scale" => {
            expect_arity(line, fields, 1)?;
            Ok(Statement::Scale(field(line, 1, fields[0], parse_vec3)?))
        }
        "load" => {
            expect_arity(line, fields, 2)?;
            Ok(Statement::Load {
                path: field(line, 1, fields[0], parse_path)?,
                material_id: field(line, 2, fields[1], parse_uint)?,
            })
        }
        other => Err(ParseError::Line {
            line,
            message: format!("operation '{other}' does not exist"),
        }),
    }
}

/// Run a field parser and attach the position on failure.
fn field<T>(
    line: usize,
    index: usize,
    text: &str,
    parse: fn(&str) -> Result<T, String>,
) -> ParseResult<T> {
    parse(text).map_err(|message| ParseError::Field {
        line,
        field: index,
        message,
    })
}

/// Decimal float: optional sign, digits, optional `.digits`. No exponent.
fn parse_float(text: &str) -> Result<f32, String> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let digits_ok = int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));
    let has_digit = !int_part.is_empty() || frac_part.is_some();

    if !digits_ok || !has_digit {
        return Err(format!("improper float '{text}'"));
    }
    text.parse::<f32>()
        .map_err(|_| format!("improper float '{text}'"))
        .and_then(|v| {
            if v.is_finite() {
                Ok(v)
            } else {
                Err(format!("float '{text}' is out of range"))
            }
        })
}

fn parse_uint(text: &str) -> Result<u32, String> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("improper unsigned integer '{text}'"));
    }
    text.parse::<u32>()
        .map_err(|_| format!("unsigned integer '{text}' is out of range"))
}

fn parse_vec3(text: &str) -> Result<Vec3, String> {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| format!("improper vector '{text}'"))?;

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!(
            "improper vector '{text}': expected 3 components, found {}",
            parts.len()
        ));
    }

    let mut out = [0.0f32; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = parse_float(part).map_err(|e| format!("improper vector '{text}': {e}"))?;
    }
    Ok(Vec3::from_array(out))
}

fn parse_path(text: &str) -> Result<PathBuf, String> {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .filter(|t| !t.is_empty() && !t.contains('"'))
        .ok_or_else(|| format!("improper path '{text}'"))?;
    Ok(PathBuf::from(inner))
}
