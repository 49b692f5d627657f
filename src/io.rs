//! Project snapshot persistence and catalog loading.
//!
//! Snapshots are a versioned bincode container (`.sfe`) holding the canvas
//! as a PNG-compressed pixel layer plus the active-palette references
//! (code, symbol, lock). The container stores palette *references*, not
//! colors: on load, each code is resolved against the master catalog and
//! entries whose code no longer exists are dropped silently.

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::canvas::CanvasState;
use crate::config::EditorConfig;
use crate::error::EditError;
use crate::log_warn;
use crate::palette::{ActivePalette, ThreadColor, code_eq, parse_catalog};
use crate::project::Project;

const SFE_MAGIC_V1: &str = "SFE1";

/// Upper bound on snapshot dimensions, independent of session config.
/// Prevents memory exhaustion from crafted project files.
const SNAPSHOT_MAX_DIM: u32 = 32_768;

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Error type for SFE file operations.
#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
    Image(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "I/O error: {}", e),
            SnapshotError::Serialize(e) => write!(f, "Serialization error: {}", e),
            SnapshotError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
            SnapshotError::Image(e) => write!(f, "Image codec error: {}", e),
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SnapshotError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SnapshotError::Serialize(e.to_string())
    }
}

impl From<image::ImageError> for SnapshotError {
    fn from(e: image::ImageError) -> Self {
        SnapshotError::Image(e.to_string())
    }
}

impl From<SnapshotError> for EditError {
    fn from(e: SnapshotError) -> Self {
        EditError::Data(e.to_string())
    }
}

// ============================================================================
// FILE FORMAT (v1)
// ============================================================================

/// Active-palette reference as persisted: the catalog supplies the color.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PaletteEntryV1 {
    pub code: String,
    pub symbol: Option<String>,
    pub locked: bool,
}

/// Serializable SFE v1 project snapshot.
#[derive(Serialize, Deserialize, Clone)]
pub struct ProjectFileV1 {
    /// Always [`SFE_MAGIC_V1`]. bincode writes the string's length prefix
    /// first, which is how `load_sfe` sniffs the version without a full
    /// deserialize.
    pub magic: String,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixel layer, `width × height`.
    pub pixel_png: Vec<u8>,
    pub palette: Vec<PaletteEntryV1>,
    /// Opaque reference-image payload; never interpreted by the engine.
    pub reference_png: Option<Vec<u8>>,
    pub reference_opacity: f32,
    pub reference_visible: bool,
    pub pixel_layer_opacity: f32,
}

// ============================================================================
// SNAPSHOT BUILD / ENCODE
// ============================================================================

/// Capture a project into its serializable snapshot. The snapshot owns
/// copies of everything; later edits never show through.
pub fn build_sfe_v1(project: &Project) -> Result<ProjectFileV1, SnapshotError> {
    let canvas = project.canvas();
    Ok(ProjectFileV1 {
        magic: SFE_MAGIC_V1.to_string(),
        width: canvas.width(),
        height: canvas.height(),
        pixel_png: encode_png(&canvas.to_rgba_image())?,
        palette: project
            .active_palette()
            .entries()
            .iter()
            .map(|e| PaletteEntryV1 {
                code: e.code.clone(),
                symbol: e.symbol.clone(),
                locked: e.locked,
            })
            .collect(),
        reference_png: project.reference_png.clone(),
        reference_opacity: project.reference_opacity,
        reference_visible: project.reference_visible,
        pixel_layer_opacity: project.pixel_layer_opacity,
    })
}

/// Serialize a snapshot to SFE bytes.
pub fn encode_sfe(file: &ProjectFileV1) -> Result<Vec<u8>, SnapshotError> {
    Ok(bincode::serialize(file)?)
}

/// Parse SFE bytes back into a snapshot, verifying the magic/version.
pub fn decode_sfe(raw: &[u8]) -> Result<ProjectFileV1, SnapshotError> {
    if raw.len() < 12 {
        return Err(SnapshotError::InvalidFormat("File too small".into()));
    }
    // bincode encodes a String as: 8-byte length prefix + UTF-8 data.
    // Our magic string is 4 chars, so bytes 8..12 hold the magic.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    match magic {
        SFE_MAGIC_V1 => {
            let file: ProjectFileV1 = bincode::deserialize(raw)?;
            if file.width == 0
                || file.height == 0
                || file.width > SNAPSHOT_MAX_DIM
                || file.height > SNAPSHOT_MAX_DIM
            {
                return Err(SnapshotError::InvalidFormat(format!(
                    "Unreasonable canvas dimensions {}×{}",
                    file.width, file.height
                )));
            }
            Ok(file)
        }
        other => Err(SnapshotError::InvalidFormat(format!(
            "Unknown magic '{}'",
            other
        ))),
    }
}

/// Save a project as a .sfe file.
pub fn save_sfe(project: &Project, path: &Path) -> Result<(), SnapshotError> {
    let file = build_sfe_v1(project)?;
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)?;
    Ok(())
}

// ============================================================================
// SNAPSHOT RESTORE
// ============================================================================

/// Rebuild a project from a decoded snapshot.
///
/// Palette entries are resolved against `catalog`; any code the catalog no
/// longer knows is dropped silently (logged). The canvas and the remaining
/// entries reconstruct fully, with undo history cleared and the document
/// marked clean.
pub fn restore_sfe_v1(
    file: &ProjectFileV1,
    name: impl Into<String>,
    catalog: &[ThreadColor],
    config: EditorConfig,
) -> Result<Project, SnapshotError> {
    let img = decode_png(&file.pixel_png)?;
    if img.width() != file.width || img.height() != file.height {
        return Err(SnapshotError::InvalidFormat(format!(
            "Pixel layer is {}×{} but header says {}×{}",
            img.width(),
            img.height(),
            file.width,
            file.height
        )));
    }

    let canvas = CanvasState::from_image(&img, config.max_canvas_dim)
        .map_err(|e| SnapshotError::InvalidFormat(e.to_string()))?;

    let mut entries: Vec<ThreadColor> = Vec::new();
    for saved in &file.palette {
        if entries.iter().any(|e| code_eq(&e.code, &saved.code)) {
            continue;
        }
        match catalog.iter().find(|c| code_eq(&c.code, &saved.code)) {
            Some(source) => {
                let mut entry = source.clone();
                entry.symbol = saved.symbol.clone();
                entry.locked = saved.locked;
                entries.push(entry);
            }
            None => {
                log_warn!(
                    "snapshot: dropping palette entry '{}' (not in catalog)",
                    saved.code
                );
            }
        }
    }
    let mut active = ActivePalette::default();
    active.replace(entries);

    let mut project = Project::with_canvas(name, file.width, file.height, config)
        .map_err(|e| SnapshotError::InvalidFormat(e.to_string()))?;
    project.restore(canvas, active);
    project.reference_png = file.reference_png.clone();
    project.reference_opacity = file.reference_opacity;
    project.reference_visible = file.reference_visible;
    project.pixel_layer_opacity = file.pixel_layer_opacity;
    Ok(project)
}

/// Load a .sfe project file.
pub fn load_sfe(
    path: &Path,
    catalog: &[ThreadColor],
    config: EditorConfig,
) -> Result<Project, SnapshotError> {
    let raw = std::fs::read(path)?;
    let file = decode_sfe(&raw)?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    restore_sfe_v1(&file, name, catalog, config)
}

// ============================================================================
// CATALOG LOADING
// ============================================================================

/// Load a thread catalog CSV (`code,name,R,G,B`, one header row). Malformed
/// rows are skipped inside the parser.
pub fn load_catalog(path: &Path) -> Result<Vec<ThreadColor>, SnapshotError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_catalog(&text))
}

// ============================================================================
// PNG HELPERS
// ============================================================================

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, SnapshotError> {
    let mut bytes: Vec<u8> = Vec::new();
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
    Ok(bytes)
}

pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage, SnapshotError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.into_rgba8())
}

// ============================================================================
// TESTS
// ============================================================================
