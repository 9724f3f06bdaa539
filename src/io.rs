// ============================================================================
// BOUNDARY I/O — decode/encode at the binary's edge
// ============================================================================
//
// The engine itself only consumes decoded pixel grids and colour lists and
// produces the same; everything here is the collaborator-side plumbing used
// by the headless CLI.  Raster formats go through the `image` facade, with
// the output format inferred from the file extension; document snapshots
// are bincode-encoded `DocumentSnapshot`s.

use image::{DynamicImage, RgbaImage};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::project::DocumentSnapshot;

/// Extension used for native document snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "pfx";

/// Decode any supported raster file to an RGBA grid.
pub fn load_rgba(path: &Path) -> Result<RgbaImage, String> {
    let img = image::open(path).map_err(|e| format!("{}: decode error: {}", path.display(), e))?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA grid per the path's extension.  JPEG cannot carry alpha,
/// so it is flattened to RGB first.
pub fn save_rgba(path: &Path, img: &RgbaImage) -> Result<(), String> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let result = match ext.as_str() {
        "jpg" | "jpeg" => DynamicImage::ImageRgba8(img.clone()).to_rgb8().save(path),
        _ => img.save(path),
    };
    result.map_err(|e| format!("{}: encode error: {}", path.display(), e))
}

/// True when the path points at a native snapshot file.
pub fn is_snapshot_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(SNAPSHOT_EXTENSION))
        .unwrap_or(false)
}

/// Write a document snapshot as bincode.
pub fn save_snapshot(path: &Path, snapshot: &DocumentSnapshot) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    bincode::serialize_into(BufWriter::new(file), snapshot)
        .map_err(|e| format!("{}: snapshot encode error: {}", path.display(), e))
}

/// Read a document snapshot back.
pub fn load_snapshot(path: &Path) -> Result<DocumentSnapshot, String> {
    let file = File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| format!("{}: snapshot decode error: {}", path.display(), e))
}
