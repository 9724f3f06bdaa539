use std::path::PathBuf;
use uuid::Uuid;

use serde::{Deserialize, Serialize};

use crate::canvas::{PixelBuffer, PixelFormat};
use crate::error::{EngineError, EngineResult};
use crate::palette::Palette;
use crate::session::EditSession;

/// Single open document.
pub struct Document {
    pub id: Uuid,
    pub session: EditSession,
    /// `None` for unsaved/untitled documents.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Document {
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32) -> EngineResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            session: EditSession::new(width, height, PixelFormat::Direct, None)?,
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        })
    }

    pub fn from_file(path: PathBuf, session: EditSession) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        Self {
            id: Uuid::new_v4(),
            session,
            path: Some(path),
            is_dirty: false,
            name,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown".to_string());
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

// ============================================================================
// DOCUMENT SNAPSHOT — serializable persistent state
// ============================================================================

/// Stored sample layout of a snapshot.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotFormat {
    Direct,
    Indexed,
}

/// Serializable capture of a document's persistent state: buffer, palette,
/// and colour pair.  History is deliberately not persisted — loading a
/// snapshot starts a fresh history, the same as opening any other file.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DocumentSnapshot {
    pub width: u32,
    pub height: u32,
    pub format: SnapshotFormat,
    /// Row-major RGBA bytes (direct) or palette indices (indexed).
    pub samples: Vec<u8>,
    pub palette: Vec<[u8; 4]>,
    pub foreground: [u8; 4],
    pub background: [u8; 4],
}

impl DocumentSnapshot {
    pub fn capture(session: &EditSession) -> Self {
        let buffer = session.buffer();
        let (format, samples) = match buffer.format() {
            PixelFormat::Direct => (
                SnapshotFormat::Direct,
                buffer.rgba_bytes().map(<[u8]>::to_vec).unwrap_or_default(),
            ),
            PixelFormat::Indexed => (
                SnapshotFormat::Indexed,
                buffer.indices().map(<[u8]>::to_vec).unwrap_or_default(),
            ),
        };
        Self {
            width: buffer.width(),
            height: buffer.height(),
            format,
            samples,
            palette: session.palette().colors().iter().map(|c| c.0).collect(),
            foreground: session.colors().foreground.0,
            background: session.colors().background.0,
        }
    }

    /// Rebuild a session from the snapshot.  The usual buffer invariants are
    /// re-validated, so a corrupted snapshot surfaces as an error instead of
    /// a broken session.
    pub fn restore(self) -> EngineResult<EditSession> {
        let mut palette = Palette::new();
        palette.load_colors(self.palette.into_iter().map(image::Rgba).collect())?;

        let buffer = match self.format {
            SnapshotFormat::Direct => {
                let img = image::RgbaImage::from_raw(self.width, self.height, self.samples)
                    .ok_or_else(|| {
                        EngineError::invalid_argument("snapshot sample grid does not match its dimensions")
                    })?;
                PixelBuffer::from_rgba_image(img)?
            }
            SnapshotFormat::Indexed => {
                PixelBuffer::from_indices(self.width, self.height, self.samples, &palette)?
            }
        };

        let mut session = EditSession::from_parts(buffer, palette);
        session.set_foreground(image::Rgba(self.foreground));
        session.set_background(image::Rgba(self.background));
        Ok(session)
    }
}
