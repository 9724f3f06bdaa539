use image::{Rgba, RgbaImage};

use crate::error::{EngineError, EngineResult};

/// Default capacity cap.  Indexed buffers store `u8` samples, so a palette
/// bound to one can never exceed 256 entries.
pub const DEFAULT_MAX_LEN: usize = 256;

/// The built-in default palette (32 colours, classic pixel-art ramp).
const DEFAULT_COLORS: &[[u8; 4]] = &[
    [0x00, 0x00, 0x00, 0xff],
    [0x22, 0x20, 0x34, 0xff],
    [0x45, 0x28, 0x3c, 0xff],
    [0x66, 0x39, 0x31, 0xff],
    [0x8f, 0x56, 0x3b, 0xff],
    [0xdf, 0x71, 0x26, 0xff],
    [0xd9, 0xa0, 0x66, 0xff],
    [0xee, 0xc3, 0x9a, 0xff],
    [0xfb, 0xf2, 0x36, 0xff],
    [0x99, 0xe5, 0x50, 0xff],
    [0x6a, 0xbe, 0x30, 0xff],
    [0x37, 0x94, 0x6e, 0xff],
    [0x4b, 0x69, 0x2f, 0xff],
    [0x52, 0x4b, 0x24, 0xff],
    [0x32, 0x3c, 0x39, 0xff],
    [0x3f, 0x3f, 0x74, 0xff],
    [0x30, 0x60, 0x82, 0xff],
    [0x5b, 0x6e, 0xe1, 0xff],
    [0x63, 0x9b, 0xff, 0xff],
    [0x5f, 0xcd, 0xe4, 0xff],
    [0xcb, 0xdb, 0xfc, 0xff],
    [0xff, 0xff, 0xff, 0xff],
    [0x9b, 0xad, 0xb7, 0xff],
    [0x84, 0x7e, 0x87, 0xff],
    [0x69, 0x6a, 0x6a, 0xff],
    [0x59, 0x56, 0x52, 0xff],
    [0x76, 0x42, 0x8a, 0xff],
    [0xac, 0x32, 0x32, 0xff],
    [0xd9, 0x57, 0x63, 0xff],
    [0xd7, 0x7b, 0xba, 0xff],
    [0x8f, 0x97, 0x4a, 0xff],
    [0x8a, 0x6f, 0x30, 0xff],
];

// ============================================================================
// PALETTE — ordered, index-addressable colour list
// ============================================================================

/// Ordered colour list used by indexed buffers.
///
/// Editor-driven edits dedupe by exact value; duplicates are only admitted
/// when loaded verbatim from an external source.  Indices are stable until a
/// removal compacts them (subsequent indices shift down by one — the session
/// remaps any indexed buffer atomically with the removal).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgba<u8>>,
    max_len: usize,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    /// Empty palette with the default capacity cap.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_LEN)
    }

    /// Empty palette with an explicit capacity cap.
    pub fn with_capacity(max_len: usize) -> Self {
        Self {
            colors: Vec::new(),
            max_len: max_len.min(DEFAULT_MAX_LEN),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn color(&self, index: usize) -> Option<Rgba<u8>> {
        self.colors.get(index).copied()
    }

    pub fn colors(&self) -> &[Rgba<u8>] {
        &self.colors
    }

    pub fn index_of(&self, color: Rgba<u8>) -> Option<usize> {
        self.colors.iter().position(|c| *c == color)
    }

    /// Append a colour, deduplicating by exact value.  Returns the (existing
    /// or new) index, or `PaletteOverflow` when the palette is full.
    pub fn push_color(&mut self, color: Rgba<u8>) -> EngineResult<usize> {
        if let Some(existing) = self.index_of(color) {
            return Ok(existing);
        }
        if self.colors.len() >= self.max_len {
            return Err(EngineError::PaletteOverflow { max: self.max_len });
        }
        self.colors.push(color);
        Ok(self.colors.len() - 1)
    }

    /// Remove the entry at `index`, shifting subsequent indices down by one.
    /// The `IndexInUse` check and buffer remap live in the session, which
    /// treats them as a single command with this removal.
    pub fn remove_at(&mut self, index: usize) -> EngineResult<Rgba<u8>> {
        if index >= self.colors.len() {
            return Err(EngineError::invalid_argument(format!(
                "palette index {} out of range ({} entries)",
                index,
                self.colors.len()
            )));
        }
        Ok(self.colors.remove(index))
    }

    /// Replace the contents with the fixed built-in palette.
    pub fn load_default(&mut self) {
        self.colors = DEFAULT_COLORS.iter().map(|c| Rgba(*c)).collect();
    }

    /// Replace the contents verbatim from an external source.  Duplicates are
    /// allowed here (and only here); entries beyond the capacity cap are an
    /// error rather than a silent truncation.
    pub fn load_colors(&mut self, colors: Vec<Rgba<u8>>) -> EngineResult<()> {
        if colors.len() > self.max_len {
            return Err(EngineError::PaletteOverflow { max: self.max_len });
        }
        self.colors = colors;
        Ok(())
    }

    /// Restore contents captured from this palette earlier (history replay).
    pub(crate) fn set_colors(&mut self, colors: Vec<Rgba<u8>>) {
        self.colors = colors;
    }

    /// Build a palette from a decoded pixel grid: each distinct colour becomes
    /// one entry, in first-seen (row-major) order.  Fails with
    /// `PaletteOverflow` when the grid holds more distinct colours than the
    /// capacity cap.
    pub fn from_pixels(img: &RgbaImage) -> EngineResult<Self> {
        let mut palette = Self::new();
        for p in img.pixels() {
            palette.push_color(*p)?;
        }
        Ok(palette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

    #[test]
    fn push_color_dedupes_by_exact_value() {
        let mut p = Palette::new();
        assert_eq!(p.push_color(RED).unwrap(), 0);
        assert_eq!(p.push_color(GREEN).unwrap(), 1);
        assert_eq!(p.push_color(RED).unwrap(), 0);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn push_color_overflows_at_capacity() {
        let mut p = Palette::with_capacity(1);
        p.push_color(RED).unwrap();
        assert_eq!(
            p.push_color(GREEN),
            Err(EngineError::PaletteOverflow { max: 1 })
        );
        // Re-pushing an existing colour still succeeds at capacity.
        assert_eq!(p.push_color(RED).unwrap(), 0);
    }

    #[test]
    fn remove_at_compacts_indices() {
        let mut p = Palette::new();
        p.push_color(RED).unwrap();
        p.push_color(GREEN).unwrap();
        assert_eq!(p.remove_at(0).unwrap(), RED);
        assert_eq!(p.index_of(GREEN), Some(0));
        assert!(p.remove_at(5).is_err());
    }

    #[test]
    fn default_palette_has_no_duplicates() {
        let mut p = Palette::new();
        p.load_default();
        assert_eq!(p.len(), 32);
        for (i, c) in p.colors().iter().enumerate() {
            assert_eq!(p.index_of(*c), Some(i));
        }
    }

    #[test]
    fn from_pixels_keeps_first_seen_order() {
        let mut img = RgbaImage::from_pixel(2, 2, RED);
        img.put_pixel(1, 0, GREEN);
        // Row-major: RED first, GREEN second, duplicates collapse.
        let p = Palette::from_pixels(&img).unwrap();
        assert_eq!(p.colors(), &[RED, GREEN]);
    }

    #[test]
    fn load_colors_admits_duplicates() {
        let mut p = Palette::new();
        p.load_colors(vec![RED, RED, GREEN]).unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.index_of(RED), Some(0));
    }
}
