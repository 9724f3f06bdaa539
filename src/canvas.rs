use image::{GrayImage, Luma, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{EngineError, EngineResult};
use crate::palette::Palette;

/// Fill colour used for freshly created buffers when none is given.
pub const DEFAULT_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Hard cap on buffer area to prevent pathological allocations (~256 megapixels).
const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// REGION — inclusive-origin, exclusive-extent rectangle in buffer coordinates
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The whole-buffer region.
    pub fn of_buffer(buffer: &PixelBuffer) -> Self {
        Self::new(0, 0, buffer.width(), buffer.height())
    }

    /// Bounding box of two (possibly unordered, possibly off-canvas) stroke
    /// points, clamped to a `width`×`height` canvas.  Returns `None` when the
    /// canvas is empty.  Off-canvas endpoints are clamped per point rather
    /// than rejected.
    pub fn from_points(p0: (i32, i32), p1: (i32, i32), width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let clamp_x = |v: i32| v.clamp(0, width as i32 - 1) as u32;
        let clamp_y = |v: i32| v.clamp(0, height as i32 - 1) as u32;
        let x0 = clamp_x(p0.0.min(p1.0));
        let y0 = clamp_y(p0.1.min(p1.1));
        let x1 = clamp_x(p0.0.max(p1.0));
        let y1 = clamp_y(p0.1.max(p1.1));
        Some(Self::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
    }

    /// One-past-the-right column.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// One-past-the-bottom row.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Smallest region covering both `self` and `other`.
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let r = self.right().max(other.right());
        let b = self.bottom().max(other.bottom());
        Region::new(x, y, r - x, b - y)
    }

    /// True when the region lies entirely inside a `width`×`height` buffer.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.right() <= width && self.bottom() <= height
    }
}

// ============================================================================
// PIXEL BUFFER — direct RGBA or palette-indexed sample grid
// ============================================================================

/// Storage format of a buffer's samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Each sample is an explicit 8-bit RGBA colour.
    #[default]
    Direct,
    /// Each sample is an index into the session palette.
    Indexed,
}

/// One stored sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sample {
    Direct(Rgba<u8>),
    Index(u8),
}

/// Placement of old content within a resized buffer, per axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    Start,
    Center,
    End,
}

impl Anchor {
    /// Pixel offset of the old extent within the new extent.
    fn offset(&self, old: u32, new: u32) -> i64 {
        match self {
            Anchor::Start => 0,
            Anchor::Center => (new as i64 - old as i64) / 2,
            Anchor::End => new as i64 - old as i64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SampleGrid {
    Direct(RgbaImage),
    Indexed(Vec<u8>),
}

/// Dense row-major grid of colour samples.  Width and height are fixed for
/// the buffer's lifetime; `resize` produces a new buffer.
///
/// Invariants: grid length == width×height; in `Indexed` mode every sample
/// is a valid index into the session palette (enforced at every entry point
/// that can introduce indices).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    grid: SampleGrid,
}

impl PixelBuffer {
    // ---- construction -------------------------------------------------------

    /// Create a direct-colour buffer filled with `fill` (default opaque white).
    pub fn new_direct(width: u32, height: u32, fill: Option<Rgba<u8>>) -> EngineResult<Self> {
        Self::check_dimensions(width, height)?;
        let fill = fill.unwrap_or(DEFAULT_FILL);
        Ok(Self {
            width,
            height,
            grid: SampleGrid::Direct(RgbaImage::from_pixel(width, height, fill)),
        })
    }

    /// Create an indexed buffer with every sample set to `fill_index`.
    /// The index must already be valid for the bound palette.
    pub fn new_indexed(width: u32, height: u32, fill_index: u8, palette: &Palette) -> EngineResult<Self> {
        Self::check_dimensions(width, height)?;
        if fill_index as usize >= palette.len() {
            return Err(EngineError::invalid_argument(format!(
                "fill index {} outside palette of {} entries",
                fill_index,
                palette.len()
            )));
        }
        Ok(Self {
            width,
            height,
            grid: SampleGrid::Indexed(vec![fill_index; width as usize * height as usize]),
        })
    }

    /// Import a decoded RGBA grid as a direct-colour buffer.
    pub fn from_rgba_image(src: RgbaImage) -> EngineResult<Self> {
        Self::check_dimensions(src.width(), src.height())?;
        Ok(Self {
            width: src.width(),
            height: src.height(),
            grid: SampleGrid::Direct(src),
        })
    }

    /// Import a decoded index grid.  Every index must resolve in `palette`.
    pub fn from_indices(width: u32, height: u32, indices: Vec<u8>, palette: &Palette) -> EngineResult<Self> {
        Self::check_dimensions(width, height)?;
        if indices.len() != width as usize * height as usize {
            return Err(EngineError::invalid_argument(format!(
                "index grid length {} does not match {}\u{d7}{}",
                indices.len(),
                width,
                height
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= palette.len()) {
            return Err(EngineError::invalid_argument(format!(
                "index {} outside palette of {} entries",
                bad,
                palette.len()
            )));
        }
        Ok(Self {
            width,
            height,
            grid: SampleGrid::Indexed(indices),
        })
    }

    fn check_dimensions(width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 || (width as u64) * (height as u64) > MAX_PIXELS {
            return Err(EngineError::InvalidDimensions { width, height });
        }
        Ok(())
    }

    // ---- geometry -----------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        match self.grid {
            SampleGrid::Direct(_) => PixelFormat::Direct,
            SampleGrid::Indexed(_) => PixelFormat::Indexed,
        }
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    // ---- sample access ------------------------------------------------------

    /// Read the sample at (x, y).
    pub fn get(&self, x: u32, y: u32) -> EngineResult<Sample> {
        if x >= self.width || y >= self.height {
            return Err(EngineError::out_of_bounds(x as i64, y as i64, self.width, self.height));
        }
        Ok(self.at(x, y))
    }

    /// Write the sample at (x, y).  The sample must match the buffer format;
    /// format conversion is an explicit session operation, never implicit.
    pub fn set(&mut self, x: u32, y: u32, sample: Sample) -> EngineResult<()> {
        if x >= self.width || y >= self.height {
            return Err(EngineError::out_of_bounds(x as i64, y as i64, self.width, self.height));
        }
        match (&self.grid, sample) {
            (SampleGrid::Direct(_), Sample::Direct(_)) | (SampleGrid::Indexed(_), Sample::Index(_)) => {
                self.put(x, y, sample);
                Ok(())
            }
            _ => Err(EngineError::invalid_argument(
                "sample format does not match buffer format",
            )),
        }
    }

    /// Internal unchecked read.  Caller guarantees bounds.
    pub(crate) fn at(&self, x: u32, y: u32) -> Sample {
        match &self.grid {
            SampleGrid::Direct(img) => Sample::Direct(*img.get_pixel(x, y)),
            SampleGrid::Indexed(indices) => Sample::Index(indices[(y * self.width + x) as usize]),
        }
    }

    /// Internal unchecked write.  Caller guarantees bounds and format.
    pub(crate) fn put(&mut self, x: u32, y: u32, sample: Sample) {
        match (&mut self.grid, sample) {
            (SampleGrid::Direct(img), Sample::Direct(c)) => img.put_pixel(x, y, c),
            (SampleGrid::Indexed(indices), Sample::Index(i)) => {
                indices[(y * self.width + x) as usize] = i;
            }
            _ => debug_assert!(false, "sample format mismatch"),
        }
    }

    /// Resolve the colour at (x, y) through `palette` when indexed.
    pub fn color_at(&self, x: u32, y: u32, palette: &Palette) -> EngineResult<Rgba<u8>> {
        match self.get(x, y)? {
            Sample::Direct(c) => Ok(c),
            Sample::Index(i) => palette.color(i as usize).ok_or_else(|| {
                EngineError::invalid_argument(format!("palette index {} out of range", i))
            }),
        }
    }

    /// Write a colour at (x, y).  In indexed mode the colour is looked up in
    /// the palette, appended if absent (editor dedupe rules), and may fail
    /// with `PaletteOverflow`.
    pub fn put_color(&mut self, x: u32, y: u32, color: Rgba<u8>, palette: &mut Palette) -> EngineResult<()> {
        if x >= self.width || y >= self.height {
            return Err(EngineError::out_of_bounds(x as i64, y as i64, self.width, self.height));
        }
        let sample = match self.format() {
            PixelFormat::Direct => Sample::Direct(color),
            PixelFormat::Indexed => Sample::Index(palette.push_color(color)? as u8),
        };
        self.put(x, y, sample);
        Ok(())
    }

    // ---- region access (history patches, transforms) ------------------------

    /// Copy the samples of `region` out in row-major order.
    /// The region must lie inside the buffer.
    pub(crate) fn samples_in(&self, region: Region) -> Vec<Sample> {
        debug_assert!(region.fits(self.width, self.height));
        let mut out = Vec::with_capacity(region.area());
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                out.push(self.at(x, y));
            }
        }
        out
    }

    /// Write a row-major sample run back into `region`.
    pub(crate) fn write_samples(&mut self, region: Region, samples: &[Sample]) {
        debug_assert!(region.fits(self.width, self.height));
        debug_assert_eq!(samples.len(), region.area());
        let mut idx = 0;
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                self.put(x, y, samples[idx]);
                idx += 1;
            }
        }
    }

    // ---- format conversion --------------------------------------------------

    /// Convert to an indexed buffer, appending missing colours to `palette`.
    /// Fails with `PaletteOverflow` when a colour cannot be inserted under the
    /// palette's capacity; the palette is left untouched on failure.
    pub fn to_indexed(&self, palette: &mut Palette) -> EngineResult<PixelBuffer> {
        match &self.grid {
            SampleGrid::Indexed(_) => Ok(self.clone()),
            SampleGrid::Direct(img) => {
                // Dry-run against a scratch copy so a mid-grid overflow cannot
                // leave the real palette half-grown.
                let mut scratch = palette.clone();
                let mut indices = Vec::with_capacity(self.width as usize * self.height as usize);
                for p in img.pixels() {
                    indices.push(scratch.push_color(*p)? as u8);
                }
                *palette = scratch;
                Ok(PixelBuffer {
                    width: self.width,
                    height: self.height,
                    grid: SampleGrid::Indexed(indices),
                })
            }
        }
    }

    /// Convert to a direct-colour buffer by resolving every index.
    pub fn to_direct(&self, palette: &Palette) -> EngineResult<PixelBuffer> {
        match &self.grid {
            SampleGrid::Direct(_) => Ok(self.clone()),
            SampleGrid::Indexed(_) => {
                let img = self.flatten(palette)?;
                Ok(PixelBuffer {
                    width: self.width,
                    height: self.height,
                    grid: SampleGrid::Direct(img),
                })
            }
        }
    }

    /// Flatten to a plain RGBA grid (save output, tool colour reads).
    pub fn flatten(&self, palette: &Palette) -> EngineResult<RgbaImage> {
        match &self.grid {
            SampleGrid::Direct(img) => Ok(img.clone()),
            SampleGrid::Indexed(indices) => {
                let mut img = RgbaImage::new(self.width, self.height);
                for (i, p) in img.pixels_mut().enumerate() {
                    *p = palette.color(indices[i] as usize).ok_or_else(|| {
                        EngineError::invalid_argument(format!(
                            "palette index {} out of range",
                            indices[i]
                        ))
                    })?;
                }
                Ok(img)
            }
        }
    }

    /// Raw index grid of an indexed buffer (snapshot export).
    pub fn indices(&self) -> Option<&[u8]> {
        match &self.grid {
            SampleGrid::Indexed(indices) => Some(indices),
            SampleGrid::Direct(_) => None,
        }
    }

    /// Raw RGBA bytes of a direct buffer (snapshot export).
    pub fn rgba_bytes(&self) -> Option<&[u8]> {
        match &self.grid {
            SampleGrid::Direct(img) => Some(img.as_raw()),
            SampleGrid::Indexed(_) => None,
        }
    }

    /// Remap palette indices after a palette removal: every index above
    /// `removed` shifts down by one.  No-op on direct buffers.
    pub(crate) fn remap_indices_above(&mut self, removed: u8) {
        if let SampleGrid::Indexed(indices) = &mut self.grid {
            for i in indices.iter_mut() {
                if *i > removed {
                    *i -= 1;
                }
            }
        }
    }

    /// True when any sample references palette index `index`.
    pub fn references_index(&self, index: u8) -> bool {
        match &self.grid {
            SampleGrid::Indexed(indices) => indices.contains(&index),
            SampleGrid::Direct(_) => false,
        }
    }

    /// Same-format buffer with different dimensions and a zeroed grid.
    /// Internal helper for whole-buffer transforms that overwrite every
    /// sample immediately after.
    pub(crate) fn blank_like(&self, width: u32, height: u32) -> PixelBuffer {
        let grid = match &self.grid {
            SampleGrid::Direct(_) => SampleGrid::Direct(RgbaImage::new(width, height)),
            SampleGrid::Indexed(_) => SampleGrid::Indexed(vec![0; width as usize * height as usize]),
        };
        PixelBuffer { width, height, grid }
    }

    // ---- resize -------------------------------------------------------------

    /// Produce a new buffer of `new_w`×`new_h` with the old content placed at
    /// `anchor` and vacated space taking `fill`.  Fails with
    /// `InvalidDimensions` when either dimension is zero.
    pub fn resize(&self, new_w: u32, new_h: u32, anchor: (Anchor, Anchor), fill: Sample) -> EngineResult<PixelBuffer> {
        Self::check_dimensions(new_w, new_h)?;
        let offset_x = anchor.0.offset(self.width, new_w);
        let offset_y = anchor.1.offset(self.height, new_h);

        let mut out = match (&self.grid, fill) {
            (SampleGrid::Direct(_), Sample::Direct(c)) => PixelBuffer {
                width: new_w,
                height: new_h,
                grid: SampleGrid::Direct(RgbaImage::from_pixel(new_w, new_h, c)),
            },
            (SampleGrid::Indexed(_), Sample::Index(i)) => PixelBuffer {
                width: new_w,
                height: new_h,
                grid: SampleGrid::Indexed(vec![i; new_w as usize * new_h as usize]),
            },
            _ => {
                return Err(EngineError::invalid_argument(
                    "fill sample format does not match buffer format",
                ));
            }
        };

        for y in 0..self.height {
            for x in 0..self.width {
                let nx = x as i64 + offset_x;
                let ny = y as i64 + offset_y;
                if nx >= 0 && ny >= 0 && (nx as u32) < new_w && (ny as u32) < new_h {
                    out.put(nx as u32, ny as u32, self.at(x, y));
                }
            }
        }
        Ok(out)
    }
}

// ============================================================================
// SELECTION MASK — boolean grid co-dimensioned with the buffer
// ============================================================================

/// Boolean selection grid.  Cells are stored as 0 (excluded) or 255
/// (included); a running count of included cells keeps
/// `is_effectively_empty` O(1).
///
/// An all-false mask means "no selection", which most operations interpret
/// as "the whole buffer is editable"; selection-only operations (scale,
/// invert) treat it literally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionMask {
    mask: GrayImage,
    selected: usize,
}

impl SelectionMask {
    /// All-false mask matching a buffer's dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
            selected: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    /// Number of included cells.
    pub fn selected_count(&self) -> usize {
        self.selected
    }

    /// True when no cell is included — callers interpret this as "operate on
    /// the whole buffer".
    pub fn is_effectively_empty(&self) -> bool {
        self.selected == 0
    }

    /// Remove the selection entirely (all cells false).
    pub fn clear(&mut self) {
        for p in self.mask.pixels_mut() {
            *p = Luma([0]);
        }
        self.selected = 0;
    }

    /// Flip every cell.
    pub fn invert(&mut self) {
        for p in self.mask.pixels_mut() {
            *p = Luma([if p.0[0] > 0 { 0 } else { 255 }]);
        }
        self.selected = self.mask.width() as usize * self.mask.height() as usize - self.selected;
    }

    /// Include or exclude a single cell.
    pub fn set(&mut self, x: u32, y: u32, included: bool) -> EngineResult<()> {
        if x >= self.width() || y >= self.height() {
            return Err(EngineError::out_of_bounds(
                x as i64,
                y as i64,
                self.width(),
                self.height(),
            ));
        }
        let cell = self.mask.get_pixel_mut(x, y);
        let was = cell.0[0] > 0;
        if was != included {
            *cell = Luma([if included { 255 } else { 0 }]);
            if included {
                self.selected += 1;
            } else {
                self.selected -= 1;
            }
        }
        Ok(())
    }

    /// True when the cell is included.  Out-of-range reads are false.
    pub fn selected(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.mask.get_pixel(x, y).0[0] > 0
    }

    /// Tool gate: a cell is editable when the mask is effectively empty or
    /// the cell is included.
    pub fn allows(&self, x: u32, y: u32) -> bool {
        self.is_effectively_empty() || self.selected(x, y)
    }

    /// Replace the mask contents with a filled rectangle (selection tool
    /// semantics — not additive).
    pub fn select_region(&mut self, region: Region) {
        self.clear();
        for y in region.y..region.bottom().min(self.height()) {
            for x in region.x..region.right().min(self.width()) {
                self.mask.put_pixel(x, y, Luma([255]));
                self.selected += 1;
            }
        }
    }

    /// Bounding rectangle of the included cells, or `None` when empty.
    pub fn bounds(&self) -> Option<Region> {
        if self.selected == 0 {
            return None;
        }
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        for (x, y, p) in self.mask.enumerate_pixels() {
            if p.0[0] > 0 {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        Some(Region::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    /// Derive the mask from colour similarity: include every pixel whose
    /// channel-wise distance to `seed_color` is within `tolerance`
    /// (tolerance 0 means exact match).  Replaces the current contents.
    pub fn auto_mask(
        &mut self,
        buffer: &PixelBuffer,
        palette: &Palette,
        seed_color: Rgba<u8>,
        tolerance: f32,
    ) -> EngineResult<()> {
        let flat = buffer.flatten(palette)?;
        let w = flat.width() as usize;
        let raw = flat.as_raw();

        // Row-parallel sweep; each row yields its cells plus a local count.
        let rows: Vec<(Vec<u8>, usize)> = (0..flat.height() as usize)
            .into_par_iter()
            .map(|y| {
                let mut cells = vec![0u8; w];
                let mut count = 0usize;
                for x in 0..w {
                    let o = (y * w + x) * 4;
                    let p = Rgba([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]]);
                    if colors_match(p, seed_color, tolerance) {
                        cells[x] = 255;
                        count += 1;
                    }
                }
                (cells, count)
            })
            .collect();

        let mut data = Vec::with_capacity(raw.len() / 4);
        let mut selected = 0usize;
        for (cells, count) in rows {
            data.extend_from_slice(&cells);
            selected += count;
        }
        // Dimensions match the source grid, so from_raw cannot fail.
        if let Some(mask) = GrayImage::from_raw(flat.width(), flat.height(), data) {
            self.mask = mask;
            self.selected = selected;
        }
        Ok(())
    }
}

/// Channel-wise colour match within `tolerance`.  Two fully transparent
/// pixels always match regardless of their hidden RGB payload.
pub fn colors_match(a: Rgba<u8>, b: Rgba<u8>, tolerance: f32) -> bool {
    if a.0[3] == 0 && b.0[3] == 0 {
        return true;
    }
    if a.0[3] == 0 || b.0[3] == 0 {
        return (a.0[3] as f32 - b.0[3] as f32).abs() <= tolerance;
    }
    let r = (a.0[0] as f32 - b.0[0] as f32).abs();
    let g = (a.0[1] as f32 - b.0[1] as f32).abs();
    let bl = (a.0[2] as f32 - b.0[2] as f32).abs();
    let al = (a.0[3] as f32 - b.0[3] as f32).abs();
    r.max(g).max(bl).max(al) <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn new_direct_rejects_zero_dimensions() {
        assert_eq!(
            PixelBuffer::new_direct(0, 4, None),
            Err(EngineError::InvalidDimensions { width: 0, height: 4 })
        );
        assert_eq!(
            PixelBuffer::new_direct(4, 0, None),
            Err(EngineError::InvalidDimensions { width: 4, height: 0 })
        );
    }

    #[test]
    fn get_set_round_trip_and_bounds() {
        let mut buf = PixelBuffer::new_direct(4, 3, None).unwrap();
        buf.set(2, 1, Sample::Direct(RED)).unwrap();
        assert_eq!(buf.get(2, 1).unwrap(), Sample::Direct(RED));
        assert!(matches!(buf.get(4, 0), Err(EngineError::OutOfBounds { .. })));
        assert!(matches!(buf.get(0, 3), Err(EngineError::OutOfBounds { .. })));
    }

    #[test]
    fn set_rejects_format_mismatch() {
        let mut buf = PixelBuffer::new_direct(2, 2, None).unwrap();
        assert!(matches!(
            buf.set(0, 0, Sample::Index(0)),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn indexed_round_trip_through_palette() {
        let mut palette = Palette::new();
        let red = palette.push_color(RED).unwrap();
        let buf = PixelBuffer::new_indexed(2, 2, red as u8, &palette).unwrap();
        assert_eq!(buf.color_at(1, 1, &palette).unwrap(), RED);

        let direct = buf.to_direct(&palette).unwrap();
        assert_eq!(direct.format(), PixelFormat::Direct);
        assert_eq!(direct.color_at(0, 0, &palette).unwrap(), RED);

        let back = direct.to_indexed(&mut palette).unwrap();
        assert_eq!(back.format(), PixelFormat::Indexed);
        assert_eq!(back.get(0, 0).unwrap(), Sample::Index(red as u8));
    }

    #[test]
    fn to_indexed_overflow_leaves_palette_untouched() {
        let mut buf = PixelBuffer::new_direct(2, 1, Some(RED)).unwrap();
        buf.set(1, 0, Sample::Direct(BLUE)).unwrap();
        let mut palette = Palette::with_capacity(1);
        assert!(matches!(
            buf.to_indexed(&mut palette),
            Err(EngineError::PaletteOverflow { max: 1 })
        ));
        assert_eq!(palette.len(), 0);
    }

    #[test]
    fn resize_anchors_old_content() {
        let mut buf = PixelBuffer::new_direct(2, 2, Some(BLUE)).unwrap();
        buf.set(0, 0, Sample::Direct(RED)).unwrap();

        let grown = buf
            .resize(4, 4, (Anchor::Center, Anchor::Center), Sample::Direct(DEFAULT_FILL))
            .unwrap();
        assert_eq!(grown.get(1, 1).unwrap(), Sample::Direct(RED));
        assert_eq!(grown.get(0, 0).unwrap(), Sample::Direct(DEFAULT_FILL));

        let shrunk = buf
            .resize(1, 1, (Anchor::Start, Anchor::Start), Sample::Direct(DEFAULT_FILL))
            .unwrap();
        assert_eq!(shrunk.get(0, 0).unwrap(), Sample::Direct(RED));

        assert!(matches!(
            buf.resize(0, 3, (Anchor::Start, Anchor::Start), Sample::Direct(DEFAULT_FILL)),
            Err(EngineError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn mask_starts_effectively_empty_and_tracks_count() {
        let mut mask = SelectionMask::new(3, 3);
        assert!(mask.is_effectively_empty());
        assert!(mask.allows(2, 2));

        mask.set(1, 1, true).unwrap();
        assert!(!mask.is_effectively_empty());
        assert!(mask.allows(1, 1));
        assert!(!mask.allows(0, 0));
        assert_eq!(mask.bounds(), Some(Region::new(1, 1, 1, 1)));

        mask.invert();
        assert_eq!(mask.selected_count(), 8);
        assert!(!mask.selected(1, 1));

        mask.clear();
        assert!(mask.is_effectively_empty());
    }

    #[test]
    fn select_region_replaces_previous_selection() {
        let mut mask = SelectionMask::new(4, 4);
        mask.select_region(Region::new(0, 0, 2, 2));
        assert_eq!(mask.selected_count(), 4);
        mask.select_region(Region::new(3, 3, 1, 1));
        assert_eq!(mask.selected_count(), 1);
        assert!(!mask.selected(0, 0));
        assert!(mask.selected(3, 3));
    }

    #[test]
    fn auto_mask_exact_and_tolerant() {
        let mut buf = PixelBuffer::new_direct(2, 2, Some(RED)).unwrap();
        buf.set(1, 1, Sample::Direct(Rgba([250, 0, 0, 255]))).unwrap();
        let palette = Palette::new();

        let mut mask = SelectionMask::new(2, 2);
        mask.auto_mask(&buf, &palette, RED, 0.0).unwrap();
        assert_eq!(mask.selected_count(), 3);

        mask.auto_mask(&buf, &palette, RED, 5.0).unwrap();
        assert_eq!(mask.selected_count(), 4);
    }

    #[test]
    fn region_from_points_clamps_and_orders() {
        let r = Region::from_points((5, 7), (-2, 1), 4, 4).unwrap();
        assert_eq!(r, Region::new(0, 1, 4, 3));
        assert!(Region::from_points((0, 0), (1, 1), 0, 0).is_none());
    }
}
