// ============================================================================
// EDIT SESSION — the engine's sole entry point
// ============================================================================
//
// Owns one pixel buffer, one selection mask, one palette, the active colour
// pair, the transparency mode, and the history stack.  Every mutation
// flows through here: compute → apply → record command → done.  Calls are
// synchronous and non-reentrant; callers serialize edits.

use image::{Rgba, RgbaImage};

use crate::canvas::{Anchor, DEFAULT_FILL, PixelBuffer, PixelFormat, Region, Sample, SelectionMask};
use crate::compositor::{self, BlendMode};
use crate::error::{EngineError, EngineResult};
use crate::history::{EditCommand, HistoryStack, PixelPatch, SessionSnapshot};
use crate::ops::tools::{self, PixelWrites};
use crate::ops::transform::{self, FlipAxis, RotateDirection, ShiftDirection};
use crate::palette::Palette;

/// Foreground/background colour pair fed into every tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorPair {
    pub foreground: Rgba<u8>,
    pub background: Rgba<u8>,
}

impl Default for ColorPair {
    fn default() -> Self {
        Self {
            foreground: Rgba([0, 0, 0, 255]),
            background: DEFAULT_FILL,
        }
    }
}

impl ColorPair {
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.foreground, &mut self.background);
    }
}

/// Paint tools that produce a pixel-write-set from a stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintTool {
    Pencil,
    Line,
    Rectangle { filled: bool },
    Ellipse { filled: bool },
    FloodFill,
}

impl PaintTool {
    fn description(&self) -> &'static str {
        match self {
            PaintTool::Pencil => "Pencil",
            PaintTool::Line => "Line",
            PaintTool::Rectangle { .. } => "Rectangle",
            PaintTool::Ellipse { .. } => "Ellipse",
            PaintTool::FloodFill => "Flood Fill",
        }
    }
}

pub struct EditSession {
    buffer: PixelBuffer,
    mask: SelectionMask,
    palette: Palette,
    colors: ColorPair,
    blend_mode: BlendMode,
    history: HistoryStack,
}

impl EditSession {
    // ---- construction / document lifecycle ----------------------------------

    /// New blank document.  The fill colour defaults to opaque white; for an
    /// indexed document it becomes palette entry 0.
    pub fn new(width: u32, height: u32, format: PixelFormat, fill: Option<Rgba<u8>>) -> EngineResult<Self> {
        let fill = fill.unwrap_or(DEFAULT_FILL);
        let mut palette = Palette::new();
        let buffer = match format {
            PixelFormat::Direct => PixelBuffer::new_direct(width, height, Some(fill))?,
            PixelFormat::Indexed => {
                let index = palette.push_color(fill)? as u8;
                PixelBuffer::new_indexed(width, height, index, &palette)?
            }
        };
        let mask = SelectionMask::new(width, height);
        Ok(Self {
            buffer,
            mask,
            palette,
            colors: ColorPair::default(),
            blend_mode: BlendMode::default(),
            history: HistoryStack::default(),
        })
    }

    /// Session over an already-decoded buffer + palette (open-document path).
    pub fn from_parts(buffer: PixelBuffer, palette: Palette) -> Self {
        let mask = SelectionMask::new(buffer.width(), buffer.height());
        Self {
            buffer,
            mask,
            palette,
            colors: ColorPair::default(),
            blend_mode: BlendMode::default(),
            history: HistoryStack::default(),
        }
    }

    /// Replace the document content with a decoded grid.  Resets the mask
    /// and clears the history (new content, not a save).
    pub fn load_image(&mut self, img: RgbaImage) -> EngineResult<()> {
        let buffer = PixelBuffer::from_rgba_image(img)?;
        self.mask = SelectionMask::new(buffer.width(), buffer.height());
        self.buffer = buffer;
        self.history.clear();
        Ok(())
    }

    /// Current pixel grid, resolved to RGBA, for the encoding collaborator.
    pub fn export_image(&self) -> EngineResult<RgbaImage> {
        self.buffer.flatten(&self.palette)
    }

    // ---- accessors ----------------------------------------------------------

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn mask(&self) -> &SelectionMask {
        &self.mask
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn colors(&self) -> ColorPair {
        self.colors
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    pub fn set_foreground(&mut self, color: Rgba<u8>) {
        self.colors.foreground = color;
    }

    pub fn set_background(&mut self, color: Rgba<u8>) {
        self.colors.background = color;
    }

    pub fn swap_colors(&mut self) {
        self.colors.swap();
    }

    // ---- paint tools --------------------------------------------------------

    /// Run a paint tool over a stroke under the session transparency mode.
    pub fn apply_tool(&mut self, tool: PaintTool, stroke: &[(i32, i32)]) -> EngineResult<()> {
        self.apply_tool_with_mode(tool, stroke, self.blend_mode)
    }

    /// Run a paint tool with an explicit transparency mode for this call.
    pub fn apply_tool_with_mode(
        &mut self,
        tool: PaintTool,
        stroke: &[(i32, i32)],
        mode: BlendMode,
    ) -> EngineResult<()> {
        let fg = self.colors.foreground;
        let writes = match tool {
            PaintTool::Pencil => tools::pencil(stroke, fg, &self.buffer, &self.mask),
            PaintTool::Line => tools::line(stroke, fg, &self.buffer, &self.mask),
            PaintTool::Rectangle { filled } => tools::rectangle(stroke, fg, filled, &self.buffer, &self.mask),
            PaintTool::Ellipse { filled } => tools::ellipse(stroke, fg, filled, &self.buffer, &self.mask),
            PaintTool::FloodFill => {
                let flat = self.buffer.flatten(&self.palette)?;
                let Some(&seed) = stroke.first() else {
                    return Ok(());
                };
                tools::flood_fill(&flat, seed, fg, &self.mask)
            }
        };
        self.commit_writes(writes, tool.description(), mode)
    }

    /// Vertical foreground→background gradient across the target region.
    pub fn apply_gradient_fill(&mut self) -> EngineResult<()> {
        let region = self.target_region();
        let colors = if region.height < 2 {
            vec![self.colors.foreground]
        } else {
            compositor::gradient(self.colors.foreground, self.colors.background, region.height as usize)?
        };
        let writes = tools::gradient_fill(region, &colors, &self.buffer, &self.mask);
        self.commit_writes(writes, "Gradient Fill", self.blend_mode)
    }

    /// Eyedropper: read the colour under the stroke and make it the new
    /// foreground.  Produces no command.  Off-canvas picks return `None`.
    pub fn pick_color(&mut self, stroke: &[(i32, i32)]) -> EngineResult<Option<Rgba<u8>>> {
        let picked = tools::eyedropper(stroke, &self.buffer, &self.palette)?;
        if let Some(color) = picked {
            self.colors.foreground = color;
        }
        Ok(picked)
    }

    /// Composite a write-set against the buffer and commit it as one
    /// command.  An empty write-set commits nothing.
    fn commit_writes(&mut self, writes: PixelWrites, description: &str, mode: BlendMode) -> EngineResult<()> {
        let Some(region) = writes.bounds() else {
            return Ok(());
        };

        // Blend against the committed pixels first.
        let mut blended = Vec::with_capacity(writes.len());
        for &((x, y), src) in writes.iter() {
            let dst = self.buffer.color_at(x, y, &self.palette)?;
            blended.push(((x, y), compositor::blend(dst, src, mode)));
        }

        // Indexed buffers: reserve palette entries up front so a mid-write
        // overflow cannot leave a partial command behind.
        if self.buffer.format() == PixelFormat::Indexed {
            let mut reserved = self.palette.clone();
            for &(_, color) in &blended {
                reserved.push_color(color)?;
            }
            self.palette = reserved;
        }

        let before = PixelPatch::capture(&self.buffer, region);
        for ((x, y), color) in blended {
            self.buffer.put_color(x, y, color, &mut self.palette)?;
        }
        let after = PixelPatch::capture(&self.buffer, region);

        self.history.push(EditCommand::Pixels {
            description: description.to_string(),
            before,
            after,
            mask: None,
        });
        Ok(())
    }

    // ---- selection ----------------------------------------------------------

    /// Selection tool: the stroke's bounding box replaces the mask contents.
    pub fn select_with_stroke(&mut self, stroke: &[(i32, i32)]) -> EngineResult<()> {
        let Some(region) = tools::selection_rect(stroke, self.buffer.width(), self.buffer.height()) else {
            return Ok(());
        };
        let before = self.mask.clone();
        self.mask.select_region(region);
        self.push_mask_command("Select", before);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        let before = self.mask.clone();
        self.mask.clear();
        self.push_mask_command("Clear Selection", before);
    }

    pub fn invert_selection(&mut self) {
        let before = self.mask.clone();
        self.mask.invert();
        self.push_mask_command("Invert Selection", before);
    }

    /// Derive the mask from colour similarity to `seed_color`.
    pub fn auto_mask(&mut self, seed_color: Rgba<u8>, tolerance: f32) -> EngineResult<()> {
        let before = self.mask.clone();
        self.mask.auto_mask(&self.buffer, &self.palette, seed_color, tolerance)?;
        self.push_mask_command("Auto Mask", before);
        Ok(())
    }

    fn push_mask_command(&mut self, description: &str, before: SelectionMask) {
        if before == self.mask {
            return;
        }
        self.history.push(EditCommand::MaskReplace {
            description: description.to_string(),
            before,
            after: self.mask.clone(),
        });
    }

    // ---- transforms ---------------------------------------------------------

    /// The selection's bounding region when one exists, else the whole buffer.
    fn target_region(&self) -> Region {
        self.mask.bounds().unwrap_or_else(|| Region::of_buffer(&self.buffer))
    }

    /// Background colour as a sample of the buffer's format.  For indexed
    /// buffers this may append a palette entry (editor dedupe rules).
    fn background_sample(&mut self) -> EngineResult<Sample> {
        match self.buffer.format() {
            PixelFormat::Direct => Ok(Sample::Direct(self.colors.background)),
            PixelFormat::Indexed => {
                Ok(Sample::Index(self.palette.push_color(self.colors.background)? as u8))
            }
        }
    }

    /// One-unit toroidal shift of the target region.  Shifting a region of
    /// extent 1 along the axis is a no-op and commits nothing.
    pub fn shift(&mut self, dir: ShiftDirection) -> EngineResult<()> {
        let region = self.target_region();
        let before = PixelPatch::capture(&self.buffer, region);
        if !transform::shift(&mut self.buffer, region, dir) {
            return Ok(());
        }
        let after = PixelPatch::capture(&self.buffer, region);
        self.history.push(EditCommand::Pixels {
            description: "Shift".to_string(),
            before,
            after,
            mask: None,
        });
        Ok(())
    }

    /// Mirror the target region along an axis.
    pub fn flip(&mut self, axis: FlipAxis) -> EngineResult<()> {
        let region = self.target_region();
        let before = PixelPatch::capture(&self.buffer, region);
        transform::flip(&mut self.buffer, region, axis);
        let after = PixelPatch::capture(&self.buffer, region);
        self.history.push(EditCommand::Pixels {
            description: "Flip".to_string(),
            before,
            after,
            mask: None,
        });
        Ok(())
    }

    /// Rotate the target 90°.  A selection rotates in place (its swapped
    /// footprint must fit, else `TransformOutOfBounds`); a non-square whole
    /// buffer is replaced by one with swapped dimensions as a compound
    /// resize+transform command.
    pub fn rotate(&mut self, dir: RotateDirection) -> EngineResult<()> {
        if self.mask.is_effectively_empty() && self.buffer.width() != self.buffer.height() {
            let before = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
            let rotated = transform::rotate_buffer(&self.buffer, dir);
            self.mask = SelectionMask::new(rotated.width(), rotated.height());
            self.buffer = rotated;
            let after = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
            self.history.push(EditCommand::Snapshot {
                description: "Rotate Canvas".to_string(),
                before: Box::new(before),
                after: Box::new(after),
            });
            return Ok(());
        }

        let selection_scoped = !self.mask.is_effectively_empty();
        let region = self.target_region();
        let dest = Region::new(region.x, region.y, region.height, region.width);
        if !dest.fits(self.buffer.width(), self.buffer.height()) {
            return Err(EngineError::TransformOutOfBounds {
                x: dest.x,
                y: dest.y,
                width: dest.width,
                height: dest.height,
            });
        }

        let fill = self.background_sample()?;
        let footprint = region.union(&dest);
        let mask_before = self.mask.clone();
        let before = PixelPatch::capture(&self.buffer, footprint);
        let dest = transform::rotate_region(&mut self.buffer, region, dir, fill)?;
        if selection_scoped {
            self.mask.select_region(dest);
        }
        let after = PixelPatch::capture(&self.buffer, footprint);
        self.history.push(EditCommand::Pixels {
            description: "Rotate".to_string(),
            before,
            after,
            mask: selection_scoped.then(|| Box::new((mask_before, self.mask.clone()))),
        });
        Ok(())
    }

    /// Nearest-neighbor rescale of the selection content — a selection-only
    /// operation.
    pub fn scale_selection(&mut self, new_w: u32, new_h: u32) -> EngineResult<()> {
        let Some(region) = self.mask.bounds() else {
            return Err(EngineError::invalid_argument(
                "scale requires an active selection",
            ));
        };
        if new_w == 0 || new_h == 0 {
            return Err(EngineError::InvalidDimensions { width: new_w, height: new_h });
        }
        let dest = Region::new(region.x, region.y, new_w, new_h);
        if !dest.fits(self.buffer.width(), self.buffer.height()) {
            return Err(EngineError::TransformOutOfBounds {
                x: dest.x,
                y: dest.y,
                width: dest.width,
                height: dest.height,
            });
        }

        let fill = self.background_sample()?;
        let footprint = region.union(&dest);
        let mask_before = self.mask.clone();
        let before = PixelPatch::capture(&self.buffer, footprint);
        let dest = transform::scale_region(&mut self.buffer, region, new_w, new_h, fill)?;
        self.mask.select_region(dest);
        let after = PixelPatch::capture(&self.buffer, footprint);
        self.history.push(EditCommand::Pixels {
            description: "Scale Selection".to_string(),
            before,
            after,
            mask: Some(Box::new((mask_before, self.mask.clone()))),
        });
        Ok(())
    }

    // ---- structural operations ----------------------------------------------

    /// Replace the buffer with a resized copy; old content is placed at
    /// `anchor` and vacated space takes the background colour.  The mask is
    /// reinitialized to empty.
    pub fn resize(&mut self, new_w: u32, new_h: u32, anchor: (Anchor, Anchor)) -> EngineResult<()> {
        let fill = self.background_sample()?;
        let before = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
        let resized = self.buffer.resize(new_w, new_h, anchor, fill)?;
        self.mask = SelectionMask::new(new_w, new_h);
        self.buffer = resized;
        let after = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
        self.history.push(EditCommand::Snapshot {
            description: "Resize Canvas".to_string(),
            before: Box::new(before),
            after: Box::new(after),
        });
        Ok(())
    }

    /// Convert the buffer to indexed colour, growing the palette as needed.
    pub fn convert_to_indexed(&mut self) -> EngineResult<()> {
        if self.buffer.format() == PixelFormat::Indexed {
            return Ok(());
        }
        let before = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
        self.buffer = self.buffer.to_indexed(&mut self.palette)?;
        let after = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
        self.history.push(EditCommand::Snapshot {
            description: "Convert to Indexed".to_string(),
            before: Box::new(before),
            after: Box::new(after),
        });
        Ok(())
    }

    /// Convert the buffer to direct colour by resolving every index.
    pub fn convert_to_direct(&mut self) -> EngineResult<()> {
        if self.buffer.format() == PixelFormat::Direct {
            return Ok(());
        }
        let before = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
        self.buffer = self.buffer.to_direct(&self.palette)?;
        let after = SessionSnapshot::capture(&self.buffer, &self.mask, &self.palette);
        self.history.push(EditCommand::Snapshot {
            description: "Convert to Direct".to_string(),
            before: Box::new(before),
            after: Box::new(after),
        });
        Ok(())
    }

    // ---- palette ------------------------------------------------------------

    /// Append a colour to the palette as a committed edit.  Returns the
    /// (existing or new) index; appending an existing colour commits nothing.
    pub fn add_palette_color(&mut self, color: Rgba<u8>) -> EngineResult<usize> {
        let colors_before = self.palette.colors().to_vec();
        let index = self.palette.push_color(color)?;
        if self.palette.len() == colors_before.len() {
            return Ok(index);
        }
        self.history.push(EditCommand::PaletteEdit {
            description: "Add Palette Color".to_string(),
            colors_before,
            colors_after: self.palette.colors().to_vec(),
            indices_before: None,
            indices_after: None,
        });
        Ok(index)
    }

    /// Remove a palette entry.  Fails with `IndexInUse` while the indexed
    /// buffer still references it; references to higher entries are remapped
    /// atomically with the removal, all as a single command.
    pub fn remove_palette_color(&mut self, index: usize) -> EngineResult<()> {
        if index >= self.palette.len() {
            return Err(EngineError::invalid_argument(format!(
                "palette index {} out of range ({} entries)",
                index,
                self.palette.len()
            )));
        }
        if self.buffer.references_index(index as u8) {
            return Err(EngineError::IndexInUse { index });
        }

        let whole = Region::of_buffer(&self.buffer);
        let indexed = self.buffer.format() == PixelFormat::Indexed;
        let colors_before = self.palette.colors().to_vec();
        let indices_before = indexed.then(|| PixelPatch::capture(&self.buffer, whole));

        self.palette.remove_at(index)?;
        self.buffer.remap_indices_above(index as u8);

        let indices_after = indexed.then(|| PixelPatch::capture(&self.buffer, whole));
        self.history.push(EditCommand::PaletteEdit {
            description: "Remove Palette Color".to_string(),
            colors_before,
            colors_after: self.palette.colors().to_vec(),
            indices_before,
            indices_after,
        });
        Ok(())
    }

    /// Replace the palette with the built-in default.
    pub fn load_default_palette(&mut self) -> EngineResult<()> {
        let mut next = self.palette.clone();
        next.load_default();
        self.replace_palette(next, "Load Default Palette")
    }

    /// Replace the palette from an externally loaded colour list
    /// (duplicates allowed).
    pub fn load_palette(&mut self, colors: Vec<Rgba<u8>>) -> EngineResult<()> {
        let mut next = self.palette.clone();
        next.load_colors(colors)?;
        self.replace_palette(next, "Load Palette")
    }

    fn replace_palette(&mut self, next: Palette, description: &str) -> EngineResult<()> {
        // An indexed buffer must keep resolving: every referenced index has
        // to exist in the incoming palette.
        if let Some(indices) = self.buffer.indices()
            && let Some(&max) = indices.iter().max()
            && max as usize >= next.len()
        {
            return Err(EngineError::IndexInUse { index: max as usize });
        }
        let colors_before = self.palette.colors().to_vec();
        self.palette = next;
        self.history.push(EditCommand::PaletteEdit {
            description: description.to_string(),
            colors_before,
            colors_after: self.palette.colors().to_vec(),
            indices_before: None,
            indices_after: None,
        });
        Ok(())
    }

    // ---- history ------------------------------------------------------------

    pub fn undo(&mut self) -> EngineResult<String> {
        self.history.undo(&mut self.buffer, &mut self.mask, &mut self.palette)
    }

    pub fn redo(&mut self) -> EngineResult<String> {
        self.history.redo(&mut self.buffer, &mut self.mask, &mut self.palette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn session(w: u32, h: u32) -> EditSession {
        EditSession::new(w, h, PixelFormat::Direct, Some(WHITE)).unwrap()
    }

    #[test]
    fn pencil_corners_scenario() {
        // New 4×4 buffer, pencil the 4 corners with red: exactly 4 red
        // pixels, 12 fill pixels; undo restores all 16.
        let mut s = session(4, 4);
        s.set_foreground(RED);
        for corner in [(0, 0), (3, 0), (0, 3), (3, 3)] {
            s.apply_tool(PaintTool::Pencil, &[corner]).unwrap();
        }
        let img = s.export_image().unwrap();
        let red_count = img.pixels().filter(|p| **p == RED).count();
        assert_eq!(red_count, 4);
        assert_eq!(img.pixels().filter(|p| **p == WHITE).count(), 12);

        for _ in 0..4 {
            s.undo().unwrap();
        }
        let img = s.export_image().unwrap();
        assert!(img.pixels().all(|p| *p == WHITE));
        assert_eq!(s.undo(), Err(EngineError::NothingToUndo));
    }

    #[test]
    fn shift_down_on_center_selection_is_noop() {
        // 3×3 buffer, select only the centre pixel: shift(down) is a no-op
        // and pushes nothing.
        let mut s = session(3, 3);
        s.select_with_stroke(&[(1, 1), (1, 1)]).unwrap();
        let commands_before = s.history().undo_count();
        s.shift(ShiftDirection::Down).unwrap();
        assert_eq!(s.history().undo_count(), commands_before);
    }

    #[test]
    fn shift_down_whole_buffer_wraps_rows() {
        let mut s = session(3, 3);
        s.set_foreground(RED);
        s.apply_tool(PaintTool::Pencil, &[(0, 2), (2, 2)]).unwrap();
        s.shift(ShiftDirection::Down).unwrap();
        let img = s.export_image().unwrap();
        // Old bottom row wrapped to the top.
        for x in 0..3 {
            assert_eq!(*img.get_pixel(x, 0), RED);
            assert_eq!(*img.get_pixel(x, 2), WHITE);
        }
    }

    #[test]
    fn masked_out_flood_fill_commits_nothing() {
        let mut s = session(4, 4);
        s.select_with_stroke(&[(3, 3), (3, 3)]).unwrap();
        let commands_before = s.history().undo_count();
        s.set_foreground(RED);
        s.apply_tool(PaintTool::FloodFill, &[(0, 0)]).unwrap();
        assert_eq!(s.history().undo_count(), commands_before);
        assert_eq!(s.redo(), Err(EngineError::NothingToRedo));
    }

    #[test]
    fn rotate_whole_non_square_swaps_dimensions_and_undoes() {
        let mut s = session(4, 2);
        s.set_foreground(RED);
        s.apply_tool(PaintTool::Pencil, &[(0, 1)]).unwrap();
        let before = s.export_image().unwrap();

        s.rotate(RotateDirection::Clockwise).unwrap();
        assert_eq!((s.buffer().width(), s.buffer().height()), (2, 4));
        let rotated = s.export_image().unwrap();
        assert_eq!(*rotated.get_pixel(0, 0), RED);

        s.undo().unwrap();
        assert_eq!((s.buffer().width(), s.buffer().height()), (4, 2));
        assert_eq!(s.export_image().unwrap(), before);
    }

    #[test]
    fn rotate_selection_reshapes_mask_and_backfills() {
        let mut s = session(8, 8);
        s.set_foreground(RED);
        s.apply_tool(PaintTool::Rectangle { filled: true }, &[(0, 0), (3, 1)]).unwrap();
        s.select_with_stroke(&[(0, 0), (3, 1)]).unwrap();
        s.set_background(WHITE);
        s.rotate(RotateDirection::Clockwise).unwrap();

        assert_eq!(s.mask().bounds(), Some(Region::new(0, 0, 2, 4)));
        let img = s.export_image().unwrap();
        assert_eq!(*img.get_pixel(0, 3), RED);
        // Vacated part of the old footprint took the background colour.
        assert_eq!(*img.get_pixel(3, 0), WHITE);

        s.undo().unwrap();
        assert_eq!(s.mask().bounds(), Some(Region::new(0, 0, 4, 2)));
    }

    #[test]
    fn scale_selection_requires_a_selection() {
        let mut s = session(4, 4);
        assert!(matches!(
            s.scale_selection(2, 2),
            Err(EngineError::InvalidArgument(_))
        ));

        s.select_with_stroke(&[(0, 0), (1, 1)]).unwrap();
        assert!(matches!(
            s.scale_selection(0, 2),
            Err(EngineError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            s.scale_selection(8, 8),
            Err(EngineError::TransformOutOfBounds { .. })
        ));

        s.set_foreground(RED);
        s.apply_tool(PaintTool::Rectangle { filled: true }, &[(0, 0), (1, 1)]).unwrap();
        s.scale_selection(4, 4).unwrap();
        let img = s.export_image().unwrap();
        assert_eq!(*img.get_pixel(3, 3), RED);
        assert_eq!(s.mask().bounds(), Some(Region::new(0, 0, 4, 4)));
    }

    #[test]
    fn additive_mode_is_per_call_site() {
        let mut s = session(2, 1);
        s.set_foreground(Rgba([10, 20, 30, 128]));

        s.apply_tool_with_mode(PaintTool::Pencil, &[(0, 0)], BlendMode::Replace).unwrap();
        let img = s.export_image().unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgba([10, 20, 30, 128]));

        s.apply_tool_with_mode(PaintTool::Pencil, &[(1, 0)], BlendMode::Additive).unwrap();
        let img = s.export_image().unwrap();
        // White + translucent source clamps at channel max.
        assert_eq!(*img.get_pixel(1, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn gradient_fill_spans_target_region() {
        let mut s = session(1, 3);
        s.set_foreground(Rgba([0, 0, 0, 255]));
        s.set_background(Rgba([100, 100, 100, 255]));
        s.apply_gradient_fill().unwrap();
        let img = s.export_image().unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(0, 1), Rgba([50, 50, 50, 255]));
        assert_eq!(*img.get_pixel(0, 2), Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn eyedropper_updates_foreground_without_command() {
        let mut s = session(2, 2);
        s.set_foreground(RED);
        s.apply_tool(PaintTool::Pencil, &[(1, 1)]).unwrap();
        let commands = s.history().undo_count();

        s.set_foreground(Rgba([1, 2, 3, 255]));
        let picked = s.pick_color(&[(1, 1)]).unwrap();
        assert_eq!(picked, Some(RED));
        assert_eq!(s.colors().foreground, RED);
        assert_eq!(s.history().undo_count(), commands);
    }

    #[test]
    fn resize_resets_mask_and_undoes_exactly() {
        let mut s = session(2, 2);
        s.set_foreground(RED);
        s.apply_tool(PaintTool::Pencil, &[(0, 0)]).unwrap();
        s.select_with_stroke(&[(0, 0), (1, 1)]).unwrap();
        let before = s.export_image().unwrap();

        s.resize(4, 4, (Anchor::Start, Anchor::Start)).unwrap();
        assert_eq!(s.buffer().width(), 4);
        assert!(s.mask().is_effectively_empty());

        s.undo().unwrap();
        assert_eq!(s.buffer().width(), 2);
        assert_eq!(s.export_image().unwrap(), before);
        assert!(!s.mask().is_effectively_empty());
    }

    #[test]
    fn indexed_session_remove_palette_color_remaps_atomically() {
        let mut s = EditSession::new(2, 2, PixelFormat::Indexed, Some(WHITE)).unwrap();
        s.set_foreground(RED);
        s.apply_tool(PaintTool::Pencil, &[(0, 0)]).unwrap();
        // Palette now: [white, red] with red referenced at (0, 0).
        assert_eq!(s.palette().len(), 2);
        assert_eq!(s.remove_palette_color(1), Err(EngineError::IndexInUse { index: 1 }));

        // Paint over the red pixel, then removal remaps the survivors.
        s.set_foreground(WHITE);
        s.apply_tool_with_mode(PaintTool::Pencil, &[(0, 0)], BlendMode::Replace).unwrap();
        s.remove_palette_color(1).unwrap();
        assert_eq!(s.palette().colors(), &[WHITE]);
        assert_eq!(s.buffer().get(0, 0).unwrap(), Sample::Index(0));

        // Single-step undo restores palette and index grid together.
        s.undo().unwrap();
        assert_eq!(s.palette().len(), 2);
    }

    #[test]
    fn swap_colors_swaps_the_pair() {
        let mut s = session(1, 1);
        s.set_foreground(RED);
        s.set_background(WHITE);
        s.swap_colors();
        assert_eq!(s.colors().foreground, WHITE);
        assert_eq!(s.colors().background, RED);
    }

    #[test]
    fn load_image_clears_history() {
        let mut s = session(2, 2);
        s.set_foreground(RED);
        s.apply_tool(PaintTool::Pencil, &[(0, 0)]).unwrap();
        assert!(s.history().can_undo());

        s.load_image(RgbaImage::from_pixel(3, 3, WHITE)).unwrap();
        assert_eq!(s.buffer().width(), 3);
        assert!(!s.history().can_undo());
    }
}
