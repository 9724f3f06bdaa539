// ============================================================================
// COMMAND & HISTORY — patch-based, fully reversible edit records
// ============================================================================

use std::collections::VecDeque;

use image::Rgba;

use crate::canvas::{PixelBuffer, Region, Sample, SelectionMask};
use crate::error::{EngineError, EngineResult};
use crate::palette::Palette;

// ============================================================================
// PIXEL PATCH — bounding-rect sample capture for efficient undo/redo
// ============================================================================

/// A rectangular run of samples captured from a buffer.  Undoing or redoing
/// a pixel command costs O(patch area), not O(buffer area).
#[derive(Clone, Debug)]
pub struct PixelPatch {
    region: Region,
    samples: Vec<Sample>,
}

impl PixelPatch {
    /// Capture the samples of `region`.  The region must lie inside the
    /// buffer (commands are built from regions the engine just validated).
    pub fn capture(buffer: &PixelBuffer, region: Region) -> Self {
        Self {
            region,
            samples: buffer.samples_in(region),
        }
    }

    /// Write the captured samples back.
    pub fn apply(&self, buffer: &mut PixelBuffer) {
        buffer.write_samples(self.region, &self.samples);
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<Sample>()
    }
}

// ============================================================================
// SESSION SNAPSHOT — full-state capture for structural operations
// ============================================================================

/// Complete capture of buffer + mask + palette, used by operations that
/// replace the buffer wholesale (whole-buffer rotate, resize, format
/// conversion).  These are the documented O(buffer) exceptions to the
/// O(region) undo cost.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub buffer: PixelBuffer,
    pub mask: SelectionMask,
    pub palette: Palette,
}

impl SessionSnapshot {
    pub fn capture(buffer: &PixelBuffer, mask: &SelectionMask, palette: &Palette) -> Self {
        Self {
            buffer: buffer.clone(),
            mask: mask.clone(),
            palette: palette.clone(),
        }
    }

    pub fn restore_into(&self, buffer: &mut PixelBuffer, mask: &mut SelectionMask, palette: &mut Palette) {
        *buffer = self.buffer.clone();
        *mask = self.mask.clone();
        *palette = self.palette.clone();
    }

    fn memory_size(&self) -> usize {
        self.buffer.width() as usize * self.buffer.height() as usize * 5
            + self.mask.width() as usize * self.mask.height() as usize
            + self.palette.len() * 4
    }
}

// ============================================================================
// EDIT COMMAND — closed set of reversible mutation records
// ============================================================================

/// One committed, immutable mutation.  A closed enum rather than a trait
/// hierarchy: each variant carries exactly the data needed to compute its
/// inverse, which keeps history replay deterministic.
#[derive(Clone, Debug)]
pub enum EditCommand {
    /// Pixel writes inside a bounding rectangle, with an optional mask pair
    /// for transforms that reshape the selection alongside the pixels.
    Pixels {
        description: String,
        before: PixelPatch,
        after: PixelPatch,
        mask: Option<Box<(SelectionMask, SelectionMask)>>,
    },
    /// Selection change only — produced by the selection tool and the mask
    /// operations (clear, invert, auto-mask).
    MaskReplace {
        description: String,
        before: SelectionMask,
        after: SelectionMask,
    },
    /// Whole-state replacement for structural operations.
    Snapshot {
        description: String,
        before: Box<SessionSnapshot>,
        after: Box<SessionSnapshot>,
    },
    /// Palette content change, with the index-grid patches of an indexed
    /// buffer when a removal forced an atomic remap.
    PaletteEdit {
        description: String,
        colors_before: Vec<Rgba<u8>>,
        colors_after: Vec<Rgba<u8>>,
        indices_before: Option<PixelPatch>,
        indices_after: Option<PixelPatch>,
    },
}

impl EditCommand {
    pub fn undo(&self, buffer: &mut PixelBuffer, mask: &mut SelectionMask, palette: &mut Palette) {
        match self {
            EditCommand::Pixels { before, mask: mask_pair, .. } => {
                before.apply(buffer);
                if let Some(pair) = mask_pair {
                    *mask = pair.0.clone();
                }
            }
            EditCommand::MaskReplace { before, .. } => {
                *mask = before.clone();
            }
            EditCommand::Snapshot { before, .. } => {
                before.restore_into(buffer, mask, palette);
            }
            EditCommand::PaletteEdit { colors_before, indices_before, .. } => {
                palette.set_colors(colors_before.clone());
                if let Some(patch) = indices_before {
                    patch.apply(buffer);
                }
            }
        }
    }

    pub fn redo(&self, buffer: &mut PixelBuffer, mask: &mut SelectionMask, palette: &mut Palette) {
        match self {
            EditCommand::Pixels { after, mask: mask_pair, .. } => {
                after.apply(buffer);
                if let Some(pair) = mask_pair {
                    *mask = pair.1.clone();
                }
            }
            EditCommand::MaskReplace { after, .. } => {
                *mask = after.clone();
            }
            EditCommand::Snapshot { after, .. } => {
                after.restore_into(buffer, mask, palette);
            }
            EditCommand::PaletteEdit { colors_after, indices_after, .. } => {
                palette.set_colors(colors_after.clone());
                if let Some(patch) = indices_after {
                    patch.apply(buffer);
                }
            }
        }
    }

    pub fn description(&self) -> &str {
        match self {
            EditCommand::Pixels { description, .. }
            | EditCommand::MaskReplace { description, .. }
            | EditCommand::Snapshot { description, .. }
            | EditCommand::PaletteEdit { description, .. } => description,
        }
    }

    pub fn memory_size(&self) -> usize {
        match self {
            EditCommand::Pixels { before, after, mask, .. } => {
                before.memory_size()
                    + after.memory_size()
                    + mask.as_ref().map_or(0, |pair| {
                        (pair.0.width() as usize * pair.0.height() as usize) * 2
                    })
            }
            EditCommand::MaskReplace { before, .. } => {
                before.width() as usize * before.height() as usize * 2
            }
            EditCommand::Snapshot { before, after, .. } => before.memory_size() + after.memory_size(),
            EditCommand::PaletteEdit { colors_before, colors_after, indices_before, indices_after, .. } => {
                (colors_before.len() + colors_after.len()) * 4
                    + indices_before.as_ref().map_or(0, |p| p.memory_size())
                    + indices_after.as_ref().map_or(0, |p| p.memory_size())
            }
        }
    }
}

// ============================================================================
// HISTORY STACK — undo/redo with count and memory limits
// ============================================================================

/// Ordered record of committed commands.  Pushing a new command truncates
/// anything redoable; count and byte caps prune from the oldest end, which
/// never breaks replay because every command is self-contained.
pub struct HistoryStack {
    undo_stack: VecDeque<EditCommand>,
    redo_stack: VecDeque<EditCommand>,
    max_commands: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(64)
    }
}

impl HistoryStack {
    pub fn new(max_commands: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_commands,
            max_memory_bytes: Some(256 * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// Commit a command: clears the redo tail, records, prunes.
    pub fn push(&mut self, command: EditCommand) {
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }
        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);
        self.prune();
    }

    /// Revert the most recent command.  Returns its description.
    pub fn undo(
        &mut self,
        buffer: &mut PixelBuffer,
        mask: &mut SelectionMask,
        palette: &mut Palette,
    ) -> EngineResult<String> {
        let command = self.undo_stack.pop_back().ok_or(EngineError::NothingToUndo)?;
        let description = command.description().to_string();
        command.undo(buffer, mask, palette);
        self.redo_stack.push_back(command);
        Ok(description)
    }

    /// Re-apply the most recently undone command.  Returns its description.
    pub fn redo(
        &mut self,
        buffer: &mut PixelBuffer,
        mask: &mut SelectionMask,
        palette: &mut Palette,
    ) -> EngineResult<String> {
        let command = self.redo_stack.pop_back().ok_or(EngineError::NothingToRedo)?;
        let description = command.description().to_string();
        command.redo(buffer, mask, palette);
        self.undo_stack.push_back(command);
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// All undoable descriptions, most recent first.
    pub fn descriptions(&self) -> Vec<&str> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    /// Current memory usage of the history (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Cleared when new document content is loaded — never on save.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Prune old commands to stay within limits.
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_commands {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }
}
