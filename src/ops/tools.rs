// ============================================================================
// TOOL OPERATIONS — stateless stroke → pixel-write-set functions
// ============================================================================
//
// Every tool consumes an input stroke (ordered canvas coordinates from
// pointer-down to pointer-up), the active colour, and the selection mask,
// and produces a `PixelWrites` set that the session composites and commits.
// Off-canvas stroke points are clipped per point; masked-out points are
// skipped silently.  No tool touches the buffer directly.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};

use crate::canvas::{PixelBuffer, Region, SelectionMask};
use crate::error::EngineResult;
use crate::palette::Palette;

// ============================================================================
// PIXEL WRITE SET
// ============================================================================

/// Deduplicated coordinate→colour set with a running bounding box.
/// Re-pushing a coordinate keeps its position in the set but takes the new
/// colour (last write wins).
#[derive(Clone, Debug, Default)]
pub struct PixelWrites {
    points: Vec<((u32, u32), Rgba<u8>)>,
    index: HashMap<(u32, u32), usize>,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl PixelWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if let Some(&i) = self.index.get(&(x, y)) {
            self.points[i].1 = color;
            return;
        }
        if self.points.is_empty() {
            self.min_x = x;
            self.min_y = y;
            self.max_x = x;
            self.max_y = y;
        } else {
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }
        self.index.insert((x, y), self.points.len());
        self.points.push(((x, y), color));
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Bounding rectangle of the touched pixels, or `None` when empty.
    pub fn bounds(&self) -> Option<Region> {
        if self.points.is_empty() {
            return None;
        }
        Some(Region::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = &((u32, u32), Rgba<u8>)> {
        self.points.iter()
    }
}

/// Clip a candidate write against the buffer rectangle and the mask, then
/// record it.  The per-point equivalent of a bounds-checked SetPixel.
fn plot(writes: &mut PixelWrites, x: i32, y: i32, color: Rgba<u8>, buffer: &PixelBuffer, mask: &SelectionMask) {
    if buffer.in_bounds(x, y) && mask.allows(x as u32, y as u32) {
        writes.push(x as u32, y as u32, color);
    }
}

// ============================================================================
// SCAN-CONVERSION PRIMITIVES
// ============================================================================

/// Integer Bresenham walk from `p0` to `p1`, inclusive of both endpoints.
fn bresenham(p0: (i32, i32), p1: (i32, i32), mut emit: impl FnMut(i32, i32)) {
    let (mut x1, mut y1) = p0;
    let (x2, y2) = p1;

    let dx = x2 - x1;
    let ix = dx.signum();
    let delta_x = dx.abs() << 1;

    let dy = y2 - y1;
    let iy = dy.signum();
    let delta_y = dy.abs() << 1;

    emit(x1, y1);

    if delta_x >= delta_y {
        let mut error = delta_y - (delta_x >> 1);
        while x1 != x2 {
            if error >= 0 && (error != 0 || ix > 0) {
                error -= delta_x;
                y1 += iy;
            }
            error += delta_y;
            x1 += ix;
            emit(x1, y1);
        }
    } else {
        let mut error = delta_x - (delta_y >> 1);
        while y1 != y2 {
            if error >= 0 && (error != 0 || iy > 0) {
                error -= delta_y;
                x1 += ix;
            }
            error += delta_x;
            y1 += iy;
            emit(x1, y1);
        }
    }
}

// ============================================================================
// PAINT TOOLS
// ============================================================================

/// Freehand pencil: every stroke coordinate gets `color`, with consecutive
/// samples joined by line segments so fast drags leave no gaps.
pub fn pencil(
    stroke: &[(i32, i32)],
    color: Rgba<u8>,
    buffer: &PixelBuffer,
    mask: &SelectionMask,
) -> PixelWrites {
    let mut writes = PixelWrites::new();
    match stroke {
        [] => {}
        [p] => plot(&mut writes, p.0, p.1, color, buffer, mask),
        _ => {
            for pair in stroke.windows(2) {
                bresenham(pair[0], pair[1], |x, y| plot(&mut writes, x, y, color, buffer, mask));
            }
        }
    }
    writes
}

/// Straight line between the stroke's first and last coordinate;
/// intermediate stroke points are ignored.
pub fn line(
    stroke: &[(i32, i32)],
    color: Rgba<u8>,
    buffer: &PixelBuffer,
    mask: &SelectionMask,
) -> PixelWrites {
    let mut writes = PixelWrites::new();
    let (Some(first), Some(last)) = (stroke.first(), stroke.last()) else {
        return writes;
    };
    bresenham(*first, *last, |x, y| plot(&mut writes, x, y, color, buffer, mask));
    writes
}

/// Axis-aligned rectangle spanned by the stroke's first and last coordinate.
/// A degenerate (one-pixel-wide or -tall) box collapses to a line or point.
pub fn rectangle(
    stroke: &[(i32, i32)],
    color: Rgba<u8>,
    filled: bool,
    buffer: &PixelBuffer,
    mask: &SelectionMask,
) -> PixelWrites {
    let mut writes = PixelWrites::new();
    let (Some(first), Some(last)) = (stroke.first(), stroke.last()) else {
        return writes;
    };
    let x0 = first.0.min(last.0);
    let y0 = first.1.min(last.1);
    let x1 = first.0.max(last.0);
    let y1 = first.1.max(last.1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            if filled || x == x0 || x == x1 || y == y0 || y == y1 {
                plot(&mut writes, x, y, color, buffer, mask);
            }
        }
    }
    writes
}

/// Ellipse inscribed in the stroke's bounding box, via the integer midpoint
/// algorithm with 4-way symmetry and an even-size correction so even widths
/// and heights fill their box exactly.  Degenerate boxes collapse to a line.
pub fn ellipse(
    stroke: &[(i32, i32)],
    color: Rgba<u8>,
    filled: bool,
    buffer: &PixelBuffer,
    mask: &SelectionMask,
) -> PixelWrites {
    let mut writes = PixelWrites::new();
    let (Some(first), Some(last)) = (stroke.first(), stroke.last()) else {
        return writes;
    };
    let x0 = first.0.min(last.0);
    let y0 = first.1.min(last.1);
    let w = (first.0 - last.0).abs() + 1;
    let h = (first.1 - last.1).abs() + 1;

    // One-pixel-wide or -tall box: the ellipse degenerates to a line.
    if w == 1 || h == 1 {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                plot(&mut writes, x, y, color, buffer, mask);
            }
        }
        return writes;
    }

    let c = (x0 + (w - 1) / 2, y0 + (h - 1) / 2);
    // Correction for even extents, where the true centre falls between cells.
    let e = (1 - w % 2, 1 - h % 2);
    let r_x = w / 2;
    let r_y = h / 2;

    let mut plot4 = |p: (i32, i32), writes: &mut PixelWrites| {
        let p1 = (c.0 + p.0, c.1 + p.1);
        let p2 = (c.0 - p.0 + e.0, c.1 - p.1 + e.1);
        plot(writes, p1.0, p1.1, color, buffer, mask);
        plot(writes, p2.0, p2.1, color, buffer, mask);
        plot(writes, p1.0, p2.1, color, buffer, mask);
        plot(writes, p2.0, p1.1, color, buffer, mask);
    };

    let two_a_square = 2 * r_x * r_x;
    let two_b_square = 2 * r_y * r_y;

    // Horizontal portion: flat arcs near the equator.
    let mut x = r_x;
    let mut y = 0;
    let mut x_change = r_y * r_y * (1 - 2 * r_x);
    let mut y_change = r_x * r_x;
    let mut ellipse_error = 0;
    let mut stopping_x = two_b_square * r_x;
    let mut stopping_y = 0;
    let mut last_h = (x, y);

    while stopping_x >= stopping_y {
        last_h = (x, y);
        if filled {
            for i in 0..=last_h.0 {
                plot4((i, last_h.1), &mut writes);
            }
        } else {
            plot4(last_h, &mut writes);
        }
        y += 1;
        stopping_y += two_a_square;
        ellipse_error += y_change;
        y_change += two_a_square;
        if 2 * ellipse_error + x_change > 0 {
            x -= 1;
            stopping_x -= two_b_square;
            ellipse_error += x_change;
            x_change += two_b_square;
        }
    }

    // Vertical portion: steep arcs near the poles.
    let mut x = 0;
    let mut y = r_y;
    let mut x_change = r_y * r_y;
    let mut y_change = r_x * r_x * (1 - 2 * r_y);
    let mut ellipse_error = 0;
    let mut stopping_x = 0;
    let mut stopping_y = two_a_square * r_y;
    let mut last_v = (x, y);

    while stopping_x <= stopping_y {
        last_v = (x, y);
        if filled {
            for i in 0..=last_v.1 {
                plot4((last_v.0, i), &mut writes);
            }
        } else {
            plot4(last_v, &mut writes);
        }
        x += 1;
        stopping_x += two_b_square;
        ellipse_error += x_change;
        x_change += two_b_square;
        if 2 * ellipse_error + y_change > 0 {
            y -= 1;
            stopping_y -= two_a_square;
            ellipse_error += y_change;
            y_change += two_a_square;
        }
    }

    // The two arc families can leave a diagonal gap; bridge it.
    if (last_h.0 - last_v.0).abs() > 1 || (last_h.1 - last_v.1).abs() > 1 {
        bresenham(last_h, last_v, |bx, by| plot4((bx, by), &mut writes));
    }

    writes
}

/// Vertical two-colour gradient across `region`: row `i` takes `colors[i]`.
/// `colors` must hold exactly `region.height` entries.
pub fn gradient_fill(
    region: Region,
    colors: &[Rgba<u8>],
    buffer: &PixelBuffer,
    mask: &SelectionMask,
) -> PixelWrites {
    debug_assert_eq!(colors.len(), region.height as usize);
    let mut writes = PixelWrites::new();
    for (i, color) in colors.iter().enumerate() {
        let y = region.y + i as u32;
        for x in region.x..region.right() {
            plot(&mut writes, x as i32, y as i32, *color, buffer, mask);
        }
    }
    writes
}

// ============================================================================
// FLOOD FILL
// ============================================================================

/// Flood-fill the 4-connected run of pixels whose colour exactly equals the
/// seed pixel's original colour, bounded by the mask when one is active.
///
/// Silent no-ops (empty write-set): seed off-canvas, seed masked out, or
/// seed already `replacement` (idempotence).
pub fn flood_fill(
    flat: &RgbaImage,
    seed: (i32, i32),
    replacement: Rgba<u8>,
    mask: &SelectionMask,
) -> PixelWrites {
    let mut writes = PixelWrites::new();
    let w = flat.width();
    let h = flat.height();
    if seed.0 < 0 || seed.1 < 0 || seed.0 as u32 >= w || seed.1 as u32 >= h {
        return writes;
    }
    let (sx, sy) = (seed.0 as u32, seed.1 as u32);
    if !mask.allows(sx, sy) {
        return writes;
    }
    let old = *flat.get_pixel(sx, sy);
    if old == replacement {
        return writes;
    }

    let wu = w as usize;
    // visited doubles as the membership set; the stack stores packed flat
    // indices (y * width + x) to avoid tuple overhead.
    let mut visited = vec![false; wu * h as usize];
    let mut stack: Vec<u32> = Vec::with_capacity(4096);

    let seed_idx = sy as usize * wu + sx as usize;
    visited[seed_idx] = true;
    stack.push(seed_idx as u32);
    writes.push(sx, sy, replacement);

    while let Some(idx) = stack.pop() {
        let x = (idx as usize % wu) as u32;
        let y = (idx as usize / wu) as u32;

        let mut visit = |nx: u32, ny: u32, ni: usize, visited: &mut Vec<bool>, stack: &mut Vec<u32>, writes: &mut PixelWrites| {
            if !visited[ni] && mask.allows(nx, ny) && *flat.get_pixel(nx, ny) == old {
                visited[ni] = true;
                stack.push(ni as u32);
                writes.push(nx, ny, replacement);
            }
        };

        if x > 0 {
            visit(x - 1, y, idx as usize - 1, &mut visited, &mut stack, &mut writes);
        }
        if x + 1 < w {
            visit(x + 1, y, idx as usize + 1, &mut visited, &mut stack, &mut writes);
        }
        if y > 0 {
            visit(x, y - 1, idx as usize - wu, &mut visited, &mut stack, &mut writes);
        }
        if y + 1 < h {
            visit(x, y + 1, idx as usize + wu, &mut visited, &mut stack, &mut writes);
        }
    }

    writes
}

// ============================================================================
// NON-PAINT TOOLS
// ============================================================================

/// Selection tool: the stroke's bounding box becomes the new mask content
/// (replacing any prior selection).  Returns the clamped region, or `None`
/// for an empty stroke.
pub fn selection_rect(stroke: &[(i32, i32)], width: u32, height: u32) -> Option<Region> {
    let (first, last) = (stroke.first()?, stroke.last()?);
    Region::from_points(*first, *last, width, height)
}

/// Eyedropper: the colour under the stroke's first coordinate, or `None`
/// when the stroke is empty or off-canvas.  Produces no command.
pub fn eyedropper(
    stroke: &[(i32, i32)],
    buffer: &PixelBuffer,
    palette: &Palette,
) -> EngineResult<Option<Rgba<u8>>> {
    let Some(&(x, y)) = stroke.first() else {
        return Ok(None);
    };
    if !buffer.in_bounds(x, y) {
        return Ok(None);
    }
    buffer.color_at(x as u32, y as u32, palette).map(Some)
}
