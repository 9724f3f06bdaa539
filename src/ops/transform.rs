// ============================================================================
// TRANSFORM OPERATIONS — shift, flip, rotate, scale over a target region
// ============================================================================
//
// Every transform is one atomic step over the selection's bounding region
// (or the whole buffer when no selection exists) and holds no state between
// calls.  Transforms move committed samples verbatim — no blending — so the
// session can capture exact before/after patches for undo.

use rayon::prelude::*;

use crate::canvas::{PixelBuffer, Region, Sample};
use crate::error::{EngineError, EngineResult};

/// Direction of a one-unit toroidal shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Mirror axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Quarter-turn direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotateDirection {
    Clockwise,
    CounterClockwise,
}

// ---------------------------------------------------------------------------
//  Shift / flip — region-preserving permutations
// ---------------------------------------------------------------------------

/// Shift the region's content one unit toroidally: rows/columns leaving one
/// edge re-enter at the opposite edge.  Returns `false` (buffer untouched)
/// when the region has extent 1 along the shift axis, which makes the shift
/// the identity.
pub fn shift(buffer: &mut PixelBuffer, region: Region, dir: ShiftDirection) -> bool {
    let w = region.width as usize;
    let h = region.height as usize;
    match dir {
        ShiftDirection::Left | ShiftDirection::Right if w == 1 => return false,
        ShiftDirection::Up | ShiftDirection::Down if h == 1 => return false,
        _ => {}
    }

    let src = buffer.samples_in(region);
    let mut dst = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let (sx, sy) = match dir {
                ShiftDirection::Left => ((x + 1) % w, y),
                ShiftDirection::Right => ((x + w - 1) % w, y),
                ShiftDirection::Up => (x, (y + 1) % h),
                ShiftDirection::Down => (x, (y + h - 1) % h),
            };
            dst.push(src[sy * w + sx]);
        }
    }
    buffer.write_samples(region, &dst);
    true
}

/// Mirror the region's content along the chosen axis.
pub fn flip(buffer: &mut PixelBuffer, region: Region, axis: FlipAxis) {
    let w = region.width as usize;
    let h = region.height as usize;
    let src = buffer.samples_in(region);
    let mut dst = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let (sx, sy) = match axis {
                FlipAxis::Horizontal => (w - 1 - x, y),
                FlipAxis::Vertical => (x, h - 1 - y),
            };
            dst.push(src[sy * w + sx]);
        }
    }
    buffer.write_samples(region, &dst);
}

// ---------------------------------------------------------------------------
//  Rotate
// ---------------------------------------------------------------------------

/// Rotate the region's content 90° in place, anchored at the region's
/// top-left corner.  For a non-square region the destination has swapped
/// dimensions and must fit the buffer, else `TransformOutOfBounds`; cells of
/// the old region not covered by the destination take `fill`.
///
/// Returns the destination region (equal to `region` when square).
pub fn rotate_region(
    buffer: &mut PixelBuffer,
    region: Region,
    dir: RotateDirection,
    fill: Sample,
) -> EngineResult<Region> {
    let dest = Region::new(region.x, region.y, region.height, region.width);
    if !dest.fits(buffer.width(), buffer.height()) {
        return Err(EngineError::TransformOutOfBounds {
            x: dest.x,
            y: dest.y,
            width: dest.width,
            height: dest.height,
        });
    }

    let w = region.width as usize;
    let h = region.height as usize;
    let src = buffer.samples_in(region);

    // Destination is h×w; map each destination cell back to its source.
    let mut dst = Vec::with_capacity(src.len());
    for y in 0..w {
        for x in 0..h {
            let (sx, sy) = match dir {
                RotateDirection::Clockwise => (y, h - 1 - x),
                RotateDirection::CounterClockwise => (w - 1 - y, x),
            };
            dst.push(src[sy * w + sx]);
        }
    }

    // Backfill the vacated part of the old footprint before placing the
    // rotated content.
    if dest != region {
        let blank = vec![fill; region.area()];
        buffer.write_samples(region, &blank);
    }
    buffer.write_samples(dest, &dst);
    Ok(dest)
}

/// Rotate a whole buffer 90°, producing a new buffer with swapped
/// dimensions.  The caller commits this as a compound resize+transform step.
pub fn rotate_buffer(buffer: &PixelBuffer, dir: RotateDirection) -> PixelBuffer {
    let w = buffer.width();
    let h = buffer.height();
    let samples: Vec<Sample> = (0..w)
        .into_par_iter()
        .flat_map_iter(|row| {
            // Destination is h wide and w tall; `row` walks destination rows.
            (0..h).map(move |col| {
                let (sx, sy) = match dir {
                    RotateDirection::Clockwise => (row, h - 1 - col),
                    RotateDirection::CounterClockwise => (w - 1 - row, col),
                };
                buffer.at(sx, sy)
            })
        })
        .collect();

    let mut out = buffer.blank_like(h, w);
    out.write_samples(Region::of_buffer(&out), &samples);
    out
}

// ---------------------------------------------------------------------------
//  Scale
// ---------------------------------------------------------------------------

/// Resample the region's content to `new_w`×`new_h` with nearest-neighbor
/// sampling (hard pixel edges), anchored at the region's top-left corner.
/// Vacated cells of the old footprint take `fill`.
///
/// Fails with `InvalidDimensions` on a zero target dimension and
/// `TransformOutOfBounds` when the target does not fit the buffer.
pub fn scale_region(
    buffer: &mut PixelBuffer,
    region: Region,
    new_w: u32,
    new_h: u32,
    fill: Sample,
) -> EngineResult<Region> {
    if new_w == 0 || new_h == 0 {
        return Err(EngineError::InvalidDimensions { width: new_w, height: new_h });
    }
    let dest = Region::new(region.x, region.y, new_w, new_h);
    if !dest.fits(buffer.width(), buffer.height()) {
        return Err(EngineError::TransformOutOfBounds {
            x: dest.x,
            y: dest.y,
            width: dest.width,
            height: dest.height,
        });
    }

    let w = region.width as usize;
    let src = buffer.samples_in(region);

    let mut dst = Vec::with_capacity(dest.area());
    for y in 0..new_h as usize {
        let sy = y * region.height as usize / new_h as usize;
        for x in 0..new_w as usize {
            let sx = x * w / new_w as usize;
            dst.push(src[sy * w + sx]);
        }
    }

    if dest != region {
        let blank = vec![fill; region.area()];
        buffer.write_samples(region, &blank);
    }
    buffer.write_samples(dest, &dst);
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn numbered_buffer(w: u32, h: u32) -> PixelBuffer {
        // Each pixel tagged with its coordinates for exact position checks.
        let mut buf = PixelBuffer::new_direct(w, h, None).unwrap();
        for y in 0..h {
            for x in 0..w {
                buf.put(x, y, Sample::Direct(Rgba([x as u8, y as u8, 0, 255])));
            }
        }
        buf
    }

    fn tag(buf: &PixelBuffer, x: u32, y: u32) -> (u8, u8) {
        match buf.at(x, y) {
            Sample::Direct(c) => (c.0[0], c.0[1]),
            Sample::Index(_) => unreachable!(),
        }
    }

    #[test]
    fn shift_down_wraps_rows() {
        let mut buf = numbered_buffer(3, 3);
        let region = Region::of_buffer(&buf);
        assert!(shift(&mut buf, region, ShiftDirection::Down));
        // Row 2 becomes old row 1, row 0 becomes old row 2.
        assert_eq!(tag(&buf, 0, 2), (0, 1));
        assert_eq!(tag(&buf, 0, 0), (0, 2));
        assert_eq!(tag(&buf, 1, 1), (1, 0));
    }

    #[test]
    fn shift_left_then_right_is_identity() {
        let mut buf = numbered_buffer(4, 3);
        let original = buf.clone();
        let region = Region::of_buffer(&buf);
        assert!(shift(&mut buf, region, ShiftDirection::Left));
        assert!(shift(&mut buf, region, ShiftDirection::Right));
        assert_eq!(buf, original);
    }

    #[test]
    fn shift_is_noop_on_unit_extent() {
        let mut buf = numbered_buffer(3, 3);
        let original = buf.clone();
        assert!(!shift(&mut buf, Region::new(1, 1, 1, 1), ShiftDirection::Down));
        assert!(!shift(&mut buf, Region::new(0, 0, 1, 3), ShiftDirection::Left));
        assert_eq!(buf, original);
    }

    #[test]
    fn flip_twice_is_identity() {
        let mut buf = numbered_buffer(5, 4);
        let original = buf.clone();
        let region = Region::new(1, 0, 3, 4);
        flip(&mut buf, region, FlipAxis::Horizontal);
        assert_ne!(buf, original);
        flip(&mut buf, region, FlipAxis::Horizontal);
        assert_eq!(buf, original);

        flip(&mut buf, region, FlipAxis::Vertical);
        flip(&mut buf, region, FlipAxis::Vertical);
        assert_eq!(buf, original);
    }

    #[test]
    fn flip_mirrors_positions() {
        let mut buf = numbered_buffer(3, 1);
        let region = Region::of_buffer(&buf);
        flip(&mut buf, region, FlipAxis::Horizontal);
        assert_eq!(tag(&buf, 0, 0), (2, 0));
        assert_eq!(tag(&buf, 2, 0), (0, 0));
    }

    #[test]
    fn rotate_square_region_four_times_is_identity() {
        let mut buf = numbered_buffer(6, 6);
        let original = buf.clone();
        let region = Region::new(1, 1, 4, 4);
        let fill = Sample::Direct(Rgba([0, 0, 0, 0]));
        for _ in 0..4 {
            let dest = rotate_region(&mut buf, region, RotateDirection::Clockwise, fill).unwrap();
            assert_eq!(dest, region);
        }
        assert_eq!(buf, original);
    }

    #[test]
    fn rotate_cw_moves_top_left_to_top_right() {
        let mut buf = numbered_buffer(3, 3);
        let region = Region::of_buffer(&buf);
        rotate_region(&mut buf, region, RotateDirection::Clockwise, Sample::Direct(Rgba([0; 4]))).unwrap();
        // Old (0,0) lands at (2,0); old (2,0) lands at (2,2).
        assert_eq!(tag(&buf, 2, 0), (0, 0));
        assert_eq!(tag(&buf, 2, 2), (2, 0));
        assert_eq!(tag(&buf, 1, 1), (1, 1));
    }

    #[test]
    fn rotate_non_square_region_backfills_and_checks_fit() {
        let fill = Sample::Direct(Rgba([9, 9, 9, 255]));
        let mut buf = numbered_buffer(8, 8);
        // 4×2 region rotates into a 2×4 footprint.
        let dest = rotate_region(&mut buf, Region::new(0, 0, 4, 2), RotateDirection::Clockwise, fill).unwrap();
        assert_eq!(dest, Region::new(0, 0, 2, 4));
        // CW: source (0, 1) (bottom-left) becomes the new top-left.
        assert_eq!(tag(&buf, 0, 0), (0, 1));
        // Vacated cells of the old 4×2 footprint took the fill colour.
        assert_eq!(tag(&buf, 3, 0), (9, 9));

        // A 4×2 region near the bottom edge cannot take a 2×4 footprint.
        let mut buf = numbered_buffer(8, 8);
        assert!(matches!(
            rotate_region(&mut buf, Region::new(0, 6, 4, 2), RotateDirection::Clockwise, fill),
            Err(EngineError::TransformOutOfBounds { .. })
        ));
    }

    #[test]
    fn rotate_buffer_swaps_dimensions_and_inverts() {
        let buf = numbered_buffer(4, 2);
        let cw = rotate_buffer(&buf, RotateDirection::Clockwise);
        assert_eq!((cw.width(), cw.height()), (2, 4));
        // Old (0, 1) becomes the new top-left under CW.
        assert_eq!(tag(&cw, 0, 0), (0, 1));
        assert_eq!(tag(&cw, 1, 0), (0, 0));

        let back = rotate_buffer(&cw, RotateDirection::CounterClockwise);
        assert_eq!(back, buf);
    }

    #[test]
    fn scale_region_nearest_neighbor() {
        let fill = Sample::Direct(Rgba([9, 9, 9, 255]));
        let mut buf = numbered_buffer(8, 8);
        // Double a 2×2 block: each source pixel becomes a 2×2 quad.
        let dest = scale_region(&mut buf, Region::new(0, 0, 2, 2), 4, 4, fill).unwrap();
        assert_eq!(dest, Region::new(0, 0, 4, 4));
        assert_eq!(tag(&buf, 0, 0), (0, 0));
        assert_eq!(tag(&buf, 1, 1), (0, 0));
        assert_eq!(tag(&buf, 2, 2), (1, 1));
        assert_eq!(tag(&buf, 3, 3), (1, 1));
    }

    #[test]
    fn scale_region_shrink_backfills() {
        let fill = Sample::Direct(Rgba([9, 9, 9, 255]));
        let mut buf = numbered_buffer(4, 4);
        scale_region(&mut buf, Region::new(0, 0, 4, 4), 2, 2, fill).unwrap();
        assert_eq!(tag(&buf, 0, 0), (0, 0));
        assert_eq!(tag(&buf, 1, 1), (2, 2));
        assert_eq!(tag(&buf, 3, 3), (9, 9));
    }

    #[test]
    fn scale_region_validates_target() {
        let fill = Sample::Direct(Rgba([0; 4]));
        let mut buf = numbered_buffer(4, 4);
        assert!(matches!(
            scale_region(&mut buf, Region::new(0, 0, 2, 2), 0, 2, fill),
            Err(EngineError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            scale_region(&mut buf, Region::new(2, 2, 2, 2), 4, 4, fill),
            Err(EngineError::TransformOutOfBounds { .. })
        ));
    }
}
