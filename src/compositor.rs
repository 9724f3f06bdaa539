use image::Rgba;

use crate::error::{EngineError, EngineResult};

// ============================================================================
// COMPOSITOR — pure blending and gradient math
// ============================================================================

/// Transparency policy applied when a source colour lands on a destination
/// pixel.  Toggled externally; read by every paint path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Alpha-aware straight overwrite: the source sample replaces the
    /// destination verbatim, including its alpha.
    #[default]
    Replace,
    /// Alpha-weighted additive accumulation, active only while the
    /// "transparency additive" option is enabled.
    Additive,
}

/// Blend `src` into `dst` per `mode`.
///
/// A fully opaque source takes the `Replace` path in both modes, so the two
/// modes agree on opaque paint; the additive formula
/// `clamp(dst + src × src.alpha)` applies only to translucent sources.
/// Additive paint never reduces coverage: the result alpha is
/// `max(dst.a, src.a)`.
pub fn blend(dst: Rgba<u8>, src: Rgba<u8>, mode: BlendMode) -> Rgba<u8> {
    match mode {
        BlendMode::Replace => src,
        BlendMode::Additive => {
            if src.0[3] == 255 {
                return src;
            }
            let alpha = src.0[3] as u32;
            let channel = |d: u8, s: u8| -> u8 {
                let sum = d as u32 + (s as u32 * alpha + 127) / 255;
                sum.min(255) as u8
            };
            Rgba([
                channel(dst.0[0], src.0[0]),
                channel(dst.0[1], src.0[1]),
                channel(dst.0[2], src.0[2]),
                dst.0[3].max(src.0[3]),
            ])
        }
    }
}

/// Linear two-colour gradient: `steps` colours evenly spaced from `a` to
/// `b`, endpoints inclusive and exact.  `steps < 2` is an error.
pub fn gradient(a: Rgba<u8>, b: Rgba<u8>, steps: usize) -> EngineResult<Vec<Rgba<u8>>> {
    if steps < 2 {
        return Err(EngineError::invalid_argument(format!(
            "gradient needs at least 2 steps, got {}",
            steps
        )));
    }
    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        let t = i as f32 / (steps - 1) as f32;
        let lerp = |ca: u8, cb: u8| -> u8 { (ca as f32 + (cb as f32 - ca as f32) * t).round() as u8 };
        out.push(Rgba([
            lerp(a.0[0], b.0[0]),
            lerp(a.0[1], b.0[1]),
            lerp(a.0[2], b.0[2]),
            lerp(a.0[3], b.0[3]),
        ]));
    }
    Ok(out)
}
