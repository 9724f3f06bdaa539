// ============================================================================
// PixelFE CLI — headless batch editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   pixelfe --input sprite.png --op fliph --output flipped.png
//   pixelfe -i sprite.png --op "select:0,0,7,7" --op rot90 -o out.png
//   pixelfe -i "sprites/*.png" --op "fill:0,0" --foreground "#ff0000" --output-dir filled/
//   pixelfe -i doc.pfx --op gradient --output doc_out.pfx
//
// All processing runs synchronously on the current thread through a real
// edit session, so the CLI exercises exactly the code paths the GUI
// collaborator would.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::Rgba;

use crate::canvas::PixelBuffer;
use crate::compositor::BlendMode;
use crate::io::{is_snapshot_path, load_rgba, load_snapshot, save_rgba, save_snapshot};
use crate::ops::transform::{FlipAxis, RotateDirection, ShiftDirection};
use crate::project::DocumentSnapshot;
use crate::session::{EditSession, PaintTool};
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelFE headless pixel editor.
///
/// Apply edit operations to image files and convert between formats — no GUI
/// required.
#[derive(Parser, Debug)]
#[command(
    name = "pixelfe",
    about = "PixelFE headless batch pixel editor",
    long_about = "Apply edit operations to image or snapshot files without a GUI.\n\
                  Raster formats supported by the image facade plus native .pfx\n\
                  snapshots.\n\n\
                  Operations (applied in order, repeat --op as needed):\n  \
                  fliph | flipv | rot90 | rot270 | shift:left|right|up|down\n  \
                  line:X0,Y0,X1,Y1 | rect:X0,Y0,X1,Y1[,fill] | ellipse:X0,Y0,X1,Y1[,fill]\n  \
                  fill:X,Y | gradient | select:X0,Y0,X1,Y1 | clearsel | invertsel\n  \
                  automask:X,Y[,TOL] | scale:WxH | undo | redo"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "sprites/*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Edit operation, applied in order.  Repeatable.
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<String>,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and a .png extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Foreground colour as #RRGGBB or #RRGGBBAA.
    #[arg(long, value_name = "COLOR", default_value = "#000000")]
    pub foreground: String,

    /// Background colour as #RRGGBB or #RRGGBBAA.
    #[arg(long, value_name = "COLOR", default_value = "#ffffff")]
    pub background: String,

    /// Enable additive transparency for paint operations.
    #[arg(long)]
    pub additive: bool,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Operation parsing
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum EditOp {
    Flip(FlipAxis),
    Rotate(RotateDirection),
    Shift(ShiftDirection),
    Line(i32, i32, i32, i32),
    Rect(i32, i32, i32, i32, bool),
    Ellipse(i32, i32, i32, i32, bool),
    Fill(i32, i32),
    Gradient,
    Select(i32, i32, i32, i32),
    ClearSel,
    InvertSel,
    AutoMask(i32, i32, f32),
    Scale(u32, u32),
    Undo,
    Redo,
}

fn parse_op(op: &str) -> Result<EditOp, String> {
    let (name, rest) = match op.split_once(':') {
        Some((n, r)) => (n, Some(r)),
        None => (op, None),
    };

    let coords = |rest: Option<&str>, n: usize| -> Result<Vec<i32>, String> {
        let rest = rest.ok_or_else(|| format!("'{}' needs arguments", name))?;
        let parts: Vec<i32> = rest
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("'{}': bad coordinate: {}", op, e))?;
        if parts.len() != n {
            return Err(format!("'{}': expected {} comma-separated values", op, n));
        }
        Ok(parts)
    };

    match name {
        "fliph" => Ok(EditOp::Flip(FlipAxis::Horizontal)),
        "flipv" => Ok(EditOp::Flip(FlipAxis::Vertical)),
        "rot90" => Ok(EditOp::Rotate(RotateDirection::Clockwise)),
        "rot270" => Ok(EditOp::Rotate(RotateDirection::CounterClockwise)),
        "shift" => match rest {
            Some("left") => Ok(EditOp::Shift(ShiftDirection::Left)),
            Some("right") => Ok(EditOp::Shift(ShiftDirection::Right)),
            Some("up") => Ok(EditOp::Shift(ShiftDirection::Up)),
            Some("down") => Ok(EditOp::Shift(ShiftDirection::Down)),
            _ => Err(format!("'{}': expected shift:left|right|up|down", op)),
        },
        "line" => {
            let c = coords(rest, 4)?;
            Ok(EditOp::Line(c[0], c[1], c[2], c[3]))
        }
        "rect" | "ellipse" => {
            let rest = rest.ok_or_else(|| format!("'{}' needs coordinates", name))?;
            let (coord_part, filled) = match rest.strip_suffix(",fill") {
                Some(stripped) => (stripped, true),
                None => (rest, false),
            };
            let c = coords(Some(coord_part), 4)?;
            if name == "rect" {
                Ok(EditOp::Rect(c[0], c[1], c[2], c[3], filled))
            } else {
                Ok(EditOp::Ellipse(c[0], c[1], c[2], c[3], filled))
            }
        }
        "fill" => {
            let c = coords(rest, 2)?;
            Ok(EditOp::Fill(c[0], c[1]))
        }
        "gradient" => Ok(EditOp::Gradient),
        "select" => {
            let c = coords(rest, 4)?;
            Ok(EditOp::Select(c[0], c[1], c[2], c[3]))
        }
        "clearsel" => Ok(EditOp::ClearSel),
        "invertsel" => Ok(EditOp::InvertSel),
        "automask" => {
            let rest = rest.ok_or_else(|| format!("'{}' needs a seed coordinate", name))?;
            let parts: Vec<&str> = rest.split(',').collect();
            if parts.len() != 2 && parts.len() != 3 {
                return Err(format!("'{}': expected automask:X,Y[,TOL]", op));
            }
            let x = parts[0].trim().parse::<i32>().map_err(|e| format!("'{}': {}", op, e))?;
            let y = parts[1].trim().parse::<i32>().map_err(|e| format!("'{}': {}", op, e))?;
            let tol = if parts.len() == 3 {
                parts[2].trim().parse::<f32>().map_err(|e| format!("'{}': {}", op, e))?
            } else {
                0.0
            };
            Ok(EditOp::AutoMask(x, y, tol))
        }
        "scale" => {
            let rest = rest.ok_or_else(|| format!("'{}' needs WxH", name))?;
            let (w, h) = rest
                .split_once('x')
                .ok_or_else(|| format!("'{}': expected scale:WxH", op))?;
            let w = w.trim().parse::<u32>().map_err(|e| format!("'{}': {}", op, e))?;
            let h = h.trim().parse::<u32>().map_err(|e| format!("'{}': {}", op, e))?;
            Ok(EditOp::Scale(w, h))
        }
        "undo" => Ok(EditOp::Undo),
        "redo" => Ok(EditOp::Redo),
        _ => Err(format!("unknown operation '{}'", op)),
    }
}

/// Parse "#RRGGBB" or "#RRGGBBAA" (leading '#' optional).
fn parse_color(s: &str) -> Result<Rgba<u8>, String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 && hex.len() != 8 {
        return Err(format!("'{}': expected #RRGGBB or #RRGGBBAA", s));
    }
    let byte = |i: usize| -> Result<u8, String> {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("'{}': {}", s, e))
    };
    let a = if hex.len() == 8 { byte(6)? } else { 255 };
    Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, a]))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    // Parse operations and colours up front so a typo fails before any work.
    let ops = match args.ops.iter().map(|s| parse_op(s)).collect::<Result<Vec<_>, _>>() {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let (foreground, background) = match (parse_color(&args.foreground), parse_color(&args.background)) {
        (Ok(fg), Ok(bg)) => (fg, bg),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: cannot create output directory {}: {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let mut failures = 0usize;
    for input in &inputs {
        let started = Instant::now();
        match process_file(input, &ops, foreground, background, args.additive, &args) {
            Ok(output) => {
                log_info!("{} -> {}", input.display(), output.display());
                if args.verbose {
                    println!(
                        "{} -> {} ({} ops, {:.1} ms)",
                        input.display(),
                        output.display(),
                        ops.len(),
                        started.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input.display(), e);
                eprintln!("error: {}: {}", input.display(), e);
                failures += 1;
            }
        }
    }

    if args.verbose && inputs.len() > 1 {
        println!("{}/{} files processed", inputs.len() - failures, inputs.len());
    }
    if failures > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Expand glob patterns; non-matching patterns fall back to literal paths.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for pattern in patterns {
        match glob::glob(pattern) {
            Ok(paths) => {
                let mut matched = false;
                for path in paths.flatten() {
                    matched = true;
                    out.push(path);
                }
                if !matched {
                    out.push(PathBuf::from(pattern));
                }
            }
            Err(_) => out.push(PathBuf::from(pattern)),
        }
    }
    out.retain(|p| p.is_file());
    out
}

fn process_file(
    input: &Path,
    ops: &[EditOp],
    foreground: Rgba<u8>,
    background: Rgba<u8>,
    additive: bool,
    args: &CliArgs,
) -> Result<PathBuf, String> {
    // Load: native snapshot or decoded raster grid.
    let mut session = if is_snapshot_path(input) {
        load_snapshot(input)?
            .restore()
            .map_err(|e| format!("snapshot restore failed: {}", e))?
    } else {
        let img = load_rgba(input)?;
        let buffer = PixelBuffer::from_rgba_image(img).map_err(|e| e.to_string())?;
        EditSession::from_parts(buffer, crate::palette::Palette::new())
    };

    session.set_foreground(foreground);
    session.set_background(background);
    if additive {
        session.set_blend_mode(BlendMode::Additive);
    }

    for op in ops {
        apply_op(&mut session, op).map_err(|e| format!("{:?}: {}", op, e))?;
    }

    // Save: mirror the input kind unless the output extension says otherwise.
    let output = output_path(input, args)?;
    if is_snapshot_path(&output) {
        save_snapshot(&output, &DocumentSnapshot::capture(&session))?;
    } else {
        let img = session.export_image().map_err(|e| e.to_string())?;
        save_rgba(&output, &img)?;
    }
    Ok(output)
}

fn apply_op(session: &mut EditSession, op: &EditOp) -> Result<(), String> {
    let done = match op {
        EditOp::Flip(axis) => session.flip(*axis),
        EditOp::Rotate(dir) => session.rotate(*dir),
        EditOp::Shift(dir) => session.shift(*dir),
        EditOp::Line(x0, y0, x1, y1) => session.apply_tool(PaintTool::Line, &[(*x0, *y0), (*x1, *y1)]),
        EditOp::Rect(x0, y0, x1, y1, filled) => {
            session.apply_tool(PaintTool::Rectangle { filled: *filled }, &[(*x0, *y0), (*x1, *y1)])
        }
        EditOp::Ellipse(x0, y0, x1, y1, filled) => {
            session.apply_tool(PaintTool::Ellipse { filled: *filled }, &[(*x0, *y0), (*x1, *y1)])
        }
        EditOp::Fill(x, y) => session.apply_tool(PaintTool::FloodFill, &[(*x, *y)]),
        EditOp::Gradient => session.apply_gradient_fill(),
        EditOp::Select(x0, y0, x1, y1) => session.select_with_stroke(&[(*x0, *y0), (*x1, *y1)]),
        EditOp::ClearSel => {
            session.clear_selection();
            Ok(())
        }
        EditOp::InvertSel => {
            session.invert_selection();
            Ok(())
        }
        EditOp::AutoMask(x, y, tol) => {
            if !session.buffer().in_bounds(*x, *y) {
                Err(crate::error::EngineError::out_of_bounds(
                    *x as i64,
                    *y as i64,
                    session.buffer().width(),
                    session.buffer().height(),
                ))
            } else {
                let seed = session.buffer().color_at(*x as u32, *y as u32, session.palette());
                match seed {
                    Ok(seed) => session.auto_mask(seed, *tol),
                    Err(e) => Err(e),
                }
            }
        }
        EditOp::Scale(w, h) => session.scale_selection(*w, *h),
        EditOp::Undo => session.undo().map(|_| ()),
        EditOp::Redo => session.redo().map(|_| ()),
    };
    done.map_err(|e| e.to_string())
}

fn output_path(input: &Path, args: &CliArgs) -> Result<PathBuf, String> {
    if let Some(output) = &args.output {
        return Ok(output.clone());
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    if let Some(dir) = &args.output_dir {
        return Ok(dir.join(format!("{}.png", stem)));
    }
    // In-place default: sibling file with an _out suffix, preserving kind.
    let ext = if is_snapshot_path(input) { crate::io::SNAPSHOT_EXTENSION } else { "png" };
    Ok(input.with_file_name(format!("{}_out.{}", stem, ext)))
}
