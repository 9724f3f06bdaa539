// End-to-end scenarios across the session, tools, transforms, and history.

use image::Rgba;

use pixelfe::{
    Anchor, BlendMode, EditSession, EngineError, FlipAxis, PaintTool, PixelFormat, RotateDirection,
    ShiftDirection,
};
use pixelfe::project::DocumentSnapshot;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn session(w: u32, h: u32) -> EditSession {
    EditSession::new(w, h, PixelFormat::Direct, Some(WHITE)).unwrap()
}

#[test]
fn every_command_unwinds_bit_for_bit() {
    let mut s = session(8, 8);
    let initial = s.export_image().unwrap();
    s.set_foreground(RED);

    // A mixed batch: paint, shapes, fill, selection, transforms, structure.
    s.apply_tool(PaintTool::Pencil, &[(0, 0), (3, 2), (5, 5)]).unwrap();
    s.apply_tool(PaintTool::Line, &[(0, 7), (7, 0)]).unwrap();
    s.apply_tool(PaintTool::Ellipse { filled: true }, &[(1, 1), (6, 6)]).unwrap();
    s.apply_tool(PaintTool::FloodFill, &[(3, 3)]).unwrap();
    s.select_with_stroke(&[(2, 2), (5, 5)]).unwrap();
    s.shift(ShiftDirection::Right).unwrap();
    s.flip(FlipAxis::Vertical).unwrap();
    s.rotate(RotateDirection::Clockwise).unwrap();
    s.clear_selection();
    s.apply_gradient_fill().unwrap();
    s.resize(10, 6, (Anchor::Center, Anchor::Center)).unwrap();

    let steps = s.history().undo_count();
    assert!(steps >= 10);
    while s.history().can_undo() {
        s.undo().unwrap();
    }
    assert_eq!(s.export_image().unwrap(), initial);
    assert!(s.mask().is_effectively_empty());

    // And the whole tape replays forward deterministically.
    let mut replayed = 0;
    while s.history().can_redo() {
        s.redo().unwrap();
        replayed += 1;
    }
    assert_eq!(replayed, steps);
    assert_eq!(s.buffer().width(), 10);
}

#[test]
fn four_quarter_turns_restore_a_square_buffer() {
    let mut s = session(6, 6);
    s.set_foreground(RED);
    s.apply_tool(PaintTool::Line, &[(0, 0), (5, 3)]).unwrap();
    let before = s.export_image().unwrap();

    for _ in 0..4 {
        s.rotate(RotateDirection::Clockwise).unwrap();
    }
    assert_eq!(s.export_image().unwrap(), before);
}

#[test]
fn flips_and_toroidal_shifts_are_involutions() {
    let mut s = session(5, 7);
    s.set_foreground(RED);
    s.apply_tool(PaintTool::Rectangle { filled: false }, &[(1, 1), (3, 5)]).unwrap();
    let before = s.export_image().unwrap();

    s.flip(FlipAxis::Horizontal).unwrap();
    s.flip(FlipAxis::Horizontal).unwrap();
    assert_eq!(s.export_image().unwrap(), before);

    s.shift(ShiftDirection::Left).unwrap();
    s.shift(ShiftDirection::Right).unwrap();
    assert_eq!(s.export_image().unwrap(), before);

    s.shift(ShiftDirection::Up).unwrap();
    s.shift(ShiftDirection::Down).unwrap();
    assert_eq!(s.export_image().unwrap(), before);
}

#[test]
fn selection_scopes_paint_and_transforms() {
    let mut s = session(6, 6);
    s.set_foreground(RED);
    s.select_with_stroke(&[(0, 0), (2, 2)]).unwrap();

    // Fill attempts across the whole canvas stay inside the selection.
    s.apply_tool(PaintTool::Rectangle { filled: true }, &[(0, 0), (5, 5)]).unwrap();
    let img = s.export_image().unwrap();
    assert_eq!(*img.get_pixel(1, 1), RED);
    assert_eq!(*img.get_pixel(4, 4), WHITE);

    // A transform over the selection leaves the rest untouched.
    s.flip(FlipAxis::Horizontal).unwrap();
    let img = s.export_image().unwrap();
    assert_eq!(*img.get_pixel(4, 4), WHITE);
}

#[test]
fn flood_fill_masked_seed_leaves_history_untouched() {
    let mut s = session(4, 4);
    s.select_with_stroke(&[(3, 3), (3, 3)]).unwrap();
    let commands = s.history().undo_count();

    s.set_foreground(RED);
    s.apply_tool(PaintTool::FloodFill, &[(0, 0)]).unwrap();
    assert_eq!(s.history().undo_count(), commands);
    assert_eq!(s.redo(), Err(EngineError::NothingToRedo));
    assert!(s.export_image().unwrap().pixels().all(|p| *p == WHITE));
}

#[test]
fn additive_paint_accumulates_against_committed_pixels() {
    let mut s = session(1, 1);
    s.set_foreground(Rgba([0, 0, 0, 255]));
    s.apply_tool(PaintTool::Pencil, &[(0, 0)]).unwrap();

    s.set_blend_mode(BlendMode::Additive);
    s.set_foreground(Rgba([100, 0, 0, 128]));
    s.apply_tool(PaintTool::Pencil, &[(0, 0)]).unwrap();
    let img = s.export_image().unwrap();
    // 0 + round(100 × 128/255) over black.
    assert_eq!(*img.get_pixel(0, 0), Rgba([50, 0, 0, 255]));

    // Undo unwinds the blended write exactly.
    s.undo().unwrap();
    assert_eq!(*s.export_image().unwrap().get_pixel(0, 0), Rgba([0, 0, 0, 255]));
}

#[test]
fn indexed_documents_survive_the_full_cycle() {
    let mut s = EditSession::new(4, 4, PixelFormat::Indexed, Some(WHITE)).unwrap();
    s.set_foreground(RED);
    s.apply_tool(PaintTool::Rectangle { filled: true }, &[(0, 0), (1, 1)]).unwrap();
    assert_eq!(s.palette().len(), 2);

    s.rotate(RotateDirection::Clockwise).unwrap();
    s.shift(ShiftDirection::Down).unwrap();

    let snapshot = DocumentSnapshot::capture(&s);
    let bytes = bincode::serialize(&snapshot).unwrap();
    let restored: DocumentSnapshot = bincode::deserialize(&bytes).unwrap();
    let restored = restored.restore().unwrap();
    assert_eq!(restored.buffer(), s.buffer());
    assert_eq!(restored.palette(), s.palette());

    while s.history().can_undo() {
        s.undo().unwrap();
    }
    assert!(s.export_image().unwrap().pixels().all(|p| *p == WHITE));
}

#[test]
fn auto_mask_then_fill_recolors_one_shade() {
    let mut s = session(4, 4);
    s.set_foreground(RED);
    s.apply_tool(PaintTool::Pencil, &[(0, 0)]).unwrap();
    s.apply_tool(PaintTool::Pencil, &[(3, 3)]).unwrap();

    // Mask exactly the red pixels, then a whole-canvas fill touches only them.
    s.auto_mask(RED, 0.0).unwrap();
    s.set_foreground(Rgba([0, 0, 255, 255]));
    s.apply_tool(PaintTool::Rectangle { filled: true }, &[(0, 0), (3, 3)]).unwrap();

    let img = s.export_image().unwrap();
    assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    assert_eq!(*img.get_pixel(3, 3), Rgba([0, 0, 255, 255]));
    assert_eq!(*img.get_pixel(1, 1), WHITE);
}
