use image::{Rgba, RgbaImage};
use paintcore::ops::pattern::PatternKind;
use paintcore::ops::shapes::{ShapeKind, ShapeStyle};
use paintcore::{DeviceOrigin, DrawingEngine, EngineConfig, EngineError, LayerStack, PatternSpec, Point, Size, Tool};
use pretty_assertions::assert_eq;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn pixel(engine: &DrawingEngine, layer: usize, x: i32, y: i32) -> Option<Rgba<u8>> {
    engine.stack().layers()[layer].surface.get(x, y)
}

/// Single-pixel pencil dab centred on pixel (x, y).
fn dab(engine: &mut DrawingEngine, x: u32, y: u32) -> bool {
    let p = Point::new(x as f32 + 0.5, y as f32 + 0.5);
    engine.stroke_segment(p, p).unwrap()
}

fn inline_fill_engine(width: u32, height: u32) -> DrawingEngine {
    DrawingEngine::with_config(EngineConfig {
        width,
        height,
        background_fill: false,
        ..Default::default()
    })
    .unwrap()
}

// ---- flood fill ---------------------------------------------------------------

#[test]
fn test_fill_covers_whole_white_canvas_and_repeat_is_noop() {
    let mut engine = DrawingEngine::new(800, 600).unwrap();
    let spec = PatternSpec::solid(RED);
    assert!(engine.flood_fill_at(Point::new(400.0, 300.0), &spec).unwrap());
    let surface = &engine.stack().layers()[0].surface;
    assert_eq!(surface.pixels().len(), 480_000);
    assert!(surface.pixels().iter().all(|p| *p == RED.0));

    let entries = engine.history().len();
    assert!(!engine.flood_fill_at(Point::new(400.0, 300.0), &spec).unwrap());
    assert_eq!(engine.history().len(), entries);
}

#[test]
fn test_fill_stays_inside_closed_outline() {
    let mut engine = inline_fill_engine(40, 40);
    let style = ShapeStyle {
        anti_alias: false,
        ..ShapeStyle::outline_only(BLUE, 4.0)
    };
    assert!(engine.draw_shape(ShapeKind::Rectangle, Point::new(8.0, 8.0), Point::new(32.0, 32.0), &style).unwrap());
    assert_eq!(pixel(&engine, 0, 20, 20), Some(WHITE));

    assert!(engine.flood_fill_at(Point::new(20.0, 20.0), &PatternSpec::solid(RED)).unwrap());
    assert_eq!(pixel(&engine, 0, 20, 20), Some(RED));
    assert_eq!(pixel(&engine, 0, 1, 1), Some(WHITE));
    assert_eq!(pixel(&engine, 0, 38, 38), Some(WHITE));
}

#[test]
fn test_pattern_fill_keeps_unconnected_holes() {
    let mut engine = inline_fill_engine(32, 32);
    engine.set_primary_color(BLUE);
    engine.set_tool(Tool::Pencil { size: 1.0 });
    assert!(dab(&mut engine, 16, 16));

    let spec = PatternSpec::new(PatternKind::Checkerboard, RED, Rgba([0, 255, 0, 255]));
    assert!(engine.flood_fill_at(Point::new(0.0, 0.0), &spec).unwrap());
    assert_eq!(pixel(&engine, 0, 16, 16), Some(BLUE));
    // Tile anchored at the region's top-left corner
    assert_eq!(pixel(&engine, 0, 0, 0), Some(RED));
}

#[test]
fn test_fill_over_limit_leaves_canvas_untouched() {
    let mut engine = DrawingEngine::with_config(EngineConfig {
        width: 64,
        height: 64,
        max_fill_visited: 100,
        background_fill: false,
        ..Default::default()
    })
    .unwrap();
    let before = engine.render_composite().unwrap();
    let err = engine.flood_fill_at(Point::new(5.0, 5.0), &PatternSpec::solid(RED));
    assert!(matches!(err, Err(EngineError::FillAborted { .. })));
    assert_eq!(engine.render_composite().unwrap(), before);
    assert_eq!(engine.history().len(), 1);
}

#[test]
fn test_background_fill_matches_inline_fill() {
    let mut threaded = DrawingEngine::new(50, 50).unwrap();
    let mut inline = inline_fill_engine(50, 50);
    for engine in [&mut threaded, &mut inline] {
        engine.set_primary_color(RED);
        engine.set_pattern(PatternKind::DiagonalStripes);
        assert!(engine.fill_with_state(Point::new(25.0, 25.0)).unwrap());
    }
    assert!(!threaded.has_pending_fill());
    assert_eq!(threaded.render_composite().unwrap(), inline.render_composite().unwrap());
}

// ---- compositing & layers ---------------------------------------------------------

#[test]
fn test_half_opacity_red_over_white_composites_to_pink() {
    let mut engine = DrawingEngine::new(4, 4).unwrap();
    assert!(engine.add_layer().unwrap());
    assert!(engine.clear_active_layer(RED).unwrap());
    assert!(engine.set_layer_opacity(1, 0.5).unwrap());
    let composite = engine.render_composite().unwrap();
    assert_eq!(*composite.get_pixel(2, 2), Rgba([255, 128, 128, 255]));
}

#[test]
fn test_hidden_layers_are_skipped() {
    let mut engine = DrawingEngine::new(4, 4).unwrap();
    engine.add_layer().unwrap();
    engine.clear_active_layer(RED).unwrap();
    assert!(engine.set_layer_visibility(1, false).unwrap());
    assert_eq!(*engine.render_composite().unwrap().get_pixel(0, 0), WHITE);
}

#[test]
fn test_moving_active_layer_up_keeps_it_active() {
    let mut engine = DrawingEngine::new(8, 8).unwrap();
    engine.add_layer().unwrap();
    engine.add_layer().unwrap();
    let ids: Vec<u64> = engine.stack().layers().iter().map(|l| l.id).collect();
    assert!(engine.select_layer(0).unwrap());
    assert_eq!(engine.active_layer_index(), 0);

    assert!(engine.reorder_layer(0, 1).unwrap());
    let moved: Vec<u64> = engine.stack().layers().iter().map(|l| l.id).collect();
    assert_eq!(moved, vec![ids[1], ids[0], ids[2]]);
    assert_eq!(engine.active_layer_index(), 1);
}

#[test]
fn test_bad_layer_index_is_reported() {
    let mut engine = DrawingEngine::new(8, 8).unwrap();
    assert!(matches!(engine.select_layer(3), Err(EngineError::LayerIndex { index: 3, len: 1 })));
    assert!(matches!(engine.set_layer_opacity(1, 0.5), Err(EngineError::LayerIndex { .. })));
    assert_eq!(engine.history().len(), 1);
}

#[test]
fn test_last_layer_cannot_be_deleted() {
    let mut engine = DrawingEngine::new(8, 8).unwrap();
    assert!(!engine.delete_layer().unwrap());
    assert_eq!(engine.layer_count(), 1);
}

#[test]
fn test_resize_crops_and_keeps_top_left_content() {
    let mut engine = DrawingEngine::new(800, 600).unwrap();
    engine.set_primary_color(RED);
    engine.set_tool(Tool::Pencil { size: 1.0 });
    assert!(dab(&mut engine, 700, 500));
    assert!(dab(&mut engine, 100, 100));
    assert_eq!(pixel(&engine, 0, 101, 100), Some(WHITE));

    assert!(engine.resize_canvas(400, 300).unwrap());
    assert_eq!((engine.width(), engine.height()), (400, 300));
    assert_eq!(pixel(&engine, 0, 100, 100), Some(RED));
    assert_eq!(pixel(&engine, 0, 700, 500), None);
    assert!(engine.stack().layers()[0].surface.pixels().iter().filter(|p| **p == RED.0).count() == 1);
}

#[test]
fn test_resize_to_bad_dimensions_fails_without_change() {
    let mut engine = DrawingEngine::new(16, 16).unwrap();
    assert!(matches!(engine.resize_canvas(0, 10), Err(EngineError::InvalidDimensions { .. })));
    assert!(engine.resize_canvas(100_000, 10).is_err());
    assert_eq!((engine.width(), engine.height()), (16, 16));
}

#[test]
fn test_merge_and_flatten_collapse_layers() {
    let mut engine = DrawingEngine::new(8, 8).unwrap();
    engine.add_layer().unwrap();
    engine.clear_active_layer(RED).unwrap();
    engine.set_layer_opacity(1, 0.5).unwrap();
    let expected = engine.render_composite().unwrap();

    assert!(engine.merge_down().unwrap());
    assert_eq!(engine.layer_count(), 1);
    assert_eq!(engine.render_composite().unwrap(), expected);

    engine.add_layer().unwrap();
    assert!(engine.flatten().unwrap());
    assert_eq!(engine.layer_count(), 1);
    assert_eq!(engine.render_composite().unwrap(), expected);
}

// ---- history ------------------------------------------------------------------

#[test]
fn test_history_holds_fifty_snapshots() {
    let mut engine = DrawingEngine::new(64, 8).unwrap();
    engine.set_tool(Tool::Pencil { size: 1.0 });
    for i in 0..50 {
        assert!(dab(&mut engine, i, 3));
    }
    assert_eq!(engine.history().len(), 50);

    let mut undone = 0;
    while engine.undo().unwrap() {
        undone += 1;
    }
    assert_eq!(undone, 49);
    assert!(!engine.can_undo());
}

#[test]
fn test_undo_then_redo_is_byte_exact() {
    let mut engine = DrawingEngine::new(32, 32).unwrap();
    let blank = engine.render_composite().unwrap();
    engine.set_primary_color(BLUE);
    engine.set_tool(Tool::Pencil { size: 3.0 });
    assert!(engine.stroke_segment(Point::new(2.0, 2.0), Point::new(28.0, 20.0)).unwrap());
    engine.add_layer().unwrap();
    engine.clear_active_layer(RED).unwrap();
    let drawn = engine.render_composite().unwrap();
    let layers = engine.layer_count();

    assert!(engine.undo().unwrap());
    assert!(engine.undo().unwrap());
    assert!(engine.undo().unwrap());
    assert_eq!(engine.render_composite().unwrap(), blank);
    assert_eq!(engine.layer_count(), 1);

    while engine.redo().unwrap() {}
    assert_eq!(engine.render_composite().unwrap(), drawn);
    assert_eq!(engine.layer_count(), layers);
}

#[test]
fn test_new_edit_after_undo_discards_redo() {
    let mut engine = DrawingEngine::new(16, 16).unwrap();
    dab(&mut engine, 1, 1);
    dab(&mut engine, 2, 2);
    engine.undo().unwrap();
    assert!(engine.can_redo());
    dab(&mut engine, 3, 3);
    assert!(!engine.can_redo());
    assert_eq!(engine.history().undo_description(), Some("Pencil"));
}

// ---- noisy input ----------------------------------------------------------------

#[test]
fn test_malformed_points_are_silent_noops() {
    let mut engine = DrawingEngine::new(16, 16).unwrap();
    let nan = Point::new(f32::NAN, 3.0);
    let far = Point::new(5.0e7, 3.0);
    assert!(!engine.stroke_segment(nan, Point::new(1.0, 1.0)).unwrap());
    assert!(!engine.stroke_segment(far, far).unwrap());
    assert!(!engine.flood_fill_at(nan, &PatternSpec::solid(RED)).unwrap());
    let style = ShapeStyle::outline_only(RED, 2.0);
    assert!(!engine.draw_shape(ShapeKind::Ellipse, Point::new(4.0, 4.0), Point::new(4.0, 9.0), &style).unwrap());
    assert_eq!(engine.history().len(), 1);
}

#[test]
fn test_set_active_layer_refuses_out_of_range() {
    let mut stack = LayerStack::new(4, 4).unwrap();
    assert!(!stack.set_active_layer(9));
    assert_eq!(stack.active_layer_index(), 0);
    assert!(!stack.repair());
}

// ---- clipboard ----------------------------------------------------------------

#[test]
fn test_cut_and_paste_moves_pixels() {
    let mut engine = DrawingEngine::new(32, 32).unwrap();
    engine.set_primary_color(RED);
    engine.set_tool(Tool::Pencil { size: 1.0 });
    dab(&mut engine, 4, 4);

    assert!(engine.select_rect(Point::new(2.0, 2.0), Point::new(7.0, 7.0)));
    assert!(engine.cut_selection().unwrap());
    assert_eq!(pixel(&engine, 0, 4, 4), Some(Rgba([0, 0, 0, 0])));

    assert!(engine.paste_at(Point::new(20.5, 20.5)).unwrap());
    let clip = engine.clipboard().unwrap();
    assert_eq!(clip.image.dimensions(), (5, 5));
    assert!(engine.stack().layers()[0].surface.pixels().iter().any(|p| *p == RED.0));
}

// ---- device input & tools ---------------------------------------------------------

#[test]
fn test_device_points_scale_and_fail_closed() {
    let mut engine = DrawingEngine::new(100, 50).unwrap();
    let view = Size::new(200.0, 100.0);
    assert_eq!(engine.map_device_point(Point::new(50.0, 20.0), view), Point::new(25.0, 10.0));
    assert_eq!(engine.map_device_point(Point::new(f32::NAN, 20.0), view), Point::ZERO);
    assert_eq!(engine.map_device_point(Point::new(50.0, 20.0), Size::new(0.0, 100.0)), Point::ZERO);

    engine.set_device_origin(DeviceOrigin::BottomLeft);
    assert_eq!(engine.map_device_point(Point::new(50.0, 20.0), view), Point::new(25.0, 40.0));
    assert_eq!(engine.map_device_point(Point::new(0.0, 0.0), view), Point::new(0.0, 50.0));
}

#[test]
fn test_current_shape_uses_shape_tool() {
    let mut engine = DrawingEngine::new(32, 32).unwrap();
    engine.set_primary_color(RED);
    engine.set_tool(Tool::Shape { kind: ShapeKind::Rectangle, outline_width: 2.0 });
    assert!(engine.draw_current_shape(Point::new(4.0, 4.0), Point::new(20.0, 20.0)).unwrap());
    assert_ne!(pixel(&engine, 0, 12, 4), Some(WHITE));
    assert_eq!(pixel(&engine, 0, 28, 28), Some(WHITE));
    assert_eq!(engine.history().len(), 2);
}

#[test]
fn test_stamp_image_draws_scaled_copy() {
    let mut engine = DrawingEngine::new(32, 32).unwrap();
    engine.set_tool(Tool::Stamp { size: 8.0 });
    let stamp = RgbaImage::from_pixel(4, 4, RED);
    assert!(engine.stamp_image_at(Point::new(16.0, 16.0), &stamp, 0.0).unwrap());
    assert_eq!(pixel(&engine, 0, 16, 16), Some(RED));
    assert_eq!(pixel(&engine, 0, 2, 2), Some(WHITE));
    assert_eq!(engine.history().len(), 2);

    let empty = RgbaImage::new(0, 0);
    assert!(!engine.stamp_image_at(Point::new(16.0, 16.0), &empty, 0.0).unwrap());
}

#[test]
fn test_large_canvas_fill_with_default_limits() {
    let mut engine = DrawingEngine::new(2000, 2000).unwrap();
    assert!(engine.flood_fill_at(Point::new(5.5, 5.5), &PatternSpec::solid(RED)).unwrap());
    assert_eq!(pixel(&engine, 0, 0, 0), Some(RED));
    assert_eq!(pixel(&engine, 0, 1999, 1999), Some(RED));
}

