// ============================================================================
// DRAWING ENGINE: owns the layer stack, history and tool state
// ============================================================================
//
// Every mutating call runs on the caller's thread, finishes any pending
// background fill first, applies the operation to the active layer, and
// commits a history snapshot.  Mutators return `Ok(true)` when something was
// applied and committed, `Ok(false)` for a silent no-op.

use ab_glyph::FontArc;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::{LayerId, LayerStack, PixelSurface};
use crate::components::history::HistoryManager;
use crate::config::EngineConfig;
use crate::coords::{CoordinateMapper, DeviceOrigin, PixelRect, Point, Size};
use crate::error::{EngineError, Result};
use crate::ops::brush;
use crate::ops::canvas_ops;
use crate::ops::clipboard::{self, ClipboardImage, Selection, SelectionShape};
use crate::ops::effects::{hash_u32, ColorPolicy, SparkleOverlay};
use crate::ops::fill::{self, FillJob, FillJobOutput};
use crate::ops::pattern::{PatternKind, PatternSpec};
use crate::ops::shapes::{self, ShapeKind, ShapeStyle};
use crate::ops::text;

/// Stamp size used when the current tool carries none.
pub const DEFAULT_STAMP_SIZE: f32 = 48.0;
/// Corner radius for rounded rectangles drawn from the drawing state.
pub const DEFAULT_CORNER_RADIUS: f32 = 8.0;

/// The active tool and the parameters it needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tool")]
pub enum Tool {
    Pencil { size: f32 },
    Eraser { size: f32 },
    Spray { radius: f32, density: u32 },
    Shape { kind: ShapeKind, outline_width: f32 },
    Stamp { size: f32 },
    Fill,
}

impl Default for Tool {
    fn default() -> Self {
        Tool::Pencil { size: 4.0 }
    }
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Pencil { .. } => "Pencil",
            Tool::Eraser { .. } => "Eraser",
            Tool::Spray { .. } => "Spray",
            Tool::Shape { .. } => "Shape",
            Tool::Stamp { .. } => "Stamp",
            Tool::Fill => "Fill",
        }
    }
}

/// Everything the UI chooses that shapes how draw calls paint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawingState {
    pub tool: Tool,
    pub primary: Rgba<u8>,
    pub secondary: Rgba<u8>,
    pub pattern: PatternKind,
    pub color_policy: ColorPolicy,
    /// Post-draw speckle overlay; `None` when disabled.
    pub sparkle: Option<SparkleOverlay>,
    pub anti_alias: bool,
}

impl Default for DrawingState {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            primary: Rgba([0, 0, 0, 255]),
            secondary: Rgba([255, 255, 255, 255]),
            pattern: PatternKind::Solid,
            color_policy: ColorPolicy::Solid,
            sparkle: None,
            anti_alias: true,
        }
    }
}

/// A fill running on a worker, waiting to be handed back.
struct PendingFill {
    job: FillJob,
    layer_id: LayerId,
    dimensions: (u32, u32),
}

pub struct DrawingEngine {
    id: Uuid,
    stack: LayerStack,
    history: HistoryManager,
    state: DrawingState,
    config: EngineConfig,
    mapper: CoordinateMapper,
    selection: Option<Selection>,
    clipboard: Option<ClipboardImage>,
    pending_fill: Option<PendingFill>,
    noise_counter: u32,
}

impl DrawingEngine {
    /// Engine with default settings at the given size.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_config(EngineConfig {
            width,
            height,
            ..Default::default()
        })
    }

    /// Build the initial stack and commit it as the first snapshot.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let stack = LayerStack::with_background(config.width, config.height, config.background())?;
        let mut history = HistoryManager::new(config.history_limit).with_memory_limit(config.history_memory_bytes());
        history.commit(&stack, "New canvas")?;

        let id = Uuid::new_v4();
        log::info!("engine {}: new {}x{} canvas", id, config.width, config.height);
        Ok(Self {
            id,
            stack,
            history,
            state: DrawingState::default(),
            config,
            mapper: CoordinateMapper::default(),
            selection: None,
            clipboard: None,
            pending_fill: None,
            noise_counter: 0,
        })
    }

    // ---- accessors -----------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn width(&self) -> u32 {
        self.stack.width()
    }

    pub fn height(&self) -> u32 {
        self.stack.height()
    }

    pub fn layer_count(&self) -> usize {
        self.stack.len()
    }

    pub fn active_layer_index(&self) -> usize {
        self.stack.active_layer_index()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &DrawingState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DrawingState {
        &mut self.state
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn clipboard(&self) -> Option<&ClipboardImage> {
        self.clipboard.as_ref()
    }

    // ---- drawing state ---------------------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) {
        self.state.tool = tool;
    }

    pub fn set_primary_color(&mut self, color: Rgba<u8>) {
        self.state.primary = color;
    }

    pub fn set_secondary_color(&mut self, color: Rgba<u8>) {
        self.state.secondary = color;
    }

    pub fn set_pattern(&mut self, pattern: PatternKind) {
        self.state.pattern = pattern;
    }

    pub fn set_color_policy(&mut self, policy: ColorPolicy) {
        self.state.color_policy = policy;
    }

    pub fn set_sparkle(&mut self, sparkle: Option<SparkleOverlay>) {
        self.state.sparkle = sparkle;
    }

    pub fn set_device_origin(&mut self, origin: DeviceOrigin) {
        self.mapper = CoordinateMapper::new(origin);
    }

    /// Map an input-device point into canvas space.
    pub fn map_device_point(&self, device: Point, view: Size) -> Point {
        self.mapper.map(device, view, self.stack.width(), self.stack.height())
    }

    /// Primary colour for the next draw call (advances a rotating hue).
    fn resolve_primary(&mut self) -> Rgba<u8> {
        self.state.color_policy.resolve(self.state.primary)
    }

    fn next_seed(&mut self) -> u32 {
        self.noise_counter = self.noise_counter.wrapping_add(1);
        hash_u32(self.noise_counter)
    }

    /// Pattern spec built from the drawing state, colour policy applied.
    pub fn current_fill_spec(&mut self) -> PatternSpec {
        let primary = self.resolve_primary();
        PatternSpec::new(self.state.pattern, primary, self.state.secondary)
    }

    /// Shape style built from the drawing state, colour policy applied.
    pub fn current_shape_style(&mut self) -> ShapeStyle {
        let outline_width = match self.state.tool {
            Tool::Shape { outline_width, .. } => outline_width,
            _ => 1.0,
        };
        let fill = self.current_fill_spec();
        ShapeStyle {
            outline: fill.primary,
            outline_width,
            corner_radius: DEFAULT_CORNER_RADIUS,
            fill,
            anti_alias: self.state.anti_alias,
        }
    }

    fn active_surface(&mut self) -> Option<&mut PixelSurface> {
        self.stack.repair();
        self.stack.active_layer_mut().map(|l| &mut l.surface)
    }

    // ---- history ----------------------------------------------------------------

    /// Snapshot the stack.  If the snapshot cannot be taken the stack is
    /// rolled back to the last committed state before the error is returned.
    fn commit(&mut self, description: &str) -> Result<bool> {
        if let Err(e) = self.history.commit(&self.stack, description) {
            log::warn!("engine {}: commit '{}' failed: {}", self.id, description, e);
            if let Err(restore) = self.history.restore_current(&mut self.stack) {
                log::error!("engine {}: rollback failed: {}", self.id, restore);
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Post-draw overlay, then commit.  `None` means nothing was drawn.
    fn finish_draw(&mut self, dirty: Option<PixelRect>, description: &str, overlay: bool) -> Result<bool> {
        let Some(dirty) = dirty else {
            return Ok(false);
        };
        if overlay && let Some(sparkle) = self.state.sparkle {
            let seed = self.next_seed();
            if let Some(surface) = self.active_surface() {
                sparkle.apply(surface, dirty, seed);
            }
        }
        self.commit(description)
    }

    pub fn undo(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        self.history.undo(&mut self.stack)
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        self.history.redo(&mut self.stack)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ---- tool operations ----------------------------------------------------

    /// One segment of a pointer drag with the current tool.  Tools that do
    /// not stroke (shape, stamp, fill) ignore segments.
    pub fn stroke_segment(&mut self, from: Point, to: Point) -> Result<bool> {
        self.finish_pending_fill()?;
        let tool = self.state.tool;
        let color = match tool {
            Tool::Pencil { .. } | Tool::Spray { .. } => self.resolve_primary(),
            _ => self.state.primary,
        };
        let seed = self.next_seed();
        let Some(surface) = self.active_surface() else {
            return Ok(false);
        };
        let dirty = match tool {
            Tool::Pencil { size } => brush::pencil_segment(surface, from, to, size, color),
            Tool::Eraser { size } => brush::eraser_segment(surface, from, to, size),
            Tool::Spray { radius, density } => brush::spray_segment(surface, from, to, radius, density, color, seed),
            Tool::Shape { .. } | Tool::Stamp { .. } | Tool::Fill => None,
        };
        let overlay = !matches!(tool, Tool::Eraser { .. });
        self.finish_draw(dirty, tool.name(), overlay)
    }

    /// Draw a shape dragged from `start` to `end` with an explicit style.
    pub fn draw_shape(&mut self, kind: ShapeKind, start: Point, end: Point, style: &ShapeStyle) -> Result<bool> {
        self.finish_pending_fill()?;
        let Some(surface) = self.active_surface() else {
            return Ok(false);
        };
        let dirty = shapes::draw_shape(surface, kind, start, end, style);
        self.finish_draw(dirty, &format!("Shape: {}", kind.name()), true)
    }

    /// Draw a shape using the drawing state's colours, pattern and tool.
    pub fn draw_current_shape(&mut self, start: Point, end: Point) -> Result<bool> {
        let kind = match self.state.tool {
            Tool::Shape { kind, .. } => kind,
            _ => ShapeKind::default(),
        };
        let style = self.current_shape_style();
        self.draw_shape(kind, start, end, &style)
    }

    fn stamp_size(&self) -> f32 {
        match self.state.tool {
            Tool::Stamp { size } => size,
            _ => DEFAULT_STAMP_SIZE,
        }
    }

    /// Stamp a glyph (or short text) centred on `point`, rotated by `rotation` radians.
    pub fn stamp_at(&mut self, point: Point, glyph: &str, font: &FontArc, rotation: f32) -> Result<bool> {
        self.finish_pending_fill()?;
        let size = self.stamp_size();
        let color = self.resolve_primary();
        let Some(surface) = self.active_surface() else {
            return Ok(false);
        };
        let dirty = text::stamp_glyph(surface, font, glyph, point, size, rotation, color)?;
        self.finish_draw(dirty, "Stamp", true)
    }

    /// Stamp an image scaled to the stamp size, centred on `point`.
    pub fn stamp_image_at(&mut self, point: Point, image: &RgbaImage, rotation: f32) -> Result<bool> {
        self.finish_pending_fill()?;
        let Some(scaled) = text::fit_to_size(image, self.stamp_size()) else {
            return Ok(false);
        };
        let Some(surface) = self.active_surface() else {
            return Ok(false);
        };
        let dirty = text::stamp_image(surface, &scaled, point, rotation);
        self.finish_draw(dirty, "Stamp", true)
    }

    // ---- flood fill ----------------------------------------------------------

    /// Flood fill the active layer at `point`, synchronously.
    ///
    /// Exceeding the configured limits returns `FillAborted` with the layer
    /// untouched.
    pub fn flood_fill_at(&mut self, point: Point, spec: &PatternSpec) -> Result<bool> {
        self.finish_pending_fill()?;
        if !point.is_sane() {
            return Ok(false);
        }
        let seed = point.to_pixel();
        let limits = self.config.fill_limits();
        let Some(surface) = self.active_surface() else {
            return Ok(false);
        };
        let outcome = match fill::flood_fill(surface, seed, spec, limits) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("flood fill at {:?} aborted: {}", seed, e);
                return Err(e);
            }
        };
        self.finish_draw(outcome.bounds, "Fill", true)
    }

    /// Start a flood fill on a worker against a private copy of the active
    /// layer.  The result lands on the next poll/finish or mutating call.
    pub fn begin_flood_fill_at(&mut self, point: Point, spec: &PatternSpec) -> Result<bool> {
        self.finish_pending_fill()?;
        if !point.is_sane() {
            return Ok(false);
        }
        self.stack.repair();
        let Some(layer) = self.stack.active_layer() else {
            return Ok(false);
        };
        let seed = point.to_pixel();
        if !layer.surface.in_bounds(seed.0, seed.1) {
            return Ok(false);
        }
        let copy = layer.surface.try_clone()?;
        let pending = PendingFill {
            layer_id: layer.id,
            dimensions: copy.dimensions(),
            job: FillJob::spawn(copy, seed, *spec, self.config.fill_limits()),
        };
        log::debug!("engine {}: background fill started on layer {}", self.id, pending.layer_id);
        self.pending_fill = Some(pending);
        Ok(true)
    }

    /// Fill using the engine's configured mode (worker hand-off or inline).
    pub fn fill_with_state(&mut self, point: Point) -> Result<bool> {
        let spec = self.current_fill_spec();
        if self.config.background_fill {
            if !self.begin_flood_fill_at(point, &spec)? {
                return Ok(false);
            }
            self.finish_pending_fill()
        } else {
            self.flood_fill_at(point, &spec)
        }
    }

    pub fn has_pending_fill(&self) -> bool {
        self.pending_fill.is_some()
    }

    /// Hand back a finished background fill, if there is one.  Returns
    /// `Ok(true)` when a fill was applied and committed.
    pub fn poll_pending_fill(&mut self) -> Result<bool> {
        let Some(pending) = self.pending_fill.take() else {
            return Ok(false);
        };
        match pending.job.poll() {
            None => {
                self.pending_fill = Some(pending);
                Ok(false)
            }
            Some(result) => self.hand_off(pending.layer_id, pending.dimensions, result),
        }
    }

    /// Block until a pending background fill finishes and hand it back.
    pub fn finish_pending_fill(&mut self) -> Result<bool> {
        let Some(pending) = self.pending_fill.take() else {
            return Ok(false);
        };
        let result = pending.job.wait();
        self.hand_off(pending.layer_id, pending.dimensions, result)
    }

    fn hand_off(&mut self, layer_id: LayerId, dimensions: (u32, u32), result: Result<FillJobOutput>) -> Result<bool> {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                log::warn!("engine {}: background fill failed: {}", self.id, e);
                return Err(e);
            }
        };
        if output.outcome.is_noop() {
            return Ok(false);
        }
        let Some(index) = self.stack.index_of(layer_id) else {
            log::warn!("engine {}: fill target layer {} is gone, result dropped", self.id, layer_id);
            return Ok(false);
        };
        let Some(layer) = self.stack.layer_mut(index) else {
            return Ok(false);
        };
        if layer.surface.dimensions() != dimensions || output.surface.dimensions() != dimensions {
            log::warn!("engine {}: fill target layer {} changed size, result dropped", self.id, layer_id);
            return Ok(false);
        }
        layer.surface = output.surface;
        log::debug!("engine {}: background fill handed off to layer {}", self.id, layer_id);

        let was_active = index == self.stack.active_layer_index();
        let overlay = if was_active { self.state.sparkle } else { None };
        if let (Some(sparkle), Some(bounds)) = (overlay, output.outcome.bounds) {
            let seed = self.next_seed();
            if let Some(surface) = self.active_surface() {
                sparkle.apply(surface, bounds, seed);
            }
        }
        self.commit("Fill")
    }

    // ---- layers -----------------------------------------------------------------

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.stack.len() {
            return Err(EngineError::LayerIndex { index, len: self.stack.len() });
        }
        Ok(())
    }

    pub fn add_layer(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        canvas_ops::add_layer(&mut self.stack)?;
        self.commit("Add layer")
    }

    pub fn delete_layer(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        if !canvas_ops::delete_active_layer(&mut self.stack) {
            return Ok(false);
        }
        self.commit("Delete layer")
    }

    pub fn duplicate_layer(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        canvas_ops::duplicate_active_layer(&mut self.stack)?;
        self.commit("Duplicate layer")
    }

    pub fn merge_down(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        if !canvas_ops::merge_down(&mut self.stack) {
            return Ok(false);
        }
        self.commit("Merge down")
    }

    pub fn reorder_layer(&mut self, from: usize, to: usize) -> Result<bool> {
        self.finish_pending_fill()?;
        self.check_index(from)?;
        self.check_index(to)?;
        if !canvas_ops::move_layer(&mut self.stack, from, to) {
            return Ok(false);
        }
        self.commit("Move layer")
    }

    pub fn set_layer_opacity(&mut self, index: usize, opacity: f32) -> Result<bool> {
        self.finish_pending_fill()?;
        self.check_index(index)?;
        let Some(layer) = self.stack.layer_mut(index) else {
            return Ok(false);
        };
        let before = layer.opacity;
        if !layer.set_opacity(opacity) || layer.opacity == before {
            return Ok(false);
        }
        self.commit("Layer opacity")
    }

    pub fn set_layer_visibility(&mut self, index: usize, visible: bool) -> Result<bool> {
        self.finish_pending_fill()?;
        self.check_index(index)?;
        let Some(layer) = self.stack.layer_mut(index) else {
            return Ok(false);
        };
        if layer.visible == visible {
            return Ok(false);
        }
        layer.visible = visible;
        self.commit(if visible { "Show layer" } else { "Hide layer" })
    }

    pub fn rename_layer(&mut self, index: usize, name: &str) -> Result<bool> {
        self.finish_pending_fill()?;
        self.check_index(index)?;
        let Some(layer) = self.stack.layer_mut(index) else {
            return Ok(false);
        };
        if layer.name == name {
            return Ok(false);
        }
        layer.name = name.to_string();
        self.commit("Rename layer")
    }

    /// Make `index` the active layer.  Not a pixel change, so nothing is committed.
    pub fn select_layer(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.stack.set_active_layer(index))
    }

    pub fn resize_canvas(&mut self, width: u32, height: u32) -> Result<bool> {
        self.finish_pending_fill()?;
        if !canvas_ops::resize_canvas(&mut self.stack, width, height, self.config.background())? {
            return Ok(false);
        }
        self.commit("Resize canvas")
    }

    pub fn load_image_as_background(&mut self, image: &RgbaImage) -> Result<bool> {
        self.finish_pending_fill()?;
        if !canvas_ops::load_image_as_background(&mut self.stack, image)? {
            return Ok(false);
        }
        self.commit("Load background")
    }

    pub fn clear_active_layer(&mut self, color: Rgba<u8>) -> Result<bool> {
        self.finish_pending_fill()?;
        if !canvas_ops::clear_active_layer(&mut self.stack, color) {
            return Ok(false);
        }
        self.commit("Clear layer")
    }

    pub fn flatten(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        if !canvas_ops::flatten_image(&mut self.stack)? {
            return Ok(false);
        }
        self.commit("Flatten image")
    }

    /// Flattened image of every visible layer, always recomputed.
    pub fn render_composite(&self) -> Result<RgbaImage> {
        self.stack.composite()
    }

    // ---- selection & clipboard --------------------------------------------------

    pub fn select_rect(&mut self, a: Point, b: Point) -> bool {
        match SelectionShape::rectangle(a, b) {
            Some(shape) => {
                self.selection = Some(Selection::new(shape));
                true
            }
            None => false,
        }
    }

    pub fn select_circle(&mut self, origin: Point, radius: f32) -> bool {
        match SelectionShape::circle(origin, radius) {
            Some(shape) => {
                self.selection = Some(Selection::new(shape));
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Copy the selected pixels of the active layer to the clipboard.
    pub fn copy_selection(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        let Some(selection) = self.selection else {
            return Ok(false);
        };
        self.stack.repair();
        let Some(layer) = self.stack.active_layer() else {
            return Ok(false);
        };
        match clipboard::copy_selection(&layer.surface, &selection.shape)? {
            Some(copied) => {
                self.clipboard = Some(copied);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copy, then clear the selected pixels.
    pub fn cut_selection(&mut self) -> Result<bool> {
        self.finish_pending_fill()?;
        let Some(selection) = self.selection else {
            return Ok(false);
        };
        let Some(surface) = self.active_surface() else {
            return Ok(false);
        };
        match clipboard::cut_selection(surface, &selection.shape)? {
            Some(copied) => {
                self.clipboard = Some(copied);
                self.commit("Cut")
            }
            None => Ok(false),
        }
    }

    /// Paste the clipboard onto the active layer centred on `point`.
    pub fn paste_at(&mut self, point: Point) -> Result<bool> {
        self.finish_pending_fill()?;
        let Some(clip) = self.clipboard.take() else {
            return Ok(false);
        };
        let dirty = match self.active_surface() {
            Some(surface) => clipboard::paste_at(surface, &clip, point),
            None => None,
        };
        self.clipboard = Some(clip);
        self.finish_draw(dirty, "Paste", false)
    }

    pub fn paste_selection(&mut self, point: Point) -> Result<bool> {
        self.paste_at(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn test_new_engine_has_one_snapshot() {
        let engine = DrawingEngine::new(16, 16).unwrap();
        assert_eq!(engine.history().len(), 1);
        assert!(!engine.can_undo());
        assert_eq!(engine.layer_count(), 1);
    }

    #[test]
    fn test_hand_off_abandoned_when_layer_deleted() {
        let mut engine = DrawingEngine::new(16, 16).unwrap();
        engine.add_layer().unwrap();
        assert!(engine.begin_flood_fill_at(Point::new(2.0, 2.0), &PatternSpec::solid(RED)).unwrap());
        // Drop the target layer behind the engine's back
        let idx = engine.stack.active_layer_index;
        engine.stack.layers.remove(idx);
        engine.stack.repair();
        let entries = engine.history().len();
        assert!(!engine.finish_pending_fill().unwrap());
        assert_eq!(engine.history().len(), entries);
        assert!(engine.stack.layers.iter().all(|l| l.surface.get(2, 2) != Some(RED)));
    }

    #[test]
    fn test_hand_off_abandoned_when_size_changed() {
        let mut engine = DrawingEngine::new(16, 16).unwrap();
        assert!(engine.begin_flood_fill_at(Point::new(2.0, 2.0), &PatternSpec::solid(RED)).unwrap());
        let resized = engine.stack.layers[0].surface.resized(8, 8, RED).unwrap();
        engine.stack.layers[0].surface = resized;
        assert!(!engine.finish_pending_fill().unwrap());
    }

    #[test]
    fn test_non_stroking_tool_ignores_segments() {
        let mut engine = DrawingEngine::new(16, 16).unwrap();
        engine.set_tool(Tool::Fill);
        assert!(!engine.stroke_segment(Point::new(1.0, 1.0), Point::new(8.0, 8.0)).unwrap());
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_stroke_survives_corrupted_stack() {
        let mut engine = DrawingEngine::new(16, 16).unwrap();
        engine.set_tool(Tool::Pencil { size: 2.0 });
        engine.set_primary_color(RED);

        engine.stack.active_layer_index = 7;
        assert!(engine.stroke_segment(Point::new(2.5, 2.5), Point::new(6.5, 2.5)).unwrap());
        assert_eq!(engine.stack.active_layer_index, 0);
        assert_eq!(engine.stack.layers[0].surface.get(4, 2), Some(RED));

        engine.stack.layers.clear();
        assert!(engine.stroke_segment(Point::new(2.5, 8.5), Point::new(6.5, 8.5)).unwrap());
        assert_eq!(engine.stack.layers.len(), 1);
        assert_eq!(engine.stack.layers[0].surface.get(4, 8), Some(RED));
    }
}
