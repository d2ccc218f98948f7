use ab_glyph::FontArc;
use image::{Rgba, RgbaImage};

use crate::canvas::{CanvasError, Surface, ViewportRect};
use crate::components::history::{EditKind, HistoryManager};
use crate::components::input::{InputUnifier, PointerEvent, RawInput};
use crate::components::tools::{
    PlacementPreview, ToolController, ToolKind, ToolOutcome, ToolState, ToolTarget, MAX_TOOL_SIZE,
};
use crate::ops::shapes::ShapeKind;
use crate::ops::stamp::StampGlyph;
use crate::settings::StudioSettings;

/// One page being drawn on: the surface, its undo history, the toolbar state
/// and the gesture in flight.
///
/// Every entry point runs to completion before returning, so a host never
/// observes a half-applied edit.
pub struct DrawingSession {
    surface: Surface,
    history: HistoryManager,
    tools: ToolState,
    input: InputUnifier,
    controller: ToolController,
    stamp_font: Option<FontArc>,
}

impl DrawingSession {
    /// Blank page of `width`×`height` filled with `background`.
    pub fn new(width: u32, height: u32, background: Rgba<u8>, max_undo: usize) -> Result<Self, CanvasError> {
        let surface = Surface::new(width, height, background).inspect_err(|e| {
            crate::log_err!("Session: {}", e);
        })?;
        let mut history = HistoryManager::new(max_undo);
        history.reset(&surface);
        crate::log_info!(
            "Session: new {}x{} page, undo depth {}",
            width,
            height,
            history.max_entries()
        );
        Ok(Self {
            surface,
            history,
            tools: ToolState::default(),
            input: InputUnifier::new(),
            controller: ToolController::new(),
            stamp_font: None,
        })
    }

    pub fn from_settings(settings: &StudioSettings) -> Result<Self, CanvasError> {
        let mut session = Self::new(
            settings.canvas_width,
            settings.canvas_height,
            settings.background,
            settings.max_undo_steps,
        )?;
        session.set_size(settings.brush_size);
        Ok(session)
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn stamp_font(&self) -> Option<&FontArc> {
        self.stamp_font.as_ref()
    }

    pub fn set_stamp_font(&mut self, font: Option<FontArc>) {
        self.stamp_font = font;
    }

    /// Ghost of the shape or stamp being placed, for overlay drawing.
    pub fn preview(&self) -> Option<&PlacementPreview> {
        self.controller.preview()
    }

    /// Whether the host should block its own scroll/zoom handling.
    pub fn suppress_default_gestures(&self) -> bool {
        self.input.suppress_default_gestures()
    }

    // ------------------------------------------------------------------------
    // Toolbar
    // ------------------------------------------------------------------------

    /// Switch tools. Any gesture in progress is finished first.
    pub fn set_tool(&mut self, tool: ToolKind) -> ToolOutcome {
        let outcome = self.end_gesture();
        self.tools.tool = tool;
        outcome
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.tools.color = color;
    }

    /// Clamped to `1..=MAX_TOOL_SIZE`; non-finite sizes are ignored.
    pub fn set_size(&mut self, size: f32) {
        if size.is_finite() {
            self.tools.size = size.clamp(1.0, MAX_TOOL_SIZE);
        }
    }

    pub fn set_shape(&mut self, shape: ShapeKind) {
        self.tools.shape = shape;
    }

    pub fn set_stamp(&mut self, stamp: StampGlyph) {
        self.tools.stamp = stamp;
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    /// Feed one raw mouse/touch event. `rect` is where the surface is shown
    /// right now; it is re-read on every event.
    pub fn handle_raw(&mut self, raw: RawInput, rect: ViewportRect) -> ToolOutcome {
        self.input
            .feed(raw)
            .into_iter()
            .fold(ToolOutcome::None, |acc, event| acc.merge(self.handle_pointer(event, rect)))
    }

    /// Feed an already-unified pointer event.
    pub fn handle_pointer(&mut self, event: PointerEvent, rect: ViewportRect) -> ToolOutcome {
        let target = ToolTarget {
            surface: &mut self.surface,
            history: &mut self.history,
            font: self.stamp_font.as_ref(),
        };
        self.controller.handle(event, rect, &self.tools, target)
    }

    // ------------------------------------------------------------------------
    // Page commands
    // ------------------------------------------------------------------------

    pub fn undo(&mut self) -> Option<EditKind> {
        self.end_gesture();
        self.history.undo(&mut self.surface)
    }

    pub fn redo(&mut self) -> Option<EditKind> {
        self.end_gesture();
        self.history.redo(&mut self.surface)
    }

    /// Wipe the page back to the background colour as an undoable edit.
    pub fn clear(&mut self) -> ToolOutcome {
        self.end_gesture();
        self.surface.clear();
        self.history.snapshot(EditKind::Clear, &self.surface);
        ToolOutcome::Committed(EditKind::Clear)
    }

    /// Start a fresh blank page of the same size. History restarts.
    pub fn new_page(&mut self) {
        self.abandon_gesture();
        self.surface.clear();
        self.history.reset(&self.surface);
        crate::log_info!("Session: new page");
    }

    /// Start a coloring-book page from `line_art`. History restarts. On
    /// failure the current page and its history are kept.
    pub fn load_line_art(&mut self, line_art: &RgbaImage) -> Result<(), CanvasError> {
        let mut page = Surface::new(self.surface.width(), self.surface.height(), self.surface.background())?;
        page.load_image(line_art).inspect_err(|e| {
            crate::log_warn!("Session: line-art rejected: {}", e);
        })?;
        self.abandon_gesture();
        self.surface = page;
        self.history.reset(&self.surface);
        crate::log_info!(
            "Session: loaded {}x{} line-art",
            line_art.width(),
            line_art.height()
        );
        Ok(())
    }

    pub fn export_png(&self) -> Result<Vec<u8>, CanvasError> {
        crate::io::export_png(&self.surface)
    }

    /// Close any open gesture, committing a stroke in progress. Page
    /// commands call this themselves; hosts that count commits call it
    /// first to see the stroke that gets closed.
    pub fn end_gesture(&mut self) -> ToolOutcome {
        self.input.release();
        self.controller.cancel(&self.surface, &mut self.history)
    }

    /// Drop any open gesture without recording it; used before the page is
    /// replaced wholesale.
    fn abandon_gesture(&mut self) {
        self.input.release();
        self.controller = ToolController::new();
    }
}
