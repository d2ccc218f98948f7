use ab_glyph::FontArc;
use image::Rgba;

use crate::canvas::{pixel_index, to_surface_coords, Surface, ViewportRect};
use crate::components::history::{EditKind, HistoryManager};
use crate::components::input::{PointerEvent, PointerPhase};
use crate::ops::fill::flood_fill;
use crate::ops::shapes::{rasterize_shape, ShapeKind};
use crate::ops::stamp::{rasterize_stamp, StampGlyph};
use crate::ops::stroke::StrokeSession;

/// Default brush size in surface pixels.
pub const DEFAULT_BRUSH_SIZE: f32 = 8.0;

/// Sizes offered by the toolbar, smallest first.
pub const BRUSH_SIZE_PRESETS: [f32; 6] = [2.0, 4.0, 8.0, 16.0, 24.0, 40.0];
/// Largest brush / shape / stamp size; bounds the per-edit raster buffers.
pub const MAX_TOOL_SIZE: f32 = 512.0;

/// The eraser paints background twice as wide as the brush at the same size.
const ERASER_WIDTH_FACTOR: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Brush,
    Eraser,
    Shape,
    Stamp,
    Fill,
}

impl ToolKind {
    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Brush => "Brush",
            ToolKind::Eraser => "Eraser",
            ToolKind::Shape => "Shapes",
            ToolKind::Stamp => "Stamps",
            ToolKind::Fill => "Bucket",
        }
    }

    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Brush,
            ToolKind::Eraser,
            ToolKind::Shape,
            ToolKind::Stamp,
            ToolKind::Fill,
        ]
    }
}

/// Everything the toolbar controls. Changing it never touches the surface.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolState {
    pub tool: ToolKind,
    pub color: Rgba<u8>,
    /// Stroke width, shape size or stamp size depending on the tool.
    pub size: f32,
    pub shape: ShapeKind,
    pub stamp: StampGlyph,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: ToolKind::default(),
            color: Rgba([0, 0, 0, 255]),
            size: DEFAULT_BRUSH_SIZE,
            shape: ShapeKind::default(),
            stamp: StampGlyph::default(),
        }
    }
}

// ============================================================================
// GESTURES
// ============================================================================

/// What a pending placement will put down.
#[derive(Clone, Debug, PartialEq)]
pub enum PlacementKind {
    Shape(ShapeKind),
    Stamp(StampGlyph),
}

/// Ghost of a shape or stamp that has not been committed yet. Hosts draw it
/// as an overlay; it never touches the surface.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementPreview {
    /// Centre in surface coordinates.
    pub center: (f32, f32),
    pub size: f32,
    pub color: Rgba<u8>,
    pub kind: PlacementKind,
}

#[derive(Debug, Default)]
enum Gesture {
    #[default]
    Idle,
    Stroking {
        session: StrokeSession,
        kind: EditKind,
    },
    Placing {
        anchor: (f32, f32),
        preview: PlacementPreview,
    },
}

/// Result of feeding one pointer event to the active tool.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    /// Nothing visible changed.
    None,
    /// Pixels changed but the edit is still in progress (live stroke).
    Painted,
    /// The placement ghost moved; the surface did not change.
    Preview(PlacementPreview),
    /// An edit finished and a history entry was recorded.
    Committed(EditKind),
}

impl ToolOutcome {
    /// Keep the more significant of two outcomes from the same input.
    pub fn merge(self, other: ToolOutcome) -> ToolOutcome {
        fn rank(o: &ToolOutcome) -> u8 {
            match o {
                ToolOutcome::None => 0,
                ToolOutcome::Preview(_) => 1,
                ToolOutcome::Painted => 2,
                ToolOutcome::Committed(_) => 3,
            }
        }
        if rank(&other) >= rank(&self) { other } else { self }
    }

    pub fn needs_repaint(&self) -> bool {
        !matches!(self, ToolOutcome::None)
    }
}

/// Surface, history and font a tool acts on.
pub struct ToolTarget<'a> {
    pub surface: &'a mut Surface,
    pub history: &'a mut HistoryManager,
    pub font: Option<&'a FontArc>,
}

/// Per-gesture state machine for the active tool.
///
/// Brush and eraser paint as the pointer moves and commit on release. Shapes
/// and stamps only show a preview until release, then rasterise and commit.
/// The bucket acts on press and commits only when it actually recoloured
/// something.
#[derive(Debug, Default)]
pub struct ToolController {
    gesture: Gesture,
}

impl ToolController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    /// Current placement ghost, if a shape or stamp is being positioned.
    pub fn preview(&self) -> Option<&PlacementPreview> {
        match &self.gesture {
            Gesture::Placing { preview, .. } => Some(preview),
            _ => None,
        }
    }

    pub fn handle(
        &mut self,
        event: PointerEvent,
        rect: ViewportRect,
        tools: &ToolState,
        target: ToolTarget<'_>,
    ) -> ToolOutcome {
        let ToolTarget { surface, history, font } = target;
        let point = to_surface_coords(event.x, event.y, rect, surface.width(), surface.height());

        match event.phase {
            PointerPhase::Down => {
                // A stale gesture (tool switched mid-drag) is finished first.
                self.cancel(surface, history);
                self.press(point, tools, surface, history)
            }
            PointerPhase::Move => self.drag(point, surface),
            PointerPhase::Up => self.release(point, surface, history, font),
        }
    }

    /// Abandon the current gesture. A stroke in progress is already on the
    /// surface, so it is committed; a pending placement is dropped.
    pub fn cancel(&mut self, surface: &Surface, history: &mut HistoryManager) -> ToolOutcome {
        match std::mem::take(&mut self.gesture) {
            Gesture::Stroking { kind, .. } => {
                history.snapshot(kind, surface);
                ToolOutcome::Committed(kind)
            }
            Gesture::Placing { .. } | Gesture::Idle => ToolOutcome::None,
        }
    }

    fn press(
        &mut self,
        point: (f32, f32),
        tools: &ToolState,
        surface: &mut Surface,
        history: &mut HistoryManager,
    ) -> ToolOutcome {
        match tools.tool {
            ToolKind::Brush | ToolKind::Eraser => {
                let (color, width, kind) = if tools.tool == ToolKind::Eraser {
                    (surface.background(), tools.size * ERASER_WIDTH_FACTOR, EditKind::Eraser)
                } else {
                    (tools.color, tools.size, EditKind::Stroke)
                };
                let session = StrokeSession::begin(surface, point, color, width);
                self.gesture = Gesture::Stroking { session, kind };
                ToolOutcome::Painted
            }
            ToolKind::Shape | ToolKind::Stamp => {
                let kind = if tools.tool == ToolKind::Shape {
                    PlacementKind::Shape(tools.shape)
                } else {
                    PlacementKind::Stamp(tools.stamp.clone())
                };
                let preview = PlacementPreview {
                    center: point,
                    size: tools.size,
                    color: tools.color,
                    kind,
                };
                self.gesture = Gesture::Placing {
                    anchor: point,
                    preview: preview.clone(),
                };
                ToolOutcome::Preview(preview)
            }
            ToolKind::Fill => {
                let result = flood_fill(surface, pixel_index(point.0), pixel_index(point.1), tools.color);
                if result.changed() {
                    history.snapshot(EditKind::Fill, surface);
                    ToolOutcome::Committed(EditKind::Fill)
                } else {
                    ToolOutcome::None
                }
            }
        }
    }

    fn drag(&mut self, point: (f32, f32), surface: &mut Surface) -> ToolOutcome {
        match &mut self.gesture {
            Gesture::Idle => ToolOutcome::None,
            Gesture::Stroking { session, .. } => {
                session.extend(surface, point);
                ToolOutcome::Painted
            }
            Gesture::Placing { anchor, preview } => {
                // Shapes stay where they were pressed; stamps follow the pointer.
                preview.center = match preview.kind {
                    PlacementKind::Shape(_) => *anchor,
                    PlacementKind::Stamp(_) => point,
                };
                ToolOutcome::Preview(preview.clone())
            }
        }
    }

    fn release(
        &mut self,
        point: (f32, f32),
        surface: &mut Surface,
        history: &mut HistoryManager,
        font: Option<&FontArc>,
    ) -> ToolOutcome {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => ToolOutcome::None,
            Gesture::Stroking { mut session, kind } => {
                if session.last() != point {
                    session.extend(surface, point);
                }
                history.snapshot(kind, surface);
                ToolOutcome::Committed(kind)
            }
            Gesture::Placing { anchor, preview } => {
                let (painted, kind) = match &preview.kind {
                    PlacementKind::Shape(shape) => (
                        rasterize_shape(surface, *shape, anchor.0, anchor.1, preview.size, preview.color),
                        EditKind::Shape,
                    ),
                    PlacementKind::Stamp(glyph) => (
                        rasterize_stamp(surface, glyph, font, point.0, point.1, preview.size, preview.color),
                        EditKind::Stamp,
                    ),
                };
                if painted.is_some() {
                    history.snapshot(kind, surface);
                    ToolOutcome::Committed(kind)
                } else {
                    ToolOutcome::None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    struct Rig {
        surface: Surface,
        history: HistoryManager,
        tools: ToolState,
        ctl: ToolController,
    }

    impl Rig {
        fn new(w: u32, h: u32) -> Self {
            let surface = Surface::new(w, h, WHITE).unwrap();
            let mut history = HistoryManager::default();
            history.reset(&surface);
            let tools = ToolState {
                color: RED,
                ..ToolState::default()
            };
            Self { surface, history, tools, ctl: ToolController::new() }
        }

        fn send(&mut self, phase: PointerPhase, x: f32, y: f32) -> ToolOutcome {
            let rect = ViewportRect::identity(self.surface.width(), self.surface.height());
            let target = ToolTarget {
                surface: &mut self.surface,
                history: &mut self.history,
                font: None,
            };
            self.ctl.handle(PointerEvent { phase, x, y }, rect, &self.tools, target)
        }
    }

    #[test]
    fn brush_paints_live_and_commits_on_release() {
        let mut rig = Rig::new(32, 32);
        assert_eq!(rig.send(PointerPhase::Down, 5.0, 5.0), ToolOutcome::Painted);
        assert_eq!(rig.surface.get_pixel(5, 5), RED);
        assert_eq!(rig.history.len(), 1);
        rig.send(PointerPhase::Move, 20.0, 5.0);
        assert_eq!(rig.surface.get_pixel(12, 5), RED);
        assert_eq!(rig.send(PointerPhase::Up, 20.0, 5.0), ToolOutcome::Committed(EditKind::Stroke));
        assert_eq!(rig.history.len(), 2);
        assert!(!rig.ctl.is_active());
    }

    #[test]
    fn tap_without_motion_commits_a_dot() {
        let mut rig = Rig::new(16, 16);
        rig.send(PointerPhase::Down, 8.0, 8.0);
        assert_eq!(rig.send(PointerPhase::Up, 8.0, 8.0), ToolOutcome::Committed(EditKind::Stroke));
        assert_eq!(rig.surface.get_pixel(8, 8), RED);
    }

    #[test]
    fn eraser_paints_background_at_double_width() {
        let mut rig = Rig::new(40, 40);
        for y in 0..40 {
            for x in 0..40 {
                rig.surface.set_pixel(x, y, RED);
            }
        }
        rig.tools.tool = ToolKind::Eraser;
        rig.tools.size = 4.0;
        rig.send(PointerPhase::Down, 20.0, 20.0);
        let outcome = rig.send(PointerPhase::Up, 20.0, 20.0);
        assert_eq!(outcome, ToolOutcome::Committed(EditKind::Eraser));
        // radius 4 (width 8), not 2
        assert_eq!(rig.surface.get_pixel(23, 20), WHITE);
        assert_eq!(rig.surface.get_pixel(25, 20), RED);
    }

    #[test]
    fn shape_previews_then_commits_at_anchor() {
        let mut rig = Rig::new(50, 50);
        rig.tools.tool = ToolKind::Shape;
        rig.tools.shape = ShapeKind::Square;
        rig.tools.size = 10.0;

        let down = rig.send(PointerPhase::Down, 20.0, 20.0);
        assert!(matches!(down, ToolOutcome::Preview(_)));
        let moved = rig.send(PointerPhase::Move, 40.0, 40.0);
        match moved {
            ToolOutcome::Preview(p) => assert_eq!(p.center, (20.0, 20.0)),
            other => panic!("unexpected {other:?}"),
        }
        // Nothing on the surface yet
        assert_eq!(rig.surface.get_pixel(20, 20), WHITE);

        assert_eq!(rig.send(PointerPhase::Up, 40.0, 40.0), ToolOutcome::Committed(EditKind::Shape));
        assert_eq!(rig.surface.get_pixel(15, 15), RED);
        assert_eq!(rig.surface.get_pixel(24, 24), RED);
        assert_eq!(rig.surface.get_pixel(40, 40), WHITE);
    }

    #[test]
    fn stamp_lands_at_release_point() {
        let mut rig = Rig::new(64, 64);
        rig.tools.tool = ToolKind::Stamp;
        rig.tools.size = 12.0;
        rig.send(PointerPhase::Down, 10.0, 10.0);
        match rig.send(PointerPhase::Move, 40.0, 40.0) {
            ToolOutcome::Preview(p) => assert_eq!(p.center, (40.0, 40.0)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rig.send(PointerPhase::Up, 40.0, 40.0), ToolOutcome::Committed(EditKind::Stamp));
        assert_eq!(rig.surface.get_pixel(40, 40), RED);
        assert_eq!(rig.surface.get_pixel(10, 10), WHITE);
    }

    #[test]
    fn fill_commits_only_when_it_changes_pixels() {
        let mut rig = Rig::new(20, 20);
        rig.tools.tool = ToolKind::Fill;
        assert_eq!(rig.send(PointerPhase::Down, 3.0, 3.0), ToolOutcome::Committed(EditKind::Fill));
        assert_eq!(rig.send(PointerPhase::Up, 3.0, 3.0), ToolOutcome::None);
        assert_eq!(rig.send(PointerPhase::Down, 9.0, 9.0), ToolOutcome::None);
        assert_eq!(rig.history.len(), 2);
    }

    #[test]
    fn cancel_drops_placement_but_keeps_stroke() {
        let mut rig = Rig::new(20, 20);
        rig.tools.tool = ToolKind::Shape;
        rig.send(PointerPhase::Down, 10.0, 10.0);
        assert_eq!(rig.ctl.cancel(&rig.surface, &mut rig.history), ToolOutcome::None);
        assert_eq!(rig.send(PointerPhase::Up, 10.0, 10.0), ToolOutcome::None);
        assert_eq!(rig.history.len(), 1);

        rig.tools.tool = ToolKind::Brush;
        rig.send(PointerPhase::Down, 4.0, 4.0);
        assert_eq!(
            rig.ctl.cancel(&rig.surface, &mut rig.history),
            ToolOutcome::Committed(EditKind::Stroke)
        );
        assert_eq!(rig.history.len(), 2);
    }

    #[test]
    fn events_are_mapped_through_the_viewport() {
        let mut rig = Rig::new(100, 100);
        rig.tools.tool = ToolKind::Fill;
        rig.surface.set_pixel(50, 50, Rgba([0, 0, 0, 255]));
        // Surface shown at half size, offset by (10, 10)
        let rect = ViewportRect::new(10.0, 10.0, 50.0, 50.0);
        let target = ToolTarget {
            surface: &mut rig.surface,
            history: &mut rig.history,
            font: None,
        };
        let ev = PointerEvent { phase: PointerPhase::Down, x: 35.0, y: 35.0 };
        rig.ctl.handle(ev, rect, &rig.tools, target);
        // (35-10)*2 = 50 → the single black pixel was filled
        assert_eq!(rig.surface.get_pixel(50, 50), RED);
        assert_eq!(rig.surface.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn merge_prefers_commits() {
        let c = ToolOutcome::Committed(EditKind::Stroke);
        assert_eq!(c.clone().merge(ToolOutcome::None), c);
        assert_eq!(ToolOutcome::Painted.merge(c.clone()), c);
        assert!(!ToolOutcome::None.needs_repaint());
    }
}
