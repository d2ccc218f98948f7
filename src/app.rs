use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2};
use image::Rgba;
use rfd::FileDialog;

use crate::canvas::ViewportRect;
use crate::components::input::RawInput;
use crate::components::tools::{PlacementKind, PlacementPreview, ToolKind, BRUSH_SIZE_PRESETS};
use crate::io::{load_line_art, save_png, LINE_ART_EXTENSIONS};
use crate::ops::shapes::{shape_outline, ShapeKind};
use crate::ops::stamp::{load_stamp_font, StampGlyph};
use crate::session::DrawingSession;
use crate::settings::StudioSettings;

/// Crayon box shown in the toolbar.
const PALETTE: [Rgba<u8>; 12] = [
    Rgba([0, 0, 0, 255]),
    Rgba([255, 255, 255, 255]),
    Rgba([229, 57, 53, 255]),
    Rgba([255, 143, 0, 255]),
    Rgba([253, 216, 53, 255]),
    Rgba([67, 160, 71, 255]),
    Rgba([30, 136, 229, 255]),
    Rgba([94, 53, 177, 255]),
    Rgba([236, 64, 122, 255]),
    Rgba([121, 85, 72, 255]),
    Rgba([128, 222, 234, 255]),
    Rgba([158, 158, 158, 255]),
];

/// Character stamps offered next to the built-in heart.
const CHAR_STAMPS: [char; 4] = ['★', '☺', '✿', '♪'];

pub struct KidPaintApp {
    session: DrawingSession,
    settings: StudioSettings,

    // Surface texture, re-uploaded only when pixels changed
    texture: Option<TextureHandle>,
    texture_dirty: bool,

    /// Last message for the status bar (load/save errors).
    status: Option<String>,
}

impl KidPaintApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, mut session: DrawingSession, settings: StudioSettings) -> Self {
        session.set_stamp_font(load_stamp_font(&settings.stamp_font_family));
        if session.stamp_font().is_none() {
            crate::log_warn!("No outline font found; character stamps disabled");
        }

        Self {
            session,
            settings,
            texture: None,
            texture_dirty: true,
            status: None,
        }
    }

    fn color32(c: Rgba<u8>) -> Color32 {
        Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3])
    }

    // ========================================================================
    // TOOLBAR
    // ========================================================================

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for &tool in ToolKind::all() {
                let selected = self.session.tools().tool == tool;
                if ui.selectable_label(selected, tool.label()).clicked() && !selected {
                    self.texture_dirty |= self.session.set_tool(tool).needs_repaint();
                }
            }
            ui.separator();

            for color in PALETTE {
                let selected = self.session.tools().color == color;
                let swatch = egui::Button::new("")
                    .fill(Self::color32(color))
                    .min_size(Vec2::splat(22.0))
                    .stroke(if selected {
                        Stroke::new(3.0, Color32::from_rgb(255, 200, 0))
                    } else {
                        Stroke::new(1.0, Color32::DARK_GRAY)
                    });
                if ui.add(swatch).clicked() {
                    self.session.set_color(color);
                }
            }
            ui.separator();

            ui.label("Size");
            for size in BRUSH_SIZE_PRESETS {
                let selected = self.session.tools().size == size;
                if ui.selectable_label(selected, format!("{}", size as u32)).clicked() {
                    self.session.set_size(size);
                    self.settings.brush_size = size;
                    self.settings.save();
                }
            }
        });

        ui.horizontal_wrapped(|ui| {
            match self.session.tools().tool {
                ToolKind::Shape => {
                    for shape in ShapeKind::picker_shapes() {
                        let selected = self.session.tools().shape == shape;
                        if ui.selectable_label(selected, shape.label()).clicked() {
                            self.session.set_shape(shape);
                        }
                    }
                    ui.separator();
                }
                ToolKind::Stamp => {
                    let heart = StampGlyph::Heart;
                    if ui.selectable_label(self.session.tools().stamp == heart, "♥").clicked() {
                        self.session.set_stamp(heart);
                    }
                    let has_font = self.session.stamp_font().is_some();
                    for ch in CHAR_STAMPS {
                        let glyph = StampGlyph::Char(ch);
                        let selected = self.session.tools().stamp == glyph;
                        let resp = ui.add_enabled(has_font, egui::SelectableLabel::new(selected, ch.to_string()));
                        if resp.clicked() {
                            self.session.set_stamp(glyph);
                        }
                    }
                    ui.separator();
                }
                _ => {}
            }

            let history = self.session.history();
            let undo_tip = history.undo_description().map(|d| format!("Undo {}", d));
            let redo_tip = history.redo_description().map(|d| format!("Redo {}", d));
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());

            let undo = ui.add_enabled(can_undo, egui::Button::new("↶ Undo"));
            if undo.on_hover_text(undo_tip.unwrap_or_default()).clicked() && self.session.undo().is_some() {
                self.texture_dirty = true;
            }
            let redo = ui.add_enabled(can_redo, egui::Button::new("↷ Redo"));
            if redo.on_hover_text(redo_tip.unwrap_or_default()).clicked() && self.session.redo().is_some() {
                self.texture_dirty = true;
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
                self.texture_dirty = true;
            }
            ui.separator();
            if ui.button("New Page").clicked() {
                self.session.new_page();
                self.texture_dirty = true;
            }
            if ui.button("Coloring Page…").clicked() {
                self.open_line_art();
            }
            if ui.button("Save…").clicked() {
                self.save_drawing();
            }
        });
    }

    fn open_line_art(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Images", LINE_ART_EXTENSIONS)
            .pick_file()
        else {
            return;
        };
        let result = load_line_art(&path).and_then(|art| self.session.load_line_art(&art));
        match result {
            Ok(()) => {
                self.status = None;
                self.texture_dirty = true;
            }
            Err(e) => self.status = Some(format!("Could not open {}: {}", path.display(), e)),
        }
    }

    fn save_drawing(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name("drawing.png")
            .save_file()
        else {
            return;
        };
        self.status = match save_png(self.session.surface(), &path) {
            Ok(()) => Some(format!("Saved {}", path.display())),
            Err(e) => {
                crate::log_err!("Save failed: {}", e);
                Some(format!("Save failed: {}", e))
            }
        };
    }

    // ========================================================================
    // CANVAS
    // ========================================================================

    /// Largest rect with the surface's aspect ratio that fits in `avail`, centred.
    fn fit_rect(&self, avail: Rect) -> Rect {
        let (sw, sh) = (self.session.surface().width() as f32, self.session.surface().height() as f32);
        let scale = (avail.width() / sw).min(avail.height() / sh).max(0.0);
        Rect::from_center_size(avail.center(), Vec2::new(sw * scale, sh * scale))
    }

    fn upload_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_dirty && self.texture.is_some() {
            return;
        }
        let img = self.session.surface().export_image();
        let size = [img.width() as usize, img.height() as usize];
        let color_image = ColorImage::from_rgba_unmultiplied(size, img.as_raw());
        match &mut self.texture {
            Some(tex) => tex.set(color_image, TextureOptions::NEAREST),
            None => self.texture = Some(ctx.load_texture("surface", color_image, TextureOptions::NEAREST)),
        }
        self.texture_dirty = false;
    }

    /// Turn this frame's egui events into raw input for the session.
    fn feed_events(&mut self, ctx: &egui::Context, canvas: Rect) {
        let rect = ViewportRect::new(canvas.left(), canvas.top(), canvas.width(), canvas.height());
        let events = ctx.input(|i| i.events.clone());
        for event in events {
            let raw = match event {
                egui::Event::PointerButton {
                    pos,
                    button: egui::PointerButton::Primary,
                    pressed,
                    ..
                } => {
                    if pressed && canvas.contains(pos) {
                        Some(RawInput::MouseDown { x: pos.x, y: pos.y })
                    } else if !pressed {
                        Some(RawInput::MouseUp { x: pos.x, y: pos.y })
                    } else {
                        None
                    }
                }
                egui::Event::PointerMoved(pos) if canvas.contains(pos) => {
                    Some(RawInput::MouseMove { x: pos.x, y: pos.y })
                }
                egui::Event::PointerMoved(_) | egui::Event::PointerGone => Some(RawInput::MouseLeave),
                egui::Event::Touch { id, phase, pos, .. } => {
                    let (id, x, y) = (id.0, pos.x, pos.y);
                    match phase {
                        egui::TouchPhase::Start if canvas.contains(pos) => Some(RawInput::TouchStart { id, x, y }),
                        egui::TouchPhase::Start => None,
                        egui::TouchPhase::Move => Some(RawInput::TouchMove { id, x, y }),
                        egui::TouchPhase::End => Some(RawInput::TouchEnd { id, x, y }),
                        egui::TouchPhase::Cancel => Some(RawInput::TouchCancel { id }),
                    }
                }
                _ => None,
            };
            if let Some(raw) = raw {
                self.texture_dirty |= self.session.handle_raw(raw, rect).needs_repaint();
            }
        }
    }

    fn paint_preview(painter: &egui::Painter, canvas: Rect, scale: f32, preview: &PlacementPreview) {
        let to_screen = |(x, y): (f32, f32)| Pos2::new(canvas.left() + x * scale, canvas.top() + y * scale);
        let stroke = Stroke::new(2.0, Self::color32(preview.color));
        match &preview.kind {
            PlacementKind::Shape(shape) => {
                let (cx, cy) = preview.center;
                let points = shape_outline(*shape, cx, cy, preview.size)
                    .into_iter()
                    .map(to_screen)
                    .collect();
                painter.add(egui::Shape::closed_line(points, stroke));
            }
            PlacementKind::Stamp(_) => {
                painter.circle_stroke(to_screen(preview.center), preview.size * 0.5 * scale, stroke);
            }
        }
    }
}

impl eframe::App for KidPaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Keyboard shortcuts ---
        let (undo, redo) = ctx.input_mut(|i| {
            (
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::Y),
            )
        });
        if undo && self.session.undo().is_some() {
            self.texture_dirty = true;
        }
        if redo && self.session.redo().is_some() {
            self.texture_dirty = true;
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.show_toolbar(ui));

        if let Some(status) = &self.status {
            egui::TopBottomPanel::bottom("status").show(ctx, |ui| ui.label(status.as_str()));
        }

        egui::CentralPanel::default()
            .frame(egui::Frame {
                fill: Color32::from_rgb(225, 232, 240),
                ..Default::default()
            })
            .show(ctx, |ui| {
                let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::hover());
                // The layout can change between frames, so the mapping rect is recomputed every time
                let canvas = self.fit_rect(response.rect.shrink(8.0));
                if canvas.width() < 1.0 || canvas.height() < 1.0 {
                    return;
                }

                self.feed_events(ctx, canvas);
                self.upload_texture(ctx);

                if let Some(tex) = &self.texture {
                    let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                    painter.image(tex.id(), canvas, uv, Color32::WHITE);
                }
                painter.rect_stroke(canvas, 0.0, Stroke::new(1.0, Color32::GRAY));

                if let Some(preview) = self.session.preview() {
                    let scale = canvas.width() / self.session.surface().width() as f32;
                    Self::paint_preview(&painter, canvas, scale, preview);
                }

                if self.session.tools().tool == ToolKind::Stamp
                    && matches!(self.session.tools().stamp, StampGlyph::Char(_))
                    && self.session.stamp_font().is_none()
                {
                    painter.text(
                        canvas.left_top() + Vec2::splat(6.0),
                        egui::Align2::LEFT_TOP,
                        "No font for character stamps",
                        egui::FontId::proportional(14.0),
                        Color32::DARK_RED,
                    );
                }
            });
    }
}
