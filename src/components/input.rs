use serde::{Deserialize, Serialize};

/// Raw input as delivered by a host toolkit, in viewport coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawInput {
    MouseDown { x: f32, y: f32 },
    MouseMove { x: f32, y: f32 },
    MouseUp { x: f32, y: f32 },
    /// Pointer left the drawing area (or the window lost it).
    MouseLeave,
    TouchStart { id: u64, x: f32, y: f32 },
    TouchMove { id: u64, x: f32, y: f32 },
    TouchEnd { id: u64, x: f32, y: f32 },
    TouchCancel { id: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// One modality-free pointer event in viewport coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub x: f32,
    pub y: f32,
}

impl PointerEvent {
    fn new(phase: PointerPhase, (x, y): (f32, f32)) -> Self {
        Self { phase, x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Contact {
    None,
    Mouse,
    Touch(u64),
}

/// Folds mouse and touch input into a single down → move* → up stream.
///
/// Only one contact is tracked at a time: extra fingers, and mouse events
/// arriving during a touch gesture, are ignored. Every `Down` is guaranteed
/// a matching `Up`: leaving the area, cancelling the touch, or a fresh
/// mouse-down without an intervening mouse-up all close the open gesture at
/// the last known position.
#[derive(Debug)]
pub struct InputUnifier {
    contact: Contact,
    last: (f32, f32),
}

impl Default for InputUnifier {
    fn default() -> Self {
        Self::new()
    }
}

impl InputUnifier {
    pub fn new() -> Self {
        Self {
            contact: Contact::None,
            last: (0.0, 0.0),
        }
    }

    /// True while a gesture is open.
    pub fn is_down(&self) -> bool {
        self.contact != Contact::None
    }

    /// Whether the host should block its own scroll/zoom handling right now.
    pub fn suppress_default_gestures(&self) -> bool {
        matches!(self.contact, Contact::Touch(_))
    }

    /// Translate one raw event. Usually yields zero or one pointer event;
    /// a mouse-down while a mouse gesture is still open yields `Up` then `Down`.
    pub fn feed(&mut self, raw: RawInput) -> Vec<PointerEvent> {
        let mut out = Vec::with_capacity(2);
        match raw {
            RawInput::MouseDown { x, y } => match self.contact {
                Contact::Touch(_) => {}
                Contact::Mouse => {
                    out.push(self.close());
                    out.push(self.open(Contact::Mouse, (x, y)));
                }
                Contact::None => out.push(self.open(Contact::Mouse, (x, y))),
            },
            RawInput::MouseMove { x, y } => {
                if self.contact == Contact::Mouse {
                    out.push(self.moved((x, y)));
                }
            }
            RawInput::MouseUp { x, y } => {
                if self.contact == Contact::Mouse {
                    self.last = (x, y);
                    out.push(self.close());
                }
            }
            RawInput::MouseLeave => {
                if self.contact == Contact::Mouse {
                    out.push(self.close());
                }
            }
            RawInput::TouchStart { id, x, y } => {
                if self.contact == Contact::None {
                    out.push(self.open(Contact::Touch(id), (x, y)));
                }
            }
            RawInput::TouchMove { id, x, y } => {
                if self.contact == Contact::Touch(id) {
                    out.push(self.moved((x, y)));
                }
            }
            RawInput::TouchEnd { id, x, y } => {
                if self.contact == Contact::Touch(id) {
                    self.last = (x, y);
                    out.push(self.close());
                }
            }
            RawInput::TouchCancel { id } => {
                if self.contact == Contact::Touch(id) {
                    out.push(self.close());
                }
            }
        }
        out
    }

    /// Close any open gesture (focus lost, page switch). Returns the
    /// synthesised `Up`, if one was needed.
    pub fn release(&mut self) -> Option<PointerEvent> {
        self.is_down().then(|| self.close())
    }

    fn open(&mut self, contact: Contact, pos: (f32, f32)) -> PointerEvent {
        self.contact = contact;
        self.last = pos;
        PointerEvent::new(PointerPhase::Down, pos)
    }

    fn moved(&mut self, pos: (f32, f32)) -> PointerEvent {
        self.last = pos;
        PointerEvent::new(PointerPhase::Move, pos)
    }

    fn close(&mut self) -> PointerEvent {
        self.contact = Contact::None;
        PointerEvent::new(PointerPhase::Up, self.last)
    }
}
