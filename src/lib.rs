//! KidPaint drawing engine.
//!
//! A persistent RGBA surface, a handful of kid-friendly tools (brush, eraser,
//! shapes, stamps, bucket fill), iterative flood fill on raw pixel memory and
//! snapshot-based linear undo/redo. [`session::DrawingSession`] ties it all
//! together for hosts; [`app`] is the desktop studio and [`cli`] the headless
//! replayer.

pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;
