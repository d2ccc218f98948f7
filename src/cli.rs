// ============================================================================
// KidPaint CLI — headless gesture replay via command-line arguments
// ============================================================================
//
// Usage examples:
//   kidpaint --replay gestures.json --output out.png
//   kidpaint -r fill.json -o page.png --line-art coloring/cat.png
//   kidpaint -r doodle.json -o doodle.png --width 320 --height 240 --background "#FFF8E7"
//
// No window is opened in CLI mode. The replay file is a JSON array of steps:
//   [
//     {"step": "set_tool", "tool": "fill"},
//     {"step": "set_color", "color": "#FF0000"},
//     {"step": "input", "event": {"kind": "mouse_down", "x": 50, "y": 50}},
//     {"step": "input", "event": {"kind": "mouse_up", "x": 50, "y": 50}},
//     {"step": "undo"}
//   ]
// `input` steps may carry a "viewport" rect; without one the surface is
// assumed to be shown 1:1 at the origin.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use serde::Deserialize;

use crate::canvas::{CanvasError, ViewportRect};
use crate::components::input::RawInput;
use crate::components::tools::{ToolKind, ToolOutcome};
use crate::ops::shapes::ShapeKind;
use crate::ops::stamp::{load_stamp_font, StampGlyph};
use crate::session::DrawingSession;
use crate::settings::{parse_hex_color, StudioSettings};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// KidPaint headless gesture replayer.
#[derive(Parser, Debug)]
#[command(
    name = "kidpaint",
    about = "KidPaint headless gesture replay",
    long_about = "Replay a recorded list of drawing gestures onto a blank page or a\n\
                  coloring-book page and save the result as PNG, without opening\n\
                  the studio window.\n\n\
                  Example:\n  \
                  kidpaint --replay gestures.json --output out.png"
)]
pub struct CliArgs {
    /// JSON file with the steps to replay.
    #[arg(short, long, required = true, value_name = "FILE.json")]
    pub replay: PathBuf,

    /// PNG file to write the finished page to.
    #[arg(short, long, required = true, value_name = "FILE.png")]
    pub output: PathBuf,

    /// Page width in pixels (default: from settings).
    #[arg(long)]
    pub width: Option<u32>,

    /// Page height in pixels (default: from settings).
    #[arg(long)]
    pub height: Option<u32>,

    /// Paper colour as #RRGGBB (default: from settings).
    #[arg(long, value_name = "#RRGGBB")]
    pub background: Option<String>,

    /// Start from this line-art image instead of a blank page.
    #[arg(long, value_name = "IMAGE")]
    pub line_art: Option<PathBuf>,

    /// Print each committed edit and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().skip(1).any(|a| {
            matches!(a.as_str(), "--replay" | "-r" | "--help" | "-h" | "--version" | "-V")
                || a.starts_with("--replay=")
        })
    }
}

// ============================================================================
// Replay script
// ============================================================================

/// One step of a replay file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReplayStep {
    SetTool { tool: ToolKind },
    /// `#RRGGBB` or `#RRGGBBAA`.
    SetColor { color: String },
    SetSize { size: f32 },
    SetShape { shape: ShapeKind },
    SetStamp { stamp: StampGlyph },
    Input {
        event: RawInput,
        #[serde(default)]
        viewport: Option<ViewportRect>,
    },
    Undo,
    Redo,
    Clear,
}

#[derive(Debug)]
pub enum ScriptError {
    Io(std::io::Error),
    /// Malformed JSON or an invalid value inside a step.
    Parse(String),
    Canvas(CanvasError),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Io(e) => write!(f, "I/O error: {}", e),
            ScriptError::Parse(e) => write!(f, "Invalid replay script: {}", e),
            ScriptError::Canvas(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        ScriptError::Io(e)
    }
}

impl From<serde_json::Error> for ScriptError {
    fn from(e: serde_json::Error) -> Self {
        ScriptError::Parse(e.to_string())
    }
}

impl From<CanvasError> for ScriptError {
    fn from(e: CanvasError) -> Self {
        ScriptError::Canvas(e)
    }
}

pub fn parse_script(json: &str) -> Result<Vec<ReplayStep>, ScriptError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_script(path: &Path) -> Result<Vec<ReplayStep>, ScriptError> {
    parse_script(&std::fs::read_to_string(path)?)
}

/// Apply `steps` to `session` in order. Returns the number of edits that
/// ended up committed to history. Stops at the first invalid step.
pub fn replay(session: &mut DrawingSession, steps: &[ReplayStep], verbose: bool) -> Result<usize, ScriptError> {
    let mut commits: usize = 0;
    for (idx, step) in steps.iter().enumerate() {
        let outcome = match step {
            ReplayStep::SetTool { tool } => session.set_tool(*tool),
            ReplayStep::SetColor { color } => {
                let c = parse_hex_color(color)
                    .ok_or_else(|| ScriptError::Parse(format!("step {}: bad colour '{}'", idx, color)))?;
                session.set_color(c);
                ToolOutcome::None
            }
            ReplayStep::SetSize { size } => {
                session.set_size(*size);
                ToolOutcome::None
            }
            ReplayStep::SetShape { shape } => {
                session.set_shape(*shape);
                ToolOutcome::None
            }
            ReplayStep::SetStamp { stamp } => {
                session.set_stamp(stamp.clone());
                ToolOutcome::None
            }
            ReplayStep::Input { event, viewport } => {
                let surface = session.surface();
                let rect = viewport.unwrap_or_else(|| ViewportRect::identity(surface.width(), surface.height()));
                session.handle_raw(*event, rect)
            }
            ReplayStep::Undo => {
                // A stroke still in flight is committed before it can be undone
                let closed = session.end_gesture();
                record_commit(&mut commits, idx, &closed, verbose);
                if session.undo().is_some() {
                    commits = commits.saturating_sub(1);
                }
                ToolOutcome::None
            }
            ReplayStep::Redo => {
                let closed = session.end_gesture();
                record_commit(&mut commits, idx, &closed, verbose);
                if session.redo().is_some() {
                    commits += 1;
                }
                ToolOutcome::None
            }
            ReplayStep::Clear => session.clear(),
        };
        record_commit(&mut commits, idx, &outcome, verbose);
    }
    Ok(commits)
}

fn record_commit(commits: &mut usize, idx: usize, outcome: &ToolOutcome, verbose: bool) {
    if let ToolOutcome::Committed(kind) = outcome {
        *commits += 1;
        if verbose {
            println!("  [{}] {}", idx, kind.label());
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the replay and return an OS exit code.
/// `0` = PNG written, `1` = anything failed.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match run_replay(&args) {
        Ok(commits) => {
            if args.verbose {
                println!(
                    "  → {} ({} edits, {:.0}ms)",
                    args.output.display(),
                    commits,
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_replay(args: &CliArgs) -> Result<usize, ScriptError> {
    let mut settings = StudioSettings::load();
    if let Some(w) = args.width {
        settings.canvas_width = w;
    }
    if let Some(h) = args.height {
        settings.canvas_height = h;
    }
    if let Some(bg) = &args.background {
        settings.background = parse_hex_color(bg)
            .ok_or_else(|| ScriptError::Parse(format!("bad --background colour '{}'", bg)))?;
    }

    let steps = load_script(&args.replay)?;
    let mut session = DrawingSession::from_settings(&settings)?;
    let wants_font = steps
        .iter()
        .any(|s| matches!(s, ReplayStep::SetStamp { stamp: StampGlyph::Char(_) }));
    if wants_font {
        session.set_stamp_font(load_stamp_font(&settings.stamp_font_family));
    }
    if let Some(path) = &args.line_art {
        let art = crate::io::load_line_art(path)?;
        session.load_line_art(&art)?;
    }

    let commits = replay(&mut session, &steps, args.verbose)?;
    crate::io::save_png(session.surface(), &args.output)?;
    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn steps_parse_from_json() {
        let steps = parse_script(
            r##"[
                {"step": "set_tool", "tool": "shape"},
                {"step": "set_shape", "shape": {"star": {"points": 6}}},
                {"step": "set_stamp", "stamp": {"char": "★"}},
                {"step": "set_color", "color": "#00FF00"},
                {"step": "input", "event": {"kind": "mouse_down", "x": 1, "y": 2},
                 "viewport": {"left": 0, "top": 0, "width": 10, "height": 10}},
                {"step": "undo"}
            ]"##,
        )
        .unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps[0], ReplayStep::SetTool { tool: ToolKind::Shape });
        assert_eq!(steps[1], ReplayStep::SetShape { shape: ShapeKind::Star { points: 6 } });
        assert_eq!(steps[2], ReplayStep::SetStamp { stamp: StampGlyph::Char('★') });
        assert!(matches!(steps[4], ReplayStep::Input { viewport: Some(_), .. }));
        assert_eq!(steps[5], ReplayStep::Undo);
    }

    #[test]
    fn unknown_step_is_a_parse_error() {
        assert!(matches!(parse_script(r#"[{"step": "dance"}]"#), Err(ScriptError::Parse(_))));
    }

    #[test]
    fn replay_counts_net_commits() {
        let mut session = DrawingSession::new(20, 20, Rgba([255, 255, 255, 255]), 10).unwrap();
        let steps = parse_script(
            r##"[
                {"step": "set_tool", "tool": "fill"},
                {"step": "set_color", "color": "#0000FF"},
                {"step": "input", "event": {"kind": "mouse_down", "x": 3, "y": 3}},
                {"step": "input", "event": {"kind": "mouse_up", "x": 3, "y": 3}},
                {"step": "clear"},
                {"step": "undo"}
            ]"##,
        )
        .unwrap();
        assert_eq!(replay(&mut session, &steps, false).unwrap(), 1);
        assert_eq!(session.surface().get_pixel(10, 10), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn undo_mid_stroke_counts_the_closed_stroke() {
        let mut session = DrawingSession::new(20, 20, Rgba([255, 255, 255, 255]), 10).unwrap();
        let steps = parse_script(
            r##"[
                {"step": "input", "event": {"kind": "mouse_down", "x": 2, "y": 2}},
                {"step": "input", "event": {"kind": "mouse_move", "x": 12, "y": 2}},
                {"step": "undo"},
                {"step": "input", "event": {"kind": "mouse_down", "x": 2, "y": 8}},
                {"step": "redo"}
            ]"##,
        )
        .unwrap();
        // Stroke 1 committed then undone; stroke 2 committed by the redo step,
        // which then has nothing to redo because the new commit truncated it
        assert_eq!(replay(&mut session, &steps, false).unwrap(), 1);
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.surface().get_pixel(8, 2), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn bad_colour_stops_the_replay() {
        let mut session = DrawingSession::new(4, 4, Rgba([255, 255, 255, 255]), 10).unwrap();
        let steps = vec![ReplayStep::SetColor { color: "red".into() }];
        assert!(matches!(replay(&mut session, &steps, false), Err(ScriptError::Parse(_))));
    }

    #[test]
    fn args_parse() {
        let args = CliArgs::try_parse_from(["kidpaint", "-r", "g.json", "-o", "out.png", "--width", "64"]).unwrap();
        assert_eq!(args.replay, PathBuf::from("g.json"));
        assert_eq!(args.width, Some(64));
        assert!(args.line_art.is_none());
        assert!(CliArgs::try_parse_from(["kidpaint", "-o", "out.png"]).is_err());
    }
}
