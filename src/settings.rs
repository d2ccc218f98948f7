use std::path::PathBuf;

use image::Rgba;

use crate::components::history::DEFAULT_MAX_ENTRIES;
use crate::components::tools::DEFAULT_BRUSH_SIZE;

const SETTINGS_FILE: &str = "kidpaint_settings.cfg";

/// Studio settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct StudioSettings {
    /// Size of a new blank page
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Paper colour; also what the eraser paints
    pub background: Rgba<u8>,
    /// Brush size selected at startup
    pub brush_size: f32,
    /// Maximum number of undo steps
    pub max_undo_steps: usize,
    /// Family name looked up for character stamps. Empty = first available
    /// emoji/sans-serif font.
    pub stamp_font_family: String,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
            background: Rgba([255, 255, 255, 255]),
            brush_size: DEFAULT_BRUSH_SIZE,
            max_undo_steps: DEFAULT_MAX_ENTRIES,
            stamp_font_family: String::new(),
        }
    }
}

impl StudioSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/kidpaint/kidpaint_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\KidPaint\kidpaint_settings.cfg
    /// On macOS:   ~/Library/Application Support/KidPaint/kidpaint_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("kidpaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            let config_dir = PathBuf::from(appdata).join("KidPaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("KidPaint");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             background={}\n\
             brush_size={}\n\
             max_undo_steps={}\n\
             stamp_font_family={}\n",
            self.canvas_width,
            self.canvas_height,
            color_to_hex(self.background),
            self.brush_size,
            self.max_undo_steps,
            self.stamp_font_family,
        )
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Settings: could not write {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::parse(&content)
    }

    /// Parse `key=value` lines. Unknown keys are ignored and malformed values
    /// keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "canvas_width" => {
                    s.canvas_width = val.parse().ok().filter(|w| *w > 0).unwrap_or(s.canvas_width);
                }
                "canvas_height" => {
                    s.canvas_height = val.parse().ok().filter(|h| *h > 0).unwrap_or(s.canvas_height);
                }
                "background" => {
                    if let Some(c) = parse_hex_color(val) {
                        s.background = c;
                    }
                }
                "brush_size" => {
                    s.brush_size = val
                        .parse::<f32>()
                        .ok()
                        .filter(|b| b.is_finite() && *b > 0.0)
                        .unwrap_or(DEFAULT_BRUSH_SIZE);
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(DEFAULT_MAX_ENTRIES);
                }
                "stamp_font_family" => {
                    s.stamp_font_family = val.to_string();
                }
                _ => {}
            }
        }
        s
    }
}

/// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// `#RRGGBB`, with an alpha byte appended only when not opaque.
pub fn color_to_hex(c: Rgba<u8>) -> String {
    if c[3] == 255 {
        format!("#{:02X}{:02X}{:02X}", c[0], c[1], c[2])
    } else {
        format!("#{:02X}{:02X}{:02X}{:02X}", c[0], c[1], c[2], c[3])
    }
}
