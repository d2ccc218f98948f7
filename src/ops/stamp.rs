// ============================================================================
// STAMPS — glyph / image placement
// ============================================================================

use std::sync::Arc;

use ab_glyph::{point, Font, FontArc};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::Surface;
use crate::ops::shapes::{clip_span, write_mask};

/// What the stamp tool puts down.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampGlyph {
    /// Built-in heart silhouette in the active colour; needs no font.
    #[default]
    Heart,
    /// A character (typically an emoji) rendered with the session's stamp font
    /// as a silhouette in the active colour.
    Char(char),
    /// A picture stamp composited with its own colours.
    #[serde(skip)]
    Image(Arc<RgbaImage>),
}

/// Put `glyph` down centred on (cx, cy), scaled so its larger side is `size`
/// pixels. Returns the painted bounding box, or `None` when nothing landed on
/// the surface (e.g. a `Char` stamp without a font).
pub fn rasterize_stamp(
    surface: &mut Surface,
    glyph: &StampGlyph,
    font: Option<&FontArc>,
    cx: f32,
    cy: f32,
    size: f32,
    color: Rgba<u8>,
) -> Option<(u32, u32, u32, u32)> {
    if !(size >= 1.0) || !cx.is_finite() || !cy.is_finite() {
        return None;
    }
    match glyph {
        StampGlyph::Heart => stamp_heart(surface, cx, cy, size, color),
        StampGlyph::Char(ch) => {
            let font = font?;
            stamp_char(surface, font, *ch, cx, cy, size, color)
        }
        StampGlyph::Image(img) => stamp_image(surface, img, cx, cy, size),
    }
}

/// Look up a font for character stamps. An empty or unknown `family` falls
/// back to the system sans-serif. Returns None when no usable outline font
/// is installed (colour-bitmap emoji fonts have no outlines).
pub fn load_stamp_font(family: &str) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let mut names = Vec::with_capacity(2);
    if !family.trim().is_empty() {
        names.push(FamilyName::Title(family.trim().to_string()));
    }
    names.push(FamilyName::SansSerif);

    let source = SystemSource::new();
    let handle = source.select_best_match(&names, &Properties::new()).ok()?;
    let font_data = handle.load().ok()?;
    let bytes: Vec<u8> = (*font_data.copy_font_data()?).clone();
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            crate::log_warn!("Stamp font '{}' unusable: {}", family, e);
            None
        }
    }
}

/// Inside test for the implicit heart curve (x²+y²−1)³ − x²y³ < 0, bumps up.
#[inline]
fn heart_contains(nx: f32, ny: f32) -> bool {
    let a = nx * nx + ny * ny - 1.0;
    a * a * a - nx * nx * ny * ny * ny < 0.0
}

fn stamp_heart(
    surface: &mut Surface,
    cx: f32,
    cy: f32,
    size: f32,
    color: Rgba<u8>,
) -> Option<(u32, u32, u32, u32)> {
    // The curve spans x ∈ [-1.14, 1.14], y ∈ [-1, 1.25]; fit 2.3 units into size.
    const EXTENT: f32 = 2.3;
    const CENTRE_Y: f32 = 0.125;
    let scale = size / EXTENT;

    let half = size * 0.5 + 1.0;
    let (x0, x1) = clip_span(cx - half, cx + half, surface.width())?;
    let (y0, y1) = clip_span(cy - half, cy + half, surface.height())?;
    let buf_w = (x1 - x0) as usize;
    let buf_h = (y1 - y0) as usize;

    let mut mask = vec![false; buf_w * buf_h];
    mask.par_chunks_mut(buf_w).enumerate().for_each(|(row, row_mask)| {
        let py = (y0 + row as i32) as f32 + 0.5;
        for (col, inside) in row_mask.iter_mut().enumerate() {
            let px = (x0 + col as i32) as f32 + 0.5;
            let nx = (px - cx) / scale;
            // screen-down → math-up
            let ny = -(py - cy) / scale + CENTRE_Y;
            *inside = heart_contains(nx, ny);
        }
    });

    write_mask(surface, &mask, buf_w, x0, y0, color)
}

fn stamp_char(
    surface: &mut Surface,
    font: &FontArc,
    ch: char,
    cx: f32,
    cy: f32,
    size: f32,
    color: Rgba<u8>,
) -> Option<(u32, u32, u32, u32)> {
    let glyph = font
        .glyph_id(ch)
        .with_scale_and_position(size, point(0.0, 0.0));
    let outlined = font.outline_glyph(glyph)?;
    let bounds = outlined.px_bounds();
    let gw = bounds.width().ceil().max(1.0) as usize;
    let gh = bounds.height().ceil().max(1.0) as usize;

    // Coverage ≥ 0.5 becomes a hard pixel so stamps stay fillable flat colour.
    let mut mask = vec![false; gw * gh];
    outlined.draw(|px, py, cov| {
        let (px, py) = (px as usize, py as usize);
        if px < gw && py < gh && cov >= 0.5 {
            mask[py * gw + px] = true;
        }
    });

    let x0 = (cx - gw as f32 * 0.5).floor() as i32;
    let y0 = (cy - gh as f32 * 0.5).floor() as i32;
    write_mask(surface, &mask, gw, x0, y0, color)
}

fn stamp_image(
    surface: &mut Surface,
    img: &RgbaImage,
    cx: f32,
    cy: f32,
    size: f32,
) -> Option<(u32, u32, u32, u32)> {
    let (sw, sh) = img.dimensions();
    if sw == 0 || sh == 0 {
        return None;
    }
    let scale = size / sw.max(sh) as f32;
    let dw = ((sw as f32 * scale).round() as u32).max(1);
    let dh = ((sh as f32 * scale).round() as u32).max(1);
    let scaled = imageops::resize(img, dw, dh, FilterType::Triangle);

    let x0 = (cx - dw as f32 * 0.5).floor() as i32;
    let y0 = (cy - dh as f32 * 0.5).floor() as i32;

    let mut bbox: Option<(u32, u32, u32, u32)> = None;
    for (sx, sy, px) in scaled.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        let (x, y) = (x0 as i64 + sx as i64, y0 as i64 + sy as i64);
        if x < 0 || y < 0 || x >= surface.width() as i64 || y >= surface.height() as i64 {
            continue;
        }
        surface.blend_pixel(x as i32, y as i32, *px);
        let (ux, uy) = (x as u32, y as u32);
        bbox = Some(match bbox {
            None => (ux, uy, ux, uy),
            Some((a, b, c, d)) => (a.min(ux), b.min(uy), c.max(ux), d.max(uy)),
        });
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const PINK: Rgba<u8> = Rgba([255, 105, 180, 255]);

    #[test]
    fn heart_fits_in_its_box_with_lobes_on_top() {
        let mut s = Surface::new(64, 64, WHITE).unwrap();
        let bbox = rasterize_stamp(&mut s, &StampGlyph::Heart, None, 32.0, 32.0, 30.0, PINK).unwrap();
        assert!(bbox.0 >= 16 && bbox.2 <= 47, "{bbox:?}");
        assert!(bbox.1 >= 16 && bbox.3 <= 47, "{bbox:?}");
        // Cleft between the lobes at the top centre stays clear, lobes do not
        assert_eq!(s.get_pixel(32, bbox.1 as i32), WHITE);
        assert_eq!(s.get_pixel(32, 32), PINK);
        // Bottom tip is narrow
        let bottom_row = (0..64).filter(|&x| s.get_pixel(x, bbox.3 as i32) == PINK).count();
        assert!(bottom_row <= 4);
    }

    #[test]
    fn char_stamp_without_font_paints_nothing() {
        let mut s = Surface::new(16, 16, WHITE).unwrap();
        assert!(rasterize_stamp(&mut s, &StampGlyph::Char('★'), None, 8.0, 8.0, 12.0, PINK).is_none());
        assert!(s.export_image().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn image_stamp_is_scaled_and_centred() {
        let mut s = Surface::new(40, 40, WHITE).unwrap();
        let src = Arc::new(RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 255])));
        let bbox = rasterize_stamp(&mut s, &StampGlyph::Image(src), None, 20.0, 20.0, 16.0, PINK);
        // 4×2 scaled to 16×8, centred on (20, 20)
        assert_eq!(bbox, Some((12, 16, 27, 23)));
        let corner = s.get_pixel(12, 16);
        assert!(corner[2] > 250 && corner[0] < 5, "{corner:?}");
        assert_eq!(s.get_pixel(11, 16), WHITE);
    }

    #[test]
    fn stamps_far_off_the_surface_paint_nothing() {
        let mut s = Surface::new(8, 8, WHITE).unwrap();
        let src = Arc::new(RgbaImage::from_pixel(2, 2, PINK));
        for cx in [3.0e9, -3.0e9, f32::MAX] {
            assert!(rasterize_stamp(&mut s, &StampGlyph::Heart, None, cx, 4.0, 6.0, PINK).is_none());
            assert!(rasterize_stamp(&mut s, &StampGlyph::Image(src.clone()), None, cx, 4.0, 6.0, PINK).is_none());
        }
        assert!(s.export_image().pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn tiny_sizes_are_ignored() {
        let mut s = Surface::new(8, 8, WHITE).unwrap();
        assert!(rasterize_stamp(&mut s, &StampGlyph::Heart, None, 4.0, 4.0, 0.5, PINK).is_none());
    }
}
