use image::Rgba;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::Surface;

/// Points on a star unless the caller asks otherwise.
pub const DEFAULT_STAR_POINTS: u32 = 5;
/// More points than this are drawn with this many.
pub const MAX_STAR_POINTS: u32 = 64;

/// Parametric shapes the shape tool can stamp. All are rendered filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Circle,
    Square,
    Triangle,
    Star { points: u32 },
}

impl ShapeKind {
    pub fn star() -> Self {
        ShapeKind::Star { points: DEFAULT_STAR_POINTS }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShapeKind::Circle => "Circle",
            ShapeKind::Square => "Square",
            ShapeKind::Triangle => "Triangle",
            ShapeKind::Star { .. } => "Star",
        }
    }

    /// Shapes shown in the picker.
    pub fn picker_shapes() -> [ShapeKind; 4] {
        [
            ShapeKind::Circle,
            ShapeKind::Square,
            ShapeKind::Triangle,
            ShapeKind::star(),
        ]
    }

    /// Half-extent of the shape's bounding box for a given size.
    fn half_extent(&self, size: f32) -> f32 {
        match self {
            // radius = size
            ShapeKind::Circle | ShapeKind::Star { .. } => size,
            // side = size
            ShapeKind::Square | ShapeKind::Triangle => size * 0.5,
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Vertices of the shape centred on (cx, cy), in drawing order.
///
/// Circles are approximated with 48 segments; this is only used for preview
/// overlays; rasterisation evaluates the exact disc.
pub fn shape_outline(kind: ShapeKind, cx: f32, cy: f32, size: f32) -> Vec<(f32, f32)> {
    let size = size.max(0.0);
    match kind {
        ShapeKind::Circle => (0..48)
            .map(|i| {
                let a = i as f32 / 48.0 * std::f32::consts::TAU;
                (cx + size * a.cos(), cy + size * a.sin())
            })
            .collect(),
        ShapeKind::Square => {
            let h = size * 0.5;
            vec![(cx - h, cy - h), (cx + h, cy - h), (cx + h, cy + h), (cx - h, cy + h)]
        }
        ShapeKind::Triangle => {
            let h = size * 0.5;
            // Apex up, base along the bottom of the size×size box
            vec![(cx, cy - h), (cx + h, cy + h), (cx - h, cy + h)]
        }
        ShapeKind::Star { points } => {
            star_vertices(cx, cy, size, size * 0.5, points.clamp(2, MAX_STAR_POINTS))
        }
    }
}

/// Alternating outer/inner vertices at equal angular steps, first one
/// straight up.
fn star_vertices(cx: f32, cy: f32, outer: f32, inner: f32, points: u32) -> Vec<(f32, f32)> {
    let n = points * 2;
    let step = std::f32::consts::PI / points as f32;
    (0..n)
        .map(|i| {
            let r = if i % 2 == 0 { outer } else { inner };
            let a = -std::f32::consts::FRAC_PI_2 + step * i as f32;
            (cx + r * a.cos(), cy + r * a.sin())
        })
        .collect()
}

// ============================================================================
// SDF functions — return signed distance (negative = inside)
// ============================================================================

#[inline]
fn sdf_circle(px: f32, py: f32, r: f32) -> f32 {
    (px * px + py * py).sqrt() - r
}

/// Box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// Signed distance to a simple polygon (convex or not). The sign comes from
/// a crossing test, so star points work as well as triangles.
fn sdf_polygon(verts: &[(f32, f32)], px: f32, py: f32) -> f32 {
    let n = verts.len();
    let mut d = (px - verts[0].0).powi(2) + (py - verts[0].1).powi(2);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].0 - verts[i].0;
        let ey = verts[j].1 - verts[i].1;
        let wx = px - verts[i].0;
        let wy = py - verts[i].1;
        let t = ((wx * ex + wy * ey) / (ex * ex + ey * ey)).clamp(0.0, 1.0);
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        let c1 = py >= verts[i].1;
        let c2 = py < verts[j].1;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

// ============================================================================
// Rasterisation
// ============================================================================

/// Rasterise a filled shape centred on (cx, cy) straight into the surface.
///
/// Hard-edged: a pixel is painted when its centre lies strictly inside the
/// shape, so the result is flat colour that the bucket fill can match
/// exactly. Returns the inclusive bounding box of painted pixels.
pub fn rasterize_shape(
    surface: &mut Surface,
    kind: ShapeKind,
    cx: f32,
    cy: f32,
    size: f32,
    color: Rgba<u8>,
) -> Option<(u32, u32, u32, u32)> {
    if !(size > 0.0) || !cx.is_finite() || !cy.is_finite() {
        return None;
    }

    let (cx, cy) = match kind {
        ShapeKind::Square => (snap_square_centre(cx, size), snap_square_centre(cy, size)),
        _ => (cx, cy),
    };

    let ext = kind.half_extent(size) + 1.0;
    let (x0, x1) = clip_span(cx - ext, cx + ext, surface.width())?;
    let (y0, y1) = clip_span(cy - ext, cy + ext, surface.height())?;
    let buf_w = (x1 - x0) as usize;
    let buf_h = (y1 - y0) as usize;

    // Polygon shapes are evaluated in surface space against their vertices.
    let verts = match kind {
        ShapeKind::Triangle | ShapeKind::Star { .. } => shape_outline(kind, cx, cy, size),
        _ => Vec::new(),
    };

    let mut mask = vec![false; buf_w * buf_h];
    mask.par_chunks_mut(buf_w).enumerate().for_each(|(row, row_mask)| {
        let py = (y0 + row as i32) as f32 + 0.5;
        for (col, inside) in row_mask.iter_mut().enumerate() {
            let px = (x0 + col as i32) as f32 + 0.5;
            let d = match kind {
                ShapeKind::Circle => sdf_circle(px - cx, py - cy, size),
                ShapeKind::Square => sdf_box(px - cx, py - cy, size * 0.5, size * 0.5),
                ShapeKind::Triangle | ShapeKind::Star { .. } => sdf_polygon(&verts, px, py),
            };
            *inside = d < 0.0;
        }
    });

    write_mask(surface, &mask, buf_w, x0, y0, color)
}

/// Move a square's centre so its edges fall on pixel boundaries; a square
/// of odd side anchored on a pixel corner would otherwise lose a column.
#[inline]
fn snap_square_centre(c: f32, size: f32) -> f32 {
    (c - size * 0.5 + 0.5).floor() + size * 0.5
}

/// Pixel span `[start, end)` covering `lo..=hi`, clipped to `0..limit`.
///
/// Works in `f32` until the span is inside the surface, so pointer
/// coordinates far outside it cannot overflow the integer maths.
pub(crate) fn clip_span(lo: f32, hi: f32, limit: u32) -> Option<(i32, i32)> {
    let start = lo.floor().max(0.0);
    let end = (hi.ceil() + 1.0).min(limit as f32);
    if !(end > start) {
        return None;
    }
    Some((start as i32, end as i32))
}

/// Paint every set cell of a row-major mask positioned at (x0, y0).
/// Cells landing outside the surface are skipped. Returns the inclusive
/// bounding box of painted pixels.
pub(crate) fn write_mask(
    surface: &mut Surface,
    mask: &[bool],
    mask_w: usize,
    x0: i32,
    y0: i32,
    color: Rgba<u8>,
) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = (surface.width() as i64, surface.height() as i64);
    let mut bbox: Option<(u32, u32, u32, u32)> = None;
    for (i, _) in mask.iter().enumerate().filter(|(_, set)| **set) {
        let x = x0 as i64 + (i % mask_w) as i64;
        let y = y0 as i64 + (i / mask_w) as i64;
        if x < 0 || y < 0 || x >= w || y >= h {
            continue;
        }
        surface.set_pixel(x as i32, y as i32, color);
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
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn painted(s: &Surface) -> usize {
        s.export_image().pixels().filter(|p| **p == BLACK).count()
    }

    #[test]
    fn square_is_exactly_side_by_side() {
        let mut s = Surface::new(50, 50, WHITE).unwrap();
        let bbox = rasterize_shape(&mut s, ShapeKind::Square, 20.0, 20.0, 10.0, BLACK);
        assert_eq!(bbox, Some((15, 15, 24, 24)));
        assert_eq!(painted(&s), 100);
    }

    #[test]
    fn odd_square_on_a_pixel_corner_keeps_its_side() {
        let mut s = Surface::new(40, 40, WHITE).unwrap();
        let bbox = rasterize_shape(&mut s, ShapeKind::Square, 20.0, 20.0, 5.0, BLACK);
        assert_eq!(bbox, Some((18, 18, 22, 22)));
        assert_eq!(painted(&s), 25);
    }

    #[test]
    fn circle_covers_about_pi_r_squared() {
        let mut s = Surface::new(64, 64, WHITE).unwrap();
        rasterize_shape(&mut s, ShapeKind::Circle, 32.0, 32.0, 10.0, BLACK);
        let n = painted(&s) as f32;
        let ideal = std::f32::consts::PI * 100.0;
        assert!((n - ideal).abs() < ideal * 0.05, "{n} vs {ideal}");
        assert_eq!(s.get_pixel(32, 32), BLACK);
        assert_eq!(s.get_pixel(32, 21), WHITE);
    }

    #[test]
    fn triangle_points_up() {
        let mut s = Surface::new(64, 64, WHITE).unwrap();
        rasterize_shape(&mut s, ShapeKind::Triangle, 32.0, 32.0, 20.0, BLACK);
        // Wide at the bottom of the box, narrow near the apex
        let row_width = |y: i32| (0..64).filter(|&x| s.get_pixel(x, y) == BLACK).count();
        assert!(row_width(40) > row_width(26));
        assert!(row_width(23) <= 2);
        assert_eq!(s.get_pixel(32, 41), BLACK);
        assert_eq!(s.get_pixel(32, 43), WHITE);
    }

    #[test]
    fn star_has_notches_between_points() {
        let mut s = Surface::new(64, 64, WHITE).unwrap();
        rasterize_shape(&mut s, ShapeKind::star(), 32.0, 32.0, 20.0, BLACK);
        // Tip of the top point is painted, the centre is painted
        assert_eq!(s.get_pixel(32, 14), BLACK);
        assert_eq!(s.get_pixel(32, 32), BLACK);
        // Between the top and upper-right points (at 36° from vertical, r≈15)
        // lies the notch, outside the inner radius of 10
        let a = -std::f32::consts::FRAC_PI_2 + std::f32::consts::PI / 5.0;
        let (nx, ny) = (32.0 + 15.0 * a.cos(), 32.0 + 15.0 * a.sin());
        assert_eq!(s.get_pixel(nx as i32, ny as i32), WHITE);
    }

    #[test]
    fn star_vertex_count_follows_points() {
        assert_eq!(shape_outline(ShapeKind::Star { points: 7 }, 0.0, 0.0, 10.0).len(), 14);
        let v = shape_outline(ShapeKind::star(), 0.0, 0.0, 10.0);
        assert!((v[0].0).abs() < 1e-4 && (v[0].1 + 10.0).abs() < 1e-4);
        let r1 = (v[1].0 * v[1].0 + v[1].1 * v[1].1).sqrt();
        assert!((r1 - 5.0).abs() < 1e-4);
    }

    #[test]
    fn absurd_star_point_counts_are_capped() {
        let v = shape_outline(ShapeKind::Star { points: u32::MAX }, 0.0, 0.0, 10.0);
        assert_eq!(v.len(), MAX_STAR_POINTS as usize * 2);
        let mut s = Surface::new(32, 32, WHITE).unwrap();
        let star = ShapeKind::Star { points: u32::MAX };
        assert!(rasterize_shape(&mut s, star, 16.0, 16.0, 10.0, BLACK).is_some());
        assert_eq!(s.get_pixel(16, 16), BLACK);
    }

    #[test]
    fn far_off_centres_do_not_overflow() {
        let mut s = Surface::new(10, 10, WHITE).unwrap();
        for c in [3.0e9, -3.0e9, f32::MAX] {
            assert!(rasterize_shape(&mut s, ShapeKind::Square, c, 5.0, 6.0, BLACK).is_none());
            assert!(rasterize_shape(&mut s, ShapeKind::star(), 5.0, c, 6.0, BLACK).is_none());
        }
    }

    #[test]
    fn shapes_clip_at_surface_edges() {
        let mut s = Surface::new(10, 10, WHITE).unwrap();
        let bbox = rasterize_shape(&mut s, ShapeKind::Square, 0.0, 0.0, 6.0, BLACK);
        assert_eq!(bbox, Some((0, 0, 2, 2)));
        assert!(rasterize_shape(&mut s, ShapeKind::Circle, -50.0, -50.0, 5.0, BLACK).is_none());
        assert!(rasterize_shape(&mut s, ShapeKind::Circle, 5.0, 5.0, 0.0, BLACK).is_none());
    }
}
