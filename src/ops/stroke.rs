// ============================================================================
// FREEHAND STROKES — round-capped segment rasterisation
// ============================================================================

use image::Rgba;
use rayon::prelude::*;

use crate::canvas::Surface;
use crate::ops::shapes::{clip_span, write_mask};

/// Smallest radius that keeps a diagonal stroke 4-connected (≥ √2 / 2).
pub const MIN_STROKE_RADIUS: f32 = 0.75;

/// Distance from (px, py) to the segment a→b.
#[inline]
fn segment_distance(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        (((px - a.0) * dx + (py - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let cx = a.0 + t * dx - px;
    let cy = a.1 + t * dy - py;
    (cx * cx + cy * cy).sqrt()
}

/// Paint the capsule of radius `width / 2` around a→b.
///
/// The capsule has round ends, so consecutive segments join without seams
/// and a zero-length segment produces a round dot. Pixels are hard-edged
/// (centre within the radius). Returns the inclusive bounding box painted.
pub fn rasterize_segment(
    surface: &mut Surface,
    a: (f32, f32),
    b: (f32, f32),
    width: f32,
    color: Rgba<u8>,
) -> Option<(u32, u32, u32, u32)> {
    if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return None;
    }
    let r = (width * 0.5).max(MIN_STROKE_RADIUS);

    let (x0, x1) = clip_span(a.0.min(b.0) - r, a.0.max(b.0) + r, surface.width())?;
    let (y0, y1) = clip_span(a.1.min(b.1) - r, a.1.max(b.1) + r, surface.height())?;
    let buf_w = (x1 - x0) as usize;
    let buf_h = (y1 - y0) as usize;

    let mut mask = vec![false; buf_w * buf_h];
    mask.par_chunks_mut(buf_w).enumerate().for_each(|(row, row_mask)| {
        let py = (y0 + row as i32) as f32 + 0.5;
        for (col, inside) in row_mask.iter_mut().enumerate() {
            let px = (x0 + col as i32) as f32 + 0.5;
            *inside = segment_distance(px, py, a, b) <= r;
        }
    });

    write_mask(surface, &mask, buf_w, x0, y0, color)
}

/// An in-progress freehand path between pointer-down and pointer-up.
///
/// Every point is rendered as soon as it arrives, joined to the previous one,
/// so the surface is always up to date and fast pointer motion never leaves
/// gaps between samples.
#[derive(Clone, Debug)]
pub struct StrokeSession {
    points: Vec<(f32, f32)>,
    color: Rgba<u8>,
    width: f32,
}

impl StrokeSession {
    /// Start a stroke and paint its first dot.
    pub fn begin(surface: &mut Surface, start: (f32, f32), color: Rgba<u8>, width: f32) -> Self {
        rasterize_segment(surface, start, start, width, color);
        Self {
            points: vec![start],
            color,
            width,
        }
    }

    /// Append a point and paint the segment from the previous one.
    pub fn extend(&mut self, surface: &mut Surface, point: (f32, f32)) {
        let prev = self.last();
        rasterize_segment(surface, prev, point, self.width, self.color);
        self.points.push(point);
    }

    pub fn last(&self) -> (f32, f32) {
        // begin() always seeds one point
        self.points[self.points.len() - 1]
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    pub fn width(&self) -> f32 {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const INK: Rgba<u8> = Rgba([20, 40, 200, 255]);

    fn inked(s: &Surface) -> HashSet<(i32, i32)> {
        let mut set = HashSet::new();
        for y in 0..s.height() as i32 {
            for x in 0..s.width() as i32 {
                if s.get_pixel(x, y) == INK {
                    set.insert((x, y));
                }
            }
        }
        set
    }

    fn four_connected(set: &HashSet<(i32, i32)>, from: (i32, i32), to: (i32, i32)) -> bool {
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some((x, y)) = queue.pop_front() {
            if (x, y) == to {
                return true;
            }
            for n in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
                if set.contains(&n) && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        false
    }

    #[test]
    fn zero_length_segment_is_a_round_dot() {
        let mut s = Surface::new(20, 20, WHITE).unwrap();
        rasterize_segment(&mut s, (10.0, 10.0), (10.0, 10.0), 6.0, INK);
        let n = inked(&s).len() as f32;
        let ideal = std::f32::consts::PI * 9.0;
        assert!((n - ideal).abs() < 8.0, "{n}");
        // Round, not square: the bounding-box corner stays clear
        assert_eq!(s.get_pixel(7, 7), WHITE);
    }

    #[test]
    fn thin_diagonal_stays_four_connected() {
        let mut s = Surface::new(40, 40, WHITE).unwrap();
        rasterize_segment(&mut s, (2.5, 2.5), (37.5, 30.5), 1.0, INK);
        let set = inked(&s);
        assert!(four_connected(&set, (2, 2), (37, 30)));
    }

    #[test]
    fn sparse_samples_leave_no_gaps() {
        let mut s = Surface::new(100, 100, WHITE).unwrap();
        let pts = [(5.0, 5.0), (60.0, 12.0), (20.0, 90.0), (95.0, 95.0)];
        let mut stroke = StrokeSession::begin(&mut s, pts[0], INK, 3.0);
        for p in &pts[1..] {
            stroke.extend(&mut s, *p);
        }
        assert_eq!(stroke.points().len(), 4);
        let set = inked(&s);
        for pair in pts.windows(2) {
            let a = (pair[0].0 as i32, pair[0].1 as i32);
            let b = (pair[1].0 as i32, pair[1].1 as i32);
            assert!(four_connected(&set, a, b), "{a:?} -> {b:?}");
        }
    }

    #[test]
    fn segments_outside_the_surface_are_dropped() {
        let mut s = Surface::new(10, 10, WHITE).unwrap();
        assert!(rasterize_segment(&mut s, (-30.0, -30.0), (-20.0, -25.0), 4.0, INK).is_none());
        // Partially outside: clipped, still painted
        assert!(rasterize_segment(&mut s, (-5.0, 5.0), (5.0, 5.0), 2.0, INK).is_some());
        assert_eq!(s.get_pixel(0, 5), INK);
    }

    #[test]
    fn far_away_endpoint_is_clipped_not_dropped() {
        let mut s = Surface::new(10, 10, WHITE).unwrap();
        let bbox = rasterize_segment(&mut s, (5.0, 5.0), (3.0e9, 5.0), 2.0, INK);
        assert_eq!(bbox.map(|b| (b.0, b.2)), Some((4, 9)));
        assert_eq!(s.get_pixel(9, 5), INK);
        assert!(rasterize_segment(&mut s, (-3.0e9, 2.0), (3.0e9, 2.0), 2.0, INK).is_some());
        assert_eq!(s.get_pixel(0, 2), INK);
    }
}
