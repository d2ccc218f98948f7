// ============================================================================
// BUCKET FILL — exact-colour 4-connected flood fill
// ============================================================================

use image::Rgba;

use crate::canvas::Surface;

/// What a bucket fill did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillResult {
    /// Number of pixels recoloured. Zero means the surface is unchanged.
    pub filled: usize,
    /// Inclusive bounding box `(min_x, min_y, max_x, max_y)` of the region.
    pub bbox: Option<(u32, u32, u32, u32)>,
}

impl FillResult {
    pub fn changed(&self) -> bool {
        self.filled > 0
    }
}

#[inline(always)]
fn same_rgb(a: [u8; 4], b: [u8; 4]) -> bool {
    a[0] == b[0] && a[1] == b[1] && a[2] == b[2]
}

/// Recolour the 4-connected region of pixels whose RGB exactly equals the
/// seed pixel's, writing `color` with alpha forced opaque.
///
/// A seed outside the surface, or one already RGB-equal to `color`, is a
/// no-op. Runs on an explicit work stack so region size never touches the
/// call stack; time and auxiliary space are O(region area).
pub fn flood_fill(surface: &mut Surface, seed_x: i32, seed_y: i32, color: Rgba<u8>) -> FillResult {
    let (w, h) = (surface.width(), surface.height());
    if seed_x < 0 || seed_y < 0 || seed_x as u32 >= w || seed_y as u32 >= h {
        return FillResult::default();
    }

    let fill = Rgba([color[0], color[1], color[2], 255]);
    let target = surface.get_pixel(seed_x, seed_y).0;
    if same_rgb(target, fill.0) {
        return FillResult::default();
    }

    let (mask, result) = region_mask(&surface.export_image(), seed_x as u32, seed_y as u32, target);

    // Write back only the filled rows of the bounding box.
    if let Some((min_x, min_y, max_x, max_y)) = result.bbox {
        let wu = w as usize;
        for y in min_y..=max_y {
            let row = y as usize * wu;
            for x in min_x..=max_x {
                if mask[row + x as usize] {
                    surface.set_pixel(x as i32, y as i32, fill);
                }
            }
        }
    }

    result
}

/// DFS over a flat RGBA buffer. Returns the visited mask (doubling as the
/// region membership) and the fill summary.
fn region_mask(image: &image::RgbaImage, seed_x: u32, seed_y: u32, target: [u8; 4]) -> (Vec<bool>, FillResult) {
    let (w, h) = image.dimensions();
    let wu = w as usize;
    let flat = image.as_raw();

    #[inline(always)]
    fn pix(flat: &[u8], idx: usize) -> [u8; 4] {
        let o = idx * 4;
        [flat[o], flat[o + 1], flat[o + 2], flat[o + 3]]
    }

    let mut visited = vec![false; wu * h as usize];
    // Packed flat indices; MAX_SURFACE_PIXELS keeps them inside u32.
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    stack.push(seed_y * w + seed_x);

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (seed_x, seed_y, seed_x, seed_y);
    let mut filled = 0usize;

    while let Some(idx) = stack.pop() {
        let i = idx as usize;
        if visited[i] || !same_rgb(pix(flat, i), target) {
            continue;
        }
        visited[i] = true;
        filled += 1;

        let x = idx % w;
        let y = idx / w;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        if x > 0 {
            stack.push(idx - 1);
        }
        if x + 1 < w {
            stack.push(idx + 1);
        }
        if y > 0 {
            stack.push(idx - w);
        }
        if y + 1 < h {
            stack.push(idx + w);
        }
    }

    let bbox = (filled > 0).then_some((min_x, min_y, max_x, max_y));
    (visited, FillResult { filled, bbox })
}
