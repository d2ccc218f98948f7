use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{ImageError, Rgba, RgbaImage};
use rayon::prelude::*;

/// Side length of a storage tile, in pixels.
pub const CHUNK_SIZE: u32 = 64;

/// Returned for reads outside the surface.
pub const TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Upper bound on width × height for a single surface (64 megapixels).
pub const MAX_SURFACE_PIXELS: u64 = 64 * 1024 * 1024;

// ============================================================================
// ERRORS
// ============================================================================

/// Errors raised by surface construction, line-art import and export.
#[derive(Debug)]
pub enum CanvasError {
    /// Zero-sized or oversized surface request.
    InvalidDimensions { width: u32, height: u32 },
    /// Line-art could not be decoded or was empty. The surface is untouched.
    LoadFailed(String),
    /// PNG encoding failed.
    Encode(String),
    Io(std::io::Error),
}

impl std::fmt::Display for CanvasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanvasError::InvalidDimensions { width, height } => {
                write!(f, "Invalid surface dimensions {}×{}", width, height)
            }
            CanvasError::LoadFailed(e) => write!(f, "Load failed: {}", e),
            CanvasError::Encode(e) => write!(f, "Encode error: {}", e),
            CanvasError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CanvasError {}

impl From<std::io::Error> for CanvasError {
    fn from(e: std::io::Error) -> Self {
        CanvasError::Io(e)
    }
}

impl From<ImageError> for CanvasError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => CanvasError::Io(io),
            ImageError::Encoding(enc) => CanvasError::Encode(enc.to_string()),
            other => CanvasError::LoadFailed(other.to_string()),
        }
    }
}

// ============================================================================
// TILED IMAGE — copy-on-write pixel storage
// ============================================================================

/// Pixel storage split into `CHUNK_SIZE²` tiles.
///
/// Tiles are wrapped in `Arc`: `clone()` only bumps reference counts, and
/// writes go through `Arc::make_mut`, so a tile shared with a history entry
/// is deep-copied on its first write and never mutated in place. Missing
/// tiles read as fully transparent; images built through `new_filled` or
/// `from_rgba_image` have every tile populated.
#[derive(Clone)]
pub struct TiledImage {
    width: u32,
    height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

impl TiledImage {
    // ---- construction -------------------------------------------------------

    /// Fully transparent image. Callers validate dimensions first.
    pub fn new(width: u32, height: u32) -> Self {
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; (chunks_per_row * chunks_per_col) as usize],
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut img = Self::new(width, height);
        img.fill(color);
        img
    }

    /// Import from a flat `RgbaImage`; tile conversion runs on rayon.
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let width = src.width();
        let height = src.height();
        let mut img = Self::new(width, height);

        let chunks_x = img.chunks_per_row as usize;
        let src_raw = src.as_raw();

        let tiles: Vec<Option<Arc<RgbaImage>>> = (0..img.chunks.len())
            .into_par_iter()
            .map(|flat| {
                let base_x = (flat % chunks_x) as u32 * CHUNK_SIZE;
                let base_y = (flat / chunks_x) as u32 * CHUNK_SIZE;
                let cw = CHUNK_SIZE.min(width - base_x) as usize;
                let ch = CHUNK_SIZE.min(height - base_y);
                let chunk_stride = CHUNK_SIZE as usize * 4;
                let mut data = vec![0u8; chunk_stride * CHUNK_SIZE as usize];

                // Fully transparent tiles are kept too: their RGB still matters
                // to the exact-colour fill.
                for ly in 0..ch {
                    let src_start = ((base_y + ly) * width + base_x) as usize * 4;
                    let dst_start = ly as usize * chunk_stride;
                    data[dst_start..dst_start + cw * 4]
                        .copy_from_slice(&src_raw[src_start..src_start + cw * 4]);
                }

                RgbaImage::from_raw(CHUNK_SIZE, CHUNK_SIZE, data).map(Arc::new)
            })
            .collect();

        img.chunks = tiles;
        img
    }

    /// Flatten to a contiguous `RgbaImage`.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        let out_stride = self.width as usize * 4;
        let out_raw: &mut [u8] = out.as_mut();
        for (cx, cy) in self.chunk_keys() {
            let Some(chunk) = self.get_chunk(cx, cy) else { continue };
            let base_x = cx * CHUNK_SIZE;
            let base_y = cy * CHUNK_SIZE;
            let cw = CHUNK_SIZE.min(self.width - base_x) as usize;
            let ch = CHUNK_SIZE.min(self.height - base_y) as usize;
            let chunk_raw = chunk.as_raw();
            let chunk_stride = CHUNK_SIZE as usize * 4;
            for ly in 0..ch {
                let src = ly * chunk_stride;
                let dst = (base_y as usize + ly) * out_stride + base_x as usize * 4;
                out_raw[dst..dst + cw * 4].copy_from_slice(&chunk_raw[src..src + cw * 4]);
            }
        }
        out
    }

    // ---- indexing helpers ----------------------------------------------------

    #[inline(always)]
    fn flat_index(&self, cx: u32, cy: u32) -> usize {
        (cy * self.chunks_per_row + cx) as usize
    }

    #[inline(always)]
    fn chunk_coord(x: u32, y: u32) -> (u32, u32) {
        (x / CHUNK_SIZE, y / CHUNK_SIZE)
    }

    #[inline(always)]
    fn local(x: u32, y: u32) -> (u32, u32) {
        (x % CHUNK_SIZE, y % CHUNK_SIZE)
    }

    // ---- pixel access -------------------------------------------------------

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        if x >= self.width || y >= self.height {
            return TRANSPARENT_PIXEL;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        self.chunks[self.flat_index(cx, cy)]
            .as_ref()
            .map(|c| *c.get_pixel(lx, ly))
            .unwrap_or(TRANSPARENT_PIXEL)
    }

    /// Write a pixel (creates the tile on demand, COW-clones if shared).
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc).put_pixel(lx, ly, pixel);
    }

    pub fn get_chunk(&self, cx: u32, cy: u32) -> Option<&RgbaImage> {
        self.chunks.get(self.flat_index(cx, cy)).and_then(|c| c.as_deref())
    }

    /// Populated tile coordinates.
    pub fn chunk_keys(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let cpr = self.chunks_per_row;
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(move |(i, _)| ((i as u32) % cpr, (i as u32) / cpr))
    }

    /// Addresses of the populated tiles. Two images that share a tile report
    /// the same address; used to measure deduplicated history memory.
    pub fn chunk_addresses(&self) -> impl Iterator<Item = usize> + '_ {
        self.chunks
            .iter()
            .filter_map(|slot| slot.as_ref().map(|arc| Arc::as_ptr(arc) as usize))
    }

    // ---- bulk operations ----------------------------------------------------

    pub fn fill(&mut self, color: Rgba<u8>) {
        let tile = Arc::new(RgbaImage::from_pixel(CHUNK_SIZE, CHUNK_SIZE, color));
        for slot in &mut self.chunks {
            *slot = Some(Arc::clone(&tile));
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel bytes of one tile.
    pub const fn chunk_bytes() -> usize {
        (CHUNK_SIZE * CHUNK_SIZE * 4) as usize
    }
}

// ============================================================================
// SURFACE
// ============================================================================

/// The canonical pixel buffer of a drawing session.
///
/// Dimensions are fixed for the surface's lifetime. All coordinates are
/// signed: pointer positions routinely stray outside the surface during fast
/// drags, so reads outside return [`TRANSPARENT_PIXEL`] and writes are dropped.
#[derive(Clone)]
pub struct Surface {
    pixels: TiledImage,
    background: Rgba<u8>,
}

impl Surface {
    /// Blank surface filled with `background`.
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Result<Self, CanvasError> {
        let total = width as u64 * height as u64;
        if width == 0 || height == 0 || total > MAX_SURFACE_PIXELS {
            return Err(CanvasError::InvalidDimensions { width, height });
        }
        Ok(Self {
            pixels: TiledImage::new_filled(width, height, background),
            background,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Rgba<u8> {
        if !self.in_bounds(x, y) {
            return TRANSPARENT_PIXEL;
        }
        self.pixels.get_pixel(x as u32, y as u32)
    }

    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if self.in_bounds(x, y) {
            self.pixels.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Source-over composite of `color` onto the pixel at (x, y).
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if !self.in_bounds(x, y) || color[3] == 0 {
            return;
        }
        if color[3] == 255 {
            self.pixels.put_pixel(x as u32, y as u32, color);
            return;
        }
        let dst = self.pixels.get_pixel(x as u32, y as u32);
        self.pixels.put_pixel(x as u32, y as u32, composite_over(color, dst));
    }

    /// Reset every pixel to the background colour.
    pub fn clear(&mut self) {
        self.pixels.fill(self.background);
    }

    /// Replace the surface contents with `source`, centred and uniformly
    /// scaled to fit (aspect ratio preserved), composited over the background.
    ///
    /// Nearest-neighbour resampling keeps flat line-art regions exactly one
    /// colour, which the bucket fill relies on. On failure the surface is left
    /// as it was.
    pub fn load_image(&mut self, source: &RgbaImage) -> Result<(), CanvasError> {
        let (sw, sh) = source.dimensions();
        if sw == 0 || sh == 0 {
            return Err(CanvasError::LoadFailed("source image is empty".into()));
        }

        let (w, h) = (self.width(), self.height());
        let scale = (w as f32 / sw as f32).min(h as f32 / sh as f32);
        let dw = ((sw as f32 * scale).round() as u32).clamp(1, w);
        let dh = ((sh as f32 * scale).round() as u32).clamp(1, h);
        let off_x = (w - dw) / 2;
        let off_y = (h - dh) / 2;

        let scaled = if (dw, dh) == (sw, sh) {
            source.clone()
        } else {
            imageops::resize(source, dw, dh, FilterType::Nearest)
        };

        let mut page = RgbaImage::from_pixel(w, h, self.background);
        let stride = w as usize * 4;
        let page_raw: &mut [u8] = page.as_mut();
        page_raw
            .par_chunks_mut(stride)
            .enumerate()
            .skip(off_y as usize)
            .take(dh as usize)
            .for_each(|(row, out)| {
                let sy = row as u32 - off_y;
                for sx in 0..dw {
                    let src = *scaled.get_pixel(sx, sy);
                    let o = (off_x + sx) as usize * 4;
                    let dst = Rgba([out[o], out[o + 1], out[o + 2], out[o + 3]]);
                    out[o..o + 4].copy_from_slice(&composite_over(src, dst).0);
                }
            });

        self.pixels = TiledImage::from_rgba_image(&page);
        Ok(())
    }

    /// Byte-exact copy of the current pixels.
    pub fn export_image(&self) -> RgbaImage {
        self.pixels.to_rgba_image()
    }

    /// Shared-tile view of the pixels (cheap; used for history entries).
    pub fn pixels(&self) -> &TiledImage {
        &self.pixels
    }

    /// Replace the pixels with a previously captured copy.
    /// Dimensions must match; mismatches are ignored.
    pub fn restore(&mut self, pixels: &TiledImage) {
        if pixels.width() == self.width() && pixels.height() == self.height() {
            self.pixels = pixels.clone();
        }
    }
}

/// Straight-alpha source-over.
fn composite_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return TRANSPARENT_PIXEL;
    }
    let ch = |i: usize| {
        let v = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([ch(0), ch(1), ch(2), (out_a * 255.0).round() as u8])
}

// ============================================================================
// COORDINATE MAPPING
// ============================================================================

/// Where the surface is displayed, in viewport (screen/CSS) units.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ViewportRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// Rect that displays a surface 1:1 at the origin.
    pub fn identity(surface_width: u32, surface_height: u32) -> Self {
        Self::new(0.0, 0.0, surface_width as f32, surface_height as f32)
    }
}

/// Map a viewport position to surface space.
///
/// Uses the surface's backing dimensions, never a cached scale, so a layout
/// reflow mid-gesture cannot skew the stroke. Results outside the surface are
/// passed through. A zero-sized rect axis maps to 0.
pub fn to_surface_coords(
    viewport_x: f32,
    viewport_y: f32,
    rect: ViewportRect,
    surface_width: u32,
    surface_height: u32,
) -> (f32, f32) {
    let axis = |v: f32, origin: f32, extent: f32, size: u32| {
        if extent.abs() <= f32::EPSILON {
            0.0
        } else {
            (v - origin) * size as f32 / extent
        }
    };
    (
        axis(viewport_x, rect.left, rect.width, surface_width),
        axis(viewport_y, rect.top, rect.height, surface_height),
    )
}

/// Surface-space coordinate to pixel index. Always `floor`.
#[inline]
pub fn pixel_index(v: f32) -> i32 {
    v.floor() as i32
}
