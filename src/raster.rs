//! Canvas raster surface: brush stamping, segment interpolation, and the
//! lossless PNG snapshot codec.
//!
//! DESIGN
//! ======
//! Painting one logical point stamps a square brush-sized patch. Unless it is
//! the first point of a segment, patches are also stamped along the line from
//! the previous point so fast pointer movement leaves no gaps. The raster is
//! mutated in place; replication never ships pixels — only whole PNG
//! snapshots, which atomically replace the receiver's raster.

#[cfg(test)]
#[path = "raster_test.rs"]
mod tests;

use crate::color::Color;

/// Default square canvas resolution, in pixels.
pub const DEFAULT_RESOLUTION: u32 = 750;

/// Eraser brush magnification relative to the drawing brush.
const ERASER_SIZE_FACTOR: u32 = 10;

/// Interpolation step along a segment, as a fraction of its length.
const SEGMENT_STEP: f32 = 0.02;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("png decode failed: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("png encode failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("unsupported pixel format: {0:?}")]
    UnsupportedFormat(png::ColorType),
}

/// Map a pen stroke width (world units) to a brush patch size (pixels).
#[must_use]
pub fn brush_size_for_width(width: f32) -> u32 {
    (width * 1000.0) as u32 + 2
}

// =============================================================================
// BRUSH STYLE
// =============================================================================

/// Current paint style. The eraser paints with the canvas base color at an
/// enlarged size; the pre-erase size is kept so picking a color restores it.
#[derive(Debug, Clone, Copy)]
pub struct BrushStyle {
    color: Color,
    size: u32,
    eraser: bool,
    saved_size: u32,
}

impl BrushStyle {
    #[must_use]
    pub fn new(color: Color, size: u32) -> Self {
        Self { color, size, eraser: false, saved_size: size }
    }

    /// Picking a drawing color ends erasing and restores the saved size.
    pub fn set_color(&mut self, color: Color) {
        if self.eraser {
            self.size = self.saved_size;
            self.eraser = false;
        }
        self.color = color;
    }

    pub fn set_size(&mut self, size: u32) {
        if self.eraser {
            self.saved_size = size;
            self.size = size * ERASER_SIZE_FACTOR;
        } else {
            self.size = size;
        }
    }

    /// Switch to erasing: paint with the canvas base color, enlarged.
    pub fn erase(&mut self, base_color: Color) {
        if self.eraser {
            return;
        }
        self.eraser = true;
        self.color = base_color;
        self.saved_size = self.size;
        self.size *= ERASER_SIZE_FACTOR;
    }

    #[must_use]
    pub fn color(&self) -> Color {
        self.color
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn is_eraser(&self) -> bool {
        self.eraser
    }
}

// =============================================================================
// RASTER
// =============================================================================

/// A fixed-resolution pixel grid with a base (background) color.
#[derive(Debug, Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
    base_color: Color,
    /// Patch origin of the previous painted point within the current segment.
    last_point: Option<(i32, i32)>,
}

impl Raster {
    #[must_use]
    pub fn new(width: u32, height: u32, base_color: Color) -> Self {
        let pixels = vec![base_color; (width * height) as usize];
        Self { width, height, pixels, base_color, last_point: None }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn base_color(&self) -> Color {
        self.base_color
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Start a new continuous segment so the next point is not connected to
    /// the previous one by interpolation.
    pub fn begin_segment(&mut self) {
        self.last_point = None;
    }

    /// Paint one logical point given in normalized `[0, 1]` uv coordinates.
    ///
    /// A point whose patch origin falls outside the surface is skipped
    /// entirely and does not advance the segment.
    pub fn paint(&mut self, u: f32, v: f32, style: &BrushStyle) {
        let size = style.size() as i32;
        let px = (u * self.width as f32) as i32 - size / 2;
        let py = (v * self.height as f32) as i32 - size / 2;

        if px < 0 || px >= self.width as i32 || py < 0 || py >= self.height as i32 {
            return;
        }

        self.stamp(px, py, size, style.color());

        if let Some((prev_x, prev_y)) = self.last_point {
            let mut f = 0.01;
            while f < 1.0 {
                let ix = lerp(prev_x, px, f);
                let iy = lerp(prev_y, py, f);
                f += SEGMENT_STEP;
                if ix < 0 || ix >= self.width as i32 || iy < 0 || iy >= self.height as i32 {
                    continue;
                }
                self.stamp(ix, iy, size, style.color());
            }
        }

        self.last_point = Some((px, py));
    }

    /// Stamp a square patch with its origin at `(ox, oy)`, clipped to the
    /// surface.
    fn stamp(&mut self, ox: i32, oy: i32, size: i32, color: Color) {
        let x0 = ox.max(0);
        let y0 = oy.max(0);
        let x1 = (ox + size).min(self.width as i32);
        let y1 = (oy + size).min(self.height as i32);
        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels[(y * self.width as i32 + x) as usize] = color;
            }
        }
    }

    /// Recolor every pixel approximately equal to `from` with `to`, leaving
    /// drawn strokes untouched. Used when a private note is published and its
    /// background must match the shared theme.
    pub fn recolor_background(&mut self, from: Color, to: Color, tolerance: f32) {
        for px in &mut self.pixels {
            if px.approx_eq(from, tolerance) {
                *px = to;
            }
        }
        self.base_color = to;
    }

    // =========================================================================
    // SNAPSHOT CODEC
    // =========================================================================

    /// Encode the raster as an RGBA8 PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, RasterError> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for px in &self.pixels {
            bytes.extend_from_slice(&px.to_rgba8());
        }

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&bytes)?;
        }
        Ok(out)
    }

    /// Decode a PNG snapshot into a raster, replacing pixels wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed data or a pixel format other than
    /// 8-bit RGB/RGBA.
    pub fn decode_png(data: &[u8], base_color: Color) -> Result<Self, RasterError> {
        let decoder = png::Decoder::new(std::io::Cursor::new(data));
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        let raw = &buf[..info.buffer_size()];

        let pixels = match info.color_type {
            png::ColorType::Rgba => raw
                .chunks_exact(4)
                .map(|c| Color::from_rgba8([c[0], c[1], c[2], c[3]]))
                .collect(),
            png::ColorType::Rgb => raw
                .chunks_exact(3)
                .map(|c| Color::from_rgba8([c[0], c[1], c[2], 255]))
                .collect(),
            other => return Err(RasterError::UnsupportedFormat(other)),
        };

        Ok(Self { width: info.width, height: info.height, pixels, base_color, last_point: None })
    }
}

fn lerp(a: i32, b: i32, f: f32) -> i32 {
    (a as f32 + (b - a) as f32 * f) as i32
}
