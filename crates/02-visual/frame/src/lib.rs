//! RGB pixel grids exchanged between visual codecs, sinks and capture sources.
//!
//! This crate has no knowledge of codecs or I/O. It owns the pixel layout:
//! row-major, three bytes per pixel (R, G, B), no padding between rows.

/// Bytes per pixel in a [`Frame`].
pub const CHANNELS: usize = 3;

/// One RGB pixel.
pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [0xFF, 0xFF, 0xFF];
pub const BLACK: Rgb = [0x00, 0x00, 0x00];

/// A 2-D grid of 8-bit RGB pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Creates a frame filled with a single colour.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wraps raw row-major RGB bytes. Returns `None` when the length does not
    /// match `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * CHANNELS {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// Reads the pixel at `(x, y)`. Panics when out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let o = self.offset(x, y);
        [self.pixels[o], self.pixels[o + 1], self.pixels[o + 2]]
    }

    /// Reads the pixel at `(x, y)` if it lies inside the frame.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        (x < self.width && y < self.height).then(|| self.pixel(x, y))
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb) {
        let o = self.offset(x, y);
        self.pixels[o..o + CHANNELS].copy_from_slice(&color);
    }

    /// Fills the rectangle `[x, x + w) × [y, y + h)`, clipped to the frame.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Rgb) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);
        for row in y..y_end {
            for col in x..x_end {
                self.set_pixel(col, row, color);
            }
        }
    }

    /// Copies the rectangle `[x, x + w) × [y, y + h)` into a new frame.
    /// Returns `None` when the rectangle leaves the frame.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<Frame> {
        let x_end = x.checked_add(w)?;
        let y_end = y.checked_add(h)?;
        if x_end > self.width || y_end > self.height {
            return None;
        }
        let mut pixels = Vec::with_capacity(w as usize * h as usize * CHANNELS);
        for row in y..y_end {
            let start = self.offset(x, row);
            pixels.extend_from_slice(&self.pixels[start..start + w as usize * CHANNELS]);
        }
        Some(Frame {
            width: w,
            height: h,
            pixels,
        })
    }

    /// Iterates over one row of pixels.
    pub fn row(&self, y: u32) -> impl Iterator<Item = Rgb> + '_ {
        let start = self.offset(0, y);
        self.pixels[start..start + self.width as usize * CHANNELS]
            .chunks_exact(CHANNELS)
            .map(|px| [px[0], px[1], px[2]])
    }

    /// BT.601 luma for each pixel, row-major.
    pub fn to_luma(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(CHANNELS)
            .map(|px| {
                let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
                (y / 1000) as u8
            })
            .collect()
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} frame",
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// True when every channel of `a` and `b` differs by at most `tolerance`.
#[inline]
pub fn approx_eq(a: Rgb, b: Rgb, tolerance: u8) -> bool {
    a.iter().zip(b.iter()).all(|(&x, &y)| x.abs_diff(y) <= tolerance)
}
