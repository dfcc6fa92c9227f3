//! Custom bit-packed grid codec.
//!
//! A frame is a matrix of `box_size × box_size` pixel cells. The outer
//! `border_size` cells on each side are calibration strips; the inner
//! `width_cells × height_cells` matrix carries `[u32 LE length][payload]`,
//! row-major, one or two bytes per cell.

use frame::{Frame, Rgb, WHITE};
use tracing::trace;

use crate::detect::detect_box_size;
use crate::error::{CodecError, CodecResult};
use crate::{checked_frame_side, VisualCodec};

/// Bytes of the length prefix written ahead of the payload.
pub const LENGTH_PREFIX_LEN: usize = 4;

const TOP_STRIP: Rgb = WHITE;
const RIGHT_STRIP: Rgb = [0xFF, 0x00, 0x00];
const BOTTOM_STRIP: Rgb = [0x00, 0xFF, 0x00];
const LEFT_STRIP: Rgb = [0x00, 0x00, 0xFF];

/// Largest per-channel distance between a strip's mean colour and its
/// expected colour.
const STRIP_TOLERANCE: u8 = 64;

/// Cells per side before version scaling; each version adds 4.
const BASE_CELLS: u32 = 21;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellPacking {
    /// One byte per cell, 3/3/2 bits with a guard bit below each field.
    Bits8,
    /// Two bytes per cell, 5/6/5 bits.
    Bits16,
}

impl CellPacking {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(CellPacking::Bits8),
            16 => Some(CellPacking::Bits16),
            _ => None,
        }
    }

    #[inline]
    pub fn bytes_per_cell(self) -> usize {
        match self {
            CellPacking::Bits8 => 1,
            CellPacking::Bits16 => 2,
        }
    }

    fn pack(self, bytes: &[u8]) -> Rgb {
        match self {
            CellPacking::Bits8 => {
                let b = bytes[0];
                [(b & 0xE0) | 0x10, ((b & 0x1C) << 3) | 0x10, ((b & 0x03) << 6) | 0x20]
            }
            CellPacking::Bits16 => {
                let word = u16::from_be_bytes([bytes[0], bytes.get(1).copied().unwrap_or(0)]);
                [
                    ((word >> 11) as u8) << 3,
                    (((word >> 5) & 0x3F) as u8) << 2,
                    ((word & 0x1F) as u8) << 3,
                ]
            }
        }
    }

    fn unpack(self, px: Rgb, out: &mut Vec<u8>) {
        match self {
            CellPacking::Bits8 => out.push((px[0] & 0xE0) | ((px[1] >> 5) << 2) | (px[2] >> 6)),
            CellPacking::Bits16 => {
                let word = (u16::from(px[0] >> 3) << 11)
                    | (u16::from(px[1] >> 2) << 5)
                    | u16::from(px[2] >> 3);
                out.extend_from_slice(&word.to_be_bytes());
            }
        }
    }
}

/// Cell layout of a grid frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub width_cells: u32,
    pub height_cells: u32,
    pub box_size: u32,
    pub border_size: u32,
}

impl GridGeometry {
    pub fn new(
        width_cells: u32,
        height_cells: u32,
        box_size: u32,
        border_size: u32,
    ) -> CodecResult<Self> {
        if width_cells == 0 || height_cells == 0 {
            return Err(CodecError::InvalidGeometry("data matrix must have at least one cell"));
        }
        if box_size == 0 {
            return Err(CodecError::InvalidGeometry("box size must be positive"));
        }
        if border_size == 0 {
            return Err(CodecError::InvalidGeometry("border must be at least one cell"));
        }
        if checked_frame_side(width_cells, border_size, box_size).is_none()
            || checked_frame_side(height_cells, border_size, box_size).is_none()
        {
            return Err(CodecError::InvalidGeometry("frame exceeds maximum side"));
        }
        Ok(Self {
            width_cells,
            height_cells,
            box_size,
            border_size,
        })
    }

    /// Square geometry of `21 + 4 * version` cells per side.
    pub fn from_version(version: u32, box_size: u32, border_size: u32) -> CodecResult<Self> {
        let cells = version
            .checked_mul(4)
            .and_then(|extra| extra.checked_add(BASE_CELLS))
            .ok_or(CodecError::InvalidGeometry("grid version too large"))?;
        Self::new(cells, cells, box_size, border_size)
    }

    #[inline]
    pub fn cells(&self) -> usize {
        self.width_cells as usize * self.height_cells as usize
    }

    /// Frame size in pixels. Bounded by [`crate::MAX_FRAME_SIDE`] for
    /// geometries built through [`GridGeometry::new`].
    pub fn frame_size(&self) -> (u32, u32) {
        let border = self.border_size.saturating_mul(2);
        (
            self.width_cells.saturating_add(border).saturating_mul(self.box_size),
            self.height_cells.saturating_add(border).saturating_mul(self.box_size),
        )
    }
}

/// Grid codec. Decoding uses the configured box size unless built with
/// [`GridCodec::with_auto_detect`].
#[derive(Clone, Debug)]
pub struct GridCodec {
    geometry: GridGeometry,
    packing: CellPacking,
    auto_detect: bool,
}

impl GridCodec {
    pub fn new(geometry: GridGeometry, packing: CellPacking) -> Self {
        Self {
            geometry,
            packing,
            auto_detect: false,
        }
    }

    pub fn with_auto_detect(mut self) -> Self {
        self.auto_detect = true;
        self
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn packing(&self) -> CellPacking {
        self.packing
    }

    /// Data bytes a frame holds, length prefix included.
    pub fn capacity(&self) -> usize {
        self.geometry.cells() * self.packing.bytes_per_cell()
    }

    pub fn encode_frame(&self, payload: &[u8]) -> CodecResult<Frame> {
        let capacity = self.capacity();
        let size = payload.len();
        if size + LENGTH_PREFIX_LEN > capacity || u32::try_from(size).is_err() {
            return Err(CodecError::PayloadTooLarge {
                size,
                capacity: capacity.saturating_sub(LENGTH_PREFIX_LEN),
            });
        }

        let mut stream = Vec::with_capacity(size + LENGTH_PREFIX_LEN + 1);
        stream.extend_from_slice(&(size as u32).to_le_bytes());
        stream.extend_from_slice(payload);

        let g = &self.geometry;
        let (width, height) = g.frame_size();
        let mut frame = Frame::filled(width, height, WHITE);
        paint_strips(&mut frame, g);

        let per_cell = self.packing.bytes_per_cell();
        for (i, bytes) in stream.chunks(per_cell).enumerate() {
            let col = g.border_size + (i as u32 % g.width_cells);
            let row = g.border_size + (i as u32 / g.width_cells);
            frame.fill_rect(
                col * g.box_size,
                row * g.box_size,
                g.box_size,
                g.box_size,
                self.packing.pack(bytes),
            );
        }
        Ok(frame)
    }

    /// Decodes with an explicit box size, or auto-detection when `None`.
    /// The data matrix size is derived from the frame dimensions.
    pub fn decode_with(&self, frame: &Frame, box_size: Option<u32>) -> Option<Vec<u8>> {
        let box_size = match box_size {
            Some(size) => size,
            None => detect_box_size(frame)?,
        };
        if box_size == 0 {
            return None;
        }
        let border = self.geometry.border_size;
        let width_cells = (frame.width() / box_size).checked_sub(2 * border)?;
        let height_cells = (frame.height() / box_size).checked_sub(2 * border)?;
        let geometry = GridGeometry::new(width_cells, height_cells, box_size, border).ok()?;

        if !strips_valid(frame, &geometry) {
            trace!(box_size, "calibration strips did not validate");
            return None;
        }

        let sampler = CellSampler {
            frame,
            geometry: &geometry,
        };
        let per_cell = self.packing.bytes_per_cell();
        let prefix_cells = LENGTH_PREFIX_LEN / per_cell;
        if geometry.cells() < prefix_cells {
            return None;
        }

        let mut bytes = Vec::with_capacity(LENGTH_PREFIX_LEN);
        for i in 0..prefix_cells {
            self.packing.unpack(sampler.sample(i), &mut bytes);
        }
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let available = geometry.cells() * per_cell - LENGTH_PREFIX_LEN;
        if len > available {
            trace!(len, available, "length prefix exceeds frame capacity");
            return None;
        }

        let total_cells = (LENGTH_PREFIX_LEN + len).div_ceil(per_cell);
        bytes.reserve(total_cells * per_cell);
        for i in prefix_cells..total_cells {
            self.packing.unpack(sampler.sample(i), &mut bytes);
        }
        bytes.truncate(LENGTH_PREFIX_LEN + len);
        bytes.drain(..LENGTH_PREFIX_LEN);
        Some(bytes)
    }
}

impl VisualCodec for GridCodec {
    fn max_payload(&self) -> usize {
        self.capacity().saturating_sub(LENGTH_PREFIX_LEN)
    }

    fn encode(&self, payload: &[u8]) -> CodecResult<Frame> {
        self.encode_frame(payload)
    }

    fn decode(&self, frame: &Frame) -> Option<Vec<u8>> {
        let box_size = (!self.auto_detect).then_some(self.geometry.box_size);
        self.decode_with(frame, box_size)
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}

struct CellSampler<'a> {
    frame: &'a Frame,
    geometry: &'a GridGeometry,
}

impl CellSampler<'_> {
    /// Centre pixel of frame cell `(col, row)`, border cells included.
    #[inline]
    fn at(&self, col: u32, row: u32) -> Rgb {
        let half = self.geometry.box_size / 2;
        self.frame
            .pixel(col * self.geometry.box_size + half, row * self.geometry.box_size + half)
    }

    /// Centre pixel of data cell `i` in row-major order.
    #[inline]
    fn sample(&self, i: usize) -> Rgb {
        let g = self.geometry;
        let col = g.border_size + (i % g.width_cells as usize) as u32;
        let row = g.border_size + (i / g.width_cells as usize) as u32;
        self.at(col, row)
    }
}

fn paint_strips(frame: &mut Frame, g: &GridGeometry) {
    let (width, height) = (frame.width(), frame.height());
    let strip = g.border_size * g.box_size;
    frame.fill_rect(0, 0, width, strip, TOP_STRIP);
    frame.fill_rect(0, height - strip, width, strip, BOTTOM_STRIP);
    frame.fill_rect(0, strip, strip, height - 2 * strip, LEFT_STRIP);
    frame.fill_rect(width - strip, strip, strip, height - 2 * strip, RIGHT_STRIP);
}

fn strips_valid(frame: &Frame, g: &GridGeometry) -> bool {
    let sampler = CellSampler { frame, geometry: g };
    let cols = g.width_cells + 2 * g.border_size;
    let rows = g.height_cells + 2 * g.border_size;
    let b = g.border_size;

    let top = (0..b).flat_map(|row| (0..cols).map(move |col| (col, row)));
    let bottom = (rows - b..rows).flat_map(|row| (0..cols).map(move |col| (col, row)));
    let left = (b..rows - b).flat_map(|row| (0..b).map(move |col| (col, row)));
    let right = (b..rows - b).flat_map(|row| (cols - b..cols).map(move |col| (col, row)));

    strip_matches(&sampler, top, TOP_STRIP)
        && strip_matches(&sampler, bottom, BOTTOM_STRIP)
        && strip_matches(&sampler, left, LEFT_STRIP)
        && strip_matches(&sampler, right, RIGHT_STRIP)
}

fn strip_matches(
    sampler: &CellSampler<'_>,
    cells: impl Iterator<Item = (u32, u32)>,
    expected: Rgb,
) -> bool {
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for (col, row) in cells {
        let px = sampler.at(col, row);
        for (acc, channel) in sum.iter_mut().zip(px) {
            *acc += u64::from(channel);
        }
        count += 1;
    }
    if count == 0 {
        return false;
    }
    sum.iter()
        .zip(expected)
        .all(|(&total, want)| ((total / count) as u8).abs_diff(want) <= STRIP_TOLERANCE)
}
