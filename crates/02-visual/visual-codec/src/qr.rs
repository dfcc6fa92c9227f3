//! QR symbols at error correction level L.
//!
//! Payloads travel as unpadded base32 so the symbol stays in alphanumeric
//! mode, which carries 5.5 bits per character against 8 for byte mode.

use data_encoding::BASE32_NOPAD;
use frame::{Frame, BLACK, WHITE};
use qrcode::{Color, EcLevel, QrCode, Version};
use tracing::trace;

use crate::error::{CodecError, CodecResult};
use crate::{checked_frame_side, VisualCodec};

pub const MAX_QR_VERSION: u8 = 40;

/// Data codewords per version at error correction level L.
const DATA_CODEWORDS_L: [u16; MAX_QR_VERSION as usize] = [
    19, 34, 55, 80, 108, 136, 156, 194, 232, 274, 324, 370, 428, 461, 523, 589, 647, 721, 795,
    861, 932, 1006, 1094, 1174, 1276, 1370, 1468, 1531, 1631, 1735, 1843, 1955, 2071, 2191, 2306,
    2434, 2566, 2702, 2812, 2956,
];

const MODE_INDICATOR_BITS: usize = 4;

#[derive(Clone, Debug)]
pub struct QrCodec {
    version: u8,
    box_size: u32,
    border: u32,
}

impl QrCodec {
    pub fn new(version: u8, box_size: u32, border: u32) -> CodecResult<Self> {
        if !(1..=MAX_QR_VERSION).contains(&version) {
            return Err(CodecError::InvalidGeometry("qr version must be within 1..=40"));
        }
        if box_size == 0 {
            return Err(CodecError::InvalidGeometry("box size must be positive"));
        }
        if checked_frame_side(Self::modules(version), border, box_size).is_none() {
            return Err(CodecError::InvalidGeometry("frame exceeds maximum side"));
        }
        Ok(Self {
            version,
            box_size,
            border,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Alphanumeric characters a level-L symbol of `version` holds.
    pub fn alphanumeric_capacity(version: u8) -> usize {
        let Some(&codewords) = DATA_CODEWORDS_L.get(usize::from(version).wrapping_sub(1)) else {
            return 0;
        };
        let count_bits = match version {
            1..=9 => 9,
            10..=26 => 11,
            _ => 13,
        };
        let bits = (usize::from(codewords) * 8).saturating_sub(MODE_INDICATOR_BITS + count_bits);
        2 * (bits / 11) + usize::from(bits % 11 >= 6)
    }

    /// Side length of the rendered frame in pixels.
    pub fn frame_side(&self) -> u32 {
        (Self::modules(self.version) + 2 * self.border) * self.box_size
    }

    fn modules(version: u8) -> u32 {
        17 + 4 * u32::from(version)
    }
}

impl VisualCodec for QrCodec {
    fn max_payload(&self) -> usize {
        Self::alphanumeric_capacity(self.version) * 5 / 8
    }

    fn encode(&self, payload: &[u8]) -> CodecResult<Frame> {
        let capacity = self.max_payload();
        if payload.len() > capacity {
            return Err(CodecError::PayloadTooLarge {
                size: payload.len(),
                capacity,
            });
        }
        let text = BASE32_NOPAD.encode(payload);
        let code = QrCode::with_version(
            text.as_bytes(),
            Version::Normal(i16::from(self.version)),
            EcLevel::L,
        )
        .map_err(|err| CodecError::qr(err.to_string()))?;

        let modules = code.width() as u32;
        let side = self.frame_side();
        let mut frame = Frame::filled(side, side, WHITE);
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let x = self.border + i as u32 % modules;
            let y = self.border + i as u32 / modules;
            frame.fill_rect(
                x * self.box_size,
                y * self.box_size,
                self.box_size,
                self.box_size,
                BLACK,
            );
        }
        Ok(frame)
    }

    fn decode(&self, frame: &Frame) -> Option<Vec<u8>> {
        if frame.is_empty() {
            return None;
        }
        let width = frame.width() as usize;
        let luma = frame.to_luma();
        let mut img = rqrr::PreparedImage::prepare_from_greyscale(
            width,
            frame.height() as usize,
            |x, y| luma[y * width + x],
        );
        for grid in img.detect_grids() {
            match grid.decode() {
                Ok((_, text)) => match BASE32_NOPAD.decode(text.as_bytes()) {
                    Ok(bytes) => return Some(bytes),
                    Err(err) => trace!(%err, "qr content is not base32"),
                },
                Err(err) => trace!(%err, "qr grid failed to decode"),
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "qr"
    }
}
