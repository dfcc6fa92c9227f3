//! Byte buffer <-> pixel grid codecs.
//!
//! Two variants share the [`VisualCodec`] seam: a custom bit-packed grid with
//! calibration strips ([`GridCodec`]) and QR symbols ([`QrCodec`]). Encoding
//! over capacity is an error; decoding failure is always `None`, since a
//! captured frame that is not a code frame is routine on the receive path.

mod detect;
mod error;
mod grid;
mod qr;

pub use detect::detect_box_size;
pub use error::{CodecError, CodecResult};
pub use grid::{CellPacking, GridCodec, GridGeometry, LENGTH_PREFIX_LEN};
pub use qr::{QrCodec, MAX_QR_VERSION};

use frame::Frame;

/// Largest rendered frame side, in pixels, either codec accepts.
pub const MAX_FRAME_SIDE: u32 = 16_384;

/// `(cells + 2 * border) * box_size`, or `None` past [`MAX_FRAME_SIDE`].
pub(crate) fn checked_frame_side(cells: u32, border: u32, box_size: u32) -> Option<u32> {
    border
        .checked_mul(2)
        .and_then(|quiet| quiet.checked_add(cells))
        .and_then(|units| units.checked_mul(box_size))
        .filter(|&side| side <= MAX_FRAME_SIDE)
}

pub trait VisualCodec: Send + Sync {
    /// Largest payload `encode` accepts.
    fn max_payload(&self) -> usize;

    fn encode(&self, payload: &[u8]) -> CodecResult<Frame>;

    fn decode(&self, frame: &Frame) -> Option<Vec<u8>>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}
