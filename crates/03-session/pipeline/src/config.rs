use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use packet::{Mode, L2_HEADER_LEN, L3_HEADER_LEN};
use thiserror::Error;
use visual_codec::{
    CellPacking, CodecError, GridCodec, GridGeometry, QrCodec, VisualCodec, MAX_QR_VERSION,
};

/// Bounded channel depth between producers and the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 240;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown codec method `{0}` (expected `qr` or `grid`)")]
    UnknownMethod(String),

    #[error("qr version {0} outside 1..=40")]
    InvalidQrVersion(u8),

    #[error("box size must be positive")]
    InvalidBoxSize,

    #[error("cell packing must be 8 or 16 bits, got {0}")]
    InvalidCellBits(u32),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("worker count must be positive")]
    ZeroWorkers,

    #[error("channel capacity must be positive")]
    ZeroChannelCapacity,

    #[error("codec carries {capacity} bytes per frame, need at least {min}")]
    PayloadTooSmall { capacity: usize, min: usize },

    #[error("missing {0}")]
    MissingInput(&'static str),

    #[error("fountain mode never ends on its own; set a frame budget")]
    FountainNeedsBudget,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// `available_parallelism - 1`, at least 1. One core is left for the
/// consumer.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .saturating_sub(1)
        .max(1)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CodecMethod {
    #[default]
    Qr,
    Grid,
}

impl CodecMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CodecMethod::Qr => "qr",
            CodecMethod::Grid => "grid",
        }
    }
}

impl FromStr for CodecMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "qr" | "qrcode" => Ok(CodecMethod::Qr),
            "grid" | "pixelbar" => Ok(CodecMethod::Grid),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for CodecMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridConfig {
    pub version: u32,
    pub box_size: u32,
    pub border: u32,
    /// 8 or 16.
    pub bits: u32,
    /// Discover the box size from each frame instead of trusting `box_size`.
    pub auto_detect: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            version: 40,
            box_size: 2,
            border: 1,
            bits: 8,
            auto_detect: false,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> ConfigResult<GridCodec> {
        if self.box_size == 0 {
            return Err(ConfigError::InvalidBoxSize);
        }
        let packing =
            CellPacking::from_bits(self.bits).ok_or(ConfigError::InvalidCellBits(self.bits))?;
        let geometry = GridGeometry::from_version(self.version, self.box_size, self.border)?;
        let codec = GridCodec::new(geometry, packing);
        Ok(if self.auto_detect {
            codec.with_auto_detect()
        } else {
            codec
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrConfig {
    pub version: u8,
    pub box_size: u32,
    pub border: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            version: MAX_QR_VERSION,
            box_size: 2,
            border: 4,
        }
    }
}

impl QrConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> ConfigResult<QrCodec> {
        if !(1..=MAX_QR_VERSION).contains(&self.version) {
            return Err(ConfigError::InvalidQrVersion(self.version));
        }
        if self.box_size == 0 {
            return Err(ConfigError::InvalidBoxSize);
        }
        Ok(QrCodec::new(self.version, self.box_size, self.border)?)
    }
}

/// Visual codec selection, resolved once per session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecConfig {
    pub method: CodecMethod,
    pub grid: GridConfig,
    pub qr: QrConfig,
}

impl CodecConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        match self.method {
            CodecMethod::Grid => self.grid.validate(),
            CodecMethod::Qr => self.qr.validate(),
        }
    }

    pub fn build(&self) -> ConfigResult<Arc<dyn VisualCodec>> {
        let codec: Arc<dyn VisualCodec> = match self.method {
            CodecMethod::Grid => Arc::new(self.grid.build()?),
            CodecMethod::Qr => Arc::new(self.qr.build()?),
        };
        Ok(codec)
    }

    /// Side of the rendered code frame in pixels.
    pub fn frame_side(&self) -> ConfigResult<u32> {
        Ok(match self.method {
            CodecMethod::Grid => self.grid.build()?.geometry().frame_size().0,
            CodecMethod::Qr => self.qr.build()?.frame_side(),
        })
    }
}

/// L3 payload bytes per frame for `codec`, or an error when the codec
/// cannot fit both headers and at least one payload byte.
pub fn frame_payload_size(codec: &dyn VisualCodec) -> ConfigResult<usize> {
    let capacity = codec.max_payload();
    packet::l3_payload_size(capacity).ok_or(ConfigError::PayloadTooSmall {
        capacity,
        min: L2_HEADER_LEN + L3_HEADER_LEN + 1,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendConfig {
    pub mode: Mode,
    pub workers: usize,
    pub channel_capacity: usize,
    /// Frames to emit in fountain mode. Ignored in sequential mode, which
    /// always emits one frame per chunk.
    pub max_frames: Option<u64>,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Sequential,
            workers: default_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frames: None,
        }
    }
}

impl SendConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        if self.mode == Mode::Fountain && self.max_frames.unwrap_or(0) == 0 {
            return Err(ConfigError::FountainNeedsBudget);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveConfig {
    pub workers: usize,
    pub channel_capacity: usize,
    /// Pause between polls of a live source.
    pub poll_interval: Duration,
    /// Give up a live receive after this many polls.
    pub max_polls: Option<u64>,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            poll_interval: Duration::from_millis(10),
            max_polls: None,
        }
    }
}

impl ReceiveConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(())
    }
}
