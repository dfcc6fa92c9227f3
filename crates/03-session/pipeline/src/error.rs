use fountain::FountainError;
use frame_io::IoError;
use packet::PacketError;
use thiserror::Error;
use visual_codec::CodecError;

use crate::config::ConfigError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("frame i/o error: {0}")]
    Io(#[from] IoError),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("fountain error: {0}")]
    Fountain(#[from] FountainError),

    #[error("file of {size} bytes needs more than u32::MAX chunks")]
    FileTooLarge { size: u64 },

    #[error("frame producer failed: {0}")]
    ProducerFailed(String),

    #[error(
        "transfer incomplete: received {received} of {}",
        .expected.map_or_else(|| "an unknown number of".to_string(), |n| n.to_string())
    )]
    Incomplete {
        received: usize,
        expected: Option<usize>,
    },

    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn producer(msg: impl Into<String>) -> Self {
        PipelineError::ProducerFailed(msg.into())
    }
}
