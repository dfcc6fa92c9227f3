use fountain::FountainError;
use packet::Mode;
use thiserror::Error;

/// Why a well-formed packet was not accepted into the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("session is {} but packet is {}", expected.as_str(), got.as_str())]
    ModeMismatch { expected: Mode, got: Mode },

    #[error("chunk index {index} outside 0..{total_chunks}")]
    IndexOutOfRange { index: u32, total_chunks: u32 },

    #[error("packet announces {got} chunks, session expects {expected}")]
    TotalChunksMismatch { expected: u32, got: u32 },

    #[error("packet announces {got} file bytes, session expects {expected}")]
    FileSizeMismatch { expected: u32, got: u32 },

    #[error("sequential packet announces zero chunks")]
    ZeroChunks,

    #[error("fountain session cannot start: {0}")]
    Fountain(#[from] FountainError),
}
