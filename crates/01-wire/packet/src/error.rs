use thiserror::Error;

pub type PacketResult<T> = Result<T, PacketError>;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("unknown L2 mode flag {0:#04x}")]
    UnknownMode(u8),
}

impl PacketError {
    /// Soft errors are expected on a noisy channel; the caller should keep polling.
    pub fn is_soft(&self) -> bool {
        matches!(self, PacketError::Truncated { .. })
    }
}
