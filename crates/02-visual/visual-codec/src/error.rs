use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload of {size} bytes exceeds frame capacity of {capacity} bytes")]
    PayloadTooLarge { size: usize, capacity: usize },

    #[error("invalid codec geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("qr encoder error: {0}")]
    Qr(String),
}

impl CodecError {
    pub fn qr(msg: impl Into<String>) -> Self {
        CodecError::Qr(msg.into())
    }
}
