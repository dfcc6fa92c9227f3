use thiserror::Error;

pub type FountainResult<T> = Result<T, FountainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FountainError {
    #[error("fountain coding needs at least one input byte")]
    EmptyInput,

    #[error("payload of {payload_size} bytes leaves no room for a {min}-byte symbol")]
    PayloadTooSmall { payload_size: usize, min: usize },

    #[error("input of {size} bytes exceeds the fountain limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}
