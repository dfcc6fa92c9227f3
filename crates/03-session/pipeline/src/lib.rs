//! Threaded send and receive drivers.
//!
//! ```text
//! send:    file -> packets -> [encode workers] -> bounded channel -> sink
//! receive: source -> [decode workers] -> bounded channel -> reassembler
//! ```
//!
//! Channels are bounded, so a slow consumer throttles its producers.
//! Packetization and reassembly live in `packet`, `fountain` and
//! `reassembly`; this crate only moves their data between threads.

mod config;
mod error;
mod recv;
mod send;
mod stats;
mod worker;

pub use config::{
    default_workers, frame_payload_size, CodecConfig, CodecMethod, ConfigError, ConfigResult,
    GridConfig, QrConfig, ReceiveConfig, SendConfig, DEFAULT_CHANNEL_CAPACITY,
};
pub use error::{PipelineError, PipelineResult};
pub use reassembly::Progress;
pub use recv::{receive, receive_live, ReceiveReport};
pub use send::{send, SendReport};
pub use stats::{PipelineStats, SharedStats};
pub use worker::CancelToken;
