//! Frame input and output: PNG files, image directories, ffmpeg video and
//! in-memory buffers, plus capture-region cropping.

mod error;
mod png;
mod region;
mod sink;
mod source;

pub use error::{IoError, IoResult};
pub use png::{load_png, save_png};
pub use region::{Rect, Region, RegionOffset, RegionSize};
pub use sink::{DirectorySink, FrameSink, MemorySink, VideoSink};
pub use source::{CaptureSource, CroppedSource, DirectorySource, MemorySource};
