use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use frame::Frame;
use tracing::debug;

use crate::error::{IoError, IoResult};
use crate::png::load_png;
use crate::region::Region;

/// Blocking frame producer on the receive side. `Ok(None)` means the source
/// is exhausted.
pub trait CaptureSource {
    fn next_frame(&mut self) -> IoResult<Option<Frame>>;
}

/// PNG files of a directory in natural filename order (`img_2` before
/// `img_10`).
pub struct DirectorySource {
    paths: VecDeque<PathBuf>,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> IoResult<Self> {
        let entries = fs::read_dir(dir).map_err(|err| IoError::io(dir, err))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| IoError::io(dir, err))?.path();
            let is_png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if is_png && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort_by_cached_key(|path| {
            natural_key(&path.file_name().unwrap_or_default().to_string_lossy())
        });
        debug!(dir = %dir.display(), files = paths.len(), "image directory opened");
        Ok(Self {
            paths: paths.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl CaptureSource for DirectorySource {
    fn next_frame(&mut self) -> IoResult<Option<Frame>> {
        match self.paths.pop_front() {
            Some(path) => load_png(&path).map(Some),
            None => Ok(None),
        }
    }
}

/// Replays frames held in memory.
#[derive(Default)]
pub struct MemorySource {
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl CaptureSource for MemorySource {
    fn next_frame(&mut self) -> IoResult<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

/// Crops every frame of the inner source to a capture region.
pub struct CroppedSource<S> {
    inner: S,
    region: Region,
    fit: u32,
}

impl<S: CaptureSource> CroppedSource<S> {
    /// `fit` is the code frame side used by `f` region sizes.
    pub fn new(inner: S, region: Region, fit: u32) -> Self {
        Self { inner, region, fit }
    }
}

impl<S: CaptureSource> CaptureSource for CroppedSource<S> {
    fn next_frame(&mut self) -> IoResult<Option<Frame>> {
        let Some(frame) = self.inner.next_frame()? else {
            return Ok(None);
        };
        let rect = self.region.resolve(frame.width(), frame.height(), self.fit)?;
        frame
            .crop(rect.x, rect.y, rect.width, rect.height)
            .map(Some)
            .ok_or_else(|| IoError::region(format!("{rect:?} outside captured frame")))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalPart {
    Number(u64),
    Text(String),
}

fn natural_key(name: &str) -> Vec<NaturalPart> {
    let mut parts = Vec::new();
    let mut chars = name.chars().peekable();
    while let Some(&c) = chars.peek() {
        let digit = c.is_ascii_digit();
        let mut run = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != digit {
                break;
            }
            run.push(c);
            chars.next();
        }
        parts.push(match run.parse() {
            Ok(n) if digit => NaturalPart::Number(n),
            _ => NaturalPart::Text(run),
        });
    }
    parts
}
