use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use frame::Frame;
use tracing::{debug, info};

use crate::error::{IoError, IoResult};
use crate::png::save_png;

/// Destination for rendered code frames, in emission order.
pub trait FrameSink {
    fn push(&mut self, frame: &Frame) -> IoResult<()>;

    /// Flushes buffered output. Called once after the last frame.
    fn finish(&mut self) -> IoResult<()>;
}

/// Writes frames as `img_{n}.png`, `n` counting from 0.
pub struct DirectorySink {
    dir: PathBuf,
    written: usize,
}

impl DirectorySink {
    /// Creates `dir` if needed and removes frames left by an earlier run,
    /// so the directory only ever holds this run's frames. Other files are
    /// left alone.
    pub fn create(dir: impl Into<PathBuf>) -> IoResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| IoError::io(&dir, err))?;
        let removed = clear_frames(&dir)?;
        if removed > 0 {
            info!(dir = %dir.display(), removed, "removed stale frames");
        }
        Ok(Self { dir, written: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("img_{index}.png"))
    }
}

fn is_frame_name(name: &str) -> bool {
    name.strip_prefix("img_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn clear_frames(dir: &Path) -> IoResult<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir).map_err(|err| IoError::io(dir, err))? {
        let entry = entry.map_err(|err| IoError::io(dir, err))?;
        let path = entry.path();
        if !path.file_name().and_then(|n| n.to_str()).is_some_and(is_frame_name) {
            continue;
        }
        fs::remove_file(&path).map_err(|err| IoError::io(&path, err))?;
        removed += 1;
    }
    Ok(removed)
}

impl FrameSink for DirectorySink {
    fn push(&mut self, frame: &Frame) -> IoResult<()> {
        let path = self.frame_path(self.written);
        save_png(frame, &path)?;
        debug!(path = %path.display(), "frame written");
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> IoResult<()> {
        info!(dir = %self.dir.display(), frames = self.written, "image directory complete");
        Ok(())
    }
}

/// Stages frames in a directory, then muxes them into an H.264 video with
/// an external `ffmpeg`.
pub struct VideoSink {
    frames: DirectorySink,
    output: PathBuf,
    fps: u32,
    program: OsString,
}

impl VideoSink {
    pub fn new(
        frames_dir: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        fps: u32,
    ) -> IoResult<Self> {
        Ok(Self {
            frames: DirectorySink::create(frames_dir)?,
            output: output.into(),
            fps: fps.max(1),
            program: OsString::from("ffmpeg"),
        })
    }

    /// Overrides the muxer binary.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-framerate")
            .arg(self.fps.to_string())
            .arg("-i")
            .arg(self.frames.dir().join("img_%d.png"))
            // yuv420p needs even dimensions
            .arg("-vf")
            .arg("pad=ceil(iw/2)*2:ceil(ih/2)*2:color=white")
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg(&self.output);
        cmd
    }
}

impl FrameSink for VideoSink {
    fn push(&mut self, frame: &Frame) -> IoResult<()> {
        self.frames.push(frame)
    }

    fn finish(&mut self) -> IoResult<()> {
        if self.frames.written() == 0 {
            return Err(IoError::Ffmpeg("no frames to mux".into()));
        }
        let mut cmd = self.command();
        debug!(?cmd, "running muxer");
        let output = cmd
            .output()
            .map_err(|err| IoError::Ffmpeg(format!("cannot run {:?}: {err}", self.program)))?;
        if !output.status.success() {
            return Err(IoError::Ffmpeg(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        info!(
            output = %self.output.display(),
            frames = self.frames.written(),
            fps = self.fps,
            "video written"
        );
        Ok(())
    }
}

/// Collects frames in memory.
#[derive(Default)]
pub struct MemorySink {
    frames: Vec<Frame>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

impl FrameSink for MemorySink {
    fn push(&mut self, frame: &Frame) -> IoResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> IoResult<()> {
        self.finished = true;
        Ok(())
    }
}
