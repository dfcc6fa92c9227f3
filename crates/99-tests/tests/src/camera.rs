//! A simulated screen and camera for end-to-end scenarios.
//!
//! The sender's sink shows frames on a rendezvous channel; the receiver's
//! source "photographs" them by pasting each frame onto a larger canvas,
//! optionally adding per-channel noise and skipping frames.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use frame::{Frame, Rgb, WHITE};
use frame_io::{CaptureSource, FrameSink, IoResult};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// How long the camera waits for the next frame before giving up.
const SHUTTER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Screen {
    tx: Sender<Frame>,
}

impl FrameSink for Screen {
    fn push(&mut self, frame: &Frame) -> IoResult<()> {
        // nobody watching any more
        let _ = self.tx.send(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Lens {
    /// Canvas margin around the shown frame, in pixels.
    pub margin: (u32, u32),
    /// Maximum per-channel deviation.
    pub noise: u8,
    /// Miss every `n`th frame; 0 misses nothing.
    pub miss_every: u64,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            margin: (0, 0),
            noise: 0,
            miss_every: 0,
        }
    }
}

pub struct Camera {
    rx: Receiver<Frame>,
    lens: Lens,
    rng: SmallRng,
    seen: u64,
}

impl CaptureSource for Camera {
    fn next_frame(&mut self) -> IoResult<Option<Frame>> {
        loop {
            let frame = match self.rx.recv_timeout(SHUTTER_TIMEOUT) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Ok(None)
                }
            };
            self.seen += 1;
            if self.lens.miss_every != 0 && self.seen % self.lens.miss_every == 0 {
                continue;
            }
            return Ok(Some(self.photograph(&frame)));
        }
    }
}

impl Camera {
    fn photograph(&mut self, frame: &Frame) -> Frame {
        let (mx, my) = self.lens.margin;
        let mut canvas = Frame::filled(frame.width() + 2 * mx, frame.height() + 2 * my, WHITE);
        for y in 0..frame.height() {
            for (x, px) in frame.row(y).enumerate() {
                let px = self.jitter(px);
                canvas.set_pixel(x as u32 + mx, y + my, px);
            }
        }
        canvas
    }

    fn jitter(&mut self, px: Rgb) -> Rgb {
        if self.lens.noise == 0 {
            return px;
        }
        let n = i16::from(self.lens.noise);
        px.map(|c| (i16::from(c) + self.rng.gen_range(-n..=n)).clamp(0, 255) as u8)
    }
}

/// A screen and a camera pointed at it.
pub fn rig(lens: Lens, seed: u64) -> (Screen, Camera) {
    let (tx, rx) = bounded(0);
    (
        Screen { tx },
        Camera {
            rx,
            lens,
            rng: SmallRng::seed_from_u64(seed),
            seen: 0,
        },
    )
}

/// Pastes `frame` onto a `margin`-padded canvas without noise.
pub fn framed(frame: &Frame, margin: (u32, u32)) -> Frame {
    let (screen, mut camera) = rig(
        Lens {
            margin,
            ..Lens::default()
        },
        0,
    );
    drop(screen);
    camera.photograph(frame)
}
