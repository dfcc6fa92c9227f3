//! Send driver: file bytes to rendered frames.
//!
//! Workers build packets and encode frames in parallel; the calling thread
//! is the single consumer that pushes frames into the sink. Frames reach the
//! sink in completion order, not packet order; receivers do not depend on
//! ordering.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use fountain::FountainEncoder;
use frame::Frame;
use frame_io::FrameSink;
use packet::{chunk_count, make_fountain, make_sequential, wrap_l2, Mode};
use tracing::{debug, info, warn};
use visual_codec::VisualCodec;

use crate::config::{frame_payload_size, SendConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::stats::{PipelineStats, SharedStats};
use crate::worker::{stopped, CancelToken, WorkerPool, POLL_INTERVAL};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendReport {
    pub mode: Mode,
    /// Frames pushed into the sink.
    pub frames: u64,
    /// Sequential chunks, or fountain source symbols.
    pub chunks: usize,
    /// L3 payload bytes per frame.
    pub payload_size: usize,
    pub file_size: usize,
    pub stats: PipelineStats,
}

/// Renders `data` into `sink` and finishes the sink.
///
/// Sequential mode emits exactly one frame per chunk. Fountain mode emits
/// `max_frames` frames, or fewer when `cancel` fires first.
pub fn send(
    data: &[u8],
    codec: Arc<dyn VisualCodec>,
    sink: &mut dyn FrameSink,
    config: &SendConfig,
    cancel: &CancelToken,
) -> PipelineResult<SendReport> {
    config.validate()?;
    let payload_size = frame_payload_size(codec.as_ref())?;

    let mode = if config.mode == Mode::Fountain && data.is_empty() {
        warn!("empty input cannot be fountain coded, sending one sequential chunk");
        Mode::Sequential
    } else {
        config.mode
    };
    info!(
        mode = mode.as_str(),
        codec = codec.name(),
        file_size = data.len(),
        payload_size,
        workers = config.workers,
        "send started"
    );

    let stats = SharedStats::new();
    let data: Arc<[u8]> = Arc::from(data);
    let (frames, chunks) = match mode {
        Mode::Sequential => {
            send_sequential(&data, codec, sink, config, cancel, payload_size, &stats)?
        }
        Mode::Fountain => send_fountain(&data, codec, sink, config, cancel, payload_size, &stats)?,
    };
    sink.finish()?;

    let report = SendReport {
        mode,
        frames,
        chunks,
        payload_size,
        file_size: data.len(),
        stats: stats.snapshot(),
    };
    info!(frames, chunks, "send finished");
    Ok(report)
}

fn send_sequential(
    data: &Arc<[u8]>,
    codec: Arc<dyn VisualCodec>,
    sink: &mut dyn FrameSink,
    config: &SendConfig,
    cancel: &CancelToken,
    payload_size: usize,
    stats: &SharedStats,
) -> PipelineResult<(u64, usize)> {
    let chunks = chunk_count(data.len(), payload_size);
    let total = u32::try_from(chunks).map_err(|_| PipelineError::FileTooLarge {
        size: data.len() as u64,
    })?;

    let (job_tx, job_rx) = unbounded::<u32>();
    for index in 0..total {
        if job_tx.send(index).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (frame_tx, frame_rx) = bounded::<Frame>(config.channel_capacity);
    let mut pool = WorkerPool::new();
    for k in 0..config.workers {
        let worker = ChunkWorker {
            data: Arc::clone(data),
            codec: Arc::clone(&codec),
            jobs: job_rx.clone(),
            frames: frame_tx.clone(),
            stats: stats.clone(),
            payload_size,
            total,
        };
        pool.spawn(format!("chunk-encoder-{k}"), move || worker.run())?;
    }
    drop(frame_tx);
    drop(job_rx);

    let emitted = drain(&frame_rx, sink, &pool, cancel, chunks as u64, stats);
    drop(frame_rx);
    pool.stop();
    let joined = pool.join();

    let emitted = emitted?;
    if emitted < chunks as u64 {
        joined?;
        return Err(PipelineError::producer(format!(
            "encoders exited after {emitted} of {chunks} frames"
        )));
    }
    joined?;
    Ok((emitted, chunks))
}

struct ChunkWorker {
    data: Arc<[u8]>,
    codec: Arc<dyn VisualCodec>,
    jobs: Receiver<u32>,
    frames: Sender<Frame>,
    stats: SharedStats,
    payload_size: usize,
    total: u32,
}

impl ChunkWorker {
    fn run(self) -> PipelineResult<()> {
        while let Ok(index) = self.jobs.recv() {
            let start = index as usize * self.payload_size;
            let end = (start + self.payload_size).min(self.data.len());
            let chunk = &self.data[start.min(end)..end];
            let l2 = wrap_l2(Mode::Sequential, &make_sequential(index, self.total, chunk));
            let frame = self.codec.encode(&l2)?;
            self.stats.with_stats(|s| s.frames_encoded += 1);
            debug!(index, "chunk encoded");
            if self.frames.send(frame).is_err() {
                break;
            }
        }
        Ok(())
    }
}

fn send_fountain(
    data: &Arc<[u8]>,
    codec: Arc<dyn VisualCodec>,
    sink: &mut dyn FrameSink,
    config: &SendConfig,
    cancel: &CancelToken,
    payload_size: usize,
    stats: &SharedStats,
) -> PipelineResult<(u64, usize)> {
    let encoder = FountainEncoder::new(data, payload_size)?.shared();
    let source_symbols = encoder.params().source_symbols() as usize;
    let budget = config.max_frames.unwrap_or(u64::MAX);

    let (frame_tx, frame_rx) = bounded::<Frame>(config.channel_capacity);
    let mut pool = WorkerPool::new();
    let stride = config.workers as u32;
    for k in 0..config.workers {
        let producer = SymbolProducer {
            encoder: Arc::clone(&encoder),
            codec: Arc::clone(&codec),
            frames: frame_tx.clone(),
            stats: stats.clone(),
            stop: pool.stop_flag(),
            first_id: k as u32,
            stride,
        };
        pool.spawn(format!("fountain-producer-{k}"), move || producer.run())?;
    }
    drop(frame_tx);

    let emitted = drain(&frame_rx, sink, &pool, cancel, budget, stats);
    pool.stop();
    // unblocks producers parked on a full channel
    drop(frame_rx);
    let joined = pool.join();

    match emitted {
        Ok(frames) => {
            if frames < budget && !cancel.is_cancelled() {
                joined?;
                return Err(PipelineError::producer(format!(
                    "producers exited after {frames} frames"
                )));
            }
            Ok((frames, source_symbols))
        }
        Err(PipelineError::Cancelled) => {
            let frames = stats.snapshot().frames_emitted;
            info!(frames, "fountain send cancelled");
            Ok((frames, source_symbols))
        }
        Err(err) => Err(err),
    }
}

struct SymbolProducer {
    encoder: Arc<FountainEncoder>,
    codec: Arc<dyn VisualCodec>,
    frames: Sender<Frame>,
    stats: SharedStats,
    stop: Arc<AtomicBool>,
    first_id: u32,
    stride: u32,
}

impl SymbolProducer {
    fn run(self) -> PipelineResult<()> {
        let total = self.encoder.params().total_size();
        let mut id = Some(self.first_id);
        while let Some(symbol_id) = id {
            if stopped(&self.stop) {
                break;
            }
            let payload = self.encoder.encode(symbol_id);
            let l2 = wrap_l2(Mode::Fountain, &make_fountain(symbol_id, total, &payload));
            let frame = self.codec.encode(&l2)?;
            self.stats.with_stats(|s| s.frames_encoded += 1);
            // blocks while the channel is full
            if self.frames.send(frame).is_err() {
                break;
            }
            id = symbol_id.checked_add(self.stride);
        }
        debug!(first_id = self.first_id, "fountain producer stopped");
        Ok(())
    }
}

/// Moves frames from the channel into the sink until `budget` frames were
/// pushed or every producer has gone. Returns the number pushed.
fn drain(
    frames: &Receiver<Frame>,
    sink: &mut dyn FrameSink,
    pool: &WorkerPool,
    cancel: &CancelToken,
    budget: u64,
    stats: &SharedStats,
) -> PipelineResult<u64> {
    let mut emitted = 0u64;
    while emitted < budget {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if let Some(reason) = pool.failure() {
            return Err(PipelineError::ProducerFailed(reason));
        }
        match frames.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => {
                sink.push(&frame)?;
                emitted += 1;
                stats.with_stats(|s| s.frames_emitted += 1);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(emitted)
}
