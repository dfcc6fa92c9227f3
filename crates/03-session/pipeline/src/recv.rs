//! Receive drivers: captured frames to the original file.
//!
//! [`receive`] drains a finite source through a pool of decode workers into a
//! single collector. [`receive_live`] polls a blocking source on the calling
//! thread. Both feed one [`Reassembler`] owned by the collector.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use frame::Frame;
use frame_io::CaptureSource;
use packet::{Mode, Packet};
use reassembly::{Accepted, Progress, Reassembler};
use tracing::{debug, info, trace, warn};
use visual_codec::VisualCodec;

use crate::config::ReceiveConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::stats::{PipelineStats, SharedStats};
use crate::worker::{stopped, CancelToken, WorkerPool, POLL_INTERVAL};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveReport {
    pub output: Vec<u8>,
    pub mode: Mode,
    pub progress: Progress,
    pub stats: PipelineStats,
}

/// Owns the session state and turns decoded L2 bytes into progress.
struct Collector {
    reassembler: Reassembler,
    stats: SharedStats,
}

impl Collector {
    fn new(stats: SharedStats) -> Self {
        Self {
            reassembler: Reassembler::new(),
            stats,
        }
    }

    /// Returns `true` once the file is complete. Truncated packets are
    /// counted and skipped; an unknown mode flag is fatal.
    fn offer(&mut self, l2: &[u8]) -> PipelineResult<bool> {
        let packet = match Packet::decode(l2) {
            Ok(packet) => packet,
            Err(err) if err.is_soft() => {
                debug!(%err, "skipping truncated packet");
                self.stats.with_stats(|s| s.truncated_packets += 1);
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };
        let accepted = self.reassembler.accept(&packet);
        self.stats.with_stats(|s| match &accepted {
            Accepted::Stored | Accepted::Completed => s.stored_packets += 1,
            Accepted::Duplicate | Accepted::AlreadyComplete => s.duplicate_packets += 1,
            Accepted::Rejected(_) => s.rejected_packets += 1,
        });
        if matches!(accepted, Accepted::Stored) {
            let progress = self.reassembler.progress();
            trace!(
                received = progress.received,
                expected = progress.expected,
                "packet stored"
            );
        }
        Ok(self.reassembler.is_complete())
    }

    fn finish(self) -> PipelineResult<ReceiveReport> {
        let progress = self.reassembler.progress();
        let mode = self.reassembler.mode();
        match (mode, self.reassembler.into_output()) {
            (Some(mode), Some(output)) => Ok(ReceiveReport {
                output,
                mode,
                progress,
                stats: self.stats.snapshot(),
            }),
            _ => Err(PipelineError::Incomplete {
                received: progress.received,
                expected: progress.expected,
            }),
        }
    }
}

/// Decodes every frame of `source` with `config.workers` threads until the
/// file completes or the source is exhausted.
pub fn receive<S>(
    source: S,
    codec: Arc<dyn VisualCodec>,
    config: &ReceiveConfig,
    cancel: &CancelToken,
) -> PipelineResult<ReceiveReport>
where
    S: CaptureSource + Send + 'static,
{
    config.validate()?;
    info!(codec = codec.name(), workers = config.workers, "receive started");

    let stats = SharedStats::new();
    let (job_tx, job_rx) = bounded::<Frame>(config.channel_capacity);
    let (l2_tx, l2_rx) = bounded::<Vec<u8>>(config.channel_capacity);

    let mut pool = WorkerPool::new();
    let feeder = Feeder {
        source,
        jobs: job_tx,
        stats: stats.clone(),
        stop: pool.stop_flag(),
    };
    pool.spawn("frame-feeder".into(), move || feeder.run())?;
    for k in 0..config.workers {
        let decoder = DecodeWorker {
            codec: Arc::clone(&codec),
            jobs: job_rx.clone(),
            packets: l2_tx.clone(),
            stats: stats.clone(),
            stop: pool.stop_flag(),
        };
        pool.spawn(format!("frame-decoder-{k}"), move || decoder.run())?;
    }
    drop(job_rx);
    drop(l2_tx);

    let mut collector = Collector::new(stats);
    let collected = collect(&mut collector, &l2_rx, &pool, cancel);
    pool.stop();
    drop(l2_rx);
    let joined = pool.join();

    collected?;
    if collector.reassembler.is_complete() {
        if let Err(err) = joined {
            warn!(%err, "worker failed after the transfer completed");
        }
    } else {
        joined?;
    }
    collector.finish()
}

fn collect(
    collector: &mut Collector,
    packets: &Receiver<Vec<u8>>,
    pool: &WorkerPool,
    cancel: &CancelToken,
) -> PipelineResult<()> {
    loop {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if let Some(reason) = pool.failure() {
            return Err(PipelineError::ProducerFailed(reason));
        }
        match packets.recv_timeout(POLL_INTERVAL) {
            Ok(l2) => {
                if collector.offer(&l2)? {
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

struct Feeder<S> {
    source: S,
    jobs: Sender<Frame>,
    stats: SharedStats,
    stop: Arc<AtomicBool>,
}

impl<S: CaptureSource> Feeder<S> {
    fn run(mut self) -> PipelineResult<()> {
        while !stopped(&self.stop) {
            let Some(frame) = self.source.next_frame()? else {
                debug!("capture source exhausted");
                break;
            };
            self.stats.with_stats(|s| s.frames_captured += 1);
            if self.jobs.send(frame).is_err() {
                break;
            }
        }
        Ok(())
    }
}

struct DecodeWorker {
    codec: Arc<dyn VisualCodec>,
    jobs: Receiver<Frame>,
    packets: Sender<Vec<u8>>,
    stats: SharedStats,
    stop: Arc<AtomicBool>,
}

impl DecodeWorker {
    fn run(self) -> PipelineResult<()> {
        while let Ok(frame) = self.jobs.recv() {
            if stopped(&self.stop) {
                break;
            }
            match self.codec.decode(&frame) {
                Some(l2) => {
                    if self.packets.send(l2).is_err() {
                        break;
                    }
                }
                None => {
                    trace!("frame did not decode");
                    self.stats.with_stats(|s| s.decode_failures += 1);
                }
            }
        }
        Ok(())
    }
}

/// Polls `source` on the calling thread, one frame per poll, sleeping
/// `config.poll_interval` between polls.
///
/// Ends when the file completes, the source is exhausted, `max_polls` is
/// reached or `cancel` fires.
pub fn receive_live(
    source: &mut dyn CaptureSource,
    codec: &dyn VisualCodec,
    config: &ReceiveConfig,
    cancel: &CancelToken,
) -> PipelineResult<ReceiveReport> {
    config.validate()?;
    info!(codec = codec.name(), "live receive started");

    let stats = SharedStats::new();
    let mut collector = Collector::new(stats.clone());
    let mut polls = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        if config.max_polls.is_some_and(|max| polls >= max) {
            info!(polls, "poll budget exhausted");
            break;
        }
        polls += 1;

        let Some(frame) = source.next_frame()? else {
            debug!(polls, "capture source exhausted");
            break;
        };
        stats.with_stats(|s| s.frames_captured += 1);
        match codec.decode(&frame) {
            Some(l2) => {
                if collector.offer(&l2)? {
                    break;
                }
            }
            None => stats.with_stats(|s| s.decode_failures += 1),
        }
        if !config.poll_interval.is_zero() {
            thread::sleep(config.poll_interval);
        }
    }
    collector.finish()
}
