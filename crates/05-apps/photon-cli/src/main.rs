//! `photon`: move a file through a screen and a camera.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use frame_io::{
    CaptureSource, CroppedSource, DirectorySink, DirectorySource, FrameSink, Region, VideoSink,
};
use packet::Mode;
use pipeline::{
    default_workers, CancelToken, CodecConfig, CodecMethod, ConfigError, GridConfig, QrConfig,
    ReceiveConfig, ReceiveReport, SendConfig, DEFAULT_CHANNEL_CAPACITY,
};
use sha2::{Digest, Sha256};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Text rendering for command reports.
mod render {
    use pipeline::{ReceiveReport, SendReport};

    fn expected(n: Option<usize>) -> String {
        n.map_or_else(|| "?".to_string(), |n| n.to_string())
    }

    fn unit(mode: packet::Mode) -> &'static str {
        match mode {
            packet::Mode::Sequential => "chunks",
            packet::Mode::Fountain => "symbols",
        }
    }

    /// Summary printed after `photon send`.
    pub fn send_summary(report: &SendReport, codec: &str, digest: &str) -> String {
        format!(
            "mode:          {mode}\n\
             codec:         {codec}\n\
             file size:     {size} bytes\n\
             payload/frame: {payload} bytes\n\
             {unit}:{pad}{chunks}\n\
             frames:        {frames}\n\
             sha256:        {digest}\n",
            mode = report.mode.as_str(),
            size = report.file_size,
            payload = report.payload_size,
            unit = unit(report.mode),
            pad = " ".repeat(14 - unit(report.mode).len()),
            chunks = report.chunks,
            frames = report.frames,
        )
    }

    /// Summary printed after `photon recv`.
    pub fn receive_summary(report: &ReceiveReport, digest: &str) -> String {
        let stats = &report.stats;
        format!(
            "mode:          {mode}\n\
             file size:     {size} bytes\n\
             received:      {received} of {expected} {unit}\n\
             frames:        {captured} captured, {failed} undecodable\n\
             packets:       {stored} stored, {dup} duplicate, {rejected} rejected, {truncated} truncated\n\
             sha256:        {digest}\n",
            mode = report.mode.as_str(),
            size = report.output.len(),
            received = report.progress.received,
            expected = expected(report.progress.expected),
            unit = unit(report.mode),
            captured = stats.frames_captured,
            failed = stats.decode_failures,
            stored = stats.stored_packets,
            dup = stats.duplicate_packets,
            rejected = stats.rejected_packets,
            truncated = stats.truncated_packets,
        )
    }
}

/// Send files through a screen and receive them through a camera.
#[derive(Parser, Debug)]
#[command(author, version, about = "Optical file transfer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a file into code frames.
    Send(SendArgs),
    /// Rebuild a file from captured frames.
    Recv(RecvArgs),
}

#[derive(Args, Debug, Clone)]
struct CodecArgs {
    /// Visual code: `qr` or `grid`.
    #[arg(short, long, default_value_t = CodecMethod::Qr)]
    method: CodecMethod,
    /// Code version; sets the grid or QR side (defaults to 40).
    #[arg(long = "code-version", value_name = "N")]
    version: Option<u32>,
    /// Pixels per cell or module.
    #[arg(short, long, default_value_t = 2)]
    box_size: u32,
    /// Quiet border in cells (defaults to 1 for grid, 4 for QR).
    #[arg(long)]
    border: Option<u32>,
    /// Grid cell packing, 8 or 16 bits.
    #[arg(long, default_value_t = 8)]
    bits: u32,
    /// Detect the grid box size from each captured frame.
    #[arg(long)]
    auto_detect: bool,
}

impl CodecArgs {
    fn codec_config(&self) -> CodecConfig {
        let grid_defaults = GridConfig::default();
        let qr_defaults = QrConfig::default();
        // out-of-range versions are reported by validation
        let qr_version = self
            .version
            .map_or(qr_defaults.version, |v| u8::try_from(v).unwrap_or(u8::MAX));
        CodecConfig {
            method: self.method,
            grid: GridConfig {
                version: self.version.unwrap_or(grid_defaults.version),
                box_size: self.box_size,
                border: self.border.unwrap_or(grid_defaults.border),
                bits: self.bits,
                auto_detect: self.auto_detect,
            },
            qr: QrConfig {
                version: qr_version,
                box_size: self.box_size,
                border: self.border.unwrap_or(qr_defaults.border),
            },
        }
    }
}

#[derive(Args, Debug)]
struct SendArgs {
    /// File to send.
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Directory receiving `img_{n}.png` frames.
    #[arg(short, long, default_value = "frames")]
    out_dir: PathBuf,
    /// Also mux the frames into this video with ffmpeg.
    #[arg(long, value_name = "PATH")]
    video: Option<PathBuf>,
    /// Video frame rate.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Emit rateless fountain frames instead of one frame per chunk.
    #[arg(long)]
    fountain: bool,
    /// Frames to emit in fountain mode.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Encoder threads; 0 picks one per spare core.
    #[arg(short, long, default_value_t = 0)]
    workers: usize,
    #[command(flatten)]
    codec: CodecArgs,
}

#[derive(Args, Debug)]
struct RecvArgs {
    /// Directory of captured PNG frames.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Where to write the rebuilt file.
    #[arg(short, long)]
    output: PathBuf,
    /// Capture region `width:height:left:top`, e.g. `f:f:c:c` or `800:600:-10:0`.
    #[arg(long)]
    region: Option<Region>,
    /// Poll frames one at a time on a single thread.
    #[arg(long)]
    live: bool,
    /// Pause between live polls, in milliseconds.
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,
    /// Give up a live receive after this many polls.
    #[arg(long)]
    max_polls: Option<u64>,
    /// Decoder threads; 0 picks one per spare core.
    #[arg(short, long, default_value_t = 0)]
    workers: usize,
    #[command(flatten)]
    codec: CodecArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cancel = CancelToken::new();
    match cli.command {
        Command::Send(args) => handle_send(&args, &cancel),
        Command::Recv(args) => handle_recv(&args, &cancel),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn workers_or_default(workers: usize) -> usize {
    if workers == 0 {
        default_workers()
    } else {
        workers
    }
}

fn handle_send(args: &SendArgs, cancel: &CancelToken) -> Result<()> {
    let data = fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let digest = sha256_hex(&data);
    info!(file = %args.file.display(), sha256 = %digest, "input digest");

    let codec = args
        .codec
        .codec_config()
        .build()
        .context("invalid codec options")?;
    let codec_name = codec.name();
    let config = SendConfig {
        mode: if args.fountain {
            Mode::Fountain
        } else {
            Mode::Sequential
        },
        workers: workers_or_default(args.workers),
        channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        max_frames: args.max_frames,
    };
    config.validate().context("invalid send options")?;

    let mut sink: Box<dyn FrameSink> = match &args.video {
        Some(video) => Box::new(
            VideoSink::new(&args.out_dir, video, args.fps)
                .with_context(|| format!("failed to prepare {}", args.out_dir.display()))?,
        ),
        None => Box::new(
            DirectorySink::create(&args.out_dir)
                .with_context(|| format!("failed to prepare {}", args.out_dir.display()))?,
        ),
    };
    let report =
        pipeline::send(&data, codec, sink.as_mut(), &config, cancel).context("send failed")?;
    print!("{}", render::send_summary(&report, codec_name, &digest));
    Ok(())
}

fn handle_recv(args: &RecvArgs, cancel: &CancelToken) -> Result<()> {
    let input = args
        .input
        .as_deref()
        .ok_or(ConfigError::MissingInput("capture directory (--input)"))?;
    let codec_config = args.codec.codec_config();
    codec_config.validate().context("invalid codec options")?;
    let config = ReceiveConfig {
        workers: workers_or_default(args.workers),
        poll_interval: std::time::Duration::from_millis(args.poll_ms),
        max_polls: args.max_polls,
        ..ReceiveConfig::default()
    };
    config.validate().context("invalid receive options")?;

    let source = DirectorySource::open(input)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let report = match args.region {
        Some(region) => {
            let fit = codec_config.frame_side().context("invalid codec options")?;
            info!(%region, fit, "cropping captured frames");
            run_receive(
                CroppedSource::new(source, region, fit),
                &codec_config,
                &config,
                args.live,
                cancel,
            )?
        }
        None => run_receive(source, &codec_config, &config, args.live, cancel)?,
    };

    write_output(&args.output, &report.output)?;
    let digest = sha256_hex(&report.output);
    info!(file = %args.output.display(), sha256 = %digest, "output digest");
    print!("{}", render::receive_summary(&report, &digest));
    Ok(())
}

fn run_receive<S>(
    mut source: S,
    codec_config: &CodecConfig,
    config: &ReceiveConfig,
    live: bool,
    cancel: &CancelToken,
) -> Result<ReceiveReport>
where
    S: CaptureSource + Send + 'static,
{
    let codec = codec_config.build().context("invalid codec options")?;
    let report = if live {
        pipeline::receive_live(&mut source, codec.as_ref(), config, cancel)
    } else {
        pipeline::receive(source, codec, config, cancel)
    };
    report.context("receive failed")
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
