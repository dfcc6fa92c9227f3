#![cfg(all(test, not(target_arch = "wasm32")))]

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use frame_io::{CroppedSource, DirectorySink, DirectorySource, Region};
use packet::Mode;
use parking_lot::Mutex;
use pipeline::{
    receive, receive_live, send, CancelToken, CodecConfig, CodecMethod, GridConfig,
    PipelineError, QrConfig, ReceiveConfig, SendConfig,
};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::camera::{rig, Lens};

fn payload(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    SmallRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

fn qr_config() -> CodecConfig {
    CodecConfig {
        method: CodecMethod::Qr,
        qr: QrConfig {
            version: 10,
            box_size: 3,
            border: 4,
        },
        ..CodecConfig::default()
    }
}

fn grid_config(version: u32, bits: u32) -> CodecConfig {
    CodecConfig {
        method: CodecMethod::Grid,
        grid: GridConfig {
            version,
            box_size: 3,
            border: 1,
            bits,
            auto_detect: false,
        },
        ..CodecConfig::default()
    }
}

fn receive_config(poll_interval: Duration) -> ReceiveConfig {
    ReceiveConfig {
        workers: 2,
        channel_capacity: 16,
        poll_interval,
        max_polls: None,
    }
}

#[test]
fn qr_file_round_trips_through_image_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = payload(3_000, 11);
    let codec_config = qr_config();

    let mut sink = DirectorySink::create(dir.path().join("frames")).expect("sink");
    let report = send(
        &data,
        codec_config.build().expect("codec"),
        &mut sink,
        &SendConfig {
            mode: Mode::Sequential,
            workers: 2,
            channel_capacity: 4,
            max_frames: None,
        },
        &CancelToken::new(),
    )
    .expect("send");
    assert_eq!(sink.written() as u64, report.frames);
    assert!(report.frames > 1);

    let source = DirectorySource::open(&dir.path().join("frames")).expect("source");
    let received = receive(
        source,
        codec_config.build().expect("codec"),
        &receive_config(Duration::ZERO),
        &CancelToken::new(),
    )
    .expect("receive");
    assert_eq!(received.output, data);
    assert_eq!(received.stats.decode_failures, 0);
}

#[test]
fn fountain_over_lossy_noisy_camera() {
    let data = payload(40_000, 12);
    let codec_config = grid_config(8, 8);
    let fit = codec_config.frame_side().expect("side");
    let (mut screen, camera) = rig(
        Lens {
            margin: (40, 25),
            noise: 12,
            miss_every: 3,
        },
        13,
    );

    let cancel = CancelToken::new();
    let rx_cancel = cancel.clone();
    let rx_codec = codec_config.build().expect("codec");
    let receiver = thread::spawn(move || {
        let mut camera = CroppedSource::new(camera, Region::default(), fit);
        let report = receive_live(
            &mut camera,
            rx_codec.as_ref(),
            &receive_config(Duration::ZERO),
            &CancelToken::new(),
        );
        // stop looking at the screen, then tell the sender
        drop(camera);
        rx_cancel.cancel();
        report
    });

    let sent = send(
        &data,
        codec_config.build().expect("codec"),
        &mut screen,
        &SendConfig {
            mode: Mode::Fountain,
            workers: 3,
            channel_capacity: 8,
            max_frames: Some(10_000),
        },
        &cancel,
    )
    .expect("send");
    drop(screen);

    let received = receiver.join().expect("receiver thread").expect("receive");
    assert_eq!(received.mode, Mode::Fountain);
    assert_eq!(received.output, data);
    assert!(
        sent.frames < 10_000,
        "sender should stop once the receiver completes, sent {}",
        sent.frames
    );
    assert!(received.stats.frames_captured < sent.frames);
}

#[test]
fn sixteen_bit_grid_through_offset_region() {
    let data = payload(12_000, 14);
    let codec_config = grid_config(6, 16);
    let side = codec_config.frame_side().expect("side");
    let (mut screen, camera) = rig(
        Lens {
            margin: (17, 9),
            ..Lens::default()
        },
        15,
    );

    let region: Region = format!("{side}:{side}:17:9").parse().expect("region");
    let rx_codec = codec_config.build().expect("codec");
    let receiver = thread::spawn(move || {
        receive(
            CroppedSource::new(camera, region, side),
            rx_codec,
            &receive_config(Duration::ZERO),
            &CancelToken::new(),
        )
    });

    let sent = send(
        &data,
        codec_config.build().expect("codec"),
        &mut screen,
        &SendConfig {
            mode: Mode::Sequential,
            workers: 2,
            channel_capacity: 4,
            max_frames: None,
        },
        &CancelToken::new(),
    )
    .expect("send");
    // lets the camera see the end of the broadcast
    drop(screen);

    let received = receiver.join().expect("receiver thread").expect("receive");
    assert_eq!(received.output, data);
    assert_eq!(received.progress.received, sent.chunks);
}

#[test]
fn screen_going_dark_leaves_transfer_incomplete() {
    let data = payload(9_000, 16);
    let codec_config = grid_config(4, 8);
    let (screen, camera) = rig(Lens::default(), 17);
    let shown = Arc::new(Mutex::new(0u64));

    let rx_codec = codec_config.build().expect("codec");
    let receiver = thread::spawn(move || {
        receive(
            camera,
            rx_codec,
            &receive_config(Duration::ZERO),
            &CancelToken::new(),
        )
    });

    // the screen dies after two frames
    struct FlakyScreen {
        inner: crate::camera::Screen,
        shown: Arc<Mutex<u64>>,
    }
    impl frame_io::FrameSink for FlakyScreen {
        fn push(&mut self, frame: &frame::Frame) -> frame_io::IoResult<()> {
            let mut shown = self.shown.lock();
            if *shown >= 2 {
                return Err(frame_io::IoError::Io {
                    path: "display".into(),
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "display lost"),
                });
            }
            *shown += 1;
            self.inner.push(frame)
        }

        fn finish(&mut self) -> frame_io::IoResult<()> {
            self.inner.finish()
        }
    }

    let mut sink = FlakyScreen {
        inner: screen,
        shown: Arc::clone(&shown),
    };
    let err = send(
        &data,
        codec_config.build().expect("codec"),
        &mut sink,
        &SendConfig {
            mode: Mode::Sequential,
            workers: 2,
            channel_capacity: 4,
            max_frames: None,
        },
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(
        &err,
        PipelineError::Io(frame_io::IoError::Io { source, .. })
            if source.kind() == io::ErrorKind::BrokenPipe
    ));
    drop(sink);

    let err = receiver.join().expect("receiver thread").unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Incomplete {
            received: 2,
            expected: Some(_)
        }
    ));
    assert_eq!(*shown.lock(), 2);
}
