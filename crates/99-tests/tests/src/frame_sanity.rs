#![cfg(all(test, not(target_arch = "wasm32")))]

use frame::{approx_eq, WHITE};
use frame_io::Region;
use pipeline::{CodecConfig, CodecMethod, GridConfig, QrConfig};

use crate::camera::framed;

fn configs() -> [CodecConfig; 2] {
    [
        CodecConfig {
            method: CodecMethod::Grid,
            grid: GridConfig {
                version: 2,
                box_size: 4,
                ..GridConfig::default()
            },
            ..CodecConfig::default()
        },
        CodecConfig {
            method: CodecMethod::Qr,
            qr: QrConfig {
                version: 5,
                box_size: 4,
                border: 4,
            },
            ..CodecConfig::default()
        },
    ]
}

#[test]
fn frames_are_square_with_configured_side() {
    for config in configs() {
        let codec = config.build().expect("codec");
        let frame = codec.encode(b"sanity").expect("encode");
        let side = config.frame_side().expect("side");
        assert_eq!((frame.width(), frame.height()), (side, side), "{}", codec.name());
        // both codes keep a white quiet zone in the corner
        assert!(approx_eq(frame.pixel(0, 0), WHITE, 0), "{}", codec.name());
    }
}

#[test]
fn centred_region_recovers_the_shown_frame() {
    for config in configs() {
        let codec = config.build().expect("codec");
        let shown = codec.encode(b"region crop").expect("encode");
        let captured = framed(&shown, (31, 12));

        let rect = Region::default()
            .resolve(captured.width(), captured.height(), config.frame_side().expect("side"))
            .expect("resolve");
        let cropped = captured
            .crop(rect.x, rect.y, rect.width, rect.height)
            .expect("crop");
        assert_eq!(cropped, shown);
        assert_eq!(codec.decode(&cropped).as_deref(), Some(&b"region crop"[..]));
    }
}

#[test]
fn qr_decodes_without_cropping() {
    let config = &configs()[1];
    let codec = config.build().expect("codec");
    let shown = codec.encode(b"anywhere in view").expect("encode");
    let captured = framed(&shown, (60, 20));
    assert_eq!(
        codec.decode(&captured).as_deref(),
        Some(&b"anywhere in view"[..])
    );
}

#[test]
fn grid_rejects_uncropped_capture() {
    let config = &configs()[0];
    let codec = config.build().expect("codec");
    let shown = codec.encode(b"needs a crop").expect("encode");
    let captured = framed(&shown, (8, 8));
    assert_eq!(codec.decode(&captured), None);
}
