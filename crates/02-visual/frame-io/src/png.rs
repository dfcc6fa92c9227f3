use std::path::Path;

use frame::Frame;
use image::RgbImage;

use crate::error::{IoError, IoResult};

/// Loads an image file as an RGB frame. Alpha and palette images are
/// flattened to RGB.
pub fn load_png(path: &Path) -> IoResult<Frame> {
    let img = image::open(path)
        .map_err(|err| IoError::image(path, err))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Frame::from_raw(width, height, img.into_raw()).ok_or(IoError::BufferSize { width, height })
}

pub fn save_png(frame: &Frame, path: &Path) -> IoResult<()> {
    let (width, height) = (frame.width(), frame.height());
    let img = RgbImage::from_raw(width, height, frame.as_raw().to_vec())
        .ok_or(IoError::BufferSize { width, height })?;
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|err| IoError::image(path, err))
}
