use image::{DynamicImage, RgbImage, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
  #[error("no image bytes")]
  Empty,
  #[error("undecodable image: {0}")]
  Image(#[from] image::ImageError),
}

/// CPU-side pixels waiting for upload. `channels` is 3 (RGB) or 4 (RGBA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
  pub pixels: Vec<u8>,
  pub width: u32,
  pub height: u32,
  pub channels: u8,
}

impl DecodedImage {
  pub fn has_alpha(&self) -> bool {
    self.channels == 4
  }

  /// Rebuild an `image` buffer for backends that draw from CPU memory.
  pub fn to_dynamic(&self) -> Option<DynamicImage> {
    if self.has_alpha() {
      RgbaImage::from_raw(self.width, self.height, self.pixels.clone()).map(DynamicImage::ImageRgba8)
    } else {
      RgbImage::from_raw(self.width, self.height, self.pixels.clone()).map(DynamicImage::ImageRgb8)
    }
  }
}

/// Turns downloaded bytes into a pixel buffer. Called off the UI thread.
pub trait ImageDecoder: Send + Sync + 'static {
  fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;
}

/// Decodes any raster format the `image` crate knows, keeping alpha only when present.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterDecoder;

impl ImageDecoder for RasterDecoder {
  fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
      return Err(DecodeError::Empty);
    }
    let image = image::load_from_memory(bytes)?;
    let (width, height) = (image.width(), image.height());
    if image.color().has_alpha() {
      Ok(DecodedImage { pixels: image.into_rgba8().into_raw(), width, height, channels: 4 })
    } else {
      Ok(DecodedImage { pixels: image.into_rgb8().into_raw(), width, height, channels: 3 })
    }
  }
}
