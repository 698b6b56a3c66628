//! Owned camera frames.
//!
//! - `Frame`: RGB24 pixels plus dimensions, capture instant and sequence number.
//!
//! Frames are immutable once published. Consumers receive owned copies (or an
//! `Arc` to an immutable snapshot) and never mutate a buffer another thread can see.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::Instant;

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture time.
    pub captured_at: Instant,
    /// Per-source sequence number, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Wrap an RGB24 buffer. Fails when the length does not match the dimensions.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            captured_at: Instant::now(),
            sequence,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGB value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }

    /// Copy into an `image` buffer for resizing/encoding.
    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }

    pub fn into_image(self) -> Result<RgbImage> {
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.pixels)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", width, height))
    }
}

pub(crate) fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer_length() {
        assert!(Frame::from_rgb(vec![0u8; 10], 2, 2, 1).is_err());
        assert!(Frame::from_rgb(vec![0u8; 12], 2, 2, 1).is_ok());
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() -> Result<()> {
        let mut pixels = vec![0u8; 12];
        pixels[9..12].copy_from_slice(&[1, 2, 3]);
        let frame = Frame::from_rgb(pixels, 2, 2, 1)?;

        assert_eq!(frame.pixel(1, 1), Some([1, 2, 3]));
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.pixel(0, 2), None);
        Ok(())
    }

    #[test]
    fn clones_do_not_share_pixels() -> Result<()> {
        let frame = Frame::from_rgb(vec![7u8; 12], 2, 2, 1)?;
        let copy = frame.clone();
        drop(frame);
        assert_eq!(copy.pixels(), &[7u8; 12]);
        Ok(())
    }
}
