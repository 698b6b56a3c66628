use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Downscale to the detection-frame size. No-op when already there.
pub fn resize(image: RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image;
    }
    imageops::resize(&image, width, height, FilterType::Triangle)
}

/// Grayscale followed by histogram equalisation, as classical cascades expect.
pub fn grayscale_equalized(image: &RgbImage) -> GrayImage {
    let mut gray = imageops::grayscale(image);
    equalize_histogram(&mut gray);
    gray
}

/// Spread the intensity histogram over the full 0..=255 range in place.
///
/// Flat images are left untouched.
pub fn equalize_histogram(image: &mut GrayImage) {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (i, count) in histogram.iter().enumerate() {
        running += count;
        cdf[i] = running;
    }
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == 0 || total == cdf_min {
        return;
    }

    let denom = (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let scaled = (cdf[i].saturating_sub(cdf_min)) as f64 * 255.0 / denom;
        *entry = scaled.round().clamp(0.0, 255.0) as u8;
    }
    for pixel in image.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
}
