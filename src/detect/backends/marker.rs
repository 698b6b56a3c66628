use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectionInput, Perception};
use crate::detect::result::{PerceptionOutput, Region};

pub const MARKER_DETECTION_SIZE: (u32, u32) = (160, 120);

/// Finds the bounding box of pixels close to a solid marker colour.
///
/// Pairs with the synthetic camera for model-free runs and tests.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    color: [u8; 3],
    tolerance: u8,
    min_pixels: usize,
}

impl MarkerDetector {
    pub fn new(color: [u8; 3]) -> Self {
        Self {
            color,
            tolerance: 40,
            min_pixels: 4,
        }
    }

    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn matches(&self, pixel: &[u8]) -> bool {
        pixel
            .iter()
            .zip(self.color.iter())
            .all(|(&p, &c)| p.abs_diff(c) <= self.tolerance)
    }
}

impl Perception for MarkerDetector {
    type Raw = Option<Region>;

    fn name(&self) -> &'static str {
        "marker"
    }

    fn detection_size(&self) -> (u32, u32) {
        MARKER_DETECTION_SIZE
    }

    fn infer(&mut self, input: &DetectionInput) -> Result<Option<Region>> {
        let DetectionInput::Rgb(image) = input else {
            return Err(anyhow!("marker detector needs RGB input"));
        };

        let mut count = 0usize;
        let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);
        for (x, y, pixel) in image.enumerate_pixels() {
            if self.matches(&pixel.0) {
                count += 1;
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
        }
        if count < self.min_pixels {
            return Ok(None);
        }

        let (w, h) = (x1 - x0 + 1, y1 - y0 + 1);
        Ok(Some(
            Region::new(x0 as f32, y0 as f32, w as f32, h as f32)
                .with_score(count as f32 / (w * h) as f32),
        ))
    }

    fn post_process(&mut self, raw: Option<Region>) -> PerceptionOutput {
        PerceptionOutput::regions(raw.into_iter().collect())
    }
}
