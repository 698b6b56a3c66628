use anyhow::Result;
use image::{GrayImage, RgbImage};
use std::collections::VecDeque;

use crate::detect::backend::{DetectionInput, Perception};
use crate::detect::preprocess;
use crate::detect::result::{PerceptionOutput, Region};

/// Detection-frame size for classical detectors.
pub const CASCADE_DETECTION_SIZE: (u32, u32) = (320, 200);

/// Multi-scale window search parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    pub max_size: (u32, u32),
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
            min_size: (10, 10),
            max_size: (100, 100),
        }
    }
}

impl CascadeParams {
    pub fn accepts(&self, w: u32, h: u32) -> bool {
        w >= self.min_size.0 && h >= self.min_size.1 && w <= self.max_size.0 && h <= self.max_size.1
    }
}

/// Classifier run on an equalised grayscale image.
pub trait CascadeModel: Send {
    fn detect_multi_scale(&mut self, image: &GrayImage, params: &CascadeParams)
        -> Result<Vec<Region>>;
}

/// Classical detector: grayscale + histogram equalisation, then a `CascadeModel`.
pub struct CascadeDetector {
    model: Box<dyn CascadeModel>,
    params: CascadeParams,
}

impl CascadeDetector {
    pub fn new(model: Box<dyn CascadeModel>, params: CascadeParams) -> Self {
        Self { model, params }
    }
}

impl Perception for CascadeDetector {
    type Raw = Vec<Region>;

    fn name(&self) -> &'static str {
        "cascade"
    }

    fn detection_size(&self) -> (u32, u32) {
        CASCADE_DETECTION_SIZE
    }

    fn preprocess(&self, resized: RgbImage) -> DetectionInput {
        DetectionInput::Gray(preprocess::grayscale_equalized(&resized))
    }

    fn infer(&mut self, input: &DetectionInput) -> Result<Vec<Region>> {
        match input {
            DetectionInput::Gray(gray) => self.model.detect_multi_scale(gray, &self.params),
            DetectionInput::Rgb(rgb) => {
                let gray = preprocess::grayscale_equalized(rgb);
                self.model.detect_multi_scale(&gray, &self.params)
            }
        }
    }

    fn post_process(&mut self, raw: Vec<Region>) -> PerceptionOutput {
        PerceptionOutput::regions(raw)
    }
}

/// Built-in model: groups bright pixels of the equalised image into regions.
///
/// Only the size bounds of `CascadeParams` apply; `scale_factor` and
/// `min_neighbors` are meaningful to window-scanning classifiers only.
#[derive(Clone, Debug)]
pub struct ContrastBlobModel {
    pub threshold: u8,
    pub min_pixels: usize,
}

impl Default for ContrastBlobModel {
    fn default() -> Self {
        Self {
            threshold: 230,
            min_pixels: 16,
        }
    }
}

impl CascadeModel for ContrastBlobModel {
    fn detect_multi_scale(
        &mut self,
        image: &GrayImage,
        params: &CascadeParams,
    ) -> Result<Vec<Region>> {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut seen = vec![false; w * h];
        let mut found = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..w * h {
            if seen[start] || image.as_raw()[start] < self.threshold {
                continue;
            }
            seen[start] = true;
            queue.push_back(start);
            let (mut x0, mut y0, mut x1, mut y1) = (w, h, 0usize, 0usize);
            let mut pixels = 0usize;

            while let Some(idx) = queue.pop_front() {
                let (x, y) = (idx % w, idx / w);
                pixels += 1;
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);

                let mut visit = |nx: usize, ny: usize| {
                    let n = ny * w + nx;
                    if !seen[n] && image.as_raw()[n] >= self.threshold {
                        seen[n] = true;
                        queue.push_back(n);
                    }
                };
                if x > 0 {
                    visit(x - 1, y);
                }
                if x + 1 < w {
                    visit(x + 1, y);
                }
                if y > 0 {
                    visit(x, y - 1);
                }
                if y + 1 < h {
                    visit(x, y + 1);
                }
            }

            let (bw, bh) = ((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
            if pixels >= self.min_pixels && params.accepts(bw, bh) {
                found.push(
                    Region::new(x0 as f32, y0 as f32, bw as f32, bh as f32)
                        .with_score(pixels as f32 / (bw * bh) as f32),
                );
            }
        }

        // Largest first, so the primary target is the most prominent region.
        found.sort_by(|a, b| b.area().total_cmp(&a.area()));
        Ok(found)
    }
}
