use anyhow::Result;
use image::{GrayImage, RgbImage};

use crate::detect::result::{PerceptionOutput, ScaleFactor};

/// Model input after resizing and variant-specific preprocessing.
#[derive(Clone, Debug)]
pub enum DetectionInput {
    Rgb(RgbImage),
    Gray(GrayImage),
}

impl DetectionInput {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DetectionInput::Rgb(image) => image.dimensions(),
            DetectionInput::Gray(image) => image.dimensions(),
        }
    }
}

/// A perception capability driven by `PerceptionWorker`.
///
/// The worker owns the cycle (frame fetch, resize, fault isolation, scaling,
/// publication, pacing). Implementations only decide the detection-frame size,
/// the preprocessing, the inference call and how raw output maps to regions.
///
/// Everything returned from `post_process` is in detection-frame pixels.
pub trait Perception: Send + 'static {
    /// Model-specific raw output.
    type Raw;

    fn name(&self) -> &'static str;

    /// Fixed resolution inference runs at.
    fn detection_size(&self) -> (u32, u32);

    /// Detection-to-camera scale, given once by the worker before the first cycle.
    fn bind_scale(&mut self, _scale: ScaleFactor) {}

    /// Convert the resized RGB frame into the model's input form.
    fn preprocess(&self, resized: RgbImage) -> DetectionInput {
        DetectionInput::Rgb(resized)
    }

    /// Run the model. An error here costs one cycle, nothing more.
    fn infer(&mut self, input: &DetectionInput) -> Result<Self::Raw>;

    fn post_process(&mut self, raw: Self::Raw) -> PerceptionOutput;
}
