pub mod cascade;
pub mod marker;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::config::{DetectorSettings, GestureSettings};
use crate::detect::backend::{DetectionInput, Perception};
use crate::detect::gesture::BoxedGestureRecognizer;
use crate::detect::result::{PerceptionOutput, Region};
use crate::detect::DetectorKind;

pub use cascade::{CascadeDetector, CascadeModel, CascadeParams, ContrastBlobModel};
pub use marker::MarkerDetector;

#[cfg(feature = "backend-tract")]
pub use tract::{OnnxFaceDetector, TractHandLandmarker, TractKeypointClassifier};

/// Raw output of whichever variant ran.
pub enum RawOutput {
    Regions(Vec<Region>),
    #[cfg(feature = "backend-tract")]
    Rows(tract::FaceRows),
}

/// The closed set of detectors selectable from configuration.
pub enum DetectorVariant {
    Cascade(CascadeDetector),
    Marker(MarkerDetector),
    #[cfg(feature = "backend-tract")]
    Onnx(OnnxFaceDetector),
}

impl DetectorVariant {
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        match settings.kind {
            DetectorKind::Cascade => Ok(Self::Cascade(CascadeDetector::new(
                Box::new(ContrastBlobModel::default()),
                CascadeParams::default(),
            ))),
            DetectorKind::Marker => Ok(Self::Marker(MarkerDetector::new(settings.marker_color))),
            DetectorKind::Onnx => Self::onnx(settings),
        }
    }

    #[cfg(feature = "backend-tract")]
    fn onnx(settings: &DetectorSettings) -> Result<Self> {
        let path = settings
            .model_path
            .as_ref()
            .ok_or_else(|| anyhow!("onnx detector requires a model path"))?;
        log::info!("DetectorVariant: loading face model {}", path.display());
        let detector = OnnxFaceDetector::new(path)?.with_thresholds(
            settings.score_threshold,
            settings.nms_threshold,
            settings.top_k,
        );
        Ok(Self::Onnx(detector))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn onnx(_settings: &DetectorSettings) -> Result<Self> {
        Err(anyhow!(
            "onnx detector requires building with the backend-tract feature"
        ))
    }
}

/// Build the gesture recogniser from its two model files.
#[cfg(feature = "backend-tract")]
pub fn gesture_recognizer(settings: &GestureSettings) -> Result<BoxedGestureRecognizer> {
    use crate::detect::gesture::GestureRecognizer;

    let landmark_model = settings
        .landmark_model
        .as_ref()
        .ok_or_else(|| anyhow!("gesture recognition requires a landmark model"))?;
    let classifier_model = settings
        .classifier_model
        .as_ref()
        .ok_or_else(|| anyhow!("gesture recognition requires a classifier model"))?;
    log::info!(
        "GestureRecognizer: loading hand models {} and {}",
        landmark_model.display(),
        classifier_model.display()
    );
    Ok(GestureRecognizer::new(
        Box::new(TractHandLandmarker::new(landmark_model)?),
        Box::new(TractKeypointClassifier::new(classifier_model, 42)?),
    ))
}

#[cfg(not(feature = "backend-tract"))]
pub fn gesture_recognizer(_settings: &GestureSettings) -> Result<BoxedGestureRecognizer> {
    Err(anyhow!(
        "gesture recognition requires building with the backend-tract feature"
    ))
}

impl Perception for DetectorVariant {
    type Raw = RawOutput;

    fn name(&self) -> &'static str {
        match self {
            Self::Cascade(d) => d.name(),
            Self::Marker(d) => d.name(),
            #[cfg(feature = "backend-tract")]
            Self::Onnx(d) => d.name(),
        }
    }

    fn detection_size(&self) -> (u32, u32) {
        match self {
            Self::Cascade(d) => d.detection_size(),
            Self::Marker(d) => d.detection_size(),
            #[cfg(feature = "backend-tract")]
            Self::Onnx(d) => d.detection_size(),
        }
    }

    fn preprocess(&self, resized: RgbImage) -> DetectionInput {
        match self {
            Self::Cascade(d) => d.preprocess(resized),
            Self::Marker(d) => d.preprocess(resized),
            #[cfg(feature = "backend-tract")]
            Self::Onnx(d) => d.preprocess(resized),
        }
    }

    fn infer(&mut self, input: &DetectionInput) -> Result<RawOutput> {
        match self {
            Self::Cascade(d) => d.infer(input).map(RawOutput::Regions),
            Self::Marker(d) => d
                .infer(input)
                .map(|r| RawOutput::Regions(r.into_iter().collect())),
            #[cfg(feature = "backend-tract")]
            Self::Onnx(d) => d.infer(input).map(RawOutput::Rows),
        }
    }

    fn post_process(&mut self, raw: RawOutput) -> PerceptionOutput {
        match (self, raw) {
            #[cfg(feature = "backend-tract")]
            (Self::Onnx(d), RawOutput::Rows(rows)) => d.post_process(rows),
            (_, RawOutput::Regions(regions)) => PerceptionOutput::regions(regions),
            #[cfg(feature = "backend-tract")]
            (_, RawOutput::Rows(_)) => PerceptionOutput::default(),
        }
    }
}
