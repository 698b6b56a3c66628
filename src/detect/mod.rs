mod backend;
pub mod backends;
pub mod gesture;
pub mod nms;
pub mod preprocess;
mod result;
mod worker;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub use backend::{DetectionInput, Perception};
pub use backends::{gesture_recognizer, DetectorVariant, RawOutput};
pub use gesture::{
    BoxedGestureRecognizer, GestureRecognizer, HandLandmarker, KeypointClassifier,
};
pub use result::{
    BoundingBox, Detections, Gesture, Keypoint, PerceptionOutput, Region, ScaleFactor,
};
pub use worker::{pacing_delay, PerceptionWorker};

/// Configured detector family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Cascade,
    #[default]
    Marker,
    Onnx,
}

impl DetectorKind {
    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::Cascade => "cascade",
            DetectorKind::Marker => "marker",
            DetectorKind::Onnx => "onnx",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cascade" | "haar" => Ok(DetectorKind::Cascade),
            "marker" => Ok(DetectorKind::Marker),
            "onnx" | "dnn" => Ok(DetectorKind::Onnx),
            other => Err(anyhow!(
                "unknown detector '{}', expected cascade, marker or onnx",
                other
            )),
        }
    }
}
