use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::backend::{DetectionInput, Perception};
use crate::detect::result::{Gesture, PerceptionOutput, ScaleFactor};

pub const GESTURE_DETECTION_SIZE: (u32, u32) = (128, 96);

/// Hand landmark model.
pub trait HandLandmarker: Send {
    /// Landmarks in normalised `[0, 1]` image coordinates; empty when no hand is visible.
    fn landmarks(&mut self, image: &RgbImage) -> Result<Vec<(f32, f32)>>;
}

/// Maps a normalised landmark vector to a class index.
pub trait KeypointClassifier: Send {
    fn classify(&mut self, features: &[f32]) -> Result<Option<usize>>;
}

impl<T: HandLandmarker + ?Sized> HandLandmarker for Box<T> {
    fn landmarks(&mut self, image: &RgbImage) -> Result<Vec<(f32, f32)>> {
        (**self).landmarks(image)
    }
}

impl<T: KeypointClassifier + ?Sized> KeypointClassifier for Box<T> {
    fn classify(&mut self, features: &[f32]) -> Result<Option<usize>> {
        (**self).classify(features)
    }
}

/// Recogniser over boxed models, as assembled from configuration.
pub type BoxedGestureRecognizer =
    GestureRecognizer<Box<dyn HandLandmarker>, Box<dyn KeypointClassifier>>;

/// Landmarks plus classified gesture, landmarks still normalised.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandObservation {
    pub landmarks: Vec<(f32, f32)>,
    pub gesture: Gesture,
}

/// Hand landmarking followed by gesture classification.
///
/// The classifier sees camera-pixel landmarks, so the features depend on the
/// camera aspect ratio and not on the detection resolution.
pub struct GestureRecognizer<L, C> {
    landmarker: L,
    classifier: C,
    scale: ScaleFactor,
}

impl<L: HandLandmarker, C: KeypointClassifier> GestureRecognizer<L, C> {
    pub fn new(landmarker: L, classifier: C) -> Self {
        Self {
            landmarker,
            classifier,
            scale: ScaleFactor { x: 1.0, y: 1.0 },
        }
    }

    /// Landmarks in truncated camera pixels, matching the published keypoints.
    fn camera_points(&self, landmarks: &[(f32, f32)]) -> Vec<(f32, f32)> {
        let (w, h) = GESTURE_DETECTION_SIZE;
        landmarks
            .iter()
            .map(|&(x, y)| {
                let cx = ((x * w as f32) as f64 * self.scale.x) as i32;
                let cy = ((y * h as f32) as f64 * self.scale.y) as i32;
                (cx as f32, cy as f32)
            })
            .collect()
    }
}

impl<L, C> Perception for GestureRecognizer<L, C>
where
    L: HandLandmarker + 'static,
    C: KeypointClassifier + 'static,
{
    type Raw = HandObservation;

    fn name(&self) -> &'static str {
        "gesture"
    }

    fn detection_size(&self) -> (u32, u32) {
        GESTURE_DETECTION_SIZE
    }

    fn bind_scale(&mut self, scale: ScaleFactor) {
        self.scale = scale;
    }

    fn infer(&mut self, input: &DetectionInput) -> Result<HandObservation> {
        let DetectionInput::Rgb(image) = input else {
            return Err(anyhow!("gesture recogniser needs RGB input"));
        };
        let landmarks = self.landmarker.landmarks(image)?;
        let gesture = match normalize_keypoints(&self.camera_points(&landmarks)) {
            Some(features) => Gesture::from_class_index(self.classifier.classify(&features)?),
            None => Gesture::None,
        };
        Ok(HandObservation { landmarks, gesture })
    }

    fn post_process(&mut self, raw: HandObservation) -> PerceptionOutput {
        let (w, h) = GESTURE_DETECTION_SIZE;
        PerceptionOutput {
            regions: Vec::new(),
            keypoints: raw
                .landmarks
                .iter()
                .map(|&(x, y)| (x * w as f32, y * h as f32))
                .collect(),
            gesture: raw.gesture,
        }
    }
}

/// Classifier features: the first point becomes the origin, the others signed
/// offsets from it, all divided by the largest absolute offset.
///
/// The output starts with the origin's own `[0, 0]`. Returns `None` for no
/// points or when every point coincides with the origin.
pub fn normalize_keypoints(points: &[(f32, f32)]) -> Option<Vec<f32>> {
    let &(ox, oy) = points.first()?;
    let offsets: Vec<f32> = points
        .iter()
        .flat_map(|&(x, y)| [x - ox, y - oy])
        .collect();
    let max = offsets.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    if max == 0.0 || !max.is_finite() {
        return None;
    }
    Some(offsets.into_iter().map(|v| v / max).collect())
}
