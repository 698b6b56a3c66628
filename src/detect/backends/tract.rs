#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectionInput, Perception};
use crate::detect::gesture::{HandLandmarker, KeypointClassifier};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::{PerceptionOutput, Region};

pub const ONNX_DETECTION_SIZE: (u32, u32) = (128, 96);

type Plan = TypedRunnableModel<TypedModel>;

fn load_plan(model_path: &Path, shape: TVec<usize>) -> Result<Plan> {
    let plan = tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape))
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")?;
    Ok(plan)
}

fn output_values(outputs: &TVec<TValue>, index: usize) -> Result<Vec<f32>> {
    let output = outputs
        .get(index)
        .ok_or_else(|| anyhow!("model produced no output #{}", index))?;
    let view = output
        .to_array_view::<f32>()
        .context("model output tensor was not f32")?;
    Ok(view.iter().copied().collect())
}

/// Face detector over rows of `[x, y, w, h, ..., score]`.
pub struct OnnxFaceDetector {
    model: Plan,
    score_threshold: f32,
    nms_threshold: f32,
    top_k: usize,
}

impl OnnxFaceDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let (width, height) = ONNX_DETECTION_SIZE;
        let model = load_plan(
            model_path.as_ref(),
            tvec!(1, 3, height as usize, width as usize),
        )?;
        Ok(Self {
            model,
            score_threshold: 0.7,
            nms_threshold: 0.3,
            top_k: 10,
        })
    }

    pub fn with_thresholds(mut self, score: f32, nms: f32, top_k: usize) -> Self {
        self.score_threshold = score;
        self.nms_threshold = nms;
        self.top_k = top_k;
        self
    }
}

/// Output rows of a face model, one candidate per row.
pub struct FaceRows {
    pub values: Vec<f32>,
    pub row_len: usize,
}

impl Perception for OnnxFaceDetector {
    type Raw = FaceRows;

    fn name(&self) -> &'static str {
        "onnx"
    }

    fn detection_size(&self) -> (u32, u32) {
        ONNX_DETECTION_SIZE
    }

    fn infer(&mut self, input: &DetectionInput) -> Result<FaceRows> {
        let DetectionInput::Rgb(image) = input else {
            return Err(anyhow!("onnx detector needs RGB input"));
        };
        let (width, height) = image.dimensions();
        let (width, height) = (width as usize, height as usize);
        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
                image.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
            })
            .into_tensor();

        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let row_len = output.shape().last().copied().unwrap_or(0);
        Ok(FaceRows {
            values: output_values(&outputs, 0)?,
            row_len,
        })
    }

    fn post_process(&mut self, raw: FaceRows) -> PerceptionOutput {
        PerceptionOutput::regions(decode_face_rows(
            &raw,
            self.score_threshold,
            self.nms_threshold,
            self.top_k,
        ))
    }
}

/// Threshold and suppress raw face rows. Rows shorter than five values are ignored.
pub fn decode_face_rows(raw: &FaceRows, score: f32, nms: f32, top_k: usize) -> Vec<Region> {
    if raw.row_len < 5 {
        return Vec::new();
    }
    let candidates = raw
        .values
        .chunks_exact(raw.row_len)
        .filter_map(|row| {
            let confidence = row[raw.row_len - 1];
            (confidence >= score)
                .then(|| Region::new(row[0], row[1], row[2], row[3]).with_score(confidence))
        })
        .collect();
    non_max_suppression(candidates, nms, top_k)
}

/// Hand landmark network: NHWC input, 21 `(x, y, z)` landmarks plus a presence score.
pub struct TractHandLandmarker {
    model: Plan,
    input_size: u32,
    presence_threshold: f32,
}

impl TractHandLandmarker {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let input_size = 224u32;
        let model = load_plan(
            model_path.as_ref(),
            tvec!(1, input_size as usize, input_size as usize, 3),
        )?;
        Ok(Self {
            model,
            input_size,
            presence_threshold: 0.5,
        })
    }
}

impl HandLandmarker for TractHandLandmarker {
    fn landmarks(&mut self, image: &RgbImage) -> Result<Vec<(f32, f32)>> {
        let side = self.input_size;
        let resized = imageops::resize(image, side, side, FilterType::Triangle);
        let side = side as usize;
        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
                resized.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
            })
            .into_tensor();

        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("hand landmark inference failed")?;
        let coords = output_values(&outputs, 0)?;
        if outputs.len() > 1 {
            let presence = output_values(&outputs, 1)?;
            if presence.first().copied().unwrap_or(0.0) < self.presence_threshold {
                return Ok(Vec::new());
            }
        }

        let side = side as f32;
        Ok(coords
            .chunks_exact(3)
            .map(|p| ((p[0] / side).clamp(0.0, 1.0), (p[1] / side).clamp(0.0, 1.0)))
            .collect())
    }
}

/// Keypoint classifier network: one feature vector in, per-class scores out.
pub struct TractKeypointClassifier {
    model: Plan,
    features: usize,
}

impl TractKeypointClassifier {
    /// `features` is the classifier input width, 42 for 21 landmarks.
    pub fn new<P: AsRef<Path>>(model_path: P, features: usize) -> Result<Self> {
        let model = load_plan(model_path.as_ref(), tvec!(1, features))?;
        Ok(Self { model, features })
    }
}

impl KeypointClassifier for TractKeypointClassifier {
    fn classify(&mut self, features: &[f32]) -> Result<Option<usize>> {
        if features.len() != self.features {
            return Err(anyhow!(
                "classifier expects {} features, received {}",
                self.features,
                features.len()
            ));
        }
        let tensor: Tensor =
            tract_ndarray::Array2::from_shape_vec((1, self.features), features.to_vec())
                .context("feature vector shape")?
                .into_tensor();
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("keypoint classification failed")?;
        let scores = output_values(&outputs, 0)?;
        Ok(scores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i))
    }
}
