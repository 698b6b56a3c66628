use std::fmt;

/// Axis-aligned box in camera pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Integer centre, `(x + w/2, y + h/2)`, saturating at the `i32` range.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x.saturating_add(self.w / 2),
            self.y.saturating_add(self.h / 2),
        )
    }

    /// Box area relative to the full frame.
    pub fn area_fraction(&self, frame_size: (u32, u32)) -> f64 {
        let frame_area = frame_size.0 as f64 * frame_size.1 as f64;
        if frame_area <= 0.0 {
            return 0.0;
        }
        (self.w.max(0) as f64 * self.h.max(0) as f64) / frame_area
    }
}

/// Box in detection-frame pixels, as produced by a model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            score: 1.0,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.w, self.h].iter().all(|v| v.is_finite())
    }

    /// Intersection over union with `other`.
    pub fn iou(&self, other: &Region) -> f32 {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);
        let inter = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Landmark position in camera pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Keypoint {
    pub x: i32,
    pub y: i32,
}

/// Hand gesture vocabulary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Gesture {
    Open,
    Close,
    Point,
    #[default]
    None,
}

impl Gesture {
    /// Classifier output order.
    pub const CLASSES: [Gesture; 3] = [Gesture::Open, Gesture::Close, Gesture::Point];

    /// Map a classifier index to a label; anything out of range is `None`.
    pub fn from_class_index(index: Option<usize>) -> Self {
        index
            .and_then(|i| Self::CLASSES.get(i).copied())
            .unwrap_or(Gesture::None)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gesture::Open => "open",
            Gesture::Close => "close",
            Gesture::Point => "point",
            Gesture::None => "none",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detection-frame output of one perception cycle, before scaling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerceptionOutput {
    pub regions: Vec<Region>,
    pub keypoints: Vec<(f32, f32)>,
    pub gesture: Gesture,
}

impl PerceptionOutput {
    pub fn regions(regions: Vec<Region>) -> Self {
        Self {
            regions,
            ..Self::default()
        }
    }

    /// Map into camera space. Coordinates truncate toward zero and saturate at
    /// the `i32` range; regions with non-finite coordinates are dropped.
    pub fn scaled(self, scale: ScaleFactor) -> Detections {
        Detections {
            boxes: self
                .regions
                .iter()
                .filter(|r| r.is_finite())
                .map(|r| scale.apply_region(r))
                .collect(),
            keypoints: self
                .keypoints
                .iter()
                .map(|&(x, y)| Keypoint {
                    x: (x as f64 * scale.x) as i32,
                    y: (y as f64 * scale.y) as i32,
                })
                .collect(),
            gesture: self.gesture,
        }
    }
}

/// Published result of one perception cycle, in camera pixels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detections {
    /// Ordered as the model produced them; the first box is the primary target.
    pub boxes: Vec<BoundingBox>,
    pub keypoints: Vec<Keypoint>,
    pub gesture: Gesture,
}

impl Detections {
    pub fn primary(&self) -> Option<&BoundingBox> {
        self.boxes.first()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.keypoints.is_empty()
    }
}

/// Detection-frame to camera-frame scale, fixed at worker construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactor {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactor {
    pub fn new(camera: (u32, u32), detection: (u32, u32)) -> Self {
        Self {
            x: camera.0 as f64 / detection.0.max(1) as f64,
            y: camera.1 as f64 / detection.1.max(1) as f64,
        }
    }

    pub fn apply_region(&self, region: &Region) -> BoundingBox {
        BoundingBox {
            x: (region.x as f64 * self.x) as i32,
            y: (region.y as f64 * self.y) as i32,
            w: (region.w as f64 * self.x) as i32,
            h: (region.h as f64 * self.y) as i32,
        }
    }
}
