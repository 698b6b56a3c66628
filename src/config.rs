use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::DetectorKind;

const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DETECTOR_RATE: f64 = 30.0;
const DEFAULT_GESTURE_RATE: f64 = 30.0;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.7;
const DEFAULT_NMS_THRESHOLD: f32 = 0.3;
const DEFAULT_TOP_K: usize = 10;
const DEFAULT_MARKER_COLOR: [u8; 3] = [255, 0, 0];
const DEFAULT_MOTOR_PORTS: [&str; 2] = ["A", "B"];
const DEFAULT_DISTANCE_PORT: &str = "C";
const DEFAULT_TOLERANCE: f64 = 0.2;
const DEFAULT_HORIZONTAL_SPEED: f64 = 12.0;
const DEFAULT_VERTICAL_SPEED: f64 = 3.0;

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    gesture: Option<GestureConfigFile>,
    controller: Option<ControllerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    kind: Option<DetectorKind>,
    rate: Option<f64>,
    model_path: Option<PathBuf>,
    score_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    top_k: Option<usize>,
    marker_color: Option<[u8; 3]>,
}

#[derive(Debug, Deserialize, Default)]
struct GestureConfigFile {
    enabled: Option<bool>,
    rate: Option<f64>,
    landmark_model: Option<PathBuf>,
    classifier_model: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ControllerConfigFile {
    enabled: Option<bool>,
    motor_ports: Option<[String; 2]>,
    distance_port: Option<String>,
    command_rate: Option<f64>,
    horizontal: Option<AxisConfigFile>,
    vertical: Option<AxisConfigFile>,
    home: Option<[i32; 2]>,
}

#[derive(Debug, Deserialize, Default)]
struct AxisConfigFile {
    tolerance: Option<f64>,
    speed: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub gesture: GestureSettings,
    pub controller: ControllerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSettings {
    /// `stub://name`, a device node, or a bare camera index.
    pub device: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    /// Target cycles per second; zero or negative means unlimited.
    pub rate: f64,
    pub model_path: Option<PathBuf>,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
    pub marker_color: [u8; 3],
}

#[derive(Debug, Clone)]
pub struct GestureSettings {
    pub enabled: bool,
    pub rate: f64,
    pub landmark_model: Option<PathBuf>,
    pub classifier_model: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTuning {
    /// Dead band as a fraction of the half-frame.
    pub tolerance: f64,
    /// Duty cycle magnitude in percent.
    pub speed: f64,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub enabled: bool,
    /// Horizontal, vertical.
    pub motor_ports: [String; 2],
    pub distance_port: String,
    /// Maximum accepted tracking updates per second; zero or negative means unlimited.
    pub command_rate: f64,
    pub horizontal: AxisTuning,
    pub vertical: AxisTuning,
    /// Absolute motor positions used by the re-centre command.
    pub home: (i32, i32),
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_file(TrackerConfigFile::default())
    }
}

impl TrackerConfig {
    /// Load from `TRACKSTORM_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TRACKSTORM_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => TrackerConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrackerConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let gesture = file.gesture.unwrap_or_default();
        let controller = file.controller.unwrap_or_default();
        let horizontal = controller.horizontal.unwrap_or_default();
        let vertical = controller.vertical.unwrap_or_default();

        Self {
            camera: CameraSettings {
                device: camera
                    .device
                    .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            },
            detector: DetectorSettings {
                kind: detector.kind.unwrap_or_default(),
                rate: detector.rate.unwrap_or(DEFAULT_DETECTOR_RATE),
                model_path: detector.model_path,
                score_threshold: detector
                    .score_threshold
                    .unwrap_or(DEFAULT_SCORE_THRESHOLD),
                nms_threshold: detector.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
                top_k: detector.top_k.unwrap_or(DEFAULT_TOP_K),
                marker_color: detector.marker_color.unwrap_or(DEFAULT_MARKER_COLOR),
            },
            gesture: GestureSettings {
                enabled: gesture.enabled.unwrap_or(false),
                rate: gesture.rate.unwrap_or(DEFAULT_GESTURE_RATE),
                landmark_model: gesture.landmark_model,
                classifier_model: gesture.classifier_model,
            },
            controller: ControllerSettings {
                enabled: controller.enabled.unwrap_or(true),
                motor_ports: controller
                    .motor_ports
                    .unwrap_or_else(|| DEFAULT_MOTOR_PORTS.map(String::from)),
                distance_port: controller
                    .distance_port
                    .unwrap_or_else(|| DEFAULT_DISTANCE_PORT.to_string()),
                command_rate: controller.command_rate.unwrap_or(0.0),
                horizontal: AxisTuning {
                    tolerance: horizontal.tolerance.unwrap_or(DEFAULT_TOLERANCE),
                    speed: horizontal.speed.unwrap_or(DEFAULT_HORIZONTAL_SPEED),
                },
                vertical: AxisTuning {
                    tolerance: vertical.tolerance.unwrap_or(DEFAULT_TOLERANCE),
                    speed: vertical.speed.unwrap_or(DEFAULT_VERTICAL_SPEED),
                },
                home: controller.home.map(|[x, y]| (x, y)).unwrap_or((0, 0)),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("TRACKSTORM_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device.trim().to_string();
            }
        }
        if let Ok(kind) = std::env::var("TRACKSTORM_DETECTOR") {
            if !kind.trim().is_empty() {
                self.detector.kind = kind.parse()?;
            }
        }
        if let Some(rate) = env_f64("TRACKSTORM_DETECTOR_RATE")? {
            self.detector.rate = rate;
        }
        if let Some(rate) = env_f64("TRACKSTORM_GESTURE_RATE")? {
            self.gesture.rate = rate;
        }
        if let Some(rate) = env_f64("TRACKSTORM_COMMAND_RATE")? {
            self.controller.command_rate = rate;
        }
        if let Ok(value) = std::env::var("TRACKSTORM_DISABLE_CONTROLLER") {
            match value.trim().to_ascii_lowercase().as_str() {
                "" => {}
                "1" | "true" | "yes" => self.controller.enabled = false,
                "0" | "false" | "no" => self.controller.enabled = true,
                other => {
                    return Err(anyhow!(
                        "TRACKSTORM_DISABLE_CONTROLLER must be a boolean, got '{}'",
                        other
                    ))
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        for (name, rate) in [
            ("detector rate", self.detector.rate),
            ("gesture rate", self.gesture.rate),
            ("command rate", self.controller.command_rate),
        ] {
            if !rate.is_finite() {
                return Err(anyhow!("{} must be finite", name));
            }
        }
        for (name, value) in [
            ("score threshold", self.detector.score_threshold),
            ("nms threshold", self.detector.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within 0..=1, got {}", name, value));
            }
        }
        if self.detector.kind == DetectorKind::Onnx && self.detector.model_path.is_none() {
            return Err(anyhow!("onnx detector requires detector.model_path"));
        }
        if self.gesture.enabled
            && (self.gesture.landmark_model.is_none() || self.gesture.classifier_model.is_none())
        {
            return Err(anyhow!(
                "gesture recognition requires gesture.landmark_model and gesture.classifier_model"
            ));
        }
        for (name, axis) in [
            ("horizontal", self.controller.horizontal),
            ("vertical", self.controller.vertical),
        ] {
            if !(0.0..1.0).contains(&axis.tolerance) {
                return Err(anyhow!(
                    "{} tolerance must be within 0..1, got {}",
                    name,
                    axis.tolerance
                ));
            }
            if !(0.0..=100.0).contains(&axis.speed) {
                return Err(anyhow!(
                    "{} speed must be within 0..=100, got {}",
                    name,
                    axis.speed
                ));
            }
        }
        let [x_port, y_port] = &self.controller.motor_ports;
        if x_port.trim().is_empty() || y_port.trim().is_empty() {
            return Err(anyhow!("motor ports must not be empty"));
        }
        if x_port == y_port {
            return Err(anyhow!("motor ports must differ, both are '{}'", x_port));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a number", key)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let cfg = TrackerConfig::default();
        cfg.validate()?;
        assert_eq!(cfg.camera.device, "stub://camera");
        assert_eq!(cfg.detector.kind, DetectorKind::Marker);
        assert_eq!(cfg.controller.motor_ports, ["A".to_string(), "B".to_string()]);
        assert_eq!(cfg.controller.horizontal.speed, 12.0);
        assert_eq!(cfg.controller.vertical.speed, 3.0);
        assert_eq!(cfg.controller.command_rate, 0.0);
        Ok(())
    }

    #[test]
    fn onnx_without_model_is_rejected() {
        let mut cfg = TrackerConfig::default();
        cfg.detector.kind = DetectorKind::Onnx;
        assert!(cfg.validate().is_err());
        cfg.detector.model_path = Some(PathBuf::from("face.onnx"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn identical_motor_ports_are_rejected() {
        let mut cfg = TrackerConfig::default();
        cfg.controller.motor_ports = ["A".to_string(), "A".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn tolerance_must_stay_below_one() {
        let mut cfg = TrackerConfig::default();
        cfg.controller.vertical.tolerance = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_file_fills_nested_sections() -> Result<()> {
        let file: TrackerConfigFile = toml::from_str(
            r#"
            [camera]
            device = "1"
            width = 320

            [controller]
            command_rate = 10.0
            home = [90, -15]

            [controller.horizontal]
            tolerance = 0.1
            "#,
        )?;
        let cfg = TrackerConfig::from_file(file);
        assert_eq!(cfg.camera.device, "1");
        assert_eq!(cfg.camera.width, 320);
        assert_eq!(cfg.camera.height, 480);
        assert_eq!(cfg.controller.command_rate, 10.0);
        assert_eq!(cfg.controller.home, (90, -15));
        assert_eq!(cfg.controller.horizontal.tolerance, 0.1);
        assert_eq!(cfg.controller.horizontal.speed, 12.0);
        Ok(())
    }
}
