//! Operator-facing output: periodic stats and an annotated MJPEG stream.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::detect::{BoundingBox, Detections, Gesture};
use crate::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const JPEG_QUALITY: u8 = 80;

/// Snapshot of loop health for one iteration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub camera_fps: Option<f64>,
    pub detector_fps: Option<f64>,
    pub gesture_fps: Option<f64>,
    pub distance_cm: Option<f64>,
    pub gesture: Gesture,
}

impl Stats {
    /// One `name: value` line per figure.
    pub fn render(&self) -> String {
        fn figure(value: Option<f64>) -> String {
            value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}", v))
        }
        format!(
            "camera fps: {}\ndetector fps: {}\ngesture fps: {}\ndistance cm: {}\ngesture: {}",
            figure(self.camera_fps),
            figure(self.detector_fps),
            figure(self.gesture_fps),
            figure(self.distance_cm),
            self.gesture
        )
    }
}

/// Receives every tracked frame together with its detections.
pub trait DiagnosticsSink: Send {
    fn observe(&mut self, frame: &Frame, detections: &Detections, stats: &Stats) -> Result<()>;
}

/// Logs stats at `info` no more than once per interval.
pub struct LogSink {
    interval: Duration,
    last: Option<Instant>,
}

impl LogSink {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

impl DiagnosticsSink for LogSink {
    fn observe(&mut self, _frame: &Frame, detections: &Detections, stats: &Stats) -> Result<()> {
        if self.due(Instant::now()) {
            log::info!(
                "stats: {} target(s)\n{}",
                detections.boxes.len(),
                stats.render()
            );
        }
        Ok(())
    }
}

/// Writes annotated JPEG frames as multipart `--frame` parts.
pub struct MjpegSink<W: Write> {
    out: W,
    frames: u64,
}

impl<W: Write> MjpegSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, frames: 0 }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DiagnosticsSink for MjpegSink<W> {
    fn observe(&mut self, frame: &Frame, detections: &Detections, _stats: &Stats) -> Result<()> {
        let mut image = frame.to_image()?;
        annotate(&mut image, detections);

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(&image)
            .context("failed to encode diagnostics frame")?;

        self.out.write_all(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n")?;
        self.out.write_all(&jpeg)?;
        self.out.write_all(b"\r\n")?;
        self.out.flush()?;
        self.frames += 1;
        Ok(())
    }
}

/// Draw the primary box outline and a dot per landmark.
pub fn annotate(image: &mut RgbImage, detections: &Detections) {
    if let Some(primary) = detections.primary() {
        draw_outline(image, primary);
    }
    for point in &detections.keypoints {
        for dy in -1..=1 {
            for dx in -1..=1 {
                put(image, point.x.saturating_add(dx), point.y.saturating_add(dy), LANDMARK_COLOR);
            }
        }
    }
}

fn draw_outline(image: &mut RgbImage, b: &BoundingBox) {
    if b.w <= 0 || b.h <= 0 || image.width() == 0 || image.height() == 0 {
        return;
    }
    let (left, top) = (b.x as i64, b.y as i64);
    let (right, bottom) = (left + b.w as i64 - 1, top + b.h as i64 - 1);
    let (max_x, max_y) = (image.width() as i64 - 1, image.height() as i64 - 1);
    if right < 0 || bottom < 0 || left > max_x || top > max_y {
        return;
    }
    let (x0, x1) = (left.max(0), right.min(max_x));
    let (y0, y1) = (top.max(0), bottom.min(max_y));
    for x in x0..=x1 {
        if top >= 0 {
            image.put_pixel(x as u32, top as u32, BOX_COLOR);
        }
        if bottom <= max_y {
            image.put_pixel(x as u32, bottom as u32, BOX_COLOR);
        }
    }
    for y in y0..=y1 {
        if left >= 0 {
            image.put_pixel(left as u32, y as u32, BOX_COLOR);
        }
        if right <= max_x {
            image.put_pixel(right as u32, y as u32, BOX_COLOR);
        }
    }
}

fn put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Keypoint;

    fn gray_frame() -> Frame {
        Frame::from_rgb(vec![128; 32 * 24 * 3], 32, 24, 1).unwrap()
    }

    #[test]
    fn stats_render_as_lines() {
        let stats = Stats {
            camera_fps: Some(29.96),
            detector_fps: None,
            gesture_fps: Some(10.0),
            distance_cm: None,
            gesture: Gesture::Point,
        };
        assert_eq!(
            stats.render(),
            "camera fps: 30.0\ndetector fps: n/a\ngesture fps: 10.0\ndistance cm: n/a\ngesture: point"
        );
    }

    #[test]
    fn annotation_stays_in_bounds() {
        let mut image = RgbImage::new(32, 24);
        let detections = Detections {
            boxes: vec![BoundingBox::new(20, 10, 40, 40)],
            keypoints: vec![Keypoint { x: 0, y: 0 }, Keypoint { x: 100, y: 100 }],
            gesture: Gesture::None,
        };
        annotate(&mut image, &detections);
        assert_eq!(*image.get_pixel(20, 10), BOX_COLOR);
        assert_eq!(*image.get_pixel(25, 10), BOX_COLOR);
        assert_eq!(*image.get_pixel(1, 1), LANDMARK_COLOR);
        assert_eq!(*image.get_pixel(25, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn saturated_box_is_clipped_to_the_image() {
        let mut image = RgbImage::new(32, 24);
        let detections = Detections {
            boxes: vec![BoundingBox::new(4, 2, i32::MAX, i32::MAX)],
            keypoints: vec![Keypoint {
                x: i32::MAX,
                y: i32::MAX,
            }],
            gesture: Gesture::None,
        };
        annotate(&mut image, &detections);
        assert_eq!(*image.get_pixel(4, 2), BOX_COLOR);
        assert_eq!(*image.get_pixel(31, 2), BOX_COLOR);
        assert_eq!(*image.get_pixel(4, 23), BOX_COLOR);
        assert_eq!(*image.get_pixel(31, 23), Rgb([0, 0, 0]));
    }

    #[test]
    fn mjpeg_parts_are_framed() -> Result<()> {
        let mut sink = MjpegSink::new(Vec::new());
        let frame = gray_frame();
        sink.observe(&frame, &Detections::default(), &Stats::default())?;
        sink.observe(&frame, &Detections::default(), &Stats::default())?;
        assert_eq!(sink.frames_written(), 2);

        let out = sink.into_inner();
        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(out.starts_with(header));
        // JPEG start-of-image marker right after the part header.
        assert_eq!(&out[header.len()..header.len() + 2], &[0xFF, 0xD8]);
        assert!(out.ends_with(b"\r\n"));
        let parts = out.windows(header.len()).filter(|w| *w == &header[..]).count();
        assert_eq!(parts, 2);
        Ok(())
    }

    #[test]
    fn log_sink_throttles() {
        let mut sink = LogSink::new(Duration::from_secs(60));
        let now = Instant::now();
        assert!(sink.due(now));
        assert!(!sink.due(now + Duration::from_secs(1)));
        assert!(sink.due(now + Duration::from_secs(61)));
    }
}
