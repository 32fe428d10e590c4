pub mod blobs;
pub mod camera;
pub mod display;
pub mod doctor;
pub mod lab;

use anyhow::Result;
use image::RgbImage;
use picker_proto::DetectedTarget;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use blobs::BlobDetector;
pub use lab::LabThreshold;

/// Axis-aligned pixel rectangle, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Intersection with a `width` x `height` frame; `None` when nothing is left.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<Self> {
        let x1 = self.x.saturating_add(self.w).min(width);
        let y1 = self.y.saturating_add(self.h).min(height);
        if self.x >= x1 || self.y >= y1 {
            return None;
        }
        Some(Self { x: self.x, y: self.y, w: x1 - self.x, h: y1 - self.y })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// A connected patch of matching pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub rect: Rect,
    pub cx: i32,
    pub cy: i32,
    pub pixels: u32,
}

impl Blob {
    pub fn target(&self) -> DetectedTarget {
        DetectedTarget::new(self.cx, self.cy)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    /// Tree area searched for apples.
    #[serde(default = "default_roi")]
    pub roi: Rect,

    #[serde(default)]
    pub threshold: LabThreshold,

    #[serde(default = "default_stride")]
    pub x_stride: u32,
    #[serde(default = "default_stride")]
    pub y_stride: u32,

    /// Blobs smaller than this many pixels are dropped.
    #[serde(default = "default_pixels_threshold")]
    pub pixels_threshold: u32,

    /// Frames to grab before giving up on finding anything.
    #[serde(default = "default_max_capture_attempts")]
    pub max_capture_attempts: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            roi: default_roi(),
            threshold: LabThreshold::default(),
            x_stride: default_stride(),
            y_stride: default_stride(),
            pixels_threshold: default_pixels_threshold(),
            max_capture_attempts: default_max_capture_attempts(),
        }
    }
}

// tree centre (55, 107) with the box hanging 60px above it
fn default_roi() -> Rect {
    Rect::new(35, 47, 80, 62)
}

fn default_stride() -> u32 {
    5
}

fn default_pixels_threshold() -> u32 {
    50
}

fn default_max_capture_attempts() -> u32 {
    20
}

pub trait Detector: Send {
    fn detect_rgb(&mut self, frame: &RgbImage) -> Result<Vec<Blob>>;
}

pub struct Capture {
    pub frame: RgbImage,
    pub blobs: Vec<Blob>,
    pub attempts: u32,
}

impl Capture {
    pub fn targets(&self) -> Vec<DetectedTarget> {
        self.blobs.iter().map(Blob::target).collect()
    }
}

/// Grabs frames until the detector finds something or `max_attempts` frames
/// came back empty. An empty result is a normal outcome.
pub async fn scan<D: Detector>(camera: &camera::CameraConfig, detector: &mut D, max_attempts: u32) -> Result<Capture> {
    // a still image never changes, one look is enough
    let max_attempts = if camera.is_still() { 1 } else { max_attempts.max(1) };
    let mut attempt = 0;
    loop {
        attempt += 1;
        let frame = camera::capture_rgb(camera).await?;
        let blobs = detector.detect_rgb(&frame)?;
        info!("Red apples found: {}", blobs.len());
        if !blobs.is_empty() || attempt >= max_attempts {
            if blobs.is_empty() {
                info!("No red apples detected after {} frames", attempt);
            }
            return Ok(Capture { frame, blobs, attempts: attempt });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_clamps_to_frame() {
        let r = Rect::new(100, 150, 80, 62);
        assert_eq!(r.clamp_to(128, 160), Some(Rect::new(100, 150, 28, 10)));
        assert_eq!(Rect::new(130, 0, 10, 10).clamp_to(128, 160), None);
        assert_eq!(Rect::new(0, 0, 0, 10).clamp_to(128, 160), None);
    }

    #[tokio::test]
    async fn scan_reads_a_still_once() {
        let path = std::env::temp_dir().join(format!("picker-scan-{}.png", std::process::id()));
        let mut img = RgbImage::from_pixel(128, 160, image::Rgb([60, 150, 60]));
        for y in 60..70 {
            for x in 50..60 {
                img.put_pixel(x, y, image::Rgb([150, 60, 60]));
            }
        }
        img.save(&path).unwrap();

        let camera = camera::CameraConfig::still(path.to_string_lossy());
        let mut detector = BlobDetector::new(VisionConfig::default());
        let capture = scan(&camera, &mut detector, 20).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(capture.attempts, 1);
        assert_eq!(capture.targets(), vec![DetectedTarget::new(55, 65)]);
    }

    #[test]
    fn blob_centroid_becomes_target() {
        let b = Blob { rect: Rect::new(1, 2, 3, 4), cx: 2, cy: 3, pixels: 12 };
        assert_eq!(b.target(), DetectedTarget::new(2, 3));
    }
}
