use anyhow::Result;

use crate::camera::CameraConfig;
use crate::VisionConfig;

pub fn check_vision(v: &VisionConfig, camera: &CameraConfig) -> Result<()> {
    anyhow::ensure!(v.threshold.is_well_formed(), "vision.threshold has a min above its max");
    anyhow::ensure!(
        v.roi.clamp_to(camera.width, camera.height) == Some(v.roi),
        "vision.roi {:?} must lie inside the {}x{} frame", v.roi, camera.width, camera.height
    );
    anyhow::ensure!(v.x_stride >= 1 && v.y_stride >= 1, "vision strides must be >= 1");
    anyhow::ensure!(v.pixels_threshold >= 1, "vision.pixels_threshold must be >= 1");
    anyhow::ensure!(v.max_capture_attempts >= 1, "vision.max_capture_attempts must be >= 1");
    Ok(())
}

pub fn check_camera(camera: &CameraConfig) -> Result<()> {
    match camera.mode.as_str() {
        "libcamera-jpeg" => {}
        "v4l2-mjpeg" => anyhow::ensure!(!camera.device.is_empty(), "camera.device missing"),
        "file" => anyhow::ensure!(camera.path.as_ref().map(|p| !p.is_empty()).unwrap_or(false), "camera.path missing"),
        other => anyhow::bail!("unknown camera.mode: {}", other),
    }
    anyhow::ensure!(camera.width > 0 && camera.height > 0, "camera frame size must be non-zero");
    Ok(())
}
