use anyhow::{Context, Result};
use image::RgbImage;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_mode")]
    pub mode: String,   // "libcamera-jpeg" | "v4l2-mjpeg" | "file"
    #[serde(default = "default_device")]
    pub device: String, // /dev/video0 (v4l2)
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    pub path: Option<String>, // still image (file)
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            device: default_device(),
            width: default_width(),
            height: default_height(),
            path: None,
        }
    }
}

impl CameraConfig {
    pub fn still(path: impl Into<String>) -> Self {
        Self {
            mode: "file".into(),
            device: default_device(),
            width: default_width(),
            height: default_height(),
            path: Some(path.into()),
        }
    }

    pub fn is_still(&self) -> bool {
        self.mode == "file"
    }
}

fn default_mode() -> String {
    "libcamera-jpeg".into()
}

fn default_device() -> String {
    "/dev/video0".into()
}

// portrait LCD frame the ROI and calibration were measured on
fn default_width() -> u32 {
    128
}

fn default_height() -> u32 {
    160
}

/// One encoded frame per call:
/// - libcamera-jpeg: `libcamera-still` writes a JPEG to stdout
/// - v4l2-mjpeg: `ffmpeg` grabs a single MJPEG frame from `device`
/// - file: a still (jpeg/png) from disk, for bench runs
pub async fn capture_encoded(cfg: &CameraConfig) -> Result<Vec<u8>> {
    match cfg.mode.as_str() {
        "libcamera-jpeg" => grab("libcamera-still", &libcamera_args(cfg)).await,
        "v4l2-mjpeg" => grab("ffmpeg", &ffmpeg_args(cfg)).await,
        "file" => {
            let path = cfg.path.as_ref().context("camera.path missing (mode=file)")?;
            tokio::fs::read(path).await.with_context(|| format!("read still image {}", path))
        }
        other => anyhow::bail!("unknown camera.mode: {}", other),
    }
}

pub async fn capture_rgb(cfg: &CameraConfig) -> Result<RgbImage> {
    let bytes = capture_encoded(cfg).await?;
    let frame = image::load_from_memory(&bytes).context("decode camera frame")?.to_rgb8();
    if (frame.width(), frame.height()) != (cfg.width, cfg.height) {
        warn!(
            "capture: got {}x{} frame, configured {}x{}; roi and calibration assume the latter",
            frame.width(),
            frame.height(),
            cfg.width,
            cfg.height
        );
    }
    Ok(frame)
}

// LAB threshold was tuned with white balance and gain fixed at 1.
fn libcamera_args(cfg: &CameraConfig) -> Vec<String> {
    let mut args: Vec<String> = ["-n", "-t", "1", "--awbgains", "1,1", "--gain", "1"]
        .iter()
        .map(|a| a.to_string())
        .collect();
    args.push("--width".to_string());
    args.push(cfg.width.to_string());
    args.push("--height".to_string());
    args.push(cfg.height.to_string());
    args.push("-o".to_string());
    args.push("-".to_string());
    args
}

fn ffmpeg_args(cfg: &CameraConfig) -> Vec<String> {
    let size = format!("{}x{}", cfg.width, cfg.height);
    [
        "-hide_banner", "-loglevel", "error",
        "-f", "video4linux2",
        "-input_format", "mjpeg",
        "-video_size", size.as_str(),
        "-i", cfg.device.as_str(),
        "-frames:v", "1",
        "-f", "image2pipe",
        "-vcodec", "mjpeg",
        "-",
    ]
    .iter()
    .map(|a| a.to_string())
    .collect()
}

/// Runs a capture tool and returns its stdout. stderr goes into the error.
async fn grab(program: &str, args: &[String]) -> Result<Vec<u8>> {
    debug!("capture: {} {}", program, args.join(" "));
    let out = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("run {}", program))?;
    if !out.status.success() {
        anyhow::bail!(
            "{} exited with {}: {}",
            program,
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    anyhow::ensure!(!out.stdout.is_empty(), "{} produced no frame", program);
    Ok(out.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let cfg = CameraConfig { mode: "gopro".into(), ..CameraConfig::still("x.png") };
        let err = capture_encoded(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("unknown camera.mode"));
    }

    #[tokio::test]
    async fn file_mode_needs_a_path() {
        let cfg = CameraConfig { path: None, ..CameraConfig::still("x.png") };
        assert!(capture_encoded(&cfg).await.is_err());
    }

    #[test]
    fn libcamera_pins_gains_and_size() {
        let cfg = CameraConfig::default();
        let args = libcamera_args(&cfg);
        let joined = args.join(" ");
        assert!(joined.contains("--awbgains 1,1 --gain 1"));
        assert!(joined.contains("--width 128 --height 160"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn ffmpeg_reads_the_configured_device() {
        let cfg = CameraConfig { mode: "v4l2-mjpeg".into(), device: "/dev/video2".into(), ..CameraConfig::default() };
        let joined = ffmpeg_args(&cfg).join(" ");
        assert!(joined.contains("-video_size 128x160 -i /dev/video2"));
        assert!(joined.contains("-frames:v 1"));
    }

    #[tokio::test]
    async fn missing_capture_tool_is_an_error() {
        let err = grab("picker-no-such-camera-tool", &[]).await.unwrap_err();
        assert!(err.to_string().contains("run picker-no-such-camera-tool"));
    }

    #[tokio::test]
    async fn still_image_round_trips_through_png() {
        let path = std::env::temp_dir().join(format!("picker-still-{}.png", std::process::id()));
        RgbImage::from_pixel(128, 160, image::Rgb([1, 2, 3])).save(&path).unwrap();

        let frame = capture_rgb(&CameraConfig::still(path.to_string_lossy())).await.unwrap();
        assert_eq!(frame.dimensions(), (128, 160));
        assert_eq!(frame.get_pixel(5, 5).0, [1, 2, 3]);
        std::fs::remove_file(path).ok();
    }
}
