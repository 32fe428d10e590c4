use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use serde::Deserialize;
use tracing::info;

use crate::{Blob, Point, Rect};

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_output_path")]
    pub output_path: String,
    /// Centre of the tree, used to line the camera up.
    #[serde(default = "default_tree_center")]
    pub tree_center: Point,
    #[serde(default = "default_inspection_box")]
    pub inspection_box: Rect,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enable: false,
            output_path: default_output_path(),
            tree_center: default_tree_center(),
            inspection_box: default_inspection_box(),
        }
    }
}

fn default_output_path() -> String {
    "picker-frame.png".into()
}

fn default_tree_center() -> Point {
    Point { x: 55, y: 107 }
}

fn default_inspection_box() -> Rect {
    Rect::new(32, 70, 60, 50)
}

/// Alignment marks in black, every blob boxed and crossed in white.
pub fn annotate(frame: &mut RgbImage, cfg: &DisplayConfig, blobs: &[Blob]) {
    draw_cross(frame, cfg.tree_center.x as i64, cfg.tree_center.y as i64, 10, BLACK);
    draw_rect(frame, cfg.inspection_box, BLACK);
    for b in blobs {
        draw_rect(frame, b.rect, WHITE);
        draw_cross(frame, b.cx as i64, b.cy as i64, 5, WHITE);
    }
}

/// Annotates a copy of `frame` and writes it to `cfg.output_path`.
pub fn show(frame: &RgbImage, cfg: &DisplayConfig, blobs: &[Blob]) -> Result<()> {
    let mut canvas = frame.clone();
    annotate(&mut canvas, cfg, blobs);
    canvas
        .save(&cfg.output_path)
        .with_context(|| format!("write display frame {}", cfg.output_path))?;
    info!("display: wrote {} ({} blobs)", cfg.output_path, blobs.len());
    Ok(())
}

fn put(frame: &mut RgbImage, x: i64, y: i64, c: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < frame.width() as u64 && (y as u64) < frame.height() as u64 {
        frame.put_pixel(x as u32, y as u32, c);
    }
}

// `size` is the full arm length, centred on (cx, cy)
fn draw_cross(frame: &mut RgbImage, cx: i64, cy: i64, size: i64, c: Rgb<u8>) {
    let half = size / 2;
    for d in -half..=half {
        put(frame, cx + d, cy, c);
        put(frame, cx, cy + d, c);
    }
}

fn draw_rect(frame: &mut RgbImage, r: Rect, c: Rgb<u8>) {
    if r.w == 0 || r.h == 0 {
        return;
    }
    let (x0, y0) = (r.x as i64, r.y as i64);
    let (x1, y1) = (x0 + r.w as i64 - 1, y0 + r.h as i64 - 1);
    for x in x0..=x1 {
        put(frame, x, y0, c);
        put(frame, x, y1, c);
    }
    for y in y0..=y1 {
        put(frame, x0, y, c);
        put(frame, x1, y, c);
    }
}
