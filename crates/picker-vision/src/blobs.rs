use anyhow::Result;
use image::RgbImage;
use tracing::{debug, warn};

use crate::{Blob, Detector, Rect, VisionConfig};

/// Colour-threshold blob finder.
///
/// Seeds are sampled every `x_stride`/`y_stride` pixels inside the ROI; each
/// matching seed is grown into its 4-connected region (every pixel counts, not
/// just the sampled ones). Regions under `pixels_threshold` are dropped. Blobs
/// come out in scan order: top to bottom, then left to right by seed.
pub struct BlobDetector {
    cfg: VisionConfig,
}

impl BlobDetector {
    pub fn new(cfg: VisionConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.cfg
    }

    pub fn find_blobs(&self, frame: &RgbImage) -> Vec<Blob> {
        let Some(roi) = self.cfg.roi.clamp_to(frame.width(), frame.height()) else {
            warn!("vision: roi {:?} lies outside the {}x{} frame", self.cfg.roi, frame.width(), frame.height());
            return Vec::new();
        };

        let (rw, rh) = (roi.w as usize, roi.h as usize);
        let mask: Vec<bool> = (0..rh)
            .flat_map(|dy| (0..rw).map(move |dx| (dx, dy)))
            .map(|(dx, dy)| {
                let p = frame.get_pixel(roi.x + dx as u32, roi.y + dy as u32);
                self.cfg.threshold.matches_rgb(p.0)
            })
            .collect();
        let mut visited = vec![false; mask.len()];

        let xs = self.cfg.x_stride.max(1) as usize;
        let ys = self.cfg.y_stride.max(1) as usize;
        let mut out = Vec::new();
        let mut stack = Vec::new();

        for sy in (0..rh).step_by(ys) {
            for sx in (0..rw).step_by(xs) {
                let seed = sy * rw + sx;
                if !mask[seed] || visited[seed] {
                    continue;
                }

                let mut region = Region::new(sx, sy);
                visited[seed] = true;
                stack.push((sx, sy));
                while let Some((x, y)) = stack.pop() {
                    region.add(x, y);
                    let mut visit = |nx: usize, ny: usize| {
                        let i = ny * rw + nx;
                        if mask[i] && !visited[i] {
                            visited[i] = true;
                            stack.push((nx, ny));
                        }
                    };
                    if x > 0 {
                        visit(x - 1, y);
                    }
                    if x + 1 < rw {
                        visit(x + 1, y);
                    }
                    if y > 0 {
                        visit(x, y - 1);
                    }
                    if y + 1 < rh {
                        visit(x, y + 1);
                    }
                }

                if region.count >= self.cfg.pixels_threshold as u64 {
                    out.push(region.into_blob(roi));
                } else {
                    debug!("vision: dropped {}px blob at ({}, {})", region.count, roi.x as usize + sx, roi.y as usize + sy);
                }
            }
        }
        out
    }
}

impl Detector for BlobDetector {
    fn detect_rgb(&mut self, frame: &RgbImage) -> Result<Vec<Blob>> {
        Ok(self.find_blobs(frame))
    }
}

struct Region {
    count: u64,
    sum_x: u64,
    sum_y: u64,
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
}

impl Region {
    fn new(x: usize, y: usize) -> Self {
        Self { count: 0, sum_x: 0, sum_y: 0, min_x: x, max_x: x, min_y: y, max_y: y }
    }

    fn add(&mut self, x: usize, y: usize) {
        self.count += 1;
        self.sum_x += x as u64;
        self.sum_y += y as u64;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    // ROI-local -> frame coordinates, centroid rounded to the nearest pixel
    fn into_blob(self, roi: Rect) -> Blob {
        let n = self.count as f64;
        Blob {
            rect: Rect::new(
                roi.x + self.min_x as u32,
                roi.y + self.min_y as u32,
                (self.max_x - self.min_x + 1) as u32,
                (self.max_y - self.min_y + 1) as u32,
            ),
            cx: roi.x as i32 + (self.sum_x as f64 / n).round() as i32,
            cy: roi.y as i32 + (self.sum_y as f64 / n).round() as i32,
            pixels: self.count as u32,
        }
    }
}
