use serde::{Deserialize, Serialize};

/// Blob centroid in sensor pixels, as handed over by the vision side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedTarget {
    pub pixel_x: i32,
    pub pixel_y: i32,
}

impl DetectedTarget {
    pub fn new(pixel_x: i32, pixel_y: i32) -> Self {
        Self { pixel_x, pixel_y }
    }
}

/// Arm-space position in millimetres. `y` is the approach depth axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotCoordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RobotCoordinate {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}
