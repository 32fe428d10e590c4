use picker_proto::{DetectedTarget, RobotCoordinate};
use tracing::debug;

use crate::model::CalibrationModel;

/// Maps sensor centroids into arm space.
///
/// Camera x drives robot x and camera y drives robot z; that pairing is
/// fixed by how the camera is mounted. Robot y is the approach depth and
/// is never calibrated.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    model_x: CalibrationModel,
    model_z: CalibrationModel,
    offset_x: f64,
    offset_z: f64,
    approach_y: f64,
}

impl CoordinateMapper {
    pub fn new(
        model_x: CalibrationModel,
        model_z: CalibrationModel,
        offset_x: f64,
        offset_z: f64,
        approach_y: f64,
    ) -> Self {
        Self { model_x, model_z, offset_x, offset_z, approach_y }
    }

    pub fn model_x(&self) -> &CalibrationModel {
        &self.model_x
    }

    pub fn model_z(&self) -> &CalibrationModel {
        &self.model_z
    }

    pub fn map(&self, target: DetectedTarget) -> RobotCoordinate {
        RobotCoordinate {
            x: self.model_x.predict(target.pixel_x as f64) + self.offset_x,
            y: self.approach_y,
            z: self.model_z.predict(target.pixel_y as f64) + self.offset_z,
        }
    }

    /// Output order is detection order; nothing is re-sorted.
    pub fn transform(&self, targets: &[DetectedTarget]) -> Vec<RobotCoordinate> {
        let out: Vec<_> = targets.iter().map(|t| self.map(*t)).collect();
        debug!("pipeline: mapped {} targets", out.len());
        out
    }
}
