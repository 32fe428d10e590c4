pub mod doctor;
pub mod model;
pub mod pipeline;

use serde::Deserialize;

pub use model::{CalibrationError, CalibrationModel, CalibrationSample};
pub use pipeline::CoordinateMapper;

/// One axis worth of paired measurements, written as two parallel lists.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisSamples {
    pub camera: Vec<f64>,
    pub robot: Vec<f64>,
}

impl AxisSamples {
    pub fn samples(&self) -> Result<Vec<CalibrationSample>, CalibrationError> {
        model::zip_samples(&self.camera, &self.robot)
    }

    pub fn fit(&self) -> Result<CalibrationModel, CalibrationError> {
        CalibrationModel::fit(&self.samples()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// camera x -> robot x
    #[serde(default = "default_x")]
    pub x: AxisSamples,

    /// camera y -> robot z (the arm moves in z where the camera sees y)
    #[serde(default = "default_z")]
    pub z: AxisSamples,

    #[serde(default = "default_offset_x")]
    pub offset_x: f64,
    #[serde(default = "default_offset_z")]
    pub offset_z: f64,

    /// Constant robot y used for every approach move.
    #[serde(default = "default_approach_y")]
    pub approach_y: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            x: default_x(),
            z: default_z(),
            offset_x: default_offset_x(),
            offset_z: default_offset_z(),
            approach_y: default_approach_y(),
        }
    }
}

impl CalibrationConfig {
    /// Fits both axes. Called once at startup; a degenerate set is a config error.
    pub fn build_mapper(&self) -> Result<CoordinateMapper, CalibrationError> {
        let model_x = self.x.fit()?;
        let model_z = self.z.fit()?;
        Ok(CoordinateMapper::new(model_x, model_z, self.offset_x, self.offset_z, self.approach_y))
    }
}

fn default_x() -> AxisSamples {
    AxisSamples {
        camera: vec![43.0, 61.0, 84.0, 80.0],
        robot: vec![197.0, 215.0, 231.0, 247.0],
    }
}

fn default_z() -> AxisSamples {
    AxisSamples {
        camera: vec![93.0, 105.0, 105.0, 100.0],
        robot: vec![126.0, 100.0, 132.0, 100.0],
    }
}

fn default_offset_x() -> f64 {
    -2.5
}

fn default_offset_z() -> f64 {
    1.2
}

fn default_approach_y() -> f64 {
    70.0
}

