use anyhow::{Context, Result};
use tracing::info;

use crate::CalibrationConfig;

pub fn check_calibration(cfg: &CalibrationConfig) -> Result<()> {
    let x = cfg.x.fit().context("calibration.x")?;
    let z = cfg.z.fit().context("calibration.z")?;
    info!(
        "calibration: x slope={:.4} intercept={:.3}, z slope={:.4} intercept={:.3}",
        x.slope, x.intercept, z.slope, z.intercept
    );
    anyhow::ensure!(cfg.offset_x.is_finite() && cfg.offset_z.is_finite(), "calibration offsets must be finite");
    anyhow::ensure!(cfg.approach_y.is_finite(), "calibration.approach_y must be finite");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AxisSamples;

    #[test]
    fn default_config_passes() {
        check_calibration(&CalibrationConfig::default()).unwrap();
    }

    #[test]
    fn degenerate_axis_is_reported_with_its_name() {
        let cfg = CalibrationConfig {
            z: AxisSamples { camera: vec![100.0, 100.0], robot: vec![1.0, 2.0] },
            ..CalibrationConfig::default()
        };
        let err = check_calibration(&cfg).unwrap_err();
        assert!(format!("{:#}", err).contains("calibration.z"));
        assert!(format!("{:#}", err).contains("degenerate"));
    }
}
