use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("need at least 2 calibration samples, got {0}")]
    TooFewSamples(usize),
    #[error("camera/robot sample lists differ in length ({camera} vs {robot})")]
    LengthMismatch { camera: usize, robot: usize },
    #[error("calibration sample {index} is not finite")]
    NonFinite { index: usize },
    /// Every camera-side input is the same value, so the slope is undefined.
    #[error("degenerate calibration: all camera inputs equal {0}")]
    Degenerate(f64),
}

/// One paired measurement: sensor-space `input`, robot-space `output`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub input: f64,
    pub output: f64,
}

impl CalibrationSample {
    pub fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }
}

/// Straight-line map `output = slope * input + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationModel {
    pub slope: f64,
    pub intercept: f64,
}

impl CalibrationModel {
    /// Closed-form ordinary least squares over the whole sample set.
    pub fn fit(samples: &[CalibrationSample]) -> Result<Self, CalibrationError> {
        let n = samples.len();
        if n < 2 {
            return Err(CalibrationError::TooFewSamples(n));
        }
        if let Some(index) = samples.iter().position(|s| !s.input.is_finite() || !s.output.is_finite()) {
            return Err(CalibrationError::NonFinite { index });
        }

        let nf = n as f64;
        let (mut sx, mut sy, mut sx2, mut sxy) = (0.0, 0.0, 0.0, 0.0);
        for s in samples {
            sx += s.input;
            sy += s.output;
            sx2 += s.input * s.input;
            sxy += s.input * s.output;
        }

        let first = samples[0].input;
        let denom = nf * sx2 - sx * sx;
        // n*Σx² - (Σx)² is n² times the input variance, so only cancellation can push it to <= 0
        if samples.iter().all(|s| s.input == first) || !denom.is_finite() || denom <= 0.0 {
            return Err(CalibrationError::Degenerate(first));
        }

        let slope = (nf * sxy - sx * sy) / denom;
        let intercept = (sy - slope * sx) / nf;
        Ok(Self { slope, intercept })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Root-mean-square residual of the model over `samples`.
    pub fn rms_error(&self, samples: &[CalibrationSample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = samples
            .iter()
            .map(|s| (self.predict(s.input) - s.output).powi(2))
            .sum();
        (sum / samples.len() as f64).sqrt()
    }
}

/// Zips two parallel lists, the shape the sample sets are written in.
pub fn zip_samples(camera: &[f64], robot: &[f64]) -> Result<Vec<CalibrationSample>, CalibrationError> {
    if camera.len() != robot.len() {
        return Err(CalibrationError::LengthMismatch { camera: camera.len(), robot: robot.len() });
    }
    Ok(camera
        .iter()
        .zip(robot)
        .map(|(&input, &output)| CalibrationSample::new(input, output))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn samples(pairs: &[(f64, f64)]) -> Vec<CalibrationSample> {
        pairs.iter().map(|&(x, y)| CalibrationSample::new(x, y)).collect()
    }

    #[test]
    fn collinear_points_fit_exactly() {
        let s = samples(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)]);
        let model = CalibrationModel::fit(&s).unwrap();

        assert_relative_eq!(model.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(model.intercept, 0.0, epsilon = 1e-12);
        assert_relative_eq!(model.predict(5.0), 10.0, epsilon = 1e-12);
        for p in &s {
            assert_relative_eq!(model.predict(p.input), p.output, epsilon = 1e-12);
        }
        assert_relative_eq!(model.rms_error(&s), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn x_axis_reference_set() {
        let s = zip_samples(&[43.0, 61.0, 84.0, 80.0], &[197.0, 215.0, 231.0, 247.0]).unwrap();
        let model = CalibrationModel::fit(&s).unwrap();

        // n=4, Σx=268, Σy=890, Σx²=19026, Σxy=60750
        let slope = 4480.0 / 4280.0;
        let intercept = (890.0 - slope * 268.0) / 4.0;
        assert_relative_eq!(model.slope, slope, epsilon = 1e-12);
        assert_relative_eq!(model.intercept, intercept, epsilon = 1e-9);
        assert_relative_eq!(model.predict(60.0), 215.172_897_196_261_7, epsilon = 1e-9);
    }

    #[test]
    fn z_axis_reference_set_has_negative_slope() {
        let s = zip_samples(&[93.0, 105.0, 105.0, 100.0], &[126.0, 100.0, 132.0, 100.0]).unwrap();
        let model = CalibrationModel::fit(&s).unwrap();

        assert_relative_eq!(model.slope, -262.0 / 387.0, epsilon = 1e-12);
        assert!(model.rms_error(&s) > 0.0);
    }

    #[test]
    fn identical_inputs_are_degenerate() {
        let s = samples(&[(7.0, 1.0), (7.0, 2.0), (7.0, 3.0)]);
        assert_eq!(CalibrationModel::fit(&s), Err(CalibrationError::Degenerate(7.0)));
    }

    #[test]
    fn large_identical_inputs_are_degenerate() {
        let s = samples(&[(1.0e6 + 0.1, 1.0), (1.0e6 + 0.1, 2.0)]);
        assert!(matches!(CalibrationModel::fit(&s), Err(CalibrationError::Degenerate(_))));
    }

    #[test]
    fn needs_two_samples() {
        assert_eq!(CalibrationModel::fit(&[]), Err(CalibrationError::TooFewSamples(0)));
        let one = samples(&[(1.0, 1.0)]);
        assert_eq!(CalibrationModel::fit(&one), Err(CalibrationError::TooFewSamples(1)));
    }

    #[test]
    fn rejects_nan_samples() {
        let s = samples(&[(1.0, 1.0), (f64::NAN, 2.0)]);
        assert_eq!(CalibrationModel::fit(&s), Err(CalibrationError::NonFinite { index: 1 }));
    }

    #[test]
    fn zip_rejects_uneven_lists() {
        let err = zip_samples(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(err, CalibrationError::LengthMismatch { camera: 2, robot: 1 });
    }
}
