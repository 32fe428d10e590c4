use serde::Deserialize;

/// Inclusive CIE L*a*b* box, written (L min, L max, A min, A max, B min, B max).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LabThreshold {
    pub l_min: f32,
    pub l_max: f32,
    pub a_min: f32,
    pub a_max: f32,
    pub b_min: f32,
    pub b_max: f32,
}

impl Default for LabThreshold {
    /// Red apples under the rig's lighting.
    fn default() -> Self {
        Self { l_min: 20.0, l_max: 71.0, a_min: 15.0, a_max: 45.0, b_min: -15.0, b_max: 40.0 }
    }
}

impl LabThreshold {
    pub fn contains(&self, (l, a, b): (f32, f32, f32)) -> bool {
        (self.l_min..=self.l_max).contains(&l)
            && (self.a_min..=self.a_max).contains(&a)
            && (self.b_min..=self.b_max).contains(&b)
    }

    pub fn matches_rgb(&self, rgb: [u8; 3]) -> bool {
        self.contains(rgb_to_lab(rgb))
    }

    pub fn is_well_formed(&self) -> bool {
        self.l_min <= self.l_max && self.a_min <= self.a_max && self.b_min <= self.b_max
    }
}

// D65 reference white
const XN: f32 = 0.950_47;
const YN: f32 = 1.0;
const ZN: f32 = 1.088_83;

/// 8-bit sRGB to L*a*b* (L in 0..=100, a/b roughly -128..=127).
pub fn rgb_to_lab([r, g, b]: [u8; 3]) -> (f32, f32, f32) {
    let (r, g, b) = (linear(r), linear(g), linear(b));

    let x = 0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b;
    let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175 * b;
    let z = 0.019_333_9 * r + 0.119_192 * g + 0.950_304_1 * b;

    let fx = f(x / XN);
    let fy = f(y / YN);
    let fz = f(z / ZN);
    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

fn linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn f(t: f32) -> f32 {
    const EPS: f32 = 216.0 / 24389.0;
    const KAPPA: f32 = 24389.0 / 27.0;
    if t > EPS {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reference_colours() {
        let (l, a, b) = rgb_to_lab([255, 255, 255]);
        assert_relative_eq!(l, 100.0, epsilon = 0.05);
        assert_relative_eq!(a, 0.0, epsilon = 0.05);
        assert_relative_eq!(b, 0.0, epsilon = 0.05);

        let (l, a, b) = rgb_to_lab([0, 0, 0]);
        assert_relative_eq!(l, 0.0, epsilon = 1e-4);
        assert_relative_eq!(a, 0.0, epsilon = 1e-4);
        assert_relative_eq!(b, 0.0, epsilon = 1e-4);

        let (l, a, b) = rgb_to_lab([255, 0, 0]);
        assert_relative_eq!(l, 53.24, epsilon = 0.1);
        assert_relative_eq!(a, 80.09, epsilon = 0.2);
        assert_relative_eq!(b, 67.20, epsilon = 0.2);
    }

    #[test]
    fn apple_threshold_picks_dull_red_only() {
        let t = LabThreshold::default();
        assert!(t.matches_rgb([150, 60, 60]));
        assert!(!t.matches_rgb([60, 150, 60]), "leaf green");
        assert!(!t.matches_rgb([255, 255, 255]), "sky");
        assert!(!t.matches_rgb([255, 0, 0]), "saturated red is outside the a* band");
    }

    #[test]
    fn inverted_bounds_are_flagged() {
        let t = LabThreshold { l_min: 80.0, ..LabThreshold::default() };
        assert!(!t.is_well_formed());
        assert!(LabThreshold::default().is_well_formed());
    }
}
