use std::fmt;

use picker_proto::RobotCoordinate;
use serde::Deserialize;

/// Wrist rotation in degrees (A/B/C joints).
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Orientation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// The subset of the controller's G-code dialect this crate speaks.
///
/// Syntax is owned by the arm firmware; `Display` renders the exact line
/// body that goes over the wire (the channel appends the newline).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArmCommand {
    /// `$40 = 1`: the controller starts answering with the ack sentinel.
    EnableFeedback,
    Home,
    /// Absolute coordinates, linear moves, feed rate in one go.
    AbsoluteLinear { feed_rate: u32 },
    Absolute,
    Relative,
    MoveTo(RobotCoordinate),
    /// Relative move along Y; positive is towards the tree.
    NudgeY(f64),
    Rotate(Orientation),
    /// Air pump duty, 0 turns it off.
    Suction { power: u32 },
}

impl fmt::Display for ArmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmCommand::EnableFeedback => write!(f, "$40 = 1"),
            ArmCommand::Home => write!(f, "$H"),
            ArmCommand::AbsoluteLinear { feed_rate } => write!(f, "M20 G90 G00 F{}", feed_rate),
            ArmCommand::Absolute => write!(f, "M20 G90"),
            ArmCommand::Relative => write!(f, "M20 G91"),
            ArmCommand::MoveTo(p) => write!(f, "X{} Y{} Z{}", axis(p.x), axis(p.y), axis(p.z)),
            ArmCommand::NudgeY(dy) => {
                let sign = if *dy < 0.0 { "-" } else { "+" };
                write!(f, "Y{}{}", sign, axis(dy.abs()))
            }
            ArmCommand::Rotate(o) => write!(f, "A{} B{} C{}", axis(o.a), axis(o.b), axis(o.c)),
            ArmCommand::Suction { power } => write!(f, "M3 S{}", power),
        }
    }
}

// Whole numbers go out bare ("X200"), the rest with two decimals ("X212.67").
// The controller parses both forms.
fn axis(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1.0e9 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_firmware_lines() {
        assert_eq!(ArmCommand::EnableFeedback.to_string(), "$40 = 1");
        assert_eq!(ArmCommand::Home.to_string(), "$H");
        assert_eq!(ArmCommand::AbsoluteLinear { feed_rate: 1000 }.to_string(), "M20 G90 G00 F1000");
        assert_eq!(ArmCommand::Relative.to_string(), "M20 G91");
        assert_eq!(ArmCommand::Absolute.to_string(), "M20 G90");
        assert_eq!(ArmCommand::Suction { power: 0 }.to_string(), "M3 S0");
        assert_eq!(ArmCommand::Rotate(Orientation { a: 90.0, b: 0.0, c: 0.0 }).to_string(), "A90 B0 C0");
    }

    #[test]
    fn moves_use_two_decimals_only_when_needed() {
        let cmd = ArmCommand::MoveTo(RobotCoordinate::new(212.672_897, 70.0, 116.207_75));
        assert_eq!(cmd.to_string(), "X212.67 Y70 Z116.21");
        let cmd = ArmCommand::MoveTo(RobotCoordinate::new(295.0, 10.0, 120.0));
        assert_eq!(cmd.to_string(), "X295 Y10 Z120");
        let cmd = ArmCommand::MoveTo(RobotCoordinate::new(-3.5, 0.0, 7.126));
        assert_eq!(cmd.to_string(), "X-3.50 Y0 Z7.13");
    }

    #[test]
    fn nudges_carry_an_explicit_sign() {
        assert_eq!(ArmCommand::NudgeY(20.0).to_string(), "Y+20");
        assert_eq!(ArmCommand::NudgeY(-20.0).to_string(), "Y-20");
        assert_eq!(ArmCommand::NudgeY(-12.25).to_string(), "Y-12.25");
    }
}
