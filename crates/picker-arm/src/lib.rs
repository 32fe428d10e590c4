pub mod channel;
pub mod command;
pub mod doctor;
pub mod sequencer;
pub mod sim;

use picker_proto::RobotCoordinate;
use serde::Deserialize;

pub use channel::{Ack, AckPolicy, ChannelError, CommandChannel};
pub use command::{ArmCommand, Orientation};
pub use sequencer::{PickOutcome, PickSequencer, PickStep, SessionAborted, SessionSummary};

#[derive(Debug, Clone, Deserialize)]
pub struct ArmConfig {
    /// Serial device the arm controller is attached to, e.g. /dev/ttyUSB0.
    pub serial_dev: String,

    #[serde(default = "default_baud")]
    pub baud: u32,

    #[serde(default)]
    pub ack: AckPolicy,

    #[serde(default)]
    pub motion: MotionConfig,
}

/// Fixed geometry of a pick. Defaults match the tree rig the calibration sets were taken on.
#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    /// Relative Y travel from the approach point down to the apple.
    #[serde(default = "default_descend_mm")]
    pub descend_mm: f64,

    #[serde(default = "default_pick_orientation")]
    pub pick_orientation: Orientation,

    #[serde(default)]
    pub drop_orientation: Orientation,

    #[serde(default = "default_drop_zone")]
    pub drop_zone: RobotCoordinate,

    #[serde(default = "default_suction_power")]
    pub suction_power: u32,

    #[serde(default = "default_feed_rate")]
    pub feed_rate: u32,

    /// Homing is not acknowledged reliably, so preparation sleeps after it.
    #[serde(default = "default_home_settle_ms")]
    pub home_settle_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            descend_mm: default_descend_mm(),
            pick_orientation: default_pick_orientation(),
            drop_orientation: Orientation::default(),
            drop_zone: default_drop_zone(),
            suction_power: default_suction_power(),
            feed_rate: default_feed_rate(),
            home_settle_ms: default_home_settle_ms(),
        }
    }
}

fn default_baud() -> u32 {
    115200
}

fn default_descend_mm() -> f64 {
    20.0
}

fn default_pick_orientation() -> Orientation {
    Orientation { a: 90.0, b: 0.0, c: 0.0 }
}

fn default_drop_zone() -> RobotCoordinate {
    RobotCoordinate::new(295.0, 10.0, 120.0)
}

fn default_suction_power() -> u32 {
    1000
}

fn default_feed_rate() -> u32 {
    1000
}

fn default_home_settle_ms() -> u64 {
    8000
}

