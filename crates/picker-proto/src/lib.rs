pub mod report;
pub mod target;

pub use target::{DetectedTarget, RobotCoordinate};
