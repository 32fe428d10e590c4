use anyhow::Result;
use tracing::info;

use crate::ArmConfig;

pub fn check_arm(cfg: &ArmConfig) -> Result<()> {
    anyhow::ensure!(!cfg.serial_dev.is_empty(), "arm.serial_dev missing");
    anyhow::ensure!(cfg.baud > 0, "arm.baud invalid");
    anyhow::ensure!(cfg.ack.attempts >= 1, "arm.ack.attempts must be >= 1");
    anyhow::ensure!(cfg.ack.delay_ms >= 1, "arm.ack.delay_ms must be >= 1");

    let m = &cfg.motion;
    anyhow::ensure!(m.descend_mm.is_finite() && m.descend_mm > 0.0, "arm.motion.descend_mm must be positive");
    let dz = m.drop_zone;
    anyhow::ensure!(dz.x.is_finite() && dz.y.is_finite() && dz.z.is_finite(), "arm.motion.drop_zone must be finite");
    anyhow::ensure!(m.suction_power > 0, "arm.motion.suction_power must be > 0");
    anyhow::ensure!(m.feed_rate > 0, "arm.motion.feed_rate must be > 0");

    info!(
        "doctor: arm {} @ {} baud, ack budget {:?} per command",
        cfg.serial_dev, cfg.baud, cfg.ack.max_wait()
    );
    Ok(())
}
