use std::time::Duration;

use picker_proto::RobotCoordinate;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::channel::{Ack, ChannelError, CommandChannel};
use crate::command::ArmCommand;
use crate::MotionConfig;

/// One state of the per-apple pick script, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickStep {
    MoveAbove,
    Orient,
    SwitchRelative,
    Descend,
    Engage,
    Ascend,
    SwitchAbsolute,
    MoveToDrop,
    ReorientZero,
    Disengage,
}

impl PickStep {
    pub const ALL: [PickStep; 10] = [
        PickStep::MoveAbove,
        PickStep::Orient,
        PickStep::SwitchRelative,
        PickStep::Descend,
        PickStep::Engage,
        PickStep::Ascend,
        PickStep::SwitchAbsolute,
        PickStep::MoveToDrop,
        PickStep::ReorientZero,
        PickStep::Disengage,
    ];

    /// `None` after `Disengage`: the apple is in the cart.
    pub fn next(self) -> Option<PickStep> {
        match self {
            PickStep::MoveAbove => Some(PickStep::Orient),
            PickStep::Orient => Some(PickStep::SwitchRelative),
            PickStep::SwitchRelative => Some(PickStep::Descend),
            PickStep::Descend => Some(PickStep::Engage),
            PickStep::Engage => Some(PickStep::Ascend),
            PickStep::Ascend => Some(PickStep::SwitchAbsolute),
            PickStep::SwitchAbsolute => Some(PickStep::MoveToDrop),
            PickStep::MoveToDrop => Some(PickStep::ReorientZero),
            PickStep::ReorientZero => Some(PickStep::Disengage),
            PickStep::Disengage => None,
        }
    }

    /// The pump toggles get no reply from the controller.
    pub fn waits_for_ack(self) -> bool {
        !matches!(self, PickStep::Engage | PickStep::Disengage)
    }

    pub fn command(self, target: &RobotCoordinate, motion: &MotionConfig) -> ArmCommand {
        match self {
            PickStep::MoveAbove => ArmCommand::MoveTo(*target),
            PickStep::Orient => ArmCommand::Rotate(motion.pick_orientation),
            PickStep::SwitchRelative => ArmCommand::Relative,
            PickStep::Descend => ArmCommand::NudgeY(motion.descend_mm),
            PickStep::Engage => ArmCommand::Suction { power: motion.suction_power },
            PickStep::Ascend => ArmCommand::NudgeY(-motion.descend_mm),
            PickStep::SwitchAbsolute => ArmCommand::Absolute,
            PickStep::MoveToDrop => ArmCommand::MoveTo(motion.drop_zone),
            PickStep::ReorientZero => ArmCommand::Rotate(motion.drop_orientation),
            PickStep::Disengage => ArmCommand::Suction { power: 0 },
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: PickStep,
    pub command: String,
    pub ack: Ack,
}

#[derive(Debug, Clone)]
pub struct PickOutcome {
    pub target: RobotCoordinate,
    pub steps: Vec<StepRecord>,
}

impl PickOutcome {
    pub fn ack_timeouts(&self) -> u32 {
        self.steps.iter().filter(|s| s.ack.is_timeout()).count() as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub picks: Vec<PickOutcome>,
    /// Ack of the final `$H`; `None` until it has been sent.
    pub home: Option<Ack>,
}

impl SessionSummary {
    pub fn ack_timeouts(&self) -> u32 {
        let home = self.home.map(|a| a.is_timeout() as u32).unwrap_or(0);
        self.picks.iter().map(PickOutcome::ack_timeouts).sum::<u32>() + home
    }
}

/// A transport failure cut the session short. `summary` holds the picks
/// that finished before it; the target at `summary.picks.len()` was in flight.
#[derive(Error, Debug)]
#[error("pick session aborted after {} completed picks", .summary.picks.len())]
pub struct SessionAborted {
    pub summary: SessionSummary,
    #[source]
    pub source: ChannelError,
}

pub struct PickSequencer {
    motion: MotionConfig,
}

impl PickSequencer {
    pub fn new(motion: MotionConfig) -> Self {
        Self { motion }
    }

    pub fn motion(&self) -> &MotionConfig {
        &self.motion
    }

    /// One-time arm setup: feedback on, home, absolute/linear mode, pump off.
    pub async fn prepare<T>(&self, ch: &mut CommandChannel<T>) -> Result<(), ChannelError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        info!("arm: preparing");
        issue(ch, ArmCommand::EnableFeedback, false).await?;
        issue(ch, ArmCommand::Home, true).await?;
        tokio::time::sleep(Duration::from_millis(self.motion.home_settle_ms)).await;
        issue(ch, ArmCommand::AbsoluteLinear { feed_rate: self.motion.feed_rate }, false).await?;
        issue(ch, ArmCommand::Suction { power: 0 }, true).await?;
        Ok(())
    }

    /// Walks the ten-step script for one target. Stops at the first fatal error;
    /// ack timeouts are recorded and the script carries on.
    pub async fn pick<T>(&self, target: &RobotCoordinate, ch: &mut CommandChannel<T>) -> Result<PickOutcome, ChannelError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut steps = Vec::with_capacity(PickStep::ALL.len());
        let mut state = Some(PickStep::MoveAbove);
        while let Some(step) = state {
            let cmd = step.command(target, &self.motion);
            let ack = issue(ch, cmd, step.waits_for_ack()).await?;
            if ack.is_timeout() {
                warn!("pick: {:?} not acknowledged, assuming it completed", step);
            }
            steps.push(StepRecord { step, command: cmd.to_string(), ack });
            state = step.next();
        }
        Ok(PickOutcome { target: *target, steps })
    }

    pub async fn return_home<T>(&self, ch: &mut CommandChannel<T>) -> Result<Ack, ChannelError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        info!("Returning to home position");
        issue(ch, ArmCommand::Home, true).await
    }

    /// Picks every target once, in order, then homes. No re-scan in between.
    pub async fn run<T>(&self, targets: &[RobotCoordinate], ch: &mut CommandChannel<T>) -> Result<SessionSummary, SessionAborted>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut summary = SessionSummary::default();
        for (i, target) in targets.iter().enumerate() {
            info!("Apple {}: output position {}", i + 1, ArmCommand::MoveTo(*target));
            match self.pick(target, ch).await {
                Ok(outcome) => summary.picks.push(outcome),
                Err(source) => return Err(SessionAborted { summary, source }),
            }
        }
        match self.return_home(ch).await {
            Ok(ack) => summary.home = Some(ack),
            Err(source) => return Err(SessionAborted { summary, source }),
        }
        Ok(summary)
    }
}

async fn issue<T>(ch: &mut CommandChannel<T>, cmd: ArmCommand, wait: bool) -> Result<Ack, ChannelError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let ack = ch.send(&cmd.to_string(), wait).await?;
    debug!("arm: {} -> {:?}", cmd, ack);
    Ok(ack)
}
