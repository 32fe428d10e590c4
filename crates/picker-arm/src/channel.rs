use std::io;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// The firmware prints this once it has finished executing a command.
pub const ACK_SENTINEL: u8 = b'>';

/// Bounds the wait for an ack: `attempts` windows of `delay_ms` each.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AckPolicy {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self { attempts: default_attempts(), delay_ms: default_delay_ms() }
    }
}

impl AckPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Worst-case time `send(.., true)` spends waiting.
    pub fn max_wait(&self) -> Duration {
        self.delay() * self.attempts
    }
}

fn default_attempts() -> u32 {
    100
}

fn default_delay_ms() -> u64 {
    5
}

/// Transport failures. All of these end the session.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("open arm serial {dev} @ {baud}")]
    Open {
        dev: String,
        baud: u32,
        #[source]
        source: tokio_serial::Error,
    },
    #[error("write {command:?} to arm failed")]
    Write {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("read from arm failed while waiting for ack of {command:?}")]
    Read {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("arm closed the connection while waiting for ack of {command:?}")]
    Closed { command: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Fire-and-forget command, nothing was read back.
    NotRequested,
    /// Sentinel seen during window `attempts` (1-based).
    Received { attempts: u32 },
    /// Every window elapsed without a sentinel. The motion probably finished anyway.
    TimedOut { attempts: u32 },
}

impl Ack {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Ack::TimedOut { .. })
    }
}

/// Owns the link to the arm. Commands go out strictly one at a time.
pub struct CommandChannel<T> {
    io: T,
    policy: AckPolicy,
    sent: u64,
    timeouts: u64,
}

impl CommandChannel<SerialStream> {
    pub fn open(dev: &str, baud: u32, policy: AckPolicy) -> Result<Self, ChannelError> {
        let port = tokio_serial::new(dev, baud)
            .open_native_async()
            .map_err(|source| ChannelError::Open { dev: dev.to_string(), baud, source })?;
        info!("arm: opened {} @ {}", dev, baud);
        Ok(Self::new(port, policy))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> CommandChannel<T> {
    /// A zero `attempts` is raised to one window so `wait` always listens.
    pub fn new(io: T, mut policy: AckPolicy) -> Self {
        if policy.attempts == 0 {
            warn!("arm: ack attempts = 0, using a single {}ms window", policy.delay_ms);
            policy.attempts = 1;
        }
        Self { io, policy, sent: 0, timeouts: 0 }
    }

    pub fn policy(&self) -> &AckPolicy {
        &self.policy
    }

    pub fn commands_sent(&self) -> u64 {
        self.sent
    }

    pub fn ack_timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn into_inner(self) -> T {
        self.io
    }

    /// Writes `command` plus a newline. With `wait`, polls for the sentinel
    /// until the ack budget runs out; running out is reported, not raised.
    pub async fn send(&mut self, command: &str, wait: bool) -> Result<Ack, ChannelError> {
        debug!("arm <- {}", command);
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');

        let write_err = |source| ChannelError::Write { command: command.to_string(), source };
        self.io.write_all(&line).await.map_err(write_err)?;
        self.io.flush().await.map_err(write_err)?;
        self.sent += 1;

        if !wait {
            return Ok(Ack::NotRequested);
        }

        let ack = self.wait_for_ack(command).await?;
        if let Ack::TimedOut { attempts } = ack {
            self.timeouts += 1;
            warn!(
                "arm: no ack for {:?} after {} attempts ({}ms), continuing",
                command,
                attempts,
                self.policy.max_wait().as_millis()
            );
        }
        Ok(ack)
    }

    async fn wait_for_ack(&mut self, command: &str) -> Result<Ack, ChannelError> {
        let mut inbound = Vec::new();
        let mut buf = [0u8; 64];

        for attempt in 1..=self.policy.attempts {
            let window_end = Instant::now() + self.policy.delay();
            // drain whatever arrives during this window
            loop {
                match timeout_at(window_end, self.io.read(&mut buf)).await {
                    Err(_elapsed) => break,
                    Ok(Ok(0)) => return Err(ChannelError::Closed { command: command.to_string() }),
                    Ok(Ok(n)) => {
                        inbound.extend_from_slice(&buf[..n]);
                        if inbound.contains(&ACK_SENTINEL) {
                            debug!("arm -> {:?}", String::from_utf8_lossy(&inbound));
                            return Ok(Ack::Received { attempts: attempt });
                        }
                    }
                    Ok(Err(source)) => {
                        return Err(ChannelError::Read { command: command.to_string(), source })
                    }
                }
            }
        }

        if !inbound.is_empty() {
            debug!("arm -> {:?} (no sentinel)", String::from_utf8_lossy(&inbound));
        }
        Ok(Ack::TimedOut { attempts: self.policy.attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn sentinel_mid_buffer_counts_as_ack() {
        let (ours, mut theirs) = duplex(256);
        theirs.write_all(b"OK>EXTRA").await.unwrap();

        let mut ch = CommandChannel::new(ours, AckPolicy::default());
        let ack = ch.send("M20 G90", true).await.unwrap();
        assert_eq!(ack, Ack::Received { attempts: 1 });

        let mut line = String::new();
        BufReader::new(theirs).read_line(&mut line).await.unwrap();
        assert_eq!(line, "M20 G90\n");
    }

    #[tokio::test]
    async fn fire_and_forget_does_not_read() {
        let (ours, mut theirs) = duplex(256);
        theirs.write_all(b">").await.unwrap();

        let mut ch = CommandChannel::new(ours, AckPolicy::default());
        assert_eq!(ch.send("M3 S1000", false).await.unwrap(), Ack::NotRequested);

        // the pending '>' is still unread and satisfies the next wait
        assert_eq!(ch.send("Y-20", true).await.unwrap(), Ack::Received { attempts: 1 });
        assert_eq!(ch.commands_sent(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_arm_times_out_after_full_budget() {
        let (ours, mut theirs) = duplex(256);
        theirs.write_all(b"ok\r\n").await.unwrap();

        let mut ch = CommandChannel::new(ours, AckPolicy::default());
        let start = Instant::now();
        let ack = ch.send("$H", true).await.unwrap();
        let waited = start.elapsed();

        assert_eq!(ack, Ack::TimedOut { attempts: 100 });
        assert!(ack.is_timeout());
        assert!(waited >= Duration::from_millis(500), "waited {:?}", waited);
        assert!(waited < Duration::from_millis(520), "waited {:?}", waited);
        assert_eq!(ch.ack_timeouts(), 1);
        drop(theirs);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_waits_one_window() {
        let (ours, theirs) = duplex(256);

        let mut ch = CommandChannel::new(ours, AckPolicy { attempts: 0, delay_ms: 5 });
        assert_eq!(ch.policy().attempts, 1);
        let start = Instant::now();
        let ack = ch.send("Y+20", true).await.unwrap();

        assert_eq!(ack, Ack::TimedOut { attempts: 1 });
        assert!(start.elapsed() >= Duration::from_millis(5), "waited {:?}", start.elapsed());
        drop(theirs);
    }

    #[tokio::test(start_paused = true)]
    async fn late_ack_is_picked_up_in_a_later_window() {
        let (ours, mut theirs) = duplex(256);
        let peer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(42)).await;
            theirs.write_all(b"ok>").await.unwrap();
            theirs
        });

        let mut ch = CommandChannel::new(ours, AckPolicy::default());
        match ch.send("X10 Y70 Z10", true).await.unwrap() {
            Ack::Received { attempts } => assert!((8..=10).contains(&attempts), "attempts {}", attempts),
            other => panic!("unexpected {:?}", other),
        }
        drop(peer.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn split_sentinel_across_reads() {
        let (ours, mut theirs) = duplex(256);
        let peer = tokio::spawn(async move {
            theirs.write_all(b"o").await.unwrap();
            tokio::time::sleep(Duration::from_millis(7)).await;
            theirs.write_all(b"k>").await.unwrap();
            theirs
        });

        let mut ch = CommandChannel::new(ours, AckPolicy::default());
        assert!(matches!(ch.send("A0 B0 C0", true).await.unwrap(), Ack::Received { .. }));
        drop(peer.await.unwrap());
    }

    #[tokio::test]
    async fn peer_hangup_while_waiting_is_fatal() {
        let (ours, theirs) = duplex(256);
        let peer = tokio::spawn(async move {
            let mut line = String::new();
            BufReader::new(theirs).read_line(&mut line).await.unwrap();
            line
        });

        let mut ch = CommandChannel::new(ours, AckPolicy::default());
        let err = ch.send("$H", true).await.unwrap_err();
        assert!(matches!(err, ChannelError::Closed { ref command } if command == "$H"));
        assert_eq!(peer.await.unwrap(), "$H\n");
    }

    #[tokio::test]
    async fn write_to_closed_link_is_fatal() {
        let (ours, theirs) = duplex(256);
        drop(theirs);

        let mut ch = CommandChannel::new(ours, AckPolicy::default());
        let err = ch.send("$40 = 1", false).await.unwrap_err();
        assert!(matches!(err, ChannelError::Write { .. }));
        assert_eq!(ch.commands_sent(), 0);
    }

    #[test]
    fn default_budget_is_half_a_second() {
        let p = AckPolicy::default();
        assert_eq!(p.attempts, 100);
        assert_eq!(p.max_wait(), Duration::from_millis(500));
    }
}
