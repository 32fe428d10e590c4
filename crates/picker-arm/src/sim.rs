//! In-process stand-in for the arm controller.
//!
//! Speaks the same line protocol over a `tokio::io::duplex` pipe and records
//! every line it receives. Used by `picker run --dry-run` and the tests.

use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBehavior {
    /// Answer every line with the ack sentinel, like the real controller with feedback on.
    AckAll,
    /// Read and record, never answer.
    Silent,
    /// Ack until `n` lines have arrived, then drop the connection.
    HangUpAfter(usize),
}

const SIM_BUFFER: usize = 4096;

/// Returns the host end of the pipe and a handle that yields the received
/// lines once the host end is dropped (or the sim hangs up).
pub fn spawn(behavior: SimBehavior) -> (DuplexStream, JoinHandle<Vec<String>>) {
    let (host, device) = duplex(SIM_BUFFER);
    let handle = tokio::spawn(run_firmware(device, behavior));
    (host, handle)
}

async fn run_firmware(device: DuplexStream, behavior: SimBehavior) -> Vec<String> {
    let (rd, mut wr) = tokio::io::split(device);
    let mut lines = BufReader::new(rd).lines();
    let mut received = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        debug!("sim arm <- {}", line);
        received.push(line);
        let ack = match behavior {
            SimBehavior::AckAll => true,
            SimBehavior::Silent => false,
            SimBehavior::HangUpAfter(n) if received.len() >= n => break,
            SimBehavior::HangUpAfter(_) => true,
        };
        if ack && wr.write_all(b"ok>\r\n").await.is_err() {
            break;
        }
    }
    received
}
