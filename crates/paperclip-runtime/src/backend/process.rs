//! Process helpers for a spawned llama-server: port allocation and graceful
//! shutdown with SIGTERM → SIGKILL escalation.

use std::io;
use std::net::TcpListener;
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::process::Child;
use tracing::debug;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// First port tried for a spawned server.
pub const DEFAULT_BASE_PORT: u16 = 9400;

const PORT_RANGE: u16 = 100;
#[cfg_attr(not(unix), allow(dead_code))]
const GRACE_PERIOD: Duration = Duration::from_secs(5);

fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Allocate a free local port in `base_port..base_port + 100`, skipping `used`.
pub async fn allocate_port(base_port: u16, used: &[u16]) -> Result<u16> {
    for attempt in 0..3 {
        for offset in 0..PORT_RANGE {
            let Some(port) = base_port.checked_add(offset) else {
                break;
            };
            if used.contains(&port) || !is_port_available(port) {
                continue;
            }
            // Double-check; another process may have grabbed it.
            tokio::time::sleep(Duration::from_millis(10)).await;
            if is_port_available(port) {
                debug!(port, attempt = attempt + 1, "Allocated available port");
                return Ok(port);
            }
        }
        if attempt < 2 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    Err(anyhow!(
        "No available ports in range {}-{}",
        base_port,
        base_port.saturating_add(PORT_RANGE - 1)
    ))
}

/// Gracefully shut down a child process.
///
/// Unix: SIGTERM, wait up to 5 seconds, then SIGKILL and reap.
/// Elsewhere: kill immediately.
pub async fn shutdown_child(mut child: Child) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        let Some(pid) = child.id() else {
            // Already reaped.
            return child.wait().await;
        };
        let pid = i32::try_from(pid).map_err(io::Error::other)?;

        if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
            if e == nix::errno::Errno::ESRCH {
                return child.wait().await;
            }
            return Err(io::Error::other(e));
        }

        if let Ok(result) = tokio::time::timeout(GRACE_PERIOD, child.wait()).await {
            return result;
        }
        debug!(pid, "llama-server ignored SIGTERM, sending SIGKILL");
    }

    child.kill().await?;
    child.wait().await
}
