//! "Is anything there?" checks run before a host is enriched.

use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;

use futures::future::select_ok;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use ledgr_common::config::ReachabilityMethod;
use ledgr_common::error::ProbeError;

use crate::network::tcp;

/// Ports raced by the handshake check. Any answer, even a reset, counts.
pub const HANDSHAKE_PORTS: [u16; 4] = [80, 443, 22, 445];

#[derive(Debug, Clone)]
pub struct Reachability {
    method: ReachabilityMethod,
    timeout: Duration,
}

impl Reachability {
    pub fn new(method: ReachabilityMethod, timeout: Duration) -> Self {
        Self { method, timeout }
    }

    pub async fn check(&self, ip: IpAddr) -> Result<(), ProbeError> {
        match self.method {
            ReachabilityMethod::Ping => ping(ip, self.timeout).await,
            ReachabilityMethod::Handshake => handshake(ip, self.timeout).await,
            ReachabilityMethod::Both => {
                let (ping_wait, handshake_wait) = self.split_budget();
                match ping(ip, ping_wait).await {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        debug!(%ip, "ping failed, trying handshake: {err}");
                        handshake(ip, handshake_wait).await
                    }
                }
            }
        }
    }

    /// Shares one timeout between the ping and the handshake fallback.
    fn split_budget(&self) -> (Duration, Duration) {
        let ping_wait = self.timeout / 2;
        (ping_wait, self.timeout - ping_wait)
    }
}

/// One echo request through the system `ping`, which needs no raw-socket privileges.
async fn ping(ip: IpAddr, wait: Duration) -> Result<(), ProbeError> {
    let wait_secs = wait.as_millis().div_ceil(1000).max(1);

    let mut cmd = Command::new("ping");
    cmd.arg("-c").arg("1");
    if cfg!(target_os = "macos") {
        // BSD ping takes the wait in milliseconds.
        cmd.arg("-W").arg(wait.as_millis().max(1).to_string());
    } else {
        cmd.arg("-W").arg(wait_secs.to_string());
    }
    cmd.arg(ip.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(wait, cmd.status()).await {
        Err(_elapsed) => Err(ProbeError::Timeout { ip, timeout: wait }),
        Ok(Err(e)) => Err(ProbeError::Unreachable {
            ip,
            reason: format!("failed to run ping: {e}"),
        }),
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(ProbeError::Unreachable {
            ip,
            reason: format!("no echo reply ({status})"),
        }),
    }
}

async fn handshake(ip: IpAddr, wait: Duration) -> Result<(), ProbeError> {
    let attempts = HANDSHAKE_PORTS
        .iter()
        .map(|&port| Box::pin(tcp::handshake_probe(SocketAddr::new(ip, port), wait)));

    match select_ok(attempts).await {
        Ok((answer, _pending)) => {
            debug!(%ip, ?answer, "handshake answered");
            Ok(())
        }
        Err(last) => Err(last),
    }
}
