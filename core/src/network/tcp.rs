use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use ledgr_common::error::ProbeError;

/// How the peer answered a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Accepted,
    /// The peer answered with a reset; something is alive at that address.
    Refused,
}

/// Attempts a TCP connection to `addr`. Both a completed handshake and a refusal prove the host
/// is up; a timeout or any other failure does not.
pub async fn handshake_probe(addr: SocketAddr, probe_timeout: Duration) -> Result<Handshake, ProbeError> {
    match timeout(probe_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Ok(Handshake::Accepted),
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(Handshake::Refused),
        Ok(Err(e)) => Err(ProbeError::Unreachable {
            ip: addr.ip(),
            reason: e.to_string(),
        }),
        Err(_elapsed) => Err(ProbeError::Timeout {
            ip: addr.ip(),
            timeout: probe_timeout,
        }),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn handshake_probe_accepts_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = handshake_probe(addr, PROBE_TIMEOUT).await;
        assert_eq!(result, Ok(Handshake::Accepted));
    }

    #[tokio::test]
    async fn handshake_probe_treats_refusal_as_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = handshake_probe(addr, PROBE_TIMEOUT).await;
        assert_eq!(result, Ok(Handshake::Refused));
    }
}
