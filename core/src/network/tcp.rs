use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::scanner::PortCheck;

/// Reachability check backed by a single TCP connect attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpPortProbe;

#[async_trait]
impl PortCheck for TcpPortProbe {
    async fn is_open(&self, address: &str, port: u16, probe_timeout: Duration) -> bool {
        is_open(address, port, probe_timeout).await
    }
}

/// Returns `true` iff a TCP connection to `address:port` completes within `probe_timeout`.
///
/// The stream is dropped, and therefore closed, on every path.
pub async fn is_open(address: &str, port: u16, probe_timeout: Duration) -> bool {
    match timeout(probe_timeout, TcpStream::connect((address, port))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            debug!("{address}:{port} refused the connection: {e}");
            false
        }
        Err(_elapsed) => {
            debug!("{address}:{port} did not answer within {probe_timeout:?}");
            false
        }
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
