//! Per-target NetBIOS name lookups over the shared [`NbnsTransport`].
//!
//! A lookup is split in two: [`NetBiosClient::request`] sends the query and returns
//! straight away, [`NetBiosClient::collect`] waits out whatever remains of the answer
//! window and claims the result. Other probes run in between.

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use async_trait::async_trait;
use dab_protocols::nbns::NBNS_PORT;
use tokio::{sync::Mutex, time::timeout};
use tracing::debug;

use super::NetBiosNaming;
use crate::network::transport::NbnsTransport;

#[derive(Debug, Clone, Copy)]
struct Session {
    transaction_id: u16,
    issued_at: Instant,
}

pub struct NetBiosClient {
    transport: Arc<NbnsTransport>,
    port: u16,
    resolve_timeout: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl NetBiosClient {
    pub fn new(transport: Arc<NbnsTransport>) -> Self {
        Self {
            transport,
            port: NBNS_PORT,
            resolve_timeout: Duration::from_secs(5),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Sends queries to `port` instead of the standard name service port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    /// Fires a node status query at `address` without waiting for the reply.
    pub async fn request(&self, address: &str) -> anyhow::Result<()> {
        let target: SocketAddr = self.resolve(address).await?;
        let pending = self.transport.send_query(target).await?;

        let previous = self.sessions.lock().await.insert(
            address.to_string(),
            Session {
                transaction_id: pending.transaction_id,
                issued_at: pending.issued_at,
            },
        );
        if let Some(stale) = previous {
            self.transport.take(stale.transaction_id).await;
        }
        Ok(())
    }

    /// Returns the first server name reported by `address`, once at least `window`
    /// has passed since [`request`](Self::request). Without a prior request this
    /// returns `None` immediately.
    pub async fn collect(&self, address: &str, window: Duration) -> Option<String> {
        let session: Session = self.sessions.lock().await.remove(address)?;

        let elapsed: Duration = session.issued_at.elapsed();
        if elapsed < window {
            tokio::time::sleep(window - elapsed).await;
        }

        let names: Vec<String> = self
            .transport
            .take(session.transaction_id)
            .await
            .and_then(|pending| pending.names)?;

        names.into_iter().find(|name| !name.is_empty())
    }

    async fn resolve(&self, address: &str) -> anyhow::Result<SocketAddr> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        let mut candidates = timeout(
            self.resolve_timeout,
            tokio::net::lookup_host((address, self.port)),
        )
        .await
        .with_context(|| format!("resolving {address} timed out"))?
        .with_context(|| format!("resolving {address}"))?;

        candidates
            .find(SocketAddr::is_ipv4)
            .with_context(|| format!("{address} has no IPv4 address"))
    }
}

#[async_trait]
impl NetBiosNaming for NetBiosClient {
    async fn request(&self, address: &str) {
        if let Err(e) = NetBiosClient::request(self, address).await {
            debug!("NetBIOS query to {address} not sent: {e:#}");
        }
    }

    async fn collect(&self, address: &str, window: Duration) -> Option<String> {
        NetBiosClient::collect(self, address, window).await
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
