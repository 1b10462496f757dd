//! Shared UDP endpoint for NetBIOS name service traffic.
//!
//! One socket serves every outstanding node status query in the process. A listener
//! task owns the receive side and writes decoded answers into the pending table, keyed
//! by transaction ID. Callers register a query with [`NbnsTransport::send_query`] and
//! later claim its answer with [`NbnsTransport::take`].

use std::{
    collections::HashMap,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, OnceLock},
    time::Instant,
};

use anyhow::{Context, bail};
use dab_protocols::nbns;
use tokio::{net::UdpSocket, sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};

const RECV_BUFFER_SIZE: usize = 0xFFFF;

static GLOBAL_TRANSPORT: OnceLock<Arc<NbnsTransport>> = OnceLock::new();

/// A query waiting for, or already holding, its answer.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub transaction_id: u16,
    pub target: SocketAddr,
    pub issued_at: Instant,
    /// `None` until a matching datagram arrives.
    pub names: Option<Vec<String>>,
}

type PendingTable = Arc<Mutex<HashMap<u16, PendingRequest>>>;

struct Endpoint {
    socket: Arc<UdpSocket>,
    listener: JoinHandle<()>,
}

pub struct NbnsTransport {
    endpoint: Mutex<Option<Endpoint>>,
    pending: PendingTable,
}

impl Default for NbnsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl NbnsTransport {
    /// Creates a transport; the socket is only bound on first use.
    pub fn new() -> Self {
        Self {
            endpoint: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The process-wide transport.
    pub fn global() -> Arc<NbnsTransport> {
        GLOBAL_TRANSPORT
            .get_or_init(|| Arc::new(NbnsTransport::new()))
            .clone()
    }

    /// Sends a node status query to `target` and registers it as pending.
    ///
    /// Returns as soon as the datagram is handed to the OS.
    pub async fn send_query(&self, target: SocketAddr) -> anyhow::Result<PendingRequest> {
        if !target.is_ipv4() {
            bail!("NetBIOS name service is IPv4 only, got {target}");
        }
        let socket: Arc<UdpSocket> = self.socket().await?;

        let request: PendingRequest = {
            let mut pending = self.pending.lock().await;
            let transaction_id: u16 = next_free_transaction_id(&pending);
            let request = PendingRequest {
                transaction_id,
                target,
                issued_at: Instant::now(),
                names: None,
            };
            pending.insert(transaction_id, request.clone());
            request
        };

        let packet: Vec<u8> = nbns::create_node_status_query(request.transaction_id);
        if let Err(e) = socket.send_to(&packet, target).await {
            self.pending.lock().await.remove(&request.transaction_id);
            return Err(e).with_context(|| format!("sending NBNS query to {target}"));
        }

        debug!(
            "NBNS query {:#06x} sent to {target}",
            request.transaction_id
        );
        Ok(request)
    }

    /// Removes and returns the pending entry for `transaction_id`.
    pub async fn take(&self, transaction_id: u16) -> Option<PendingRequest> {
        self.pending.lock().await.remove(&transaction_id)
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Stops the listener, releases the socket and forgets every pending query.
    pub async fn close(&self) {
        if let Some(endpoint) = self.endpoint.lock().await.take() {
            endpoint.listener.abort();
        }
        self.pending.lock().await.clear();
    }

    async fn socket(&self) -> anyhow::Result<Arc<UdpSocket>> {
        let mut endpoint = self.endpoint.lock().await;

        if let Some(current) = endpoint.as_ref()
            && !current.listener.is_finished()
        {
            return Ok(current.socket.clone());
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .context("binding NBNS socket")?;
        socket
            .set_broadcast(true)
            .context("enabling broadcast on NBNS socket")?;
        let socket = Arc::new(socket);

        let listener = tokio::spawn(listen(socket.clone(), self.pending.clone()));
        *endpoint = Some(Endpoint {
            socket: socket.clone(),
            listener,
        });

        Ok(socket)
    }
}

fn next_free_transaction_id(pending: &HashMap<u16, PendingRequest>) -> u16 {
    loop {
        let id: u16 = rand::random_range(1..=u16::MAX);
        if !pending.contains_key(&id) {
            return id;
        }
    }
}

async fn listen(socket: Arc<UdpSocket>, pending: PendingTable) {
    let mut buffer: Vec<u8> = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((len, source)) => handle_datagram(&pending, &buffer[..len], source).await,
            Err(e) if is_transient(&e) => {
                debug!("NBNS receive error ignored: {e}");
            }
            Err(e) => {
                warn!("NBNS listener stopped: {e}");
                break;
            }
        }
    }
}

/// Errors that concern one peer rather than the socket, such as an ICMP port
/// unreachable reported against an unconnected socket.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

async fn handle_datagram(pending: &PendingTable, data: &[u8], source: SocketAddr) {
    let response = match nbns::decode_node_status(data) {
        Ok(response) => response,
        Err(e) => {
            debug!("Dropping datagram from {source}: {e}");
            return;
        }
    };

    if !response.header.is_response() {
        debug!("Ignoring NBNS request from {source}");
        return;
    }

    let mut table = pending.lock().await;
    let Some(request) = table.get_mut(&response.transaction_id()) else {
        debug!(
            "No pending NBNS query {:#06x}, dropping reply from {source}",
            response.transaction_id()
        );
        return;
    };

    if !same_host(request.target.ip(), source.ip()) {
        debug!(
            "NBNS reply {:#06x} came from {source}, expected {}",
            response.transaction_id(),
            request.target
        );
        return;
    }

    if response.header.rcode() != 0 {
        debug!(
            "NBNS reply {:#06x} from {source} carries error code {}",
            response.transaction_id(),
            response.header.rcode()
        );
        request.names = Some(Vec::new());
        return;
    }

    request.names = Some(response.server_names());
}

fn same_host(expected: IpAddr, actual: IpAddr) -> bool {
    expected == actual || expected.to_canonical() == actual.to_canonical()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
