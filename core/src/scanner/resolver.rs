use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::{Context, bail};
use async_trait::async_trait;
use dab_common::config::Config;
use dab_protocols::dns::{self, DNS_PORT, DnsReply};
use tokio::{net::UdpSocket, time::timeout};
use tracing::debug;

use super::HostnameLookup;

const RESOLV_CONF: &str = "/etc/resolv.conf";
const FALLBACK_NAMESERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));
const MAX_DNS_PAYLOAD: usize = 4096;

/// Minimal asynchronous DNS client: one forward and one reverse query type.
#[async_trait]
pub trait DnsClient: Send + Sync {
    async fn query_a(&self, hostname: &str) -> anyhow::Result<Vec<IpAddr>>;
    async fn query_ptr(&self, ip: &IpAddr) -> anyhow::Result<Vec<String>>;
}

/// Sends queries over UDP to each configured nameserver in turn until one answers.
///
/// The query budget is split evenly across the servers, so a silent first server
/// still leaves time for the next one.
pub struct UdpDnsClient {
    nameservers: Vec<SocketAddr>,
    server_timeout: Duration,
}

impl UdpDnsClient {
    pub fn new(nameservers: &[IpAddr], query_timeout: Duration) -> Self {
        Self::with_servers(
            nameservers
                .iter()
                .map(|ip| SocketAddr::new(*ip, DNS_PORT))
                .collect(),
            query_timeout,
        )
    }

    /// Like [`new`](Self::new), with explicit server ports.
    pub fn with_servers(nameservers: Vec<SocketAddr>, query_timeout: Duration) -> Self {
        let share: u32 = u32::try_from(nameservers.len()).unwrap_or(u32::MAX).max(1);
        Self {
            server_timeout: query_timeout / share,
            nameservers,
        }
    }

    /// Uses the nameservers from `cfg`, or the system's when none are given.
    pub fn from_config(cfg: &Config) -> Self {
        if cfg.nameservers.is_empty() {
            Self::new(&system_nameservers(), cfg.dns_timeout)
        } else {
            Self::new(&cfg.nameservers, cfg.dns_timeout)
        }
    }

    async fn exchange(&self, packet: &[u8], id: u16) -> anyhow::Result<DnsReply> {
        let mut last_error: Option<anyhow::Error> = None;
        for server in &self.nameservers {
            let error = match timeout(self.server_timeout, exchange_with(*server, packet, id)).await
            {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => e,
                Err(_elapsed) => anyhow::anyhow!(
                    "no answer within {:?}",
                    self.server_timeout
                ),
            };
            debug!("Nameserver {server} failed: {error:#}");
            last_error = Some(error);
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no nameserver configured")))
    }
}

#[async_trait]
impl DnsClient for UdpDnsClient {
    async fn query_a(&self, hostname: &str) -> anyhow::Result<Vec<IpAddr>> {
        let id: u16 = rand::random();
        let packet: Vec<u8> = dns::create_a_packet(hostname, id)?;
        Ok(self.exchange(&packet, id).await?.addresses)
    }

    async fn query_ptr(&self, ip: &IpAddr) -> anyhow::Result<Vec<String>> {
        let id: u16 = rand::random();
        let packet: Vec<u8> = dns::create_ptr_packet(ip, id)?;
        Ok(self.exchange(&packet, id).await?.names)
    }
}

async fn exchange_with(server: SocketAddr, packet: &[u8], id: u16) -> anyhow::Result<DnsReply> {
    let bind_addr: SocketAddr = match server {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    };
    let socket = UdpSocket::bind(bind_addr).await.context("binding DNS socket")?;
    socket.connect(server).await.context("connecting DNS socket")?;
    socket.send(packet).await.context("sending DNS query")?;

    let mut buffer = vec![0u8; MAX_DNS_PAYLOAD];
    loop {
        let len: usize = socket.recv(&mut buffer).await.context("receiving DNS reply")?;
        let reply: DnsReply = dns::parse_response(&buffer[..len])?;
        if reply.transaction_id == id {
            return Ok(reply);
        }
        debug!("Ignoring DNS reply {} while waiting for {id}", reply.transaction_id);
    }
}

/// Reads `nameserver` entries from the system resolver configuration.
pub fn system_nameservers() -> Vec<IpAddr> {
    let servers: Vec<IpAddr> = std::fs::read_to_string(RESOLV_CONF)
        .map(|content| parse_resolv_conf(&content))
        .unwrap_or_default();

    if servers.is_empty() {
        vec![FALLBACK_NAMESERVER]
    } else {
        servers
    }
}

fn parse_resolv_conf(content: &str) -> Vec<IpAddr> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => addr.parse::<IpAddr>().ok(),
                _ => None,
            }
        })
        .collect()
}

/// Reverse DNS lookup with a fallback to the operating system resolver.
pub struct NameResolver {
    client: Box<dyn DnsClient>,
    query_timeout: Duration,
}

impl NameResolver {
    pub fn new(client: Box<dyn DnsClient>, query_timeout: Duration) -> Self {
        Self {
            client,
            query_timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(Box::new(UdpDnsClient::from_config(cfg)), cfg.dns_timeout)
    }

    /// Hostnames for `address`, deduplicated. Never fails: an unresolvable target
    /// yields an empty list.
    pub async fn lookup(&self, address: &str) -> Vec<String> {
        let mut ip: Option<IpAddr> = address.parse::<IpAddr>().ok();

        let resolved: anyhow::Result<Vec<String>> = async {
            let target: IpAddr = match ip {
                Some(ip) => ip,
                None => {
                    let forward = self.forward(address).await?;
                    ip = Some(forward);
                    forward
                }
            };
            self.reverse(&target).await
        }
        .await;

        match resolved {
            Ok(names) => dedup(names),
            Err(e) => {
                debug!("DNS lookup for {address} failed, using system resolver: {e:#}");
                dedup(self.fallback(ip, address).await)
            }
        }
    }

    async fn forward(&self, hostname: &str) -> anyhow::Result<IpAddr> {
        let addresses = timeout(self.query_timeout, self.client.query_a(hostname))
            .await
            .context("A query timed out")??;
        addresses
            .into_iter()
            .next()
            .with_context(|| format!("no A record for {hostname}"))
    }

    async fn reverse(&self, ip: &IpAddr) -> anyhow::Result<Vec<String>> {
        let names = timeout(self.query_timeout, self.client.query_ptr(ip))
            .await
            .context("PTR query timed out")??;
        if names.is_empty() {
            bail!("no PTR record for {ip}");
        }
        Ok(names)
    }

    /// Blocking OS lookup, run on the blocking pool and bounded by the query timeout.
    async fn fallback(&self, ip: Option<IpAddr>, address: &str) -> Vec<String> {
        let address: String = address.to_string();
        let task = tokio::task::spawn_blocking(move || system_reverse_lookup(ip, &address));
        match timeout(self.query_timeout, task).await {
            Ok(Ok(names)) => names,
            Ok(Err(e)) => {
                debug!("System resolver task failed: {e}");
                Vec::new()
            }
            Err(_elapsed) => {
                debug!("System resolver did not answer in time");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl HostnameLookup for NameResolver {
    async fn lookup(&self, address: &str) -> Vec<String> {
        NameResolver::lookup(self, address).await
    }
}

fn system_reverse_lookup(ip: Option<IpAddr>, address: &str) -> Vec<String> {
    let ip: IpAddr = match ip {
        Some(ip) => ip,
        None => match dns_lookup::lookup_host(address) {
            Ok(found) => match found.into_iter().next() {
                Some(ip) => ip,
                None => return Vec::new(),
            },
            Err(e) => {
                debug!("System resolver could not resolve {address}: {e}");
                return Vec::new();
            }
        },
    };

    match dns_lookup::lookup_addr(&ip) {
        Ok(name) if name != ip.to_string() => vec![name],
        Ok(_) => Vec::new(),
        Err(e) => {
            debug!("System resolver has no name for {ip}: {e}");
            Vec::new()
        }
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim_end_matches('.').to_string();
        if !name.is_empty() && !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
