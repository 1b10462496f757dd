//! The probe **abstractions** and the orchestrator that drives them.
//!
//! Every identity source sits behind a trait so the [`Fingerprinter`] depends only on
//! behaviour, never on a concrete transport. Production wiring lives in
//! [`Fingerprinter::new`]; tests swap in their own implementations with the
//! `with_*` builders.
//!
//! All probes for one target run as futures joined on the calling task: they are
//! concurrent, never parallel, and each bounds its own network waits.

use std::time::Duration;

use async_trait::async_trait;
use dab_common::{config::Config, fingerprint::FingerprintSet};
use tracing::{debug, warn};

use crate::network::{tcp::TcpPortProbe, transport::NbnsTransport};

pub mod netbios;
pub mod resolver;
pub mod ssh;
pub mod tls;

use netbios::NetBiosClient;
use resolver::NameResolver;
use ssh::{HostKeyFingerprint, SshKeyScanner};
use tls::TlsCertificateInspector;

pub const KIND_HOSTNAME: &str = "hostname";
pub const KIND_NBT_HOSTNAME: &str = "nbt_hostname";
pub const KIND_SSL: &str = "ssl";
pub const KIND_SAN_HOSTNAME: &str = "san_hostname";

/// Bounded-time TCP reachability.
#[async_trait]
pub trait PortCheck: Send + Sync {
    async fn is_open(&self, address: &str, port: u16, timeout: Duration) -> bool;
}

/// Reverse name resolution. Failure is an empty list, never an error.
#[async_trait]
pub trait HostnameLookup: Send + Sync {
    async fn lookup(&self, address: &str) -> Vec<String>;
}

/// SSH host-key fingerprints for one port.
#[async_trait]
pub trait KeyScanner: Send + Sync {
    async fn keyscan(&self, address: &str, port: u16) -> anyhow::Result<Vec<HostKeyFingerprint>>;
}

/// TLS peer certificate details for one port.
#[async_trait]
pub trait CertificateInspector: Send + Sync {
    async fn fingerprint(&self, address: &str, port: u16) -> anyhow::Result<Option<String>>;
    async fn alt_names(&self, address: &str, port: u16) -> anyhow::Result<Vec<String>>;
}

/// Two-phase NetBIOS name lookup.
#[async_trait]
pub trait NetBiosNaming: Send + Sync {
    /// Sends the query and returns without waiting for an answer.
    async fn request(&self, address: &str);
    /// Waits until `window` has passed since `request`, then claims the answer.
    async fn collect(&self, address: &str, window: Duration) -> Option<String>;
}

pub struct Fingerprinter {
    cfg: Config,
    ports: Box<dyn PortCheck>,
    resolver: Box<dyn HostnameLookup>,
    netbios: Box<dyn NetBiosNaming>,
    ssh: Box<dyn KeyScanner>,
    tls: Box<dyn CertificateInspector>,
}

impl Fingerprinter {
    /// Wires the real probes. NetBIOS traffic goes through the process-wide transport.
    pub fn new(cfg: Config) -> Self {
        let netbios =
            NetBiosClient::new(NbnsTransport::global()).with_resolve_timeout(cfg.dns_timeout);
        Self {
            ports: Box::new(TcpPortProbe),
            resolver: Box::new(NameResolver::from_config(&cfg)),
            netbios: Box::new(netbios),
            ssh: Box::new(SshKeyScanner::new(cfg.tool_timeout)),
            tls: Box::new(TlsCertificateInspector::new(cfg.tool_timeout)),
            cfg,
        }
    }

    pub fn with_port_check(mut self, ports: Box<dyn PortCheck>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_hostname_lookup(mut self, resolver: Box<dyn HostnameLookup>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_netbios(mut self, netbios: Box<dyn NetBiosNaming>) -> Self {
        self.netbios = netbios;
        self
    }

    pub fn with_key_scanner(mut self, ssh: Box<dyn KeyScanner>) -> Self {
        self.ssh = ssh;
        self
    }

    pub fn with_certificate_inspector(mut self, tls: Box<dyn CertificateInspector>) -> Self {
        self.tls = tls;
        self
    }

    /// Runs every probe against `address` and merges what they found.
    ///
    /// The NetBIOS answer is collected last so its wait overlaps the other probes.
    pub async fn fingerprint(&self, address: &str) -> FingerprintSet {
        let (hostnames, (), ssh_keys, tls_findings) = tokio::join!(
            self.resolver.lookup(address),
            self.netbios.request(address),
            self.scan_ssh_ports(address),
            self.scan_tls_ports(address),
        );

        let mut fingerprints = FingerprintSet::new();

        for hostname in hostnames {
            fingerprints.add(KIND_HOSTNAME, hostname);
        }

        for key in ssh_keys {
            fingerprints.add(&key.kind(), key.hash);
        }

        for finding in tls_findings {
            if let Some(fingerprint) = finding.fingerprint {
                fingerprints.add(KIND_SSL, fingerprint);
            }
            for name in finding.alt_names {
                fingerprints.add(KIND_SAN_HOSTNAME, name);
            }
        }

        if let Some(name) = self
            .netbios
            .collect(address, self.cfg.netbios_timeout)
            .await
        {
            fingerprints.add(KIND_NBT_HOSTNAME, name);
        }

        debug!("{address}: {} fingerprints", fingerprints.len());
        fingerprints
    }

    /// Key scans each SSH port in declared order, skipping closed ones.
    async fn scan_ssh_ports(&self, address: &str) -> Vec<HostKeyFingerprint> {
        let mut keys: Vec<HostKeyFingerprint> = Vec::new();
        for &port in &self.cfg.ssh_ports {
            if !self.ports.is_open(address, port, self.cfg.port_timeout).await {
                continue;
            }
            match self.ssh.keyscan(address, port).await {
                Ok(found) => keys.extend(found),
                Err(e) => warn!("SSH key scan of {address}:{port} failed: {e:#}"),
            }
        }
        keys
    }

    /// Inspects the certificate on each TLS port in declared order, skipping closed ones.
    async fn scan_tls_ports(&self, address: &str) -> Vec<TlsFinding> {
        let mut findings: Vec<TlsFinding> = Vec::new();
        for &port in &self.cfg.tls_ports {
            if !self.ports.is_open(address, port, self.cfg.port_timeout).await {
                continue;
            }

            let (fingerprint, alt_names) = tokio::join!(
                self.tls.fingerprint(address, port),
                self.tls.alt_names(address, port),
            );

            findings.push(TlsFinding {
                fingerprint: fingerprint.unwrap_or_else(|e| {
                    warn!("TLS fingerprint of {address}:{port} failed: {e:#}");
                    None
                }),
                alt_names: alt_names.unwrap_or_else(|e| {
                    warn!("TLS alt names of {address}:{port} failed: {e:#}");
                    Vec::new()
                }),
            });
        }
        findings
    }
}

struct TlsFinding {
    fingerprint: Option<String>,
    alt_names: Vec<String>,
}
