use std::net::IpAddr;
use std::time::Duration;

pub const DEFAULT_SSH_PORTS: &[u16] = &[22];
pub const DEFAULT_TLS_PORTS: &[u16] = &[443, 5002];

#[derive(Clone, Debug)]
pub struct Config {
    /// Ports handed to the SSH key scanner, probed in this order.
    pub ssh_ports: Vec<u16>,
    /// Ports handed to the TLS certificate inspector, probed in this order.
    pub tls_ports: Vec<u16>,
    /// Deadline for a single TCP connect attempt.
    pub port_timeout: Duration,
    /// Deadline for every individual DNS query.
    pub dns_timeout: Duration,
    /// Minimum window between sending the NBNS query and reading its answer.
    pub netbios_timeout: Duration,
    /// Deadline for each external tool invocation.
    pub tool_timeout: Duration,
    /// Explicit DNS servers.
    ///
    /// When empty the system configuration is used instead.
    pub nameservers: Vec<IpAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ssh_ports: DEFAULT_SSH_PORTS.to_vec(),
            tls_ports: DEFAULT_TLS_PORTS.to_vec(),
            port_timeout: Duration::from_millis(500),
            dns_timeout: Duration::from_secs(5),
            netbios_timeout: Duration::from_secs(1),
            tool_timeout: Duration::from_secs(10),
            nameservers: Vec::new(),
        }
    }
}

/// Parses a comma-separated list of nameserver addresses (e.g. "1.1.1.1, 9.9.9.9").
pub fn parse_nameservers(s: &str) -> anyhow::Result<Vec<IpAddr>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<IpAddr>()
                .map_err(|e| anyhow::anyhow!("Invalid nameserver '{part}': {e}"))
        })
        .collect()
}

/// Parses a comma-separated list of TCP ports (e.g. "22,2222").
pub fn parse_ports(s: &str) -> anyhow::Result<Vec<u16>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u16>()
                .map_err(|e| anyhow::anyhow!("Invalid port '{part}': {e}"))
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
