use std::net::IpAddr;

use clap::{ArgAction, Parser};
use dab_common::config::{Config, parse_nameservers, parse_ports};

#[derive(Parser)]
#[command(name = "dab")]
#[command(about = "Collects identity fingerprints from a single host.")]
pub struct CommandLine {
    /// Address or hostname of the target
    pub host: String,

    /// Comma-separated DNS servers, replacing those from /etc/resolv.conf
    #[arg(long, value_parser = parse_nameservers)]
    pub nameservers: Option<::std::vec::Vec<IpAddr>>,

    /// Comma-separated ports to key scan for SSH
    #[arg(long, value_parser = parse_ports)]
    pub ssh_ports: Option<::std::vec::Vec<u16>>,

    /// Comma-separated ports to inspect for TLS certificates
    #[arg(long, value_parser = parse_ports)]
    pub tls_ports: Option<::std::vec::Vec<u16>>,

    /// Log probe progress to stderr (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Defaults overridden by whatever was given on the command line.
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        if let Some(nameservers) = &self.nameservers {
            cfg.nameservers = nameservers.clone();
        }
        if let Some(ports) = &self.ssh_ports {
            cfg.ssh_ports = ports.clone();
        }
        if let Some(ports) = &self.tls_ports {
            cfg.tls_ports = ports.clone();
        }
        cfg
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
