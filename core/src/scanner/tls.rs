//! TLS certificate fingerprint and subject alternative names via the `openssl` CLI.
//!
//! Each lookup is its own round trip: `s_client` dumps the handshake transcript into a
//! temporary file, then `x509` decodes the first certificate from it.

use std::{net::IpAddr, sync::LazyLock, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use super::CertificateInspector;
use crate::process;

const OPENSSL: &str = "openssl";
const CLIENT_INPUT: &[u8] = b"exit\n";

static SAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DNS:([^,\s]+)").expect("SAN pattern is a valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decode {
    Fingerprint,
    Text,
}

pub struct TlsCertificateInspector {
    tool_timeout: Duration,
}

impl TlsCertificateInspector {
    pub fn new(tool_timeout: Duration) -> Self {
        Self { tool_timeout }
    }

    /// Fetches the peer certificate and returns the decoder's stdout.
    async fn round_trip(&self, address: &str, port: u16, decode: Decode) -> anyhow::Result<Vec<u8>> {
        // Removed on drop, whichever way this function returns.
        let transcript = NamedTempFile::new().context("creating certificate file")?;

        let mut client = Command::new(OPENSSL);
        client.arg("s_client").arg("-connect").arg(connect_target(address, port));
        if decode == Decode::Text {
            client.arg("-showcerts");
        }
        process::run_into_file(client, &transcript, Some(CLIENT_INPUT), self.tool_timeout).await?;

        let mut decoder = Command::new(OPENSSL);
        decoder.arg("x509");
        match decode {
            Decode::Fingerprint => decoder.arg("-fingerprint"),
            Decode::Text => decoder.arg("-text"),
        };
        decoder.arg("-noout").arg("-in").arg(transcript.path());

        let output = process::capture_stdout(decoder, self.tool_timeout).await?;
        if !output.status.success() {
            debug!("{OPENSSL} x509 found no certificate for {address}:{port}");
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl CertificateInspector for TlsCertificateInspector {
    async fn fingerprint(&self, address: &str, port: u16) -> anyhow::Result<Option<String>> {
        let output = self.round_trip(address, port, Decode::Fingerprint).await?;
        Ok(parse_fingerprint(&output))
    }

    async fn alt_names(&self, address: &str, port: u16) -> anyhow::Result<Vec<String>> {
        let output = self.round_trip(address, port, Decode::Text).await?;
        Ok(parse_alt_names(&output))
    }
}

/// `host:port`, bracketing IPv6 literals.
fn connect_target(address: &str, port: u16) -> String {
    match address.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("[{v6}]:{port}"),
        _ => format!("{address}:{port}"),
    }
}

/// Extracts the hash from a `SHA1 Fingerprint=AB:CD:...` line.
pub fn parse_fingerprint(output: &[u8]) -> Option<String> {
    process::utf8_lines(output)
        .find_map(|line| line.split_once('='))
        .map(|(_, hash)| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
}

/// Every `DNS:<name>` entry, in order of appearance and without duplicates.
pub fn parse_alt_names(output: &[u8]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in process::utf8_lines(output) {
        for capture in SAN_PATTERN.captures_iter(line) {
            let name = capture[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
