//! SSH host-key fingerprints via `ssh-keyscan` and `ssh-keygen -l`.

use std::{path::Path, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use super::KeyScanner;
use crate::process;

const KEYSCAN: &str = "ssh-keyscan";
const KEYGEN: &str = "ssh-keygen";
const HASH_ALGORITHMS: &[&str] = &["sha256", "md5"];

/// One line of `ssh-keygen -l` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyFingerprint {
    pub key_type: String,
    pub bits: String,
    pub algorithm: String,
    pub hash: String,
}

impl HostKeyFingerprint {
    /// e.g. `ssh_RSA_3072_sha256`; normalized further when it becomes a fingerprint.
    pub fn kind(&self) -> String {
        format!("ssh_{}_{}_{}", self.key_type, self.bits, self.algorithm)
    }
}

pub struct SshKeyScanner {
    tool_timeout: Duration,
}

impl SshKeyScanner {
    pub fn new(tool_timeout: Duration) -> Self {
        Self { tool_timeout }
    }

    async fn fingerprints(&self, key_file: &Path, algorithm: Option<&str>) -> Vec<HostKeyFingerprint> {
        let mut command = Command::new(KEYGEN);
        if let Some(algorithm) = algorithm {
            command.args(["-E", algorithm]);
        }
        command.arg("-l").arg("-f").arg(key_file);

        match process::capture_stdout(command, self.tool_timeout).await {
            Ok(output) if output.status.success() && !output.stdout.is_empty() => {
                parse_keygen_output(&output.stdout)
            }
            Ok(output) => {
                debug!("{KEYGEN} produced nothing usable (status {})", output.status);
                Vec::new()
            }
            Err(e) => {
                debug!("{KEYGEN} failed: {e:#}");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl KeyScanner for SshKeyScanner {
    async fn keyscan(&self, address: &str, port: u16) -> anyhow::Result<Vec<HostKeyFingerprint>> {
        // Removed on drop, whichever way this function returns.
        let key_file = NamedTempFile::new().context("creating key scan file")?;

        let mut command = Command::new(KEYSCAN);
        command.arg("-p").arg(port.to_string()).arg(address);
        let status = process::run_into_file(command, &key_file, None, self.tool_timeout).await?;
        if !status.success() {
            debug!("{KEYSCAN} against {address}:{port} exited with {status}");
            return Ok(Vec::new());
        }

        let mut combined: Vec<HostKeyFingerprint> = Vec::new();
        for algorithm in HASH_ALGORITHMS {
            combined.extend(self.fingerprints(key_file.path(), Some(*algorithm)).await);
        }
        if !combined.is_empty() {
            return Ok(combined);
        }

        Ok(self.fingerprints(key_file.path(), None).await)
    }
}

/// Parses `<bits> <algorithm:hash> <address> (<key type>)` lines.
///
/// Lines with any other field count are skipped. A hash without a known prefix is
/// the legacy MD5 format.
pub fn parse_keygen_output(output: &[u8]) -> Vec<HostKeyFingerprint> {
    process::utf8_lines(output)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(' ').collect();
            let [bits, full_hash, _address, key_type] = fields.as_slice() else {
                debug!("Skipping non-standard {KEYGEN} line: {line}");
                return None;
            };

            let (algorithm, hash) = if let Some(hash) = full_hash.strip_prefix("MD5:") {
                ("md5", hash)
            } else if let Some(hash) = full_hash.strip_prefix("SHA256:") {
                ("sha256", hash)
            } else {
                ("md5", *full_hash)
            };

            Some(HostKeyFingerprint {
                key_type: key_type.trim_matches(&['(', ')'][..]).to_string(),
                bits: bits.to_string(),
                algorithm: algorithm.to_string(),
                hash: hash.to_string(),
            })
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
