#![cfg(test)]
//! Scripted stand-ins for the probe traits.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dab_core::scanner::{
    CertificateInspector, HostnameLookup, KeyScanner, NetBiosNaming, PortCheck,
    ssh::HostKeyFingerprint,
};

/// Reports the listed ports as open and records every check in call order.
#[derive(Clone, Default)]
pub struct StubPorts {
    pub open: Vec<u16>,
    pub calls: Arc<Mutex<Vec<u16>>>,
}

impl StubPorts {
    pub fn open(ports: &[u16]) -> Self {
        Self {
            open: ports.to_vec(),
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl PortCheck for StubPorts {
    async fn is_open(&self, _address: &str, port: u16, timeout: Duration) -> bool {
        self.calls.lock().unwrap().push(port);
        if self.open.contains(&port) {
            true
        } else {
            tokio::time::sleep(timeout).await;
            false
        }
    }
}

pub struct StubResolver {
    pub names: Vec<String>,
    pub delay: Duration,
}

impl StubResolver {
    pub fn names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self::names(&[])
    }
}

#[async_trait]
impl HostnameLookup for StubResolver {
    async fn lookup(&self, _address: &str) -> Vec<String> {
        tokio::time::sleep(self.delay).await;
        self.names.clone()
    }
}

pub struct StubKeys {
    pub keys: Vec<HostKeyFingerprint>,
    pub delay: Duration,
    pub scanned: Arc<Mutex<Vec<u16>>>,
}

impl StubKeys {
    pub fn rsa(hash: &str) -> Self {
        Self {
            keys: vec![HostKeyFingerprint {
                key_type: "RSA".to_string(),
                bits: "2048".to_string(),
                algorithm: "sha256".to_string(),
                hash: hash.to_string(),
            }],
            delay: Duration::ZERO,
            scanned: Arc::default(),
        }
    }

    pub fn none() -> Self {
        Self {
            keys: Vec::new(),
            delay: Duration::ZERO,
            scanned: Arc::default(),
        }
    }
}

#[async_trait]
impl KeyScanner for StubKeys {
    async fn keyscan(&self, _address: &str, port: u16) -> anyhow::Result<Vec<HostKeyFingerprint>> {
        self.scanned.lock().unwrap().push(port);
        tokio::time::sleep(self.delay).await;
        Ok(self.keys.clone())
    }
}

pub struct StubCertificates {
    pub fingerprint: Option<String>,
    pub alt_names: Vec<String>,
    pub fail: bool,
}

impl StubCertificates {
    pub fn none() -> Self {
        Self {
            fingerprint: None,
            alt_names: Vec::new(),
            fail: false,
        }
    }
}

#[async_trait]
impl CertificateInspector for StubCertificates {
    async fn fingerprint(&self, _address: &str, _port: u16) -> anyhow::Result<Option<String>> {
        if self.fail {
            anyhow::bail!("openssl not installed");
        }
        Ok(self.fingerprint.clone())
    }

    async fn alt_names(&self, _address: &str, _port: u16) -> anyhow::Result<Vec<String>> {
        if self.fail {
            anyhow::bail!("openssl not installed");
        }
        Ok(self.alt_names.clone())
    }
}

/// Answers with `name` once the window has passed; records the order of calls.
pub struct StubNetBios {
    pub name: Option<String>,
    pub events: Arc<Mutex<Vec<&'static str>>>,
    requested_at: Mutex<Option<Instant>>,
}

impl StubNetBios {
    pub fn silent() -> Self {
        Self {
            name: None,
            events: Arc::default(),
            requested_at: Mutex::new(None),
        }
    }

    pub fn answering(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            events: Arc::default(),
            requested_at: Mutex::new(None),
        }
    }
}

#[async_trait]
impl NetBiosNaming for StubNetBios {
    async fn request(&self, _address: &str) {
        self.events.lock().unwrap().push("request");
        *self.requested_at.lock().unwrap() = Some(Instant::now());
    }

    async fn collect(&self, _address: &str, window: Duration) -> Option<String> {
        self.events.lock().unwrap().push("collect");
        let requested_at = (*self.requested_at.lock().unwrap())?;
        let elapsed = requested_at.elapsed();
        if elapsed < window {
            tokio::time::sleep(window - elapsed).await;
        }
        self.name.clone()
    }
}
