#![cfg(test)]
//! NetBIOS end to end: real client and transport against a loopback name service.

use std::{sync::Arc, time::Duration};

use dab_common::config::Config;
use dab_core::{
    Fingerprinter,
    network::transport::NbnsTransport,
    scanner::netbios::NetBiosClient,
};
use dab_protocols::nbns::{HEADER_LEN, TYPE_SERVER};
use tokio::net::UdpSocket;

use crate::stubs::{StubCertificates, StubKeys, StubPorts, StubResolver};

fn node_status_reply(transaction_id: u16, names: &[(&str, u8)]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + 45 + names.len() * 18);
    packet.extend_from_slice(&transaction_id.to_be_bytes());
    packet.extend_from_slice(&[0x84, 0x00, 0, 0, 0, 1, 0, 0, 0, 0]);
    packet.extend_from_slice(&[0u8; 44]);
    packet.push(names.len() as u8);
    for (name, name_type) in names {
        let mut entry = [b' '; 18];
        entry[..name.len()].copy_from_slice(name.as_bytes());
        entry[15] = *name_type;
        packet.extend_from_slice(&entry);
    }
    packet
}

/// Answers every query with `names` after `delay`.
async fn name_service(names: Vec<(&'static str, u8)>, delay: Duration) -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            if len < HEADER_LEN {
                continue;
            }
            let id = u16::from_be_bytes([buf[0], buf[1]]);
            tokio::time::sleep(delay).await;
            let _ = socket.send_to(&node_status_reply(id, &names), peer).await;
        }
    });
    port
}

fn fingerprinter(netbios: NetBiosClient, window: Duration) -> Fingerprinter {
    let cfg = Config {
        ssh_ports: Vec::new(),
        tls_ports: Vec::new(),
        netbios_timeout: window,
        ..Config::default()
    };
    Fingerprinter::new(cfg)
        .with_port_check(Box::new(StubPorts::open(&[])))
        .with_hostname_lookup(Box::new(StubResolver::failing()))
        .with_key_scanner(Box::new(StubKeys::none()))
        .with_certificate_inspector(Box::new(StubCertificates::none()))
        .with_netbios(Box::new(netbios))
}

#[tokio::test]
async fn server_name_from_loopback_becomes_nbt_hostname() {
    let port = name_service(
        vec![("WORKGROUP", 0x00), ("FILESRV", TYPE_SERVER), ("FILESRV", 0x00)],
        Duration::ZERO,
    )
    .await;
    let transport = Arc::new(NbnsTransport::new());
    let client = NetBiosClient::new(transport.clone()).with_port(port);

    let result = fingerprinter(client, Duration::from_millis(300))
        .fingerprint("127.0.0.1")
        .await;

    let lines: Vec<String> = result.iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec!["nbt_hostname FILESRV".to_string()]);
    assert_eq!(transport.pending_len().await, 0);
    transport.close().await;
}

#[tokio::test]
async fn reply_after_the_window_is_ignored() {
    let port = name_service(vec![("LATE", TYPE_SERVER)], Duration::from_millis(400)).await;
    let transport = Arc::new(NbnsTransport::new());
    let client = NetBiosClient::new(transport.clone()).with_port(port);

    let result = fingerprinter(client, Duration::from_millis(100))
        .fingerprint("127.0.0.1")
        .await;

    assert!(result.is_empty());
    assert_eq!(transport.pending_len().await, 0);
    transport.close().await;
}

#[tokio::test]
async fn workstation_only_reply_yields_nothing() {
    let port = name_service(vec![("DESKTOP", 0x00)], Duration::ZERO).await;
    let transport = Arc::new(NbnsTransport::new());
    let client = NetBiosClient::new(transport.clone()).with_port(port);

    let result = fingerprinter(client, Duration::from_millis(200))
        .fingerprint("127.0.0.1")
        .await;

    assert!(result.is_empty());
    transport.close().await;
}

#[tokio::test]
async fn concurrent_targets_share_one_transport() {
    let port = name_service(vec![("SHARED", TYPE_SERVER)], Duration::from_millis(20)).await;
    let transport = Arc::new(NbnsTransport::new());
    let first = fingerprinter(
        NetBiosClient::new(transport.clone()).with_port(port),
        Duration::from_millis(300),
    );
    let second = fingerprinter(
        NetBiosClient::new(transport.clone()).with_port(port),
        Duration::from_millis(300),
    );

    let (a, b) = tokio::join!(first.fingerprint("127.0.0.1"), second.fingerprint("127.0.0.1"));

    assert!(a.contains("nbt_hostname", "SHARED"));
    assert!(b.contains("nbt_hostname", "SHARED"));
    assert_eq!(transport.pending_len().await, 0);
    transport.close().await;
}
