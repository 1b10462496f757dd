#![cfg(test)]
use std::time::{Duration, Instant};

use dab_common::config::Config;
use dab_core::Fingerprinter;
use tokio::net::TcpListener;

use crate::stubs::{StubCertificates, StubKeys, StubNetBios, StubPorts, StubResolver};

fn config() -> Config {
    Config {
        port_timeout: Duration::from_millis(100),
        dns_timeout: Duration::from_millis(200),
        netbios_timeout: Duration::from_millis(150),
        tool_timeout: Duration::from_secs(1),
        ..Config::default()
    }
}

fn fingerprinter(cfg: Config) -> Fingerprinter {
    Fingerprinter::new(cfg)
        .with_port_check(Box::new(StubPorts::open(&[])))
        .with_hostname_lookup(Box::new(StubResolver::failing()))
        .with_netbios(Box::new(StubNetBios::silent()))
        .with_key_scanner(Box::new(StubKeys::none()))
        .with_certificate_inspector(Box::new(StubCertificates::none()))
}

fn lines(fingerprinter_output: dab_common::fingerprint::FingerprintSet) -> Vec<String> {
    fingerprinter_output
        .into_sorted_vec()
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[tokio::test]
async fn open_ssh_port_yields_only_ssh_and_hostname() {
    let dab = fingerprinter(config())
        .with_port_check(Box::new(StubPorts::open(&[22])))
        .with_hostname_lookup(Box::new(StubResolver::names(&["box.example"])))
        .with_key_scanner(Box::new(StubKeys::rsa("AAAAC3Nza")));

    let result = dab.fingerprint("192.0.2.10").await;

    assert_eq!(
        lines(result),
        vec![
            "hostname box.example".to_string(),
            "ssh_rsa_2048_sha256 AAAAC3Nza".to_string(),
        ]
    );
}

#[tokio::test]
async fn silent_target_yields_empty_set_within_timeouts() {
    let cfg = config();
    let budget = cfg.port_timeout * (cfg.ssh_ports.len() + cfg.tls_ports.len()) as u32
        + cfg.dns_timeout
        + cfg.netbios_timeout;
    let dab = fingerprinter(cfg);

    let start = Instant::now();
    let result = dab.fingerprint("192.0.2.11").await;

    assert!(result.is_empty());
    assert!(
        start.elapsed() <= budget + Duration::from_millis(250),
        "took {:?}, budget {budget:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn tls_findings_become_ssl_and_san_fingerprints() {
    let dab = fingerprinter(config())
        .with_port_check(Box::new(StubPorts::open(&[443])))
        .with_certificate_inspector(Box::new(StubCertificates {
            fingerprint: Some("2B:8F:1B".to_string()),
            alt_names: vec!["www.example".to_string(), "example".to_string()],
            fail: false,
        }));

    let result = dab.fingerprint("192.0.2.12").await;

    assert_eq!(
        lines(result),
        vec![
            "san_hostname example".to_string(),
            "san_hostname www.example".to_string(),
            "ssl 2B:8F:1B".to_string(),
        ]
    );
}

#[tokio::test]
async fn same_certificate_on_two_ports_is_deduplicated() {
    let dab = fingerprinter(config())
        .with_port_check(Box::new(StubPorts::open(&[443, 5002])))
        .with_certificate_inspector(Box::new(StubCertificates {
            fingerprint: Some("AA:BB".to_string()),
            alt_names: vec!["shared.example".to_string()],
            fail: false,
        }));

    let result = dab.fingerprint("192.0.2.13").await;

    assert_eq!(result.len(), 2);
    assert!(result.contains("ssl", "AA:BB"));
    assert!(result.contains("san_hostname", "shared.example"));
}

#[tokio::test]
async fn failing_probe_does_not_abort_the_run() {
    let dab = fingerprinter(config())
        .with_port_check(Box::new(StubPorts::open(&[22, 443])))
        .with_hostname_lookup(Box::new(StubResolver::names(&["box.example"])))
        .with_key_scanner(Box::new(StubKeys::rsa("KEY")))
        .with_certificate_inspector(Box::new(StubCertificates {
            fingerprint: None,
            alt_names: Vec::new(),
            fail: true,
        }));

    let result = dab.fingerprint("192.0.2.14").await;

    assert_eq!(result.len(), 2);
    assert!(result.contains("hostname", "box.example"));
    assert!(result.contains("ssh_rsa_2048_sha256", "KEY"));
}

#[tokio::test]
async fn ports_are_checked_in_declared_order() {
    let ports = StubPorts::open(&[2222, 22]);
    let calls = ports.calls.clone();
    let keys = StubKeys::rsa("KEY");
    let scanned = keys.scanned.clone();

    let cfg = Config {
        ssh_ports: vec![2222, 23, 22],
        tls_ports: Vec::new(),
        ..config()
    };
    let dab = fingerprinter(cfg)
        .with_port_check(Box::new(ports))
        .with_key_scanner(Box::new(keys));

    dab.fingerprint("192.0.2.15").await;

    assert_eq!(*calls.lock().unwrap(), vec![2222, 23, 22]);
    assert_eq!(*scanned.lock().unwrap(), vec![2222, 22]);
}

#[tokio::test]
async fn netbios_is_collected_last_and_overlaps_other_probes() {
    let netbios = StubNetBios::answering("FILESRV");
    let events = netbios.events.clone();
    let mut keys = StubKeys::rsa("KEY");
    keys.delay = Duration::from_millis(300);

    let cfg = Config {
        netbios_timeout: Duration::from_millis(300),
        ..config()
    };
    let dab = fingerprinter(cfg)
        .with_port_check(Box::new(StubPorts::open(&[22])))
        .with_key_scanner(Box::new(keys))
        .with_netbios(Box::new(netbios));

    let start = Instant::now();
    let result = dab.fingerprint("192.0.2.16").await;
    let elapsed = start.elapsed();

    assert!(result.contains("nbt_hostname", "FILESRV"));
    assert_eq!(*events.lock().unwrap(), vec!["request", "collect"]);
    // TLS ports are closed (2 x 100ms) and run alongside the 300ms key scan.
    assert!(elapsed < Duration::from_millis(550), "took {elapsed:?}");
}

#[tokio::test]
async fn real_port_probe_gates_key_scanner() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = listener.local_addr().unwrap().port();
    let keys = StubKeys::rsa("LOCAL");
    let scanned = keys.scanned.clone();

    let cfg = Config {
        ssh_ports: vec![open_port],
        tls_ports: Vec::new(),
        ..config()
    };
    let dab = Fingerprinter::new(cfg)
        .with_hostname_lookup(Box::new(StubResolver::failing()))
        .with_netbios(Box::new(StubNetBios::silent()))
        .with_key_scanner(Box::new(keys))
        .with_certificate_inspector(Box::new(StubCertificates::none()));

    let result = dab.fingerprint("127.0.0.1").await;

    assert_eq!(*scanned.lock().unwrap(), vec![open_port]);
    assert!(result.contains("ssh_rsa_2048_sha256", "LOCAL"));
}
