use std::net::IpAddr;

use anyhow::{Context, bail};
use dns_parser::{Packet, RData, ResponseCode};
use pnet::packet::dns::{DnsClass, DnsQuery, DnsType, DnsTypes, MutableDnsPacket, Opcode, Retcode};

pub const DNS_PORT: u16 = 53;
pub const DNS_HDR_LEN: usize = 12;

/// Records extracted from a DNS answer section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DnsReply {
    pub transaction_id: u16,
    pub addresses: Vec<IpAddr>,
    pub names: Vec<String>,
}

pub fn create_a_packet(hostname: &str, id: u16) -> anyhow::Result<Vec<u8>> {
    create_query_packet(hostname, DnsTypes::A, id)
}

pub fn create_ptr_packet(ip_addr: &IpAddr, id: u16) -> anyhow::Result<Vec<u8>> {
    create_query_packet(&reverse_lookup_name(ip_addr), DnsTypes::PTR, id)
}

/// Canonical reverse-lookup name, e.g. `4.3.2.1.in-addr.arpa` for `1.2.3.4`.
pub fn reverse_lookup_name(ip_addr: &IpAddr) -> String {
    match ip_addr {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            format!(
                "{}.{}.{}.{}.in-addr.arpa",
                octets[3], octets[2], octets[1], octets[0]
            )
        }
        IpAddr::V6(v6) => {
            let mut labels: Vec<String> = Vec::with_capacity(33);
            for byte in v6.octets().iter().rev() {
                labels.push(format!("{:x}", byte & 0x0F));
                labels.push(format!("{:x}", byte >> 4));
            }
            labels.push("ip6.arpa".to_string());
            labels.join(".")
        }
    }
}

fn create_query_packet(name: &str, qtype: DnsType, id: u16) -> anyhow::Result<Vec<u8>> {
    let query: DnsQuery = DnsQuery {
        qname: encode_dns_name(name)?,
        qtype,
        qclass: DnsClass(1),
        payload: Vec::new(),
    };
    let q_fixed_len: usize = 4;
    let qlen: usize = query.qname.len() + q_fixed_len;
    let total: usize = DNS_HDR_LEN + qlen;
    let mut buffer: Vec<u8> = vec![0u8; total];

    {
        let mut dns: MutableDnsPacket =
            MutableDnsPacket::new(&mut buffer).context("creating dns header")?;
        dns.set_id(id);
        dns.set_is_response(0);
        dns.set_opcode(Opcode::StandardQuery);
        dns.set_is_authoriative(0);
        dns.set_is_truncated(0);
        dns.set_is_recursion_desirable(1);
        dns.set_is_recursion_available(0);
        dns.set_zero_reserved(0);
        dns.set_is_non_authenticated_data(0);
        dns.set_rcode(Retcode::NoError);
        dns.set_query_count(1);
        dns.set_response_count(0);
        dns.set_authority_rr_count(0);
        dns.set_additional_rr_count(0);
    }

    let mut cursor: usize = DNS_HDR_LEN;

    buffer[cursor..cursor + query.qname.len()].copy_from_slice(&query.qname);
    cursor += query.qname.len();

    buffer[cursor..cursor + 2].copy_from_slice(&query.qtype.0.to_be_bytes());
    cursor += 2;

    buffer[cursor..cursor + 2].copy_from_slice(&query.qclass.0.to_be_bytes());

    Ok(buffer)
}

/// Parses a response, collecting every A/AAAA address and PTR name in the answers.
///
/// A response code other than `NoError` is reported as an error.
pub fn parse_response(payload: &[u8]) -> anyhow::Result<DnsReply> {
    let packet = Packet::parse(payload).context("Failed to parse DNS packet")?;
    if packet.header.response_code != ResponseCode::NoError {
        bail!("DNS server answered {:?}", packet.header.response_code);
    }

    let mut reply = DnsReply {
        transaction_id: packet.header.id,
        ..DnsReply::default()
    };

    for record in &packet.answers {
        match &record.data {
            RData::A(a) => reply.addresses.push(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => reply.addresses.push(IpAddr::V6(aaaa.0)),
            RData::PTR(ptr) => {
                let name: String = ptr.0.to_string();
                if !reply.names.contains(&name) {
                    reply.names.push(name);
                }
            }
            _ => {}
        }
    }

    Ok(reply)
}

fn encode_dns_name(name: &str) -> anyhow::Result<Vec<u8>> {
    let mut encoded: Vec<u8> = Vec::new();
    for label in name.split('.') {
        if label.is_empty() {
            continue;
        }
        if label.len() > 63 {
            bail!("DNS label '{label}' exceeds 63 bytes");
        }
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    Ok(encoded)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
