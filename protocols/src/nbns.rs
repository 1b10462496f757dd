//! # NetBIOS Name Service codec
//!
//! Builds node status (`NBSTAT`) queries for the wildcard name `*` and decodes the
//! name table carried in the reply. Layout follows RFC 1002 section 4.2.
//!
//! ```text
//!  0               2               4
//!  +---------------+---------------+
//!  | transaction   | flags / code  |   12 byte header, big-endian
//!  | questions     | answers       |
//!  | authority     | additional    |
//!  +---------------+---------------+
//!  | encoded question name (34)    |
//!  | type 0x0021   | class 0x0001  |
//!  +-------------------------------+
//! ```

use thiserror::Error;
use tracing::debug;

pub const NBNS_PORT: u16 = 137;
pub const HEADER_LEN: usize = 12;

/// Name type carried by the file server service entry (`<20>`).
pub const TYPE_SERVER: u8 = 0x20;

const BROADCAST_FLAG: u16 = 0x0010;
const QUERY_TYPE_NBSTAT: [u8; 2] = [0x00, 0x21];
const QUERY_CLASS_IN: [u8; 2] = [0x00, 0x01];

const RAW_NAME_LEN: usize = 15;
/// Offset of the name count byte: header plus the answer record preamble.
const NAME_COUNT_OFFSET: usize = HEADER_LEN + 44;
const NAME_ENTRY_LEN: usize = 18;
const NAME_TYPE_OFFSET: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NbnsError {
    #[error("packet is {0} bytes, shorter than the 12 byte header")]
    ShortHeader(usize),
    #[error("NetBIOS names must be ASCII: {0:?}")]
    NonAsciiName(String),
    #[error("scope label {0:?} exceeds 63 bytes")]
    ScopeLabelTooLong(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NbnsHeader {
    pub transaction_id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl NbnsHeader {
    pub fn query(transaction_id: u16, broadcast: bool) -> Self {
        Self {
            transaction_id,
            flags: if broadcast { BROADCAST_FLAG } else { 0 },
            question_count: 1,
            answer_count: 0,
            authority_count: 0,
            additional_count: 0,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, NbnsError> {
        if data.len() < HEADER_LEN {
            return Err(NbnsError::ShortHeader(data.len()));
        }
        let word = |i: usize| u16::from_be_bytes([data[i * 2], data[i * 2 + 1]]);
        Ok(Self {
            transaction_id: word(0),
            flags: word(1),
            question_count: word(2),
            answer_count: word(3),
            authority_count: word(4),
            additional_count: word(5),
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let words = [
            self.transaction_id,
            self.flags,
            self.question_count,
            self.answer_count,
            self.authority_count,
            self.additional_count,
        ];
        for (i, w) in words.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&w.to_be_bytes());
        }
        out
    }

    pub fn is_response(&self) -> bool {
        (self.flags >> 15) & 0x01 == 1
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & 0x0F) as u8
    }
}

/// One row of a node status name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEntry {
    pub name: String,
    pub name_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatusResponse {
    pub header: NbnsHeader,
    /// Empty when the packet carried no usable name table.
    pub entries: Vec<NameEntry>,
}

impl NodeStatusResponse {
    pub fn transaction_id(&self) -> u16 {
        self.header.transaction_id
    }

    /// Names registered with the server service type, in table order.
    pub fn server_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.name_type == TYPE_SERVER)
            .map(|entry| entry.name.clone())
            .collect()
    }
}

/// First and second level encoding of a NetBIOS name (RFC 1001 section 14).
///
/// The wildcard `*` is padded with NULs, every other name with spaces, and
/// names longer than 15 bytes are truncated before `suffix` is appended.
pub fn encode_name(name: &str, suffix: u8, scope: Option<&str>) -> Result<Vec<u8>, NbnsError> {
    if !name.is_ascii() {
        return Err(NbnsError::NonAsciiName(name.to_string()));
    }

    let pad: u8 = if name == "*" { 0x00 } else { b' ' };
    let mut raw: Vec<u8> = name.bytes().take(RAW_NAME_LEN).collect();
    raw.resize(RAW_NAME_LEN, pad);
    raw.push(suffix);

    let mut encoded: Vec<u8> = Vec::with_capacity(raw.len() * 2 + 2);
    encoded.push((raw.len() * 2) as u8);
    for byte in raw {
        encoded.push(b'A' + (byte >> 4));
        encoded.push(b'A' + (byte & 0x0F));
    }

    if let Some(scope) = scope {
        for label in scope.split('.').filter(|l| !l.is_empty()) {
            if label.len() > 63 {
                return Err(NbnsError::ScopeLabelTooLong(label.to_string()));
            }
            encoded.push(label.len() as u8);
            encoded.extend_from_slice(label.as_bytes());
        }
    }
    encoded.push(0);

    Ok(encoded)
}

/// Builds a unicast node status query for the wildcard name.
pub fn create_node_status_query(transaction_id: u16) -> Vec<u8> {
    let header = NbnsHeader::query(transaction_id, false);
    let mut packet: Vec<u8> = header.to_bytes().to_vec();
    // The wildcard is plain ASCII without scope, encoding cannot fail.
    if let Ok(name) = encode_name("*", 0x00, None) {
        packet.extend_from_slice(&name);
    }
    packet.extend_from_slice(&QUERY_TYPE_NBSTAT);
    packet.extend_from_slice(&QUERY_CLASS_IN);
    packet
}

/// Decodes a node status response.
///
/// Only a packet too short for the header is an error. Anything that cannot hold the
/// declared name table decodes to a response without entries.
pub fn decode_node_status(data: &[u8]) -> Result<NodeStatusResponse, NbnsError> {
    let header = NbnsHeader::parse(data)?;
    let entries: Vec<NameEntry> = decode_name_table(data).unwrap_or_default();
    Ok(NodeStatusResponse { header, entries })
}

fn decode_name_table(data: &[u8]) -> Option<Vec<NameEntry>> {
    let count: usize = *data.get(NAME_COUNT_OFFSET)? as usize;
    let table_start: usize = NAME_COUNT_OFFSET + 1;
    let table_end: usize = table_start + count * NAME_ENTRY_LEN;
    let table: &[u8] = data.get(table_start..table_end)?;

    let entries = table
        .chunks_exact(NAME_ENTRY_LEN)
        .filter_map(|chunk| {
            let raw_name: &[u8] = &chunk[..RAW_NAME_LEN];
            let name_type: u8 = chunk[NAME_TYPE_OFFSET];
            match std::str::from_utf8(raw_name) {
                Ok(name) if name.is_ascii() => Some(NameEntry {
                    name: name.trim().to_string(),
                    name_type,
                }),
                _ => {
                    debug!("Skipping NetBIOS name that is not ASCII: {raw_name:?}");
                    None
                }
            }
        })
        .collect();

    Some(entries)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
