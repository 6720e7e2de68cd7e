//! STUN Binding client for public IPv4 discovery - RFC 5389
//!
//! A STUN server reflects the source address it saw back to the client, which
//! is the host's public address when the path crosses a NAT. The probe walks a
//! fixed list of public servers and stops at the first usable answer.
//!
//! # Message Layout
//!
//! ```text
//! type(2) | length(2) | magic cookie(4) = 0x2112A442 | transaction id(12)
//! attribute: type(2) | length(2) | value(length) | padding to 4 bytes
//! ```
//!
//! Only IPv4 `XOR-MAPPED-ADDRESS` and `MAPPED-ADDRESS` values are decoded.

use super::transport::UdpTransport;
use super::types::{IpResult, IpSource, Probe, ProbeError};
use rand::Rng;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// STUN header length
pub const STUN_HEADER_LEN: usize = 20;

/// Binding Request message type
pub const STUN_BINDING_REQUEST: u16 = 0x0001;

/// Binding Success Response message type
pub const STUN_BINDING_RESPONSE: u16 = 0x0101;

/// Fixed magic cookie of RFC 5389
pub const STUN_MAGIC_COOKIE: u32 = 0x2112_A442;

/// MAPPED-ADDRESS attribute
pub const ATTR_MAPPED_ADDRESS: u16 = 0x0001;

/// XOR-MAPPED-ADDRESS attribute
pub const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;

/// Address family value for IPv4
const FAMILY_IPV4: u8 = 0x01;

/// Attribute header length
const ATTR_HEADER_LEN: usize = 4;

/// Default timeout per STUN server
pub const STUN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Receive buffer; STUN over UDP stays below the path MTU
const STUN_MAX_MESSAGE_LEN: usize = 1500;

/// STUN transaction identifier
pub type TransactionId = [u8; 12];

/// Generate a fresh random transaction ID
pub fn new_transaction_id() -> TransactionId {
    let mut id = [0u8; 12];
    rand::thread_rng().fill(&mut id);
    id
}

/// Build a Binding Request without attributes
pub fn encode_request(transaction_id: &TransactionId) -> [u8; STUN_HEADER_LEN] {
    let mut msg = [0u8; STUN_HEADER_LEN];
    msg[0..2].copy_from_slice(&STUN_BINDING_REQUEST.to_be_bytes());
    // bytes 2-3: message length 0
    msg[4..8].copy_from_slice(&STUN_MAGIC_COOKIE.to_be_bytes());
    msg[8..20].copy_from_slice(transaction_id);
    msg
}

/// XOR four address octets with the magic cookie
///
/// Applying it twice returns the input, so it both encodes and decodes.
pub fn xor_ipv4(octets: [u8; 4]) -> [u8; 4] {
    let cookie = STUN_MAGIC_COOKIE.to_be_bytes();
    [
        octets[0] ^ cookie[0],
        octets[1] ^ cookie[1],
        octets[2] ^ cookie[2],
        octets[3] ^ cookie[3],
    ]
}

/// One attribute of a STUN message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StunAttribute<'a> {
    /// Attribute type
    pub attr_type: u16,
    /// Value without padding
    pub value: &'a [u8],
}

/// Iterator over the attributes following the STUN header
///
/// Stops at the first attribute whose declared length runs past the buffer.
#[derive(Debug, Clone)]
pub struct AttributeWalker<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for AttributeWalker<'a> {
    type Item = StunAttribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header_end = self.offset.checked_add(ATTR_HEADER_LEN)?;
        if header_end > self.data.len() {
            return None;
        }

        let attr_type = u16::from_be_bytes([self.data[self.offset], self.data[self.offset + 1]]);
        let attr_len =
            u16::from_be_bytes([self.data[self.offset + 2], self.data[self.offset + 3]]) as usize;

        let value_end = header_end + attr_len;
        if value_end > self.data.len() {
            trace!(
                "STUN attribute 0x{:04x} declares {} bytes past the buffer",
                attr_type, attr_len
            );
            self.offset = self.data.len();
            return None;
        }

        let value = &self.data[header_end..value_end];
        self.offset = header_end + padded_len(attr_len);

        Some(StunAttribute { attr_type, value })
    }
}

/// Walk the attributes of a STUN message starting at offset 20
pub fn walk_attributes(message: &[u8]) -> AttributeWalker<'_> {
    AttributeWalker {
        data: message,
        offset: STUN_HEADER_LEN,
    }
}

/// Attribute values are padded to a multiple of 4 bytes
pub(crate) fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Outcome of reading one address attribute
enum AddressValue {
    Ipv4([u8; 4]),
    UnsupportedFamily(u8),
    Truncated,
}

fn read_address_value(value: &[u8]) -> AddressValue {
    if value.len() < 8 {
        return AddressValue::Truncated;
    }

    match value[1] {
        FAMILY_IPV4 => AddressValue::Ipv4([value[4], value[5], value[6], value[7]]),
        family => AddressValue::UnsupportedFamily(family),
    }
}

/// Parse a Binding Response and extract the reflected IPv4 address
///
/// XOR-MAPPED-ADDRESS is preferred over MAPPED-ADDRESS when both are present.
pub fn decode_response(
    response: &[u8],
    transaction_id: &TransactionId,
) -> Result<Ipv4Addr, ProbeError> {
    if response.len() < STUN_HEADER_LEN {
        return Err(ProbeError::MalformedResponse(format!(
            "STUN message too short: {} bytes",
            response.len()
        )));
    }

    let msg_type = u16::from_be_bytes([response[0], response[1]]);
    if msg_type != STUN_BINDING_RESPONSE {
        return Err(ProbeError::MalformedResponse(format!(
            "Unexpected STUN message type: 0x{:04x}",
            msg_type
        )));
    }

    if &response[8..20] != transaction_id {
        return Err(ProbeError::MalformedResponse(
            "STUN transaction ID mismatch".to_string(),
        ));
    }

    let mut xor_mapped = None;
    let mut mapped = None;
    let mut unsupported_family = None;

    for attr in walk_attributes(response) {
        if attr.attr_type != ATTR_XOR_MAPPED_ADDRESS && attr.attr_type != ATTR_MAPPED_ADDRESS {
            trace!("Ignoring STUN attribute 0x{:04x}", attr.attr_type);
            continue;
        }

        match read_address_value(attr.value) {
            AddressValue::Ipv4(octets) if attr.attr_type == ATTR_XOR_MAPPED_ADDRESS => {
                xor_mapped = Some(xor_ipv4(octets));
            }
            AddressValue::Ipv4(octets) => mapped = Some(octets),
            AddressValue::UnsupportedFamily(family) => unsupported_family = Some(family),
            AddressValue::Truncated => {
                debug!("Truncated STUN address attribute 0x{:04x}", attr.attr_type);
            }
        }
    }

    match (xor_mapped.or(mapped), unsupported_family) {
        (Some(octets), _) => Ok(Ipv4Addr::from(octets)),
        (None, Some(family)) => Err(ProbeError::MalformedResponse(format!(
            "Unsupported STUN address family: 0x{:02x}",
            family
        ))),
        (None, None) => Err(ProbeError::MalformedResponse(
            "No mapped address in STUN response".to_string(),
        )),
    }
}

/// Public address discovery through a list of STUN servers
pub struct StunProbe {
    transport: Arc<dyn UdpTransport>,
    servers: Vec<String>,
    timeout: Duration,
}

impl StunProbe {
    /// Create a probe over `servers` (`host:port`), tried in order
    pub fn new(transport: Arc<dyn UdpTransport>, servers: Vec<String>, timeout: Duration) -> Self {
        Self {
            transport,
            servers,
            timeout,
        }
    }

    /// Configured servers
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    fn query_server(&self, server: &str) -> Result<Ipv4Addr, ProbeError> {
        // Resolved right before use; nothing is cached between runs
        let server_addr = self.transport.resolve(server)?;

        let transaction_id = new_transaction_id();
        let request = encode_request(&transaction_id);
        debug!(
            "STUN Binding Request to {} ({}), transaction {}",
            server,
            server_addr,
            hex::encode(transaction_id)
        );

        let mut response = [0u8; STUN_MAX_MESSAGE_LEN];
        let (received, _) =
            self.transport
                .exchange(server_addr, &request, &mut response, self.timeout)?;

        decode_response(&response[..received], &transaction_id)
    }
}

impl Probe for StunProbe {
    fn name(&self) -> &'static str {
        "STUN"
    }

    fn probe(&self) -> IpResult {
        let mut last_error = None;

        for server in &self.servers {
            match self.query_server(server) {
                Ok(ip) => {
                    info!("STUN server {} reflected address {}", server, ip);
                    return IpResult::found(ip.into(), IpSource::STUN);
                }
                Err(e) => {
                    debug!("STUN server {} failed: {}", server, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => {
                warn!("All {} STUN servers failed", self.servers.len());
                IpResult::from_error(&e)
            }
            None => IpResult::failed("No STUN servers configured"),
        }
    }
}
