use crate::detection::{IpResult, Probe, ProbeError, UdpTransport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = dyn Fn(SocketAddr, &[u8]) -> Result<Vec<u8>, ProbeError> + Send + Sync;

/// Transport that answers every exchange through a closure and records what
/// was sent
pub struct MockTransport {
    responder: Box<Responder>,
    reply_from: Option<SocketAddr>,
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(SocketAddr, &[u8]) -> Result<Vec<u8>, ProbeError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            reply_from: None,
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Like [`MockTransport::new`], but replies appear to come from `from`
    /// instead of the destination
    pub fn replying_from<F>(from: SocketAddr, responder: F) -> Arc<Self>
    where
        F: Fn(SocketAddr, &[u8]) -> Result<Vec<u8>, ProbeError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            reply_from: Some(from),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Transport whose every exchange times out
    pub fn silent() -> Arc<Self> {
        Self::new(|_, _| Err(ProbeError::Timeout(Duration::from_millis(10))))
    }

    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl UdpTransport for MockTransport {
    fn exchange(
        &self,
        dest: SocketAddr,
        request: &[u8],
        response: &mut [u8],
        _timeout: Duration,
    ) -> Result<(usize, SocketAddr), ProbeError> {
        self.sent.lock().unwrap().push((dest, request.to_vec()));

        let reply = (self.responder)(dest, request)?;
        let len = reply.len().min(response.len());
        response[..len].copy_from_slice(&reply[..len]);
        Ok((len, self.reply_from.unwrap_or(dest)))
    }

    // Literal addresses only; tests never touch DNS
    fn resolve(&self, target: &str) -> Result<SocketAddr, ProbeError> {
        target
            .parse()
            .map_err(|_| ProbeError::DnsResolutionFailed(target.to_string()))
    }
}

/// Probe returning a canned result and counting its invocations
pub struct CountingProbe {
    name: &'static str,
    result: IpResult,
    calls: Arc<AtomicUsize>,
}

impl CountingProbe {
    pub fn new(name: &'static str, result: IpResult) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                result,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl Probe for CountingProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn probe(&self) -> IpResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Build a STUN Binding Response echoing `transaction_id`
pub fn stun_response(transaction_id: &[u8], attributes: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (attr_type, value) in attributes {
        body.extend_from_slice(&attr_type.to_be_bytes());
        body.extend_from_slice(&(value.len() as u16).to_be_bytes());
        body.extend_from_slice(value);
        while body.len() % 4 != 0 {
            body.push(0);
        }
    }

    let mut msg = Vec::with_capacity(20 + body.len());
    msg.extend_from_slice(&0x0101u16.to_be_bytes());
    msg.extend_from_slice(&(body.len() as u16).to_be_bytes());
    msg.extend_from_slice(&0x2112_A442u32.to_be_bytes());
    msg.extend_from_slice(transaction_id);
    msg.extend_from_slice(&body);
    msg
}

/// IPv4 address attribute value: reserved, family, port, address
pub fn ipv4_attr_value(port: u16, octets: [u8; 4]) -> Vec<u8> {
    let mut value = vec![0x00, 0x01];
    value.extend_from_slice(&port.to_be_bytes());
    value.extend_from_slice(&octets);
    value
}
