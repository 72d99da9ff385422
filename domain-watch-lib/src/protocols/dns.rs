//! DNS SOA availability probe.
//!
//! A domain with no SOA answer at the configured resolver is treated as
//! unregistered. Only the query encoder and the fixed 12-byte header decoder
//! are implemented; the answer section itself is never parsed.
//!
//! Query layout (all integers big-endian):
//!
//! ```text
//! offset  size  field
//!      0     2  id        (QUERY_ID)
//!      2     2  flags     (0x0100: standard query, recursion desired)
//!      4     2  qdcount   (1)
//!      6     2  ancount   (0)
//!      8     2  nscount   (0)
//!     10     2  arcount   (0)
//!     12     n  qname     (len-prefixed labels, zero-length terminator)
//!   12+n     2  qtype     (SOA = 6)
//!   14+n     2  qclass    (IN = 1)
//! ```

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

use super::AvailabilityCheck;
use crate::error::WatchError;
use crate::types::WatchConfig;

/// Length of the fixed DNS message header.
pub const HEADER_LEN: usize = 12;

/// Largest reply read from the socket; SOA replies are well below it.
pub const MAX_MESSAGE_LEN: usize = 512;

/// Transaction id written into every query.
///
/// Fixed rather than random; replies are still checked against it.
pub const QUERY_ID: u16 = 0x0001;

/// Record type code of SOA.
pub const TYPE_SOA: u16 = 6;

/// Class code of the Internet class.
pub const CLASS_IN: u16 = 1;

/// Standard query with recursion desired.
const FLAGS_STANDARD_QUERY: u16 = 0x0100;

const FLAG_RESPONSE: u16 = 0x8000;
const RCODE_MASK: u16 = 0x000F;
const RCODE_NO_ERROR: u8 = 0;
const RCODE_NX_DOMAIN: u8 = 3;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

pub const DNS_PORT: u16 = 53;
pub const RESOLV_CONF: &str = "/etc/resolv.conf";
pub const FALLBACK_NAMESERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// Encode a single-question query for `domain` and `record_type`.
///
/// A trailing root dot is accepted. Empty labels, labels over 63 bytes and
/// names over 255 bytes are rejected.
pub fn build_query(domain: &str, record_type: u16) -> Result<Vec<u8>, WatchError> {
    let name = domain.trim().trim_end_matches('.');
    if name.is_empty() {
        return Err(WatchError::invalid_domain(domain, "Domain name cannot be empty"));
    }

    let mut query = Vec::with_capacity(HEADER_LEN + name.len() + 6);
    query.extend_from_slice(&QUERY_ID.to_be_bytes());
    query.extend_from_slice(&FLAGS_STANDARD_QUERY.to_be_bytes());
    query.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    query.extend_from_slice(&0u16.to_be_bytes()); // ANCOUNT
    query.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    query.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT

    let name_start = query.len();
    for label in name.split('.') {
        if label.is_empty() {
            return Err(WatchError::invalid_domain(domain, "empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(WatchError::invalid_domain(
                domain,
                format!("label '{}' is longer than {} bytes", label, MAX_LABEL_LEN),
            ));
        }
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0);

    if query.len() - name_start > MAX_NAME_LEN {
        return Err(WatchError::invalid_domain(
            domain,
            format!("encoded name is longer than {} bytes", MAX_NAME_LEN),
        ));
    }

    query.extend_from_slice(&record_type.to_be_bytes());
    query.extend_from_slice(&CLASS_IN.to_be_bytes());

    Ok(query)
}

/// The fixed header of a DNS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    /// Decode the first 12 bytes of `message`.
    pub fn parse(message: &[u8]) -> Result<Self, WatchError> {
        if message.len() < HEADER_LEN {
            return Err(WatchError::parse(format!(
                "DNS reply too short: {} bytes, header needs {}",
                message.len(),
                HEADER_LEN
            )));
        }

        let word = |at: usize| u16::from_be_bytes([message[at], message[at + 1]]);
        Ok(Self {
            id: word(0),
            flags: word(2),
            qdcount: word(4),
            ancount: word(6),
            nscount: word(8),
            arcount: word(10),
        })
    }

    /// QR bit.
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    pub fn rcode(&self) -> u8 {
        (self.flags & RCODE_MASK) as u8
    }
}

/// Decide from a raw reply whether the queried name has answer records.
///
/// Only the answer count is consulted. The reply must carry `expected_id`,
/// have the QR bit set and report NOERROR or NXDOMAIN; anything else says
/// nothing reliable about registration and is an error.
pub fn reply_has_answers(reply: &[u8], expected_id: u16) -> Result<bool, WatchError> {
    let header = DnsHeader::parse(reply)?;

    if header.id != expected_id {
        return Err(WatchError::parse(format!(
            "DNS reply id {:#06x} does not match query id {:#06x}",
            header.id, expected_id
        )));
    }
    if !header.is_response() {
        return Err(WatchError::parse("DNS reply is not a response"));
    }

    match header.rcode() {
        RCODE_NO_ERROR | RCODE_NX_DOMAIN => Ok(header.ancount > 0),
        rcode => Err(WatchError::parse(format!(
            "DNS server answered with rcode {}",
            rcode
        ))),
    }
}

/// First usable `nameserver` address in resolv.conf content.
pub fn parse_resolv_conf(content: &str) -> Option<IpAddr> {
    content.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("nameserver"), Some(address)) => address.parse().ok(),
            _ => None,
        }
    })
}

/// SOA-based availability checker talking UDP to one resolver.
#[derive(Debug, Clone)]
pub struct DnsProber {
    /// Deadline for the whole exchange
    timeout: Duration,
    /// Explicit resolver, bypassing resolv.conf
    nameserver: Option<IpAddr>,
    /// Where the system resolver configuration lives
    resolv_conf: PathBuf,
    port: u16,
}

impl DnsProber {
    /// Create a prober using the system resolver.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            nameserver: None,
            resolv_conf: PathBuf::from(RESOLV_CONF),
            port: DNS_PORT,
        }
    }

    /// Create a prober from the run configuration.
    pub fn from_config(config: &WatchConfig) -> Self {
        let prober = Self::new(config.timeout);
        match config.nameserver {
            Some(nameserver) => prober.with_nameserver(nameserver),
            None => prober,
        }
    }

    /// Always query `nameserver`.
    pub fn with_nameserver(mut self, nameserver: IpAddr) -> Self {
        self.nameserver = Some(nameserver);
        self
    }

    /// Read the system resolver from a different file.
    pub fn with_resolv_conf<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.resolv_conf = path.into();
        self
    }

    /// Send queries to a port other than 53.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Resolver that will be queried.
    pub async fn resolver(&self) -> IpAddr {
        match self.nameserver {
            Some(nameserver) => nameserver,
            None => system_nameserver(&self.resolv_conf).await,
        }
    }

    async fn exchange(&self, server: SocketAddr, query: &[u8]) -> Result<Vec<u8>, WatchError> {
        let local: SocketAddr = match server.ip() {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).await.map_err(|e| {
            WatchError::network_with_source("Failed to bind UDP socket", e.to_string())
        })?;
        socket.connect(server).await.map_err(|e| {
            WatchError::network_with_source(
                format!("Failed to connect to DNS server {}", server),
                e.to_string(),
            )
        })?;
        socket.send(query).await.map_err(|e| {
            WatchError::network_with_source("Failed to send DNS query", e.to_string())
        })?;

        let mut reply = [0u8; MAX_MESSAGE_LEN];
        let len = socket.recv(&mut reply).await.map_err(|e| {
            WatchError::network_with_source("Failed to receive DNS reply", e.to_string())
        })?;

        Ok(reply[..len].to_vec())
    }
}

#[async_trait]
impl AvailabilityCheck for DnsProber {
    async fn is_available(&self, domain: &str) -> Result<bool, WatchError> {
        let query = build_query(domain, TYPE_SOA)?;
        let server = SocketAddr::new(self.resolver().await, self.port);

        debug!(domain, %server, "Sending SOA query");

        let reply = tokio::time::timeout(self.timeout, self.exchange(server, &query))
            .await
            .map_err(|_| WatchError::timeout(format!("DNS SOA query for {}", domain), self.timeout))??;

        let has_soa = reply_has_answers(&reply, QUERY_ID)
            .map_err(|e| WatchError::dns(domain, e.to_string()))?;

        Ok(!has_soa)
    }
}

/// Resolver from resolv.conf, or the public fallback.
async fn system_nameserver(path: &Path) -> IpAddr {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_resolv_conf(&content).unwrap_or_else(|| {
            debug!(path = %path.display(), "No nameserver entry, using fallback");
            FALLBACK_NAMESERVER
        }),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot read resolver config, using fallback");
            FALLBACK_NAMESERVER
        }
    }
}
