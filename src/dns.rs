use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use tokio::net::UdpSocket;

use crate::record::Record;

/// Outcome of one lookup attempt against one resolver.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
	/// The resolver answered. The record set may be empty: NXDOMAIN and
	/// server-side errors both mean there is nothing to report.
	Answers(Vec<Record>),
	/// No valid response arrived before the deadline.
	Timeout,
	/// The lookup cannot be performed at all (socket setup or send failure).
	Fatal(String),
}

/// The scanner's lookup contract. The production implementation speaks
/// real DNS over UDP; tests script outcomes instead.
#[async_trait]
pub trait Lookup: Send + Sync + 'static {
	async fn lookup(
		&self,
		fqdn: &str,
		resolver: SocketAddr,
		timeout: Duration,
	) -> LookupOutcome;
}

/// Build a DNS query message for the given name and record type.
///
/// Returns the serialized query bytes ready to send over the wire.
pub fn build_query(fqdn: &str, record_type: RecordType, txid: u16) -> Result<Vec<u8>> {
	let name = Name::from_ascii(fqdn)
		.map_err(|e| anyhow!("invalid domain name '{}': {}", fqdn, e))?;

	let mut message = Message::new();
	message.set_id(txid);
	message.set_recursion_desired(true);
	message.add_query(Query::query(name, record_type));

	message.to_vec()
		.map_err(|e| anyhow!("failed to serialize DNS query: {}", e))
}

/// Parse a DNS response, validating the transaction ID, and extract the
/// answer records. NXDOMAIN and other non-NoError rcodes yield an empty
/// record set.
pub fn parse_answers(bytes: &[u8], expected_txid: u16) -> Result<Vec<Record>> {
	let message = Message::from_vec(bytes)
		.map_err(|e| anyhow!("failed to parse DNS response: {}", e))?;

	if message.id() != expected_txid {
		return Err(anyhow!(
			"txid mismatch: expected {}, got {}",
			expected_txid, message.id()
		));
	}

	if message.message_type() != MessageType::Response {
		return Err(anyhow!("received a query instead of a response"));
	}

	if message.response_code() != ResponseCode::NoError {
		return Ok(Vec::new());
	}

	Ok(message.answers().iter().map(Record::from_wire).collect())
}

/// Send a single DNS query over UDP and wait for the matching response.
///
/// Binds a dedicated socket per query to avoid response stealing between
/// concurrent tasks. Datagrams that fail to parse or carry the wrong
/// transaction ID are ignored; the wait continues until the deadline.
pub async fn udp_lookup(
	fqdn: &str,
	record_type: RecordType,
	resolver: SocketAddr,
	timeout: Duration,
) -> LookupOutcome {
	let txid: u16 = rand::random();
	let query_bytes = match build_query(fqdn, record_type, txid) {
		Ok(bytes) => bytes,
		Err(e) => return LookupOutcome::Fatal(e.to_string()),
	};

	let bind_addr = if resolver.is_ipv4() {
		"0.0.0.0:0"
	} else {
		"[::]:0"
	};
	let socket = match UdpSocket::bind(bind_addr).await {
		Ok(s) => s,
		Err(e) => return LookupOutcome::Fatal(format!("failed to bind UDP socket: {}", e)),
	};

	if let Err(e) = socket.send_to(&query_bytes, resolver).await {
		return LookupOutcome::Fatal(format!(
			"failed to send query to {}: {}", resolver, e
		));
	}

	// 4096-byte buffer to handle EDNS-extended responses
	let start = Instant::now();
	let mut buf = vec![0u8; 4096];
	loop {
		let elapsed = start.elapsed();
		if elapsed >= timeout {
			return LookupOutcome::Timeout;
		}
		let remaining = timeout - elapsed;

		match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
			Ok(Ok((len, _src))) => match parse_answers(&buf[..len], txid) {
				Ok(records) => return LookupOutcome::Answers(records),
				// Stray or spoofed datagram, keep waiting for ours
				Err(_) => continue,
			},
			_ => return LookupOutcome::Timeout,
		}
	}
}

/// Production lookup: one ANY query over UDP per scan, so a single probe
/// surfaces every record type the zone publishes for the name.
pub struct WireLookup;

#[async_trait]
impl Lookup for WireLookup {
	async fn lookup(
		&self,
		fqdn: &str,
		resolver: SocketAddr,
		timeout: Duration,
	) -> LookupOutcome {
		udp_lookup(fqdn, RecordType::ANY, resolver, timeout).await
	}
}
