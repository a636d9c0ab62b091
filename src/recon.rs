use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::dns::{self, LookupOutcome};
use crate::listener::Listener;
use crate::record::Record;

#[derive(Debug, Error)]
pub enum ZoneTransferError {
	#[error("transfer refused with {0}")]
	Refused(ResponseCode),
	#[error("connection failed: {0}")]
	Io(#[from] std::io::Error),
	#[error("protocol error: {0}")]
	Protocol(String),
	#[error("transfer timed out")]
	TimedOut,
}

/// Run the cheap techniques before brute forcing: find the authoritative
/// name servers, ask each one for a full zone handout, and fold them into
/// the resolver rotation.
pub async fn run(
	hostname: &str,
	resolvers: &mut Vec<SocketAddr>,
	listener: &Listener,
	timeout: Duration,
	skip_ns_discovery: bool,
	skip_zone_transfer: bool,
) {
	if skip_ns_discovery {
		return;
	}
	let Some(&first_resolver) = resolvers.first() else {
		return;
	};

	let ns_records = match discover_name_servers(hostname, first_resolver, timeout).await {
		Ok(records) if !records.is_empty() => records,
		Ok(_) => {
			listener.print_info("No authoritative name servers found.");
			return;
		}
		Err(e) => {
			listener.print_info(&format!("Name server discovery failed: {}", e));
			return;
		}
	};

	listener.print_status(&format!(
		"Found {} authoritative name server(s).", ns_records.len(),
	));
	listener.print_records(&ns_records);

	let authoritative =
		resolve_name_server_addresses(&ns_records, first_resolver, timeout).await;

	if !skip_zone_transfer {
		for server in &authoritative {
			match attempt_zone_transfer(hostname, *server, timeout).await {
				Ok(records) => {
					listener.print_success(&format!(
						"Zone transfer from {} succeeded ({} records).",
						server.ip(), records.len(),
					));
					listener.print_records(&records);
				}
				Err(e) => {
					listener.print_info(&format!(
						"Zone transfer from {} failed: {}", server.ip(), e,
					));
				}
			}
		}
	}

	let added = fold_into_resolvers(resolvers, &authoritative);
	if added > 0 {
		listener.print_status(&format!(
			"Added {} authoritative server(s) to the resolver pool.", added,
		));
	}
}

/// Query the target's NS records through one of the configured resolvers.
pub async fn discover_name_servers(
	hostname: &str,
	resolver: SocketAddr,
	timeout: Duration,
) -> Result<Vec<Record>> {
	match dns::udp_lookup(hostname, RecordType::NS, resolver, timeout).await {
		LookupOutcome::Answers(records) => Ok(records
			.into_iter()
			.filter(|r| r.record_type == RecordType::NS)
			.collect()),
		LookupOutcome::Timeout => Err(anyhow!(
			"NS lookup of '{}' using {} timed out", hostname, resolver.ip(),
		)),
		LookupOutcome::Fatal(reason) => Err(anyhow!(
			"NS lookup of '{}' failed: {}", hostname, reason,
		)),
	}
}

/// Resolve each discovered name server to addresses usable as resolvers.
/// Unresolvable servers are skipped.
pub async fn resolve_name_server_addresses(
	ns_records: &[Record],
	resolver: SocketAddr,
	timeout: Duration,
) -> Vec<SocketAddr> {
	let mut addresses = Vec::new();
	for ns in ns_records {
		let outcome = dns::udp_lookup(&ns.data, RecordType::A, resolver, timeout).await;
		let LookupOutcome::Answers(records) = outcome else {
			continue;
		};
		for record in records {
			if record.record_type != RecordType::A {
				continue;
			}
			if let Ok(ip) = record.data.parse() {
				let addr = SocketAddr::new(ip, 53);
				if !addresses.contains(&addr) {
					addresses.push(addr);
				}
			}
		}
	}
	addresses
}

/// Append newly discovered servers to the resolver list, skipping any
/// already present. Returns how many were added.
pub fn fold_into_resolvers(
	resolvers: &mut Vec<SocketAddr>,
	discovered: &[SocketAddr],
) -> usize {
	let mut added = 0;
	for addr in discovered {
		if !resolvers.contains(addr) {
			resolvers.push(*addr);
			added += 1;
		}
	}
	added
}

/// Attempt a full zone transfer (AXFR) from one authoritative server.
///
/// AXFR runs over TCP with two-byte length framing. The record stream is
/// bracketed by the zone's SOA; the second SOA closes the transfer. The
/// SOA bookends are not part of the result.
pub async fn attempt_zone_transfer(
	hostname: &str,
	server: SocketAddr,
	timeout: Duration,
) -> Result<Vec<Record>, ZoneTransferError> {
	let txid: u16 = rand::random();
	let query = dns::build_query(hostname, RecordType::AXFR, txid)
		.map_err(|e| ZoneTransferError::Protocol(e.to_string()))?;

	let mut stream = tokio::time::timeout(timeout, TcpStream::connect(server))
		.await
		.map_err(|_| ZoneTransferError::TimedOut)??;

	stream.write_all(&(query.len() as u16).to_be_bytes()).await?;
	stream.write_all(&query).await?;

	let deadline = tokio::time::Instant::now() + timeout;
	let mut records = Vec::new();
	let mut soa_count = 0;

	while soa_count < 2 {
		let frame = tokio::time::timeout_at(deadline, read_frame(&mut stream))
			.await
			.map_err(|_| ZoneTransferError::TimedOut)??;
		let Some(bytes) = frame else {
			break;
		};

		let message = Message::from_vec(&bytes)
			.map_err(|e| ZoneTransferError::Protocol(e.to_string()))?;
		if message.response_code() != ResponseCode::NoError {
			return Err(ZoneTransferError::Refused(message.response_code()));
		}

		for answer in message.answers() {
			if answer.record_type() == RecordType::SOA {
				soa_count += 1;
				continue;
			}
			records.push(Record::from_wire(answer));
		}
	}

	if soa_count == 0 && records.is_empty() {
		return Err(ZoneTransferError::Protocol(
			"server sent no transfer records".to_string(),
		));
	}
	Ok(records)
}

/// Read one length-prefixed DNS message. None on a clean end of stream.
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
	let mut len_buf = [0u8; 2];
	match stream.read_exact(&mut len_buf).await {
		Ok(_) => {}
		Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
		Err(e) => return Err(e),
	}

	let len = u16::from_be_bytes(len_buf) as usize;
	let mut buf = vec![0u8; len];
	stream.read_exact(&mut buf).await?;
	Ok(Some(buf))
}
