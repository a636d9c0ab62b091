use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use anyhow::{anyhow, Result};

/// A resolver is dropped from the pool for good once this many lookups
/// through it have timed out.
pub const BLACKLIST_THRESHOLD: u32 = 3;

/// Parse a resolver address string into a socket address.
///
/// Supports formats:
///   "1.1.1.1"              -- IPv4, default port 53
///   "1.1.1.1:53"           -- IPv4 with explicit port
///   "2606:4700::1111"      -- bare IPv6, default port 53
///   "[2606:4700::1111]:53" -- bracketed IPv6 with port
pub fn parse_resolver(input: &str) -> Result<SocketAddr> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		return Err(anyhow!("empty resolver address"));
	}

	let addr: SocketAddr = if trimmed.starts_with('[') {
		// Bracketed IPv6 with port: [::1]:53
		trimmed.parse()
			.map_err(|e| anyhow!("invalid bracketed IPv6 address '{}': {}", trimmed, e))?
	} else if trimmed.contains("::") || trimmed.matches(':').count() > 1 {
		// Bare IPv6 address without port
		let ip = trimmed.parse()
			.map_err(|e| anyhow!("invalid IPv6 address '{}': {}", trimmed, e))?;
		SocketAddr::new(ip, 53)
	} else if let Ok(addr) = trimmed.parse::<SocketAddr>() {
		// IPv4 with port (e.g. "8.8.8.8:5353")
		addr
	} else {
		// Plain IPv4 without port
		let ip = trimmed.parse()
			.map_err(|e| anyhow!("invalid IP address '{}': {}", trimmed, e))?;
		SocketAddr::new(ip, 53)
	};

	Ok(addr)
}

/// Read resolver addresses from a file, one per line.
///
/// Blank lines and lines starting with '#' are skipped.
pub fn read_resolver_file(path: &str) -> Result<Vec<SocketAddr>> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read resolver file '{}': {}", path, e))?;
	let mut resolvers = Vec::new();
	for line in content.lines() {
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}
		resolvers.push(parse_resolver(trimmed)?);
	}
	Ok(resolvers)
}

/// Read system resolvers from /etc/resolv.conf (Unix only).
///
/// Returns an empty vec on non-Unix platforms or if the file cannot be read.
pub fn system_resolvers() -> Vec<SocketAddr> {
	let content = match std::fs::read_to_string("/etc/resolv.conf") {
		Ok(c) => c,
		Err(_) => return Vec::new(),
	};
	let mut resolvers = Vec::new();
	for line in content.lines() {
		let trimmed = line.trim();
		if !trimmed.starts_with("nameserver") {
			continue;
		}
		let parts: Vec<&str> = trimmed.split_whitespace().collect();
		if parts.len() >= 2 {
			if let Ok(resolver) = parse_resolver(parts[1]) {
				resolvers.push(resolver);
			}
		}
	}
	resolvers
}

/// Return a list of well-known public resolvers, used when the caller
/// supplies none of their own.
pub fn default_resolvers() -> Vec<SocketAddr> {
	vec![
		"1.1.1.1:53".parse().unwrap(),        // Cloudflare
		"8.8.8.8:53".parse().unwrap(),        // Google
		"9.9.9.9:53".parse().unwrap(),        // Quad9
		"208.67.222.222:53".parse().unwrap(), // OpenDNS
	]
}

/// Verdict from charging a timeout against a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutVerdict {
	/// Counter advanced, resolver returned to the pool.
	Recycled { count: u32 },
	/// Counter reached the threshold; the resolver is gone for good.
	Blacklisted,
}

/// Rotating pool of resolver endpoints with per-endpoint timeout counters.
///
/// A resolver is in exactly one place at a time: idle in the pool, handed
/// out to a scanner, or blacklisted. Selection is round-robin on the idle
/// queue; recycling appends at the tail.
#[derive(Debug)]
pub struct ResolverPool {
	idle: VecDeque<SocketAddr>,
	timeouts: HashMap<SocketAddr, u32>,
}

impl ResolverPool {
	pub fn new(resolvers: impl IntoIterator<Item = SocketAddr>) -> Self {
		let idle: VecDeque<SocketAddr> = resolvers.into_iter().collect();
		let timeouts = idle.iter().map(|addr| (*addr, 0)).collect();
		Self { idle, timeouts }
	}

	/// Hand out the least recently used resolver.
	pub fn dequeue(&mut self) -> Option<SocketAddr> {
		self.idle.pop_front()
	}

	/// Return a resolver after a successful scan. The timeout counter is
	/// left as it is; only further timeouts advance it.
	pub fn recycle(&mut self, resolver: SocketAddr) {
		self.idle.push_back(resolver);
	}

	/// Charge one timeout against a resolver. At the threshold the
	/// resolver is dropped instead of recycled and can never be dequeued
	/// again.
	pub fn report_timeout(&mut self, resolver: SocketAddr) -> TimeoutVerdict {
		let count = self.timeouts.entry(resolver).or_insert(0);
		*count += 1;
		if *count >= BLACKLIST_THRESHOLD {
			TimeoutVerdict::Blacklisted
		} else {
			self.idle.push_back(resolver);
			TimeoutVerdict::Recycled { count: *count }
		}
	}

	/// Count of currently idle resolvers.
	pub fn remaining(&self) -> usize {
		self.idle.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(s: &str) -> SocketAddr {
		parse_resolver(s).unwrap()
	}

	#[test]
	fn test_ipv4_no_port() {
		let r = addr("1.1.1.1");
		assert_eq!(r.port(), 53);
		assert_eq!(r.ip().to_string(), "1.1.1.1");
	}

	#[test]
	fn test_ipv4_with_port() {
		let r = addr("8.8.8.8:5353");
		assert_eq!(r.port(), 5353);
		assert_eq!(r.ip().to_string(), "8.8.8.8");
	}

	#[test]
	fn test_ipv6_bare() {
		assert_eq!(addr("2606:4700::1111").port(), 53);
	}

	#[test]
	fn test_ipv6_bracketed() {
		assert_eq!(addr("[2606:4700::1111]:53").port(), 53);
	}

	#[test]
	fn test_invalid_input() {
		assert!(parse_resolver("not-an-ip").is_err());
		assert!(parse_resolver("").is_err());
	}

	#[test]
	fn test_defaults_non_empty() {
		assert_eq!(default_resolvers().len(), 4);
	}

	#[test]
	fn test_pool_round_robin() {
		let mut pool = ResolverPool::new(vec![addr("1.1.1.1"), addr("8.8.8.8")]);
		let first = pool.dequeue().unwrap();
		assert_eq!(first, addr("1.1.1.1"));
		pool.recycle(first);
		// Recycling appends, so the other resolver comes out next
		assert_eq!(pool.dequeue().unwrap(), addr("8.8.8.8"));
		assert_eq!(pool.dequeue().unwrap(), addr("1.1.1.1"));
		assert_eq!(pool.dequeue(), None);
	}

	#[test]
	fn test_pool_recycle_then_dequeue_returns_a_resolver() {
		let mut pool = ResolverPool::new(vec![addr("1.1.1.1")]);
		let r = pool.dequeue().unwrap();
		pool.recycle(r);
		assert_eq!(pool.remaining(), 1);
		assert!(pool.dequeue().is_some());
	}

	#[test]
	fn test_blacklist_after_three_timeouts() {
		let mut pool = ResolverPool::new(vec![addr("1.1.1.1")]);
		let r = pool.dequeue().unwrap();
		assert_eq!(pool.report_timeout(r), TimeoutVerdict::Recycled { count: 1 });
		let r = pool.dequeue().unwrap();
		assert_eq!(pool.report_timeout(r), TimeoutVerdict::Recycled { count: 2 });
		let r = pool.dequeue().unwrap();
		assert_eq!(pool.report_timeout(r), TimeoutVerdict::Blacklisted);
		// Blacklisted resolvers are unreachable from dequeue forever
		assert_eq!(pool.remaining(), 0);
		assert_eq!(pool.dequeue(), None);
	}

	#[test]
	fn test_success_does_not_reset_the_counter() {
		let mut pool = ResolverPool::new(vec![addr("1.1.1.1")]);
		let r = pool.dequeue().unwrap();
		pool.report_timeout(r);
		let r = pool.dequeue().unwrap();
		pool.report_timeout(r);
		let r = pool.dequeue().unwrap();
		pool.recycle(r);
		// Two timeouts survive the successful recycle; one more blacklists
		let r = pool.dequeue().unwrap();
		assert_eq!(pool.report_timeout(r), TimeoutVerdict::Blacklisted);
	}

	#[test]
	fn test_duplicate_resolvers_kept_as_multiset() {
		let mut pool = ResolverPool::new(vec![addr("1.1.1.1"), addr("1.1.1.1")]);
		assert_eq!(pool.remaining(), 2);
		assert!(pool.dequeue().is_some());
		assert!(pool.dequeue().is_some());
	}
}
