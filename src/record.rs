use hickory_proto::rr::{RData, RecordType};

/// Record types that are wire noise for enumeration purposes; they are
/// dropped before any output sink sees them.
pub const FILTERED_TYPES: [RecordType; 3] =
	[RecordType::NSEC, RecordType::RRSIG, RecordType::SOA];

/// A single discovered DNS record.
///
/// Compared by value and ordered by name, then type, then data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Record {
	pub name: String,
	pub record_type: RecordType,
	pub data: String,
}

impl Record {
	pub fn new(
		name: impl Into<String>,
		record_type: RecordType,
		data: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			record_type,
			data: data.into(),
		}
	}

	/// Convert a wire-format record into the value type used everywhere
	/// downstream. Names lose their trailing root dot.
	pub fn from_wire(record: &hickory_proto::rr::Record) -> Self {
		Self {
			name: trim_root_dot(record.name().to_utf8()),
			record_type: record.record_type(),
			data: render_rdata(record.data()),
		}
	}

	/// True for record types that never reach an output sink.
	pub fn is_filtered(&self) -> bool {
		FILTERED_TYPES.contains(&self.record_type)
	}
}

fn trim_root_dot(name: String) -> String {
	match name.strip_suffix('.') {
		Some(stripped) if !stripped.is_empty() => stripped.to_string(),
		_ => name,
	}
}

/// Render rdata the way it is conventionally printed: bare addresses and
/// hostnames, preference-prefixed MX exchanges.
fn render_rdata(data: &RData) -> String {
	match data {
		RData::A(a) => a.0.to_string(),
		RData::AAAA(aaaa) => aaaa.0.to_string(),
		RData::CNAME(cname) => trim_root_dot(cname.0.to_utf8()),
		RData::NS(ns) => trim_root_dot(ns.0.to_utf8()),
		RData::PTR(ptr) => trim_root_dot(ptr.0.to_utf8()),
		RData::MX(mx) => format!(
			"{} {}",
			mx.preference(),
			trim_root_dot(mx.exchange().to_utf8()),
		),
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use hickory_proto::rr::rdata::{A, CNAME};
	use hickory_proto::rr::Name;
	use std::net::Ipv4Addr;

	#[test]
	fn test_ordering_by_name_then_type_then_data() {
		let mut records = vec![
			Record::new("b.example.com", RecordType::A, "10.0.0.2"),
			Record::new("a.example.com", RecordType::CNAME, "c.example.com"),
			Record::new("a.example.com", RecordType::A, "10.0.0.9"),
			Record::new("a.example.com", RecordType::A, "10.0.0.1"),
		];
		records.sort();
		assert_eq!(records[0].data, "10.0.0.1");
		assert_eq!(records[1].data, "10.0.0.9");
		assert_eq!(records[2].record_type, RecordType::CNAME);
		assert_eq!(records[3].name, "b.example.com");
	}

	#[test]
	fn test_filtered_types() {
		assert!(Record::new("x", RecordType::SOA, "d").is_filtered());
		assert!(Record::new("x", RecordType::NSEC, "d").is_filtered());
		assert!(Record::new("x", RecordType::RRSIG, "d").is_filtered());
		assert!(!Record::new("x", RecordType::A, "d").is_filtered());
		assert!(!Record::new("x", RecordType::TXT, "d").is_filtered());
	}

	#[test]
	fn test_from_wire_a_record() {
		let name = Name::from_ascii("www.example.com.").unwrap();
		let wire = hickory_proto::rr::Record::from_rdata(
			name,
			300,
			RData::A(A(Ipv4Addr::new(192, 0, 2, 7))),
		);
		let record = Record::from_wire(&wire);
		assert_eq!(record.name, "www.example.com");
		assert_eq!(record.record_type, RecordType::A);
		assert_eq!(record.data, "192.0.2.7");
	}

	#[test]
	fn test_from_wire_cname_strips_root_dot() {
		let name = Name::from_ascii("alias.example.com.").unwrap();
		let target = Name::from_ascii("real.example.com.").unwrap();
		let wire = hickory_proto::rr::Record::from_rdata(
			name,
			300,
			RData::CNAME(CNAME(target)),
		);
		let record = Record::from_wire(&wire);
		assert_eq!(record.record_type, RecordType::CNAME);
		assert_eq!(record.data, "real.example.com");
	}
}
