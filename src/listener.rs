use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;

use crate::output::OutputSink;
use crate::record::Record;

/// Scan parameters echoed back to the user before the scan starts.
#[derive(Debug, Clone)]
pub struct ScanSettings {
	pub threads: usize,
	pub wordlist: usize,
	pub resolvers: usize,
	pub timeout: Duration,
}

/// The event bus between the dispatcher and the configured outputs.
///
/// Record batches are filtered here, once, for every sink: denylisted
/// record types are dropped, then anything already reported is dropped,
/// and the survivors are remembered. Callers may invoke the listener from
/// any task.
pub struct Listener {
	sinks: Vec<Box<dyn OutputSink>>,
	seen: Mutex<BTreeSet<Record>>,
}

/// Render a progress line. The issue counter includes retries, so the
/// percentage is clamped rather than allowed past full.
pub fn format_progress(subdomain: &str, issued: u64, total: u64) -> String {
	let pct = if total == 0 {
		0.0
	} else {
		((issued as f64 / total as f64) * 100.0).min(100.0)
	};
	format!("{:.2}% - Last request to: {}", pct, subdomain)
}

impl Listener {
	pub fn new(sinks: Vec<Box<dyn OutputSink>>) -> Self {
		Self {
			sinks,
			seen: Mutex::new(BTreeSet::new()),
		}
	}

	pub fn print_header(&self) {
		for sink in &self.sinks {
			sink.header();
		}
	}

	pub fn print_config(&self, settings: &ScanSettings) {
		for sink in &self.sinks {
			sink.config(settings);
		}
	}

	pub fn print_target(&self, hostname: &str) {
		for sink in &self.sinks {
			sink.target(hostname);
		}
	}

	pub fn print_status(&self, message: &str) {
		for sink in &self.sinks {
			sink.status(message);
		}
	}

	pub fn print_success(&self, message: &str) {
		for sink in &self.sinks {
			sink.success(message);
		}
	}

	pub fn print_info(&self, message: &str) {
		for sink in &self.sinks {
			sink.info(message);
		}
	}

	pub fn print_info_during_scan(&self, message: &str) {
		for sink in &self.sinks {
			sink.info_during_scan(message);
		}
	}

	pub fn print_warning(&self, message: &str) {
		for sink in &self.sinks {
			sink.warning(message);
		}
	}

	pub fn print_error(&self, message: &str) {
		for sink in &self.sinks {
			sink.error(message);
		}
	}

	pub fn print_error_without_time(&self, message: &str) {
		for sink in &self.sinks {
			sink.error_without_time(message);
		}
	}

	pub fn print_task_completed(&self) {
		let records = self.seen_records();
		for sink in &self.sinks {
			sink.task_completed(&records);
		}
	}

	pub fn print_task_failed(&self, message: &str) {
		for sink in &self.sinks {
			sink.task_failed(message);
		}
	}

	pub fn print_last_request(&self, subdomain: &str, issued: u64, total: u64) {
		let line = format_progress(subdomain, issued, total);
		for sink in &self.sinks {
			sink.last_request(&line);
		}
	}

	/// Forward a record batch discovered outside the brute force (zone
	/// transfers, name-server discovery).
	pub fn print_records(&self, records: &[Record]) {
		let fresh = self.filter_new(records);
		if fresh.is_empty() {
			return;
		}
		for sink in &self.sinks {
			sink.records(&fresh);
		}
	}

	/// Forward a record batch produced by a completed scan.
	pub fn print_records_during_scan(&self, records: &[Record]) {
		let fresh = self.filter_new(records);
		if fresh.is_empty() {
			return;
		}
		for sink in &self.sinks {
			sink.records_during_scan(&fresh);
		}
	}

	pub fn print_pausing_threads(&self) {
		for sink in &self.sinks {
			sink.pausing_threads();
		}
	}

	pub fn print_pause_options(&self) {
		for sink in &self.sinks {
			sink.pause_options();
		}
	}

	pub fn print_invalid_pause_options(&self) {
		for sink in &self.sinks {
			sink.invalid_pause_options();
		}
	}

	/// Every record reported so far, in natural order.
	pub fn seen_records(&self) -> Vec<Record> {
		self.seen.lock().unwrap().iter().cloned().collect()
	}

	/// True while a file-backed sink still has writes to flush.
	pub fn has_unflushed_reports(&self) -> bool {
		self.sinks.iter().any(|sink| sink.file_backed())
	}

	/// Flush every sink; the join of all their completion handles.
	pub fn finish(&self) -> Result<()> {
		for sink in &self.sinks {
			sink.flush()?;
		}
		Ok(())
	}

	/// Drop denylisted types and previously seen records, remembering the
	/// survivors. Batch order is preserved.
	fn filter_new(&self, records: &[Record]) -> Vec<Record> {
		let mut seen = self.seen.lock().unwrap();
		let mut fresh = Vec::new();
		for record in records {
			if record.is_filtered() {
				continue;
			}
			if seen.insert(record.clone()) {
				fresh.push(record.clone());
			}
		}
		fresh
	}
}
