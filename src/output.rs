use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::listener::ScanSettings;
use crate::record::Record;

/// One destination for scan events. Every operation defaults to a no-op
/// so each sink implements only what it cares about.
pub trait OutputSink: Send + Sync {
	fn header(&self) {}
	fn config(&self, _settings: &ScanSettings) {}
	fn target(&self, _hostname: &str) {}
	fn status(&self, _message: &str) {}
	fn success(&self, _message: &str) {}
	fn info(&self, _message: &str) {}
	fn info_during_scan(&self, _message: &str) {}
	fn warning(&self, _message: &str) {}
	fn error(&self, _message: &str) {}
	fn error_without_time(&self, _message: &str) {}
	fn task_completed(&self, _records: &[Record]) {}
	fn task_failed(&self, _message: &str) {}
	fn last_request(&self, _line: &str) {}
	fn records(&self, _records: &[Record]) {}
	fn records_during_scan(&self, _records: &[Record]) {}
	fn pausing_threads(&self) {}
	fn pause_options(&self) {}
	fn invalid_pause_options(&self) {}

	/// True for sinks whose output lives on disk and must be flushed.
	fn file_backed(&self) -> bool {
		false
	}

	/// Flush pending writes. Resolves the sink's completion hook.
	fn flush(&self) -> Result<()> {
		Ok(())
	}
}

/// Interactive terminal output. Lines emitted during the scan carry a
/// local-time prefix.
pub struct TerminalSink;

impl TerminalSink {
	pub fn new() -> Self {
		Self
	}

	fn stamped(&self, message: &str) {
		println!("[{}] {}", Local::now().format("%H:%M:%S"), message);
	}
}

impl OutputSink for TerminalSink {
	fn header(&self) {
		println!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
		println!("==============");
		println!();
	}

	fn config(&self, settings: &ScanSettings) {
		println!("Wordlist size:  {}", settings.wordlist);
		println!("Resolvers:      {}", settings.resolvers);
		println!("Threads:        {}", settings.threads);
		println!("Timeout:        {} s", settings.timeout.as_secs());
		println!();
	}

	fn target(&self, hostname: &str) {
		println!("Target:         {}", hostname);
	}

	fn status(&self, message: &str) {
		self.stamped(message);
	}

	fn success(&self, message: &str) {
		self.stamped(message);
	}

	fn info(&self, message: &str) {
		self.stamped(message);
	}

	fn info_during_scan(&self, message: &str) {
		self.stamped(message);
	}

	fn warning(&self, message: &str) {
		self.stamped(&format!("Warning: {}", message));
	}

	fn error(&self, message: &str) {
		self.stamped(&format!("Error: {}", message));
	}

	fn error_without_time(&self, message: &str) {
		println!("Error: {}", message);
	}

	fn task_completed(&self, records: &[Record]) {
		println!();
		if records.is_empty() {
			self.stamped("Scan complete. No records found.");
			return;
		}
		self.stamped(&format!(
			"Scan complete. {} unique record(s) found.", records.len(),
		));

		let mut table = Table::new();
		table.load_preset(UTF8_FULL);
		table.set_content_arrangement(ContentArrangement::Dynamic);
		table.set_header(vec!["Subdomain", "Type", "Data"]);
		for record in records {
			table.add_row(vec![
				record.name.clone(),
				record.record_type.to_string(),
				record.data.clone(),
			]);
		}
		println!("{table}");
	}

	fn task_failed(&self, message: &str) {
		self.stamped(&format!("Error: {}", message));
	}

	fn last_request(&self, line: &str) {
		self.stamped(line);
	}

	fn records(&self, records: &[Record]) {
		for record in records {
			println!(
				"{:<40} {:<8} {}",
				record.name, record.record_type, record.data,
			);
		}
	}

	fn records_during_scan(&self, records: &[Record]) {
		for record in records {
			self.stamped(&format!(
				"{:<40} {:<8} {}",
				record.name, record.record_type, record.data,
			));
		}
	}

	fn pausing_threads(&self) {
		self.stamped("Pausing. Waiting for in-flight lookups to finish...");
	}

	fn pause_options(&self) {
		println!("Paused. [r]esume, [s <label>] to scan a label next, or [e]xit?");
	}

	fn invalid_pause_options(&self) {
		println!("Unrecognized option. [r]esume, [s <label>], or [e]xit?");
	}
}

/// CSV report: header row at creation, one row per emitted record as it
/// arrives. An interrupted scan keeps every row written so far.
pub struct CsvSink {
	path: String,
	writer: Mutex<csv::Writer<File>>,
}

impl CsvSink {
	/// Create the report file and write the header row.
	pub fn create(path: impl Into<String>) -> Result<Self> {
		let path = path.into();
		let mut writer = csv::Writer::from_path(&path)
			.with_context(|| format!("failed to create CSV report '{}'", path))?;
		writer.write_record(["Subdomain", "Type", "Data"])
			.with_context(|| format!("failed to write CSV header to '{}'", path))?;
		Ok(Self {
			path,
			writer: Mutex::new(writer),
		})
	}

	fn write_rows(&self, records: &[Record]) {
		let mut writer = self.writer.lock().unwrap();
		for record in records {
			// Row errors resurface when the writer is flushed
			let _ = writer.write_record([
				record.name.clone(),
				record.record_type.to_string(),
				record.data.clone(),
			]);
		}
	}
}

impl OutputSink for CsvSink {
	fn records(&self, records: &[Record]) {
		self.write_rows(records);
	}

	fn records_during_scan(&self, records: &[Record]) {
		self.write_rows(records);
	}

	fn file_backed(&self) -> bool {
		true
	}

	fn flush(&self) -> Result<()> {
		self.writer.lock().unwrap().flush()
			.with_context(|| format!("failed to flush CSV report '{}'", self.path))?;
		Ok(())
	}
}

/// Plain text report: tab-separated name, type, and data per record,
/// written in emission order as records arrive.
pub struct TxtSink {
	path: String,
	writer: Mutex<BufWriter<File>>,
}

impl TxtSink {
	/// Create the report file.
	pub fn create(path: impl Into<String>) -> Result<Self> {
		let path = path.into();
		let file = File::create(&path)
			.with_context(|| format!("failed to create text report '{}'", path))?;
		Ok(Self {
			path,
			writer: Mutex::new(BufWriter::new(file)),
		})
	}

	fn write_rows(&self, records: &[Record]) {
		let mut writer = self.writer.lock().unwrap();
		for record in records {
			// Row errors resurface when the writer is flushed
			let _ = writeln!(
				writer,
				"{}\t{}\t{}",
				record.name, record.record_type, record.data,
			);
		}
	}
}

impl OutputSink for TxtSink {
	fn records(&self, records: &[Record]) {
		self.write_rows(records);
	}

	fn records_during_scan(&self, records: &[Record]) {
		self.write_rows(records);
	}

	fn file_backed(&self) -> bool {
		true
	}

	fn flush(&self) -> Result<()> {
		self.writer.lock().unwrap().flush()
			.with_context(|| format!("failed to flush text report '{}'", self.path))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use hickory_proto::rr::RecordType;

	fn temp_path(suffix: &str) -> String {
		std::env::temp_dir()
			.join(format!("subfury-test-{}-{}", std::process::id(), suffix))
			.to_string_lossy()
			.to_string()
	}

	fn sample_records() -> Vec<Record> {
		vec![
			Record::new("a.example.com", RecordType::A, "10.0.0.1"),
			Record::new("b.example.com", RecordType::CNAME, "a.example.com"),
		]
	}

	#[test]
	fn test_csv_report_header_and_rows() {
		let path = temp_path("report.csv");
		let sink = CsvSink::create(&path).unwrap();
		sink.records_during_scan(&sample_records());
		sink.flush().unwrap();

		let content = std::fs::read_to_string(&path).unwrap();
		let lines: Vec<&str> = content.lines().collect();
		assert_eq!(lines[0], "Subdomain,Type,Data");
		assert_eq!(lines[1], "a.example.com,A,10.0.0.1");
		assert_eq!(lines[2], "b.example.com,CNAME,a.example.com");
		std::fs::remove_file(&path).unwrap();
	}

	#[test]
	fn test_csv_report_keeps_rows_written_before_an_interrupt() {
		let path = temp_path("partial.csv");
		let sink = CsvSink::create(&path).unwrap();
		sink.records_during_scan(&sample_records()[..1]);
		// A cancelled scan flushes whatever has been written so far
		sink.flush().unwrap();

		let content = std::fs::read_to_string(&path).unwrap();
		assert_eq!(content.lines().count(), 2);
		assert!(content.contains("a.example.com,A,10.0.0.1"));

		sink.records_during_scan(&sample_records()[1..]);
		sink.flush().unwrap();
		let content = std::fs::read_to_string(&path).unwrap();
		assert_eq!(content.lines().count(), 3);
		std::fs::remove_file(&path).unwrap();
	}

	#[test]
	fn test_txt_report_tab_separated() {
		let path = temp_path("report.txt");
		let sink = TxtSink::create(&path).unwrap();
		sink.records(&sample_records());
		sink.flush().unwrap();

		let content = std::fs::read_to_string(&path).unwrap();
		assert_eq!(content, "a.example.com\tA\t10.0.0.1\nb.example.com\tCNAME\ta.example.com\n");
		std::fs::remove_file(&path).unwrap();
	}

	#[test]
	fn test_file_backed_flags() {
		let csv_path = temp_path("flags.csv");
		let txt_path = temp_path("flags.txt");
		assert!(CsvSink::create(&csv_path).unwrap().file_backed());
		assert!(TxtSink::create(&txt_path).unwrap().file_backed());
		assert!(!TerminalSink::new().file_backed());
		std::fs::remove_file(&csv_path).unwrap();
		std::fs::remove_file(&txt_path).unwrap();
	}
}
