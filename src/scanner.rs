use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::dispatcher::Command;
use crate::dns::{Lookup, LookupOutcome};

pub type ScannerId = u64;

/// Lookup timeouts grow one second per timeout event, up to this cap.
pub const MAX_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Instruction from the dispatcher to one scanner.
#[derive(Debug)]
pub enum ScannerCommand {
	Scan {
		subdomain: String,
		resolver: SocketAddr,
	},
	Stop,
}

/// A worker that performs one DNS lookup at a time against one resolver.
///
/// The scanner announces itself once, then acts only on instructions. It
/// holds no scan state beyond its adaptive timeout; the dispatcher owns
/// everything else. Whatever path ends the loop, a Terminated message is
/// the last thing out.
pub struct Scanner {
	id: ScannerId,
	hostname: Arc<str>,
	lookup: Arc<dyn Lookup>,
	timeout: Duration,
	commands: mpsc::UnboundedReceiver<ScannerCommand>,
	dispatcher: mpsc::UnboundedSender<Command>,
}

impl Scanner {
	pub fn new(
		id: ScannerId,
		hostname: Arc<str>,
		lookup: Arc<dyn Lookup>,
		initial_timeout: Duration,
		commands: mpsc::UnboundedReceiver<ScannerCommand>,
		dispatcher: mpsc::UnboundedSender<Command>,
	) -> Self {
		Self {
			id,
			hostname,
			lookup,
			timeout: initial_timeout,
			commands,
			dispatcher,
		}
	}

	pub async fn run(mut self) {
		let _ = self.dispatcher.send(Command::AvailableForScan(self.id));

		while let Some(command) = self.commands.recv().await {
			match command {
				ScannerCommand::Scan { subdomain, resolver } => {
					if !self.scan(subdomain, resolver).await {
						break;
					}
				}
				ScannerCommand::Stop => break,
			}
		}

		let _ = self.dispatcher.send(Command::Terminated(self.id));
	}

	/// Perform one lookup and report the result. Returns false when the
	/// worker cannot continue.
	async fn scan(&mut self, subdomain: String, resolver: SocketAddr) -> bool {
		let fqdn = format!("{}.{}", subdomain, self.hostname);

		match self.lookup.lookup(&fqdn, resolver, self.timeout).await {
			LookupOutcome::Answers(records) => {
				let _ = self.dispatcher.send(Command::CompletedScan {
					scanner: self.id,
					subdomain,
					resolver,
					records,
				});
				true
			}
			LookupOutcome::Timeout => {
				self.timeout = (self.timeout + Duration::from_secs(1))
					.min(MAX_LOOKUP_TIMEOUT);
				let _ = self.dispatcher.send(Command::TimedOut {
					scanner: self.id,
					subdomain,
					resolver,
					new_timeout: self.timeout,
				});
				true
			}
			LookupOutcome::Fatal(reason) => {
				let _ = self.dispatcher.send(Command::FatalError {
					subdomain,
					resolver,
					reason,
				});
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::Record;
	use async_trait::async_trait;
	use hickory_proto::rr::RecordType;

	struct ScriptedLookup(LookupOutcome);

	#[async_trait]
	impl Lookup for ScriptedLookup {
		async fn lookup(
			&self,
			_fqdn: &str,
			_resolver: SocketAddr,
			_timeout: Duration,
		) -> LookupOutcome {
			self.0.clone()
		}
	}

	fn resolver() -> SocketAddr {
		"127.0.0.1:53".parse().unwrap()
	}

	async fn run_scanner(
		outcome: LookupOutcome,
		initial_timeout: Duration,
	) -> (
		mpsc::UnboundedSender<ScannerCommand>,
		mpsc::UnboundedReceiver<Command>,
	) {
		let (task_tx, task_rx) = mpsc::unbounded_channel();
		let (result_tx, result_rx) = mpsc::unbounded_channel();
		let scanner = Scanner::new(
			1,
			Arc::from("example.com"),
			Arc::new(ScriptedLookup(outcome)),
			initial_timeout,
			task_rx,
			result_tx,
		);
		tokio::spawn(scanner.run());
		(task_tx, result_rx)
	}

	#[tokio::test]
	async fn test_announces_then_completes_a_scan() {
		let record = Record::new("a.example.com", RecordType::A, "10.0.0.1");
		let (tasks, mut results) =
			run_scanner(LookupOutcome::Answers(vec![record]), Duration::from_secs(5)).await;

		assert!(matches!(
			results.recv().await.unwrap(),
			Command::AvailableForScan(1)
		));

		tasks.send(ScannerCommand::Scan {
			subdomain: "a".to_string(),
			resolver: resolver(),
		}).unwrap();

		match results.recv().await.unwrap() {
			Command::CompletedScan { subdomain, records, .. } => {
				assert_eq!(subdomain, "a");
				assert_eq!(records.len(), 1);
			}
			other => panic!("unexpected command: {:?}", other),
		}

		// Stop ends the worker; Terminated is its last word
		tasks.send(ScannerCommand::Stop).unwrap();
		assert!(matches!(
			results.recv().await.unwrap(),
			Command::Terminated(1)
		));
	}

	#[tokio::test]
	async fn test_timeout_grows_by_one_second() {
		let (tasks, mut results) =
			run_scanner(LookupOutcome::Timeout, Duration::from_secs(5)).await;
		results.recv().await.unwrap(); // AvailableForScan

		tasks.send(ScannerCommand::Scan {
			subdomain: "a".to_string(),
			resolver: resolver(),
		}).unwrap();

		match results.recv().await.unwrap() {
			Command::TimedOut { new_timeout, .. } => {
				assert_eq!(new_timeout, Duration::from_secs(6));
			}
			other => panic!("unexpected command: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_timeout_caps_at_thirty_seconds() {
		let (tasks, mut results) =
			run_scanner(LookupOutcome::Timeout, Duration::from_secs(30)).await;
		results.recv().await.unwrap(); // AvailableForScan

		tasks.send(ScannerCommand::Scan {
			subdomain: "a".to_string(),
			resolver: resolver(),
		}).unwrap();

		match results.recv().await.unwrap() {
			Command::TimedOut { new_timeout, .. } => {
				assert_eq!(new_timeout, MAX_LOOKUP_TIMEOUT);
			}
			other => panic!("unexpected command: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_fatal_error_stops_the_worker() {
		let (tasks, mut results) = run_scanner(
			LookupOutcome::Fatal("socket exploded".to_string()),
			Duration::from_secs(5),
		).await;
		results.recv().await.unwrap(); // AvailableForScan

		tasks.send(ScannerCommand::Scan {
			subdomain: "a".to_string(),
			resolver: resolver(),
		}).unwrap();

		assert!(matches!(
			results.recv().await.unwrap(),
			Command::FatalError { .. }
		));
		// The worker stops on its own; no Stop required
		assert!(matches!(
			results.recv().await.unwrap(),
			Command::Terminated(1)
		));
	}
}
