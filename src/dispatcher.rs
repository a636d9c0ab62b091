use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::dns::Lookup;
use crate::listener::Listener;
use crate::record::Record;
use crate::resolver::{ResolverPool, TimeoutVerdict};
use crate::scanner::{Scanner, ScannerCommand, ScannerId};
use crate::wordlist::SubdomainQueue;

/// Terminal outcome of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
	Completed,
	Failed,
}

/// Commands accepted by the dispatcher. Every state transition happens in
/// response to exactly one of these, processed one at a time on the
/// dispatcher task.
#[derive(Debug)]
pub enum Command {
	AvailableForScan(ScannerId),
	CompletedScan {
		scanner: ScannerId,
		subdomain: String,
		resolver: SocketAddr,
		records: Vec<Record>,
	},
	TimedOut {
		scanner: ScannerId,
		subdomain: String,
		resolver: SocketAddr,
		new_timeout: Duration,
	},
	FatalError {
		subdomain: String,
		resolver: SocketAddr,
		reason: String,
	},
	Terminated(ScannerId),
	PauseScanning(oneshot::Sender<()>),
	ResumeScanning,
	PriorityScanSubdomain(String),
	NotifyOnCompletion(oneshot::Sender<ScanOutcome>),
}

/// Construction inputs for one scan.
pub struct ScanConfig {
	pub hostname: String,
	pub threads: usize,
	pub subdomains: Vec<String>,
	pub resolvers: Vec<SocketAddr>,
	pub initial_timeout: Duration,
}

/// Cloneable handle for sending commands to a running dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
	commands: mpsc::UnboundedSender<Command>,
}

impl DispatcherHandle {
	/// Ask the dispatcher to pause. The returned channel resolves once
	/// every live scanner has gone idle.
	pub fn pause(&self) -> oneshot::Receiver<()> {
		let (reply, ack) = oneshot::channel();
		let _ = self.commands.send(Command::PauseScanning(reply));
		ack
	}

	pub fn resume(&self) {
		let _ = self.commands.send(Command::ResumeScanning);
	}

	/// Push a label to the front of the queue so it is scanned next.
	pub fn enqueue_priority(&self, label: String) {
		let _ = self.commands.send(Command::PriorityScanSubdomain(label));
	}

	/// Replace the completion subscriber.
	#[allow(dead_code)]
	pub fn notify_on_completion(&self) -> oneshot::Receiver<ScanOutcome> {
		let (reply, outcome) = oneshot::channel();
		let _ = self.commands.send(Command::NotifyOnCompletion(reply));
		outcome
	}
}

/// The scan coordinator. Owns the pending queue, the resolver pool, the
/// in-flight set, and the scanner pool; nothing else touches them.
pub struct Dispatcher {
	hostname: Arc<str>,
	threads: usize,
	initial_timeout: Duration,
	pending: SubdomainQueue,
	resolvers: ResolverPool,
	in_flight: HashSet<String>,
	scanners: HashMap<ScannerId, mpsc::UnboundedSender<ScannerCommand>>,
	paused: bool,
	paused_idle: Vec<ScannerId>,
	pause_subscriber: Option<oneshot::Sender<()>>,
	completion_subscriber: Option<oneshot::Sender<ScanOutcome>>,
	scans_issued: u64,
	scans_total: u64,
	next_scanner_id: ScannerId,
	finished: bool,
	lookup: Arc<dyn Lookup>,
	listener: Arc<Listener>,
	commands: mpsc::UnboundedSender<Command>,
}

impl Dispatcher {
	/// Start the dispatcher task. Returns a command handle and the
	/// completion channel that resolves with the terminal outcome.
	pub fn spawn(
		config: ScanConfig,
		lookup: Arc<dyn Lookup>,
		listener: Arc<Listener>,
	) -> (DispatcherHandle, oneshot::Receiver<ScanOutcome>) {
		let (tx, rx) = mpsc::unbounded_channel();
		let (completion_tx, completion_rx) = oneshot::channel();
		// Registration rides the command channel, ahead of any scanner
		// traffic
		let _ = tx.send(Command::NotifyOnCompletion(completion_tx));

		let scans_total = config.subdomains.len() as u64;
		let dispatcher = Dispatcher {
			hostname: Arc::from(config.hostname.as_str()),
			threads: config.threads,
			initial_timeout: config.initial_timeout,
			pending: SubdomainQueue::new(config.subdomains),
			resolvers: ResolverPool::new(config.resolvers),
			in_flight: HashSet::new(),
			scanners: HashMap::new(),
			paused: false,
			paused_idle: Vec::new(),
			pause_subscriber: None,
			completion_subscriber: None,
			scans_issued: 0,
			scans_total,
			next_scanner_id: 0,
			finished: false,
			lookup,
			listener,
			commands: tx.clone(),
		};
		tokio::spawn(dispatcher.run(rx));

		(DispatcherHandle { commands: tx }, completion_rx)
	}

	async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
		// A scan with no workers or no words has nothing to coordinate; it
		// completes as soon as the completion subscriber checks in
		if self.threads > 0 && self.scans_total > 0 {
			for _ in 0..self.threads {
				self.start_scanner();
			}
		}

		while let Some(command) = commands.recv().await {
			self.handle(command);
			if self.finished {
				break;
			}
		}
	}

	fn handle(&mut self, command: Command) {
		match command {
			Command::AvailableForScan(scanner) => self.assign(scanner),
			Command::CompletedScan { scanner, subdomain, resolver, records } => {
				self.in_flight.remove(&subdomain);
				self.resolvers.recycle(resolver);
				if !records.is_empty() {
					self.listener.print_records_during_scan(&records);
				}
				self.assign(scanner);
			}
			Command::TimedOut { scanner, subdomain, resolver, new_timeout } => {
				self.in_flight.remove(&subdomain);
				self.pending.enqueue_priority(subdomain.clone());
				match self.resolvers.report_timeout(resolver) {
					TimeoutVerdict::Blacklisted => {
						self.listener.print_info_during_scan(&format!(
							"Lookup using {} timed out three times. Blacklisting resolver.",
							resolver.ip(),
						));
					}
					TimeoutVerdict::Recycled { .. } => {
						self.listener.print_info_during_scan(&format!(
							"Lookup of {} using {} timed out. Increasing timeout to {} seconds.",
							subdomain,
							resolver.ip(),
							new_timeout.as_secs(),
						));
					}
				}
				self.assign(scanner);
			}
			Command::FatalError { subdomain, resolver, reason } => {
				// The worker is about to die; reclaim its task and
				// resolver. Its Terminated drives any respawn.
				self.in_flight.remove(&subdomain);
				self.pending.requeue(subdomain);
				self.resolvers.recycle(resolver);
				self.listener.print_warning(&format!(
					"A scanner died during lookup: {}", reason,
				));
			}
			Command::Terminated(scanner) => {
				self.scanners.remove(&scanner);
				self.paused_idle.retain(|id| *id != scanner);
				if self.paused {
					self.check_pause_complete();
				} else if self.scanners.is_empty() {
					self.handle_scanner_attrition();
				}
			}
			Command::PauseScanning(reply) => {
				self.paused = true;
				self.pause_subscriber = Some(reply);
				self.listener.print_pausing_threads();
				self.check_pause_complete();
			}
			Command::ResumeScanning => {
				if !self.paused {
					return;
				}
				self.paused = false;
				self.pause_subscriber = None;
				self.listener.print_status("Resuming scan.");
				let idle = std::mem::take(&mut self.paused_idle);
				for scanner in idle {
					self.assign(scanner);
				}
			}
			Command::PriorityScanSubdomain(label) => {
				self.pending.enqueue_priority(label);
			}
			Command::NotifyOnCompletion(reply) => {
				self.completion_subscriber = Some(reply);
				if self.threads == 0 || self.scans_total == 0 {
					self.finish(ScanOutcome::Completed);
				}
			}
		}
	}

	/// Hand the next unit of work to a ready scanner, or retire it when
	/// there is nothing left for it to do.
	fn assign(&mut self, scanner: ScannerId) {
		if self.paused {
			if !self.paused_idle.contains(&scanner) {
				self.paused_idle.push(scanner);
			}
			self.check_pause_complete();
			return;
		}

		let Some(subdomain) = self.pending.dequeue() else {
			self.stop_scanner(scanner);
			return;
		};

		let Some(resolver) = self.resolvers.dequeue() else {
			self.pending.enqueue_priority(subdomain);
			self.listener.print_warning(
				"There aren't enough resolvers for each thread. Reducing thread count by 1.",
			);
			self.stop_scanner(scanner);
			return;
		};

		self.in_flight.insert(subdomain.clone());
		self.scans_issued += 1;
		self.listener.print_last_request(&subdomain, self.scans_issued, self.scans_total);

		if let Some(tasks) = self.scanners.get(&scanner) {
			let _ = tasks.send(ScannerCommand::Scan { subdomain, resolver });
		}
	}

	/// The last scanner is gone. Either the scan is done, or work remains
	/// and the pool must be rebuilt from whatever inputs are left.
	fn handle_scanner_attrition(&mut self) {
		if self.pending.remaining() == 0 && self.in_flight.is_empty() {
			self.finish(ScanOutcome::Completed);
			return;
		}

		// Workers died with work outstanding; their tasks go back in line
		for label in std::mem::take(&mut self.in_flight) {
			self.pending.requeue(label);
		}

		let replacements = self.pending.remaining()
			.min(self.resolvers.remaining())
			.min(self.threads);
		if replacements == 0 {
			self.listener.print_task_failed("Scan aborted as all resolvers are dead.");
			self.finish(ScanOutcome::Failed);
			return;
		}
		for _ in 0..replacements {
			self.start_scanner();
		}
	}

	fn start_scanner(&mut self) {
		let id = self.next_scanner_id;
		self.next_scanner_id += 1;

		let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
		self.scanners.insert(id, tasks_tx);

		let scanner = Scanner::new(
			id,
			self.hostname.clone(),
			self.lookup.clone(),
			self.initial_timeout,
			tasks_rx,
			self.commands.clone(),
		);
		tokio::spawn(scanner.run());
	}

	fn stop_scanner(&mut self, scanner: ScannerId) {
		if let Some(tasks) = self.scanners.get(&scanner) {
			let _ = tasks.send(ScannerCommand::Stop);
		}
	}

	fn check_pause_complete(&mut self) {
		if self.paused && self.paused_idle.len() == self.scanners.len() {
			if let Some(reply) = self.pause_subscriber.take() {
				let _ = reply.send(());
			}
		}
	}

	fn finish(&mut self, outcome: ScanOutcome) {
		match self.completion_subscriber.take() {
			Some(reply) => {
				let _ = reply.send(outcome);
			}
			None => self.listener.print_error(
				"The dispatcher doesn't know who to notify of completion! Terminating anyway.",
			),
		}
		self.finished = true;
	}
}
