mod cli;
mod dispatcher;
mod dns;
mod listener;
mod output;
mod recon;
mod record;
mod resolver;
mod scanner;
mod wordlist;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::Cli;
use crate::dispatcher::{Dispatcher, DispatcherHandle, ScanConfig, ScanOutcome};
use crate::dns::WireLookup;
use crate::listener::{Listener, ScanSettings};
use crate::output::{CsvSink, OutputSink, TerminalSink, TxtSink};

#[tokio::main]
async fn main() {
	let code = match run().await {
		Ok(code) => code,
		Err(e) => {
			eprintln!("Error: {:#}", e);
			1
		}
	};
	std::process::exit(code);
}

async fn run() -> Result<i32> {
	let cli = Cli::parse();

	// One listener fans every event out to the configured sinks
	let mut sinks: Vec<Box<dyn OutputSink>> = vec![Box::new(TerminalSink::new())];
	if let Some(path) = &cli.csv_report {
		sinks.push(Box::new(CsvSink::create(path)?));
	}
	if let Some(path) = &cli.txt_report {
		sinks.push(Box::new(TxtSink::create(path)?));
	}
	let listener = Arc::new(Listener::new(sinks));

	listener.print_header();

	// Collect resolvers from all sources, falling back to the built-in
	// defaults when none were supplied
	let mut resolvers = Vec::new();
	for r in &cli.resolvers {
		resolvers.push(resolver::parse_resolver(r)?);
	}
	if let Some(path) = &cli.resolver_file {
		resolvers.extend(resolver::read_resolver_file(path)?);
	}
	if cli.system_resolvers {
		resolvers.extend(resolver::system_resolvers());
	}
	if resolvers.is_empty() {
		resolvers = resolver::default_resolvers();
	}

	let subdomains = wordlist::read_wordlist(&cli.wordlist)?;
	let threads = cli.threads.min(subdomains.len());
	let timeout = Duration::from_secs(cli.timeout);

	listener.print_target(&cli.hostname);
	listener.print_config(&ScanSettings {
		threads,
		wordlist: subdomains.len(),
		resolvers: resolvers.len(),
		timeout,
	});

	// Cheap techniques first: authoritative discovery and zone transfers
	recon::run(
		&cli.hostname,
		&mut resolvers,
		&listener,
		timeout,
		cli.no_ns_discovery,
		cli.no_zone_transfer,
	).await;

	listener.print_status("Starting subdomain brute force.");

	let (handle, mut completion) = Dispatcher::spawn(
		ScanConfig {
			hostname: cli.hostname.clone(),
			threads,
			subdomains,
			resolvers,
			initial_timeout: timeout,
		},
		Arc::new(WireLookup),
		listener.clone(),
	);

	loop {
		tokio::select! {
			outcome = &mut completion => {
				let outcome = outcome.unwrap_or(ScanOutcome::Failed);
				if outcome == ScanOutcome::Completed {
					listener.print_task_completed();
				}
				listener.finish()?;
				return Ok(match outcome {
					ScanOutcome::Completed => 0,
					ScanOutcome::Failed => 1,
				});
			}
			_ = tokio::signal::ctrl_c() => {
				let _ = handle.pause().await;
				if !pause_menu(&listener, &handle).await? {
					println!();
					println!();
					listener.print_error_without_time("Cancelled by the user");
					if listener.has_unflushed_reports() {
						listener.print_error_without_time(
							"WARNING: Reports may not be complete due to unexpected exit.",
						);
					}
					// Best effort: keep whatever the reports already hold
					let _ = listener.finish();
					return Ok(130);
				}
			}
		}
	}
}

/// Interactive prompt shown once the scan is fully paused. Returns true
/// when the user resumes, false when they want out.
async fn pause_menu(listener: &Listener, handle: &DispatcherHandle) -> Result<bool> {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	listener.print_pause_options();

	loop {
		let Some(line) = lines.next_line().await? else {
			// stdin is gone; treat it as an exit
			return Ok(false);
		};
		match line.trim() {
			"r" => {
				handle.resume();
				return Ok(true);
			}
			"e" => return Ok(false),
			scan if scan.starts_with("s ") => {
				// Jump the queue with a label once the scan resumes
				handle.enqueue_priority(scan[2..].trim().to_string());
				listener.print_pause_options();
			}
			_ => listener.print_invalid_pause_options(),
		}
	}
}
