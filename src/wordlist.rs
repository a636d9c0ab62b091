use std::collections::VecDeque;

use anyhow::{anyhow, Result};

/// Read subdomain labels from a wordlist file, one per line.
///
/// Blank lines and lines starting with '#' are skipped. Duplicate labels
/// are preserved; deduplication is the wordlist author's business.
pub fn read_wordlist(path: &str) -> Result<Vec<String>> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read wordlist '{}': {}", path, e))?;
	let labels: Vec<String> = content.lines()
		.map(|line| line.trim().to_string())
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.collect();
	Ok(labels)
}

/// FIFO queue of pending subdomain labels with a priority front.
///
/// Not internally synchronized; the dispatcher is its only owner.
#[derive(Debug, Default)]
pub struct SubdomainQueue {
	labels: VecDeque<String>,
}

impl SubdomainQueue {
	pub fn new(labels: impl IntoIterator<Item = String>) -> Self {
		let mut queue = Self::default();
		for label in labels {
			queue.enqueue(label);
		}
		queue
	}

	/// Append a label at the tail.
	pub fn enqueue(&mut self, label: String) {
		self.labels.push_back(label);
	}

	/// Insert a label at the head so it is dispatched next.
	pub fn enqueue_priority(&mut self, label: String) {
		self.labels.push_front(label);
	}

	/// Return a lost label to the tail (worker death, abandoned task).
	pub fn requeue(&mut self, label: String) {
		self.labels.push_back(label);
	}

	pub fn dequeue(&mut self) -> Option<String> {
		self.labels.pop_front()
	}

	pub fn remaining(&self) -> usize {
		self.labels.len()
	}
}
