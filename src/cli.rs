use clap::Parser;

/// DNS subdomain brute forcer
#[derive(Parser, Debug)]
#[command(name = "subfury")]
#[command(about = "Brute-force DNS subdomains concurrently over a rotating resolver pool")]
pub struct Cli {
	/// Target hostname to enumerate subdomains of
	pub hostname: String,

	/// File containing subdomain labels to try (one per line)
	#[arg(short = 'w', long = "wordlist")]
	pub wordlist: String,

	/// DNS resolver address (repeatable, e.g. 1.1.1.1 or 1.1.1.1:53)
	#[arg(short = 'r', long = "resolver")]
	pub resolvers: Vec<String>,

	/// File containing resolver addresses (one per line)
	#[arg(short = 'f', long = "resolver-file")]
	pub resolver_file: Option<String>,

	/// Include system resolvers from /etc/resolv.conf
	#[arg(long = "system-resolvers")]
	pub system_resolvers: bool,

	/// Number of concurrent scanner workers
	#[arg(short = 't', long = "threads", default_value = "10")]
	pub threads: usize,

	/// Initial lookup timeout in seconds (grows on repeated timeouts)
	#[arg(long = "timeout", default_value = "5")]
	pub timeout: u64,

	/// Write discovered records to a CSV report
	#[arg(long = "csv-report")]
	pub csv_report: Option<String>,

	/// Write discovered records to a plain text report
	#[arg(long = "txt-report")]
	pub txt_report: Option<String>,

	/// Skip authoritative name server discovery (and zone transfers)
	#[arg(long = "no-ns-discovery")]
	pub no_ns_discovery: bool,

	/// Skip zone transfer attempts
	#[arg(long = "no-zone-transfer")]
	pub no_zone_transfer: bool,
}
